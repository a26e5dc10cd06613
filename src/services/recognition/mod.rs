// Recognition engine: photo → model input → class scores → sign letter

pub mod labels;
pub mod model;
pub mod preprocess;

pub use labels::{ClassLabel, LabelSlot, SignLetter, CLASS_COUNT};
pub use model::{OnnxClassifier, ScoringModel};

use crate::core::errors::{RecognitionError, RecognitionResult};
use image::{DynamicImage, ImageDecoder, ImageReader, ImageResult};
use serde::Serialize;
use std::io::{BufRead, Seek};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Number of top scores the diagnostic confidence is computed over
const CONFIDENCE_TOP_K: usize = 25;

/// Arg-max decision plus diagnostic confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: ClassLabel,
    /// Softmax probability of the winning class among the top-k scores.
    /// Reported only; never used for the decision.
    pub confidence: f32,
}

/// Full recognition result for one photo against one expected letter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Recognition {
    pub prediction: Prediction,
    pub letter: SignLetter,
    pub is_match: bool,
}

/// Recognizes sign letters with an injected scoring model.
///
/// The model is loaded once at startup and shared read-only; the engine holds
/// no other state, so one instance serves all concurrent transactions.
pub struct RecognitionEngine {
    model: Arc<dyn ScoringModel>,
}

impl RecognitionEngine {
    pub fn new(model: Arc<dyn ScoringModel>) -> Self {
        Self { model }
    }

    pub fn model_description(&self) -> String {
        self.model.describe()
    }

    /// Preprocess, score, and pick the winning class
    pub fn recognize(&self, image: &DynamicImage) -> RecognitionResult<Prediction> {
        let input = preprocess::prepare_input(image);
        let scores = self.model.score(input)?;
        let label = argmax(&scores)?;
        let confidence = top_k_confidence(&scores, CONFIDENCE_TOP_K);

        debug!(
            "Predicted class {} (confidence {:.3}, {} scores)",
            label.index(),
            confidence,
            scores.len()
        );
        Ok(Prediction { label, confidence })
    }

    /// Map a class index to its letter
    pub fn decode_label(&self, label: ClassLabel) -> RecognitionResult<SignLetter> {
        match label.slot() {
            LabelSlot::Letter(letter) => Ok(letter),
            LabelSlot::Unmapped => Err(RecognitionError::UnmappedLabel {
                index: label.index(),
            }),
        }
    }

    /// Does the photo show `expected`?
    pub fn is_correct(&self, image: &DynamicImage, expected: SignLetter) -> RecognitionResult<bool> {
        let prediction = self.recognize(image)?;
        Ok(self.decode_label(prediction.label)? == expected)
    }

    /// Recognize an already decoded image and compare against `expected`
    pub fn evaluate_image(
        &self,
        image: &DynamicImage,
        expected: SignLetter,
    ) -> RecognitionResult<Recognition> {
        let prediction = self.recognize(image)?;
        let letter = self.decode_label(prediction.label)?;
        Ok(Recognition {
            prediction,
            letter,
            is_match: letter == expected,
        })
    }

    /// Read the image at `path` and evaluate it.
    ///
    /// Scratch files carry no meaningful extension; see [`load_image`].
    pub fn evaluate(&self, path: &Path, expected: SignLetter) -> RecognitionResult<Recognition> {
        let image = load_image(path)?;
        self.evaluate_image(&image, expected)
    }
}

/// Read and decode the photo at `path`, upright.
///
/// The format is sniffed from the content and the EXIF orientation tag is
/// applied, so phone photos reach preprocessing the way `imread` returns them.
pub fn load_image(path: &Path) -> RecognitionResult<DynamicImage> {
    let scratch_error = |source| RecognitionError::ScratchRead {
        path: path.to_path_buf(),
        source,
    };
    let reader = ImageReader::open(path)
        .map_err(scratch_error)?
        .with_guessed_format()
        .map_err(scratch_error)?;
    Ok(decode_upright(reader)?)
}

/// Decode and rotate/flip according to the embedded orientation tag
pub fn decode_upright<R: BufRead + Seek>(reader: ImageReader<R>) -> ImageResult<DynamicImage> {
    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Index of the highest score; the first one wins ties. NaN never wins.
pub fn argmax(scores: &[f32]) -> RecognitionResult<ClassLabel> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }

    best.map(|(index, _)| ClassLabel(index)).ok_or_else(|| {
        RecognitionError::InvalidModelOutput(format!(
            "no usable score among {} outputs",
            scores.len()
        ))
    })
}

/// Softmax over the `k` largest scores, returning the top probability
pub fn top_k_confidence(scores: &[f32], k: usize) -> f32 {
    let mut top: Vec<f32> = scores.iter().copied().filter(|s| !s.is_nan()).collect();
    if top.is_empty() || k == 0 {
        return 0.0;
    }
    top.sort_unstable_by(|a, b| b.total_cmp(a));
    top.truncate(k);

    let max = top[0];
    let sum: f32 = top.iter().map(|s| (s - max).exp()).sum();
    1.0 / sum
}
