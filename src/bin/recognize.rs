//! One-shot recognition of a single photo
//! Run with: cargo run --release --bin recognize -- <image_path> [expected_letter]

use anyhow::{bail, Context, Result};
use sign_validator::services::recognition::load_image;
use sign_validator::{Config, OnnxClassifier, RecognitionEngine, SignLetter};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("sign_validator=info,ort=off")
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(image_path) = args.get(1) else {
        eprintln!(
            "Usage: {} <image_path> [expected_letter]",
            env!("CARGO_BIN_NAME")
        );
        std::process::exit(2);
    };
    let expected = match args.get(2) {
        Some(letter) => match SignLetter::parse(letter) {
            Some(letter) => Some(letter),
            None => bail!("'{}' is not a letter the model can recognize", letter),
        },
        None => None,
    };

    if !Path::new(image_path).exists() {
        eprintln!("Image not found: {}", image_path);
        std::process::exit(1);
    }

    let config = Config::new().context("Invalid configuration")?;
    let classifier = OnnxClassifier::load(&config.model).context("Failed to load sign classifier")?;
    info!(
        "Model: {} ({})",
        classifier.model_path().display(),
        classifier.backend()
    );
    let engine = RecognitionEngine::new(Arc::new(classifier));

    info!("Loading image: {}", image_path);
    let image =
        load_image(Path::new(image_path)).with_context(|| format!("Cannot decode {}", image_path))?;
    info!("Image dimensions: {}x{}", image.width(), image.height());

    let prediction = engine.recognize(&image)?;
    let letter = engine.decode_label(prediction.label)?;

    println!("\n=== Results ===");
    println!("Class:      {}", prediction.label.index());
    println!("Letter:     {}", letter);
    println!("Confidence: {:.3}", prediction.confidence);
    if let Some(expected) = expected {
        println!("Expected:   {} (class {})", expected, expected.class_label().index());
        println!("Match:      {}", if letter == expected { "True" } else { "False" });
    }

    Ok(())
}
