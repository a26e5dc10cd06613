// Class index → sign letter mapping
//
// The static fingerspelling alphabet has no J (index 9) and no Z (index 25):
// both gestures involve motion and cannot be captured in a single photo.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter table indexed by model class. `None` marks a class with no letter.
#[rustfmt::skip]
const SIGN_TABLE: [Option<char>; 25] = [
    Some('A'), Some('B'), Some('C'), Some('D'), Some('E'),
    Some('F'), Some('G'), Some('H'), Some('I'), None,
    Some('K'), Some('L'), Some('M'), Some('N'), Some('O'),
    Some('P'), Some('Q'), Some('R'), Some('S'), Some('T'),
    Some('U'), Some('V'), Some('W'), Some('X'), Some('Y'),
];

/// Number of class slots in the label table
pub const CLASS_COUNT: usize = SIGN_TABLE.len();

/// Raw arg-max index produced by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassLabel(pub usize);

/// A letter of the static sign alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SignLetter(char);

/// Result of looking a class index up in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSlot {
    Letter(SignLetter),
    Unmapped,
}

impl ClassLabel {
    pub fn index(self) -> usize {
        self.0
    }

    /// Exhaustive lookup: indices past the table are unmapped too
    pub fn slot(self) -> LabelSlot {
        match SIGN_TABLE.get(self.0).copied().flatten() {
            Some(letter) => LabelSlot::Letter(SignLetter(letter)),
            None => LabelSlot::Unmapped,
        }
    }
}

impl SignLetter {
    /// Parse a single letter, case-insensitively.
    ///
    /// Returns `None` for empty input, more than one character, or a letter
    /// outside the static alphabet.
    pub fn parse(input: &str) -> Option<Self> {
        let mut chars = input.trim().chars();
        let ch = chars.next()?.to_ascii_uppercase();
        if chars.next().is_some() {
            return None;
        }
        Self::from_char(ch)
    }

    pub fn from_char(ch: char) -> Option<Self> {
        SIGN_TABLE
            .iter()
            .flatten()
            .any(|&letter| letter == ch)
            .then_some(SignLetter(ch))
    }

    pub fn as_char(self) -> char {
        self.0
    }

    /// Class index the model uses for this letter
    pub fn class_label(self) -> ClassLabel {
        let index = SIGN_TABLE
            .iter()
            .position(|slot| *slot == Some(self.0))
            .unwrap_or_default();
        ClassLabel(index)
    }

    /// All letters in class-index order
    pub fn alphabet() -> impl Iterator<Item = SignLetter> {
        SIGN_TABLE.iter().flatten().map(|&c| SignLetter(c))
    }
}

impl fmt::Display for SignLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SignLetter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SignLetter::parse(&value).ok_or_else(|| format!("not a static sign letter: {value:?}"))
    }
}

impl From<SignLetter> for String {
    fn from(letter: SignLetter) -> Self {
        letter.0.to_string()
    }
}
