use std::fmt;

/// Shortest text, after trimming, that is worth sending to the model.
pub const MIN_TEXT_CHARS: usize = 3;

/// Why a submission was turned away before reaching the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputWarning {
    Empty,
    TooShort,
}

impl InputWarning {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Please enter some text to analyze",
            Self::TooShort => "Enter at least 3 characters",
        }
    }
}

impl fmt::Display for InputWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Screens user text. Whitespace-only input counts as too short, not empty.
pub fn check(text: &str) -> Result<(), InputWarning> {
    if text.is_empty() {
        return Err(InputWarning::Empty);
    }
    if text.trim().chars().count() < MIN_TEXT_CHARS {
        return Err(InputWarning::TooShort);
    }
    Ok(())
}
