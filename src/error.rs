//! Error Channel
//!
//! One failure mode for the whole pipeline: a structured, categorized
//! error that aborts the current pipeline invocation at the call site.
//! There is no partial recovery; the top-level driver is the only thing
//! that ever catches one.

use std::fmt;

/// The closed set of error categories used across the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Tokenize,
    Preprocessing,
    Parse,
    Record,
    Interpret,
    Value,
    Poly,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tokenize => "Tokenize",
            Self::Preprocessing => "Preprocessing",
            Self::Parse => "Parse",
            Self::Record => "Record",
            Self::Interpret => "Interpret",
            Self::Value => "Value",
            Self::Poly => "Poly",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured pipeline error: `{ category, message }`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{category}: {message}")]
pub struct CompileError {
    pub category: Category,
    pub message: String,
}

impl CompileError {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn tokenize(message: impl Into<String>) -> Self {
        Self::new(Category::Tokenize, message)
    }

    pub fn preprocessing(message: impl Into<String>) -> Self {
        Self::new(Category::Preprocessing, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(Category::Parse, message)
    }

    pub fn record(message: impl Into<String>) -> Self {
        Self::new(Category::Record, message)
    }

    pub fn interpret(message: impl Into<String>) -> Self {
        Self::new(Category::Interpret, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(Category::Value, message)
    }

    pub fn poly(message: impl Into<String>) -> Self {
        Self::new(Category::Poly, message)
    }

    /// The user-facing one-line message the top-level driver prints.
    pub fn display_message(&self) -> String {
        format!("[ERROR!] {}: {}", self.category, self.message)
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_message_matches_driver_format() {
        let err = CompileError::tokenize("bad token");
        assert_eq!(err.display_message(), "[ERROR!] Tokenize: bad token");
    }

    #[test]
    fn category_names_are_stable() {
        assert_eq!(Category::Interpret.as_str(), "Interpret");
        assert_eq!(Category::Poly.as_str(), "Poly");
    }
}
