use std::fmt;

use crate::error::{ChatResult, InvalidInputSnafu};

pub const DEFAULT_MAX_INPUT_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRejection {
    Empty,
    TooLong { length: usize, max: usize },
}

impl fmt::Display for InputRejection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => formatter.write_str("message cannot be empty"),
            Self::TooLong { length, max } => {
                write!(formatter, "message is {length} characters, at most {max} allowed")
            }
        }
    }
}

/// Boundary check applied before anything reaches the session: returns the trimmed text.
pub fn validate_input(raw: &str, max_chars: usize) -> ChatResult<&str> {
    let text = raw.trim();
    let rejection = if text.is_empty() {
        Some(InputRejection::Empty)
    } else {
        let length = text.chars().count();
        (length > max_chars).then_some(InputRejection::TooLong {
            length,
            max: max_chars,
        })
    };

    match rejection {
        Some(rejection) => InvalidInputSnafu {
            stage: "validate-input",
            rejection,
        }
        .fail(),
        None => Ok(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;

    fn rejection(raw: &str, max: usize) -> Option<InputRejection> {
        match validate_input(raw, max) {
            Err(ChatError::InvalidInput { rejection, .. }) => Some(rejection),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => None,
        }
    }

    #[test]
    fn trims_accepted_input() {
        assert_eq!(
            validate_input("  Show Marico's Q2 volume growth \n", 2000).unwrap(),
            "Show Marico's Q2 volume growth"
        );
    }

    #[test]
    fn rejects_blank_input() {
        assert_eq!(rejection("", 2000), Some(InputRejection::Empty));
        assert_eq!(rejection(" \n\t ", 2000), Some(InputRejection::Empty));
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let at_limit = "₹".repeat(5);
        assert!(validate_input(&at_limit, 5).is_ok());
        assert_eq!(
            rejection(&"₹".repeat(6), 5),
            Some(InputRejection::TooLong { length: 6, max: 5 })
        );
    }
}
