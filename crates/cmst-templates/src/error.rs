use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::parser::ParseError;
use crate::span::Span;

/// Why a template failed to compile.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
pub enum SyntaxErrorKind {
    #[error("Empty block tag")]
    EmptyBlockTag,

    #[error("Empty variable tag")]
    EmptyVariableTag,

    #[error("Unclosed tag '{tag}'. Looking for one of: {}.", .expected.join(", "))]
    UnclosedTag { tag: String, expected: Vec<String> },

    #[error("Invalid block tag: '{tag}'{}", expected_suffix(.expected))]
    UnexpectedTag { tag: String, expected: Vec<String> },

    #[error("'block' tag takes only one argument")]
    BlockArguments,

    #[error("'block' tag with name '{name}' appears more than once")]
    DuplicateBlock { name: String },

    #[error("{{% extends %}} must be the first tag in the template")]
    ExtendsNotFirst,

    #[error("'extends' cannot appear more than once in the same template")]
    MultipleExtends,

    #[error("'{tag}' takes at least one argument")]
    MissingArgument { tag: String },
}

fn expected_suffix(expected: &[String]) -> String {
    if expected.is_empty() {
        String::new()
    } else {
        let quoted: Vec<String> = expected.iter().map(|tag| format!("'{tag}'")).collect();
        format!(", expected {}", quoted.join(" or "))
    }
}

/// Source position attached to a syntax error in diagnostic mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
    pub source_line: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub span: Span,
    pub location: Option<Location>,
}

impl SyntaxError {
    #[must_use]
    pub fn new(kind: SyntaxErrorKind, span: Span) -> Self {
        Self {
            kind,
            span,
            location: None,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(location) = &self.location {
            write!(
                f,
                " (line {}, column {}): {}",
                location.line,
                location.column,
                location.source_line.trim()
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for SyntaxError {}

impl From<ParseError> for SyntaxError {
    fn from(err: ParseError) -> Self {
        let position = u32::try_from(err.position()).unwrap_or(u32::MAX);
        let kind = match err {
            ParseError::EmptyVariable { .. } => SyntaxErrorKind::EmptyVariableTag,
            ParseError::EmptyTag { .. } | ParseError::UnexpectedEof => {
                SyntaxErrorKind::EmptyBlockTag
            }
        };
        Self::new(kind, Span::new(position, 0))
    }
}
