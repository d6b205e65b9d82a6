use serde::Serialize;

use crate::span::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagDelimiter {
    Block,
    Variable,
    Comment,
}

impl TagDelimiter {
    pub const LENGTH: usize = 2;

    #[must_use]
    pub fn from_opener(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b'{', b'%', ..] => Some(Self::Block),
            [b'{', b'{', ..] => Some(Self::Variable),
            [b'{', b'#', ..] => Some(Self::Comment),
            _ => None,
        }
    }

    #[must_use]
    pub fn closer(self) -> &'static str {
        match self {
            Self::Block => "%}",
            Self::Variable => "}}",
            Self::Comment => "#}",
        }
    }
}

/// A lexed piece of template source. Spans cover the delimiters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Token {
    Block { content: String, span: Span },
    Variable { content: String, span: Span },
    Comment { content: String, span: Span },
    Text { span: Span },
    Eof,
}

impl Token {
    #[must_use]
    pub fn span(&self) -> Option<Span> {
        match self {
            Token::Block { span, .. }
            | Token::Variable { span, .. }
            | Token::Comment { span, .. }
            | Token::Text { span } => Some(*span),
            Token::Eof => None,
        }
    }

    /// Trimmed text between the delimiters, empty for text and EOF.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Token::Block { content, .. }
            | Token::Variable { content, .. }
            | Token::Comment { content, .. } => content,
            Token::Text { .. } | Token::Eof => "",
        }
    }
}
