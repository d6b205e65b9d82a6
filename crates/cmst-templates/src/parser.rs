use serde::Serialize;
use thiserror::Error;

use crate::span::Span;
use crate::tokens::Token;

/// A node of the flat (un-nested) node list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum RawNode {
    Tag {
        name: String,
        bits: Vec<String>,
        span: Span,
    },
    Variable {
        var: String,
        span: Span,
    },
    Comment {
        content: String,
        span: Span,
    },
    Text {
        span: Span,
    },
}

impl RawNode {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            RawNode::Tag { span, .. }
            | RawNode::Variable { span, .. }
            | RawNode::Comment { span, .. }
            | RawNode::Text { span } => *span,
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    /// Parse every token, collecting errors instead of stopping at the first.
    pub fn parse(&mut self) -> (Vec<RawNode>, Vec<ParseError>) {
        let mut nodelist = Vec::with_capacity(self.tokens.len());
        let mut errors = Vec::new();

        while let Some(token) = self.consume() {
            match Self::next_node(token) {
                Ok(node) => nodelist.push(node),
                Err(error) => errors.push(error),
            }
        }

        (nodelist, errors)
    }

    fn next_node(token: &Token) -> Result<RawNode, ParseError> {
        match token {
            Token::Block { content, span } => {
                let (name, bits) = split_tag_args(content).ok_or(ParseError::EmptyTag {
                    position: span.start_usize(),
                })?;
                Ok(RawNode::Tag {
                    name,
                    bits,
                    span: *span,
                })
            }
            Token::Variable { content, span } => {
                let var = variable_expression(content).ok_or(ParseError::EmptyVariable {
                    position: span.start_usize(),
                })?;
                Ok(RawNode::Variable { var, span: *span })
            }
            Token::Comment { content, span } => Ok(RawNode::Comment {
                content: content.clone(),
                span: *span,
            }),
            Token::Text { span } => Ok(RawNode::Text { span: *span }),
            Token::Eof => Err(ParseError::UnexpectedEof),
        }
    }

    fn consume(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.current)?;
        if matches!(token, Token::Eof) {
            return None;
        }
        self.current += 1;
        Some(token)
    }
}

/// Split tag contents on whitespace outside of quotes.
///
/// Returns `None` for an empty tag.
#[must_use]
pub fn split_tag_args(content: &str) -> Option<(String, Vec<String>)> {
    let mut pieces = Vec::with_capacity((content.len() / 8).clamp(2, 8));
    let mut start = None;
    let mut quote: Option<char> = None;
    let mut escape = false;
    for (idx, ch) in content.char_indices() {
        if start.is_none() && !ch.is_whitespace() {
            start = Some(idx);
        }
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if quote.is_some() => escape = true,
            '"' | '\'' if quote == Some(ch) => quote = None,
            '"' | '\'' if quote.is_none() => quote = Some(ch),
            c if quote.is_none() && c.is_whitespace() => {
                if let Some(s) = start.take() {
                    pieces.push(content[s..idx].to_owned());
                }
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        pieces.push(content[s..].to_owned());
    }
    let mut iter = pieces.into_iter();
    let name = iter.next()?;
    Some((name, iter.collect()))
}

/// The variable of a `{{ }}` expression: everything before the first `|`
/// outside quotes, trimmed. Filters are dropped.
///
/// Returns `None` for an empty expression.
fn variable_expression(content: &str) -> Option<String> {
    let mut end = content.len();
    let mut quote: Option<u8> = None;
    let mut escape = false;
    for (idx, byte) in content.bytes().enumerate() {
        if escape {
            escape = false;
            continue;
        }
        match byte {
            b'\\' if quote.is_some() => escape = true,
            b'"' | b'\'' if quote == Some(byte) => quote = None,
            b'"' | b'\'' if quote.is_none() => quote = Some(byte),
            b'|' if quote.is_none() => {
                end = idx;
                break;
            }
            _ => {}
        }
    }
    let var = content[..end].trim();
    (!var.is_empty()).then(|| var.to_string())
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
pub enum ParseError {
    #[error("Empty block tag at position {position}")]
    EmptyTag { position: usize },

    #[error("Empty variable tag at position {position}")]
    EmptyVariable { position: usize },

    #[error("Unexpected end of token stream")]
    UnexpectedEof,
}

impl ParseError {
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            ParseError::EmptyTag { position } | ParseError::EmptyVariable { position } => {
                *position
            }
            ParseError::UnexpectedEof => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_test_template(source: &str) -> (Vec<RawNode>, Vec<ParseError>) {
        let (tokens, _) = Lexer::new(source).tokenize();
        Parser::new(tokens).parse()
    }

    mod tags {
        use super::*;

        #[test]
        fn test_split_quoted_arguments() {
            let (name, bits) = split_tag_args(r#"include "a b.html" with x='1 2' only"#).unwrap();
            assert_eq!(name, "include");
            assert_eq!(bits, vec![r#""a b.html""#, "with", "x='1 2'", "only"]);
        }

        #[test]
        fn test_escaped_quote_inside_string() {
            let (_, bits) = split_tag_args(r#"trans "say \"hi\" now""#).unwrap();
            assert_eq!(bits, vec![r#""say \"hi\" now""#]);
        }

        #[test]
        fn test_empty_tag_is_error() {
            let (nodes, errors) = parse_test_template("a{%  %}b");
            assert_eq!(errors, vec![ParseError::EmptyTag { position: 1 }]);
            assert_eq!(nodes.len(), 2);
        }

        #[test]
        fn test_tag_node() {
            let (nodes, errors) = parse_test_template("{% extends 'base.html' %}");
            assert!(errors.is_empty());
            assert_eq!(
                nodes,
                vec![RawNode::Tag {
                    name: "extends".to_string(),
                    bits: vec!["'base.html'".to_string()],
                    span: Span::new(0, 25),
                }]
            );
        }
    }

    mod variables {
        use super::*;

        fn variable(source: &str) -> String {
            let (nodes, _) = parse_test_template(source);
            match nodes.into_iter().next() {
                Some(RawNode::Variable { var, .. }) => var,
                other => panic!("expected variable, got {other:?}"),
            }
        }

        #[test]
        fn test_block_super() {
            assert_eq!(variable("{{ block.super }}"), "block.super");
            assert_eq!(variable("{{ block.super|safe }}"), "block.super");
        }

        #[test]
        fn test_filters_are_dropped() {
            assert_eq!(variable("{{ value|default:'nothing'|title }}"), "value");
            assert_eq!(variable("{{ value | title }}"), "value");
        }

        #[test]
        fn test_pipe_inside_quotes() {
            assert_eq!(variable(r#"{{ "a|b"|default:'x' }}"#), r#""a|b""#);
            assert_eq!(variable(r#"{{ 'it\'s|here' }}"#), r#"'it\'s|here'"#);
        }

        #[test]
        fn test_filter_without_variable_is_error() {
            let (nodes, errors) = parse_test_template("{{ |title }}");
            assert!(nodes.is_empty());
            assert_eq!(errors, vec![ParseError::EmptyVariable { position: 0 }]);
        }

        #[test]
        fn test_empty_variable_is_error() {
            let (nodes, errors) = parse_test_template("{{ }}");
            assert!(nodes.is_empty());
            assert_eq!(errors, vec![ParseError::EmptyVariable { position: 0 }]);
        }
    }
}
