use crate::span::LineOffsets;
use crate::span::Span;
use crate::tokens::TagDelimiter;
use crate::tokens::Token;

/// Splits template source into Django constructs and text.
///
/// A construct must open and close on the same line; anything else is text,
/// matching how Django's own lexer treats a stray `{%` or `{{`.
pub struct Lexer<'a> {
    source: &'a str,
    current: usize,
    verbatim: Option<String>,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            current: 0,
            verbatim: None,
        }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, LineOffsets) {
        let mut tokens = Vec::new();
        let line_offsets = LineOffsets::from_source(self.source);

        while !self.is_at_end() {
            let token = match self.construct_at(self.current) {
                Some((delimiter, end)) => self.lex_django_construct(delimiter, end),
                None => self.lex_text(),
            };
            tokens.push(token);
        }

        tokens.push(Token::Eof);

        (tokens, line_offsets)
    }

    /// If a complete construct starts at `pos`, return its delimiter and end offset.
    fn construct_at(&self, pos: usize) -> Option<(TagDelimiter, usize)> {
        let delimiter = TagDelimiter::from_opener(self.source.as_bytes().get(pos..)?)?;
        let body_start = pos + TagDelimiter::LENGTH;
        let rest = self.source.get(body_start..)?;
        let line_end = rest.find('\n').unwrap_or(rest.len());
        let close = rest[..line_end].find(delimiter.closer())?;
        Some((delimiter, body_start + close + TagDelimiter::LENGTH))
    }

    fn lex_django_construct(&mut self, delimiter: TagDelimiter, end: usize) -> Token {
        let start = self.current;
        self.current = end;

        let span = Span::from_bounds(start, end);
        let content = self.source
            [start + TagDelimiter::LENGTH..end - TagDelimiter::LENGTH]
            .trim()
            .to_string();

        if let Some(closing) = &self.verbatim {
            if delimiter == TagDelimiter::Block && content == *closing {
                self.verbatim = None;
                return Token::Block { content, span };
            }
            return Token::Text { span };
        }

        match delimiter {
            TagDelimiter::Block => {
                if content == "verbatim" || content.starts_with("verbatim ") {
                    self.verbatim = Some(format!("end{content}"));
                }
                Token::Block { content, span }
            }
            TagDelimiter::Variable => Token::Variable { content, span },
            TagDelimiter::Comment => Token::Comment { content, span },
        }
    }

    fn lex_text(&mut self) -> Token {
        let start = self.current;
        let mut pos = start
            + self.source[start..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);

        loop {
            match self.source.get(pos..).and_then(|rest| rest.find('{')) {
                Some(idx) => {
                    let candidate = pos + idx;
                    if self.construct_at(candidate).is_some() {
                        self.current = candidate;
                        break;
                    }
                    pos = candidate + 1;
                }
                None => {
                    self.current = self.source.len();
                    break;
                }
            }
        }

        Token::Text {
            span: Span::from_bounds(start, self.current),
        }
    }

    #[inline]
    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}
