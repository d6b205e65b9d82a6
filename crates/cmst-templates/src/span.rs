use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: u32,
    pub length: u32,
}

impl Span {
    #[must_use]
    pub fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    /// Build a span from byte bounds, saturating at `u32::MAX`.
    #[must_use]
    pub fn from_bounds(start: usize, end: usize) -> Self {
        let start_u32 = u32::try_from(start).unwrap_or(u32::MAX);
        let end_u32 = u32::try_from(end).unwrap_or(u32::MAX);
        Self::new(start_u32, end_u32.saturating_sub(start_u32))
    }

    #[must_use]
    pub fn end(self) -> u32 {
        self.start.saturating_add(self.length)
    }

    #[must_use]
    pub fn start_usize(self) -> usize {
        self.start as usize
    }

    #[must_use]
    pub fn end_usize(self) -> usize {
        self.end() as usize
    }
}

impl From<Span> for (u32, u32) {
    fn from(span: Span) -> Self {
        (span.start, span.length)
    }
}

/// Byte offsets of the first character of every line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineOffsets(Vec<u32>);

impl Default for LineOffsets {
    fn default() -> Self {
        Self(vec![0])
    }
}

impl LineOffsets {
    #[must_use]
    pub fn from_source(source: &str) -> Self {
        let mut offsets = Self::default();
        for (idx, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                offsets.add_line(u32::try_from(idx + 1).unwrap_or(u32::MAX));
            }
        }
        offsets
    }

    pub fn add_line(&mut self, offset: u32) {
        self.0.push(offset);
    }

    /// 1-based `(line, column)` of a byte offset.
    #[must_use]
    pub fn position(&self, offset: u32) -> (u32, u32) {
        let line = match self.0.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next.saturating_sub(1),
        };
        let line_start = self.0.get(line).copied().unwrap_or(0);
        let line_number = u32::try_from(line).unwrap_or(u32::MAX).saturating_add(1);
        (line_number, offset.saturating_sub(line_start) + 1)
    }

    /// The text of the line containing `offset`, without its terminator.
    #[must_use]
    pub fn line_text<'a>(&self, source: &'a str, offset: u32) -> &'a str {
        let (line, _) = self.position(offset);
        let idx = (line - 1) as usize;
        let start = self.0.get(idx).map_or(0, |s| *s as usize);
        let end = self
            .0
            .get(idx + 1)
            .map_or(source.len(), |s| (*s as usize).saturating_sub(1));
        source
            .get(start..end.max(start))
            .unwrap_or_default()
            .trim_end_matches('\r')
    }
}
