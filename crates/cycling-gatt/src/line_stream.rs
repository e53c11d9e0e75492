//! Line-by-line delivery of a multi-line module reply.

/// Longest line the module protocol produces.
pub const MAX_LINE_LEN: usize = 128;

/// Receives the lines of a reply, one at a time and in order.
pub trait LineVisitor {
    /// Called once per line with the (possibly truncated) line bytes and their length.
    fn visit_line(&mut self, line: &[u8], len: usize);

    /// The visitor owns the expected line count; parsing stops once this returns false.
    fn wants_more(&self) -> bool {
        true
    }
}

/// Fixed-capacity scratch space for one line.
#[derive(Clone)]
pub struct LineBuf {
    buf: [u8; MAX_LINE_LEN],
    len: usize,
}

impl LineBuf {
    pub fn new() -> Self {
        Self {
            buf: [0u8; MAX_LINE_LEN],
            len: 0,
        }
    }

    /// Copy `line` in, keeping at most `max_len` bytes (never more than the capacity).
    pub fn fill(&mut self, line: &[u8], max_len: usize) -> &[u8] {
        let n = line.len().min(max_len).min(MAX_LINE_LEN);
        self.buf[..n].copy_from_slice(&line[..n]);
        self.len = n;
        self.as_bytes()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for LineBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy iterator over the non-empty lines of a raw reply.
///
/// Lines end at `\n`; a preceding `\r` is dropped. A trailing fragment with no terminator
/// (a reply cut short by the wait window) is still yielded.
pub struct Lines<'a> {
    rest: &'a [u8],
}

pub fn lines(raw: &[u8]) -> Lines<'_> {
    Lines { rest: raw }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rest.is_empty() {
            let raw: &'a [u8] = self.rest;
            let (line, rest) = match raw.iter().position(|&b| b == b'\n') {
                Some(pos) => (&raw[..pos], &raw[pos + 1..]),
                None => (raw, &raw[raw.len()..]),
            };
            self.rest = rest;
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }
}

/// Splits replies into lines and hands them to a [`LineVisitor`].
///
/// The parser owns its scratch buffer; taking `&mut self` per parse keeps two parses from
/// sharing it.
pub struct LineStreamParser {
    scratch: LineBuf,
    max_len: usize,
}

impl LineStreamParser {
    pub fn new(max_len: usize) -> Self {
        Self {
            scratch: LineBuf::new(),
            max_len: max_len.min(MAX_LINE_LEN),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Deliver the lines of `raw` to `visitor` until it stops wanting more or the input ends.
    /// Returns the number of lines delivered.
    pub fn parse<V: LineVisitor + ?Sized>(&mut self, raw: &[u8], visitor: &mut V) -> usize {
        let mut delivered = 0;
        for line in lines(raw) {
            if !visitor.wants_more() {
                break;
            }
            let text = self.scratch.fill(line, self.max_len);
            visitor.visit_line(text, text.len());
            delivered += 1;
        }
        delivered
    }
}

impl Default for LineStreamParser {
    fn default() -> Self {
        Self::new(MAX_LINE_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collect {
        limit: usize,
        seen: Vec<(Vec<u8>, usize)>,
    }

    impl LineVisitor for Collect {
        fn visit_line(&mut self, line: &[u8], len: usize) {
            self.seen.push((line.to_vec(), len));
        }

        fn wants_more(&self) -> bool {
            self.seen.len() < self.limit
        }
    }

    #[test]
    fn test_lines_strip_terminators() {
        let got: Vec<&[u8]> = lines(b"a\r\n\r\nbc\nd").collect();
        assert_eq!(got, vec![b"a".as_slice(), b"bc".as_slice(), b"d".as_slice()]);
    }

    #[test]
    fn test_parse_stops_at_visitor_total() {
        let mut parser = LineStreamParser::default();
        let mut v = Collect {
            limit: 2,
            seen: Vec::new(),
        };
        let n = parser.parse(b"one\r\ntwo\r\nthree\r\n", &mut v);
        assert_eq!(n, 2);
        assert_eq!(v.seen[1], (b"two".to_vec(), 3));
    }

    #[test]
    fn test_long_lines_truncated() {
        let mut parser = LineStreamParser::new(4);
        let mut v = Collect {
            limit: 10,
            seen: Vec::new(),
        };
        parser.parse(b"abcdefgh\r\nxy\r\n", &mut v);
        assert_eq!(v.seen[0], (b"abcd".to_vec(), 4));
        assert_eq!(v.seen[1], (b"xy".to_vec(), 2));
    }

    #[test]
    fn test_max_len_capped_at_capacity() {
        let parser = LineStreamParser::new(4096);
        assert_eq!(parser.max_len(), MAX_LINE_LEN);
        let long = vec![b'x'; 300];
        let mut buf = LineBuf::new();
        assert_eq!(buf.fill(&long, 4096).len(), MAX_LINE_LEN);
    }

    #[test]
    fn test_empty_input_delivers_nothing() {
        let mut parser = LineStreamParser::default();
        let mut v = Collect {
            limit: 5,
            seen: Vec::new(),
        };
        assert_eq!(parser.parse(b"", &mut v), 0);
        assert!(v.seen.is_empty());
    }
}
