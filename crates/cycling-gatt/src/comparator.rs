use crate::checksum::fletcher16;
use crate::line_stream::LineVisitor;
use tracing::debug;

/// Ground truth for a catalog listing, one entry per line.
#[derive(Clone, Copy, Debug)]
pub enum ReferenceTable<'a> {
    /// The literal lines; slower, but a mismatch can be read off directly.
    TextLines(&'a [&'a str]),
    /// Fletcher-16 of each line.
    Checksums(&'a [u16]),
}

impl ReferenceTable<'_> {
    pub fn len(&self) -> usize {
        match self {
            ReferenceTable::TextLines(lines) => lines.len(),
            ReferenceTable::Checksums(sums) => sums.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `line` matches entry `index`. Out-of-range entries never match.
    pub fn matches(&self, index: usize, line: &[u8]) -> bool {
        match self {
            ReferenceTable::TextLines(lines) => lines
                .get(index)
                .is_some_and(|expected| expected.as_bytes() == line),
            ReferenceTable::Checksums(sums) => sums
                .get(index)
                .is_some_and(|&expected| expected == fletcher16(line)),
        }
    }
}

/// Running verdict of a listing comparison.
///
/// `is_equal` only ever goes from true to false. `line_number` counts the lines compared and
/// stops at `total_lines`; anything after that is ignored.
#[derive(Clone, Debug)]
pub struct ComparatorState<'a> {
    pub is_equal: bool,
    pub line_number: usize,
    pub total_lines: usize,
    pub reference: ReferenceTable<'a>,
}

impl<'a> ComparatorState<'a> {
    pub fn new(reference: ReferenceTable<'a>) -> Self {
        Self {
            is_equal: true,
            line_number: 0,
            total_lines: reference.len(),
            reference,
        }
    }

    /// Fold one line into the verdict.
    pub fn compare_line(&mut self, line: &[u8]) {
        if self.line_number >= self.total_lines {
            return;
        }
        let matched = self.reference.matches(self.line_number, line);
        self.is_equal = self.is_equal && matched;
        debug!(
            line = self.line_number,
            matched,
            is_equal = self.is_equal,
            "catalog line compared"
        );
        self.line_number += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.line_number == self.total_lines
    }

    /// Every expected line arrived and every one matched.
    pub fn matched(&self) -> bool {
        self.is_equal && self.is_complete()
    }
}

impl LineVisitor for ComparatorState<'_> {
    fn visit_line(&mut self, line: &[u8], len: usize) {
        self.compare_line(&line[..len.min(line.len())]);
    }

    fn wants_more(&self) -> bool {
        self.line_number < self.total_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_stream::LineStreamParser;
    use crate::reference::{expected_checksums, expected_text, EXPECTED_GATT_LINES};

    fn listing() -> String {
        let mut out = String::new();
        for line in EXPECTED_GATT_LINES {
            out.push_str(line);
            out.push_str("\r\n");
        }
        out
    }

    #[test]
    fn test_matching_listing() {
        let mut parser = LineStreamParser::default();
        let mut state = ComparatorState::new(expected_checksums());
        let n = parser.parse(listing().as_bytes(), &mut state);
        assert_eq!(n, 5);
        assert!(state.is_equal);
        assert!(state.matched());
        assert_eq!(state.line_number, state.total_lines);
    }

    #[test]
    fn test_single_mismatch_is_sticky() {
        for bad in 0..EXPECTED_GATT_LINES.len() {
            let mut state = ComparatorState::new(expected_checksums());
            for (i, line) in EXPECTED_GATT_LINES.iter().enumerate() {
                if i == bad {
                    state.compare_line(b"ID=09,UUID=0x180D");
                } else {
                    state.compare_line(line.as_bytes());
                }
            }
            assert!(!state.is_equal, "mismatch at line {bad} was lost");
        }
    }

    #[test]
    fn test_extra_lines_ignored() {
        let mut state = ComparatorState::new(expected_checksums());
        for line in EXPECTED_GATT_LINES {
            state.compare_line(line.as_bytes());
        }
        state.compare_line(b"garbage");
        state.compare_line(b"more garbage");
        assert!(state.is_equal);
        assert_eq!(state.line_number, state.total_lines);
    }

    #[test]
    fn test_short_listing_is_incomplete() {
        let mut parser = LineStreamParser::default();
        let mut state = ComparatorState::new(expected_checksums());
        parser.parse(b"ID=01,UUID=0x1818\r\n", &mut state);
        assert!(state.is_equal);
        assert_eq!(state.line_number, 1);
        assert!(!state.matched());
    }

    #[test]
    fn test_text_and_checksum_agree() {
        let inputs = [
            listing(),
            listing().replace("MIN_LEN=6", "MIN_LEN=14"),
            "ID=01,UUID=0x1818\r\nOK\r\n".to_string(),
            String::new(),
        ];
        for input in inputs {
            let mut parser = LineStreamParser::default();
            let mut by_sum = ComparatorState::new(expected_checksums());
            let mut by_text = ComparatorState::new(expected_text());
            parser.parse(input.as_bytes(), &mut by_sum);
            parser.parse(input.as_bytes(), &mut by_text);
            assert_eq!(by_sum.is_equal, by_text.is_equal);
            assert_eq!(by_sum.line_number, by_text.line_number);
        }
    }

    #[test]
    fn test_text_compare_checks_length() {
        let table = ["OK"];
        let reference = ReferenceTable::TextLines(&table);
        assert!(reference.matches(0, b"OK"));
        assert!(!reference.matches(0, b"OK "));
        assert!(!reference.matches(0, b"O"));
        assert!(!reference.matches(1, b"OK"));
    }
}
