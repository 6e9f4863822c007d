//! Line-driven state machine for the configuration format.
//!
//! ```text
//! // line comment
//! /* block
//!    comment */
//! i:port
//! 14452
//!
//! s:motd
//! first line
//! second line
//!
//! a:peers
//! alpha
//! i:42
//! s:i:not-an-integer
//! ```
//!
//! A declaration `<t>:<key>` opens a value block that runs until an empty
//! line (or end of input). Array elements default to strings; `i:` and `s:`
//! force the element type and `a:` is rejected.

use std::collections::{HashMap, TryReserveError};
use std::io::BufRead;

use tracing::{debug, error};

use crate::entry::{Entry, EntryKind};
use crate::error::{ConfError, ConfResult};

/// Parsed key → entry table, before it is installed in a store.
pub type Table = HashMap<String, Entry>;

/// Where the parser is within the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseState {
    /// Between value blocks.
    Normal,
    /// Reading the value lines of a declaration.
    InValue,
    /// Inside a `/* ... */` comment.
    InBlockComment,
}

#[derive(Debug)]
struct Pending {
    key: String,
    entry: Entry,
}

/// Incremental parser. Feed it lines, then call [`Parser::finish`].
///
/// All partially built state lives in the parser, so dropping it after an
/// error releases everything allocated so far.
#[derive(Debug)]
pub struct Parser {
    state: ParseState,
    pending: Option<Pending>,
    line: usize,
    table: Table,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Normal,
            pending: None,
            line: 0,
            table: Table::new(),
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Number of lines consumed so far.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Consume one line. A trailing `\n` or `\r\n` is ignored.
    pub fn feed_line(&mut self, raw: &[u8]) -> ConfResult<()> {
        self.line += 1;
        let line = strip_line_ending(raw);
        match self.state {
            ParseState::Normal => self.normal_line(line),
            ParseState::InBlockComment => {
                if line.starts_with(b"*/") {
                    self.state = ParseState::Normal;
                }
                Ok(())
            }
            ParseState::InValue if line.is_empty() => {
                self.commit();
                Ok(())
            }
            ParseState::InValue => self.value_line(line),
        }
    }

    /// Commit the entry still open at end of input and return the table.
    pub fn finish(mut self) -> Table {
        self.commit();
        self.table
    }

    fn normal_line(&mut self, line: &[u8]) -> ConfResult<()> {
        if line.iter().all(u8::is_ascii_whitespace) || line.starts_with(b"//") {
            return Ok(());
        }
        if let Some(rest) = line.strip_prefix(b"/*") {
            if !contains(rest, b"*/") {
                self.state = ParseState::InBlockComment;
            }
            return Ok(());
        }
        let Some((kind, name)) = declaration(line) else {
            return Ok(());
        };
        let key = std::str::from_utf8(name)
            .map_err(|_| ConfError::InvalidKey { line: self.line })?;
        self.pending = Some(Pending {
            key: key.to_owned(),
            entry: Entry::empty(kind),
        });
        self.state = ParseState::InValue;
        Ok(())
    }

    fn value_line(&mut self, line: &[u8]) -> ConfResult<()> {
        let number = self.line;
        let Some(pending) = self.pending.as_mut() else {
            self.state = ParseState::Normal;
            return Ok(());
        };
        let oom = |source| ConfError::Allocation {
            line: number,
            source,
        };
        match &mut pending.entry {
            Entry::Integer(value) => {
                *value = parse_leading_int(line);
                // One line is the whole value.
                self.commit();
            }
            Entry::String(bytes) => {
                if bytes.is_empty() {
                    *bytes = copy_bytes(line).map_err(oom)?;
                } else {
                    bytes.try_reserve(line.len() + 1).map_err(oom)?;
                    bytes.push(b'\n');
                    bytes.extend_from_slice(line);
                }
            }
            Entry::Array(items) => {
                let element = parse_element(line, number)?;
                items.try_reserve(1).map_err(oom)?;
                items.push(element);
            }
        }
        Ok(())
    }

    fn commit(&mut self) {
        self.state = ParseState::Normal;
        let Some(Pending { key, entry }) = self.pending.take() else {
            return;
        };
        debug!(key = %key, kind = %entry.kind(), "committed entry");
        self.table.insert(key, entry);
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a whole input, one line at a time.
pub fn parse_reader<R: BufRead>(mut reader: R) -> ConfResult<Table> {
    let mut parser = Parser::new();
    let mut buf = Vec::new();
    while reader.read_until(b'\n', &mut buf)? > 0 {
        feed(&mut parser, &buf)?;
        buf.clear();
    }
    Ok(parser.finish())
}

/// Parse configuration text held in memory.
pub fn parse_str(text: &str) -> ConfResult<Table> {
    let mut parser = Parser::new();
    for line in text.split_inclusive('\n') {
        feed(&mut parser, line.as_bytes())?;
    }
    Ok(parser.finish())
}

fn feed(parser: &mut Parser, line: &[u8]) -> ConfResult<()> {
    parser.feed_line(line).inspect_err(|e| {
        error!(line = parser.line(), error = %e, "configuration parse failed");
    })
}

/// `atoi`-style parse of a leading integer. Anything unparsable yields `0`;
/// out-of-range values saturate.
pub fn parse_leading_int(bytes: &[u8]) -> i64 {
    let mut rest = bytes;
    while let [first, tail @ ..] = rest {
        if !first.is_ascii_whitespace() {
            break;
        }
        rest = tail;
    }
    let negative = match rest {
        [b'-', tail @ ..] => {
            rest = tail;
            true
        }
        [b'+', tail @ ..] => {
            rest = tail;
            false
        }
        _ => false,
    };
    let mut value: i64 = 0;
    for digit in rest.iter().take_while(|b| b.is_ascii_digit()) {
        let digit = i64::from(digit - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }
    value
}

fn parse_element(line: &[u8], number: usize) -> ConfResult<Entry> {
    let oom = |source| ConfError::Allocation {
        line: number,
        source,
    };
    match line {
        [b'a', b':', ..] => Err(ConfError::InvalidArray { line: number }),
        [b'i', b':', rest @ ..] => Ok(Entry::Integer(parse_leading_int(rest))),
        [b's', b':', rest @ ..] => Ok(Entry::String(copy_bytes(rest).map_err(oom)?)),
        _ => Ok(Entry::String(copy_bytes(line).map_err(oom)?)),
    }
}

fn declaration(line: &[u8]) -> Option<(EntryKind, &[u8])> {
    match line {
        [tag, b':', name @ ..] => EntryKind::from_tag(*tag).map(|kind| (kind, name)),
        _ => None,
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn copy_bytes(bytes: &[u8]) -> Result<Vec<u8>, TryReserveError> {
    let mut out = Vec::new();
    out.try_reserve_exact(bytes.len())?;
    out.extend_from_slice(bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn string(s: &str) -> Entry {
        Entry::String(s.as_bytes().to_vec())
    }

    // -----------------------------------------------------------------------
    // Scalars and strings
    // -----------------------------------------------------------------------

    #[test]
    fn integer_entry() {
        let table = parse_str("i:port\n14452\n\n").unwrap();
        assert_eq!(table.get("port"), Some(&Entry::Integer(14452)));
    }

    #[test]
    fn non_numeric_integer_is_zero() {
        let table = parse_str("i:x\nabc\n\n").unwrap();
        assert_eq!(table.get("x"), Some(&Entry::Integer(0)));
    }

    #[test]
    fn integer_keeps_first_value_line() {
        let table = parse_str("i:n\n12\n34\n\n").unwrap();
        assert_eq!(table.get("n"), Some(&Entry::Integer(12)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn integer_without_value_defaults_to_minus_one() {
        let table = parse_str("i:n\n\n").unwrap();
        assert_eq!(table.get("n"), Some(&Entry::Integer(-1)));
    }

    #[test]
    fn multi_line_string() {
        let table = parse_str("s:motd\nline1\nline2\n\n").unwrap();
        let motd = table.get("motd").unwrap();
        assert_eq!(motd, &string("line1\nline2"));
        assert_eq!(motd.as_bytes().unwrap().len(), 11);
    }

    #[test]
    fn string_keeps_inner_whitespace_lines() {
        let table = parse_str("s:art\n  *\n   \n  *\n\n").unwrap();
        assert_eq!(table.get("art"), Some(&string("  *\n   \n  *")));
    }

    #[test]
    fn crlf_line_endings() {
        let table = parse_str("s:host\r\nlocalhost\r\n\r\ni:port\r\n9\r\n").unwrap();
        assert_eq!(table.get("host"), Some(&string("localhost")));
        assert_eq!(table.get("port"), Some(&Entry::Integer(9)));
    }

    // -----------------------------------------------------------------------
    // Arrays
    // -----------------------------------------------------------------------

    #[test]
    fn array_mixed_types_preserve_order() {
        let table = parse_str("a:list\nfoo\ni:5\n\n").unwrap();
        assert_eq!(
            table.get("list"),
            Some(&Entry::Array(vec![string("foo"), Entry::Integer(5)]))
        );
    }

    #[test]
    fn array_explicit_string_prefix_is_stripped() {
        let table = parse_str("a:list\ns:i:7\nsx\n\n").unwrap();
        assert_eq!(
            table.get("list"),
            Some(&Entry::Array(vec![string("i:7"), string("sx")]))
        );
    }

    #[test]
    fn nested_array_is_rejected_with_line_number() {
        let err = parse_str("// header\na:bad\nok\na:nope\n\n").unwrap_err();
        assert!(matches!(err, ConfError::InvalidArray { line: 4 }));
    }

    #[test]
    fn empty_array() {
        let table = parse_str("a:none\n\n").unwrap();
        assert_eq!(table.get("none"), Some(&Entry::Array(Vec::new())));
    }

    // -----------------------------------------------------------------------
    // Comments and ignored lines
    // -----------------------------------------------------------------------

    #[test]
    fn line_and_block_comments() {
        let text = "// port\n/* start\ni:hidden\n1\n\n*/\ni:port\n2\n";
        let table = parse_str(text).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("port"), Some(&Entry::Integer(2)));
    }

    #[test]
    fn single_line_block_comment_stays_normal() {
        let mut parser = Parser::new();
        parser.feed_line(b"/* short */\n").unwrap();
        assert_eq!(parser.state(), ParseState::Normal);
        parser.feed_line(b"/* long\n").unwrap();
        assert_eq!(parser.state(), ParseState::InBlockComment);
        parser.feed_line(b"  */ not at start\n").unwrap();
        assert_eq!(parser.state(), ParseState::InBlockComment);
        parser.feed_line(b"*/\n").unwrap();
        assert_eq!(parser.state(), ParseState::Normal);
    }

    #[test]
    fn stray_lines_are_ignored() {
        let table = parse_str("hello\n   \nx:y\ni\n").unwrap();
        assert!(table.is_empty());
    }

    // -----------------------------------------------------------------------
    // Commit and displacement
    // -----------------------------------------------------------------------

    #[test]
    fn end_of_input_commits_pending_entry() {
        let table = parse_str("s:host\nexample.org").unwrap();
        assert_eq!(table.get("host"), Some(&string("example.org")));
    }

    #[test]
    fn declaration_inside_value_block_is_a_value_line() {
        let mut parser = Parser::new();
        for line in ["s:first\n", "one\n"] {
            parser.feed_line(line.as_bytes()).unwrap();
        }
        assert_eq!(parser.state(), ParseState::InValue);
        // In a value block a declaration is just a value line.
        parser.feed_line(b"s:second\n").unwrap();
        let table = parser.finish();
        assert_eq!(table.get("first"), Some(&string("one\ns:second")));

        // A declaration after an integer's value line starts a new entry.
        let table = parse_str("i:a\n1\ns:b\ntext\n\n").unwrap();
        assert_eq!(table.get("a"), Some(&Entry::Integer(1)));
        assert_eq!(table.get("b"), Some(&string("text")));
    }

    #[test]
    fn non_utf8_key_is_rejected() {
        let mut parser = Parser::new();
        parser.feed_line(b"i:ok\n").unwrap();
        parser.feed_line(b"1\n").unwrap();
        parser.feed_line(b"\n").unwrap();
        let err = parser.feed_line(b"i:\xff\n").unwrap_err();
        assert!(matches!(err, ConfError::InvalidKey { line: 4 }));

        // Distinct invalid keys must not collapse into one entry.
        let err = parse_reader(&b"i:\xff\n1\n\ni:\xfe\n2\n\n"[..]).unwrap_err();
        assert!(matches!(err, ConfError::InvalidKey { line: 1 }));
    }

    #[test]
    fn later_block_displaces_earlier_key() {
        let table = parse_str("i:port\n1\n\ns:port\nnamed\n\n").unwrap();
        assert_eq!(table.get("port"), Some(&string("named")));
    }

    #[test]
    fn keys_are_case_sensitive() {
        let table = parse_str("i:Port\n1\n\ni:port\n2\n\n").unwrap();
        assert_eq!(table.get("Port"), Some(&Entry::Integer(1)));
        assert_eq!(table.get("port"), Some(&Entry::Integer(2)));
    }

    // -----------------------------------------------------------------------
    // Numeric prefix parsing
    // -----------------------------------------------------------------------

    #[test]
    fn leading_int_follows_atoi() {
        assert_eq!(parse_leading_int(b"42"), 42);
        assert_eq!(parse_leading_int(b"  -17xyz"), -17);
        assert_eq!(parse_leading_int(b"+8"), 8);
        assert_eq!(parse_leading_int(b"x1"), 0);
        assert_eq!(parse_leading_int(b""), 0);
        assert_eq!(parse_leading_int(b"-"), 0);
        assert_eq!(parse_leading_int(b"99999999999999999999"), i64::MAX);
        assert_eq!(parse_leading_int(b"-99999999999999999999"), i64::MIN);
    }

    proptest! {
        #[test]
        fn leading_int_agrees_with_str_parse(n in any::<i64>(), suffix in "[a-z ]{0,4}") {
            let text = format!("{n}{suffix}");
            prop_assert_eq!(parse_leading_int(text.as_bytes()), n);
        }

        #[test]
        fn arbitrary_input_never_panics(lines in proptest::collection::vec(any::<Vec<u8>>(), 0..32)) {
            let mut parser = Parser::new();
            for line in &lines {
                if parser.feed_line(line).is_err() {
                    return Ok(());
                }
            }
            let _ = parser.finish();
        }
    }
}
