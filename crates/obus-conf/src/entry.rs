use serde::ser::{Serialize, SerializeSeq, Serializer};

/// The type tag of an [`Entry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A signed 64-bit integer.
    Integer,
    /// A byte string, possibly spanning several lines.
    String,
    /// An ordered list of nested entries.
    Array,
}

impl EntryKind {
    /// Map a declaration's type character (`i`, `s`, `a`) to a kind.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'i' => Some(Self::Integer),
            b's' => Some(Self::String),
            b'a' => Some(Self::Array),
            _ => None,
        }
    }

    /// The type character used for this kind in the file format.
    pub fn tag(self) -> char {
        match self {
            Self::Integer => 'i',
            Self::String => 's',
            Self::Array => 'a',
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::String => write!(f, "string"),
            Self::Array => write!(f, "array"),
        }
    }
}

/// A typed configuration value.
///
/// Array elements are owned by their array. Only top-level entries are
/// installed in a [`ConfigStore`](crate::ConfigStore) and reference counted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    Integer(i64),
    /// Raw bytes of the value. Multi-line values are joined with `\n`.
    String(Vec<u8>),
    Array(Vec<Entry>),
}

impl Entry {
    /// The value a declaration holds before any value line is read.
    pub fn empty(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Integer => Self::Integer(-1),
            EntryKind::String => Self::String(Vec::new()),
            EntryKind::Array => Self::Array(Vec::new()),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Integer(_) => EntryKind::Integer,
            Self::String(_) => EntryKind::String,
            Self::Array(_) => EntryKind::Array,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// The string payload as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The string payload, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn as_array(&self) -> Option<&[Entry]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::String(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Self::String(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes))?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}

// Strings serialize lossily: the format stores bytes, JSON needs text.
impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::String(bytes) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags() {
        for kind in [EntryKind::Integer, EntryKind::String, EntryKind::Array] {
            assert_eq!(EntryKind::from_tag(kind.tag() as u8), Some(kind));
        }
        assert_eq!(EntryKind::from_tag(b'x'), None);
        assert_eq!(EntryKind::from_tag(b'I'), None);
    }

    #[test]
    fn empty_defaults() {
        assert_eq!(Entry::empty(EntryKind::Integer), Entry::Integer(-1));
        assert_eq!(Entry::empty(EntryKind::String), Entry::String(Vec::new()));
        assert_eq!(Entry::empty(EntryKind::Array), Entry::Array(Vec::new()));
    }

    #[test]
    fn accessors_match_variant() {
        let int = Entry::Integer(14452);
        assert_eq!(int.kind(), EntryKind::Integer);
        assert_eq!(int.as_integer(), Some(14452));
        assert!(int.as_bytes().is_none());
        assert!(int.as_array().is_none());

        let text = Entry::String(b"line1\nline2".to_vec());
        assert_eq!(text.kind(), EntryKind::String);
        assert_eq!(text.as_str(), Some("line1\nline2"));
        assert_eq!(text.as_bytes().map(<[u8]>::len), Some(11));
        assert!(text.as_integer().is_none());

        let list = Entry::Array(vec![Entry::String(b"foo".to_vec()), Entry::Integer(5)]);
        assert_eq!(list.kind(), EntryKind::Array);
        assert_eq!(list.as_array().map(<[Entry]>::len), Some(2));
    }

    #[test]
    fn non_utf8_string_has_bytes_but_no_str() {
        let entry = Entry::String(vec![0xff, 0xfe]);
        assert!(entry.as_str().is_none());
        assert_eq!(entry.as_bytes(), Some(&[0xff, 0xfe][..]));
    }

    #[test]
    fn display() {
        assert_eq!(Entry::Integer(-3).to_string(), "-3");
        assert_eq!(Entry::String(b"hello".to_vec()).to_string(), "hello");
        let list = Entry::Array(vec![Entry::String(b"foo".to_vec()), Entry::Integer(5)]);
        assert_eq!(list.to_string(), "[\"foo\", 5]");
        assert_eq!(EntryKind::Array.to_string(), "array");
    }

    #[test]
    fn serializes_as_plain_json() {
        let list = Entry::Array(vec![Entry::String(b"foo".to_vec()), Entry::Integer(5)]);
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"["foo",5]"#);

        let kind = serde_json::to_string(&EntryKind::String).unwrap();
        assert_eq!(kind, r#""string""#);
    }
}
