use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

/// Ordered opcode set, as attached to a header or emitted for one note.
///
/// Insertion order follows the order in which opcodes appear in the SFZ text;
/// re-assigning a key keeps its original position and replaces the value.
pub type AttributeSet = IndexMap<String, Value>;

/// A contiguous slice of preprocessed text together with where it came from.
///
/// The preprocessor closes a fragment every time it expands an `#include`, so
/// that each fragment maps onto a single file and `starting_line` stays
/// accurate for diagnostics raised by the lexer and parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFragment {
    /// Preprocessed text, with `$name` substitutions already applied.
    pub text: String,
    /// File the text was read from.
    pub origin_path: PathBuf,
    /// 0-based line, within `origin_path`, of the first character of `text`.
    pub starting_line: usize,
}

impl SourceFragment {
    pub fn new(text: String, origin_path: PathBuf, starting_line: usize) -> Self {
        Self {
            text,
            origin_path,
            starting_line,
        }
    }

    /// Number of lines covered by this fragment.
    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }
}

/// An opcode value.
///
/// SFZ values are untyped text; the lexer classifies them by trying an integer
/// parse first, then a float parse, and falls back to the raw string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Classify raw opcode text.
    ///
    /// Numeric parsing ignores surrounding blanks, but a string value keeps
    /// the text exactly as written (`"myval "` stays `"myval "`).
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(int) = trimmed.parse::<i64>() {
            Value::Int(int)
        } else if let Ok(float) = trimmed.parse::<f64>() {
            Value::Float(float)
        } else {
            Value::String(raw.to_string())
        }
    }

    /// Integer view of the value; integral floats count, strings never do.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(int) => Some(*int),
            Value::Float(float) if float.fract() == 0.0 && float.is_finite() => Some(*float as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(int) => write!(f, "{}", int),
            Value::Float(float) => write!(f, "{}", float),
            Value::String(s) => f.write_str(s),
        }
    }
}

/// The kinds of tokens produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `// ...` up to the end of the line, slashes included.
    Comment(String),
    /// The `#include` keyword.
    Include(String),
    /// The `#define` keyword.
    Define(String),
    /// The `=` between a key and its value.
    Operator,
    /// A bracketed header tag such as `<region>`, brackets included.
    Header(String),
    /// The opcode name on the left of `=`.
    Key(String),
    /// An opcode value, include path or macro name/value.
    Value(Value),
}

impl TokenKind {
    /// Short name used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Comment(_) => "comment",
            TokenKind::Include(_) => "#include",
            TokenKind::Define(_) => "#define",
            TokenKind::Operator => "'='",
            TokenKind::Header(_) => "header",
            TokenKind::Key(_) => "key",
            TokenKind::Value(Value::Int(_)) => "integer value",
            TokenKind::Value(Value::Float(_)) => "float value",
            TokenKind::Value(Value::String(_)) => "string value",
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, TokenKind::Value(_))
    }
}

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    /// Column in characters, not bytes.
    pub column: usize,
    /// File the token was read from; shared by every token of a fragment.
    pub path: Arc<Path>,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize, path: Arc<Path>) -> Self {
        Self {
            kind,
            line,
            column,
            path,
        }
    }
}

/// SFZ header kinds.
///
/// Header tags are matched case-sensitively and must be spelled exactly as
/// `<region>`, `<group>` and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    /// `<region>`: one playable sample assignment.
    Region,
    /// `<group>`: a collection of regions, keyed by `group_label` in the output.
    Group,
    /// `<control>`: instrument-wide settings such as `default_path`.
    Control,
    Global,
    Curve,
    Effect,
    Master,
    Midi,
    Sample,
}

impl HeaderKind {
    pub const ALL: [HeaderKind; 9] = [
        HeaderKind::Region,
        HeaderKind::Group,
        HeaderKind::Control,
        HeaderKind::Global,
        HeaderKind::Curve,
        HeaderKind::Effect,
        HeaderKind::Master,
        HeaderKind::Midi,
        HeaderKind::Sample,
    ];

    /// Look up a header kind from its bracketed tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }

    /// The bracketed tag, as it appears in an SFZ file.
    pub fn tag(&self) -> &'static str {
        match self {
            HeaderKind::Region => "<region>",
            HeaderKind::Group => "<group>",
            HeaderKind::Control => "<control>",
            HeaderKind::Global => "<global>",
            HeaderKind::Curve => "<curve>",
            HeaderKind::Effect => "<effect>",
            HeaderKind::Master => "<master>",
            HeaderKind::Midi => "<midi>",
            HeaderKind::Sample => "<sample>",
        }
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A header and the opcodes that follow it up to the next header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
    /// `None` for opcodes written before the first header of the file.
    pub kind: Option<HeaderKind>,
    pub attributes: AttributeSet,
}

impl Header {
    pub fn new(kind: Option<HeaderKind>) -> Self {
        Self {
            kind,
            attributes: AttributeSet::new(),
        }
    }

    /// Set an opcode, replacing any earlier value for the same key.
    pub fn add_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Whether the header is worth emitting: it has a kind or carries opcodes.
    pub fn is_significant(&self) -> bool {
        self.kind.is_some() || !self.attributes.is_empty()
    }
}

/// An `#include` directive as seen by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Include {
    /// The path as written between the quotes.
    pub path: String,
    /// Directory of the file that contains the directive.
    pub context_path: PathBuf,
    full_path: PathBuf,
}

impl Include {
    pub fn new(path: impl Into<String>, context_path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let context_path = context_path.into();
        let full_path = context_path.join(&path);
        Self {
            path,
            context_path,
            full_path,
        }
    }

    /// `context_path` joined with `path`.
    pub fn full_path(&self) -> &Path {
        &self.full_path
    }
}

/// Parser output.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Header(Header),
    Include(Include),
}

impl Record {
    pub fn as_header(&self) -> Option<&Header> {
        match self {
            Record::Header(header) => Some(header),
            Record::Include(_) => None,
        }
    }
}
