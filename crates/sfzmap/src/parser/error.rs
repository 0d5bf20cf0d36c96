use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Any error raised while compiling an SFZ file.
///
/// Every stage fails fast: there is no partial output, so callers either get
/// a complete instrument map or one of these. All messages carry the file path
/// and the 1-based line of the offending text.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors raised while expanding `#include`, `#define` and `$name` macros.
#[derive(Error, Debug)]
pub enum PreprocessError {
    /// The root file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A line starting with `#` that is neither `#include` nor `#define`.
    #[error("Unknown macro \"{name}\" in file {} at line {line}", .path.display())]
    UnknownMacro {
        name: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Malformed #include in file {} at line {line}: {message}", .path.display())]
    MalformedInclude {
        message: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Malformed #define in file {} at line {line}: {message}", .path.display())]
    MalformedDefine {
        message: String,
        path: PathBuf,
        line: usize,
    },

    /// A `$` that does not start any known macro name.
    #[error(
        "Could not find reference \"{reference}\" in the macro definition list in file {} at line {line}",
        .path.display()
    )]
    UndefinedReference {
        reference: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Include file \"{include}\" not found (included from {} at line {line})", .path.display())]
    IncludeNotFound {
        include: String,
        path: PathBuf,
        line: usize,
    },

    #[error(
        "Failed to read include file {} (included from {} at line {line}): {source}",
        .include.display(),
        .path.display()
    )]
    IncludeRead {
        include: PathBuf,
        path: PathBuf,
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error(
        "Include cycle: {} includes itself (from {} at line {line})",
        .include.display(),
        .path.display()
    )]
    IncludeCycle {
        include: PathBuf,
        path: PathBuf,
        line: usize,
    },

    #[error("Includes nested deeper than {limit} levels in file {} at line {line}", .path.display())]
    IncludeDepth {
        limit: usize,
        path: PathBuf,
        line: usize,
    },
}

/// A lexer error with its position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} in file {} at line {line}, column {column}", .path.display())]
pub struct LexError {
    pub kind: LexErrorKind,
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
}

/// The types of lexer errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    #[error("Unexpected end of line while parsing a header tag")]
    UnterminatedHeader,

    #[error("Unrecognized macro \"{0}\"")]
    UnrecognizedMacro(String),

    #[error("Missing quoted path after #include")]
    MissingIncludePath,

    #[error("Unterminated include path")]
    UnterminatedIncludePath,

    #[error("Missing macro name after #define")]
    MissingDefineName,

    #[error("Macro name \"{0}\" is too short")]
    MacroNameTooShort(String),

    #[error("Missing value after #define {0}")]
    MissingDefineValue(String),

    #[error("Unexpected trailing text \"{0}\" after macro")]
    TrailingText(String),
}

/// A structural error in the token stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} in file {} at line {line}, column {column}", .path.display())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
}

/// The types of parser errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("Bad header token \"{0}\"")]
    BadHeader(String),

    #[error("Floating operator =")]
    FloatingOperator,

    #[error("Bad key/value syntax: key \"{0}\" is not followed by '='")]
    KeyWithoutOperator(String),

    #[error("Bad key/value syntax: '=' is not followed by a value")]
    OperatorWithoutValue,

    #[error("Bad key/value syntax: '=' is not preceded by a key")]
    OperatorWithoutKey,

    #[error("Bad key/value syntax: macro name \"{0}\" is not followed by a value")]
    DefineWithoutValue(String),

    #[error("Missing macro name after #define")]
    DefineWithoutName,

    #[error("Missing path after #include")]
    IncludeWithoutPath,

    #[error("Bad key/value syntax: unexpected {0}")]
    UnexpectedValue(&'static str),
}
