//! SFZ front end.
//!
//! Text flows through three stages, each failing fast with a positioned error:
//!
//! 1. [`preprocess`] expands macros and includes into [`SourceFragment`]s
//! 2. [`lexer`] turns fragments into [`Token`]s
//! 3. [`parse`] validates the token stream and groups it into [`Record`]s

use std::path::Path;

mod error;
pub mod lexer;
pub mod parse;
pub mod path_utils;
pub mod preprocess;
mod types;

pub use error::{Error, LexError, LexErrorKind, ParseError, ParseErrorKind, PreprocessError};
pub use preprocess::{
    preprocess_file, MacroBindings, PreprocessOptions, Preprocessed, Preprocessor,
    DEFAULT_MAX_INCLUDE_DEPTH,
};
pub use types::{
    AttributeSet, Header, HeaderKind, Include, Record, SourceFragment, Token, TokenKind, Value,
};

use crate::loader::SourceLoader;

pub type Result<T> = std::result::Result<T, Error>;

/// Tokenize fragments in order into a single stream.
pub fn tokenize_fragments(fragments: &[SourceFragment]) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    for fragment in fragments {
        tokens.extend(lexer::tokenize(fragment)?);
    }
    Ok(tokens)
}

/// Parse SFZ text that was read from `origin`.
///
/// `origin` is used for diagnostics and to resolve includes, which are loaded
/// through `loader` relative to its directory.
pub fn parse_sfz_str(
    content: &str,
    origin: &Path,
    loader: &dyn SourceLoader,
) -> Result<Vec<Record>> {
    let root_dir = path_utils::parent_dir(origin);
    let preprocessed = Preprocessor::new(loader, root_dir).process(
        content,
        origin,
        MacroBindings::new(),
    )?;
    parse_fragments(&preprocessed.fragments)
}

/// Parse an SFZ file and everything it includes.
pub fn parse_sfz_file(
    path: &Path,
    loader: &dyn SourceLoader,
    options: &PreprocessOptions,
) -> Result<Vec<Record>> {
    let preprocessed = preprocess_file(path, loader, options)?;
    parse_fragments(&preprocessed.fragments)
}

fn parse_fragments(fragments: &[SourceFragment]) -> Result<Vec<Record>> {
    log::debug!("Lexing {} fragments", fragments.len());
    let tokens = tokenize_fragments(fragments)?;
    Ok(parse::parse(&tokens)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;

    #[test]
    fn test_errors_point_at_included_file() {
        let loader = MemoryLoader::new()
            .with_file("inst/main.sfz", "<control>\n#include \"sub.sfz\"\n<region> key=60\n")
            .with_file("inst/sub.sfz", "<group>\n\n<regoin>\n");

        let err = parse_sfz_file(
            Path::new("inst/main.sfz"),
            &loader,
            &PreprocessOptions::default(),
        )
        .unwrap_err();

        match err {
            Error::Parse(err) => {
                assert_eq!(err.kind, ParseErrorKind::BadHeader("<regoin>".to_string()));
                assert_eq!(err.path, Path::new("inst/sub.sfz"));
                assert_eq!(err.line, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_line_numbers_resume_after_include() {
        let loader = MemoryLoader::new().with_file("inst/sub.sfz", "<group>\n");

        let err = parse_sfz_str(
            "<control>\n#include \"sub.sfz\"\n\n= 1\n",
            Path::new("inst/main.sfz"),
            &loader,
        )
        .unwrap_err();

        match err {
            Error::Parse(err) => {
                assert_eq!(err.kind, ParseErrorKind::OperatorWithoutKey);
                assert_eq!(err.path, Path::new("inst/main.sfz"));
                assert_eq!(err.line, 4);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_lex_error_is_wrapped() {
        let loader = MemoryLoader::new();
        let err = parse_sfz_str("<region", Path::new("a.sfz"), &loader).unwrap_err();
        assert!(matches!(err, Error::Lex(_)));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_include_records_follow_fragments() {
        let loader = MemoryLoader::new().with_file("sub.sfz", "<region> pitch_keycenter=60\n");
        let records =
            parse_sfz_str("#include \"sub.sfz\"\n<group>", Path::new("main.sfz"), &loader).unwrap();

        assert!(matches!(records[0], Record::Include(_)));
        assert_eq!(records[1].as_header().and_then(|h| h.kind), Some(HeaderKind::Region));
        assert_eq!(records[2].as_header().and_then(|h| h.kind), Some(HeaderKind::Group));
    }
}
