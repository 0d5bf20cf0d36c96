use crate::parser::error::{ParseError, ParseErrorKind};
use crate::parser::path_utils::parent_dir;
use crate::parser::types::{Header, HeaderKind, Include, Record, Token, TokenKind, Value};

/// Result type alias for parser functions
type Result<T> = std::result::Result<T, ParseError>;

/// Parse a token stream into records
///
/// Validates the structure of the token stream and groups opcodes under the
/// header they follow.
///
/// # Grammar
///
/// ```text
/// <header>            // one of the nine known header tags
/// key = value         // Key, Operator, Value
/// #include "path"     // Include, Value
/// #define $name value // Define, Value (or Key), Value
/// ```
///
/// Comments are dropped. Opcodes written before the first header are kept in a
/// header without a kind, which is only emitted if it carries any opcode.
/// `#define` records are not emitted because the preprocessor has already
/// applied them; `#include` records are emitted in place, with the directory of
/// the including file as their context.
///
/// # Errors
///
/// The first structural problem aborts parsing:
///
/// 1. An unknown header tag
/// 2. A key not followed by `=`
/// 3. An `=` as the very first token, or not followed by a value
/// 4. A value that does not follow `=`, `#include` or `#define`
pub fn parse(tokens: &[Token]) -> Result<Vec<Record>> {
    let records = Parser::new(tokens).run()?;
    log::debug!("Parsed {} tokens into {} records", tokens.len(), records.len());
    Ok(records)
}

struct Parser<'a> {
    tokens: &'a [Token],
    current: Header,
    records: Vec<Record>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            current: Header::new(None),
            records: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Record>> {
        let tokens = self.tokens;
        for (i, token) in tokens.iter().enumerate() {
            match &token.kind {
                TokenKind::Comment(_) => {}
                TokenKind::Header(tag) => {
                    let kind = HeaderKind::from_tag(tag)
                        .ok_or_else(|| error(token, ParseErrorKind::BadHeader(tag.clone())))?;
                    self.open_header(kind);
                }
                TokenKind::Key(key) => self.check_key(i, key)?,
                TokenKind::Operator => {
                    if i == 0 {
                        return Err(error(token, ParseErrorKind::FloatingOperator));
                    }
                    if !self.kind_at(i + 1).map_or(false, TokenKind::is_value) {
                        return Err(error(token, ParseErrorKind::OperatorWithoutValue));
                    }
                }
                TokenKind::Include(_) => {
                    if !self.kind_at(i + 1).map_or(false, TokenKind::is_value) {
                        return Err(error(token, ParseErrorKind::IncludeWithoutPath));
                    }
                }
                TokenKind::Define(_) => self.check_define(i)?,
                TokenKind::Value(value) => self.value(i, token, value)?,
            }
        }

        self.close_header();
        Ok(self.records)
    }

    fn kind_at(&self, i: usize) -> Option<&'a TokenKind> {
        self.tokens.get(i).map(|t| &t.kind)
    }

    fn open_header(&mut self, kind: HeaderKind) {
        self.close_header();
        self.current = Header::new(Some(kind));
    }

    fn close_header(&mut self) {
        let header = std::mem::take(&mut self.current);
        if header.is_significant() {
            log::trace!(
                "{} with {} opcodes",
                header.kind.map_or("(no header)", |k| k.tag()),
                header.attributes.len()
            );
            self.records.push(Record::Header(header));
        }
    }

    fn check_key(&self, i: usize, key: &str) -> Result<()> {
        let token = &self.tokens[i];
        if i > 0 && matches!(self.kind_at(i - 1), Some(TokenKind::Define(_))) {
            return self.check_define_value(i, key);
        }
        match self.kind_at(i + 1) {
            Some(TokenKind::Operator) => Ok(()),
            _ => Err(error(token, ParseErrorKind::KeyWithoutOperator(key.to_string()))),
        }
    }

    fn check_define(&self, i: usize) -> Result<()> {
        match self.kind_at(i + 1) {
            Some(TokenKind::Key(_)) | Some(TokenKind::Value(_)) => Ok(()),
            _ => Err(error(&self.tokens[i], ParseErrorKind::DefineWithoutName)),
        }
    }

    /// The macro name at `i` must be followed by its value.
    fn check_define_value(&self, i: usize, name: &str) -> Result<()> {
        if self.kind_at(i + 1).map_or(false, TokenKind::is_value) {
            Ok(())
        } else {
            Err(error(
                &self.tokens[i],
                ParseErrorKind::DefineWithoutValue(name.to_string()),
            ))
        }
    }

    fn value(&mut self, i: usize, token: &Token, value: &Value) -> Result<()> {
        let prev = i.checked_sub(1).and_then(|j| self.kind_at(j));
        let prev2 = i.checked_sub(2).and_then(|j| self.kind_at(j));

        match (prev2, prev) {
            (_, Some(TokenKind::Include(_))) => {
                let include = Include::new(value.to_string(), parent_dir(&token.path));
                log::trace!("#include {}", include.full_path().display());
                self.records.push(Record::Include(include));
                Ok(())
            }
            (_, Some(TokenKind::Define(_))) => self.check_define_value(i, &value.to_string()),
            (Some(TokenKind::Define(_)), Some(TokenKind::Key(_) | TokenKind::Value(_))) => Ok(()),
            (Some(TokenKind::Key(key)), Some(TokenKind::Operator)) => {
                self.current.add_attribute(key.clone(), value.clone());
                Ok(())
            }
            // Only a key may name an attribute; `<region> = 1` is rejected.
            (_, Some(TokenKind::Operator)) => Err(error(token, ParseErrorKind::OperatorWithoutKey)),
            _ => Err(error(
                token,
                ParseErrorKind::UnexpectedValue(token.kind.describe()),
            )),
        }
    }
}

fn error(token: &Token, kind: ParseErrorKind) -> ParseError {
    ParseError {
        kind,
        path: token.path.to_path_buf(),
        line: token.line,
        column: token.column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::tokenize;
    use crate::parser::types::SourceFragment;
    use std::path::{Path, PathBuf};

    fn parse_text(text: &str) -> Result<Vec<Record>> {
        let fragment = SourceFragment::new(text.to_string(), PathBuf::from("inst/test.sfz"), 0);
        let tokens = tokenize(&fragment).expect("Failed to tokenize");
        parse(&tokens)
    }

    fn headers(records: &[Record]) -> Vec<&Header> {
        records.iter().filter_map(Record::as_header).collect()
    }

    #[test]
    fn test_parse_simple_sfz() {
        let content = r#"
        <control>
        default_path=samples/piano/

        <global>
        volume=0

        <region>
        sample=piano_C3.wav
        key=60
        "#;

        let records = parse_text(content).expect("Failed to parse SFZ");
        let headers = headers(&records);
        assert_eq!(headers.len(), 3);

        assert_eq!(headers[0].kind, Some(HeaderKind::Control));
        assert_eq!(
            headers[0].get("default_path"),
            Some(&Value::String("samples/piano/".to_string()))
        );
        assert_eq!(headers[1].kind, Some(HeaderKind::Global));
        assert_eq!(headers[1].get("volume"), Some(&Value::Int(0)));

        let region = headers[2];
        assert_eq!(region.kind, Some(HeaderKind::Region));
        assert_eq!(region.get("sample"), Some(&Value::String("piano_C3.wav".to_string())));
        assert_eq!(region.get("key"), Some(&Value::Int(60)));
    }

    #[test]
    fn test_last_header_is_emitted() {
        let records = parse_text("<group> group_label=pads\n<region> key=60").unwrap();
        let headers = headers(&records);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1].kind, Some(HeaderKind::Region));
    }

    #[test]
    fn test_opcodes_before_first_header() {
        let records = parse_text("volume=-3\n<region> key=60").unwrap();
        let headers = headers(&records);
        assert_eq!(headers[0].kind, None);
        assert_eq!(headers[0].get("volume"), Some(&Value::Int(-3)));

        let records = parse_text("// only a comment\n<region>").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_empty_headers_are_kept() {
        let records = parse_text("<control>\n<region>\n").unwrap();
        assert_eq!(headers(&records).len(), 2);
    }

    #[test]
    fn test_bad_header() {
        let err = parse_text("<region>\n  <regoin>").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::BadHeader("<regoin>".to_string()));
        assert_eq!((err.line, err.column), (2, 3));
        assert_eq!(err.path, PathBuf::from("inst/test.sfz"));
    }

    #[test]
    fn test_floating_operator() {
        let err = parse_text("= 5").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::FloatingOperator);
        assert_eq!(err.line, 1);
        assert!(err.to_string().contains("Floating operator ="));
    }

    #[test]
    fn test_operator_without_key() {
        let err = parse_text("<region>\n= 5").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::OperatorWithoutKey);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_operator_without_value() {
        let err = parse_text("<region> key=").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::OperatorWithoutValue);
    }

    #[test]
    fn test_key_without_operator() {
        let tokens = vec![Token::new(
            TokenKind::Key("key".to_string()),
            3,
            1,
            Path::new("a.sfz").into(),
        )];
        let err = parse(&tokens).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::KeyWithoutOperator("key".to_string()));
    }

    #[test]
    fn test_value_without_operator() {
        let path: std::sync::Arc<Path> = Path::new("a.sfz").into();
        let tokens = vec![
            Token::new(TokenKind::Header("<region>".to_string()), 1, 1, path.clone()),
            Token::new(TokenKind::Value(Value::Int(60)), 1, 10, path),
        ];
        let err = parse(&tokens).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedValue("integer value"));
        assert_eq!(err.column, 10);
    }

    #[test]
    fn test_include_record() {
        let records = parse_text("<control>\n#include \"parts/env.sfz\"\n<region> key=60").unwrap();
        assert_eq!(records.len(), 3);

        match &records[0] {
            Record::Include(include) => {
                assert_eq!(include.path, "parts/env.sfz");
                assert_eq!(include.context_path, PathBuf::from("inst"));
                assert_eq!(include.full_path(), Path::new("inst/parts/env.sfz"));
            }
            other => panic!("expected include, got {:?}", other),
        }
        assert_eq!(records[1].as_header().map(|h| h.kind), Some(Some(HeaderKind::Control)));
    }

    #[test]
    fn test_define_is_not_an_attribute() {
        let records = parse_text("<control>\n#define $vel 64\nkey=$vel").unwrap();
        let headers = headers(&records);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].attributes.len(), 1);
        assert_eq!(headers[0].get("key"), Some(&Value::String("$vel".to_string())));
    }

    #[test]
    fn test_define_accepts_key_name() {
        let path: std::sync::Arc<Path> = Path::new("a.sfz").into();
        let tokens = vec![
            Token::new(TokenKind::Define("#define".to_string()), 1, 1, path.clone()),
            Token::new(TokenKind::Key("$vel".to_string()), 1, 9, path.clone()),
            Token::new(TokenKind::Value(Value::Int(64)), 1, 14, path.clone()),
        ];
        assert!(parse(&tokens).unwrap().is_empty());

        let err = parse(&tokens[..2]).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DefineWithoutValue("$vel".to_string()));
    }

    #[test]
    fn test_define_without_name() {
        let path: std::sync::Arc<Path> = Path::new("a.sfz").into();
        let tokens = vec![
            Token::new(TokenKind::Define("#define".to_string()), 2, 1, path.clone()),
            Token::new(TokenKind::Header("<region>".to_string()), 3, 1, path),
        ];

        let err = parse(&tokens).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DefineWithoutName);
        assert_eq!(err.line, 2);
        assert!(err.to_string().contains("Missing macro name after #define"));
    }

    #[test]
    fn test_equals_sign_value() {
        let records = parse_text("<region> key==1").unwrap();
        let headers = headers(&records);
        assert_eq!(headers[0].get("key"), Some(&Value::String("=1".to_string())));
    }

    #[test]
    fn test_include_without_path() {
        let tokens = vec![Token::new(
            TokenKind::Include("#include".to_string()),
            1,
            1,
            Path::new("a.sfz").into(),
        )];
        assert_eq!(parse(&tokens).unwrap_err().kind, ParseErrorKind::IncludeWithoutPath);
    }
}
