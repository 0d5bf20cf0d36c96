//! Line-oriented SFZ lexer.
//!
//! Tokens never span lines, so each line of a fragment is scanned on its own
//! by a [`LineLexer`] and the results are concatenated.
//!
//! # Unquoted values
//!
//! Values may contain spaces (`sample=Grand Piano C4.wav`), so the end of a
//! value is only known once the next `=` shows up. While scanning, the lexer
//! tracks the last word that started after a blank and was followed by a blank
//! or `=`. When an `=` is reached that word becomes the key, and whatever came
//! before it is flushed as the value of the previous key:
//!
//! ```text
//! sample=Grand Piano C4.wav key=60
//!        |-------value-----| |k|
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::parser::error::{LexError, LexErrorKind};
use crate::parser::types::{SourceFragment, Token, TokenKind, Value};

type Result<T> = std::result::Result<T, LexError>;

/// Tokenize every line of a fragment.
///
/// Line numbers start at `fragment.starting_line + 1`, and every token carries
/// `fragment.origin_path`.
pub fn tokenize(fragment: &SourceFragment) -> Result<Vec<Token>> {
    let path: Arc<Path> = Arc::from(fragment.origin_path.as_path());
    let mut tokens = Vec::new();

    for (offset, line) in fragment.text.split('\n').enumerate() {
        let line_no = fragment.starting_line + offset + 1;
        tokens.extend(tokenize_line(line, line_no, &path)?);
    }

    log::trace!(
        "Lexed {} tokens from {} (line {})",
        tokens.len(),
        fragment.origin_path.display(),
        fragment.starting_line + 1
    );
    Ok(tokens)
}

/// Tokenize a single line.
///
/// Anything after the first `\n` is ignored, as is a trailing `\r`.
pub fn tokenize_line(line: &str, line_no: usize, path: &Arc<Path>) -> Result<Vec<Token>> {
    let line = line.split('\n').next().unwrap_or("");
    let line = line.strip_suffix('\r').unwrap_or(line);
    LineLexer::new(line, line_no, path).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Accumulating a key or a value.
    Value,
    /// Just emitted `=`; skipping blanks before the value.
    Eq,
}

/// Scanner for one line of text.
pub struct LineLexer<'a> {
    chars: Vec<char>,
    idx: usize,
    line: usize,
    path: &'a Arc<Path>,
    tokens: Vec<Token>,
}

impl<'a> LineLexer<'a> {
    pub fn new(line: &str, line_no: usize, path: &'a Arc<Path>) -> Self {
        Self {
            chars: line.chars().collect(),
            idx: 0,
            line: line_no,
            path,
            tokens: Vec::new(),
        }
    }

    pub fn run(mut self) -> Result<Vec<Token>> {
        while self.idx < self.chars.len() {
            let c = self.chars[self.idx];
            if self.at_comment() {
                self.comment();
            } else if c == '<' {
                self.header()?;
            } else if c == '#' {
                self.directive()?;
            } else if is_blank(c) {
                self.idx += 1;
            } else {
                self.key_value();
            }
        }
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens
            .push(Token::new(kind, self.line, start + 1, Arc::clone(self.path)));
    }

    fn error(&self, kind: LexErrorKind, at: usize) -> LexError {
        LexError {
            kind,
            path: self.path.to_path_buf(),
            line: self.line,
            column: at + 1,
        }
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx + 1).copied()
    }

    fn at_comment(&self) -> bool {
        self.chars[self.idx] == '/' && self.peek() == Some('/')
    }

    fn skip_blanks(&mut self) {
        while self.idx < self.chars.len() && is_blank(self.chars[self.idx]) {
            self.idx += 1;
        }
    }

    /// Advance to the next whitespace and return the skipped text.
    fn word(&mut self) -> String {
        let start = self.idx;
        while self.idx < self.chars.len() && !self.chars[self.idx].is_whitespace() {
            self.idx += 1;
        }
        self.text(start, self.idx)
    }

    /// `//` to the end of the line.
    fn comment(&mut self) {
        let start = self.idx;
        let text = self.text(start, self.chars.len());
        self.idx = self.chars.len();
        self.push(TokenKind::Comment(text), start);
    }

    fn header(&mut self) -> Result<()> {
        let start = self.idx;
        match self.chars[start..].iter().position(|&c| c == '>') {
            Some(len) => {
                self.idx = start + len + 1;
                let tag = self.text(start, self.idx);
                self.push(TokenKind::Header(tag), start);
                Ok(())
            }
            None => Err(self.error(LexErrorKind::UnterminatedHeader, start)),
        }
    }

    fn directive(&mut self) -> Result<()> {
        let start = self.idx;
        let name = self.word();
        match name.as_str() {
            "#include" => {
                self.push(TokenKind::Include(name), start);
                self.include_path()?;
            }
            "#define" => {
                self.push(TokenKind::Define(name), start);
                self.define_body()?;
            }
            _ => return Err(self.error(LexErrorKind::UnrecognizedMacro(name), start)),
        }
        self.expect_line_end()
    }

    fn include_path(&mut self) -> Result<()> {
        self.skip_blanks();
        let quote_at = self.idx;
        let quote = match self.chars.get(quote_at) {
            Some(&c) if c == '"' || c == '\'' => c,
            _ => return Err(self.error(LexErrorKind::MissingIncludePath, quote_at)),
        };

        let path_start = quote_at + 1;
        match self.chars[path_start..].iter().position(|&c| c == quote) {
            Some(len) => {
                let path = self.text(path_start, path_start + len);
                self.idx = path_start + len + 1;
                self.push(TokenKind::Value(Value::String(path)), quote_at);
                Ok(())
            }
            None => Err(self.error(LexErrorKind::UnterminatedIncludePath, quote_at)),
        }
    }

    fn define_body(&mut self) -> Result<()> {
        self.skip_blanks();
        let name_at = self.idx;
        let name = self.word();
        if name.is_empty() {
            return Err(self.error(LexErrorKind::MissingDefineName, name_at));
        }
        if name.chars().count() < 2 {
            return Err(self.error(LexErrorKind::MacroNameTooShort(name), name_at));
        }

        self.skip_blanks();
        let value_at = self.idx;
        let value = self.word();
        if value.is_empty() {
            return Err(self.error(LexErrorKind::MissingDefineValue(name), value_at));
        }

        self.push(TokenKind::Value(Value::String(name)), name_at);
        self.push(TokenKind::Value(Value::classify(&value)), value_at);
        Ok(())
    }

    fn expect_line_end(&mut self) -> Result<()> {
        self.skip_blanks();
        if self.idx < self.chars.len() {
            let rest = self.text(self.idx, self.chars.len());
            return Err(self.error(LexErrorKind::TrailingText(rest), self.idx));
        }
        Ok(())
    }

    /// Scan `key=value` pairs up to the end of the line or a comment.
    fn key_value(&mut self) {
        let mut block_start = self.idx;
        let mut word_start = self.idx;
        let mut word_end = self.idx;
        let mut state = State::Value;

        while self.idx < self.chars.len() {
            let c = self.chars[self.idx];

            if self.at_comment() {
                if state == State::Value && block_start < self.idx {
                    self.value(block_start, self.idx);
                }
                self.comment();
                return;
            }

            if state == State::Eq {
                if is_blank(c) {
                    self.idx += 1;
                    continue;
                }
                // The first character of a value is taken as is, even `=`.
                state = State::Value;
                block_start = self.idx;
                word_start = self.idx;
                word_end = self.idx;
                self.idx += 1;
                continue;
            }

            let next = self.peek();
            if c == '=' {
                // Text before the key belongs to the previous key's value.
                if word_start > block_start + 1 {
                    self.value(block_start, word_start - 1);
                }
                if word_end > word_start {
                    let key = self.text(word_start, word_end);
                    self.push(TokenKind::Key(key), word_start);
                }
                self.push(TokenKind::Operator, self.idx);
                state = State::Eq;
            } else if is_blank(c) {
                if next.map_or(false, char::is_alphabetic) {
                    word_start = self.idx + 1;
                }
            } else if matches!(next, Some(' ' | '\t' | '=')) {
                word_end = self.idx + 1;
            }

            self.idx += 1;
        }

        if state == State::Value && block_start < self.chars.len() {
            self.value(block_start, self.chars.len());
        }
    }

    fn value(&mut self, start: usize, end: usize) {
        let raw = self.text(start, end);
        self.push(TokenKind::Value(Value::classify(&raw)), start);
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn lex(line: &str) -> Vec<Token> {
        let path: Arc<Path> = Arc::from(Path::new("/home/test/file.sfz"));
        tokenize_line(line, 6, &path).unwrap()
    }

    fn lex_err(line: &str) -> LexError {
        let path: Arc<Path> = Arc::from(Path::new("/home/test/file.sfz"));
        tokenize_line(line, 6, &path).unwrap_err()
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind.clone()).collect()
    }

    fn key(s: &str) -> TokenKind {
        TokenKind::Key(s.to_string())
    }

    fn string(s: &str) -> TokenKind {
        TokenKind::Value(Value::String(s.to_string()))
    }

    #[test]
    fn test_comment() {
        let tokens = lex("// This is a comment");
        assert_eq!(kinds(&tokens), vec![TokenKind::Comment("// This is a comment".to_string())]);

        let tokens = lex("// This is a comment\ngarbage");
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn test_header() {
        let tokens = lex("<region>");
        assert_eq!(kinds(&tokens), vec![TokenKind::Header("<region>".to_string())]);
        assert_eq!((tokens[0].line, tokens[0].column), (6, 1));
    }

    #[test]
    fn test_header_followed_by_opcode() {
        let tokens = lex("  <region>sample=a.wav");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Header("<region>".to_string()),
                key("sample"),
                TokenKind::Operator,
                string("a.wav"),
            ]
        );
        assert_eq!(tokens[0].column, 3);
        assert_eq!(tokens[1].column, 11);
    }

    #[test]
    fn test_unterminated_header() {
        let err = lex_err("  <region");
        assert_eq!(err.kind, LexErrorKind::UnterminatedHeader);
        assert_eq!((err.line, err.column), (6, 3));
        assert_eq!(err.path, PathBuf::from("/home/test/file.sfz"));
    }

    #[test]
    fn test_key_value() {
        let tokens = lex("mykey=myval");
        assert_eq!(kinds(&tokens), vec![key("mykey"), TokenKind::Operator, string("myval")]);

        let tokens = lex("mykey = myval");
        assert_eq!(kinds(&tokens), vec![key("mykey"), TokenKind::Operator, string("myval")]);
        let columns: Vec<usize> = tokens.iter().map(|t| t.column).collect();
        assert_eq!(columns, vec![1, 7, 9]);
    }

    #[test]
    fn test_two_pairs_on_one_line() {
        let tokens = lex("mykey = myval mykey2 = myval2");
        assert_eq!(
            kinds(&tokens),
            vec![
                key("mykey"),
                TokenKind::Operator,
                string("myval"),
                key("mykey2"),
                TokenKind::Operator,
                string("myval2"),
            ]
        );
    }

    #[test]
    fn test_value_before_comment_keeps_trailing_space() {
        let tokens = lex("mykey = myval // a comment here\n");
        assert_eq!(
            kinds(&tokens),
            vec![
                key("mykey"),
                TokenKind::Operator,
                string("myval "),
                TokenKind::Comment("// a comment here".to_string()),
            ]
        );

        let tokens = lex("mykey = myval mykey2 = myval2 // a comment here\n");
        assert_eq!(tokens.len(), 7);
        assert_eq!(tokens[2].kind, string("myval"));
        assert_eq!(tokens[5].kind, string("myval2 "));
    }

    #[test]
    fn test_value_with_spaces() {
        let tokens = lex("sample=Grand Piano C4.wav key=60");
        assert_eq!(
            kinds(&tokens),
            vec![
                key("sample"),
                TokenKind::Operator,
                string("Grand Piano C4.wav"),
                key("key"),
                TokenKind::Operator,
                TokenKind::Value(Value::Int(60)),
            ]
        );
    }

    #[test]
    fn test_numeric_values() {
        let tokens = lex("lokey=60 amp_veltrack=0.5 tune=-12");
        let values: Vec<TokenKind> = tokens
            .iter()
            .filter(|t| t.kind.is_value())
            .map(|t| t.kind.clone())
            .collect();
        assert_eq!(
            values,
            vec![
                TokenKind::Value(Value::Int(60)),
                TokenKind::Value(Value::Float(0.5)),
                TokenKind::Value(Value::Int(-12)),
            ]
        );
    }

    #[test]
    fn test_value_may_start_with_equals() {
        let tokens = lex("key==1");
        assert_eq!(kinds(&tokens), vec![key("key"), TokenKind::Operator, string("=1")]);

        let tokens = lex("a= =b c=2");
        assert_eq!(
            kinds(&tokens),
            vec![
                key("a"),
                TokenKind::Operator,
                string("=b"),
                key("c"),
                TokenKind::Operator,
                TokenKind::Value(Value::Int(2)),
            ]
        );
    }

    #[test]
    fn test_single_character_values() {
        let tokens = lex("a=1 b=2");
        assert_eq!(
            kinds(&tokens),
            vec![
                key("a"),
                TokenKind::Operator,
                TokenKind::Value(Value::Int(1)),
                key("b"),
                TokenKind::Operator,
                TokenKind::Value(Value::Int(2)),
            ]
        );
    }

    #[test]
    fn test_bare_operator() {
        let tokens = lex("= 5");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Operator, TokenKind::Value(Value::Int(5))]
        );
    }

    #[test]
    fn test_tabs_and_carriage_return() {
        let tokens = lex("\tkey\t=\t60\r");
        assert_eq!(
            kinds(&tokens),
            vec![key("key"), TokenKind::Operator, TokenKind::Value(Value::Int(60))]
        );
    }

    #[test]
    fn test_include() {
        let tokens = lex("#include \"myfile.sfz\"");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Include("#include".to_string()), string("myfile.sfz")]
        );
        assert_eq!(tokens[1].column, 10);

        let tokens = lex("#include  \t 'subdir/myfile.sfz'  ");
        assert_eq!(tokens[1].kind, string("subdir/myfile.sfz"));
    }

    #[test]
    fn test_include_errors() {
        assert_eq!(lex_err("#include myfile.sfz").kind, LexErrorKind::MissingIncludePath);
        assert_eq!(lex_err("#include").kind, LexErrorKind::MissingIncludePath);
        assert_eq!(lex_err("#include \"myfile.sfz").kind, LexErrorKind::UnterminatedIncludePath);
        assert_eq!(
            lex_err("#include \"a.sfz\" b").kind,
            LexErrorKind::TrailingText("b".to_string())
        );
    }

    #[test]
    fn test_define() {
        let tokens = lex("#define $mydef myval");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Define("#define".to_string()),
                string("$mydef"),
                string("myval"),
            ]
        );

        let tokens = lex("#define \t $a \t  2 \t ");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Define("#define".to_string()),
                string("$a"),
                TokenKind::Value(Value::Int(2)),
            ]
        );
    }

    #[test]
    fn test_define_errors() {
        assert_eq!(lex_err("#define").kind, LexErrorKind::MissingDefineName);
        assert_eq!(
            lex_err("#define $ 1").kind,
            LexErrorKind::MacroNameTooShort("$".to_string())
        );
        assert_eq!(
            lex_err("#define $a").kind,
            LexErrorKind::MissingDefineValue("$a".to_string())
        );
        assert_eq!(
            lex_err("#define $a 1 2").kind,
            LexErrorKind::TrailingText("2".to_string())
        );
    }

    #[test]
    fn test_unrecognized_macro() {
        let err = lex_err("#pragma once");
        assert_eq!(err.kind, LexErrorKind::UnrecognizedMacro("#pragma".to_string()));
        assert_eq!(err.column, 1);
    }

    #[test]
    fn test_tokenize_fragment_line_numbers() {
        let fragment = SourceFragment::new(
            "<group>\n\nkey=60\n".to_string(),
            PathBuf::from("inst/sub.sfz"),
            4,
        );
        let tokens = tokenize(&fragment).unwrap();

        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![5, 7, 7, 7]);
        assert!(tokens.iter().all(|t| &*t.path == Path::new("inst/sub.sfz")));
    }
}
