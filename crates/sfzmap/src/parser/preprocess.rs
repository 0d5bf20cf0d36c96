//! Macro preprocessor.
//!
//! Expands `#include`, `#define` and `$name` substitutions over raw SFZ text and
//! produces a list of [`SourceFragment`]s. Included files are not spliced into
//! the including text: the current fragment is closed after the directive, the
//! child's fragments follow, and a new fragment starts on the next line. This
//! keeps every fragment tied to a single file with an accurate starting line.

use std::collections::HashMap;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};

use crate::loader::SourceLoader;
use crate::parser::error::PreprocessError;
use crate::parser::path_utils::{lexical_normalize, normalize_path, parent_dir};
use crate::parser::types::SourceFragment;

type Result<T> = std::result::Result<T, PreprocessError>;

/// Macro name (sigil included) to replacement text.
pub type MacroBindings = HashMap<String, String>;

/// Maximum number of characters read after `#` to identify a directive.
pub const MACRO_NAME_LIMIT: usize = 20;

/// Maximum length, `$` included, of a substitution reference.
pub const SUBSTITUTION_WINDOW: usize = 50;

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// Settings for a preprocessing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessOptions {
    /// Directory used as the second include candidate. Defaults to the root
    /// file's parent directory.
    pub root_dir: Option<PathBuf>,
    /// Deepest allowed `#include` nesting.
    pub max_include_depth: usize,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            root_dir: None,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

/// Result of preprocessing a file and everything it includes.
#[derive(Debug, Clone, Default)]
pub struct Preprocessed {
    pub fragments: Vec<SourceFragment>,
    /// Every binding known at the end of the session, including those defined
    /// in included files.
    pub bindings: MacroBindings,
}

/// Preprocess a file loaded through `loader`.
pub fn preprocess_file(
    path: &Path,
    loader: &dyn SourceLoader,
    options: &PreprocessOptions,
) -> Result<Preprocessed> {
    let text = loader.load(path).map_err(|source| PreprocessError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let root_dir = options
        .root_dir
        .clone()
        .unwrap_or_else(|| parent_dir(path).to_path_buf());

    Preprocessor::new(loader, root_dir)
        .with_max_include_depth(options.max_include_depth)
        .process(&text, path, MacroBindings::new())
}

/// A preprocessing session.
///
/// The loader, root directory and depth limit are shared unchanged by every
/// recursive include; the per-file scan state lives in a separate scanner.
pub struct Preprocessor<'a> {
    loader: &'a dyn SourceLoader,
    root_dir: PathBuf,
    max_include_depth: usize,
}

impl<'a> Preprocessor<'a> {
    pub fn new(loader: &'a dyn SourceLoader, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            loader,
            root_dir: root_dir.into(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Preprocess `text`, which was read from `origin_path`.
    ///
    /// `bindings` are the macros visible at the start of the text. The
    /// returned bindings contain those plus everything defined in the text and
    /// in the files it includes.
    pub fn process(
        &self,
        text: &str,
        origin_path: &Path,
        bindings: MacroBindings,
    ) -> Result<Preprocessed> {
        let mut stack = Vec::new();
        self.process_nested(text, origin_path, bindings, &mut stack)
    }

    fn process_nested(
        &self,
        text: &str,
        origin_path: &Path,
        bindings: MacroBindings,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Preprocessed> {
        log::debug!(
            "Preprocessing {} ({} bindings inherited)",
            origin_path.display(),
            bindings.len()
        );

        stack.push(lexical_normalize(origin_path));
        let result = Scanner::new(self, stack, text, origin_path, bindings).run();
        stack.pop();
        result
    }
}

/// Per-file scan state.
struct Scanner<'s, 'a> {
    session: &'s Preprocessor<'a>,
    /// Files currently being expanded, outermost first.
    stack: &'s mut Vec<PathBuf>,
    chars: Vec<char>,
    origin: PathBuf,
    idx: usize,
    /// 0-based line of `chars[idx]`.
    line: usize,
    /// Index of the first character of the current line.
    line_start: usize,
    buffer: String,
    fragment_line: usize,
    fragments: Vec<SourceFragment>,
    bindings: MacroBindings,
}

impl<'s, 'a> Scanner<'s, 'a> {
    fn new(
        session: &'s Preprocessor<'a>,
        stack: &'s mut Vec<PathBuf>,
        text: &str,
        origin: &Path,
        bindings: MacroBindings,
    ) -> Self {
        Self {
            session,
            stack,
            chars: text.chars().collect(),
            origin: origin.to_path_buf(),
            idx: 0,
            line: 0,
            line_start: 0,
            buffer: String::with_capacity(text.len()),
            fragment_line: 0,
            fragments: Vec::new(),
            bindings,
        }
    }

    fn run(mut self) -> Result<Preprocessed> {
        while self.idx < self.chars.len() {
            match self.chars[self.idx] {
                '#' if self.at_line_start() => self.directive()?,
                '$' => self.substitute()?,
                _ => self.copy_char(),
            }
        }

        self.close_fragment();
        Ok(Preprocessed {
            fragments: self.fragments,
            bindings: self.bindings,
        })
    }

    /// Copy the character under the cursor to the output and advance.
    fn copy_char(&mut self) {
        let c = self.chars[self.idx];
        self.buffer.push(c);
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.line_start = self.idx;
        }
    }

    fn copy_until(&mut self, end: usize) {
        while self.idx < end {
            self.copy_char();
        }
    }

    /// Whether only whitespace precedes the cursor on the current line.
    fn at_line_start(&self) -> bool {
        self.chars[self.line_start..self.idx]
            .iter()
            .all(|c| c.is_whitespace())
    }

    fn close_fragment(&mut self) {
        if !self.buffer.is_empty() {
            let text = mem::take(&mut self.buffer);
            log::trace!(
                "Fragment of {} at line {}: {} chars",
                self.origin.display(),
                self.fragment_line,
                text.len()
            );
            self.fragments.push(SourceFragment::new(
                text,
                self.origin.clone(),
                self.fragment_line,
            ));
        }
        self.fragment_line = self.line;
    }

    fn skip_blanks(&self, mut i: usize) -> usize {
        while i < self.chars.len() && is_blank(self.chars[i]) {
            i += 1;
        }
        i
    }

    fn directive(&mut self) -> Result<()> {
        let start = self.idx;
        let mut end = start + 1;
        while end < self.chars.len()
            && end - start < MACRO_NAME_LIMIT
            && !self.chars[end].is_whitespace()
        {
            end += 1;
        }

        let name: String = self.chars[start..end].iter().collect();
        match name.as_str() {
            "#include" => self.include(end),
            "#define" => self.define(end),
            _ => Err(PreprocessError::UnknownMacro {
                name,
                path: self.origin.clone(),
                line: self.line + 1,
            }),
        }
    }

    fn include(&mut self, after_name: usize) -> Result<()> {
        let directive_line = self.line + 1;
        let malformed = |message: String| PreprocessError::MalformedInclude {
            message,
            path: self.origin.clone(),
            line: directive_line,
        };

        let mut i = self.skip_blanks(after_name);
        let quote = match self.chars.get(i) {
            Some(&c) if c == '"' || c == '\'' => c,
            Some(&c) if c != '\n' && c != '\r' => {
                return Err(malformed(format!(
                    "unexpected character '{}' before the include path",
                    c
                )))
            }
            _ => return Err(malformed("missing quoted include path".to_string())),
        };
        i += 1;

        let path_start = i;
        loop {
            match self.chars.get(i) {
                None => return Err(malformed("unterminated include path".to_string())),
                Some(&c) if c == quote => break,
                Some('\n') | Some('\r') => {
                    return Err(malformed("newline inside include path".to_string()))
                }
                Some('\t') => return Err(malformed("tab inside include path".to_string())),
                Some(_) => i += 1,
            }
        }
        let include_path: String = self.chars[path_start..i].iter().collect();
        if include_path.is_empty() {
            return Err(malformed("empty include path".to_string()));
        }
        i += 1;

        while i < self.chars.len() && self.chars[i] != '\n' {
            if !self.chars[i].is_whitespace() {
                return Err(malformed(format!(
                    "unexpected character '{}' after the include path",
                    self.chars[i]
                )));
            }
            i += 1;
        }
        if i < self.chars.len() {
            i += 1;
        }

        // The directive stays in the output; the included text does not.
        self.copy_until(i);
        self.close_fragment();

        let (target, text) = self.resolve_include(&include_path, directive_line)?;
        let identity = lexical_normalize(&target);
        if self.stack.contains(&identity) {
            return Err(PreprocessError::IncludeCycle {
                include: target,
                path: self.origin.clone(),
                line: directive_line,
            });
        }
        if self.stack.len() > self.session.max_include_depth {
            return Err(PreprocessError::IncludeDepth {
                limit: self.session.max_include_depth,
                path: self.origin.clone(),
                line: directive_line,
            });
        }

        log::debug!(
            "Including {} from {}:{}",
            target.display(),
            self.origin.display(),
            directive_line
        );
        let child = self.session.process_nested(
            &text,
            &target,
            self.bindings.clone(),
            self.stack,
        )?;
        self.bindings.extend(child.bindings);
        self.fragments.extend(child.fragments);
        Ok(())
    }

    /// Find an include target, first next to the including file, then below the
    /// session root directory.
    fn resolve_include(&self, include_path: &str, line: usize) -> Result<(PathBuf, String)> {
        let relative = normalize_path(include_path);
        let local = parent_dir(&self.origin).join(&relative);
        let rooted = self.session.root_dir.join(&relative);

        let mut candidates = vec![local];
        if lexical_normalize(&rooted) != lexical_normalize(&candidates[0]) {
            candidates.push(rooted);
        }

        for candidate in candidates {
            match self.session.loader.load(&candidate) {
                Ok(text) => return Ok((candidate, text)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    log::trace!("Include candidate {} not found", candidate.display());
                }
                Err(source) => {
                    return Err(PreprocessError::IncludeRead {
                        include: candidate,
                        path: self.origin.clone(),
                        line,
                        source,
                    })
                }
            }
        }

        Err(PreprocessError::IncludeNotFound {
            include: include_path.to_string(),
            path: self.origin.clone(),
            line,
        })
    }

    fn define(&mut self, after_name: usize) -> Result<()> {
        let directive_line = self.line + 1;
        let malformed = |message: String| PreprocessError::MalformedDefine {
            message,
            path: self.origin.clone(),
            line: directive_line,
        };

        let mut i = self.skip_blanks(after_name);
        match self.chars.get(i) {
            Some('$') => {}
            Some(&c) if !c.is_whitespace() => {
                return Err(malformed(format!(
                    "unexpected character '{}', expected $name",
                    c
                )))
            }
            _ => return Err(malformed("missing $name".to_string())),
        }

        let name_start = i;
        while i < self.chars.len() && !self.chars[i].is_whitespace() {
            i += 1;
        }
        let name: String = self.chars[name_start..i].iter().collect();
        if name.chars().count() < 2 {
            return Err(malformed("missing name after $".to_string()));
        }

        i = self.skip_blanks(i);
        match self.chars.get(i) {
            Some(&c) if !c.is_whitespace() => {}
            _ => return Err(malformed(format!("missing value for {}", name))),
        }

        let value_start = i;
        while i < self.chars.len() && !self.chars[i].is_whitespace() {
            i += 1;
        }
        let value: String = self.chars[value_start..i].iter().collect();

        log::trace!("#define {} {} ({}:{})", name, value, self.origin.display(), directive_line);
        self.bindings.insert(name, value);
        self.copy_until(i);
        Ok(())
    }

    /// Replace the longest known macro name starting at the cursor.
    fn substitute(&mut self) -> Result<()> {
        let start = self.idx;
        let mut end = start;
        while end < self.chars.len()
            && end - start < SUBSTITUTION_WINDOW
            && !self.chars[end].is_whitespace()
        {
            end += 1;
        }

        let mut candidate = String::new();
        let mut longest: Option<(usize, &String)> = None;
        for (offset, &c) in self.chars[start..end].iter().enumerate() {
            candidate.push(c);
            if let Some(value) = self.bindings.get(&candidate) {
                longest = Some((offset + 1, value));
            }
        }

        match longest {
            Some((len, value)) => {
                self.buffer.push_str(value);
                self.idx += len;
                Ok(())
            }
            None => Err(PreprocessError::UndefinedReference {
                reference: candidate,
                path: self.origin.clone(),
                line: self.line + 1,
            }),
        }
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}
