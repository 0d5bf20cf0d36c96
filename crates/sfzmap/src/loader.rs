//! Source loading for the preprocessor.
//!
//! The compiler never touches the filesystem directly. Every file it needs,
//! the root file as well as each `#include` target, is requested through a
//! [`SourceLoader`]. A missing file is reported as
//! [`std::io::ErrorKind::NotFound`], which the preprocessor uses to fall back
//! from the directory-relative to the root-relative include candidate.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::parser::path_utils::lexical_normalize;

/// Loads the text of an SFZ file.
///
/// Closures of the form `Fn(&Path) -> io::Result<String>` implement this trait,
/// so callers can plug in their own storage without a wrapper type:
///
/// ```
/// use std::io;
/// use std::path::Path;
/// use sfzmap::SourceLoader;
///
/// let loader = |path: &Path| -> io::Result<String> {
///     if path.ends_with("piano.sfz") {
///         Ok("<region> sample=C4.wav pitch_keycenter=60".to_string())
///     } else {
///         Err(io::ErrorKind::NotFound.into())
///     }
/// };
/// assert!(loader.load(Path::new("piano.sfz")).is_ok());
/// ```
pub trait SourceLoader {
    fn load(&self, path: &Path) -> io::Result<String>;
}

impl<F> SourceLoader for F
where
    F: Fn(&Path) -> io::Result<String>,
{
    fn load(&self, path: &Path) -> io::Result<String> {
        self(path)
    }
}

/// Reads files from the local filesystem.
///
/// SFZ files in the wild are not always UTF-8; invalid sequences are replaced
/// rather than rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        let bytes = fs::read(path)?;
        log::trace!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Serves files from memory, keyed by their lexically normalized path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) {
        self.files
            .insert(lexical_normalize(path.as_ref()), contents.into());
    }

    /// Builder-style variant of [`MemoryLoader::insert`].
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(&lexical_normalize(path))
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} is not loaded", path.display()),
                )
            })
    }
}
