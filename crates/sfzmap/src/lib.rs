//! SFZ instrument compiler.
//!
//! This crate turns SFZ sampler instruments into a per-note instrument map:
//! - Macro preprocessing (`#include`, `#define`, `$name`) with file/line provenance
//! - A line-oriented lexer and a validating parser
//! - An instrument map builder that expands key ranges into tuned per-note entries
//!
//! # Architecture
//!
//! The crate never reads the filesystem on its own. The root file and every
//! include go through a [`SourceLoader`]; [`FsLoader`] reads from disk and
//! [`MemoryLoader`] serves files from memory.
//!
//! The resulting [`InstrumentMap`] maps each group label to 128 note slots and
//! serializes with serde, so it can be written as JSON or any other format.
//!
//! # Example
//!
//! ```ignore
//! use sfzmap::{compile_file, FsLoader, PreprocessOptions};
//!
//! let map = compile_file("piano/piano.sfz".as_ref(), &FsLoader, &PreprocessOptions::default())?;
//! for (label, slots) in map.iter() {
//!     println!("{}: {} notes", label, slots.occupied_notes().count());
//! }
//! let json = serde_json::to_string(&map)?;
//! ```

use std::path::Path;

pub mod builder;
pub mod loader;
pub mod parser;
pub mod types;

pub use builder::{build, note_number};
pub use loader::{FsLoader, MemoryLoader, SourceLoader};
pub use parser::{
    AttributeSet, Error, Header, HeaderKind, PreprocessOptions, Record, Result, Value,
};
pub use types::{InstrumentMap, NoteSlots, NOTE_COUNT};

/// Compile an SFZ file and its includes into an instrument map.
pub fn compile_file(
    path: &Path,
    loader: &dyn SourceLoader,
    options: &PreprocessOptions,
) -> Result<InstrumentMap> {
    log::debug!("Compiling {}", path.display());
    let records = parser::parse_sfz_file(path, loader, options)?;
    Ok(builder::build(&records))
}

/// Compile SFZ text read from `origin`.
pub fn compile_str(content: &str, origin: &Path, loader: &dyn SourceLoader) -> Result<InstrumentMap> {
    log::debug!("Compiling {} bytes from {}", content.len(), origin.display());
    let records = parser::parse_sfz_str(content, origin, loader)?;
    Ok(builder::build(&records))
}
