use std::path::{Component, Path, PathBuf};

/// Normalize a path string based on the current operating system
///
/// SFZ files are frequently authored on Windows and use backslashes as
/// separators. This function handles cross-platform path normalization:
/// - On Windows: Keeps backslashes
/// - On other platforms: Converts backslashes to forward slashes
///
/// # Example
///
/// ```
/// use sfzmap::parser::path_utils::normalize_path;
///
/// let normalized = normalize_path("includes\\strings.sfz");
///
/// #[cfg(windows)]
/// assert_eq!(normalized, "includes\\strings.sfz");
///
/// #[cfg(not(windows))]
/// assert_eq!(normalized, "includes/strings.sfz");
/// ```
pub fn normalize_path(path: &str) -> String {
    if cfg!(windows) {
        path.to_string()
    } else {
        path.replace('\\', "/")
    }
}

/// Join a `default_path` opcode with a region's `sample` opcode.
///
/// The result is plain text meant for the serialized instrument map, so the
/// separators written by the instrument author are kept as they are:
/// - If `default_path` is empty, the sample path is returned unchanged
/// - If the sample path is absolute, it's used as-is
/// - Otherwise a separator is inserted unless `default_path` already ends
///   with one
///
/// # Example
///
/// ```
/// use sfzmap::parser::path_utils::join_sample_path;
///
/// assert_eq!(join_sample_path("samples/piano/", "C4.wav"), "samples/piano/C4.wav");
/// assert_eq!(join_sample_path("samples/piano", "C4.wav"), "samples/piano/C4.wav");
/// assert_eq!(join_sample_path("", "C4.wav"), "C4.wav");
/// ```
pub fn join_sample_path(default_path: &str, sample_path: &str) -> String {
    if default_path.is_empty() || Path::new(sample_path).is_absolute() {
        return sample_path.to_string();
    }

    let mut combined = default_path.to_string();
    if !combined.ends_with('/') && !combined.ends_with('\\') {
        combined.push('/');
    }
    combined.push_str(sample_path);
    combined
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// Used to give every included file a stable identity so that include cycles
/// are detected regardless of how the path was spelled.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Directory containing `path`, or the empty path for bare file names.
pub fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}
