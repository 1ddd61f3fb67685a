//! Path and file name helpers.
//!
//! # Name normalization
//!
//! macOS stores file names in NFD (decomposed) form while Windows and Linux
//! usually produce NFC. The same visible name can therefore have different
//! bytes:
//!
//! - NFC: `café.txt` - 'é' is U+00E9 (single code point)
//! - NFD: `café.txt` - 'e' U+0065 + combining acute accent U+0301
//!
//! Name-aware grouping keys are built from the NFC form so both spellings
//! land in the same group.
//!
//! # Example
//!
//! ```
//! use dupestash::scanner::path_utils::normalize_name;
//!
//! assert_eq!(normalize_name("cafe\u{0301}.txt"), normalize_name("café.txt"));
//! ```

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Normalize a file name to NFC, borrowing when it is already normalized.
#[must_use]
pub fn normalize_name(name: &str) -> Cow<'_, str> {
    if unicode_normalization::is_nfc(name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(name.nfc().collect())
    }
}

/// Express `path` relative to `base` using forward slashes.
///
/// This is the form stored in the stash manifest so a manifest written on
/// one platform restores on another. Returns `None` if `path` is not inside
/// `base`, the relative part contains `..`, or a component cannot be stored
/// exactly: names that are not valid UTF-8 or contain a backslash.
///
/// # Example
///
/// ```
/// use dupestash::scanner::path_utils::relative_key;
/// use std::path::Path;
///
/// let key = relative_key(Path::new("/data/photos/a.jpg"), Path::new("/data"));
/// assert_eq!(key.as_deref(), Some("photos/a.jpg"));
/// assert!(relative_key(Path::new("/elsewhere/a.jpg"), Path::new("/data")).is_none());
/// ```
#[must_use]
pub fn relative_key(path: &Path, base: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().filter(|p| !p.contains('\\'))?;
                parts.push(part.to_owned());
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Turn a manifest key back into a path under `base`.
///
/// Rejects keys that would escape `base` (absolute paths or `..`).
#[must_use]
pub fn resolve_key(base: &Path, key: &str) -> Option<PathBuf> {
    let mut path = base.to_path_buf();
    let mut pushed = false;
    for part in key.split('/') {
        match part {
            "" | "." => {}
            ".." => return None,
            p if Path::new(p).is_absolute() || p.contains('\\') => return None,
            p => {
                path.push(p);
                pushed = true;
            }
        }
    }
    pushed.then_some(path)
}

/// Remove roots that live inside another root in the list.
///
/// Scanning a directory and one of its subdirectories would present the same
/// file twice and make it look like a duplicate of itself. Order of the
/// surviving roots is preserved.
#[must_use]
pub fn non_overlapping_roots(roots: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for root in roots {
        if result.iter().any(|kept| root.starts_with(kept)) {
            log::debug!("Dropping nested root {}", root.display());
            continue;
        }
        result.retain(|kept| {
            let nested = kept.starts_with(&root);
            if nested {
                log::debug!("Dropping nested root {}", kept.display());
            }
            !nested
        });
        result.push(root);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_nfc_borrowed() {
        let nfc = "café.txt";
        assert!(matches!(normalize_name(nfc), Cow::Borrowed(_)));
    }

    #[test]
    fn test_normalize_name_nfd_to_nfc() {
        let nfd = "re\u{0301}sume\u{0301}.txt";
        assert_eq!(normalize_name(nfd), "résumé.txt");
    }

    #[test]
    fn test_hangul_normalization() {
        assert_eq!(normalize_name("\u{1100}\u{1161}.txt"), "가.txt");
    }

    #[test]
    fn test_relative_key_nested() {
        let key = relative_key(Path::new("/root/a/b/c.txt"), Path::new("/root"));
        assert_eq!(key.as_deref(), Some("a/b/c.txt"));
    }

    #[test]
    fn test_relative_key_base_itself() {
        assert!(relative_key(Path::new("/root"), Path::new("/root")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_key_refuses_non_utf8_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new("/root/dir").join(OsStr::from_bytes(b"b\xff.bin"));
        assert!(relative_key(&path, Path::new("/root")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_key_refuses_backslash_name() {
        let path = Path::new("/root").join("a\\b.txt");
        assert!(relative_key(&path, Path::new("/root")).is_none());
    }

    #[test]
    fn test_resolve_key_round_trip() {
        let base = Path::new("/root");
        let key = relative_key(Path::new("/root/x/y.bin"), base).unwrap();
        assert_eq!(resolve_key(base, &key), Some(PathBuf::from("/root/x/y.bin")));
    }

    #[test]
    fn test_resolve_key_rejects_escape() {
        let base = Path::new("/root");
        assert!(resolve_key(base, "../etc/passwd").is_none());
        assert!(resolve_key(base, "a/../../b").is_none());
        assert!(resolve_key(base, "").is_none());
    }

    #[test]
    fn test_non_overlapping_no_overlap() {
        let roots = vec![
            PathBuf::from("/home/user/photos"),
            PathBuf::from("/home/user/docs"),
            PathBuf::from("/var/data"),
        ];
        assert_eq!(non_overlapping_roots(roots.clone()), roots);
    }

    #[test]
    fn test_non_overlapping_with_subdirectory() {
        let roots = vec![
            PathBuf::from("/home/user/docs"),
            PathBuf::from("/home/user"),
            PathBuf::from("/var/data"),
        ];
        let result = non_overlapping_roots(roots);
        assert_eq!(
            result,
            vec![PathBuf::from("/home/user"), PathBuf::from("/var/data")]
        );
    }

    #[test]
    fn test_non_overlapping_similar_prefix_kept() {
        // `/data2` is not inside `/data`
        let roots = vec![PathBuf::from("/data"), PathBuf::from("/data2")];
        assert_eq!(non_overlapping_roots(roots).len(), 2);
    }
}
