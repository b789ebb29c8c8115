//! Backend-relative path helpers.
//!
//! Every backend receives `/`-separated paths relative to its own root.
//! These helpers give all of them the same normalisation.

use crate::Error;

/// Normalise a backend-relative path.
///
/// Empty and `.` segments are dropped, `..` pops a segment. Climbing above
/// the root is rejected. The result has no leading or trailing slash; the
/// root itself is the empty string.
pub fn clean(path: &str) -> Result<String, Error> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::InvalidPath {
                        message: format!("{:?} escapes the backend root", path),
                    });
                }
            }
            segment => segments.push(segment),
        }
    }
    Ok(segments.join("/"))
}

/// Join a cleaned relative path onto a prefix, `/`-separated.
///
/// Either side may be empty. Slashes at the seam are collapsed; a leading
/// slash on `prefix` is kept.
pub fn join(prefix: &str, relative: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    match (prefix.is_empty(), relative.is_empty()) {
        (true, _) => relative.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, relative),
    }
}

/// Last segment of a cleaned path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
