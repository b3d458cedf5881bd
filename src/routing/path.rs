//! Path normalization and sanitization.
//!
//! # Responsibilities
//! - Produce the canonical form used in dispatch keys (collapse duplicate
//!   slashes, resolve `.` and `..`, single leading slash)
//! - Reject paths whose `..` segments would escape the root
//! - Substitute `/` for hostile request paths instead of matching them
//!
//! # Design Decisions
//! - Pure string work, no allocation beyond the output
//! - Registration treats traversal as an error; serving treats it as `/`
//!   plus a warning, so a fuzzer cannot crash dispatch

/// Canonicalize a path. Returns `None` when a `..` segment would climb
/// above the root; callers decide whether that is an error (registration)
/// or a substitution (request handling).
///
/// Trailing slashes are dropped except for the root itself, so `/users`
/// and `/users/` share one dispatch key.
pub fn normalize(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return None;
                }
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Some("/".to_string());
    }
    let mut out = String::with_capacity(path.len());
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    Some(out)
}

/// Normalize an inbound request path, substituting the root path for
/// anything that still tries to traverse after cleaning.
pub fn sanitize_request_path(path: &str) -> String {
    match normalize(path) {
        Some(clean) => clean,
        None => {
            tracing::warn!(path = %path, "Request path escapes root, substituting /");
            "/".to_string()
        }
    }
}

/// Join prefix segments into one path, tolerating missing or doubled
/// slashes at the seams. Empty parts are skipped.
pub fn join(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts {
        let trimmed = part.trim_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        out.push('/');
        out.push_str(trimmed);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain() {
        assert_eq!(normalize("/users"), Some("/users".to_string()));
        assert_eq!(normalize("/a/b/c"), Some("/a/b/c".to_string()));
    }

    #[test]
    fn test_normalize_dot_segments() {
        assert_eq!(normalize("/a/./b"), Some("/a/b".to_string()));
        assert_eq!(normalize("/a/b/../c"), Some("/a/c".to_string()));
        assert_eq!(normalize("/a/b/.."), Some("/a".to_string()));
    }

    #[test]
    fn test_normalize_duplicate_slashes() {
        assert_eq!(normalize("//a///b"), Some("/a/b".to_string()));
    }

    #[test]
    fn test_normalize_trailing_slash() {
        assert_eq!(normalize("/users/"), Some("/users".to_string()));
        assert_eq!(normalize("/"), Some("/".to_string()));
        assert_eq!(normalize(""), Some("/".to_string()));
    }

    #[test]
    fn test_normalize_missing_leading_slash() {
        assert_eq!(normalize("a/b"), Some("/a/b".to_string()));
    }

    #[test]
    fn test_normalize_rejects_escape() {
        assert_eq!(normalize("/.."), None);
        assert_eq!(normalize("/a/../../b"), None);
        assert_eq!(normalize("../etc/passwd"), None);
    }

    #[test]
    fn test_sanitize_substitutes_root() {
        assert_eq!(sanitize_request_path("/../../etc/passwd"), "/");
        assert_eq!(sanitize_request_path("/ok/path"), "/ok/path");
    }

    #[test]
    fn test_join() {
        assert_eq!(join(&["/api", "v1", "/users"]), "/api/v1/users");
        assert_eq!(join(&["", "", "/users/"]), "/users");
        assert_eq!(join(&["", ""]), "/");
    }
}
