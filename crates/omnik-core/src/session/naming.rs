//! Helpers for session names and directory navigation.

use std::path::{Component, Path, PathBuf};

/// Turns a free-form session name into something usable as a directory name.
///
/// Spaces become `-`, anything outside `[A-Za-z0-9._-]` is dropped, an empty
/// result becomes `session`, and a leading `.` gets a `session-` prefix.
pub fn sanitize_session_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();

    if sanitized.is_empty() {
        "session".to_string()
    } else if sanitized.starts_with('.') {
        format!("session-{}", sanitized)
    } else {
        sanitized
    }
}

/// Resolves a `cd`-style `input` against `current`, lexically.
///
/// Absolute inputs replace `current`; `.` and `..` are folded without touching
/// the file system, and `..` never climbs above `/`.
pub fn resolve_working_dir(current: &Path, input: &str) -> PathBuf {
    let input = input.trim();
    let joined = if input.is_empty() {
        current.to_path_buf()
    } else {
        current.join(input)
    };

    let mut parts: Vec<String> = Vec::new();
    for component in joined.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    let mut resolved = PathBuf::from("/");
    resolved.extend(parts);
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_session_name() {
        assert_eq!(sanitize_session_name("my project"), "my-project");
        assert_eq!(sanitize_session_name("café/api!"), "cafapi");
        assert_eq!(sanitize_session_name("   "), "session");
        assert_eq!(sanitize_session_name("..."), "session-...");
        assert_eq!(sanitize_session_name("v1.2_final"), "v1.2_final");
    }

    #[test]
    fn test_resolve_relative_and_parent() {
        let current = Path::new("/workspace/api");
        assert_eq!(resolve_working_dir(current, "src"), PathBuf::from("/workspace/api/src"));
        assert_eq!(resolve_working_dir(current, ".."), PathBuf::from("/workspace"));
        assert_eq!(resolve_working_dir(current, "../web/./src"), PathBuf::from("/workspace/web/src"));
    }

    #[test]
    fn test_resolve_absolute_and_root() {
        let current = Path::new("/workspace/api");
        assert_eq!(resolve_working_dir(current, "/tmp"), PathBuf::from("/tmp"));
        assert_eq!(resolve_working_dir(current, "../../../.."), PathBuf::from("/"));
        assert_eq!(resolve_working_dir(current, ""), PathBuf::from("/workspace/api"));
    }
}
