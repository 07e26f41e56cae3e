//! Glob-based [`FileMatcher`].

use std::path::Path;

use glob::{MatchOptions, Pattern};
use sceneguard_session::FileMatcher;

/// Matches paths against shell-style glob patterns.
///
/// A pattern without a path separator (`.env`, `*.pem`) is matched
/// against the file name only, so it hits the file in any directory. A
/// pattern with a separator (`**/secrets/*`) is matched against the
/// whole path. Invalid patterns match their literal text.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobMatcher;

const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl FileMatcher for GlobMatcher {
    fn matches(&self, path: &Path, pattern: &str) -> bool {
        let whole_path = pattern.contains(['/', '\\']);
        let target = if whole_path {
            path.to_string_lossy()
        } else {
            match path.file_name() {
                Some(name) => name.to_string_lossy(),
                None => return false,
            }
        };

        match Pattern::new(pattern) {
            Ok(compiled) => compiled.matches_with(&target, OPTIONS),
            Err(error) => {
                tracing::debug!(pattern, %error, "invalid glob, matching literally");
                target == pattern
            }
        }
    }
}
