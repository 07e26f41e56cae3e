//! File-match hook used to decide whether the active file is sensitive.
//!
//! sceneguard doesn't care how patterns are interpreted (glob, regex,
//! exact names). The [`FileMatcher`] trait is the seam; the application
//! crate ships a glob-based implementation.

use std::path::Path;

/// Decides whether `path` is covered by `pattern`.
///
/// Called from inside the session task for every configured pattern on
/// every active-file change, so it should be cheap and must not block.
pub trait FileMatcher: Send + Sync + 'static {
    /// Returns `true` if `path` matches `pattern`.
    fn matches(&self, path: &Path, pattern: &str) -> bool;
}

/// Any plain function or closure with the right shape is a matcher.
impl<F> FileMatcher for F
where
    F: Fn(&Path, &str) -> bool + Send + Sync + 'static,
{
    fn matches(&self, path: &Path, pattern: &str) -> bool {
        self(path, pattern)
    }
}
