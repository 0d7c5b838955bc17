//! Per-commit path predicate
//!
//! A commit is retained when it touches at least one included prefix (or no
//! prefixes are included at all) and none of the excluded prefixes.

use std::path::{Path, PathBuf};

/// Inclusion/exclusion predicate over the paths a commit changes
///
/// Prefixes are anchored at the mirror root and compared component-wise,
/// so `src` matches `src/lib.rs` but not `src2/lib.rs`. Prefixes that do not
/// exist in the repository are legal and simply never match.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    included: Vec<PathBuf>,
    excluded: Vec<PathBuf>,
}

impl PathFilter {
    /// Build a filter anchored at `root` from repository-relative prefixes
    pub fn new<S: AsRef<str>>(root: &Path, included: &[S], excluded: &[S]) -> Self {
        let anchor = |prefixes: &[S]| {
            prefixes
                .iter()
                .map(|p| root.join(p.as_ref().trim_start_matches('/')))
                .collect::<Vec<_>>()
        };

        Self {
            root: root.to_path_buf(),
            included: anchor(included),
            excluded: anchor(excluded),
        }
    }

    /// A filter that retains every commit
    pub fn unrestricted(root: &Path) -> Self {
        Self::new::<&str>(root, &[], &[])
    }

    /// Whether this filter can reject anything at all
    pub fn is_unrestricted(&self) -> bool {
        self.included.is_empty() && self.excluded.is_empty()
    }

    /// Decide whether a commit with these changed paths is retained
    pub fn matches<P: AsRef<Path>>(&self, changed: &[P]) -> bool {
        let absolute: Vec<PathBuf> = changed.iter().map(|p| self.root.join(p)).collect();
        let touches = |prefixes: &[PathBuf]| {
            absolute
                .iter()
                .any(|file| prefixes.iter().any(|prefix| file.starts_with(prefix)))
        };

        let included = self.included.is_empty() || touches(&self.included);
        let excluded = !self.excluded.is_empty() && touches(&self.excluded);

        included && !excluded
    }
}
