//! Hidden-file rules
//!
//! A node counts as hidden when its name matches a configured filename,
//! extension, or regex pattern. The defaults hide dotfiles and common
//! build droppings; the explorer toggles whether hidden nodes are shown
//! without re-listing directories.

use crate::error::{FsError, FsResult};
use arbor_core::Settings;
use regex::Regex;
use std::collections::HashSet;

const DEFAULT_EXTENSIONS: &[&str] = &["o", "a", "obj", "pyc"];
const DEFAULT_PATTERNS: &[&str] = &["^\\."];

/// Name-based hiding rules
///
/// # Example
///
/// ```
/// use arbor_fs::HiddenRules;
///
/// let rules = HiddenRules::default();
/// assert!(rules.matches(".gitignore"));
/// assert!(rules.matches("main.o"));
/// assert!(!rules.matches("main.rs"));
/// ```
#[derive(Debug)]
pub struct HiddenRules {
    filenames: HashSet<String>,
    extensions: HashSet<String>,
    patterns: Vec<Regex>,
}

impl HiddenRules {
    /// Builds rules from explicit lists
    ///
    /// # Errors
    ///
    /// Returns `FsError::InvalidPattern` for the first pattern that
    /// fails to compile.
    pub fn new(
        filenames: Vec<String>,
        extensions: Vec<String>,
        patterns: Vec<String>,
    ) -> FsResult<Self> {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                Regex::new(&pattern).map_err(|source| FsError::InvalidPattern { pattern, source })
            })
            .collect::<FsResult<Vec<_>>>()?;
        Ok(HiddenRules {
            filenames: filenames.into_iter().collect(),
            extensions: extensions.into_iter().collect(),
            patterns,
        })
    }

    /// Builds rules from the `file.hidden.*` settings keys
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a malformed key or an invalid
    /// pattern; callers surface it once and fall back to
    /// [`HiddenRules::empty`].
    pub fn from_settings(settings: &Settings) -> FsResult<Self> {
        let filenames = settings.get_str_list("file.hidden.filenames", &[])?;
        let extensions = settings.get_str_list("file.hidden.extensions", DEFAULT_EXTENSIONS)?;
        let patterns = settings.get_str_list("file.hidden.patterns", DEFAULT_PATTERNS)?;
        HiddenRules::new(filenames, extensions, patterns)
    }

    /// Rules that match nothing
    pub fn empty() -> Self {
        HiddenRules {
            filenames: HashSet::new(),
            extensions: HashSet::new(),
            patterns: Vec::new(),
        }
    }

    /// True when a file name matches any rule
    pub fn matches(&self, name: &str) -> bool {
        if self.filenames.contains(name) {
            return true;
        }
        if let Some((_, ext)) = name.rsplit_once('.') {
            if !ext.is_empty() && self.extensions.contains(ext) {
                return true;
            }
        }
        self.patterns.iter().any(|p| p.is_match(name))
    }
}

impl Default for HiddenRules {
    /// Dotfiles plus `o`, `a`, `obj`, `pyc` extensions
    fn default() -> Self {
        let rules = HiddenRules::new(
            Vec::new(),
            DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect(),
        );
        match rules {
            Ok(rules) => rules,
            Err(_) => HiddenRules::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hides_dotfiles() {
        let rules = HiddenRules::default();
        assert!(rules.matches(".git"));
        assert!(rules.matches(".config"));
        assert!(!rules.matches("src"));
    }

    #[test]
    fn test_default_hides_object_extensions() {
        let rules = HiddenRules::default();
        assert!(rules.matches("libfoo.a"));
        assert!(rules.matches("cache.pyc"));
        assert!(!rules.matches("notes.txt"));
    }

    #[test]
    fn test_explicit_filename() {
        let rules =
            HiddenRules::new(vec!["node_modules".into()], vec![], vec![]).unwrap();
        assert!(rules.matches("node_modules"));
        assert!(!rules.matches("node_modules2"));
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let err = HiddenRules::new(vec![], vec![], vec!["[".into()]).unwrap_err();
        assert!(matches!(err, FsError::InvalidPattern { .. }));
    }

    #[test]
    fn test_extension_requires_dot() {
        let rules = HiddenRules::new(vec![], vec!["o".into()], vec![]).unwrap();
        assert!(rules.matches("main.o"));
        assert!(!rules.matches("o"));
        assert!(!rules.matches("mango"));
    }

    #[test]
    fn test_from_settings() {
        let settings =
            arbor_core::Settings::from_toml(r#"[file.hidden]
patterns = ["~$"]
extensions = []"#)
                .unwrap();
        let rules = HiddenRules::from_settings(&settings).unwrap();
        assert!(rules.matches("draft.txt~"));
        assert!(!rules.matches(".git"));
    }

    #[test]
    fn test_empty_matches_nothing() {
        let rules = HiddenRules::empty();
        assert!(!rules.matches(".anything"));
    }
}
