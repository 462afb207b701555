//! Module paths and their manifest key encoding.

use serde::{Deserialize, Serialize};

/// Separator used when encoding a [`ModulePath`] as a manifest key.
///
/// Call names are restricted to identifier characters, so the separator can
/// never appear inside a segment.
pub const KEY_SEPARATOR: char = '.';

/// Position of a module in the dependency tree.
///
/// A path is the sequence of module call names leading from the root module
/// to the module in question. The empty path denotes the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    /// The path of the root module.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from its segments, outermost first.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Decode a manifest key back into a path. The empty key is the root.
    pub fn from_key(key: &str) -> Self {
        if key.is_empty() {
            return Self::root();
        }
        Self::new(key.split(KEY_SEPARATOR))
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments; zero for the root.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Return the path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The last segment, i.e. the call name of this module. `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Path of a child module called `name` declared inside this module.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    /// Path of the declaring module. `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    /// Encode the path as a manifest key.
    pub fn key(&self) -> String {
        self.0.join(&KEY_SEPARATOR.to_string())
    }

    /// Whether `s` is acceptable as a single path segment (a module call name).
    ///
    /// Segments start with an ASCII letter or underscore followed by ASCII
    /// alphanumerics, underscores or dashes.
    pub fn is_valid_segment(s: &str) -> bool {
        let mut chars = s.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

impl std::fmt::Display for ModulePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl From<&str> for ModulePath {
    fn from(key: &str) -> Self {
        Self::from_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_empty_key() {
        let root = ModulePath::root();
        assert!(root.is_root());
        assert_eq!(root.key(), "");
        assert_eq!(root.parent(), None);
        assert_eq!(ModulePath::from_key(""), root);
    }

    #[test]
    fn child_and_parent_are_inverse() {
        let path = ModulePath::root().child("network").child("subnets");
        assert_eq!(path.key(), "network.subnets");
        assert_eq!(path.depth(), 2);
        assert_eq!(path.name(), Some("subnets"));
        assert_eq!(path.parent(), Some(ModulePath::new(["network"])));
        assert_eq!(ModulePath::from_key("network.subnets"), path);
    }

    #[test]
    fn segment_validation() {
        assert!(ModulePath::is_valid_segment("vpc"));
        assert!(ModulePath::is_valid_segment("_private-2"));
        assert!(!ModulePath::is_valid_segment(""));
        assert!(!ModulePath::is_valid_segment("2fast"));
        assert!(!ModulePath::is_valid_segment("a.b"));
        assert!(!ModulePath::is_valid_segment("a/b"));
    }
}
