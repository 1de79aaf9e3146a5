//! Mrl handling.
//!
//! An mrl is a URI-shaped resource locator (`scheme://path`). The scheme
//! prefix is significant: it selects the filesystem factory, and the
//! `attachment://` scheme marks artwork that is only valid while the
//! decoder holds the file open.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A URI-shaped resource locator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mrl(String);

impl Mrl {
    pub fn new<S: Into<String>>(raw: S) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The scheme part, without the `://` separator.
    pub fn scheme(&self) -> Option<&str> {
        self.0.split_once("://").map(|(scheme, _)| scheme)
    }

    /// Whether the mrl carries the given scheme.
    pub fn scheme_is(&self, scheme: &str) -> bool {
        self.scheme() == Some(scheme)
    }

    /// Everything after the `scheme://` prefix, or the whole string when no
    /// scheme is present.
    pub fn strip_scheme(&self) -> &str {
        self.0
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.0)
    }

    /// The last path segment, still percent-encoded.
    pub fn file_name(&self) -> &str {
        self.strip_scheme()
            .rsplit('/')
            .next()
            .unwrap_or("")
    }

    /// The last path segment, percent-decoded.
    pub fn decoded_file_name(&self) -> String {
        urlencoding::decode(self.file_name())
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| self.file_name().to_string())
    }

    /// The mrl of the containing directory, trailing slash included.
    pub fn directory(&self) -> Mrl {
        match self.0.rfind('/') {
            Some(pos) => Mrl(self.0[..=pos].to_string()),
            None => Mrl(String::new()),
        }
    }
}

impl fmt::Display for Mrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Mrl {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for Mrl {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme() {
        let mrl = Mrl::new("file:///music/a/01.flac");
        assert_eq!(mrl.scheme(), Some("file"));
        assert!(mrl.scheme_is("file"));
        assert!(!mrl.scheme_is("smb"));
        assert_eq!(Mrl::new("/music/a.flac").scheme(), None);
    }

    #[test]
    fn test_file_name() {
        let mrl = Mrl::new("file:///music/a/01%20-%20Intro.flac");
        assert_eq!(mrl.file_name(), "01%20-%20Intro.flac");
        assert_eq!(mrl.decoded_file_name(), "01 - Intro.flac");
    }

    #[test]
    fn test_directory() {
        let mrl = Mrl::new("file:///music/a/01.flac");
        assert_eq!(mrl.directory(), Mrl::new("file:///music/a/"));
        assert_eq!(
            Mrl::new("file:///music/a/").directory(),
            Mrl::new("file:///music/a/")
        );
    }

    #[test]
    fn test_attachment_scheme() {
        let mrl = Mrl::new("attachment://cover.jpg");
        assert!(mrl.scheme_is("attachment"));
    }
}
