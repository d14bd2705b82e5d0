// Resource addressing
// A resource is a local file path or a file:// URL; remote schemes are
// recognized so the controllers can reject them instead of misreading
// them as relative paths.

use std::path::{Path, PathBuf};
use url::Url;

/// An addressable audio asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    location: String,
}

impl Resource {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            location: path.as_ref().to_string_lossy().to_string(),
        }
    }

    /// The raw location string this resource was created with.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// True for locations with a non-file URL scheme (http, https, ...).
    pub fn is_remote(&self) -> bool {
        match Url::parse(&self.location) {
            // Single-letter schemes are Windows drive prefixes (C:\...)
            Ok(url) => url.scheme() != "file" && url.scheme().len() > 1,
            Err(_) => false,
        }
    }

    /// Resolve to a filesystem path, if this is a local resource.
    ///
    /// Accepts plain paths and file:// URLs. Remote locations return None.
    pub fn to_path(&self) -> Option<PathBuf> {
        if let Ok(url) = Url::parse(&self.location) {
            if url.scheme() == "file" {
                return url.to_file_path().ok();
            }
            if url.scheme().len() > 1 {
                return None;
            }
        }
        Some(PathBuf::from(&self.location))
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path() {
        let r = Resource::new("/music/track.flac");
        assert!(!r.is_remote());
        assert_eq!(r.to_path(), Some(PathBuf::from("/music/track.flac")));
    }

    #[test]
    fn test_relative_path() {
        let r = Resource::new("fixtures/tone.wav");
        assert!(!r.is_remote());
        assert_eq!(r.to_path(), Some(PathBuf::from("fixtures/tone.wav")));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_url() {
        let r = Resource::new("file:///music/track%20one.mp3");
        assert!(!r.is_remote());
        assert_eq!(r.to_path(), Some(PathBuf::from("/music/track one.mp3")));
    }

    #[test]
    fn test_remote_url() {
        let r = Resource::new("https://example.com/stream.mp3");
        assert!(r.is_remote());
        assert_eq!(r.to_path(), None);
    }

    #[test]
    fn test_from_path_round_trip() {
        let r = Resource::from_path(Path::new("/a/b.ogg"));
        assert_eq!(r.location(), "/a/b.ogg");
    }
}
