use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::ImportError;

/// Where an import reads its bytes from. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    Path(PathBuf),
    /// Anything of the form `scheme://rest`. `file://` URIs resolve to a path through [`SourceLocator::as_path`].
    Uri { scheme: String, uri: String },
}

impl SourceLocator {
    pub fn parse(raw: &str) -> Result<Self, ImportError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ImportError::EmptyLocator);
        }
        if let Some((scheme, _)) = trimmed.split_once("://") {
            let is_scheme = !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            // Single-letter schemes are Windows drive letters, not URIs.
            if is_scheme && scheme.len() > 1 {
                return Ok(SourceLocator::Uri { scheme: scheme.to_ascii_lowercase(), uri: trimmed.to_string() });
            }
        }
        Ok(SourceLocator::Path(PathBuf::from(trimmed)))
    }

    pub fn is_uri(&self) -> bool {
        matches!(self, SourceLocator::Uri { .. })
    }

    pub fn scheme(&self) -> Option<&str> {
        match self {
            SourceLocator::Path(_) => None,
            SourceLocator::Uri { scheme, .. } => Some(scheme),
        }
    }

    /// Filesystem path for plain paths and `file://` URIs.
    pub fn as_path(&self) -> Option<PathBuf> {
        match self {
            SourceLocator::Path(path) => Some(path.clone()),
            SourceLocator::Uri { scheme, uri } if scheme == "file" => {
                let rest = &uri["file://".len()..];
                let rest = rest.strip_prefix("localhost").unwrap_or(rest);
                Some(path_from_bytes(urlencoding::decode_binary(rest.as_bytes())))
            }
            SourceLocator::Uri { .. } => None,
        }
    }

    /// Directory relative buffer URIs resolve against.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.as_path().and_then(|path| path.parent().map(Path::to_path_buf))
    }

    /// Last path segment, used for footer text and log lines. URI segments are percent-decoded.
    pub fn display_name(&self) -> String {
        let full = self.to_string();
        let segment = full.rsplit(['/', '\\']).find(|segment| !segment.is_empty()).unwrap_or(&full);
        match self {
            SourceLocator::Path(_) => segment.to_string(),
            SourceLocator::Uri { .. } => {
                String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes())).into_owned()
            }
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Path(path) => write!(f, "{}", path.display()),
            SourceLocator::Uri { uri, .. } => f.write_str(uri),
        }
    }
}

#[cfg(unix)]
fn path_from_bytes(bytes: Cow<'_, [u8]>) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    PathBuf::from(OsStr::from_bytes(&bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Cow<'_, [u8]>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_locators() {
        assert_eq!(SourceLocator::parse(""), Err(ImportError::EmptyLocator));
        assert_eq!(SourceLocator::parse("   "), Err(ImportError::EmptyLocator));
    }

    #[test]
    fn classifies_paths_and_uris() {
        let path = SourceLocator::parse("models/duck.glb").expect("path");
        assert_eq!(path, SourceLocator::Path(PathBuf::from("models/duck.glb")));
        assert_eq!(path.base_dir(), Some(PathBuf::from("models")));

        let content = SourceLocator::parse("content://downloads/7").expect("uri");
        assert_eq!(content.scheme(), Some("content"));
        assert!(content.as_path().is_none());

        let drive = SourceLocator::parse("C://models/duck.glb").expect("drive path");
        assert!(!drive.is_uri());
    }

    #[test]
    fn file_uris_resolve_to_paths() {
        let locator = SourceLocator::parse("file:///tmp/my%20model.gltf").expect("file uri");
        assert_eq!(locator.as_path(), Some(PathBuf::from("/tmp/my model.gltf")));
        assert_eq!(locator.display_name(), "my model.gltf");
    }

    #[cfg(unix)]
    #[test]
    fn file_uris_keep_non_utf8_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let locator = SourceLocator::parse("file:///tmp/a%FFb.glb").expect("file uri");
        let path = locator.as_path().expect("file path");
        assert_eq!(path.as_os_str().as_bytes(), b"/tmp/a\xFFb.glb");
        assert_eq!(locator.base_dir(), Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn plain_paths_are_not_decoded() {
        let locator = SourceLocator::parse("models/100%25.glb").expect("path");
        assert_eq!(locator.as_path(), Some(PathBuf::from("models/100%25.glb")));
        assert_eq!(locator.display_name(), "100%25.glb");
    }
}
