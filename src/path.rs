//! Virtual and remote path handling.
//!
//! The adapter exposes a posix-style virtual tree rooted at `/`. Every
//! virtual path maps to exactly one absolute remote path underneath the
//! configured base collection, and listing results are mapped back. All
//! normalization is purely lexical — no remote round-trip is ever needed to
//! resolve a path.
//!
//! Paths are plain strings rather than [`std::path::PathBuf`]: separator,
//! case, and segment rules belong to the remote store, not to the caller's
//! platform.

use std::fmt;

use crate::FsError;

// ============================================================================
// VirtualPath
// ============================================================================

/// An absolute, normalized path in the virtual tree.
///
/// Construction normalizes the raw input: repeated separators collapse,
/// `.` segments vanish, `..` segments resolve against their parent, and a
/// trailing separator is dropped. Two `VirtualPath`s are equal iff their
/// normalized forms are equal.
///
/// A path whose `..` segments would climb above the root is rejected with
/// [`FsError::InvalidPath`] — this is the traversal guard that keeps every
/// operation inside the configured base collection, enforced before any
/// network access.
///
/// # Examples
///
/// ```rust
/// use datagrid_fs::VirtualPath;
///
/// let p = VirtualPath::new("/data//./samples/../runs")?;
/// assert_eq!(p.as_str(), "/data/runs");
///
/// assert!(VirtualPath::new("/../escape").is_err());
/// # Ok::<(), datagrid_fs::FsError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualPath(String);

impl VirtualPath {
    /// Normalize `raw` into an absolute virtual path.
    ///
    /// Relative input is interpreted against the virtual root, so `"a/b"`
    /// and `"/a/b"` name the same node.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidPath`] if `..` segments escape the virtual root
    pub fn new(raw: &str) -> Result<Self, FsError> {
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(FsError::InvalidPath {
                            path: raw.to_string(),
                            reason: "path escapes the virtual root".to_string(),
                        });
                    }
                }
                name => segments.push(name),
            }
        }
        if segments.is_empty() {
            return Ok(Self("/".to_string()));
        }
        let mut normalized = String::with_capacity(raw.len());
        for segment in &segments {
            normalized.push('/');
            normalized.push_str(segment);
        }
        Ok(Self(normalized))
    }

    /// The root path `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// The normalized path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for the virtual root `/`.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The final segment, or `"/"` for the root itself.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) if !self.is_root() => &self.0[idx + 1..],
            _ => "/",
        }
    }

    /// The containing path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Append one segment.
    ///
    /// Intended for names coming out of directory listings; the segment is
    /// taken verbatim.
    pub fn join(&self, segment: &str) -> Self {
        if self.is_root() {
            Self(format!("/{segment}"))
        } else {
            Self(format!("{}/{segment}", self.0))
        }
    }

    /// Every ancestor from the first segment down to the path itself.
    ///
    /// The root is not included. For `/a/b/c` this yields `/a`, `/a/b`,
    /// `/a/b/c` in that order.
    pub fn ancestors_from_root(&self) -> impl Iterator<Item = VirtualPath> + '_ {
        let path = &self.0;
        path.match_indices('/')
            .skip(1)
            .map(move |(idx, _)| Self(path[..idx].to_string()))
            .chain(if self.is_root() {
                None
            } else {
                Some(self.clone())
            })
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// GridPath
// ============================================================================

/// An absolute path in the remote store.
///
/// Nodes are identified by absolute remote path — there is no stable
/// surrogate id, and renames change identity. `GridPath`s are produced by
/// [`PathTranslator`] and consumed verbatim by the session protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridPath(String);

impl GridPath {
    /// Wrap an already-absolute remote path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The remote path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final segment of the remote path.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// A sibling path in the same remote collection.
    pub fn sibling(&self, name: &str) -> Self {
        match self.0.rfind('/') {
            Some(idx) => Self(format!("{}/{name}", &self.0[..idx])),
            None => Self(format!("/{name}")),
        }
    }
}

impl fmt::Display for GridPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// PathTranslator
// ============================================================================

/// Maps virtual paths to remote identifiers under a base collection.
///
/// The virtual root `/` maps to the configured base collection; everything
/// else hangs below it. [`from_remote`](Self::from_remote) rejects remote
/// identifiers outside the base collection so that nothing a listing or a
/// misconfigured store hands back can escape the intended subtree.
#[derive(Debug, Clone)]
pub struct PathTranslator {
    root: String,
}

impl PathTranslator {
    /// Create a translator rooted at `base`, itself normalized lexically.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidPath`] if `base` is not a well-formed absolute
    ///   collection path
    pub fn new(base: &str) -> Result<Self, FsError> {
        let normalized = VirtualPath::new(base)?;
        Ok(Self {
            root: if normalized.is_root() {
                String::new()
            } else {
                normalized.as_str().to_string()
            },
        })
    }

    /// The remote identifier for a virtual path.
    pub fn to_remote(&self, path: &VirtualPath) -> GridPath {
        if path.is_root() {
            if self.root.is_empty() {
                GridPath::new("/")
            } else {
                GridPath::new(self.root.clone())
            }
        } else {
            GridPath::new(format!("{}{}", self.root, path.as_str()))
        }
    }

    /// The virtual path for a remote identifier.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidPath`] if `remote` lies outside the base
    ///   collection
    pub fn from_remote(&self, remote: &GridPath) -> Result<VirtualPath, FsError> {
        let raw = remote.as_str();
        if self.root.is_empty() {
            return VirtualPath::new(raw);
        }
        if raw == self.root {
            return Ok(VirtualPath::root());
        }
        match raw.strip_prefix(&self.root) {
            Some(rest) if rest.starts_with('/') => VirtualPath::new(rest),
            _ => Err(FsError::InvalidPath {
                path: raw.to_string(),
                reason: "remote path lies outside the configured base collection".to_string(),
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_separators_and_dots() {
        let p = VirtualPath::new("/a//b/./c/").unwrap();
        assert_eq!(p.as_str(), "/a/b/c");
    }

    #[test]
    fn new_resolves_dotdot() {
        let p = VirtualPath::new("/a/b/../c").unwrap();
        assert_eq!(p.as_str(), "/a/c");
    }

    #[test]
    fn new_treats_relative_as_rooted() {
        assert_eq!(
            VirtualPath::new("a/b").unwrap(),
            VirtualPath::new("/a/b").unwrap()
        );
    }

    #[test]
    fn new_rejects_escape_above_root() {
        assert!(matches!(
            VirtualPath::new("/.."),
            Err(FsError::InvalidPath { .. })
        ));
        assert!(matches!(
            VirtualPath::new("/a/../../b"),
            Err(FsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn empty_and_slash_are_root() {
        assert!(VirtualPath::new("").unwrap().is_root());
        assert!(VirtualPath::new("/").unwrap().is_root());
        assert!(VirtualPath::new("/a/..").unwrap().is_root());
    }

    #[test]
    fn equality_is_normalized_equality() {
        let a = VirtualPath::new("/x/./y").unwrap();
        let b = VirtualPath::new("//x/y/").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn name_and_parent() {
        let p = VirtualPath::new("/a/b/c.txt").unwrap();
        assert_eq!(p.name(), "c.txt");
        assert_eq!(p.parent().unwrap().as_str(), "/a/b");
        assert_eq!(VirtualPath::root().name(), "/");
        assert!(VirtualPath::root().parent().is_none());
        assert_eq!(
            VirtualPath::new("/top").unwrap().parent().unwrap(),
            VirtualPath::root()
        );
    }

    #[test]
    fn ancestors_walk_top_down() {
        let p = VirtualPath::new("/a/b/c").unwrap();
        let all: Vec<String> = p
            .ancestors_from_root()
            .map(|a| a.as_str().to_string())
            .collect();
        assert_eq!(all, vec!["/a", "/a/b", "/a/b/c"]);
        assert_eq!(VirtualPath::root().ancestors_from_root().count(), 0);
    }

    #[test]
    fn translator_round_trip() {
        let t = PathTranslator::new("/zone/home/alice").unwrap();
        for raw in ["/", "/data", "/data/run1/out.bin"] {
            let p = VirtualPath::new(raw).unwrap();
            assert_eq!(t.from_remote(&t.to_remote(&p)).unwrap(), p);
        }
    }

    #[test]
    fn translator_maps_root_to_base() {
        let t = PathTranslator::new("/zone/home/alice").unwrap();
        assert_eq!(
            t.to_remote(&VirtualPath::root()).as_str(),
            "/zone/home/alice"
        );
        assert_eq!(
            t.to_remote(&VirtualPath::new("/x").unwrap()).as_str(),
            "/zone/home/alice/x"
        );
    }

    #[test]
    fn translator_rejects_outside_base() {
        let t = PathTranslator::new("/zone/home/alice").unwrap();
        for outside in ["/zone/home/bob/x", "/zone/home/alicex", "/other"] {
            assert!(matches!(
                t.from_remote(&GridPath::new(outside)),
                Err(FsError::InvalidPath { .. })
            ));
        }
    }

    #[test]
    fn translator_with_slash_base_is_identity() {
        let t = PathTranslator::new("/").unwrap();
        let p = VirtualPath::new("/a/b").unwrap();
        assert_eq!(t.to_remote(&p).as_str(), "/a/b");
        assert_eq!(t.from_remote(&GridPath::new("/a/b")).unwrap(), p);
    }

    #[test]
    fn grid_path_sibling_stays_in_collection() {
        let p = GridPath::new("/zone/data/file.bin");
        assert_eq!(p.sibling(".file.bin.wip").as_str(), "/zone/data/.file.bin.wip");
        assert_eq!(p.name(), "file.bin");
    }
}
