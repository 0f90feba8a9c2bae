//! Core value types for the adapter surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use crate::VirtualPath;
use crate::protocol::{NodeKind, NodeStat};

/// Immutable metadata snapshot for one remote node.
///
/// Built from a [`NodeStat`] at query time and never updated afterwards —
/// point-in-time semantics, staleness is expected and acceptable. Optional
/// fields are `None` when the store has no value or when the query's
/// [`StatFields`](crate::StatFields) mask excluded them.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Info {
    /// Virtual path of the node.
    pub path: VirtualPath,
    /// Final path segment (`"/"` for the virtual root).
    pub name: String,
    /// Collection or data object.
    pub kind: NodeKind,
    /// Byte size; collections report 0, never a recursive sum.
    pub size: u64,
    /// Creation time, when the store tracks it.
    #[cfg_attr(feature = "serde", serde(with = "opt_system_time_serde"))]
    pub created: Option<SystemTime>,
    /// Last modification time, when the store tracks it.
    #[cfg_attr(feature = "serde", serde(with = "opt_system_time_serde"))]
    pub modified: Option<SystemTime>,
    /// Content checksum, only when requested.
    pub checksum: Option<String>,
    /// Owning user, when the store tracks it.
    pub owner: Option<String>,
}

impl Info {
    /// Build a snapshot from a raw store descriptor and its virtual path.
    pub fn from_stat(stat: NodeStat, path: VirtualPath) -> Self {
        let name = path.name().to_string();
        Self {
            path,
            name,
            kind: stat.kind,
            size: match stat.kind {
                NodeKind::Collection => 0,
                NodeKind::DataObject => stat.size,
            },
            created: stat.created,
            modified: stat.modified,
            checksum: stat.checksum,
            owner: stat.owner,
        }
    }

    /// Returns `true` if this node is a data object.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::DataObject
    }

    /// Returns `true` if this node is a collection.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Collection
    }
}

/// How an object is opened for writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WriteMode {
    /// Replace any existing content; create the object if missing.
    Truncate,
    /// Keep existing content and write after it; create if missing.
    Append,
    /// Create the object; fail with already-exists if it is present.
    CreateNew,
}

/// How a collection is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RemoveMode {
    /// Remove only if the collection has no children.
    Empty,
    /// Delete the subtree depth-first, aggregating any failures.
    Recursive,
}

/// Cooperative cancellation flag for streaming transfers.
///
/// Cancellation is observed between chunks: once the flag is set, no
/// further chunk is issued. An already-issued remote call is never
/// preempted.
///
/// # Examples
///
/// ```rust
/// use datagrid_fs::CancelToken;
///
/// let token = CancelToken::new();
/// let shared = token.clone();
/// assert!(!shared.is_cancelled());
/// token.cancel();
/// assert!(shared.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Irrevocable.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Serde support for optional timestamps (when the serde feature is on).
#[cfg(feature = "serde")]
mod opt_system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        time.map(|t| {
            let d = t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
            (d.as_secs(), d.subsec_nanos())
        })
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parts: Option<(u64, u32)> = Deserialize::deserialize(deserializer)?;
        Ok(parts.map(|(secs, nanos)| UNIX_EPOCH + Duration::new(secs, nanos)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GridPath;

    fn stat(kind: NodeKind, size: u64) -> NodeStat {
        NodeStat {
            path: GridPath::new("/zone/home/x"),
            kind,
            size,
            created: None,
            modified: Some(SystemTime::UNIX_EPOCH),
            checksum: None,
            owner: Some("alice".into()),
        }
    }

    #[test]
    fn info_from_data_object() {
        let path = VirtualPath::new("/x").unwrap();
        let info = Info::from_stat(stat(NodeKind::DataObject, 42), path);
        assert!(info.is_file());
        assert!(!info.is_dir());
        assert_eq!(info.size, 42);
        assert_eq!(info.name, "x");
    }

    #[test]
    fn collection_size_is_zero() {
        let path = VirtualPath::new("/d").unwrap();
        let info = Info::from_stat(stat(NodeKind::Collection, 9000), path);
        assert!(info.is_dir());
        assert_eq!(info.size, 0);
    }

    #[test]
    fn root_info_name() {
        let info = Info::from_stat(stat(NodeKind::Collection, 0), VirtualPath::root());
        assert_eq!(info.name, "/");
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Info>();
        assert_send_sync::<WriteMode>();
        assert_send_sync::<RemoveMode>();
        assert_send_sync::<CancelToken>();
    }
}
