//! The remote store session protocol, as consumed by the adapter.
//!
//! The wire protocol itself is owned by a remote client library; this module
//! only pins down the surface the adapter needs: connecting, collection and
//! data-object operations, and chunkwise transfer handles. A concrete client
//! implements [`GridConnector`] and [`GridSession`]; the test suite ships an
//! in-memory implementation.
//!
//! Client-library failures do not cross this boundary as library types.
//! Implementations fold their own exception surface into the closed
//! [`GridError`] category set exactly once, and the adapter maps those
//! categories into the filesystem taxonomy ([`FsError`](crate::FsError)).
//!
//! # Thread Safety
//!
//! A session is stateful and owns server-side resources (open transfer
//! handles), so it is `Send` but deliberately not `Sync`: one session never
//! serves two operations at once. The pool enforces that by handing out
//! exclusive ownership.

use std::time::SystemTime;

use crate::GridPath;

// ============================================================================
// Error categories
// ============================================================================

/// Closed set of failure categories a store client can report.
///
/// `Disconnected` is the only connection-level category; everything else is
/// a store-level verdict about the requested operation. The distinction
/// drives the reconnect policy: a disconnected session is discarded and the
/// operation retried once, while store-level errors surface immediately.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// No node exists at the requested remote path.
    #[error("no such collection or data object")]
    NotFound,

    /// A node already occupies the destination remote path.
    #[error("target already exists")]
    AlreadyExists,

    /// A collection removal was refused because it still has children.
    #[error("collection is not empty")]
    NotEmpty,

    /// The store's ACL rejected the operation.
    #[error("access denied by the remote store")]
    AccessDenied,

    /// The credential was rejected at connect time. Never retried.
    #[error("authentication rejected")]
    AuthFailed,

    /// The store does not implement this operation (e.g. server-side copy
    /// or transfer seeking); the adapter falls back where it can.
    #[error("operation not supported by the remote store")]
    Unsupported,

    /// The session's connection is gone. The session must be discarded.
    #[error("connection lost: {0}")]
    Disconnected(String),

    /// Any other remote failure, carried verbatim.
    #[error("protocol error: {0}")]
    Protocol(String),
}

// ============================================================================
// Node descriptors
// ============================================================================

/// Whether a remote node is directory-like or file-like.
///
/// A node's kind is immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    /// Directory-equivalent: has children, no byte content.
    Collection,
    /// File-equivalent: byte content plus metadata.
    DataObject,
}

/// Raw metadata descriptor for one remote node, as the store reports it.
///
/// Optional fields are `None` either because the store has no value or
/// because the [`StatFields`] mask excluded them from the query.
#[derive(Debug, Clone)]
pub struct NodeStat {
    /// Absolute remote path of the node.
    pub path: GridPath,
    /// Collection or data object.
    pub kind: NodeKind,
    /// Byte size; collections report 0.
    pub size: u64,
    /// Creation time, when the store tracks it.
    pub created: Option<SystemTime>,
    /// Last modification time, when the store tracks it.
    pub modified: Option<SystemTime>,
    /// Content checksum, only when requested.
    pub checksum: Option<String>,
    /// Owning user, when the store tracks it.
    pub owner: Option<String>,
}

/// Which optional metadata fields a stat call should fetch.
///
/// Checksums can be expensive for the store to produce, so they are fetched
/// only on request. Times and ownership ride along with the basic query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatFields {
    /// Fetch the content checksum.
    pub checksum: bool,
}

impl StatFields {
    /// Name, kind, size, times, owner — no checksum.
    pub const BASIC: Self = Self { checksum: false };

    /// Everything the store can report, checksum included.
    pub const FULL: Self = Self { checksum: true };
}

/// Token for an open streaming transfer owned by one session.
///
/// Valid only against the session that issued it, and only until
/// [`GridSession::close_transfer`] is called for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(pub u64);

// ============================================================================
// Protocol traits
// ============================================================================

/// Opens authenticated sessions against one remote store.
///
/// Implementations carry whatever client-library state they need (TLS
/// settings, API handles); the adapter calls [`connect`](Self::connect)
/// lazily whenever the pool grows.
pub trait GridConnector: Send + Sync {
    /// Establish and authenticate a new session.
    ///
    /// # Errors
    ///
    /// - [`GridError::AuthFailed`] if the credential is rejected
    /// - [`GridError::Disconnected`] if the store is unreachable
    fn connect(&self, config: &crate::GridConfig) -> Result<Box<dyn GridSession>, GridError>;
}

/// One authenticated, stateful connection to the remote store.
///
/// All methods take `&mut self`: the caller owns the session exclusively
/// for the duration of a logical operation. Implementations apply the
/// configured per-call timeout to each method individually — a logical
/// adapter operation may legitimately span several calls.
pub trait GridSession: Send {
    /// Fetch a node descriptor, or `None` when nothing exists at `path`.
    ///
    /// Existence probing is a stat that returns `None`, not an error; the
    /// error channel is reserved for genuine failures.
    fn stat(&mut self, path: &GridPath, fields: StatFields)
    -> Result<Option<NodeStat>, GridError>;

    /// Immediate children of a collection, in store order.
    ///
    /// # Errors
    ///
    /// - [`GridError::NotFound`] if `path` does not exist or is not a
    ///   collection
    fn list(&mut self, path: &GridPath) -> Result<Vec<NodeStat>, GridError>;

    /// Create an empty collection; the parent must exist.
    fn create_collection(&mut self, path: &GridPath) -> Result<(), GridError>;

    /// Remove an empty collection.
    ///
    /// # Errors
    ///
    /// - [`GridError::NotEmpty`] if the collection still has children
    fn remove_collection(&mut self, path: &GridPath) -> Result<(), GridError>;

    /// Remove a data object.
    fn remove_object(&mut self, path: &GridPath) -> Result<(), GridError>;

    /// Atomically rename a node, collections and data objects alike.
    ///
    /// A single remote call even across collections — never copy+delete.
    ///
    /// # Errors
    ///
    /// - [`GridError::AlreadyExists`] if `to` is occupied
    fn rename(&mut self, from: &GridPath, to: &GridPath) -> Result<(), GridError>;

    /// Server-side copy of a data object, no bytes through the client.
    ///
    /// # Errors
    ///
    /// - [`GridError::Unsupported`] when the store cannot copy server-side;
    ///   the adapter then streams in chunks instead
    fn copy_object(&mut self, from: &GridPath, to: &GridPath) -> Result<(), GridError>;

    /// Open a data object for sequential reading from offset 0.
    fn open_read(&mut self, path: &GridPath) -> Result<TransferId, GridError>;

    /// Open a data object for writing, creating it if missing.
    ///
    /// With `append` the cursor starts at the current end; otherwise
    /// existing content is truncated.
    fn open_write(&mut self, path: &GridPath, append: bool) -> Result<TransferId, GridError>;

    /// Read the next chunk into `buf`, returning 0 at end of object.
    fn read_block(&mut self, transfer: TransferId, buf: &mut [u8]) -> Result<usize, GridError>;

    /// Append one chunk to an open write transfer.
    fn write_block(&mut self, transfer: TransferId, data: &[u8]) -> Result<(), GridError>;

    /// Reposition an open read transfer.
    ///
    /// # Errors
    ///
    /// - [`GridError::Unsupported`] when the store cannot service range
    ///   requests; the adapter then reopens and skips forward instead
    fn seek_transfer(&mut self, transfer: TransferId, pos: u64) -> Result<(), GridError>;

    /// Close a transfer handle, releasing its server-side resources.
    fn close_transfer(&mut self, transfer: TransferId) -> Result<(), GridError>;

    /// Tear the session down. Called once when the pool drops the session.
    fn close(&mut self);
}
