//! The filesystem facade over one remote store.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::config::GridConfig;
use crate::error::FsError;
use crate::path::{GridPath, PathTranslator, VirtualPath};
use crate::pool::{PooledSession, SessionPool};
use crate::protocol::{GridConnector, GridError, GridSession, NodeKind, StatFields};
use crate::stream::{ReadHandle, WriteHandle};
use crate::types::{Info, RemoveMode, WriteMode};

/// Filesystem adapter over a remote collection/data-object store.
///
/// Every method follows the same shape: validate the path, take a session
/// from the pool, run the remote exchange, map the result or error, give the
/// session back. Release is tied to guard scope, so it happens on every exit
/// path. A connection-level failure discards the dead session and retries
/// the operation once on a fresh one; authentication failures are never
/// retried.
///
/// Operations are synchronous. Callers on different threads proceed in
/// parallel up to the configured pool size and block on acquire beyond it.
///
/// # Examples
///
/// ```rust,ignore
/// use datagrid_fs::{GridConfig, GridFs, StatFields, WriteMode};
/// use std::io::Write;
///
/// let fs = GridFs::new(connector, GridConfig::default())?;
/// fs.makedir("/runs", false)?;
/// let mut out = fs.open_write("/runs/result.bin", WriteMode::CreateNew)?;
/// out.write_all(b"payload")?;
/// out.close()?;
/// assert_eq!(fs.getinfo("/runs/result.bin", StatFields::BASIC)?.size, 7);
/// ```
pub struct GridFs {
    pool: SessionPool,
    translator: PathTranslator,
    chunk_size: usize,
}

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling name a write is staged under until commit.
fn staging_name(target: &GridPath) -> GridPath {
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    target.sibling(&format!(
        ".{}.wip-{}-{}",
        target.name(),
        std::process::id(),
        seq
    ))
}

/// Unwrap an adapter error smuggled through `std::io::Error`, or wrap a
/// genuine I/O failure.
fn io_to_fs(err: io::Error, path: &VirtualPath, operation: &'static str) -> FsError {
    match err.downcast::<FsError>() {
        Ok(fs) => fs,
        Err(err) => FsError::OperationFailed {
            path: path.as_str().to_string(),
            operation,
            details: err.to_string(),
        },
    }
}

/// Chunked client-side copy between two objects on one session.
///
/// Fallback for stores without server-side copy. Runs both transfers over
/// the same session, so it never needs a second pool slot.
fn stream_copy(
    session: &mut dyn GridSession,
    from: &GridPath,
    to: &GridPath,
    chunk_size: usize,
) -> Result<(), GridError> {
    let read = session.open_read(from)?;
    let write = match session.open_write(to, false) {
        Ok(write) => write,
        Err(err) => {
            let _ = session.close_transfer(read);
            return Err(err);
        }
    };
    let mut buf = vec![0u8; chunk_size];
    let mut result = Ok(());
    loop {
        match session.read_block(read, &mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(err) = session.write_block(write, &buf[..n]) {
                    result = Err(err);
                    break;
                }
            }
            Err(err) => {
                result = Err(err);
                break;
            }
        }
    }
    let closed_read = session.close_transfer(read);
    let closed_write = session.close_transfer(write);
    result.and(closed_read).and(closed_write)
}

/// Depth-first removal that keeps going past individual failures.
///
/// Connection loss aborts the walk (the caller retries the whole
/// operation); every other per-node failure lands in `failed`.
fn remove_tree(
    session: &mut dyn GridSession,
    remote: &GridPath,
    translator: &PathTranslator,
    failed: &mut Vec<String>,
) -> Result<(), GridError> {
    let children = match session.list(remote) {
        Ok(children) => children,
        Err(err @ GridError::Disconnected(_)) => return Err(err),
        Err(_) => {
            failed.push(display_path(translator, remote));
            return Ok(());
        }
    };
    for child in children {
        match child.kind {
            NodeKind::Collection => remove_tree(session, &child.path, translator, failed)?,
            NodeKind::DataObject => match session.remove_object(&child.path) {
                Ok(()) => {}
                Err(err @ GridError::Disconnected(_)) => return Err(err),
                Err(_) => failed.push(display_path(translator, &child.path)),
            },
        }
    }
    match session.remove_collection(remote) {
        Ok(()) => Ok(()),
        Err(err @ GridError::Disconnected(_)) => Err(err),
        Err(_) => {
            failed.push(display_path(translator, remote));
            Ok(())
        }
    }
}

fn display_path(translator: &PathTranslator, remote: &GridPath) -> String {
    translator
        .from_remote(remote)
        .map(|v| v.as_str().to_string())
        .unwrap_or_else(|_| remote.as_str().to_string())
}

impl GridFs {
    /// Create an adapter for one store.
    ///
    /// No session is opened yet — connections happen lazily on first use.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidPath`] if `config.root` is not a well-formed
    ///   collection path
    pub fn new(connector: impl GridConnector + 'static, config: GridConfig) -> Result<Self, FsError> {
        let translator = PathTranslator::new(&config.root)?;
        let chunk_size = config.chunk_size.max(1);
        let pool = SessionPool::new(Box::new(connector), config);
        Ok(Self {
            pool,
            translator,
            chunk_size,
        })
    }

    /// The configuration this adapter connects with.
    pub fn config(&self) -> &GridConfig {
        self.pool.config()
    }

    /// Shut the session pool down. Idempotent; later operations fail.
    pub fn close(&self) {
        self.pool.shutdown();
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Metadata snapshot for the node at `path`.
    ///
    /// Only the fields selected by `fields` are fetched; the checksum in
    /// particular costs the store a content scan and is skipped unless
    /// requested.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if nothing exists at `path`
    pub fn getinfo(&self, path: &str, fields: StatFields) -> Result<Info, FsError> {
        let vpath = VirtualPath::new(path)?;
        let remote = self.translator.to_remote(&vpath);
        self.with_session("getinfo", &vpath, |s| {
            Ok(match s.stat(&remote, fields)? {
                Some(node) => Ok(Info::from_stat(node, vpath.clone())),
                None => Err(FsError::NotFound {
                    path: vpath.as_str().to_string(),
                }),
            })
        })?
    }

    /// Whether a node exists at `path`.
    ///
    /// Exactly the not-found case is caught and turned into `false`; every
    /// other failure still surfaces as an error.
    pub fn exists(&self, path: &str) -> Result<bool, FsError> {
        match self.getinfo(path, StatFields::BASIC) {
            Ok(_) => Ok(true),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Whether `path` names a collection.
    pub fn is_dir(&self, path: &str) -> Result<bool, FsError> {
        match self.getinfo(path, StatFields::BASIC) {
            Ok(info) => Ok(info.is_dir()),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Whether `path` names a data object.
    pub fn is_file(&self, path: &str) -> Result<bool, FsError> {
        match self.getinfo(path, StatFields::BASIC) {
            Ok(info) => Ok(info.is_file()),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Immediate children of a collection, non-recursive.
    ///
    /// Entry order is whatever the store returns and is not guaranteed
    /// stable across calls; sort client-side when determinism matters.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `path` does not exist
    /// - [`FsError::NotADirectory`] if `path` is a data object
    pub fn listdir(&self, path: &str) -> Result<Vec<Info>, FsError> {
        let vpath = VirtualPath::new(path)?;
        let remote = self.translator.to_remote(&vpath);
        let entries = self.with_session("listdir", &vpath, |s| {
            Ok(match s.stat(&remote, StatFields::BASIC)? {
                None => Err(FsError::NotFound {
                    path: vpath.as_str().to_string(),
                }),
                Some(node) if node.kind == NodeKind::DataObject => Err(FsError::NotADirectory {
                    path: vpath.as_str().to_string(),
                }),
                Some(_) => Ok(s.list(&remote)?),
            })
        })??;
        entries
            .into_iter()
            .map(|stat| {
                let child = self.translator.from_remote(&stat.path)?;
                Ok(Info::from_stat(stat, child))
            })
            .collect()
    }

    /// Validate that `path` exists, then report that the store has no
    /// client-writable metadata.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `path` does not exist
    /// - [`FsError::Unsupported`] otherwise
    pub fn setinfo(&self, path: &str) -> Result<(), FsError> {
        let vpath = VirtualPath::new(path)?;
        if !self.exists(vpath.as_str())? {
            return Err(FsError::NotFound {
                path: vpath.as_str().to_string(),
            });
        }
        Err(FsError::Unsupported {
            operation: "setinfo",
        })
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    /// Create a collection.
    ///
    /// Without `recursive` the parent must already exist; with it, every
    /// missing intermediate is created first. The leaf colliding with an
    /// existing node is an error either way.
    ///
    /// # Errors
    ///
    /// - [`FsError::AlreadyExists`] if `path` already exists
    /// - [`FsError::NotFound`] if the parent is missing and `recursive` is
    ///   false
    /// - [`FsError::NotADirectory`] if an ancestor is a data object
    pub fn makedir(&self, path: &str, recursive: bool) -> Result<(), FsError> {
        let vpath = VirtualPath::new(path)?;
        if vpath.is_root() {
            return Err(FsError::AlreadyExists {
                path: vpath.as_str().to_string(),
                operation: "makedir",
            });
        }
        let remote = self.translator.to_remote(&vpath);
        self.with_session("makedir", &vpath, |s| {
            if s.stat(&remote, StatFields::BASIC)?.is_some() {
                return Ok(Err(FsError::AlreadyExists {
                    path: vpath.as_str().to_string(),
                    operation: "makedir",
                }));
            }
            if recursive {
                for ancestor in vpath.ancestors_from_root() {
                    let ancestor_remote = self.translator.to_remote(&ancestor);
                    match s.stat(&ancestor_remote, StatFields::BASIC)? {
                        Some(node) if node.kind == NodeKind::DataObject => {
                            return Ok(Err(FsError::NotADirectory {
                                path: ancestor.as_str().to_string(),
                            }));
                        }
                        Some(_) => {}
                        None => match s.create_collection(&ancestor_remote) {
                            // Lost a creation race; the collection is there.
                            Ok(()) | Err(GridError::AlreadyExists) => {}
                            Err(err) => return Err(err),
                        },
                    }
                }
            } else {
                // Parent is always present: the path is not the root.
                if let Some(parent) = vpath.parent() {
                    let parent_remote = self.translator.to_remote(&parent);
                    match s.stat(&parent_remote, StatFields::BASIC)? {
                        None => {
                            return Ok(Err(FsError::NotFound {
                                path: parent.as_str().to_string(),
                            }));
                        }
                        Some(node) if node.kind == NodeKind::DataObject => {
                            return Ok(Err(FsError::NotADirectory {
                                path: parent.as_str().to_string(),
                            }));
                        }
                        Some(_) => {}
                    }
                }
                s.create_collection(&remote)?;
            }
            Ok(Ok(()))
        })?
    }

    /// Remove a collection.
    ///
    /// [`RemoveMode::Empty`] refuses populated collections;
    /// [`RemoveMode::Recursive`] deletes the subtree depth-first and, on
    /// partial failure, reports every sub-path it could not remove in one
    /// [`FsError::Incomplete`] instead of stopping at the first.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `path` does not exist
    /// - [`FsError::NotADirectory`] if `path` is a data object
    /// - [`FsError::DirectoryNotEmpty`] for a populated collection in
    ///   [`RemoveMode::Empty`]
    /// - [`FsError::InvalidPath`] for the virtual root
    pub fn removedir(&self, path: &str, mode: RemoveMode) -> Result<(), FsError> {
        let vpath = VirtualPath::new(path)?;
        if vpath.is_root() {
            return Err(FsError::InvalidPath {
                path: vpath.as_str().to_string(),
                reason: "the virtual root cannot be removed".to_string(),
            });
        }
        let remote = self.translator.to_remote(&vpath);
        self.with_session("removedir", &vpath, |s| {
            match s.stat(&remote, StatFields::BASIC)? {
                None => {
                    return Ok(Err(FsError::NotFound {
                        path: vpath.as_str().to_string(),
                    }));
                }
                Some(node) if node.kind == NodeKind::DataObject => {
                    return Ok(Err(FsError::NotADirectory {
                        path: vpath.as_str().to_string(),
                    }));
                }
                Some(_) => {}
            }
            match mode {
                RemoveMode::Empty => {
                    s.remove_collection(&remote)?;
                    Ok(Ok(()))
                }
                RemoveMode::Recursive => {
                    let mut failed = Vec::new();
                    remove_tree(s, &remote, &self.translator, &mut failed)?;
                    Ok(if failed.is_empty() {
                        Ok(())
                    } else {
                        Err(FsError::Incomplete {
                            operation: "removedir",
                            failed,
                        })
                    })
                }
            }
        })?
    }

    // ------------------------------------------------------------------
    // Data objects
    // ------------------------------------------------------------------

    /// Create an empty data object.
    ///
    /// # Errors
    ///
    /// - [`FsError::AlreadyExists`] if `path` already exists
    /// - [`FsError::NotFound`] if the parent collection is missing
    pub fn create(&self, path: &str) -> Result<(), FsError> {
        let handle = self.open_write(path, WriteMode::CreateNew)?;
        handle.close()
    }

    /// Remove a data object.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `path` does not exist
    /// - [`FsError::NotAFile`] if `path` is a collection
    pub fn remove(&self, path: &str) -> Result<(), FsError> {
        let vpath = VirtualPath::new(path)?;
        let remote = self.translator.to_remote(&vpath);
        self.with_session("remove", &vpath, |s| {
            match s.stat(&remote, StatFields::BASIC)? {
                None => {
                    return Ok(Err(FsError::NotFound {
                        path: vpath.as_str().to_string(),
                    }));
                }
                Some(node) if node.kind == NodeKind::Collection => {
                    return Ok(Err(FsError::NotAFile {
                        path: vpath.as_str().to_string(),
                    }));
                }
                Some(_) => {}
            }
            s.remove_object(&remote)?;
            Ok(Ok(()))
        })?
    }

    /// Move a node, collections and data objects alike.
    ///
    /// One remote rename call — never a copy+delete, so no bytes travel and
    /// the change is atomic on the store side.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `src` does not exist
    /// - [`FsError::AlreadyExists`] if `dst` exists and `overwrite` is false
    /// - [`FsError::DirectoryNotEmpty`] when overwriting a populated
    ///   collection
    /// - [`FsError::InvalidPath`] for the root or a move into the source's
    ///   own subtree
    pub fn rename(&self, src: &str, dst: &str, overwrite: bool) -> Result<(), FsError> {
        let vsrc = VirtualPath::new(src)?;
        let vdst = VirtualPath::new(dst)?;
        if vsrc.is_root() || vdst.is_root() {
            return Err(FsError::InvalidPath {
                path: "/".to_string(),
                reason: "the virtual root cannot be moved or replaced".to_string(),
            });
        }
        if vsrc == vdst {
            return Ok(());
        }
        if vdst.as_str().starts_with(&format!("{}/", vsrc.as_str())) {
            return Err(FsError::InvalidPath {
                path: vdst.as_str().to_string(),
                reason: "destination lies inside the source subtree".to_string(),
            });
        }
        let rsrc = self.translator.to_remote(&vsrc);
        let rdst = self.translator.to_remote(&vdst);
        self.with_session("move", &vsrc, |s| {
            if s.stat(&rsrc, StatFields::BASIC)?.is_none() {
                return Ok(Err(FsError::NotFound {
                    path: vsrc.as_str().to_string(),
                }));
            }
            match s.stat(&rdst, StatFields::BASIC)? {
                Some(_) if !overwrite => {
                    return Ok(Err(FsError::AlreadyExists {
                        path: vdst.as_str().to_string(),
                        operation: "move",
                    }));
                }
                Some(node) => match node.kind {
                    NodeKind::DataObject => s.remove_object(&rdst)?,
                    NodeKind::Collection => s.remove_collection(&rdst)?,
                },
                None => {}
            }
            s.rename(&rsrc, &rdst)?;
            Ok(Ok(()))
        })?
    }

    /// Copy a data object.
    ///
    /// Server-side when the store supports it (no bytes through the
    /// client), otherwise a chunked stream copy on a single session. Either
    /// way the copy lands in a staging object first and is renamed onto
    /// `dst`, so readers of `dst` never see a partial copy.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `src` does not exist
    /// - [`FsError::NotAFile`] if `src` or an existing `dst` is a collection
    /// - [`FsError::AlreadyExists`] if `dst` exists and `overwrite` is false
    pub fn copy(&self, src: &str, dst: &str, overwrite: bool) -> Result<(), FsError> {
        let vsrc = VirtualPath::new(src)?;
        let vdst = VirtualPath::new(dst)?;
        if vsrc == vdst {
            return Ok(());
        }
        let rsrc = self.translator.to_remote(&vsrc);
        let rdst = self.translator.to_remote(&vdst);
        let staging = staging_name(&rdst);
        let chunk_size = self.chunk_size;
        self.with_session("copy", &vsrc, |s| {
            match s.stat(&rsrc, StatFields::BASIC)? {
                None => {
                    return Ok(Err(FsError::NotFound {
                        path: vsrc.as_str().to_string(),
                    }));
                }
                Some(node) if node.kind == NodeKind::Collection => {
                    return Ok(Err(FsError::NotAFile {
                        path: vsrc.as_str().to_string(),
                    }));
                }
                Some(_) => {}
            }
            let dst_occupied = match s.stat(&rdst, StatFields::BASIC)? {
                Some(_) if !overwrite => {
                    return Ok(Err(FsError::AlreadyExists {
                        path: vdst.as_str().to_string(),
                        operation: "copy",
                    }));
                }
                Some(node) if node.kind == NodeKind::Collection => {
                    return Ok(Err(FsError::NotAFile {
                        path: vdst.as_str().to_string(),
                    }));
                }
                Some(_) => true,
                None => false,
            };
            match s.copy_object(&rsrc, &staging) {
                Ok(()) => {}
                Err(GridError::Unsupported) => {
                    debug!(src = %vsrc, dst = %vdst, "server-side copy unavailable; streaming");
                    if let Err(err) = stream_copy(s, &rsrc, &staging, chunk_size) {
                        let _ = s.remove_object(&staging);
                        return Err(err);
                    }
                }
                Err(err) => return Err(err),
            }
            if dst_occupied {
                if let Err(err) = s.remove_object(&rdst) {
                    let _ = s.remove_object(&staging);
                    return Err(err);
                }
            }
            if let Err(err) = s.rename(&staging, &rdst) {
                let _ = s.remove_object(&staging);
                return Err(err);
            }
            Ok(Ok(()))
        })?
    }

    // ------------------------------------------------------------------
    // Streaming
    // ------------------------------------------------------------------

    /// Open a data object for reading.
    ///
    /// The handle owns one pool slot until it is closed or dropped.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `path` does not exist
    /// - [`FsError::NotAFile`] if `path` is a collection
    pub fn open_read(&self, path: &str) -> Result<ReadHandle, FsError> {
        let vpath = VirtualPath::new(path)?;
        let remote = self.translator.to_remote(&vpath);
        let (session, outcome) = self.with_session_owned("open_read", &vpath, |s| {
            let node = match s.stat(&remote, StatFields::BASIC)? {
                None => {
                    return Ok(Err(FsError::NotFound {
                        path: vpath.as_str().to_string(),
                    }));
                }
                Some(node) => node,
            };
            if node.kind == NodeKind::Collection {
                return Ok(Err(FsError::NotAFile {
                    path: vpath.as_str().to_string(),
                }));
            }
            let transfer = s.open_read(&remote)?;
            Ok(Ok((transfer, node.size)))
        })?;
        let (transfer, size) = outcome?;
        Ok(ReadHandle::new(
            session,
            transfer,
            remote,
            vpath,
            size,
            self.chunk_size,
        ))
    }

    /// Open a data object for writing.
    ///
    /// Bytes go to a hidden staging object; nothing is visible under `path`
    /// until [`WriteHandle::close`] commits. The handle owns one pool slot
    /// until it is closed or dropped.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the parent collection is missing
    /// - [`FsError::AlreadyExists`] for [`WriteMode::CreateNew`] on an
    ///   existing object
    /// - [`FsError::NotAFile`] if `path` is a collection
    pub fn open_write(&self, path: &str, mode: WriteMode) -> Result<WriteHandle, FsError> {
        let vpath = VirtualPath::new(path)?;
        if vpath.is_root() {
            return Err(FsError::NotAFile {
                path: vpath.as_str().to_string(),
            });
        }
        let remote = self.translator.to_remote(&vpath);
        let staging = staging_name(&remote);
        let chunk_size = self.chunk_size;
        let (session, outcome) = self.with_session_owned("open_write", &vpath, |s| {
            if let Some(parent) = vpath.parent() {
                let parent_remote = self.translator.to_remote(&parent);
                match s.stat(&parent_remote, StatFields::BASIC)? {
                    None => {
                        return Ok(Err(FsError::NotFound {
                            path: parent.as_str().to_string(),
                        }));
                    }
                    Some(node) if node.kind == NodeKind::DataObject => {
                        return Ok(Err(FsError::NotADirectory {
                            path: parent.as_str().to_string(),
                        }));
                    }
                    Some(_) => {}
                }
            }
            let existing = s.stat(&remote, StatFields::BASIC)?;
            if let Some(node) = &existing {
                if node.kind == NodeKind::Collection {
                    return Ok(Err(FsError::NotAFile {
                        path: vpath.as_str().to_string(),
                    }));
                }
                if mode == WriteMode::CreateNew {
                    return Ok(Err(FsError::AlreadyExists {
                        path: vpath.as_str().to_string(),
                        operation: "open_write",
                    }));
                }
            }
            if mode == WriteMode::Append && existing.is_some() {
                // Seed the staging object with the current content so the
                // commit still replaces the object in one rename.
                match s.copy_object(&remote, &staging) {
                    Ok(()) => {}
                    Err(GridError::Unsupported) => stream_copy(s, &remote, &staging, chunk_size)?,
                    Err(err) => return Err(err),
                }
            }
            let transfer = match s.open_write(&staging, mode == WriteMode::Append) {
                Ok(transfer) => transfer,
                Err(err) => {
                    let _ = s.remove_object(&staging);
                    return Err(err);
                }
            };
            Ok(Ok(transfer))
        })?;
        let transfer = outcome?;
        Ok(WriteHandle::new(
            session, transfer, staging, remote, vpath, mode, chunk_size,
        ))
    }

    /// Stream `source` into the data object at `path`, replacing it.
    ///
    /// Convenience over [`open_write`](Self::open_write) +
    /// [`std::io::copy`]; the object appears under `path` only once the
    /// final chunk is flushed and committed.
    pub fn upload(&self, path: &str, source: &mut dyn Read) -> Result<(), FsError> {
        let vpath = VirtualPath::new(path)?;
        let mut handle = self.open_write(vpath.as_str(), WriteMode::Truncate)?;
        match io::copy(source, &mut handle) {
            Ok(_) => handle.close(),
            Err(err) => {
                drop(handle);
                Err(io_to_fs(err, &vpath, "upload"))
            }
        }
    }

    /// Stream the data object at `path` into `sink`.
    pub fn download(&self, path: &str, sink: &mut dyn Write) -> Result<(), FsError> {
        let vpath = VirtualPath::new(path)?;
        let mut handle = self.open_read(vpath.as_str())?;
        match io::copy(&mut handle, sink) {
            Ok(_) => handle.close(),
            Err(err) => {
                drop(handle);
                Err(io_to_fs(err, &vpath, "download"))
            }
        }
    }

    // ------------------------------------------------------------------
    // Session plumbing
    // ------------------------------------------------------------------

    /// Run `op` on a pooled session and give the session back.
    fn with_session<T>(
        &self,
        operation: &'static str,
        path: &VirtualPath,
        op: impl FnMut(&mut dyn GridSession) -> Result<T, GridError>,
    ) -> Result<T, FsError> {
        self.with_session_owned(operation, path, op)
            .map(|(_session, value)| value)
    }

    /// Run `op` on a pooled session and hand both back to the caller.
    ///
    /// A connection-level failure discards the session and reruns `op` once
    /// on a fresh one; any second failure surfaces mapped. Store-level
    /// errors are never retried.
    fn with_session_owned<T>(
        &self,
        operation: &'static str,
        path: &VirtualPath,
        mut op: impl FnMut(&mut dyn GridSession) -> Result<T, GridError>,
    ) -> Result<(PooledSession, T), FsError> {
        let mut session = self.pool.acquire()?;
        match op(&mut *session) {
            Ok(value) => Ok((session, value)),
            Err(GridError::Disconnected(details)) => {
                warn!(path = %path, operation, details = %details, "session lost; reconnecting once");
                session.discard();
                let mut session = self.pool.acquire()?;
                match op(&mut *session) {
                    Ok(value) => Ok((session, value)),
                    Err(err) => Err(FsError::from_grid(err, path.as_str(), operation)),
                }
            }
            Err(err) => Err(FsError::from_grid(err, path.as_str(), operation)),
        }
    }
}

impl std::fmt::Debug for GridFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridFs")
            .field("root", &self.config().root)
            .field("chunk_size", &self.chunk_size)
            .field("pool", &self.pool)
            .finish()
    }
}
