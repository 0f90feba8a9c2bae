//! Streaming read and write handles.
//!
//! Handles move object bytes in fixed-size chunks, so memory use is bounded
//! regardless of object size. Each handle owns one pooled session for its
//! whole lifetime and releases it on close or drop; a leaked handle pins one
//! pool slot but never corrupts the pool.
//!
//! Writes are staged: bytes go to a hidden sibling object, and only a
//! successful [`WriteHandle::close`] renames the staging object onto the
//! final name. A write that is dropped instead of closed removes its staging
//! object and leaves nothing visible under the final name.

use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::{debug, warn};

use crate::error::FsError;
use crate::path::{GridPath, VirtualPath};
use crate::pool::PooledSession;
use crate::protocol::{GridError, StatFields, TransferId};
use crate::types::{CancelToken, WriteMode};

fn cancelled() -> io::Error {
    io::Error::other("transfer cancelled")
}

// ============================================================================
// ReadHandle
// ============================================================================

/// Sequential, chunk-buffered reader over one data object.
///
/// Implements [`Read`] and [`Seek`]. Seeking uses the store's range support
/// when present; when the store reports it cannot seek, the handle reopens
/// the transfer and skips forward transparently.
///
/// Consume with [`close`](Self::close) to observe close-time errors; a
/// dropped handle closes its transfer best-effort.
pub struct ReadHandle {
    session: PooledSession,
    transfer: Option<TransferId>,
    remote: GridPath,
    path: VirtualPath,
    size: u64,
    /// Absolute offset of the next byte [`Read::read`] will return.
    pos: u64,
    buf: Vec<u8>,
    buf_off: usize,
    chunk_size: usize,
    cancel: CancelToken,
}

impl ReadHandle {
    pub(crate) fn new(
        session: PooledSession,
        transfer: TransferId,
        remote: GridPath,
        path: VirtualPath,
        size: u64,
        chunk_size: usize,
    ) -> Self {
        Self {
            session,
            transfer: Some(transfer),
            remote,
            path,
            size,
            pos: 0,
            buf: Vec::new(),
            buf_off: 0,
            chunk_size,
            cancel: CancelToken::new(),
        }
    }

    /// Object size at open time.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// A token that stops further chunk fetches once cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Close the transfer, surfacing any close-time error.
    pub fn close(mut self) -> Result<(), FsError> {
        if let Some(transfer) = self.transfer.take() {
            self.session
                .close_transfer(transfer)
                .map_err(|e| FsError::from_grid(e, self.path.as_str(), "close"))?;
        }
        Ok(())
    }

    fn transfer(&self) -> io::Result<TransferId> {
        self.transfer
            .ok_or_else(|| io::Error::other("transfer already closed"))
    }

    /// Absolute offset of the store-side cursor (past the buffered window).
    fn server_pos(&self) -> u64 {
        self.pos - self.buf_off as u64 + self.buf.len() as u64
    }

    fn reposition(&mut self, target: u64) -> io::Result<()> {
        let transfer = self.transfer()?;
        match self.session.seek_transfer(transfer, target) {
            Ok(()) => {
                self.buf.clear();
                self.buf_off = 0;
                self.pos = target;
                Ok(())
            }
            Err(GridError::Unsupported) => {
                let server_pos = self.server_pos();
                self.buf.clear();
                self.buf_off = 0;
                if target >= server_pos {
                    self.skip(transfer, target - server_pos)?;
                } else {
                    // No range support and the target is behind the remote
                    // cursor: reopen from the start and skip forward.
                    self.session
                        .close_transfer(transfer)
                        .map_err(|e| self.to_io(e, "seek"))?;
                    self.transfer = None;
                    let reopened = self
                        .session
                        .open_read(&self.remote)
                        .map_err(|e| self.to_io(e, "seek"))?;
                    self.transfer = Some(reopened);
                    self.skip(reopened, target)?;
                }
                self.pos = target;
                Ok(())
            }
            Err(err) => Err(self.to_io(err, "seek")),
        }
    }

    fn skip(&mut self, transfer: TransferId, mut remaining: u64) -> io::Result<()> {
        let mut scratch = vec![0u8; self.chunk_size.min(64 * 1024)];
        while remaining > 0 {
            if self.cancel.is_cancelled() {
                return Err(cancelled());
            }
            let want = scratch.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            let n = self
                .session
                .read_block(transfer, &mut scratch[..want])
                .map_err(|e| self.to_io(e, "seek"))?;
            if n == 0 {
                break;
            }
            remaining -= n as u64;
        }
        Ok(())
    }

    fn to_io(&self, err: GridError, operation: &'static str) -> io::Error {
        FsError::from_grid(err, self.path.as_str(), operation).into()
    }
}

impl Read for ReadHandle {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        if self.buf_off >= self.buf.len() {
            if self.cancel.is_cancelled() {
                return Err(cancelled());
            }
            let transfer = self.transfer()?;
            self.buf.resize(self.chunk_size, 0);
            let n = match self.session.read_block(transfer, &mut self.buf) {
                Ok(n) => n,
                Err(err) => {
                    self.buf.clear();
                    self.buf_off = 0;
                    return Err(self.to_io(err, "read"));
                }
            };
            self.buf.truncate(n);
            self.buf_off = 0;
            if n == 0 {
                return Ok(0);
            }
        }
        let n = (self.buf.len() - self.buf_off).min(out.len());
        out[..n].copy_from_slice(&self.buf[self.buf_off..self.buf_off + n]);
        self.buf_off += n;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for ReadHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let invalid =
            || io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative offset");
        let target = match pos {
            SeekFrom::Start(n) => n,
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta).ok_or_else(invalid)?,
            SeekFrom::End(delta) => self.size.checked_add_signed(delta).ok_or_else(invalid)?,
        };
        if target == self.pos {
            return Ok(target);
        }
        // Seeks landing inside the buffered window are pure bookkeeping.
        let window_start = self.pos - self.buf_off as u64;
        let window_end = window_start + self.buf.len() as u64;
        if target >= window_start && target < window_end {
            self.buf_off = (target - window_start) as usize;
            self.pos = target;
            return Ok(target);
        }
        self.reposition(target)?;
        Ok(target)
    }
}

impl Drop for ReadHandle {
    fn drop(&mut self) {
        if let Some(transfer) = self.transfer.take() {
            if self.session.close_transfer(transfer).is_err() {
                warn!(path = %self.path, "failed to close read transfer on drop");
            }
        }
    }
}

// ============================================================================
// WriteHandle
// ============================================================================

/// Chunk-buffered writer over one data object.
///
/// Bytes accumulate in a `chunk_size` buffer and each full chunk is sent as
/// it fills. Nothing is durable until [`close`](Self::close) succeeds: the
/// handle writes to a hidden staging object and `close` atomically renames
/// it onto the final name. Readers therefore see either the prior complete
/// object (or nothing, for a new one) or the new complete object — never a
/// partial state.
pub struct WriteHandle {
    session: PooledSession,
    transfer: Option<TransferId>,
    staging: GridPath,
    target: GridPath,
    path: VirtualPath,
    mode: WriteMode,
    buf: Vec<u8>,
    chunk_size: usize,
    cancel: CancelToken,
    committed: bool,
}

impl WriteHandle {
    pub(crate) fn new(
        session: PooledSession,
        transfer: TransferId,
        staging: GridPath,
        target: GridPath,
        path: VirtualPath,
        mode: WriteMode,
        chunk_size: usize,
    ) -> Self {
        Self {
            session,
            transfer: Some(transfer),
            staging,
            target,
            path,
            mode,
            buf: Vec::with_capacity(chunk_size),
            chunk_size,
            cancel: CancelToken::new(),
            committed: false,
        }
    }

    /// A token that stops further chunk flushes once cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Flush, close the transfer, and atomically materialize the object
    /// under its final name.
    ///
    /// On any error (including prior cancellation) the staging object is
    /// removed and the final name is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`FsError::AlreadyExists`] for [`WriteMode::CreateNew`] when the
    ///   target appeared since the handle was opened
    /// - [`FsError::ConnectionLost`] if the session died mid-transfer
    pub fn close(mut self) -> Result<(), FsError> {
        if self.cancel.is_cancelled() {
            // Drop handles staging cleanup.
            return Err(FsError::OperationFailed {
                path: self.path.as_str().to_string(),
                operation: "close",
                details: "transfer cancelled before close".to_string(),
            });
        }
        let transfer = self.transfer.ok_or(FsError::OperationFailed {
            path: self.path.as_str().to_string(),
            operation: "close",
            details: "write transfer already closed".to_string(),
        })?;
        // On any early return below, Drop still owns the transfer (until it
        // is closed) and the staging object, and cleans both up.
        if !self.buf.is_empty() {
            let pending = std::mem::take(&mut self.buf);
            self.session
                .write_block(transfer, &pending)
                .map_err(|e| FsError::from_grid(e, self.path.as_str(), "write"))?;
        }
        self.session
            .close_transfer(transfer)
            .map_err(|e| FsError::from_grid(e, self.path.as_str(), "close"))?;
        self.transfer = None;

        // Make way at the final name, then commit with a single rename.
        let occupied = self
            .session
            .stat(&self.target, StatFields::BASIC)
            .map_err(|e| FsError::from_grid(e, self.path.as_str(), "close"))?
            .is_some();
        if occupied {
            if self.mode == WriteMode::CreateNew {
                return Err(FsError::AlreadyExists {
                    path: self.path.as_str().to_string(),
                    operation: "open_write",
                });
            }
            self.session
                .remove_object(&self.target)
                .map_err(|e| FsError::from_grid(e, self.path.as_str(), "close"))?;
        }
        self.session
            .rename(&self.staging, &self.target)
            .map_err(|e| FsError::from_grid(e, self.path.as_str(), "close"))?;
        self.committed = true;
        debug!(path = %self.path, "write committed");
        Ok(())
    }

    fn flush_full_chunks(&mut self) -> io::Result<()> {
        while self.buf.len() >= self.chunk_size {
            if self.cancel.is_cancelled() {
                return Err(cancelled());
            }
            let transfer = self
                .transfer
                .ok_or_else(|| io::Error::other("transfer already closed"))?;
            let chunk: Vec<u8> = self.buf.drain(..self.chunk_size).collect();
            self.session
                .write_block(transfer, &chunk)
                .map_err(|e| io::Error::from(FsError::from_grid(e, self.path.as_str(), "write")))?;
        }
        Ok(())
    }
}

impl Write for WriteHandle {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }
        self.buf.extend_from_slice(data);
        self.flush_full_chunks()?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }
        if !self.buf.is_empty() {
            let transfer = self
                .transfer
                .ok_or_else(|| io::Error::other("transfer already closed"))?;
            let pending = std::mem::take(&mut self.buf);
            self.session
                .write_block(transfer, &pending)
                .map_err(|e| io::Error::from(FsError::from_grid(e, self.path.as_str(), "write")))?;
        }
        Ok(())
    }
}

impl Drop for WriteHandle {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Some(transfer) = self.transfer.take() {
            let _ = self.session.close_transfer(transfer);
        }
        if self.session.remove_object(&self.staging).is_err() {
            warn!(staging = %self.staging, "failed to remove staging object for aborted write");
        } else {
            debug!(path = %self.path, "aborted uncommitted write");
        }
    }
}
