//! # datagrid-fs
//!
//! Filesystem adapter for **remote collection/data-object stores** reached
//! over a stateful, authenticated session protocol.
//!
//! Callers work with familiar filesystem verbs against paths in a virtual
//! tree; the adapter translates each call into remote exchanges against
//! collections (directories) and data objects (files), pools authenticated
//! sessions, streams large payloads in bounded chunks, and folds remote
//! failures into one closed error taxonomy.
//!
//! ---
//!
//! ## Quick Start
//!
//! Plug in a connector for your store and operate on virtual paths:
//!
//! ```rust,ignore
//! use datagrid_fs::{Credential, GridConfig, GridFs, StatFields, WriteMode};
//! use std::io::Write;
//!
//! let config = GridConfig {
//!     host: "grid.example.org".into(),
//!     zone: "tempZone".into(),
//!     username: "alice".into(),
//!     credential: Credential::Password("secret".into()),
//!     root: "/tempZone/home/alice".into(),
//!     ..GridConfig::default()
//! };
//! let fs = GridFs::new(connector, config)?;
//!
//! fs.makedir("/runs", false)?;
//! let mut out = fs.open_write("/runs/result.bin", WriteMode::CreateNew)?;
//! out.write_all(&payload)?;
//! out.close()?;
//!
//! for entry in fs.listdir("/runs")? {
//!     println!("{} ({} bytes)", entry.name, entry.size);
//! }
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`GridFs`] | The adapter facade — every filesystem verb |
//! | [`GridConfig`] | Host, zone, credential, root collection, pool/chunk/timeout knobs |
//! | [`VirtualPath`] | Normalized caller-facing path, rooted at `/` |
//! | [`Info`] | Point-in-time metadata snapshot of one remote node |
//! | [`ReadHandle`] / [`WriteHandle`] | Chunked streaming I/O over one object |
//! | [`SessionPool`] | Capacity-bounded pool of store sessions |
//! | [`GridConnector`] / [`GridSession`] | The consumed store protocol, as traits |
//! | [`FsError`] | Closed filesystem error taxonomy |
//!
//! ---
//!
//! ## Sessions and Concurrency
//!
//! The adapter boundary is synchronous. Concurrency across callers comes
//! from a pool of independent sessions: each operation owns one session
//! exclusively from acquire to release, and when all `pool_size` sessions
//! are out, further operations block until one frees up. A session that
//! fails with a connection-level error is discarded and the operation is
//! retried once on a fresh session; authentication failures are never
//! retried.
//!
//! No metadata is cached — every query is a fresh round-trip, so callers
//! reason about staleness locally. Anyone wanting a cache should wrap the
//! adapter rather than reach inside it.
//!
//! ---
//!
//! ## Streaming
//!
//! [`ReadHandle`] and [`WriteHandle`] move bytes in fixed-size chunks, so
//! memory stays bounded regardless of object size. Writes are staged under
//! a hidden name and only materialize at the final path when
//! [`WriteHandle::close`] succeeds — a reader concurrent with a write sees
//! the prior complete object or nothing, never a truncated intermediate.
//!
//! ---
//!
//! ## Error Handling
//!
//! All operations return `Result<T, FsError>`. Remote-store exceptions are
//! mapped to the closed [`FsError`] set once, at the protocol boundary; no
//! client-library type ever crosses the adapter surface.
//!
//! ```rust
//! use datagrid_fs::FsError;
//!
//! let err = FsError::NotFound { path: "/missing.dat".into() };
//! assert_eq!(err.to_string(), "not found: /missing.dat");
//! ```
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Serialization derives for [`GridConfig`], [`Info`], and path types |

// Private modules
mod config;
mod error;
mod fs;
mod path;
mod pool;
mod protocol;
mod stream;
mod types;

// Public re-exports - configuration
pub use config::{Credential, DEFAULT_CHUNK_SIZE, DEFAULT_POOL_SIZE, DEFAULT_TIMEOUT, GridConfig};

// Public re-exports - error taxonomy
pub use error::FsError;

// Public re-exports - the adapter facade
pub use fs::GridFs;

// Public re-exports - paths
pub use path::{GridPath, PathTranslator, VirtualPath};

// Public re-exports - session management
pub use pool::{PooledSession, SessionPool};

// Public re-exports - the consumed store protocol
pub use protocol::{
    GridConnector, GridError, GridSession, NodeKind, NodeStat, StatFields, TransferId,
};

// Public re-exports - streaming handles
pub use stream::{ReadHandle, WriteHandle};

// Public re-exports - value types
pub use types::{CancelToken, Info, RemoveMode, WriteMode};
