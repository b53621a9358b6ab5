//! Tabula Services Layer
//!
//! This crate sits between the table view and the row API. It owns the
//! optimistic editing overlay and the protocol that commits it.
//!
//! # Architecture
//!
//! ```text
//! Table view (UI events)
//!     ↓
//! EditSession / SessionHandle   ← staged rows and per-row patches
//!     ↓
//! BatchCommitter                ← sequential creates/updates, concurrent deletes
//!     ↓
//! RowsApi (HttpRowsApi)         ← JSON over HTTP
//! ```
//!
//! # Design Principles
//!
//! 1. **Session mutations are synchronous** - only commits touch the network
//! 2. **One user-visible error** - every failure collapses into a [`ServiceError`]
//! 3. **No rollback** - partially applied batches stay applied
//! 4. **Saves are bound to the session** - discarding cancels the running save

mod batch_committer;
mod config;
mod edit_session;
mod error;
mod http_rows_api;
mod pending;
mod rows_api;
mod session_handle;

pub use batch_committer::{BatchCommitter, BulkDeleteReport, CommitReport};
pub use config::ClientConfig;
pub use edit_session::{ChangeSet, EditSession, PendingSave, SaveOutcome, SessionState};
pub use error::{ServiceError, ServiceResult};
pub use http_rows_api::HttpRowsApi;
pub use pending::PendingChanges;
pub use rows_api::{RequestError, RowOperation, RowsApi};
pub use session_handle::SessionHandle;
