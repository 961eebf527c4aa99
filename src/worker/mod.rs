//! Communication with the external database worker process.
//!
//! Backends without a driver in the crate's own stack (SQL Server) are
//! reached through a long-running worker that executes SQL on our behalf.
//!
//! ```text
//!   WorkerExecutor ──► WorkerClient ── stdin (NDJSON) ──► worker process
//!                           ▲                                  │
//!                           └──────── stdout (NDJSON) ◄────────┘
//! ```

mod client;
mod error;
pub mod protocol;

pub use client::WorkerClient;
pub use error::{WorkerError, WorkerResult};
