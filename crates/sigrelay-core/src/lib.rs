//! sigrelay core: transport-agnostic protocol primitives, error types, and the
//! event dispatch primitive.
//!
//! This crate defines the wire-level contracts shared by the hub and the client:
//! the immutable [`Envelope`](protocol::Envelope), its type and address
//! vocabulary, the JSON codec, and [`Listeners`](event::Listeners). It carries no
//! transport or runtime dependencies so both sides can reuse it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `RelayError`/`Result` so neither side crashes
//! on malformed input.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod event;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, RelayError, Result};
