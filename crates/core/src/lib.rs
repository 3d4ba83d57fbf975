//! Shared types for the TCC (Try-Confirm/Cancel) coordinator.
//!
//! This crate defines the vocabulary every other `tcc-*` crate builds on:
//! - [`BranchStatus`] / [`TxStatus`] / [`Transaction`]: the data model
//! - [`TccError`] / [`TccResult`]: the shared error taxonomy
//! - [`keys`]: key-value key-space templates

#![warn(missing_docs)]

pub mod error;
pub mod keys;
pub mod status;

pub use error::{TccError, TccResult};
pub use status::{BranchStatus, Transaction, TxStatus};
