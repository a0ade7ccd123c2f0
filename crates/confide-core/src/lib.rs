//! Core types and error definitions for the Confide conversation state store.
//!
//! This crate holds the value types shared by the store, the reporting side,
//! and the inspection CLI.
//!
//! # Main types
//!
//! - [`ConfideError`] — Unified error enum for all Confide crates.
//! - [`ConfideResult`] — Convenience alias for `Result<T, ConfideError>`.
//! - [`DecodeError`] — Why a durable unit could not be decoded.
//! - [`SessionKey`] — Participant + conversation identifier, the store's primary key.
//! - [`Role`] and [`Turn`] — One transcript message and its author.
//! - [`AssessmentRecord`] — The agent's single current evaluation of a conversation.

/// Assessment payload and its numeric score reading.
pub mod assessment;
/// Error types.
pub mod error;
/// Session keys and durable unit naming.
pub mod key;
/// Transcript turns.
pub mod message;

pub use assessment::AssessmentRecord;
pub use error::{ConfideError, ConfideResult, DecodeError};
pub use key::SessionKey;
pub use message::{Role, Turn};
