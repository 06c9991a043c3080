//! Wire types for pw-flow.
//!
//! This crate contains the serde-serializable shapes exchanged with callers
//! (action plans, execution reports) and with the state cache (storage
//! snapshots).
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization/deserialization
//! - **camelCase on the wire**: Field names match the JSON plan format
//! - **Stable**: Changes only when the plan or report format changes
//!
//! Validation and execution live in `pw-flow`.

pub mod action;
pub mod report;
pub mod storage;
pub mod types;

pub use action::*;
pub use report::*;
pub use storage::*;
pub use types::*;
