//! Utility functions for parsing, formatting and serializing gate values.
//!
//! This module provides helpers for converting between the textual forms used
//! in configuration files, CLI arguments and HTTP payloads and the typed
//! values used throughout the gate.

pub mod conversion;
pub mod formatting;
pub mod helpers;
pub mod serde_helpers;

pub use conversion::{parse_address, parse_identifier, parse_signature};
pub use formatting::{truncate_id, without_0x_prefix};
pub use helpers::current_timestamp;
