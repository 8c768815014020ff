//! Shared protocol definitions for Quickroom
//!
//! Types exchanged with the token endpoint, the signalling server and the
//! screen-capture browser extension.

pub mod extension;
pub mod messages;
pub mod types;

pub use extension::*;
pub use messages::*;
pub use types::*;
