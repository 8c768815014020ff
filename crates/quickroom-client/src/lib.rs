//! Quickroom client library
//!
//! Joins a video room named on the command line, previews and publishes the
//! local camera and microphone, renders remote participants and shares a
//! screen or window on demand.

pub mod diagnostics;
pub mod error;
pub mod media;
pub mod network;
pub mod room_details;
pub mod session;
pub mod state;
pub mod transport;
pub mod ui;
pub mod view;

#[cfg(test)]
mod testing;

pub use error::{ClientError, Result};
pub use room_details::RoomDetails;
pub use session::{Command, PageSnapshot, SessionCoordinator, SessionPhase};
