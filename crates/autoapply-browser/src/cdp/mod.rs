//! Chrome DevTools Protocol (CDP) client.
//!
//! Connects to a Chrome instance launched with `--remote-debugging-port`
//! and drives a single page over the CDP JSON-RPC WebSocket. The surface
//! is intentionally narrow: just the navigation, element wait, form
//! input, file attachment, and screenshot commands the form-filling
//! engine needs.

mod client;
mod error;
mod page;
mod protocol;

pub use client::CdpConnection;
pub use error::CdpError;
pub use page::Page;
pub use protocol::*;
