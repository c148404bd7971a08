//! Client for the vendor conversation feature of the reconciliation
//! dashboard: `@` mention tagging, chat sessions scoped to a vendor, and
//! incremental rendering of streamed assistant replies.
//!
//! - `api` - `VendorApi` trait and its reqwest implementation
//! - `chat` - `VendorChat` view model
//! - `mention` - mention tokens and the tag list
//! - `repl` - terminal front end used by the binary
//! - `session` - conversation lifecycle
//! - `stream` - fragment decoding of streamed replies
pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod mention;
pub mod repl;
pub mod session;
pub mod stream;
pub mod types;

pub use api::{HttpVendorApi, VendorApi};
pub use chat::{ChatSnapshot, VendorChat};
pub use config::Config;
pub use error::{ChatError, ChatResult};
