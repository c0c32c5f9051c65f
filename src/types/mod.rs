//! Core types used throughout the library.

pub mod message;
pub mod provider_info;
pub mod request;
pub mod streaming;

// Re-export commonly used types
pub use message::*;
pub use provider_info::*;
pub use request::*;
pub use streaming::*;
