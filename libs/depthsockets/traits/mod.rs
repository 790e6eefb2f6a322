//! # DepthSockets Traits
//!
//! Core traits and types shared by the upstream client and the downstream
//! listener:
//!
//! - **WsMessage**: Data frames exchanged with peers
//! - **SessionHandler**: Application hook invoked for each accepted session
//! - **SocketError**: Transport error taxonomy

pub mod error;
pub mod message;
pub mod session;

// Re-export commonly used types
pub use error::{Result, SocketError};
pub use message::WsMessage;
pub use session::SessionHandler;
