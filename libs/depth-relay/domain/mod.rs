//! Domain Layer
//!
//! Depth values, wire frames, reader/writer roles and the error taxonomy.
//! Nothing here touches sockets.

pub mod depth;
pub mod error;
pub mod traits;

pub use depth::{DepthUpdate, Frame, Snapshot, SubscriberId};
pub use error::{RelayError, Result};
pub use traits::{DepthReader, DepthWriter};
