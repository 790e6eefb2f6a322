//! Reader and writer roles
//!
//! The ingest loop only sees a [`DepthReader`] and the fan-out only sees
//! [`DepthWriter`]s, so both run unchanged over sockets or in-memory doubles.

use super::depth::{DepthUpdate, Frame};
use super::error::Result;
use async_trait::async_trait;

/// Source of decoded depth updates
#[async_trait]
pub trait DepthReader: Send + 'static {
    /// Wait for the next update.
    ///
    /// `Ok(None)` means the source ended cleanly.
    async fn read_next(&mut self) -> Result<Option<DepthUpdate>>;

    /// Release the source. Best effort; `NotConnected` if already released.
    async fn disconnect(&mut self) -> Result<()>;
}

/// Sink for frames addressed to one subscriber
#[async_trait]
pub trait DepthWriter: Send + 'static {
    async fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Close the subscriber's connection
    async fn close(&mut self) -> Result<()>;
}
