//! Session handling for the downstream listener
//!
//! The listener performs the HTTP upgrade and then hands the split
//! connection to a [`SessionHandler`]. Each session runs in its own task, so
//! a handler may await for as long as the peer stays connected.

use crate::core::server::ServerSession;
use async_trait::async_trait;

/// Application hook invoked once per accepted WebSocket session
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// #[async_trait]
/// impl SessionHandler for Echo {
///     async fn handle_session(&self, session: ServerSession) {
///         let ServerSession { mut sink, mut source, .. } = session;
///         while let Some(Ok(msg)) = source.next().await {
///             let _ = sink.send(msg).await;
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait SessionHandler: Send + Sync + 'static {
    /// Drive one session until the peer disconnects or the handler gives up
    ///
    /// Dropping both halves of the session closes the underlying socket.
    async fn handle_session(&self, session: ServerSession);
}
