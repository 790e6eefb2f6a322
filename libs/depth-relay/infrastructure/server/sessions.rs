use super::writer::WsDepthWriter;
use crate::application::fanout::SubscriberRegistry;
use async_trait::async_trait;
use depthsockets::{ServerSession, SessionHandler};
use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Turns every accepted downstream session into a registered subscriber
///
/// The inbound half is only watched for disconnects; subscribers have
/// nothing to say to the relay.
pub struct SubscriberSessions {
    registry: SubscriberRegistry,
}

impl SubscriberSessions {
    pub fn new(registry: SubscriberRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl SessionHandler for SubscriberSessions {
    async fn handle_session(&self, session: ServerSession) {
        let ServerSession { peer, sink, mut source } = session;
        let mut closed = self.registry.closed_signal();

        let id = match self.registry.register(WsDepthWriter::new(sink)) {
            Ok(id) => id,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Refused subscriber");
                return;
            }
        };
        info!(subscriber_id = %id, peer = %peer, "Subscriber connected");

        loop {
            tokio::select! {
                _ = closed.changed() => break,
                inbound = source.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        debug!(subscriber_id = %id, len = text.len(), "Ignoring inbound text");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(subscriber_id = %id, error = %e, "Subscriber read failed");
                        break;
                    }
                },
            }
        }

        if self.registry.unregister(id) {
            info!(subscriber_id = %id, peer = %peer, "Subscriber disconnected");
        }
    }
}
