use crate::domain::{DepthWriter, Frame, RelayError, Result};
use async_trait::async_trait;
use depthsockets::WsSink;
use futures::SinkExt;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// [`DepthWriter`] over the outbound half of a subscriber's socket
///
/// Frames go out as JSON text: the snapshot as an array, updates as objects.
pub struct WsDepthWriter {
    sink: WsSink,
}

impl WsDepthWriter {
    pub fn new(sink: WsSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl DepthWriter for WsDepthWriter {
    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let payload = frame.to_json().map_err(|e| RelayError::Write(e.to_string()))?;
        self.sink
            .send(Message::Text(payload))
            .await
            .map_err(|e| RelayError::Write(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "Going away".into(),
        };
        let sent = self.sink.send(Message::Close(Some(frame))).await;
        let closed = self.sink.close().await;

        sent.and(closed).map_err(|e| RelayError::Write(e.to_string()))
    }
}
