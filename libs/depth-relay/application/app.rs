//! Production wiring

use super::fanout::SubscriberRegistry;
use super::gate::DepthGate;
use super::orchestrator::{IngestState, Orchestrator, ShutdownReport};
use crate::domain::{DepthReader, Result};
use crate::infrastructure::client::binance::{build_depth_stream_url, BinanceDepthReader};
use crate::infrastructure::config::RelayConfig;
use crate::infrastructure::server::SubscriberSessions;
use depthsockets::WsServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Running relay: upstream reader, listener and ingest loop
pub struct RelayApp {
    orchestrator: Orchestrator<BinanceDepthReader>,
    local_addr: SocketAddr,
    shutdown_timeout: Duration,
}

impl RelayApp {
    /// Connect upstream, bind the listener and start ingesting
    ///
    /// Fails if the upstream handshake or the bind fails; nothing is left
    /// running in that case.
    pub async fn start(config: &RelayConfig) -> Result<Self> {
        let url = build_depth_stream_url(&config.binance.depth.ws_host, &config.binance.depth.symbols)?;
        let server_config = config.server_config()?;

        let mut reader = BinanceDepthReader::new(config.upstream_config());
        reader.connect(&url).await?;

        let server = match WsServer::bind(server_config).await {
            Ok(server) => server,
            Err(e) => {
                let _ = reader.disconnect().await;
                return Err(e.into());
            }
        };

        let gate = Arc::new(DepthGate::new());
        let registry = SubscriberRegistry::new(Arc::clone(&gate), config.fanout_config());

        let listener = server.spawn(Arc::new(SubscriberSessions::new(registry.clone())))?;
        let local_addr = listener.local_addr();

        let orchestrator = Orchestrator::spawn(reader, gate, registry).with_listener(listener);
        info!(addr = %local_addr, symbols = config.binance.depth.symbols.len(), "Relay started");

        Ok(Self {
            orchestrator,
            local_addr,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn subscriber_count(&self) -> usize {
        self.orchestrator.registry().len()
    }

    pub fn symbols_tracked(&self) -> usize {
        self.orchestrator.gate().len()
    }

    pub fn ingest_state(&self) -> IngestState {
        self.orchestrator.state()
    }

    pub fn gate(&self) -> &Arc<DepthGate> {
        self.orchestrator.gate()
    }

    /// Shut down with the configured timeout
    pub async fn shutdown(self) -> ShutdownReport {
        self.orchestrator.shutdown(self.shutdown_timeout).await
    }
}
