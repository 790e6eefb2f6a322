//! Downstream subscriber adapters

pub mod sessions;
pub mod writer;

pub use sessions::SubscriberSessions;
pub use writer::WsDepthWriter;
