//! Process utilities

mod shutdown;

pub use shutdown::ShutdownManager;
