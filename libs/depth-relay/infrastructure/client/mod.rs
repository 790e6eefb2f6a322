//! Upstream clients

pub mod binance;
