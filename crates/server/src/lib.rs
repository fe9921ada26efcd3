//! HTTP surface of the reelfetch media retrieval service.

pub mod api;
pub mod metrics;
pub mod state;
