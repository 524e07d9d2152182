//! Broker integration: cross-process event fanout and the position
//! cache, both over the shared Redis namespace.

pub mod fanout;
pub mod position_cache;

pub use fanout::{run_subscriber, BrokerPublisher};
pub use position_cache::PositionCache;
