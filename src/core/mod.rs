pub mod driver;
pub mod endpoint;
pub mod error;
pub mod failover;
pub mod host;
pub mod monitoring;
pub mod props;
