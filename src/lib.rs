pub mod capture;
pub mod chain;
pub mod config;
pub mod media;
pub mod segment;
pub mod server;
pub mod services;
pub mod telemetry;
pub mod watcher;

pub use chain::ConversionChain;
pub use watcher::watch_segments;
