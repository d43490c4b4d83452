pub mod checkpoint;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod packets;
pub mod progress;
pub mod scan;
pub mod timestamps;
