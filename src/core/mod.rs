pub mod config;
pub mod clock;
pub mod normalizer;
pub mod bridge;
pub mod dispatch;
