pub mod config;
pub mod controller;
pub mod core;
pub mod host;
pub mod scheduler;
pub mod telemetry;
