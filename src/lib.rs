pub mod app;
pub mod config;
pub mod error;
pub mod exchange;
pub mod hypr;
pub mod idle;
pub mod logging;
pub mod native_messaging;
pub mod signal;
pub mod timer;
pub mod ws;
