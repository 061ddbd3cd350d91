pub mod app;
pub mod config;
pub mod feed;
pub mod http_client;
pub mod logging;
pub mod scout_fetch;
pub mod state;
pub mod ui;
