pub mod config;
pub mod consumers;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod routes;
pub mod state;
pub mod websocket;

pub const SERVICE_NAME: &str = "gateway";
