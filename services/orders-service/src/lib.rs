pub mod config;
pub mod consumers;
pub mod db;
pub mod error;
pub mod logging;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod routes;
pub mod state;
pub mod workers;

pub const SERVICE_NAME: &str = "orders";
