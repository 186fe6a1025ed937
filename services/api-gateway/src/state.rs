use crate::config::Config;
use crate::websocket::SubscriberRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: SubscriberRegistry,
    pub http: reqwest::Client,
    pub config: Arc<Config>,
}
