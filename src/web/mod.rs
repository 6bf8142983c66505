use axum::{Router, http::Method};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::repository::ChannelRepository;
use crate::db::store::ChannelStore;
use crate::server::config::ServerConfig;
use crate::services::ChannelService;
use crate::web::routes::{channel_routes, health_routes};

pub mod error;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub channel_service: Arc<ChannelService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn ChannelStore>, config: Arc<ServerConfig>) -> Self {
        let repository = ChannelRepository::new(store, config.query_timeout());
        AppState {
            channel_service: Arc::new(ChannelService::new(repository)),
            config,
        }
    }
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .merge(health_routes::create_health_router())
        .nest("/v1/channels", channel_routes::create_channels_router())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
