pub mod channel_routes;
pub mod health_routes;
