use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    routing::get,
};
use std::sync::Arc;

use crate::db::models::{Channel, ChannelPage, ChannelPatchRequest, ChannelRequest};
use crate::error::ChannelError;
use crate::web::AppState;
use crate::web::models::{ListChannelsParams, acting_user_id};

fn json_payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ChannelError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ChannelError::InvalidPayload(rejection.body_text()))
}

// --- Route Handlers ---

async fn create_channel_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<ChannelRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Channel>), ChannelError> {
    let request = json_payload(payload)?;
    let channel = app_state.channel_service.create(request).await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

async fn get_channel_handler(
    State(app_state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<Json<Channel>, ChannelError> {
    let channel = app_state.channel_service.get(&channel_id).await?;
    Ok(Json(channel))
}

async fn list_channels_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    params: Result<Query<ListChannelsParams>, QueryRejection>,
) -> Result<Json<ChannelPage>, ChannelError> {
    let Query(params) =
        params.map_err(|rejection| ChannelError::InvalidPayload(rejection.body_text()))?;
    let user_id = acting_user_id(&headers)?;
    let query = params.normalize(user_id, &app_state.config);
    let page = app_state.channel_service.list(query).await?;
    Ok(Json(page))
}

async fn update_channel_handler(
    State(app_state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
    payload: Result<Json<ChannelPatchRequest>, JsonRejection>,
) -> Result<Json<Channel>, ChannelError> {
    let request = json_payload(payload)?;
    let channel = app_state
        .channel_service
        .update(&channel_id, request)
        .await?;
    Ok(Json(channel))
}

async fn delete_channel_handler(
    State(app_state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<StatusCode, ChannelError> {
    app_state.channel_service.delete(&channel_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router ---

pub fn create_channels_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_channels_handler).post(create_channel_handler))
        .route(
            "/{channel_id}",
            get(get_channel_handler)
                .patch(update_channel_handler)
                .delete(delete_channel_handler),
        )
}
