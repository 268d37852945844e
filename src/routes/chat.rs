use actix_web::{delete, get, post, put, web, Error, HttpResponse};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::models::{Chat, ChatDetail};
use crate::types::{AddMessageRequest, ChatModelResponse, UpdateChatRequest};
use crate::AppState;

#[utoipa::path(
    tag = "chats",
    params(("chat_id" = Uuid, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Chat with its settings, transcript and summaries", body = ChatDetail),
        (status = 404, description = "No such chat")
    )
)]
#[get("/chats/{chat_id}")]
pub async fn get_chat(app_state: web::Data<Arc<AppState>>, chat_id: web::Path<Uuid>) -> Result<web::Json<ChatDetail>, Error> {
    let chat_id = chat_id.into_inner();
    let chat = Chat::detail(&app_state.pool, chat_id).await.map_err(|e| {
        error!("Failed to get chat {}: {:?}", chat_id, e);
        e
    })?;
    Ok(web::Json(chat))
}

#[utoipa::path(
    tag = "chats",
    params(("chat_id" = Uuid, Path, description = "Chat id")),
    request_body = UpdateChatRequest,
    responses(
        (status = 200, description = "Updated chat and settings", body = ChatDetail),
        (status = 400, description = "Empty name"),
        (status = 404, description = "No such chat")
    )
)]
#[put("/chats/{chat_id}")]
pub async fn update_chat(
    app_state: web::Data<Arc<AppState>>,
    chat_id: web::Path<Uuid>,
    web::Json(update_chat_request): web::Json<UpdateChatRequest>,
) -> Result<web::Json<ChatDetail>, Error> {
    let chat_id = chat_id.into_inner();
    let chat = Chat::update(&app_state.pool, chat_id, &update_chat_request)
        .await
        .map_err(|e| {
            error!("Failed to update chat {}: {:?}", chat_id, e);
            e
        })?;
    Ok(web::Json(chat))
}

#[utoipa::path(
    tag = "chats",
    params(("chat_id" = Uuid, Path, description = "Chat id")),
    responses(
        (status = 204, description = "Chat deleted with its settings, messages and summaries"),
        (status = 404, description = "No such chat")
    )
)]
#[delete("/chats/{chat_id}")]
pub async fn delete_chat(app_state: web::Data<Arc<AppState>>, chat_id: web::Path<Uuid>) -> Result<HttpResponse, Error> {
    let chat_id = chat_id.into_inner();
    Chat::delete(&app_state.pool, chat_id).await.map_err(|e| {
        error!("Failed to delete chat {}: {:?}", chat_id, e);
        e
    })?;
    Ok(HttpResponse::NoContent().finish())
}

/// Appends a message as is, without asking the model.
#[utoipa::path(
    tag = "chats",
    params(("chat_id" = Uuid, Path, description = "Chat id")),
    request_body = AddMessageRequest,
    responses(
        (status = 200, description = "Updated transcript", body = ChatDetail),
        (status = 400, description = "Empty content"),
        (status = 404, description = "No such chat")
    )
)]
#[post("/chats/{chat_id}/messages")]
pub async fn add_message(
    app_state: web::Data<Arc<AppState>>,
    chat_id: web::Path<Uuid>,
    web::Json(request): web::Json<AddMessageRequest>,
) -> Result<web::Json<ChatDetail>, Error> {
    let chat_id = chat_id.into_inner();
    let chat = Chat::add_message(&app_state.pool, chat_id, &request.content, request.origin)
        .await
        .map_err(|e| {
            error!("Failed to add message to chat {}: {:?}", chat_id, e);
            e
        })?;
    Ok(web::Json(chat))
}

#[utoipa::path(
    tag = "chats",
    params(("chat_id" = Uuid, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Model configured for the chat", body = ChatModelResponse),
        (status = 404, description = "No such chat")
    )
)]
#[get("/chats/{chat_id}/model")]
pub async fn get_chat_model(
    app_state: web::Data<Arc<AppState>>,
    chat_id: web::Path<Uuid>,
) -> Result<web::Json<ChatModelResponse>, Error> {
    let chat_id = chat_id.into_inner();
    let model = Chat::model(&app_state.pool, chat_id).await.map_err(|e| {
        error!("Failed to get model of chat {}: {:?}", chat_id, e);
        e
    })?;
    Ok(web::Json(ChatModelResponse { model }))
}
