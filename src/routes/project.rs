use actix_web::{get, post, web, Error, HttpResponse};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{Chat, ChatDetail, OriginalDocument, Project};
use crate::types::{AddDocumentRequest, CreateChatRequest, CreateProjectRequest, ListChatsQuery};
use crate::AppState;

#[utoipa::path(
    tag = "projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Empty name")
    )
)]
#[post("/projects")]
pub async fn create_project(
    app_state: web::Data<Arc<AppState>>,
    web::Json(request): web::Json<CreateProjectRequest>,
) -> Result<HttpResponse, Error> {
    let project = Project::create(&app_state.pool, &request.name).await.map_err(|e| {
        error!("Failed to create project: {:?}", e);
        e
    })?;
    info!("Project created: {}", project.id);
    Ok(HttpResponse::Created().json(project))
}

#[utoipa::path(
    tag = "projects",
    params(("project_id" = Uuid, Path, description = "Project id")),
    request_body = AddDocumentRequest,
    responses(
        (status = 201, description = "Document registered on the project", body = OriginalDocument),
        (status = 400, description = "Empty or already registered path"),
        (status = 404, description = "No such project")
    )
)]
#[post("/projects/{project_id}/documents")]
pub async fn add_document(
    app_state: web::Data<Arc<AppState>>,
    project_id: web::Path<Uuid>,
    web::Json(request): web::Json<AddDocumentRequest>,
) -> Result<HttpResponse, Error> {
    let project_id = project_id.into_inner();
    let document = OriginalDocument::create(&app_state.pool, project_id, &request.path)
        .await
        .map_err(|e| {
            error!("Failed to add document to project {}: {:?}", project_id, e);
            e
        })?;
    Ok(HttpResponse::Created().json(document))
}

#[utoipa::path(
    tag = "projects",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ListChatsQuery
    ),
    responses(
        (status = 200, description = "Chats of the project, oldest first", body = Vec<ChatDetail>),
        (status = 404, description = "No such project")
    )
)]
#[get("/projects/{project_id}/chats")]
pub async fn list_chats(
    app_state: web::Data<Arc<AppState>>,
    project_id: web::Path<Uuid>,
    query: web::Query<ListChatsQuery>,
) -> Result<web::Json<Vec<ChatDetail>>, Error> {
    let project_id = project_id.into_inner();
    let chats = Chat::list_by_project(&app_state.pool, project_id, query.messages, query.summaries)
        .await
        .map_err(|e| {
            error!("Failed to list chats of project {}: {:?}", project_id, e);
            e
        })?;
    Ok(web::Json(chats))
}

#[utoipa::path(
    tag = "projects",
    params(("project_id" = Uuid, Path, description = "Project id")),
    request_body = CreateChatRequest,
    responses(
        (status = 201, description = "Chat created with its settings", body = ChatDetail),
        (status = 400, description = "Empty name or unknown setting value"),
        (status = 404, description = "No such project")
    )
)]
#[post("/projects/{project_id}/chats")]
pub async fn create_chat(
    app_state: web::Data<Arc<AppState>>,
    project_id: web::Path<Uuid>,
    web::Json(request): web::Json<CreateChatRequest>,
) -> Result<HttpResponse, Error> {
    let project_id = project_id.into_inner();
    let chat = Chat::create(&app_state.pool, project_id, &request).await.map_err(|e| {
        error!("Failed to create chat in project {}: {:?}", project_id, e);
        e
    })?;
    Ok(HttpResponse::Created().json(chat))
}
