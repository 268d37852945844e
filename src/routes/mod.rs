use actix_web::web;
use utoipa::OpenApi;

pub mod chat;
pub mod project;
pub mod socket;

#[derive(OpenApi)]
#[openapi(
    info(title = "docgpt", description = "Chats over project documents"),
    paths(
        project::create_project,
        project::add_document,
        project::list_chats,
        project::create_chat,
        chat::get_chat,
        chat::update_chat,
        chat::delete_chat,
        chat::add_message,
        chat::get_chat_model,
    ),
    tags(
        (name = "projects", description = "Projects, their documents and chats"),
        (name = "chats", description = "Chat transcripts and settings")
    )
)]
pub struct ApiDoc;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(project::create_project)
        .service(project::add_document)
        .service(project::list_chats)
        .service(project::create_chat)
        .service(chat::get_chat)
        .service(chat::update_chat)
        .service(chat::delete_chat)
        .service(chat::add_message)
        .service(chat::get_chat_model)
        .service(socket::socket);
}
