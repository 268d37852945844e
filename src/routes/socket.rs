use actix_web::{get, rt, web, Error, HttpRequest, HttpResponse};
use actix_ws::Message;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::orchestrator::ConversationOrchestrator;
use crate::types::{ClientEvent, ConversationFailure, ServerEvent};
use crate::AppState;

/// Bidirectional channel with the browser client.
///
/// Every text frame is handled on its own task; replies go back on the same connection.
#[get("/socket")]
pub async fn socket(
    req: HttpRequest,
    body: web::Payload,
    app_state: web::Data<Arc<AppState>>,
) -> Result<HttpResponse, Error> {
    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, body)?;
    let state = app_state.get_ref().clone();
    info!("Socket client connected: {:?}", req.peer_addr());

    rt::spawn(async move {
        while let Some(Ok(msg)) = msg_stream.next().await {
            match msg {
                Message::Text(text) => {
                    let state = state.clone();
                    let mut session = session.clone();
                    rt::spawn(async move {
                        let event = respond(&state.orchestrator, &text).await;
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if session.text(json).await.is_err() {
                                    debug!("Socket closed before the reply could be sent");
                                }
                            }
                            Err(e) => error!("Failed to serialize socket reply: {}", e),
                        }
                    });
                }
                Message::Ping(bytes) => {
                    if session.pong(&bytes).await.is_err() {
                        break;
                    }
                }
                Message::Close(reason) => {
                    debug!("Socket client closed: {:?}", reason);
                    break;
                }
                _ => {}
            }
        }

        let _ = session.close(None).await;
        info!("Socket client disconnected");
    });

    Ok(response)
}

/// Handles one client frame and builds the frame to send back.
pub async fn respond(orchestrator: &ConversationOrchestrator, frame: &str) -> ServerEvent {
    let event = match serde_json::from_str::<ClientEvent>(frame) {
        Ok(event) => event,
        Err(e) => {
            warn!("Unreadable socket frame: {}", e);
            return ServerEvent::ConversationError(ConversationFailure {
                chat_id: None,
                message: format!("unreadable frame: {e}"),
            });
        }
    };

    let chat_id = event.chat_id();
    let result = match event {
        ClientEvent::ConversationQuery(q) => orchestrator.query(q.chat_id, &q.query).await,
        ClientEvent::SummarizationQuery(q) => orchestrator.summarize_document(q.chat_id, q.document_id).await,
    };

    match result {
        Ok(chat) => ServerEvent::ConversationResponse(chat),
        Err(e) => {
            error!("Query on chat {} failed: {}", chat_id, e);
            ServerEvent::ConversationError(ConversationFailure {
                chat_id: Some(chat_id),
                message: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::TokenCounter;
    use crate::models::{Chat, ChatType, Language, LlmModel, Origin, Project};
    use crate::retrieval::{DocumentReader, ProjectDocumentRetriever};
    use crate::types::{CreateChatRequest, NewChatSettings};
    use serde_json::json;
    use std::time::Duration;
    use uuid::Uuid;

    async fn orchestrator_with_chat() -> (ConversationOrchestrator, Uuid) {
        let pool = db::connect_in_memory().await.unwrap();
        let project = Project::create(&pool, "p").await.unwrap();
        let request = CreateChatRequest {
            name: "c".into(),
            settings: NewChatSettings {
                language: Language::En,
                model: LlmModel::Gpt4o,
                chat_type: ChatType::Conversation,
            },
        };
        let chat = Chat::create(&pool, project.id, &request).await.unwrap();
        let reader = DocumentReader::new(".");
        let orchestrator = ConversationOrchestrator::new(
            pool.clone(),
            Arc::new(ScriptedModel::with_replies(&["Hi!"])),
            Arc::new(ProjectDocumentRetriever::new(pool, reader.clone(), 10, 2)),
            reader,
            TokenCounter::new().unwrap(),
            Duration::from_secs(5),
        );
        (orchestrator, chat.chat.id)
    }

    #[tokio::test]
    async fn conversation_query_gets_the_transcript_back() {
        let (orchestrator, chat_id) = orchestrator_with_chat().await;
        let frame = json!({ "event": "conversation-query", "data": { "chatId": chat_id, "query": "Hello" } });

        let reply = respond(&orchestrator, &frame.to_string()).await;

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["event"], "conversation-response");
        assert_eq!(value["data"]["id"], json!(chat_id));
        match reply {
            ServerEvent::ConversationResponse(chat) => {
                let origins: Vec<_> = chat.messages().iter().map(|m| m.origin).collect();
                assert_eq!(origins, vec![Origin::User, Origin::Llm]);
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn failures_are_reported_with_the_chat_id() {
        let (orchestrator, _) = orchestrator_with_chat().await;
        let unknown = Uuid::new_v4();
        let frame = json!({ "event": "conversation-query", "data": { "chatId": unknown, "query": "Hello" } });

        match respond(&orchestrator, &frame.to_string()).await {
            ServerEvent::ConversationError(failure) => {
                assert_eq!(failure.chat_id, Some(unknown));
                assert!(failure.message.contains("not found"));
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_frames_get_an_error_without_chat() {
        let (orchestrator, _) = orchestrator_with_chat().await;
        match respond(&orchestrator, "not json").await {
            ServerEvent::ConversationError(failure) => assert_eq!(failure.chat_id, None),
            other => panic!("unexpected reply {other:?}"),
        }
    }
}
