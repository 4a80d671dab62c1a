use crate::agent::ChatAgent;
use crate::error::ServiceError;
use crate::models::chat::{ ConversationIndex, Turn };
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ Path, State, rejection::JsonRejection },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use chrono::Local;
use serde::{ Deserialize, Serialize };
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn, error };

/// `content` and `conversationId` are accepted as fallbacks; when a body
/// carries both spellings, `message` and `conversation_id` win.
#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    content: Option<String>,
    pub conversation_id: Option<String>,
    #[serde(rename = "conversationId")]
    conversation_id_camel: Option<String>,
}

impl ChatRequest {
    fn into_parts(self) -> (Option<String>, Option<String>) {
        (self.message.or(self.content), self.conversation_id.or(self.conversation_id_camel))
    }
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    conversation_id: String,
    timestamp: String,
}

#[derive(Serialize)]
struct ConversationsResponse {
    conversations: ConversationIndex,
}

#[derive(Serialize)]
struct ConversationResponse {
    conversation: Vec<Turn>,
}

#[derive(Clone)]
struct AppState {
    agent: Arc<ChatAgent>,
}

/// A service error plus the message the route reports for unexpected failures.
struct ApiError {
    error: ServiceError,
    context: String,
}

impl ApiError {
    fn new(error: ServiceError, context: impl Into<String>) -> Self {
        Self { error, context: context.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.error {
            ServiceError::Validation(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ServiceError::NotFound(_) => {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": "Conversation not found" })),
                ).into_response()
            }
            ServiceError::Persistence(e) => {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": self.context, "details": e.to_string() })),
                ).into_response()
            }
        }
    }
}

pub fn router(agent: Arc<ChatAgent>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/conversations", get(list_conversations_handler))
        .route("/api/conversations/{conversation_id}", get(get_conversation_handler))
        .layer(cors)
        .with_state(AppState { agent })
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "statusCode": 200,
            "status": "healthy",
            "model": state.agent.model(),
        })),
    )
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| {
        warn!("Invalid request format: {}", e);
        ApiError::new(ServiceError::Validation("Request must be JSON".into()), "")
    })?;

    let (message, conversation_id) = req.into_parts();
    let message = match message {
        Some(message) if !message.is_empty() => message,
        _ => {
            warn!("Invalid request: missing message field");
            return Err(
                ApiError::new(ServiceError::Validation("Message is required".into()), "")
            );
        }
    };

    let preview: String = message.chars().take(30).collect();
    info!(
        "Received chat request with message: '{}...' and conversation_id: {:?}",
        preview,
        conversation_id
    );

    let outcome = state.agent.handle(conversation_id, &message).await.map_err(|e| {
        error!("Error processing chat request: {}", e);
        ApiError::new(e, "An unexpected error occurred")
    })?;

    info!("Successfully processed message for conversation {}", outcome.conversation_id);
    Ok(
        Json(ChatResponse {
            response: outcome.reply,
            conversation_id: outcome.conversation_id,
            timestamp: Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        })
    )
}

async fn list_conversations_handler(
    State(state): State<AppState>,
) -> Result<Json<ConversationsResponse>, ApiError> {
    info!("Retrieving all conversations");
    let conversations = state.agent.get_all_conversations().await.map_err(|e| {
        error!("Error retrieving conversations: {}", e);
        ApiError::new(e, "Failed to retrieve conversations")
    })?;
    Ok(Json(ConversationsResponse { conversations }))
}

async fn get_conversation_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    info!("Retrieving conversation {}", conversation_id);
    let conversation = state.agent.get_conversation(&conversation_id).await.map_err(|e| {
        match &e {
            ServiceError::NotFound(_) => warn!("Conversation {} not found", conversation_id),
            _ => error!("Error retrieving conversation {}: {}", conversation_id, e),
        }
        ApiError::new(e, format!("Failed to retrieve conversation {}", conversation_id))
    })?;
    Ok(Json(ConversationResponse { conversation }))
}
