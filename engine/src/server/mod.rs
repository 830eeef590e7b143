//! Web chat server
//!
//! Small HTTP surface over the assistant:
//!
//! - POST /chat - answer one question
//! - GET /health - liveness probe
//! - GET / - embedded chat page

use crate::assistant::Assistant;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sdk::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Chat request body
#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default = "default_user_id")]
    user_id: String,
}

fn default_user_id() -> String {
    "anonymous".to_string()
}

/// Chat response body
#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
    locale: String,
    partial: bool,
}

/// Build the router. Separated from `serve` so tests can drive it with
/// `tower::ServiceExt` without binding a socket.
pub fn router(assistant: Arc<Assistant>) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .route("/", get(index_handler))
        .layer(CorsLayer::permissive())
        .with_state(assistant)
}

/// Bind and serve until the process is stopped.
pub async fn serve(assistant: Arc<Assistant>, bind: &str) -> Result<(), EngineError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| EngineError::Network(format!("Failed to bind {bind}: {e}")))?;

    tracing::info!("Chat server listening on http://{}", bind);

    axum::serve(listener, router(assistant))
        .await
        .map_err(|e| EngineError::Network(format!("Server error: {e}")))
}

async fn chat_handler(
    State(assistant): State<Arc<Assistant>>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    let message = payload.message.trim();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Empty message"})),
        )
            .into_response();
    }

    let answer = assistant.answer(message, &payload.user_id).await;

    Json(ChatResponse {
        response: answer.text,
        locale: answer.locale,
        partial: answer.partial,
    })
    .into_response()
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn index_handler() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

const CHAT_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>TiaBridge Chat</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 700px;
            margin: 40px auto;
            padding: 20px;
            background: #f5f5f5;
        }
        #log {
            background: white;
            border-radius: 8px;
            padding: 20px;
            min-height: 300px;
            box-shadow: 0 2px 4px rgba(0,0,0,0.1);
            white-space: pre-wrap;
        }
        .user { color: #007bff; margin: 8px 0; }
        .bot { color: #333; margin: 8px 0; }
        .partial { color: #856404; }
        form { display: flex; margin-top: 16px; gap: 8px; }
        input {
            flex: 1;
            padding: 10px;
            border: 1px solid #ccc;
            border-radius: 6px;
        }
        button {
            padding: 10px 20px;
            border: none;
            border-radius: 6px;
            background: #007bff;
            color: white;
            cursor: pointer;
        }
    </style>
</head>
<body>
    <h1>TiaBridge</h1>
    <p>Ask about the Celestia network: validators, delegations, supply, governance.</p>
    <div id="log"></div>
    <form id="form">
        <input id="input" autocomplete="off" placeholder="How many validators are active?">
        <button type="submit">Send</button>
    </form>
    <script>
        const log = document.getElementById('log');
        const form = document.getElementById('form');
        const input = document.getElementById('input');
        const userId = 'web-' + Math.random().toString(36).slice(2, 10);

        form.addEventListener('submit', async (e) => {
            e.preventDefault();
            const message = input.value.trim();
            if (!message) return;
            input.value = '';
            append('user', 'You: ' + message);
            try {
                const res = await fetch('/chat', {
                    method: 'POST',
                    headers: {'Content-Type': 'application/json'},
                    body: JSON.stringify({message, user_id: userId})
                });
                const data = await res.json();
                append(data.partial ? 'bot partial' : 'bot',
                       'TiaBridge: ' + (data.response || data.error));
            } catch (err) {
                append('bot', 'TiaBridge: request failed (' + err + ')');
            }
        });

        function append(cls, text) {
            const div = document.createElement('div');
            div.className = cls;
            div.textContent = text;
            log.appendChild(div);
            log.scrollTop = log.scrollHeight;
        }
    </script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmConfig, QueryConfig};
    use crate::endpoint::{Backends, CallError, DataEndpoint, ParamMap};
    use crate::executor::PlanExecutor;
    use crate::llm::{LlmClient, LlmError, LlmRouter, Message};
    use crate::planner::QueryPlanner;
    use crate::registry::{OperationDescriptor, Registry};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use sdk::types::{Cursor, Page};
    use tower::ServiceExt;

    struct SilentClient;

    #[async_trait]
    impl LlmClient for SilentClient {
        fn name(&self) -> &str {
            "silent"
        }

        async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
            Err(LlmError::ProviderUnavailable("test".into()))
        }
    }

    struct DeadEndpoint;

    #[async_trait]
    impl DataEndpoint for DeadEndpoint {
        async fn fetch(
            &self,
            _op: &OperationDescriptor,
            _params: &ParamMap,
            _cursor: Option<&Cursor>,
        ) -> Result<Page, CallError> {
            Err(CallError::Network("test".into()))
        }
    }

    fn test_router() -> Router {
        let registry = Arc::new(Registry::builtin().unwrap());
        let router = LlmRouter::new(vec![Box::new(SilentClient)], Arc::new(LlmConfig::default()));
        let endpoint: Arc<dyn DataEndpoint> = Arc::new(DeadEndpoint);
        let assistant = Assistant::new(
            QueryPlanner::new(router, Arc::clone(&registry)),
            PlanExecutor::new(
                Backends::new(Arc::clone(&endpoint), endpoint),
                registry,
                QueryConfig::default(),
            ),
        );
        super::router(Arc::new(assistant))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = test_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let response = test_router()
            .oneshot(
                Request::post("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message": "   "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_index_serves_chat_page() {
        let response = test_router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_chat_request_defaults_user_id() {
        let req: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(req.user_id, "anonymous");
    }

    #[test]
    fn test_chat_page_posts_to_chat() {
        assert!(CHAT_PAGE.contains("fetch('/chat'"));
    }
}
