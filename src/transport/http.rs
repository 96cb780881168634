//! HTTP transport
//!
//! This file wires the broadcast core to axum. Responsibilities:
//! - Serve the static chat page
//! - Validate the caller's identity (a username of minimum length) and the
//!   message before anything reaches the broker
//! - Wrap chat text into a `ChatEvent`, encode it and publish it
//! - Open one `SseSession` per `/sse` request and stream it back, or answer
//!   503 once the broker has stopped
//!
//! The identity check is a username length check only; there is no authentication.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Form, Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

use crate::broker::Broker;
use crate::config::BrokerSettings;
use crate::transport::message::{ChatEvent, SendRequest, SubscribeQuery};
use crate::transport::sse::SseSession;
use crate::utils::error::{ApiError, BrokerError};

const INDEX_HTML: &str = include_str!("../../static/index.html");

#[derive(Debug, Clone)]
pub struct AppState {
    pub broker: Broker,
    pub settings: Arc<BrokerSettings>,
}

impl AppState {
    pub fn new(broker: Broker, settings: BrokerSettings) -> Self {
        Self {
            broker,
            settings: Arc::new(settings),
        }
    }

    fn keep_alive(&self) -> Option<Duration> {
        match self.settings.keep_alive_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    fn validate_username(&self, username: &str) -> Result<(), ApiError> {
        if username.chars().count() < self.settings.min_username_len {
            return Err(ApiError::InvalidUser);
        }
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/sse", get(subscribe))
        .route("/send", get(send_message_query).post(send_message_form))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve `router(state)` on an already bound listener until it fails.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP server listening on http://{addr}");
    }
    axum::serve(listener, router(state)).await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn subscribe(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
) -> Result<Response, ApiError> {
    state.validate_username(&query.username)?;
    if !state.broker.is_running() {
        return Err(BrokerError::Unavailable.into());
    }

    let session = SseSession::open(&state.broker, query.username, state.keep_alive());

    let headers = [
        (header::CONTENT_TYPE, "text/event-stream"),
        (header::CACHE_CONTROL, "no-cache"),
        (header::CONNECTION, "keep-alive"),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    ];
    Ok((headers, Body::from_stream(session.into_stream())).into_response())
}

async fn send_message_form(
    State(state): State<AppState>,
    Form(request): Form<SendRequest>,
) -> Result<&'static str, ApiError> {
    publish_chat_message(&state, request).await
}

async fn send_message_query(
    State(state): State<AppState>,
    Query(request): Query<SendRequest>,
) -> Result<&'static str, ApiError> {
    publish_chat_message(&state, request).await
}

async fn publish_chat_message(
    state: &AppState,
    request: SendRequest,
) -> Result<&'static str, ApiError> {
    state.validate_username(&request.username)?;
    if request.message.is_empty() {
        return Err(ApiError::InvalidMessage);
    }

    let event = ChatEvent::new_chat_message(request.username, request.message);
    let message = event.encode()?;

    state.broker.publish(message).await?;
    info!("NEW Message from: {}", event.username);

    Ok("ok.")
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = if state.broker.is_running() {
        "ok"
    } else {
        "stopped"
    };
    Json(json!({
        "status": status,
        "subscribers": state.broker.subscriber_count(),
    }))
}
