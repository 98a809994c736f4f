//! Chat relay HTTP handler.

use std::convert::Infallible;
use std::io;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio_stream::StreamExt;

use crate::auth::BearerToken;
use crate::config::Framing;
use crate::llm::ChatStream;
use crate::relay::{ChatRequest, Fragment, RelayReply, RelayStream};
use crate::response::error;
use crate::server::AppState;

// ============================================================================
// Handler
// ============================================================================

/// POST /api/chat
///
/// Request body: `{"messages": [{"role": "...", "content": "..."}], "idToken": "..."}`
///
/// Buffered providers answer `{"message": "...", "timestamp": "..."}`.
/// Streaming providers answer with a chunked text body or SSE, per config.
/// Failures answer `{"error": "..."}` with a non-2xx status.
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return error(rejection.status(), rejection.body_text()).into_response(),
    };

    let request = match ChatRequest::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };

    let header_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(BearerToken::from_header);

    match state.relay.relay(request, header_token).await {
        Ok(RelayReply::Message(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(RelayReply::Stream(stream)) => stream_response(&state, stream),
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// Streaming
// ============================================================================

#[derive(Serialize)]
struct TokenData {
    content: String,
}

#[derive(Serialize)]
struct ErrorData {
    message: String,
}

fn stream_response(state: &AppState, stream: ChatStream) -> Response {
    let fragments = RelayStream::new(stream, state.idle_timeout);

    match state.framing {
        Framing::Text => {
            // A failure aborts the chunked body instead of ending it cleanly.
            let chunks = fragments.filter_map(|fragment| match fragment {
                Fragment::Text(text) => Some(Ok(Bytes::from(text))),
                Fragment::End => None,
                Fragment::Failed(message) => Some(Err(io::Error::other(message))),
            });
            (
                [
                    (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                Body::from_stream(chunks),
            )
                .into_response()
        }
        Framing::Sse => {
            let events = fragments.map(|fragment| Ok::<_, Infallible>(to_event(fragment)));
            let keep_alive = KeepAlive::new()
                .interval(state.keep_alive_interval)
                .text("keep-alive");
            Sse::new(events).keep_alive(keep_alive).into_response()
        }
    }
}

fn to_event(fragment: Fragment) -> Event {
    match fragment {
        Fragment::Text(content) => Event::default()
            .event("token")
            .json_data(TokenData { content })
            .unwrap_or_else(|_| Event::default().event("token").data("{}")),
        Fragment::End => Event::default().event("done").data("{}"),
        Fragment::Failed(message) => Event::default()
            .event("error")
            .json_data(ErrorData { message })
            .unwrap_or_else(|_| Event::default().event("error").data("{}")),
    }
}
