/**
 * WebSocket Connection Handler
 *
 * This module owns the transport boundary of the routing core: upgrading
 * the HTTP request, resolving the connecting user from the shared
 * auth-session cookie, pumping inbound frames through the router, and
 * draining the session's outbound queue into the socket.
 *
 * A socket whose cookie does not resolve to a logged-in auth session is
 * told to redirect to the login page and closed without ever touching the
 * session directory.
 */
use crate::backend::auth::sessions::SESSION_COOKIE;
use crate::backend::chat::session::ConnectionId;
use crate::backend::error::RouterError;
use crate::backend::server::state::AppState;
use crate::shared::frame::{Command, Push};
use crate::shared::user::User;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header::COOKIE, HeaderMap};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

/// Upgrade handler for `GET /ws`
pub async fn handle_socket_upgrade(
    State(app_state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Response {
    ws.on_upgrade(move |socket| socket_loop(app_state, socket, headers))
}

/// Drive one connection from upgrade to disconnect
async fn socket_loop(app_state: AppState, socket: WebSocket, headers: HeaderMap) {
    let (mut sink, mut stream) = socket.split();

    let Some(user) = resolve_user(&app_state, &headers) else {
        tracing::info!("[Socket] unauthenticated connection, redirecting");
        let redirect = Push::Redirect("/".to_string()).encode();
        let _ = sink.send(WsMessage::Text(redirect.into())).await;
        let _ = sink.close().await;
        return;
    };

    let connection_id = ConnectionId::new();
    let (outbound, mut pushes) = mpsc::unbounded_channel::<Push>();

    // Writer task: drains the session's queue until every sender is gone
    // (disconnect or eviction drops the session holding the handle).
    let writer = tokio::spawn(async move {
        while let Some(push) = pushes.recv().await {
            if sink.send(WsMessage::Text(push.encode().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    if let Err(e) = app_state
        .router
        .connect(connection_id, user, outbound)
        .await
    {
        tracing::error!("[Socket] failed to register connection: {}", e);
        app_state.router.disconnect(connection_id).await;
        let _ = writer.await;
        return;
    }

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match Command::parse(text.as_str()) {
                Ok(command) => {
                    if let Err(e) = app_state.router.handle(connection_id, command).await {
                        log_command_failure(e);
                    }
                }
                // Unknown token or malformed body: logged, connection
                // stays open.
                Err(e) => log_command_failure(e.into()),
            },
            Ok(WsMessage::Close(_)) => break,
            // Binary frames are not part of the protocol; ping/pong control
            // frames are answered by the transport layer.
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("[Socket] read error: {}", e);
                break;
            }
        }
    }

    app_state.router.disconnect(connection_id).await;
    let _ = writer.await;
}

/// Severity of a failed command depends on its taxonomy: contained
/// failures are expected noise, store failures are worth a louder log.
fn log_command_failure(error: RouterError) {
    match error {
        RouterError::NotFound(_) | RouterError::Transport { .. } => {
            tracing::warn!("[Socket] command ignored: {}", error);
        }
        RouterError::Protocol(_) | RouterError::Store(_) => {
            tracing::error!("[Socket] command failed: {}", error);
        }
    }
}

/// Resolve the connecting user from the auth-session cookie
///
/// The cookie-backed session records are shared with the external HTTP
/// layer; a record without a logged-in user resolves to `None`.
fn resolve_user(app_state: &AppState, headers: &HeaderMap) -> Option<User> {
    let session_id = session_cookie(headers)?;
    let session = app_state.auth_sessions.find(&session_id)?;
    app_state.auth_sessions.touch(&session_id);
    session.user
}

/// Extract the session id from the Cookie header(s)
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else { continue };
        for pair in value.split(';') {
            if let Some((name, cookie_value)) = pair.trim().split_once('=') {
                if name.trim() == SESSION_COOKIE {
                    return Some(cookie_value.trim().to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_cookie_found() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; sid=abc123; lang=en"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_session_cookie_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_cookie(&headers), None);
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn test_session_cookie_across_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("sid=xyz"));
        assert_eq!(session_cookie(&headers).as_deref(), Some("xyz"));
    }
}
