//! WebSocket handler for realtime mindmap collaboration

use super::handlers::ApiState;
use super::ws_session::MindmapSession;
use crate::auth::extractor::AuthUser;
use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    response::IntoResponse,
};
use futures::StreamExt;
use tracing::debug;
use uuid::Uuid;

/// WebSocket upgrade handler for `/ws/mindmap/{team_id}/{mindmap_id}/`
///
/// Identity comes from `require_auth`; the access gate runs inside the
/// session so a rejected client sees the socket close without a message.
pub async fn ws_mindmap(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
    user: AuthUser,
    Path((team_id, mindmap_id)): Path<(Uuid, Uuid)>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let session = MindmapSession::new(&state, team_id, mindmap_id, user);
        let session_id = session.id();
        let (sink, stream) = socket.split();
        let report = session.run(sink, stream).await;
        debug!(
            session_id = %session_id,
            authorized = report.authorized,
            "WebSocket connection closed"
        );
    })
}
