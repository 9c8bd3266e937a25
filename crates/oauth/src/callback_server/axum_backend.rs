use std::sync::Arc;

use {
    axum::{
        Router,
        extract::State,
        http::{Method, StatusCode, Uri, header},
        response::{IntoResponse, Response},
    },
    tokio::{net::TcpListener, sync::oneshot},
    tracing::warn,
};

use super::Shared;

pub(super) async fn serve(
    listener: TcpListener,
    shared: Arc<Shared>,
    shutdown: oneshot::Receiver<()>,
) {
    let app = Router::new().fallback(redirect).with_state(shared);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
        })
        .await;
    if let Err(e) = result {
        warn!(error = %e, "auth server failed");
    }
}

async fn redirect(State(shared): State<Arc<Shared>>, method: Method, uri: Uri) -> Response {
    let (reply, decision) = shared.handle(method.as_str(), uri.path(), uri.query());
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let response = (
        status,
        [
            (header::CONTENT_TYPE, reply.content_type),
            (header::SERVER, shared.backend.server_header()),
        ],
        reply.body,
    )
        .into_response();
    // graceful shutdown keeps the connection alive until this reply is sent
    if let Some(decision) = decision {
        decision.deliver();
    }
    response
}
