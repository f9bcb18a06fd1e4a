//! API routes

use axum::Router;

use crate::AppState;

mod boards;
mod chat;
mod documents;

/// Build the API router with all endpoints
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/chat", chat::router())
        .nest("/documents", documents::router())
        .nest("/boards", boards::router())
}
