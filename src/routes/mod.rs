pub mod jobs;

use crate::state::AppState;
use axum::Router;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

pub fn create_router(state: Arc<AppState>) -> Router {
    let client_dist = state.config.client_dist.clone();
    let index_html = client_dist.join("index.html");

    Router::new()
        .nest("/jobs", jobs::router())
        .fallback_service(
            ServeDir::new(&client_dist)
                .fallback(ServeFile::new(index_html)),
        )
        .with_state(state)
}
