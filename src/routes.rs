// src/routes.rs
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use http::{header::CONTENT_TYPE, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::handlers;
use crate::socket;
use crate::state::AppState;
use crate::voter;

pub fn create_routes(state: AppState) -> Router {
    let voter_routes = Router::new()
        .route("/votes", post(handlers::vote))
        .route("/polls/{poll_id}/vote-status", get(handlers::vote_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            voter::ensure_voter_token,
        ));

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/polls", post(handlers::create_poll))
        .route("/polls/{poll_id}", get(handlers::get_poll))
        .merge(voter_routes);

    Router::new()
        .nest("/api", api)
        .route("/ws", get(socket::ws_handler))
        .fallback(handlers::not_found)
        .layer(cors_layer(&state.config.frontend_url))
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let origin = match HeaderValue::from_str(frontend_url) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(e) => {
            warn!(error = %e, "FRONTEND_URL is not a valid origin, CORS disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}
