pub use crate::common::RouteResult;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use store_postgres::PgStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use transit_core::{Publisher, TimetableClient};

pub mod common;
pub mod config;
mod ingest_route;
pub mod purge;
pub mod timetable_client;

#[derive(Clone)]
pub struct WebState {
    pub store: PgStore,
    pub publisher: Arc<dyn Publisher>,
    pub timetable: Arc<dyn TimetableClient>,
}

pub async fn start_web_server(state: WebState) -> std::io::Result<()> {
    let routes = Router::new()
        .route("/ping", get(ping))
        .merge(ingest_route::routes(state))
        .fallback(common::route_not_found)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind("0.0.0.0:8080").await?;
    axum::serve(listener, routes.into_make_service()).await?;

    Ok(())
}

async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "pong!" }))
}
