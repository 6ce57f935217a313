use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use model::real_time_update::ProcessingStatus;
use serde_json::json;
use transit_core::database::ContributorRepo;
use transit_core::parsed_update::ParsedTripUpdate;
use transit_core::Store;

use crate::common::{RouteErrorResponse, RouteResult};
use crate::WebState;

pub(crate) fn routes(state: WebState) -> Router {
    Router::new().route("/:connector/:contributor_id", post(ingest)).with_state(state)
}

/// `POST /<connector>/<contributor-id>`: the generic JSON connector whose
/// body is already shaped as `ParsedTripUpdate[]`. Authoring a parser for a
/// vendor's native wire format is out of scope; this route exists so the
/// handler pipeline is reachable end-to-end over HTTP.
async fn ingest(Path((connector, contributor_id)): Path<(String, String)>, State(state): State<WebState>, body: axum::body::Bytes) -> RouteResult<Json<serde_json::Value>> {
    let mut auto = state.store.auto();
    let contributor = ContributorRepo::get(&mut auto, &contributor_id).await.map_err(|why| RouteErrorResponse::internal(format!("{why:?}")))?;

    if contributor.is_none() {
        return Err(RouteErrorResponse::not_found(format!("unknown contributor {contributor_id}")));
    }

    let raw_payload = body.to_vec();
    let parsed: Result<Vec<ParsedTripUpdate>, String> = serde_json::from_slice(&raw_payload).map_err(|why| format!("malformed JSON body: {why}"));
    let is_parse_failure = parsed.is_err();
    let now = Utc::now();

    let row = handler::ingest_and_record(&state.store, state.publisher.as_ref(), state.timetable.as_ref(), connector, contributor_id, raw_payload, parsed, true, now)
        .await
        .map_err(|why| RouteErrorResponse::internal(format!("{why:?}")))?;

    match row.content.status {
        ProcessingStatus::Ok => Ok(Json(json!({ "message": "accepted" }))),
        ProcessingStatus::Ko if is_parse_failure => Err(RouteErrorResponse::bad_request(row.content.error.clone().unwrap_or_default())),
        ProcessingStatus::Ko => Err(RouteErrorResponse::not_found(row.content.error.clone().unwrap_or_default())),
        ProcessingStatus::Pending => Err(RouteErrorResponse::internal("update left in pending state")),
    }
}
