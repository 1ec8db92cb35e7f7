//! HTTP surface: router, handlers, shared state.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::{Map, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::client::{Collection, SwapiClient};
use crate::config::Config;
use crate::engine::PaginationRun;
use crate::residents;
use crate::sort::{self, PersonRecord, SortKey};

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<SwapiClient>,
    pub config: Arc<Config>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/people", get(get_people))
        .route("/planets", get(get_planets))
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct PeopleQuery {
    #[serde(rename = "sortBy")]
    sort_by: Option<String>,
}

/// All people, projected to names, sorted by the requested key.
async fn get_people(
    Query(query): Query<PeopleQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, StatusCode> {
    let sort_key = SortKey::parse(query.sort_by.as_deref());

    let run = PaginationRun::new(
        state.client.as_ref(),
        Collection::People,
        state.config.people_policy(),
    );
    let records = match run.collect_all().await {
        Ok(records) => records,
        Err(e) => {
            warn!("people aggregation failed: {:?}", e);
            return Err(StatusCode::GATEWAY_TIMEOUT);
        }
    };

    let mut people: Vec<PersonRecord> = records
        .into_iter()
        .filter_map(PersonRecord::from_record)
        .collect();
    sort::sort_people(&mut people, sort_key);

    info!(count = people.len(), ?sort_key, "people aggregation complete");
    Ok(Json(sort::into_names(people)))
}

/// All planets with resident references resolved to names. Resolution runs
/// per pagination batch, so resident fan-out stays nested inside the
/// batch's concurrency domain.
async fn get_planets(
    State(state): State<AppState>,
) -> Result<Json<Vec<Map<String, Value>>>, StatusCode> {
    let fetcher = state.client.as_ref();
    let mut run = PaginationRun::new(
        fetcher,
        Collection::Planets,
        state.config.planets_policy(),
    );

    let mut planets = Vec::new();
    loop {
        match run.next_batch().await {
            Ok(Some(batch)) => planets.extend(residents::resolve_batch(fetcher, batch).await),
            Ok(None) => break,
            Err(e) => {
                warn!("planets aggregation failed: {:?}", e);
                return Err(StatusCode::GATEWAY_TIMEOUT);
            }
        }
    }

    info!(count = planets.len(), "planets aggregation complete");
    Ok(Json(planets))
}
