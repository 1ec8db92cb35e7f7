//! Resident resolution for planet records.
//!
//! A planet's `residents` field arrives as a list of person URLs. Each URL
//! is resolved to the person's display name by a secondary fetch; entries
//! that cannot be parsed, fetched, or found degrade to JSON `null` so a
//! single bad resident never sinks its planet. Order and length of the
//! list are preserved.

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::client::{Collection, FetchOutcome, ResourceFetcher};

/// Trailing numeric path segment of a resident reference URL, e.g.
/// `https://swapi.dev/api/people/5/` -> `5`.
pub fn parse_resident_index(url: &str) -> Option<u64> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// Resolve one planet's resident list in place. All residents fetch
/// concurrently and are joined before the planet is finalized.
pub async fn resolve_planet<F>(fetcher: &F, mut planet: Map<String, Value>) -> Map<String, Value>
where
    F: ResourceFetcher + ?Sized,
{
    let refs = match planet.get("residents") {
        Some(Value::Array(refs)) => refs.clone(),
        _ => return planet,
    };

    let names = join_all(refs.iter().map(|reference| async move {
        match reference.as_str() {
            Some(url) => resolve_resident(fetcher, url).await,
            None => Value::Null,
        }
    }))
    .await;

    planet.insert("residents".to_string(), Value::Array(names));
    planet
}

/// Resolve one pagination batch of planets, planets concurrently with each
/// other. Output order matches input order.
pub async fn resolve_batch<F>(
    fetcher: &F,
    planets: Vec<Map<String, Value>>,
) -> Vec<Map<String, Value>>
where
    F: ResourceFetcher + ?Sized,
{
    join_all(
        planets
            .into_iter()
            .map(|planet| resolve_planet(fetcher, planet)),
    )
    .await
}

async fn resolve_resident<F>(fetcher: &F, url: &str) -> Value
where
    F: ResourceFetcher + ?Sized,
{
    let Some(index) = parse_resident_index(url) else {
        warn!(url, "resident reference has no numeric index");
        return Value::Null;
    };

    match fetcher.fetch(Collection::People, index).await {
        Ok(FetchOutcome::Found(record)) => record.get("name").cloned().unwrap_or(Value::Null),
        Ok(FetchOutcome::NotFound) => {
            debug!(url, index, "resident record not found");
            Value::Null
        }
        Err(error) => {
            warn!(url, index, error = %error, "resident fetch failed");
            Value::Null
        }
    }
}
