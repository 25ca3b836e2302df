use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream as async_stream;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse,
        sse::{Event as SseEvent, Sse},
    },
    routing::get,
};
use chrono::{Duration as ChronoDuration, Local, TimeDelta};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use crate::application::{EventLog, EventQuery, SnapshotStore};
use crate::domain::{EventKind, Heartbeat};
use crate::infrastructure::event_bus::EventBus;

/// Read-only status API for external watchdogs and dashboards.
#[derive(Clone)]
pub struct ApiState {
    pub snapshots: Arc<dyn SnapshotStore>,
    pub events: Arc<dyn EventLog>,
    pub api_token: Option<String>,
    pub event_bus: Option<EventBus>,
    /// Heartbeat older than this is reported stale.
    pub stale_after: ChronoDuration,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/slots", get(list_slots))
        .route("/events", get(list_events))
        .route("/events/stream", get(stream_events))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResp {
    heartbeat: Option<Heartbeat>,
    stale: bool,
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    match state.snapshots.load_heartbeat().await {
        Ok(heartbeat) => {
            let stale = heartbeat
                .as_ref()
                .is_none_or(|h| h.is_stale(Local::now(), state.stale_after));
            let code = if stale {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::OK
            };
            (code, Json(HealthResp { heartbeat, stale })).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response(),
    }
}

async fn list_slots(State(state): State<ApiState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err((code, msg)) = check_auth(&headers, &state.api_token) {
        return (code, msg).into_response();
    }
    match state.snapshots.load_snapshot().await {
        Ok(Some(s)) => Json(s).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "no snapshot yet".to_string()).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response(),
    }
}

#[derive(Deserialize)]
struct EventsQuery {
    limit: Option<u32>,
    since: Option<String>, // "24h" | "7d" | "3600s"
    kind: Option<String>,
}

async fn list_events(
    State(state): State<ApiState>,
    Query(q): Query<EventsQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err((code, msg)) = check_auth(&headers, &state.api_token) {
        return (code, msg).into_response();
    }
    let query = match build_query(q.limit.unwrap_or(100).min(500), q.since.as_deref(), q.kind.as_deref()) {
        Ok(query) => query,
        Err(msg) => return (StatusCode::BAD_REQUEST, msg).into_response(),
    };

    match state.events.list(query).await {
        Ok(v) => Json(v).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response(),
    }
}

#[derive(Deserialize, Clone)]
struct StreamQuery {
    replay: Option<u32>,
    since: Option<String>,
    kind: Option<String>,
}

async fn stream_events(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(q): Query<StreamQuery>,
) -> impl IntoResponse {
    if let Err((code, msg)) = check_auth(&headers, &state.api_token) {
        return (code, msg).into_response();
    }

    let Some(bus) = state.event_bus.clone() else {
        return (
            StatusCode::NOT_IMPLEMENTED,
            "event stream not enabled".to_string(),
        )
            .into_response();
    };

    let query = match build_query(q.replay.unwrap_or(20).min(200), q.since.as_deref(), q.kind.as_deref()) {
        Ok(query) => query,
        Err(msg) => return (StatusCode::BAD_REQUEST, msg).into_response(),
    };
    let kind_filter = query.kind;

    // 1) history, oldest first
    let history = match state.events.list(query).await {
        Ok(mut items) => {
            items.reverse();
            items
        }
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response();
        }
    };

    // 2) then live
    let live = bus.stream(kind_filter).filter_map(|event| {
        let data = serde_json::to_string(&event).ok()?;
        Some(Ok::<SseEvent, Infallible>(
            SseEvent::default().event("event").data(data),
        ))
    });

    let out_stream = async_stream! {
        for e in history {
            let data = serde_json::to_string(&e).unwrap_or_else(|_| "{}".to_string());
            yield Ok::<SseEvent, Infallible>(SseEvent::default().event("replay").data(data));
        }

        tokio::pin!(live);
        while let Some(item) = live.next().await {
            yield item;
        }
    };

    Sse::new(out_stream).into_response()
}

fn build_query(limit: u32, since: Option<&str>, kind: Option<&str>) -> Result<EventQuery, String> {
    let since = match since {
        Some(v) => Some(parse_since(v).ok_or("invalid since (use 24h/7d/3600s)")?),
        None => None,
    };
    let kind = match kind {
        Some(k) => Some(
            k.parse::<EventKind>()
                .map_err(|_| "invalid kind (added/removed/session_start)".to_string())?,
        ),
        None => None,
    };
    Ok(EventQuery { since, kind, limit })
}

fn check_auth(headers: &HeaderMap, token: &Option<String>) -> Result<(), (StatusCode, String)> {
    let Some(expected) = token else {
        return Ok(());
    };
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if auth == format!("Bearer {}", expected) {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "unauthorized".to_string()))
    }
}

/// `<n><unit>` back from now, unit one of s/m/h/d. `None` when malformed or
/// out of range.
fn parse_since(s: &str) -> Option<chrono::DateTime<Local>> {
    let s = s.trim();
    let unit = s.chars().last()?;
    let n: i64 = s[..s.len() - unit.len_utf8()].parse().ok()?;
    if n < 0 {
        return None;
    }
    let span = match unit {
        's' => TimeDelta::try_seconds(n),
        'm' => TimeDelta::try_minutes(n),
        'h' => TimeDelta::try_hours(n),
        'd' => TimeDelta::try_days(n),
        _ => None,
    }?;
    Local::now().checked_sub_signed(span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_accepts_units() {
        let now = Local::now();
        let got = parse_since("2h").unwrap();
        let diff = now.signed_duration_since(got).num_minutes();
        assert!((119..=121).contains(&diff));
        assert!(parse_since("2w").is_none());
        assert!(parse_since("h").is_none());
        assert!(parse_since("").is_none());
    }

    #[test]
    fn since_rejects_hostile_input_without_panicking() {
        assert!(parse_since("1é").is_none());
        assert!(parse_since("é").is_none());
        assert!(parse_since("99999999999999d").is_none());
        assert!(parse_since("9223372036854775807s").is_none());
        assert!(parse_since("-3h").is_none());
        assert!(build_query(10, Some("99999999999999d"), None).is_err());
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(build_query(10, None, Some("opened")).is_err());
        let q = build_query(10, None, Some("added")).unwrap();
        assert_eq!(q.kind, Some(EventKind::Added));
    }
}
