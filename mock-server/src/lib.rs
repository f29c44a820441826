use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Body returned by `/status/{code}` and `/slow/{millis}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slept_ms: Option<u64>,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", get(echo_query).post(echo_body).put(echo_body))
        .route("/headers", get(echo_headers))
        .route("/status/{code}", get(status))
        .route("/slow/{millis}", get(slow))
        .route("/empty", get(empty))
        .route("/text", get(text))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo_query(Query(params): Query<BTreeMap<String, String>>) -> Json<BTreeMap<String, String>> {
    Json(params)
}

async fn echo_body(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}

async fn echo_headers(headers: HeaderMap) -> Json<Value> {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();
    Json(json!(headers))
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<Report>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((
        status,
        Json(Report {
            status: code,
            slept_ms: None,
        }),
    ))
}

async fn slow(Path(millis): Path<u64>) -> Json<Report> {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    Json(Report {
        status: 200,
        slept_ms: Some(millis),
    })
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn text() -> &'static str {
    "plain text, not json"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_without_sleep() {
        let report = Report {
            status: 404,
            slept_ms: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, json!({"status": 404}));
    }

    #[test]
    fn report_roundtrips_with_sleep() {
        let report = Report {
            status: 200,
            slept_ms: Some(25),
        };
        let back: Report = serde_json::from_str(&serde_json::to_string(&report).unwrap()).unwrap();
        assert_eq!(back, report);
    }
}
