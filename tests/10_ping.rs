mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn ping_reports_bound_port() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for path in ["/", "/api/v1/"] {
        let res = client.get(server.url(path)).send().await?;
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.json::<Value>().await?;
        assert_eq!(
            body,
            json!({ "message": format!("Server is up and running on port {}", server.port) })
        );
    }
    Ok(())
}

#[tokio::test]
async fn unknown_route_returns_envelope() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::Client::new().get(server.url("/api/v2/nothing")).send().await?;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        res.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("application/json")
    );
    let body = res.json::<Value>().await?;
    assert_eq!(body, json!({"code": 404, "message": "Route not found"}));
    Ok(())
}
