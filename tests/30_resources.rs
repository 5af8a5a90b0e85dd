mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn tenant_crud_round_trip() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/v1/tenants"))
        .json(&json!({"firstName": "Wanjiru", "lastName": "Mwangi", "phone": "0733111222", "houseId": "h-17"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = res.json::<Value>().await?;
    assert_eq!(created["message"], "Tenant created successfully");
    let id = created["payload"]["_id"].as_str().unwrap_or_default().to_string();
    assert!(!id.is_empty());

    let res = client.get(server.url(&format!("/api/v1/tenants/{}", id))).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["payload"]["houseId"], "h-17");

    let res = client
        .patch(server.url(&format!("/api/v1/tenants/{}", id)))
        .json(&json!({"houseId": "h-21"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(server.url(&format!("/api/v1/tenants/{}", id))).send().await?;
    let fetched = res.json::<Value>().await?;
    assert_eq!(fetched["payload"]["houseId"], "h-21");
    assert!(fetched["payload"]["updatedAt"].is_string());

    let res = client.delete(server.url(&format!("/api/v1/tenants/{}", id))).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(server.url(&format!("/api/v1/tenants/{}", id))).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn repairs_are_paginated() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for n in 0..5 {
        let res = client
            .post(server.url("/api/v1/repairs"))
            .json(&json!({"houseId": "h-paging", "description": format!("leak {}", n), "priority": n}))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client
        .get(server.url("/api/v1/repairs?page=2&limit=2&sort=priority"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["limit"], 2);
    assert_eq!(body["pagination"]["total"], 5);
    assert_eq!(body["pagination"]["pages"], 3);
    let priorities: Vec<Value> = body["payload"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|r| r["priority"].clone())
        .collect();
    assert_eq!(priorities, vec![json!(2), json!(3)]);
    Ok(())
}

#[tokio::test]
async fn payments_require_amount() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::Client::new()
        .post(server.url("/api/v1/payments"))
        .json(&json!({"tenantId": "t-1"}))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);
    let body = res.json::<Value>().await?;
    assert!(body["message"].as_str().unwrap_or_default().ends_with("missing [amount]"));
    Ok(())
}

#[tokio::test]
async fn cors_headers_are_present() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::Client::new()
        .get(server.url("/api/v1/"))
        .header("origin", "http://localhost:5173")
        .send()
        .await?;

    assert_eq!(
        res.headers().get("access-control-allow-origin").and_then(|v| v.to_str().ok()),
        Some("*")
    );
    Ok(())
}
