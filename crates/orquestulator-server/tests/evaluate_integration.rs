//! Evaluation integration tests.

mod common;

use anyhow::Result;
use serde_json::json;

use common::TestServer;

#[tokio::test]
async fn test_evaluate_requires_session() -> Result<()> {
    let server = TestServer::start().await?;
    let (status, body) = server.evaluate("yaql", "$.a", json!({ "a": 1 })).await?;
    assert_eq!(status, 401);
    assert_eq!(body["code"], "unauthorized");
    Ok(())
}

#[tokio::test]
async fn test_orquesta_task_context() -> Result<()> {
    let server = TestServer::start().await?;
    server.login().await?;

    let data = json!({
        "host": "web-01",
        "__task_status": "failed",
        "__task_result": { "stderr": "boom" }
    });

    let (status, body) = server
        .evaluate("orquesta", "<% task_status() %>", data.clone())
        .await?;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "result": "failed", "query_type": "orquesta" }));

    let (_, body) = server
        .evaluate("orquesta", "{{ result().stderr }}", data.clone())
        .await?;
    assert_eq!(body["result"], "boom");

    let (_, body) = server
        .evaluate("orquesta", "<% failed() and not succeeded() %>", data.clone())
        .await?;
    assert_eq!(body["result"], true);

    let (_, body) = server
        .evaluate("orquesta", "Host <% ctx(host) %> failed", data)
        .await?;
    assert_eq!(body["result"], "Host web-01 failed");
    Ok(())
}

#[tokio::test]
async fn test_reserved_keys_are_hidden_from_context() -> Result<()> {
    let server = TestServer::start().await?;
    server.login().await?;

    let (_, body) = server
        .evaluate(
            "orquesta",
            "<% ctx() %>",
            json!({ "x": 1, "__task_status": "succeeded", "__internal": true }),
        )
        .await?;
    assert_eq!(body["result"], json!({ "x": 1 }));
    Ok(())
}

#[tokio::test]
async fn test_errors_do_not_break_later_requests() -> Result<()> {
    let server = TestServer::start().await?;
    server.login().await?;

    let (status, body) = server.evaluate("jinja2", "{{ unclosed", json!({})).await?;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "evaluation_error");
    assert_eq!(body["query_type"], "jinja2");

    let (status, body) = server
        .evaluate("orquesta", "<% ctx(x) %>", json!({ "__task_status": "bogus" }))
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["query_type"], "orquesta");

    let (status, body) = server
        .evaluate("jinja2", "{{ items | length }}", json!({ "items": [1, 2, 3] }))
        .await?;
    assert_eq!(status, 200);
    assert_eq!(body["result"], "3");
    Ok(())
}

#[tokio::test]
async fn test_malformed_body_gets_error_envelope() -> Result<()> {
    let server = TestServer::start().await?;
    server.login().await?;

    let resp = server
        .post("/api/evaluate/yaql")
        .json(&json!({ "data": {} }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["code"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("expression"));

    let resp = server
        .post("/api/evaluate/yaql")
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("not json")
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["code"], "bad_request");
    Ok(())
}
