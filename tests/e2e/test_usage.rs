use crate::e2e::helpers;

use helpers::TestContext;
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_empty_usage_for_new_visitor(ctx: &TestContext) {
    let client = ctx.client.as_visitor("fresh-visitor-1");

    let response = client.get("/api/usage").await.unwrap();
    response.assert_status(StatusCode::OK);

    let body = response.body.as_ref().unwrap();
    assert_eq!(body["visitor"], "tab-fresh-visitor-1");
    assert_eq!(body["usage"]["session_characters"], 0);
    assert_eq!(body["usage"]["day_conversations"], 0);
    assert_eq!(body["limits"]["max_characters_per_message"], 500);
    assert_eq!(body["limits"]["cooldown_between_messages_secs"], 3);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_time_until_window_resets(ctx: &TestContext) {
    let response = ctx.client.get("/api/usage").await.unwrap();
    response.assert_status(StatusCode::OK);

    // The clock starts at exactly 12:00 UTC
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["resets"]["hour_ms"], 3_600_000);
    assert_eq!(body["resets"]["day_ms"], 43_200_000);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_allow_a_normal_message_on_check(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/usage/check",
            &json!({ "text": "Tell me about your projects", "use_high_tier_voice": true }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["allowed"], true);
    assert!(body.get("violation").is_none());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_long_message_on_check_without_recording(ctx: &TestContext) {
    let client = ctx.client.as_visitor("long-writer-01");
    let text = "a".repeat(501);

    let response = client
        .post("/api/usage/check", &json!({ "text": text }))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["allowed"], false);
    assert_eq!(body["violation"], "message_too_long");
    assert_eq!(body["current_usage"]["session_characters"], 0);

    let usage = client.get("/api/usage").await.unwrap();
    assert_eq!(usage.body.as_ref().unwrap()["usage"]["session_characters"], 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_not_count_checks_as_usage(ctx: &TestContext) {
    let client = ctx.client.as_visitor("dry-run-visitor");

    for _ in 0..3 {
        let response = client
            .post("/api/usage/check", &json!({ "text": "Hello" }))
            .await
            .unwrap();
        assert_eq!(response.body.as_ref().unwrap()["allowed"], true);
    }

    let usage = client.get("/api/usage").await.unwrap();
    assert_eq!(usage.body.as_ref().unwrap()["usage"]["session_characters"], 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_text_on_check(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/usage/check", &json!({ "text": "   " }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("Text cannot be empty");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_keep_visitors_separate(ctx: &TestContext) {
    let alice = ctx.client.as_visitor("visitor-alice");
    let bob = ctx.client.as_visitor("visitor-bob-1");

    alice
        .post("/api/voice/speak", &json!({ "text": "Hello there" }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let alice_usage = alice.get("/api/usage").await.unwrap();
    let bob_usage = bob.get("/api/usage").await.unwrap();
    assert_eq!(
        alice_usage.body.as_ref().unwrap()["usage"]["session_characters"],
        11
    );
    assert_eq!(bob_usage.body.as_ref().unwrap()["usage"]["session_characters"], 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_end_the_session_but_keep_daily_usage(ctx: &TestContext) {
    let client = ctx.client.as_visitor("widget-closer");

    client
        .post("/api/voice/speak", &json!({ "text": "Hello there" }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    client
        .delete("/api/usage/session")
        .await
        .unwrap()
        .assert_status(StatusCode::NO_CONTENT);

    let response = client.get("/api/usage").await.unwrap();
    let usage = &response.body.as_ref().unwrap()["usage"];
    assert_eq!(usage["session_characters"], 0);
    assert_eq!(usage["session_premium_characters"], 0);
    assert_eq!(usage["hour_characters"], 11);
    assert_eq!(usage["day_characters"], 11);
}
