use crate::e2e::helpers;

use chrono::Duration;
use helpers::{assert_limit_response, TestContext};
use hyper::StatusCode;
use portfolio_voice_gateway::infrastructure::repositories::ChatRole;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_context::test_context;

async fn start_conversation(client: &helpers::api_client::TestClient) -> String {
    let response = client.post_empty("/api/chat/conversations").await.unwrap();
    response.assert_status(StatusCode::CREATED);
    response.body.as_ref().unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_start_a_conversation(ctx: &TestContext) {
    let response = ctx.client.post_empty("/api/chat/conversations").await.unwrap();

    response.assert_status(StatusCode::CREATED);
    let body = response.body.as_ref().unwrap();
    assert!(body.get("id").is_some());
    assert_eq!(body["usage"]["session_conversations"], 1);
    assert_eq!(body["usage"]["conversation_messages"], 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reply_and_record_usage(ctx: &TestContext) {
    let id = start_conversation(&ctx.client).await;

    let response = ctx
        .client
        .post(
            &format!("/api/chat/conversations/{}/messages", id),
            &json!({ "text": "Hi" }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["conversation_id"], id.as_str());
    assert_eq!(body["message"]["sender"], "user");
    assert_eq!(body["reply"]["sender"], "assistant");
    assert_eq!(body["reply"]["text"], "You said: Hi");
    assert!(body.get("speech").is_none());
    assert_eq!(body["usage"]["session_characters"], 2);
    assert_eq!(body["usage"]["conversation_messages"], 1);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_send_system_prompt_and_history(ctx: &TestContext) {
    let id = start_conversation(&ctx.client).await;
    let path = format!("/api/chat/conversations/{}/messages", id);

    ctx.client
        .post(&path, &json!({ "text": "First question" }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);
    ctx.clock.advance(Duration::seconds(4));
    ctx.client
        .post(&path, &json!({ "text": "Second question" }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let turns = ctx.chat.last_turns();
    let roles: Vec<ChatRole> = turns.iter().map(|turn| turn.role).collect();
    assert_eq!(
        roles,
        vec![
            ChatRole::System,
            ChatRole::User,
            ChatRole::Assistant,
            ChatRole::User
        ]
    );
    assert_eq!(turns[3].content, "Second question");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_speak_reply_when_requested(ctx: &TestContext) {
    let id = start_conversation(&ctx.client).await;

    let response = ctx
        .client
        .post(
            &format!("/api/chat/conversations/{}/messages", id),
            &json!({ "text": "Hello", "speak": true }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["speech"]["provider_used"], "premium");
    assert_eq!(body["reply"]["used_premium_voice"], true);
    // "You said: Hello" is what was spoken
    assert_eq!(body["usage"]["session_premium_characters"], 15);
    assert_eq!(body["usage"]["session_characters"], 20);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_charge_a_long_premium_reply_for_its_spoken_length(ctx: &TestContext) {
    ctx.chat.set_reply("a".repeat(1_200));
    let id = start_conversation(&ctx.client).await;

    let response = ctx
        .client
        .post(
            &format!("/api/chat/conversations/{}/messages", id),
            &json!({ "text": "hi", "speak": true }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["speech"]["provider_used"], "premium");
    assert_eq!(body["usage"]["session_characters"], 1_202);
    assert_eq!(body["usage"]["session_premium_characters"], 1_200);
    // 1200 characters at 5 per word and 150 words per minute
    assert_eq!(body["usage"]["day_voice_minutes"], 1.6);
    let cost = body["usage"]["day_cost_usd"].as_f64().unwrap();
    assert!((cost - 0.36).abs() < 1e-9, "unexpected cost {}", cost);
    let reply_cost = body["reply"]["cost_usd"].as_f64().unwrap();
    assert!((reply_cost - cost).abs() < 1e-12);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_speak_a_reply_past_the_premium_cap_with_standard_voice(ctx: &TestContext) {
    // Default session premium cap is 1500 characters
    ctx.chat.set_reply("a".repeat(2_000));
    let id = start_conversation(&ctx.client).await;

    let response = ctx
        .client
        .post(
            &format!("/api/chat/conversations/{}/messages", id),
            &json!({ "text": "hi", "speak": true }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["speech"]["provider_used"], "standard");
    assert_eq!(body["reply"]["used_premium_voice"], false);
    assert_eq!(body["usage"]["session_premium_characters"], 0);
    assert_eq!(body["usage"]["session_characters"], 2_002);
    assert_eq!(ctx.premium.calls(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_text_reply_when_no_tier_can_speak(ctx: &TestContext) {
    ctx.premium.set_failing(true);
    ctx.standard.set_failing(true);
    let id = start_conversation(&ctx.client).await;

    let response = ctx
        .client
        .post(
            &format!("/api/chat/conversations/{}/messages", id),
            &json!({ "text": "Hello", "speak": true }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["reply"]["text"], "You said: Hello");
    assert!(body.get("speech").is_none());
    assert!(body.get("speech_error").is_some());
    assert_eq!(body["usage"]["session_characters"], 5);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_not_record_when_chat_provider_fails(ctx: &TestContext) {
    ctx.chat.set_failing(true);
    let id = start_conversation(&ctx.client).await;

    let response = ctx
        .client
        .post(
            &format!("/api/chat/conversations/{}/messages", id),
            &json!({ "text": "Hello" }),
        )
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_GATEWAY)
        .assert_error_message("Please try again");

    let usage = ctx.client.get("/api/usage").await.unwrap();
    assert_eq!(usage.body.as_ref().unwrap()["usage"]["session_characters"], 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_enforce_cooldown_between_messages(ctx: &TestContext) {
    let id = start_conversation(&ctx.client).await;
    let path = format!("/api/chat/conversations/{}/messages", id);

    ctx.client
        .post(&path, &json!({ "text": "One" }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let response = ctx.client.post(&path, &json!({ "text": "Two" })).await.unwrap();
    response
        .assert_status(StatusCode::TOO_MANY_REQUESTS)
        .assert_header_exists("retry-after");
    assert_limit_response(response.body.as_ref().unwrap(), "cooldown");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_cap_conversations_per_session(ctx: &TestContext) {
    for _ in 0..5 {
        start_conversation(&ctx.client).await;
    }

    let response = ctx.client.post_empty("/api/chat/conversations").await.unwrap();

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_limit_response(response.body.as_ref().unwrap(), "session_conversations");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_hide_conversations_from_other_visitors(ctx: &TestContext) {
    let owner = ctx.client.as_visitor("conversation-owner");
    let stranger = ctx.client.as_visitor("someone-else-tab");
    let id = start_conversation(&owner).await;

    let response = stranger
        .post(
            &format!("/api/chat/conversations/{}/messages", id),
            &json!({ "text": "Hijack" }),
        )
        .await
        .unwrap();
    response.assert_status(StatusCode::NOT_FOUND);

    stranger
        .delete(&format!("/api/chat/conversations/{}", id))
        .await
        .unwrap()
        .assert_status(StatusCode::NOT_FOUND);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_end_a_conversation(ctx: &TestContext) {
    let id = start_conversation(&ctx.client).await;

    ctx.client
        .delete(&format!("/api/chat/conversations/{}", id))
        .await
        .unwrap()
        .assert_status(StatusCode::NO_CONTENT);

    ctx.client
        .post(
            &format!("/api/chat/conversations/{}/messages", id),
            &json!({ "text": "Still there?" }),
        )
        .await
        .unwrap()
        .assert_status(StatusCode::NOT_FOUND);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_message(ctx: &TestContext) {
    let id = start_conversation(&ctx.client).await;

    ctx.client
        .post(
            &format!("/api/chat/conversations/{}/messages", id),
            &json!({ "text": "  " }),
        )
        .await
        .unwrap()
        .assert_status(StatusCode::BAD_REQUEST);
}
