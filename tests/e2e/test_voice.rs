use crate::e2e::helpers;

use chrono::Duration;
use helpers::{assert_limit_response, TestContext};
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_speak_with_premium_voice_first(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/voice/speak", &json!({ "text": "Hello there" }))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["provider_used"], "premium");
    assert_eq!(body["audio"]["content_type"], "audio/mpeg");
    assert!(body.get("client_speech").is_none());
    assert_eq!(body["attempts"][0]["outcome"], "served");
    assert_eq!(body["usage"]["session_premium_characters"], 11);
    assert_eq!(ctx.standard.calls(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_serve_audio_bytes_until_released(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/voice/speak", &json!({ "text": "Hello there" }))
        .await
        .unwrap();
    let url = response.body.as_ref().unwrap()["audio"]["url"]
        .as_str()
        .unwrap()
        .to_string();

    let audio = ctx.client.get(&url).await.unwrap();
    audio
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/mpeg")
        .assert_header("cache-control", "no-store")
        .assert_header("x-voice-tier", "premium");
    assert_eq!(audio.body_bytes, b"mock-premium:Hello there".to_vec());

    let ended = ctx.client.post_empty(&format!("{}/ended", url)).await.unwrap();
    ended.assert_status(StatusCode::OK);
    assert_eq!(ended.body.as_ref().unwrap()["released"], true);

    ctx.client
        .get(&url)
        .await
        .unwrap()
        .assert_status(StatusCode::NOT_FOUND);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_release_audio_only_once(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/voice/speak", &json!({ "text": "Stop me" }))
        .await
        .unwrap();
    let url = response.body.as_ref().unwrap()["audio"]["url"]
        .as_str()
        .unwrap()
        .to_string();

    let stopped = ctx.client.delete(&url).await.unwrap();
    assert_eq!(stopped.body.as_ref().unwrap()["released"], true);

    // Playback end racing the stop is a no-op
    let ended = ctx.client.post_empty(&format!("{}/ended", url)).await.unwrap();
    ended.assert_status(StatusCode::OK);
    assert_eq!(ended.body.as_ref().unwrap()["released"], false);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_fall_back_to_standard_voice(ctx: &TestContext) {
    ctx.premium.set_failing(true);

    let response = ctx
        .client
        .post("/api/voice/speak", &json!({ "text": "Fallback please" }))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["provider_used"], "standard");
    assert_eq!(body["attempts"][0]["tier"], "premium");
    assert_eq!(body["attempts"][0]["outcome"], "failed");
    assert_eq!(body["attempts"][1]["tier"], "standard");
    assert_eq!(body["attempts"][1]["outcome"], "served");
    assert_eq!(body["usage"]["session_premium_characters"], 0);
    assert_eq!(body["usage"]["session_characters"], 15);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_skip_premium_when_not_preferred(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/voice/speak",
            &json!({ "text": "Standard only", "prefer_premium": false }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["provider_used"], "standard");
    assert_eq!(body["attempts"][0]["outcome"], "skipped");
    assert_eq!(ctx.premium.calls(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_hand_off_to_browser_speech(ctx: &TestContext) {
    ctx.premium.set_failing(true);
    ctx.standard.set_failing(true);

    let response = ctx
        .client
        .post(
            "/api/voice/speak",
            &json!({ "text": "Read **this** aloud", "browser_speech_supported": true }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["provider_used"], "browser");
    assert!(body.get("audio").is_none());
    assert_eq!(body["client_speech"]["text"], "Read this aloud");
    assert_eq!(body["client_speech"]["lang"], "en-US");
    assert_eq!(body["attempts"].as_array().unwrap().len(), 3);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_unsupported_speech_without_recording(ctx: &TestContext) {
    ctx.premium.set_failing(true);
    ctx.standard.set_failing(true);
    let client = ctx.client.as_visitor("no-speech-visitor");

    let response = client
        .post("/api/voice/speak", &json!({ "text": "Anyone there?" }))
        .await
        .unwrap();

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let usage = client.get("/api/usage").await.unwrap();
    assert_eq!(usage.body.as_ref().unwrap()["usage"]["session_characters"], 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_enforce_cooldown_between_requests(ctx: &TestContext) {
    ctx.client
        .post("/api/voice/speak", &json!({ "text": "First" }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let response = ctx
        .client
        .post("/api/voice/speak", &json!({ "text": "Second" }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::TOO_MANY_REQUESTS)
        .assert_header("retry-after", "3");
    let body = response.body.as_ref().unwrap();
    assert_limit_response(body, "cooldown");
    assert_eq!(body["retry_after_ms"], 3000);
    assert_eq!(body["current_usage"]["session_characters"], 5);

    ctx.clock.advance(Duration::seconds(4));

    let response = ctx
        .client
        .post("/api/voice/speak", &json!({ "text": "Second" }))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.body.as_ref().unwrap()["usage"]["session_characters"], 11);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_too_long_text_with_413(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/voice/speak", &json!({ "text": "a".repeat(501) }))
        .await
        .unwrap();

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_limit_response(response.body.as_ref().unwrap(), "message_too_long");
    assert_eq!(ctx.premium.calls(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_text(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/voice/speak", &json!({ "text": "" }))
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_404_for_unknown_audio(ctx: &TestContext) {
    let response = ctx
        .client
        .get(&format!("/api/voice/audio/{}", uuid::Uuid::new_v4()))
        .await
        .unwrap();

    response.assert_status(StatusCode::NOT_FOUND);
}
