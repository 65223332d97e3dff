use chrono::{TimeZone, Utc};
use portfolio_voice_gateway::{
    controllers::{
        chat::ChatController, health::Readiness, usage::UsageController, voice::VoiceController,
    },
    domain::{
        chat::{ChatService, ChatSettings},
        usage::{Clock, ManualClock, UsageLimiter},
        voice::{AudioStore, TracingAudioReleaser, VoiceService, VoiceSynthesisDispatcher},
    },
    infrastructure::{
        config::Config,
        http::{build_router, AppControllers},
        repositories::{
            BrowserSpeechRepository, ChatRepository, ConversationRepository, TtsRepository,
            UsageRepository,
        },
    },
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use test_context::AsyncTestContext;
use tokio::net::TcpListener;

pub mod mocks;

use api_client::TestClient;
use mocks::{MockChat, MockVoice};

pub struct TestContext {
    pub client: TestClient,
    #[allow(dead_code)]
    pub config: Arc<Config>,
    pub clock: Arc<ManualClock>,
    pub premium: Arc<MockVoice>,
    pub standard: Arc<MockVoice>,
    pub chat: Arc<MockChat>,
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            // Defaults everywhere, voice cache off to keep tests independent
            let vars: HashMap<&str, &str> = HashMap::from([
                ("HOST", "127.0.0.1"),
                ("PORT", "0"),
                ("VOICE_CACHE_ENABLED", "false"),
            ]);
            let config = Arc::new(
                Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
                    .expect("Failed to build test config"),
            );

            // Tuesday noon: far from both window boundaries
            let clock = Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2024, 5, 14, 12, 0, 0).unwrap(),
            ));
            let premium = Arc::new(MockVoice::new("mock-premium"));
            let standard = Arc::new(MockVoice::new("mock-standard"));
            let chat = Arc::new(MockChat::new());

            let app = create_app(
                config.clone(),
                clock.clone(),
                premium.clone(),
                standard.clone(),
                chat.clone(),
            );

            // Start server
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("Failed to bind listener");
            let addr = listener.local_addr().expect("Failed to get local addr");
            let base_url = format!("http://{}", addr);

            tokio::spawn(async move {
                axum::serve(
                    listener,
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .await
                .unwrap();
            });

            // Wait for server to be ready
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

            Self {
                client: TestClient::new(&base_url),
                config,
                clock,
                premium,
                standard,
                chat,
            }
        }
    }

    fn teardown(self) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }
}

fn create_app(
    config: Arc<Config>,
    clock: Arc<ManualClock>,
    premium: Arc<MockVoice>,
    standard: Arc<MockVoice>,
    chat: Arc<MockChat>,
) -> axum::Router {
    let clock: Arc<dyn Clock> = clock;
    let limiter = Arc::new(
        UsageLimiter::new(
            config.rate_limit.clone(),
            config.cost_model.clone(),
            Arc::new(UsageRepository::new(config.session_idle_timeout())),
            clock.clone(),
        )
        .expect("Default policy is valid"),
    );

    let dispatcher = Arc::new(VoiceSynthesisDispatcher::new(
        Some(premium as Arc<dyn TtsRepository>),
        Some(standard as Arc<dyn TtsRepository>),
        BrowserSpeechRepository::new(config.browser_speech_lang.clone()),
        Arc::new(AudioStore::new(
            Arc::new(TracingAudioReleaser),
            config.audio_ttl(),
        )),
        config.voice_cache_enabled,
    ));

    let chat_service = Arc::new(ChatService::new(
        limiter.clone(),
        Arc::new(ConversationRepository::new(config.session_idle_timeout())),
        Some(chat as Arc<dyn ChatRepository>),
        dispatcher.clone(),
        clock,
        ChatSettings {
            system_prompt: config.chat_system_prompt.clone(),
            history_turns: config.chat_history_turns,
        },
    ));
    let voice_service = Arc::new(VoiceService::new(limiter.clone(), dispatcher.clone()));

    build_router(
        config,
        AppControllers {
            readiness: Arc::new(Readiness {
                chat_provider: Some("mock-chat"),
                dispatcher,
            }),
            usage: Arc::new(UsageController::new(limiter)),
            chat: Arc::new(ChatController::new(chat_service)),
            voice: Arc::new(VoiceController::new(voice_service)),
        },
    )
}

/// Assert a policy refusal body
#[allow(dead_code)]
pub fn assert_limit_response(response: &serde_json::Value, expected_code: &str) {
    let code = response.get("code").expect("Missing code field");
    assert_eq!(code.as_str().unwrap(), expected_code);
    assert!(response.get("message").is_some(), "Missing message");
    assert!(
        response.get("current_usage").is_some(),
        "Missing current_usage"
    );
}
