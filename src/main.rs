use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use portfolio_voice_gateway::controllers::{
    chat::ChatController, health::Readiness, usage::UsageController, voice::VoiceController,
};
use portfolio_voice_gateway::domain::chat::{ChatService, ChatSettings};
use portfolio_voice_gateway::domain::usage::{Clock, SystemClock, UsageLimiter};
use portfolio_voice_gateway::domain::voice::{
    AudioStore, TracingAudioReleaser, VoiceService, VoiceSynthesisDispatcher,
};
use portfolio_voice_gateway::infrastructure::config::{Config, LogFormat, TtsProvider};
use portfolio_voice_gateway::infrastructure::http::{start_http_server, AppControllers};
use portfolio_voice_gateway::infrastructure::repositories::{
    BrowserSpeechRepository, ChatRepository, ConversationRepository, ElevenLabsSettings,
    ElevenLabsVoiceRepository, OpenAiChatRepository, OpenAiTtsRepository, PollyTtsRepository,
    TtsRepository, UsageRepository,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting portfolio voice gateway on {}:{}",
        config.host,
        config.port
    );

    let config = Arc::new(config);

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Provider clients. Anything unconfigured leaves its tier empty.
    let openai_client = config.openai_api_key.as_ref().map(|key| {
        Arc::new(OpenAIClient::with_config(
            OpenAIConfig::new().with_api_key(key.clone()),
        ))
    });
    if openai_client.is_none() {
        tracing::warn!("OPENAI_API_KEY not set, chat is disabled");
    }

    let premium: Option<Arc<dyn TtsRepository>> = match &config.elevenlabs {
        Some(elevenlabs) => {
            let settings = ElevenLabsSettings {
                api_key: elevenlabs.api_key.clone(),
                voice_id: elevenlabs.voice_id.clone(),
                model_id: elevenlabs.model_id.clone(),
                base_url: elevenlabs.base_url.clone(),
                timeout: config.provider_timeout(),
            };
            match ElevenLabsVoiceRepository::new(settings) {
                Ok(repo) => Some(Arc::new(repo)),
                Err(e) => {
                    tracing::error!(error = %e, "Premium voice disabled");
                    None
                }
            }
        }
        None => {
            tracing::warn!("ELEVENLABS_API_KEY not set, premium voice is disabled");
            None
        }
    };

    let standard: Option<Arc<dyn TtsRepository>> = match config.tts_provider {
        TtsProvider::OpenAi => openai_client.as_ref().map(|client| {
            Arc::new(OpenAiTtsRepository::new(
                client.clone(),
                config.openai_tts_model.clone(),
                config.openai_tts_voice.clone(),
            )) as Arc<dyn TtsRepository>
        }),
        TtsProvider::Polly => {
            tracing::info!("Initializing AWS Polly client with region: {}", config.aws_region);
            let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_config::Region::new(config.aws_region.clone()))
                .load()
                .await;
            let polly_client = Arc::new(aws_sdk_polly::Client::new(&aws_config));
            Some(Arc::new(PollyTtsRepository::new(
                polly_client,
                config.polly_voice_id.clone(),
            )))
        }
    };
    if standard.is_none() {
        tracing::warn!("Standard voice provider not configured, falling back to browser speech");
    }

    let chat_repo: Option<Arc<dyn ChatRepository>> = openai_client.as_ref().map(|client| {
        Arc::new(OpenAiChatRepository::new(
            client.clone(),
            config.chat_model.clone(),
            config.chat_temperature,
        )) as Arc<dyn ChatRepository>
    });

    // 2. In-memory repositories
    tracing::info!("Instantiating repositories...");
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let usage_repo = Arc::new(UsageRepository::new(config.session_idle_timeout()));
    let conversations = Arc::new(ConversationRepository::new(config.session_idle_timeout()));
    let audio_store = Arc::new(AudioStore::new(
        Arc::new(TracingAudioReleaser),
        config.audio_ttl(),
    ));

    // 3. Services
    tracing::info!("Instantiating services...");
    let limiter = Arc::new(UsageLimiter::new(
        config.rate_limit.clone(),
        config.cost_model.clone(),
        usage_repo,
        clock.clone(),
    )?);
    limiter.spawn_sweeper(config.sweep_interval());
    spawn_audio_purge(audio_store.clone(), config.sweep_interval());

    let dispatcher = Arc::new(VoiceSynthesisDispatcher::new(
        premium,
        standard,
        BrowserSpeechRepository::new(config.browser_speech_lang.clone()),
        audio_store,
        config.voice_cache_enabled,
    ));
    let chat_provider = chat_repo.as_ref().map(|repo| repo.provider());
    let chat_service = Arc::new(ChatService::new(
        limiter.clone(),
        conversations,
        chat_repo,
        dispatcher.clone(),
        clock,
        ChatSettings {
            system_prompt: config.chat_system_prompt.clone(),
            history_turns: config.chat_history_turns,
        },
    ));
    let voice_service = Arc::new(VoiceService::new(limiter.clone(), dispatcher.clone()));

    // 4. Controllers
    tracing::info!("Instantiating controllers...");
    let controllers = AppControllers {
        readiness: Arc::new(Readiness {
            chat_provider,
            dispatcher,
        }),
        usage: Arc::new(UsageController::new(limiter)),
        chat: Arc::new(ChatController::new(chat_service)),
        voice: Arc::new(VoiceController::new(voice_service)),
    };

    // Start HTTP server with all routes
    start_http_server(config, controllers).await?;

    Ok(())
}

/// Expired audio is also evicted lazily; this keeps the release log timely
fn spawn_audio_purge(audio_store: Arc<AudioStore>, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            audio_store.purge_expired();
        }
    });
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "portfolio_voice_gateway=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "portfolio_voice_gateway=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
