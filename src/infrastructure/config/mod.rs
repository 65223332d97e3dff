use crate::domain::usage::{CostModel, PolicyError, RateLimitPolicy};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SYSTEM_PROMPT: &str = "You are the assistant on a developer's portfolio site. \
Answer questions about their projects, skills and experience briefly and in plain language.";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub log_format: LogFormat,
    /// Honour `x-forwarded-for` when deriving visitor keys (behind a proxy)
    pub trust_forwarded_for: bool,
    pub cors_allowed_origins: Vec<String>,
    // Chat
    pub openai_api_key: Option<String>,
    pub chat_model: String,
    pub chat_temperature: f32,
    pub chat_system_prompt: String,
    pub chat_history_turns: usize,
    // Voice tiers
    pub elevenlabs: Option<ElevenLabsConfig>,
    pub tts_provider: TtsProvider,
    pub openai_tts_model: String,
    pub openai_tts_voice: String,
    pub aws_region: String,
    pub polly_voice_id: String,
    pub voice_cache_enabled: bool,
    pub browser_speech_lang: String,
    // Usage policy
    pub rate_limit: RateLimitPolicy,
    pub cost_model: CostModel,
    // Background timings
    pub sweep_interval_secs: u64,
    pub session_idle_timeout_secs: u64,
    pub audio_ttl_secs: u64,
    pub provider_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Provider behind the standard voice tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TtsProvider {
    OpenAi,
    Polly,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("invalid usage policy: {0}")]
    Policy(#[from] PolicyError),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build and validate the configuration from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);
        let defaults = RateLimitPolicy::default();
        let cost_defaults = CostModel::default();

        let elevenlabs = vars.non_empty("ELEVENLABS_API_KEY").map(|api_key| ElevenLabsConfig {
            api_key,
            voice_id: vars.string("ELEVENLABS_VOICE_ID", "21m00Tcm4TlvDq8ikWAM"),
            model_id: vars.string("ELEVENLABS_MODEL_ID", "eleven_turbo_v2_5"),
            base_url: vars.string("ELEVENLABS_BASE_URL", "https://api.elevenlabs.io"),
        });

        let config = Config {
            host: vars.string("HOST", "0.0.0.0"),
            port: vars.parse("PORT", 8080)?,
            environment: match vars.string("ENVIRONMENT", "development").as_str() {
                "production" => Environment::Production,
                _ => Environment::Development,
            },
            log_format: match vars.string("LOG_FORMAT", "pretty").as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            trust_forwarded_for: vars.flag("TRUST_FORWARDED_FOR", false),
            cors_allowed_origins: vars
                .string("CORS_ALLOWED_ORIGINS", "")
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            openai_api_key: vars.non_empty("OPENAI_API_KEY"),
            chat_model: vars.string("CHAT_MODEL", "gpt-4o-mini"),
            chat_temperature: vars.parse("CHAT_TEMPERATURE", 0.7)?,
            chat_system_prompt: vars.string("CHAT_SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT),
            chat_history_turns: vars.parse("CHAT_HISTORY_TURNS", 10)?,
            elevenlabs,
            tts_provider: match vars.string("TTS_PROVIDER", "openai").to_lowercase().as_str() {
                "openai" => TtsProvider::OpenAi,
                "polly" => TtsProvider::Polly,
                other => {
                    return Err(ConfigError::Invalid {
                        name: "TTS_PROVIDER",
                        value: other.to_string(),
                    })
                }
            },
            openai_tts_model: vars.string("OPENAI_TTS_MODEL", "tts-1"),
            openai_tts_voice: vars.string("OPENAI_TTS_VOICE", "alloy"),
            aws_region: vars.string("AWS_REGION", "eu-west-1"),
            polly_voice_id: vars.string("POLLY_VOICE_ID", "Joanna"),
            voice_cache_enabled: vars.flag("VOICE_CACHE_ENABLED", true),
            browser_speech_lang: vars.string("BROWSER_SPEECH_LANG", "en-US"),
            rate_limit: RateLimitPolicy {
                max_characters_per_message: vars
                    .parse("MAX_CHARACTERS_PER_MESSAGE", defaults.max_characters_per_message)?,
                max_characters_per_session: vars
                    .parse("MAX_CHARACTERS_PER_SESSION", defaults.max_characters_per_session)?,
                max_characters_per_hour: vars
                    .parse("MAX_CHARACTERS_PER_HOUR", defaults.max_characters_per_hour)?,
                max_characters_per_day: vars
                    .parse("MAX_CHARACTERS_PER_DAY", defaults.max_characters_per_day)?,
                max_cost_per_day_usd: vars
                    .parse("MAX_COST_PER_DAY_USD", defaults.max_cost_per_day_usd)?,
                cooldown_between_messages_secs: vars.parse(
                    "COOLDOWN_BETWEEN_MESSAGES_SECS",
                    defaults.cooldown_between_messages_secs,
                )?,
                max_conversations_per_session: vars.parse(
                    "MAX_CONVERSATIONS_PER_SESSION",
                    defaults.max_conversations_per_session,
                )?,
                max_conversations_per_day: vars
                    .parse("MAX_CONVERSATIONS_PER_DAY", defaults.max_conversations_per_day)?,
                max_messages_per_conversation: vars.parse(
                    "MAX_MESSAGES_PER_CONVERSATION",
                    defaults.max_messages_per_conversation,
                )?,
                max_voice_minutes_per_day: vars
                    .parse("MAX_VOICE_MINUTES_PER_DAY", defaults.max_voice_minutes_per_day)?,
                max_premium_characters_per_session: vars.parse(
                    "MAX_PREMIUM_CHARACTERS_PER_SESSION",
                    defaults.max_premium_characters_per_session,
                )?,
            },
            cost_model: CostModel {
                premium_cost_per_character_usd: vars.parse(
                    "PREMIUM_COST_PER_CHARACTER_USD",
                    cost_defaults.premium_cost_per_character_usd,
                )?,
                standard_cost_per_character_usd: vars.parse(
                    "STANDARD_COST_PER_CHARACTER_USD",
                    cost_defaults.standard_cost_per_character_usd,
                )?,
                characters_per_word: vars
                    .parse("CHARACTERS_PER_WORD", cost_defaults.characters_per_word)?,
                words_per_minute: vars.parse("WORDS_PER_MINUTE", cost_defaults.words_per_minute)?,
            },
            sweep_interval_secs: vars.parse("SWEEP_INTERVAL_SECS", 300)?,
            session_idle_timeout_secs: vars.parse("SESSION_IDLE_TIMEOUT_SECS", 30 * 60)?,
            audio_ttl_secs: vars.parse("AUDIO_TTL_SECS", 5 * 60)?,
            provider_timeout_secs: vars.parse("PROVIDER_TIMEOUT_SECS", 15)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.validate()?;
        self.cost_model.validate()?;

        let timings = [
            ("SWEEP_INTERVAL_SECS", self.sweep_interval_secs),
            ("SESSION_IDLE_TIMEOUT_SECS", self.session_idle_timeout_secs),
            ("AUDIO_TTL_SECS", self.audio_ttl_secs),
            ("PROVIDER_TIMEOUT_SECS", self.provider_timeout_secs),
        ];
        for (name, value) in timings {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: value.to_string(),
                });
            }
        }

        if !(0.0..=2.0).contains(&self.chat_temperature) {
            return Err(ConfigError::Invalid {
                name: "CHAT_TEMPERATURE",
                value: self.chat_temperature.to_string(),
            });
        }

        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn audio_ttl(&self) -> Duration {
        Duration::from_secs(self.audio_ttl_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn string(&self, name: &str, default: &str) -> String {
        (self.0)(name).unwrap_or_else(|| default.to_string())
    }

    fn non_empty(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn flag(&self, name: &str, default: bool) -> bool {
        (self.0)(name)
            .map(|value| matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(default)
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match (self.0)(name) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                name,
                value,
            }),
        }
    }
}
