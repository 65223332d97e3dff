use crate::domain::voice::VoiceTier;
use serde::{Deserialize, Serialize};

/// Static usage limits, validated once when the limiter is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub max_characters_per_message: u64,
    pub max_characters_per_session: u64,
    pub max_characters_per_hour: u64,
    pub max_characters_per_day: u64,
    pub max_cost_per_day_usd: f64,
    pub cooldown_between_messages_secs: u64,
    pub max_conversations_per_session: u32,
    pub max_conversations_per_day: u32,
    pub max_messages_per_conversation: u32,
    pub max_voice_minutes_per_day: f64,
    pub max_premium_characters_per_session: u64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_characters_per_message: 500,
            max_characters_per_session: 3_000,
            max_characters_per_hour: 10_000,
            max_characters_per_day: 25_000,
            max_cost_per_day_usd: 5.0,
            cooldown_between_messages_secs: 3,
            max_conversations_per_session: 5,
            max_conversations_per_day: 20,
            max_messages_per_conversation: 20,
            max_voice_minutes_per_day: 10.0,
            max_premium_characters_per_session: 1_500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be a finite, non-negative number (got {value})")]
    InvalidNumber { field: &'static str, value: f64 },

    #[error("{wider} ({wider_value}) must be at least {narrower} ({narrower_value})")]
    NotWidening {
        wider: &'static str,
        wider_value: u64,
        narrower: &'static str,
        narrower_value: u64,
    },
}

impl RateLimitPolicy {
    /// Reject out-of-range values. Limits must widen as the window widens.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let counts: [(&'static str, u64); 7] = [
            ("max_characters_per_message", self.max_characters_per_message),
            ("max_characters_per_session", self.max_characters_per_session),
            ("max_characters_per_hour", self.max_characters_per_hour),
            ("max_characters_per_day", self.max_characters_per_day),
            (
                "max_conversations_per_session",
                self.max_conversations_per_session as u64,
            ),
            ("max_conversations_per_day", self.max_conversations_per_day as u64),
            (
                "max_messages_per_conversation",
                self.max_messages_per_conversation as u64,
            ),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(PolicyError::Zero { field });
            }
        }

        check_amount("max_cost_per_day_usd", self.max_cost_per_day_usd)?;
        check_amount("max_voice_minutes_per_day", self.max_voice_minutes_per_day)?;

        let widening = [
            (
                ("max_characters_per_session", self.max_characters_per_session),
                ("max_characters_per_message", self.max_characters_per_message),
            ),
            (
                ("max_characters_per_hour", self.max_characters_per_hour),
                ("max_characters_per_message", self.max_characters_per_message),
            ),
            (
                ("max_characters_per_day", self.max_characters_per_day),
                ("max_characters_per_session", self.max_characters_per_session),
            ),
            (
                ("max_characters_per_day", self.max_characters_per_day),
                ("max_characters_per_hour", self.max_characters_per_hour),
            ),
            (
                (
                    "max_conversations_per_day",
                    self.max_conversations_per_day as u64,
                ),
                (
                    "max_conversations_per_session",
                    self.max_conversations_per_session as u64,
                ),
            ),
        ];
        for ((wider, wider_value), (narrower, narrower_value)) in widening {
            if wider_value < narrower_value {
                return Err(PolicyError::NotWidening {
                    wider,
                    wider_value,
                    narrower,
                    narrower_value,
                });
            }
        }

        Ok(())
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_between_messages_secs as i64)
    }
}

/// Heuristics used to turn a character count into spend and speaking time.
///
/// These are estimates chosen by configuration, not provider billing. They
/// only need to be good enough to keep paid voice usage bounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub premium_cost_per_character_usd: f64,
    pub standard_cost_per_character_usd: f64,
    pub characters_per_word: f64,
    pub words_per_minute: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            premium_cost_per_character_usd: 0.000_3,
            standard_cost_per_character_usd: 0.000_015,
            characters_per_word: 5.0,
            words_per_minute: 150.0,
        }
    }
}

impl CostModel {
    pub fn validate(&self) -> Result<(), PolicyError> {
        check_amount(
            "premium_cost_per_character_usd",
            self.premium_cost_per_character_usd,
        )?;
        check_amount(
            "standard_cost_per_character_usd",
            self.standard_cost_per_character_usd,
        )?;
        check_positive("characters_per_word", self.characters_per_word)?;
        check_positive("words_per_minute", self.words_per_minute)?;
        Ok(())
    }

    /// Estimated speaking time for `characters` of text
    pub fn estimate_minutes(&self, characters: u64) -> f64 {
        characters as f64 / self.characters_per_word / self.words_per_minute
    }

    /// Estimated spend for `characters` served by `tier`. Browser speech and
    /// text-only replies are free.
    pub fn estimate_cost(&self, characters: u64, tier: Option<VoiceTier>) -> f64 {
        let rate = match tier {
            Some(VoiceTier::Premium) => self.premium_cost_per_character_usd,
            Some(VoiceTier::Standard) => self.standard_cost_per_character_usd,
            Some(VoiceTier::Browser) | None => 0.0,
        };
        characters as f64 * rate
    }
}

fn check_amount(field: &'static str, value: f64) -> Result<(), PolicyError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PolicyError::InvalidNumber { field, value })
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), PolicyError> {
    check_amount(field, value)?;
    if value == 0.0 {
        return Err(PolicyError::Zero { field });
    }
    Ok(())
}
