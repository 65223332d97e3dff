use super::clock::Clock;
use super::policy::{CostModel, PolicyError, RateLimitPolicy};
use super::window::{UsageEntry, UsageSnapshot, WindowKind};
use crate::domain::visitor::VisitorId;
use crate::domain::voice::VoiceTier;
use crate::infrastructure::repositories::UsageRepository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Why a request was refused. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitViolation {
    MessageTooLong,
    Cooldown,
    SessionCharacters,
    HourlyCharacters,
    DailyCharacters,
    DailyCost,
    DailyVoiceMinutes,
    SessionPremiumCharacters,
    SessionConversations,
    DailyConversations,
    ConversationMessages,
}

impl LimitViolation {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MessageTooLong => "Message is too long",
            Self::Cooldown => "Please wait a moment before sending another message",
            Self::SessionCharacters => "Session character limit reached",
            Self::HourlyCharacters => "Hourly character limit reached",
            Self::DailyCharacters => "Daily character limit reached",
            Self::DailyCost => "Daily usage budget reached",
            Self::DailyVoiceMinutes => "Daily premium voice minutes used up",
            Self::SessionPremiumCharacters => "Premium voice limit for this session reached",
            Self::SessionConversations => "Conversation limit for this session reached",
            Self::DailyConversations => "Daily conversation limit reached",
            Self::ConversationMessages => "Message limit for this conversation reached",
        }
    }

    /// Violations that only apply to the premium voice tier
    pub fn is_premium_only(&self) -> bool {
        matches!(self, Self::DailyVoiceMinutes | Self::SessionPremiumCharacters)
    }
}

/// Proof that a message passed `check_limit`. Recording consumes it, so an
/// accepted message can be recorded at most once.
#[must_use = "an admission must be recorded once the request is served"]
#[derive(Debug)]
pub struct Admission {
    visitor: VisitorId,
    characters: u64,
    reply_characters: u64,
    premium_voice: bool,
    provider_cost: bool,
    usage: UsageSnapshot,
}

impl Admission {
    pub fn visitor(&self) -> &VisitorId {
        &self.visitor
    }

    pub fn characters(&self) -> u64 {
        self.characters
    }

    /// Characters a voice tier would speak: the admitted reply when there
    /// is one, otherwise the checked text itself.
    pub fn spoken_characters(&self) -> u64 {
        if self.reply_characters > 0 {
            self.reply_characters
        } else {
            self.characters
        }
    }

    /// Whether the premium voice tier may serve this message
    pub fn allows_premium_voice(&self) -> bool {
        self.premium_voice
    }

    pub fn usage(&self) -> &UsageSnapshot {
        &self.usage
    }

    /// The audio came out of the tier-2 cache, so no provider was billed.
    /// Characters and voice minutes are still counted.
    pub fn served_from_cache(mut self) -> Self {
        self.provider_cost = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitDenial {
    pub violation: LimitViolation,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    pub current_usage: UsageSnapshot,
}

#[derive(Debug)]
pub enum LimitDecision {
    Allowed(Admission),
    Denied(LimitDenial),
}

impl LimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, LimitDecision::Allowed(_))
    }

    pub fn violation(&self) -> Option<LimitViolation> {
        match self {
            LimitDecision::Allowed(_) => None,
            LimitDecision::Denied(denial) => Some(denial.violation),
        }
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            LimitDecision::Allowed(_) => None,
            LimitDecision::Denied(denial) => denial.retry_after_ms,
        }
    }

    pub fn current_usage(&self) -> &UsageSnapshot {
        match self {
            LimitDecision::Allowed(admission) => &admission.usage,
            LimitDecision::Denied(denial) => &denial.current_usage,
        }
    }
}

/// Gates voice/chat requests against the configured policy and records
/// approved usage per visitor.
pub struct UsageLimiter {
    policy: RateLimitPolicy,
    cost_model: CostModel,
    usage_repo: Arc<UsageRepository>,
    clock: Arc<dyn Clock>,
}

impl UsageLimiter {
    pub fn new(
        policy: RateLimitPolicy,
        cost_model: CostModel,
        usage_repo: Arc<UsageRepository>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PolicyError> {
        policy.validate()?;
        cost_model.validate()?;

        Ok(Self {
            policy,
            cost_model,
            usage_repo,
            clock,
        })
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    /// Evaluate a message against every limit. Never mutates counters.
    pub fn check_limit(
        &self,
        visitor: &VisitorId,
        text: &str,
        use_high_tier_voice: bool,
    ) -> LimitDecision {
        let now = self.clock.now();
        let characters = text.chars().count() as u64;

        let (current_usage, last_accepted_at) = self.current(visitor, now);
        match self.evaluate(&current_usage, last_accepted_at, now, characters, use_high_tier_voice) {
            Ok(()) => LimitDecision::Allowed(Admission {
                visitor: visitor.clone(),
                characters,
                reply_characters: 0,
                premium_voice: use_high_tier_voice,
                provider_cost: true,
                usage: current_usage,
            }),
            Err((violation, retry_after_ms)) => {
                tracing::info!(
                    visitor = %visitor,
                    violation = ?violation,
                    retry_after_ms = ?retry_after_ms,
                    characters = characters,
                    "Usage limit reached"
                );
                LimitDecision::Denied(LimitDenial {
                    violation,
                    reason: violation.reason().to_string(),
                    retry_after_ms,
                    current_usage,
                })
            }
        }
    }

    /// Check for a voice request, degrading from premium to standard voice
    /// when a premium-specific cap or the premium price is what failed.
    pub fn check_voice_limit(
        &self,
        visitor: &VisitorId,
        text: &str,
        prefer_premium: bool,
    ) -> LimitDecision {
        let decision = self.check_limit(visitor, text, prefer_premium);
        match decision.violation() {
            Some(violation)
                if prefer_premium
                    && (violation.is_premium_only() || violation == LimitViolation::DailyCost) =>
            {
                tracing::info!(
                    visitor = %visitor,
                    violation = ?violation,
                    "Premium voice unavailable, checking standard voice"
                );
                self.check_limit(visitor, text, false)
            }
            _ => decision,
        }
    }

    /// Extend an admitted chat message so its reply may be spoken too.
    ///
    /// The prepared reply counts toward the character windows and is priced
    /// as voice at the tier it may use. Length, cooldown and conversation
    /// gates were already passed by the message itself. Premium degrades to
    /// standard voice the same way `check_voice_limit` does. On denial the
    /// untouched admission comes back so the text reply can still be recorded.
    pub fn admit_reply_speech(
        &self,
        admission: Admission,
        reply: &str,
        prefer_premium: bool,
    ) -> Result<Admission, (Admission, LimitDenial)> {
        let now = self.clock.now();
        let reply_characters = reply.chars().count() as u64;
        let (current_usage, _) = self.current(&admission.visitor, now);
        let window_characters = admission.characters + reply_characters;

        let mut premium = prefer_premium;
        let mut outcome =
            self.check_budget(&current_usage, now, window_characters, reply_characters, premium);
        if let Err((violation, _)) = outcome {
            if premium && (violation.is_premium_only() || violation == LimitViolation::DailyCost) {
                premium = false;
                outcome = self.check_budget(
                    &current_usage,
                    now,
                    window_characters,
                    reply_characters,
                    false,
                );
            }
        }

        match outcome {
            Ok(()) => Ok(Admission {
                reply_characters,
                premium_voice: premium,
                usage: current_usage,
                ..admission
            }),
            Err((violation, retry_after_ms)) => {
                tracing::info!(
                    visitor = %admission.visitor,
                    violation = ?violation,
                    reply_characters = reply_characters,
                    "Reply too costly to speak"
                );
                let denial = LimitDenial {
                    violation,
                    reason: violation.reason().to_string(),
                    retry_after_ms,
                    current_usage,
                };
                Err((admission, denial))
            }
        }
    }

    /// Estimated provider spend for serving `admission` with `served_by`
    pub fn charge_for(&self, admission: &Admission, served_by: Option<VoiceTier>) -> f64 {
        if !admission.provider_cost {
            return 0.0;
        }
        self.cost_model
            .estimate_cost(admission.spoken_characters(), served_by)
    }

    /// Add an accepted message to the session, hour and day counters.
    ///
    /// `served_by` is the voice tier that spoke the message, or `None` for a
    /// text-only reply. Only paid tiers carry cost, only premium accrues
    /// voice minutes. An admitted reply that nobody spoke is not counted.
    pub fn record_usage(&self, admission: Admission, served_by: Option<VoiceTier>) -> UsageSnapshot {
        let now = self.clock.now();
        let spoken = admission.spoken_characters();
        let characters = match served_by {
            Some(_) => admission.characters + admission.reply_characters,
            None => admission.characters,
        };
        let premium = served_by == Some(VoiceTier::Premium);

        let entry = UsageEntry {
            characters,
            premium_characters: if premium { spoken } else { 0 },
            voice_minutes: if premium {
                self.cost_model.estimate_minutes(spoken)
            } else {
                0.0
            },
            cost_usd: self.charge_for(&admission, served_by),
        };

        let session_shard = self.usage_repo.session(&admission.visitor, now);
        let window_shard = self.usage_repo.windows(&admission.visitor);
        let mut session = session_shard.lock();
        let mut windows = window_shard.lock();
        session.record_message(&entry, now);
        windows.record_message(&entry, now);
        let snapshot = UsageSnapshot::capture(Some(&*session), Some(&*windows), now);

        tracing::debug!(
            visitor = %admission.visitor,
            characters = characters,
            served_by = ?served_by,
            cost_usd = entry.cost_usd,
            session_characters = snapshot.session_characters,
            "Usage recorded"
        );

        snapshot
    }

    /// Open a new conversation if the session and daily caps allow it.
    /// Returns false without touching any counter otherwise.
    pub fn start_conversation(&self, visitor: &VisitorId) -> bool {
        let now = self.clock.now();
        let session_shard = self.usage_repo.session(visitor, now);
        let window_shard = self.usage_repo.windows(visitor);
        let mut session = session_shard.lock();
        let mut windows = window_shard.lock();

        let session_count = session.stats.conversation_count;
        let day_count = windows
            .window(WindowKind::Day, now)
            .map_or(0, |day| day.conversation_count);

        if session_count >= self.policy.max_conversations_per_session
            || day_count >= self.policy.max_conversations_per_day
        {
            tracing::info!(
                visitor = %visitor,
                session_conversations = session_count,
                day_conversations = day_count,
                "Conversation limit reached"
            );
            return false;
        }

        session.start_conversation(now);
        windows.start_conversation(now);
        true
    }

    /// Explain a refused `start_conversation` to the caller
    pub fn conversation_denial(&self, visitor: &VisitorId) -> LimitDenial {
        let now = self.clock.now();
        let current_usage = self.usage(visitor);
        let (violation, retry_after_ms) =
            if current_usage.session_conversations >= self.policy.max_conversations_per_session {
                (LimitViolation::SessionConversations, None)
            } else {
                (
                    LimitViolation::DailyConversations,
                    Some(WindowKind::Day.millis_until_next(now)),
                )
            };

        LimitDenial {
            violation,
            reason: violation.reason().to_string(),
            retry_after_ms,
            current_usage,
        }
    }

    pub fn usage(&self, visitor: &VisitorId) -> UsageSnapshot {
        self.current(visitor, self.clock.now()).0
    }

    /// Milliseconds until the hour and day windows roll over
    pub fn window_resets(&self) -> (u64, u64) {
        let now = self.clock.now();
        (
            WindowKind::Hour.millis_until_next(now),
            WindowKind::Day.millis_until_next(now),
        )
    }

    /// Close the visitor's session window. Hour and day usage, and the
    /// cooldown, carry over into the next session.
    pub fn end_session(&self, visitor: &VisitorId) {
        self.usage_repo.end_session(visitor);
        tracing::info!(visitor = %visitor, "Usage session ended");
    }

    /// Discard stale hour/day buckets for every visitor
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let removed = self.usage_repo.sweep_windows(|windows| windows.sweep(now));

        tracing::debug!(
            removed_buckets = removed,
            sessions = self.usage_repo.session_count(),
            visitors_with_windows = self.usage_repo.window_count(),
            "Usage sweep finished"
        );
        removed
    }

    pub fn spawn_sweeper(self: &Arc<Self>, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                limiter.sweep();
            }
        })
    }

    /// Snapshot plus cooldown anchor, reading whatever state exists
    fn current(
        &self,
        visitor: &VisitorId,
        now: DateTime<Utc>,
    ) -> (UsageSnapshot, Option<DateTime<Utc>>) {
        let session_shard = self.usage_repo.find_session(visitor);
        let window_shard = self.usage_repo.find_windows(visitor);
        let session = session_shard.as_ref().map(|shard| shard.lock());
        let windows = window_shard.as_ref().map(|shard| shard.lock());

        let snapshot = UsageSnapshot::capture(session.as_deref(), windows.as_deref(), now);
        let last_accepted_at = windows.as_ref().and_then(|w| w.last_accepted_at());
        (snapshot, last_accepted_at)
    }

    fn evaluate(
        &self,
        current: &UsageSnapshot,
        last_accepted_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        characters: u64,
        use_high_tier_voice: bool,
    ) -> Result<(), (LimitViolation, Option<u64>)> {
        let policy = &self.policy;

        if characters > policy.max_characters_per_message {
            return Err((LimitViolation::MessageTooLong, None));
        }

        if let Some(last) = last_accepted_at {
            let elapsed = now - last;
            let cooldown = policy.cooldown();
            if elapsed < cooldown {
                let remaining = (cooldown - elapsed).num_milliseconds().max(1) as u64;
                return Err((LimitViolation::Cooldown, Some(remaining)));
            }
        }

        self.check_budget(current, now, characters, characters, use_high_tier_voice)?;

        let until_tomorrow = Some(WindowKind::Day.millis_until_next(now));

        if current.session_conversations > policy.max_conversations_per_session {
            return Err((LimitViolation::SessionConversations, None));
        }

        if current.day_conversations > policy.max_conversations_per_day {
            return Err((LimitViolation::DailyConversations, until_tomorrow));
        }

        if current.conversation_messages >= policy.max_messages_per_conversation {
            return Err((LimitViolation::ConversationMessages, None));
        }

        Ok(())
    }

    /// Character, cost and premium caps. `characters` is what the windows
    /// would gain, `voiced` what a voice tier would speak.
    fn check_budget(
        &self,
        current: &UsageSnapshot,
        now: DateTime<Utc>,
        characters: u64,
        voiced: u64,
        use_high_tier_voice: bool,
    ) -> Result<(), (LimitViolation, Option<u64>)> {
        let policy = &self.policy;

        if current.session_characters + characters > policy.max_characters_per_session {
            return Err((LimitViolation::SessionCharacters, None));
        }

        if current.hour_characters + characters > policy.max_characters_per_hour {
            return Err((
                LimitViolation::HourlyCharacters,
                Some(WindowKind::Hour.millis_until_next(now)),
            ));
        }

        let until_tomorrow = Some(WindowKind::Day.millis_until_next(now));

        if current.day_characters + characters > policy.max_characters_per_day {
            return Err((LimitViolation::DailyCharacters, until_tomorrow));
        }

        // Non-premium requests are priced as standard voice, the most a
        // fallback can cost.
        let tier = if use_high_tier_voice {
            VoiceTier::Premium
        } else {
            VoiceTier::Standard
        };
        let estimated_cost = self.cost_model.estimate_cost(voiced, Some(tier));
        if current.day_cost_usd + estimated_cost > policy.max_cost_per_day_usd {
            return Err((LimitViolation::DailyCost, until_tomorrow));
        }

        if use_high_tier_voice {
            let minutes = self.cost_model.estimate_minutes(voiced);
            if current.day_voice_minutes + minutes > policy.max_voice_minutes_per_day {
                return Err((LimitViolation::DailyVoiceMinutes, until_tomorrow));
            }
            if current.session_premium_characters + voiced
                > policy.max_premium_characters_per_session
            {
                return Err((LimitViolation::SessionPremiumCharacters, None));
            }
        }

        Ok(())
    }
}
