use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Buckets are kept until their last activity is this many bucket lengths old.
const SWEEP_AGE_MULTIPLE: i64 = 2;

/// Wall-clock windows keyed by integer epoch buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Hour,
    Day,
}

impl WindowKind {
    pub fn length_ms(self) -> i64 {
        match self {
            WindowKind::Hour => HOUR_MS,
            WindowKind::Day => DAY_MS,
        }
    }

    /// `floor(epoch_ms / bucket_ms)`
    pub fn bucket_of(self, at: DateTime<Utc>) -> i64 {
        at.timestamp_millis().div_euclid(self.length_ms())
    }

    /// Milliseconds until the bucket containing `at` closes
    pub fn millis_until_next(self, at: DateTime<Utc>) -> u64 {
        let length = self.length_ms();
        (length - at.timestamp_millis().rem_euclid(length)) as u64
    }
}

/// Counters for one window instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_characters: u64,
    pub premium_characters: u64,
    pub message_count: u32,
    pub conversation_count: u32,
    pub voice_minutes_used: f64,
    pub estimated_cost_usd: f64,
    pub last_activity_at: DateTime<Utc>,
}

impl UsageStats {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            total_characters: 0,
            premium_characters: 0,
            message_count: 0,
            conversation_count: 0,
            voice_minutes_used: 0.0,
            estimated_cost_usd: 0.0,
            last_activity_at: at,
        }
    }

    fn add_message(&mut self, entry: &UsageEntry, at: DateTime<Utc>) {
        self.total_characters += entry.characters;
        self.premium_characters += entry.premium_characters;
        self.message_count += 1;
        self.voice_minutes_used += entry.voice_minutes;
        self.estimated_cost_usd += entry.cost_usd;
        self.touch(at);
    }

    fn add_conversation(&mut self, at: DateTime<Utc>) {
        self.conversation_count += 1;
        self.touch(at);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_activity_at {
            self.last_activity_at = at;
        }
    }
}

/// What one accepted message adds to every window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageEntry {
    pub characters: u64,
    pub premium_characters: u64,
    pub voice_minutes: f64,
    pub cost_usd: f64,
}

/// Point-in-time view of a visitor's counters in the current windows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub session_characters: u64,
    pub session_premium_characters: u64,
    pub session_conversations: u32,
    pub conversation_messages: u32,
    pub hour_characters: u64,
    pub day_characters: u64,
    pub day_conversations: u32,
    pub day_cost_usd: f64,
    pub day_voice_minutes: f64,
}

impl UsageSnapshot {
    /// Combine a visitor's session and window state as seen at `at`.
    /// Missing state reads as zero.
    pub fn capture(
        session: Option<&SessionUsage>,
        windows: Option<&WindowUsage>,
        at: DateTime<Utc>,
    ) -> Self {
        let hour = windows.and_then(|w| w.window(WindowKind::Hour, at));
        let day = windows.and_then(|w| w.window(WindowKind::Day, at));
        Self {
            session_characters: session.map_or(0, |s| s.stats.total_characters),
            session_premium_characters: session.map_or(0, |s| s.stats.premium_characters),
            session_conversations: session.map_or(0, |s| s.stats.conversation_count),
            conversation_messages: session.map_or(0, |s| s.conversation_messages),
            hour_characters: hour.map_or(0, |h| h.total_characters),
            day_characters: day.map_or(0, |d| d.total_characters),
            day_conversations: day.map_or(0, |d| d.conversation_count),
            day_cost_usd: day.map_or(0.0, |d| d.estimated_cost_usd),
            day_voice_minutes: day.map_or(0.0, |d| d.voice_minutes_used),
        }
    }
}

/// Usage that belongs to one visit. Discarded when the session ends.
#[derive(Debug, Clone)]
pub struct SessionUsage {
    pub stats: UsageStats,
    conversation_messages: u32,
}

impl SessionUsage {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            stats: UsageStats::new(at),
            conversation_messages: 0,
        }
    }

    pub fn conversation_messages(&self) -> u32 {
        self.conversation_messages
    }

    pub fn record_message(&mut self, entry: &UsageEntry, at: DateTime<Utc>) {
        self.stats.add_message(entry, at);
        self.conversation_messages += 1;
    }

    pub fn start_conversation(&mut self, at: DateTime<Utc>) {
        self.stats.add_conversation(at);
        self.conversation_messages = 0;
    }
}

/// Lazily created hour and day buckets plus the cooldown anchor.
///
/// Outlives the visitor's sessions: only `sweep` discards buckets.
#[derive(Debug, Clone, Default)]
pub struct WindowUsage {
    hours: BTreeMap<i64, UsageStats>,
    days: BTreeMap<i64, UsageStats>,
    last_accepted_at: Option<DateTime<Utc>>,
}

impl WindowUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats of the `kind` bucket containing `at`, if anything was recorded there
    pub fn window(&self, kind: WindowKind, at: DateTime<Utc>) -> Option<&UsageStats> {
        self.buckets(kind).get(&kind.bucket_of(at))
    }

    pub fn last_accepted_at(&self) -> Option<DateTime<Utc>> {
        self.last_accepted_at
    }

    pub fn bucket_count(&self) -> usize {
        self.hours.len() + self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bucket_count() == 0
    }

    pub fn record_message(&mut self, entry: &UsageEntry, at: DateTime<Utc>) {
        self.window_mut(WindowKind::Hour, at).add_message(entry, at);
        self.window_mut(WindowKind::Day, at).add_message(entry, at);
        self.last_accepted_at = Some(at);
    }

    pub fn start_conversation(&mut self, at: DateTime<Utc>) {
        self.window_mut(WindowKind::Hour, at).add_conversation(at);
        self.window_mut(WindowKind::Day, at).add_conversation(at);
    }

    /// Drop hour/day buckets idle for more than twice their length.
    /// Returns the number of buckets removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.bucket_count();
        for kind in [WindowKind::Hour, WindowKind::Day] {
            let max_age = chrono::Duration::milliseconds(kind.length_ms() * SWEEP_AGE_MULTIPLE);
            self.buckets_mut(kind)
                .retain(|_, stats| now - stats.last_activity_at <= max_age);
        }
        before - self.bucket_count()
    }

    fn buckets(&self, kind: WindowKind) -> &BTreeMap<i64, UsageStats> {
        match kind {
            WindowKind::Hour => &self.hours,
            WindowKind::Day => &self.days,
        }
    }

    fn buckets_mut(&mut self, kind: WindowKind) -> &mut BTreeMap<i64, UsageStats> {
        match kind {
            WindowKind::Hour => &mut self.hours,
            WindowKind::Day => &mut self.days,
        }
    }

    fn window_mut(&mut self, kind: WindowKind, at: DateTime<Utc>) -> &mut UsageStats {
        self.buckets_mut(kind)
            .entry(kind.bucket_of(at))
            .or_insert_with(|| UsageStats::new(at))
    }
}

/// How long window state may sit untouched before the sweep would have
/// discarded every bucket anyway.
pub const WINDOW_RETENTION_MS: i64 = DAY_MS * (SWEEP_AGE_MULTIPLE + 1);
