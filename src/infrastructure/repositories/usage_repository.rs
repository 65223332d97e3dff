use crate::domain::usage::{SessionUsage, WindowUsage, WINDOW_RETENTION_MS};
use crate::domain::visitor::VisitorId;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Per-visitor usage state, sharded by visitor key.
///
/// Each visitor has its own locks so counters for different visitors never
/// contend. Session state is evicted after the session idle timeout. Hour and
/// day buckets live in a separate store that outlasts idle sessions and is
/// trimmed by the sweep. When both are needed, lock the session first.
pub struct UsageRepository {
    sessions: Cache<VisitorId, Arc<Mutex<SessionUsage>>>,
    windows: Cache<VisitorId, Arc<Mutex<WindowUsage>>>,
}

impl UsageRepository {
    pub fn new(session_idle_timeout: Duration) -> Self {
        let sessions = Cache::builder()
            .time_to_idle(session_idle_timeout)
            .build();
        let windows = Cache::builder()
            .time_to_idle(Duration::from_millis(WINDOW_RETENTION_MS as u64))
            .build();

        Self { sessions, windows }
    }

    /// Existing session state for a visitor, without creating any
    pub fn find_session(&self, visitor: &VisitorId) -> Option<Arc<Mutex<SessionUsage>>> {
        self.sessions.get(visitor)
    }

    /// Existing window state for a visitor, without creating any
    pub fn find_windows(&self, visitor: &VisitorId) -> Option<Arc<Mutex<WindowUsage>>> {
        self.windows.get(visitor)
    }

    pub fn session(&self, visitor: &VisitorId, now: DateTime<Utc>) -> Arc<Mutex<SessionUsage>> {
        self.sessions
            .get_with(visitor.clone(), || Arc::new(Mutex::new(SessionUsage::new(now))))
    }

    pub fn windows(&self, visitor: &VisitorId) -> Arc<Mutex<WindowUsage>> {
        self.windows
            .get_with(visitor.clone(), || Arc::new(Mutex::new(WindowUsage::new())))
    }

    /// Discard a visitor's session window. Hour and day buckets are kept.
    pub fn end_session(&self, visitor: &VisitorId) {
        self.sessions.invalidate(visitor);
    }

    /// Run `f` against every visitor's windows, one lock at a time, and drop
    /// visitors left with no buckets. Returns the sum of what `f` returned.
    pub fn sweep_windows(&self, mut f: impl FnMut(&mut WindowUsage) -> usize) -> usize {
        let mut removed = 0;
        let mut emptied = Vec::new();
        for (visitor, windows) in self.windows.iter() {
            let mut windows = windows.lock();
            removed += f(&mut *windows);
            if windows.is_empty() {
                emptied.push(visitor);
            }
        }
        for visitor in emptied {
            self.windows.invalidate(visitor.as_ref());
        }
        removed
    }

    pub fn session_count(&self) -> u64 {
        self.sessions.run_pending_tasks();
        self.sessions.entry_count()
    }

    pub fn window_count(&self) -> u64 {
        self.windows.run_pending_tasks();
        self.windows.entry_count()
    }
}
