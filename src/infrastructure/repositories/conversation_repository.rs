use crate::domain::chat::ConversationSession;
use moka::future::Cache;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const MAX_CONVERSATIONS: u64 = 10_000;

/// Live conversations, kept in memory only.
///
/// Conversations nobody touched for the idle timeout are dropped, the same
/// as a widget that was closed without saying so.
pub struct ConversationRepository {
    sessions: Cache<Uuid, Arc<Mutex<ConversationSession>>>,
}

impl ConversationRepository {
    pub fn new(idle_timeout: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_CONVERSATIONS)
            .time_to_idle(idle_timeout)
            .build();

        Self { sessions }
    }

    pub async fn insert(&self, session: ConversationSession) -> Arc<Mutex<ConversationSession>> {
        let id = session.id;
        let session = Arc::new(Mutex::new(session));
        self.sessions.insert(id, Arc::clone(&session)).await;
        session
    }

    pub async fn find(&self, id: &Uuid) -> Option<Arc<Mutex<ConversationSession>>> {
        self.sessions.get(id).await
    }

    pub async fn remove(&self, id: &Uuid) -> Option<Arc<Mutex<ConversationSession>>> {
        self.sessions.remove(id).await
    }

    pub async fn count(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }
}
