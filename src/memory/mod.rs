use moka::sync::Cache;
use std::time::Duration;

/// Default bounds: enough for active conversations without growing forever.
const DEFAULT_CAPACITY: u64 = 1000;
const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Best-effort memory of each sender's previous message, used as light
/// conversational context for the completion call. Bounded by capacity and
/// TTL; last-write-wins under concurrent events from the same sender.
pub struct ConversationMemory {
    cache: Cache<String, String>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::with_bounds(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    pub fn with_bounds(capacity: u64, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn remember(&self, sender_id: &str, text: &str) {
        if sender_id.is_empty() {
            return;
        }
        self.cache.insert(sender_id.to_string(), text.to_string());
    }

    pub fn recall(&self, sender_id: &str) -> Option<String> {
        self.cache.get(sender_id)
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}
