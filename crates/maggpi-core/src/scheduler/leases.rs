use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// In-memory set of topics currently being refreshed or rediscovered.
///
/// At most one lease per topic exists at a time; it is released when the
/// returned guard drops, panics included.
#[derive(Debug, Clone, Default)]
pub struct TopicLeases {
    held: Arc<Mutex<HashSet<i64>>>,
}

/// Guard for one leased topic
#[derive(Debug)]
pub struct TopicLease {
    topic_id: i64,
    held: Arc<Mutex<HashSet<i64>>>,
}

impl TopicLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease of a topic, `None` if someone else holds it
    pub fn try_acquire(&self, topic_id: i64) -> Option<TopicLease> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if !held.insert(topic_id) {
            return None;
        }
        Some(TopicLease {
            topic_id,
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, topic_id: i64) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&topic_id)
    }
}

impl TopicLease {
    pub fn topic_id(&self) -> i64 {
        self.topic_id
    }
}

impl Drop for TopicLease {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.topic_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_lease_per_topic() {
        let leases = TopicLeases::new();

        let first = leases.try_acquire(1).unwrap();
        assert!(leases.try_acquire(1).is_none());
        assert!(leases.try_acquire(2).is_some());
        assert!(leases.is_held(1));

        drop(first);
        assert!(!leases.is_held(1));
        assert_eq!(leases.try_acquire(1).unwrap().topic_id(), 1);
    }

    #[test]
    fn test_lease_released_on_panic() {
        let leases = TopicLeases::new();
        let cloned = leases.clone();

        let result = std::panic::catch_unwind(move || {
            let _lease = cloned.try_acquire(7).unwrap();
            panic!("refresh blew up");
        });

        assert!(result.is_err());
        assert!(!leases.is_held(7));
    }
}
