//! Session Store
//!
//! Advisor sessions keyed by id. Sessions idle longer than the TTL are
//! dropped, and the store never holds more than `max_sessions` trackers.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use decision_engine::EmotionTracker;

#[derive(Debug)]
struct Session {
    tracker: EmotionTracker,
    last_seen: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<Uuid, Session>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.last_seen > self.idle_ttl
    }

    /// Live tracker for `id`, if any
    pub fn get(&self, id: &Uuid, now: DateTime<Utc>) -> Option<&EmotionTracker> {
        self.sessions
            .get(id)
            .filter(|session| !self.is_expired(session, now))
            .map(|session| &session.tracker)
    }

    /// Tracker for `id`, created fresh when missing or expired
    pub fn touch(&mut self, id: Uuid, now: DateTime<Utc>) -> &mut EmotionTracker {
        let live = self
            .sessions
            .get(&id)
            .is_some_and(|session| !self.is_expired(session, now));

        if !live {
            self.evict_idle(now);
            while self.sessions.len() >= self.max_sessions {
                if !self.evict_oldest() {
                    break;
                }
            }
        }

        // An expired entry is gone by now, so this starts a fresh tracker
        let session = self.sessions.entry(id).or_insert_with(|| Session {
            tracker: EmotionTracker::with_id(id),
            last_seen: now,
        });
        session.last_seen = now;
        &mut session.tracker
    }

    /// Drop every session idle longer than the TTL
    pub fn evict_idle(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        let ttl = self.idle_ttl;
        self.sessions.retain(|_, session| now - session.last_seen <= ttl);

        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.sessions.len(), "idle sessions evicted");
        }
        evicted
    }

    fn evict_oldest(&mut self) -> bool {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|(_, session)| session.last_seen)
            .map(|(id, _)| *id);

        match oldest {
            Some(id) => {
                self.sessions.remove(&id);
                tracing::debug!(%id, "session store full, evicted least recent session");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decision_engine::{EmotionFilter, EmotionSignals};

    fn store() -> SessionStore {
        SessionStore::new(Duration::minutes(30), 2)
    }

    #[test]
    fn test_touch_creates_and_reuses() {
        let mut sessions = store();
        let id = Uuid::new_v4();
        let now = Utc::now();

        assert_eq!(sessions.touch(id, now).session_id(), id);
        sessions.touch(id, now + Duration::minutes(10));
        assert_eq!(sessions.len(), 1);
        assert!(sessions.get(&id, now + Duration::minutes(35)).is_some());
    }

    #[test]
    fn test_expired_session_is_evicted() {
        let mut sessions = store();
        let idle = Uuid::new_v4();
        let start = Utc::now();
        sessions.touch(idle, start);

        let later = start + Duration::minutes(31);
        assert!(sessions.get(&idle, later).is_none());

        sessions.touch(Uuid::new_v4(), later);
        assert_eq!(sessions.len(), 1);
        assert!(sessions.get(&idle, later).is_none());
    }

    #[test]
    fn test_expired_session_restarts_empty() {
        let mut sessions = store();
        let id = Uuid::new_v4();
        let start = Utc::now();
        let analysis = EmotionFilter::new()
            .unwrap()
            .analyze_request("무조건 올인 레버리지 20배 대박 한방 로또", &EmotionSignals::default());

        sessions.touch(id, start).record(&analysis);
        assert_eq!(sessions.touch(id, start + Duration::minutes(5)).history().len(), 1);

        let tracker = sessions.touch(id, start + Duration::hours(2));
        assert!(tracker.history().is_empty());
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let mut sessions = store();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        sessions.touch(a, now);
        sessions.touch(b, now + Duration::minutes(1));
        sessions.touch(a, now + Duration::minutes(2));
        sessions.touch(c, now + Duration::minutes(3));

        let at = now + Duration::minutes(4);
        assert_eq!(sessions.len(), 2);
        assert!(sessions.get(&a, at).is_some());
        assert!(sessions.get(&b, at).is_none());
        assert!(sessions.get(&c, at).is_some());
    }
}
