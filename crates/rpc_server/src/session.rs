// Copyright (C) 2015-2025 The Neo Project.
//
// session.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Iterator sessions for `invoke*` results.
//!
//! Iterators returned by a test invocation are materialized into a
//! bounded in-memory table; `traverseiterator` pages through them and
//! `terminatesession` drops the whole session. The table is capped, so
//! a client cannot hold the node hostage with sessions.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

fn random_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

#[derive(Default)]
struct SessionTable {
    /// session id → iterator id → remaining items.
    sessions: HashMap<String, HashMap<String, VecDeque<Value>>>,
    /// Insertion order for capacity eviction.
    order: VecDeque<String>,
}

/// Bounded table of live iterator sessions.
pub struct IteratorSessions {
    max_sessions: usize,
    table: Mutex<SessionTable>,
}

impl IteratorSessions {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            table: Mutex::new(SessionTable::default()),
        }
    }

    /// Opens a session holding the given iterators; returns the session
    /// id and one id per iterator, in order.
    pub fn create(&self, iterators: Vec<Vec<Value>>) -> (String, Vec<String>) {
        let session_id = random_id();
        let mut ids = Vec::with_capacity(iterators.len());
        let mut entries = HashMap::new();
        for items in iterators {
            let iterator_id = random_id();
            entries.insert(iterator_id.clone(), VecDeque::from(items));
            ids.push(iterator_id);
        }

        let mut table = self.table.lock();
        while table.order.len() >= self.max_sessions {
            if let Some(oldest) = table.order.pop_front() {
                table.sessions.remove(&oldest);
            }
        }
        table.order.push_back(session_id.clone());
        table.sessions.insert(session_id.clone(), entries);
        (session_id, ids)
    }

    /// Takes up to `count` items off an iterator. `None` means the
    /// session or iterator is unknown.
    pub fn traverse(
        &self,
        session_id: &str,
        iterator_id: &str,
        count: usize,
    ) -> Option<Vec<Value>> {
        let mut table = self.table.lock();
        let iterator = table
            .sessions
            .get_mut(session_id)?
            .get_mut(iterator_id)?;
        let taken = count.min(iterator.len());
        Some(iterator.drain(..taken).collect())
    }

    /// Drops a session and everything it held.
    pub fn terminate(&self, session_id: &str) -> bool {
        let mut table = self.table.lock();
        table.order.retain(|id| id != session_id);
        table.sessions.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.table.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn traversal_pages_and_drains() {
        let sessions = IteratorSessions::new(4);
        let (session, ids) = sessions.create(vec![vec![json!(1), json!(2), json!(3)]]);
        let first = sessions.traverse(&session, &ids[0], 2).unwrap();
        assert_eq!(first, vec![json!(1), json!(2)]);
        let rest = sessions.traverse(&session, &ids[0], 10).unwrap();
        assert_eq!(rest, vec![json!(3)]);
        assert!(sessions.traverse(&session, &ids[0], 1).unwrap().is_empty());
    }

    #[test]
    fn terminate_forgets_the_session() {
        let sessions = IteratorSessions::new(4);
        let (session, ids) = sessions.create(vec![vec![json!("a")]]);
        assert!(sessions.terminate(&session));
        assert!(!sessions.terminate(&session));
        assert!(sessions.traverse(&session, &ids[0], 1).is_none());
    }

    #[test]
    fn capacity_evicts_the_oldest_session() {
        let sessions = IteratorSessions::new(2);
        let (first, _) = sessions.create(vec![]);
        sessions.create(vec![]);
        sessions.create(vec![]);
        assert_eq!(sessions.len(), 2);
        assert!(!sessions.terminate(&first), "oldest was evicted");
    }
}
