//! Subscriber grouping.
//!
//! Pure functions: no I/O, no clock. Groups come out in first-seen order so
//! a run over the same subscriber list always dispatches in the same order.

use pulse_core::types::{Bucket, Subscriber};
use std::collections::HashMap;
use std::hash::Hash;

/// Solution-mode group key: everyone who got the same item and wants the
/// answer in the same language shares one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SolutionKey {
    pub item_id: String,
    pub language: String,
}

impl std::fmt::Display for SolutionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.item_id, self.language)
    }
}

/// Insertion-ordered multimap from group key to members.
#[derive(Debug, Clone)]
pub struct Groups<K> {
    entries: Vec<(K, Vec<Subscriber>)>,
}

impl<K: Eq + Hash + Clone> Groups<K> {
    fn build(subscribers: impl IntoIterator<Item = (K, Subscriber)>) -> Self {
        let mut index: HashMap<K, usize> = HashMap::new();
        let mut entries: Vec<(K, Vec<Subscriber>)> = Vec::new();
        for (key, sub) in subscribers {
            match index.get(&key) {
                Some(&slot) => entries[slot].1.push(sub),
                None => {
                    index.insert(key.clone(), entries.len());
                    entries.push((key, vec![sub]));
                }
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total subscribers across all groups.
    pub fn member_count(&self) -> usize {
        self.entries.iter().map(|(_, m)| m.len()).sum()
    }

    pub fn get(&self, key: &K) -> Option<&[Subscriber]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, m)| m.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(K, Vec<Subscriber>)> {
        self.entries.iter()
    }
}

impl<K> IntoIterator for Groups<K> {
    type Item = (K, Vec<Subscriber>);
    type IntoIter = std::vec::IntoIter<(K, Vec<Subscriber>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Group active subscribers by (topic, difficulty).
pub fn group_for_challenge(subscribers: &[Subscriber]) -> Groups<Bucket> {
    Groups::build(
        subscribers
            .iter()
            .filter(|s| s.is_active())
            .map(|s| (s.bucket(), s.clone())),
    )
}

/// Group active subscribers by (last item, language). Subscribers that were
/// never sent a challenge have nothing to solve and are left out.
pub fn group_for_solution(subscribers: &[Subscriber]) -> Groups<SolutionKey> {
    Groups::build(subscribers.iter().filter(|s| s.is_active()).filter_map(|s| {
        let item_id = s.last_item_id.clone()?;
        Some((
            SolutionKey {
                item_id,
                language: s.language.clone(),
            },
            s.clone(),
        ))
    }))
}
