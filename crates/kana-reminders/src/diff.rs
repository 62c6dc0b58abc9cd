//! Keyed comparison of two event lists.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use kana_types::{Event, EventKey, RestartTrigger};

/// What changed between two lists, by event identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDiff {
    /// Keys present only in the new list.
    pub added: Vec<EventKey>,
    /// Keys present only in the old list.
    pub removed: Vec<EventKey>,
    /// Keys present in both whose premieres differ (moved, or a different
    /// number of premieres for the same title).
    pub rescheduled: Vec<EventKey>,
}

impl ListDiff {
    pub fn between(old: &[Event], new: &[Event]) -> Self {
        let old = premieres_by_key(old);
        let new = premieres_by_key(new);

        let mut diff = ListDiff::default();
        for (key, premieres) in &new {
            match old.get(key) {
                None => diff.added.push(key.clone()),
                Some(previous) if previous != premieres => diff.rescheduled.push(key.clone()),
                Some(_) => {}
            }
        }
        diff.removed = old
            .keys()
            .filter(|key| !new.contains_key(*key))
            .cloned()
            .collect();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.rescheduled.is_empty()
    }
}

fn premieres_by_key(events: &[Event]) -> BTreeMap<EventKey, Vec<DateTime<Utc>>> {
    let mut map: BTreeMap<EventKey, Vec<DateTime<Utc>>> = BTreeMap::new();
    for event in events {
        map.entry(event.key()).or_default().push(event.premiere_at);
    }
    for premieres in map.values_mut() {
        premieres.sort();
    }
    map
}

/// Whether replacing `old` with `new` invalidates the scheduler's current wait.
pub fn requires_restart(old: &[Event], new: &[Event], trigger: RestartTrigger) -> bool {
    match trigger {
        RestartTrigger::Identity => !ListDiff::between(old, new).is_empty(),
        RestartTrigger::PremiereTime => {
            let mut a: Vec<_> = old.iter().map(|e| e.premiere_at).collect();
            let mut b: Vec<_> = new.iter().map(|e| e.premiere_at).collect();
            a.sort();
            b.sort();
            a != b
        }
        RestartTrigger::Exact => old != new,
    }
}
