//! Deduplicated, timestamp-ordered log accumulation.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::api::Log;

const ERROR_LEVEL: &str = "ERROR";

fn order_key(log: &Log) -> (Option<DateTime<Utc>>, String) {
    let parsed = DateTime::parse_from_rfc3339(&log.timestamp)
        .ok()
        .map(|stamp| stamp.with_timezone(&Utc));
    (parsed, log.timestamp.clone())
}

/// Logs seen so far for one execution.
#[derive(Debug, Default)]
pub(super) struct LogBook {
    entries: Vec<Log>,
    seen: HashSet<(String, String)>,
}

impl LogBook {
    pub(super) fn entries(&self) -> &[Log] {
        &self.entries
    }

    /// Merges a freshly fetched collection and returns the entries that
    /// were not seen before, in timestamp order.
    pub(super) fn merge(&mut self, mut fetched: Vec<Log>) -> Vec<Log> {
        fetched.sort_by_cached_key(order_key);
        let fresh: Vec<Log> = fetched
            .into_iter()
            .filter(|log| {
                self.seen
                    .insert((log.timestamp.clone(), log.message.clone()))
            })
            .collect();
        if !fresh.is_empty() {
            self.entries.extend(fresh.iter().cloned());
            self.entries.sort_by_cached_key(order_key);
        }
        fresh
    }

    /// Message of the most recent `ERROR`-level entry.
    pub(super) fn last_error(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|log| log.level.eq_ignore_ascii_case(ERROR_LEVEL))
            .map(|log| log.message.as_str())
    }
}
