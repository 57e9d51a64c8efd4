//! Audit log queries and aggregate statistics.
//!
//! All filter fields combine with AND logic; an empty query matches
//! everything. Statistics are computed over the full match set before
//! pagination, so `limit`/`offset` never change the aggregates.

use crate::event::{AuditAction, AuditEvent, AuditResult};
use crate::trail::AuditTrail;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tourmaline_types::Sensitivity;

// ============================================================================
// AuditQuery
// ============================================================================

/// Query filter for the retained audit log.
#[derive(Debug, Default, Clone)]
pub struct AuditQuery {
    pub user_id: Option<String>,
    pub actions: Option<Vec<AuditAction>>,
    pub resource_contains: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub sensitivities: Option<Vec<Sensitivity>>,
    pub results: Option<Vec<AuditResult>>,
    pub ip_address: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by user id.
    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// Filter to events whose action is in the set.
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = AuditAction>) -> Self {
        self.actions = Some(actions.into_iter().collect());
        self
    }

    /// Filter to events whose resource contains the substring.
    pub fn with_resource(mut self, substring: &str) -> Self {
        self.resource_contains = Some(substring.to_string());
        self
    }

    /// Filter to events within \[from, to\] inclusive.
    pub fn with_time_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Filter to events at one of these sensitivity levels.
    pub fn with_sensitivities(
        mut self,
        sensitivities: impl IntoIterator<Item = Sensitivity>,
    ) -> Self {
        self.sensitivities = Some(sensitivities.into_iter().collect());
        self
    }

    /// Filter to events with one of these results.
    pub fn with_results(mut self, results: impl IntoIterator<Item = AuditResult>) -> Self {
        self.results = Some(results.into_iter().collect());
        self
    }

    /// Filter by source address.
    pub fn with_ip(mut self, ip_address: &str) -> Self {
        self.ip_address = Some(ip_address.to_string());
        self
    }

    /// Paginate: skip `offset`, return at most `limit`.
    pub fn paginate(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// Whether an event matches every active filter.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(ref user_id) = self.user_id {
            if &event.user_id != user_id {
                return false;
            }
        }
        if let Some(ref actions) = self.actions {
            if !actions.contains(&event.action) {
                return false;
            }
        }
        if let Some(ref substring) = self.resource_contains {
            if !event.resource.contains(substring.as_str()) {
                return false;
            }
        }
        if let Some(from) = self.from {
            if event.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if event.timestamp > to {
                return false;
            }
        }
        if let Some(ref sensitivities) = self.sensitivities {
            if !sensitivities.contains(&event.sensitivity) {
                return false;
            }
        }
        if let Some(ref results) = self.results {
            if !results.contains(&event.result) {
                return false;
            }
        }
        if let Some(ref ip) = self.ip_address {
            if &event.ip_address != ip {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// AuditStatistics
// ============================================================================

/// Aggregates over a query's full match set.
#[derive(Debug, Clone)]
pub struct AuditStatistics {
    pub total_events: u64,
    pub successes: u64,
    pub failures: u64,
    pub denials: u64,
    pub unique_users: u64,
    pub total_data_volume: u64,
    pub by_sensitivity: HashMap<Sensitivity, u64>,
    pub by_action: HashMap<AuditAction, u64>,
    pub first_event: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
}

impl AuditStatistics {
    fn compute(events: &[AuditEvent]) -> Self {
        let mut stats = Self {
            total_events: events.len() as u64,
            successes: 0,
            failures: 0,
            denials: 0,
            unique_users: 0,
            total_data_volume: 0,
            by_sensitivity: HashMap::new(),
            by_action: HashMap::new(),
            first_event: None,
            last_event: None,
        };

        let mut users: HashSet<&str> = HashSet::new();
        for event in events {
            match event.result {
                AuditResult::Success => stats.successes += 1,
                AuditResult::Failure => stats.failures += 1,
                AuditResult::Denied => stats.denials += 1,
            }
            users.insert(event.user_id.as_str());
            stats.total_data_volume += event.data_volume.unwrap_or(0);
            *stats.by_sensitivity.entry(event.sensitivity).or_insert(0) += 1;
            *stats.by_action.entry(event.action).or_insert(0) += 1;

            stats.first_event = Some(match stats.first_event {
                Some(first) if first <= event.timestamp => first,
                _ => event.timestamp,
            });
            stats.last_event = Some(match stats.last_event {
                Some(last) if last >= event.timestamp => last,
                _ => event.timestamp,
            });
        }
        stats.unique_users = users.len() as u64;

        stats
    }
}

/// Paginated events plus aggregates over the full match set.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub events: Vec<AuditEvent>,
    pub statistics: AuditStatistics,
}

impl AuditTrail {
    /// Runs a query against the retained log.
    pub fn query(&self, query: &AuditQuery) -> QueryOutcome {
        let matched = self.retained_matching(|e| query.matches(e));
        let statistics = AuditStatistics::compute(&matched);

        let events: Vec<AuditEvent> = matched
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();

        QueryOutcome { events, statistics }
    }
}
