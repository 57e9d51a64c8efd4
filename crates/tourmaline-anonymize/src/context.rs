//! Per-invocation anonymization context.
//!
//! The context is the only place the token→original mapping exists. It is
//! keyed by (owner, purpose), bounded by a TTL, and owned exclusively by
//! the caller of the invocation that produced it — it is never persisted
//! unmasked.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Token mapping for one anonymization invocation.
#[derive(Debug, Clone)]
pub struct AnonymizationContext {
    pub id: Uuid,
    pub owner_user_id: String,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// token -> original value
    tokens: HashMap<String, String>,
    /// original value -> token, for determinism within the invocation
    by_value: HashMap<String, String>,
    /// per-tag counters for token numbering
    counters: HashMap<&'static str, usize>,
}

impl AnonymizationContext {
    /// Creates an empty context for one invocation.
    pub fn new(owner_user_id: &str, purpose: &str, ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_user_id: owner_user_id.to_string(),
            purpose: purpose.to_string(),
            created_at,
            expires_at: created_at + ttl,
            tokens: HashMap::new(),
            by_value: HashMap::new(),
            counters: HashMap::new(),
        }
    }

    /// Returns the placeholder for `value`, minting a new one on first
    /// sight. The same literal always yields the same token within this
    /// context.
    pub fn token_for(&mut self, tag: &'static str, value: &str) -> String {
        if let Some(existing) = self.by_value.get(value) {
            return existing.clone();
        }

        let counter = self.counters.entry(tag).or_insert(0);
        *counter += 1;
        let token = format!("[[{tag}_{counter}]]");

        self.tokens.insert(token.clone(), value.to_string());
        self.by_value.insert(value.to_string(), token.clone());
        token
    }

    /// Looks up the original value behind a placeholder.
    pub fn original_of(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }

    /// Number of distinct placeholders minted.
    pub fn placeholder_count(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the TTL has passed at the given instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Iterates (token, original) pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tokens.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }
}
