//! Compliance-oriented audit reports.
//!
//! A report wraps a query over a time period, extracts the entries a
//! reviewer should look at first — abnormally large transfers, after-hours
//! access to highly sensitive data, denied attempts — and condenses the
//! period into a coarse compliance score. The score is a triage heuristic,
//! not a certification: 100 minus capped deductions per finding class.

use crate::event::{AuditEvent, AuditResult};
use crate::query::{AuditQuery, AuditStatistics};
use crate::trail::AuditTrail;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why an event was pulled into the suspicious list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspiciousKind {
    /// Single event moved more data than the configured threshold.
    LargeDataVolume,
    /// Highly sensitive access outside normal hours.
    AfterHoursSensitiveAccess,
    /// The request was denied.
    DeniedAttempt,
}

/// One entry in the report's suspicious-activity section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousEntry {
    pub event_id: Uuid,
    pub user_id: String,
    pub kind: SuspiciousKind,
    pub detail: String,
}

/// A periodic audit report.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// When set, the report covers a single user.
    pub user_id: Option<String>,
    pub statistics: AuditStatistics,
    pub suspicious: Vec<SuspiciousEntry>,
    /// 0-100 triage heuristic; 100 means no findings.
    pub compliance_score: u8,
}

impl AuditTrail {
    /// Generates a report over \[from, to\], optionally scoped to one user.
    pub fn generate_report(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        user_id: Option<&str>,
    ) -> AuditReport {
        let mut query = AuditQuery::new().with_time_range(from, to);
        if let Some(user) = user_id {
            query = query.with_user(user);
        }

        let outcome = self.query(&query);
        let suspicious = self.extract_suspicious(&outcome.events);
        let compliance_score = compliance_score(&suspicious);

        AuditReport {
            period_start: from,
            period_end: to,
            user_id: user_id.map(ToString::to_string),
            statistics: outcome.statistics,
            suspicious,
            compliance_score,
        }
    }

    fn extract_suspicious(&self, events: &[AuditEvent]) -> Vec<SuspiciousEntry> {
        let config = self.config();
        let normal_hours = config.normal_hours_start..config.normal_hours_end;
        let mut suspicious = Vec::new();

        for event in events {
            if let Some(volume) = event.data_volume {
                if volume > config.large_volume_threshold {
                    suspicious.push(SuspiciousEntry {
                        event_id: event.id,
                        user_id: event.user_id.clone(),
                        kind: SuspiciousKind::LargeDataVolume,
                        detail: format!(
                            "{volume} bytes on {} (threshold {})",
                            event.resource, config.large_volume_threshold
                        ),
                    });
                }
            }

            if event.sensitivity == tourmaline_types::Sensitivity::HighlySensitive
                && !normal_hours.contains(&(event.timestamp.hour() as u8))
            {
                suspicious.push(SuspiciousEntry {
                    event_id: event.id,
                    user_id: event.user_id.clone(),
                    kind: SuspiciousKind::AfterHoursSensitiveAccess,
                    detail: format!(
                        "sensitive access to {} at {:02}:00 UTC",
                        event.resource,
                        event.timestamp.hour()
                    ),
                });
            }

            if event.result == AuditResult::Denied {
                suspicious.push(SuspiciousEntry {
                    event_id: event.id,
                    user_id: event.user_id.clone(),
                    kind: SuspiciousKind::DeniedAttempt,
                    detail: format!("denied: {}", event.resource),
                });
            }
        }

        suspicious
    }
}

/// Score: 100 minus capped per-class deductions, floored at 0.
fn compliance_score(suspicious: &[SuspiciousEntry]) -> u8 {
    let count = |kind: SuspiciousKind| -> u32 {
        suspicious.iter().filter(|s| s.kind == kind).count() as u32
    };

    let denied = (count(SuspiciousKind::DeniedAttempt) * 5).min(40);
    let after_hours = (count(SuspiciousKind::AfterHoursSensitiveAccess) * 3).min(30);
    let large_volume = (count(SuspiciousKind::LargeDataVolume) * 10).min(30);

    100u32.saturating_sub(denied + after_hours + large_volume) as u8
}
