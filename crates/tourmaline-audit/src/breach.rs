//! Data-breach lifecycle tracking.
//!
//! A [`BreachEvent`] is created on detection and advances through a
//! monotonic state machine:
//!
//! ```text
//! Open -> Investigating -> Contained -> Resolved
//! ```
//!
//! Moving backward is an [`BreachError::InvalidTransition`]; skipping
//! forward over intermediate states is allowed (an incident can be
//! contained before anyone formally opens an investigation).
//!
//! Severity `High` and above — or any breach touching a large number of
//! records — requires notification within 72 hours of detection.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Notification deadline after detection, in hours.
const NOTIFICATION_DEADLINE_HOURS: i64 = 72;

/// Estimated record count at which regulatory reporting is required
/// regardless of severity.
const REGULATORY_RECORD_THRESHOLD: u64 = 100;

#[derive(Debug, Error)]
pub enum BreachError {
    #[error("Breach event not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
}

pub type Result<T> = std::result::Result<T, BreachError>;

/// Severity of a breach, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Lifecycle state of a breach. Ordered; transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachStatus {
    Open,
    Investigating,
    Contained,
    Resolved,
}

/// A single breach incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreachEvent {
    pub id: Uuid,
    pub detected_at: DateTime<Utc>,
    pub severity: BreachSeverity,
    /// Free-form kind, e.g. `"unauthorized_export"`.
    pub kind: String,
    pub affected_users: Vec<String>,
    /// Field classes exposed, e.g. `"ssn"`, `"iban"`.
    pub affected_data_types: Vec<String>,
    pub estimated_records: u64,
    pub containment_actions: Vec<String>,
    pub notification_required: bool,
    pub regulatory_reporting_required: bool,
    /// 72 hours after detection.
    pub notification_deadline: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
    pub status: BreachStatus,
}

/// Regulator-facing summary of one breach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreachReport {
    pub event: BreachEvent,
    pub timeline: Vec<String>,
    pub notification_status: String,
}

/// Tracks breach events through their lifecycle.
#[derive(Debug, Default)]
pub struct BreachLog {
    events: Vec<BreachEvent>,
}

impl BreachLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly detected breach and returns it.
    ///
    /// Notification is required for severity `High`/`Critical`;
    /// regulatory reporting additionally for any breach whose estimated
    /// record count reaches the reporting threshold.
    pub fn open(
        &mut self,
        severity: BreachSeverity,
        kind: &str,
        affected_users: Vec<String>,
        affected_data_types: Vec<String>,
        estimated_records: u64,
    ) -> BreachEvent {
        assert!(!kind.is_empty(), "breach kind must not be empty");

        let detected_at = Utc::now();
        let notification_required = severity >= BreachSeverity::High;
        let regulatory_reporting_required =
            notification_required || estimated_records >= REGULATORY_RECORD_THRESHOLD;

        let event = BreachEvent {
            id: Uuid::new_v4(),
            detected_at,
            severity,
            kind: kind.to_string(),
            affected_users,
            affected_data_types,
            estimated_records,
            containment_actions: Vec::new(),
            notification_required,
            regulatory_reporting_required,
            notification_deadline: detected_at + Duration::hours(NOTIFICATION_DEADLINE_HOURS),
            notified_at: None,
            status: BreachStatus::Open,
        };

        self.events.push(event.clone());
        event
    }

    /// Advances a breach to a later lifecycle state.
    ///
    /// # Errors
    ///
    /// [`BreachError::InvalidTransition`] when `status` is not strictly
    /// later than the current state — the machine is monotonic.
    pub fn advance(&mut self, id: Uuid, status: BreachStatus) -> Result<()> {
        let event = self.find_mut(id)?;

        if status <= event.status {
            return Err(BreachError::InvalidTransition(format!(
                "cannot move from {:?} to {status:?}",
                event.status
            )));
        }

        tracing::info!(breach_id = %id, from = ?event.status, to = ?status, "breach state advanced");
        event.status = status;
        Ok(())
    }

    /// Appends a containment action to the breach record.
    pub fn add_containment_action(&mut self, id: Uuid, action: &str) -> Result<()> {
        assert!(!action.is_empty(), "containment action must not be empty");
        let event = self.find_mut(id)?;
        event.containment_actions.push(action.to_string());
        Ok(())
    }

    /// Records that notification was sent.
    pub fn mark_notified(&mut self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let event = self.find_mut(id)?;
        event.notified_at = Some(at);
        Ok(())
    }

    /// Breaches requiring notification whose 72-hour deadline has passed
    /// without one being sent.
    pub fn overdue_notifications(&self, now: DateTime<Utc>) -> Vec<&BreachEvent> {
        self.events
            .iter()
            .filter(|e| {
                e.notification_required && e.notified_at.is_none() && now > e.notification_deadline
            })
            .collect()
    }

    /// Renders the regulator-facing report for one breach.
    pub fn report(&self, id: Uuid) -> Result<BreachReport> {
        let event = self.get(id).ok_or(BreachError::NotFound(id))?;

        let mut timeline = vec![format!("Detected at {}", event.detected_at)];
        if event.status >= BreachStatus::Investigating {
            timeline.push("Investigation started".to_string());
        }
        for action in &event.containment_actions {
            timeline.push(format!("Containment: {action}"));
        }
        if event.status >= BreachStatus::Contained {
            timeline.push("Breach contained".to_string());
        }
        if let Some(at) = event.notified_at {
            timeline.push(format!("Notification sent at {at}"));
        }
        if event.status == BreachStatus::Resolved {
            timeline.push("Resolved".to_string());
        }

        let notification_status = match (event.notification_required, event.notified_at) {
            (false, _) => "Not required".to_string(),
            (true, Some(at)) => format!("Sent at {at}"),
            (true, None) => format!("Pending, due by {}", event.notification_deadline),
        };

        Ok(BreachReport {
            event: event.clone(),
            timeline,
            notification_status,
        })
    }

    /// Looks up a breach by id.
    pub fn get(&self, id: Uuid) -> Option<&BreachEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    /// All breaches not yet resolved.
    pub fn unresolved(&self) -> Vec<&BreachEvent> {
        self.events
            .iter()
            .filter(|e| e.status != BreachStatus::Resolved)
            .collect()
    }

    fn find_mut(&mut self, id: Uuid) -> Result<&mut BreachEvent> {
        self.events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(BreachError::NotFound(id))
    }
}
