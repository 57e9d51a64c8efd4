//! Audit event model and validation.
//!
//! An [`AuditEvent`] is immutable once logged. Callers build an
//! [`AuditEventDraft`]; the trail validates it, assigns id and timestamp,
//! and appends. The required fields — user, action, resource, source
//! address, user agent — are an invariant: a draft missing any of them is
//! rejected with a validation error, never silently defaulted.

use crate::{AuditError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tourmaline_types::Sensitivity;
use uuid::Uuid;

// ============================================================================
// AuditAction
// ============================================================================

/// The closed set of security-relevant actions the trail records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DataAccess,
    DataCreate,
    DataModify,
    DataDelete,
    DataExport,
    AnonymizeData,
    DeanonymizeData,
    Decrypt,
    KeyRotation,
    ConsentGiven,
    ConsentWithdrawn,
    RoleAssigned,
    RoleRevoked,
    ConfigChange,
    SecurityIncident,
    DataBreach,
    LoginSuccess,
    LoginFailure,
}

impl AuditAction {
    /// Actions that bypass buffering: the event flushes immediately.
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            AuditAction::DataBreach
                | AuditAction::SecurityIncident
                | AuditAction::DataDelete
                | AuditAction::KeyRotation
                | AuditAction::RoleAssigned
                | AuditAction::RoleRevoked
        )
    }
}

/// Outcome of the audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Failure,
    Denied,
}

// ============================================================================
// AuditEvent
// ============================================================================

/// A single immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub session_id: Option<String>,
    pub action: AuditAction,
    pub resource: String,
    pub resource_id: Option<String>,
    /// Field paths touched by the action; drives sensitivity computation.
    pub data_fields: Vec<String>,
    pub purpose: String,
    pub legal_basis: String,
    pub result: AuditResult,
    pub sensitivity: Sensitivity,
    pub ip_address: String,
    pub user_agent: String,
    pub geolocation: Option<String>,
    pub duration_ms: Option<u64>,
    /// Bytes (or records, per convention of the caller) moved by the action.
    pub data_volume: Option<u64>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    /// Free-form context. BTreeMap keeps export output deterministic.
    pub metadata: BTreeMap<String, String>,
}

impl AuditEvent {
    /// Whether this event must bypass buffering and flush immediately:
    /// critical action, highly sensitive data, or a denial.
    pub fn is_critical(&self) -> bool {
        self.action.is_critical()
            || self.sensitivity == Sensitivity::HighlySensitive
            || self.result == AuditResult::Denied
    }
}

// ============================================================================
// AuditEventDraft
// ============================================================================

/// Everything an [`AuditEvent`] carries except id and timestamp, which the
/// trail assigns at append time.
#[derive(Debug, Clone, Default)]
pub struct AuditEventDraft {
    pub user_id: String,
    pub session_id: Option<String>,
    pub action: Option<AuditAction>,
    pub resource: String,
    pub resource_id: Option<String>,
    pub data_fields: Vec<String>,
    pub purpose: String,
    pub legal_basis: String,
    pub result: Option<AuditResult>,
    pub sensitivity: Sensitivity,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub geolocation: Option<String>,
    pub duration_ms: Option<u64>,
    pub data_volume: Option<u64>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl AuditEventDraft {
    /// Starts a draft with the three identity-defining fields.
    pub fn new(user_id: &str, action: AuditAction, resource: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            action: Some(action),
            resource: resource.to_string(),
            result: Some(AuditResult::Success),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_resource_id(mut self, resource_id: &str) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_purpose(mut self, purpose: &str) -> Self {
        self.purpose = purpose.to_string();
        self
    }

    pub fn with_legal_basis(mut self, legal_basis: &str) -> Self {
        self.legal_basis = legal_basis.to_string();
        self
    }

    pub fn with_result(mut self, result: AuditResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn with_ip(mut self, ip_address: &str) -> Self {
        self.ip_address = Some(ip_address.to_string());
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn with_geolocation(mut self, geolocation: &str) -> Self {
        self.geolocation = Some(geolocation.to_string());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_data_volume(mut self, data_volume: u64) -> Self {
        self.data_volume = Some(data_volume);
        self
    }

    pub fn with_error(mut self, code: &str, message: &str) -> Self {
        self.error_code = Some(code.to_string());
        self.error_message = Some(message.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Validates the draft and seals it into an immutable event.
    ///
    /// # Errors
    ///
    /// [`AuditError::Validation`] naming the first missing required field.
    /// Nothing is recorded on failure.
    pub fn seal(self) -> Result<AuditEvent> {
        if self.user_id.is_empty() {
            return Err(AuditError::Validation { field: "user_id" });
        }
        let Some(action) = self.action else {
            return Err(AuditError::Validation { field: "action" });
        };
        if self.resource.is_empty() {
            return Err(AuditError::Validation { field: "resource" });
        }
        let ip_address = match self.ip_address {
            Some(ip) if !ip.is_empty() => ip,
            _ => return Err(AuditError::Validation { field: "ip_address" }),
        };
        let user_agent = match self.user_agent {
            Some(ua) if !ua.is_empty() => ua,
            _ => return Err(AuditError::Validation { field: "user_agent" }),
        };
        let result = self.result.unwrap_or(AuditResult::Success);

        Ok(AuditEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: self.user_id,
            session_id: self.session_id,
            action,
            resource: self.resource,
            resource_id: self.resource_id,
            data_fields: self.data_fields,
            purpose: self.purpose,
            legal_basis: self.legal_basis,
            result,
            sensitivity: self.sensitivity,
            ip_address,
            user_agent,
            geolocation: self.geolocation,
            duration_ms: self.duration_ms,
            data_volume: self.data_volume,
            error_code: self.error_code,
            error_message: self.error_message,
            metadata: self.metadata,
        })
    }
}
