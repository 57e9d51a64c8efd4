//! The `SecurityCore` facade.
//!
//! Wires the decision engine, audit trail, anonymizer, and key manager
//! together so that every security-relevant outcome — grant, denial,
//! masked read, role change, anonymization, reverse lookup, key rotation,
//! integrity failure — produces an audit record. Construction takes the
//! stores and sink as trait objects; tests inject in-memory fakes,
//! production injects durable backends.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tourmaline_access::{
    mask_fields, AccessContext, AccessDecision, AccessEngine, AccessError, InMemoryRoleStore,
};
use tourmaline_anonymize::{AnonymizedContent, AnonymizationContext, AnonymizeError, Anonymizer, ValidationReport};
use tourmaline_audit::{
    AuditAction, AuditError, AuditEventDraft, AuditResult, AuditSink, AuditTrail,
};
use tourmaline_crypto::{AesGcmKeyManager, CryptoError, KeyManager, SealedRecord};
use tourmaline_types::{AccessAction, Sensitivity};

/// Errors surfaced by facade operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Anonymize(#[from] AnonymizeError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================================================
// RequestMeta
// ============================================================================

/// Request metadata every audited operation must carry.
///
/// The audit event invariant requires a source address and user agent;
/// they are constructor arguments here rather than options so the
/// requirement is visible at the call site.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub ip_address: String,
    pub user_agent: String,
    pub session_id: Option<String>,
    pub geolocation: Option<String>,
}

impl RequestMeta {
    pub fn new(ip_address: &str, user_agent: &str) -> Self {
        Self {
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            session_id: None,
            geolocation: None,
        }
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_geolocation(mut self, geolocation: &str) -> Self {
        self.geolocation = Some(geolocation.to_string());
        self
    }

    fn apply(&self, mut draft: AuditEventDraft) -> AuditEventDraft {
        draft = draft.with_ip(&self.ip_address).with_user_agent(&self.user_agent);
        if let Some(ref session) = self.session_id {
            draft = draft.with_session(session);
        }
        if let Some(ref geo) = self.geolocation {
            draft = draft.with_geolocation(geo);
        }
        draft
    }
}

// ============================================================================
// SecurityCore
// ============================================================================

/// The wired privacy core.
pub struct SecurityCore {
    roles: Arc<InMemoryRoleStore>,
    engine: AccessEngine,
    trail: Arc<AuditTrail>,
    anonymizer: Anonymizer,
    keys: Arc<dyn KeyManager>,
}

impl SecurityCore {
    /// Creates a core over the given role store and audit sink, with the
    /// standard anonymizer and a fresh AES-GCM key ring.
    pub fn new(roles: Arc<InMemoryRoleStore>, sink: Arc<dyn AuditSink>) -> Result<Self> {
        let engine = AccessEngine::new(roles.clone());
        Ok(Self {
            roles,
            engine,
            trail: Arc::new(AuditTrail::new(sink)),
            anonymizer: Anonymizer::new()?,
            keys: Arc::new(AesGcmKeyManager::generate()),
        })
    }

    /// Replaces the audit trail (builder pattern).
    pub fn with_trail(mut self, trail: Arc<AuditTrail>) -> Self {
        self.trail = trail;
        self
    }

    /// Replaces the anonymizer (builder pattern).
    pub fn with_anonymizer(mut self, anonymizer: Anonymizer) -> Self {
        self.anonymizer = anonymizer;
        self
    }

    /// Replaces the key manager (builder pattern).
    pub fn with_key_manager(mut self, keys: Arc<dyn KeyManager>) -> Self {
        self.keys = keys;
        self
    }

    /// The audit trail, for queries and reports.
    pub fn trail(&self) -> &Arc<AuditTrail> {
        &self.trail
    }

    /// The role store, for registry administration.
    pub fn roles(&self) -> &Arc<InMemoryRoleStore> {
        &self.roles
    }

    // ------------------------------------------------------------------
    // Access decisions
    // ------------------------------------------------------------------

    /// Decides and audits an access request. Every outcome is logged;
    /// denials flush immediately.
    pub fn check_access(
        &self,
        user_id: &str,
        action: AccessAction,
        resource: &str,
        ctx: &AccessContext,
        meta: &RequestMeta,
    ) -> AccessDecision {
        let decision = self.engine.check_access(user_id, action, resource, ctx);
        self.audit_decision(user_id, action, resource, ctx, meta, &decision);
        decision
    }

    /// Checks `Read` access, audits it, and returns a masked copy of the
    /// record.
    ///
    /// # Errors
    ///
    /// [`AccessError::Denied`] (wrapped) when the read is refused.
    pub fn fetch_filtered(
        &self,
        data: &Value,
        user_id: &str,
        resource: &str,
        ctx: &AccessContext,
        meta: &RequestMeta,
    ) -> Result<Value> {
        let decision = self
            .engine
            .check_access(user_id, AccessAction::Read, resource, ctx);
        self.audit_decision(user_id, AccessAction::Read, resource, ctx, meta, &decision);

        if !decision.granted {
            return Err(AccessError::Denied(decision.reason).into());
        }
        Ok(mask_fields(data, &decision.masked_fields))
    }

    fn audit_decision(
        &self,
        user_id: &str,
        action: AccessAction,
        resource: &str,
        ctx: &AccessContext,
        meta: &RequestMeta,
        decision: &AccessDecision,
    ) {
        // A cyclic role definition is a configuration error and critical,
        // independent of this request's outcome.
        for role_id in &decision.cycle_roles {
            let draft = meta.apply(
                AuditEventDraft::new(user_id, AuditAction::ConfigChange, resource)
                    .with_result(AuditResult::Failure)
                    .with_sensitivity(Sensitivity::HighlySensitive)
                    .with_purpose("access_control")
                    .with_legal_basis("legal_obligation")
                    .with_error(
                        "role_inheritance_cycle",
                        &format!("role '{role_id}' resolves to zero permissions"),
                    ),
            );
            self.log_or_warn(draft, "configuration error");
        }

        let result = if decision.granted {
            AuditResult::Success
        } else {
            AuditResult::Denied
        };

        let mut draft = meta.apply(
            AuditEventDraft::new(user_id, audit_action_for(action), resource)
                .with_result(result)
                .with_purpose(ctx.purpose.as_deref().unwrap_or(""))
                .with_legal_basis("access_control")
                .with_metadata("decision_reason", &decision.reason)
                .with_metadata("audit_required", &decision.audit_required.to_string()),
        );
        if !decision.masked_fields.is_empty() {
            draft = draft.with_metadata("masked_fields", &decision.masked_fields.join(","));
        }
        if !decision.failed_conditions.is_empty() {
            let summary: Vec<String> = decision
                .failed_conditions
                .iter()
                .map(|f| format!("{}:{}", f.role_id, f.condition))
                .collect();
            draft = draft.with_metadata("failed_conditions", &summary.join("; "));
        }
        self.log_or_warn(draft, "access decision");
    }

    // ------------------------------------------------------------------
    // Role administration
    // ------------------------------------------------------------------

    /// Assigns a role and audits the change. Audits the failed attempt
    /// too when the role is unknown.
    pub fn assign_role(
        &self,
        user_id: &str,
        role_id: &str,
        assigned_by: &str,
        purpose: &str,
        expires_at: Option<DateTime<Utc>>,
        meta: &RequestMeta,
    ) -> Result<()> {
        let outcome = self
            .roles
            .assign_role(user_id, role_id, assigned_by, purpose, expires_at);

        let mut draft = meta.apply(
            AuditEventDraft::new(assigned_by, AuditAction::RoleAssigned, "roles")
                .with_resource_id(role_id)
                .with_purpose(purpose)
                .with_legal_basis("access_control")
                .with_metadata("target_user", user_id),
        );
        if let Err(ref error) = outcome {
            draft = draft
                .with_result(AuditResult::Failure)
                .with_error("unknown_role", &error.to_string());
        }
        self.log_or_warn(draft, "role assignment");

        outcome.map(|_| ()).map_err(CoreError::from)
    }

    /// Revokes a role and audits the attempt — including the no-op case
    /// where no active assignment existed.
    pub fn revoke_role(
        &self,
        user_id: &str,
        role_id: &str,
        revoked_by: &str,
        meta: &RequestMeta,
    ) -> bool {
        let revoked = self.roles.revoke_role(user_id, role_id);

        let draft = meta.apply(
            AuditEventDraft::new(revoked_by, AuditAction::RoleRevoked, "roles")
                .with_resource_id(role_id)
                .with_purpose("role_administration")
                .with_legal_basis("access_control")
                .with_metadata("target_user", user_id)
                .with_metadata("revoked", &revoked.to_string()),
        );
        self.log_or_warn(draft, "role revocation");

        revoked
    }

    // ------------------------------------------------------------------
    // Anonymization
    // ------------------------------------------------------------------

    /// Anonymizes content for the external text-generation collaborator
    /// and audits the handoff. Only the returned content may leave the
    /// trust boundary.
    pub fn anonymize_for_llm(
        &self,
        content: &str,
        purpose: &str,
        owner_user_id: &str,
        meta: &RequestMeta,
    ) -> AnonymizedContent {
        let result = self.anonymizer.anonymize(content, purpose, owner_user_id);

        let draft = meta.apply(
            AuditEventDraft::new(owner_user_id, AuditAction::AnonymizeData, "llm.content")
                .with_purpose(purpose)
                .with_legal_basis("legitimate_interest")
                .with_metadata("placeholder_count", &result.placeholder_count.to_string())
                .with_metadata("context_id", &result.context.id.to_string()),
        );
        self.log_or_warn(draft, "anonymization");

        result
    }

    /// Reverses anonymization. Gated through the decision engine as a
    /// highly sensitive `Decrypt` operation; every lookup is audited,
    /// granted or not.
    pub fn deanonymize(
        &self,
        text: &str,
        context: &AnonymizationContext,
        requester: &str,
        ctx: &AccessContext,
        meta: &RequestMeta,
    ) -> Result<String> {
        let decision =
            self.engine
                .check_access(requester, AccessAction::Decrypt, "llm.anonymization", ctx);

        let result = if decision.granted {
            AuditResult::Success
        } else {
            AuditResult::Denied
        };
        let draft = meta.apply(
            AuditEventDraft::new(requester, AuditAction::DeanonymizeData, "llm.anonymization")
                .with_result(result)
                .with_sensitivity(Sensitivity::HighlySensitive)
                .with_purpose(ctx.purpose.as_deref().unwrap_or(""))
                .with_legal_basis("access_control")
                .with_metadata("context_id", &context.id.to_string())
                .with_metadata("context_owner", &context.owner_user_id),
        );
        self.log_or_warn(draft, "reverse lookup");

        if !decision.granted {
            return Err(AccessError::Denied(decision.reason).into());
        }
        Ok(self.anonymizer.deanonymize(text, context)?)
    }

    /// Independently validates outbound text for residual sensitive data.
    pub fn validate_outbound(&self, text: &str) -> ValidationReport {
        self.anonymizer.validate(text)
    }

    // ------------------------------------------------------------------
    // Protected records
    // ------------------------------------------------------------------

    /// Encrypts a record under the active key version.
    pub fn seal_record(&self, plaintext: &[u8]) -> Result<SealedRecord> {
        Ok(self.keys.encrypt(plaintext)?)
    }

    /// Decrypts a sealed record for an audited requester.
    ///
    /// An integrity failure is itself a security event: it is audited as
    /// an incident before the error propagates.
    pub fn open_record(
        &self,
        sealed: &SealedRecord,
        requester: &str,
        resource: &str,
        meta: &RequestMeta,
    ) -> Result<Vec<u8>> {
        match self.keys.decrypt(sealed) {
            Ok(plaintext) => {
                let draft = meta.apply(
                    AuditEventDraft::new(requester, AuditAction::Decrypt, resource)
                        .with_purpose("record_access")
                        .with_legal_basis("access_control")
                        .with_metadata("key_version", &sealed.key_version.to_string()),
                );
                self.log_or_warn(draft, "decrypt");
                Ok(plaintext)
            }
            Err(error) => {
                let draft = meta.apply(
                    AuditEventDraft::new(requester, AuditAction::SecurityIncident, resource)
                        .with_result(AuditResult::Failure)
                        .with_purpose("record_access")
                        .with_legal_basis("legal_obligation")
                        .with_error("integrity_failure", &error.to_string()),
                );
                self.log_or_warn(draft, "integrity failure");
                Err(error.into())
            }
        }
    }

    /// Rotates the active key version; the rotation itself is audited and
    /// critical.
    pub fn rotate_keys(&self, actor: &str, meta: &RequestMeta) -> Result<u32> {
        let version = self.keys.rotate_keys()?;

        let draft = meta.apply(
            AuditEventDraft::new(actor, AuditAction::KeyRotation, "keys")
                .with_purpose("key_management")
                .with_legal_basis("legal_obligation")
                .with_metadata("new_version", &version.to_string()),
        );
        self.log_or_warn(draft, "key rotation");

        Ok(version)
    }

    // ------------------------------------------------------------------

    /// The audit trail records its own failures; a failed audit write
    /// must never take the guarded operation down with it.
    fn log_or_warn(&self, draft: AuditEventDraft, what: &str) {
        if let Err(error) = self.trail.log_event(draft) {
            tracing::error!(%error, what, "failed to audit operation");
        }
    }
}

fn audit_action_for(action: AccessAction) -> AuditAction {
    match action {
        AccessAction::Read => AuditAction::DataAccess,
        AccessAction::Write => AuditAction::DataModify,
        AccessAction::Delete => AuditAction::DataDelete,
        AccessAction::Export => AuditAction::DataExport,
        AccessAction::Anonymize => AuditAction::AnonymizeData,
        AccessAction::Decrypt => AuditAction::Decrypt,
    }
}
