//! The audit trail: buffered logging, flush, and suspicious-activity
//! detection.
//!
//! Many concurrent callers append through [`AuditTrail::log_event`]; flush
//! runs in a mutually exclusive section so two concurrent flushes never
//! drain the same events twice. Critical events (breaches, incidents,
//! deletions, key rotations, role changes, highly sensitive access,
//! denials) bypass buffering and flush immediately.
//!
//! Background flush and retention cleanup are explicit scheduled tasks
//! with start/stop hooks owned by the process lifecycle — nothing runs as
//! a side effect of construction.

use crate::breach::BreachEvent;
use crate::event::{AuditAction, AuditEvent, AuditEventDraft, AuditResult};
use crate::sink::AuditSink;
use crate::{AuditError, Result};
use chrono::{DateTime, Duration, Timelike, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::JoinHandle;
use tourmaline_types::{ClassificationTable, Sensitivity};
use uuid::Uuid;

// ============================================================================
// AuditConfig
// ============================================================================

/// Tunable thresholds for the trail.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Buffered events that force a flush.
    pub buffer_capacity: usize,
    /// Denials by one user within the window that raise an incident.
    pub denial_threshold: usize,
    /// Trailing window for denial counting.
    pub denial_window: Duration,
    /// Normal working hours, UTC: \[start, end). Highly sensitive access
    /// outside this window is flagged.
    pub normal_hours_start: u8,
    /// End of normal working hours (exclusive).
    pub normal_hours_end: u8,
    /// Regulatory retention period for the retained log.
    pub retention_days: i64,
    /// Data volume on a single event considered abnormal in reports.
    pub large_volume_threshold: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 50,
            denial_threshold: 5,
            denial_window: Duration::minutes(5),
            normal_hours_start: 9,
            normal_hours_end: 17,
            retention_days: 3650,
            large_volume_threshold: 10_485_760,
        }
    }
}

// ============================================================================
// AuditTrail
// ============================================================================

/// The in-process audit trail.
pub struct AuditTrail {
    config: AuditConfig,
    classification: ClassificationTable,
    sink: Arc<dyn AuditSink>,
    /// Events awaiting persistence.
    buffer: Mutex<Vec<AuditEvent>>,
    /// The queryable log, bounded by the retention period.
    retained: RwLock<Vec<AuditEvent>>,
    /// Per-user denial timestamps inside the trailing window.
    denials: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
    /// Serializes drain + persist + restore.
    flush_gate: Mutex<()>,
    /// Consecutive flush failures; operational alerting reads this.
    flush_failures: AtomicU32,
    stop: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditTrail {
    /// Creates a trail writing to the given sink with default config and
    /// the built-in classification table.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self::with_config(sink, AuditConfig::default(), ClassificationTable::default())
    }

    pub fn with_config(
        sink: Arc<dyn AuditSink>,
        config: AuditConfig,
        classification: ClassificationTable,
    ) -> Self {
        Self {
            config,
            classification,
            sink,
            buffer: Mutex::new(Vec::new()),
            retained: RwLock::new(Vec::new()),
            denials: Mutex::new(HashMap::new()),
            flush_gate: Mutex::new(()),
            flush_failures: AtomicU32::new(0),
            stop: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // Logging
    // ------------------------------------------------------------------

    /// Validates, seals, and records an event.
    ///
    /// Critical events and a full buffer trigger an immediate flush; a
    /// flush failure there is logged and the events stay buffered — the
    /// append itself still succeeds.
    ///
    /// # Errors
    ///
    /// [`AuditError::Validation`] when a required field is missing.
    /// Nothing is recorded in that case.
    pub fn log_event(&self, draft: AuditEventDraft) -> Result<Uuid> {
        let event = draft.seal()?;
        let id = event.id;

        self.retained
            .write()
            .expect("retained log lock poisoned")
            .push(event.clone());

        let must_flush = {
            let mut buffer = self.buffer.lock().expect("audit buffer lock poisoned");
            buffer.push(event.clone());
            event.is_critical() || buffer.len() >= self.config.buffer_capacity
        };

        if must_flush {
            if let Err(error) = self.flush() {
                tracing::warn!(%error, "immediate flush failed; events remain buffered");
            }
        }

        self.detect_incidents(&event);
        Ok(id)
    }

    /// Atomically drains the buffer and persists it. On sink failure the
    /// drained events are restored at the front of the buffer — no loss,
    /// no duplication — and the error is surfaced.
    ///
    /// Returns the number of events persisted.
    pub fn flush(&self) -> Result<usize> {
        let _gate = self.flush_gate.lock().expect("flush gate poisoned");

        let drained: Vec<AuditEvent> = {
            let mut buffer = self.buffer.lock().expect("audit buffer lock poisoned");
            std::mem::take(&mut *buffer)
        };

        if drained.is_empty() {
            return Ok(0);
        }

        match self.sink.persist(&drained) {
            Ok(()) => {
                self.flush_failures.store(0, Ordering::Relaxed);
                Ok(drained.len())
            }
            Err(error) => {
                let streak = self.flush_failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(%error, streak, "audit flush failed; restoring buffer");

                let mut buffer = self.buffer.lock().expect("audit buffer lock poisoned");
                let mut restored = drained;
                restored.append(&mut buffer);
                *buffer = restored;

                Err(AuditError::Persistence(error))
            }
        }
    }

    /// Consecutive flush failures since the last success. An external
    /// operational-alert channel watches this; retry policy lives there,
    /// not here.
    pub fn flush_failure_streak(&self) -> u32 {
        self.flush_failures.load(Ordering::Relaxed)
    }

    /// Number of events currently awaiting persistence.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().expect("audit buffer lock poisoned").len()
    }

    /// Snapshot of the retained log, in append order.
    pub fn retained_events(&self) -> Vec<AuditEvent> {
        self.retained
            .read()
            .expect("retained log lock poisoned")
            .clone()
    }

    pub(crate) fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub(crate) fn retained_matching<F>(&self, mut predicate: F) -> Vec<AuditEvent>
    where
        F: FnMut(&AuditEvent) -> bool,
    {
        self.retained
            .read()
            .expect("retained log lock poisoned")
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Convenience loggers
    // ------------------------------------------------------------------

    /// Records a data read. Sensitivity is the maximum classification of
    /// the touched fields.
    pub fn log_data_access(
        &self,
        user_id: &str,
        resource: &str,
        fields: &[&str],
        purpose: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Uuid> {
        let sensitivity = self.classification.max_sensitivity(fields);
        self.log_event(
            AuditEventDraft::new(user_id, AuditAction::DataAccess, resource)
                .with_fields(fields.iter().copied())
                .with_purpose(purpose)
                .with_legal_basis("legitimate_interest")
                .with_sensitivity(sensitivity)
                .with_ip(ip_address)
                .with_user_agent(user_agent),
        )
    }

    /// Records a data modification.
    pub fn log_data_modification(
        &self,
        user_id: &str,
        resource: &str,
        fields: &[&str],
        purpose: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Uuid> {
        let sensitivity = self.classification.max_sensitivity(fields);
        self.log_event(
            AuditEventDraft::new(user_id, AuditAction::DataModify, resource)
                .with_fields(fields.iter().copied())
                .with_purpose(purpose)
                .with_legal_basis("contract")
                .with_sensitivity(sensitivity)
                .with_ip(ip_address)
                .with_user_agent(user_agent),
        )
    }

    /// Records a data export with its volume.
    pub fn log_data_export(
        &self,
        user_id: &str,
        resource: &str,
        fields: &[&str],
        data_volume: u64,
        purpose: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Uuid> {
        let sensitivity = self.classification.max_sensitivity(fields);
        self.log_event(
            AuditEventDraft::new(user_id, AuditAction::DataExport, resource)
                .with_fields(fields.iter().copied())
                .with_purpose(purpose)
                .with_legal_basis("consent")
                .with_sensitivity(sensitivity)
                .with_data_volume(data_volume)
                .with_ip(ip_address)
                .with_user_agent(user_agent),
        )
    }

    /// Records a consent grant or withdrawal.
    pub fn log_consent(
        &self,
        user_id: &str,
        granted: bool,
        purpose: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Uuid> {
        let action = if granted {
            AuditAction::ConsentGiven
        } else {
            AuditAction::ConsentWithdrawn
        };
        self.log_event(
            AuditEventDraft::new(user_id, action, "consent")
                .with_purpose(purpose)
                .with_legal_basis("consent")
                .with_sensitivity(Sensitivity::Confidential)
                .with_ip(ip_address)
                .with_user_agent(user_agent),
        )
    }

    /// Records a detected data breach. Always critical.
    pub fn log_breach(
        &self,
        reported_by: &str,
        breach: &BreachEvent,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Uuid> {
        self.log_event(
            AuditEventDraft::new(reported_by, AuditAction::DataBreach, "security.breach")
                .with_resource_id(&breach.id.to_string())
                .with_result(AuditResult::Failure)
                .with_sensitivity(Sensitivity::HighlySensitive)
                .with_legal_basis("legal_obligation")
                .with_purpose("breach_notification")
                .with_metadata("severity", &format!("{:?}", breach.severity))
                .with_metadata("kind", &breach.kind)
                .with_metadata("estimated_records", &breach.estimated_records.to_string())
                .with_ip(ip_address)
                .with_user_agent(user_agent),
        )
    }

    // ------------------------------------------------------------------
    // Detection
    // ------------------------------------------------------------------

    /// Runs the suspicious-activity detectors over a freshly logged event.
    ///
    /// The synthesized incident carries `result = Failure` and the
    /// `SecurityIncident` action, which this method ignores on entry —
    /// the detector can never re-trigger on its own output.
    fn detect_incidents(&self, event: &AuditEvent) {
        if event.action == AuditAction::SecurityIncident {
            return;
        }

        if event.result == AuditResult::Denied {
            self.track_denial(event);
        }

        if event.sensitivity == Sensitivity::HighlySensitive
            && !self.within_normal_hours(event.timestamp)
        {
            self.synthesize_incident(
                event,
                "after_hours_sensitive_access",
                &format!(
                    "highly sensitive access at {:02}:00 UTC, outside {:02}:00-{:02}:00",
                    event.timestamp.hour(),
                    self.config.normal_hours_start,
                    self.config.normal_hours_end
                ),
            );
        }
    }

    fn track_denial(&self, event: &AuditEvent) {
        let crossed = {
            let mut denials = self.denials.lock().expect("denial window lock poisoned");
            let window = denials.entry(event.user_id.clone()).or_default();
            window.push_back(event.timestamp);

            let cutoff = event.timestamp - self.config.denial_window;
            while window.front().is_some_and(|t| *t < cutoff) {
                window.pop_front();
            }

            if window.len() >= self.config.denial_threshold {
                // Reset after triggering: the next incident requires a
                // full new burst, one event per threshold crossing.
                window.clear();
                true
            } else {
                false
            }
        };

        if crossed {
            self.synthesize_incident(
                event,
                "denial_burst",
                &format!(
                    "{} denials within {} minutes",
                    self.config.denial_threshold,
                    self.config.denial_window.num_minutes()
                ),
            );
        }
    }

    fn synthesize_incident(&self, trigger: &AuditEvent, code: &str, message: &str) {
        tracing::warn!(user_id = %trigger.user_id, code, "security incident detected");

        let draft = AuditEventDraft::new(
            &trigger.user_id,
            AuditAction::SecurityIncident,
            &trigger.resource,
        )
        .with_result(AuditResult::Failure)
        .with_purpose("security_monitoring")
        .with_legal_basis("legal_obligation")
        .with_error(code, message)
        .with_metadata("trigger_event", &trigger.id.to_string())
        .with_ip(&trigger.ip_address)
        .with_user_agent(&trigger.user_agent);

        if let Err(error) = self.log_event(draft) {
            tracing::error!(%error, "failed to record synthesized incident");
        }
    }

    fn within_normal_hours(&self, timestamp: DateTime<Utc>) -> bool {
        let hour = timestamp.hour() as u8;
        (self.config.normal_hours_start..self.config.normal_hours_end).contains(&hour)
    }

    // ------------------------------------------------------------------
    // Retention
    // ------------------------------------------------------------------

    /// Purges retained events older than the retention period. The
    /// surviving log keeps its append order. Returns the purge count.
    pub fn purge_expired(&self) -> usize {
        let cutoff = Utc::now() - Duration::days(self.config.retention_days);
        let mut retained = self.retained.write().expect("retained log lock poisoned");
        let before = retained.len();
        retained.retain(|e| e.timestamp >= cutoff);
        before - retained.len()
    }

    // ------------------------------------------------------------------
    // Background tasks
    // ------------------------------------------------------------------

    /// Starts the flush + retention worker. Idempotent: a second call
    /// while running is a no-op.
    pub fn start_background_tasks(self: &Arc<Self>, interval: std::time::Duration) {
        let mut worker = self.worker.lock().expect("worker handle lock poisoned");
        if worker.is_some() {
            return;
        }
        self.stop.store(false, Ordering::SeqCst);

        let weak: Weak<AuditTrail> = Arc::downgrade(self);
        let handle = std::thread::Builder::new()
            .name("audit-maintenance".to_string())
            .spawn(move || loop {
                std::thread::sleep(interval);
                let Some(trail) = weak.upgrade() else {
                    break;
                };
                if trail.stop.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(error) = trail.flush() {
                    tracing::warn!(%error, "periodic audit flush failed");
                }
                trail.purge_expired();
            })
            .expect("failed to spawn audit maintenance thread");

        *worker = Some(handle);
    }

    /// Signals the worker to stop and waits for it. Idempotent.
    pub fn stop_background_tasks(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let handle = self
            .worker
            .lock()
            .expect("worker handle lock poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, SinkError};

    /// Sink that fails a configurable number of times before succeeding.
    struct FlakySink {
        failures_left: Mutex<u32>,
        inner: MemorySink,
    }

    impl FlakySink {
        fn failing(times: u32) -> Self {
            Self {
                failures_left: Mutex::new(times),
                inner: MemorySink::new(),
            }
        }
    }

    impl AuditSink for FlakySink {
        fn persist(&self, events: &[AuditEvent]) -> std::result::Result<(), SinkError> {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(SinkError("simulated outage".to_string()));
            }
            self.inner.persist(events)
        }
    }

    fn draft(user: &str, result: AuditResult) -> AuditEventDraft {
        AuditEventDraft::new(user, AuditAction::DataAccess, "tax_profile.own")
            .with_result(result)
            .with_ip("10.0.0.5")
            .with_user_agent("portal/2.1")
    }

    #[test]
    fn test_log_and_retrieve() {
        let sink = Arc::new(MemorySink::new());
        let trail = AuditTrail::new(sink);

        let id = trail.log_event(draft("u1", AuditResult::Success)).unwrap();
        let retained = trail.retained_events();
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].id, id);
        assert_eq!(trail.buffered(), 1, "non-critical event stays buffered");
    }

    #[test]
    fn test_validation_failure_records_nothing() {
        let sink = Arc::new(MemorySink::new());
        let trail = AuditTrail::new(sink.clone());

        let incomplete = AuditEventDraft::new("u1", AuditAction::DataAccess, "r");
        assert!(trail.log_event(incomplete).is_err());
        assert!(trail.retained_events().is_empty());
        assert_eq!(trail.buffered(), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_critical_event_flushes_immediately() {
        let sink = Arc::new(MemorySink::new());
        let trail = AuditTrail::new(sink.clone());

        trail
            .log_event(draft("u1", AuditResult::Success).with_sensitivity(
                Sensitivity::HighlySensitive,
            ))
            .unwrap();

        assert_eq!(trail.buffered(), 0);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_buffer_capacity_triggers_flush() {
        let sink = Arc::new(MemorySink::new());
        let config = AuditConfig {
            buffer_capacity: 3,
            ..AuditConfig::default()
        };
        let trail = AuditTrail::with_config(sink.clone(), config, ClassificationTable::default());

        for i in 0..3 {
            trail
                .log_event(draft(&format!("u{i}"), AuditResult::Success))
                .unwrap();
        }

        assert_eq!(sink.len(), 3);
        assert_eq!(trail.buffered(), 0);
    }

    #[test]
    fn test_flush_failure_restores_buffer_in_order() {
        let sink = Arc::new(FlakySink::failing(1));
        let trail = AuditTrail::new(sink.clone());

        trail.log_event(draft("u1", AuditResult::Success)).unwrap();
        trail.log_event(draft("u2", AuditResult::Success)).unwrap();

        let error = trail.flush().unwrap_err();
        assert!(matches!(error, AuditError::Persistence(_)));
        assert_eq!(trail.buffered(), 2, "no loss on failed flush");
        assert_eq!(trail.flush_failure_streak(), 1);

        // Retry succeeds and delivers each event exactly once
        let flushed = trail.flush().unwrap();
        assert_eq!(flushed, 2);
        assert_eq!(trail.buffered(), 0);
        assert_eq!(trail.flush_failure_streak(), 0);

        let persisted = sink.inner.persisted();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].user_id, "u1");
        assert_eq!(persisted[1].user_id, "u2");
    }

    #[test]
    fn test_denial_burst_synthesizes_one_incident_per_crossing() {
        let sink = Arc::new(MemorySink::new());
        let trail = AuditTrail::new(sink);

        for _ in 0..5 {
            trail.log_event(draft("mallory", AuditResult::Denied)).unwrap();
        }

        let incidents: Vec<_> = trail
            .retained_events()
            .into_iter()
            .filter(|e| e.action == AuditAction::SecurityIncident)
            .collect();
        assert_eq!(incidents.len(), 1, "exactly one incident at the crossing");
        assert_eq!(incidents[0].result, AuditResult::Failure);
        assert_eq!(incidents[0].user_id, "mallory");
        assert_eq!(incidents[0].error_code.as_deref(), Some("denial_burst"));

        // A sixth denial after the crossing does not re-trigger
        trail.log_event(draft("mallory", AuditResult::Denied)).unwrap();
        let incidents = trail
            .retained_events()
            .into_iter()
            .filter(|e| e.action == AuditAction::SecurityIncident)
            .count();
        assert_eq!(incidents, 1);

        // A full new burst crosses the threshold a second time
        for _ in 0..4 {
            trail.log_event(draft("mallory", AuditResult::Denied)).unwrap();
        }
        let incidents = trail
            .retained_events()
            .into_iter()
            .filter(|e| e.action == AuditAction::SecurityIncident)
            .count();
        assert_eq!(incidents, 2);
    }

    #[test]
    fn test_denials_counted_per_user() {
        let sink = Arc::new(MemorySink::new());
        let trail = AuditTrail::new(sink);

        for i in 0..4 {
            trail.log_event(draft("alice", AuditResult::Denied)).unwrap();
            trail
                .log_event(draft(&format!("bob{i}"), AuditResult::Denied))
                .unwrap();
        }

        let incidents = trail
            .retained_events()
            .into_iter()
            .filter(|e| e.action == AuditAction::SecurityIncident)
            .count();
        assert_eq!(incidents, 0, "no single user crossed the threshold");
    }

    #[test]
    fn test_within_normal_hours() {
        let sink = Arc::new(MemorySink::new());
        let trail = AuditTrail::new(sink);

        use chrono::TimeZone;
        let noon = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2026, 3, 4, 2, 0, 0).unwrap();
        let five_pm = Utc.with_ymd_and_hms(2026, 3, 4, 17, 0, 0).unwrap();

        assert!(trail.within_normal_hours(noon));
        assert!(!trail.within_normal_hours(night));
        assert!(!trail.within_normal_hours(five_pm), "end hour is exclusive");
    }

    #[test]
    fn test_convenience_loggers_classify_sensitivity() {
        let sink = Arc::new(MemorySink::new());
        let trail = AuditTrail::new(sink);

        trail
            .log_data_access(
                "u1",
                "tax_profile.own",
                &["personal_info.ssn", "first_name"],
                "tax_filing",
                "10.0.0.5",
                "portal/2.1",
            )
            .unwrap();

        let events = trail.retained_events();
        assert_eq!(events[0].sensitivity, Sensitivity::HighlySensitive);
        assert_eq!(events[0].legal_basis, "legitimate_interest");
        assert_eq!(events[0].action, AuditAction::DataAccess);

        trail
            .log_data_export(
                "u1",
                "statements.2026",
                &["first_name"],
                4096,
                "portability",
                "10.0.0.5",
                "portal/2.1",
            )
            .unwrap();

        let events = trail.retained_events();
        let export = events.last().unwrap();
        assert_eq!(export.action, AuditAction::DataExport);
        assert_eq!(export.data_volume, Some(4096));
        assert_eq!(export.legal_basis, "consent");
    }

    #[test]
    fn test_consent_logger() {
        let sink = Arc::new(MemorySink::new());
        let trail = AuditTrail::new(sink);

        trail
            .log_consent("u1", true, "marketing", "10.0.0.5", "portal/2.1")
            .unwrap();
        trail
            .log_consent("u1", false, "marketing", "10.0.0.5", "portal/2.1")
            .unwrap();

        let events = trail.retained_events();
        assert_eq!(events[0].action, AuditAction::ConsentGiven);
        assert_eq!(events[1].action, AuditAction::ConsentWithdrawn);
    }

    #[test]
    fn test_background_tasks_flush() {
        let sink = Arc::new(MemorySink::new());
        let trail = Arc::new(AuditTrail::new(sink.clone()));

        trail.log_event(draft("u1", AuditResult::Success)).unwrap();
        assert_eq!(sink.len(), 0);

        trail.start_background_tasks(std::time::Duration::from_millis(20));
        std::thread::sleep(std::time::Duration::from_millis(120));
        trail.stop_background_tasks();

        assert_eq!(sink.len(), 1);
        assert_eq!(trail.buffered(), 0);
    }

    #[test]
    fn test_stop_background_tasks_is_idempotent() {
        let sink = Arc::new(MemorySink::new());
        let trail = Arc::new(AuditTrail::new(sink));

        trail.start_background_tasks(std::time::Duration::from_millis(10));
        trail.stop_background_tasks();
        trail.stop_background_tasks();
    }

    #[test]
    fn test_purge_keeps_recent_events() {
        let sink = Arc::new(MemorySink::new());
        let trail = AuditTrail::new(sink);

        trail.log_event(draft("u1", AuditResult::Success)).unwrap();
        // Fresh events survive a purge under the 10-year default
        assert_eq!(trail.purge_expired(), 0);
        assert_eq!(trail.retained_events().len(), 1);
    }
}
