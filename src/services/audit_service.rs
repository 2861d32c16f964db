use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{DistributionId, EngineEvent};

/// Receives every event as part of the state transition that produced it.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &EngineEvent);
}

/// Audit event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

impl AuditSeverity {
    pub fn of(event: &EngineEvent) -> Self {
        match event {
            EngineEvent::SafeguardTriggered { .. } => AuditSeverity::Critical,
            EngineEvent::RiskAlert { .. } | EngineEvent::DefaultRecorded { .. } => {
                AuditSeverity::Warning
            }
            EngineEvent::ReserveHealthCheck { is_healthy: false, .. } => AuditSeverity::Warning,
            _ => AuditSeverity::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub sequence: u64,
    pub severity: AuditSeverity,
    pub event: EngineEvent,
}

/// Writes each event to the log as a structured record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &EngineEvent) {
        let payload = serde_json::to_string(event).unwrap_or_else(|_| format!("{:?}", event));
        match AuditSeverity::of(event) {
            AuditSeverity::Info => info!(event = event.name(), %payload, "engine event"),
            AuditSeverity::Warning | AuditSeverity::Critical => {
                warn!(event = event.name(), %payload, "engine event")
            }
        }
    }
}

/// In-memory, append-only audit trail.
#[derive(Debug, Default)]
pub struct AuditTrail {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.lock().iter().map(|entry| entry.event.clone()).collect()
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.lock().iter().map(|entry| entry.event.name()).collect()
    }

    pub fn for_distribution(&self, id: DistributionId) -> Vec<AuditLogEntry> {
        self.lock()
            .iter()
            .filter(|entry| entry.event.distribution_id() == Some(id))
            .cloned()
            .collect()
    }

    pub fn with_severity(&self, severity: AuditSeverity) -> Vec<AuditLogEntry> {
        self.lock()
            .iter()
            .filter(|entry| entry.severity == severity)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditLogEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventSink for AuditTrail {
    fn publish(&self, event: &EngineEvent) {
        let mut entries = self.lock();
        let sequence = entries.len() as u64 + 1;
        entries.push(AuditLogEntry {
            id: Uuid::new_v4(),
            sequence,
            severity: AuditSeverity::of(event),
            event: event.clone(),
        });
    }
}

/// Constant-size tally of published events by severity.
#[derive(Debug, Default)]
pub struct EventCounter {
    info: AtomicU64,
    warning: AtomicU64,
    critical: AtomicU64,
}

impl EventCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, severity: AuditSeverity) -> u64 {
        match severity {
            AuditSeverity::Info => self.info.load(Ordering::Relaxed),
            AuditSeverity::Warning => self.warning.load(Ordering::Relaxed),
            AuditSeverity::Critical => self.critical.load(Ordering::Relaxed),
        }
    }

    pub fn total(&self) -> u64 {
        self.count(AuditSeverity::Info)
            + self.count(AuditSeverity::Warning)
            + self.count(AuditSeverity::Critical)
    }
}

impl EventSink for EventCounter {
    fn publish(&self, event: &EngineEvent) {
        let counter = match AuditSeverity::of(event) {
            AuditSeverity::Info => &self.info,
            AuditSeverity::Warning => &self.warning,
            AuditSeverity::Critical => &self.critical,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Forwards each event to several sinks in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn publish(&self, event: &EngineEvent) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }
}
