//! Telemetry bridge: runtime events attached to graph nodes.
//!
//! Each node owns a bounded, newest-first [`AnnotationLog`]. Logs live in a
//! `DashMap` of per-node mutexes, so appends to one node are serialized while
//! appends to different nodes, graph reads and rescans never contend.
//!
//! Events naming a node that does not exist yet create a placeholder node,
//! so telemetry for files that have not been scanned is not lost.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::ValidationError;
use crate::store::GraphStore;
use crate::types::{NodeData, NodeId, normalize_path};

/// Activation gained per event.
const ACTIVATION_STEP: f64 = 0.2;

/// Error rate gained per error event.
const ERROR_STEP: f64 = 0.1;

/// Severity of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Something looks wrong
    Warning,
    /// A failure
    Error,
}

impl Severity {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of runtime signal produced an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A plain log line (`info`, `warning`, `error`)
    Log,
    /// The node's code ran
    Execution,
    /// A watched variable changed; metadata carries the new values
    VariableUpdate,
}

/// Parse a severity or event-type label.
///
/// # Errors
///
/// Returns `ValidationError` for unknown labels.
pub fn parse_severity(raw: &str) -> Result<(Severity, EventKind), ValidationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "info" => Ok((Severity::Info, EventKind::Log)),
        "warning" | "warn" => Ok((Severity::Warning, EventKind::Log)),
        "error" => Ok((Severity::Error, EventKind::Log)),
        "execution" => Ok((Severity::Info, EventKind::Execution)),
        "variable_update" => Ok((Severity::Info, EventKind::VariableUpdate)),
        "" => Err(ValidationError::missing("severity")),
        other => Err(ValidationError::new(
            "severity",
            format!(
                "unknown value '{other}' (expected info, warning, error, execution or variable_update)"
            ),
        )),
    }
}

/// An incoming telemetry event, as received at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Node id or file path (absolute or relative to the project root)
    pub node: String,
    /// Severity or event-type label
    pub severity: String,
    /// Human-readable message
    pub message: String,
    /// When the event happened; defaults to arrival time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Identifier of the reporting agent
    pub source_agent_id: String,
    /// Free-form key/value data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl TelemetryEvent {
    /// Create an event with no timestamp or metadata.
    pub fn new(
        node: impl Into<String>,
        severity: impl Into<String>,
        message: impl Into<String>,
        source_agent_id: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            severity: severity.into(),
            message: message.into(),
            timestamp: None,
            source_agent_id: source_agent_id.into(),
            metadata: None,
        }
    }
}

/// A validated event attached to a node. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryAnnotation {
    /// The annotated node
    pub node: NodeId,
    /// Severity
    pub severity: Severity,
    /// Kind of runtime signal
    pub kind: EventKind,
    /// Message
    pub message: String,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// Reporting agent
    pub source_agent_id: String,
    /// Free-form key/value data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Counters derived from a node's annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeActivity {
    /// Timestamp of the latest event
    pub last_active: Option<DateTime<Utc>>,
    /// Grows by 0.2 per event, capped at 1.0
    pub activation_level: f64,
    /// Grows by 0.1 per error event, capped at 1.0
    pub error_rate: f64,
    /// Events received (including evicted ones)
    pub event_count: u64,
    /// Latest values reported by variable updates
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub active_variables: BTreeMap<String, serde_json::Value>,
}

impl NodeActivity {
    fn record(&mut self, annotation: &TelemetryAnnotation) {
        self.event_count += 1;
        self.last_active = Some(
            self.last_active
                .map_or(annotation.timestamp, |t| t.max(annotation.timestamp)),
        );
        self.activation_level = (self.activation_level + ACTIVATION_STEP).min(1.0);
        if annotation.severity == Severity::Error {
            self.error_rate = (self.error_rate + ERROR_STEP).min(1.0);
        }
        if annotation.kind == EventKind::VariableUpdate {
            if let Some(metadata) = &annotation.metadata {
                self.active_variables
                    .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
    }
}

/// Bounded newest-first annotations of one node.
#[derive(Debug, Clone)]
pub struct AnnotationLog {
    entries: VecDeque<TelemetryAnnotation>,
    capacity: usize,
    activity: NodeActivity,
}

impl AnnotationLog {
    /// An empty log holding at most `capacity` annotations.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
            activity: NodeActivity::default(),
        }
    }

    /// Prepend an annotation, evicting the oldest beyond capacity.
    ///
    /// Returns the number of evicted annotations.
    pub fn push(&mut self, annotation: TelemetryAnnotation) -> usize {
        self.activity.record(&annotation);
        self.entries.push_front(annotation);
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
            evicted += 1;
        }
        evicted
    }

    /// Annotations, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &TelemetryAnnotation> {
        self.entries.iter()
    }

    /// Number of retained annotations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Derived counters.
    #[must_use]
    pub fn activity(&self) -> &NodeActivity {
        &self.activity
    }
}

/// Acknowledgement of an ingested event.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryAck {
    /// The node the annotation was attached to
    pub node: NodeId,
    /// Whether a placeholder node was created for it
    pub created_placeholder: bool,
    /// Annotations retained for the node after the append
    pub retained: usize,
    /// Annotations evicted by this append
    pub evicted: usize,
    /// Node counters after the append
    pub activity: NodeActivity,
}

/// Ingests telemetry events into per-node annotation logs.
#[derive(Debug)]
pub struct TelemetryBridge {
    logs: DashMap<NodeId, Arc<Mutex<AnnotationLog>>>,
    capacity: usize,
}

impl TelemetryBridge {
    /// A bridge keeping at most `capacity` annotations per node.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            logs: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Per-node capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Validate `event`, resolve its node and append it.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when a required field is blank or the
    /// severity is unknown; nothing is recorded in that case.
    pub fn ingest(
        &self,
        store: &GraphStore,
        root: &Path,
        event: TelemetryEvent,
    ) -> Result<TelemetryAck, ValidationError> {
        let node_ref = required("node", &event.node)?;
        let message = required("message", &event.message)?;
        let agent = required("source_agent_id", &event.source_agent_id)?;
        let (severity, kind) = parse_severity(&event.severity)?;

        let annotation = TelemetryAnnotation {
            node: NodeId::new(node_ref),
            severity,
            kind,
            message: message.to_string(),
            timestamp: event.timestamp.unwrap_or_else(Utc::now),
            source_agent_id: agent.to_string(),
            metadata: event.metadata,
        };

        // Appends happen under the topology lock; a commit that removes the
        // node and forgets its log cannot interleave with them.
        let existing = store.read(move |t| {
            match candidate_ids(node_ref, root)
                .into_iter()
                .find(|id| t.contains(id.as_str()))
            {
                Some(id) => Ok(self.append(id, false, annotation)),
                None => Err(annotation),
            }
        });
        let ack = match existing {
            Ok(ack) => ack,
            Err(annotation) => {
                let id = placeholder_id(node_ref, root);
                store.ensure_node_with(NodeData::placeholder(id.clone()), |created| {
                    self.append(id, created, annotation)
                })
            }
        };
        if ack.created_placeholder {
            debug!(node = %ack.node, "Telemetry created placeholder node");
        }
        Ok(ack)
    }

    /// Append to the log of `node`; callers hold the topology lock.
    fn append(
        &self,
        node: NodeId,
        created_placeholder: bool,
        mut annotation: TelemetryAnnotation,
    ) -> TelemetryAck {
        annotation.node = node.clone();
        let severity = annotation.severity;
        let log = self.log_for(&node);
        let mut log = log.lock();
        let evicted = log.push(annotation);
        trace!(node = %node, severity = %severity, evicted, "Annotation appended");
        TelemetryAck {
            node,
            created_placeholder,
            retained: log.len(),
            evicted,
            activity: log.activity().clone(),
        }
    }

    fn log_for(&self, id: &NodeId) -> Arc<Mutex<AnnotationLog>> {
        if let Some(log) = self.logs.get(id) {
            return Arc::clone(log.value());
        }
        Arc::clone(
            self.logs
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(AnnotationLog::new(self.capacity))))
                .value(),
        )
    }

    /// Annotations of a node, newest first (empty if none).
    #[must_use]
    pub fn annotations(&self, id: &str) -> Vec<TelemetryAnnotation> {
        self.recent(id, usize::MAX)
    }

    /// At most `limit` most recent annotations of a node.
    #[must_use]
    pub fn recent(&self, id: &str, limit: usize) -> Vec<TelemetryAnnotation> {
        let Some(log) = self.logs.get(id).map(|l| Arc::clone(l.value())) else {
            return Vec::new();
        };
        let log = log.lock();
        log.iter().take(limit).cloned().collect()
    }

    /// Derived counters of a node.
    #[must_use]
    pub fn activity(&self, id: &str) -> Option<NodeActivity> {
        let log = self.logs.get(id).map(|l| Arc::clone(l.value()))?;
        let activity = log.lock().activity().clone();
        Some(activity)
    }

    /// Drop the logs of removed nodes.
    pub fn forget(&self, ids: &[NodeId]) {
        for id in ids {
            if self.logs.remove(id).is_some() {
                trace!(node = %id, "Dropped annotation log");
            }
        }
    }

    /// Number of nodes with an annotation log.
    #[must_use]
    pub fn annotated_nodes(&self) -> usize {
        self.logs.len()
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::missing(field))
    } else {
        Ok(trimmed)
    }
}

/// Ids an event's node reference may name: the raw id, then the path
/// resolved against the root.
fn candidate_ids(node_ref: &str, root: &Path) -> Vec<NodeId> {
    let mut ids = vec![NodeId::new(node_ref)];
    let path_id = path_id(node_ref, root);
    if path_id != ids[0] {
        ids.push(path_id);
    }
    ids
}

fn path_id(node_ref: &str, root: &Path) -> NodeId {
    let path = Path::new(node_ref);
    if path.is_absolute() {
        NodeId::from_path(path)
    } else {
        NodeId::from_path(&normalize_path(&root.join(path)))
    }
}

/// Placeholder ids keep the raw name unless it looks like a path.
fn placeholder_id(node_ref: &str, root: &Path) -> NodeId {
    let looks_like_path = node_ref.contains('/')
        || node_ref.contains('\\')
        || Path::new(node_ref).extension().is_some();
    if looks_like_path && !node_ref.starts_with(crate::types::EXTERNAL_PREFIX) {
        path_id(node_ref, root)
    } else {
        NodeId::new(node_ref)
    }
}
