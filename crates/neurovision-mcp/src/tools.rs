//! MCP tool implementations.
//!
//! Each tool looks up its engine under the context lock, releases the lock,
//! and runs the engine call on the blocking pool.

use crate::context::{Context, Mounted};
use crate::error::{Error, Result};
use crate::models::{
    ImpactParams, RefreshResponse, ScanReport, SetContextResponse, TelemetryParams,
    VisualizeParams, WhereAmIResponse,
};
use chrono::{DateTime, Utc};
use neurovision::{
    GraphState, GraphView, ImpactOutcome, NeuroVision, TelemetryAck, TelemetryEvent,
    VisualizeOptions,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Tool implementations for the NeuroVision MCP server.
pub struct Tools {
    context: Arc<RwLock<Context>>,
}

impl Tools {
    /// Create a new Tools instance with the given context.
    pub fn new(context: Arc<RwLock<Context>>) -> Self {
        Self { context }
    }

    /// Mount a project, scanning it if its graph is still empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid, the project's configuration
    /// is malformed, or the initial scan fails or is cancelled.
    pub async fn set_context(&self, project_root: &str) -> Result<SetContextResponse> {
        let Mounted {
            project_root,
            engine,
            cancel,
        } = self
            .context
            .write()
            .await
            .set_project(Path::new(project_root))?;

        let scan = if engine.state() == GraphState::Empty {
            info!(project = %project_root.display(), "Scanning new project");
            Some(scan(Arc::clone(&engine), cancel).await?)
        } else {
            debug!(project = %project_root.display(), "Project already scanned");
            None
        };

        let snapshot = engine.snapshot();
        let message = if scan.is_some() {
            "Context set and project scanned"
        } else {
            "Context set"
        };

        Ok(SetContextResponse {
            project_root: project_root.display().to_string(),
            state: engine.state().to_string(),
            scan,
            nodes: snapshot.node_count(),
            edges: snapshot.edge_count(),
            message: message.to_string(),
        })
    }

    /// Get current project information.
    ///
    /// # Errors
    ///
    /// This function does not currently return errors but returns `Result` for API consistency.
    pub async fn where_am_i(&self) -> Result<WhereAmIResponse> {
        let context = self.context.read().await;
        let cached_projects = context.cache_size();

        match context.engine_for(None) {
            Ok(Mounted {
                project_root,
                engine,
                ..
            }) => {
                let snapshot = engine.snapshot();
                Ok(WhereAmIResponse {
                    project_root: Some(project_root.display().to_string()),
                    state: Some(engine.state().to_string()),
                    nodes: Some(snapshot.node_count()),
                    edges: Some(snapshot.edge_count()),
                    context_set: true,
                    cached_projects,
                })
            }
            Err(_) => Ok(WhereAmIResponse {
                project_root: None,
                state: None,
                nodes: None,
                edges: None,
                context_set: false,
                cached_projects,
            }),
        }
    }

    /// Force a full rescan of a mounted project.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, the project root vanished, or
    /// the scan was cancelled by a project switch.
    pub async fn refresh_vision(&self, project_root: Option<&str>) -> Result<RefreshResponse> {
        let Mounted {
            project_root,
            engine,
            cancel,
        } = self.mounted(project_root).await?;

        let report = scan(Arc::clone(&engine), cancel).await?;

        Ok(RefreshResponse {
            project_root: project_root.display().to_string(),
            state: engine.state().to_string(),
            scan: report,
        })
    }

    /// Snapshot of the graph with annotations.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set or the project isn't mounted.
    pub async fn visualize_architecture(&self, params: VisualizeParams) -> Result<GraphView> {
        let Mounted { engine, .. } = self.mounted(params.project_root.as_deref()).await?;
        let options = VisualizeOptions {
            max_depth: params.max_depth,
            include_external: params.include_external.unwrap_or(true),
            ..VisualizeOptions::default()
        };

        blocking(engine, move |engine| Ok(engine.visualize(&options))).await
    }

    /// Ripple set of a target file.
    ///
    /// Options not given fall back to the project's configured defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set or an option is out of range. A
    /// target that matches no node is `ImpactOutcome::NotFound`.
    pub async fn analyze_impact(&self, params: ImpactParams) -> Result<ImpactOutcome> {
        let Mounted { engine, .. } = self.mounted(params.project_root.as_deref()).await?;
        let mut options = engine.impact_options();
        if let Some(max_hops) = params.max_hops {
            options.max_hops = Some(max_hops);
        }
        if let Some(min_confidence) = params.min_confidence {
            options.min_confidence = min_confidence;
        }
        if let Some(max_paths) = params.max_paths {
            options.max_paths = max_paths;
        }
        let target = params.target;

        blocking(engine, move |engine| {
            Ok(engine.analyze_impact(&target, &options)?)
        })
        .await
    }

    /// Attach a runtime event to a node.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, the timestamp isn't RFC 3339,
    /// or the event is malformed.
    pub async fn send_telemetry(&self, params: TelemetryParams) -> Result<TelemetryAck> {
        let Mounted { engine, .. } = self.mounted(params.project_root.as_deref()).await?;
        let timestamp = params
            .timestamp
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        let event = TelemetryEvent {
            timestamp,
            metadata: params.metadata,
            ..TelemetryEvent::new(
                params.node,
                params.severity,
                params.message,
                params.source_agent_id,
            )
        };

        blocking(engine, move |engine| Ok(engine.send_telemetry(event)?)).await
    }

    async fn mounted(&self, project_root: Option<&str>) -> Result<Mounted> {
        self.context
            .read()
            .await
            .engine_for(project_root.map(Path::new))
    }
}

/// Run a full scan on the blocking pool.
async fn scan(engine: Arc<NeuroVision>, cancel: CancellationToken) -> Result<ScanReport> {
    let summary = blocking(engine, move |engine| Ok(engine.scan(&cancel)?)).await?;
    Ok(summary.into())
}

async fn blocking<T, F>(engine: Arc<NeuroVision>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&NeuroVision) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&engine)).await?
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::InvalidArgument {
            field: "timestamp",
            reason: format!("'{raw}' is not an RFC 3339 timestamp: {e}"),
        })
}
