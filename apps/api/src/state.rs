use crate::analysis::pipeline::Pipeline;
use crate::artifacts::ArtifactStore;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
/// Holds only immutable config and `Arc`-backed services; requests share no
/// mutable state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Generation client, prompt templates and renderer, wired per task flow.
    pub pipeline: Pipeline,
    pub artifacts: ArtifactStore,
}
