//! External collaborator contracts for the pipeline.
//!
//! The orchestrator treats everything that fetches a source, invokes a
//! model, or gathers human feedback as a provider behind one of the
//! traits below. The pipeline owns versioning, phases, and the review
//! queue; providers own the mechanics of producing text.
//!
//! ## Components
//!
//! - [`ResearchProvider`]: source fetching and per-chapter research
//! - [`GenerationProvider`]: drafting, style transforms, critique
//! - [`ReviewGate`]: the human-feedback surface consulted during the
//!   human-review phase
//! - [`offline`]: deterministic implementations that run without
//!   network access or model credentials

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ProviderError;
use crate::models::{ContentVersion, ResearchMeta};

pub mod offline;

// Re-export main types
pub use offline::{OfflineGeneration, OfflineResearch};

/// One fetched source document, reduced to text.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    pub title: String,
    pub text: String,
}

/// Combined research for a chapter plus the typed metadata the research
/// phase stamps onto the scraped version.
#[derive(Debug, Clone)]
pub struct ResearchBundle {
    pub text: String,
    pub meta: ResearchMeta,
}

/// Style knobs for the spinning transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleOptions {
    pub tone: String,
    pub perspective: String,
    pub length: String,
    pub audience: String,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            tone: "professional".to_string(),
            perspective: "third_person".to_string(),
            length: "maintain".to_string(),
            audience: "general".to_string(),
        }
    }
}

/// Reviewer verdict on a draft. `revised` carries replacement text only
/// when the critique actually produced one.
#[derive(Debug, Clone)]
pub struct Critique {
    pub revised: Option<String>,
    pub score: f32,
    pub suggestions: Vec<String>,
    pub improvements: Vec<String>,
}

/// Outcome of consulting the human-feedback surface for one request.
#[derive(Debug, Clone, Default)]
pub struct GateOutcome {
    pub requires_changes: bool,
    pub edited_content: Option<String>,
    pub feedback: Option<String>,
    pub changes_made: Option<String>,
}

impl GateOutcome {
    /// No feedback available now; the request stays pending in the queue.
    pub fn no_changes() -> Self {
        Self::default()
    }

    pub fn with_edit(edited_content: &str, feedback: &str) -> Self {
        Self {
            requires_changes: true,
            edited_content: Some(edited_content.to_string()),
            feedback: Some(feedback.to_string()),
            changes_made: None,
        }
    }
}

/// Abstraction over source fetching and research assembly.
/// Shipped implementation: [`OfflineResearch`]. Failure is an `Err`,
/// never an empty-but-successful bundle.
#[async_trait]
pub trait ResearchProvider: Send + Sync {
    /// Fetch a single source and reduce it to a titled text page.
    async fn fetch(&self, source: &str) -> Result<SourcePage, ProviderError>;

    /// Gather and combine research for a chapter from its sources.
    async fn research(
        &self,
        title: &str,
        keywords: &[String],
        sources: &[String],
    ) -> Result<ResearchBundle, ProviderError>;
}

/// Abstraction over the generative model.
/// Shipped implementation: [`OfflineGeneration`].
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Write a draft from research toward a target character length.
    async fn generate(
        &self,
        title: &str,
        research: &str,
        target_length: usize,
        description: &str,
    ) -> Result<String, ProviderError>;

    /// Rework existing text per the instructions and style options.
    async fn transform(
        &self,
        text: &str,
        instructions: &str,
        style: &StyleOptions,
    ) -> Result<String, ProviderError>;

    /// Critique a draft, optionally supplying revised text.
    async fn critique(
        &self,
        text: &str,
        title: &str,
        description: &str,
    ) -> Result<Critique, ProviderError>;
}

/// The human-feedback surface consulted once per chapter during the
/// human-review phase, after the review request has been queued.
#[async_trait]
pub trait ReviewGate: Send + Sync {
    async fn resolve(
        &self,
        review_id: &str,
        version: &ContentVersion,
    ) -> Result<GateOutcome, ProviderError>;
}

/// Gate that never resolves feedback in-process.
///
/// The review request stays pending in the queue and a human completes
/// or rejects it later through the CLI. This is the default gate for
/// unattended runs.
pub struct DeferredGate;

#[async_trait]
impl ReviewGate for DeferredGate {
    async fn resolve(
        &self,
        review_id: &str,
        _version: &ContentVersion,
    ) -> Result<GateOutcome, ProviderError> {
        debug!(review_id = %review_id, "deferring human review to the queue");
        Ok(GateOutcome::no_changes())
    }
}
