//! Unified configuration system for Galley.
//!
//! This module provides the configuration foundation that reads from
//! `.galley/galley.toml`. It supports:
//! - Pipeline settings with sensible defaults
//! - Layered configuration (file → environment → CLI)
//! - Well-known paths under the `.galley/` project directory
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! name = "my-book"
//!
//! [pipeline]
//! similarity_threshold = 0.8
//! max_search_results = 5
//! default_target_length = 2000
//! min_target_length = 1000
//! max_target_length = 5000
//! capture_screenshots = true
//! require_human_review = true
//! auto_finalize = false
//! publication_chapter_id = "PUBLICATION"
//! default_description = "No description provided"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Project name (optional, defaults to directory name)
    #[serde(default)]
    pub name: Option<String>,
}

/// Pipeline tuning knobs.
///
/// Every numeric policy the store and orchestrator consult lives here so
/// none of them is hard-coded at a call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum similarity score a search hit must reach to be returned.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Maximum number of similarity search results.
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
    /// Target length used when a chapter spec does not set one.
    #[serde(default = "default_target_length")]
    pub default_target_length: usize,
    /// Lower clamp for chapter target lengths.
    #[serde(default = "default_min_target_length")]
    pub min_target_length: usize,
    /// Upper clamp for chapter target lengths.
    #[serde(default = "default_max_target_length")]
    pub max_target_length: usize,
    /// Ask the research provider to capture auxiliary artifacts
    /// (screenshots) alongside the text. Providers may ignore it.
    #[serde(default = "default_capture_screenshots")]
    pub capture_screenshots: bool,
    /// Whether the pipeline submits a human review request per chapter.
    #[serde(default = "default_require_human_review")]
    pub require_human_review: bool,
    /// Publish a reviewer's edited version immediately on completion.
    #[serde(default)]
    pub auto_finalize: bool,
    /// Reserved chapter id the publication document is stored under.
    #[serde(default = "default_publication_chapter_id")]
    pub publication_chapter_id: String,
    /// Description used when a chapter spec does not provide one.
    #[serde(default = "default_description")]
    pub default_description: String,
}

fn default_similarity_threshold() -> f32 {
    0.8
}

fn default_max_search_results() -> usize {
    5
}

fn default_target_length() -> usize {
    2000
}

fn default_min_target_length() -> usize {
    1000
}

fn default_max_target_length() -> usize {
    5000
}

fn default_capture_screenshots() -> bool {
    true
}

fn default_require_human_review() -> bool {
    true
}

fn default_publication_chapter_id() -> String {
    "PUBLICATION".to_string()
}

fn default_description() -> String {
    "No description provided".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_search_results: default_max_search_results(),
            default_target_length: default_target_length(),
            min_target_length: default_min_target_length(),
            max_target_length: default_max_target_length(),
            capture_screenshots: default_capture_screenshots(),
            require_human_review: default_require_human_review(),
            auto_finalize: false,
            publication_chapter_id: default_publication_chapter_id(),
            default_description: default_description(),
        }
    }
}

impl PipelineConfig {
    /// Apply `GALLEY_*` environment overrides on top of file values.
    /// Unparseable values are ignored rather than treated as errors.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("GALLEY_SIMILARITY_THRESHOLD")
            && let Ok(parsed) = v.parse::<f32>()
        {
            self.similarity_threshold = parsed;
        }
        if let Ok(v) = std::env::var("GALLEY_MAX_SEARCH_RESULTS")
            && let Ok(parsed) = v.parse::<usize>()
        {
            self.max_search_results = parsed;
        }
        if let Ok(v) = std::env::var("GALLEY_REQUIRE_HUMAN_REVIEW") {
            self.require_human_review = v != "false" && v != "0";
        }
        if let Ok(v) = std::env::var("GALLEY_AUTO_FINALIZE") {
            self.auto_finalize = v == "true" || v == "1";
        }
    }

    /// Clamp a requested chapter length into `[min, max]`, falling back
    /// to the default when the spec does not set one.
    pub fn target_length_for(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_target_length)
            .clamp(self.min_target_length, self.max_target_length)
    }
}

/// The complete galley.toml configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleyToml {
    /// Project-level settings
    #[serde(default)]
    pub project: ProjectSection,
    /// Pipeline tuning knobs
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl GalleyToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse galley.toml")
    }

    /// Load configuration from the default location (.galley/galley.toml).
    /// Returns default configuration if file doesn't exist.
    pub fn load_or_default(galley_dir: &Path) -> Result<Self> {
        let config_path = galley_dir.join("galley.toml");
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize galley.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !(0.0..=1.0).contains(&self.pipeline.similarity_threshold) {
            warnings.push(format!(
                "similarity_threshold {} outside [0.0, 1.0]; matches may never (or always) pass",
                self.pipeline.similarity_threshold
            ));
        }
        if self.pipeline.max_search_results == 0 {
            warnings.push("max_search_results is 0; similarity search will return nothing".into());
        }
        if self.pipeline.min_target_length > self.pipeline.max_target_length {
            warnings.push(format!(
                "min_target_length {} exceeds max_target_length {}",
                self.pipeline.min_target_length, self.pipeline.max_target_length
            ));
        }
        if self.pipeline.publication_chapter_id.trim().is_empty() {
            warnings.push("publication_chapter_id is empty".into());
        }

        warnings
    }
}

/// Runtime configuration for one galley invocation.
///
/// Merges settings from:
/// 1. galley.toml file
/// 2. `GALLEY_*` environment variables
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct GalleyConfig {
    /// Path to the project directory
    pub project_dir: PathBuf,
    /// Path to the .galley directory
    pub galley_dir: PathBuf,
    /// Parsed galley.toml configuration
    pub toml: GalleyToml,
    /// CLI override: verbose mode
    pub verbose: bool,
}

impl GalleyConfig {
    /// Create a new GalleyConfig from a project directory.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let galley_dir = project_dir.join(".galley");
        let mut toml = GalleyToml::load_or_default(&galley_dir)?;
        toml.pipeline.apply_env();

        Ok(Self {
            project_dir,
            galley_dir,
            toml,
            verbose: false,
        })
    }

    /// Create GalleyConfig with CLI overrides.
    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        require_human_review: Option<bool>,
        auto_finalize: Option<bool>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        if let Some(require) = require_human_review {
            config.toml.pipeline.require_human_review = require;
        }
        if let Some(auto) = auto_finalize {
            config.toml.pipeline.auto_finalize = auto;
        }
        Ok(config)
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.toml.pipeline
    }

    /// Get path to the version store database.
    pub fn store_db(&self) -> PathBuf {
        self.galley_dir.join("versions.db")
    }

    /// Get path to the review queue snapshot.
    pub fn queue_file(&self) -> PathBuf {
        self.galley_dir.join("reviews.json")
    }

    /// Get path to the run report directory.
    pub fn reports_dir(&self) -> PathBuf {
        self.galley_dir.join("reports")
    }

    /// Get path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.galley_dir.join("galley.toml")
    }

    /// Get path to the sample book manifest written by `init`.
    pub fn sample_book_file(&self) -> PathBuf {
        self.project_dir.join("book.yaml")
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
