//! Deterministic providers that run without network or model access.
//!
//! `OfflineResearch` treats research sources as local file paths and
//! `OfflineGeneration` assembles drafts mechanically from the research
//! text. Output quality is what it is; the point is a pipeline that runs
//! end to end on a laptop with no credentials, and a reference for what
//! each contract is expected to do.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::errors::ProviderError;
use crate::models::ResearchMeta;
use crate::providers::{
    Critique, GenerationProvider, ResearchBundle, ResearchProvider, SourcePage, StyleOptions,
};

/// Reads research sources from the local filesystem.
pub struct OfflineResearch {
    capture_screenshots: bool,
}

impl OfflineResearch {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            capture_screenshots: config.capture_screenshots,
        }
    }
}

#[async_trait]
impl ResearchProvider for OfflineResearch {
    /// Read one source file. The title comes from the first `#` heading
    /// when the file has one, otherwise from the file stem.
    async fn fetch(&self, source: &str) -> Result<SourcePage, ProviderError> {
        if self.capture_screenshots {
            debug!(source = %source, "screenshot capture requested; offline provider has no renderer");
        }
        let path = PathBuf::from(source);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| ProviderError::SourceRead { path, source: err })?;

        let title = text
            .lines()
            .find_map(|line| line.trim().strip_prefix("# ").map(str::to_string))
            .unwrap_or_else(|| file_stem(source));
        Ok(SourcePage {
            title,
            text: text.trim().to_string(),
        })
    }

    /// Fetch every source and combine the readable ones into a single
    /// research text. Unreadable sources are skipped with a warning; the
    /// call fails only when no source yields content.
    async fn research(
        &self,
        title: &str,
        keywords: &[String],
        sources: &[String],
    ) -> Result<ResearchBundle, ProviderError> {
        debug!(
            chapter_title = %title,
            keywords = ?keywords,
            source_count = sources.len(),
            "gathering offline research"
        );
        if sources.is_empty() {
            return Err(ProviderError::NoResearchContent);
        }

        let mut sections: Vec<String> = Vec::new();
        let mut successful = 0;
        for source in sources {
            match self.fetch(source).await {
                Ok(page) if !page.text.is_empty() => {
                    sections.push(format!("Source: {}\n{}", page.title, page.text));
                    successful += 1;
                }
                Ok(_) => {
                    warn!(source = %source, "source is empty, skipping");
                }
                Err(err) => {
                    warn!(source = %source, error = %err, "source unreadable, skipping");
                }
            }
        }
        if sections.is_empty() {
            return Err(ProviderError::NoResearchContent);
        }

        let text = sections.join("\n\n");
        let meta = ResearchMeta {
            sources: sources.to_vec(),
            total_sources: sources.len(),
            successful_sources: successful,
            total_content_length: text.chars().count(),
        };
        Ok(ResearchBundle { text, meta })
    }
}

/// Assembles drafts, transforms, and critiques without a model. Every
/// method is a pure function of its inputs.
pub struct OfflineGeneration;

#[async_trait]
impl GenerationProvider for OfflineGeneration {
    /// Build a draft from the research text: an opening paragraph, then
    /// research paragraphs (source markers stripped) until the target
    /// length is reached, then a closing line.
    async fn generate(
        &self,
        title: &str,
        research: &str,
        target_length: usize,
        description: &str,
    ) -> Result<String, ProviderError> {
        if research.trim().is_empty() {
            return Err(ProviderError::Generation(
                "no research text to draft from".to_string(),
            ));
        }

        let mut paragraphs = vec![format!("{}: {}", title, description)];
        let mut length = paragraphs[0].chars().count();
        for section in research.split("\n\n") {
            let body = strip_source_marker(section);
            if body.is_empty() {
                continue;
            }
            length += body.chars().count();
            paragraphs.push(body.to_string());
            if length >= target_length {
                break;
            }
        }
        paragraphs.push(format!(
            "The sections above summarize the available research on {}.",
            title
        ));
        Ok(paragraphs.join("\n\n"))
    }

    /// Deterministic spin: collapse whitespace inside paragraphs and
    /// append a recap paragraph led by a tone-dependent connector. The
    /// output always differs from the input.
    async fn transform(
        &self,
        text: &str,
        instructions: &str,
        style: &StyleOptions,
    ) -> Result<String, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::Generation("no text to transform".to_string()));
        }
        debug!(instructions = %instructions, tone = %style.tone, "transforming text offline");

        let normalized = normalize_paragraphs(text);
        let connector = if style.tone == "casual" {
            "Put simply"
        } else {
            "To recap"
        };
        let lead = first_sentence(&normalized);
        Ok(format!("{}\n\n{}: {}", normalized, connector, lead))
    }

    /// Score the draft on cheap structural signals. Never supplies
    /// revised text; improvement is the human reviewer's job here.
    async fn critique(
        &self,
        text: &str,
        title: &str,
        description: &str,
    ) -> Result<Critique, ProviderError> {
        debug!(chapter_title = %title, description = %description, "critiquing draft offline");
        let paragraphs = text
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .count();
        let mut score = 6.0 + (paragraphs.min(8) as f32) * 0.25;
        let mut suggestions = Vec::new();

        if !text.to_lowercase().contains(&title.to_lowercase()) {
            suggestions.push(format!("Work the chapter title \"{}\" into the text", title));
            score -= 0.5;
        }
        if text.chars().count() < 400 {
            suggestions.push("Expand the draft, it reads thin".to_string());
            score -= 1.0;
        }
        Ok(Critique {
            revised: None,
            score: score.clamp(0.0, 10.0),
            suggestions,
            improvements: Vec::new(),
        })
    }
}

fn file_stem(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| source.to_string())
}

/// Drop the `Source: ...` marker line a research section starts with.
fn strip_source_marker(section: &str) -> &str {
    let section = section.trim();
    match section.split_once('\n') {
        Some((first, rest)) if first.starts_with("Source: ") => rest.trim(),
        _ if section.starts_with("Source: ") => "",
        _ => section,
    }
}

fn normalize_paragraphs(text: &str) -> String {
    text.split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn first_sentence(text: &str) -> String {
    match text.split_once(". ") {
        Some((head, _)) => format!("{}.", head),
        None => text.lines().next().unwrap_or_default().to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
