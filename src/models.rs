//! Shared data model for the publication pipeline.
//!
//! Everything that crosses a subsystem boundary lives here:
//! - `ContentVersion` — one immutable snapshot of chapter content
//! - `Chapter` / `ChapterSpec` / `BookSpec` — units of work and their manifest
//! - `ReviewRequest` and the review enums
//! - `PublicationPhase` — the state machine states
//! - Publication document shapes and run statistics
//! - Store view types (`LineageNode`, `StoreStats`)
//!
//! The metadata map stays an open `String -> JSON value` bag at the
//! serialization boundary, but the fields the pipeline itself reads go
//! through the typed [`ReviewStamp`] and [`ResearchMeta`] schemas.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Open string-keyed metadata bag carried by versions, chapters, and requests.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Pipeline stage a piece of content was produced at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Scraped,
    AiWritten,
    AiReviewed,
    HumanReview,
    HumanEdited,
    Finalized,
    Published,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scraped => "scraped",
            Self::AiWritten => "ai_written",
            Self::AiReviewed => "ai_reviewed",
            Self::HumanReview => "human_review",
            Self::HumanEdited => "human_edited",
            Self::Finalized => "finalized",
            Self::Published => "published",
        }
    }

    /// True for statuses produced by a human touching the content.
    pub fn is_human(&self) -> bool {
        matches!(self, Self::HumanReview | Self::HumanEdited)
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scraped" => Ok(Self::Scraped),
            "ai_written" => Ok(Self::AiWritten),
            "ai_reviewed" => Ok(Self::AiReviewed),
            "human_review" => Ok(Self::HumanReview),
            "human_edited" => Ok(Self::HumanEdited),
            "finalized" => Ok(Self::Finalized),
            "published" => Ok(Self::Published),
            _ => Err(format!("Invalid content status: {}", s)),
        }
    }
}

/// Who (or what) produced a version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Producer {
    Scraper,
    AiWriter,
    AiReviewer,
    HumanWriter,
    HumanReviewer,
    HumanEditor,
    System,
}

impl Producer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scraper => "scraper",
            Self::AiWriter => "ai_writer",
            Self::AiReviewer => "ai_reviewer",
            Self::HumanWriter => "human_writer",
            Self::HumanReviewer => "human_reviewer",
            Self::HumanEditor => "human_editor",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Producer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scraper" => Ok(Self::Scraper),
            "ai_writer" => Ok(Self::AiWriter),
            "ai_reviewer" => Ok(Self::AiReviewer),
            "human_writer" => Ok(Self::HumanWriter),
            "human_reviewer" => Ok(Self::HumanReviewer),
            "human_editor" => Ok(Self::HumanEditor),
            "system" => Ok(Self::System),
            _ => Err(format!("Invalid producer: {}", s)),
        }
    }
}

/// State machine states a chapter moves through, in pipeline order.
/// `Completed` and `Failed` are terminal; `Failed` is reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublicationPhase {
    Research,
    Drafting,
    Spinning,
    Review,
    HumanReview,
    Finalization,
    Publication,
    Completed,
    Failed,
}

impl PublicationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Drafting => "drafting",
            Self::Spinning => "spinning",
            Self::Review => "review",
            Self::HumanReview => "human_review",
            Self::Finalization => "finalization",
            Self::Publication => "publication",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for PublicationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublicationPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "research" => Ok(Self::Research),
            "drafting" => Ok(Self::Drafting),
            "spinning" => Ok(Self::Spinning),
            "review" => Ok(Self::Review),
            "human_review" => Ok(Self::HumanReview),
            "finalization" => Ok(Self::Finalization),
            "publication" => Ok(Self::Publication),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid publication phase: {}", s)),
        }
    }
}

/// Flavor of human review being requested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    General,
    CopyEdit,
    Style,
    Technical,
}

impl ReviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::CopyEdit => "copy_edit",
            Self::Style => "style",
            Self::Technical => "technical",
        }
    }
}

impl std::fmt::Display for ReviewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Self::General),
            "copy_edit" => Ok(Self::CopyEdit),
            "style" => Ok(Self::Style),
            "technical" => Ok(Self::Technical),
            _ => Err(format!("Invalid review type: {}", s)),
        }
    }
}

/// Lifecycle state of a review request. `Completed` and `Rejected` are
/// terminal; rejected requests stay in the pending collection as a record
/// (they are excluded from pending listings).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Completed,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid review status: {}", s)),
        }
    }
}

/// Submitter-declared priority of a review request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl ReviewPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for ReviewPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Invalid review priority: {}", s)),
        }
    }
}

/// Age-derived urgency of a pending review request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    /// Classify by time spent waiting: over 72 hours is high, over 24
    /// hours is medium, anything younger is low.
    pub fn from_age(age: Duration) -> Self {
        if age > Duration::hours(72) {
            Self::High
        } else if age > Duration::hours(24) {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable snapshot of a chapter's content at a pipeline stage.
///
/// Only `status` may change after creation (an atomic in-place transition
/// performed by the store); id, content, and lineage never change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentVersion {
    pub id: String,
    pub chapter_id: String,
    pub content: String,
    pub status: ContentStatus,
    pub producer: Producer,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub parent_version_id: Option<String>,
}

impl ContentVersion {
    pub fn new(
        chapter_id: impl Into<String>,
        content: impl Into<String>,
        status: ContentStatus,
        producer: Producer,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chapter_id: chapter_id.into(),
            content: content.into(),
            status,
            producer,
            metadata: Metadata::new(),
            created_at: Utc::now(),
            parent_version_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_version_id = Some(parent_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Deterministic fingerprint of the content (hex SHA-256).
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// First `limit` characters of the content, with `...` appended when
    /// truncated. Character-based so multi-byte content never splits.
    pub fn preview(&self, limit: usize) -> String {
        if self.content.chars().count() <= limit {
            self.content.clone()
        } else {
            let head: String = self.content.chars().take(limit).collect();
            format!("{}...", head)
        }
    }

    pub fn review_stamp(&self) -> Option<ReviewStamp> {
        ReviewStamp::from_metadata(&self.metadata)
    }

    pub fn research_meta(&self) -> Option<ResearchMeta> {
        ResearchMeta::from_metadata(&self.metadata)
    }
}

/// Typed schema for the review-completion fields the pipeline reads back
/// out of version metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewStamp {
    pub review_id: String,
    pub reviewer_name: String,
    pub review_type: ReviewType,
    pub feedback: String,
    pub completed_at: DateTime<Utc>,
}

impl ReviewStamp {
    pub fn apply_to(&self, metadata: &mut Metadata) {
        metadata.insert("review_id".into(), self.review_id.clone().into());
        metadata.insert("reviewer_name".into(), self.reviewer_name.clone().into());
        metadata.insert("review_type".into(), self.review_type.as_str().into());
        metadata.insert("feedback".into(), self.feedback.clone().into());
        metadata.insert(
            "review_completed_at".into(),
            self.completed_at.to_rfc3339().into(),
        );
    }

    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        let review_id = metadata.get("review_id")?.as_str()?.to_string();
        let reviewer_name = metadata.get("reviewer_name")?.as_str()?.to_string();
        let review_type = metadata
            .get("review_type")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(ReviewType::General);
        let feedback = metadata
            .get("feedback")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let completed_at = metadata
            .get("review_completed_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))?;
        Some(Self {
            review_id,
            reviewer_name,
            review_type,
            feedback,
            completed_at,
        })
    }
}

/// Typed schema for the research-phase fields stored on scraped versions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchMeta {
    pub sources: Vec<String>,
    pub total_sources: usize,
    pub successful_sources: usize,
    pub total_content_length: usize,
}

impl ResearchMeta {
    pub fn apply_to(&self, metadata: &mut Metadata) {
        metadata.insert(
            "sources".into(),
            self.sources
                .iter()
                .map(|s| serde_json::Value::from(s.clone()))
                .collect(),
        );
        metadata.insert("total_sources".into(), self.total_sources.into());
        metadata.insert("successful_sources".into(), self.successful_sources.into());
        metadata.insert(
            "total_content_length".into(),
            self.total_content_length.into(),
        );
    }

    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        let sources = metadata
            .get("sources")?
            .as_array()?
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();
        Some(Self {
            sources,
            total_sources: metadata.get("total_sources")?.as_u64()? as usize,
            successful_sources: metadata.get("successful_sources")?.as_u64()? as usize,
            total_content_length: metadata.get("total_content_length")?.as_u64()? as usize,
        })
    }
}

/// Manifest entry describing one chapter to process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_length: Option<usize>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub research_sources: Vec<String>,
}

/// Book manifest: the input to a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub chapters: Vec<ChapterSpec>,
}

impl BookSpec {
    /// Load a book manifest from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read book manifest: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse book manifest: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content =
            serde_yaml::to_string(self).context("Failed to serialize book manifest")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write book manifest: {}", path.display()))?;
        Ok(())
    }
}

/// A unit of work moving through the pipeline. Owned exclusively by the
/// orchestrator for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub source_url: Option<String>,
    pub description: String,
    pub target_length: usize,
    pub keywords: Vec<String>,
    pub research_sources: Vec<String>,
    pub current_phase: PublicationPhase,
    pub research_version_id: Option<String>,
    pub draft_version_id: Option<String>,
    pub spun_version_id: Option<String>,
    pub reviewed_version_id: Option<String>,
    pub final_version_id: Option<String>,
    /// Append-only, creation order.
    pub version_ids: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Chapter {
    /// Build a chapter from a manifest entry, clamping the target length
    /// into `[min_length, max_length]` and filling defaults.
    pub fn from_spec(
        spec: &ChapterSpec,
        default_length: usize,
        min_length: usize,
        max_length: usize,
        default_description: &str,
    ) -> Self {
        let target = spec
            .target_length
            .unwrap_or(default_length)
            .clamp(min_length, max_length);
        Self {
            id: spec
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: spec.title.clone(),
            source_url: spec.source_url.clone(),
            description: spec
                .description
                .clone()
                .unwrap_or_else(|| default_description.to_string()),
            target_length: target,
            keywords: spec.keywords.clone(),
            research_sources: spec.research_sources.clone(),
            current_phase: PublicationPhase::Research,
            research_version_id: None,
            draft_version_id: None,
            spun_version_id: None,
            reviewed_version_id: None,
            final_version_id: None,
            version_ids: Vec::new(),
            metadata: Metadata::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn record_version(&mut self, version_id: impl Into<String>) {
        self.version_ids.push(version_id.into());
    }

    /// Sources to research: the explicit research list, falling back to
    /// the chapter's own source URL.
    pub fn effective_sources(&self) -> Vec<String> {
        if !self.research_sources.is_empty() {
            self.research_sources.clone()
        } else {
            self.source_url.iter().cloned().collect()
        }
    }
}

/// A pending or resolved ask for human judgment on one version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub id: String,
    pub chapter_id: String,
    pub version: ContentVersion,
    pub review_type: ReviewType,
    pub priority: ReviewPriority,
    pub status: ReviewStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewer_notes: Option<String>,
    #[serde(default)]
    pub assigned_reviewer: Option<String>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

impl ReviewRequest {
    /// Age-derived urgency, measured from submission to now.
    pub fn urgency(&self) -> Urgency {
        self.urgency_at(Utc::now())
    }

    pub fn urgency_at(&self, now: DateTime<Utc>) -> Urgency {
        Urgency::from_age(now - self.submitted_at)
    }
}

/// Per-phase wall-clock timings and chapter counters for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub total_chapters: usize,
    pub completed_chapters: usize,
    pub failed_chapters: usize,
    /// Phase name -> elapsed seconds.
    pub phase_times: BTreeMap<String, f64>,
}

impl RunStats {
    pub fn new(total_chapters: usize) -> Self {
        Self {
            started_at: Utc::now(),
            total_chapters,
            completed_chapters: 0,
            failed_chapters: 0,
            phase_times: BTreeMap::new(),
        }
    }
}

/// One chapter inside the compiled publication document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedChapter {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationMeta {
    pub total_chapters: usize,
    pub generation_date: DateTime<Utc>,
    pub workflow_stats: RunStats,
}

/// The terminal aggregate of a successful run, serialized as the content
/// of a version stored under the reserved publication chapter id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationDoc {
    pub metadata: PublicationMeta,
    pub chapters: Vec<PublishedChapter>,
}

/// One node of a chapter's lineage forest.
///
/// `version` is `None` for stub parents: a parent id referenced by some
/// version but absent from the chapter's own set, which signals a
/// cross-chapter or missing-parent anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageNode {
    pub id: String,
    pub version: Option<ContentVersion>,
    pub children: Vec<LineageNode>,
}

impl LineageNode {
    pub fn is_stub(&self) -> bool {
        self.version.is_none()
    }

    /// Number of real (non-stub) versions in this subtree.
    pub fn version_count(&self) -> usize {
        let own = usize::from(!self.is_stub());
        own + self
            .children
            .iter()
            .map(LineageNode::version_count)
            .sum::<usize>()
    }
}

/// Aggregate counts over everything in the version store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_versions: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_producer: BTreeMap<String, usize>,
    pub by_chapter: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================
    // Enum round-trip tests
    // =========================================

    #[test]
    fn test_content_status_roundtrip() {
        for s in &[
            "scraped",
            "ai_written",
            "ai_reviewed",
            "human_review",
            "human_edited",
            "finalized",
            "published",
        ] {
            let parsed: ContentStatus = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        assert!("invalid".parse::<ContentStatus>().is_err());
    }

    #[test]
    fn test_producer_roundtrip() {
        for s in &[
            "scraper",
            "ai_writer",
            "ai_reviewer",
            "human_writer",
            "human_reviewer",
            "human_editor",
            "system",
        ] {
            let parsed: Producer = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        assert!("invalid".parse::<Producer>().is_err());
    }

    #[test]
    fn test_publication_phase_roundtrip() {
        for s in &[
            "research",
            "drafting",
            "spinning",
            "review",
            "human_review",
            "finalization",
            "publication",
            "completed",
            "failed",
        ] {
            let parsed: PublicationPhase = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        assert!("invalid".parse::<PublicationPhase>().is_err());
    }

    #[test]
    fn test_review_enums_roundtrip() {
        for s in &["general", "copy_edit", "style", "technical"] {
            let parsed: ReviewType = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        for s in &["pending", "completed", "rejected"] {
            let parsed: ReviewStatus = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        for s in &["low", "normal", "high", "urgent"] {
            let parsed: ReviewPriority = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
    }

    #[test]
    fn test_serde_produces_snake_case_strings() {
        assert_eq!(
            serde_json::to_string(&ContentStatus::AiWritten).unwrap(),
            "\"ai_written\""
        );
        assert_eq!(
            serde_json::to_string(&Producer::HumanEditor).unwrap(),
            "\"human_editor\""
        );
        assert_eq!(
            serde_json::to_string(&PublicationPhase::HumanReview).unwrap(),
            "\"human_review\""
        );
        assert_eq!(
            serde_json::to_string(&ReviewType::CopyEdit).unwrap(),
            "\"copy_edit\""
        );
    }

    #[test]
    fn test_phase_terminal_states() {
        assert!(PublicationPhase::Completed.is_terminal());
        assert!(PublicationPhase::Failed.is_terminal());
        assert!(!PublicationPhase::Research.is_terminal());
        assert!(!PublicationPhase::Publication.is_terminal());
    }

    // =========================================
    // Urgency tests
    // =========================================

    #[test]
    fn test_urgency_boundaries() {
        assert_eq!(Urgency::from_age(Duration::hours(1)), Urgency::Low);
        assert_eq!(Urgency::from_age(Duration::hours(24)), Urgency::Low);
        assert_eq!(Urgency::from_age(Duration::hours(25)), Urgency::Medium);
        assert_eq!(Urgency::from_age(Duration::hours(72)), Urgency::Medium);
        assert_eq!(Urgency::from_age(Duration::hours(73)), Urgency::High);
    }

    #[test]
    fn test_request_urgency_from_submission_time() {
        let version = ContentVersion::new(
            "ch-1",
            "text",
            ContentStatus::AiReviewed,
            Producer::AiReviewer,
        );
        let now = Utc::now();
        let request = ReviewRequest {
            id: "r-1".into(),
            chapter_id: "ch-1".into(),
            version,
            review_type: ReviewType::General,
            priority: ReviewPriority::Normal,
            status: ReviewStatus::Pending,
            submitted_at: now - Duration::hours(25),
            reviewer_notes: None,
            assigned_reviewer: None,
            assigned_at: None,
            completed_at: None,
            rejection_reason: None,
        };
        assert_eq!(request.urgency_at(now), Urgency::Medium);
    }

    // =========================================
    // ContentVersion tests
    // =========================================

    #[test]
    fn test_version_fingerprint_is_deterministic() {
        let a = ContentVersion::new("ch", "same text", ContentStatus::Scraped, Producer::Scraper);
        let b = ContentVersion::new("ch", "same text", ContentStatus::Scraped, Producer::Scraper);
        assert_eq!(a.fingerprint(), b.fingerprint());
        let c = ContentVersion::new("ch", "other text", ContentStatus::Scraped, Producer::Scraper);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_version_preview_truncates() {
        let long = "x".repeat(300);
        let v = ContentVersion::new("ch", long, ContentStatus::Scraped, Producer::Scraper);
        let preview = v.preview(200);
        assert_eq!(preview.chars().count(), 203);
        assert!(preview.ends_with("..."));

        let short = ContentVersion::new("ch", "short", ContentStatus::Scraped, Producer::Scraper);
        assert_eq!(short.preview(200), "short");
    }

    #[test]
    fn test_version_with_parent() {
        let v = ContentVersion::new("ch", "body", ContentStatus::AiWritten, Producer::AiWriter)
            .with_parent("v-parent");
        assert_eq!(v.parent_version_id.as_deref(), Some("v-parent"));
    }

    #[test]
    fn test_version_serde_roundtrip() {
        let mut v = ContentVersion::new("ch", "body", ContentStatus::AiWritten, Producer::AiWriter)
            .with_parent("v-0");
        v.metadata.insert("score".into(), 8.5.into());
        let json = serde_json::to_string(&v).unwrap();
        let parsed: ContentVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, v);
    }

    // =========================================
    // Typed metadata tests
    // =========================================

    #[test]
    fn test_review_stamp_roundtrip_through_metadata() {
        let stamp = ReviewStamp {
            review_id: "rev-1".into(),
            reviewer_name: "Alice".into(),
            review_type: ReviewType::CopyEdit,
            feedback: "looks good".into(),
            completed_at: Utc::now(),
        };
        let mut metadata = Metadata::new();
        stamp.apply_to(&mut metadata);

        let read = ReviewStamp::from_metadata(&metadata).unwrap();
        assert_eq!(read.review_id, "rev-1");
        assert_eq!(read.reviewer_name, "Alice");
        assert_eq!(read.review_type, ReviewType::CopyEdit);
        assert_eq!(read.feedback, "looks good");
    }

    #[test]
    fn test_review_stamp_absent_when_not_stamped() {
        let v = ContentVersion::new("ch", "body", ContentStatus::Scraped, Producer::Scraper);
        assert!(v.review_stamp().is_none());
    }

    #[test]
    fn test_research_meta_roundtrip_through_metadata() {
        let meta = ResearchMeta {
            sources: vec!["a.md".into(), "b.md".into()],
            total_sources: 2,
            successful_sources: 2,
            total_content_length: 1024,
        };
        let mut metadata = Metadata::new();
        meta.apply_to(&mut metadata);
        let read = ResearchMeta::from_metadata(&metadata).unwrap();
        assert_eq!(read, meta);
    }

    // =========================================
    // Chapter tests
    // =========================================

    fn spec(title: &str) -> ChapterSpec {
        ChapterSpec {
            id: None,
            title: title.to_string(),
            source_url: None,
            description: None,
            target_length: None,
            keywords: Vec::new(),
            research_sources: Vec::new(),
        }
    }

    #[test]
    fn test_chapter_from_spec_defaults() {
        let chapter = Chapter::from_spec(&spec("Intro"), 2000, 1000, 5000, "No description");
        assert_eq!(chapter.title, "Intro");
        assert_eq!(chapter.target_length, 2000);
        assert_eq!(chapter.description, "No description");
        assert_eq!(chapter.current_phase, PublicationPhase::Research);
        assert!(chapter.version_ids.is_empty());
        assert!(!chapter.id.is_empty());
    }

    #[test]
    fn test_chapter_target_length_clamped() {
        let mut s = spec("Long");
        s.target_length = Some(9000);
        let chapter = Chapter::from_spec(&s, 2000, 1000, 5000, "d");
        assert_eq!(chapter.target_length, 5000);

        s.target_length = Some(10);
        let chapter = Chapter::from_spec(&s, 2000, 1000, 5000, "d");
        assert_eq!(chapter.target_length, 1000);
    }

    #[test]
    fn test_chapter_effective_sources_falls_back_to_url() {
        let mut s = spec("Src");
        s.source_url = Some("notes/src.md".into());
        let chapter = Chapter::from_spec(&s, 2000, 1000, 5000, "d");
        assert_eq!(chapter.effective_sources(), vec!["notes/src.md"]);

        let mut s = spec("Src");
        s.source_url = Some("notes/src.md".into());
        s.research_sources = vec!["a.md".into(), "b.md".into()];
        let chapter = Chapter::from_spec(&s, 2000, 1000, 5000, "d");
        assert_eq!(chapter.effective_sources(), vec!["a.md", "b.md"]);
    }

    #[test]
    fn test_chapter_record_version_appends_in_order() {
        let mut chapter = Chapter::from_spec(&spec("Ord"), 2000, 1000, 5000, "d");
        chapter.record_version("v-1");
        chapter.record_version("v-2");
        assert_eq!(chapter.version_ids, vec!["v-1", "v-2"]);
    }

    // =========================================
    // Book manifest tests
    // =========================================

    #[test]
    fn test_book_spec_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.yaml");
        let book = BookSpec {
            title: "Field Notes".into(),
            description: Some("a test book".into()),
            chapters: vec![spec("One"), spec("Two")],
        };
        book.save(&path).unwrap();
        let loaded = BookSpec::load(&path).unwrap();
        assert_eq!(loaded.title, "Field Notes");
        assert_eq!(loaded.chapters.len(), 2);
        assert_eq!(loaded.chapters[1].title, "Two");
    }

    #[test]
    fn test_book_spec_minimal_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.yaml");
        std::fs::write(
            &path,
            "title: Minimal\nchapters:\n  - title: Only\n",
        )
        .unwrap();
        let loaded = BookSpec::load(&path).unwrap();
        assert_eq!(loaded.chapters.len(), 1);
        assert!(loaded.chapters[0].research_sources.is_empty());
        assert!(loaded.chapters[0].target_length.is_none());
    }

    // =========================================
    // Lineage node tests
    // =========================================

    #[test]
    fn test_lineage_node_version_count_skips_stubs() {
        let leaf = LineageNode {
            id: "v-2".into(),
            version: Some(ContentVersion::new(
                "ch",
                "x",
                ContentStatus::AiWritten,
                Producer::AiWriter,
            )),
            children: Vec::new(),
        };
        let stub_root = LineageNode {
            id: "v-missing".into(),
            version: None,
            children: vec![leaf],
        };
        assert!(stub_root.is_stub());
        assert_eq!(stub_root.version_count(), 1);
    }
}
