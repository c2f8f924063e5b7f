//! The pipeline engine.
//!
//! One `Orchestrator` is built per run from its collaborators; nothing
//! here is global. `run` drives every chapter through the phase table in
//! [`crate::orchestrator::phases`], isolating failures per chapter: a
//! chapter that fails a phase is marked `failed` and its siblings keep
//! going. Only structural problems (empty run, bad spec, a panicked
//! research task, storage faults outside the per-chapter loops) abort
//! the run itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, StoreError};
use crate::models::{
    Chapter, ChapterSpec, ContentStatus, ContentVersion, Producer, PublicationDoc,
    PublicationMeta, PublicationPhase, PublishedChapter, ReviewPriority, ReviewType, RunStats,
};
use crate::orchestrator::phases::{SchedulingPolicy, schedule};
use crate::providers::{GenerationProvider, ResearchProvider, ReviewGate, StyleOptions};
use crate::review::ReviewQueue;
use crate::store::StoreHandle;

/// Instructions handed to the generation provider for the spin pass.
const SPIN_INSTRUCTIONS: &str =
    "Rework the draft for originality and flow while preserving every factual claim";

/// Where one chapter ended up.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterOutcome {
    pub id: String,
    pub title: String,
    pub phase: PublicationPhase,
    pub final_version_id: Option<String>,
}

/// Result of a full run.
///
/// `success` means exactly `completed_chapters == total_chapters`. A run
/// with some failed chapters still returns `Ok` with `success: false`;
/// callers that need per-chapter truth must read `chapters`, not just
/// the boolean.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub chapters: Vec<ChapterOutcome>,
    pub stats: RunStats,
}

/// Point-in-time view of a run for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub current_phase: Option<PublicationPhase>,
    pub chapters: Vec<ChapterOutcome>,
    pub stats: Option<RunStats>,
    pub paused: bool,
    pub cancelled: bool,
}

pub struct Orchestrator {
    store: StoreHandle,
    queue: Mutex<ReviewQueue>,
    research: Arc<dyn ResearchProvider>,
    generation: Arc<dyn GenerationProvider>,
    gate: Arc<dyn ReviewGate>,
    config: PipelineConfig,

    current_phase: Mutex<Option<PublicationPhase>>,
    chapter_view: Mutex<Vec<ChapterOutcome>>,
    stats_view: Mutex<Option<RunStats>>,
    paused: AtomicBool,
    cancelled: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        store: StoreHandle,
        queue: ReviewQueue,
        research: Arc<dyn ResearchProvider>,
        generation: Arc<dyn GenerationProvider>,
        gate: Arc<dyn ReviewGate>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            queue: Mutex::new(queue),
            research,
            generation,
            gate,
            config,
            current_phase: Mutex::new(None),
            chapter_view: Mutex::new(Vec::new()),
            stats_view: Mutex::new(None),
            paused: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Reclaim the review queue, typically to snapshot it after a run.
    pub fn into_queue(self) -> ReviewQueue {
        self.queue.into_inner()
    }

    /// Drive every chapter through the pipeline.
    pub async fn run(&self, specs: Vec<ChapterSpec>) -> Result<RunReport, PipelineError> {
        if specs.is_empty() {
            return Err(PipelineError::EmptyRun);
        }
        for (i, spec) in specs.iter().enumerate() {
            if spec.title.trim().is_empty() {
                return Err(PipelineError::InvalidSpec(format!(
                    "chapter {} has an empty title",
                    i + 1
                )));
            }
        }

        let mut chapters: Vec<Chapter> = specs
            .iter()
            .map(|spec| {
                Chapter::from_spec(
                    spec,
                    self.config.default_target_length,
                    self.config.min_target_length,
                    self.config.max_target_length,
                    &self.config.default_description,
                )
            })
            .collect();
        let mut stats = RunStats::new(chapters.len());
        info!(chapters = chapters.len(), "starting publication run");
        self.publish_view(&chapters, &stats).await;

        for def in schedule() {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            self.wait_if_paused().await;
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }

            *self.current_phase.lock().await = Some(def.phase);
            info!(phase = %def.phase, "entering phase");
            let timer = Instant::now();
            match def.policy {
                SchedulingPolicy::ConcurrentFanOut => {
                    self.research_phase(&mut chapters, &mut stats).await?
                }
                SchedulingPolicy::Serial => {
                    self.serial_phase(def.phase, &mut chapters, &mut stats).await?
                }
            }
            stats
                .phase_times
                .insert(def.phase.as_str().to_string(), timer.elapsed().as_secs_f64());
            self.publish_view(&chapters, &stats).await;
        }

        if self.cancelled.load(Ordering::SeqCst) {
            self.fail_remaining(&mut chapters, &mut stats, "run cancelled");
        }
        *self.current_phase.lock().await = None;
        self.publish_view(&chapters, &stats).await;

        let success = stats.completed_chapters == stats.total_chapters;
        info!(
            success,
            completed = stats.completed_chapters,
            failed = stats.failed_chapters,
            "run finished"
        );
        Ok(RunReport {
            success,
            chapters: chapters.iter().map(outcome_of).collect(),
            stats,
        })
    }

    pub async fn status(&self) -> RunStatus {
        RunStatus {
            current_phase: *self.current_phase.lock().await,
            chapters: self.chapter_view.lock().await.clone(),
            stats: self.stats_view.lock().await.clone(),
            paused: self.paused.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
        }
    }

    /// Advisory: the run loop holds at the next phase boundary.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("pause requested");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        info!("resume requested");
    }

    /// Cooperative: checked between chapters and phases. An in-flight
    /// provider call is never interrupted; every chapter not already in
    /// a terminal state is marked failed once the flag is observed.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        info!("cancellation requested");
    }

    // ── Phase execution ───────────────────────────────────────────────

    /// Fan research out, one task per chapter, and join the whole batch.
    /// A provider error fails only its own chapter; a panicked task is a
    /// bug and fails the run.
    async fn research_phase(
        &self,
        chapters: &mut [Chapter],
        stats: &mut RunStats,
    ) -> Result<(), PipelineError> {
        let mut indexes = Vec::new();
        let mut handles = Vec::new();
        for (idx, chapter) in chapters.iter().enumerate() {
            if chapter.current_phase != PublicationPhase::Research {
                continue;
            }
            let provider = Arc::clone(&self.research);
            let title = chapter.title.clone();
            let keywords = chapter.keywords.clone();
            let sources = chapter.effective_sources();
            indexes.push(idx);
            handles.push(tokio::spawn(async move {
                provider.research(&title, &keywords, &sources).await
            }));
        }

        let results = join_all(handles).await;
        for (idx, joined) in indexes.into_iter().zip(results) {
            let chapter = &mut chapters[idx];
            match joined {
                Ok(Ok(bundle)) => {
                    let mut version = ContentVersion::new(
                        &chapter.id,
                        bundle.text,
                        ContentStatus::Scraped,
                        Producer::Scraper,
                    );
                    bundle.meta.apply_to(&mut version.metadata);
                    let version_id = version.id.clone();
                    match self.store.call(move |store| store.save(&version)).await {
                        Ok(()) => {
                            chapter.research_version_id = Some(version_id.clone());
                            chapter.record_version(version_id);
                            chapter.current_phase = PublicationPhase::Drafting;
                            debug!(chapter_id = %chapter.id, "research complete");
                        }
                        Err(err) => self.fail_chapter(chapter, stats, &err.to_string()),
                    }
                }
                Ok(Err(err)) => self.fail_chapter(chapter, stats, &err.to_string()),
                Err(join_err) => {
                    return Err(PipelineError::ResearchTaskPanicked {
                        chapter_id: chapter.id.clone(),
                        message: join_err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Run one serial phase across all chapters currently in it.
    async fn serial_phase(
        &self,
        phase: PublicationPhase,
        chapters: &mut [Chapter],
        stats: &mut RunStats,
    ) -> Result<(), PipelineError> {
        if phase == PublicationPhase::Publication {
            return self.publication_phase(chapters, stats).await;
        }
        for chapter in chapters.iter_mut() {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            if chapter.current_phase != phase {
                continue;
            }
            let result = match phase {
                PublicationPhase::Drafting => self.draft_chapter(chapter).await,
                PublicationPhase::Spinning => self.spin_chapter(chapter).await,
                PublicationPhase::Review => self.review_chapter(chapter).await,
                PublicationPhase::HumanReview => self.human_review_chapter(chapter).await,
                PublicationPhase::Finalization => self.finalize_chapter(chapter).await,
                _ => Ok(()),
            };
            if let Err(err) = result {
                self.fail_chapter(chapter, stats, &err.to_string());
            }
        }
        Ok(())
    }

    async fn draft_chapter(&self, chapter: &mut Chapter) -> Result<(), PipelineError> {
        let research_id = chapter.research_version_id.clone().ok_or_else(|| {
            PipelineError::MissingVersion {
                chapter_id: chapter.id.clone(),
                role: "research",
            }
        })?;
        let research = self.fetch_version(&research_id).await?;

        let draft_text = self
            .generation
            .generate(
                &chapter.title,
                &research.content,
                chapter.target_length,
                &chapter.description,
            )
            .await?;
        let mut version = ContentVersion::new(
            &chapter.id,
            draft_text,
            ContentStatus::AiWritten,
            Producer::AiWriter,
        )
        .with_parent(research_id);
        version
            .metadata
            .insert("target_length".into(), chapter.target_length.into());

        let version_id = version.id.clone();
        self.store.call(move |store| store.save(&version)).await?;
        chapter.draft_version_id = Some(version_id.clone());
        chapter.record_version(version_id);
        chapter.current_phase = PublicationPhase::Spinning;
        debug!(chapter_id = %chapter.id, "draft complete");
        Ok(())
    }

    async fn spin_chapter(&self, chapter: &mut Chapter) -> Result<(), PipelineError> {
        let draft_id =
            chapter
                .draft_version_id
                .clone()
                .ok_or_else(|| PipelineError::MissingVersion {
                    chapter_id: chapter.id.clone(),
                    role: "draft",
                })?;
        let draft = self.fetch_version(&draft_id).await?;

        let spun_text = self
            .generation
            .transform(&draft.content, SPIN_INSTRUCTIONS, &StyleOptions::default())
            .await?;
        if spun_text.trim().is_empty() || spun_text == draft.content {
            // Nothing new to record; the draft doubles as the spun version.
            debug!(chapter_id = %chapter.id, "transform produced no change, reusing draft");
            chapter.spun_version_id = Some(draft_id);
        } else {
            let mut version = ContentVersion::new(
                &chapter.id,
                spun_text,
                ContentStatus::AiWritten,
                Producer::AiWriter,
            )
            .with_parent(draft_id);
            version
                .metadata
                .insert("transformation".into(), "spin".into());
            let version_id = version.id.clone();
            self.store.call(move |store| store.save(&version)).await?;
            chapter.spun_version_id = Some(version_id.clone());
            chapter.record_version(version_id);
            debug!(chapter_id = %chapter.id, "spin complete");
        }
        chapter.current_phase = PublicationPhase::Review;
        Ok(())
    }

    async fn review_chapter(&self, chapter: &mut Chapter) -> Result<(), PipelineError> {
        let spun_id =
            chapter
                .spun_version_id
                .clone()
                .ok_or_else(|| PipelineError::MissingVersion {
                    chapter_id: chapter.id.clone(),
                    role: "spun",
                })?;
        let spun = self.fetch_version(&spun_id).await?;

        let critique = self
            .generation
            .critique(&spun.content, &chapter.title, &chapter.description)
            .await?;
        chapter
            .metadata
            .insert("review_score".into(), critique.score.into());

        let revision = critique
            .revised
            .filter(|text| !text.trim().is_empty() && *text != spun.content);
        match revision {
            Some(revised) => {
                let mut version = ContentVersion::new(
                    &chapter.id,
                    revised,
                    ContentStatus::AiReviewed,
                    Producer::AiReviewer,
                )
                .with_parent(spun_id);
                version
                    .metadata
                    .insert("review_score".into(), critique.score.into());
                version
                    .metadata
                    .insert("suggestions".into(), critique.suggestions.into());
                version
                    .metadata
                    .insert("improvements_made".into(), critique.improvements.into());
                let version_id = version.id.clone();
                self.store.call(move |store| store.save(&version)).await?;
                chapter.reviewed_version_id = Some(version_id.clone());
                chapter.record_version(version_id);
                debug!(chapter_id = %chapter.id, "review produced a revision");
            }
            None => {
                debug!(chapter_id = %chapter.id, "critique supplied no revision, carrying spun version forward");
                chapter.reviewed_version_id = Some(spun_id);
            }
        }
        chapter.current_phase = PublicationPhase::HumanReview;
        Ok(())
    }

    /// Queue the reviewed version for human signoff, then consult the
    /// gate once. The review id is recorded on the chapter before the
    /// gate runs so the request is findable even if the gate errors.
    async fn human_review_chapter(&self, chapter: &mut Chapter) -> Result<(), PipelineError> {
        let reviewed_id =
            chapter
                .reviewed_version_id
                .clone()
                .ok_or_else(|| PipelineError::MissingVersion {
                    chapter_id: chapter.id.clone(),
                    role: "reviewed",
                })?;

        if !self.config.require_human_review {
            debug!(chapter_id = %chapter.id, "human review disabled, reviewed version becomes final");
            chapter.final_version_id = Some(reviewed_id);
            chapter.current_phase = PublicationPhase::Finalization;
            return Ok(());
        }

        let reviewed = self.fetch_version(&reviewed_id).await?;
        let review_id = {
            let mut queue = self.queue.lock().await;
            queue.submit(
                &chapter.id,
                reviewed.clone(),
                ReviewType::General,
                ReviewPriority::Normal,
            )?
        };
        chapter
            .metadata
            .insert("active_review_id".into(), review_id.clone().into());

        let outcome = self.gate.resolve(&review_id, &reviewed).await?;
        let edit = outcome
            .edited_content
            .filter(|text| outcome.requires_changes && !text.trim().is_empty());
        match edit {
            Some(edited) => {
                let feedback = outcome
                    .feedback
                    .unwrap_or_else(|| "Revised during gated review".to_string());
                let version = {
                    let mut queue = self.queue.lock().await;
                    queue.complete(&review_id, &edited, &feedback, "review_gate")?
                };
                let version_id = version.id.clone();
                self.store.call(move |store| store.save(&version)).await?;
                chapter.final_version_id = Some(version_id.clone());
                chapter.record_version(version_id);
                debug!(chapter_id = %chapter.id, review_id = %review_id, "gate applied an edit");
            }
            None => {
                // The request stays pending in the queue for out-of-band
                // completion; the reviewed version carries forward.
                debug!(chapter_id = %chapter.id, review_id = %review_id, "no changes required now");
                chapter.final_version_id = Some(reviewed_id);
            }
        }
        chapter.current_phase = PublicationPhase::Finalization;
        Ok(())
    }

    async fn finalize_chapter(&self, chapter: &mut Chapter) -> Result<(), PipelineError> {
        let final_id =
            chapter
                .final_version_id
                .clone()
                .ok_or_else(|| PipelineError::MissingVersion {
                    chapter_id: chapter.id.clone(),
                    role: "final",
                })?;
        self.store
            .call(move |store| store.update_status(&final_id, ContentStatus::Published))
            .await?;
        chapter.completed_at = Some(Utc::now());
        chapter.current_phase = PublicationPhase::Publication;
        debug!(chapter_id = %chapter.id, "finalized");
        Ok(())
    }

    /// Assemble the publication document from every chapter that made it
    /// this far and store it under the reserved publication chapter id.
    async fn publication_phase(
        &self,
        chapters: &mut [Chapter],
        stats: &mut RunStats,
    ) -> Result<(), PipelineError> {
        let mut published = Vec::new();
        for chapter in chapters.iter_mut() {
            if chapter.current_phase != PublicationPhase::Publication {
                continue;
            }
            let final_id = match chapter.final_version_id.clone() {
                Some(id) => id,
                None => {
                    self.fail_chapter(chapter, stats, "no final version at publication");
                    continue;
                }
            };
            match self.fetch_version(&final_id).await {
                Ok(version) => {
                    published.push(PublishedChapter {
                        title: chapter.title.clone(),
                        content: version.content,
                        metadata: chapter.metadata.clone(),
                    });
                    chapter.current_phase = PublicationPhase::Completed;
                    stats.completed_chapters += 1;
                }
                Err(err) => self.fail_chapter(chapter, stats, &err.to_string()),
            }
        }

        if published.is_empty() {
            warn!("no chapters reached publication, skipping document assembly");
            return Ok(());
        }
        let total = published.len();
        let doc = PublicationDoc {
            metadata: PublicationMeta {
                total_chapters: total,
                generation_date: Utc::now(),
                workflow_stats: stats.clone(),
            },
            chapters: published,
        };
        let content = serde_json::to_string_pretty(&doc).map_err(StoreError::from)?;
        let version = ContentVersion::new(
            &self.config.publication_chapter_id,
            content,
            ContentStatus::Published,
            Producer::System,
        );
        info!(version_id = %version.id, chapters = total, "publication document assembled");
        self.store.call(move |store| store.save(&version)).await?;
        Ok(())
    }

    // ── Helpers ───────────────────────────────────────────────────────

    async fn fetch_version(&self, id: &str) -> Result<ContentVersion, PipelineError> {
        let id = id.to_string();
        Ok(self.store.call(move |store| store.get(&id)).await?)
    }

    fn fail_chapter(&self, chapter: &mut Chapter, stats: &mut RunStats, reason: &str) {
        warn!(
            chapter_id = %chapter.id,
            title = %chapter.title,
            reason = %reason,
            "chapter failed"
        );
        chapter.current_phase = PublicationPhase::Failed;
        chapter.metadata.insert("failure_reason".into(), reason.into());
        stats.failed_chapters += 1;
    }

    fn fail_remaining(&self, chapters: &mut [Chapter], stats: &mut RunStats, reason: &str) {
        for chapter in chapters.iter_mut() {
            if !chapter.current_phase.is_terminal() {
                self.fail_chapter(chapter, stats, reason);
            }
        }
    }

    async fn wait_if_paused(&self) {
        while self.paused.load(Ordering::SeqCst) && !self.cancelled.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }

    async fn publish_view(&self, chapters: &[Chapter], stats: &RunStats) {
        *self.chapter_view.lock().await = chapters.iter().map(outcome_of).collect();
        *self.stats_view.lock().await = Some(stats.clone());
    }
}

fn outcome_of(chapter: &Chapter) -> ChapterOutcome {
    ChapterOutcome {
        id: chapter.id.clone(),
        title: chapter.title.clone(),
        phase: chapter.current_phase,
        final_version_id: chapter.final_version_id.clone(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
