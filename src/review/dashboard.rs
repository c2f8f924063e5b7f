//! Derived, read-only views over the review queue.
//!
//! Everything here is an aggregation of the queue's two collections:
//! nothing mutates a request, and nothing reaches into the version store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::ReviewError;
use crate::models::{
    ContentStatus, ContentVersion, Producer, ReviewPriority, ReviewRequest, ReviewStatus,
    ReviewType, Urgency,
};
use crate::review::queue::ReviewQueue;

/// Characters of version content shown in detail views.
const PREVIEW_LENGTH: usize = 200;

/// Completions shown on the dashboard.
const RECENT_COMPLETIONS: usize = 10;

/// Compact description of the version attached to a request. Full content
/// stays out of views; the preview is capped at `PREVIEW_LENGTH`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionSummary {
    pub id: String,
    pub status: ContentStatus,
    pub producer: Producer,
    pub created_at: DateTime<Utc>,
    pub content_length: usize,
    pub preview: String,
}

impl VersionSummary {
    fn from_version(version: &ContentVersion) -> Self {
        Self {
            id: version.id.clone(),
            status: version.status,
            producer: version.producer,
            created_at: version.created_at,
            content_length: version.content.chars().count(),
            preview: version.preview(PREVIEW_LENGTH),
        }
    }
}

/// Full structured view of a single request, from either collection.
/// `urgency` is present only while the request is still pending.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewDetails {
    pub review_id: String,
    pub chapter_id: String,
    pub review_type: ReviewType,
    pub priority: ReviewPriority,
    pub status: ReviewStatus,
    pub submitted_at: DateTime<Utc>,
    pub urgency: Option<Urgency>,
    pub reviewer_notes: Option<String>,
    pub assigned_reviewer: Option<String>,
    pub rejection_reason: Option<String>,
    pub version: VersionSummary,
}

impl ReviewDetails {
    fn from_request(request: &ReviewRequest) -> Self {
        let urgency = (request.status == ReviewStatus::Pending).then(|| request.urgency());
        Self {
            review_id: request.id.clone(),
            chapter_id: request.chapter_id.clone(),
            review_type: request.review_type,
            priority: request.priority,
            status: request.status,
            submitted_at: request.submitted_at,
            urgency,
            reviewer_notes: request.reviewer_notes.clone(),
            assigned_reviewer: request.assigned_reviewer.clone(),
            rejection_reason: request.rejection_reason.clone(),
            version: VersionSummary::from_version(&request.version),
        }
    }
}

/// One open request as shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct PendingSummary {
    pub review_id: String,
    pub chapter_id: String,
    pub review_type: ReviewType,
    pub priority: ReviewPriority,
    pub submitted_at: DateTime<Utc>,
    pub urgency: Urgency,
    pub assigned_reviewer: Option<String>,
}

/// One finished request as shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionSummary {
    pub review_id: String,
    pub chapter_id: String,
    pub review_type: ReviewType,
    pub completed_at: Option<DateTime<Utc>>,
    pub reviewer_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub pending_count: usize,
    pub completions_today: usize,
    pub most_common_type: Option<ReviewType>,
}

/// Reviewer-facing summary: open work oldest first, recent completions,
/// headline metrics.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub pending: Vec<PendingSummary>,
    pub recent_completions: Vec<CompletionSummary>,
    pub metrics: DashboardMetrics,
}

/// Aggregate counters over both collections.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewStats {
    pub total_requests: usize,
    pub pending: usize,
    pub completed: usize,
    pub rejected: usize,
    pub by_type: BTreeMap<String, usize>,
    pub completions_today: usize,
}

/// Output formats for `ReviewQueue::export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(format!("Invalid export format: {}", s)),
        }
    }
}

impl ReviewQueue {
    /// Structured view of one request, searching both collections.
    pub fn details(&self, review_id: &str) -> Option<ReviewDetails> {
        self.find(review_id).map(ReviewDetails::from_request)
    }

    pub fn dashboard(&self) -> Dashboard {
        let pending: Vec<PendingSummary> = self
            .list_pending(None, None)
            .into_iter()
            .map(|r| PendingSummary {
                review_id: r.id.clone(),
                chapter_id: r.chapter_id.clone(),
                review_type: r.review_type,
                priority: r.priority,
                submitted_at: r.submitted_at,
                urgency: r.urgency(),
                assigned_reviewer: r.assigned_reviewer.clone(),
            })
            .collect();

        let mut finished: Vec<&ReviewRequest> = self.completed_requests().collect();
        finished.sort_by(|a, b| {
            let a_done = a.completed_at.unwrap_or(a.submitted_at);
            let b_done = b.completed_at.unwrap_or(b.submitted_at);
            b_done.cmp(&a_done).then(a.id.cmp(&b.id))
        });
        let recent_completions = finished
            .into_iter()
            .take(RECENT_COMPLETIONS)
            .map(|r| CompletionSummary {
                review_id: r.id.clone(),
                chapter_id: r.chapter_id.clone(),
                review_type: r.review_type,
                completed_at: r.completed_at,
                reviewer_notes: r.reviewer_notes.clone(),
            })
            .collect();

        let metrics = DashboardMetrics {
            pending_count: pending.len(),
            completions_today: self.completions_today(),
            most_common_type: self.most_common_type(),
        };
        Dashboard {
            pending,
            recent_completions,
            metrics,
        }
    }

    pub fn statistics(&self) -> ReviewStats {
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        let mut pending = 0;
        let mut rejected = 0;
        for request in self.pending_requests() {
            *by_type.entry(request.review_type.as_str().to_string()).or_default() += 1;
            match request.status {
                ReviewStatus::Rejected => rejected += 1,
                _ => pending += 1,
            }
        }
        let mut completed = 0;
        for request in self.completed_requests() {
            *by_type.entry(request.review_type.as_str().to_string()).or_default() += 1;
            completed += 1;
        }
        ReviewStats {
            total_requests: pending + rejected + completed,
            pending,
            completed,
            rejected,
            by_type,
            completions_today: self.completions_today(),
        }
    }

    /// Serialize both collections. CSV rows carry request fields only;
    /// version content is deliberately excluded from exports.
    pub fn export(&self, format: ExportFormat) -> Result<String, ReviewError> {
        let mut pending: Vec<&ReviewRequest> = self.pending_requests().collect();
        let mut completed: Vec<&ReviewRequest> = self.completed_requests().collect();
        pending.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        completed.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));

        match format {
            ExportFormat::Json => {
                let doc = serde_json::json!({
                    "pending": pending,
                    "completed": completed,
                });
                Ok(serde_json::to_string_pretty(&doc)?)
            }
            ExportFormat::Csv => {
                let mut out = String::from(
                    "id,chapter_id,review_type,priority,status,submitted_at,assigned_reviewer,notes\n",
                );
                for request in pending.into_iter().chain(completed) {
                    let notes = request
                        .reviewer_notes
                        .as_deref()
                        .or(request.rejection_reason.as_deref())
                        .unwrap_or("");
                    out.push_str(&format!(
                        "{},{},{},{},{},{},{},{}\n",
                        csv_field(&request.id),
                        csv_field(&request.chapter_id),
                        request.review_type,
                        request.priority,
                        request.status,
                        request.submitted_at.to_rfc3339(),
                        csv_field(request.assigned_reviewer.as_deref().unwrap_or("")),
                        csv_field(notes),
                    ));
                }
                Ok(out)
            }
        }
    }

    fn completions_today(&self) -> usize {
        let today = Utc::now().date_naive();
        self.completed_requests()
            .filter(|r| r.completed_at.is_some_and(|t| t.date_naive() == today))
            .count()
    }

    /// Most frequent review type across both collections. Ties break
    /// alphabetically so the answer is stable.
    fn most_common_type(&self) -> Option<ReviewType> {
        let mut counts: Vec<(ReviewType, usize)> = Vec::new();
        for request in self.pending_requests().chain(self.completed_requests()) {
            match counts.iter_mut().find(|(t, _)| *t == request.review_type) {
                Some((_, n)) => *n += 1,
                None => counts.push((request.review_type, 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        counts.first().map(|(t, _)| *t)
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
