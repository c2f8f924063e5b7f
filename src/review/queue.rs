//! In-memory queue of human review requests.
//!
//! The queue holds full `ReviewRequest` values in two collections keyed by
//! review id. It never touches the version store: `complete` returns the
//! newly built version and the caller decides where it is persisted.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::ReviewError;
use crate::models::{
    ContentStatus, ContentVersion, Producer, ReviewPriority, ReviewRequest, ReviewStamp,
    ReviewStatus, ReviewType,
};

/// Tracks review requests from submission to completion or rejection.
///
/// Rejected requests keep their slot in the pending collection: rejection
/// is terminal for the request itself, and putting the version back in
/// front of a reviewer takes an explicit resubmit by the caller. They are
/// excluded from `list_pending` so reviewers never see them as open work.
#[derive(Debug, Default)]
pub struct ReviewQueue {
    pending: HashMap<String, ReviewRequest>,
    completed: HashMap<String, ReviewRequest>,
}

/// On-disk form of the queue. Both collections flatten to sorted vecs so
/// snapshots diff cleanly.
#[derive(Serialize, Deserialize)]
struct QueueSnapshot {
    pending: Vec<ReviewRequest>,
    completed: Vec<ReviewRequest>,
}

impl ReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending review request for a version.
    ///
    /// Validation is structural only, mirroring the store's save checks.
    /// Returns the generated review id.
    pub fn submit(
        &mut self,
        chapter_id: &str,
        version: ContentVersion,
        review_type: ReviewType,
        priority: ReviewPriority,
    ) -> Result<String, ReviewError> {
        if chapter_id.trim().is_empty() {
            return Err(ReviewError::InvalidSubmission("missing chapter id".into()));
        }
        if version.id.trim().is_empty() {
            return Err(ReviewError::InvalidSubmission(
                "version is missing an id".into(),
            ));
        }
        if version.content.trim().is_empty() {
            return Err(ReviewError::InvalidSubmission(
                "version has no content".into(),
            ));
        }
        if version.chapter_id != chapter_id {
            return Err(ReviewError::InvalidSubmission(format!(
                "version belongs to chapter {} not {}",
                version.chapter_id, chapter_id
            )));
        }

        let request = ReviewRequest {
            id: Uuid::new_v4().to_string(),
            chapter_id: chapter_id.to_string(),
            version,
            review_type,
            priority,
            status: ReviewStatus::Pending,
            submitted_at: Utc::now(),
            reviewer_notes: None,
            assigned_reviewer: None,
            assigned_at: None,
            completed_at: None,
            rejection_reason: None,
        };
        let id = request.id.clone();
        info!(
            review_id = %id,
            chapter_id = %chapter_id,
            review_type = %review_type,
            "submitted review request"
        );
        self.pending.insert(id.clone(), request);
        Ok(id)
    }

    /// Open requests, oldest first. Rejected requests are not open work
    /// and never appear here.
    pub fn list_pending(
        &self,
        chapter_filter: Option<&str>,
        type_filter: Option<ReviewType>,
    ) -> Vec<&ReviewRequest> {
        let mut open: Vec<&ReviewRequest> = self
            .pending
            .values()
            .filter(|r| r.status == ReviewStatus::Pending)
            .filter(|r| chapter_filter.is_none_or(|c| r.chapter_id == c))
            .filter(|r| type_filter.is_none_or(|t| r.review_type == t))
            .collect();
        open.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        open
    }

    /// Look up a request by id across both collections.
    pub fn find(&self, review_id: &str) -> Option<&ReviewRequest> {
        self.pending
            .get(review_id)
            .or_else(|| self.completed.get(review_id))
    }

    /// Apply a reviewer's edit to a pending request.
    ///
    /// Builds the human-edited version parented to the reviewed one and
    /// carrying a `ReviewStamp` in its metadata, records the feedback as
    /// the request's notes, and moves the request into the completed
    /// collection. Only ids still pending qualify; completed and rejected
    /// ids signal `ReviewNotFound`.
    ///
    /// The returned version is NOT persisted here. The caller owns that.
    pub fn complete(
        &mut self,
        review_id: &str,
        edited_content: &str,
        feedback: &str,
        reviewer_name: &str,
    ) -> Result<ContentVersion, ReviewError> {
        if edited_content.trim().is_empty() {
            return Err(ReviewError::InvalidSubmission(
                "edited content is empty".into(),
            ));
        }
        let open = self
            .pending
            .get(review_id)
            .is_some_and(|r| r.status == ReviewStatus::Pending);
        if !open {
            return Err(ReviewError::ReviewNotFound {
                id: review_id.to_string(),
            });
        }
        let mut request = self
            .pending
            .remove(review_id)
            .ok_or_else(|| ReviewError::ReviewNotFound {
                id: review_id.to_string(),
            })?;

        let completed_at = Utc::now();
        let mut version = ContentVersion::new(
            &request.chapter_id,
            edited_content,
            ContentStatus::HumanEdited,
            Producer::HumanEditor,
        )
        .with_parent(request.version.id.clone());
        ReviewStamp {
            review_id: request.id.clone(),
            reviewer_name: reviewer_name.to_string(),
            review_type: request.review_type,
            feedback: feedback.to_string(),
            completed_at,
        }
        .apply_to(&mut version.metadata);

        request.status = ReviewStatus::Completed;
        request.reviewer_notes = Some(feedback.to_string());
        request.completed_at = Some(completed_at);
        info!(
            review_id = %request.id,
            chapter_id = %request.chapter_id,
            reviewer = %reviewer_name,
            new_version_id = %version.id,
            "completed review"
        );
        self.completed.insert(request.id.clone(), request);
        Ok(version)
    }

    /// Mark a pending request rejected and record the reason.
    ///
    /// The request stays where it is. It does not move to the completed
    /// collection and no replacement request is created; resubmission is
    /// the caller's explicit decision.
    pub fn reject(&mut self, review_id: &str, reason: &str) -> Result<(), ReviewError> {
        let request = self
            .pending
            .get_mut(review_id)
            .filter(|r| r.status == ReviewStatus::Pending)
            .ok_or_else(|| ReviewError::ReviewNotFound {
                id: review_id.to_string(),
            })?;
        request.status = ReviewStatus::Rejected;
        request.rejection_reason = Some(reason.to_string());
        info!(review_id = %review_id, reason = %reason, "rejected review");
        Ok(())
    }

    /// Attach a reviewer to each named pending request without changing
    /// its status. Returns how many requests matched.
    pub fn bulk_assign(&mut self, review_ids: &[String], reviewer: &str) -> usize {
        let now = Utc::now();
        let mut assigned = 0;
        for id in review_ids {
            if let Some(request) = self
                .pending
                .get_mut(id)
                .filter(|r| r.status == ReviewStatus::Pending)
            {
                request.assigned_reviewer = Some(reviewer.to_string());
                request.assigned_at = Some(now);
                assigned += 1;
            }
        }
        if assigned > 0 {
            info!(reviewer = %reviewer, count = assigned, "bulk-assigned reviews");
        }
        assigned
    }

    /// Every request still in the pending collection, rejected ones
    /// included.
    pub fn pending_requests(&self) -> impl Iterator<Item = &ReviewRequest> {
        self.pending.values()
    }

    pub fn completed_requests(&self) -> impl Iterator<Item = &ReviewRequest> {
        self.completed.values()
    }

    // ── Snapshot persistence ──────────────────────────────────────────

    /// Load a queue snapshot from disk. A missing file yields an empty
    /// queue so first runs need no setup step.
    pub fn load(path: &Path) -> Result<Self, ReviewError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content =
            std::fs::read_to_string(path).map_err(|source| ReviewError::SnapshotReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let snapshot: QueueSnapshot = serde_json::from_str(&content)?;
        let mut queue = Self::new();
        for request in snapshot.pending {
            queue.pending.insert(request.id.clone(), request);
        }
        for request in snapshot.completed {
            queue.completed.insert(request.id.clone(), request);
        }
        Ok(queue)
    }

    /// Write the queue to disk as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), ReviewError> {
        let mut pending: Vec<ReviewRequest> = self.pending.values().cloned().collect();
        let mut completed: Vec<ReviewRequest> = self.completed.values().cloned().collect();
        pending.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        completed.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));

        let content = serde_json::to_string_pretty(&QueueSnapshot { pending, completed })?;
        std::fs::write(path, content).map_err(|source| ReviewError::SnapshotWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
