//! Human review queue for content awaiting editorial signoff.
//!
//! The pipeline parks a chapter's current version here during the
//! human-review phase. Reviewers work the queue through the CLI; the
//! orchestrator only submits requests and consumes completions.
//!
//! ## Components
//!
//! - [`queue`]: the request collections and their state transitions
//! - [`dashboard`]: read-only views (details, dashboard, stats, export)
//!
//! ## Example
//!
//! ```
//! use galley::models::{ContentStatus, ContentVersion, Producer, ReviewPriority, ReviewType};
//! use galley::review::ReviewQueue;
//!
//! let mut queue = ReviewQueue::new();
//! let version = ContentVersion::new(
//!     "ch-1",
//!     "Draft text awaiting signoff",
//!     ContentStatus::HumanReview,
//!     Producer::AiWriter,
//! );
//! let review_id = queue.submit("ch-1", version, ReviewType::General, ReviewPriority::Normal)?;
//! assert_eq!(queue.list_pending(None, None).len(), 1);
//!
//! let edited = queue.complete(&review_id, "Final text", "looks good", "Alice")?;
//! assert_eq!(edited.status, ContentStatus::HumanEdited);
//! # Ok::<(), galley::errors::ReviewError>(())
//! ```

pub mod dashboard;
pub mod queue;

// Re-export main types
pub use dashboard::{Dashboard, ExportFormat, ReviewDetails, ReviewStats};
pub use queue::ReviewQueue;
