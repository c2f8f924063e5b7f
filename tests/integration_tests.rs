//! Integration tests for galley.
//!
//! These tests drive the compiled binary end to end: project setup, an
//! offline pipeline run, the review workflow, and the version store
//! commands.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a galley Command
fn galley() -> Command {
    cargo_bin_cmd!("galley")
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Helper to initialize a galley project in a temp directory
fn init_galley_project(dir: &TempDir) {
    galley()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
}

/// Write a research source file and a one-chapter book manifest that
/// points at it. Returns the manifest path as a string.
fn write_book(dir: &TempDir, chapter_id: &str, title: &str) -> String {
    let source = dir.path().join("notes.md");
    fs::write(
        &source,
        "# Reference\nFirst paragraph of reference material with enough text to draft from.\n\nSecond paragraph with additional background for the chapter body.",
    )
    .unwrap();

    let manifest = dir.path().join("test-book.yaml");
    fs::write(
        &manifest,
        format!(
            "title: Test Book\nchapters:\n  - id: {}\n    title: {}\n    keywords: [testing]\n    research_sources:\n      - {}\n",
            chapter_id,
            title,
            source.display()
        ),
    )
    .unwrap();
    manifest.to_string_lossy().to_string()
}

/// Run the pipeline over `manifest` with human review toggled.
fn run_pipeline(dir: &TempDir, manifest: &str, require_human_review: bool) {
    galley()
        .current_dir(dir.path())
        .args([
            "run",
            "--book",
            manifest,
            "--require-human-review",
            if require_human_review { "true" } else { "false" },
        ])
        .assert()
        .success();
}

/// Pull the first pending review id out of the queue snapshot.
fn first_pending_review_id(dir: &TempDir) -> String {
    let snapshot = fs::read_to_string(dir.path().join(".galley/reviews.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    parsed["pending"][0]["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_galley_help() {
        galley().arg("--help").assert().success();
    }

    #[test]
    fn test_galley_version() {
        galley().arg("--version").assert().success();
    }

    #[test]
    fn test_galley_init_creates_structure() {
        let dir = create_temp_project();

        galley()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized galley project"));

        // Verify project layout
        assert!(dir.path().join(".galley").exists());
        assert!(dir.path().join(".galley/galley.toml").exists());
        assert!(dir.path().join(".galley/versions.db").exists());
        assert!(dir.path().join(".galley/reviews.json").exists());
        assert!(dir.path().join(".galley/reports").exists());
        assert!(dir.path().join("book.yaml").exists());
    }

    #[test]
    fn test_galley_init_idempotent() {
        let dir = create_temp_project();

        galley()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success();

        // Second init should also succeed and leave the config alone
        galley()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn test_run_requires_initialized_project() {
        let dir = create_temp_project();
        let manifest = write_book(&dir, "ch-1", "Uninitialized");

        galley()
            .current_dir(dir.path())
            .args(["run", "--book", &manifest])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not initialized"));
    }

    #[test]
    fn test_status_without_project() {
        let dir = create_temp_project();

        galley()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not initialized"));
    }
}

// =============================================================================
// Pipeline Run Tests
// =============================================================================

mod pipeline_run {
    use super::*;

    #[test]
    fn test_offline_run_publishes_chapter() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "First Chapter");

        galley()
            .current_dir(dir.path())
            .args(["run", "--book", &manifest, "--require-human-review", "false"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Run complete"))
            .stdout(predicate::str::contains("1/1 chapters published"));

        // A run report landed in the reports directory
        let reports: Vec<_> = fs::read_dir(dir.path().join(".galley/reports"))
            .unwrap()
            .collect();
        assert_eq!(reports.len(), 1);
    }

    #[test]
    fn test_run_with_missing_source_reports_failure() {
        let dir = create_temp_project();
        init_galley_project(&dir);

        let manifest = dir.path().join("bad-book.yaml");
        fs::write(
            &manifest,
            "title: Bad Book\nchapters:\n  - id: ch-bad\n    title: Broken\n    research_sources:\n      - /nonexistent/notes.md\n",
        )
        .unwrap();

        galley()
            .current_dir(dir.path())
            .args([
                "run",
                "--book",
                manifest.to_str().unwrap(),
                "--require-human-review",
                "false",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("failed"));
    }

    #[test]
    fn test_run_with_review_leaves_pending_request() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Gated Chapter");

        run_pipeline(&dir, &manifest, true);

        galley()
            .current_dir(dir.path())
            .arg("reviews")
            .assert()
            .success()
            .stdout(predicate::str::contains("1 pending review(s)"))
            .stdout(predicate::str::contains("ch-1"));
    }

    #[test]
    fn test_publication_document_after_run() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Published Chapter");

        run_pipeline(&dir, &manifest, false);

        galley()
            .current_dir(dir.path())
            .arg("publication")
            .assert()
            .success()
            .stdout(predicate::str::contains("Publication Document"))
            .stdout(predicate::str::contains("Published Chapter"))
            .stdout(predicate::str::contains("1/1 completed"));
    }

    #[test]
    fn test_publication_before_any_run() {
        let dir = create_temp_project();
        init_galley_project(&dir);

        galley()
            .current_dir(dir.path())
            .arg("publication")
            .assert()
            .success()
            .stdout(predicate::str::contains("No publication document found"));
    }
}

// =============================================================================
// Review Workflow Tests
// =============================================================================

mod review_workflow {
    use super::*;

    #[test]
    fn test_reviews_empty_queue() {
        let dir = create_temp_project();
        init_galley_project(&dir);

        galley()
            .current_dir(dir.path())
            .arg("reviews")
            .assert()
            .success()
            .stdout(predicate::str::contains("No pending reviews"));
    }

    #[test]
    fn test_review_show_details() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Reviewed Chapter");
        run_pipeline(&dir, &manifest, true);

        let review_id = first_pending_review_id(&dir);
        galley()
            .current_dir(dir.path())
            .args(["review", "show", &review_id])
            .assert()
            .success()
            .stdout(predicate::str::contains(&review_id))
            .stdout(predicate::str::contains("ch-1"))
            .stdout(predicate::str::contains("pending"));
    }

    #[test]
    fn test_review_show_unknown_id() {
        let dir = create_temp_project();
        init_galley_project(&dir);

        galley()
            .current_dir(dir.path())
            .args(["review", "show", "no-such-review"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn test_complete_review_creates_human_edit() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Edited Chapter");
        run_pipeline(&dir, &manifest, true);

        let review_id = first_pending_review_id(&dir);
        galley()
            .current_dir(dir.path())
            .args([
                "review",
                "complete",
                &review_id,
                "--content",
                "Final text",
                "--feedback",
                "looks good",
                "--reviewer",
                "Alice",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Completed"))
            .stdout(predicate::str::contains("human_edited"));

        // The request left the pending collection
        galley()
            .current_dir(dir.path())
            .arg("reviews")
            .assert()
            .success()
            .stdout(predicate::str::contains("No pending reviews"));

        // The edit is the chapter's newest version
        galley()
            .current_dir(dir.path())
            .args(["versions", "--chapter", "ch-1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("human_edited"))
            .stdout(predicate::str::contains("human_editor"));
    }

    #[test]
    fn test_reject_review_parks_request() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Rejected Chapter");
        run_pipeline(&dir, &manifest, true);

        let review_id = first_pending_review_id(&dir);
        galley()
            .current_dir(dir.path())
            .args(["review", "reject", &review_id, "--reason", "needs a rewrite"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Rejected"));

        // Rejected requests drop out of the pending listing but survive
        // in the snapshot for resubmission.
        galley()
            .current_dir(dir.path())
            .arg("reviews")
            .assert()
            .success()
            .stdout(predicate::str::contains("No pending reviews"));
        let snapshot = fs::read_to_string(dir.path().join(".galley/reviews.json")).unwrap();
        assert!(snapshot.contains("rejected"));
        assert!(snapshot.contains("needs a rewrite"));
    }

    #[test]
    fn test_assign_reviews() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Assigned Chapter");
        run_pipeline(&dir, &manifest, true);

        let review_id = first_pending_review_id(&dir);
        galley()
            .current_dir(dir.path())
            .args(["review", "assign", "--reviewer", "Bob", &review_id])
            .assert()
            .success()
            .stdout(predicate::str::contains("Assigned 1 of 1"));
    }

    #[test]
    fn test_dashboard() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Dashboard Chapter");
        run_pipeline(&dir, &manifest, true);

        galley()
            .current_dir(dir.path())
            .arg("dashboard")
            .assert()
            .success()
            .stdout(predicate::str::contains("Review Dashboard"))
            .stdout(predicate::str::contains("Pending:           1"));
    }

    #[test]
    fn test_export_json() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Exported Chapter");
        run_pipeline(&dir, &manifest, true);

        let out = dir.path().join("reviews-export.json");
        galley()
            .current_dir(dir.path())
            .args([
                "export",
                "--format",
                "json",
                "--output",
                out.to_str().unwrap(),
            ])
            .assert()
            .success();

        let exported: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert!(exported.is_object() || exported.is_array());
    }
}

// =============================================================================
// Version Store Tests
// =============================================================================

mod version_store {
    use super::*;

    #[test]
    fn test_versions_empty_chapter() {
        let dir = create_temp_project();
        init_galley_project(&dir);

        galley()
            .current_dir(dir.path())
            .args(["versions", "--chapter", "ch-none"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No versions for chapter ch-none"));
    }

    #[test]
    fn test_versions_list_pipeline_chain() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Chained Chapter");
        run_pipeline(&dir, &manifest, false);

        // research (scraped) -> draft (ai_written) -> spun (ai_written),
        // with the final version published in place by finalization.
        galley()
            .current_dir(dir.path())
            .args(["versions", "--chapter", "ch-1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("scraped"))
            .stdout(predicate::str::contains("ai_written"))
            .stdout(predicate::str::contains("published"))
            .stdout(predicate::str::contains("3 version(s)"));
    }

    #[test]
    fn test_versions_lineage_tree() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Lineal Chapter");
        run_pipeline(&dir, &manifest, false);

        galley()
            .current_dir(dir.path())
            .args(["versions", "--chapter", "ch-1", "--tree"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Lineage for chapter ch-1"))
            .stdout(predicate::str::contains("scraped"));
    }

    #[test]
    fn test_stats_after_run() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Counted Chapter");
        run_pipeline(&dir, &manifest, false);

        galley()
            .current_dir(dir.path())
            .arg("stats")
            .assert()
            .success()
            .stdout(predicate::str::contains("Version Store Statistics"))
            .stdout(predicate::str::contains("By status:"))
            .stdout(predicate::str::contains("By producer:"));
    }

    #[test]
    fn test_finalize_publishes_human_edit() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Finalized Chapter");
        run_pipeline(&dir, &manifest, true);

        let review_id = first_pending_review_id(&dir);
        galley()
            .current_dir(dir.path())
            .args([
                "review",
                "complete",
                &review_id,
                "--content",
                "Final text",
                "--feedback",
                "ship it",
                "--reviewer",
                "Alice",
            ])
            .assert()
            .success();

        galley()
            .current_dir(dir.path())
            .args(["finalize", "ch-1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Published"));
    }

    #[test]
    fn test_finalize_unknown_chapter() {
        let dir = create_temp_project();
        init_galley_project(&dir);

        galley()
            .current_dir(dir.path())
            .args(["finalize", "ch-missing"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No versions for chapter"));
    }

    #[test]
    fn test_status_after_run() {
        let dir = create_temp_project();
        init_galley_project(&dir);
        let manifest = write_book(&dir, "ch-1", "Status Chapter");
        run_pipeline(&dir, &manifest, false);

        galley()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized"))
            .stdout(predicate::str::contains("version(s)"))
            .stdout(predicate::str::contains("Succeeded"));
    }
}
