//! Pipeline execution — `galley run`.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use std::sync::Arc;

pub async fn cmd_run(
    project_dir: &Path,
    book_path: &Path,
    verbose: bool,
    require_human_review: Option<bool>,
    auto_finalize: Option<bool>,
) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::models::{BookSpec, PublicationPhase};
    use galley::orchestrator::Orchestrator;
    use galley::providers::{DeferredGate, OfflineGeneration, OfflineResearch};
    use galley::review::ReviewQueue;
    use galley::store::{StoreHandle, VersionStore};

    let config = GalleyConfig::with_cli_args(
        project_dir.to_path_buf(),
        verbose,
        require_human_review,
        auto_finalize,
    )?;
    if !config.galley_dir.exists() {
        anyhow::bail!("Project not initialized. Run 'galley init' first.");
    }
    for warning in config.validate() {
        println!("{} {}", style("warning:").yellow().bold(), warning);
    }

    let book = BookSpec::load(book_path)?;
    println!();
    println!(
        "{} {} ({} chapter{})",
        style("Book:").bold(),
        book.title,
        book.chapters.len(),
        if book.chapters.len() == 1 { "" } else { "s" }
    );

    let pipeline = config.pipeline().clone();
    let store = StoreHandle::new(VersionStore::open(&config.store_db(), &pipeline)?);
    let queue = ReviewQueue::load(&config.queue_file())?;
    let orchestrator = Orchestrator::new(
        store,
        queue,
        Arc::new(OfflineResearch::new(&pipeline)),
        Arc::new(OfflineGeneration),
        Arc::new(DeferredGate),
        pipeline,
    );

    let report = orchestrator.run(book.chapters).await?;

    let queue = orchestrator.into_queue();
    queue.save(&config.queue_file())?;

    let reports_dir = config.reports_dir();
    std::fs::create_dir_all(&reports_dir)
        .with_context(|| format!("Failed to create {}", reports_dir.display()))?;
    let report_path = reports_dir.join(format!(
        "run-{}.json",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    ));
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    println!();
    println!("{:<24} {:<14} Final version", "Chapter", "Phase");
    println!("{:<24} {:<14} -------------", "------------------------", "--------------");
    for outcome in &report.chapters {
        let phase = format!("{:<14}", outcome.phase.as_str());
        let phase = match outcome.phase {
            PublicationPhase::Completed => style(phase).green(),
            PublicationPhase::Failed => style(phase).red(),
            _ => style(phase).yellow(),
        };
        println!(
            "{:<24} {} {}",
            outcome.title,
            phase,
            outcome.final_version_id.as_deref().unwrap_or("-")
        );
    }

    println!();
    if report.success {
        println!(
            "{} {}/{} chapters published",
            style("Run complete:").green().bold(),
            report.stats.completed_chapters,
            report.stats.total_chapters
        );
    } else {
        println!(
            "{} {} of {} chapters failed",
            style("Run finished with failures:").red().bold(),
            report.stats.failed_chapters,
            report.stats.total_chapters
        );
    }

    let pending = queue.list_pending(None, None).len();
    if pending > 0 {
        println!(
            "{} chapter(s) awaiting human review. Run 'galley reviews' to see them.",
            pending
        );
    }
    println!("Report written to {}", report_path.display());

    if verbose {
        println!();
        println!("Phase timings:");
        for (phase, secs) in &report.stats.phase_times {
            println!("  {:<14} {:>8.2}s", phase, secs);
        }
    }

    Ok(())
}
