//! Review queue commands: pending listing, show, complete, reject,
//! assign, dashboard, and export.

use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};

pub fn cmd_reviews(
    project_dir: &Path,
    chapter: Option<&str>,
    review_type: Option<&str>,
) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::models::ReviewType;
    use galley::review::ReviewQueue;

    let config = GalleyConfig::new(project_dir.to_path_buf())?;
    let queue = ReviewQueue::load(&config.queue_file())?;

    let type_filter = review_type
        .map(|t| t.parse::<ReviewType>())
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;
    let pending = queue.list_pending(chapter, type_filter);

    println!();
    if pending.is_empty() {
        println!("No pending reviews.");
        println!();
        return Ok(());
    }

    println!(
        "{:<38} {:<16} {:<10} {:<8} {:<8} Age",
        "ID", "Chapter", "Type", "Priority", "Urgency"
    );
    for request in &pending {
        let urgency = styled_urgency(request.urgency());
        println!(
            "{:<38} {:<16} {:<10} {:<8} {} {}",
            request.id,
            request.chapter_id,
            request.review_type.as_str(),
            request.priority.as_str(),
            urgency,
            format_age(chrono::Utc::now() - request.submitted_at)
        );
    }
    println!();
    println!("{} pending review(s)", pending.len());
    println!("Run 'galley review show <id>' for details.");
    println!();
    Ok(())
}

pub fn cmd_review_show(project_dir: &Path, review_id: &str) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::review::ReviewQueue;

    let config = GalleyConfig::new(project_dir.to_path_buf())?;
    let queue = ReviewQueue::load(&config.queue_file())?;

    let Some(details) = queue.details(review_id) else {
        anyhow::bail!("Review {} not found", review_id);
    };

    println!();
    println!("Review {}", details.review_id);
    println!("  Chapter:   {}", details.chapter_id);
    println!("  Type:      {}", details.review_type);
    println!("  Priority:  {}", details.priority);
    println!("  Status:    {}", details.status);
    if let Some(urgency) = details.urgency {
        println!("  Urgency:   {}", styled_urgency(urgency));
    }
    println!(
        "  Submitted: {}",
        details.submitted_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(reviewer) = &details.assigned_reviewer {
        println!("  Assigned:  {}", reviewer);
    }
    if let Some(notes) = &details.reviewer_notes {
        println!("  Notes:     {}", notes);
    }
    if let Some(reason) = &details.rejection_reason {
        println!("  Rejected:  {}", style(reason).red());
    }
    println!();
    println!(
        "Version {} ({}, {}, {} chars)",
        details.version.id,
        details.version.status,
        details.version.producer,
        details.version.content_length
    );
    println!();
    println!("{}", details.version.preview);
    println!();
    Ok(())
}

pub fn cmd_review_complete(
    project_dir: &Path,
    review_id: &str,
    content: Option<&str>,
    content_file: Option<&Path>,
    feedback: &str,
    reviewer: &str,
) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::models::ContentStatus;
    use galley::review::ReviewQueue;
    use galley::store::VersionStore;

    let edited = match (content, content_file) {
        (Some(text), None) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (Some(_), Some(_)) => {
            anyhow::bail!("Pass either --content or --content-file, not both")
        }
        (None, None) => anyhow::bail!("Edited content required: --content or --content-file"),
    };

    let config = GalleyConfig::new(project_dir.to_path_buf())?;
    let mut queue = ReviewQueue::load(&config.queue_file())?;
    let store = VersionStore::open(&config.store_db(), config.pipeline())?;

    let version = queue.complete(review_id, &edited, feedback, reviewer)?;
    store.save(&version)?;
    queue.save(&config.queue_file())?;

    println!(
        "{} review {}",
        style("Completed").green().bold(),
        review_id
    );
    println!("New version {} saved (human_edited)", version.id);

    if config.pipeline().auto_finalize {
        store.update_status(&version.id, ContentStatus::Published)?;
        println!("Auto-finalize on: version {} published", version.id);
    } else {
        println!(
            "Run 'galley finalize {}' to publish the edit.",
            version.chapter_id
        );
    }
    Ok(())
}

pub fn cmd_review_reject(project_dir: &Path, review_id: &str, reason: &str) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::review::ReviewQueue;

    let config = GalleyConfig::new(project_dir.to_path_buf())?;
    let mut queue = ReviewQueue::load(&config.queue_file())?;

    queue.reject(review_id, reason)?;
    queue.save(&config.queue_file())?;

    println!("{} review {}", style("Rejected").red().bold(), review_id);
    println!("Resubmit the chapter through a new run to get a fresh request.");
    Ok(())
}

pub fn cmd_review_assign(project_dir: &Path, reviewer: &str, review_ids: &[String]) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::review::ReviewQueue;

    let config = GalleyConfig::new(project_dir.to_path_buf())?;
    let mut queue = ReviewQueue::load(&config.queue_file())?;

    let assigned = queue.bulk_assign(review_ids, reviewer);
    queue.save(&config.queue_file())?;

    println!("Assigned {} of {} review(s) to {}", assigned, review_ids.len(), reviewer);
    if assigned < review_ids.len() {
        println!("Unmatched ids were not pending (completed, rejected, or unknown).");
    }
    Ok(())
}

pub fn cmd_dashboard(project_dir: &Path) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::review::ReviewQueue;

    let config = GalleyConfig::new(project_dir.to_path_buf())?;
    let queue = ReviewQueue::load(&config.queue_file())?;
    let dashboard = queue.dashboard();

    println!();
    println!("Review Dashboard");
    println!("================");
    println!();
    println!("Pending:           {}", dashboard.metrics.pending_count);
    println!("Completed today:   {}", dashboard.metrics.completions_today);
    match dashboard.metrics.most_common_type {
        Some(t) => println!("Most common type:  {}", t),
        None => println!("Most common type:  -"),
    }

    if !dashboard.pending.is_empty() {
        println!();
        println!("Open requests (oldest first):");
        for entry in &dashboard.pending {
            let assigned = entry
                .assigned_reviewer
                .as_deref()
                .unwrap_or("unassigned");
            println!(
                "  {} {} {} [{}] {} ({})",
                styled_urgency(entry.urgency),
                entry.review_id,
                entry.chapter_id,
                entry.review_type,
                entry.submitted_at.format("%Y-%m-%d %H:%M"),
                assigned
            );
        }
    }

    if !dashboard.recent_completions.is_empty() {
        println!();
        println!("Recent completions:");
        for entry in &dashboard.recent_completions {
            let when = entry
                .completed_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {} {} [{}] {}",
                entry.review_id, entry.chapter_id, entry.review_type, when
            );
        }
    }
    println!();
    Ok(())
}

pub fn cmd_export(project_dir: &Path, format: &str, output: Option<&PathBuf>) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::review::{ExportFormat, ReviewQueue};

    let format = format
        .parse::<ExportFormat>()
        .map_err(|e| anyhow::anyhow!(e))?;

    let config = GalleyConfig::new(project_dir.to_path_buf())?;
    let queue = ReviewQueue::load(&config.queue_file())?;
    let exported = queue.export(format)?;

    match output {
        Some(path) => {
            std::fs::write(path, &exported)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported review data to {}", path.display());
        }
        None => println!("{}", exported),
    }
    Ok(())
}

fn styled_urgency(urgency: galley::models::Urgency) -> console::StyledObject<String> {
    use galley::models::Urgency;

    let label = format!("{:<8}", urgency.as_str());
    match urgency {
        Urgency::High => style(label).red().bold(),
        Urgency::Medium => style(label).yellow(),
        Urgency::Low => style(label).dim(),
    }
}

fn format_age(age: chrono::Duration) -> String {
    let days = age.num_days();
    let hours = age.num_hours() % 24;
    let minutes = age.num_minutes() % 60;
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes.max(0))
    }
}
