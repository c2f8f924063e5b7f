//! Version store commands: listing, lineage, stats, finalize, and the
//! publication document.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

pub fn cmd_versions(project_dir: &Path, chapter: &str, tree: bool) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::store::VersionStore;

    let config = GalleyConfig::new(project_dir.to_path_buf())?;
    let store = VersionStore::open(&config.store_db(), config.pipeline())?;

    println!();
    if tree {
        let forest = store.lineage_tree(chapter)?;
        if forest.is_empty() {
            println!("No versions for chapter {}.", chapter);
            println!();
            return Ok(());
        }
        println!("Lineage for chapter {}:", chapter);
        println!();
        for root in &forest {
            render_lineage(root, 0);
        }
    } else {
        let versions = store.list_for_chapter(chapter)?;
        if versions.is_empty() {
            println!("No versions for chapter {}.", chapter);
            println!();
            return Ok(());
        }
        println!(
            "{:<38} {:<13} {:<15} {:<20} Parent",
            "ID", "Status", "Producer", "Created"
        );
        for version in &versions {
            println!(
                "{:<38} {:<13} {:<15} {:<20} {}",
                version.id,
                version.status.as_str(),
                version.producer.as_str(),
                version.created_at.format("%Y-%m-%d %H:%M:%S"),
                version.parent_version_id.as_deref().unwrap_or("-")
            );
        }
        println!();
        println!("{} version(s)", versions.len());
    }
    println!();
    Ok(())
}

fn render_lineage(node: &galley::models::LineageNode, depth: usize) {
    let indent = "  ".repeat(depth);
    match &node.version {
        Some(version) => println!(
            "{}{} {} ({}, {})",
            indent,
            version.id,
            version.status.as_str(),
            version.producer.as_str(),
            version.created_at.format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!(
            "{}{} {}",
            indent,
            node.id,
            style("(missing: parent not among this chapter's versions)").red()
        ),
    }
    for child in &node.children {
        render_lineage(child, depth + 1);
    }
}

pub fn cmd_stats(project_dir: &Path) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::store::VersionStore;

    let config = GalleyConfig::new(project_dir.to_path_buf())?;
    let store = VersionStore::open(&config.store_db(), config.pipeline())?;
    let stats = store.stats()?;

    println!();
    println!("Version Store Statistics");
    println!("========================");
    println!();
    println!("Total versions: {}", stats.total_versions);

    if !stats.by_status.is_empty() {
        println!();
        println!("By status:");
        for (status, count) in &stats.by_status {
            println!("  {:<15} {}", status, count);
        }
    }
    if !stats.by_producer.is_empty() {
        println!();
        println!("By producer:");
        for (producer, count) in &stats.by_producer {
            println!("  {:<15} {}", producer, count);
        }
    }
    if !stats.by_chapter.is_empty() {
        println!();
        println!("By chapter:");
        for (chapter, count) in &stats.by_chapter {
            println!("  {:<15} {}", chapter, count);
        }
    }
    println!();
    Ok(())
}

/// Publish the newest human edit for a chapter, falling back to the
/// newest version overall when no human edit exists.
pub fn cmd_finalize(project_dir: &Path, chapter: &str) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::models::ContentStatus;
    use galley::store::VersionStore;

    let config = GalleyConfig::new(project_dir.to_path_buf())?;
    let store = VersionStore::open(&config.store_db(), config.pipeline())?;

    let human_edit = store.latest(chapter, Some(ContentStatus::HumanEdited))?;
    let from_human = human_edit.is_some();
    let version = match human_edit {
        Some(v) => v,
        None => store
            .latest(chapter, None)?
            .with_context(|| format!("No versions for chapter {}", chapter))?,
    };

    store.update_status(&version.id, ContentStatus::Published)?;
    println!(
        "{} version {} for chapter {}",
        style("Published").green().bold(),
        version.id,
        chapter
    );
    if !from_human {
        println!("No human edit found; published the latest version instead.");
    }
    Ok(())
}

pub fn cmd_publication(project_dir: &Path) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::models::PublicationDoc;
    use galley::store::VersionStore;

    let config = GalleyConfig::new(project_dir.to_path_buf())?;
    let store = VersionStore::open(&config.store_db(), config.pipeline())?;

    let chapter_id = &config.pipeline().publication_chapter_id;
    let Some(version) = store.latest(chapter_id, None)? else {
        println!("No publication document found. Run 'galley run' first.");
        return Ok(());
    };

    let doc: PublicationDoc = serde_json::from_str(&version.content)
        .context("Stored publication document is not valid JSON")?;

    println!();
    println!("Publication Document");
    println!("====================");
    println!();
    println!(
        "Generated: {}",
        doc.metadata.generation_date.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Chapters:  {}", doc.metadata.total_chapters);
    println!();
    for (i, chapter) in doc.chapters.iter().enumerate() {
        println!(
            "  {}. {} ({} chars)",
            i + 1,
            chapter.title,
            chapter.content.chars().count()
        );
    }
    println!();
    let stats = &doc.metadata.workflow_stats;
    println!(
        "Run stats: {}/{} completed, {} failed",
        stats.completed_chapters, stats.total_chapters, stats.failed_chapters
    );
    println!();
    Ok(())
}
