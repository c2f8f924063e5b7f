//! Project initialization and status commands.

use anyhow::{Context, Result};
use std::path::Path;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    use galley::config::GalleyToml;
    use galley::review::ReviewQueue;
    use galley::store::VersionStore;

    let galley_dir = project_dir.join(".galley");
    let was_initialized = galley_dir.exists();

    std::fs::create_dir_all(galley_dir.join("reports"))
        .with_context(|| format!("Failed to create {}", galley_dir.display()))?;

    let config_path = galley_dir.join("galley.toml");
    if !config_path.exists() {
        GalleyToml::default().save(&config_path)?;
    }

    // Opening the store creates the schema.
    let toml = GalleyToml::load_or_default(&galley_dir)?;
    VersionStore::open(&galley_dir.join("versions.db"), &toml.pipeline)?;

    let queue_path = galley_dir.join("reviews.json");
    if !queue_path.exists() {
        ReviewQueue::new().save(&queue_path)?;
    }

    let book_path = project_dir.join("book.yaml");
    if !book_path.exists() {
        sample_book().save(&book_path)?;
    }

    if was_initialized {
        println!(
            "Galley project already initialized at {}",
            galley_dir.display()
        );
        println!("Directory structure verified.");
    } else {
        println!("Initialized galley project at {}", galley_dir.display());
        println!();
        println!("Created:");
        println!("  .galley/");
        println!("  ├── galley.toml   # Pipeline configuration");
        println!("  ├── versions.db   # Version store");
        println!("  ├── reviews.json  # Review queue snapshot");
        println!("  └── reports/      # Run reports");
        println!("  book.yaml         # Sample book manifest");
        println!();
        println!("Next steps:");
        println!("  1. Edit book.yaml to describe your chapters");
        println!("  2. Run `galley run --book book.yaml` to execute the pipeline");
        println!("  3. Run `galley reviews` to see chapters waiting on human review");
    }

    Ok(())
}

fn sample_book() -> galley::models::BookSpec {
    use galley::models::{BookSpec, ChapterSpec};

    BookSpec {
        title: "Sample Book".to_string(),
        description: Some("Replace this manifest with your own chapters".to_string()),
        chapters: vec![ChapterSpec {
            id: Some("chapter-1".to_string()),
            title: "Getting Started".to_string(),
            source_url: None,
            description: Some("An introductory chapter".to_string()),
            target_length: Some(1500),
            keywords: vec!["introduction".to_string()],
            research_sources: vec!["notes/chapter-1.md".to_string()],
        }],
    }
}

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use galley::config::GalleyConfig;
    use galley::review::ReviewQueue;
    use galley::store::VersionStore;

    println!();
    println!("Galley Project Status");
    println!("=====================");
    println!();

    let galley_dir = project_dir.join(".galley");
    if !galley_dir.exists() {
        println!("Project: Not initialized");
        println!();
        println!("Run 'galley init' to initialize the project.");
        println!();
        return Ok(());
    }
    println!("Project: Initialized");

    let config = GalleyConfig::new(project_dir.to_path_buf())?;

    let db_path = config.store_db();
    if db_path.exists() {
        let store = VersionStore::open(&db_path, config.pipeline())?;
        let stats = store.stats()?;
        println!(
            "Store:   {} version(s) across {} chapter(s)",
            stats.total_versions,
            stats.by_chapter.len()
        );
    } else {
        println!("Store:   Empty (no runs yet)");
    }

    let queue = ReviewQueue::load(&config.queue_file())?;
    let review_stats = queue.statistics();
    println!(
        "Reviews: {} pending, {} completed, {} rejected",
        review_stats.pending, review_stats.completed, review_stats.rejected
    );

    println!();
    match latest_report(&config.reports_dir())? {
        Some((name, report)) => {
            println!("Last run: {}", name);
            let success = report
                .get("success")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let completed = report
                .pointer("/stats/completed_chapters")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            let total = report
                .pointer("/stats/total_chapters")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            println!(
                "  {} ({}/{} chapters completed)",
                if success { "Succeeded" } else { "Had failures" },
                completed,
                total
            );
        }
        None => {
            println!("Execution: No runs yet");
            println!();
            println!("Run 'galley run --book book.yaml' to start the pipeline.");
        }
    }
    println!();
    Ok(())
}

/// Newest report in the reports directory, by file name. Report names
/// embed a sortable timestamp, so the lexicographic maximum is the most
/// recent.
fn latest_report(reports_dir: &Path) -> Result<Option<(String, serde_json::Value)>> {
    if !reports_dir.exists() {
        return Ok(None);
    }
    let mut names: Vec<String> = std::fs::read_dir(reports_dir)
        .with_context(|| format!("Failed to read {}", reports_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".json"))
        .collect();
    names.sort();

    let Some(name) = names.pop() else {
        return Ok(None);
    };
    let path = reports_dir.join(&name);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let report = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some((name, report)))
}
