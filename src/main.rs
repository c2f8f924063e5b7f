use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "galley")]
#[command(version, about = "AI-assisted book publication pipeline")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new galley project
    Init,
    /// Execute the publication pipeline over a book manifest
    Run {
        /// Path to the YAML book manifest
        #[arg(long)]
        book: PathBuf,

        /// Override require_human_review from galley.toml
        #[arg(long)]
        require_human_review: Option<bool>,

        /// Publish reviewer edits immediately on completion
        #[arg(long)]
        auto_finalize: bool,
    },
    Status,
    /// List pending review requests
    Reviews {
        /// Only requests for this chapter
        #[arg(long)]
        chapter: Option<String>,

        /// Only requests of this type (general, copy_edit, style, technical)
        #[arg(long)]
        review_type: Option<String>,
    },
    /// Operate on a single review request
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    Dashboard,
    /// Export review data
    Export {
        /// Output format: json or csv
        #[arg(long, default_value = "json")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List a chapter's versions
    Versions {
        #[arg(long)]
        chapter: String,

        /// Render the lineage forest instead of a flat list
        #[arg(long)]
        tree: bool,
    },
    Stats,
    /// Publish a chapter's latest human edit (or latest version)
    Finalize { chapter_id: String },
    /// Show the latest publication document
    Publication,
}

#[derive(Subcommand)]
pub enum ReviewCommands {
    Show {
        id: String,
    },
    /// Apply a reviewer's edit and close the request
    Complete {
        id: String,

        /// Edited content inline
        #[arg(long)]
        content: Option<String>,

        /// Read edited content from a file
        #[arg(long)]
        content_file: Option<PathBuf>,

        #[arg(long)]
        feedback: String,

        #[arg(long)]
        reviewer: String,
    },
    /// Reject the request, leaving it parked until resubmission
    Reject {
        id: String,

        #[arg(long)]
        reason: String,
    },
    /// Assign pending requests to a reviewer
    Assign {
        #[arg(long)]
        reviewer: String,

        ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("galley=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Run {
            book,
            require_human_review,
            auto_finalize,
        } => {
            cmd::cmd_run(
                &project_dir,
                book,
                cli.verbose,
                *require_human_review,
                auto_finalize.then_some(true),
            )
            .await?;
        }
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Reviews {
            chapter,
            review_type,
        } => cmd::cmd_reviews(&project_dir, chapter.as_deref(), review_type.as_deref())?,
        Commands::Review { command } => match command {
            ReviewCommands::Show { id } => cmd::cmd_review_show(&project_dir, id)?,
            ReviewCommands::Complete {
                id,
                content,
                content_file,
                feedback,
                reviewer,
            } => cmd::cmd_review_complete(
                &project_dir,
                id,
                content.as_deref(),
                content_file.as_deref(),
                feedback,
                reviewer,
            )?,
            ReviewCommands::Reject { id, reason } => {
                cmd::cmd_review_reject(&project_dir, id, reason)?
            }
            ReviewCommands::Assign { reviewer, ids } => {
                cmd::cmd_review_assign(&project_dir, reviewer, ids)?
            }
        },
        Commands::Dashboard => cmd::cmd_dashboard(&project_dir)?,
        Commands::Export { format, output } => {
            cmd::cmd_export(&project_dir, format, output.as_ref())?
        }
        Commands::Versions { chapter, tree } => cmd::cmd_versions(&project_dir, chapter, *tree)?,
        Commands::Stats => cmd::cmd_stats(&project_dir)?,
        Commands::Finalize { chapter_id } => cmd::cmd_finalize(&project_dir, chapter_id)?,
        Commands::Publication => cmd::cmd_publication(&project_dir)?,
    }

    Ok(())
}
