//! k2d - inspect and maintain a project's turn records
//!
//! The per-turn work happens in `k2d-hook`; this binary covers the manual
//! side: bootstrapping a project, importing history when hooks were
//! installed late, summarizing what was recorded and trying out the
//! phase and skill inference.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use k2d_core::inference::{catalog_from_config, PhaseInputs, PhaseTable};
use k2d_core::recorder::Backfill;
use k2d_core::{Config, Phase, ProjectStore};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "k2d")]
#[command(about = "Record and summarize AI coding-assistant sessions per project")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the meta directory and store for a project
    Init {
        /// Project directory (defaults to the current directory)
        #[arg(short, long)]
        project: Option<PathBuf>,
    },

    /// Import every session transcript next to the given one
    Backfill {
        /// Any transcript in the assistant's session directory
        #[arg(short, long)]
        transcript: PathBuf,

        /// Project directory (defaults to the current directory)
        #[arg(short, long)]
        project: Option<PathBuf>,
    },

    /// Summarize what has been recorded for a project
    Stats {
        /// Project directory (defaults to the current directory)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Number of recent sessions to list
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Run phase and skill inference on free text
    Infer {
        /// Conversation text to classify
        #[arg(short, long)]
        text: String,

        /// Phase the project is in now, for transition detection
        #[arg(short, long, default_value = "development")]
        current: Phase,

        /// Changed file paths to include in the vote (repeatable)
        #[arg(long = "path")]
        paths: Vec<String>,

        /// Skills used in the turn (repeatable)
        #[arg(long = "skill")]
        skills: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        k2d_core::logging::init(&config.logging).context("failed to initialize logging")?;

    match args.command {
        Command::Init { project } => init(&config, project),
        Command::Backfill {
            transcript,
            project,
        } => backfill(&config, &transcript, project),
        Command::Stats { project, limit } => stats(&config, project, limit),
        Command::Infer {
            text,
            current,
            paths,
            skills,
        } => infer(&config, &text, current, &paths, &skills),
    }
}

fn project_root(project: Option<PathBuf>) -> Result<PathBuf> {
    let root = match project {
        Some(path) => path,
        None => std::env::current_dir().context("failed to determine current directory")?,
    };
    if !root.is_dir() {
        anyhow::bail!("Project directory not found: {}", root.display());
    }
    Ok(root)
}

fn init(config: &Config, project: Option<PathBuf>) -> Result<()> {
    let root = project_root(project)?;
    let store = ProjectStore::open(config, &root)
        .with_context(|| format!("failed to open project store in {}", root.display()))?;

    if store.created {
        println!("Initialized k2d in {}", store.meta.display());
    } else {
        println!("Already initialized: {}", store.meta.display());
    }
    println!("  Tracking mode: {}", store.mode);
    println!("  Database:      {}", config.database_path(&root).display());

    Ok(())
}

fn backfill(config: &Config, transcript: &Path, project: Option<PathBuf>) -> Result<()> {
    let root = project_root(project)?;
    if !transcript.is_file() {
        anyhow::bail!("Transcript not found: {}", transcript.display());
    }

    let store = ProjectStore::open(config, &root)
        .with_context(|| format!("failed to open project store in {}", root.display()))?;
    let catalog = catalog_from_config(&config.inference);
    let first_turn = store
        .db
        .current_turn_number()
        .context("failed to read turn counter")?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let result = Backfill::new(&store.db, &root, &catalog)
        .run(transcript, first_turn, |progress| {
            pb.set_length(progress.total as u64);
            pb.set_position(progress.done as u64);
            let name = progress
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            pb.set_message(format!("{} ({} turns)", name, progress.turns));
        })
        .context("backfill failed")?;
    pb.finish_and_clear();

    println!("Backfill complete:");
    println!("  Sessions imported: {}", result.sessions);
    println!("  Turns imported:    {}", result.turns);
    println!("  Tool calls:        {}", result.tools);

    Ok(())
}

fn stats(config: &Config, project: Option<PathBuf>, limit: usize) -> Result<()> {
    let root = project_root(project)?;
    let store = ProjectStore::open(config, &root)
        .with_context(|| format!("failed to open project store in {}", root.display()))?;
    let db = &store.db;

    let sessions = db.list_sessions(limit)?;
    println!("Project:       {}", root.display());
    println!("Tracking mode: {}", store.mode);
    println!("Total turns:   {}", db.count_turns()?);
    println!();

    println!("Recent sessions ({}):", sessions.len());
    for session in &sessions {
        let ended = session
            .ended_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "open".to_string());
        println!(
            "  {}  {}  {} turns  ({})",
            session.id,
            session.started_at.format("%Y-%m-%d %H:%M"),
            session.turn_count,
            ended
        );
    }

    let tools = db.tool_stats()?;
    if !tools.is_empty() {
        println!();
        println!("Tool calls:");
        for (name, count) in &tools {
            println!("  {:<32} {}", name, count);
        }
    }

    let skills = db.list_skill_lifecycles()?;
    if !skills.is_empty() {
        println!();
        println!("Skills:");
        for skill in &skills {
            println!(
                "  {:<32} {} uses  last {}",
                skill.skill_name,
                skill.total_usages,
                skill
                    .last_used_at
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }

    let phases = db.list_phases()?;
    if !phases.is_empty() {
        println!();
        println!("Phases:");
        for phase in &phases {
            let marker = if phase.ended_at.is_none() { "*" } else { " " };
            println!(
                " {}{:<14} since {}",
                marker,
                phase.phase.as_str(),
                phase.started_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    Ok(())
}

fn infer(
    config: &Config,
    text: &str,
    current: Phase,
    paths: &[String],
    skills: &[String],
) -> Result<()> {
    let table = PhaseTable::default();
    let catalog = catalog_from_config(&config.inference);

    let phase = table.infer(&PhaseInputs {
        skills,
        paths,
        context: Some(text),
    });
    println!("Phase: {} ({})", phase, phase.description());

    match table.detect_transition(current, &[text]) {
        Some(next) => println!("Transition: {} -> {}", current, next),
        None => println!("Transition: none"),
    }

    let recommendations = catalog.recommend(text);
    if recommendations.is_empty() {
        println!("Recommended skills: none");
    } else {
        println!("Recommended skills:");
        for rec in &recommendations {
            println!("  {} ({})", rec.skill, rec.confidence);
        }
    }

    Ok(())
}
