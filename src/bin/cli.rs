use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use varforge::ai::parse_proposals;
use varforge::baseline;
use varforge::changeset::build_change_set;
use varforge::diff::{diff, DiffResult};
use varforge::impact::resolve_impact;
use varforge::model::{Collection, Variable};
use varforge::protocol::http::HttpDocumentChannel;
use varforge::protocol::DocumentChannel;
use varforge::scm::{render_summary, GitHubClient, PullRequestSpec, SourceControl};
use varforge::usage::{NodeBinding, UsageIndex};

#[derive(Parser)]
#[command(name = "varforge")]
#[command(
    about = "Design-variable diff, impact, and change-application engine with baseline tracking and PR export",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the current variable set from a document bridge into a baseline file
    Snapshot {
        /// Document bridge endpoint, e.g. http://127.0.0.1:8787/
        #[arg(short, long)]
        endpoint: String,

        /// Output baseline path
        #[arg(short, long, default_value = "variables.baseline.json")]
        out: PathBuf,
    },

    /// Diff two baseline files
    Diff {
        old: PathBuf,
        new: PathBuf,
    },

    /// Resolve component impact for a diff against a usage scan
    Impact {
        old: PathBuf,
        new: PathBuf,

        /// Usage scan export (JSON array of node bindings)
        #[arg(short, long)]
        scan: PathBuf,
    },

    /// Validate a proposed edit list into a change-set without applying it
    Plan {
        /// Proposed edits (JSON array)
        edits: PathBuf,

        /// Known-variable snapshot to validate against
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Collection definitions (JSON array); omit to validate modes
        /// against each variable's own mode set
        #[arg(short, long)]
        collections: Option<PathBuf>,
    },

    /// Validate and apply a proposed edit list against a live document
    Apply {
        /// Proposed edits (JSON array)
        edits: PathBuf,

        /// Document bridge endpoint
        #[arg(short, long)]
        endpoint: String,
    },

    /// Diff a local snapshot against the committed baseline and open a PR
    Pr {
        /// New snapshot file to commit as the baseline
        snapshot: PathBuf,

        /// Repository in owner/name form
        #[arg(long)]
        repo: String,

        /// Baseline file path inside the repository
        #[arg(long, default_value = "design/variables.baseline.json")]
        path: String,

        /// Base branch to diff against and target with the PR
        #[arg(long, default_value = "main")]
        base: String,

        /// Head branch to create; generated when omitted
        #[arg(long)]
        head: Option<String>,

        /// Usage scan export for the impact section (optional)
        #[arg(long)]
        scan: Option<PathBuf>,

        /// API token; falls back to $GITHUB_TOKEN
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Snapshot { endpoint, out } => {
            println!("{}", "Extracting variables from document...".cyan().bold());
            let channel = HttpDocumentChannel::connect(&endpoint)?;
            let extract = channel
                .extract_variables()
                .await
                .context("variable extraction failed")?;

            let meta = baseline::save(&out, &extract.variables).await?;
            println!(
                "{} Saved {} variables to {}",
                "✓".green(),
                meta.variable_count.to_string().bright_white(),
                out.display().to_string().bright_cyan()
            );
            println!("  Digest: {}", meta.digest[..16].bright_black());
        }

        Commands::Diff { old, new } => {
            let (old_vars, new_vars) = load_pair(&old, &new).await?;
            let result = diff(&old_vars, &new_vars);
            print_diff(&result, &old_vars);
        }

        Commands::Impact { old, new, scan } => {
            let (old_vars, new_vars) = load_pair(&old, &new).await?;
            let result = diff(&old_vars, &new_vars);
            let bindings = load_bindings(&scan).await?;
            let index = UsageIndex::build(&bindings);
            let impacts = resolve_impact(&result, &index);

            if impacts.is_empty() {
                println!("{}", "No components affected.".green());
                return Ok(());
            }

            println!("{}", "Component Impact".cyan().bold());
            println!("{}", "═".repeat(60).bright_black());
            for impact in &impacts {
                let level = match impact.level {
                    varforge::ImpactLevel::High => "high".red().bold(),
                    varforge::ImpactLevel::Medium => "medium".yellow(),
                    varforge::ImpactLevel::Low => "low".green(),
                };
                println!(
                    "\n{} {} {} ({} nodes)",
                    "●".bright_blue(),
                    impact.component_name.bright_white().bold(),
                    level,
                    impact.node_count
                );
                for record in &impact.records {
                    let change = match &record.new_value {
                        Some(new) => format!("{} → {}", record.old_value, new),
                        None => format!("{} {}", record.old_value, "(removed)".red()),
                    };
                    println!(
                        "   {} [{}] {}",
                        record.variable_name.bright_cyan(),
                        record.category.to_string().bright_black(),
                        change
                    );
                }
            }
        }

        Commands::Plan {
            edits,
            snapshot,
            collections,
        } => {
            let proposal = load_proposal(&edits).await?;
            let known = baseline::load(&snapshot).await?;
            warn_all(&known.warnings);
            let collections = match collections {
                Some(path) => load_collections(&path).await?,
                None => Vec::new(),
            };

            let built = build_change_set(&proposal, &known.variables, &collections);
            warn_all(&built.warnings);
            println!(
                "{} Change-set ready: {} update(s), {} create(s)",
                "✓".green(),
                built.change_set.updates.len(),
                built.change_set.creates.len()
            );
        }

        Commands::Apply { edits, endpoint } => {
            let proposal = load_proposal(&edits).await?;
            let channel = HttpDocumentChannel::connect(&endpoint)?;
            let extract = channel
                .extract_variables()
                .await
                .context("variable extraction failed")?;

            let built = build_change_set(&proposal, &extract.variables, &extract.collections);
            warn_all(&built.warnings);
            if built.change_set.is_empty() {
                println!("{}", "Nothing valid to apply.".yellow());
                return Ok(());
            }

            let report = varforge::apply(&channel, &built.change_set).await?;
            println!(
                "{} Applied {} | remapped {} | failed {}",
                if report.is_clean() { "✓".green() } else { "⚠".yellow() },
                report.applied.to_string().bright_white(),
                report.remapped.to_string().bright_white(),
                report.errors.len().to_string().bright_white()
            );
            for error in &report.errors {
                println!("   {} {}", "✗".red(), error);
            }
        }

        Commands::Pr {
            snapshot,
            repo,
            path,
            base,
            head,
            scan,
            token,
        } => {
            let token = token
                .or_else(|| std::env::var("GITHUB_TOKEN").ok())
                .context("no API token: pass --token or set GITHUB_TOKEN")?;
            let client = GitHubClient::new(repo, &token)?;

            let new_snapshot = baseline::load(&snapshot).await?;
            warn_all(&new_snapshot.warnings);

            println!(
                "{}",
                format!("Fetching baseline {path} @ {base}...").cyan().bold()
            );
            let old_vars = match client.fetch_baseline(&base, &path).await? {
                Some(content) => {
                    let loaded = baseline::parse(&content)?;
                    warn_all(&loaded.warnings);
                    loaded.variables
                }
                None => {
                    println!("{}", "No committed baseline yet, diffing from empty.".yellow());
                    Vec::new()
                }
            };

            let result = diff(&old_vars, &new_snapshot.variables);
            if result.is_empty() {
                println!("{}", "Baseline is up to date, nothing to commit.".green());
                return Ok(());
            }
            print_diff(&result, &old_vars);

            let impacts = match scan {
                Some(scan_path) => {
                    let bindings = load_bindings(&scan_path).await?;
                    resolve_impact(&result, &UsageIndex::build(&bindings))
                }
                None => Vec::new(),
            };

            let head = head.unwrap_or_else(|| {
                let tag = uuid::Uuid::new_v4().to_string();
                format!("varforge/baseline-{}", &tag[..8])
            });

            let spec = PullRequestSpec {
                title: format!(
                    "Update design variables: {} added, {} removed, {} changed",
                    result.added.len(),
                    result.removed.len(),
                    result.changed.len()
                ),
                body: render_summary(&result, &impacts, &old_vars),
                base_branch: base,
                head_branch: head,
                path,
                content: baseline::render(&new_snapshot.variables)?,
            };
            let pr = client.create_pull_request(&spec).await?;
            println!(
                "{} Opened PR #{}: {}",
                "✓".green(),
                pr.number.to_string().bright_white(),
                pr.url.bright_blue()
            );
        }
    }

    Ok(())
}

async fn load_pair(old: &Path, new: &Path) -> Result<(Vec<Variable>, Vec<Variable>)> {
    let old_loaded = baseline::load(old).await?;
    let new_loaded = baseline::load(new).await?;
    warn_all(&old_loaded.warnings);
    warn_all(&new_loaded.warnings);
    Ok((old_loaded.variables, new_loaded.variables))
}

async fn load_bindings(path: &Path) -> Result<Vec<NodeBinding>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read scan {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse scan {}", path.display()))
}

async fn load_collections(path: &Path) -> Result<Vec<Collection>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read collections {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse collections {}", path.display()))
}

async fn load_proposal(path: &Path) -> Result<Vec<varforge::ProposedEdit>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read edits {}", path.display()))?;
    let (edits, warnings) = parse_proposals(&content)?;
    warn_all(&warnings);
    Ok(edits)
}

fn warn_all(warnings: &[String]) {
    for warning in warnings {
        println!("{} {}", "⚠".yellow(), warning);
    }
}

fn print_diff(result: &DiffResult, old_vars: &[Variable]) {
    println!("{}", "Variable Diff".cyan().bold());
    println!("{}", "═".repeat(60).bright_black());
    println!(
        "{} added | {} removed | {} changed",
        result.added.len().to_string().green().bold(),
        result.removed.len().to_string().red().bold(),
        result.changed.len().to_string().yellow().bold()
    );

    for var in &result.added {
        println!("  {} {}", "+".green(), var.name.bright_white());
    }
    for var in &result.removed {
        println!("  {} {}", "-".red(), var.name.bright_white());
    }
    for change in &result.changed {
        println!("  {} {}", "~".yellow(), change.new.name.bright_white());
        for mode in change.differing_modes() {
            let old = change
                .old
                .value_for_mode(&mode)
                .map(|v| varforge::model::format_value(v, old_vars))
                .unwrap_or_else(|| "(no value)".into());
            let new = change
                .new
                .value_for_mode(&mode)
                .map(|v| varforge::model::format_value(v, old_vars))
                .unwrap_or_else(|| "(no value)".into());
            println!(
                "      {} {} {} {}",
                mode.bright_black(),
                old,
                "→".bright_black(),
                new
            );
        }
    }
}
