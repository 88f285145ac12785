mod display;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use gh2cnb_core::{Config, ConvertOptions, Converter, DependencyGraph, GitHubActionsParser};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gh2cnb",
    version,
    about = "gh2cnb — GitHub Actions to CNB pipeline converter",
    long_about = "Convert GitHub Actions workflows into CNB pipelines.\n\nJobs become anchored pipeline templates, `needs:` becomes cnb:await/cnb:resolve stages, and triggers and node-version matrices expand into pipeline instances."
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Path to a gh2cnb.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a workflow file into a CNB configuration
    Convert {
        /// Path to the workflow file to convert
        path: PathBuf,

        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Inline every template instead of emitting YAML anchors
        #[arg(long)]
        no_anchors: bool,

        /// Branch used when the workflow declares no push branches
        #[arg(long)]
        default_branch: Option<String>,

        /// Convert cyclic job dependencies instead of failing
        #[arg(long)]
        allow_cycles: bool,

        /// Compare against an existing CNB file and fail if it is out of date
        #[arg(long, value_name = "FILE", conflicts_with = "output")]
        check: Option<PathBuf>,
    },

    /// Summarize the pipelines a conversion would produce
    Plan {
        /// Path to workflow file or directory containing workflow files
        #[arg(default_value = ".github/workflows/")]
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the job dependency graph of a workflow
    Graph {
        /// Path to the workflow file
        path: PathBuf,

        /// Output format (mermaid, text)
        #[arg(short, long, default_value = "mermaid")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let config = Config::load(cli.config.as_deref(), &cwd)?;
    let mut options = config.to_options();

    match cli.command {
        Commands::Convert {
            path,
            output,
            no_anchors,
            default_branch,
            allow_cycles,
            check,
        } => {
            if no_anchors {
                options.anchors = false;
            }
            if let Some(branch) = default_branch {
                options.default_branch = branch;
            }
            if allow_cycles {
                options.allow_cycles = true;
            }
            cmd_convert(&path, output.as_deref(), check.as_deref(), options)
        }
        Commands::Plan { path, format } => cmd_plan(&path, &format, options),
        Commands::Graph { path, format } => cmd_graph(&path, &format),
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn discover_workflow_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if path.is_dir() {
        let pattern = format!("{}/**/*.yml", path.display());
        let mut files: Vec<PathBuf> = glob::glob(&pattern)
            .context("Failed to read glob pattern")?
            .chain(
                glob::glob(&format!("{}/**/*.yaml", path.display()))
                    .context("Failed to read glob pattern")?,
            )
            .filter_map(|r| r.ok())
            .collect();
        files.sort();
        return Ok(files);
    }

    anyhow::bail!("Path '{}' does not exist", path.display());
}

fn cmd_convert(
    path: &Path,
    output: Option<&Path>,
    check: Option<&Path>,
    options: ConvertOptions,
) -> Result<()> {
    if !path.is_file() {
        anyhow::bail!(
            "'{}' is not a file. Convert requires a single workflow file.",
            path.display()
        );
    }

    let conversion = Converter::new(options)
        .convert_file(path)
        .with_context(|| format!("Failed to convert {}", path.display()))?;

    display::print_warnings(&conversion.warnings);

    if let Some(existing) = check {
        let current = std::fs::read_to_string(existing)
            .with_context(|| format!("Failed to read {}", existing.display()))?;
        if display::print_diff(&current, &conversion.yaml, &existing.to_string_lossy()) {
            anyhow::bail!(
                "{} is out of date with {}",
                existing.display(),
                path.display()
            );
        }
        return Ok(());
    }

    match output {
        Some(out_path) => {
            std::fs::write(out_path, &conversion.yaml)
                .with_context(|| format!("Failed to write {}", out_path.display()))?;
            println!("CNB config written to {}", out_path.display());
        }
        None => {
            print!("{}", conversion.yaml);
        }
    }

    Ok(())
}

fn cmd_plan(path: &Path, format: &str, options: ConvertOptions) -> Result<()> {
    let files = discover_workflow_files(path)?;

    if files.is_empty() {
        anyhow::bail!(
            "No workflow files found at '{}'. \
            Make sure the path points to a YAML workflow file or directory.",
            path.display()
        );
    }

    tracing::debug!(path = %path.display(), files = files.len(), "discovered workflow files");

    let converter = Converter::new(options);
    for file in &files {
        let conversion = converter
            .convert_file(file)
            .with_context(|| format!("Failed to convert {}", file.display()))?;

        match format {
            "json" => {
                let json = serde_json::to_string_pretty(&conversion)?;
                println!("{}", json);
            }
            _ => {
                display::print_plan(file, &conversion);
            }
        }
    }

    Ok(())
}

fn cmd_graph(path: &Path, format: &str) -> Result<()> {
    let workflow = GitHubActionsParser::parse_file(path)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let graph = DependencyGraph::build(&workflow.jobs);

    match format {
        "text" => display::print_graph(path, &graph),
        _ => println!("{}", graph.to_mermaid()),
    }

    Ok(())
}
