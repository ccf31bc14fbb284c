use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::*;
use flowgraph_build::build_cfg;
use flowgraph_core::{AssertionMode, BuilderConfig, ClassHierarchy, ControlFlowGraph, SyntaxTree, UnderlyingAst};
use flowgraph_emit::emitter::block_kind_name;
use flowgraph_emit::{DotEmitter, Emitter, EmitterConfig, TextEmitter, VerbosityLevel};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowgraph")]
#[command(about = "flowgraph - control-flow graphs with exceptional edges")]
#[command(version = "0.1.0")]
#[command(author = "Gianluca Brigandi <gbrigand@gmail.com>")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph for a serialized body and render it.
    Build {
        input: PathBuf,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        no_color: bool,

        #[arg(long, value_enum, default_value = "normal")]
        detail: Detail,

        #[arg(long)]
        hide_exception_types: bool,

        #[arg(long)]
        assertions_enabled: bool,

        #[arg(long)]
        assertions_disabled: bool,

        #[arg(short, long, action = ArgAction::Count)]
        verbose: u8,
    },

    /// Build the graph, verify its invariants and print a summary.
    Check {
        input: PathBuf,

        #[arg(short, long, action = ArgAction::Count)]
        verbose: u8,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Dot,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Detail {
    Quiet,
    Normal,
    Verbose,
    Debug,
}

impl From<Detail> for VerbosityLevel {
    fn from(detail: Detail) -> Self {
        match detail {
            Detail::Quiet => VerbosityLevel::Quiet,
            Detail::Normal => VerbosityLevel::Normal,
            Detail::Verbose => VerbosityLevel::Verbose,
            Detail::Debug => VerbosityLevel::Debug,
        }
    }
}

/// The JSON document both subcommands read.
#[derive(Deserialize)]
struct Input {
    ast: SyntaxTree,
    underlying: UnderlyingAst,
    /// Extra classes merged over the built-in core class table.
    #[serde(default)]
    hierarchy: Option<ClassHierarchy>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            format,
            output,
            no_color,
            detail,
            hide_exception_types,
            assertions_enabled,
            assertions_disabled,
            verbose,
        } => {
            init_tracing(verbose);
            let assertions = AssertionMode::from_flags(assertions_enabled, assertions_disabled)?;
            let emitter_config = EmitterConfig {
                use_colors: !no_color && output.is_none(),
                verbosity: detail.into(),
                show_exception_types: !hide_exception_types,
            };
            cmd_build(input, format, output, assertions, emitter_config, verbose > 0)
        }
        Commands::Check { input, verbose } => {
            init_tracing(verbose);
            cmd_check(input, verbose > 0)
        }
    }
}

/// Library events go to stderr; `RUST_LOG` wins over `-v` when set.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_input(path: &Path) -> Result<Input> {
    let json = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let input: Input =
        serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))?;
    info!(path = %path.display(), trees = input.ast.len(), target = %input.underlying, "loaded input");
    Ok(input)
}

fn build_graph(input: Input, config: &BuilderConfig) -> Result<ControlFlowGraph> {
    let mut hierarchy = ClassHierarchy::new();
    if let Some(extra) = &input.hierarchy {
        hierarchy.extend(extra);
    }
    let graph = build_cfg(&input.ast, input.underlying, &hierarchy, config)?;
    Ok(graph)
}

fn cmd_build(
    input: PathBuf,
    format: OutputFormat,
    output: Option<PathBuf>,
    assertions: AssertionMode,
    emitter_config: EmitterConfig,
    verbose: bool,
) -> Result<()> {
    let config = BuilderConfig::new().with_assertions(assertions);
    let graph = build_graph(load_input(&input)?, &config)?;

    let rendered = match format {
        OutputFormat::Text => TextEmitter::new(emitter_config).emit_to_string(&graph)?,
        OutputFormat::Dot => DotEmitter::new(emitter_config).emit_to_string(&graph)?,
    };

    if let Some(output_path) = output {
        fs::write(&output_path, &rendered)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        if verbose {
            println!(
                " {} {} blocks written to {}",
                "SUCCESS:".bright_green().bold(),
                graph.all_blocks().len(),
                output_path.display()
            );
        }
    } else {
        print!("{}", rendered);
    }

    Ok(())
}

fn cmd_check(input: PathBuf, verbose: bool) -> Result<()> {
    let config = BuilderConfig::new().with_invariant_checks(true);
    let input = load_input(&input)?;
    let target = input.underlying.to_string();

    let graph = match build_graph(input, &config) {
        Ok(graph) => graph,
        Err(e) => {
            println!("{} {}", " INVALID".bright_red().bold(), target);
            return Err(e.context("control-flow graph check failed"));
        }
    };

    println!("{} {}", " VALID".bright_green().bold(), target);
    println!("   Blocks: {}", graph.all_blocks().len());
    for (kind, count) in graph.block_kind_counts() {
        println!("     {}: {}", block_kind_name(kind), count);
    }
    println!("   Nodes: {}", graph.all_nodes().len());
    println!("   Return nodes: {}", graph.return_nodes().len());
    if verbose {
        println!("   Declared classes: {}", graph.declared_classes().len());
        println!("   Declared lambdas: {}", graph.declared_lambdas().len());
        let order: Vec<String> = graph
            .depth_first_ordered_blocks()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("   Reverse postorder: {}", order.join(" "));
    }
    Ok(())
}
