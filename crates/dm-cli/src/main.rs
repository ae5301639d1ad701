//! Data Merge CLI
//!
//! Command-line tool for unifying columns across tabular files and
//! exporting a consolidated table.

mod logging;

use chrono::Local;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use dm_core::export::collect_headers;
use dm_core::{
    active_headers, default_export_name, discover_sources, filter_for_display,
    ConsolidationPipeline, DateOrder, DuplicateHeaderPolicy, FileSource, FileWriter, MergeState,
    Session, SessionPlan, TransformOptions, DEFAULT_PREVIEW_ROWS,
};
use logging::{init_logging, LogConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dm-cli")]
#[command(about = "Unify columns across tabular files and export a consolidated table", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the unified columns and the file headers they map
    Columns {
        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Show the first consolidated rows
    Preview {
        #[command(flatten)]
        sources: SourceArgs,

        /// Maximum number of rows to display
        #[arg(short, long, default_value_t = DEFAULT_PREVIEW_ROWS)]
        rows: usize,
    },

    /// Consolidate every row and export it
    Consolidate {
        #[command(flatten)]
        sources: SourceArgs,

        /// Output file (.xlsx, .csv, .tsv or .json) or directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Create a plan file template
    CreatePlan {
        /// Output path for the plan file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Source files, in order
    #[arg(short, long)]
    file: Vec<PathBuf>,

    /// Directories to scan for spreadsheet and .csv / .tsv files
    #[arg(short, long)]
    dir: Vec<PathBuf>,

    /// Plan file (JSON) with files, options and actions to replay
    #[arg(short, long)]
    plan: Option<PathBuf>,

    /// Emit PeriodoL / PeriodoA from Fecha_Leg / Fecha_Asig
    #[arg(long, overrides_with = "no_periods")]
    periods: bool,

    /// Do not emit period columns, even if the plan enables them
    #[arg(long, overrides_with = "periods")]
    no_periods: bool,

    /// Keep only the leading code of job-type values
    #[arg(long, overrides_with = "no_clean_job")]
    clean_job: bool,

    /// Keep job-type values as they are, even if the plan cleans them
    #[arg(long, overrides_with = "clean_job")]
    no_clean_job: bool,

    /// How to read ambiguous numeric dates
    #[arg(long, value_enum)]
    date_order: Option<DateOrderArg>,

    /// What to do when two output columns share a header
    #[arg(long, value_enum)]
    on_duplicate: Option<DuplicateArg>,

    /// Fail when a plan action cannot be applied
    #[arg(long)]
    strict: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DateOrderArg {
    DayFirst,
    MonthFirst,
}

#[derive(Clone, Copy, ValueEnum)]
enum DuplicateArg {
    Error,
    Suffix,
    LastWins,
}

impl SourceArgs {
    /// Flags override plan options
    fn options(&self, mut options: TransformOptions) -> TransformOptions {
        if let Some(on) = switch(self.periods, self.no_periods) {
            options.generate_periods = on;
        }
        if let Some(on) = switch(self.clean_job, self.no_clean_job) {
            options.clean_job_type = on;
        }
        if let Some(order) = self.date_order {
            options.date_order = match order {
                DateOrderArg::DayFirst => DateOrder::DayFirst,
                DateOrderArg::MonthFirst => DateOrder::MonthFirst,
            };
        }
        if let Some(policy) = self.on_duplicate {
            options.duplicate_headers = match policy {
                DuplicateArg::Error => DuplicateHeaderPolicy::Error,
                DuplicateArg::Suffix => DuplicateHeaderPolicy::AutoSuffix,
                DuplicateArg::LastWins => DuplicateHeaderPolicy::LastWriteWins,
            };
        }
        options
    }
}

/// Value of an `--x` / `--no-x` flag pair; `None` when neither was given
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose));

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> dm_core::Result<()> {
    match command {
        Commands::Columns { sources } => cmd_columns(&sources),
        Commands::Preview { sources, rows } => cmd_preview(&sources, rows),
        Commands::Consolidate { sources, output } => cmd_consolidate(&sources, &output),
        Commands::CreatePlan { output } => cmd_create_plan(&output),
    }
}

/// Build the session from the plan and flags, then replay the plan's actions
fn load_session(args: &SourceArgs) -> dm_core::Result<(Session<FileSource>, TransformOptions)> {
    let plan = match &args.plan {
        Some(path) => SessionPlan::load(path)?,
        None => SessionPlan::new(),
    };

    let mut files = plan.source_files()?;
    files.extend(args.file.iter().cloned());
    files.extend(discover_sources(&args.dir)?);

    let mut session = Session::new(FileSource::new());
    session.add_files(&files);

    let report = session.apply(&plan.actions);
    if args.strict {
        report.ensure_complete()?;
    }

    Ok((session, args.options(plan.options)))
}

fn cmd_columns(args: &SourceArgs) -> dm_core::Result<()> {
    let (session, _) = load_session(args)?;
    let resolver = session.resolver();

    println!(
        "Columns ({}) from {} file(s):",
        resolver.columns().len(),
        session.files().len()
    );
    println!();

    for (i, col) in resolver.columns().iter().enumerate() {
        let mark = if col.is_selected { "[x]" } else { "[ ]" };
        let state = match resolver.state_of(col.id()) {
            Some(MergeState::Target) => " <-- target",
            Some(MergeState::Mergeable) => " (mergeable)",
            _ => "",
        };
        println!(
            "{:>3}. {} {} [{}]{}",
            i + 1,
            mark,
            col.header_name,
            col.source_label(),
            state
        );

        if col.is_custom() {
            if !col.default_value.is_empty() {
                println!("       default: {}", col.default_value);
            }
        } else {
            for (file, header) in col.file_mappings().iter() {
                println!("       {} <- {}", file.display(), header);
            }
        }
    }

    Ok(())
}

fn cmd_preview(args: &SourceArgs, max_rows: usize) -> dm_core::Result<()> {
    let (session, options) = load_session(args)?;
    let columns = session.resolver().columns();

    let pipeline = ConsolidationPipeline::new(session.reader(), FileWriter::new(), options);
    let rows = pipeline.preview(session.files(), columns, max_rows)?;
    let shown = filter_for_display(&rows, &active_headers(columns, &options));

    if shown.is_empty() {
        println!("(no rows)");
        return Ok(());
    }

    let header = collect_headers(&shown);
    println!("{}", header.join("\t"));
    println!("{}", "-".repeat(header.len() * 12));

    for row in &shown {
        let values: Vec<String> = header
            .iter()
            .map(|h| row.get(h).map(|v| v.to_string_value()).unwrap_or_default())
            .collect();
        println!("{}", values.join("\t"));
    }

    Ok(())
}

fn cmd_consolidate(args: &SourceArgs, output: &Path) -> dm_core::Result<()> {
    let (session, options) = load_session(args)?;

    if !session.is_ready() {
        println!("Nothing to consolidate: no source files or no selected columns");
        return Ok(());
    }

    let path = if output.is_dir() {
        output.join(format!("{}.xlsx", default_export_name(Local::now().date_naive())))
    } else {
        output.to_path_buf()
    };

    let pipeline = ConsolidationPipeline::new(session.reader(), FileWriter::new(), options);
    let columns = session.resolver().columns();
    let rows = pipeline.consolidate(session.files(), columns)?;
    let summary = pipeline.export(&path, columns, &rows)?;

    println!(
        "Exported {} rows from {} file(s) to {}",
        summary.rows_written,
        session.files().len(),
        summary.path.display()
    );

    Ok(())
}

fn cmd_create_plan(output: &Path) -> dm_core::Result<()> {
    let plan = SessionPlan::template();
    plan.save(output)?;

    println!("Created plan template: {}", output.display());
    println!("Edit the file to list your sources and actions, then run:");
    println!("  dm-cli consolidate --plan {} --output <path>", output.display());

    Ok(())
}
