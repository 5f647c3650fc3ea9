use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use recital_tools::filter::FilterTarget;
use recital_tools::workflow;
use recital_tools::{Result, ToolError};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    let result = init_logging().and_then(|()| run(cli));
    if let Err(error) = result {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => execute_run(args),
        Command::Filter(args) => execute_filter(args),
        Command::Programs(args) => execute_programs(args),
    }
}

fn execute_run(args: RunArgs) -> Result<()> {
    ensure_exists(&args.input)?;
    let run_date = args.run_date.unwrap_or_else(|| Local::now().date_naive());
    let report = workflow::run_workbook_file(&args.input, &args.output, run_date)?;
    println!(
        "{} recitals processed, log entry {}",
        report.recitals.len(),
        report.log.run_date
    );
    Ok(())
}

fn execute_filter(args: FilterArgs) -> Result<()> {
    ensure_exists(&args.input)?;
    workflow::filter_workbook_file(&args.input, &args.output, args.column)
}

fn execute_programs(args: ProgramsArgs) -> Result<()> {
    ensure_exists(&args.input)?;
    let recitals = workflow::read_recitals(&args.input)?;
    let programs: Vec<&str> = recitals
        .iter()
        .map(|recital| recital.program.as_str())
        .collect();
    print!("{}", programs.join("\n"));
    Ok(())
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ToolError::MissingInput(path.to_path_buf()))
    }
}

fn parse_target(value: &str) -> std::result::Result<FilterTarget, String> {
    value.parse().map_err(|error: ToolError| error.to_string())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Build organ recital programs and reports from a planning workbook."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full workflow: programs, performance dates, history and log.
    Run(RunArgs),
    /// Filter the repertoire table by a recital order column.
    Filter(FilterArgs),
    /// Print the program of every planned recital.
    Programs(ProgramsArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Planning workbook to read.
    #[arg(long)]
    input: PathBuf,

    /// Where to save the updated workbook.
    #[arg(long)]
    output: PathBuf,

    /// Date recorded in the workflow log, YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    run_date: Option<NaiveDate>,
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Planning workbook to read.
    #[arg(long)]
    input: PathBuf,

    /// Where to save the filtered workbook.
    #[arg(long)]
    output: PathBuf,

    /// Order column to show (1-4), or `clear`.
    #[arg(long, value_parser = parse_target)]
    column: FilterTarget,
}

#[derive(clap::Args)]
struct ProgramsArgs {
    /// Planning workbook to read.
    #[arg(long)]
    input: PathBuf,
}
