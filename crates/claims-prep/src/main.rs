//! CLI entry point for the claims preparation pipeline.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use claims_prep::ingest::normalize_column_name;
use claims_prep::profiler::{
    DEFAULT_ALPHA, aggregate_by_group, chi2_test_frequency, interpret_p_value,
    kpis_to_dataframe, kruskal_test_numeric, proportion_ztest_pair, write_summaries,
};
use claims_prep::{
    CategoricalImputation, CleaningReport, DataProfiler, DatasetOverview, EmptyColumnPolicy,
    Pipeline, PipelineConfig, ReportGenerator,
};
use dotenv::dotenv;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// CLI-compatible categorical imputation strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliCategoricalImputation {
    /// Leave missing categories empty
    Keep,
    /// Use the most frequent value (mode)
    Mode,
    /// Use a constant value ("Unknown")
    Constant,
}

impl From<CliCategoricalImputation> for CategoricalImputation {
    fn from(cli: CliCategoricalImputation) -> Self {
        match cli {
            CliCategoricalImputation::Keep => CategoricalImputation::Keep,
            CliCategoricalImputation::Mode => CategoricalImputation::Mode,
            CliCategoricalImputation::Constant => CategoricalImputation::Constant,
        }
    }
}

/// CLI-compatible empty column policy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliEmptyColumnPolicy {
    /// Fail the run
    Fail,
    /// Drop optional columns without values
    Drop,
}

impl From<CliEmptyColumnPolicy> for EmptyColumnPolicy {
    fn from(cli: CliEmptyColumnPolicy) -> Self {
        match cli {
            CliEmptyColumnPolicy::Fail => EmptyColumnPolicy::Fail,
            CliEmptyColumnPolicy::Drop => EmptyColumnPolicy::Drop,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "claims-prep",
    version,
    about = "Insurance claims ingestion and cleaning pipeline",
    long_about = "Reads a raw insurance policy dataset, validates and coerces it, and \
                  writes a cleaned CSV with median-imputed numeric columns and derived \
                  claim ratios.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  CLAIMS_PREP_INPUT     Raw input file (overridden by --input)\n  \
                  CLAIMS_PREP_OUTPUT    Processed output file (overridden by --output)\n  \
                  RUST_LOG              Log filter (overrides --log-level)\n\n\
                  EXAMPLES:\n  \
                  # Clean the default dataset\n  \
                  claims-prep clean\n\n  \
                  # Clean a comma separated file, filling categories with their mode\n  \
                  claims-prep clean -i raw.csv -s , --categorical-imputation mode\n\n  \
                  # Describe the raw data and save summary tables\n  \
                  claims-prep summary --output-dir reports/\n\n  \
                  # Claim KPIs per province\n  \
                  claims-prep kpis --group-by Province\n\n  \
                  # Does claim frequency differ by province? Gauteng vs Western Cape?\n  \
                  claims-prep test --group-by Province --pair Gauteng \"Western Cape\""
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and results)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest, clean and write the processed dataset
    Clean {
        #[command(flatten)]
        source: SourceArgs,

        /// Processed CSV output file
        #[arg(short, long, env = "CLAIMS_PREP_OUTPUT")]
        output: Option<PathBuf>,

        /// Strategy for missing categorical values
        #[arg(long, value_enum)]
        categorical_imputation: Option<CliCategoricalImputation>,

        /// What to do with optional numeric columns that have no values
        #[arg(long, value_enum)]
        empty_columns: Option<CliEmptyColumnPolicy>,

        /// Only derive claim_ratio, not the claim KPIs
        #[arg(long)]
        no_kpis: bool,

        /// Also write numeric and categorical summary tables to this directory
        #[arg(long)]
        summary_dir: Option<PathBuf>,

        /// Output JSON to stdout instead of human-readable summary
        ///
        /// Disables all progress logs; only outputs the final JSON report.
        #[arg(long)]
        json: bool,

        /// Write the JSON report next to the output file
        ///
        /// The report will be saved as <input_name>_report.json
        #[arg(short = 'r', long)]
        emit_report: bool,
    },

    /// Ingest without cleaning and describe the dataset
    Summary {
        #[command(flatten)]
        source: SourceArgs,

        /// Write numeric_summary.csv and categorical_summary.csv here
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Clean in memory and print claim KPIs per group
    Kpis {
        #[command(flatten)]
        source: SourceArgs,

        /// Column to group by (raw or normalized name)
        #[arg(short, long)]
        group_by: String,

        /// Minimum number of policies for a group to be shown
        #[arg(long, default_value = "30")]
        min_count: usize,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Clean in memory and test whether claims differ between groups
    ///
    /// Always runs a chi-square test of claim frequency across the groups.
    Test {
        #[command(flatten)]
        source: SourceArgs,

        /// Column to group by (raw or normalized name)
        #[arg(short, long)]
        group_by: String,

        /// Also compare the claim frequency of these two groups (z-test)
        #[arg(long, num_args = 2, value_names = ["GROUP_A", "GROUP_B"])]
        pair: Option<Vec<String>>,

        /// Also compare this numeric column across groups (Kruskal-Wallis)
        #[arg(long)]
        numeric: Option<String>,

        /// Minimum number of policies for a group to be tested
        #[arg(long, default_value = "30")]
        min_count: usize,

        /// Significance level
        #[arg(long, default_value_t = DEFAULT_ALPHA)]
        alpha: f64,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn json(&self) -> bool {
        match self {
            Self::Clean { json, .. }
            | Self::Summary { json, .. }
            | Self::Kpis { json, .. }
            | Self::Test { json, .. } => *json,
        }
    }
}

/// Where to read from and how.
#[derive(Args, Debug)]
struct SourceArgs {
    /// Raw delimited input file
    #[arg(short, long, env = "CLAIMS_PREP_INPUT")]
    input: Option<PathBuf>,

    /// Field separator of the raw file
    #[arg(short, long)]
    separator: Option<char>,

    /// Critical columns; rows missing any of them are dropped (comma separated)
    #[arg(long, value_delimiter = ',')]
    critical: Vec<String>,

    /// JSON configuration file; flags given on the command line take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // .env has to be loaded before clap reads the env-backed flags
    dotenv().ok();

    let cli = Cli::parse();
    let json_output = cli.command.json();
    init_logging(&cli.log_level, cli.quiet, json_output);

    let result = match &cli.command {
        Commands::Clean { .. } => run_clean(&cli),
        Commands::Summary {
            source, output_dir, ..
        } => run_summary(&cli, source, output_dir.as_deref()),
        Commands::Kpis {
            source,
            group_by,
            min_count,
            ..
        } => run_kpis(&cli, source, group_by, *min_count),
        Commands::Test { .. } => run_tests(&cli),
    };

    if let Err(ref e) = result {
        if json_output {
            let payload = match e.downcast_ref::<claims_prep::PipelineError>() {
                Some(pipeline_error) => json!({ "error": pipeline_error }),
                None => json!({ "error": { "message": e.to_string() } }),
            };
            println!("{}", serde_json::to_string_pretty(&payload)?);
        } else {
            error!("{:#}", e);
        }
    }

    result
}

/// Resolve the configuration: file (or defaults), then command-line flags.
fn build_config(source: &SourceArgs) -> Result<PipelineConfig> {
    let mut config = match &source.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(ref input) = source.input {
        config.input_path = input.clone();
    }
    if let Some(separator) = source.separator {
        config.ingest.separator = separator;
    }
    if !source.critical.is_empty() {
        config.schema.critical_columns = source.critical.clone();
    }

    Ok(config)
}

fn build_pipeline(cli: &Cli, config: PipelineConfig, show_progress: bool) -> Result<Pipeline> {
    let mut builder = Pipeline::builder().config(config);

    if show_progress && !cli.quiet {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    Ok(builder.build()?)
}

fn run_clean(cli: &Cli) -> Result<()> {
    let Commands::Clean {
        source,
        output,
        categorical_imputation,
        empty_columns,
        no_kpis,
        summary_dir,
        json,
        emit_report,
    } = &cli.command
    else {
        return Err(anyhow!("clean called for another command"));
    };

    let mut config = build_config(source)?;
    if let Some(output) = output {
        config.output_path = output.clone();
    }
    if let Some(strategy) = categorical_imputation {
        config.categorical_imputation = (*strategy).into();
    }
    if let Some(policy) = empty_columns {
        config.empty_column_policy = (*policy).into();
    }
    if *no_kpis {
        config.derive_kpis = false;
    }
    if let Some(dir) = summary_dir {
        config.summary_dir = Some(dir.clone());
    }

    let input_path = config.input_path.clone();
    let pipeline = build_pipeline(cli, config, !json)?;

    info!("{}", "=".repeat(80));
    info!("Starting claims cleaning pipeline...");
    info!("{}", "=".repeat(80));

    let result = pipeline.run().context("Pipeline failed")?;
    let report = ReportGenerator::build_report(&input_path, &result);

    if *json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if *emit_report {
        let report_dir = result
            .output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let generator = ReportGenerator::new(report_dir);
        let report_path = generator.write_report_to_file(&report, &extract_file_stem(&input_path))?;
        info!("Report written to: {}", report_path.display());
    }

    print_human_readable_summary(&report);
    Ok(())
}

fn run_summary(cli: &Cli, source: &SourceArgs, output_dir: Option<&Path>) -> Result<()> {
    let config = build_config(source)?;
    let pipeline = build_pipeline(cli, config, false)?;

    let df = pipeline.ingest()?;
    let overview = DataProfiler::overview(&df)?;

    let written = match output_dir {
        Some(dir) => write_summaries(&df, dir)?,
        None => Vec::new(),
    };

    let json_output = matches!(cli.command, Commands::Summary { json: true, .. });
    if json_output {
        let payload = json!({
            "input_file": pipeline.config().input_path.display().to_string(),
            "overview": overview,
            "summary_files": written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    print_overview(&pipeline.config().input_path, &overview);
    for path in &written {
        println!("Saved: {}", path.display());
    }
    Ok(())
}

fn run_kpis(cli: &Cli, source: &SourceArgs, group_by: &str, min_count: usize) -> Result<()> {
    let config = build_config(source)?;
    let pipeline = build_pipeline(cli, config, false)?;

    let df = pipeline.ingest()?;
    let (df, _) = pipeline.clean(df)?;

    let group_col = normalize_column_name(group_by);
    let kpis = aggregate_by_group(&df, &group_col, min_count)?;

    let json_output = matches!(cli.command, Commands::Kpis { json: true, .. });
    if json_output {
        println!("{}", serde_json::to_string_pretty(&kpis)?);
        return Ok(());
    }

    if kpis.is_empty() {
        println!(
            "No '{}' group has at least {} policies",
            group_col, min_count
        );
        return Ok(());
    }
    println!("{}", kpis_to_dataframe(&group_col, &kpis)?);
    Ok(())
}

fn run_tests(cli: &Cli) -> Result<()> {
    let Commands::Test {
        source,
        group_by,
        pair,
        numeric,
        min_count,
        alpha,
        json,
    } = &cli.command
    else {
        return Err(anyhow!("test called for another command"));
    };

    let config = build_config(source)?;
    let pipeline = build_pipeline(cli, config, false)?;
    let df = pipeline.ingest()?;
    let (df, _) = pipeline.clean(df)?;

    let group_col = normalize_column_name(group_by);

    let chi2 = chi2_test_frequency(&df, &group_col, *min_count)?;
    let ztest = match pair.as_deref() {
        Some([a, b]) => Some(proportion_ztest_pair(&df, &group_col, a, b)?),
        _ => None,
    };
    let kruskal = match numeric {
        Some(column) => Some(kruskal_test_numeric(
            &df,
            &group_col,
            &normalize_column_name(column),
            *min_count,
        )?),
        None => None,
    };

    if *json {
        let payload = json!({
            "group_by": group_col,
            "alpha": alpha,
            "claim_frequency_chi2": {
                "result": chi2,
                "interpretation": interpret_p_value(chi2.p_value, *alpha),
            },
            "claim_frequency_ztest": ztest.as_ref().map(|z| json!({
                "result": z,
                "interpretation": interpret_p_value(z.p_value, *alpha),
            })),
            "kruskal": kruskal.as_ref().map(|k| json!({
                "result": k,
                "interpretation": interpret_p_value(k.p_value, *alpha),
            })),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!();
    println!("HYPOTHESIS TESTS BY '{}'", group_col);
    println!("{}", "-".repeat(40));
    println!(
        "Claim frequency, chi-square ({} groups, dof {}): statistic = {:.4}",
        chi2.groups_used.len(),
        chi2.dof,
        chi2.statistic
    );
    println!("  {}", interpret_p_value(chi2.p_value, *alpha));

    if let Some(z) = &ztest {
        println!(
            "Claim frequency, {} ({}/{}) vs {} ({}/{}): z = {:.4}",
            z.groups[0], z.count[0], z.nobs[0], z.groups[1], z.count[1], z.nobs[1], z.statistic
        );
        println!("  {}", interpret_p_value(z.p_value, *alpha));
    }

    if let Some(k) = &kruskal {
        println!(
            "{}, Kruskal-Wallis ({} groups): H = {:.4}",
            k.column,
            k.groups_used.len(),
            k.statistic
        );
        println!("  {}", interpret_p_value(k.p_value, *alpha));
    }
    println!();
    Ok(())
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Print the dataset overview.
///
/// Uses `println!` rather than logging: this is the command's output.
fn print_overview(input: &Path, overview: &DatasetOverview) {
    println!();
    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", input.display());
    println!("  Rows: {}", overview.shape.0);
    println!("  Columns: {}", overview.shape.1);
    println!("  Missing cells: {}", overview.total_missing());
    println!();

    println!(
        "{:<32} {:<8} {:<10} {:<10} {:<10}",
        "Column", "Type", "Missing", "Missing %", "Unique"
    );
    println!("{}", "-".repeat(74));
    for col in &overview.columns {
        println!(
            "{:<32} {:<8} {:<10} {:<10.1} {:<10}",
            truncate_str(&col.name, 31),
            col.dtype,
            col.null_count,
            col.null_percentage,
            col.unique_count
        );
    }
    println!();
}

/// Print a human-readable summary of the cleaning run.
fn print_human_readable_summary(report: &CleaningReport) {
    let summary = &report.processing_summary;

    println!();
    println!("{}", "=".repeat(80));
    println!("CLEANING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows x {} columns)",
        report.input_file, summary.rows_before, summary.columns_before
    );
    println!(
        "Output: {} ({} rows x {} columns)",
        report.output_file, summary.rows_after, summary.columns_after
    );
    println!();

    println!("Processing Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Rows dropped (missing critical field): {} ({:.1}%)",
        summary.rows_dropped_critical, summary.rows_removed_percent
    );
    println!("  Values imputed: {}", summary.values_imputed);
    if !report.dropped_columns.is_empty() {
        println!("  Columns dropped: {}", report.dropped_columns.join(", "));
    }
    println!("  Derived columns: {}", report.derived_columns.join(", "));
    println!();

    if !report.imputed_columns.is_empty() {
        println!("Median Imputation:");
        for imputed in report.imputed_columns.iter().take(10) {
            println!(
                "  - {}: {} values filled with {}",
                imputed.column, imputed.filled, imputed.median
            );
        }
        if report.imputed_columns.len() > 10 {
            println!("  ... and {} more columns", report.imputed_columns.len() - 10);
        }
        println!();
    }

    if !report.actions.is_empty() {
        println!("Actions:");
        for action in &report.actions {
            println!(
                "  [{}] {}: {}",
                action.action_type.display_name(),
                action.target,
                action.description
            );
        }
        println!();
    }

    if !summary.warnings.is_empty() {
        println!("Warnings:");
        for warning in &summary.warnings {
            println!("  ! {}", warning);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("Use --emit-report to save detailed JSON report");
    println!("{}", "=".repeat(80));
}
