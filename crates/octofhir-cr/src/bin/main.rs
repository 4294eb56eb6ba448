//! Clinical reasoning command-line interface

use clap::{Args, Parser, Subcommand};
use octofhir_cr::cli::care_gaps::{self, CareGapsConfig};
use octofhir_cr::cli::evaluate::{self, EvaluateConfig};
use octofhir_cr::cli::measure::{self, MeasureConfig};
use octofhir_cr::cli::output;
use octofhir_cr::cli::session::SessionConfig;
use std::path::PathBuf;

/// Clinical reasoning command-line tool
#[derive(Parser)]
#[command(name = "cr")]
#[command(author, version, about = "Clinical reasoning operations: $evaluate, $evaluate-measure, $care-gaps", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (json, pretty)
    #[arg(short = 'f', long, global = true)]
    format: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DataArgs {
    /// Resource or bundle files (JSON) loaded into the store
    #[arg(short, long)]
    data: Vec<PathBuf>,
}

#[derive(Args)]
struct PeriodArgs {
    /// Measurement period start (YYYY, YYYY-MM, YYYY-MM-DD or date-time)
    #[arg(long)]
    period_start: Option<String>,

    /// Measurement period end
    #[arg(long)]
    period_end: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every expression of a library
    Evaluate {
        /// Library id
        library: String,

        /// Patient id
        #[arg(short, long)]
        patient: Option<String>,

        /// Context type when no patient is given
        #[arg(long)]
        context: Option<String>,

        #[command(flatten)]
        period: PeriodArgs,

        /// Product line parameter
        #[arg(long)]
        product_line: Option<String>,

        /// Parameters (name=value)
        #[arg(short = 'P', long = "param")]
        params: Vec<String>,

        /// Render resources in full instead of as references
        #[arg(long)]
        full: bool,

        /// Request-scoped bundle; embedded libraries shadow stored ones
        #[arg(long)]
        additional_data: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,
    },

    /// Evaluate a quality measure into a MeasureReport
    EvaluateMeasure {
        /// Measure id or canonical url
        measure: String,

        /// Patient/<id> or Group/<id>
        #[arg(short, long)]
        subject: Option<String>,

        /// subject, subject-list or population
        #[arg(short, long)]
        report_type: Option<String>,

        #[command(flatten)]
        period: PeriodArgs,

        /// Product line parameter
        #[arg(long)]
        product_line: Option<String>,

        /// Date the data was last received
        #[arg(long)]
        last_received_on: Option<String>,

        /// Request-scoped bundle consulted after the store
        #[arg(long)]
        additional_data: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,
    },

    /// Compute care-gaps documents
    CareGaps {
        /// Measurement period start
        #[arg(long)]
        period_start: String,

        /// Measurement period end
        #[arg(long)]
        period_end: String,

        /// Patient/<id> or Group/<id>
        #[arg(short, long)]
        subject: Option<String>,

        #[arg(long)]
        practitioner: Option<String>,

        #[arg(long)]
        organization: Option<String>,

        /// Gap statuses to report (open-gap, closed-gap)
        #[arg(long, required = true)]
        status: Vec<String>,

        /// Measure ids
        #[arg(long)]
        measure_id: Vec<String>,

        /// Measure canonical urls
        #[arg(long)]
        measure_url: Vec<String>,

        #[command(flatten)]
        data: DataArgs,
    },
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    output::setup_colors(&cli.color);

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let session = |data: DataArgs| SessionConfig {
        data: data.data,
        config_file: cli.config.clone(),
        verbose: cli.verbose,
        output_format: cli.format.clone(),
        output_file: cli.output.clone(),
    };

    let result = match cli.command {
        Commands::Evaluate {
            library,
            patient,
            context,
            period,
            product_line,
            params,
            full,
            additional_data,
            data,
        } => {
            let config = EvaluateConfig {
                library,
                patient,
                context,
                period_start: period.period_start,
                period_end: period.period_end,
                product_line,
                params,
                full,
                additional_data,
                session: session(data),
            };
            evaluate::run(config).await
        }

        Commands::EvaluateMeasure {
            measure,
            subject,
            report_type,
            period,
            product_line,
            last_received_on,
            additional_data,
            data,
        } => {
            let config = MeasureConfig {
                measure,
                subject,
                report_type,
                period_start: period.period_start,
                period_end: period.period_end,
                product_line,
                last_received_on,
                additional_data,
                session: session(data),
            };
            measure::run(config).await
        }

        Commands::CareGaps {
            period_start,
            period_end,
            subject,
            practitioner,
            organization,
            status,
            measure_id,
            measure_url,
            data,
        } => {
            let config = CareGapsConfig {
                period_start,
                period_end,
                subject,
                practitioner,
                organization,
                status,
                measure_id,
                measure_url,
                session: session(data),
            };
            care_gaps::run(config).await
        }
    };

    if let Err(e) = result {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}
