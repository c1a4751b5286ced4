//! Matchrecon CLI - reconcile relational match data against the match API
//!
//! # Main Commands
//!
//! ```bash
//! matchrecon reconcile 5034295 5034296          # API + Postgres, CSV report on stdout
//! matchrecon reconcile 5034295 --env prod -o report.csv --json report.json
//! matchrecon reconcile 5034295 --documents docs/ --records exports/   # offline
//! matchrecon serve                              # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! matchrecon compare --document 5034295.json --records 5034295.csv
//! matchrecon compare --document doc.json --records export.csv --match-id 5034295
//! matchrecon resolve --document 5034295.json homeTeam.players[0].shirtNumber
//! matchrecon mappings                           # Print the built-in mapping tables
//! matchrecon operations                         # Show available normalization operations
//! ```

use clap::{Args, Parser, Subcommand};
use matchrecon::api::logs::{log_info, log_success, log_warning};
use matchrecon::reconcile::pipeline::DEFAULT_CONCURRENCY;
use matchrecon::sources::{load_document, records::load_records};
use matchrecon::{
    reconcile, reconcile_batch, ApiDocumentSource, AppConfig, CsvRecordSource, CsvReportSink,
    DocumentBackend, Environment, FieldPath, FileDocumentSource, JsonReportSink, MappingConfig,
    PgRecordSource, RecordBackend, ReportSink, TokenClient,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "matchrecon")]
#[command(about = "Reconcile match and roster records against the match API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one or more matches
    Reconcile(ReconcileArgs),

    /// Reconcile one local document against one local CSV export
    Compare {
        /// Match document (JSON)
        #[arg(long)]
        document: PathBuf,

        /// Joined match rows (CSV)
        #[arg(long)]
        records: PathBuf,

        /// Match id for the report (default: the records file stem)
        #[arg(long)]
        match_id: Option<i64>,

        /// Mapping configuration (default: built-in)
        #[arg(short, long)]
        mappings: Option<PathBuf>,

        /// CSV report file (default: JSON report on stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve a path against a document
    Resolve {
        /// Match document (JSON)
        #[arg(long)]
        document: PathBuf,

        /// Path such as homeTeam.players[0].shirtNumber
        path: String,
    },

    /// Print the mapping configuration as JSON
    Mappings {
        /// Validate and print this file instead of the built-in tables
        #[arg(short, long)]
        mappings: Option<PathBuf>,
    },

    /// Show available normalization operations
    Operations,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Mapping configuration (default: built-in)
        #[arg(short, long)]
        mappings: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ReconcileArgs {
    /// Match ids
    #[arg(required = true)]
    ids: Vec<i64>,

    /// Property file set
    #[arg(long, default_value = "test")]
    env: Environment,

    /// Property directory (default: $MATCHRECON_PROPERTIES_DIR or ./properties)
    #[arg(long)]
    properties: Option<PathBuf>,

    /// Mapping configuration (default: built-in)
    #[arg(short, long)]
    mappings: Option<PathBuf>,

    /// Read documents from {dir}/{id}.json instead of the API
    #[arg(long)]
    documents: Option<PathBuf>,

    /// Read records from {dir}/{id}.csv instead of the database
    #[arg(long)]
    records: Option<PathBuf>,

    /// CSV report file (default: stdout unless --json is given)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON report file
    #[arg(long)]
    json: Option<PathBuf>,

    /// Matches reconciled at the same time
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Only export rows that did not match
    #[arg(long)]
    mismatches_only: bool,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Reconcile(args) => cmd_reconcile(args).await,

        Commands::Compare {
            document,
            records,
            match_id,
            mappings,
            output,
        } => cmd_compare(&document, &records, match_id, mappings.as_deref(), output.as_deref()),

        Commands::Resolve { document, path } => cmd_resolve(&document, &path),

        Commands::Mappings { mappings } => cmd_mappings(mappings.as_deref()),

        Commands::Operations => cmd_operations(),

        Commands::Serve { port, mappings } => cmd_serve(port, mappings.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_reconcile(args: ReconcileArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mappings = load_mappings(args.mappings.as_deref())?;

    // Online sources need the property files; fully offline runs do not.
    let config = if args.documents.is_none() || args.records.is_none() {
        let dir = AppConfig::resolve_dir(args.properties.as_deref());
        log_info(format!("Loading {} configuration from {}", args.env, dir.display()));
        Some(AppConfig::load(args.env, &dir)?)
    } else {
        None
    };

    let documents = match &args.documents {
        Some(dir) => DocumentBackend::File(FileDocumentSource::new(dir)),
        None => {
            let config = config.as_ref().ok_or("no configuration for the match API")?;
            log_info(format!("Authenticating against {}", config.token_url()));
            let session = TokenClient::new(config.token_url())
                .fetch_session(&config.credentials()?)
                .await?;
            DocumentBackend::Api(ApiDocumentSource::new(config.api.base_url.clone(), session))
        }
    };

    let records = match &args.records {
        Some(dir) => RecordBackend::Csv(CsvRecordSource::new(dir).with_mapped_columns(mappings.source_fields())),
        None => {
            let config = config.as_ref().ok_or("no configuration for the database")?;
            let source = PgRecordSource::connect(&config.db.connection_url()?).await?;
            RecordBackend::Postgres(source.with_mapped_columns(mappings.source_fields()))
        }
    };

    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();
    if let Some(path) = &args.output {
        sinks.push(Box::new(
            CsvReportSink::create(path)?.with_mismatches_only(args.mismatches_only),
        ));
    }
    if let Some(path) = &args.json {
        sinks.push(Box::new(JsonReportSink::create(path)?));
    }
    if sinks.is_empty() {
        sinks.push(Box::new(
            CsvReportSink::new(io::stdout())?.with_mismatches_only(args.mismatches_only),
        ));
    }

    log_info(format!("Reconciling {} matches", args.ids.len()));
    let outcome = reconcile_batch(&args.ids, &documents, &records, &mappings, args.concurrency).await;

    for sink in sinks.iter_mut() {
        for report in &outcome.reports {
            sink.write_report(report.match_id, &report.report)?;
        }
        sink.finish()?;
    }

    if let Some(path) = &args.output {
        eprintln!("💾 CSV report written to: {}", path.display());
    }
    if let Some(path) = &args.json {
        eprintln!("💾 JSON report written to: {}", path.display());
    }

    if !outcome.is_success() {
        return Err(format!(
            "{} of {} matches failed",
            outcome.failures.len(),
            args.ids.len()
        )
        .into());
    }

    if outcome.all_matched() {
        log_success(format!("All {} matches reconciled without differences", args.ids.len()));
    } else {
        log_warning("Differences found, see the report");
    }

    Ok(())
}

fn cmd_compare(
    document_path: &Path,
    records_path: &Path,
    match_id: Option<i64>,
    mappings_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Document: {}", document_path.display());
    eprintln!("📄 Records: {}", records_path.display());

    let mappings = load_mappings(mappings_path)?;
    let document = load_document(document_path)?;
    let match_id = match match_id.or_else(|| match_id_from_path(records_path)) {
        Some(id) => id,
        None => {
            log_warning(format!(
                "No match id in '{}', reporting as match 0 (use --match-id)",
                records_path.display()
            ));
            0
        }
    };
    let mapped: Vec<String> = mappings.source_fields().into_iter().map(str::to_string).collect();
    let flat = load_records(&fs::read(records_path)?, match_id, &mapped)?;
    eprintln!("   Roster rows: {}", flat.roster.len());

    let report = reconcile(&flat, &document, &mappings)?;
    for failure in &report.pairing_failures {
        eprintln!("   ⚠️ Unpaired {}", failure);
    }
    eprintln!("\n📊 {}", report.summary());

    match output {
        Some(path) => {
            let mut sink = CsvReportSink::create(path)?;
            sink.write_report(match_id, &report)?;
            sink.finish()?;
            eprintln!("💾 Output written to: {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn cmd_resolve(document_path: &Path, raw: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = FieldPath::parse(raw)?;
    let document = load_document(document_path)?;

    match path.lookup(&document) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(value)?),
        Err(failure) => {
            eprintln!("❌ {}", failure);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn cmd_mappings(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mappings = load_mappings(path)?;
    println!("{}", mappings.to_json()?);
    Ok(())
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", matchrecon::operations_description());
    Ok(())
}

async fn cmd_serve(port: u16, mappings: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mappings = load_mappings(mappings)?;
    matchrecon::server::start_server(port, mappings).await
}

fn load_mappings(path: Option<&Path>) -> Result<MappingConfig, Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            let mappings = MappingConfig::from_file(p)?;
            eprintln!(
                "🗺️  Mappings: {} ({} match, {} roster)",
                p.display(),
                mappings.match_fields.len(),
                mappings.roster_fields.len()
            );
            Ok(mappings)
        }
        None => Ok(MappingConfig::builtin()),
    }
}

/// `exports/5034295.csv` → 5034295.
fn match_id_from_path(path: &Path) -> Option<i64> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.trim().parse().ok())
}
