use anyhow::{bail, Context};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clinic_etl::logging::{init_logging, DEFAULT_LOG_FILE};
use clinic_etl::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "clinetl")]
#[command(about = "Clinic ETL - clean doctor and appointment exports and load them into a database", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Also write logs to a file
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = DEFAULT_LOG_FILE)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean both files, reconcile them and load the result
    Run(RunArgs),
    /// Clean a single file and write it as CSV or JSON
    Clean(CleanArgs),
    /// Print the expected raw columns and the table DDL
    Schema(SchemaArgs),
    /// Answer business questions over cleaned files
    Report(ReportArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Raw doctors CSV (overrides DOCTORS_INPUT)
    #[arg(long)]
    doctors: Option<PathBuf>,
    /// Raw appointments CSV (overrides APPOINTMENTS_INPUT)
    #[arg(long)]
    appointments: Option<PathBuf>,
    /// Output directory (overrides OUTPUT_DIR)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Where cleaned rows are loaded
    #[arg(long, value_enum, default_value_t = SinkOpt::Sql)]
    sink: SinkOpt,
    /// SQL dialect of the generated script
    #[arg(long, value_enum)]
    dialect: Option<DialectOpt>,
    /// Drop appointments whose booking date did not parse
    #[arg(long)]
    reject_null_booking_date: bool,
    /// Store missing statuses as null rather than `nan`
    #[arg(long)]
    keep_null_status: bool,
    /// Also write the cleaned tables as CSV files
    #[arg(long)]
    write_csv: bool,
}

#[derive(Args)]
struct CleanArgs {
    /// Which entity the input holds
    #[arg(long, value_enum)]
    entity: EntityOpt,
    /// Raw input CSV
    #[arg(short, long)]
    input: PathBuf,
    /// Output file
    #[arg(short, long)]
    output: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = FileFormatOpt::Csv)]
    format: FileFormatOpt,
    /// Drop appointments whose booking date did not parse
    #[arg(long)]
    reject_null_booking_date: bool,
    /// Store missing statuses as null rather than `nan`
    #[arg(long)]
    keep_null_status: bool,
}

#[derive(Args)]
struct SchemaArgs {
    /// Only print this entity
    #[arg(long, value_enum)]
    entity: Option<EntityOpt>,
    #[arg(long, value_enum, default_value_t = DialectOpt::Postgresql)]
    dialect: DialectOpt,
}

#[derive(Args)]
struct ReportArgs {
    /// Cleaned doctors CSV
    #[arg(long)]
    doctors: PathBuf,
    /// Cleaned appointments CSV
    #[arg(long)]
    appointments: PathBuf,
    /// Patient whose confirmed appointments are counted
    #[arg(long, default_value_t = 34)]
    patient: i64,
    /// First day of the cancellation window (YYYY-MM-DD)
    #[arg(long, default_value = "2025-10-21")]
    cancelled_from: NaiveDate,
    /// Last day of the cancellation window, inclusive (YYYY-MM-DD)
    #[arg(long, default_value = "2025-10-24")]
    cancelled_to: NaiveDate,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum EntityOpt {
    Doctors,
    Appointments,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FileFormatOpt {
    Csv,
    Json,
    Jsonl,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum SinkOpt {
    Sql,
    Sqlite,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum DialectOpt {
    Postgresql,
    Sqlite,
}

impl From<DialectOpt> for SqlDialect {
    fn from(opt: DialectOpt) -> Self {
        match opt {
            DialectOpt::Postgresql => SqlDialect::PostgreSQL,
            DialectOpt::Sqlite => SqlDialect::SQLite,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let _guard = match init_logging(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run(args) => cmd_run(cli.config.as_deref(), args),
        Commands::Clean(args) => cmd_clean(args),
        Commands::Schema(args) => {
            cmd_schema(args);
            Ok(())
        }
        Commands::Report(args) => cmd_report(args),
    };

    if let Err(e) = result {
        match e.downcast_ref::<EtlError>() {
            Some(etl) => eprintln!("Error: {}", etl.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EtlConfig> {
    let config = match path {
        Some(path) => EtlConfig::load_with_file(path),
        None => EtlConfig::load(),
    };
    config.context("Failed to load configuration")
}

fn cmd_run(config_path: Option<&Path>, args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(path) = args.doctors {
        config.doctors_input = path;
    }
    if let Some(path) = args.appointments {
        config.appointments_input = path;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(dialect) = args.dialect {
        config.sql_dialect = dialect.into();
    }
    config.reject_null_booking_date |= args.reject_null_booking_date;
    config.keep_null_status |= args.keep_null_status;

    config.validate_paths()?;
    let run = EtlRunBuilder::from_config(&config).build()?;

    let outcome = match args.sink {
        SinkOpt::Sql => {
            let script = config.sql_script_path();
            let sink = SqlScriptSink::new(&script).with_dialect(config.sql_dialect);
            let outcome = run.execute(&sink)?;
            println!("SQL script written to {}", script.display());
            outcome
        }
        SinkOpt::Sqlite => run_sqlite(&run, &config)?,
    };

    if args.write_csv {
        let sink = CsvSink::new();
        if let Some(doctors) = &outcome.doctors {
            sink.write(doctors, &Destination::file(config.output_dir.join("doctors_clean.csv")))?;
        }
        if let Some(appointments) = &outcome.appointments {
            sink.write(appointments, &Destination::file(config.output_dir.join("appointments_clean.csv")))?;
        }
    }

    println!(
        "Loaded {} doctors and {} appointments",
        outcome.doctor_rows(),
        outcome.appointment_rows()
    );

    for (entity, error) in &outcome.errors {
        eprintln!("{} ETL failed: {}", entity, error.user_message());
    }
    if !outcome.is_success() {
        bail!("{} of 2 entities failed", outcome.errors.len());
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
fn run_sqlite(run: &EtlRun<'_>, config: &EtlConfig) -> anyhow::Result<EtlOutcome> {
    let db = config.sqlite_path();
    let outcome = run.execute(&SqliteSink::new(&db))?;
    println!("SQLite database updated at {}", db.display());
    Ok(outcome)
}

#[cfg(not(feature = "sqlite"))]
fn run_sqlite(_run: &EtlRun<'_>, _config: &EtlConfig) -> anyhow::Result<EtlOutcome> {
    bail!("SQLite support is not compiled in; rebuild with --features sqlite or use --sink sql")
}

fn cmd_clean(args: CleanArgs) -> anyhow::Result<()> {
    let sink: Box<dyn TableSink> = match args.format {
        FileFormatOpt::Csv => Box::new(CsvSink::new()),
        FileFormatOpt::Json => Box::new(JsonSink::new()),
        FileFormatOpt::Jsonl => Box::new(JsonSink::new().as_json_lines()),
    };
    let reader = TableReader::new();
    let destination = Destination::file(&args.output);
    let events = TracingEventSink;

    let table = match args.entity {
        EntityOpt::Doctors => clinic_etl::etl::clean_with_sink(
            &DoctorPipeline, &reader, &args.input, sink.as_ref(), &destination, &events,
        ),
        EntityOpt::Appointments => {
            let pipeline = AppointmentPipeline::default()
                .with_reject_null_booking_date(args.reject_null_booking_date)
                .with_keep_null_status(args.keep_null_status);
            clinic_etl::etl::clean_with_sink(
                &pipeline, &reader, &args.input, sink.as_ref(), &destination, &events,
            )
        }
    }
    .with_context(|| format!("Failed to clean {}", args.input.display()))?;

    println!("Wrote {} rows to {}", table.len(), args.output.display());
    Ok(())
}

fn cmd_schema(args: SchemaArgs) {
    let dialect = SqlDialect::from(args.dialect);
    if args.entity != Some(EntityOpt::Appointments) {
        print_schema::<DoctorSchema>(dialect);
    }
    if args.entity != Some(EntityOpt::Doctors) {
        print_schema::<AppointmentSchema>(dialect);
    }
}

fn print_schema<S: TableSchema>(dialect: SqlDialect) {
    println!("== {} ==", S::ENTITY);
    println!("Raw columns: {}", S::column_names().join(","));
    println!("{}\n", S::create_table_sql(dialect));
}

fn cmd_report(args: ReportArgs) -> anyhow::Result<()> {
    let reader = TableReader::new();
    let doctors_table = reader.load(&args.doctors).context("Failed to load cleaned doctors")?;
    let appointments_table = reader.load(&args.appointments).context("Failed to load cleaned appointments")?;

    let doctors = Doctor::from_table(&doctors_table)?;
    let appointments = Appointment::from_table(&appointments_table)?;
    let report = AppointmentReport::new(&doctors, &appointments);

    let start = day_start(args.cancelled_from);
    let end = day_end(args.cancelled_to);
    let top = report.top_confirmed_doctor();
    let patient_confirmed = report.confirmed_for_patient(args.patient);
    let cancelled = report.cancelled_between(start, end);
    let per_doctor = report.confirmed_per_doctor();

    if args.json {
        let value = serde_json::json!({
            "top_confirmed_doctor": top,
            "patient": args.patient,
            "patient_confirmed": patient_confirmed,
            "cancelled_from": start,
            "cancelled_to": end,
            "cancelled": cancelled,
            "confirmed_per_doctor": per_doctor,
            "stats": report.stats(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("--- Business Question Results ---");
    println!("\n1. Doctor with most confirmed appointments");
    match top {
        Some(top) => println!("{} | {}", top.name, top.confirmed),
        None => println!("(no confirmed appointments)"),
    }
    println!("\n2. Confirmed appointments for patient {}", args.patient);
    println!("{}", patient_confirmed);
    println!("\n3. Cancelled appointments between {} and {}", args.cancelled_from, args.cancelled_to);
    println!("{}", cancelled);
    println!("\n4. Total confirmed appointments per doctor");
    for count in &per_doctor {
        println!("{} | {}", count.name, count.confirmed);
    }
    println!();
    report.stats().print_summary();
    Ok(())
}

fn day_start(day: NaiveDate) -> NaiveDateTime {
    day.and_time(chrono::NaiveTime::MIN)
}

fn day_end(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(23, 59, 59).unwrap_or_else(|| day_start(day))
}
