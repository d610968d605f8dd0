//! Sift CLI - compile request parameters to SQL or a search body
//!
//! Usage:
//!   sift compile --schema <models.toml> --entity <name> [--backend sql|document] [--dialect <dialect>] <params>
//!   sift check --schema <models.toml>
//!
//! Examples:
//!   sift compile --schema models.toml --entity Model '{"name__startswith": "a", "order": "-id"}'
//!   sift compile --schema models.toml --entity Model --dialect tsql '{"totals": ["count"]}'
//!   sift compile --schema models.toml --entity Model --backend document '{"other_models__name": "x"}'
//!
//! Logging goes to stderr and is filtered by `SIFT_LOG` (e.g. `SIFT_LOG=sift=debug`).

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use sift::compile::{CompileOptions, Compiler};
use sift::config::Settings;
use sift::schema::SchemaRegistry;
use sift::sql::Dialect;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Sift - compiles URL-style filter parameters to SQL or search queries")]
#[command(version)]
struct Cli {
    /// Path to a sift.toml (defaults to SIFT_CONFIG, then ./sift.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile request parameters for one entity
    Compile {
        /// Path to the schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// Entity the parameters filter
        #[arg(short, long)]
        entity: String,

        /// Query backend
        #[arg(short, long, default_value = "sql")]
        backend: BackendArg,

        /// SQL dialect to generate (defaults to the configured dialect)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Request parameters as a JSON object
        #[arg(default_value = "{}")]
        params: String,
    },

    /// Validate a schema file
    Check {
        /// Path to the schema file
        #[arg(short, long)]
        schema: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum BackendArg {
    Sql,
    Document,
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Postgres,
    Duckdb,
    Mysql,
    Tsql,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Duckdb => Dialect::DuckDb,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Tsql => Dialect::TSql,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Compile {
            schema,
            entity,
            backend,
            dialect,
            params,
        } => cmd_compile(cli.config, schema, &entity, backend, dialect, &params),
        Commands::Check { schema } => cmd_check(schema),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SIFT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_settings(config: Option<PathBuf>) -> Result<Settings, String> {
    let settings = match config {
        Some(path) => Settings::from_file(&path),
        None => Settings::load(),
    };
    settings.map_err(|e| format!("Error loading settings: {}", e))
}

fn load_schema(schema: &PathBuf) -> Result<SchemaRegistry, String> {
    SchemaRegistry::from_file(schema)
        .map_err(|e| format!("Error loading schema '{}': {}", schema.display(), e))
}

fn cmd_compile(
    config: Option<PathBuf>,
    schema: PathBuf,
    entity: &str,
    backend: BackendArg,
    dialect: Option<DialectArg>,
    params: &str,
) -> ExitCode {
    let setup = load_settings(config).and_then(|settings| Ok((settings, load_schema(&schema)?)));
    let (settings, registry) = match setup {
        Ok(loaded) => loaded,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let params = match serde_json::from_str::<Value>(params) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            eprintln!("Parameters must be a JSON object, got: {}", other);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error parsing parameters: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let compiler = Compiler::new(registry, settings);
    let result = match backend {
        BackendArg::Sql => {
            let mut options = CompileOptions::default();
            if let Some(dialect) = dialect {
                options = options.with_dialect(dialect.into());
            }
            compiler
                .compile_relational(entity, &params, &options)
                .map(|output| {
                    let mut text = output.sql();
                    if let Some(totals) = output.totals_sql() {
                        text.push_str(";\n\n-- totals\n");
                        text.push_str(&totals);
                    }
                    text
                })
        }
        BackendArg::Document => compiler.compile_document(entity, &params).map(|output| {
            serde_json::to_string_pretty(&output.to_value()).unwrap_or_default()
        }),
    };

    match result {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_check(schema: PathBuf) -> ExitCode {
    match load_schema(&schema) {
        Ok(registry) => {
            println!("OK: {} is valid", schema.display());
            for name in registry.names() {
                println!("  - {}", name);
            }
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}
