//! Stitch CLI
//!
//! Command-line interface for checking schema bundles and running queries
//! against them.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use stitch_gateway::{
    load_bundle_auto, load_json, Gateway, GatewayOptions, Request, SchemaBundle,
    StaticPolicyEvaluator,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stitch")]
#[command(about = "Assemble directive-annotated GraphQL schema bundles and query them")]
#[command(version)]
struct Cli {
    /// Log filter used when RUST_LOG is not set (e.g. info, stitch_gateway=debug)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a bundle and report whether it is valid
    Check {
        /// Bundle source: file path or URL (http:// or https://)
        bundle: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Print the assembled schema as SDL
    Print {
        /// Bundle source: file path or URL (http:// or https://)
        bundle: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Execute a query against an assembled bundle
    Query {
        /// Bundle source: file path or URL (http:// or https://)
        bundle: String,

        /// Query text, or @path to read it from a file
        #[arg(long, short)]
        query: String,

        /// Variables as a JSON object, or @path to read them from a file
        #[arg(long)]
        variables: Option<String>,

        /// Operation to run when the document has several
        #[arg(long)]
        operation_name: Option<String>,

        /// JSON policy table: {"namespace": {"name": true|false}}
        #[arg(long)]
        policies: Option<PathBuf>,

        /// Abort the query after this many seconds (0 disables the limit)
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Check { bundle, json } => run_check(&bundle, json).await,
        Commands::Print { bundle, output } => run_print(&bundle, output).await,
        Commands::Query {
            bundle,
            query,
            variables,
            operation_name,
            policies,
            timeout_secs,
            pretty,
        } => {
            run_query(QueryArgs {
                bundle,
                query,
                variables,
                operation_name,
                policies,
                timeout_secs,
                pretty,
            })
            .await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

async fn fetch_bundle(source: &str) -> Result<SchemaBundle, u8> {
    load_bundle_auto(source).await.map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn gateway_without_policies(options: GatewayOptions) -> Gateway {
    Gateway::new(Arc::new(StaticPolicyEvaluator::new()), options)
}

async fn run_check(source: &str, json_output: bool) -> Result<(), u8> {
    let bundle = match load_bundle_auto(source).await {
        Ok(bundle) => bundle,
        Err(e) => {
            report_error(json_output, &e.to_string());
            return Err(e.exit_code() as u8);
        }
    };

    let gateway = gateway_without_policies(GatewayOptions::new());
    match gateway.apply_bundle(&bundle) {
        Ok(_) => {
            if json_output {
                let output = serde_json::json!({ "valid": true, "etag": bundle.etag });
                println!("{}", output);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

async fn run_print(source: &str, output: Option<PathBuf>) -> Result<(), u8> {
    let bundle = fetch_bundle(source).await?;

    let gateway = gateway_without_policies(GatewayOptions::new());
    gateway.apply_bundle(&bundle).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let sdl = gateway.current().map(|schema| schema.sdl()).unwrap_or_default();

    match output {
        Some(path) => {
            std::fs::write(&path, &sdl).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            print!("{}", sdl);
        }
    }

    Ok(())
}

struct QueryArgs {
    bundle: String,
    query: String,
    variables: Option<String>,
    operation_name: Option<String>,
    policies: Option<PathBuf>,
    timeout_secs: u64,
    pretty: bool,
}

async fn run_query(args: QueryArgs) -> Result<(), u8> {
    let QueryArgs {
        bundle,
        query,
        variables,
        operation_name,
        policies,
        timeout_secs,
        pretty,
    } = args;

    let bundle = fetch_bundle(&bundle).await?;

    let evaluator = match policies {
        Some(path) => {
            let table = load_json(&path).map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
            StaticPolicyEvaluator::from_json(&table).map_err(|e| {
                eprintln!("Error: invalid policy table {}: {}", path.display(), e);
                2u8
            })?
        }
        None => StaticPolicyEvaluator::new(),
    };

    let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
    let gateway = Gateway::new(
        Arc::new(evaluator),
        GatewayOptions::new().request_timeout(timeout),
    );
    gateway.apply_bundle(&bundle).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let mut request = Request::new(read_arg(&query)?);
    if let Some(name) = operation_name {
        request = request.operation_name(name);
    }
    if let Some(variables) = variables {
        request = request.variables(parse_variables(&read_arg(&variables)?)?);
    }

    let response = gateway.execute(&request).await;

    let json_output = if pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", json_output);

    if response.is_ok() {
        Ok(())
    } else {
        Err(1)
    }
}

/// Inline text, or the contents of the file named after a leading `@`.
fn read_arg(value: &str) -> Result<String, u8> {
    match value.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path)).map_err(|e| {
            eprintln!("Error: cannot read {}: {}", path, e);
            3u8
        }),
        None => Ok(value.to_string()),
    }
}

fn parse_variables(text: &str) -> Result<Map<String, Value>, u8> {
    match serde_json::from_str(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            eprintln!("Error: variables must be a JSON object");
            Err(2)
        }
        Err(e) => {
            eprintln!("Error: invalid variables: {}", e);
            Err(2)
        }
    }
}
