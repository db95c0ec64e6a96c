//! Command-line interface for objmap.

mod descriptors;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use objmap_core::config::{env_vars, parse_flag};
use objmap_core::{
    CollectingDiagnostics, DiagnosticsSink, DynamicObject, EngineConfig, MappingEngine, Method, Request, Response,
    TracingDiagnostics,
};
use serde_json::Value;

use crate::descriptors::DescriptorFile;

/// objmap - Map JSON API payloads with declarative descriptors.
#[derive(Parser, Debug)]
#[command(name = "objmap")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Arguments shared by every command.
#[derive(clap::Args, Debug)]
struct Route {
    /// Descriptor configuration file (JSON).
    #[arg(short, long)]
    descriptors: PathBuf,
    /// Request method.
    #[arg(short, long, default_value = "GET")]
    method: Method,
    /// Request path, e.g. /users/42.
    path: String,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether any descriptor maps the request.
    Check {
        #[command(flatten)]
        route: Route,
    },
    /// Map a response payload and print the mapped objects.
    Map {
        #[command(flatten)]
        route: Route,
        /// Response payload file (JSON).
        #[arg(short, long)]
        payload: PathBuf,
        /// Print mapping warnings to stderr.
        #[arg(short, long)]
        warnings: bool,
    },
    /// Serialize an object into a request payload.
    Serialize {
        #[command(flatten)]
        route: Route,
        /// Object file (JSON). Its `type` key names the object type.
        #[arg(short, long)]
        object: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Check { route } => run_check(&route),
        Command::Map {
            route,
            payload,
            warnings,
        } => run_map(&route, &payload, warnings).await,
        Command::Serialize { route, object } => run_serialize(&route, &object),
    }
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(false);

    let default_level = if verbose { "objmap=debug" } else { "objmap=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level).add_directive(tracing::Level::WARN.into()));

    // Logs go to stderr; stdout carries command output.
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

fn build_engine(route: &Route, diagnostics: Arc<dyn DiagnosticsSink>) -> Result<MappingEngine> {
    let registry = DescriptorFile::load(&route.descriptors)?.into_registry()?;
    tracing::debug!(descriptors = registry.len(), "Descriptors loaded");
    Ok(MappingEngine::new(Arc::new(registry))
        .with_diagnostics(diagnostics)
        .with_config(EngineConfig::from_env()))
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print whether the request is mappable.
fn run_check(route: &Route) -> Result<()> {
    let engine = build_engine(route, Arc::new(TracingDiagnostics))?;
    let request = Request::new(route.method, route.path.as_str());
    request.validate()?;

    if engine.can_map_request_response(&request) {
        println!("mappable");
    } else {
        println!("unmapped");
    }
    Ok(())
}

/// Map a payload file and print the flat result.
async fn run_map(route: &Route, payload: &Path, warnings: bool) -> Result<()> {
    let sink = Arc::new(CollectingDiagnostics::new());
    let diagnostics: Arc<dyn DiagnosticsSink> = if warnings {
        sink.clone()
    } else {
        Arc::new(TracingDiagnostics)
    };
    let engine = build_engine(route, diagnostics)?;

    let response = Response::new(read_json(payload)?);
    let request = Request::new(route.method, route.path.as_str());
    let result = engine
        .map_response(&response, &request)
        .await
        .with_context(|| format!("Failed to map {} {}", route.method, route.path))?;

    print_json(&result.to_json())?;
    for warning in sink.take() {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

/// Serialize an object file into a request payload.
fn run_serialize(route: &Route, object: &Path) -> Result<()> {
    let engine = build_engine(route, Arc::new(TracingDiagnostics))?;

    let value = read_json(object)?;
    let Value::Object(mut fields) = value else {
        anyhow::bail!("Object file {} must contain a JSON object", object.display());
    };
    let type_name = match fields.remove("type") {
        Some(Value::String(name)) => name,
        _ => anyhow::bail!("Object file {} needs a string \"type\" key", object.display()),
    };

    let object = DynamicObject::from_json(type_name, &fields);
    print_json(&Value::Object(engine.map_object(&object, &route.path, route.method)))
}
