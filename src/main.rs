/// Version injected at compile time via GCP_BLAST_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("GCP_BLAST_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gcp_blast::config::Config;
use gcp_blast::gcp::client::GcpClient;
use gcp_blast::gcp::http::format_gcp_error;
use gcp_blast::resource::{
    fetch_collection, fetch_item, fetch_offerable, validate, AdapterMeta, BlastMap, Catalog,
    CatalogBuilder, Direction, EdgeRef, Propagation, ScopeParams, SchemaSnapshot, Severity,
    TerraformMapping,
};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Access token used instead of Application Default Credentials when set
const TOKEN_ENV: &str = "GCP_BLAST_ACCESS_TOKEN";

/// Resource-type catalog and blast-radius explorer for GCP
#[derive(Parser, Debug)]
#[command(name = "gcp-blast", version, about, long_about = None)]
struct Args {
    /// GCP project to use
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Region for regional resource types
    #[arg(short, long, global = true)]
    region: Option<String>,

    /// Zone or location for location-scoped resource types
    #[arg(short, long, global = true)]
    location: Option<String>,

    /// Directory of extra declaration files layered over the built-in ones
    #[arg(long, global = true)]
    declarations: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered resource types
    Types {
        /// Include types still in development
        #[arg(long)]
        all: bool,
    },
    /// Show everything declared for one type
    Describe { type_id: String },
    /// Resolve an endpoint URL without calling it
    Url {
        type_id: String,
        #[arg(value_enum)]
        operation: OperationArg,
        /// Composite query, parts separated by `|`
        query: Option<String>,
    },
    /// Show blast propagation edges
    Edges {
        type_id: String,
        /// Only the edge declared at this field path
        #[arg(long)]
        field: Option<String>,
        #[arg(long, value_enum, default_value = "out")]
        direction: DirectionArg,
        /// Edges other types declare against this one
        #[arg(long)]
        into: bool,
    },
    /// Type-level blast radius
    Blast {
        type_id: String,
        /// What could affect the type, instead of what it affects
        #[arg(long)]
        upstream: bool,
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// References found in a saved resource body
    Links { type_id: String, body: PathBuf },
    /// Check the catalog for consistency
    Validate {
        /// Directory of `<type-id>.json` sample responses
        #[arg(long)]
        schema_dir: Option<PathBuf>,
    },
    /// Fetch one resource
    Get { type_id: String, query: String },
    /// Enumerate one type (List, or Search scoped by the anchor)
    List { type_id: String, anchor: Option<String> },
    /// Enumerate every offerable type in the current scope
    Discover { anchor: Option<String> },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OperationArg {
    Get,
    List,
    Search,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    In,
    Out,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::In => Direction::In,
            DirectionArg::Out => Direction::Out,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Logging disabled, cannot open {}: {}", log_path.display(), e);
            return None;
        },
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gcp-blast {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    Config::app_dir()
        .map(|dir| dir.join("gcp-blast.log"))
        .unwrap_or_else(|| PathBuf::from("gcp-blast.log"))
}

fn load_catalog(declarations: Option<&Path>) -> Result<Catalog> {
    let mut builder = CatalogBuilder::builtin().context("Embedded declarations are invalid")?;
    if let Some(dir) = declarations {
        builder.load_dir(dir)?;
    }
    Ok(builder.build())
}

async fn connect() -> Result<GcpClient> {
    match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.is_empty() => {
            tracing::info!("Using access token from {}", TOKEN_ENV);
            GcpClient::with_static_token(token)
        },
        _ => GcpClient::new().await,
    }
}

/// Log the full error, hand the user the sanitized one
fn api_error(error: anyhow::Error) -> anyhow::Error {
    tracing::error!("{:#}", error);
    anyhow::anyhow!(format_gcp_error(&error))
}

fn print_output<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let rendered = text(value);
            if !rendered.is_empty() {
                println!("{}", rendered.trim_end());
            }
        },
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn render_edges(edges: &[EdgeRef<'_>]) -> String {
    edges
        .iter()
        .map(|edge| {
            let p = edge.impact.propagation;
            let flags = match (p.inbound, p.outbound) {
                (true, true) => "in,out",
                (true, false) => "in",
                (false, true) => "out",
                (false, false) => "-",
            };
            let lifecycle = if edge.impact.parent_child { " parent/child" } else { "" };
            format!(
                "{}.{} -> {} [{}]{}\n",
                edge.source, edge.field_path, edge.impact.target, flags, lifecycle
            )
        })
        .collect()
}

#[derive(Serialize)]
struct Description<'a> {
    #[serde(flatten)]
    meta: &'a AdapterMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    blast_propagation: Option<&'a BlastMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    terraform: Option<&'a TerraformMapping>,
    referenced_by: Vec<EdgeRef<'a>>,
}

fn render_description(d: &Description<'_>) -> String {
    let meta = d.meta;
    let mut out = format!("{}\n", meta.type_id);
    out.push_str(&format!("  category:    {:?}\n", meta.category));
    out.push_str(&format!("  scope:       {}\n", meta.scope));
    out.push_str(&format!("  unique keys: {}\n", meta.unique_attribute_keys.join(", ")));
    for (name, template) in [("get", &meta.get), ("list", &meta.list), ("search", &meta.search)] {
        if let Some(template) = template {
            out.push_str(&format!("  {:<12} {}\n", format!("{}:", name), template));
        }
    }
    if meta.in_development {
        out.push_str("  in development\n");
    }
    if !meta.iam_permissions.is_empty() {
        let permissions: Vec<&str> = meta.iam_permissions.iter().map(String::as_str).collect();
        out.push_str(&format!("  permissions: {}\n", permissions.join(", ")));
    }
    if let Some(role) = &meta.predefined_role {
        out.push_str(&format!("  role:        {}\n", role));
    }
    if let Some(terraform) = d.terraform {
        for lookup in &terraform.mappings {
            out.push_str(&format!("  terraform:   {} {}\n", lookup.method, lookup.query));
        }
        if !terraform.description.is_empty() {
            out.push_str(&format!("  terraform:   {}\n", terraform.description));
        }
    }
    if let Some(edges) = d.blast_propagation.filter(|m| !m.is_empty()) {
        out.push_str("  edges:\n");
        for (field, impact) in edges {
            out.push_str(&format!(
                "    {} -> {} (in: {}, out: {})\n",
                field, impact.target, impact.propagation.inbound, impact.propagation.outbound
            ));
        }
    }
    if !d.referenced_by.is_empty() {
        out.push_str("  referenced by:\n");
        for edge in &d.referenced_by {
            out.push_str(&format!("    {}.{}\n", edge.source, edge.field_path));
        }
    }
    out
}

/// Best display name for a fetched item
fn item_name(meta: &AdapterMeta, item: &Value) -> String {
    meta.unique_attribute_value(item)
        .or_else(|| item.get("name").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "-".to_string())
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load();
    let declarations = args.declarations.clone().or_else(|| config.declarations_dir.clone());
    let catalog = load_catalog(declarations.as_deref())?;
    let params: ScopeParams = config.scope_params(
        args.project.as_deref(),
        args.region.as_deref(),
        args.location.as_deref(),
    );
    tracing::debug!("Scope: {:?}", params);

    let format = args.output;

    match args.command {
        Command::Types { all } => {
            let rows: Vec<&AdapterMeta> = catalog
                .adapters()
                .types()
                .into_iter()
                .filter(|t| all || catalog.adapters().is_offerable(t.as_str()))
                .filter_map(|t| catalog.adapters().lookup(t.as_str()))
                .collect();
            print_output(format, &rows, |rows| {
                rows.iter()
                    .map(|meta| {
                        let flag = if meta.in_development { "  (in development)" } else { "" };
                        format!("{:<40} {:<10} {:?}{}\n", meta.type_id.as_str(), meta.scope.as_str(), meta.category, flag)
                    })
                    .collect()
            })
        },

        Command::Describe { type_id } => {
            let graph = catalog.graph();
            let mut referenced_by = graph.edges_into(&type_id, Direction::In);
            for edge in graph.edges_into(&type_id, Direction::Out) {
                if !referenced_by.contains(&edge) {
                    referenced_by.push(edge);
                }
            }
            let description = Description {
                meta: catalog.lookup(&type_id)?,
                blast_propagation: graph.lookup(&type_id),
                terraform: catalog.terraform().lookup(&type_id),
                referenced_by,
            };
            print_output(format, &description, render_description)
        },

        Command::Url {
            type_id,
            operation,
            query,
        } => {
            let bound = catalog.bind(&type_id, &params)?;
            let query = query.unwrap_or_default();
            let url = match operation {
                OperationArg::Get => bound.get_url(&query)?,
                OperationArg::List => bound.list_url()?,
                OperationArg::Search => bound.search_url(&query)?,
            };
            print_output(format, &url, |url| url.clone())
        },

        Command::Edges {
            type_id,
            field,
            direction,
            into,
        } => {
            catalog.lookup(&type_id)?;
            let direction = Direction::from(direction);
            let graph = catalog.graph();
            let edges = match (&field, into) {
                (Some(field), _) => graph.expand(&type_id, field, direction),
                (None, false) => graph.edges_from(&type_id, direction),
                (None, true) => graph.edges_into(&type_id, direction),
            };
            print_output(format, &edges, |edges| render_edges(edges))
        },

        Command::Blast {
            type_id,
            upstream,
            max_depth,
        } => {
            let propagation = if upstream {
                Propagation::Upstream
            } else {
                Propagation::Downstream
            };
            let radius = catalog.blast_radius(&type_id, propagation, max_depth)?;
            print_output(format, &radius, |radius| {
                let mut out = format!("{} ({:?}): {} types\n", radius.origin, radius.propagation, radius.types.len());
                for hop in &radius.hops {
                    let arrow = if hop.reversed { "<-" } else { "->" };
                    out.push_str(&format!(
                        "{}{} {} {}.{} {}\n",
                        "  ".repeat(hop.depth),
                        hop.to,
                        arrow,
                        hop.declared_by,
                        hop.field_path,
                        if hop.parent_child { "(parent/child)" } else { "" }
                    ));
                }
                if radius.truncated {
                    out.push_str("  ... truncated at max depth\n");
                }
                out
            })
        },

        Command::Links { type_id, body } => {
            catalog.lookup(&type_id)?;
            let content = std::fs::read_to_string(&body)
                .with_context(|| format!("Failed to read {}", body.display()))?;
            let body: Value = serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", body.display()))?;
            let links = catalog.linked_queries(&type_id, &body);
            print_output(format, &links, |links| {
                links
                    .iter()
                    .map(|link| {
                        format!(
                            "{} -> {} {}\n",
                            link.field_path,
                            link.target,
                            link.query.as_deref().unwrap_or(&link.value)
                        )
                    })
                    .collect()
            })
        },

        Command::Validate { schema_dir } => {
            let schema = schema_dir.as_deref().map(SchemaSnapshot::from_dir).transpose()?;
            let findings = validate(&catalog, schema.as_ref());
            print_output(format, &findings, |findings| {
                findings.iter().map(|f| format!("{}\n", f)).collect()
            })?;

            let errors = findings.iter().filter(|f| f.severity == Severity::Error).count();
            if errors > 0 {
                anyhow::bail!("{} catalog error(s)", errors);
            }
            Ok(())
        },

        Command::Get { type_id, query } => {
            let bound = catalog.bind(&type_id, &params)?;
            let client = connect().await?;
            let item = fetch_item(&client, &bound, &query).await.map_err(api_error)?;
            print_output(format, &item, |item| {
                serde_json::to_string_pretty(item).unwrap_or_default()
            })
        },

        Command::List { type_id, anchor } => {
            let meta = catalog.lookup(&type_id)?;
            let bound = catalog.bind(&type_id, &params)?;
            let client = connect().await?;
            let collection = fetch_collection(&client, &bound, anchor.as_deref())
                .await
                .map_err(api_error)?;
            print_output(format, &collection, |collection| {
                collection
                    .items
                    .iter()
                    .map(|item| format!("{}\n", item_name(meta, item)))
                    .collect()
            })
        },

        Command::Discover { anchor } => {
            let client = connect().await?;
            let collections = fetch_offerable(&client, &catalog, &params, anchor.as_deref()).await;
            print_output(format, &collections, |collections| {
                collections
                    .iter()
                    .map(|c| format!("{:<40} {:>6} ({})\n", c.type_id.as_str(), c.items.len(), c.operation))
                    .collect()
            })
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }

    Ok(())
}
