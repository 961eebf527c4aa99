//! db-enricher CLI - Generate schema comments from database metadata
//!
//! Usage:
//!   db-enricher [connection flags] add-comments [--tables ..] [--enrichments ..] [--context ..]
//!   db-enricher [connection flags] get-comments [--format text|json]
//!   db-enricher [connection flags] delete-comments [--tables ..]
//!   db-enricher [connection flags] apply-comments --in-file <file.sql>
//!
//! Examples:
//!   db-enricher --dialect postgres --host localhost --database shop add-comments
//!   db-enricher --url mysql://app@localhost/shop add-comments --tables "orders[id,status],users"
//!   db-enricher --connection warehouse --dry-run false delete-comments

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use db_enricher::cancel::CancelToken;
use db_enricher::comment::{Enrichment, EnrichmentSet, UpdateMode};
use db_enricher::config::{ConnectionConfig, ConnectionTarget, Driver, Settings};
use db_enricher::dialect::connect;
use db_enricher::enricher::{
    format_comments_json, format_comments_text, CollectorOptions, MetadataCollector,
};
use db_enricher::files::{self, OutputKind};
use db_enricher::genai::{GeminiClient, LlmClient};
use db_enricher::metadata::TableFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "db-enricher")]
#[command(about = "Enrich database schemas with generated column and table comments")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to a db-enricher.toml settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Named connection from the settings file
    #[arg(long, global = true)]
    connection: Option<String>,

    /// Database dialect (postgres, mysql, sqlserver)
    #[arg(long, global = true)]
    dialect: Option<String>,

    /// Full connection URL
    #[arg(long, global = true)]
    url: Option<String>,

    #[arg(long, global = true)]
    host: Option<String>,

    #[arg(long, global = true)]
    port: Option<u16>,

    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true, env = "DB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, global = true)]
    database: Option<String>,

    /// Schema to enrich (Postgres default: public, SQL Server default: dbo)
    #[arg(long, global = true)]
    schema: Option<String>,

    /// Only write the output file; never touch the database
    #[arg(long, global = true, default_value_t = true, action = ArgAction::Set)]
    dry_run: bool,

    /// How to treat existing generated text: overwrite or append
    #[arg(long, global = true, alias = "update_existing")]
    update_existing: Option<String>,

    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Maximum number of concurrent table/column tasks
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate SQL adding metadata comments to tables and columns
    AddComments {
        /// Output file (defaults to <database>_comments.sql)
        #[arg(short, long, alias = "out_file")]
        out_file: Option<PathBuf>,

        /// Tables and columns to include, e.g. "orders[id,status],users"
        #[arg(long)]
        tables: Option<String>,

        /// Enrichments to include, e.g. "examples,null_count" (default: all)
        #[arg(long)]
        enrichments: Option<String>,

        /// Comma-separated context files used for descriptions
        #[arg(long)]
        context: Option<String>,

        /// Gemini model for descriptions
        #[arg(long)]
        model: Option<String>,
    },

    /// Read existing table and column comments
    GetComments {
        /// Output file (defaults to <database>_comments.txt)
        #[arg(short, long, alias = "out_file")]
        out_file: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "text")]
        format: CommentFormat,
    },

    /// Generate SQL removing generated text from comments
    DeleteComments {
        /// Output file (defaults to <database>_comments.sql)
        #[arg(short, long, alias = "out_file")]
        out_file: Option<PathBuf>,

        /// Tables and columns to include, e.g. "orders[id,status],users"
        #[arg(long)]
        tables: Option<String>,
    },

    /// Execute a previously generated (and possibly edited) SQL file
    ApplyComments {
        #[arg(long)]
        in_file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CommentFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let global = cli.global;
    let settings = match &global.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };
    let target = resolve_target(&global, &settings)?;
    let database = target
        .database_name()
        .or_else(|| global.database.clone())
        .unwrap_or_else(|| "database".to_string());

    let cancel = CancelToken::new();
    watch_ctrl_c(cancel.clone());

    info!(dialect = target.driver.as_str(), database = %database, "connecting");
    let dialect = connect(&target, &settings)
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Commands::AddComments {
            out_file,
            tables,
            enrichments,
            context,
            model,
        } => {
            let options =
                collector_options(&global, &settings, tables.as_deref(), enrichments.as_deref())?;
            let additional_context = files::read_context_files(context.as_deref().unwrap_or(""))
                .context("failed to read context files")?;
            let options = CollectorOptions {
                additional_context,
                ..options
            };
            let model = model.unwrap_or_else(|| settings.genai.model.clone());
            let collector = MetadataCollector::new(dialect, options).with_cancel(cancel);
            let collector = attach_llm(collector, &global, &settings, &model).await?;
            let out_file =
                out_file.unwrap_or_else(|| files::default_output_path(&database, OutputKind::Statements));
            cmd_add_comments(&collector, out_file, global.dry_run).await
        }
        Commands::GetComments { out_file, format } => {
            let options = collector_options(&global, &settings, None, None)?;
            let collector = MetadataCollector::new(dialect, options).with_cancel(cancel);
            let out_file =
                out_file.unwrap_or_else(|| files::default_output_path(&database, OutputKind::Comments));
            cmd_get_comments(&collector, out_file, format).await
        }
        Commands::DeleteComments { out_file, tables } => {
            let options = collector_options(&global, &settings, tables.as_deref(), None)?;
            let collector = MetadataCollector::new(dialect, options).with_cancel(cancel);
            let out_file =
                out_file.unwrap_or_else(|| files::default_output_path(&database, OutputKind::Statements));
            cmd_delete_comments(&collector, out_file, global.dry_run).await
        }
        Commands::ApplyComments { in_file } => {
            let collector = MetadataCollector::new(dialect, CollectorOptions::default())
                .with_cancel(cancel);
            cmd_apply_comments(&collector, in_file, global.dry_run).await
        }
    }
}

/// Pick the connection from flags, then the named connection, then the
/// settings file default.
fn resolve_target(global: &GlobalArgs, settings: &Settings) -> anyhow::Result<ConnectionTarget> {
    let flag_driver = global
        .dialect
        .as_deref()
        .map(Driver::from_str)
        .transpose()?;

    let mut target = if let Some(url) = &global.url {
        let driver = match flag_driver {
            Some(driver) => driver,
            None => {
                let scheme = url.split("://").next().unwrap_or_default();
                Driver::from_str(scheme).context("cannot infer dialect from URL; pass --dialect")?
            }
        };
        ConnectionTarget {
            driver,
            url: url.clone(),
            schema: None,
        }
    } else if let Some(host) = &global.host {
        let Some(driver) = flag_driver else {
            bail!("--dialect is required with --host");
        };
        let config = ConnectionConfig {
            driver,
            host: host.clone(),
            port: global.port,
            database: global.database.clone().unwrap_or_default(),
            username: global.username.clone(),
            password: global.password.clone(),
        };
        ConnectionTarget {
            driver,
            url: config.to_connection_string()?,
            schema: None,
        }
    } else if let Some(name) = &global.connection {
        settings.get_connection(name)?.target()?
    } else if let Some((name, conn)) = settings.default_connection() {
        info!(connection = name, "using connection from settings");
        conn.target()?
    } else {
        bail!("no database connection: pass --url, --host or --connection");
    };

    if global.schema.is_some() {
        target.schema = global.schema.clone();
    }
    Ok(target)
}

fn collector_options(
    global: &GlobalArgs,
    settings: &Settings,
    tables: Option<&str>,
    enrichments: Option<&str>,
) -> anyhow::Result<CollectorOptions> {
    let update_mode = match &global.update_existing {
        Some(mode) => mode.parse::<UpdateMode>()?,
        None => settings.enrichment.update_mode,
    };
    let enrichments = match enrichments {
        Some(list) => EnrichmentSet::parse(list)?,
        None => settings.enrichment.enrichments.clone(),
    };

    Ok(CollectorOptions {
        retry: settings.retry,
        concurrency: global.concurrency.unwrap_or(settings.enrichment.concurrency),
        table_filter: TableFilter::parse(tables.unwrap_or(""))?,
        enrichments,
        update_mode,
        additional_context: String::new(),
    })
}

/// Attach a Gemini client when an API key is available.
///
/// Context files require a working key. Without context an unusable key
/// only disables PII detection.
async fn attach_llm(
    collector: MetadataCollector,
    global: &GlobalArgs,
    settings: &Settings,
    model: &str,
) -> anyhow::Result<MetadataCollector> {
    let has_context = !collector.options().additional_context.trim().is_empty();
    let wants_examples = collector
        .options()
        .enrichments
        .is_requested(Enrichment::Examples);

    let api_key = match global.gemini_api_key.clone().filter(|k| !k.trim().is_empty()) {
        Some(key) => Some(key),
        None => settings.genai.resolved_api_key()?,
    };

    let Some(api_key) = api_key else {
        if has_context {
            bail!("context files were provided but no Gemini API key is configured; set GEMINI_API_KEY");
        }
        if wants_examples {
            warn!("no Gemini API key provided, PII detection will be skipped");
        }
        return Ok(collector);
    };

    let client: Arc<dyn LlmClient> = Arc::new(GeminiClient::new(api_key, model)?);
    let with_llm = collector.clone().with_llm(client);
    match with_llm.validate_llm().await {
        Ok(()) => Ok(with_llm),
        Err(err) if has_context => Err(anyhow::Error::new(err).context("Gemini API key is invalid")),
        Err(err) => {
            warn!(error = %err, "Gemini API key is invalid, PII detection will be skipped");
            Ok(collector)
        }
    }
}

async fn cmd_add_comments(
    collector: &MetadataCollector,
    out_file: PathBuf,
    dry_run: bool,
) -> anyhow::Result<()> {
    let statements: Vec<String> = collector
        .generate_comment_sqls()
        .await
        .context("metadata collection and SQL generation failed")?
        .into_iter()
        .map(|s| s.sql)
        .collect();

    files::write_statements(&out_file, &statements)?;
    info!(path = %out_file.display(), count = statements.len(), "comment statements written");

    if dry_run {
        info!("dry-run: no changes were made to the database");
        return Ok(());
    }
    if statements.is_empty() {
        info!("no comments to add");
        return Ok(());
    }
    if !confirm_on_stdin("SQL statements to add comments").await? {
        info!("comment addition aborted by user");
        return Ok(());
    }

    // The file may have been edited while the prompt was open.
    let statements = files::read_statements(&out_file)?;
    collector.apply(&statements).await?;
    info!("comments added");
    Ok(())
}

async fn cmd_get_comments(
    collector: &MetadataCollector,
    out_file: PathBuf,
    format: CommentFormat,
) -> anyhow::Result<()> {
    let records = collector
        .get_comments()
        .await
        .context("comment retrieval failed")?;

    let rendered = match format {
        CommentFormat::Text => format_comments_text(&records),
        CommentFormat::Json => format_comments_json(&records)?,
    };
    std::fs::write(&out_file, rendered)
        .with_context(|| format!("failed to write {}", out_file.display()))?;
    info!(path = %out_file.display(), count = records.len(), "comments written");
    Ok(())
}

async fn cmd_delete_comments(
    collector: &MetadataCollector,
    out_file: PathBuf,
    dry_run: bool,
) -> anyhow::Result<()> {
    let statements: Vec<String> = collector
        .generate_delete_comment_sqls()
        .await
        .context("delete SQL generation failed")?
        .into_iter()
        .map(|s| s.sql)
        .collect();

    files::write_statements(&out_file, &statements)?;
    info!(path = %out_file.display(), count = statements.len(), "delete statements written");

    if dry_run {
        info!("dry-run: no changes were made to the database");
        return Ok(());
    }
    if statements.is_empty() {
        info!("no generated comments to delete");
        return Ok(());
    }
    if !confirm_on_stdin("SQL statements to delete generated comments").await? {
        info!("comment deletion aborted by user");
        return Ok(());
    }

    collector.apply(&statements).await?;
    info!("generated comments deleted");
    Ok(())
}

async fn cmd_apply_comments(
    collector: &MetadataCollector,
    in_file: PathBuf,
    dry_run: bool,
) -> anyhow::Result<()> {
    let statements = files::read_statements(&in_file)?;
    info!(path = %in_file.display(), count = statements.len(), "statements read");

    if dry_run {
        info!("dry-run: pass --dry-run false to execute the statements");
        return Ok(());
    }
    if statements.is_empty() {
        info!("no statements to apply");
        return Ok(());
    }
    if !confirm_on_stdin(&format!("{} SQL statements from {}", statements.len(), in_file.display())).await? {
        info!("apply aborted by user");
        return Ok(());
    }

    collector.apply(&statements).await?;
    info!("statements applied");
    Ok(())
}

async fn confirm_on_stdin(description: &str) -> anyhow::Result<bool> {
    let description = description.to_string();
    let confirmed = tokio::task::spawn_blocking(move || {
        files::confirm(&mut io::stdin().lock(), &mut io::stdout(), &description)
    })
    .await??;
    Ok(confirmed)
}

/// Cancel outstanding work on Ctrl-C.
fn watch_ctrl_c(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    });
}
