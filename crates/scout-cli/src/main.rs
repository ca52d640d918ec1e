use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scout_core::{ChatModel, Provider};
use scout_providers::OpenAIProvider;
use scout_research::{
    report_file_name, DocumentRenderer, DocxRenderer, Enricher, EnrichmentStrategy,
    FieldExtractor, HttpPageSource, ReportSynthesizer, ResearchOutcome, ResearchPipeline,
    ScrapingResolver, SerpApiResolver, SiteResolver,
};
use scout_tools::{
    build_client, create_search_tools, MemorySessionStore, SearchToolsConfig, SerpApiSearch,
    SessionStore, SqliteSessionStore,
};

mod config;
mod interactive;
mod setup;

use config::{expand_path, Config, ProviderKind, ResolvedLlm, ResolverStrategy};

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose: everything, including raw provider traffic
    Trace,
    /// Verbose: prompts, tool calls, extraction details
    Debug,
    /// Standard: pipeline stages
    Info,
    /// Quiet: only warnings and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "scout")]
#[command(author, version, about = "Scout: company research reports from the web", long_about = None)]
pub struct Cli {
    /// Config file (replaces ~/.config/scout/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Model to use (overrides config)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_enum, default_value = "warn", global = true)]
    pub log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Write logs to file (JSON-lines format)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a company and print its report
    Research {
        /// Company name
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,

        /// Skip web-search enrichment
        #[arg(long)]
        no_enrich: bool,

        /// Enrichment strategy (agent, fallback, off); overrides config
        #[arg(long)]
        strategy: Option<String>,

        /// Also export the report as a Word document
        #[arg(long)]
        docx: bool,
    },
    /// List previously researched companies
    History,
    /// Print a stored report without researching again
    Show {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Export a stored report as a Word document
    Export {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,

        /// Word template (overrides [report].docx_template)
        #[arg(long)]
        template: Option<PathBuf>,

        /// Output file (defaults to <name>_Report.docx in [report].output_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show current configuration (secrets redacted)
    Config,
    /// Initialize configuration in ~/.config/scout
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a local .env file
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Resolve log level: --debug overrides --log-level
    let log_level = if cli.debug {
        LogLevel::Debug
    } else {
        cli.log_level
    };

    // Set up logging
    let filter = EnvFilter::new(log_level.as_filter());

    if let Some(log_path) = &cli.log_file {
        // Log file specified: write JSON to file
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    // Handle setup before config is required
    if matches!(&cli.command, Some(Commands::Setup)) {
        return setup::run();
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        config.llm.model = Some(model.clone());
    }

    match &cli.command {
        Some(Commands::Research {
            name,
            no_enrich,
            strategy,
            docx,
        }) => {
            let strategy = match (*no_enrich, strategy) {
                (true, _) => EnrichmentStrategy::Off,
                (false, Some(s)) => s.parse()?,
                (false, None) => config.search.strategy,
            };
            let store = open_store(&config)?;
            let pipeline = build_pipeline(&config, store, strategy)?;
            research(&pipeline, &config, &name.join(" "), *docx).await
        }
        Some(Commands::History) => show_history(open_store(&config)?.as_ref()),
        Some(Commands::Show { name }) => show_report(open_store(&config)?.as_ref(), &name.join(" ")),
        Some(Commands::Export {
            name,
            template,
            out,
        }) => {
            let store = open_store(&config)?;
            let path = export_report(
                store.as_ref(),
                &config,
                &name.join(" "),
                template.as_deref(),
                out.as_deref(),
            )?;
            println!("Saved {}", path.display());
            Ok(())
        }
        Some(Commands::Config) => show_config(&config, cli.config.as_deref()),
        Some(Commands::Setup) => setup::run(),
        None => {
            let store = open_store(&config)?;
            let pipeline = build_pipeline(&config, store, config.search.strategy)?;
            interactive::run(&pipeline, &config).await
        }
    }
}

/// Open the session store: SQLite unless persistence is off.
fn open_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    if !config.session.persist {
        return Ok(Arc::new(MemorySessionStore::new()));
    }

    let path = config.session_db_path()?;
    let store = SqliteSessionStore::new(&path)
        .with_context(|| format!("Failed to open session store {}", path.display()))?;
    Ok(Arc::new(store))
}

fn create_provider(llm: &ResolvedLlm) -> Arc<dyn Provider> {
    let provider = match llm.provider {
        ProviderKind::Azure => OpenAIProvider::azure(
            llm.base_url.clone().unwrap_or_default(),
            &llm.api_key,
            llm.deployment.clone().unwrap_or_else(|| llm.model.clone()),
            llm.api_version.clone().unwrap_or_default(),
        ),
        ProviderKind::Groq => {
            let mut provider = OpenAIProvider::groq(&llm.api_key);
            if let Some(url) = &llm.base_url {
                provider = provider.with_base_url(url);
            }
            provider
        }
        ProviderKind::Openai | ProviderKind::Compatible => {
            let mut provider = OpenAIProvider::new(&llm.api_key);
            if let Some(url) = &llm.base_url {
                provider = provider.with_base_url(url);
            }
            provider
        }
    };

    Arc::new(provider.with_default_model(&llm.model))
}

fn build_resolver(config: &Config) -> Result<Arc<dyn SiteResolver>> {
    let timeout = config.resolver.timeout_secs.map(Duration::from_secs);
    let client = build_client(&config.resolver.user_agent, timeout)?;

    if config.resolver.strategy == ResolverStrategy::Serpapi {
        match &config.search.serpapi_api_key {
            Some(key) => {
                return Ok(Arc::new(SerpApiResolver::new(SerpApiSearch::new(client, key))));
            }
            None => warn!("SERPAPI_API_KEY not set, resolving by scraping instead"),
        }
    }

    Ok(Arc::new(ScrapingResolver::new(
        client,
        &config.resolver.result_selector,
    )?))
}

fn build_pipeline(
    config: &Config,
    store: Arc<dyn SessionStore>,
    strategy: EnrichmentStrategy,
) -> Result<ResearchPipeline> {
    let llm = config.llm.resolve(&config.credentials)?;
    info!(provider = ?llm.provider, model = %llm.model, "Using language model");
    let model = ChatModel::new(create_provider(&llm)).with_temperature(config.llm.temperature);

    let fetch_timeout = Duration::from_secs(config.extractor.fetch_timeout_secs);
    let pages = HttpPageSource::new(build_client(&config.resolver.user_agent, Some(fetch_timeout))?);
    let extractor = FieldExtractor::new(build_resolver(config)?, Arc::new(pages))?;

    let mut synthesizer = ReportSynthesizer::new(model.clone());
    if let Some(template) = &config.report.template {
        let path = expand_path(template);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read report template {}", path.display()))?;
        synthesizer = synthesizer
            .with_template(text)
            .with_context(|| format!("Invalid report template {}", path.display()))?;
    }

    let mut pipeline = ResearchPipeline::new(extractor, synthesizer, store);

    if strategy != EnrichmentStrategy::Off {
        let tools = create_search_tools(&SearchToolsConfig {
            tavily_api_key: config.search.tavily_api_key.clone(),
            serpapi_api_key: config.search.serpapi_api_key.clone(),
            enable_duckduckgo: config.search.enable_duckduckgo,
            timeout: Duration::from_secs(config.search.timeout_secs),
        })?;
        let enricher = Enricher::new(model, tools)
            .with_strategy(strategy)
            .with_max_iterations(config.search.max_iterations);
        pipeline = pipeline.with_enricher(enricher);
    }

    Ok(pipeline)
}

async fn research(pipeline: &ResearchPipeline, config: &Config, name: &str, docx: bool) -> Result<()> {
    match pipeline.run(name).await? {
        ResearchOutcome::Report(report) => {
            println!("{}", report.text);

            if docx {
                let path = export_report(pipeline.store().as_ref(), config, &report.company, None, None)?;
                eprintln!("\nSaved {}", path.display());
            }
            Ok(())
        }
        ResearchOutcome::Failed { message, .. } => anyhow::bail!("{}", message),
    }
}

fn show_history(store: &dyn SessionStore) -> Result<()> {
    let names = store.list_history()?;
    if names.is_empty() {
        println!("No companies researched yet.");
        return Ok(());
    }

    println!("Previously searched:\n");
    for (i, name) in names.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }
    Ok(())
}

fn show_report(store: &dyn SessionStore, name: &str) -> Result<()> {
    match store.get(name.trim())? {
        Some(report) => {
            println!("{}", report);
            Ok(())
        }
        None => anyhow::bail!("No stored report for '{}'. Run: scout research \"{}\"", name, name),
    }
}

/// Render the stored report for `name` as a Word document and write it.
pub fn export_report(
    store: &dyn SessionStore,
    config: &Config,
    name: &str,
    template: Option<&Path>,
    out: Option<&Path>,
) -> Result<PathBuf> {
    let name = name.trim();
    let report = store.get(name)?.with_context(|| {
        format!("No stored report for '{}'. Run: scout research \"{}\"", name, name)
    })?;

    let template = template
        .map(Path::to_path_buf)
        .unwrap_or_else(|| expand_path(&config.report.docx_template));
    let renderer = DocxRenderer::new();
    let bytes = renderer.render(&template, &report)?;

    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.export_path(&report_file_name(name)));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), mime = renderer.mime_type(), "Report exported");
    Ok(path)
}

fn show_config(config: &Config, explicit: Option<&Path>) -> Result<()> {
    let source = match explicit {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };

    println!("Configuration ({}):\n", source.display());
    print!("{}", toml::to_string_pretty(&config.redacted())?);
    println!("\nSession store: {}", config.session_db_path()?.display());
    Ok(())
}
