//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use modulemap_core::{ExtractionReport, OpenAiClient, ProgressReporter, extract_modules};
use modulemap_crawler::Crawler;
use modulemap_shared::{
    AppConfig, CompletionModel, CrawlOptions, CrawlSnapshot, ExtractOptions, init_config,
    load_config, resolve_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ModuleMap — turn documentation sites into module/submodule breakdowns.
#[derive(Parser)]
#[command(
    name = "modulemap",
    version,
    about = "Extract modules and submodules from documentation websites.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl documentation URLs and extract their module breakdown.
    Extract {
        /// Documentation URLs to process.
        #[arg(long, required = true, num_args = 1..)]
        urls: Vec<String>,

        /// Output file path for the JSON module list.
        #[arg(short, long, default_value = "extracted_modules.json")]
        output: PathBuf,

        /// Maximum number of pages to crawl per URL.
        #[arg(long)]
        max_pages: Option<usize>,

        /// Delay between page fetches, in seconds.
        #[arg(long)]
        delay: Option<f64>,

        /// Completion model (gpt-3.5-turbo is cheaper, gpt-4 may be more accurate).
        #[arg(long)]
        model: Option<String>,

        /// Also save the site structure information to a separate file.
        #[arg(long)]
        save_structure: bool,

        /// Also save the raw extracted content to a separate file.
        #[arg(long)]
        save_raw_content: bool,

        /// API key (overrides the configured environment variable).
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Extract {
            urls,
            output,
            max_pages,
            delay,
            model,
            save_structure,
            save_raw_content,
            api_key,
        } => {
            cmd_extract(ExtractArgs {
                urls,
                output,
                max_pages,
                delay,
                model,
                save_structure,
                save_raw_content,
                api_key,
            })
            .await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

struct ExtractArgs {
    urls: Vec<String>,
    output: PathBuf,
    max_pages: Option<usize>,
    delay: Option<f64>,
    model: Option<String>,
    save_structure: bool,
    save_raw_content: bool,
    api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// extract command
// ---------------------------------------------------------------------------

async fn cmd_extract(args: ExtractArgs) -> Result<()> {
    let config = load_config()?;

    // Fail fast on a missing credential before any crawling starts.
    let api_key = match args.api_key {
        Some(key) if !key.is_empty() => key,
        _ => resolve_api_key(&config)?,
    };

    let seeds = validate_urls(&args.urls)?;

    let mut crawl_opts = CrawlOptions::from(&config);
    if let Some(max_pages) = args.max_pages {
        crawl_opts.max_pages = max_pages;
    }
    if let Some(delay) = args.delay {
        crawl_opts.delay = std::time::Duration::from_secs_f64(delay);
    }

    let model: CompletionModel = match args.model.as_deref() {
        Some(name) => name.parse()?,
        None => config.completion.default_model,
    };
    let extract_opts = ExtractOptions::for_model(model);

    info!(
        max_depth = crawl_opts.max_depth,
        max_pages = crawl_opts.max_pages,
        model = %model,
        "crawling seed pages plus their direct same-domain links"
    );

    // --- Crawl each seed sequentially ---
    let crawler = Crawler::new(crawl_opts)?;
    let mut snapshot = CrawlSnapshot::default();

    let progress = CliProgress::new();
    for (i, seed) in seeds.iter().enumerate() {
        progress.spinner.set_message(format!(
            "Crawling {seed} ({}/{})",
            i + 1,
            seeds.len()
        ));

        let result = crawler.crawl(seed).await;
        log_crawl_stats(&result);
        snapshot.merge(result);
    }

    // --- Optional intermediate artifacts ---
    if args.save_structure {
        let path = sibling_file(&args.output, "_structure.json");
        let doc = serde_json::json!({
            "hierarchy": snapshot.hierarchy,
            "titles": snapshot.titles,
            "depths": snapshot.depths,
            "structure": snapshot.structure,
            "metadata": snapshot.metadata,
        });
        write_json(&path, &doc)?;
        info!(path = %path.display(), "site structure saved");
    }

    if args.save_raw_content {
        let path = sibling_file(&args.output, "_content.json");
        let doc = serde_json::json!({
            "content": snapshot.content,
            "titles": snapshot.titles,
        });
        write_json(&path, &doc)?;
        info!(path = %path.display(), "raw content saved");
    }

    // --- Extraction ---
    info!(model = %model, "analyzing content and extracting modules");
    let client = OpenAiClient::with_base_url(
        api_key,
        extract_opts.clone(),
        config.completion.base_url.clone(),
    )?;

    let report = extract_modules(&snapshot, &client, &extract_opts, &progress).await;

    write_json(&args.output, &report.modules)?;
    info!(path = %args.output.display(), "extraction completed");

    print_summary(&report);
    Ok(())
}

/// Validate seed URLs; any invalid entry fails the run before crawling.
fn validate_urls(raw: &[String]) -> Result<Vec<Url>> {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();

    for entry in raw {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match Url::parse(entry) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => valid.push(url),
            _ => invalid.push(entry.to_string()),
        }
    }

    if !invalid.is_empty() {
        return Err(eyre!("invalid URLs detected: {}", invalid.join(", ")));
    }
    if valid.is_empty() {
        return Err(eyre!("no valid URLs provided"));
    }

    Ok(valid)
}

/// Log per-seed crawl statistics.
fn log_crawl_stats(snap: &CrawlSnapshot) {
    let depth0 = snap.depths.values().filter(|&&d| d == 0).count();
    let depth1 = snap.depths.values().filter(|&&d| d == 1).count();

    let headings: usize = snap.structure.values().map(|s| s.headings.len()).sum();
    let lists: usize = snap.structure.values().map(|s| s.lists.len()).sum();
    let tables: usize = snap.structure.values().map(|s| s.tables.len()).sum();
    let code_blocks: usize = snap.structure.values().map(|s| s.code_blocks.len()).sum();

    info!(
        pages = snap.page_count(),
        links = snap.link_count(),
        depth0,
        depth1,
        headings,
        lists,
        tables,
        code_blocks,
        "seed crawl finished"
    );
}

fn sibling_file(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("extracted_modules");
    output.with_file_name(format!("{stem}{suffix}"))
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .map_err(|e| eyre!("failed to write {}: {e}", path.display()))?;
    Ok(())
}

fn print_summary(report: &ExtractionReport) {
    println!();
    if report.modules.is_empty() {
        println!("  No modules extracted. The content might not contain enough structured information.");
        println!();
        return;
    }

    let total_submodules: usize = report.modules.iter().map(|m| m.submodules.len()).sum();
    println!(
        "  Extracted {} modules with a total of {} submodules.",
        report.modules.len(),
        total_submodules
    );
    if report.candidates_skipped > 0 {
        println!(
            "  Skipped {} of {} candidates after completion failures.",
            report.candidates_skipped, report.candidates_total
        );
    }
    if report.used_corpus_fallback {
        println!("  (whole-corpus extraction: no clear site structure was found)");
    }
    println!();
    for module in &report.modules {
        println!("  - {} ({} submodules)", module.name, module.submodules.len());
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn module_started(&self, title: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Extracting [{current}/{total}] {title}"));
    }

    fn done(&self, _report: &ExtractionReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
