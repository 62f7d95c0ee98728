//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use classref_core::{BatchSummary, Converter, FileError, ProgressReporter};
use classref_l10n::{Localizer, Outcome, TranslationCatalog};
use classref_shared::{
    AppConfig, ConvertConfig, Layout, config_file_path, init_config, load_config, load_config_from,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// classref: class-reference XML to localized Markdown.
#[derive(Parser)]
#[command(
    name = "classref",
    version,
    about = "Convert class-reference XML into localized Markdown using a PO translation catalog.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.classref/classref.toml).
    #[arg(long, global = true, env = "CLASSREF_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Output layout flag.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum LayoutArg {
    Flat,
    Hierarchy,
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Flat => Layout::Flat,
            LayoutArg::Hierarchy => Layout::Hierarchy,
        }
    }
}

/// Flags that override `[defaults]`, `[translation]` and `[links]`.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct ConvertArgs {
    /// Directory of class-reference XML files.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory for Markdown files.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target language code (e.g. zh_CN).
    #[arg(short, long)]
    pub lang: Option<String>,

    /// PO translation catalog.
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// File or class name to skip (repeatable).
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Minimum similarity for fuzzy catalog matches, in [0, 1].
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Documentation base URL; `{lang}` expands to the language slug.
    #[arg(long)]
    pub docs_url: Option<String>,

    /// Output layout.
    #[arg(long)]
    pub layout: Option<LayoutArg>,

    /// Files rendered at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Prepend YAML frontmatter.
    #[arg(long)]
    pub frontmatter: bool,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Convert a directory of class XML files to Markdown.
    Convert(ConvertArgs),

    /// Show how one string resolves against a catalog.
    Lookup {
        /// Text to resolve.
        text: String,

        /// PO translation catalog (defaults to the configured one).
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Minimum similarity for fuzzy matches.
        #[arg(long)]
        threshold: Option<f64>,
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
        0 => "classref=info",
        1 => "classref=debug",
        _ => "classref=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Convert(args) => cmd_convert(config_path, args).await,
        Command::Lookup {
            text,
            catalog,
            threshold,
        } => cmd_lookup(config_path, &text, catalog, threshold).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

/// Config file named on the command line, else the user config.
fn resolve_app_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

/// Merge CLI flags over the loaded config.
fn build_convert_config(app: &AppConfig, args: ConvertArgs) -> ConvertConfig {
    let mut config = ConvertConfig::from(app);
    if let Some(input) = args.input {
        config.input_dir = input;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(lang) = args.lang {
        config.lang = lang;
    }
    if args.catalog.is_some() {
        config.catalog = args.catalog;
    }
    if !args.exclude.is_empty() {
        config.exclude.extend(args.exclude);
    }
    if let Some(threshold) = args.threshold {
        config.similarity_threshold = threshold;
    }
    if let Some(url) = args.docs_url {
        config.docs_url = url;
    }
    if let Some(layout) = args.layout {
        config.layout = layout.into();
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if args.frontmatter {
        config.frontmatter = true;
    }
    config
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_convert(config_path: Option<&Path>, args: ConvertArgs) -> Result<()> {
    let app = resolve_app_config(config_path)?;
    let config = build_convert_config(&app, args);

    info!(
        input = %config.input_dir.display(),
        output = %config.output_dir.display(),
        lang = %config.lang,
        catalog = ?config.catalog,
        threshold = config.similarity_threshold,
        "converting class reference"
    );

    let converter = Converter::new(config)?;

    // Ctrl-C lets in-flight files finish and starts no new ones.
    let abort = converter.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight files");
            abort.store(true, Ordering::SeqCst);
        }
    });

    let reporter = CliProgress::new();
    let summary = converter.run(&reporter).await?;

    print_summary(&summary, &converter.config().output_dir);

    if summary.has_errors() {
        return Err(eyre!("{} file(s) failed to convert", summary.errors.len()));
    }
    if summary.aborted {
        return Err(eyre!("conversion interrupted"));
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary, output_dir: &Path) {
    let stats = &summary.stats;
    println!();
    println!("  Conversion finished{}", if summary.aborted { " (interrupted)" } else { "" });
    println!("  Written:  {}", summary.processed);
    println!("  Skipped:  {}", summary.skipped.len());
    println!("  Errors:   {}", summary.errors.len());
    println!(
        "  Strings:  {} override, {} exact, {} fuzzy, {} untranslated",
        stats.overrides, stats.exact, stats.fuzzy, stats.pass_through
    );
    println!("  Output:   {}", output_dir.display());
    println!("  Time:     {:.1}s", summary.elapsed.as_secs_f64());
    for error in &summary.errors {
        println!("    ✗ {error}");
    }
    println!();
}

async fn cmd_lookup(
    config_path: Option<&Path>,
    text: &str,
    catalog: Option<PathBuf>,
    threshold: Option<f64>,
) -> Result<()> {
    let app = resolve_app_config(config_path)?;
    let config = ConvertConfig::from(&app);
    let threshold = threshold.unwrap_or(config.similarity_threshold);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(eyre!("threshold must be within [0, 1], got {threshold}"));
    }

    let catalog_path = catalog
        .or(config.catalog)
        .ok_or_else(|| eyre!("no catalog given; pass --catalog or set translation.catalog"))?;
    let catalog = TranslationCatalog::load(&catalog_path, config.use_fuzzy_entries)?;

    // Best candidate regardless of threshold, for display.
    let best = classref_l10n::resolve(&catalog, text, 0.0)
        .map(|t| (t.text.to_string(), t.score));

    let localizer = Localizer::new(Some(catalog), config.strings);
    let resolved = localizer.resolve(text, threshold);

    let outcome = match resolved.outcome {
        Outcome::Override => "override".to_string(),
        Outcome::Exact => "exact".to_string(),
        Outcome::Fuzzy { score } => format!("fuzzy ({:.1}%)", score * 100.0),
        Outcome::PassThrough => "pass-through".to_string(),
    };

    println!();
    println!("  Outcome:   {outcome}");
    println!("  Result:    {}", resolved.text);
    if let Some((candidate, score)) = best {
        println!("  Closest:   {candidate} ({:.1}%)", score * 100.0);
    }
    println!("  Threshold: {threshold}");
    println!();
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = resolve_app_config(config_path)?;
    match config_path {
        Some(p) => println!("# {}", p.display()),
        None => println!("# {}", config_file_path()?.display()),
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_converted(&self, class_name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Converting [{current}/{total}] {class_name}"));
    }

    fn file_failed(&self, error: &FileError) {
        self.spinner.println(format!("  ✗ {error}"));
    }

    fn done(&self, _summary: &BatchSummary) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("classref").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn convert_flags_override_config() {
        let cli = parse(&[
            "convert",
            "--input",
            "in",
            "--lang",
            "zh_CN",
            "--exclude",
            "Node.xml",
            "--exclude",
            "Object",
            "--threshold",
            "0.8",
            "--layout",
            "hierarchy",
            "--frontmatter",
        ]);
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };

        let mut app = AppConfig::default();
        app.defaults.exclude = vec!["Timer".into()];
        let config = build_convert_config(&app, args);

        assert_eq!(config.input_dir, PathBuf::from("in"));
        assert_eq!(config.output_dir, PathBuf::from("translated_markdown"));
        assert_eq!(config.lang, "zh_CN");
        assert_eq!(config.exclude, vec!["Timer", "Node.xml", "Object"]);
        assert_eq!(config.similarity_threshold, 0.8);
        assert_eq!(config.layout, Layout::Hierarchy);
        assert!(config.frontmatter);
    }

    #[test]
    fn convert_without_flags_keeps_config() {
        let cli = parse(&["convert"]);
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        let mut app = AppConfig::default();
        app.translation.similarity_threshold = 0.5;
        app.strings = BTreeMap::from([("Methods".to_string(), "方法".to_string())]);

        let config = build_convert_config(&app, args);
        assert_eq!(config.similarity_threshold, 0.5);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.strings.get("Methods").map(String::as_str), Some("方法"));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = parse(&["lookup", "Methods", "-vv", "--log-format", "json"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert!(matches!(cli.command, Command::Lookup { .. }));
    }
}
