//! CLI binary for notion-invoice.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExportConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use notion_invoice::{
    export_all, parse_pages, summarize, DirectorySink, ExportConfig, ExportObserver,
    InvoiceError, OverflowRule, PageSize, RawPage, SharedObserver,
};
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: one bar tick and one log line per record.
struct CliObserver {
    bar: ProgressBar,
    pages: AtomicUsize,
}

impl CliObserver {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} invoices  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Exporting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            pages: AtomicUsize::new(0),
        })
    }
}

impl ExportObserver for CliObserver {
    fn on_export_start(&self, record_id: &str) {
        self.bar.set_message(record_id.to_string());
    }

    fn on_page_emitted(&self, _record_id: &str, _index: usize, _offset: f64) {
        self.pages.fetch_add(1, Ordering::SeqCst);
    }

    fn on_export_complete(&self, _record_id: &str, file_name: &str, page_count: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            file_name,
            dim(&format!("{page_count} page(s)")),
        ));
        self.bar.inc(1);
    }

    fn on_export_failed(&self, record_id: &str, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), record_id, red(&msg)));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Export every record of a database query dump
  invoice2pdf records.json -o invoices/

  # One record, Letter paper, with a logo
  invoice2pdf records.json --record 1a2b3c4d-... --page-size letter --logo logo.png

  # Pipe from the Notion API
  curl -s ... | invoice2pdf - -o out/

  # List records without rendering (N/A marks an empty amount)
  invoice2pdf records.json --list

INPUT:
  A Notion page object, an array of pages, or a database query response
  ({"results": [...]}). Use "-" to read from stdin.

OUTPUT:
  One PDF per record named invoice-<name-slug>-<epoch-millis>.pdf.

ENVIRONMENT VARIABLES:
  Every option can also be set as INVOICE2PDF_<OPTION>, e.g.
  INVOICE2PDF_PAGE_SIZE=letter. Flags take precedence. RUST_LOG overrides
  the log filter.
"#;

/// Render Notion database records as paginated PDF invoices.
#[derive(Parser, Debug)]
#[command(
    name = "invoice2pdf",
    version,
    about = "Render Notion database records as paginated PDF invoices",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Notion JSON file, or "-" for stdin.
    input: String,

    /// Directory to write PDFs into.
    #[arg(short, long, env = "INVOICE2PDF_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// Export only the record with this id.
    #[arg(long, env = "INVOICE2PDF_RECORD")]
    record: Option<String>,

    /// Export at most N records.
    #[arg(long, env = "INVOICE2PDF_LIMIT")]
    limit: Option<usize>,

    /// Branding image: file path, http(s) URL, or data: URI.
    #[arg(long, env = "INVOICE2PDF_LOGO")]
    logo: Option<String>,

    /// Output paper size.
    #[arg(long, env = "INVOICE2PDF_PAGE_SIZE", value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Raster oversampling factor (0.5–8).
    #[arg(long, env = "INVOICE2PDF_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Whether content ending exactly on a page boundary gets a blank page.
    #[arg(long, env = "INVOICE2PDF_OVERFLOW", value_enum, default_value = "inclusive")]
    overflow: OverflowArg,

    /// JPEG quality for page images (1–100).
    #[arg(long, env = "INVOICE2PDF_JPEG_QUALITY", default_value_t = 92,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// TrueType/OpenType font for invoice text (built-in bitmap face if unset).
    #[arg(long, env = "INVOICE2PDF_FONT")]
    font: Option<PathBuf>,

    /// Currency symbol prefixed to amounts.
    #[arg(long, env = "INVOICE2PDF_CURRENCY", default_value = "$")]
    currency: String,

    /// HTTP download timeout for URL logos, in seconds.
    #[arg(long, env = "INVOICE2PDF_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,

    /// List records (name / date / amount) instead of exporting.
    #[arg(long)]
    list: bool,

    /// Print JSON (summary or export report) on stdout.
    #[arg(long, env = "INVOICE2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "INVOICE2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INVOICE2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OverflowArg {
    Exclusive,
    Inclusive,
}

impl From<OverflowArg> for OverflowRule {
    fn from(v: OverflowArg) -> Self {
        match v {
            OverflowArg::Exclusive => OverflowRule::Exclusive,
            OverflowArg::Inclusive => OverflowRule::Inclusive,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Load and select records ──────────────────────────────────────────
    let json = read_input(&cli.input).await?;
    let pages = parse_pages(&json).context("Failed to parse Notion JSON")?;
    let pages = select_pages(pages, cli.record.as_deref(), cli.limit)?;

    // ── List-only mode ───────────────────────────────────────────────────
    if cli.list {
        let rows = summarize(&pages);
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("Failed to serialise summary")?
            );
        } else {
            println!("{:<36}  {:<28}  {:<10}  {:>12}", "ID", "NAME", "DATE", "AMOUNT");
            for row in &rows {
                println!(
                    "{:<36}  {:<28}  {:<10}  {:>12}",
                    row.id,
                    row.name.as_deref().unwrap_or("N/A"),
                    row.display_date(),
                    row.display_amount(&cli.currency),
                );
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let cli_observer = show_progress.then(|| CliObserver::new(pages.len()));
    let observer = cli_observer
        .clone()
        .map(|o| o as Arc<dyn ExportObserver>);
    let config = build_config(&cli, observer)?;

    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Exporting {} invoice(s) to {}…",
                pages.len(),
                cli.output.display()
            ))
        );
    }

    // ── Run export ───────────────────────────────────────────────────────
    let sink = DirectorySink::new(&cli.output, config.jpeg_quality);
    let report = export_all(&pages, &config, &sink)
        .await
        .context("Export failed")?;
    let page_total = cli_observer.as_ref().map(|o| {
        o.bar.finish_and_clear();
        o.pages.load(Ordering::SeqCst)
    });

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        if !show_progress {
            for done in &report.exported {
                eprintln!("  {} {}", green("✓"), done.file_name);
            }
            for failed in &report.failed {
                eprintln!("  {} {}  {}", red("✗"), failed.record_id, red(&failed.error));
            }
        }
        eprintln!(
            "{}  {}/{} invoices  {}ms  →  {}",
            if report.is_success() {
                green("✔")
            } else {
                cyan("⚠")
            },
            report.exported.len(),
            pages.len(),
            report.duration_ms,
            bold(&cli.output.display().to_string()),
        );
        if let Some(n) = page_total {
            eprintln!("   {} pages rendered", dim(&n.to_string()));
        }
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} invoices failed",
            report.failed.len(),
            pages.len()
        );
    }
    Ok(())
}

/// Read the input file, or stdin for "-".
async fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    let path = PathBuf::from(input);
    match tokio::fs::read_to_string(&path).await {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(InvoiceError::InputNotFound { path }.into())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Apply `--record` and `--limit`.
fn select_pages(pages: Vec<RawPage>, record: Option<&str>, limit: Option<usize>) -> Result<Vec<RawPage>> {
    let total = pages.len();
    let mut pages = match record {
        Some(id) => {
            let found: Vec<RawPage> = pages.into_iter().filter(|p| p.id == id).collect();
            if found.is_empty() {
                return Err(InvoiceError::RecordNotFound {
                    id: id.to_string(),
                    total,
                }
                .into());
            }
            found
        }
        None => pages,
    };
    if let Some(n) = limit {
        pages.truncate(n);
    }
    Ok(pages)
}

/// Map CLI args to `ExportConfig`.
fn build_config(cli: &Cli, observer: Option<SharedObserver>) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder()
        .page_size(cli.page_size.into())
        .scale(cli.scale)
        .overflow(cli.overflow.into())
        .jpeg_quality(cli.jpeg_quality)
        .currency_symbol(cli.currency.clone())
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.font {
        builder = builder.font_path(path);
    }
    if let Some(ref logo) = cli.logo {
        builder = builder.branding(logo.clone());
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}
