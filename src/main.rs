use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use outlet_insights::aggregate::{CoverBucket, MarginBucket};
use outlet_insights::config::Config;
use outlet_insights::dashboard::{self, Dashboard};
use outlet_insights::filter::FilterSet;
use outlet_insights::io::excel_read::SheetRequest;
use outlet_insights::report::render::{self, OutputFormat};
use outlet_insights::report::views::UNMATCHED_EXPORT_NAME;
use outlet_insights::{InsightsError, Result};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging(&cli.log_level) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| InsightsError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    let mut dashboard = Dashboard::new(config);

    let (report, output) = match cli.command {
        Command::Purchase(args) => {
            let sales = args.input.sales_request();
            let credit = args.credit.credit_request();
            let report =
                dashboard.purchase(&sales, credit.as_ref(), &args.filters.to_filter_set())?;
            (report, args.output)
        }
        Command::Variance(args) => {
            let sales = args.input.sales_request();
            let credit = args.credit.credit_request();
            let report =
                dashboard.variance(&sales, credit.as_ref(), &args.filters.to_filter_set())?;
            (report, args.output)
        }
        Command::CreditNotes(args) => {
            let sales = args.input.sales_request();
            let credit = credit_request(
                &args.credit_notes,
                args.credit_sheet.clone(),
                args.credit_header_row,
            );
            let report =
                dashboard.credit_notes(&sales, &credit, &args.filters.to_filter_set())?;
            let mut output = args.output;
            if output.export.is_none() && args.export_default {
                output.export = Some(PathBuf::from(UNMATCHED_EXPORT_NAME));
            }
            (report, output)
        }
        Command::StockCover(args) => {
            let sales = args.sales.as_ref().map(|path| {
                SheetRequest::new(path).with_sheet(args.sheet.clone())
            });
            let aging = SheetRequest::new(&args.aging).with_sheet(args.aging_sheet.clone());
            let mut filters = args.filters.to_filter_set();
            filters.cover = args.cover.map(CoverBucket::from);
            let report = dashboard.stock_cover(sales.as_ref(), &aging, &filters)?;
            (report, args.output)
        }
    };

    let rendered = render::render(&report, output.format.into())?;
    print!("{rendered}");

    if let Some(path) = &output.export {
        ensure_parent_exists(path)?;
        dashboard::export(&report, path)?;
        eprintln!("exported {} rows to {}", report.table.len(), path.display());
    }
    Ok(())
}

fn credit_request(path: &Path, sheet: Option<String>, header_row: usize) -> SheetRequest {
    SheetRequest::new(path)
        .with_sheet(sheet)
        .with_header_row(header_row)
}

fn ensure_parent_exists(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            Err(InsightsError::MissingInput(parent.to_path_buf()))
        }
        _ => Ok(()),
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Purchase, sales, credit-note and stock-cover insights from outlet spreadsheets."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration with column aliases and thresholds.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Purchase and profit per item, with an outlet breakdown for picked items.
    Purchase(PurchaseArgs),
    /// Purchased against sold quantities and the highest unsold items.
    Variance(PurchaseArgs),
    /// Negative-margin items that have no credit note.
    CreditNotes(CreditNoteArgs),
    /// Months of cover per item from a stock-aging sheet.
    StockCover(StockCoverArgs),
}

#[derive(clap::Args)]
struct InputArgs {
    /// Sales or purchase workbook.
    #[arg(long)]
    sales: PathBuf,

    /// Worksheet to read; the first sheet when omitted.
    #[arg(long)]
    sheet: Option<String>,
}

impl InputArgs {
    fn sales_request(&self) -> SheetRequest {
        SheetRequest::new(&self.sales).with_sheet(self.sheet.clone())
    }
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Keep only these outlets (repeatable).
    #[arg(long = "outlet")]
    outlets: Vec<String>,

    /// Keep only these item names (repeatable).
    #[arg(long = "item")]
    items: Vec<String>,

    /// Keep only these categories (repeatable).
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Drop these categories (repeatable).
    #[arg(long = "exclude-category")]
    exclude_categories: Vec<String>,

    /// Case-insensitive search over item name and code.
    #[arg(long)]
    search: Option<String>,

    /// Keep only items whose margin falls in this range.
    #[arg(long, value_enum)]
    margin_bucket: Option<MarginBucketArg>,
}

impl FilterArgs {
    fn to_filter_set(&self) -> FilterSet {
        FilterSet {
            outlets: self.outlets.clone(),
            items: self.items.clone(),
            categories: self.categories.clone(),
            exclude_categories: self.exclude_categories.clone(),
            margin: self.margin_bucket.map(MarginBucket::from),
            cover: None,
            search: self.search.clone(),
        }
    }
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Report format written to stdout.
    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    format: FormatArg,

    /// Write the report table to this .xlsx file.
    #[arg(long)]
    export: Option<PathBuf>,
}

#[derive(clap::Args)]
struct OptionalCreditArgs {
    /// Credit-note workbook; adds a credit-note column to the report.
    #[arg(long)]
    credit_notes: Option<PathBuf>,

    /// Worksheet of the credit-note workbook; the first sheet when omitted.
    #[arg(long, requires = "credit_notes")]
    credit_sheet: Option<String>,

    /// Zero-based row holding the credit-note headers.
    #[arg(long, default_value_t = 0)]
    credit_header_row: usize,
}

impl OptionalCreditArgs {
    fn credit_request(&self) -> Option<SheetRequest> {
        self.credit_notes
            .as_deref()
            .map(|path| credit_request(path, self.credit_sheet.clone(), self.credit_header_row))
    }
}

#[derive(clap::Args)]
struct PurchaseArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    credit: OptionalCreditArgs,

    #[command(flatten)]
    filters: FilterArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(clap::Args)]
struct CreditNoteArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Credit-note workbook.
    #[arg(long)]
    credit_notes: PathBuf,

    /// Worksheet of the credit-note workbook; the first sheet when omitted.
    #[arg(long)]
    credit_sheet: Option<String>,

    /// Zero-based row holding the credit-note headers.
    #[arg(long, default_value_t = 0)]
    credit_header_row: usize,

    /// Export to negative_margin_unmatched_items.xlsx when --export is not given.
    #[arg(long)]
    export_default: bool,

    #[command(flatten)]
    filters: FilterArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(clap::Args)]
struct StockCoverArgs {
    /// Stock-aging workbook.
    #[arg(long)]
    aging: PathBuf,

    /// Worksheet of the aging workbook; the first sheet when omitted.
    #[arg(long)]
    aging_sheet: Option<String>,

    /// Optional sales workbook merged with the aging sheet by name, category
    /// and barcode.
    #[arg(long)]
    sales: Option<PathBuf>,

    /// Worksheet of the sales workbook.
    #[arg(long)]
    sheet: Option<String>,

    /// Keep only items in this stock-cover bucket.
    #[arg(long, value_enum)]
    cover: Option<CoverBucketArg>,

    #[command(flatten)]
    filters: FilterArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MarginBucketArg {
    Negative,
    Low,
    Moderate,
    High,
}

impl From<MarginBucketArg> for MarginBucket {
    fn from(arg: MarginBucketArg) -> Self {
        match arg {
            MarginBucketArg::Negative => MarginBucket::Negative,
            MarginBucketArg::Low => MarginBucket::Low,
            MarginBucketArg::Moderate => MarginBucket::Moderate,
            MarginBucketArg::High => MarginBucket::High,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CoverBucketArg {
    LowStock,
    Healthy,
    Overstock,
}

impl From<CoverBucketArg> for CoverBucket {
    fn from(arg: CoverBucketArg) -> Self {
        match arg {
            CoverBucketArg::LowStock => CoverBucket::LowStock,
            CoverBucketArg::Healthy => CoverBucket::Healthy,
            CoverBucketArg::Overstock => CoverBucket::Overstock,
        }
    }
}
