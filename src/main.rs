use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biochar_explorer::backend::HttpBackend;
use biochar_explorer::common::Session;
use biochar_explorer::config::Config;
use biochar_explorer::coordinator::{PlotKind, Settled};
use biochar_explorer::export::{DataKind, DirectorySink, Payload};
use biochar_explorer::render::FigureSurface;
use biochar_explorer::selection::{Context, Field};
use biochar_explorer::summary::StatsTarget;

#[derive(Parser)]
#[command(name = "biochar-explorer")]
#[command(about = "Fetch biochar field-trial plots and summary statistics")]
#[command(version)]
struct Cli {
    /// Backend root URL (overrides BIOCHAR_API_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    year: Option<String>,

    #[arg(long)]
    start_date: Option<String>,

    #[arg(long)]
    end_date: Option<String>,

    #[arg(long)]
    granularity: Option<String>,

    #[arg(long)]
    variable: Option<String>,

    #[arg(long)]
    strip: Option<String>,

    #[arg(long)]
    logger_location: Option<String>,

    #[arg(long)]
    depth: Option<String>,

    /// `depths` or `loggers`
    #[arg(long)]
    trace_grouping: Option<String>,

    /// Request the backend summary archive for `raw` or `ratio` statistics
    #[arg(long)]
    export_summary: Option<StatsTarget>,

    /// Write the displayed statistics as CSV without asking the backend
    #[arg(long)]
    summary_csv: Option<StatsTarget>,

    /// Print the trace data download link for `raw`, `ratio` or `all`
    #[arg(long)]
    trace_data: Option<DataKind>,

    /// Skip writing figure JSON files
    #[arg(long)]
    no_figures: bool,
}

impl Cli {
    /// Selections in the order they must be applied: a year change resets
    /// the date range, so explicit dates come after it.
    fn selections(&self) -> Vec<(Field, &str)> {
        [
            (Field::Year, &self.year),
            (Field::StartDate, &self.start_date),
            (Field::EndDate, &self.end_date),
            (Field::Granularity, &self.granularity),
            (Field::Variable, &self.variable),
            (Field::Strip, &self.strip),
            (Field::LoggerLocation, &self.logger_location),
            (Field::Depth, &self.depth),
            (Field::TraceGrouping, &self.trace_grouping),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
        .collect()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,biochar_explorer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration (fail-fast)
    let mut config = Config::from_env()?;
    if let Some(raw) = &cli.base_url {
        config = config.with_base_url(Config::parse_base_url(raw)?);
    }
    tracing::info!(
        base_url = %config.api_base_url,
        download_dir = %config.download_dir.display(),
        "Configuration loaded"
    );

    let backend = HttpBackend::new(&config)?;
    let sink = DirectorySink::new(config.download_dir.clone());

    let session = match Session::start(
        config,
        backend,
        FigureSurface::new(),
        FigureSurface::new(),
        sink,
    )
    .await
    {
        Ok(session) => session,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
    };

    for context in Context::ALL {
        for (field, value) in cli.selections() {
            session.on_option_changed(context, field, value).await;
        }
    }

    let plots = session.refresh_plots().await;
    for (kind, outcome) in [(PlotKind::Raw, plots.raw), (PlotKind::Ratio, plots.ratio)] {
        match outcome {
            Ok(Settled::Fresh(result)) => {
                let title = result.figure.title().map_or_else(
                    || result.request.title(session.catalog()),
                    str::to_string,
                );
                println!("{kind} plot: {title} [{} traces]", result.figure.data.len());
                if !cli.no_figures {
                    let spec = session.export_figure(kind)?;
                    println!("  saved {}", spec.filename);
                }
            }
            Ok(Settled::Superseded { .. }) => {}
            Err(e) => eprintln!("{kind} plot: {}", e.user_message()),
        }
    }

    match session.refresh_summary().await {
        Ok(Settled::Fresh(_)) => {
            if let Some(shown) = session.summary_panel().current() {
                println!("\n{}\n", shown.title);
                print!("{}", shown.tables);
            }
        }
        Ok(Settled::Superseded { .. }) => {}
        Err(e) => eprintln!("summary: {}", e.user_message()),
    }

    if let Some(kind) = cli.trace_data {
        let spec = session.export_trace_data(kind)?;
        if let Payload::Url(url) = &spec.payload {
            println!("{}: {url}", spec.filename);
        }
    }

    if let Some(target) = cli.summary_csv {
        match session.export_summary_csv(target) {
            Ok(spec) => println!("saved {}", spec.filename),
            Err(e) => eprintln!("{}", e.user_message()),
        }
    }

    if let Some(target) = cli.export_summary {
        match session.export_summary_data(target).await {
            Ok(spec) => println!("saved {}", spec.filename),
            Err(e) => eprintln!("{}", e.user_message()),
        }
    }

    Ok(())
}
