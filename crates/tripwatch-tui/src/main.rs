mod app;
mod ui;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tripwatch::config::DEFAULT_BASE_URL;
use tripwatch::{
    load_trip_detail, ChartSource, ClientConfig, DriverCard, HttpTripService, PollMode,
    RouteBuilder, ScheduleBoard, SearchField, SyncConfig, TimeFormatter, TripId, TripService,
};

#[derive(Parser)]
#[command(name = "tripwatch")]
#[command(about = "Live dashboard for vehicle trips", long_about = None)]
struct Cli {
    /// Base URL of the trip service
    #[arg(long, global = true, env = "TRIPWATCH_URL", default_value = DEFAULT_BASE_URL)]
    url: String,

    /// Refresh interval in milliseconds
    #[arg(long, global = true, env = "TRIPWATCH_POLL_MS", default_value = "3000")]
    poll_ms: u64,

    /// Fetch once at startup instead of polling
    #[arg(long, global = true)]
    once: bool,

    /// Field the search box matches against: vehicle, driver or status
    #[arg(long, global = true, default_value = "vehicle")]
    field: SearchField,

    /// Trips fed to the traffic chart: filtered or all
    #[arg(long, global = true, default_value = "filtered")]
    chart: ChartSource,

    /// Write logs to this file (the dashboard never logs to the terminal)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Live dashboard (default)
    Dashboard,

    /// Print one trip's detail
    Trip {
        /// Trip id
        id: String,
    },

    /// List registered drivers with their contact details and QR codes
    Drivers,

    /// Print the optimized schedule
    Schedules {
        /// Ask the service to rebuild the schedule first
        #[arg(long)]
        generate: bool,
    },
}

impl Cli {
    fn sync_config(&self) -> SyncConfig {
        SyncConfig::default()
            .with_poll_interval(Duration::from_millis(self.poll_ms))
            .with_mode(if self.once { PollMode::Once } else { PollMode::Continuous })
            .with_field(self.field)
            .with_chart_source(self.chart)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let fullscreen = matches!(cli.command, None | Some(Commands::Dashboard));
    init_logging(cli.log_file.as_ref(), fullscreen)?;

    // The local offset can only be read reliably before other threads exist
    let fmt = TimeFormatter::from_system();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(&cli, fmt))
}

async fn run(cli: &Cli, fmt: TimeFormatter) -> anyhow::Result<()> {
    let service = HttpTripService::new(ClientConfig::new(cli.url.clone()))?;

    match &cli.command {
        None | Some(Commands::Dashboard) => {
            app::run(Arc::new(service), cli.sync_config(), fmt).await
        }
        Some(Commands::Trip { id }) => print_trip(&service, TripId::new(id.as_str()), fmt).await,
        Some(Commands::Drivers) => print_drivers(&service).await,
        Some(Commands::Schedules { generate }) => {
            print_schedules(Arc::new(service), *generate).await
        }
    }
}

fn init_logging(log_file: Option<&PathBuf>, fullscreen: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        // Logging to stderr would tear the alternate screen
        None if fullscreen => {}
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
    Ok(())
}

async fn print_trip(
    service: &HttpTripService,
    id: TripId,
    fmt: TimeFormatter,
) -> anyhow::Result<()> {
    let detail = load_trip_detail(service, &id, &fmt, &RouteBuilder::new())
        .await
        .with_context(|| format!("loading trip {id}"))?;

    println!("🚗 Trip {}", detail.id);
    println!("  Driver:     {}", detail.driver_name);
    println!("  Vehicle:    {}", detail.vehicle_id);
    println!("  Status:     {}", detail.status.label());
    println!("  Started:    {} {}", detail.started.date, detail.started.time);
    println!("  Ended:      {} {}", detail.ended.date, detail.ended.time);
    println!("  Duration:   {}", detail.duration);
    println!("  Last speed: {}", detail.last_speed_label());
    match detail.route.current_position() {
        Some(at) => println!(
            "  Route:      {} samples, {:.2} km, now at {:.5}, {:.5}",
            detail.route.markers.len(),
            detail.route.length_meters() / 1000.0,
            at.lat,
            at.lng
        ),
        None => println!("  Route:      no GPS samples yet"),
    }
    Ok(())
}

async fn print_drivers(service: &HttpTripService) -> anyhow::Result<()> {
    let drivers = service.list_drivers().await.context("loading drivers")?;
    if drivers.is_empty() {
        println!("No drivers registered");
        return Ok(());
    }

    for card in drivers.iter().map(DriverCard::project) {
        println!("👤 {} ({})", card.name, card.driver_id);
        println!("  Avatar:  {}", card.avatar);
        println!("  Email:   {}", card.email);
        println!("  Phone:   {}", card.phone);
        if let Some(vehicle) = &card.vehicle_id {
            println!("  Vehicle: {vehicle}");
        }
        match (&card.qr_code, card.qr_image_bytes()) {
            (Some(code), Some(bytes)) => println!("  QR:      {code} (PNG, {bytes} bytes)"),
            (Some(code), None) => println!("  QR:      {code}"),
            (None, Some(bytes)) => println!("  QR:      PNG, {bytes} bytes"),
            (None, None) => println!("  QR:      {}", tripwatch::detail::NOT_PROVIDED),
        }
    }
    Ok(())
}

async fn print_schedules(service: Arc<HttpTripService>, generate: bool) -> anyhow::Result<()> {
    let board = ScheduleBoard::new(service);
    let rows = if generate {
        board.regenerate().await?
    } else {
        board.load().await?
    };

    if rows.is_empty() {
        println!("No schedule available");
        return Ok(());
    }

    println!(
        "{:>3}  {:<12} {:<12} {:>10} {:>9} {:>9}  {:<12} {}",
        "#", "Vehicle", "Entry", "Congestion", "Trip (h)", "Speed", "Exit", "Driver"
    );
    for row in rows {
        println!(
            "{:>3}  {:<12} {:<12} {:>10} {:>9} {:>9}  {:<12} {}",
            row.position,
            row.vehicle_id.as_deref().unwrap_or("N/A"),
            row.entry,
            row.avg_congestion,
            row.trip_time,
            row.avg_speed,
            row.exit,
            row.driver
        );
    }
    Ok(())
}
