use std::sync::Arc;
use std::time::Duration;
use tripwatch::{ChartSource, ClientConfig, HttpTripService, SyncConfig, SyncEngine, TripStatus};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url =
        std::env::var("TRIPWATCH_URL").unwrap_or_else(|_| "http://127.0.0.1:5001".to_string());
    println!("🔌 Polling trip service at {url}...");

    let service = HttpTripService::new(ClientConfig::new(url))?;
    let config = SyncConfig::default().with_poll_interval(Duration::from_secs(2));
    let dashboard = SyncEngine::new(Arc::new(service), config).spawn();
    let mut state = dashboard.subscribe();
    let mut notices = dashboard.notices();

    // Print five refreshes
    let mut seen = 0;
    while seen < 5 {
        tokio::select! {
            changed = state.changed() => {
                changed?;
                let snapshot = state.borrow_and_update().clone();
                if snapshot.loading() {
                    continue;
                }
                let chart = snapshot.chart(ChartSource::All);
                let per_status: Vec<String> = TripStatus::ALL
                    .iter()
                    .map(|s| {
                        let n: u32 = chart.series(*s).iter().map(|slot| slot.count).sum();
                        format!("{}={n}", s.as_str())
                    })
                    .collect();
                println!("  ✓ {} trips ({})", snapshot.trips().len(), per_status.join(", "));
                seen += 1;
            }
            Ok(notice) = notices.recv() => {
                println!("  ! {notice}");
            }
        }
    }

    dashboard.shutdown().await;
    println!("🎉 Done!");
    Ok(())
}
