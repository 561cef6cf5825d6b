pub mod config;
pub mod error;
pub mod filter;
pub mod finder;
pub mod geo;
pub mod models;
pub mod query;
pub mod render;
pub mod repository;
pub mod state;
pub mod utils;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use config::AppConfig;
use finder::EventFinder;
use geo::{Coordinates, LocationFix};
use repository::{local::LocalStore, realm::RealmClient, EventRepository};

/// Location fix from `EVENT_FINDER_LAT` / `EVENT_FINDER_LON`. Missing values
/// behave like a browser without geolocation; unparsable ones like a denial.
fn location_from_env() -> LocationFix {
    let (Ok(lat), Ok(lon)) = (
        std::env::var("EVENT_FINDER_LAT"),
        std::env::var("EVENT_FINDER_LON"),
    ) else {
        return LocationFix::Unsupported;
    };
    match (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
        (Ok(lat), Ok(lon)) => LocationFix::Position(Coordinates::new(lat, lon)),
        _ => {
            warn!(%lat, %lon, "unparsable coordinates; treating location as denied");
            LocationFix::Denied
        }
    }
}

async fn show_board<R: EventRepository>(
    repo: R,
    config: &AppConfig,
    search: Option<String>,
) -> anyhow::Result<String> {
    let finder = EventFinder::new(repo, config.tz(), config.default_city.clone());
    let outcome = finder.start(location_from_env()).await;
    info!(?outcome, "initial load finished");

    if let Some(text) = search {
        match finder.submit_search(&text).await {
            Ok(outcome) => info!(?outcome, query = %text, "search finished"),
            Err(err) => warn!(%err, "search skipped"),
        }
    }
    let board = finder.board();
    info!(
        cards = board.cards.len(),
        visible = board.visible_cards().count(),
        "board ready"
    );
    Ok(board.to_html())
}

pub fn run() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = AppConfig::load();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let search = (!args.is_empty()).then(|| args.join(" "));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let html = runtime.block_on(async {
        if config.offline {
            info!("using local event store");
            let store = LocalStore::open_default().context("failed to open local store")?;
            show_board(store, &config, search).await
        } else {
            let client =
                RealmClient::from_config(&config).context("failed to build backend client")?;
            show_board(client, &config, search).await
        }
    })?;

    println!("{html}");
    Ok(())
}
