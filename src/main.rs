use std::sync::Arc;

use roadline::api::DynAPI;
use roadline::config::{ApiConfig, MapConfig};
use roadline::error::Error;
use roadline::external::ruas_api::RuasClient;
use roadline::surface::{HeadlessMap, MapSurface};
use roadline::viewer::{load_dashboard_routes, DetailFallback, RouteViewer};

const CONTAINER: &str = "dashboard";

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    if let Err(err) = run().await {
        tracing::error!(code = err.code, "dashboard failed: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let api_config = ApiConfig::from_env()?;
    let map_config = MapConfig::from_env()?;

    let api: DynAPI = Arc::new(RuasClient::new(&api_config));
    let routes =
        load_dashboard_routes(api.as_ref(), api_config.page_size, DetailFallback::Exclude).await?;

    let backend = HeadlessMap::new().with_container(CONTAINER, map_config.container_size);
    let mut surface = MapSurface::new(backend, CONTAINER).with_tiles(map_config.tiles.clone());
    surface
        .create_when_ready(
            map_config.center,
            map_config.zoom,
            map_config.retry_attempts,
            map_config.retry_delay,
        )
        .await?;

    let mut viewer = RouteViewer::open(surface, &map_config)?;
    let summary = viewer.render_routes(routes)?;

    tracing::info!(
        routes = summary.routes,
        markers = summary.markers,
        skipped_points = summary.skipped_points,
        "dashboard rendered"
    );

    let snapshot = viewer.surface().backend().snapshot(CONTAINER);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    viewer.close();

    Ok(())
}
