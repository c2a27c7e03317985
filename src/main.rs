use std::sync::Arc;

use tracing::info;

use slotgrid::api::StaticToken;
use slotgrid::api::http::HttpSource;
use slotgrid::config::Config;
use slotgrid::planner::Planner;
use slotgrid::planning::StatsRange;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    slotgrid::observability::init(config.metrics_port)?;

    let today = config
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    info!("slotgrid against {}", config.api_url);
    info!("  reference date: {today}");
    info!("  token: {}", if config.api_token.is_some() { "set" } else { "none" });
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let tokens = Arc::new(StaticToken::new(config.api_token.clone()));
    let source = HttpSource::new(&config.api_url, config.timeout, tokens)?;
    let planner = Planner::new(Arc::new(source), config.ttls);

    let report = planner.week(today).await?;
    let catalog = planner.catalog().await?;
    println!("week of {today}");
    for (date, grid) in report.week.iter() {
        println!(
            "  {date}  {:>3}/{:<3} room cells booked, {} equipment",
            grid.booked_cells(),
            grid.total_cells(),
            grid.equipment_bookings()
        );
        for row in grid.rows() {
            for (room, cell) in &row.rooms {
                let Some(b) = cell.booking() else { continue };
                let name = catalog
                    .resource(slotgrid::model::ResourceKind::Room, *room)
                    .map_or("?", |r| r.name.as_str());
                println!(
                    "    {} {}-{}  {name}  {}",
                    row.slot.name,
                    row.slot.start,
                    row.slot.end,
                    b.subject.as_deref().unwrap_or("")
                );
            }
        }
    }
    if let Some(warning) = &report.warning {
        println!("  warning: {warning}");
    }
    if !report.anomalies.is_empty() {
        println!("  {} anomalies (see log)", report.anomalies.len());
    }

    match planner.stats_for(StatsRange::Last30Days, today).await {
        Ok(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        Err(e) => tracing::error!("statistics unavailable: {e}"),
    }
    match planner.totals().await {
        Ok(totals) => println!(
            "all time: {} room and {} equipment bookings",
            totals.rooms, totals.equipment
        ),
        Err(e) => tracing::warn!("backend totals unavailable: {e}"),
    }

    Ok(())
}
