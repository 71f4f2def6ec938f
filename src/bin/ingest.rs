use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use soccer_predictor::cli::{arg_value, parse_arg};
use soccer_predictor::config::Settings;
use soccer_predictor::ingest::{
    IngestReport, ingest_game_records, ingest_odds, ingest_overunder, ingest_teams,
};
use soccer_predictor::logging::init_tracing;
use soccer_predictor::pages::{HttpSource, PageSource, SnapshotSource};
use soccer_predictor::warehouse::{Venue, Warehouse};

const USAGE: &str = "usage: ingest teams --season <2019-2020> --league <id>\n       \
ingest records --team <id> [--pages N]\n       \
ingest odds|overunder --team <id> --venue home|away\n       \
common: [--snapshots <dir>]";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
    let settings = Settings::from_env();
    init_tracing(&settings.log)?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(command) = args.first().map(String::as_str) else {
        return Err(anyhow!("{USAGE}"));
    };

    let warehouse = Warehouse::open(&settings.warehouse)?;
    let snapshot_dir = arg_value(&args, "--snapshots")
        .map(PathBuf::from)
        .or_else(|| settings.scraper.snapshot_dir.clone());
    let mut source: Box<dyn PageSource> = match snapshot_dir {
        Some(dir) => Box::new(SnapshotSource::new(dir)),
        None => Box::new(HttpSource::new(&settings.scraper)?),
    };
    let delay = settings.scraper.page_delay;

    let report = match command {
        "teams" => {
            let season = arg_value(&args, "--season").context("--season is required")?;
            let league = parse_arg::<u32>(&args, "--league")?.context("--league is required")?;
            ingest_teams(source.as_mut(), &warehouse, &season, league)?
        }
        "records" => {
            let team = parse_arg::<u32>(&args, "--team")?.context("--team is required")?;
            let pages = parse_arg::<u32>(&args, "--pages")?.unwrap_or(1).max(1);
            ingest_game_records(source.as_mut(), &warehouse, team, pages, delay)?
        }
        "odds" | "overunder" => {
            let team = parse_arg::<u32>(&args, "--team")?.context("--team is required")?;
            let venue = arg_value(&args, "--venue")
                .as_deref()
                .and_then(Venue::parse)
                .context("--venue home|away is required")?;
            if command == "odds" {
                ingest_odds(source.as_mut(), &warehouse, team, venue, delay)?
            } else {
                ingest_overunder(source.as_mut(), &warehouse, team, venue, delay)?
            }
        }
        other => return Err(anyhow!("unknown command {other:?}\n{USAGE}")),
    };

    print_report(command, &report);
    Ok(())
}

fn print_report(command: &str, report: &IngestReport) {
    println!("Ingest {command} complete");
    println!("Pages: {}/{}", report.pages_succeeded, report.pages_total);
    println!("Rows upserted: {}", report.rows_written);
    if report.url_rows_written + report.url_rows_skipped > 0 {
        println!(
            "Url rows: {} written, {} skipped",
            report.url_rows_written, report.url_rows_skipped
        );
    }
    if report.stats.rows_seen > 0 {
        println!(
            "Rows seen={} parsed={} dropped={} missing_id={}",
            report.stats.rows_seen,
            report.stats.rows_parsed,
            report.stats.rows_dropped,
            report.stats.missing_match_id
        );
    }
    if !report.errors.is_empty() {
        println!("  errors: {}", report.errors.len());
        for err in report.errors.iter().take(6) {
            println!("   - {err}");
        }
    }
}
