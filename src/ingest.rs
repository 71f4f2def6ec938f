//! Scrape, parse and upsert runs. Each routine pulls pages from a
//! [`PageSource`], parses them and writes through
//! [`Warehouse::upsert_rows`]. A page that fails to load or parse is logged
//! and skipped; the run keeps going.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::pages::{
    OddsView, PageSource, parse_odds_page, parse_overunder_page, parse_schedule_page,
    parse_team_list,
};
use crate::quotes::merge_odds;
use crate::row_parser::ParseStats;
use crate::warehouse::{Venue, Warehouse, WarehouseTable};

const MAX_ERRORS_KEPT: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub pages_total: usize,
    pub pages_succeeded: usize,
    pub rows_written: usize,
    pub url_rows_written: usize,
    pub url_rows_skipped: usize,
    pub stats: ParseStats,
    pub errors: Vec<String>,
}

impl IngestReport {
    fn push_error(&mut self, message: String) {
        if self.errors.len() < MAX_ERRORS_KEPT {
            self.errors.push(message);
        }
    }
}

pub fn ingest_teams(
    source: &mut dyn PageSource,
    warehouse: &Warehouse,
    season: &str,
    league: u32,
) -> Result<IngestReport> {
    let html = source
        .team_page(season, league)
        .with_context(|| format!("team page {season}/{league}"))?;
    let teams = parse_team_list(&html)?;
    if teams.is_empty() {
        warn!(season, league, "team page listed no teams");
    }
    let rows = teams.iter().map(|t| t.to_record()).collect::<Vec<_>>();
    let written = warehouse.upsert_rows(WarehouseTable::TeamList.name(), &rows)?;
    info!(season, league, teams = written, "team list ingested");
    Ok(IngestReport {
        pages_total: 1,
        pages_succeeded: 1,
        rows_written: written,
        ..IngestReport::default()
    })
}

/// Schedule pages `1..=pages` for one team into `tmp.game_record` and
/// `tmp.game_record_url`.
pub fn ingest_game_records(
    source: &mut dyn PageSource,
    warehouse: &Warehouse,
    team_id: u32,
    pages: u32,
    delay: Duration,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    for page in 1..=pages {
        if page > 1 && !delay.is_zero() {
            thread::sleep(delay);
        }
        report.pages_total += 1;

        let parsed = source
            .schedule_page(team_id, page)
            .and_then(|html| parse_schedule_page(&html));
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                error!(team_id, page, error = %err, "schedule page failed");
                report.push_error(format!("page {page}: {err:#}"));
                continue;
            }
        };

        let records = parsed
            .rows
            .iter()
            .map(|(row, _)| row.to_record())
            .collect::<Vec<_>>();
        let mut url_records = Vec::new();
        for (_, links) in &parsed.rows {
            match links.url_record() {
                Some(record) => url_records.push(record),
                None => report.url_rows_skipped += 1,
            }
        }

        report.rows_written +=
            warehouse.upsert_rows(WarehouseTable::GameRecord.name(), &records)?;
        report.url_rows_written +=
            warehouse.upsert_rows(WarehouseTable::GameRecordUrl.name(), &url_records)?;
        report.stats.merge(&parsed.stats);
        report.pages_succeeded += 1;
        debug!(team_id, page, rows = records.len(), "schedule page ingested");
    }

    info!(
        team_id,
        pages = report.pages_total,
        ok = report.pages_succeeded,
        rows = report.rows_written,
        url_rows = report.url_rows_written,
        url_skipped = report.url_rows_skipped,
        stats = ?report.stats,
        "game records ingested"
    );
    if report.stats.rows_dropped > 0 {
        warn!(
            team_id,
            dropped = report.stats.rows_dropped,
            seen = report.stats.rows_seen,
            "schedule rows with an unknown layout were dropped"
        );
    }
    Ok(report)
}

/// 1x2 odds for every home or away game of the team, one match at a time.
pub fn ingest_odds(
    source: &mut dyn PageSource,
    warehouse: &Warehouse,
    team_id: u32,
    venue: Venue,
    delay: Duration,
) -> Result<IngestReport> {
    let games = warehouse.game_list(&team_id.to_string(), venue)?;
    let mut report = IngestReport::default();
    for (idx, match_id) in games.into_iter().enumerate() {
        if idx > 0 && !delay.is_zero() {
            thread::sleep(delay);
        }
        report.pages_total += 1;
        let fetched = fetch_odds_records(source, match_id);
        let records = match fetched {
            Ok(records) => records,
            Err(err) => {
                error!(match_id, error = %err, "odds page failed");
                report.push_error(format!("match {match_id}: {err:#}"));
                continue;
            }
        };
        report.rows_written += warehouse.upsert_rows(WarehouseTable::GameOdds.name(), &records)?;
        report.pages_succeeded += 1;
    }
    info!(
        team_id,
        ?venue,
        matches = report.pages_succeeded,
        rows = report.rows_written,
        "odds ingested"
    );
    Ok(report)
}

fn fetch_odds_records(source: &mut dyn PageSource, match_id: u64) -> Result<Vec<Vec<String>>> {
    let live = parse_odds_page(&source.odds_page(match_id, OddsView::Live)?)?;
    let initial = parse_odds_page(&source.odds_page(match_id, OddsView::Initial)?)?;
    if live.len() != initial.len() {
        debug!(
            match_id,
            live = live.len(),
            initial = initial.len(),
            "odds views differ in length"
        );
    }
    Ok(merge_odds(match_id, &live, &initial))
}

pub fn ingest_overunder(
    source: &mut dyn PageSource,
    warehouse: &Warehouse,
    team_id: u32,
    venue: Venue,
    delay: Duration,
) -> Result<IngestReport> {
    let games = warehouse.game_list(&team_id.to_string(), venue)?;
    let mut report = IngestReport::default();
    for (idx, match_id) in games.into_iter().enumerate() {
        if idx > 0 && !delay.is_zero() {
            thread::sleep(delay);
        }
        report.pages_total += 1;
        let fetched = source
            .overunder_page(match_id)
            .and_then(|html| parse_overunder_page(match_id, &html));
        let records = match fetched {
            Ok(records) => records,
            Err(err) => {
                error!(match_id, error = %err, "over/under page failed");
                report.push_error(format!("match {match_id}: {err:#}"));
                continue;
            }
        };
        report.rows_written +=
            warehouse.upsert_rows(WarehouseTable::GameOverUnder.name(), &records)?;
        report.pages_succeeded += 1;
    }
    info!(
        team_id,
        ?venue,
        matches = report.pages_succeeded,
        rows = report.rows_written,
        "over/under ingested"
    );
    Ok(report)
}
