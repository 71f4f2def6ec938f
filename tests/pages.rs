use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use soccer_predictor::ingest::{
    ingest_game_records, ingest_odds, ingest_overunder, ingest_teams,
};
use soccer_predictor::pages::{
    OddsView, PageSource, SnapshotSource, parse_odds_page, parse_overunder_page,
    parse_schedule_page, parse_team_list,
};
use soccer_predictor::quotes::merge_odds;
use soccer_predictor::warehouse::{Venue, Warehouse};

fn snapshot_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("snapshots");
    path
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(snapshot_dir().join(name)).expect("fixture file should be readable")
}

#[test]
fn parses_team_list_fixture() {
    let teams = parse_team_list(&read_fixture("teams_2019-2020_36.html")).expect("parse");
    assert_eq!(teams.len(), 2);
    assert_eq!(teams[0].to_record(), vec!["19", "Arsenal"]);
    assert_eq!(teams[1].team_id, "25");
}

#[test]
fn parses_schedule_rows_of_every_layout() {
    let page = parse_schedule_page(&read_fixture("schedule_19_1.html")).expect("parse");
    assert_eq!(page.rows.len(), 3);
    assert_eq!(page.stats.rows_seen, 4);
    assert_eq!(page.stats.rows_dropped, 1);
    assert_eq!(page.stats.current17, 1);
    assert_eq!(page.stats.legacy16, 1);
    assert_eq!(page.stats.legacy15, 1);
    assert_eq!(page.stats.missing_match_id, 1);

    let (current, links) = &page.rows[0];
    assert_eq!(current.match_id, Some(100));
    assert_eq!(current.host_team, "Arsenal");
    assert_eq!(current.asian_line, "-0.5");
    assert_eq!(current.total_line, "大");
    assert_eq!(current.result_code, "胜");
    let url = links.url_record().expect("id plus seven links");
    assert_eq!(url[0], "100");
    assert_eq!(url[1], "http://info.win0168.com/cn/team/Summary/19.html");

    let (legacy16, links16) = &page.rows[1];
    assert_eq!(legacy16.asian_line, "");
    assert_eq!(legacy16.total_line, "小");
    assert_eq!(legacy16.result_code, "平");
    assert!(links16.url_record().is_none());

    let (legacy15, _) = &page.rows[2];
    assert_eq!(legacy15.match_id, None);
    assert_eq!(legacy15.total_line, "");
    assert_eq!(legacy15.result_code, "负");
    assert_eq!(legacy15.to_record()[0], "");
}

#[test]
fn odds_views_merge_into_warehouse_records() {
    let live = parse_odds_page(&read_fixture("odds_100_live.html")).expect("parse live");
    let initial = parse_odds_page(&read_fixture("odds_100_initial.html")).expect("parse initial");
    assert_eq!(live.len(), 2);
    assert_eq!(live[0].company, "Bet365");
    assert_eq!(live[0].prices, ["2.10", "3.40", "3.50"].map(String::from));

    let records = merge_odds(100, &live, &initial);
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[1],
        vec!["100", "William Hill", "2.05", "3.30", "3.60", "2.20", "3.20", "3.25"]
    );
}

#[test]
fn overunder_page_skips_summary_rows() {
    let records =
        parse_overunder_page(100, &read_fixture("overunder_100.html")).expect("parse");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0][1], "Bet365");
    assert_eq!(records[0][6], "2.5/3");
    assert!(records.iter().all(|r| r.len() == 8));
}

#[test]
fn snapshot_source_maps_pages_to_files() {
    let mut source = SnapshotSource::new(snapshot_dir());
    assert!(source.odds_page(100, OddsView::Initial).is_ok());
    assert!(source.odds_page(100, OddsView::Live).is_ok());
    assert!(source.odds_page(999, OddsView::Live).is_err());
    assert!(source.schedule_page(19, 2).is_err());
}

#[test]
fn snapshot_ingest_fills_every_table() {
    let warehouse = Warehouse::open_in_memory().expect("warehouse");
    let mut source = SnapshotSource::new(snapshot_dir());

    let teams = ingest_teams(&mut source, &warehouse, "2019-2020", 36).expect("teams");
    assert_eq!(teams.rows_written, 2);

    let records =
        ingest_game_records(&mut source, &warehouse, 19, 2, Duration::ZERO).expect("records");
    assert_eq!(records.pages_total, 2);
    assert_eq!(records.pages_succeeded, 1);
    assert_eq!(records.errors.len(), 1);
    assert_eq!(records.rows_written, 3);
    assert_eq!(records.url_rows_written, 1);
    assert_eq!(records.url_rows_skipped, 2);

    let games = warehouse.game_list("19", Venue::Home).expect("games");
    assert_eq!(games, vec![100, 101]);
    assert!(warehouse.game_list("19", Venue::Away).expect("away").is_empty());

    let odds = ingest_odds(&mut source, &warehouse, 19, Venue::Home, Duration::ZERO)
        .expect("odds");
    assert_eq!(odds.pages_succeeded, 1);
    assert_eq!(odds.rows_written, 2);
    assert_eq!(odds.errors.len(), 1);

    let ou = ingest_overunder(&mut source, &warehouse, 19, Venue::Home, Duration::ZERO)
        .expect("overunder");
    assert_eq!(ou.rows_written, 2);

    let labels = warehouse.fetch_results(&games).expect("labels");
    assert_eq!(labels.len(), 2);
    assert_eq!((labels[0].flat, labels[0].overunder), (Some(3), Some(1)));
    assert_eq!((labels[1].flat, labels[1].overunder), (Some(1), Some(0)));
}
