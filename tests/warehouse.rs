use soccer_predictor::PipelineError;
use soccer_predictor::quotes::CellValue;
use soccer_predictor::reshape::{DuplicatePolicy, TOP_COMPANIES, reshape_table};
use soccer_predictor::warehouse::{QuoteTable, Venue, Warehouse, WarehouseTable};

fn odds_row(match_id: u64, company: &str, f1: &str) -> Vec<String> {
    let id = match_id.to_string();
    [id.as_str(), company, f1, "3.20", "3.50", "2.25", "3.25", "3.20"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn seeded() -> Warehouse {
    let wh = Warehouse::open_in_memory().expect("warehouse");
    wh.upsert_rows(
        WarehouseTable::TeamList.name(),
        &[vec!["19", "Arsenal"], vec!["25", "Chelsea"]],
    )
    .expect("teams");
    let games = [
        ["100", "英超", "2019-08-11", "21:00", "Arsenal", "2-1", "Chelsea", "1-0", "-0.5", "大", "胜"],
        ["101", "英超", "2019-09-01", "21:00", "Chelsea", "1-1", "Arsenal", "0-0", "0", "小", "平"],
        ["102", "英超", "2019-10-05", "21:00", "Arsenal", "0-1", "Chelsea", "0-0", "-0.25", "小", "负"],
    ];
    wh.upsert_rows(WarehouseTable::GameRecord.name(), &games)
        .expect("games");
    wh
}

#[test]
fn unknown_tables_are_rejected_before_any_query() {
    let wh = Warehouse::open_in_memory().expect("warehouse");
    for name in ["tmp.players", "team_list", "tmp.team_list; DROP TABLE x", ""] {
        let err = wh.upsert_rows(name, &[vec!["1", "a"]]).unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<PipelineError>(),
                Some(PipelineError::InvalidTable(t)) if t == name
            ),
            "{name}"
        );
    }
    assert!(WarehouseTable::from_name("tmp.game_odds").is_ok());
}

#[test]
fn upsert_replaces_on_primary_key() {
    let wh = seeded();
    wh.upsert_rows(WarehouseTable::TeamList.name(), &[vec!["19", "Arsenal FC"]])
        .expect("replace");
    assert_eq!(
        wh.team_name("19").expect("query").as_deref(),
        Some("Arsenal FC")
    );
    let count: i64 = wh
        .connection()
        .query_row("SELECT COUNT(*) FROM tmp.team_list", [], |row| row.get(0))
        .expect("count");
    assert_eq!(count, 2);
}

#[test]
fn failed_row_keeps_earlier_rows_and_stops_the_batch() {
    let wh = Warehouse::open_in_memory().expect("warehouse");
    let rows = [vec!["1", "a"], vec!["2"], vec!["3", "c"]];
    let err = wh.upsert_rows(WarehouseTable::TeamList.name(), &rows).unwrap_err();
    assert!(format!("{err:#}").contains("row 1"), "{err:#}");

    assert_eq!(wh.team_name("1").expect("query").as_deref(), Some("a"));
    assert_eq!(wh.team_name("3").expect("query"), None);
    let count: i64 = wh
        .connection()
        .query_row("SELECT COUNT(*) FROM tmp.team_list", [], |row| row.get(0))
        .expect("count");
    assert_eq!(count, 1);
}

#[test]
fn empty_batch_writes_nothing() {
    let wh = Warehouse::open_in_memory().expect("warehouse");
    let rows: Vec<Vec<String>> = Vec::new();
    assert_eq!(wh.upsert_rows(WarehouseTable::GameOdds.name(), &rows).expect("empty"), 0);
}

#[test]
fn game_list_splits_home_and_away() {
    let wh = seeded();
    assert_eq!(wh.game_list("19", Venue::Home).expect("home"), vec![100, 102]);
    assert_eq!(wh.game_list("19", Venue::Away).expect("away"), vec![101]);
    assert!(wh.game_list("404", Venue::Home).expect("unknown").is_empty());
}

#[test]
fn results_translate_to_numeric_labels() {
    let wh = seeded();
    let labels = wh.fetch_results(&[100, 101, 102, 999]).expect("labels");
    let flat = labels.iter().map(|l| l.flat).collect::<Vec<_>>();
    let ou = labels.iter().map(|l| l.overunder).collect::<Vec<_>>();
    assert_eq!(flat, vec![Some(3), Some(1), Some(0)]);
    assert_eq!(ou, vec![Some(1), Some(0), Some(0)]);
}

#[test]
fn reshaper_keeps_top_companies_one_row_per_match() {
    let wh = seeded();
    let mut rows = Vec::new();
    for c in 0..12u64 {
        let company = format!("c{c:02}");
        // c00..c09 quote every match, c10 and c11 only one.
        let matches: &[u64] = if c < 10 { &[100, 101, 102] } else { &[100] };
        for &m in matches {
            rows.push(odds_row(m, &company, "2.10"));
        }
    }
    wh.upsert_rows(WarehouseTable::GameOdds.name(), &rows)
        .expect("odds");

    let top = wh.top_companies(QuoteTable::Odds, TOP_COMPANIES).expect("top");
    assert_eq!(top.len(), 10);
    assert!(top.iter().all(|c| c.as_str() < "c10"));

    let frame = reshape_table(
        &wh,
        QuoteTable::Odds,
        &[100, 101, 102],
        TOP_COMPANIES,
        DuplicatePolicy::FirstWins,
    )
    .expect("reshape");
    assert_eq!(frame.match_ids(), vec![100, 101, 102]);
    assert_eq!(frame.columns.len(), 60);
    assert_eq!(frame.columns[0], "f1_odds_c00");
    assert_eq!(frame.columns[59], "o3_odds_c09");
    assert_eq!(frame.cell(101, "f1_odds_c03"), Some(&CellValue::Number(2.1)));
}

#[test]
fn equal_quote_counts_rank_by_company_name() {
    let wh = seeded();
    let companies = ["z", "y", "x", "a", "b", "c", "d", "e", "f", "g", "h"];
    let rows = companies
        .iter()
        .map(|company| odds_row(100, company, "2.10"))
        .collect::<Vec<_>>();
    wh.upsert_rows(WarehouseTable::GameOdds.name(), &rows)
        .expect("odds");

    let top = wh.top_companies(QuoteTable::Odds, 10).expect("top");
    assert_eq!(top, vec!["a", "b", "c", "d", "e", "f", "g", "h", "x", "y"]);
}

#[test]
fn fractional_lines_become_midpoints() {
    let wh = seeded();
    let rows = vec![
        vec!["100", "Bet365", "0.90", "2.5/3", "0.95", "0.85", "N/A", "1.00"],
        vec!["101", "Bet365", "0.90", "3/2", "0.95", "0.85", "-", "1.00"],
    ];
    wh.upsert_rows(WarehouseTable::GameOverUnder.name(), &rows)
        .expect("overunder");
    let frame = reshape_table(
        &wh,
        QuoteTable::OverUnder,
        &[100, 101],
        TOP_COMPANIES,
        DuplicatePolicy::FirstWins,
    )
    .expect("reshape");
    assert_eq!(frame.cell(100, "f2_overunder_Bet365"), Some(&CellValue::Number(2.75)));
    assert_eq!(frame.cell(101, "f2_overunder_Bet365"), Some(&CellValue::Number(2.5)));
    assert_eq!(
        frame.cell(100, "o2_overunder_Bet365"),
        Some(&CellValue::Text("N/A".to_string()))
    );
    assert_eq!(
        frame.cell(101, "o2_overunder_Bet365"),
        Some(&CellValue::Text("-".to_string()))
    );
}

#[test]
fn empty_match_list_gives_empty_frame() {
    let wh = seeded();
    let frame = reshape_table(
        &wh,
        QuoteTable::Odds,
        &[],
        TOP_COMPANIES,
        DuplicatePolicy::FirstWins,
    )
    .expect("reshape");
    assert!(frame.is_empty());
    assert!(frame.columns.is_empty());
}
