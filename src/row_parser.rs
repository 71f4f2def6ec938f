//! Positional parsing of one schedule-table row.
//!
//! The schedule page has gone through three column layouts over the years.
//! A row is recognised purely by how many single-space separated tokens its
//! text splits into; anything else (headers, ads, spacer rows) is dropped and
//! only counted.

use serde::{Deserialize, Serialize};

use crate::link_extract::RowLinks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowLayout {
    /// Before 2005: no asian-line or total-line columns.
    Legacy15,
    /// Before 2013: total-line column but no asian line.
    Legacy16,
    Current17,
}

impl RowLayout {
    pub fn from_token_count(count: usize) -> Option<Self> {
        match count {
            15 => Some(Self::Legacy15),
            16 => Some(Self::Legacy16),
            17 => Some(Self::Current17),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRow {
    pub match_id: Option<u64>,
    pub league: String,
    pub date: String,
    pub time: String,
    pub host_team: String,
    pub full_score: String,
    pub guest_team: String,
    pub half_score: String,
    pub asian_line: String,
    pub total_line: String,
    pub result_code: String,
}

impl MatchRow {
    pub fn with_links(mut self, links: &RowLinks) -> Self {
        self.match_id = links.match_id;
        self
    }

    /// Column order of `tmp.game_record`. A missing id is written as the
    /// empty string, which is what the page gives us when no analysis link
    /// exists.
    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.match_id.map(|id| id.to_string()).unwrap_or_default(),
            self.league.clone(),
            self.date.clone(),
            self.time.clone(),
            self.host_team.clone(),
            self.full_score.clone(),
            self.guest_team.clone(),
            self.half_score.clone(),
            self.asian_line.clone(),
            self.total_line.clone(),
            self.result_code.clone(),
        ]
    }
}

/// Per-run counters so dropped rows are visible without per-row log noise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    pub rows_seen: usize,
    pub rows_parsed: usize,
    pub rows_dropped: usize,
    pub legacy15: usize,
    pub legacy16: usize,
    pub current17: usize,
    pub missing_match_id: usize,
}

impl ParseStats {
    /// Counts one row of input: `None` for a dropped row, otherwise the
    /// parsed row with the layout it was recognised by.
    pub fn record(&mut self, parsed: Option<(&MatchRow, RowLayout)>) {
        self.rows_seen += 1;
        let Some((row, layout)) = parsed else {
            self.rows_dropped += 1;
            return;
        };
        self.rows_parsed += 1;
        match layout {
            RowLayout::Legacy15 => self.legacy15 += 1,
            RowLayout::Legacy16 => self.legacy16 += 1,
            RowLayout::Current17 => self.current17 += 1,
        }
        if row.match_id.is_none() {
            self.missing_match_id += 1;
        }
    }

    pub fn merge(&mut self, other: &ParseStats) {
        self.rows_seen += other.rows_seen;
        self.rows_parsed += other.rows_parsed;
        self.rows_dropped += other.rows_dropped;
        self.legacy15 += other.legacy15;
        self.legacy16 += other.legacy16;
        self.current17 += other.current17;
        self.missing_match_id += other.missing_match_id;
    }
}

pub fn detect_layout(text: &str) -> Option<RowLayout> {
    RowLayout::from_token_count(text.split(' ').count())
}

/// Returns `None` for any token count other than 15, 16 or 17. Field content
/// is not validated.
pub fn parse_match_row(text: &str) -> Option<MatchRow> {
    parse_row_with_layout(text).map(|(row, _)| row)
}

/// Like [`parse_match_row`], also reporting which layout matched.
pub fn parse_row_with_layout(text: &str) -> Option<(MatchRow, RowLayout)> {
    let tokens = text.split(' ').collect::<Vec<_>>();
    let layout = RowLayout::from_token_count(tokens.len())?;
    let field = |idx: usize| tokens[idx].to_string();

    let (asian_line, total_line, result_code) = match layout {
        RowLayout::Legacy15 => (String::new(), String::new(), field(7)),
        RowLayout::Legacy16 => (String::new(), field(7), field(8)),
        RowLayout::Current17 => (field(7), field(8), field(9)),
    };

    let row = MatchRow {
        match_id: None,
        league: field(0),
        date: field(1),
        time: field(2),
        host_team: field(3),
        full_score: field(4),
        guest_team: field(5),
        half_score: field(6),
        asian_line,
        total_line,
        result_code,
    };
    Some((row, layout))
}
