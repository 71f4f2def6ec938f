//! Page sources and HTML parsers for the scraped site.
//!
//! Rendering and clicking through pages belongs to a browser; this module
//! only needs the resulting HTML, either fetched over HTTP or read back from
//! pages saved to disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::config::ScraperConfig;
use crate::http_client::{fetch_html, http_client};
use crate::link_extract::RowLinks;
use crate::quotes::{ViewQuote, odds_prices, parse_overunder_row};
use crate::row_parser::{MatchRow, ParseStats, parse_row_with_layout};

const TEAM_PAGE_URL: &str = "http://zq.win007.com/cn/TeamHeadPage";
const SCHEDULE_URL: &str = "http://info.win0168.com/cn/team/TeamSche";
const ODDS_URL: &str = "http://vip.win0168.com/1x2/oddslist";
const OVERUNDER_URL: &str = "http://vip.win0168.com/OverDown_n.aspx";

/// Which column set the 1x2 odds table shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OddsView {
    Initial,
    Live,
}

impl OddsView {
    /// Option text of the view selector on the page.
    pub fn label(self) -> &'static str {
        match self {
            Self::Initial => "初盘",
            Self::Live => "即时盘",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Live => "live",
        }
    }
}

pub trait PageSource {
    fn team_page(&mut self, season: &str, league: u32) -> Result<String>;
    fn schedule_page(&mut self, team_id: u32, page: u32) -> Result<String>;
    fn odds_page(&mut self, match_id: u64, view: OddsView) -> Result<String>;
    fn overunder_page(&mut self, match_id: u64) -> Result<String>;
}

/// Fetches the server-rendered documents. Paging and view switching happen
/// client-side on the site, so every page/view maps to the same URL here.
pub struct HttpSource {
    client: Client,
    user_agent: String,
}

impl HttpSource {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            user_agent: config.user_agent.clone(),
        })
    }

    fn get(&self, url: &str) -> Result<String> {
        fetch_html(&self.client, url, &self.user_agent)
    }
}

impl PageSource for HttpSource {
    fn team_page(&mut self, season: &str, league: u32) -> Result<String> {
        self.get(&format!("{TEAM_PAGE_URL}/{season}/{league}.html"))
    }

    fn schedule_page(&mut self, team_id: u32, page: u32) -> Result<String> {
        if page > 1 {
            debug!(team_id, page, "http source serves the first schedule page only");
        }
        self.get(&format!("{SCHEDULE_URL}/{team_id}.html"))
    }

    fn odds_page(&mut self, match_id: u64, view: OddsView) -> Result<String> {
        debug!(match_id, view = view.label(), "fetching default odds view");
        self.get(&format!("{ODDS_URL}/{match_id}.htm"))
    }

    fn overunder_page(&mut self, match_id: u64) -> Result<String> {
        self.get(&format!("{OVERUNDER_URL}?id={match_id}&l=0"))
    }
}

/// Reads pages saved by a browser session:
/// `teams_{season}_{league}.html`, `schedule_{team}_{page}.html`,
/// `odds_{match}_{initial|live}.html`, `overunder_{match}.html`.
pub struct SnapshotSource {
    dir: PathBuf,
}

impl SnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        fs::read_to_string(&path).with_context(|| format!("read snapshot {}", path.display()))
    }
}

impl PageSource for SnapshotSource {
    fn team_page(&mut self, season: &str, league: u32) -> Result<String> {
        self.read(&format!("teams_{season}_{league}.html"))
    }

    fn schedule_page(&mut self, team_id: u32, page: u32) -> Result<String> {
        self.read(&format!("schedule_{team_id}_{page}.html"))
    }

    fn odds_page(&mut self, match_id: u64, view: OddsView) -> Result<String> {
        self.read(&format!("odds_{match_id}_{}.html", view.tag()))
    }

    fn overunder_page(&mut self, match_id: u64) -> Result<String> {
        self.read(&format!("overunder_{match_id}.html"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamEntry {
    pub team_id: String,
    pub team_name: String,
}

impl TeamEntry {
    pub fn to_record(&self) -> Vec<String> {
        vec![self.team_id.clone(), self.team_name.clone()]
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchedulePage {
    pub rows: Vec<(MatchRow, RowLinks)>,
    pub stats: ParseStats,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow!("invalid selector {css:?}: {err:?}"))
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Visible row text: non-empty cell texts joined by single spaces.
fn row_text(row: &ElementRef<'_>, cells: &Selector) -> String {
    row.select(cells)
        .map(|cell| element_text(&cell))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_team_list(html: &str) -> Result<Vec<TeamEntry>> {
    let doc = Html::parse_document(html);
    let cell_sel = selector(r#"td.name01[background="/Images/photo_s_2.gif"]"#)?;
    let link_sel = selector("a")?;

    let mut out = Vec::new();
    for cell in doc.select(&cell_sel) {
        let Some(link) = cell.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let last = href.rsplit('/').next().unwrap_or(href);
        let team_id = last.split('.').next().unwrap_or(last).to_string();
        if team_id.is_empty() {
            continue;
        }
        out.push(TeamEntry {
            team_id,
            team_name: element_text(&link),
        });
    }
    Ok(out)
}

pub fn parse_schedule_page(html: &str) -> Result<SchedulePage> {
    let doc = Html::parse_document(html);
    let row_sel = selector("div#div_Table2.data tr")?;
    let cell_sel = selector("td, th")?;
    let href_sel = selector("[href]")?;

    let mut page = SchedulePage::default();
    for row in doc.select(&row_sel) {
        let text = row_text(&row, &cell_sel);
        let parsed = parse_row_with_layout(&text).map(|(parsed, layout)| {
            let hrefs = row
                .select(&href_sel)
                .filter_map(|a| a.value().attr("href"))
                .collect::<Vec<_>>();
            let links = RowLinks::from_hrefs(&hrefs);
            (parsed.with_links(&links), links, layout)
        });
        page.stats.record(parsed.as_ref().map(|(row, _, layout)| (row, *layout)));
        if let Some((row, links, _)) = parsed {
            page.rows.push((row, links));
        }
    }
    Ok(page)
}

/// Rows flagged as mainstream companies in the 1x2 odds table.
pub fn parse_odds_page(html: &str) -> Result<Vec<ViewQuote>> {
    let doc = Html::parse_document(html);
    let row_sel = selector("table#oddsList_tab tr")?;
    let flag_sel = selector(r#"td a[title="主流公司"]"#)?;
    let link_sel = selector("a")?;
    let cell_sel = selector("td")?;

    let mut out = Vec::new();
    for row in doc.select(&row_sel) {
        if row.select(&flag_sel).next().is_none() {
            continue;
        }
        let Some(company) = row.select(&link_sel).next().map(|a| element_text(&a)) else {
            continue;
        };
        let Some(prices) = odds_prices(&row_text(&row, &cell_sel)) else {
            debug!(company = %company, "odds row without three prices");
            continue;
        };
        out.push(ViewQuote { company, prices });
    }
    Ok(out)
}

/// `tmp.game_overunder` records for one match. The last two data rows of the
/// table are summary lines and are skipped.
pub fn parse_overunder_page(match_id: u64, html: &str) -> Result<Vec<Vec<String>>> {
    let doc = Html::parse_document(html);
    let row_sel = selector("table#odds tr")?;
    let marker_sel = selector(r#"td[height="25"]"#)?;
    let cell_sel = selector("td")?;

    let rows = doc
        .select(&row_sel)
        .filter(|row| row.select(&marker_sel).next().is_some())
        .collect::<Vec<_>>();
    let keep = rows.len().saturating_sub(2);

    Ok(rows[..keep]
        .iter()
        .map(|row| row_text(row, &cell_sel))
        .filter(|text| !text.is_empty())
        .filter_map(|text| parse_overunder_row(match_id, &text))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_ids_come_from_href_stem() {
        let html = r#"<table><tr>
            <td background="/Images/photo_s_2.gif" class="name01"><a href="/cn/team/Summary/19.html">Arsenal</a></td>
            <td background="/Images/photo_s_2.gif" class="name01"><a href="/cn/team/Summary/25.html">Chelsea</a></td>
            <td class="name01"><a href="/cn/team/Summary/99.html">Ignored</a></td>
        </tr></table>"#;
        let teams = parse_team_list(html).expect("parse");
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].team_id, "19");
        assert_eq!(teams[1].team_name, "Chelsea");
    }

    #[test]
    fn snapshot_names() {
        assert_eq!(OddsView::Initial.tag(), "initial");
        assert_eq!(OddsView::Live.label(), "即时盘");
    }
}
