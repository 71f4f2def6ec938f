//! The relational side of the pipeline: an embedded SQLite database attached
//! under the schema name `tmp`, so the historical table names work verbatim.
//!
//! A `Warehouse` owns its connection. Components borrow it for the duration
//! of a call; there is no shared cursor.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params, params_from_iter};
use tracing::{debug, error, info, warn};

use crate::PipelineError;
use crate::config::WarehouseConfig;
use crate::features::ResultLabel;
use crate::logging::truncate_sql;
use crate::quotes::{CellValue, QuoteRow};

const ID_CHUNK: usize = 500;

/// Tables the write path accepts. Anything else is rejected before SQL is
/// built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarehouseTable {
    TeamList,
    GameRecord,
    GameRecordUrl,
    GameOdds,
    GameOverUnder,
}

impl WarehouseTable {
    pub const ALL: [WarehouseTable; 5] = [
        Self::TeamList,
        Self::GameRecord,
        Self::GameRecordUrl,
        Self::GameOdds,
        Self::GameOverUnder,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::TeamList => "tmp.team_list",
            Self::GameRecord => "tmp.game_record",
            Self::GameRecordUrl => "tmp.game_record_url",
            Self::GameOdds => "tmp.game_odds",
            Self::GameOverUnder => "tmp.game_overunder",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, PipelineError> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| PipelineError::InvalidTable(name.to_string()))
    }
}

/// Long-format quote tables the reshaper reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteTable {
    Odds,
    OverUnder,
}

impl QuoteTable {
    pub fn table(self) -> WarehouseTable {
        match self {
            Self::Odds => WarehouseTable::GameOdds,
            Self::OverUnder => WarehouseTable::GameOverUnder,
        }
    }

    pub fn name(self) -> &'static str {
        self.table().name()
    }

    /// Second `_` token of the unqualified table name: `odds` / `overunder`.
    pub fn source_flag(self) -> &'static str {
        let name = self.name();
        let bare = name.split('.').nth(1).unwrap_or(name);
        bare.split('_').nth(1).unwrap_or(bare)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Venue {
    Home,
    Away,
}

impl Venue {
    /// Historical 0/1 flag used in model file names.
    pub fn flag(self) -> u8 {
        match self {
            Self::Home => 0,
            Self::Away => 1,
        }
    }

    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Self::Home),
            1 => Some(Self::Away),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" | "h" | "0" => Some(Self::Home),
            "away" | "a" | "g" | "1" => Some(Self::Away),
            _ => None,
        }
    }

    fn team_column(self) -> &'static str {
        match self {
            Self::Home => "host_team",
            Self::Away => "guest_team",
        }
    }
}

pub struct Warehouse {
    conn: Connection,
}

impl Warehouse {
    pub fn open(config: &WarehouseConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .inspect_err(|err| error!(error = %err, "warehouse connection failed"))
            .context("open warehouse connection")?;
        conn.busy_timeout(config.timeout)
            .context("set warehouse busy timeout")?;

        let target = attach_target(&config.path)?;
        conn.execute("ATTACH DATABASE ?1 AS tmp", params![target])
            .inspect_err(|err| {
                error!(path = %config.path.display(), error = %err, "warehouse attach failed")
            })
            .with_context(|| format!("attach warehouse {}", config.path.display()))?;

        let warehouse = Self { conn };
        warehouse.init_schema()?;
        debug!(path = %config.path.display(), "warehouse ready");
        Ok(warehouse)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(&WarehouseConfig::in_memory())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS tmp.team_list (
                    team_id TEXT PRIMARY KEY,
                    team_name TEXT
                );
                CREATE TABLE IF NOT EXISTS tmp.game_record (
                    id TEXT PRIMARY KEY,
                    league TEXT,
                    date TEXT,
                    time TEXT,
                    host_team TEXT,
                    full_score TEXT,
                    guest_team TEXT,
                    half_score TEXT,
                    asian_line TEXT,
                    total_line TEXT,
                    result TEXT
                );
                CREATE INDEX IF NOT EXISTS tmp.idx_game_record_host ON game_record(host_team);
                CREATE INDEX IF NOT EXISTS tmp.idx_game_record_guest ON game_record(guest_team);
                CREATE TABLE IF NOT EXISTS tmp.game_record_url (
                    id TEXT PRIMARY KEY,
                    host_homepage TEXT,
                    game_record TEXT,
                    guest_homepage TEXT,
                    game_analysis TEXT,
                    asian_odds_url TEXT,
                    overunder_odds_url TEXT,
                    euro_odds_url TEXT
                );
                CREATE TABLE IF NOT EXISTS tmp.game_odds (
                    id TEXT NOT NULL,
                    company TEXT NOT NULL,
                    f1 TEXT, f2 TEXT, f3 TEXT,
                    o1 TEXT, o2 TEXT, o3 TEXT,
                    PRIMARY KEY (id, company)
                );
                CREATE TABLE IF NOT EXISTS tmp.game_overunder (
                    id TEXT NOT NULL,
                    company TEXT NOT NULL,
                    f1 TEXT, f2 TEXT, f3 TEXT,
                    o1 TEXT, o2 TEXT, o3 TEXT,
                    PRIMARY KEY (id, company)
                );
                "#,
            )
            .context("create warehouse schema")?;
        Ok(())
    }

    /// Insert-or-replace every row into `table_name`, one statement per row.
    ///
    /// There is no transaction around the batch: a failure part way through
    /// leaves the earlier rows written, and re-running the batch repairs it.
    pub fn upsert_rows<R, S>(&self, table_name: &str, rows: &[R]) -> Result<usize>
    where
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        let table = WarehouseTable::from_name(table_name)
            .inspect_err(|err| error!(table = table_name, "{err}"))?;

        let mut written = 0usize;
        for (idx, row) in rows.iter().enumerate() {
            let values = row.as_ref();
            let placeholders = (1..=values.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(",");
            let sql = format!(
                "INSERT OR REPLACE INTO {} VALUES({placeholders})",
                table.name()
            );
            let mut stmt = self
                .conn
                .prepare_cached(&sql)
                .inspect_err(|err| {
                    error!(
                        table = table.name(),
                        row = idx,
                        sql = %truncate_sql(&sql),
                        error = %err,
                        "upsert prepare failed"
                    )
                })
                .with_context(|| format!("prepare upsert row {idx} into {}", table.name()))?;
            stmt.execute(params_from_iter(values.iter().map(|v| v.as_ref())))
                .inspect_err(|err| {
                    error!(
                        table = table.name(),
                        row = idx,
                        sql = %truncate_sql(&sql),
                        error = %err,
                        "upsert failed"
                    )
                })
                .with_context(|| format!("upsert row {idx} into {}", table.name()))?;
            written += 1;
        }

        debug!(table = table.name(), rows = written, "upsert complete");
        Ok(written)
    }

    pub fn team_name(&self, team_id: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT DISTINCT team_name FROM tmp.team_list WHERE team_id = ?1")
            .context("prepare team name query")?;
        let mut rows = stmt
            .query(params![team_id])
            .context("query team name")?;
        match rows.next().context("read team name")? {
            Some(row) => Ok(row.get::<_, Option<String>>(0)?),
            None => Ok(None),
        }
    }

    /// Ids of the team's home or away games. An unknown team is a valid empty
    /// result.
    pub fn game_list(&self, team_id: &str, venue: Venue) -> Result<Vec<u64>> {
        let Some(team_name) = self.team_name(team_id)? else {
            warn!(team_id, "team not found in tmp.team_list");
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT id FROM tmp.game_record WHERE {} = ?1",
            venue.team_column()
        );
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .context("prepare game list query")?;
        let rows = stmt
            .query_map(params![team_name], |row| row.get::<_, Option<String>>(0))
            .inspect_err(|err| {
                error!(team_id, sql = %truncate_sql(&sql), error = %err, "game list query failed")
            })
            .context("query game list")?;

        let mut ids = Vec::new();
        let mut skipped = 0usize;
        for row in rows {
            let raw = row.context("decode game id")?;
            match raw.as_deref().and_then(|s| s.trim().parse::<u64>().ok()) {
                Some(id) => ids.push(id),
                None => skipped += 1,
            }
        }
        ids.sort_unstable();
        ids.dedup();
        if skipped > 0 {
            debug!(team_id, skipped, "skipped game rows without a numeric id");
        }
        if ids.is_empty() {
            warn!(team_id, team_name = %team_name, ?venue, "no games recorded for team");
        }
        Ok(ids)
    }

    /// Most quoted companies in a table. Ties go to the lexically smaller name
    /// so repeated runs over the same data agree.
    pub fn top_companies(&self, table: QuoteTable, limit: usize) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT company FROM {} GROUP BY company ORDER BY COUNT(*) DESC, company ASC LIMIT ?1",
            table.name()
        );
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .context("prepare top companies query")?;
        let rows = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))
            .inspect_err(|err| {
                error!(sql = %truncate_sql(&sql), error = %err, "top companies query failed")
            })
            .context("query top companies")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode company")?);
        }
        Ok(out)
    }

    pub fn fetch_quotes(
        &self,
        table: QuoteTable,
        companies: &[String],
        match_ids: &[u64],
    ) -> Result<Vec<QuoteRow>> {
        if companies.is_empty() || match_ids.is_empty() {
            return Ok(Vec::new());
        }

        let company_marks = placeholders(1, companies.len());
        let mut out = Vec::new();
        for chunk in match_ids.chunks(ID_CHUNK) {
            let id_marks = placeholders(companies.len() + 1, chunk.len());
            let sql = format!(
                "SELECT id, company, f1, f2, f3, o1, o2, o3 FROM {} \
                 WHERE company IN ({company_marks}) AND id IN ({id_marks}) \
                 ORDER BY rowid",
                table.name()
            );
            let mut bound: Vec<String> = companies.to_vec();
            bound.extend(chunk.iter().map(|id| id.to_string()));

            let mut stmt = self
                .conn
                .prepare(&sql)
                .inspect_err(|err| {
                    error!(sql = %truncate_sql(&sql), error = %err, "quote query prepare failed")
                })
                .context("prepare quote query")?;
            let rows = stmt
                .query_map(params_from_iter(bound.iter()), |row| {
                    let mut raw = Vec::with_capacity(8);
                    for i in 0..8 {
                        raw.push(row.get::<_, Option<String>>(i)?.unwrap_or_default());
                    }
                    Ok(raw)
                })
                .context("query quotes")?;

            for row in rows {
                let raw = row.context("decode quote row")?;
                let Ok(match_id) = raw[0].trim().parse::<u64>() else {
                    continue;
                };
                out.push(QuoteRow {
                    match_id,
                    company: raw[1].clone(),
                    values: [
                        CellValue::parse(&raw[2]),
                        CellValue::parse(&raw[3]),
                        CellValue::parse(&raw[4]),
                        CellValue::parse(&raw[5]),
                        CellValue::parse(&raw[6]),
                        CellValue::parse(&raw[7]),
                    ],
                });
            }
        }
        debug!(table = table.name(), rows = out.len(), "fetched quotes");
        Ok(out)
    }

    /// Ground-truth labels translated in SQL from the scraped result text.
    pub fn fetch_results(&self, match_ids: &[u64]) -> Result<Vec<ResultLabel>> {
        let mut out = Vec::new();
        for chunk in match_ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT DISTINCT id, {FLAT_CASE} AS flat, {OVERUNDER_CASE} AS overunder \
                 FROM tmp.game_record WHERE id IN ({})",
                placeholders(1, chunk.len())
            );
            let bound = chunk.iter().map(|id| id.to_string()).collect::<Vec<_>>();
            let mut stmt = self
                .conn
                .prepare(&sql)
                .inspect_err(|err| {
                    error!(sql = %truncate_sql(&sql), error = %err, "result query prepare failed")
                })
                .context("prepare result query")?;
            let rows = stmt
                .query_map(params_from_iter(bound.iter()), |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                })
                .context("query results")?;
            for row in rows {
                let (id, flat, overunder) = row.context("decode result row")?;
                let Some(match_id) = id.as_deref().and_then(|s| s.trim().parse::<u64>().ok())
                else {
                    continue;
                };
                out.push(ResultLabel {
                    match_id,
                    flat: flat.and_then(|v| u8::try_from(v).ok()),
                    overunder: overunder.and_then(|v| u8::try_from(v).ok()),
                });
            }
        }
        out.sort_by_key(|r| r.match_id);
        info!(requested = match_ids.len(), found = out.len(), "loaded result labels");
        Ok(out)
    }
}

const FLAT_CASE: &str = "CASE \
    WHEN result IN ('胜', 'W', 'win') THEN 3 \
    WHEN result IN ('平', 'D', 'draw') THEN 1 \
    WHEN result IN ('负', 'L', 'loss') THEN 0 END";

const OVERUNDER_CASE: &str = "CASE \
    WHEN total_line IN ('小', 'U', 'under') THEN 0 \
    WHEN total_line IN ('大', 'O', 'over') THEN 1 END";

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn attach_target(path: &Path) -> Result<String> {
    let raw = path.to_string_lossy().to_string();
    if raw == ":memory:" {
        return Ok(raw);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create warehouse dir {}", parent.display()))?;
    }
    Ok(raw)
}
