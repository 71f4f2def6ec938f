//! Long-to-wide pivot of quote rows: one row per match, one column per
//! (metric, company) pair.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::PipelineError;
use crate::quotes::{CellValue, METRICS, QuoteRow};
use crate::warehouse::{QuoteTable, Warehouse};

/// Number of odds providers kept as feature columns.
pub const TOP_COMPANIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Keep the first quote seen for a (match, company) pair.
    #[default]
    FirstWins,
    /// Fail on the first duplicate pair.
    Reject,
}

/// Wide table keyed by match id. Cells are `None` where a company did not
/// quote a match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideFrame {
    pub columns: Vec<String>,
    pub rows: BTreeMap<u64, Vec<Option<CellValue>>>,
    pub duplicates: usize,
}

impl WideFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, match_id: u64, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(&match_id)?.get(idx)?.as_ref()
    }

    pub fn match_ids(&self) -> Vec<u64> {
        self.rows.keys().copied().collect()
    }
}

pub fn column_name(metric: &str, flag: &str, company: &str) -> String {
    format!("{metric}_{flag}_{company}")
}

/// Pivots quote rows into a [`WideFrame`]. Columns run metric-major, then by
/// company name.
pub fn pivot_quotes(
    table: QuoteTable,
    rows: &[QuoteRow],
    policy: DuplicatePolicy,
) -> Result<WideFrame> {
    let flag = table.source_flag();
    let companies = rows
        .iter()
        .map(|r| r.company.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    let company_pos = companies
        .iter()
        .enumerate()
        .map(|(i, c)| (*c, i))
        .collect::<HashMap<_, _>>();

    let mut columns = Vec::with_capacity(METRICS.len() * companies.len());
    for metric in METRICS {
        for company in &companies {
            columns.push(column_name(metric, flag, company));
        }
    }

    let width = columns.len();
    let mut out: BTreeMap<u64, Vec<Option<CellValue>>> = BTreeMap::new();
    let mut seen: HashSet<(u64, &str)> = HashSet::new();
    let mut duplicates = 0usize;

    for row in rows {
        if !seen.insert((row.match_id, row.company.as_str())) {
            if policy == DuplicatePolicy::Reject {
                return Err(PipelineError::DuplicateQuote {
                    match_id: row.match_id,
                    company: row.company.clone(),
                }
                .into());
            }
            duplicates += 1;
            continue;
        }
        let company_idx = company_pos[row.company.as_str()];
        let cells = out
            .entry(row.match_id)
            .or_insert_with(|| vec![None; width]);
        for (metric_idx, value) in row.values.iter().enumerate() {
            cells[metric_idx * companies.len() + company_idx] = Some(value.clone());
        }
    }

    if duplicates > 0 {
        warn!(
            table = table.name(),
            duplicates, "duplicate (match, company) quotes ignored, first kept"
        );
    }

    Ok(WideFrame {
        columns,
        rows: out,
        duplicates,
    })
}

/// Top-N companies, their quotes for `match_ids`, pivoted and renamed.
pub fn reshape_table(
    warehouse: &Warehouse,
    table: QuoteTable,
    match_ids: &[u64],
    top_n: usize,
    policy: DuplicatePolicy,
) -> Result<WideFrame> {
    if match_ids.is_empty() {
        return Ok(WideFrame::default());
    }
    let companies = warehouse
        .top_companies(table, top_n)
        .with_context(|| format!("top companies for {}", table.name()))?;
    let quotes = warehouse
        .fetch_quotes(table, &companies, match_ids)
        .with_context(|| format!("quotes for {}", table.name()))?;
    let frame = pivot_quotes(table, &quotes, policy)?;
    debug!(
        table = table.name(),
        companies = companies.len(),
        matches = frame.len(),
        columns = frame.columns.len(),
        "reshaped quotes"
    );
    Ok(frame)
}
