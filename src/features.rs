use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::quotes::CellValue;
use crate::reshape::WideFrame;

/// Outcome labels for one match. `flat` is 3/1/0 for win/draw/loss of the
/// home side, `overunder` is 1 for over and 0 for under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLabel {
    pub match_id: u64,
    pub flat: Option<u8>,
    pub overunder: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Flat,
    OverUnder,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::OverUnder => "overunder",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "flat" => Some(Self::Flat),
            "overunder" | "ou" => Some(Self::OverUnder),
            _ => None,
        }
    }

    fn pick(self, label: &ResultLabel) -> Option<u8> {
        match self {
            Self::Flat => label.flat,
            Self::OverUnder => label.overunder,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric feature matrix with its row keys and column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    pub match_ids: Vec<u64>,
    pub features: Vec<Vec<f64>>,
    pub dropped_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub target: Option<Target>,
    pub feature_names: Vec<String>,
    pub match_ids: Vec<u64>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
    pub dropped_rows: usize,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Inner join of the frames on match id. Cells stay optional; no rows are
/// dropped here.
pub fn join_frames(frames: &[WideFrame]) -> Result<WideFrame> {
    let Some((first, rest)) = frames.split_first() else {
        return Err(anyhow!("no feature frames to join"));
    };
    let mut joined = first.clone();
    for frame in rest {
        let mut rows = BTreeMap::new();
        for (match_id, mut cells) in std::mem::take(&mut joined.rows) {
            let Some(other) = frame.rows.get(&match_id) else {
                continue;
            };
            cells.extend(other.iter().cloned());
            rows.insert(match_id, cells);
        }
        joined.rows = rows;
        joined.columns.extend(frame.columns.iter().cloned());
        joined.duplicates += frame.duplicates;
    }
    Ok(joined)
}

/// Joins feature frames and drops every row with a missing or non-numeric
/// cell.
pub fn assemble_features(frames: &[WideFrame]) -> Result<FeatureMatrix> {
    let joined = join_frames(frames)?;
    let mut out = FeatureMatrix {
        feature_names: joined.columns.clone(),
        ..FeatureMatrix::default()
    };
    for (match_id, cells) in &joined.rows {
        match numeric_row(cells) {
            Some(values) => {
                out.match_ids.push(*match_id);
                out.features.push(values);
            }
            None => out.dropped_rows += 1,
        }
    }
    Ok(out)
}

/// Joins frames with labels (inner), drops incomplete rows, then splits off
/// the chosen label. Both label columns count toward completeness and
/// neither ever lands in the feature matrix.
pub fn assemble_training_set(
    frames: &[WideFrame],
    labels: &[ResultLabel],
    target: Target,
) -> Result<TrainingSet> {
    let joined = join_frames(frames)?;
    let by_id = labels
        .iter()
        .map(|l| (l.match_id, l))
        .collect::<BTreeMap<_, _>>();

    let mut out = TrainingSet {
        target: Some(target),
        feature_names: joined.columns.clone(),
        ..TrainingSet::default()
    };
    let mut unmatched = 0usize;
    for (match_id, cells) in &joined.rows {
        let Some(label) = by_id.get(match_id) else {
            unmatched += 1;
            continue;
        };
        let complete = label.flat.is_some() && label.overunder.is_some();
        let (Some(values), true, Some(y)) = (numeric_row(cells), complete, target.pick(label))
        else {
            out.dropped_rows += 1;
            continue;
        };
        out.match_ids.push(*match_id);
        out.features.push(values);
        out.labels.push(y);
    }

    info!(
        target_label = %target,
        rows = out.len(),
        features = out.feature_names.len(),
        dropped = out.dropped_rows,
        unmatched,
        "assembled training set"
    );
    Ok(out)
}

fn numeric_row(cells: &[Option<CellValue>]) -> Option<Vec<f64>> {
    cells
        .iter()
        .map(|cell| cell.as_ref().and_then(CellValue::as_f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(columns: &[&str], rows: &[(u64, Vec<Option<f64>>)]) -> WideFrame {
        WideFrame {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|(id, cells)| {
                    (
                        *id,
                        cells.iter().map(|c| c.map(CellValue::Number)).collect(),
                    )
                })
                .collect(),
            duplicates: 0,
        }
    }

    #[test]
    fn join_is_inner_on_match_id() {
        let a = frame(&["x"], &[(1, vec![Some(1.0)]), (2, vec![Some(2.0)])]);
        let b = frame(&["y"], &[(2, vec![Some(20.0)]), (3, vec![Some(30.0)])]);
        let joined = join_frames(&[a, b]).expect("join");
        assert_eq!(joined.columns, vec!["x", "y"]);
        assert_eq!(joined.match_ids(), vec![2]);
    }

    #[test]
    fn text_cells_count_as_missing() {
        let mut f = frame(&["x"], &[(1, vec![Some(1.0)]), (2, vec![Some(2.0)])]);
        f.rows.insert(2, vec![Some(CellValue::Text("-".into()))]);
        let m = assemble_features(&[f]).expect("assemble");
        assert_eq!(m.match_ids, vec![1]);
        assert_eq!(m.dropped_rows, 1);
    }

    #[test]
    fn other_label_never_leaks_and_must_be_present() {
        let f = frame(
            &["x"],
            &[(1, vec![Some(1.0)]), (2, vec![Some(2.0)]), (3, vec![Some(3.0)])],
        );
        let labels = vec![
            ResultLabel {
                match_id: 1,
                flat: Some(3),
                overunder: Some(1),
            },
            ResultLabel {
                match_id: 2,
                flat: Some(0),
                overunder: None,
            },
            ResultLabel {
                match_id: 3,
                flat: Some(1),
                overunder: Some(0),
            },
        ];
        let set = assemble_training_set(&[f], &labels, Target::Flat).expect("assemble");
        assert_eq!(set.feature_names, vec!["x"]);
        assert_eq!(set.match_ids, vec![1, 3]);
        assert_eq!(set.labels, vec![3, 1]);
        assert_eq!(set.dropped_rows, 1);
    }

    #[test]
    fn no_frames_is_an_error() {
        assert!(assemble_features(&[]).is_err());
    }
}
