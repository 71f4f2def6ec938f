use std::path::Path;

use anyhow::{Context, Result, anyhow};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::features::FeatureMatrix;
use crate::pipeline::Prediction;

const SHEET_NAME: &str = "Predictions";

/// One sheet: match id, every feature column, then the predicted label.
pub fn write_predictions_xlsx(
    path: &Path,
    features: &FeatureMatrix,
    predictions: &[Prediction],
) -> Result<usize> {
    if features.match_ids.len() != predictions.len() {
        return Err(anyhow!(
            "{} feature rows but {} predictions",
            features.match_ids.len(),
            predictions.len()
        ));
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;
        write_header(sheet, &features.feature_names)?;
        for (idx, prediction) in predictions.iter().enumerate() {
            let row = (idx + 1) as u32;
            sheet
                .write_number(row, 0, prediction.match_id as f64)
                .with_context(|| format!("write match id row {row}"))?;
            for (col, value) in features.features[idx].iter().enumerate() {
                sheet
                    .write_number(row, (col + 1) as u16, *value)
                    .with_context(|| format!("write cell ({row},{})", col + 1))?;
            }
            let label_col = (features.feature_names.len() + 1) as u16;
            sheet
                .write_number(row, label_col, f64::from(prediction.label))
                .with_context(|| format!("write prediction row {row}"))?;
        }
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create export dir {}", parent.display()))?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(predictions.len())
}

fn write_header(sheet: &mut Worksheet, feature_names: &[String]) -> Result<()> {
    let header = std::iter::once("id")
        .chain(feature_names.iter().map(String::as_str))
        .chain(std::iter::once("predict"));
    for (col, name) in header.enumerate() {
        sheet
            .write_string(0, col as u16, name)
            .with_context(|| format!("write header column {col}"))?;
    }
    Ok(())
}
