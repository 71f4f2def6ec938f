use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d+").expect("valid decimal regex"));

/// Metric columns shared by `tmp.game_odds` and `tmp.game_overunder`:
/// three live ("final") values then three initial ("original") values.
pub const METRICS: [&str; 6] = ["f1", "f2", "f3", "o1", "o2", "o3"];

/// One warehouse value after the fraction conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// `"A/B"` becomes the midpoint `(A+B)/2`; anything unparseable keeps the
    /// original string.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(v) = trimmed.parse::<f64>() {
            return Self::Number(v);
        }
        if let Some((a, b)) = trimmed.split_once('/')
            && let (Ok(a), Ok(b)) = (a.trim().parse::<f64>(), b.trim().parse::<f64>())
        {
            return Self::Number((a + b) / 2.0);
        }
        Self::Text(raw.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Long-format row read back from an odds or over/under table.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRow {
    pub match_id: u64,
    pub company: String,
    pub values: [CellValue; 6],
}

/// A 1x2 quote as scraped: one company, three decimals from one odds view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewQuote {
    pub company: String,
    pub prices: [String; 3],
}

/// First three `N.N` numbers of a row, or `None` when the row has fewer.
pub fn odds_prices(text: &str) -> Option<[String; 3]> {
    let mut found = DECIMAL.find_iter(text).map(|m| m.as_str().to_string());
    let a = found.next()?;
    let b = found.next()?;
    let c = found.next()?;
    Some([a, b, c])
}

/// Zips the live and initial views into `tmp.game_odds` records:
/// `[id, company, live×3, initial×3]`. Rows pair up by position and the
/// shorter view bounds the output.
pub fn merge_odds(match_id: u64, live: &[ViewQuote], initial: &[ViewQuote]) -> Vec<Vec<String>> {
    live.iter()
        .zip(initial)
        .map(|(l, i)| {
            let mut record = Vec::with_capacity(8);
            record.push(match_id.to_string());
            record.push(l.company.clone());
            record.extend(l.prices.iter().cloned());
            record.extend(i.prices.iter().cloned());
            record
        })
        .collect()
}

/// One row of the over/under table into a `tmp.game_overunder` record.
///
/// Multi-line cells carry the company on the first line and the values on the
/// second. The record is kept only when it has exactly eight fields.
pub fn parse_overunder_row(match_id: u64, text: &str) -> Option<Vec<String>> {
    if text.is_empty() {
        return None;
    }
    let (company, values): (String, Vec<String>) = if text.contains('\n') {
        let mut lines = text.split('\n');
        let company = lines.next().unwrap_or_default().to_string();
        let values = lines
            .next()
            .unwrap_or_default()
            .split(' ')
            .take(6)
            .map(str::to_string)
            .collect();
        (company, values)
    } else {
        let mut tokens = text.split(' ');
        let company = tokens.next().unwrap_or_default().to_string();
        let values = tokens.take(6).map(str::to_string).collect();
        (company, values)
    };

    let mut record = Vec::with_capacity(8);
    record.push(match_id.to_string());
    record.push(company);
    record.extend(values);
    (record.len() == 8).then_some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_value_handles_fractions_and_noise() {
        assert_eq!(CellValue::parse("1.85"), CellValue::Number(1.85));
        assert_eq!(CellValue::parse("3/2"), CellValue::Number(2.5));
        assert_eq!(CellValue::parse("2.5/3"), CellValue::Number(2.75));
        assert_eq!(CellValue::parse("N/A"), CellValue::Text("N/A".to_string()));
        assert_eq!(CellValue::parse("-"), CellValue::Text("-".to_string()));
        assert_eq!(
            CellValue::parse("1/2/3"),
            CellValue::Text("1/2/3".to_string())
        );
        assert_eq!(CellValue::Text("x".into()).as_f64(), None);
    }

    #[test]
    fn odds_prices_takes_first_three_decimals() {
        let got = odds_prices("bet 365 2.10 3.20 3.40 95.1%").expect("three prices");
        assert_eq!(got, ["2.10", "3.20", "3.40"]);
        assert!(odds_prices("Macau 2.10 3.20").is_none());
    }

    #[test]
    fn merge_odds_zips_views() {
        let live = vec![ViewQuote {
            company: "A".into(),
            prices: ["1.1".into(), "2.2".into(), "3.3".into()],
        }];
        let initial = vec![
            ViewQuote {
                company: "A".into(),
                prices: ["1.0".into(), "2.0".into(), "3.0".into()],
            },
            ViewQuote {
                company: "B".into(),
                prices: ["9.0".into(), "9.0".into(), "9.0".into()],
            },
        ];
        let rows = merge_odds(42, &live, &initial);
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0],
            vec!["42", "A", "1.1", "2.2", "3.3", "1.0", "2.0", "3.0"]
        );
    }

    #[test]
    fn overunder_rows_single_and_multi_line() {
        let flat = parse_overunder_row(9, "Crown 0.90 2.5 0.95 0.88 2.5/3 1.00 extra")
            .expect("eight fields");
        assert_eq!(flat[1], "Crown");
        assert_eq!(flat[7], "1.00");

        let multi =
            parse_overunder_row(9, "Crown\n0.90 2.5 0.95 0.88 2.5/3 1.00").expect("eight fields");
        assert_eq!(multi[1], "Crown");
        assert_eq!(multi[2], "0.90");

        assert!(parse_overunder_row(9, "Crown 0.90 2.5").is_none());
        assert!(parse_overunder_row(9, "").is_none());
    }
}
