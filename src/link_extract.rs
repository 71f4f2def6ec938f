use once_cell::sync::Lazy;
use regex::Regex;

static ANALYSIS_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.*analysis/(\d+)").expect("valid analysis regex"));

/// Number of link columns in `tmp.game_record_url` after the id.
pub const URL_COLUMNS: usize = 7;

/// Links scraped from one schedule row.
///
/// `record` keeps the historical layout: every analysis id found is pushed to
/// the front, then every href follows in page order. An id that does not fit
/// a `u64` is left out of both `match_id` and `record`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowLinks {
    pub match_id: Option<u64>,
    pub record: Vec<String>,
}

impl RowLinks {
    pub fn from_hrefs<S: AsRef<str>>(hrefs: &[S]) -> Self {
        let mut match_id = None;
        let mut record = Vec::with_capacity(hrefs.len() + 1);
        for href in hrefs {
            let href = href.as_ref();
            if href.contains("analysis")
                && let Some(id) = analysis_id(href)
                && let Ok(parsed) = id.parse::<u64>()
            {
                match_id = Some(parsed);
                record.insert(0, id);
            }
            record.push(href.to_string());
        }
        Self { match_id, record }
    }

    /// The `tmp.game_record_url` row, only when the link set has the expected
    /// shape of one id followed by seven links.
    pub fn url_record(&self) -> Option<Vec<String>> {
        self.match_id?;
        if self.record.len() != URL_COLUMNS + 1 {
            return None;
        }
        Some(self.record.clone())
    }
}

pub fn extract_links<S: AsRef<str>>(hrefs: &[S]) -> Vec<String> {
    RowLinks::from_hrefs(hrefs).record
}

fn analysis_id(href: &str) -> Option<String> {
    ANALYSIS_ID
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_prefix_takes_last_analysis_segment() {
        assert_eq!(
            analysis_id("http://x/analysis/12/analysis/345").as_deref(),
            Some("345")
        );
        assert_eq!(analysis_id("http://x/analysis/").as_deref(), None);
    }

    #[test]
    fn url_record_requires_id_and_seven_links() {
        let mut hrefs = (0..6).map(|i| format!("http://h/{i}")).collect::<Vec<_>>();
        hrefs.insert(3, "http://h/analysis/77.htm".to_string());
        let links = RowLinks::from_hrefs(&hrefs);
        assert_eq!(links.match_id, Some(77));
        let record = links.url_record().expect("eight columns");
        assert_eq!(record[0], "77");
        assert_eq!(record[4], "http://h/analysis/77.htm");

        let short = RowLinks::from_hrefs(&["http://h/analysis/5"]);
        assert!(short.url_record().is_none());
    }

    #[test]
    fn id_too_large_for_u64_is_left_out() {
        let hrefs = ["http://h/a", "http://x/analysis/99999999999999999999999.htm"];
        let links = RowLinks::from_hrefs(&hrefs);
        assert_eq!(links.match_id, None);
        assert_eq!(links.record, hrefs.map(String::from).to_vec());
    }
}
