use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::{CollectConfig, ReviewQuery};
use crate::export::{save_csv, save_json};
use crate::review::{raw_review_items, review_envelope, Review, ReviewPage};
use crate::scrape_data::ReviewSource;

pub const COMBINED_PREFIX: &str = "combined_low_ratings_";

#[derive(Debug, Default)]
pub struct CollectSummary {
    pub files: Vec<PathBuf>,
    pub reviews_per_query: Vec<(String, usize)>,
    pub combined_reviews: usize,
}

pub fn run_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn save_page(
    page: &Value,
    reviews: Option<&[Review]>,
    label: &str,
    timestamp: &str,
    dir: &Path,
    summary: &mut CollectSummary,
) -> Result<usize> {
    summary
        .files
        .push(save_json(page, dir, &format!("{label}_{timestamp}.json"))?);

    let Some(reviews) = reviews else {
        warn!(label, "response has no data.reviews, CSV not written");
        return Ok(0);
    };
    if let Some(path) = save_csv(reviews, dir, &format!("{label}_{timestamp}.csv"))? {
        summary.files.push(path);
    }
    Ok(reviews.len())
}

/// Runs every configured query in order and writes the per-query and
/// combined files. A failed query or a page that does not parse is logged
/// and skipped; only disk errors abort the run.
pub fn collect_reviews(
    source: &impl ReviewSource,
    config: &CollectConfig,
    timestamp: &str,
) -> Result<CollectSummary> {
    let mut summary = CollectSummary::default();
    let mut combined: Vec<Value> = Vec::new();

    for (i, query) in config.queries.iter().enumerate() {
        if i > 0 && config.delay_ms > 0 {
            sleep(Duration::from_millis(config.delay_ms));
        }

        let label = query.label();
        info!(%label, "fetching reviews");
        let page = match source.fetch(query.sort, query.rating, config.limit) {
            Ok(page) => page,
            Err(err) => {
                error!(%label, %err, "request failed, skipping");
                continue;
            }
        };

        let reviews = match raw_review_items(&page) {
            None => None,
            Some(_) => match ReviewPage::from_value(&page) {
                Ok(parsed) => Some(parsed.reviews()),
                Err(err) => {
                    error!(%label, %err, "unexpected review format, skipping");
                    continue;
                }
            },
        };

        let count = save_page(
            &page,
            reviews.as_deref(),
            &label,
            timestamp,
            &config.output_dir,
            &mut summary,
        )?;
        summary.reviews_per_query.push((label, count));

        if query.combine {
            if let Some(items) = raw_review_items(&page) {
                combined.extend(items.iter().cloned());
            }
        }
    }

    if combined.is_empty() {
        if config.queries.iter().any(|q: &ReviewQuery| q.combine) {
            warn!("no reviews for the combined file");
        }
    } else {
        summary.combined_reviews = combined.len();
        let envelope = review_envelope(combined);
        let stem = format!("{COMBINED_PREFIX}{timestamp}");
        summary
            .files
            .push(save_json(&envelope, &config.output_dir, &format!("{stem}.json"))?);
        let reviews = ReviewPage::from_value(&envelope)?.reviews();
        if let Some(path) = save_csv(&reviews, &config.output_dir, &format!("{stem}.csv"))? {
            summary.files.push(path);
        }
    }

    info!(
        files = summary.files.len(),
        combined = summary.combined_reviews,
        "collection finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::{SortOrder, StarRating};
    use crate::scrape_data::FetchError;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Instant;

    struct FakeSource {
        calls: RefCell<Vec<(SortOrder, u8, u32)>>,
    }

    impl FakeSource {
        fn new() -> Self {
            FakeSource {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ReviewSource for FakeSource {
        fn fetch(
            &self,
            sort: SortOrder,
            rating: StarRating,
            limit: u32,
        ) -> Result<Value, FetchError> {
            self.calls.borrow_mut().push((sort, rating.stars(), limit));
            match rating.stars() {
                2 => Err(FetchError::Status(500)),
                4 => Ok(json!({ "errors": ["nope"] })),
                stars => Ok(json!({
                    "data": {
                        "reviews": [
                            { "value": { "id": stars, "rating": stars, "review": "总是闪退" } },
                            { "value": { "id": stars * 10, "rating": stars, "review": "广告太多" } }
                        ]
                    }
                })),
            }
        }
    }

    fn config(dir: &Path) -> CollectConfig {
        CollectConfig {
            delay_ms: 0,
            output_dir: dir.to_path_buf(),
            limit: 50,
            ..CollectConfig::default()
        }
    }

    #[test]
    fn failed_queries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new();
        let summary = collect_reviews(&source, &config(dir.path()), "20250101_120000").unwrap();

        let calls = source.calls.borrow();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|(sort, _, limit)| *sort == SortOrder::MostHelpful && *limit == 50));

        assert_eq!(
            summary.reviews_per_query,
            vec![
                ("one_star_most_helpful".to_string(), 2),
                ("four_star_most_helpful".to_string(), 0),
                ("five_star_most_helpful".to_string(), 2),
            ]
        );
        assert!(dir.path().join("one_star_most_helpful_20250101_120000.json").exists());
        assert!(dir.path().join("one_star_most_helpful_20250101_120000.csv").exists());
        assert!(!dir.path().join("two_star_most_helpful_20250101_120000.json").exists());
        assert!(dir.path().join("four_star_most_helpful_20250101_120000.json").exists());
        assert!(!dir.path().join("four_star_most_helpful_20250101_120000.csv").exists());
    }

    #[test]
    fn combined_file_holds_flagged_queries_only() {
        let dir = tempfile::tempdir().unwrap();
        let summary =
            collect_reviews(&FakeSource::new(), &config(dir.path()), "20250101_120000").unwrap();
        assert_eq!(summary.combined_reviews, 2);

        let path = dir.path().join("combined_low_ratings_20250101_120000.json");
        let combined: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        let items = combined["data"]["reviews"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item["value"]["rating"] == json!(1)));
        assert!(dir.path().join("combined_low_ratings_20250101_120000.csv").exists());
    }

    #[test]
    fn nothing_combined_when_flagged_queries_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.queries = vec![ReviewQuery {
            sort: SortOrder::MostRecent,
            rating: StarRating::try_from(2).unwrap(),
            combine: true,
        }];
        let summary = collect_reviews(&FakeSource::new(), &config, "20250101_120000").unwrap();
        assert!(summary.files.is_empty());
        assert_eq!(summary.combined_reviews, 0);
    }

    #[test]
    fn timestamp_sorts_lexicographically() {
        let ts = run_timestamp();
        assert_eq!(ts.len(), 15);
        assert_eq!(&ts[8..9], "_");
    }

    /// Replays a fixed page per star rating and records when each call came in.
    struct ScriptedSource {
        pages: HashMap<u8, Value>,
        calls: RefCell<Vec<Instant>>,
    }

    impl ScriptedSource {
        fn new(pages: impl IntoIterator<Item = (u8, Value)>) -> Self {
            ScriptedSource {
                pages: pages.into_iter().collect(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ReviewSource for ScriptedSource {
        fn fetch(&self, _: SortOrder, rating: StarRating, _: u32) -> Result<Value, FetchError> {
            self.calls.borrow_mut().push(Instant::now());
            self.pages
                .get(&rating.stars())
                .cloned()
                .ok_or(FetchError::Status(404))
        }
    }

    fn page(stars: u8) -> Value {
        json!({ "data": { "reviews": [ { "value": { "id": stars, "rating": stars } } ] } })
    }

    #[test]
    fn malformed_page_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::new([
            (1, json!({ "data": { "reviews": [ { "value": { "rating": "one" } } ] } })),
            (2, page(2)),
            (4, page(4)),
            (5, page(5)),
        ]);
        let summary = collect_reviews(&source, &config(dir.path()), "20250101_120000").unwrap();

        assert_eq!(source.calls.borrow().len(), 4);
        assert_eq!(summary.reviews_per_query.len(), 3);
        assert!(!dir.path().join("one_star_most_helpful_20250101_120000.json").exists());
        assert_eq!(summary.combined_reviews, 1);

        let path = dir.path().join("combined_low_ratings_20250101_120000.json");
        let combined: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(combined["data"]["reviews"][0]["value"]["rating"], json!(2));
    }

    #[test]
    fn delay_only_between_requests() {
        let dir = tempfile::tempdir().unwrap();
        let delay = Duration::from_millis(150);
        let mut config = config(dir.path());
        config.delay_ms = delay.as_millis() as u64;
        config.queries.truncate(3);
        let source = ScriptedSource::new([(1, page(1)), (2, page(2)), (4, page(4))]);

        collect_reviews(&source, &config, "20250101_120000").unwrap();
        let finished = Instant::now();

        let calls = source.calls.borrow();
        assert_eq!(calls.len(), 3);
        assert!(calls.windows(2).all(|w| w[1] - w[0] >= delay));
        assert!(finished - calls[2] < delay);
    }
}
