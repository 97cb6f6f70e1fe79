use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::collect::COMBINED_PREFIX;
use crate::review::{Review, ReviewPage};

/// The newest `combined_low_ratings_*.json` in `dir`. Run timestamps are
/// zero-padded, so the greatest file name is the latest run.
pub fn latest_combined_file(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Cannot read review directory {}", dir.display()))?;

    let latest = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(COMBINED_PREFIX) && name.ends_with(".json"))
        .max();

    match latest {
        Some(name) => Ok(dir.join(name)),
        None => Err(anyhow!(
            "No {COMBINED_PREFIX}*.json in {}; run `review-miner collect` first",
            dir.display()
        )),
    }
}

pub fn load_reviews(path: &Path) -> Result<Vec<Review>> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let page: ReviewPage = serde_json::from_str(&body)
        .with_context(|| format!("{} is not a review file", path.display()))?;
    Ok(page.reviews())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_latest_combined_file() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "combined_low_ratings_20250301_090000.json",
            "combined_low_ratings_20250331_235959.json",
            "combined_low_ratings_20250331_235959.csv",
            "one_star_most_helpful_20250401_000000.json",
            "combined_low_ratings_20250115_101010.json",
        ] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }

        let latest = latest_combined_file(dir.path()).unwrap();
        assert_eq!(
            latest.file_name().unwrap(),
            "combined_low_ratings_20250331_235959.json"
        );
    }

    #[test]
    fn missing_combined_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let err = latest_combined_file(dir.path()).unwrap_err();
        assert!(err.to_string().contains("collect"));
    }

    #[test]
    fn loads_values_and_skips_bare_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined.json");
        fs::write(
            &path,
            r#"{"data":{"reviews":[
                {"value":{"id":1,"rating":1,"review":"收费太贵"}},
                {"id":"no-value"},
                {"value":{"id":2,"rating":2}}
            ]}}"#,
        )
        .unwrap();

        let reviews = load_reviews(&path).unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].review.as_deref(), Some("收费太贵"));
        assert_eq!(reviews[1].review, None);
    }

    #[test]
    fn file_without_reviews_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, r#"{"data":{}}"#).unwrap();
        assert!(load_reviews(&path).unwrap().is_empty());

        fs::write(&path, "not json").unwrap();
        assert!(load_reviews(&path).is_err());
    }
}
