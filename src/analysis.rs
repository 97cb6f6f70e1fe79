use std::collections::BTreeMap;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::charts::{
    render_keyword_bar, render_rating_pie, render_word_cloud, KEYWORD_BAR_FILE, RATING_PIE_FILE,
    WORD_CLOUD_FILE,
};
use crate::config::AnalyzeConfig;
use crate::prepare_dataset::{latest_combined_file, load_reviews};
use crate::preprocess::{corpus_text, load_tokenizer};
use crate::report::{render_report, Analysis, REPORT_FILE};
use crate::review::Review;
use crate::tf_idf::{get_review_frequencies, KeywordExtractor};

/// Reviews without a rating count towards the total but not the distribution.
pub fn rating_counts(reviews: &[Review]) -> BTreeMap<u8, usize> {
    let mut counts = BTreeMap::new();
    for rating in reviews.iter().filter_map(|r| r.rating) {
        *counts.entry(rating).or_insert(0) += 1;
    }
    counts
}

pub fn average_rating(rating_counts: &BTreeMap<u8, usize>) -> Option<f64> {
    let rated: usize = rating_counts.values().sum();
    if rated == 0 {
        return None;
    }
    let sum: usize = rating_counts
        .iter()
        .map(|(&stars, &count)| stars as usize * count)
        .sum();
    Some(sum as f64 / rated as f64)
}

pub fn analyze_reviews(extractor: &KeywordExtractor, reviews: &[Review], top_k: usize) -> Analysis {
    let counts = rating_counts(reviews);
    let keywords = extractor.extract_keywords(&corpus_text(reviews), top_k);
    let frequencies = get_review_frequencies(extractor.jieba(), reviews);
    debug!(
        documents = frequencies.n_documents,
        vocabulary = frequencies.counter.len(),
        "review frequencies counted"
    );
    let mention_counts = keywords
        .iter()
        .map(|k| frequencies.get_doc_freq(&k.term))
        .collect();

    Analysis {
        total_reviews: reviews.len(),
        average_rating: average_rating(&counts),
        rating_counts: counts,
        keywords,
        mention_counts,
    }
}

/// Renders charts and the Markdown report into `output_dir`. A chart with
/// no data to draw is skipped with a warning; the report is always written.
pub fn write_outputs(analysis: &Analysis, config: &AnalyzeConfig) -> Result<Vec<PathBuf>> {
    let dir = &config.output_dir;
    create_dir_all(dir).with_context(|| format!("Cannot create directory {}", dir.display()))?;
    let font = config.font_family.as_str();
    let mut written = Vec::new();

    if analysis.keywords.is_empty() {
        warn!("no Chinese keywords found, skipping word cloud and bar chart");
    } else {
        let cloud = dir.join(WORD_CLOUD_FILE);
        render_word_cloud(&analysis.keywords, &cloud, font)?;
        written.push(cloud);

        let bar = dir.join(KEYWORD_BAR_FILE);
        let top = analysis.keywords.len().min(config.chart_top);
        render_keyword_bar(&analysis.keywords[..top], &bar, font)?;
        written.push(bar);
    }

    if analysis.rating_counts.is_empty() {
        warn!("no ratings found, skipping rating distribution");
    } else {
        let pie = dir.join(RATING_PIE_FILE);
        render_rating_pie(&analysis.rating_counts, &pie, font)?;
        written.push(pie);
    }

    let report_path = dir.join(REPORT_FILE);
    let report = render_report(analysis, &config.app_name, config.chart_top)?;
    fs::write(&report_path, report)
        .with_context(|| format!("Cannot write {}", report_path.display()))?;
    written.push(report_path);

    Ok(written)
}

/// Loads `input` (or the newest combined file) and writes every output.
/// Returns `None` when the file holds no reviews.
pub fn run_analysis(config: &AnalyzeConfig, input: Option<&Path>) -> Result<Option<Analysis>> {
    let path = match input {
        Some(path) => path.to_path_buf(),
        None => latest_combined_file(&config.input_dir)?,
    };
    info!(path = %path.display(), "analyzing reviews");

    let reviews = load_reviews(&path)?;
    if reviews.is_empty() {
        warn!(path = %path.display(), "no usable reviews in file");
        return Ok(None);
    }

    let jieba = load_tokenizer(config.user_dict.as_deref())?;
    let extractor = KeywordExtractor::new(jieba, &config.stop_words)?;
    let analysis = analyze_reviews(&extractor, &reviews, config.top_k);
    info!(
        reviews = analysis.total_reviews,
        keywords = analysis.keywords.len(),
        "analysis complete"
    );

    let written = write_outputs(&analysis, config)?;
    info!(
        output_dir = %config.output_dir.display(),
        files = written.len(),
        "results saved"
    );
    Ok(Some(analysis))
}
