use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use jieba_rs::{Jieba, KeywordExtract, KeywordExtractConfig, TfIdf};

use crate::preprocess::{keep_cjk, tokenize};
use crate::review::Review;

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub term: String,
    pub weight: f64,
}

/// TF-IDF keyword extraction over jieba's bundled IDF table. Segmentation
/// runs with HMM on, the same as `preprocess::tokenize`, so words missing
/// from the dictionary can still become keywords.
pub struct KeywordExtractor {
    jieba: Jieba,
    tfidf: TfIdf,
}

impl KeywordExtractor {
    pub fn new(jieba: Jieba, stop_words: &[String]) -> Result<Self> {
        let mut builder = KeywordExtractConfig::builder();
        builder.use_hmm(true);
        for word in stop_words {
            builder.add_stop_word(word.clone());
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("Invalid keyword extraction settings: {e}"))?;

        let mut tfidf = TfIdf::default();
        *tfidf.config_mut() = config;
        Ok(KeywordExtractor { jieba, tfidf })
    }

    pub fn jieba(&self) -> &Jieba {
        &self.jieba
    }

    /// Top `top_k` terms of the CJK part of `text`, heaviest first.
    pub fn extract_keywords(&self, text: &str, top_k: usize) -> Vec<Keyword> {
        let cleaned = keep_cjk(text);
        let mut keywords: Vec<Keyword> = self
            .tfidf
            .extract_keywords(&self.jieba, &cleaned, top_k, vec![])
            .into_iter()
            .filter(|k| !k.keyword.trim().is_empty())
            .map(|k| Keyword {
                term: k.keyword,
                weight: k.weight,
            })
            .collect();
        keywords.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        keywords
    }
}

/// How many reviews mention each token, counting a review once per token.
pub struct DocumentFrequencyCounter {
    pub counter: HashMap<String, usize>,
    pub n_documents: usize,
}

impl DocumentFrequencyCounter {
    pub fn new(doc_freq_map: HashMap<String, usize>, n_documents: usize) -> Self {
        DocumentFrequencyCounter {
            counter: doc_freq_map,
            n_documents,
        }
    }

    pub fn get_doc_freq(&self, token: &str) -> usize {
        self.counter.get(token).copied().unwrap_or(0)
    }
}

pub fn get_review_frequencies(jieba: &Jieba, reviews: &[Review]) -> DocumentFrequencyCounter {
    let mut counter: HashMap<String, usize> = HashMap::new();
    for review in reviews {
        let Some(body) = review.review.as_deref() else {
            continue;
        };
        let token_set: HashSet<String> = HashSet::from_iter(tokenize(jieba, body));
        token_set.into_iter().for_each(|token| {
            counter.entry(token).and_modify(|e| *e += 1).or_insert(1);
        });
    }
    DocumentFrequencyCounter::new(counter, reviews.len())
}
