use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use jieba_rs::Jieba;
use regex::Regex;

use crate::review::Review;

fn non_cjk() -> &'static Regex {
    static NON_CJK: OnceLock<Regex> = OnceLock::new();
    NON_CJK.get_or_init(|| Regex::new(r"[^\u{4e00}-\u{9fa5}]").expect("valid regex"))
}

/// Replaces everything outside the CJK Unified Ideographs block with a space.
/// Latin words, digits, punctuation and emoji are all dropped.
pub fn keep_cjk(text: &str) -> String {
    non_cjk().replace_all(text, " ").into_owned()
}

/// Jieba with its bundled dictionary plus an optional user dictionary
/// (`word [freq] [tag]` per line).
pub fn load_tokenizer(user_dict: Option<&Path>) -> Result<Jieba> {
    let mut jieba = Jieba::new();
    if let Some(path) = user_dict {
        let file =
            File::open(path).with_context(|| format!("Cannot open user dictionary {}", path.display()))?;
        jieba
            .load_dict(&mut BufReader::new(file))
            .with_context(|| format!("Invalid user dictionary {}", path.display()))?;
    }
    Ok(jieba)
}

pub fn tokenize(jieba: &Jieba, text: &str) -> Vec<String> {
    let cleaned = keep_cjk(text);
    jieba
        .cut(&cleaned, true)
        .into_iter()
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(String::from)
        .collect()
}

/// All review bodies joined by single spaces; a missing body counts as empty.
pub fn corpus_text(reviews: &[Review]) -> String {
    reviews
        .iter()
        .map(|review| review.review.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_everything_but_hanzi() {
        assert_eq!(keep_cjk("App很好用!"), "   很好用 ");
        assert_eq!(keep_cjk("v7.3 闪退😡"), "     闪退 ");
        assert_eq!(keep_cjk("ありがとう"), "     ");
    }

    #[test]
    fn tokens_have_no_whitespace_or_latin() {
        let jieba = load_tokenizer(None).unwrap();
        let tokens = tokenize(&jieba, "更新后 app 经常闪退，广告also太多");
        assert!(!tokens.is_empty());
        assert!(tokens.iter().all(|t| !t.trim().is_empty()));
        assert!(tokens.iter().all(|t| !t.chars().any(|c| c.is_ascii())));
        assert!(tokens.contains(&"广告".to_string()));
    }

    #[test]
    fn user_dictionary_adds_words() {
        let dir = tempfile::tempdir().unwrap();
        let dict = dir.path().join("user.dict");
        std::fs::write(&dict, "查词慢 100000 n\n").unwrap();

        let jieba = load_tokenizer(Some(&dict)).unwrap();
        let tokens = tokenize(&jieba, "查词慢");
        assert_eq!(tokens, vec!["查词慢".to_string()]);
    }

    #[test]
    fn missing_user_dictionary_is_an_error() {
        assert!(load_tokenizer(Some(Path::new("/nonexistent/user.dict"))).is_err());
    }

    #[test]
    fn corpus_joins_bodies() {
        let reviews = vec![
            Review {
                review: Some("卡".into()),
                ..Review::default()
            },
            Review::default(),
            Review {
                review: Some("贵".into()),
                ..Review::default()
            },
        ];
        assert_eq!(corpus_text(&reviews), "卡  贵");
    }
}
