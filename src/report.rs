use std::collections::BTreeMap;
use std::fmt::{self, Write};

use crate::tf_idf::Keyword;

pub const REPORT_FILE: &str = "analysis_report.md";

/// Everything the report and charts are drawn from.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub total_reviews: usize,
    pub rating_counts: BTreeMap<u8, usize>,
    pub average_rating: Option<f64>,
    pub keywords: Vec<Keyword>,
    /// Number of reviews mentioning each keyword, parallel to `keywords`.
    pub mention_counts: Vec<usize>,
}

pub fn rating_distribution(rating_counts: &BTreeMap<u8, usize>) -> String {
    if rating_counts.is_empty() {
        return "无".to_string();
    }
    rating_counts
        .iter()
        .map(|(stars, count)| format!("{stars}星: {count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_report(
    analysis: &Analysis,
    app_name: &str,
    table_rows: usize,
) -> Result<String, fmt::Error> {
    let mut report = String::new();
    write_report(&mut report, analysis, app_name, table_rows)?;
    Ok(report)
}

fn write_report(
    out: &mut impl Write,
    analysis: &Analysis,
    app_name: &str,
    table_rows: usize,
) -> fmt::Result {
    writeln!(out, "# {app_name}评论分析报告\n")?;
    writeln!(out, "## 基本统计\n")?;
    writeln!(out, "- 总评论数: {}", analysis.total_reviews)?;
    writeln!(
        out,
        "- 评分分布: {}",
        rating_distribution(&analysis.rating_counts)
    )?;
    match analysis.average_rating {
        Some(avg) => writeln!(out, "- 平均评分: {avg:.2}")?,
        None => writeln!(out, "- 平均评分: 无")?,
    }

    writeln!(out, "\n## 关键词分析\n")?;
    writeln!(out, "以下是评论中出现的主要关键词及其权重:\n")?;
    writeln!(out, "| 关键词 | 权重 | 提及评论数 |")?;
    writeln!(out, "|--------|------|------------|")?;
    for (i, keyword) in analysis.keywords.iter().take(table_rows).enumerate() {
        let mentions = analysis.mention_counts.get(i).copied().unwrap_or(0);
        writeln!(out, "| {} | {:.4} | {} |", keyword.term, keyword.weight, mentions)?;
    }

    writeln!(out, "\n## 问题分类\n")?;
    writeln!(out, "根据关键词分析，用户反馈的主要问题可能集中在以下几个方面:\n")?;
    for i in 1..=3 {
        writeln!(out, "{i}. [需要根据实际关键词填写]")?;
    }

    writeln!(out, "\n## 建议\n")?;
    writeln!(out, "基于上述分析，建议在MVP阶段重点关注以下功能:\n")?;
    for i in 1..=3 {
        writeln!(out, "{i}. [需要根据实际分析填写]")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> Analysis {
        Analysis {
            total_reviews: 3,
            rating_counts: BTreeMap::from([(1, 2), (2, 1)]),
            average_rating: Some(4.0 / 3.0),
            keywords: vec![
                Keyword {
                    term: "闪退".into(),
                    weight: 1.234567,
                },
                Keyword {
                    term: "广告".into(),
                    weight: 0.5,
                },
                Keyword {
                    term: "价格".into(),
                    weight: 0.25,
                },
            ],
            mention_counts: vec![2, 1, 1],
        }
    }

    #[test]
    fn report_has_stats_and_table() {
        let report = render_report(&analysis(), "Moji辞书", 2).unwrap();
        assert!(report.starts_with("# Moji辞书评论分析报告\n"));
        assert!(report.contains("- 总评论数: 3\n"));
        assert!(report.contains("- 评分分布: 1星: 2, 2星: 1\n"));
        assert!(report.contains("- 平均评分: 1.33\n"));
        assert!(report.contains("| 闪退 | 1.2346 | 2 |\n"));
        assert!(report.contains("| 广告 | 0.5000 | 1 |\n"));
        assert!(!report.contains("价格"));
        assert_eq!(report.matches("[需要根据实际").count(), 6);
    }

    #[test]
    fn report_without_ratings() {
        let report = render_report(&Analysis::default(), "App", 20).unwrap();
        assert!(report.contains("- 评分分布: 无\n"));
        assert!(report.contains("- 平均评分: 无\n"));
        assert!(report.contains("## 建议"));
    }
}
