use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Result};
use plotters::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::tf_idf::Keyword;

pub const WORD_CLOUD_FILE: &str = "keywords_wordcloud.png";
pub const KEYWORD_BAR_FILE: &str = "keywords_bar.png";
pub const RATING_PIE_FILE: &str = "rating_distribution.png";

const WORD_CLOUD_SIZE: (u32, u32) = (800, 400);
const BAR_CHART_SIZE: (u32, u32) = (1200, 800);
const PIE_CHART_SIZE: (u32, u32) = (800, 800);

const MIN_FONT_SIZE: u32 = 14;
const MAX_FONT_SIZE: u32 = 80;
const WORD_PADDING: i32 = 2;

static PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

/// Linear map from keyword weight to font size. Equal weights all get the
/// largest size.
pub fn font_sizes(keywords: &[Keyword], min_size: u32, max_size: u32) -> Vec<u32> {
    let max_weight = keywords.iter().map(|k| k.weight).fold(f64::MIN, f64::max);
    let min_weight = keywords.iter().map(|k| k.weight).fold(f64::MAX, f64::min);
    let spread = max_weight - min_weight;

    keywords
        .iter()
        .map(|k| {
            if spread <= f64::EPSILON {
                max_size
            } else {
                let t = (k.weight - min_weight) / spread;
                min_size + (t * (max_size - min_size) as f64).round() as u32
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

impl Rect {
    fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.w + WORD_PADDING
            && other.x < self.x + self.w + WORD_PADDING
            && self.y < other.y + other.h + WORD_PADDING
            && other.y < self.y + self.h + WORD_PADDING
    }

    fn inside(&self, canvas: (u32, u32)) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x + self.w <= canvas.0 as i32
            && self.y + self.h <= canvas.1 as i32
    }
}

/// Places boxes in the given order along an Archimedean spiral out of the
/// canvas centre. Returns the top-left corner for each box, or `None` when
/// it fits nowhere.
pub fn place_words(boxes: &[(u32, u32)], canvas: (u32, u32)) -> Vec<Option<(i32, i32)>> {
    let (cx, cy) = (canvas.0 as f64 / 2.0, canvas.1 as f64 / 2.0);
    let aspect = canvas.1 as f64 / canvas.0 as f64;
    let max_radius = cx.hypot(cy);
    let mut placed: Vec<Rect> = Vec::with_capacity(boxes.len());

    boxes
        .iter()
        .map(|&(w, h)| {
            let (w, h) = (w as i32, h as i32);
            let mut step = 0u32;
            loop {
                let theta = step as f64 * 0.1;
                let radius = 2.0 * theta;
                if radius > max_radius {
                    return None;
                }
                let candidate = Rect {
                    x: (cx + radius * theta.cos()) as i32 - w / 2,
                    y: (cy + radius * aspect * theta.sin()) as i32 - h / 2,
                    w,
                    h,
                };
                if candidate.inside(canvas) && !placed.iter().any(|r| r.overlaps(&candidate)) {
                    placed.push(candidate);
                    return Some((candidate.x, candidate.y));
                }
                step += 1;
            }
        })
        .collect()
}

pub fn render_word_cloud(keywords: &[Keyword], path: &Path, font_family: &str) -> Result<()> {
    if keywords.is_empty() {
        bail!("No keywords to draw a word cloud from");
    }

    let root = BitMapBackend::new(path, WORD_CLOUD_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ordered = keywords.to_vec();
    ordered.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    let sizes = font_sizes(&ordered, MIN_FONT_SIZE, MAX_FONT_SIZE);

    let mut boxes = Vec::with_capacity(ordered.len());
    for (keyword, &size) in ordered.iter().zip(&sizes) {
        let style = TextStyle::from((font_family, size as f64).into_font());
        boxes.push(root.estimate_text_size(&keyword.term, &style)?);
    }

    let mut rng = StdRng::seed_from_u64(12345);
    let mut drawn = 0;
    for ((keyword, &size), position) in ordered
        .iter()
        .zip(&sizes)
        .zip(place_words(&boxes, WORD_CLOUD_SIZE))
    {
        let Some(position) = position else {
            debug!(term = %keyword.term, "no room left in word cloud");
            continue;
        };
        let color = &PALETTE[rng.gen_range(0..PALETTE.len())];
        let style = (font_family, size as f64).into_font().color(color);
        root.draw_text(&keyword.term, &style, position)?;
        drawn += 1;
    }

    root.present()?;
    info!(path = %path.display(), drawn, total = ordered.len(), "word cloud saved");
    Ok(())
}

/// Horizontal bars, heaviest keyword on top.
pub fn render_keyword_bar(keywords: &[Keyword], path: &Path, font_family: &str) -> Result<()> {
    if keywords.is_empty() {
        bail!("No keywords to chart");
    }

    let n = keywords.len() as i32;
    let max_weight = keywords.iter().map(|k| k.weight).fold(0.0, f64::max);
    let caption = format!("评论关键词Top{}", keywords.len());
    // row 0 is at the bottom of the chart
    let term_at_row = |row: i32| -> String {
        keywords
            .get((n - 1 - row) as usize)
            .map(|k| k.term.clone())
            .unwrap_or_default()
    };

    let root = BitMapBackend::new(path, BAR_CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&caption, (font_family, 32.0))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(140)
        .build_cartesian_2d(0f64..max_weight * 1.1, (0..n).into_segmented())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(keywords.len())
        .y_label_formatter(&|value| match value {
            SegmentValue::CenterOf(row) => term_at_row(*row),
            _ => String::new(),
        })
        .x_label_formatter(&|weight| format!("{weight:.2}"))
        .x_desc("权重")
        .label_style((font_family, 18.0))
        .axis_desc_style((font_family, 20.0))
        .draw()?;

    chart.draw_series(keywords.iter().enumerate().map(|(i, keyword)| {
        let row = n - 1 - i as i32;
        let mut bar = Rectangle::new(
            [
                (0.0, SegmentValue::Exact(row)),
                (keyword.weight, SegmentValue::Exact(row + 1)),
            ],
            PALETTE[0].filled(),
        );
        bar.set_margin(4, 4, 0, 0);
        bar
    }))?;

    root.present()?;
    info!(path = %path.display(), bars = keywords.len(), "keyword bar chart saved");
    Ok(())
}

/// Slice labels like `1星 (62.5%)`, one per rating present, ascending.
pub fn pie_labels(rating_counts: &BTreeMap<u8, usize>) -> Vec<String> {
    let total: usize = rating_counts.values().sum();
    rating_counts
        .iter()
        .map(|(stars, &count)| {
            let share = if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            };
            format!("{stars}星 ({share:.1}%)")
        })
        .collect()
}

pub fn render_rating_pie(
    rating_counts: &BTreeMap<u8, usize>,
    path: &Path,
    font_family: &str,
) -> Result<()> {
    if rating_counts.values().all(|&count| count == 0) {
        bail!("No ratings to chart");
    }

    let root = BitMapBackend::new(path, PIE_CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let area = root.titled("评分分布", (font_family, 36.0))?;

    let (width, height) = area.dim_in_pixel();
    let center = (width as i32 / 2, height as i32 / 2);
    let radius = width.min(height) as f64 * 0.35;
    let sizes: Vec<f64> = rating_counts.values().map(|&c| c as f64).collect();
    let colors: Vec<RGBColor> = (0..sizes.len()).map(|i| PALETTE[i % PALETTE.len()]).collect();
    let labels = pie_labels(rating_counts);

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.start_angle(90.0);
    pie.label_style((font_family, 24.0).into_font().color(&BLACK));
    area.draw(&pie)?;

    root.present()?;
    info!(path = %path.display(), slices = sizes.len(), "rating distribution saved");
    Ok(())
}
