use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One rating/comment as returned under `data.reviews[].value`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Option<Value>,
    pub rating: Option<u8>,
    pub title: Option<String>,
    pub review: Option<String>,
    pub nickname: Option<String>,
    pub app_version_string: Option<String>,
    pub last_modified: Option<Value>,
    pub helpful_views: Option<u64>,
    pub total_views: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewItem {
    #[serde(default)]
    pub value: Option<Review>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewData {
    #[serde(default)]
    pub reviews: Vec<ReviewItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewPage {
    #[serde(default)]
    pub data: ReviewData,
}

impl ReviewPage {
    pub fn from_value(page: &Value) -> Result<Self> {
        Ok(serde_json::from_value(page.clone())?)
    }

    pub fn reviews(&self) -> Vec<Review> {
        self.data
            .reviews
            .iter()
            .filter_map(|item| item.value.clone())
            .collect()
    }
}

/// The untouched `data.reviews` items of a response, if the response has them.
pub fn raw_review_items(page: &Value) -> Option<&Vec<Value>> {
    page.get("data")?.get("reviews")?.as_array()
}

/// Wraps items in the same envelope the store API uses.
pub fn review_envelope(items: Vec<Value>) -> Value {
    serde_json::json!({ "data": { "reviews": items } })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    MostHelpful,
    MostRecent,
    HighestRating,
    LowestRating,
}

impl SortOrder {
    pub fn api_name(self) -> &'static str {
        match self {
            SortOrder::MostHelpful => "REVIEW_SORT_ORDER_HELPFUL_SUMMARY_ALIGNED",
            SortOrder::MostRecent => "REVIEW_SORT_ORDER_MOST_RECENT",
            SortOrder::HighestRating => "REVIEW_SORT_ORDER_RATING_DESC",
            SortOrder::LowestRating => "REVIEW_SORT_ORDER_RATING_ASC",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortOrder::MostHelpful => "most_helpful",
            SortOrder::MostRecent => "most_recent",
            SortOrder::HighestRating => "highest_rating",
            SortOrder::LowestRating => "lowest_rating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct StarRating(u8);

impl StarRating {
    pub fn stars(self) -> u8 {
        self.0
    }

    pub fn api_name(self) -> String {
        format!("RATING_{}", self.0)
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "one_star",
            2 => "two_star",
            3 => "three_star",
            4 => "four_star",
            _ => "five_star",
        }
    }
}

impl TryFrom<u8> for StarRating {
    type Error = anyhow::Error;

    fn try_from(stars: u8) -> Result<Self> {
        if (1..=5).contains(&stars) {
            Ok(StarRating(stars))
        } else {
            Err(anyhow!("rating must be between 1 and 5, got {stars}"))
        }
    }
}

impl From<StarRating> for u8 {
    fn from(rating: StarRating) -> u8 {
        rating.0
    }
}

/// Flattened CSV row. Column names follow the store's JSON keys.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewRow {
    pub id: String,
    pub rating: Option<u8>,
    pub title: String,
    pub review: String,
    pub nickname: String,
    #[serde(rename = "appVersion")]
    pub app_version: String,
    #[serde(rename = "lastModified")]
    pub last_modified: String,
    #[serde(rename = "helpfulViews")]
    pub helpful_views: u64,
    #[serde(rename = "totalViews")]
    pub total_views: u64,
}

fn scalar_to_string(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

impl From<&Review> for ReviewRow {
    fn from(review: &Review) -> Self {
        ReviewRow {
            id: scalar_to_string(&review.id),
            rating: review.rating,
            title: review.title.clone().unwrap_or_default(),
            review: review.review.clone().unwrap_or_default(),
            nickname: review.nickname.clone().unwrap_or_default(),
            app_version: review.app_version_string.clone().unwrap_or_default(),
            last_modified: scalar_to_string(&review.last_modified),
            helpful_views: review.helpful_views.unwrap_or(0),
            total_views: review.total_views.unwrap_or(0),
        }
    }
}
