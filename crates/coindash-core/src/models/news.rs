use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default, alias = "published_at")]
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
}
