//! Recommendation model

use std::str::FromStr;

use sqlx::{FromRow, SqlitePool};

/// Category of advice attached to a pest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationType {
    Ipm,
    Chemical,
    Prevention,
}

impl FromStr for RecommendationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IPM" => Ok(Self::Ipm),
            "Chemical" => Ok(Self::Chemical),
            "Prevention" => Ok(Self::Prevention),
            other => Err(format!("unknown recommendation type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Recommendation {
    pub pest_id: i64,
    /// Raw type column; see `kind()`
    pub recommendation_type: String,
    pub details: String,
    pub source: Option<String>,
    pub verified_date: Option<String>,
}

impl Recommendation {
    /// Parsed type, `None` for values outside the known categories
    pub fn kind(&self) -> Option<RecommendationType> {
        self.recommendation_type.parse().ok()
    }

    /// All rows for a pest, in insertion order
    pub async fn list_by_pest(pool: &SqlitePool, pest_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Recommendation>(
            r#"
            SELECT
                PestID AS pest_id,
                RecommendationType AS recommendation_type,
                RecommendationDetails AS details,
                Source AS source,
                LastVerifiedDate AS verified_date
            FROM recommendations
            WHERE PestID = ?
            ORDER BY rowid
            "#
        )
        .bind(pest_id)
        .fetch_all(pool)
        .await
    }
}
