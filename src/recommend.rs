//! Recommendation aggregation
//!
//! Pest name -> knowledge store lookup -> advice grouped by category.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::ServiceError;
use crate::models::{Pest, Recommendation, RecommendationType};

/// Shown when a pest has no descriptive text
pub const DEFAULT_PEST_INFO: &str = "No detailed information available.";
const CHEMICAL_DOSAGE_NOTE: &str = "See details";
const CHEMICAL_SAFETY_NOTE: &str = "Follow all safety guidelines.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemicalSolution {
    pub pesticide: String,
    #[serde(rename = "dosage")]
    pub dosage_note: String,
    #[serde(rename = "notes")]
    pub safety_note: String,
}

/// Categorized advice for one pest. Built per request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPayload {
    #[serde(rename = "pest_name")]
    pub display_name: String,
    #[serde(rename = "pest_info")]
    pub info: String,
    pub ipm_solutions: Vec<String>,
    pub chemical_solutions: Vec<ChemicalSolution>,
    pub prevention_tips: Vec<String>,
}

/// Lookup key form: trimmed, lowercase, spaces as underscores
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Human form of a common name: underscores as spaces, words title-cased
pub fn displayify(common_name: &str) -> String {
    let spaced = common_name.replace('_', " ");
    let mut out = String::with_capacity(spaced.len());
    let mut prev_alpha = false;

    for c in spaced.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }

    out
}

/// Look up a pest by name and group its recommendations
pub async fn recommend(pool: &SqlitePool, pest_name: &str) -> Result<RecommendationPayload, ServiceError> {
    let key = normalize(pest_name);

    let pest = Pest::find_by_common_name(pool, &key)
        .await?
        .ok_or_else(|| ServiceError::NotFound(key.clone()))?;

    let rows = Recommendation::list_by_pest(pool, pest.id).await?;
    tracing::debug!("Found {} recommendations for {}", rows.len(), key);

    Ok(aggregate(&pest, rows))
}

fn aggregate(pest: &Pest, rows: Vec<Recommendation>) -> RecommendationPayload {
    let mut ipm_solutions = Vec::new();
    let mut chemical_solutions = Vec::new();
    let mut prevention_tips = Vec::new();

    for row in rows {
        match row.kind() {
            Some(RecommendationType::Ipm) => ipm_solutions.push(row.details),
            Some(RecommendationType::Chemical) => chemical_solutions.push(ChemicalSolution {
                pesticide: row.details,
                dosage_note: CHEMICAL_DOSAGE_NOTE.to_string(),
                safety_note: CHEMICAL_SAFETY_NOTE.to_string(),
            }),
            Some(RecommendationType::Prevention) => prevention_tips.push(row.details),
            None => tracing::debug!(
                "Skipping recommendation with unknown type '{}' for pest {}",
                row.recommendation_type,
                pest.id
            ),
        }
    }

    let info = pest.info.as_deref()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(DEFAULT_PEST_INFO)
        .to_string();

    RecommendationPayload {
        display_name: displayify(&pest.common_name),
        info,
        ipm_solutions,
        chemical_solutions,
        prevention_tips,
    }
}
