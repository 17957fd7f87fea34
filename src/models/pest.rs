//! Pest model

use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, FromRow)]
pub struct Pest {
    pub id: i64,
    /// Normalized: lowercase, spaces replaced by underscores
    pub common_name: String,
    pub info: Option<String>,
}

impl Pest {
    /// Exact match on the normalized common name
    pub async fn find_by_common_name(
        pool: &SqlitePool,
        common_name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Pest>(
            r#"
            SELECT PestID AS id, PestCommonName AS common_name, PestInfo AS info
            FROM pests
            WHERE PestCommonName = ?
            "#
        )
        .bind(common_name)
        .fetch_optional(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM pests")
            .fetch_one(pool)
            .await
    }
}
