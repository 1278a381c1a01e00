//! Archived odds listing repository

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// One scraped odds listing. Per-bookmaker prices stay opaque here; the
/// `bookmakers` column holds the listing's JSON odds object verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OddsRow {
    pub id: Option<i64>,
    pub season: i64,
    pub stage: String,
    pub home_team: String,
    pub away_team: String,
    pub match_day: String,
    pub match_time: String,
    pub bookmakers: String,
    pub created_at: Option<i64>,
}

/// Repository for scraped odds listings
pub struct OddsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OddsRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Save listings (INSERT OR IGNORE on the season/teams/kickoff key).
    /// Returns the number of rows actually inserted.
    pub async fn save(&self, rows: &[OddsRow]) -> DbResult<u64> {
        let mut inserted = 0;
        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO odds_records (
                    season, stage, home_team, away_team,
                    match_day, match_time, bookmakers
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.season)
            .bind(&row.stage)
            .bind(&row.home_team)
            .bind(&row.away_team)
            .bind(&row.match_day)
            .bind(&row.match_time)
            .bind(&row.bookmakers)
            .execute(self.pool)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    /// Load one season's listings in scrape order
    pub async fn by_season(&self, season: i64) -> DbResult<Vec<OddsRow>> {
        let rows = sqlx::query_as::<_, OddsRow>(
            r#"
            SELECT id, season, stage, home_team, away_team,
                   match_day, match_time, bookmakers, created_at
            FROM odds_records
            WHERE season = ?
            ORDER BY id
            "#,
        )
        .bind(season)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM odds_records")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn listing(home: &str, day: &str) -> OddsRow {
        OddsRow {
            id: None,
            season: 2018,
            stage: "regular-season".to_string(),
            home_team: home.to_string(),
            away_team: "Toronto Maple Leafs".to_string(),
            match_day: day.to_string(),
            match_time: "19:00".to_string(),
            bookmakers: r#"{"bet365":{"home.odds":"2.10","tie.odds":"4.00","away.odds":"3.40"}}"#
                .to_string(),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn listings_dedupe_on_the_kickoff_key() {
        let db = Database::in_memory().await.unwrap();
        let repo = OddsRepository::new(db.pool());

        let rows = vec![
            listing("Boston Bruins", "03 Oct 2018"),
            listing("Boston Bruins", "03 Oct 2018"),
            listing("Boston Bruins", "05 Oct 2018"),
        ];
        assert_eq!(repo.save(&rows).await.unwrap(), 2);
        assert_eq!(repo.count().await.unwrap(), 2);

        let season = repo.by_season(2018).await.unwrap();
        assert_eq!(season.len(), 2);
        assert_eq!(season[0].match_day, "03 Oct 2018");
        assert!(season[0].bookmakers.contains("bet365"));
    }

    #[tokio::test]
    async fn rematches_on_other_days_are_distinct_rows() {
        let db = Database::in_memory().await.unwrap();
        let repo = OddsRepository::new(db.pool());

        repo.save(&[listing("Boston Bruins", "03 Oct 2018")])
            .await
            .unwrap();
        repo.save(&[listing("Boston Bruins", "10 Jan 2019")])
            .await
            .unwrap();

        assert_eq!(repo.by_season(2018).await.unwrap().len(), 2);
        assert!(repo.by_season(2019).await.unwrap().is_empty());
    }
}
