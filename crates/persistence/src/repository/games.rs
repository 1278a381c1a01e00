//! Archived game repositories for the NHL and NBA scrapers

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// One side of an archived NHL game (two rows per game)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NhlGameRow {
    pub id: Option<i64>,
    pub game_id: String,
    pub season: i64,
    pub side: String,
    pub game_type: String,
    pub game_date: String,
    pub team_id: String,
    pub team_name: String,
    pub goals: i64,
    pub winner: String,
    pub ot_winner: String,
    pub final_period: i64,
    pub created_at: Option<i64>,
}

/// An archived NBA game with both running score timelines
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NbaGameRow {
    pub id: Option<i64>,
    pub game_id: String,
    pub season: i64,
    pub game_type: String,
    pub date_code: String,
    pub final_period: i64,
    pub home_team_id: String,
    pub away_team_id: String,
    /// "seconds:points" pairs joined by ';'
    pub home_points: String,
    pub away_points: String,
    pub created_at: Option<i64>,
}

/// Repository for archived NHL and NBA games
pub struct GamesRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> GamesRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Save NHL rows (INSERT OR IGNORE, so re-archiving a season is idempotent).
    /// Returns the number of rows actually inserted.
    pub async fn save_nhl(&self, rows: &[NhlGameRow]) -> DbResult<u64> {
        let mut inserted = 0;
        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO nhl_games (
                    game_id, season, side, game_type, game_date,
                    team_id, team_name, goals, winner, ot_winner, final_period
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.game_id)
            .bind(row.season)
            .bind(&row.side)
            .bind(&row.game_type)
            .bind(&row.game_date)
            .bind(&row.team_id)
            .bind(&row.team_name)
            .bind(row.goals)
            .bind(&row.winner)
            .bind(&row.ot_winner)
            .bind(row.final_period)
            .execute(self.pool)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    /// Load one season's NHL rows, home side before away within each game
    pub async fn nhl_season(&self, season: i64) -> DbResult<Vec<NhlGameRow>> {
        let rows = sqlx::query_as::<_, NhlGameRow>(
            r#"
            SELECT id, game_id, season, side, game_type, game_date,
                   team_id, team_name, goals, winner, ot_winner, final_period,
                   created_at
            FROM nhl_games
            WHERE season = ?
            ORDER BY game_id, side DESC
            "#,
        )
        .bind(season)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Save NBA rows (INSERT OR IGNORE on game_id).
    /// Returns the number of rows actually inserted.
    pub async fn save_nba(&self, rows: &[NbaGameRow]) -> DbResult<u64> {
        let mut inserted = 0;
        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO nba_games (
                    game_id, season, game_type, date_code, final_period,
                    home_team_id, away_team_id, home_points, away_points
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.game_id)
            .bind(row.season)
            .bind(&row.game_type)
            .bind(&row.date_code)
            .bind(row.final_period)
            .bind(&row.home_team_id)
            .bind(&row.away_team_id)
            .bind(&row.home_points)
            .bind(&row.away_points)
            .execute(self.pool)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    /// Load one season's NBA games ordered by game id
    pub async fn nba_season(&self, season: i64) -> DbResult<Vec<NbaGameRow>> {
        let rows = sqlx::query_as::<_, NbaGameRow>(
            r#"
            SELECT id, game_id, season, game_type, date_code, final_period,
                   home_team_id, away_team_id, home_points, away_points,
                   created_at
            FROM nba_games
            WHERE season = ?
            ORDER BY game_id
            "#,
        )
        .bind(season)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_nhl(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nhl_games")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }

    pub async fn count_nba(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nba_games")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }
}
