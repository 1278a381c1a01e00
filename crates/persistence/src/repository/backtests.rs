//! Backtest run repository, the knowledge base of archived results

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A single backtest run summary, deduplicated by params hash
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BacktestRunRecord {
    pub id: Option<i64>,
    pub params_hash: String,
    pub strategy_name: String,
    pub seasons: String,
    pub params: String,
    pub games_considered: i64,
    pub bets_placed: i64,
    pub wins: i64,
    pub losses: i64,
    pub hit_rate: String,
    pub total_return: String,
    pub final_notional: String,
    // Added via migration
    pub max_drawdown: Option<String>,
    pub created_at: Option<i64>,
}

/// Aggregated stats over archived runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub total_runs: i64,
    pub unique_strategies: i64,
    pub best_return: String,
    pub best_strategy_name: String,
}

/// Repository for backtest run summaries
pub struct BacktestRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BacktestRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Save a run (INSERT OR IGNORE, skips if params_hash already exists)
    pub async fn save(&self, record: &BacktestRunRecord) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO backtest_runs (
                params_hash, strategy_name, seasons, params,
                games_considered, bets_placed, wins, losses,
                hit_rate, total_return, final_notional, max_drawdown
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.params_hash)
        .bind(&record.strategy_name)
        .bind(&record.seasons)
        .bind(&record.params)
        .bind(record.games_considered)
        .bind(record.bets_placed)
        .bind(record.wins)
        .bind(record.losses)
        .bind(&record.hit_rate)
        .bind(&record.total_return)
        .bind(&record.final_notional)
        .bind(&record.max_drawdown)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Check if a run with this params_hash already exists
    pub async fn exists_by_hash(&self, hash: &str) -> DbResult<bool> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM backtest_runs WHERE params_hash = ?")
                .bind(hash)
                .fetch_one(self.pool)
                .await?;

        Ok(row.0 > 0)
    }

    /// Get a run by its params_hash
    pub async fn get_by_hash(&self, hash: &str) -> DbResult<Option<BacktestRunRecord>> {
        let record = sqlx::query_as::<_, BacktestRunRecord>(
            r#"
            SELECT id, params_hash, strategy_name, seasons, params,
                   games_considered, bets_placed, wins, losses,
                   hit_rate, total_return, final_notional, max_drawdown,
                   created_at
            FROM backtest_runs
            WHERE params_hash = ?
            "#,
        )
        .bind(hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Top runs ordered by total return
    pub async fn top_by_return(&self, limit: i64) -> DbResult<Vec<BacktestRunRecord>> {
        let records = sqlx::query_as::<_, BacktestRunRecord>(
            r#"
            SELECT id, params_hash, strategy_name, seasons, params,
                   games_considered, bets_placed, wins, losses,
                   hit_rate, total_return, final_notional, max_drawdown,
                   created_at
            FROM backtest_runs
            ORDER BY CAST(total_return AS REAL) DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Aggregated archive stats
    pub async fn get_stats(&self) -> DbResult<ArchiveStats> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM backtest_runs")
            .fetch_one(self.pool)
            .await?;

        let unique_strategies: (i64,) =
            sqlx::query_as("SELECT COUNT(DISTINCT strategy_name) FROM backtest_runs")
                .fetch_one(self.pool)
                .await?;

        let best: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT total_return, strategy_name
            FROM backtest_runs
            ORDER BY CAST(total_return AS REAL) DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool)
        .await?;

        let (best_return, best_strategy_name) =
            best.unwrap_or_else(|| ("0".to_string(), "N/A".to_string()));

        Ok(ArchiveStats {
            total_runs: total.0,
            unique_strategies: unique_strategies.0,
            best_return,
            best_strategy_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn record(hash: &str, strategy: &str, total_return: &str) -> BacktestRunRecord {
        BacktestRunRecord {
            id: None,
            params_hash: hash.to_string(),
            strategy_name: strategy.to_string(),
            seasons: "2015,2016,2017".to_string(),
            params: r#"{"unit":"100"}"#.to_string(),
            games_considered: 1230,
            bets_placed: 400,
            wins: 210,
            losses: 190,
            hit_rate: "52.50".to_string(),
            total_return: total_return.to_string(),
            final_notional: "2840".to_string(),
            max_drawdown: Some("310".to_string()),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn save_then_fetch_round_trips() {
        let db = Database::in_memory().await.unwrap();
        let repo = BacktestRepository::new(db.pool());

        let id = repo.save(&record("abc123", "markov", "840")).await.unwrap();
        assert!(id > 0);
        assert!(repo.exists_by_hash("abc123").await.unwrap());
        assert!(!repo.exists_by_hash("zzz999").await.unwrap());

        let fetched = repo.get_by_hash("abc123").await.unwrap().unwrap();
        assert_eq!(fetched.strategy_name, "markov");
        assert_eq!(fetched.total_return, "840");
        assert_eq!(fetched.max_drawdown.as_deref(), Some("310"));
        assert!(fetched.created_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_hash_is_ignored() {
        let db = Database::in_memory().await.unwrap();
        let repo = BacktestRepository::new(db.pool());

        repo.save(&record("abc123", "markov", "840")).await.unwrap();
        repo.save(&record("abc123", "markov", "999")).await.unwrap();

        let stats = repo.get_stats().await.unwrap();
        assert_eq!(stats.total_runs, 1);
        let kept = repo.get_by_hash("abc123").await.unwrap().unwrap();
        assert_eq!(kept.total_return, "840");
    }

    #[tokio::test]
    async fn top_runs_order_by_numeric_return() {
        let db = Database::in_memory().await.unwrap();
        let repo = BacktestRepository::new(db.pool());

        // Lexicographic order would put "99" over "1200"
        repo.save(&record("h1", "streak", "99")).await.unwrap();
        repo.save(&record("h2", "markov", "1200")).await.unwrap();
        repo.save(&record("h3", "rest", "-35")).await.unwrap();

        let top = repo.top_by_return(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].strategy_name, "markov");
        assert_eq!(top[1].strategy_name, "streak");

        let stats = repo.get_stats().await.unwrap();
        assert_eq!(stats.total_runs, 3);
        assert_eq!(stats.unique_strategies, 3);
        assert_eq!(stats.best_strategy_name, "markov");
        assert_eq!(stats.best_return, "1200");
    }

    #[tokio::test]
    async fn empty_archive_reports_defaults() {
        let db = Database::in_memory().await.unwrap();
        let repo = BacktestRepository::new(db.pool());

        let stats = repo.get_stats().await.unwrap();
        assert_eq!(stats.total_runs, 0);
        assert_eq!(stats.best_return, "0");
        assert_eq!(stats.best_strategy_name, "N/A");
    }
}
