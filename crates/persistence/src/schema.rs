//! Database schema definitions

/// SQL to create all tables
/// NOTE: All odds/money amounts stored as TEXT to preserve rust_decimal::Decimal precision
pub const CREATE_TABLES: &str = r#"
-- Scraped NHL games, two rows per game with the home side first
CREATE TABLE IF NOT EXISTS nhl_games (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id TEXT NOT NULL,
    season INTEGER NOT NULL,
    side TEXT NOT NULL,
    game_type TEXT NOT NULL,
    game_date TEXT NOT NULL,
    team_id TEXT NOT NULL,
    team_name TEXT NOT NULL,
    goals INTEGER NOT NULL DEFAULT 0,
    winner TEXT NOT NULL,
    ot_winner TEXT NOT NULL,
    final_period INTEGER NOT NULL DEFAULT 3,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    UNIQUE(game_id, side)
);

-- Scraped NBA games with each side's running points timeline encoded as text
CREATE TABLE IF NOT EXISTS nba_games (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id TEXT NOT NULL UNIQUE,
    season INTEGER NOT NULL,
    game_type TEXT NOT NULL,
    date_code TEXT NOT NULL,
    final_period INTEGER NOT NULL DEFAULT 4,
    home_team_id TEXT NOT NULL,
    away_team_id TEXT NOT NULL,
    home_points TEXT NOT NULL,
    away_points TEXT NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Scraped odds listings, per-bookmaker prices kept as a JSON blob
CREATE TABLE IF NOT EXISTS odds_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    season INTEGER NOT NULL,
    stage TEXT NOT NULL,
    home_team TEXT NOT NULL,
    away_team TEXT NOT NULL,
    match_day TEXT NOT NULL,
    match_time TEXT NOT NULL,
    bookmakers TEXT NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    UNIQUE(season, home_team, away_team, match_day, match_time)
);

-- Backtest run summaries (knowledge base)
CREATE TABLE IF NOT EXISTS backtest_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    params_hash TEXT NOT NULL UNIQUE,
    strategy_name TEXT NOT NULL,
    seasons TEXT NOT NULL,
    params TEXT NOT NULL,
    games_considered INTEGER NOT NULL DEFAULT 0,
    bets_placed INTEGER NOT NULL DEFAULT 0,
    wins INTEGER NOT NULL DEFAULT 0,
    losses INTEGER NOT NULL DEFAULT 0,
    hit_rate TEXT NOT NULL DEFAULT '0',
    total_return TEXT NOT NULL DEFAULT '0',
    final_notional TEXT NOT NULL DEFAULT '0',
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_nhl_games_season ON nhl_games(season);
CREATE INDEX IF NOT EXISTS idx_nba_games_season ON nba_games(season);
CREATE INDEX IF NOT EXISTS idx_odds_season ON odds_records(season);
CREATE INDEX IF NOT EXISTS idx_runs_hash ON backtest_runs(params_hash);
CREATE INDEX IF NOT EXISTS idx_runs_strategy ON backtest_runs(strategy_name)
"#;

/// ALTER TABLE migrations for columns added after the original schema.
/// Each runs on startup; duplicate-column errors are tolerated.
pub const MIGRATIONS: &[&str] =
    &["ALTER TABLE backtest_runs ADD COLUMN max_drawdown TEXT"];
