//! Wagerlab — historical sports wagering research toolkit
//!
//! Usage:
//!   wagerlab scrape nhl --seasons 2009..2018     — archive NHL seasons as CSV
//!   wagerlab backtest markov --seasons 2015      — replay the playoff model
//!   wagerlab analyze ruin --ledgers a.csv,b.csv  — risk-of-ruin estimate

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use engine::api::http::Fetcher;
use engine::dataset::{self, BACKTEST_BOOKMAKERS, MARKOV_BOOKMAKERS};
use engine::stats::ruin::{self, RuinConfig};
use engine::stats::significance::{self, SignificanceConfig};
use engine::stats::{correlation, longshot};
use engine::{
    archive_report, predict_playoffs, recommend, run_dutch_replay, ArbitrageConfig,
    BacktestConfig, BacktestEngine, BacktestReport, DutchReport, GameOdds, GamePair, MarkovModel,
    MarkovPlayoff, NbaClient, NbaGamePair, NhlClient, OddsFeedClient, RestFade, ScorePrediction,
    Season, SeasonData, Strategy, StrategySeries, StreakFade, SyntheticConfig,
};
use persistence::repository::{
    BacktestRepository, GamesRepository, NbaGameRow, NhlGameRow, OddsRepository, OddsRow,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{error, info, warn};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "wagerlab")]
#[command(about = "Historical sports wagering research toolkit", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape league schedules and closing odds into season files
    Scrape {
        #[command(subcommand)]
        source: ScrapeSource,
    },
    /// Replay a betting rule over archived seasons
    Backtest {
        #[command(subcommand)]
        rule: ReplayRule,
    },
    /// Fit the strength model on one season and export its bet matrix
    Fit {
        /// Directory of Season<year>.csv files
        #[arg(long, default_value = "data")]
        games_dir: PathBuf,
        /// Directory of Season<year>.json odds files
        #[arg(long, default_value = "data")]
        odds_dir: PathBuf,
        /// Season starting year, e.g. 2017
        #[arg(long)]
        season: Season,
        /// Output CSV (default analysis/BetMatrix<year>.csv)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Project playoff outcomes from regular season data
    Predict {
        #[command(subcommand)]
        target: PredictTarget,
    },
    /// Statistics over settled ledgers and archived seasons
    Analyze {
        #[command(subcommand)]
        analysis: AnalyzeCommand,
    },
    /// Rank upcoming games against an exported bet matrix
    Wager {
        /// Bet matrix CSV written by `fit`
        #[arg(long)]
        matrix: PathBuf,
        /// Candidate games CSV with current prices
        #[arg(long)]
        candidates: PathBuf,
        /// Base stake per ticket
        #[arg(long, default_value_t = dec!(100))]
        unit: Decimal,
    },
    /// Inspect the backtest knowledge base
    Archive {
        #[command(subcommand)]
        action: ArchiveAction,
    },
}

#[derive(Subcommand)]
enum ScrapeSource {
    /// NHL schedule and linescores into Season<year>.csv files
    Nhl(ScrapeArgs),
    /// NBA schedule and play-by-play score curves into NbaSeason<year>.csv
    Nba(ScrapeArgs),
    /// Closing three-way odds into Season<year>.json files
    Odds(ScrapeArgs),
}

#[derive(Args)]
struct ScrapeArgs {
    /// Season list: "2015,2016" or "2009..2018"
    #[arg(long)]
    seasons: String,
    /// Output directory for season files
    #[arg(long, default_value = "data")]
    out: PathBuf,
    /// Also archive the scraped rows into SQLite
    #[arg(long)]
    archive: bool,
}

#[derive(Subcommand)]
enum ReplayRule {
    /// Back the modelled favourite in every playoff game
    Markov(ReplayArgs),
    /// Fade teams riding a three-game winning streak
    Streak(ReplayArgs),
    /// Fade short-rested sides that are not the favourite
    Rest(ReplayArgs),
    /// Dutch all three outcomes whenever the best prices lock a profit
    Arbitrage {
        /// Directory of Season<year>.csv files
        #[arg(long, default_value = "data")]
        games_dir: PathBuf,
        /// Directory of Season<year>.json odds files
        #[arg(long, default_value = "data")]
        odds_dir: PathBuf,
        /// Season list: "2015,2016" or "2009..2018"
        #[arg(long)]
        seasons: String,
        /// Bankroll dutched across the three outcomes of each game
        #[arg(long, default_value_t = dec!(5000))]
        bankroll: Decimal,
        /// Output directory for the ledger and equity CSVs
        #[arg(long, default_value = "analysis")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct ReplayArgs {
    /// Directory of Season<year>.csv files
    #[arg(long, default_value = "data")]
    games_dir: PathBuf,
    /// Directory of Season<year>.json odds files
    #[arg(long, default_value = "data")]
    odds_dir: PathBuf,
    /// Season list: "2015,2016" or "2009..2018"
    #[arg(long)]
    seasons: String,
    /// Base unit; stakes scale to unit * odds
    #[arg(long, default_value_t = dec!(100))]
    unit: Decimal,
    /// Starting notional for the equity curve
    #[arg(long, default_value_t = dec!(2000))]
    bankroll: Decimal,
    /// Flat stakes instead of odds-scaled
    #[arg(long)]
    flat: bool,
    /// Output directory for the ledger and equity CSVs
    #[arg(long, default_value = "analysis")]
    out: PathBuf,
}

#[derive(Subcommand)]
enum PredictTarget {
    /// Synthetic control score projection for NBA playoff games
    Score {
        /// Directory of NbaSeason<year>.csv files
        #[arg(long, default_value = "data")]
        games_dir: PathBuf,
        /// Season list: "2015,2016" or "2009..2018"
        #[arg(long)]
        seasons: String,
        /// Donor games kept per playoff game
        #[arg(long, default_value_t = 24)]
        controls: usize,
        /// Ridge penalty for the weight solve
        #[arg(long, default_value_t = 1.0)]
        lambda: f64,
        /// Output directory for the prediction CSV
        #[arg(long, default_value = "analysis")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum AnalyzeCommand {
    /// Monte Carlo null distributions and a t-test for one ledger
    Significance {
        /// Performance CSV written by `backtest`
        #[arg(long)]
        performance: PathBuf,
        /// Alternate histories per repetition (best one kept)
        #[arg(long, default_value_t = 100)]
        samples: usize,
        /// Repetitions per null distribution
        #[arg(long, default_value_t = 1000)]
        reps: usize,
        /// Output directory for the histogram CSVs
        #[arg(long, default_value = "analysis")]
        out: PathBuf,
    },
    /// Pairwise return correlation across strategy ledgers
    Correlation {
        /// Comma-separated performance CSVs
        #[arg(long, value_delimiter = ',')]
        ledgers: Vec<PathBuf>,
        /// Output matrix CSV
        #[arg(long, default_value = "analysis/correlation.csv")]
        out: PathBuf,
    },
    /// Risk of ruin for the combined strategies
    Ruin {
        /// Comma-separated performance CSVs
        #[arg(long, value_delimiter = ',')]
        ledgers: Vec<PathBuf>,
        /// Capital the combined strategies draw down from
        #[arg(long, default_value_t = 15000.0)]
        capital: f64,
        /// Output directory for the trough histogram and combined returns
        #[arg(long, default_value = "analysis")]
        out: PathBuf,
    },
    /// Long-shot bias ANOVA across favourite, tie, and long-shot policies
    Longshot {
        /// Directory of Season<year>.csv files
        #[arg(long, default_value = "data")]
        games_dir: PathBuf,
        /// Directory of Season<year>.json odds files
        #[arg(long, default_value = "data")]
        odds_dir: PathBuf,
        /// Season list: "2015,2016" or "2009..2018"
        #[arg(long)]
        seasons: String,
        /// Output directory for the per-game policy returns CSV
        #[arg(long, default_value = "analysis")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum ArchiveAction {
    /// Knowledge base summary and best archived runs
    Stats,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,wagerlab=debug")
    } else {
        EnvFilter::new("info,engine=info,wagerlab=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Scrape { source } => match source {
            ScrapeSource::Nhl(args) => cmd_scrape_nhl(args).await?,
            ScrapeSource::Nba(args) => cmd_scrape_nba(args).await?,
            ScrapeSource::Odds(args) => cmd_scrape_odds(args).await?,
        },
        Commands::Backtest { rule } => match rule {
            ReplayRule::Markov(args) => {
                cmd_backtest(&MarkovPlayoff, &MARKOV_BOOKMAKERS, args).await?
            }
            ReplayRule::Streak(args) => {
                cmd_backtest(&StreakFade::default(), &BACKTEST_BOOKMAKERS, args).await?
            }
            ReplayRule::Rest(args) => {
                cmd_backtest(&RestFade::default(), &BACKTEST_BOOKMAKERS, args).await?
            }
            ReplayRule::Arbitrage {
                games_dir,
                odds_dir,
                seasons,
                bankroll,
                out,
            } => cmd_arbitrage(&games_dir, &odds_dir, &seasons, bankroll, &out)?,
        },
        Commands::Fit {
            games_dir,
            odds_dir,
            season,
            out,
        } => cmd_fit(&games_dir, &odds_dir, season, out)?,
        Commands::Predict { target } => match target {
            PredictTarget::Score {
                games_dir,
                seasons,
                controls,
                lambda,
                out,
            } => cmd_predict_score(&games_dir, &seasons, controls, lambda, &out)?,
        },
        Commands::Analyze { analysis } => match analysis {
            AnalyzeCommand::Significance {
                performance,
                samples,
                reps,
                out,
            } => cmd_analyze_significance(&performance, samples, reps, &out)?,
            AnalyzeCommand::Correlation { ledgers, out } => {
                cmd_analyze_correlation(&ledgers, &out)?
            }
            AnalyzeCommand::Ruin {
                ledgers,
                capital,
                out,
            } => cmd_analyze_ruin(&ledgers, capital, &out)?,
            AnalyzeCommand::Longshot {
                games_dir,
                odds_dir,
                seasons,
                out,
            } => cmd_analyze_longshot(&games_dir, &odds_dir, &seasons, &out)?,
        },
        Commands::Wager {
            matrix,
            candidates,
            unit,
        } => cmd_wager(&matrix, &candidates, unit)?,
        Commands::Archive { action } => match action {
            ArchiveAction::Stats => cmd_archive_stats().await?,
        },
    }

    Ok(())
}

// ============================================================================
// Shared plumbing
// ============================================================================

fn db_path() -> String {
    std::env::var("WAGERLAB_DB_PATH").unwrap_or_else(|_| "data/wagerlab.db".to_string())
}

async fn open_db() -> anyhow::Result<persistence::Database> {
    let path = db_path();
    let db = persistence::Database::new(&path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", path);
    Ok(db)
}

/// HTTP fetcher for the scrape commands; set WAGERLAB_HTTP_CACHE to replay
/// responses from disk instead of hitting the APIs again.
fn new_fetcher() -> Fetcher {
    match std::env::var("WAGERLAB_HTTP_CACHE") {
        Ok(dir) if !dir.is_empty() => Fetcher::new().with_cache_dir(dir),
        _ => Fetcher::new(),
    }
}

/// Reads one season of games, merges the scraped odds onto them and drops
/// games no allowed bookmaker priced.
fn load_season(
    games_dir: &Path,
    odds_dir: &Path,
    season: Season,
    books: &[&str],
) -> anyhow::Result<SeasonData> {
    let mut pairs = dataset::read_season_csv(&dataset::season_csv_path(games_dir, season))?;
    let listings = dataset::read_odds_json(&dataset::season_json_path(odds_dir, season))?;
    let stats = dataset::merge_odds(&mut pairs, &listings, books);
    info!(
        %season,
        matched = stats.matched,
        unmatched = stats.unmatched,
        "odds merged"
    );
    let games = dataset::retain_priced(pairs);
    if games.is_empty() {
        warn!(%season, "no priced games after the merge");
    }
    Ok(SeasonData { season, games })
}

fn load_seasons(
    games_dir: &Path,
    odds_dir: &Path,
    seasons: &[Season],
    books: &[&str],
) -> anyhow::Result<Vec<SeasonData>> {
    seasons
        .iter()
        .map(|&season| load_season(games_dir, odds_dir, season, books))
        .collect()
}

/// Reads settled ledgers back as named return series; the strategy name is
/// the file stem minus the `_performance` suffix.
fn load_series(ledgers: &[PathBuf]) -> anyhow::Result<Vec<StrategySeries>> {
    ledgers
        .iter()
        .map(|path| {
            let bets = dataset::read_performance_csv(path)?;
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("ledger");
            let name = stem.strip_suffix("_performance").unwrap_or(stem);
            Ok(StrategySeries::from_bets(name, &bets))
        })
        .collect()
}

// ============================================================================
// Scrape commands
// ============================================================================

async fn cmd_scrape_nhl(args: ScrapeArgs) -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    let seasons = Season::parse_list(&args.seasons)?;
    let client = NhlClient::new(new_fetcher());
    let db = if args.archive {
        Some(open_db().await?)
    } else {
        None
    };

    for &season in &seasons {
        info!(%season, "scraping NHL season");
        let pairs = client.fetch_season(season).await?;
        let path = dataset::season_csv_path(&args.out, season);
        dataset::write_season_csv(&path, &pairs)?;
        println!("  {}  {:>5} games  -> {}", season, pairs.len(), path.display());

        if let Some(db) = &db {
            let repo = GamesRepository::new(db.pool());
            let inserted = repo.save_nhl(&nhl_rows(&pairs)).await?;
            info!(%season, inserted, "NHL rows archived");
        }
    }
    Ok(())
}

async fn cmd_scrape_nba(args: ScrapeArgs) -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    let seasons = Season::parse_list(&args.seasons)?;
    let client = NbaClient::new(new_fetcher());
    let db = if args.archive {
        Some(open_db().await?)
    } else {
        None
    };

    for &season in &seasons {
        info!(%season, "scraping NBA season");
        let pairs = client.fetch_season(season).await?;
        let path = dataset::nba_season_csv_path(&args.out, season);
        dataset::write_nba_season_csv(&path, &pairs)?;
        println!("  {}  {:>5} games  -> {}", season, pairs.len(), path.display());

        if let Some(db) = &db {
            let repo = GamesRepository::new(db.pool());
            let inserted = repo.save_nba(&nba_rows(&pairs)).await?;
            info!(%season, inserted, "NBA rows archived");
        }
    }
    Ok(())
}

async fn cmd_scrape_odds(args: ScrapeArgs) -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    let seasons = Season::parse_list(&args.seasons)?;
    let client = OddsFeedClient::new(new_fetcher());
    let db = if args.archive {
        Some(open_db().await?)
    } else {
        None
    };

    for &season in &seasons {
        info!(%season, "scraping odds archive");
        let listings = client.scrape_season(season).await?;
        let path = dataset::season_json_path(&args.out, season);
        dataset::write_odds_json(&path, &listings)?;
        println!(
            "  {}  {:>5} listings  -> {}",
            season,
            listings.len(),
            path.display()
        );

        if let Some(db) = &db {
            let repo = OddsRepository::new(db.pool());
            let inserted = repo.save(&odds_rows(season, &listings)?).await?;
            info!(%season, inserted, "odds listings archived");
        }
    }
    Ok(())
}

fn nhl_rows(pairs: &[GamePair]) -> Vec<NhlGameRow> {
    let mut rows = Vec::with_capacity(pairs.len() * 2);
    for pair in pairs {
        for (side, team) in [("home", &pair.home), ("away", &pair.away)] {
            rows.push(NhlGameRow {
                id: None,
                game_id: pair.game_id.clone(),
                season: i64::from(pair.season.0),
                side: side.to_string(),
                game_type: pair.game_type.as_code().to_string(),
                game_date: pair.date.format("%Y-%m-%d %H:%M:%S").to_string(),
                team_id: team.team_id.clone(),
                team_name: team.team_name.clone(),
                goals: i64::from(team.goals),
                winner: pair.winner.as_str().to_string(),
                ot_winner: pair.ot_winner.as_str().to_string(),
                final_period: i64::from(pair.final_period),
                created_at: None,
            });
        }
    }
    rows
}

fn nba_rows(pairs: &[NbaGamePair]) -> Vec<NbaGameRow> {
    pairs
        .iter()
        .map(|pair| NbaGameRow {
            id: None,
            game_id: pair.game_id.clone(),
            season: i64::from(pair.season.0),
            game_type: pair.game_type.as_code().to_string(),
            date_code: pair.date_code.clone(),
            final_period: i64::from(pair.final_period),
            home_team_id: pair.home_team_id.clone(),
            away_team_id: pair.away_team_id.clone(),
            home_points: dataset::encode_ticks(&pair.home_points),
            away_points: dataset::encode_ticks(&pair.away_points),
            created_at: None,
        })
        .collect()
}

fn stage_label(listing: &GameOdds) -> &'static str {
    if listing.playoffs {
        "playoffs"
    } else if listing.pre_season {
        "pre-season"
    } else {
        "regular-season"
    }
}

fn odds_rows(season: Season, listings: &[GameOdds]) -> anyhow::Result<Vec<OddsRow>> {
    listings
        .iter()
        .map(|listing| {
            Ok(OddsRow {
                id: None,
                season: i64::from(season.0),
                stage: stage_label(listing).to_string(),
                home_team: listing.home.clone(),
                away_team: listing.away.clone(),
                match_day: listing.day.clone(),
                match_time: listing.time.clone(),
                bookmakers: serde_json::to_string(&listing.odds)?,
                created_at: None,
            })
        })
        .collect()
}

// ============================================================================
// Backtest commands
// ============================================================================

async fn cmd_backtest(
    strategy: &dyn Strategy,
    books: &[&str],
    args: ReplayArgs,
) -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    let seasons = Season::parse_list(&args.seasons)?;
    let data = load_seasons(&args.games_dir, &args.odds_dir, &seasons, books)?;

    let backtester = BacktestEngine::new(BacktestConfig {
        unit: args.unit,
        initial_notional: args.bankroll,
        flat_stakes: args.flat,
    });
    let report = backtester.run(strategy, &data)?;
    print_report(&report);

    let ledger_path = args.out.join(format!("{}_performance.csv", report.strategy));
    dataset::write_performance_csv(&ledger_path, &report.bets)?;
    let equity_path = args.out.join(format!("{}_equity.csv", report.strategy));
    dataset::write_equity_csv(&equity_path, &report.equity_curve)?;
    println!("\nLedger: {}", ledger_path.display());
    println!("Equity: {}", equity_path.display());

    let db = open_db().await?;
    let params = serde_json::json!({
        "unit": args.unit.to_string(),
        "bankroll": args.bankroll.to_string(),
        "flat": args.flat,
    });
    archive_report(db.pool(), &report, &params).await?;

    Ok(())
}

fn cmd_arbitrage(
    games_dir: &Path,
    odds_dir: &Path,
    seasons: &str,
    bankroll: Decimal,
    out: &Path,
) -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    let seasons = Season::parse_list(seasons)?;
    // best prices over the widest book list
    let data = load_seasons(games_dir, odds_dir, &seasons, &MARKOV_BOOKMAKERS)?;

    let report = run_dutch_replay(&data, &ArbitrageConfig { bankroll });
    print_dutch_report(&report);

    let ledger_path = out.join("dutch_ledger.csv");
    dataset::write_dutch_ledger_csv(&ledger_path, &report.books)?;
    let equity_path = out.join("dutch_equity.csv");
    dataset::write_equity_csv(&equity_path, &report.equity_curve)?;
    println!("\nLedger: {}", ledger_path.display());
    println!("Equity: {}", equity_path.display());

    Ok(())
}

fn print_report(report: &BacktestReport) {
    let seasons = report
        .seasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    println!("\nStrategy: {}", report.strategy);
    println!("Seasons:  {}", seasons);
    println!();
    println!("  {:<20} {:>12}", "Games considered", report.games_considered);
    println!("  {:<20} {:>12}", "Bets placed", report.bets_placed);
    println!("  {:<20} {:>12}", "Wins", report.wins);
    println!("  {:<20} {:>12}", "Losses", report.losses);
    println!("  {:<20} {:>11}%", "Hit rate", report.hit_rate);
    println!("  {:<20} {:>12.2}", "Total return", report.total_return);
    println!("  {:<20} {:>12.2}", "Final notional", report.final_notional);
    println!("  {:<20} {:>12.2}", "Max drawdown", report.max_drawdown);
}

fn print_dutch_report(report: &DutchReport) {
    println!("\nDutch replay over {} seasons", report.seasons.len());
    println!();
    println!("  {:<20} {:>12}", "Games considered", report.games_considered);
    println!("  {:<20} {:>12}", "Opportunities", report.opportunities);
    println!("  {:<20} {:>12.2}", "Total return", report.total_return);
    println!("  {:<20} {:>12.2}", "Final notional", report.final_notional);

    let hits: Vec<_> = report
        .books
        .iter()
        .filter(|book| book.locked_return > Decimal::ZERO)
        .collect();
    if hits.is_empty() {
        println!("\nNo guaranteed books at these prices.");
        return;
    }

    println!("\nGuaranteed books:");
    println!(
        "  {:>3}  {:<12} {:>7} {:>9} {:>9} {:>9} {:>10}",
        "#", "Game", "Season", "Home", "Tie", "Away", "Locked"
    );
    println!("  {}", "-".repeat(66));
    for (i, book) in hits.iter().take(25).enumerate() {
        println!(
            "  {:>3}  {:<12} {:>7} {:>9.2} {:>9.2} {:>9.2} {:>10.2}",
            i + 1,
            book.game_id,
            book.season.to_string(),
            book.stakes.home,
            book.stakes.tie,
            book.stakes.away,
            book.locked_return,
        );
    }
    if hits.len() > 25 {
        println!("  ... and {} more (see the ledger CSV)", hits.len() - 25);
    }
}

// ============================================================================
// Fit and predict commands
// ============================================================================

fn cmd_fit(
    games_dir: &Path,
    odds_dir: &Path,
    season: Season,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    let data = load_season(games_dir, odds_dir, season, &MARKOV_BOOKMAKERS)?;
    let (regular, _) = dataset::split_by_type(data.games);
    info!(%season, games = regular.len(), "fitting on the regular season");

    let model = MarkovModel::fit(&regular)?;
    let matrix = model.bet_matrix();

    let path = out.unwrap_or_else(|| PathBuf::from(format!("analysis/BetMatrix{}.csv", season)));
    dataset::write_bet_matrix_csv(&path, &matrix)?;

    println!("\nFitted curves:");
    println!("  goal differential  {}", model.goal_curve);
    println!("  steady state       {}", model.steady_curve);
    println!(
        "\nBet matrix: {} teams -> {}",
        matrix.teams.len(),
        path.display()
    );
    Ok(())
}

fn cmd_predict_score(
    games_dir: &Path,
    seasons: &str,
    controls: usize,
    lambda: f64,
    out: &Path,
) -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    let seasons = Season::parse_list(seasons)?;
    let config = SyntheticConfig {
        donors: controls,
        ridge_lambda: lambda,
    };

    let mut predictions: Vec<ScorePrediction> = Vec::new();
    for &season in &seasons {
        let path = dataset::nba_season_csv_path(games_dir, season);
        let pairs = dataset::read_nba_season_csv(&path, season)?;
        let mut preds = predict_playoffs(&pairs, &config)?;
        info!(%season, predictions = preds.len(), "playoff scores projected");
        predictions.append(&mut preds);
    }

    if predictions.is_empty() {
        println!("\nNo playoff games to predict.");
        return Ok(());
    }

    let path = out.join("score_predictions.csv");
    dataset::write_score_predictions_csv(&path, &predictions)?;

    let n = predictions.len() as f64;
    let mae = |pick: fn(&ScorePrediction) -> (f64, f64)| {
        predictions
            .iter()
            .map(|p| {
                let (predicted, actual) = pick(p);
                (predicted - actual).abs()
            })
            .sum::<f64>()
            / n
    };
    println!("\n{} playoff games, mean absolute error by checkpoint:", predictions.len());
    println!(
        "  {:<12} {:>8.2}",
        "regulation",
        mae(|p| (p.regulation.predicted, p.regulation.actual))
    );
    println!(
        "  {:<12} {:>8.2}",
        "overtime 1",
        mae(|p| (p.overtime[0].predicted, p.overtime[0].actual))
    );
    println!(
        "  {:<12} {:>8.2}",
        "overtime 2",
        mae(|p| (p.overtime[1].predicted, p.overtime[1].actual))
    );
    println!(
        "  {:<12} {:>8.2}",
        "overtime 3",
        mae(|p| (p.overtime[2].predicted, p.overtime[2].actual))
    );
    println!("\nPredictions: {}", path.display());
    Ok(())
}

// ============================================================================
// Analyze commands
// ============================================================================

fn cmd_analyze_significance(
    performance: &Path,
    samples: usize,
    reps: usize,
    out: &Path,
) -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    let bets = dataset::read_performance_csv(performance)?;
    anyhow::ensure!(
        !bets.is_empty(),
        "ledger {} has no settled bets",
        performance.display()
    );

    let config = SignificanceConfig {
        samples,
        reps,
        ..Default::default()
    };
    let observed = significance::strategy_mean(&bets);
    let mut rng = rand::thread_rng();

    let team_samples = significance::team_selection_null(&bets, &config, &mut rng);
    let team = significance::evaluate(&team_samples, observed)?;
    print_significance("Team selection null (coin-flip picks)", &team);

    let sizing_samples = significance::bet_sizing_null(&bets, &config, &mut rng)?;
    let sizing = significance::evaluate(&sizing_samples, observed)?;
    print_significance("Bet sizing null (resampled stakes)", &sizing);

    let team_path = out.join("team_selection_hist.csv");
    dataset::write_histogram_csv(&team_path, &team.histogram(50))?;
    let sizing_path = out.join("bet_sizing_hist.csv");
    dataset::write_histogram_csv(&sizing_path, &sizing.histogram(50))?;
    println!("\nHistograms: {}, {}", team_path.display(), sizing_path.display());
    Ok(())
}

fn print_significance(label: &str, report: &significance::SignificanceReport) {
    println!("\n{}", label);
    println!("  {:<20} {:>12.4}", "Strategy mean", report.strategy_mean);
    println!("  {:<20} {:>12.4}", "Null mean", report.null_mean);
    println!("  {:<20} {:>12.4}", "Null std", report.null_std);
    println!("  {:<20} {:>12.3}", "t statistic", report.t_statistic);
    println!("  {:<20} {:>12.4}", "p value", report.p_value);
}

fn cmd_analyze_correlation(ledgers: &[PathBuf], out: &Path) -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    anyhow::ensure!(ledgers.len() >= 2, "correlation needs at least two ledgers");

    let series = load_series(ledgers)?;
    let names: Vec<String> = series.iter().map(|s| s.name.clone()).collect();
    let matrix = correlation::correlation_matrix(&series);
    dataset::write_correlation_csv(out, &names, &matrix)?;

    println!();
    print!("  {:<16}", "");
    for name in &names {
        print!(" {:>14}", name);
    }
    println!();
    for (i, row) in matrix.iter().enumerate() {
        print!("  {:<16}", names[i]);
        for value in row {
            if value.is_nan() {
                print!(" {:>14}", "-");
            } else {
                print!(" {:>14.3}", value);
            }
        }
        println!();
    }
    println!("\nMatrix: {}", out.display());
    Ok(())
}

fn cmd_analyze_ruin(ledgers: &[PathBuf], capital: f64, out: &Path) -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    let series = load_series(ledgers)?;
    let report = ruin::ruin_probability(&series, &RuinConfig { starting_capital: capital })?;

    println!("\nCombined {} strategies", series.len());
    println!();
    println!("  {:<20} {:>12}", "Break-even cycles", report.troughs.len());
    println!("  {:<20} {:>12.2}", "Trough location", report.location);
    println!("  {:<20} {:>12.2}", "Trough scale", report.scale);
    println!("  {:<20} {:>12.2}", "Starting capital", report.starting_capital);
    println!("  {:<20} {:>12.6}", "P(ruin)", report.p_ruin);

    let hist_path = out.join("trough_hist.csv");
    dataset::write_histogram_csv(&hist_path, &report.histogram)?;
    let combined_path = out.join("combined_returns.csv");
    dataset::write_combined_returns_csv(&combined_path, &ruin::combine_series(&series))?;
    println!("\nHistogram: {}", hist_path.display());
    println!("Returns:   {}", combined_path.display());
    Ok(())
}

fn cmd_analyze_longshot(
    games_dir: &Path,
    odds_dir: &Path,
    seasons: &str,
    out: &Path,
) -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    let seasons = Season::parse_list(seasons)?;
    let data = load_seasons(games_dir, odds_dir, &seasons, &BACKTEST_BOOKMAKERS)?;
    let pairs: Vec<GamePair> = data.into_iter().flat_map(|season| season.games).collect();

    let report = longshot::analyze(&pairs)?;

    println!("\nFlat unit returns by policy over {} games", report.games.len());
    println!();
    println!("  {:<12} {:>10} {:>10}", "Policy", "Mean", "Std");
    println!("  {}", "-".repeat(34));
    println!(
        "  {:<12} {:>10.4} {:>10.4}",
        "favourite", report.favourite_mean, report.favourite_std
    );
    println!(
        "  {:<12} {:>10.4} {:>10.4}",
        "tie", report.tie_mean, report.tie_std
    );
    println!(
        "  {:<12} {:>10.4} {:>10.4}",
        "long shot", report.long_shot_mean, report.long_shot_std
    );
    println!();
    println!("  {:<12} {:>10.3}", "F statistic", report.f_statistic);
    println!("  {:<12} {:>10.4}", "p value", report.p_value);

    let rows: Vec<(String, f64, f64, f64)> = report
        .games
        .iter()
        .map(|game| {
            (
                game.game_id.clone(),
                game.favourite,
                game.tie,
                game.long_shot,
            )
        })
        .collect();
    let path = out.join("policy_returns.csv");
    dataset::write_policy_returns_csv(&path, &rows)?;
    println!("\nReturns: {}", path.display());
    Ok(())
}

// ============================================================================
// Wager and archive commands
// ============================================================================

fn cmd_wager(matrix: &Path, candidates: &Path, unit: Decimal) -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    let matrix = dataset::read_bet_matrix_csv(matrix)?;
    let candidates = dataset::read_wager_candidates_csv(candidates)?;
    let tickets = recommend(&matrix, &candidates, unit);

    if tickets.is_empty() {
        println!("\nNo candidates matched the matrix.");
        return Ok(());
    }

    println!("\nRecommended tickets:");
    println!(
        "  {:>3}  {:<12} {:<6} {:<22} {:>7} {:>9} {:>8} {:>8}",
        "#", "Game", "Side", "Team", "Odds", "Stake", "P(win)", "EV"
    );
    println!("  {}", "-".repeat(82));
    for (i, ticket) in tickets.iter().enumerate() {
        println!(
            "  {:>3}  {:<12} {:<6} {:<22} {:>7.2} {:>9.2} {:>7.1}% {:>+8.3}",
            i + 1,
            ticket.game_id,
            ticket.side.as_str(),
            ticket.team_name,
            ticket.odds,
            ticket.stake,
            ticket.win_probability * 100.0,
            ticket.pseudo_ev,
        );
    }
    Ok(())
}

async fn cmd_archive_stats() -> anyhow::Result<()> {
    println!("\n=== Wagerlab v{} ===", APP_VERSION);
    let db = open_db().await?;

    let games = GamesRepository::new(db.pool());
    let odds = OddsRepository::new(db.pool());
    let backtests = BacktestRepository::new(db.pool());

    println!("\nKnowledge base: {}", db_path());
    println!();
    println!("  {:<20} {:>12}", "NHL rows", games.count_nhl().await?);
    println!("  {:<20} {:>12}", "NBA games", games.count_nba().await?);
    println!("  {:<20} {:>12}", "Odds listings", odds.count().await?);

    let stats = backtests.get_stats().await?;
    println!("  {:<20} {:>12}", "Archived runs", stats.total_runs);
    println!("  {:<20} {:>12}", "Unique strategies", stats.unique_strategies);
    if stats.total_runs > 0 {
        println!(
            "  {:<20} {:>12} ({})",
            "Best return", stats.best_return, stats.best_strategy_name
        );
    }

    let top = backtests.top_by_return(5).await?;
    if !top.is_empty() {
        println!("\nTop runs:");
        println!(
            "  {:>3}  {:<18} {:<14} {:>6} {:>8} {:>12}",
            "#", "Strategy", "Seasons", "Bets", "Hit", "Return"
        );
        println!("  {}", "-".repeat(68));
        for (i, run) in top.iter().enumerate() {
            println!(
                "  {:>3}  {:<18} {:<14} {:>6} {:>8} {:>12}",
                i + 1,
                run.strategy_name,
                run.seasons,
                run.bets_placed,
                run.hit_rate,
                run.total_return,
            );
        }
    }
    Ok(())
}
