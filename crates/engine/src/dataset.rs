//! Season file IO and odds merging.
//!
//! Scraped seasons live under a data directory as `Season{year}.csv` (games)
//! and `Season{year}.json` (odds listings). Backtests join the two in memory:
//! each game is matched to a listing by team names and listed start time, and
//! the best price per leg across an allowed bookmaker list is kept.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::arbitrage::DutchBook;
use crate::markov::BetMatrix;
use crate::stats::HistogramBin;
use crate::synthetic::ScorePrediction;
use crate::types::{
    BetRecord, GameOdds, GamePair, GameType, GameWinner, MatchOdds, NbaGamePair, Pick, PointsTick,
    Season, TeamSide,
};
use crate::wager::WagerCandidate;

/// Books a human bettor can realistically get down with
pub const BACKTEST_BOOKMAKERS: [&str; 3] = ["bet365", "William Hill", "Bethard"];

/// Wider list used when fitting the playoff model
pub const MARKOV_BOOKMAKERS: [&str; 10] = [
    "bet365",
    "William Hill",
    "Bethard",
    "bet-at-home",
    "bwin",
    "Unibet",
    "1xBet",
    "18Bet",
    "Marathonbet",
    "Coolbet",
];

/// Listings match a game when their start times differ by at most this much
const MERGE_WINDOW_HOURS: i64 = 10;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn season_csv_path(dir: &Path, season: Season) -> PathBuf {
    dir.join(format!("Season{}.csv", season))
}

pub fn season_json_path(dir: &Path, season: Season) -> PathBuf {
    dir.join(format!("Season{}.json", season))
}

pub fn nba_season_csv_path(dir: &Path, season: Season) -> PathBuf {
    dir.join(format!("NbaSeason{}.csv", season))
}

fn create_parent_dirs(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    Ok(())
}

// ============================================================================
// NHL season CSV (two rows per game, home first)
// ============================================================================

const NHL_HEADER: &str = "game_id,side,game_type,date,team_id,team_name,goals,winner,ot_winner,final_period";

pub fn write_season_csv(path: &Path, pairs: &[GamePair]) -> Result<()> {
    create_parent_dirs(path)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", NHL_HEADER)?;
    for pair in pairs {
        for (side, team) in [("home", &pair.home), ("away", &pair.away)] {
            writeln!(
                writer,
                "{},{},{},{},{},{},{},{},{},{}",
                pair.game_id,
                side,
                pair.game_type.as_code(),
                pair.date.format(DATE_FORMAT),
                team.team_id,
                team.team_name,
                team.goals,
                pair.winner.as_str(),
                pair.ot_winner.as_str(),
                pair.final_period,
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn read_season_csv(path: &Path) -> Result<Vec<GamePair>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let header = lines
        .next()
        .transpose()?
        .with_context(|| format!("{} is empty", path.display()))?;
    if header != NHL_HEADER {
        anyhow::bail!("{} has unexpected header '{}'", path.display(), header);
    }

    struct Row {
        game_id: String,
        side: String,
        game_type: GameType,
        date: DateTime<Utc>,
        team: TeamSide,
        winner: GameWinner,
        ot_winner: GameWinner,
        final_period: u32,
    }

    let mut rows = Vec::new();
    for (index, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let lineno = index + 2;
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 10 {
            anyhow::bail!("{} line {}: expected 10 fields", path.display(), lineno);
        }
        let parse = || -> Result<Row> {
            Ok(Row {
                game_id: fields[0].to_string(),
                side: fields[1].to_string(),
                game_type: GameType::from_code(fields[2])
                    .with_context(|| format!("bad game type '{}'", fields[2]))?,
                date: parse_date(fields[3])?,
                team: TeamSide {
                    team_id: fields[4].to_string(),
                    team_name: fields[5].to_string(),
                    goals: fields[6].parse()?,
                },
                winner: GameWinner::from_name(fields[7])
                    .with_context(|| format!("bad winner '{}'", fields[7]))?,
                ot_winner: GameWinner::from_name(fields[8])
                    .with_context(|| format!("bad winner '{}'", fields[8]))?,
                final_period: fields[9].parse()?,
            })
        };
        rows.push(
            parse().with_context(|| format!("{} line {}", path.display(), lineno))?,
        );
    }

    if rows.len() % 2 != 0 {
        anyhow::bail!("{} has an odd number of rows", path.display());
    }
    let mut pairs = Vec::with_capacity(rows.len() / 2);
    for chunk in rows.chunks_exact(2) {
        let (home, away) = (&chunk[0], &chunk[1]);
        if home.side != "home" || away.side != "away" || home.game_id != away.game_id {
            anyhow::bail!(
                "{}: rows for game {} are not a home/away pair",
                path.display(),
                home.game_id
            );
        }
        let season = Season::of_game_id(&home.game_id)
            .with_context(|| format!("game id '{}' has no season prefix", home.game_id))?;
        pairs.push(GamePair {
            game_id: home.game_id.clone(),
            season,
            game_type: home.game_type,
            date: home.date,
            home: home.team.clone(),
            away: away.team.clone(),
            winner: home.winner,
            ot_winner: home.ot_winner,
            final_period: home.final_period,
            odds: MatchOdds::default(),
        });
    }
    pairs.sort_by_key(|pair| pair.id_num());
    Ok(pairs)
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
        .with_context(|| format!("bad date '{}'", raw))?;
    Ok(naive.and_utc())
}

// ============================================================================
// NBA season CSV (running score timelines)
// ============================================================================

const NBA_HEADER: &str = "game_id,side,game_type,date_code,team_id,final_period,running_points";

pub fn write_nba_season_csv(path: &Path, pairs: &[NbaGamePair]) -> Result<()> {
    create_parent_dirs(path)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", NBA_HEADER)?;
    for pair in pairs {
        for (side, team_id, ticks) in [
            ("home", &pair.home_team_id, &pair.home_points),
            ("away", &pair.away_team_id, &pair.away_points),
        ] {
            writeln!(
                writer,
                "{},{},{},{},{},{},{}",
                pair.game_id,
                side,
                pair.game_type.as_code(),
                pair.date_code,
                team_id,
                pair.final_period,
                encode_ticks(ticks),
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// NBA game ids carry no season prefix, so the caller names the season the
/// file belongs to
pub fn read_nba_season_csv(path: &Path, season: Season) -> Result<Vec<NbaGamePair>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let header = lines
        .next()
        .transpose()?
        .with_context(|| format!("{} is empty", path.display()))?;
    if header != NBA_HEADER {
        anyhow::bail!("{} has unexpected header '{}'", path.display(), header);
    }

    struct Row {
        game_id: String,
        side: String,
        game_type: GameType,
        date_code: String,
        team_id: String,
        final_period: u32,
        ticks: Vec<PointsTick>,
    }

    let mut rows = Vec::new();
    for (index, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let lineno = index + 2;
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 7 {
            anyhow::bail!("{} line {}: expected 7 fields", path.display(), lineno);
        }
        let parse = || -> Result<Row> {
            Ok(Row {
                game_id: fields[0].to_string(),
                side: fields[1].to_string(),
                game_type: GameType::from_code(fields[2])
                    .with_context(|| format!("bad game type '{}'", fields[2]))?,
                date_code: fields[3].to_string(),
                team_id: fields[4].to_string(),
                final_period: fields[5].parse()?,
                ticks: decode_ticks(fields[6])?,
            })
        };
        rows.push(
            parse().with_context(|| format!("{} line {}", path.display(), lineno))?,
        );
    }

    if rows.len() % 2 != 0 {
        anyhow::bail!("{} has an odd number of rows", path.display());
    }
    let mut pairs = Vec::with_capacity(rows.len() / 2);
    for chunk in rows.chunks_exact(2) {
        let (home, away) = (&chunk[0], &chunk[1]);
        if home.side != "home" || away.side != "away" || home.game_id != away.game_id {
            anyhow::bail!(
                "{}: rows for game {} are not a home/away pair",
                path.display(),
                home.game_id
            );
        }
        pairs.push(NbaGamePair {
            game_id: home.game_id.clone(),
            season,
            game_type: home.game_type,
            date_code: home.date_code.clone(),
            final_period: home.final_period,
            home_team_id: home.team_id.clone(),
            away_team_id: away.team_id.clone(),
            home_points: home.ticks.clone(),
            away_points: away.ticks.clone(),
        });
    }
    pairs.sort_by(|a, b| a.game_id.cmp(&b.game_id));
    Ok(pairs)
}

/// Score timeline as a CSV-safe string: "seconds:points" pairs joined by ';'
pub fn encode_ticks(ticks: &[PointsTick]) -> String {
    ticks
        .iter()
        .map(|tick| format!("{}:{}", tick.seconds, tick.points))
        .collect::<Vec<_>>()
        .join(";")
}

pub fn decode_ticks(raw: &str) -> Result<Vec<PointsTick>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(';')
        .map(|part| {
            let (seconds, points) = part
                .split_once(':')
                .with_context(|| format!("bad tick '{}'", part))?;
            Ok(PointsTick {
                seconds: seconds.parse()?,
                points: points.parse()?,
            })
        })
        .collect()
}

// ============================================================================
// Odds listings JSON
// ============================================================================

pub fn write_odds_json(path: &Path, listings: &[GameOdds]) -> Result<()> {
    create_parent_dirs(path)?;
    let json = serde_json::to_string_pretty(listings)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Loads a season's odds listings, dropping pre-season games
pub fn read_odds_json(path: &Path) -> Result<Vec<GameOdds>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let listings: Vec<GameOdds> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let total = listings.len();
    let listings: Vec<GameOdds> = listings
        .into_iter()
        .filter(|listing| !listing.pre_season)
        .collect();
    debug!(
        kept = listings.len(),
        dropped = total - listings.len(),
        "loaded odds listings"
    );
    Ok(listings)
}

// ============================================================================
// Odds merging
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeStats {
    pub matched: usize,
    pub unmatched: usize,
    pub ambiguous: usize,
}

/// Attaches the best available odds to each game in place.
///
/// A listing matches when both team names agree and the listed start time is
/// within [`MERGE_WINDOW_HOURS`] of the game time. Games with no match keep
/// zero odds; the first listing wins when several match.
pub fn merge_odds(pairs: &mut [GamePair], listings: &[GameOdds], allowed: &[&str]) -> MergeStats {
    let timed: Vec<(&GameOdds, DateTime<Utc>)> = listings
        .iter()
        .filter_map(|listing| match listing.timestamp() {
            Ok(ts) => Some((listing, ts)),
            Err(error) => {
                debug!(home = %listing.home, away = %listing.away, %error, "skipping listing");
                None
            }
        })
        .collect();

    let window = chrono::Duration::hours(MERGE_WINDOW_HOURS);
    let mut stats = MergeStats::default();
    for pair in pairs.iter_mut() {
        let mut matches = timed.iter().filter(|(listing, ts)| {
            listing.home == pair.home.team_name
                && listing.away == pair.away.team_name
                && *ts + window >= pair.date
                && *ts - window <= pair.date
        });
        let first = match matches.next() {
            Some(first) => first,
            None => {
                stats.unmatched += 1;
                continue;
            }
        };
        if matches.next().is_some() {
            warn!(
                game_id = %pair.game_id,
                date = %pair.date,
                "odds match by teams and time not unique, taking the first"
            );
            stats.ambiguous += 1;
        }
        pair.odds = MatchOdds {
            home: first.0.best_price(allowed, |quote| quote.home),
            tie: first.0.best_price(allowed, |quote| quote.tie),
            away: first.0.best_price(allowed, |quote| quote.away),
        };
        stats.matched += 1;
    }
    stats
}

/// Drops games neither side of which carries a priced line
pub fn retain_priced(pairs: Vec<GamePair>) -> Vec<GamePair> {
    pairs
        .into_iter()
        .filter(|pair| pair.odds.home > Decimal::ZERO && pair.odds.away > Decimal::ZERO)
        .collect()
}

pub fn split_by_type(pairs: Vec<GamePair>) -> (Vec<GamePair>, Vec<GamePair>) {
    pairs
        .into_iter()
        .partition(|pair| pair.game_type == GameType::Regular)
}

// ============================================================================
// Backtest artifacts
// ============================================================================

const PERFORMANCE_HEADER: &str =
    "game_id,season,home_odds,tie_odds,away_odds,winner,prediction,stake,wager_return";

pub fn write_performance_csv(path: &Path, bets: &[BetRecord]) -> Result<()> {
    create_parent_dirs(path)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", PERFORMANCE_HEADER)?;
    for bet in bets {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{}",
            bet.game_id,
            bet.season,
            bet.odds.home,
            bet.odds.tie,
            bet.odds.away,
            bet.winner.label_for(crate::types::GameSide::Home),
            bet.prediction.label(),
            bet.stake,
            bet.wager_return,
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_performance_csv(path: &Path) -> Result<Vec<BetRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let header = lines
        .next()
        .transpose()?
        .with_context(|| format!("{} is empty", path.display()))?;
    if header != PERFORMANCE_HEADER {
        anyhow::bail!("{} has unexpected header '{}'", path.display(), header);
    }

    let mut bets = Vec::new();
    for (index, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let lineno = index + 2;
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 9 {
            anyhow::bail!("{} line {}: expected 9 fields", path.display(), lineno);
        }
        let parse = || -> Result<BetRecord> {
            Ok(BetRecord {
                game_id: fields[0].to_string(),
                season: fields[1].parse()?,
                odds: MatchOdds {
                    home: Decimal::from_str(fields[2])?,
                    tie: Decimal::from_str(fields[3])?,
                    away: Decimal::from_str(fields[4])?,
                },
                winner: GameWinner::from_label(fields[5].parse()?)
                    .with_context(|| format!("bad winner label '{}'", fields[5]))?,
                prediction: Pick::from_label(fields[6].parse()?)
                    .with_context(|| format!("bad prediction label '{}'", fields[6]))?,
                stake: Decimal::from_str(fields[7])?,
                wager_return: Decimal::from_str(fields[8])?,
            })
        };
        bets.push(
            parse().with_context(|| format!("{} line {}", path.display(), lineno))?,
        );
    }
    Ok(bets)
}

pub fn write_dutch_ledger_csv(path: &Path, books: &[DutchBook]) -> Result<()> {
    create_parent_dirs(path)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(
        writer,
        "game_id,season,home_odds,tie_odds,away_odds,winner,home_wager,tie_wager,away_wager,locked_return"
    )?;
    for book in books {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{}",
            book.game_id,
            book.season,
            book.odds.home,
            book.odds.tie,
            book.odds.away,
            book.winner.label_for(crate::types::GameSide::Home),
            book.stakes.home,
            book.stakes.tie,
            book.stakes.away,
            book.locked_return,
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_equity_csv(path: &Path, curve: &[crate::types::EquityPoint]) -> Result<()> {
    create_parent_dirs(path)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "game_number,season,notional")?;
    for point in curve {
        writeln!(
            writer,
            "{},{},{}",
            point.game_number, point.season, point.notional
        )?;
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// Bet matrix CSV (home rows by away columns)
// ============================================================================

pub fn write_bet_matrix_csv(path: &Path, matrix: &BetMatrix) -> Result<()> {
    create_parent_dirs(path)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let header: Vec<String> = matrix
        .teams
        .iter()
        .map(|team| format!("{}_away", team))
        .collect();
    writeln!(writer, "team,{}", header.join(","))?;
    for (row, team) in matrix.teams.iter().enumerate() {
        let cells: Vec<String> = matrix.probs[row]
            .iter()
            .map(|p| format!("{:.6}", p))
            .collect();
        writeln!(writer, "{}_home,{}", team, cells.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_bet_matrix_csv(path: &Path) -> Result<BetMatrix> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let header = lines
        .next()
        .transpose()?
        .with_context(|| format!("{} is empty", path.display()))?;
    let teams: Vec<String> = header
        .split(',')
        .skip(1)
        .map(|column| {
            column
                .strip_suffix("_away")
                .map(str::to_string)
                .with_context(|| format!("bad matrix column '{}'", column))
        })
        .collect::<Result<_>>()?;

    let mut probs = Vec::with_capacity(teams.len());
    for (index, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let lineno = index + 2;
        let mut fields = line.split(',');
        let label = fields
            .next()
            .with_context(|| format!("{} line {}: empty row", path.display(), lineno))?;
        let team = label
            .strip_suffix("_home")
            .with_context(|| format!("bad matrix row label '{}'", label))?;
        let row_index = probs.len();
        if teams.get(row_index).map(String::as_str) != Some(team) {
            anyhow::bail!(
                "{} line {}: row '{}' out of order with columns",
                path.display(),
                lineno,
                team
            );
        }
        let row: Vec<f64> = fields
            .map(|cell| cell.parse::<f64>().map_err(Into::into))
            .collect::<Result<_>>()
            .with_context(|| format!("{} line {}", path.display(), lineno))?;
        if row.len() != teams.len() {
            anyhow::bail!(
                "{} line {}: expected {} probabilities",
                path.display(),
                lineno,
                teams.len()
            );
        }
        probs.push(row);
    }
    if probs.len() != teams.len() {
        anyhow::bail!("{}: expected {} rows", path.display(), teams.len());
    }
    Ok(BetMatrix { teams, probs })
}

// ============================================================================
// Wager candidates CSV
// ============================================================================

const CANDIDATES_HEADER: &str = "game_id,home_id,home_name,away_id,away_name,home_odds,away_odds";

pub fn read_wager_candidates_csv(path: &Path) -> Result<Vec<WagerCandidate>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let header = lines
        .next()
        .transpose()?
        .with_context(|| format!("{} is empty", path.display()))?;
    if header != CANDIDATES_HEADER {
        anyhow::bail!("{} has unexpected header '{}'", path.display(), header);
    }

    let mut candidates = Vec::new();
    for (index, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let lineno = index + 2;
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 7 {
            anyhow::bail!("{} line {}: expected 7 fields", path.display(), lineno);
        }
        let parse = || -> Result<WagerCandidate> {
            Ok(WagerCandidate {
                game_id: fields[0].to_string(),
                home_id: fields[1].to_string(),
                home_name: fields[2].to_string(),
                away_id: fields[3].to_string(),
                away_name: fields[4].to_string(),
                home_odds: Decimal::from_str(fields[5])?,
                away_odds: Decimal::from_str(fields[6])?,
            })
        };
        candidates.push(
            parse().with_context(|| format!("{} line {}", path.display(), lineno))?,
        );
    }
    Ok(candidates)
}

// ============================================================================
// Analysis artifacts
// ============================================================================

pub fn write_score_predictions_csv(path: &Path, predictions: &[ScorePrediction]) -> Result<()> {
    create_parent_dirs(path)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(
        writer,
        "game_id,reg_pred,reg_actual,ot1_pred,ot1_actual,ot2_pred,ot2_actual,ot3_pred,ot3_actual"
    )?;
    for p in predictions {
        writeln!(
            writer,
            "{},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3}",
            p.game_id,
            p.regulation.predicted,
            p.regulation.actual,
            p.overtime[0].predicted,
            p.overtime[0].actual,
            p.overtime[1].predicted,
            p.overtime[1].actual,
            p.overtime[2].predicted,
            p.overtime[2].actual,
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_histogram_csv(path: &Path, bins: &[HistogramBin]) -> Result<()> {
    create_parent_dirs(path)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "bin_lo,bin_hi,density,fitted_density")?;
    for bin in bins {
        writeln!(
            writer,
            "{:.6},{:.6},{:.6},{:.6}",
            bin.lo, bin.hi, bin.density, bin.fitted_density
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Correlation matrix with strategy names on both axes; blank cells mean the
/// pair had no overlapping games
pub fn write_correlation_csv(path: &Path, names: &[String], matrix: &[Vec<f64>]) -> Result<()> {
    create_parent_dirs(path)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, ",{}", names.join(","))?;
    for (row, name) in names.iter().enumerate() {
        let cells: Vec<String> = matrix[row]
            .iter()
            .map(|value| {
                if value.is_nan() {
                    String::new()
                } else {
                    format!("{:.6}", value)
                }
            })
            .collect();
        writeln!(writer, "{},{}", name, cells.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

/// Combined per-game returns with a running cumulative sum
pub fn write_combined_returns_csv(path: &Path, rows: &[(String, f64)]) -> Result<()> {
    create_parent_dirs(path)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "game_id,wager_return,cumulative")?;
    let mut cumulative = 0.0;
    for (game_id, value) in rows {
        cumulative += value;
        writeln!(writer, "{},{:.4},{:.4}", game_id, value, cumulative)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_policy_returns_csv(
    path: &Path,
    rows: &[(String, f64, f64, f64)],
) -> Result<()> {
    create_parent_dirs(path)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "game_id,favourite,tie,long_shot")?;
    for (game_id, favourite, tie, long_shot) in rows {
        writeln!(
            writer,
            "{},{:.4},{:.4},{:.4}",
            game_id, favourite, tie, long_shot
        )?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BookmakerOdds, GameSide};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn test_pair(game_id: &str, home_name: &str, away_name: &str) -> GamePair {
        GamePair {
            game_id: game_id.to_string(),
            season: Season::of_game_id(game_id).unwrap(),
            game_type: GameType::Regular,
            date: Utc.with_ymd_and_hms(2018, 10, 3, 23, 0, 0).unwrap(),
            home: TeamSide {
                team_id: "6".to_string(),
                team_name: home_name.to_string(),
                goals: 3,
            },
            away: TeamSide {
                team_id: "10".to_string(),
                team_name: away_name.to_string(),
                goals: 2,
            },
            winner: GameWinner::Home,
            ot_winner: GameWinner::Home,
            final_period: 3,
            odds: MatchOdds::default(),
        }
    }

    fn listing(home: &str, away: &str, day: &str, time: &str) -> GameOdds {
        let mut odds = HashMap::new();
        odds.insert(
            "bet365".to_string(),
            BookmakerOdds {
                home: dec!(1.95),
                tie: dec!(4.20),
                away: dec!(3.60),
            },
        );
        odds.insert(
            "William Hill".to_string(),
            BookmakerOdds {
                home: dec!(2.05),
                tie: dec!(4.00),
                away: dec!(3.50),
            },
        );
        GameOdds {
            home: home.to_string(),
            away: away.to_string(),
            pre_season: false,
            regular_season: true,
            playoffs: false,
            day: day.to_string(),
            time: time.to_string(),
            odds,
        }
    }

    #[test]
    fn merge_matches_by_names_within_window() {
        let mut pairs = vec![test_pair("2018020001", "Boston Bruins", "Toronto Maple Leafs")];
        // Listed at 19:00 local vs 23:00 UTC game time, inside the 10 hour window
        let listings = vec![listing("Boston Bruins", "Toronto Maple Leafs", "03 Oct 2018", "19:00")];

        let stats = merge_odds(&mut pairs, &listings, &BACKTEST_BOOKMAKERS);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.unmatched, 0);
        // Best price per leg across the two allowed books
        assert_eq!(pairs[0].odds.home, dec!(2.05));
        assert_eq!(pairs[0].odds.tie, dec!(4.20));
        assert_eq!(pairs[0].odds.away, dec!(3.60));
    }

    #[test]
    fn merge_skips_outside_window_and_wrong_names() {
        let mut pairs = vec![test_pair("2018020001", "Boston Bruins", "Toronto Maple Leafs")];
        let listings = vec![
            // Eleven hours before the game
            listing("Boston Bruins", "Toronto Maple Leafs", "03 Oct 2018", "12:00"),
            listing("Boston Bruins", "Montreal Canadiens", "03 Oct 2018", "19:00"),
        ];

        let stats = merge_odds(&mut pairs, &listings, &BACKTEST_BOOKMAKERS);
        assert_eq!(stats.matched, 0);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(pairs[0].odds.home, Decimal::ZERO);
    }

    #[test]
    fn merge_restricts_to_allowed_books() {
        let mut pairs = vec![test_pair("2018020001", "Boston Bruins", "Toronto Maple Leafs")];
        let listings = vec![listing("Boston Bruins", "Toronto Maple Leafs", "03 Oct 2018", "19:00")];

        merge_odds(&mut pairs, &listings, &["bet365"]);
        assert_eq!(pairs[0].odds.home, dec!(1.95));
    }

    #[test]
    fn ticks_roundtrip_through_encoding() {
        let ticks = vec![
            PointsTick { seconds: 0.0, points: 0 },
            PointsTick { seconds: 14.5, points: 2 },
            PointsTick { seconds: 720.0, points: 28 },
        ];
        let decoded = decode_ticks(&encode_ticks(&ticks)).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[1].seconds, 14.5);
        assert_eq!(decoded[1].points, 2);
        assert!(decode_ticks("").unwrap().is_empty());
    }

    #[test]
    fn season_csv_roundtrips() {
        let path = std::env::temp_dir().join(format!(
            "wagerlab-season-{}.csv",
            std::process::id()
        ));
        let pairs = vec![test_pair("2018020001", "Boston Bruins", "Toronto Maple Leafs")];
        write_season_csv(&path, &pairs).unwrap();
        let read = read_season_csv(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(read.len(), 1);
        assert_eq!(read[0].game_id, "2018020001");
        assert_eq!(read[0].home.team_name, "Boston Bruins");
        assert_eq!(read[0].away.goals, 2);
        assert_eq!(read[0].winner, GameWinner::Home);
        assert_eq!(read[0].season, Season(2018));
        assert_eq!(read[0].date, pairs[0].date);
    }

    #[test]
    fn performance_csv_roundtrips() {
        let path = std::env::temp_dir().join(format!(
            "wagerlab-perf-{}.csv",
            std::process::id()
        ));
        let bets = vec![BetRecord {
            game_id: "2018030111".to_string(),
            season: Season(2018),
            odds: MatchOdds {
                home: dec!(2.10),
                tie: dec!(4.00),
                away: dec!(3.30),
            },
            winner: GameWinner::Home,
            prediction: Pick::Home,
            stake: dec!(210),
            wager_return: dec!(231.00),
        }];
        write_performance_csv(&path, &bets).unwrap();
        let read = read_performance_csv(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(read.len(), 1);
        assert_eq!(read[0].winner, GameWinner::Home);
        assert_eq!(read[0].prediction, Pick::Home);
        assert_eq!(read[0].odds.home, dec!(2.10));
        assert_eq!(read[0].wager_return, dec!(231.00));
        assert_eq!(
            read[0].winner.label_for(GameSide::Home),
            1
        );
    }
}
