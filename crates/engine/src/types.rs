//! Types shared across the research engine

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An NHL/NBA season identified by its starting year (2018 = 2018-19)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Season(pub u16);

impl Season {
    /// Eight-digit season code used by the league schedule APIs, e.g. "20182019"
    pub fn code(&self) -> String {
        format!("{}{}", self.0, self.0 + 1)
    }

    /// Season of a numeric game id (first four digits are the starting year)
    pub fn of_game_id(game_id: &str) -> Option<Season> {
        game_id.get(..4)?.parse::<u16>().ok().map(Season)
    }

    /// Parses "2018", "2015,2016,2018" or an inclusive range "2009..2018"
    pub fn parse_list(input: &str) -> anyhow::Result<Vec<Season>> {
        let input = input.trim();
        if let Some((start, end)) = input.split_once("..") {
            let start: Season = start.trim().parse()?;
            let end: Season = end.trim().parse()?;
            if end.0 < start.0 {
                anyhow::bail!("season range {} is backwards", input);
            }
            return Ok((start.0..=end.0).map(Season).collect());
        }
        input
            .split(',')
            .map(|part| part.trim().parse::<Season>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("invalid season list '{}'", input))
    }
}

impl FromStr for Season {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let year: u16 = s
            .parse()
            .with_context(|| format!("invalid season '{}'", s))?;
        if !(1900..2100).contains(&year) {
            anyhow::bail!("season {} out of range", year);
        }
        Ok(Season(year))
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Regular season or playoffs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Regular,
    Playoff,
}

impl GameType {
    pub fn as_code(&self) -> &'static str {
        match self {
            GameType::Regular => "R",
            GameType::Playoff => "P",
        }
    }

    pub fn from_code(code: &str) -> Option<GameType> {
        match code {
            "R" => Some(GameType::Regular),
            "P" => Some(GameType::Playoff),
            _ => None,
        }
    }
}

/// Side of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameSide {
    Home,
    Away,
}

impl GameSide {
    pub fn opposite(&self) -> GameSide {
        match self {
            GameSide::Home => GameSide::Away,
            GameSide::Away => GameSide::Home,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameSide::Home => "home",
            GameSide::Away => "away",
        }
    }
}

/// Final outcome of a game. Overtime decisions are collapsed to `Tie`
/// so every model sees the regulation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameWinner {
    Home,
    Away,
    Tie,
}

impl GameWinner {
    /// Numeric label from `side`'s perspective: win 1, tie 0, loss -1
    pub fn label_for(&self, side: GameSide) -> i8 {
        match (self, side) {
            (GameWinner::Tie, _) => 0,
            (GameWinner::Home, GameSide::Home) | (GameWinner::Away, GameSide::Away) => 1,
            _ => -1,
        }
    }

    /// Win credit from `side`'s perspective: win 1.0, tie 0.5, loss 0.0
    pub fn credit_for(&self, side: GameSide) -> f64 {
        f64::from(self.label_for(side) + 1) / 2.0
    }

    pub fn from_label(label: i8) -> Option<GameWinner> {
        match label {
            1 => Some(GameWinner::Home),
            0 => Some(GameWinner::Tie),
            -1 => Some(GameWinner::Away),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameWinner::Home => "home",
            GameWinner::Away => "away",
            GameWinner::Tie => "tie",
        }
    }

    pub fn from_name(name: &str) -> Option<GameWinner> {
        match name {
            "home" => Some(GameWinner::Home),
            "away" => Some(GameWinner::Away),
            "tie" => Some(GameWinner::Tie),
            _ => None,
        }
    }
}

/// One side's team and score line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSide {
    pub team_id: String,
    pub team_name: String,
    pub goals: u32,
}

/// Best available three-way odds for a game, zero when no book priced it
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MatchOdds {
    pub home: Decimal,
    pub tie: Decimal,
    pub away: Decimal,
}

impl MatchOdds {
    /// True when every leg carries a priced line
    pub fn is_complete(&self) -> bool {
        self.home > Decimal::ZERO && self.tie > Decimal::ZERO && self.away > Decimal::ZERO
    }

    pub fn for_side(&self, side: GameSide) -> Decimal {
        match side {
            GameSide::Home => self.home,
            GameSide::Away => self.away,
        }
    }
}

/// A completed game with both sides resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePair {
    pub game_id: String,
    pub season: Season,
    pub game_type: GameType,
    pub date: DateTime<Utc>,
    pub home: TeamSide,
    pub away: TeamSide,
    /// Regulation outcome (overtime and shootout games are ties)
    pub winner: GameWinner,
    /// Outcome including overtime and shootout
    pub ot_winner: GameWinner,
    pub final_period: u32,
    pub odds: MatchOdds,
}

impl GamePair {
    pub fn goal_diff(&self) -> i32 {
        self.home.goals as i32 - self.away.goals as i32
    }

    pub fn id_num(&self) -> i64 {
        self.game_id.parse().unwrap_or(0)
    }
}

/// Cumulative score at a moment of play, `seconds` from the opening tip
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointsTick {
    pub seconds: f64,
    pub points: u32,
}

/// An NBA game with each side's running score timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbaGamePair {
    pub game_id: String,
    pub season: Season,
    pub game_type: GameType,
    /// Schedule date code, e.g. "20181016"
    pub date_code: String,
    pub final_period: u32,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_points: Vec<PointsTick>,
    pub away_points: Vec<PointsTick>,
}

/// Three-way odds quoted by a single bookmaker
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BookmakerOdds {
    #[serde(rename = "home.odds")]
    pub home: Decimal,
    #[serde(rename = "tie.odds")]
    pub tie: Decimal,
    #[serde(rename = "away.odds")]
    pub away: Decimal,
}

/// A scraped odds listing for one game, bookmaker by bookmaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOdds {
    pub home: String,
    pub away: String,
    #[serde(rename = "pre-season")]
    pub pre_season: bool,
    #[serde(rename = "regular-season")]
    pub regular_season: bool,
    pub playoffs: bool,
    /// Listed start day, "%d %b %Y"
    pub day: String,
    /// Listed start time, "%H:%M"
    pub time: String,
    pub odds: HashMap<String, BookmakerOdds>,
}

impl GameOdds {
    pub fn timestamp(&self) -> anyhow::Result<DateTime<Utc>> {
        let raw = format!("{} {}", self.day, self.time);
        let naive = chrono::NaiveDateTime::parse_from_str(&raw, "%d %b %Y %H:%M")
            .with_context(|| format!("invalid odds timestamp '{}'", raw))?;
        Ok(naive.and_utc())
    }

    /// Best price across `allowed` bookmakers for one leg, zero when nobody priced it
    pub fn best_price(&self, allowed: &[&str], leg: fn(&BookmakerOdds) -> Decimal) -> Decimal {
        self.odds
            .iter()
            .filter(|(name, _)| allowed.contains(&name.as_str()))
            .map(|(_, quote)| leg(quote))
            .max()
            .unwrap_or(Decimal::ZERO)
    }
}

/// A strategy's call on a single game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pick {
    Home,
    Away,
    Skip,
}

impl Pick {
    /// Numeric label: home 1, away -1, skip 0
    pub fn label(&self) -> i8 {
        match self {
            Pick::Home => 1,
            Pick::Away => -1,
            Pick::Skip => 0,
        }
    }

    pub fn from_label(label: i8) -> Option<Pick> {
        match label {
            1 => Some(Pick::Home),
            -1 => Some(Pick::Away),
            0 => Some(Pick::Skip),
            _ => None,
        }
    }
}

/// A settled bet in a backtest ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRecord {
    pub game_id: String,
    pub season: Season,
    pub odds: MatchOdds,
    pub winner: GameWinner,
    pub prediction: Pick,
    /// Notional staked on the chosen side
    pub stake: Decimal,
    pub wager_return: Decimal,
}

/// A point on the bankroll curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub game_number: usize,
    pub season: Season,
    pub notional: Decimal,
}

/// Result of replaying a strategy over historical seasons
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub strategy: String,
    pub seasons: Vec<Season>,
    pub games_considered: u32,
    pub bets_placed: u32,
    pub wins: u32,
    pub losses: u32,
    pub hit_rate: Decimal,
    pub total_return: Decimal,
    pub initial_notional: Decimal,
    pub final_notional: Decimal,
    pub max_drawdown: Decimal,
    pub bets: Vec<BetRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_list_parses_ranges_and_commas() {
        let range = Season::parse_list("2009..2012").unwrap();
        assert_eq!(
            range,
            vec![Season(2009), Season(2010), Season(2011), Season(2012)]
        );

        let list = Season::parse_list("2015,2018").unwrap();
        assert_eq!(list, vec![Season(2015), Season(2018)]);

        assert!(Season::parse_list("2018..2009").is_err());
        assert!(Season::parse_list("abc").is_err());
    }

    #[test]
    fn season_code_spans_two_years() {
        assert_eq!(Season(2018).code(), "20182019");
        assert_eq!(Season::of_game_id("2017020001"), Some(Season(2017)));
    }

    #[test]
    fn winner_labels_follow_home_perspective() {
        assert_eq!(GameWinner::Home.label_for(GameSide::Home), 1);
        assert_eq!(GameWinner::Home.label_for(GameSide::Away), -1);
        assert_eq!(GameWinner::Tie.label_for(GameSide::Home), 0);
        assert_eq!(GameWinner::Away.credit_for(GameSide::Away), 1.0);
        assert_eq!(GameWinner::Tie.credit_for(GameSide::Away), 0.5);
        assert_eq!(GameWinner::Home.credit_for(GameSide::Away), 0.0);
    }

    #[test]
    fn best_price_ignores_unlisted_books() {
        use rust_decimal_macros::dec;

        let mut odds = HashMap::new();
        odds.insert(
            "bet365".to_string(),
            BookmakerOdds {
                home: dec!(2.10),
                tie: dec!(4.00),
                away: dec!(3.40),
            },
        );
        odds.insert(
            "Pinnacle".to_string(),
            BookmakerOdds {
                home: dec!(2.50),
                tie: dec!(4.10),
                away: dec!(3.10),
            },
        );
        let listing = GameOdds {
            home: "Boston Bruins".to_string(),
            away: "Toronto Maple Leafs".to_string(),
            pre_season: false,
            regular_season: true,
            playoffs: false,
            day: "03 Oct 2018".to_string(),
            time: "19:00".to_string(),
            odds,
        };

        // Pinnacle is not on the allowed list, so its better home price is ignored
        let best = listing.best_price(&["bet365", "William Hill"], |q| q.home);
        assert_eq!(best, dec!(2.10));
        let none = listing.best_price(&["William Hill"], |q| q.home);
        assert_eq!(none, Decimal::ZERO);
    }

    #[test]
    fn odds_timestamp_parses_listing_format() {
        let listing = GameOdds {
            home: "a".to_string(),
            away: "b".to_string(),
            pre_season: false,
            regular_season: true,
            playoffs: false,
            day: "03 Oct 2018".to_string(),
            time: "19:05".to_string(),
            odds: HashMap::new(),
        };
        let ts = listing.timestamp().unwrap();
        assert_eq!(ts.to_rfc3339(), "2018-10-03T19:05:00+00:00");
    }
}
