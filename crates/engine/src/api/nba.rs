//! NBA data API client.
//!
//! The season schedule gives game ids and stages; every period's play-by-play
//! feed is then walked to build each side's running score timeline, one tick
//! per score change, timed in seconds from the opening tip.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::api::http::Fetcher;
use crate::types::{GameType, NbaGamePair, PointsTick, Season};

const DEFAULT_BASE_URL: &str = "http://data.nba.net";

/// Regulation periods run 12 minutes, overtime periods 5
const REGULATION_PERIOD_SECS: f64 = 720.0;
const OVERTIME_PERIOD_SECS: f64 = 300.0;

// ============================================================================
// Raw API payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct SchedulePayload {
    league: ScheduleLeague,
}

#[derive(Debug, Deserialize)]
struct ScheduleLeague {
    #[serde(default)]
    standard: Vec<ScheduledGame>,
}

#[derive(Debug, Deserialize)]
struct ScheduledGame {
    #[serde(rename = "gameId")]
    game_id: String,
    #[serde(rename = "seasonStageId")]
    season_stage_id: u32,
    #[serde(rename = "gameUrlCode")]
    game_url_code: String,
    period: SchedulePeriod,
    #[serde(rename = "hTeam")]
    h_team: ScheduleTeam,
    #[serde(rename = "vTeam")]
    v_team: ScheduleTeam,
}

#[derive(Debug, Deserialize)]
struct SchedulePeriod {
    current: u32,
}

#[derive(Debug, Deserialize)]
struct ScheduleTeam {
    #[serde(rename = "teamId")]
    team_id: String,
}

#[derive(Debug, Deserialize)]
struct PlayByPlayPayload {
    #[serde(default)]
    plays: Vec<Play>,
}

#[derive(Debug, Deserialize)]
struct Play {
    #[serde(default)]
    clock: String,
    #[serde(rename = "hTeamScore", default)]
    h_team_score: String,
    #[serde(rename = "vTeamScore", default)]
    v_team_score: String,
}

/// A schedule entry: everything needed to pull the play-by-play feeds
#[derive(Debug, Clone)]
pub struct ScheduledNbaGame {
    pub game_id: String,
    pub game_type: GameType,
    pub date_code: String,
    pub final_period: u32,
    pub home_team_id: String,
    pub away_team_id: String,
}

// ============================================================================
// Client
// ============================================================================

pub struct NbaClient {
    fetcher: Fetcher,
    base_url: String,
}

impl NbaClient {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Regular-season and playoff schedule entries, ascending by game id
    pub async fn schedule(&self, season: Season) -> Result<Vec<ScheduledNbaGame>> {
        let url = format!(
            "{}/data/10s/prod/v1/{}/schedule.json",
            self.base_url, season.0
        );
        let body = self.fetcher.get(&url).await?;
        let payload: SchedulePayload =
            serde_json::from_str(&body).context("Failed to parse NBA schedule")?;

        let mut games = Vec::new();
        for game in payload.league.standard {
            // Stage 2 is the regular season, stage 4 the playoffs
            let game_type = match game.season_stage_id {
                2 => GameType::Regular,
                4 => GameType::Playoff,
                _ => continue,
            };
            let date_code = match game.game_url_code.split('/').next() {
                Some(code) if !code.is_empty() => code.to_string(),
                _ => {
                    debug!(game_id = %game.game_id, "schedule entry has no date code");
                    continue;
                }
            };
            games.push(ScheduledNbaGame {
                game_id: game.game_id,
                game_type,
                date_code,
                final_period: game.period.current,
                home_team_id: game.h_team.team_id,
                away_team_id: game.v_team.team_id,
            });
        }
        games.sort_by(|a, b| a.game_id.cmp(&b.game_id));
        Ok(games)
    }

    /// Builds a game's running score timelines from its play-by-play feeds
    pub async fn fetch_game(
        &self,
        season: Season,
        scheduled: &ScheduledNbaGame,
    ) -> Result<NbaGamePair> {
        let mut home_points: Vec<PointsTick> = Vec::new();
        let mut away_points: Vec<PointsTick> = Vec::new();

        for period in 1..=scheduled.final_period {
            let url = format!(
                "{}/data/10s/prod/v1/{}/{}_pbp_{}.json",
                self.base_url, scheduled.date_code, scheduled.game_id, period
            );
            let body = self.fetcher.get(&url).await?;
            let payload: PlayByPlayPayload = serde_json::from_str(&body).with_context(|| {
                format!(
                    "Failed to parse play-by-play for game {} period {}",
                    scheduled.game_id, period
                )
            })?;

            for play in payload.plays {
                let Some(seconds) = game_time(&play.clock, period) else {
                    continue;
                };
                push_tick(&mut home_points, seconds, &play.h_team_score);
                push_tick(&mut away_points, seconds, &play.v_team_score);
            }
        }

        Ok(NbaGamePair {
            game_id: scheduled.game_id.clone(),
            season,
            game_type: scheduled.game_type,
            date_code: scheduled.date_code.clone(),
            final_period: scheduled.final_period,
            home_team_id: scheduled.home_team_id.clone(),
            away_team_id: scheduled.away_team_id.clone(),
            home_points,
            away_points,
        })
    }

    pub async fn fetch_season(&self, season: Season) -> Result<Vec<NbaGamePair>> {
        let schedule = self.schedule(season).await?;
        info!(%season, games = schedule.len(), "scraping NBA season");
        let mut pairs = Vec::with_capacity(schedule.len());
        for (index, scheduled) in schedule.iter().enumerate() {
            pairs.push(self.fetch_game(season, scheduled).await?);
            if (index + 1) % 100 == 0 {
                info!(done = index + 1, total = schedule.len(), "season progress");
            }
        }
        Ok(pairs)
    }
}

/// Seconds of play from the opening tip for a period clock reading.
///
/// Assumes 12 minute regulation periods and 5 minute overtimes; anything
/// unparseable (period break markers leave the clock blank) is `None`.
fn game_time(clock: &str, period: u32) -> Option<f64> {
    let (minutes, seconds) = clock.split_once(':')?;
    let minutes: f64 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;

    let length = period_length(period);
    let elapsed_in_period = length - (minutes * 60.0 + seconds);
    let before: f64 = (1..period).map(period_length).sum();
    Some(before + elapsed_in_period)
}

fn period_length(period: u32) -> f64 {
    if period < 5 {
        REGULATION_PERIOD_SECS
    } else {
        OVERTIME_PERIOD_SECS
    }
}

/// Appends a tick when the score changed (the first play always records)
fn push_tick(ticks: &mut Vec<PointsTick>, seconds: f64, score: &str) {
    let Ok(points) = score.trim().parse::<u32>() else {
        return;
    };
    if ticks.last().map(|tick| tick.points) != Some(points) {
        ticks.push(PointsTick { seconds, points });
    }
}
