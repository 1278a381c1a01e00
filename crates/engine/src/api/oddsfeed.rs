//! Odds archive feed client.
//!
//! Walks a season's paginated results feed. Rows are either section headers,
//! which move a stage cursor (pre-season, regular season, playoffs), or games,
//! whose per-bookmaker prices are pulled from the match odds endpoint. A game
//! whose odds cannot be collected is skipped with a warning rather than
//! aborting the season.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::http::Fetcher;
use crate::types::{BookmakerOdds, GameOdds, Season};

const DEFAULT_BASE_URL: &str = "https://www.oddsportal.com";

// ============================================================================
// Raw feed payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct ResultsPage {
    #[serde(default = "default_total_pages")]
    total_pages: u32,
    #[serde(default)]
    rows: Vec<FeedRow>,
}

fn default_total_pages() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum FeedRow {
    Section {
        label: String,
    },
    Game {
        home: String,
        away: String,
        match_id: String,
    },
}

#[derive(Debug, Deserialize)]
struct MatchOddsPayload {
    day: String,
    time: String,
    #[serde(default)]
    bookmakers: HashMap<String, QuoteTriple>,
}

#[derive(Debug, Deserialize)]
struct QuoteTriple {
    home: Decimal,
    tie: Decimal,
    away: Decimal,
}

/// Which part of the season the results cursor is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    PreSeason,
    Regular,
    Playoffs,
}

/// Section labels are dates, with pre-season and playoff sections marked by a
/// dashed suffix, e.g. "23 Sep 2018 - pre-season"
fn stage_from_label(label: &str) -> Stage {
    if label.contains('-') {
        if label.to_lowercase().contains("season") {
            Stage::PreSeason
        } else {
            Stage::Playoffs
        }
    } else {
        Stage::Regular
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct OddsFeedClient {
    fetcher: Fetcher,
    base_url: String,
}

impl OddsFeedClient {
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

    /// Every odds listing for a season, in feed order
    pub async fn scrape_season(&self, season: Season) -> Result<Vec<GameOdds>> {
        let mut listings = Vec::new();
        let mut stage = Stage::Regular;
        let mut skipped = 0usize;
        let mut page = 1u32;

        loop {
            let url = format!(
                "{}/ajax/hockey/nhl-{}-{}/results?page={}",
                self.base_url,
                season.0,
                season.0 + 1,
                page
            );
            let body = self.fetcher.get(&url).await?;
            let payload: ResultsPage = serde_json::from_str(&body)
                .with_context(|| format!("Failed to parse results page {}", page))?;

            for row in payload.rows {
                match row {
                    FeedRow::Section { label } => {
                        stage = stage_from_label(&label);
                    }
                    FeedRow::Game {
                        home,
                        away,
                        match_id,
                    } => match self.match_odds(&match_id).await {
                        Ok((day, time, odds)) => listings.push(GameOdds {
                            home,
                            away,
                            pre_season: stage == Stage::PreSeason,
                            regular_season: stage == Stage::Regular,
                            playoffs: stage == Stage::Playoffs,
                            day,
                            time,
                            odds,
                        }),
                        Err(error) => {
                            warn!(%home, %away, %error, "unable to collect odds, skipping game");
                            skipped += 1;
                        }
                    },
                }
            }

            if page >= payload.total_pages {
                break;
            }
            page += 1;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!(%season, listings = listings.len(), skipped, "odds season scraped");
        Ok(listings)
    }

    async fn match_odds(
        &self,
        match_id: &str,
    ) -> Result<(String, String, HashMap<String, BookmakerOdds>)> {
        let url = format!("{}/ajax/match/{}/odds", self.base_url, match_id);
        let body = self.fetcher.get(&url).await?;
        let payload: MatchOddsPayload = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse odds for match {}", match_id))?;
        let odds = payload
            .bookmakers
            .into_iter()
            .map(|(name, quote)| {
                (
                    name,
                    BookmakerOdds {
                        home: quote.home,
                        tie: quote.tie,
                        away: quote.away,
                    },
                )
            })
            .collect();
        Ok((payload.day, payload.time, odds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::http::testing::StubTransport;
    use crate::api::http::RetryPolicy;
    use rust_decimal_macros::dec;

    #[test]
    fn section_labels_drive_the_stage() {
        assert_eq!(stage_from_label("03 Oct 2018"), Stage::Regular);
        assert_eq!(stage_from_label("23 Sep 2018 - pre-season"), Stage::PreSeason);
        assert_eq!(stage_from_label("11 Apr 2019 - playoffs"), Stage::Playoffs);
    }

    #[tokio::test]
    async fn season_walk_tags_stages_and_skips_dead_games() {
        let results = r#"{
            "total_pages": 1,
            "rows": [
                {"type": "section", "label": "23 Sep 2018 - pre-season"},
                {"type": "game", "home": "Boston Bruins", "away": "Calgary Flames", "match_id": "pre1"},
                {"type": "section", "label": "03 Oct 2018"},
                {"type": "game", "home": "Boston Bruins", "away": "Toronto Maple Leafs", "match_id": "reg1"},
                {"type": "game", "home": "Vegas Golden Knights", "away": "Arizona Coyotes", "match_id": "gone"}
            ]
        }"#;
        let pre1 = r#"{"day": "23 Sep 2018", "time": "18:00",
            "bookmakers": {"bet365": {"home": 1.80, "tie": 4.40, "away": 4.00}}}"#;
        let reg1 = r#"{"day": "03 Oct 2018", "time": "19:00",
            "bookmakers": {"bet365": {"home": 2.10, "tie": 4.20, "away": 3.40},
                           "William Hill": {"home": 2.15, "tie": 4.10, "away": 3.30}}}"#;
        // No route for match "gone": its odds request 404s until retries run out
        let transport = StubTransport::with_routes(&[
            ("results?page=1", results),
            ("match/pre1/odds", pre1),
            ("match/reg1/odds", reg1),
        ]);
        let fetcher =
            Fetcher::with_transport(Box::new(transport)).with_policy(RetryPolicy::fast());
        let client = OddsFeedClient::new(fetcher);

        let listings = client.scrape_season(Season(2018)).await.unwrap();
        assert_eq!(listings.len(), 2);

        assert!(listings[0].pre_season);
        assert!(!listings[0].regular_season);
        assert_eq!(listings[0].home, "Boston Bruins");

        assert!(listings[1].regular_season);
        assert_eq!(listings[1].day, "03 Oct 2018");
        assert_eq!(listings[1].odds.len(), 2);
        assert_eq!(listings[1].odds["William Hill"].home, dec!(2.15));
    }
}
