//! Money-math tests for the wagering research engine.
//!
//! Every test carries a hand-calculated expected value comment so that any
//! formula regression is caught before it distorts a study.
//!
//! Modules under test:
//!   1. Bet settlement                  (src/backtest.rs)
//!   2. Three-way dutching              (src/arbitrage.rs)
//!   3. Season replay and equity carry  (src/backtest.rs)
//!   4. Strength model pipeline         (src/markov.rs)
//!   5. Wager ranking                   (src/wager.rs)
//!   6. Ruin segmentation               (src/stats/ruin.rs)
//!   7. Significance t-test             (src/stats/significance.rs)
//!   8. Return correlation              (src/stats/correlation.rs)

use chrono::TimeZone;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use engine::arbitrage::{dutch_game, run_dutch_replay, ArbitrageConfig};
use engine::backtest::{settle, BacktestConfig, BacktestEngine, SeasonData};
use engine::markov::{BetMatrix, MarkovModel};
use engine::stats::correlation::{correlation_matrix, StrategySeries};
use engine::stats::ruin::{break_even_troughs, fit_exponential, ruin_probability, RuinConfig};
use engine::stats::significance::{evaluate, strategy_mean};
use engine::strategies::StreakFade;
use engine::types::{
    BetRecord, GamePair, GameSide, GameType, GameWinner, MatchOdds, Pick, Season, TeamSide,
};
use engine::wager::{recommend, WagerCandidate};

// =============================================================================
// Helpers
// =============================================================================

fn odds(home: Decimal, tie: Decimal, away: Decimal) -> MatchOdds {
    MatchOdds { home, tie, away }
}

/// A regulation game; the winner follows the goals.
fn game(
    id: &str,
    season: Season,
    home_id: &str,
    away_id: &str,
    home_goals: u32,
    away_goals: u32,
    prices: MatchOdds,
) -> GamePair {
    let winner = if home_goals > away_goals {
        GameWinner::Home
    } else if away_goals > home_goals {
        GameWinner::Away
    } else {
        GameWinner::Tie
    };
    GamePair {
        game_id: id.to_string(),
        season,
        game_type: GameType::Regular,
        date: chrono::Utc
            .with_ymd_and_hms(i32::from(season.0), 10, 3, 23, 0, 0)
            .unwrap(),
        home: TeamSide {
            team_id: home_id.to_string(),
            team_name: format!("Team {}", home_id),
            goals: home_goals,
        },
        away: TeamSide {
            team_id: away_id.to_string(),
            team_name: format!("Team {}", away_id),
            goals: away_goals,
        },
        winner,
        ot_winner: winner,
        final_period: 3,
        odds: prices,
    }
}

fn bet(game_id: &str, wager_return: Decimal) -> BetRecord {
    BetRecord {
        game_id: game_id.to_string(),
        season: Season(2017),
        odds: odds(dec!(2.0), dec!(4.0), dec!(3.0)),
        winner: GameWinner::Home,
        prediction: Pick::Home,
        stake: dec!(100),
        wager_return,
    }
}

/// Four games: team "3" wins three straight, then hosts "11" again. The
/// streak fade bets the away side of that fourth game.
fn fade_season(season: Season, fader_wins: bool) -> SeasonData {
    let prefix = format!("{}02000", season.0);
    let (home_goals, away_goals) = if fader_wins { (1, 2) } else { (3, 1) };
    let games = vec![
        game(
            &format!("{}1", prefix),
            season,
            "3",
            "11",
            3,
            1,
            MatchOdds::default(),
        ),
        game(
            &format!("{}2", prefix),
            season,
            "3",
            "20",
            2,
            0,
            MatchOdds::default(),
        ),
        game(
            &format!("{}3", prefix),
            season,
            "11",
            "3",
            1,
            4,
            MatchOdds::default(),
        ),
        game(
            &format!("{}4", prefix),
            season,
            "3",
            "11",
            home_goals,
            away_goals,
            odds(dec!(2.2), dec!(4.0), dec!(3.0)),
        ),
    ];
    SeasonData { season, games }
}

// =============================================================================
// 1. Bet settlement
// =============================================================================

#[test]
fn settle_odds_scaled_win() {
    // Hand calculation:
    //   unit = 100, home price = 2.5
    //   stake = 100 * 2.5 = 250
    //   win   = (2.5 - 1) * 250 = 375
    let prices = odds(dec!(2.5), dec!(3.1), dec!(2.6));
    let (stake, ret) = settle(Pick::Home, GameWinner::Home, &prices, dec!(100), false);
    assert_eq!(stake, dec!(250), "stake = unit * price");
    assert_eq!(ret, dec!(375), "win pays (price - 1) * stake");
}

#[test]
fn settle_odds_scaled_loss() {
    // Losing the 250 stake costs exactly the stake
    let prices = odds(dec!(2.5), dec!(3.1), dec!(2.6));
    let (stake, ret) = settle(Pick::Home, GameWinner::Away, &prices, dec!(100), false);
    assert_eq!(stake, dec!(250));
    assert_eq!(ret, dec!(-250), "loss costs the stake");
}

#[test]
fn settle_overtime_tie_is_a_loss() {
    // A regulation tie (decided in OT) pays neither side; the stake is gone
    let prices = odds(dec!(2.5), dec!(3.1), dec!(2.6));
    let (_, home_ret) = settle(Pick::Home, GameWinner::Tie, &prices, dec!(100), false);
    let (_, away_ret) = settle(Pick::Away, GameWinner::Tie, &prices, dec!(100), false);
    assert_eq!(home_ret, dec!(-250));
    assert_eq!(away_ret, dec!(-260), "away stake = 100 * 2.6");
}

#[test]
fn settle_flat_stakes() {
    // Flat convention: stake = unit regardless of price
    //   win  = (2.5 - 1) * 100 = 150
    //   loss = -100
    let prices = odds(dec!(2.5), dec!(3.1), dec!(2.6));
    let (stake, win) = settle(Pick::Home, GameWinner::Home, &prices, dec!(100), true);
    assert_eq!(stake, dec!(100));
    assert_eq!(win, dec!(150));
    let (_, loss) = settle(Pick::Home, GameWinner::Away, &prices, dec!(100), true);
    assert_eq!(loss, dec!(-100));
}

#[test]
fn settle_skip_is_free() {
    let prices = odds(dec!(2.5), dec!(3.1), dec!(2.6));
    let (stake, ret) = settle(Pick::Skip, GameWinner::Home, &prices, dec!(100), false);
    assert_eq!(stake, Decimal::ZERO);
    assert_eq!(ret, Decimal::ZERO);
}

// =============================================================================
// 2. Three-way dutching
// =============================================================================

#[test]
fn dutch_locks_equal_payout() {
    // Hand calculation with exact reciprocals:
    //   odds = (4, 5, 10), bankroll = 5500
    //   k = 1/4 + 1/5 + 1/10 = 0.55 < 1 => guaranteed book
    //   payout = 5500 / 0.55 = 10000
    //   stakes = 10000/4 = 2500, 10000/5 = 2000, 10000/10 = 1000
    //   locked = 10000 - 5500 = 4500
    let prices = odds(dec!(4), dec!(5), dec!(10));
    let (stakes, locked) = dutch_game(&prices, dec!(5500));

    assert_eq!(stakes.home, dec!(2500));
    assert_eq!(stakes.tie, dec!(2000));
    assert_eq!(stakes.away, dec!(1000));
    assert_eq!(stakes.total(), dec!(5500), "stakes spend the whole bankroll");
    assert_eq!(locked, dec!(4500));

    // Every leg pays the same 10000 whatever the outcome
    assert_eq!(stakes.home * prices.home, dec!(10000));
    assert_eq!(stakes.tie * prices.tie, dec!(10000));
    assert_eq!(stakes.away * prices.away, dec!(10000));
}

#[test]
fn dutch_skips_an_overround_book() {
    // k = 1/2 + 1/2 + 1/2 = 1.5 >= 1 => the book keeps its margin
    let (stakes, locked) = dutch_game(&odds(dec!(2), dec!(2), dec!(2)), dec!(5000));
    assert_eq!(stakes.total(), Decimal::ZERO);
    assert_eq!(locked, Decimal::ZERO);
}

#[test]
fn dutch_needs_every_leg_priced() {
    // Unpriced tie leaves the tie outcome uncovered
    let (stakes, locked) = dutch_game(&odds(dec!(2), Decimal::ZERO, dec!(3)), dec!(5000));
    assert_eq!(stakes.total(), Decimal::ZERO);
    assert_eq!(locked, Decimal::ZERO);
}

#[test]
fn dutch_replay_carries_notional_across_seasons() {
    // One guaranteed game per season at (4, 5, 10), bankroll 5500:
    //   each locks 4500, so equity runs 5500 -> 10000 -> 14500
    let arb = odds(dec!(4), dec!(5), dec!(10));
    let seasons = vec![
        SeasonData {
            season: Season(2016),
            games: vec![game("2016020001", Season(2016), "3", "11", 2, 1, arb)],
        },
        SeasonData {
            season: Season(2017),
            games: vec![game("2017020001", Season(2017), "11", "3", 0, 1, arb)],
        },
    ];

    let report = run_dutch_replay(&seasons, &ArbitrageConfig { bankroll: dec!(5500) });

    assert_eq!(report.games_considered, 2);
    assert_eq!(report.opportunities, 2);
    assert_eq!(report.total_return, dec!(9000));
    assert_eq!(report.final_notional, dec!(14500));

    let notionals: Vec<Decimal> = report
        .equity_curve
        .iter()
        .map(|point| point.notional)
        .collect();
    assert_eq!(notionals, vec![dec!(5500), dec!(10000), dec!(14500)]);
    assert_eq!(report.equity_curve[2].season, Season(2017));
}

// =============================================================================
// 3. Season replay and equity carry
// =============================================================================

#[test]
fn streak_fade_replay_hand_settled() {
    // Season 2016: team 3 wins three straight, the fade backs "11" away at
    // 3.0 and wins.
    //   stake = 100 * 3.0 = 300, return = (3.0 - 1) * 300 = +600
    // Season 2017: same setup but the fade loses.
    //   return = -300
    // Equity: 2000 -> 2600 -> 2300; carried across the season boundary.
    let seasons = vec![fade_season(Season(2016), true), fade_season(Season(2017), false)];

    let backtester = BacktestEngine::new(BacktestConfig::default());
    let report = backtester.run(&StreakFade::default(), &seasons).unwrap();

    assert_eq!(report.games_considered, 8);
    assert_eq!(report.bets_placed, 2);
    assert_eq!(report.wins, 1);
    assert_eq!(report.losses, 1);
    assert_eq!(report.hit_rate, dec!(50), "1 of 2 decided = 50.00%");
    assert_eq!(report.total_return, dec!(300));
    assert_eq!(report.final_notional, dec!(2300));
    assert_eq!(report.max_drawdown, dec!(300), "peak 2600 -> 2300");

    let notionals: Vec<Decimal> = report
        .equity_curve
        .iter()
        .map(|point| point.notional)
        .collect();
    assert_eq!(notionals, vec![dec!(2000), dec!(2600), dec!(2300)]);

    // Both bets faded the home streak
    assert!(report.bets.iter().all(|b| b.prediction == Pick::Away));
}

// =============================================================================
// 4. Strength model pipeline
// =============================================================================

/// Every ordered pairing of three teams met twice, so each differential
/// bucket has a rematch to credit and the chain is connected.
fn round_robin() -> Vec<GamePair> {
    let s = Season(2018);
    let z = MatchOdds::default();
    vec![
        game("2018020001", s, "3", "11", 3, 2, z),
        game("2018020002", s, "11", "20", 2, 3, z),
        game("2018020003", s, "20", "3", 4, 2, z),
        game("2018020004", s, "3", "20", 1, 3, z),
        game("2018020005", s, "11", "3", 3, 1, z),
        game("2018020006", s, "20", "11", 2, 4, z),
        game("2018020007", s, "3", "11", 1, 2, z),
        game("2018020008", s, "11", "20", 5, 2, z),
        game("2018020009", s, "20", "3", 3, 2, z),
        game("2018020010", s, "3", "20", 4, 1, z),
        game("2018020011", s, "11", "3", 2, 3, z),
        game("2018020012", s, "20", "11", 3, 1, z),
    ]
}

#[test]
fn steady_state_masses_sum_to_one() {
    // The stationary distribution spreads probability mass over every
    // team's home and away state; the masses must total 1.
    let model = MarkovModel::fit(&round_robin()).unwrap();
    let total: f64 = model
        .teams
        .iter()
        .map(|team| {
            let strength = model.strength(team).unwrap();
            assert!(strength.home > 0.0 && strength.away > 0.0);
            strength.home + strength.away
        })
        .sum();
    assert!((total - 1.0).abs() < 1e-9, "masses sum to {}", total);
}

#[test]
fn fitted_matrix_feeds_the_wager_ranker() {
    // fit -> bet_matrix -> recommend end to end: the ticket must carry the
    // matrix probability and the pseudo-EV arithmetic p * odds - 1.
    let model = MarkovModel::fit(&round_robin()).unwrap();
    let matrix = model.bet_matrix();
    for row in &matrix.probs {
        for &p in row {
            assert!(p > 0.0 && p < 1.0, "probabilities stay inside (0, 1)");
        }
    }

    let candidates = vec![WagerCandidate {
        game_id: "2018030001".to_string(),
        home_id: "11".to_string(),
        home_name: "Team 11".to_string(),
        away_id: "20".to_string(),
        away_name: "Team 20".to_string(),
        home_odds: dec!(2.0),
        away_odds: dec!(3.0),
    }];
    let tickets = recommend(&matrix, &candidates, dec!(100));
    assert_eq!(tickets.len(), 1);

    let ticket = &tickets[0];
    let p_home = matrix.home_win_probability("11", "20").unwrap();
    let expected = if p_home > 0.5 {
        p_home * 2.0 - 1.0
    } else {
        (1.0 - p_home) * 3.0 - 1.0
    };
    assert!((ticket.pseudo_ev - expected).abs() < 1e-12);
}

// =============================================================================
// 5. Wager ranking
// =============================================================================

#[test]
fn recommend_ranks_by_pseudo_ev() {
    // Hand calculation:
    //   P(1 beats 2 at home) = 0.7  => home ticket, EV = 0.7 * 2.0 - 1 = 0.40
    //   P(2 beats 1 at home) = 0.45 => away ticket, EV = 0.55 * 3.0 - 1 = 0.65
    //   The away ticket ranks first; the unknown team is dropped.
    let matrix = BetMatrix {
        teams: vec!["1".to_string(), "2".to_string()],
        probs: vec![vec![0.5, 0.7], vec![0.45, 0.5]],
    };
    let candidates = vec![
        WagerCandidate {
            game_id: "2018030101".to_string(),
            home_id: "1".to_string(),
            home_name: "Team 1".to_string(),
            away_id: "2".to_string(),
            away_name: "Team 2".to_string(),
            home_odds: dec!(2.0),
            away_odds: dec!(4.0),
        },
        WagerCandidate {
            game_id: "2018030102".to_string(),
            home_id: "2".to_string(),
            home_name: "Team 2".to_string(),
            away_id: "1".to_string(),
            away_name: "Team 1".to_string(),
            home_odds: dec!(2.5),
            away_odds: dec!(3.0),
        },
        WagerCandidate {
            game_id: "2018030103".to_string(),
            home_id: "9".to_string(),
            home_name: "Team 9".to_string(),
            away_id: "1".to_string(),
            away_name: "Team 1".to_string(),
            home_odds: dec!(2.0),
            away_odds: dec!(2.0),
        },
    ];

    let tickets = recommend(&matrix, &candidates, dec!(100));
    assert_eq!(tickets.len(), 2, "unknown team 9 is skipped");

    assert_eq!(tickets[0].game_id, "2018030102");
    assert_eq!(tickets[0].side, GameSide::Away);
    assert_eq!(tickets[0].team_id, "1");
    assert_eq!(tickets[0].stake, dec!(300), "stake = 100 * 3.0");
    assert!((tickets[0].pseudo_ev - 0.65).abs() < 1e-12);

    assert_eq!(tickets[1].game_id, "2018030101");
    assert_eq!(tickets[1].side, GameSide::Home);
    assert!((tickets[1].pseudo_ev - 0.40).abs() < 1e-12);
}

// =============================================================================
// 6. Ruin segmentation
// =============================================================================

#[test]
fn break_even_cycles_hand_segmented() {
    // Returns: -5, -3, +9 | -2, +2 | +4
    //   cycle 1 bottoms at -8 (after the first two losses)
    //   cycle 2 bottoms at -2
    //   cycle 3 never goes under water => no trough
    let troughs = break_even_troughs(&[-5.0, -3.0, 9.0, -2.0, 2.0, 4.0]);
    assert_eq!(troughs, vec![8.0, 2.0]);

    // Shifted exponential: location = min = 2, scale = mean - min = 5 - 2 = 3
    let (location, scale) = fit_exponential(&troughs).unwrap();
    assert!((location - 2.0).abs() < 1e-12);
    assert!((scale - 3.0).abs() < 1e-12);
}

#[test]
fn ruin_is_certain_at_the_fit_location() {
    // With capital equal to the smallest observed trough the fitted CDF is 0
    // there, so P(ruin) = 1 - 0^cycles = 1.
    let series = StrategySeries {
        name: "combined".to_string(),
        returns: [
            ("2016020001", -5.0),
            ("2016020002", -3.0),
            ("2016020003", 9.0),
            ("2016020004", -2.0),
            ("2016020005", 2.0),
            ("2016020006", 4.0),
        ]
        .into_iter()
        .map(|(id, value)| (id.to_string(), value))
        .collect(),
    };

    let report = ruin_probability(
        &[series],
        &RuinConfig {
            starting_capital: 2.0,
        },
    )
    .unwrap();

    assert_eq!(report.troughs, vec![8.0, 2.0]);
    assert!((report.location - 2.0).abs() < 1e-12);
    assert!((report.scale - 3.0).abs() < 1e-12);
    assert!((report.p_ruin - 1.0).abs() < 1e-12, "p = {}", report.p_ruin);
}

// =============================================================================
// 7. Significance t-test
// =============================================================================

#[test]
fn t_test_hand_computed() {
    // Null samples 1, 2, 3, 4 against an observed mean of 4:
    //   null mean = 2.5
    //   population std = sqrt(5/4) = 1.118033988...
    //   sample std     = sqrt(5/3) = 1.290994448...
    //   t = (2.5 - 4) / (1.290994448 / 2) = -2.323790007...
    let report = evaluate(&[1.0, 2.0, 3.0, 4.0], 4.0).unwrap();

    assert!((report.null_mean - 2.5).abs() < 1e-12);
    assert!((report.null_std - 1.118033988749895).abs() < 1e-12);
    assert!((report.t_statistic - (-2.3237900077244512)).abs() < 1e-9);
    // Around the 10% level for 3 degrees of freedom
    assert!(report.p_value > 0.08 && report.p_value < 0.13, "p = {}", report.p_value);
}

#[test]
fn strategy_mean_is_the_ledger_average() {
    // (375 - 250 + 100) / 3 = 75
    let bets = vec![
        bet("2017020001", dec!(375)),
        bet("2017020002", dec!(-250)),
        bet("2017020003", dec!(100)),
    ];
    assert!((strategy_mean(&bets) - 75.0).abs() < 1e-12);
}

// =============================================================================
// 8. Return correlation
// =============================================================================

#[test]
fn opposed_ledgers_correlate_at_minus_one() {
    // Second ledger is the exact negative of the first over the same games
    let a = StrategySeries::from_bets(
        "a",
        &[
            bet("2017020001", dec!(10)),
            bet("2017020002", dec!(20)),
            bet("2017020003", dec!(30)),
        ],
    );
    let b = StrategySeries::from_bets(
        "b",
        &[
            bet("2017020001", dec!(-10)),
            bet("2017020002", dec!(-20)),
            bet("2017020003", dec!(-30)),
        ],
    );

    let matrix = correlation_matrix(&[a, b]);
    assert!((matrix[0][0] - 1.0).abs() < 1e-12);
    assert!((matrix[1][1] - 1.0).abs() < 1e-12);
    assert!((matrix[0][1] + 1.0).abs() < 1e-12);
    assert!((matrix[1][0] + 1.0).abs() < 1e-12);
}
