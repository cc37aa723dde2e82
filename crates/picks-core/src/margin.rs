//! Bonus points for margin prediction accuracy
//!
//! Series only reward an exact number of games. Games reward an exact point
//! differential, and in the play-in, conference and finals rounds also the
//! closest inexact prediction among wagers that picked the right winner.

use crate::{Event, EventType, Round, Wager};

fn series_exact_bonus(round: Round) -> i64 {
    match round {
        Round::FirstRound => 2,
        Round::SecondRound | Round::Conference | Round::Finals => 4,
        Round::Playin | Round::Unset => 0,
    }
}

fn game_exact_bonus(round: Round) -> i64 {
    match round {
        Round::Playin | Round::Conference => 2,
        Round::Finals => 4,
        Round::FirstRound | Round::SecondRound | Round::Unset => 0,
    }
}

/// `None` means the round has no closest tier
fn game_closest_bonus(round: Round) -> Option<i64> {
    match round {
        Round::Playin | Round::Conference => Some(1),
        Round::Finals => Some(2),
        Round::FirstRound | Round::SecondRound | Round::Unset => None,
    }
}

/// Usable margin prediction, negative values are treated as absent
fn margin_of(wager: &Wager) -> Option<i64> {
    wager.margin_prediction.filter(|margin| *margin >= 0)
}

/// Bonus for `wager` given every wager on the same event.
///
/// Only called for wagers that picked the winner. Missing data on either the
/// event or the wager resolves to 0 rather than an error. Every wager sharing
/// the smallest inexact delta receives the closest-tier bonus.
pub fn resolve_margin_bonus(event: &Event, all_wagers: &[Wager], wager: &Wager) -> i64 {
    let Some(prediction) = margin_of(wager) else {
        return 0;
    };
    let Some(actual) = event.actual_margin() else {
        return 0;
    };

    let delta = (actual - prediction).abs();

    match event.event_type {
        EventType::Series => {
            if delta == 0 {
                series_exact_bonus(event.round)
            } else {
                0
            }
        }
        EventType::Game => {
            if delta == 0 {
                return game_exact_bonus(event.round);
            }

            let Some(closest_bonus) = game_closest_bonus(event.round) else {
                return 0;
            };
            let Some(winning_team) = event.winning_team() else {
                return 0;
            };

            let closest = all_wagers
                .iter()
                .filter(|peer| peer.picked(winning_team))
                .filter_map(margin_of)
                .map(|margin| (actual - margin).abs())
                .filter(|peer_delta| *peer_delta != 0)
                .chain(std::iter::once(delta))
                .min();

            if closest == Some(delta) {
                closest_bonus
            } else {
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventStatus;
    use time::macros::datetime;
    use uuid::Uuid;

    fn final_event(round: Round, event_type: EventType, score1: i64, score2: i64) -> Event {
        Event {
            id: "0042400403".to_string(),
            team1: "Knicks".to_string(),
            team2: "Pistons".to_string(),
            team1_score: Some(score1),
            team2_score: Some(score2),
            start_time: datetime!(2025-04-19 22:00 UTC),
            status: EventStatus::Final,
            event_type,
            round,
        }
    }

    fn wager(event: &Event, team: &str, margin: Option<i64>) -> Wager {
        let mut wager = Wager::placeholder(event, Uuid::now_v7());
        wager.predicted_winner = Some(team.to_string());
        wager.margin_prediction = margin;
        wager
    }

    #[test]
    fn test_finals_game_exact_margin() {
        let event = final_event(Round::Finals, EventType::Game, 102, 98);
        let exact = wager(&event, "Knicks", Some(4));

        assert_eq!(resolve_margin_bonus(&event, &[exact.clone()], &exact), 4);
    }

    #[test]
    fn test_exact_match_wins_over_closest_tier() {
        let event = final_event(Round::Finals, EventType::Game, 102, 98);
        let first = wager(&event, "Knicks", Some(4));
        let second = wager(&event, "Knicks", Some(4));
        let all = vec![first.clone(), second.clone()];

        assert_eq!(resolve_margin_bonus(&event, &all, &first), 4);
        assert_eq!(resolve_margin_bonus(&event, &all, &second), 4);
    }

    #[test]
    fn test_closest_tier_ties_all_receive_bonus() {
        let event = final_event(Round::Finals, EventType::Game, 102, 98);
        let exact = wager(&event, "Knicks", Some(4));
        let over = wager(&event, "Knicks", Some(6));
        let under = wager(&event, "Knicks", Some(2));
        let far = wager(&event, "Knicks", Some(15));
        let all = vec![exact.clone(), over.clone(), under.clone(), far.clone()];

        assert_eq!(resolve_margin_bonus(&event, &all, &over), 2);
        assert_eq!(resolve_margin_bonus(&event, &all, &under), 2);
        assert_eq!(resolve_margin_bonus(&event, &all, &far), 0);
        assert_eq!(resolve_margin_bonus(&event, &all, &exact), 4);
    }

    #[test]
    fn test_closest_pool_ignores_wrong_winner_margins() {
        let event = final_event(Round::Conference, EventType::Game, 120, 111);
        let wrong_but_close = wager(&event, "Pistons", Some(8));
        let right = wager(&event, "Knicks", Some(3));
        let all = vec![wrong_but_close, right.clone()];

        assert_eq!(resolve_margin_bonus(&event, &all, &right), 1);
    }

    #[test]
    fn test_closest_pool_ignores_missing_margins() {
        let event = final_event(Round::Playin, EventType::Game, 95, 90);
        let blank = wager(&event, "Knicks", None);
        let malformed = wager(&event, "Knicks", Some(-1));
        let right = wager(&event, "Knicks", Some(12));
        let all = vec![blank, malformed, right.clone()];

        assert_eq!(resolve_margin_bonus(&event, &all, &right), 1);
    }

    #[test]
    fn test_early_round_games_have_no_closest_tier() {
        for round in [Round::FirstRound, Round::SecondRound] {
            let event = final_event(round, EventType::Game, 110, 100);
            let off_by_one = wager(&event, "Knicks", Some(9));

            assert_eq!(
                resolve_margin_bonus(&event, &[off_by_one.clone()], &off_by_one),
                0,
                "{}",
                round
            );
        }
    }

    #[test]
    fn test_series_requires_exact_games() {
        let event = final_event(Round::Conference, EventType::Series, 4, 2);
        let seven = wager(&event, "Knicks", Some(7));
        let six = wager(&event, "Knicks", Some(6));
        let all = vec![seven.clone(), six.clone()];

        assert_eq!(resolve_margin_bonus(&event, &all, &seven), 0);
        assert_eq!(resolve_margin_bonus(&event, &all, &six), 4);
    }

    #[test]
    fn test_series_exact_bonus_by_round() {
        let cases = [
            (Round::FirstRound, 2),
            (Round::SecondRound, 4),
            (Round::Conference, 4),
            (Round::Finals, 4),
        ];
        for (round, bonus) in cases {
            let event = final_event(round, EventType::Series, 3, 4);
            let exact = wager(&event, "Pistons", Some(7));
            assert_eq!(resolve_margin_bonus(&event, &[exact.clone()], &exact), bonus);
        }
    }

    #[test]
    fn test_missing_or_negative_prediction_is_zero() {
        let event = final_event(Round::Finals, EventType::Game, 102, 98);
        let blank = wager(&event, "Knicks", None);
        let negative = wager(&event, "Knicks", Some(-4));

        assert_eq!(resolve_margin_bonus(&event, &[blank.clone()], &blank), 0);
        assert_eq!(resolve_margin_bonus(&event, &[negative.clone()], &negative), 0);
    }

    #[test]
    fn test_unset_round_earns_no_bonus() {
        let event = final_event(Round::Unset, EventType::Game, 102, 98);
        let exact = wager(&event, "Knicks", Some(4));
        let close = wager(&event, "Knicks", Some(5));
        let all = vec![exact.clone(), close.clone()];

        assert_eq!(resolve_margin_bonus(&event, &all, &exact), 0);
        assert_eq!(resolve_margin_bonus(&event, &all, &close), 0);
    }
}
