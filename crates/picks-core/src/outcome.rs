//! Win/loss evaluation of a single wager against a final event

use serde::{Deserialize, Serialize};

use crate::{resolve_margin_bonus, Event, Wager};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// `None` when the final score is tied or incomplete
    pub winning_team: Option<String>,
    pub winner_correct: bool,
    pub points_base: i64,
}

/// Returns `None` while the event has not reached final.
///
/// A final event without a strict winner (tied or missing scores) scores as
/// an incorrect pick for everyone.
pub fn evaluate_outcome(event: &Event, wager: &Wager) -> Option<Outcome> {
    if !event.is_final() {
        return None;
    }

    let winning_team = event.winning_team().map(str::to_string);
    let winner_correct = winning_team
        .as_deref()
        .map(|team| wager.picked(team))
        .unwrap_or(false);

    Some(Outcome {
        winning_team,
        winner_correct,
        points_base: wager.scoring_rule_ref.score(winner_correct),
    })
}

/// Writes the outcome fields of `wager` for the event's current state.
///
/// Outcome fields are cleared while the event is not final. On a final event
/// the margin bonus is only resolved for a correct winner pick, a wrong pick
/// always scores a zero bonus. `peers` is every wager on the event.
pub fn settle_wager(event: &Event, peers: &[Wager], wager: &mut Wager) {
    match evaluate_outcome(event, wager) {
        None => {
            wager.result = None;
            wager.points_base = None;
            wager.points_bonus = None;
        }
        Some(outcome) => {
            let bonus = if outcome.winner_correct {
                resolve_margin_bonus(event, peers, wager)
            } else {
                0
            };
            wager.result = outcome.winning_team;
            wager.points_base = Some(outcome.points_base);
            wager.points_bonus = Some(bonus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventStatus, EventType, Round, RuleId};
    use time::macros::datetime;
    use uuid::Uuid;

    fn finals_game(score1: Option<i64>, score2: Option<i64>) -> Event {
        Event {
            id: "0042400402".to_string(),
            team1: "Celtics".to_string(),
            team2: "Mavericks".to_string(),
            team1_score: score1,
            team2_score: score2,
            start_time: datetime!(2024-06-10 00:30 UTC),
            status: EventStatus::Final,
            event_type: EventType::Game,
            round: Round::Finals,
        }
    }

    fn pick(event: &Event, team: Option<&str>) -> Wager {
        let mut wager = Wager::placeholder(event, Uuid::now_v7());
        wager.predicted_winner = team.map(str::to_string);
        wager
    }

    #[test]
    fn test_correct_pick_earns_rule_points() {
        let event = finals_game(Some(102), Some(98));
        let outcome = evaluate_outcome(&event, &pick(&event, Some("Celtics"))).unwrap();

        assert!(outcome.winner_correct);
        assert_eq!(outcome.winning_team.as_deref(), Some("Celtics"));
        assert_eq!(outcome.points_base, 4);
    }

    #[test]
    fn test_wrong_or_missing_pick_earns_nothing() {
        let event = finals_game(Some(102), Some(98));

        let wrong = evaluate_outcome(&event, &pick(&event, Some("Mavericks"))).unwrap();
        assert!(!wrong.winner_correct);
        assert_eq!(wrong.points_base, 0);

        let unset = evaluate_outcome(&event, &pick(&event, None)).unwrap();
        assert!(!unset.winner_correct);
        assert_eq!(unset.points_base, 0);
    }

    #[test]
    fn test_points_follow_pinned_rule_not_current_round() {
        let event = finals_game(Some(88), Some(106));
        let mut wager = pick(&event, Some("Mavericks"));
        wager.scoring_rule_ref = RuleId::SecondRoundGame;

        let outcome = evaluate_outcome(&event, &wager).unwrap();
        assert_eq!(outcome.points_base, 8);
    }

    #[test]
    fn test_not_final_is_not_evaluated() {
        let mut event = finals_game(None, None);
        event.status = EventStatus::Live;

        assert!(evaluate_outcome(&event, &pick(&event, Some("Celtics"))).is_none());
    }

    #[test]
    fn test_tied_final_has_no_winner() {
        let event = finals_game(Some(100), Some(100));
        let outcome = evaluate_outcome(&event, &pick(&event, Some("Celtics"))).unwrap();

        assert_eq!(outcome.winning_team, None);
        assert!(!outcome.winner_correct);
        assert_eq!(outcome.points_base, 0);
    }

    #[test]
    fn test_settle_clears_outcome_until_final() {
        let mut event = finals_game(None, None);
        event.status = EventStatus::Live;
        let mut wager = pick(&event, Some("Celtics"));
        wager.margin_prediction = Some(4);
        wager.points_base = Some(4);
        wager.points_bonus = Some(4);
        wager.result = Some("Celtics".to_string());

        settle_wager(&event, &[wager.clone()], &mut wager);

        assert_eq!(wager.result, None);
        assert_eq!(wager.points_base, None);
        assert_eq!(wager.points_bonus, None);
    }

    #[test]
    fn test_settle_wrong_pick_never_earns_bonus() {
        let event = finals_game(Some(102), Some(98));
        // Exact margin on the losing side
        let mut wager = pick(&event, Some("Mavericks"));
        wager.margin_prediction = Some(4);

        settle_wager(&event, &[wager.clone()], &mut wager);

        assert_eq!(wager.result.as_deref(), Some("Celtics"));
        assert_eq!(wager.points_base, Some(0));
        assert_eq!(wager.points_bonus, Some(0));
    }

    #[test]
    fn test_settle_is_repeatable() {
        let event = finals_game(Some(102), Some(98));
        let mut wager = pick(&event, Some("Celtics"));
        wager.margin_prediction = Some(6);
        let peers = vec![wager.clone()];

        settle_wager(&event, &peers, &mut wager);
        let first = wager.clone();
        settle_wager(&event, &peers, &mut wager);

        assert_eq!(wager, first);
        assert_eq!(wager.points_base, Some(4));
        assert_eq!(wager.points_bonus, Some(2));
    }
}
