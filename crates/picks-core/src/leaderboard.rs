//! Season standings from scored wagers and season bets

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{SeasonBet, SeasonBetKind, Wager};

pub const UNKNOWN_PLAYER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// Equal scores share a rank
    pub rank: usize,
    pub user_id: Uuid,
    pub name: String,
    pub score: i64,
    pub champion_pick: Option<String>,
    pub mvp_pick: Option<String>,
}

#[derive(Default)]
struct Tally {
    score: i64,
    champion_pick: Option<String>,
    mvp_pick: Option<String>,
}

/// Sum base and bonus points per user plus whatever their season bets earned.
/// Every listed player appears even with no points, wagers and bets from
/// unlisted users are kept under a placeholder name.
///
/// Callers pass the wagers and season bets of a single season.
pub fn tally_leaderboard(
    players: &[(Uuid, String)],
    wagers: &[Wager],
    season_bets: &[SeasonBet],
) -> Vec<Standing> {
    let mut tallies: HashMap<Uuid, Tally> = players
        .iter()
        .map(|(id, _)| (*id, Tally::default()))
        .collect();
    for wager in wagers {
        tallies.entry(wager.user_id).or_default().score += wager.total_points();
    }
    for bet in season_bets {
        let tally = tallies.entry(bet.user_id).or_default();
        tally.score += bet.points.unwrap_or(0);
        match bet.kind {
            SeasonBetKind::Champion => tally.champion_pick = Some(bet.pick.clone()),
            SeasonBetKind::FinalsMvp => tally.mvp_pick = Some(bet.pick.clone()),
        }
    }

    let names: HashMap<&Uuid, &str> = players
        .iter()
        .map(|(id, name)| (id, name.as_str()))
        .collect();

    let ordered: Vec<(Uuid, String, Tally)> = tallies
        .into_iter()
        .map(|(user_id, tally)| {
            let name = names.get(&user_id).copied().unwrap_or(UNKNOWN_PLAYER);
            (user_id, name.to_string(), tally)
        })
        .sorted_by(|a, b| {
            b.2.score
                .cmp(&a.2.score)
                .then_with(|| a.1.cmp(&b.1))
                .then(a.0.cmp(&b.0))
        })
        .collect();

    let mut standings = Vec::with_capacity(ordered.len());
    let mut rank = 0;
    let mut previous_score = None;
    for (position, (user_id, name, tally)) in ordered.into_iter().enumerate() {
        if previous_score != Some(tally.score) {
            rank = position + 1;
            previous_score = Some(tally.score);
        }
        standings.push(Standing {
            rank,
            user_id,
            name,
            score: tally.score,
            champion_pick: tally.champion_pick,
            mvp_pick: tally.mvp_pick,
        });
    }

    standings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Event, EventStatus, EventType, Round};
    use time::macros::datetime;

    fn scored(user_id: Uuid, base: Option<i64>, bonus: Option<i64>) -> Wager {
        let event = Event {
            id: "0042400101".to_string(),
            team1: "Thunder".to_string(),
            team2: "Grizzlies".to_string(),
            team1_score: Some(131),
            team2_score: Some(80),
            start_time: datetime!(2025-04-20 19:30 UTC),
            status: EventStatus::Final,
            event_type: EventType::Game,
            round: Round::FirstRound,
        };
        let mut wager = Wager::placeholder(&event, user_id);
        wager.points_base = base;
        wager.points_bonus = bonus;
        wager
    }

    #[test]
    fn test_tally_sums_base_and_bonus() {
        let ana = Uuid::now_v7();
        let ben = Uuid::now_v7();
        let players = vec![(ana, "ana".to_string()), (ben, "ben".to_string())];
        let wagers = vec![
            scored(ana, Some(4), Some(2)),
            scored(ana, Some(8), None),
            scored(ben, Some(4), Some(4)),
            scored(ben, None, None),
        ];

        let standings = tally_leaderboard(&players, &wagers, &[]);

        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].name, "ana");
        assert_eq!(standings[0].score, 14);
        assert_eq!(standings[0].rank, 1);
        assert_eq!(standings[1].name, "ben");
        assert_eq!(standings[1].score, 8);
        assert_eq!(standings[1].rank, 2);
    }

    #[test]
    fn test_equal_scores_share_rank() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::now_v7()).collect();
        let players = vec![
            (ids[0], "cy".to_string()),
            (ids[1], "al".to_string()),
            (ids[2], "bo".to_string()),
        ];
        let wagers = vec![scored(ids[0], Some(4), None), scored(ids[1], Some(4), None)];

        let standings = tally_leaderboard(&players, &wagers, &[]);
        let summary: Vec<(&str, usize, i64)> = standings
            .iter()
            .map(|s| (s.name.as_str(), s.rank, s.score))
            .collect();

        assert_eq!(summary, vec![("al", 1, 4), ("cy", 1, 4), ("bo", 3, 0)]);
    }

    #[test]
    fn test_unlisted_user_gets_placeholder_name() {
        let stranger = Uuid::now_v7();
        let standings = tally_leaderboard(&[], &[scored(stranger, Some(2), Some(1))], &[]);

        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].name, UNKNOWN_PLAYER);
        assert_eq!(standings[0].score, 3);
    }

    #[test]
    fn test_season_bets_count_toward_total() {
        let ana = Uuid::now_v7();
        let ben = Uuid::now_v7();
        let players = vec![(ana, "ana".to_string()), (ben, "ben".to_string())];
        let wagers = vec![scored(ana, Some(4), Some(2))];
        let mut champion = SeasonBet::new(
            ben,
            2025,
            SeasonBetKind::Champion,
            String::from("Thunder"),
        );
        champion.settle("Thunder", 20);
        let unsettled_mvp = SeasonBet::new(
            ben,
            2025,
            SeasonBetKind::FinalsMvp,
            String::from("Jalen Williams"),
        );

        let standings = tally_leaderboard(&players, &wagers, &[champion, unsettled_mvp]);

        assert_eq!(standings[0].name, "ben");
        assert_eq!(standings[0].score, 20);
        assert_eq!(standings[0].champion_pick.as_deref(), Some("Thunder"));
        assert_eq!(standings[0].mvp_pick.as_deref(), Some("Jalen Williams"));
        assert_eq!(standings[1].name, "ana");
        assert_eq!(standings[1].score, 6);
        assert_eq!(standings[1].champion_pick, None);
    }
}
