//! Pet of the Day selection.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ranking::PetRanking;
use crate::types::{GroupId, PetId};

/// A persisted Pet of the Day outcome. Ties produce several rows for the same
/// group and date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetOfTheDayWinner {
    pub id: String,
    pub group_id: GroupId,
    pub date: NaiveDate,
    pub pet_id: PetId,
    pub final_score: i64,
    pub positive_behaviors: i64,
    pub negative_behaviors: i64,
    pub created_at: DateTime<Utc>,
}

impl PetOfTheDayWinner {
    pub fn from_ranking(
        group_id: GroupId,
        date: NaiveDate,
        ranking: &PetRanking,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            group_id,
            date,
            pet_id: ranking.pet_id.clone(),
            final_score: ranking.total_points,
            positive_behaviors: ranking.positive_behaviors,
            negative_behaviors: ranking.negative_behaviors,
            created_at: now,
        }
    }
}

/// Picks the eligible pets from an already ranked list.
///
/// Every pet holding the best rank is a candidate, but only candidates with a
/// strictly positive total win. A first place at zero or below yields nobody.
pub fn eligible_winners(rankings: &[PetRanking]) -> Vec<&PetRanking> {
    let Some(best) = rankings.iter().map(|r| r.rank).min() else {
        return Vec::new();
    };
    rankings
        .iter()
        .filter(|r| r.rank == best && r.total_points > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::rank;

    fn standing(pet: &str, total: i64, negative: i64) -> PetRanking {
        let mut r = PetRanking::new(PetId::new(pet).unwrap(), pet.to_string(), String::new());
        r.total_points = total;
        r.negative_behaviors = negative;
        r
    }

    fn winner_ids(rankings: &[PetRanking]) -> Vec<&str> {
        eligible_winners(rankings)
            .into_iter()
            .map(|r| r.pet_id.as_str())
            .collect()
    }

    #[test]
    fn tie_at_the_top_yields_every_tied_pet() {
        let ranked = rank(vec![
            standing("a", 10, 1),
            standing("b", 10, 1),
            standing("c", 5, 0),
        ]);
        assert_eq!(winner_ids(&ranked), vec!["a", "b"]);
    }

    #[test]
    fn tie_break_leaves_a_single_winner() {
        let ranked = rank(vec![standing("a", 10, 1), standing("b", 10, 3)]);
        assert_eq!(winner_ids(&ranked), vec!["a"]);
    }

    #[test]
    fn non_positive_first_place_has_no_winner() {
        let zero = rank(vec![standing("a", 0, 0), standing("b", -2, 1)]);
        assert!(winner_ids(&zero).is_empty());

        let negative = rank(vec![standing("a", -1, 1), standing("b", -1, 1)]);
        assert!(winner_ids(&negative).is_empty());
    }

    #[test]
    fn nobody_ranked_means_nobody_wins() {
        assert!(eligible_winners(&[]).is_empty());
    }

    #[test]
    fn winner_row_copies_final_totals() {
        let mut ranking = standing("a", 8, 1);
        ranking.positive_behaviors = 3;
        let now = DateTime::parse_from_rfc3339("2025-06-11T01:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let row = PetOfTheDayWinner::from_ranking(GroupId::new("g").unwrap(), date, &ranking, now);

        assert_eq!(row.final_score, 8);
        assert_eq!(row.positive_behaviors, 3);
        assert_eq!(row.negative_behaviors, 1);
        assert_eq!(row.date, date);
        assert_eq!(row.created_at, now);
    }
}
