use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lotto_db::models::{Combination, Draw, SavedCombination};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrizeError {
    #[error("Tirage {0} introuvable dans l'historique")]
    DrawNotFound(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
    #[serde(rename = "3rd")]
    Third,
    #[serde(rename = "4th")]
    Fourth,
    #[serde(rename = "5th")]
    Fifth,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::First, Tier::Second, Tier::Third, Tier::Fourth, Tier::Fifth];

    /// Table de décision : première ligne satisfaite.
    pub fn from_match(matched_count: usize, bonus_matched: bool) -> Option<Tier> {
        match (matched_count, bonus_matched) {
            (6, _) => Some(Tier::First),
            (5, true) => Some(Tier::Second),
            (5, false) => Some(Tier::Third),
            (4, _) => Some(Tier::Fourth),
            (3, _) => Some(Tier::Fifth),
            _ => None,
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Tier::First => 1,
            Tier::Second => 2,
            Tier::Third => 3,
            Tier::Fourth => 4,
            Tier::Fifth => 5,
        }
    }

    pub fn condition(&self) -> &'static str {
        match self {
            Tier::First => "6 numéros",
            Tier::Second => "5 numéros + complémentaire",
            Tier::Third => "5 numéros",
            Tier::Fourth => "4 numéros",
            Tier::Fifth => "3 numéros",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::First => write!(f, "1er rang"),
            other => write!(f, "{}e rang", other.rank()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrizeResult {
    pub numbers: Combination,
    pub matched_count: usize,
    pub matched_numbers: Vec<u8>,
    pub bonus_matched: bool,
    pub tier: Option<Tier>,
}

pub fn evaluate(combination: &Combination, draw: &Draw) -> PrizeResult {
    let matched_numbers: Vec<u8> = combination
        .numbers()
        .iter()
        .copied()
        .filter(|&n| draw.winning_numbers.contains(n))
        .collect();
    let matched_count = matched_numbers.len();
    let bonus_matched = combination.contains(draw.bonus_number);

    PrizeResult {
        numbers: *combination,
        matched_count,
        matched_numbers,
        bonus_matched,
        tier: Tier::from_match(matched_count, bonus_matched),
    }
}

pub fn find_draw(draws: &[Draw], draw_number: u32) -> Result<&Draw, PrizeError> {
    draws
        .iter()
        .find(|d| d.draw_number == draw_number)
        .ok_or(PrizeError::DrawNotFound(draw_number))
}

/// Décompte par rang, les cinq rangs toujours présents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TierCounts(BTreeMap<Tier, usize>);

impl Default for TierCounts {
    fn default() -> Self {
        Self(Tier::ALL.iter().map(|&t| (t, 0)).collect())
    }
}

impl TierCounts {
    pub fn add(&mut self, tier: Option<Tier>) {
        if let Some(tier) = tier {
            *self.0.entry(tier).or_insert(0) += 1;
        }
    }

    pub fn get(&self, tier: Tier) -> usize {
        self.0.get(&tier).copied().unwrap_or(0)
    }

    pub fn winners(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tier, usize)> + '_ {
        self.0.iter().map(|(&t, &n)| (t, n))
    }
}

pub fn tally<'a>(results: impl IntoIterator<Item = &'a PrizeResult>) -> TierCounts {
    results.into_iter().fold(TierCounts::default(), |mut counts, r| {
        counts.add(r.tier);
        counts
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluatedCombination {
    pub id: i64,
    pub result: PrizeResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEvaluation {
    pub results: Vec<EvaluatedCombination>,
    pub counts: TierCounts,
}

pub fn evaluate_batch(saved: &[SavedCombination], draw: &Draw) -> BatchEvaluation {
    let results: Vec<EvaluatedCombination> = saved
        .iter()
        .map(|s| EvaluatedCombination {
            id: s.id,
            result: evaluate(&s.numbers, draw),
        })
        .collect();
    let counts = tally(results.iter().map(|e| &e.result));
    BatchEvaluation { results, counts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::test_draw;
    use lotto_db::models::{Owner, UserId};

    fn combo(numbers: [u8; 6]) -> Combination {
        Combination::new(&numbers).unwrap()
    }

    fn draw() -> Draw {
        test_draw(1, [1, 2, 3, 4, 5, 6], 7)
    }

    #[test]
    fn test_first_tier() {
        let r = evaluate(&combo([1, 2, 3, 4, 5, 6]), &draw());
        assert_eq!(r.matched_count, 6);
        assert_eq!(r.tier, Some(Tier::First));
    }

    #[test]
    fn test_second_tier() {
        let r = evaluate(&combo([1, 2, 3, 4, 5, 7]), &draw());
        assert_eq!(r.matched_count, 5);
        assert!(r.bonus_matched);
        assert_eq!(r.tier, Some(Tier::Second));
    }

    #[test]
    fn test_lower_tiers() {
        let d = test_draw(1, [5, 12, 21, 33, 37, 42], 7);
        assert_eq!(evaluate(&combo([5, 12, 21, 33, 37, 1]), &d).tier, Some(Tier::Third));
        assert_eq!(evaluate(&combo([5, 12, 21, 33, 1, 2]), &d).tier, Some(Tier::Fourth));
        assert_eq!(evaluate(&combo([5, 12, 21, 1, 2, 3]), &d).tier, Some(Tier::Fifth));
        let miss = evaluate(&combo([1, 2, 3, 4, 6, 8]), &d);
        assert_eq!(miss.matched_count, 0);
        assert_eq!(miss.tier, None);
    }

    #[test]
    fn test_decision_table_exhaustive() {
        for matched in 0..=6 {
            for bonus in [false, true] {
                let expected = match matched {
                    6 => Some(Tier::First),
                    5 if bonus => Some(Tier::Second),
                    5 => Some(Tier::Third),
                    4 => Some(Tier::Fourth),
                    3 => Some(Tier::Fifth),
                    _ => None,
                };
                assert_eq!(Tier::from_match(matched, bonus), expected, "{} / {}", matched, bonus);
            }
        }
    }

    #[test]
    fn test_bonus_irrelevant_below_five() {
        let r = evaluate(&combo([1, 2, 3, 7, 40, 41]), &draw());
        assert_eq!(r.matched_count, 3);
        assert!(r.bonus_matched);
        assert_eq!(r.tier, Some(Tier::Fifth));
    }

    #[test]
    fn test_match_order_independent() {
        let d1 = test_draw(1, [6, 5, 4, 3, 2, 1], 7);
        let a = evaluate(&Combination::new(&[5u8, 3, 1, 40, 2, 30]).unwrap(), &draw());
        let b = evaluate(&Combination::new(&[30u8, 2, 40, 1, 3, 5]).unwrap(), &d1);
        assert_eq!(a, b);
        assert_eq!(a.matched_numbers, vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_find_draw() {
        let draws = vec![draw(), test_draw(2, [10, 11, 12, 13, 14, 15], 16)];
        assert_eq!(find_draw(&draws, 2).unwrap().draw_number, 2);
        assert_eq!(find_draw(&draws, 3), Err(PrizeError::DrawNotFound(3)));
    }

    #[test]
    fn test_batch_counts() {
        let saved: Vec<SavedCombination> = [
            [1, 2, 3, 4, 5, 6],
            [1, 2, 3, 4, 5, 7],
            [1, 2, 3, 40, 41, 42],
            [1, 2, 3, 43, 44, 45],
            [20, 21, 22, 23, 24, 25],
        ]
        .iter()
        .enumerate()
        .map(|(i, n)| SavedCombination {
            id: i as i64 + 1,
            owner: Owner::Registered(UserId(1)),
            draw_number: 1,
            numbers: combo(*n),
            created_at: String::new(),
        })
        .collect();

        let batch = evaluate_batch(&saved, &draw());
        assert_eq!(batch.results.len(), 5);
        assert_eq!(batch.results[1].id, 2);
        assert_eq!(batch.counts.get(Tier::First), 1);
        assert_eq!(batch.counts.get(Tier::Second), 1);
        assert_eq!(batch.counts.get(Tier::Third), 0);
        assert_eq!(batch.counts.get(Tier::Fifth), 2);
        assert_eq!(batch.counts.winners(), 4);

        let mut reversed: Vec<PrizeResult> =
            batch.results.iter().map(|e| e.result.clone()).collect();
        reversed.reverse();
        assert_eq!(tally(&reversed), batch.counts);
    }

    #[test]
    fn test_tier_counts_json() {
        let counts = TierCounts::default();
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"1st":0,"2nd":0,"3rd":0,"4th":0,"5th":0}"#);
        assert_eq!(serde_json::to_string(&Some(Tier::Second)).unwrap(), r#""2nd""#);
    }
}
