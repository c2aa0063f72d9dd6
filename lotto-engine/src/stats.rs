use std::collections::BTreeSet;

use serde::Serialize;

use lotto_db::models::{Combination, Draw, BALL_MAX, BALL_MIN};

const POOL_SIZE: usize = BALL_MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumberStats {
    pub number: u8,
    pub frequency: u32,
    /// Tirages écoulés depuis la dernière sortie (0 = sorti au dernier tirage).
    pub gap: u32,
}

/// Occurrences de chaque boule parmi les numéros gagnants (complémentaire exclu).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    stats: Vec<NumberStats>,
    draws: u32,
}

impl FrequencyTable {
    pub fn count(&self, ball: u8) -> u32 {
        if !(BALL_MIN..=BALL_MAX).contains(&ball) {
            return 0;
        }
        self.stats[(ball - 1) as usize].frequency
    }

    pub fn draw_count(&self) -> u32 {
        self.draws
    }

    pub fn total(&self) -> u32 {
        self.stats.iter().map(|s| s.frequency).sum()
    }

    /// Nombre de boules sorties au moins une fois.
    pub fn distinct(&self) -> usize {
        self.stats.iter().filter(|s| s.frequency > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.draws == 0
    }

    pub fn stats(&self) -> &[NumberStats] {
        &self.stats
    }

    /// Boules sorties, par fréquence décroissante puis numéro croissant.
    pub fn ranked(&self) -> Vec<&NumberStats> {
        let mut ranked: Vec<&NumberStats> = self.stats.iter().filter(|s| s.frequency > 0).collect();
        ranked.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.number.cmp(&b.number)));
        ranked
    }
}

pub fn compute_frequency(draws: &[Draw]) -> FrequencyTable {
    let mut stats: Vec<NumberStats> = (BALL_MIN..=BALL_MAX)
        .map(|n| NumberStats {
            number: n,
            frequency: 0,
            gap: 0,
        })
        .collect();
    let mut seen = [false; POOL_SIZE];

    // Le retard se mesure depuis le tirage le plus récent, quel que soit l'ordre de l'archive
    let mut ordered: Vec<&Draw> = draws.iter().collect();
    ordered.sort_by(|a, b| b.draw_number.cmp(&a.draw_number));

    for (i, draw) in ordered.iter().enumerate() {
        for &n in draw.winning_numbers.numbers() {
            let idx = (n - 1) as usize;
            stats[idx].frequency += 1;
            if !seen[idx] {
                seen[idx] = true;
                stats[idx].gap = i as u32;
            }
        }
    }

    for (stat, &was_seen) in stats.iter_mut().zip(seen.iter()) {
        if !was_seen {
            stat.gap = ordered.len() as u32;
        }
    }

    FrequencyTable {
        stats,
        draws: ordered.len() as u32,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub hot: BTreeSet<u8>,
    pub cold: BTreeSet<u8>,
}

impl Classification {
    pub fn is_hot(&self, n: u8) -> bool {
        self.hot.contains(&n)
    }

    pub fn is_cold(&self, n: u8) -> bool {
        self.cold.contains(&n)
    }

    pub fn hot_count(&self, combination: &Combination) -> usize {
        combination.numbers().iter().filter(|&&n| self.is_hot(n)).count()
    }

    pub fn cold_count(&self, combination: &Combination) -> usize {
        combination.numbers().iter().filter(|&&n| self.is_cold(n)).count()
    }
}

/// `hot` = tête du classement, `cold` = queue du même classement.
/// Seules les boules déjà sorties sont classées.
pub fn classify(table: &FrequencyTable, hot_size: usize, cold_size: usize) -> Classification {
    let ranked = table.ranked();
    let hot = ranked.iter().take(hot_size).map(|s| s.number).collect();
    let cold = ranked.iter().rev().take(cold_size).map(|s| s.number).collect();
    Classification { hot, cold }
}

/// Résumé public des statistiques.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticsSummary {
    pub core_numbers: Vec<u8>,
    pub last_week_numbers: Vec<u8>,
    pub exclude_numbers: Vec<u8>,
    pub total_draws: usize,
}

pub fn summarize(draws: &[Draw], size: usize) -> StatisticsSummary {
    let table = compute_frequency(draws);
    let classification = classify(&table, size, size);
    let last_week_numbers = draws
        .iter()
        .max_by_key(|d| d.draw_number)
        .map(|d| d.winning_numbers.numbers().to_vec())
        .unwrap_or_default();

    StatisticsSummary {
        core_numbers: classification.hot.into_iter().collect(),
        last_week_numbers,
        exclude_numbers: classification.cold.into_iter().collect(),
        total_draws: draws.len(),
    }
}

#[cfg(test)]
pub(crate) fn test_draw(number: u32, numbers: [u8; 6], bonus: u8) -> Draw {
    Draw::new(number as i64, None, &numbers, bonus as i64).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_archive() -> Vec<Draw> {
        vec![
            test_draw(1, [1, 2, 3, 4, 5, 6], 7),
            test_draw(2, [1, 2, 3, 10, 11, 12], 13),
            test_draw(3, [1, 2, 20, 21, 22, 23], 24),
        ]
    }

    #[test]
    fn test_single_draw_counts_exclude_bonus() {
        let draws = vec![test_draw(1100, [3, 7, 15, 22, 37, 41], 9)];
        let table = compute_frequency(&draws);
        for n in [3, 7, 15, 22, 37, 41] {
            assert_eq!(table.count(n), 1, "boule {}", n);
        }
        assert_eq!(table.count(9), 0);
        assert_eq!(table.total(), 6);
        assert_eq!(table.distinct(), 6);
    }

    #[test]
    fn test_empty_archive() {
        let table = compute_frequency(&[]);
        assert!(table.is_empty());
        assert_eq!(table.distinct(), 0);
        let classification = classify(&table, 10, 10);
        assert!(classification.hot.is_empty());
        assert!(classification.cold.is_empty());
    }

    #[test]
    fn test_ranking_tie_break_ascending() {
        let table = compute_frequency(&sample_archive());
        let ranked: Vec<u8> = table.ranked().iter().map(|s| s.number).collect();
        assert_eq!(&ranked[..3], &[1, 2, 3]);
        // Ex aequo à 1 occurrence : ordre croissant
        assert_eq!(&ranked[3..], &[4, 5, 6, 10, 11, 12, 20, 21, 22, 23]);
    }

    #[test]
    fn test_classify_hot_and_cold() {
        let table = compute_frequency(&sample_archive());
        let classification = classify(&table, 2, 3);
        assert_eq!(classification.hot, BTreeSet::from([1, 2]));
        assert_eq!(classification.cold, BTreeSet::from([21, 22, 23]));
    }

    #[test]
    fn test_classify_deterministic_and_bounded() {
        let draws = sample_archive();
        let table = compute_frequency(&draws);
        let a = classify(&table, 10, 10);
        let b = classify(&compute_frequency(&draws), 10, 10);
        assert_eq!(a, b);
        let union: BTreeSet<u8> = a.hot.union(&a.cold).copied().collect();
        assert!(union.len() <= table.distinct());
    }

    #[test]
    fn test_classify_order_independent() {
        let mut draws = sample_archive();
        let a = classify(&compute_frequency(&draws), 5, 5);
        draws.reverse();
        let b = classify(&compute_frequency(&draws), 5, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_gap() {
        let table = compute_frequency(&sample_archive());
        let gap = |n: u8| table.stats()[(n - 1) as usize].gap;
        assert_eq!(gap(1), 0);
        assert_eq!(gap(3), 1);
        assert_eq!(gap(4), 2);
        assert_eq!(gap(45), 3);
    }

    #[test]
    fn test_summary() {
        let summary = summarize(&sample_archive(), 5);
        assert_eq!(summary.total_draws, 3);
        assert_eq!(summary.core_numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(summary.exclude_numbers, vec![12, 20, 21, 22, 23]);
        assert_eq!(summary.last_week_numbers, vec![1, 2, 20, 21, 22, 23]);
    }

    #[test]
    fn test_summary_empty() {
        let summary = summarize(&[], 5);
        assert_eq!(summary.total_draws, 0);
        assert!(summary.core_numbers.is_empty());
        assert!(summary.last_week_numbers.is_empty());
    }
}
