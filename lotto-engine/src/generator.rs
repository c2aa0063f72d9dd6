use std::fmt;
use std::ops::RangeInclusive;

use rand::Rng;
use serde::Serialize;

use lotto_db::models::{Combination, BALL_MAX, PICK_COUNT};

use crate::stats::Classification;

pub const MIN_COUNT: usize = 1;
pub const MAX_COUNT: usize = 100;
/// Plafond de tirages bruts par grille demandée.
pub const ATTEMPTS_PER_COMBINATION: usize = 10;

pub const SUM_RANGE: RangeInclusive<u32> = 100..=200;
pub const MAX_CONSECUTIVE_PAIRS: usize = 2;
pub const MIN_HOT: usize = 1;
pub const MAX_COLD: usize = 3;

/// Premier filtre en échec pour une grille candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Sum(u32),
    Consecutive(usize),
    NoHotNumber,
    TooManyCold(usize),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Sum(sum) => write!(
                f,
                "somme {} hors de [{}, {}]",
                sum,
                SUM_RANGE.start(),
                SUM_RANGE.end()
            ),
            Rejection::Consecutive(pairs) => write!(f, "{} paires consécutives", pairs),
            Rejection::NoHotNumber => write!(f, "aucun numéro chaud"),
            Rejection::TooManyCold(n) => write!(f, "{} numéros froids", n),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub sum: usize,
    pub consecutive: usize,
    pub no_hot: usize,
    pub too_many_cold: usize,
}

impl RejectionCounts {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Sum(_) => self.sum += 1,
            Rejection::Consecutive(_) => self.consecutive += 1,
            Rejection::NoHotNumber => self.no_hot += 1,
            Rejection::TooManyCold(_) => self.too_many_cold += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.sum + self.consecutive + self.no_hot + self.too_many_cold
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedCombination {
    pub numbers: Combination,
    pub sum: u32,
    pub hot_count: usize,
    pub cold_count: usize,
}

impl GeneratedCombination {
    pub fn explanation(&self) -> String {
        format!("Somme : {}, numéros chauds : {}", self.sum, self.hot_count)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Generation {
    pub accepted: Vec<GeneratedCombination>,
    /// Tirages bruts effectués, rejets compris.
    pub attempted: usize,
    pub rejections: RejectionCounts,
}

impl Generation {
    pub fn acceptance_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.accepted.len() as f64 / self.attempted as f64
    }

    /// Pourcentage de candidats rejetés, une décimale ("0%" si rien n'a été tenté).
    pub fn filter_rate(&self) -> String {
        if self.attempted == 0 {
            return "0%".to_string();
        }
        format!("{:.1}%", (1.0 - self.acceptance_rate()) * 100.0)
    }
}

/// Applique les filtres dans l'ordre : somme, suites, équilibre chaud/froid.
pub fn check_filters(
    numbers: &Combination,
    classification: &Classification,
) -> Result<GeneratedCombination, Rejection> {
    let sum = numbers.sum();
    if !SUM_RANGE.contains(&sum) {
        return Err(Rejection::Sum(sum));
    }

    let pairs = numbers.consecutive_pairs();
    if pairs > MAX_CONSECUTIVE_PAIRS {
        return Err(Rejection::Consecutive(pairs));
    }

    let hot_count = classification.hot_count(numbers);
    if hot_count < MIN_HOT {
        return Err(Rejection::NoHotNumber);
    }
    let cold_count = classification.cold_count(numbers);
    if cold_count > MAX_COLD {
        return Err(Rejection::TooManyCold(cold_count));
    }

    Ok(GeneratedCombination {
        numbers: *numbers,
        sum,
        hot_count,
        cold_count,
    })
}

/// 6 boules distinctes tirées uniformément sans remise dans [1, 45].
pub fn draw_candidate<R: Rng + ?Sized>(rng: &mut R) -> Option<Combination> {
    let picked: Vec<u8> = rand::seq::index::sample(rng, BALL_MAX as usize, PICK_COUNT)
        .iter()
        .map(|i| (i + 1) as u8)
        .collect();
    Combination::new(&picked).ok()
}

pub fn clamp_count(count: usize) -> usize {
    count.clamp(MIN_COUNT, MAX_COUNT)
}

/// Échantillonnage par rejet : s'arrête à `count` grilles acceptées ou après
/// `count * ATTEMPTS_PER_COMBINATION` tirages bruts.
pub fn generate<R: Rng + ?Sized>(
    count: usize,
    classification: &Classification,
    rng: &mut R,
) -> Generation {
    let count = clamp_count(count);
    let max_attempts = count * ATTEMPTS_PER_COMBINATION;
    let mut generation = Generation {
        accepted: Vec::with_capacity(count),
        ..Default::default()
    };

    while generation.accepted.len() < count && generation.attempted < max_attempts {
        generation.attempted += 1;
        let Some(candidate) = draw_candidate(rng) else {
            continue;
        };
        match check_filters(&candidate, classification) {
            Ok(accepted) => generation.accepted.push(accepted),
            Err(rejection) => generation.rejections.record(rejection),
        }
    }

    log::debug!(
        "{} grilles retenues sur {} tirages (rejets : {:?})",
        generation.accepted.len(),
        generation.attempted,
        generation.rejections
    );

    generation
}
