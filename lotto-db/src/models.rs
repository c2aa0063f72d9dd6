use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BALL_MIN: u8 = 1;
pub const BALL_MAX: u8 = 45;
pub const PICK_COUNT: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{PICK_COUNT} numéros attendus, {0} reçus")]
    WrongCount(usize),
    #[error("Numéro {0} hors limites ({BALL_MIN}-{BALL_MAX})")]
    OutOfRange(i64),
    #[error("Numéro en double : {0}")]
    Duplicate(u8),
    #[error("Numéro complémentaire {0} déjà présent parmi les numéros gagnants")]
    BonusCollision(u8),
    #[error("Numéro de tirage invalide : {0}")]
    InvalidDrawNumber(i64),
}

fn ball_from(value: i64) -> Result<u8, ValidationError> {
    if value < BALL_MIN as i64 || value > BALL_MAX as i64 {
        return Err(ValidationError::OutOfRange(value));
    }
    Ok(value as u8)
}

/// Six numéros distincts dans [1, 45], toujours triés par ordre croissant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<u8>")]
pub struct Combination([u8; PICK_COUNT]);

impl Combination {
    pub fn new<T: Copy + Into<i64>>(numbers: &[T]) -> Result<Self, ValidationError> {
        if numbers.len() != PICK_COUNT {
            return Err(ValidationError::WrongCount(numbers.len()));
        }
        let mut balls = [0u8; PICK_COUNT];
        for (slot, &n) in balls.iter_mut().zip(numbers) {
            *slot = ball_from(n.into())?;
        }
        balls.sort_unstable();
        if let Some(pair) = balls.windows(2).find(|w| w[0] == w[1]) {
            return Err(ValidationError::Duplicate(pair[0]));
        }
        Ok(Self(balls))
    }

    pub fn numbers(&self) -> &[u8; PICK_COUNT] {
        &self.0
    }

    pub fn contains(&self, n: u8) -> bool {
        self.0.binary_search(&n).is_ok()
    }

    pub fn sum(&self) -> u32 {
        self.0.iter().map(|&n| n as u32).sum()
    }

    /// Nombre de paires adjacentes consécutives (n, n+1).
    pub fn consecutive_pairs(&self) -> usize {
        self.0.windows(2).filter(|w| w[1] == w[0] + 1).count()
    }
}

impl TryFrom<Vec<i64>> for Combination {
    type Error = ValidationError;

    fn try_from(values: Vec<i64>) -> Result<Self, Self::Error> {
        Combination::new(&values)
    }
}

impl From<Combination> for Vec<u8> {
    fn from(c: Combination) -> Self {
        c.0.to_vec()
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|n| format!("{:2}", n)).collect();
        write!(f, "{}", parts.join(" - "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Draw {
    pub draw_number: u32,
    pub draw_date: Option<String>,
    pub winning_numbers: Combination,
    pub bonus_number: u8,
}

impl Draw {
    pub fn new<T: Copy + Into<i64>>(
        draw_number: i64,
        draw_date: Option<String>,
        winning: &[T],
        bonus: i64,
    ) -> Result<Self, ValidationError> {
        if draw_number < 1 || draw_number > u32::MAX as i64 {
            return Err(ValidationError::InvalidDrawNumber(draw_number));
        }
        let winning_numbers = Combination::new(winning)?;
        let bonus_number = ball_from(bonus)?;
        if winning_numbers.contains(bonus_number) {
            return Err(ValidationError::BonusCollision(bonus_number));
        }
        Ok(Self {
            draw_number: draw_number as u32,
            draw_date,
            winning_numbers,
            bonus_number,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Propriétaire d'une grille : un membre inscrit ou une session invitée, jamais les deux.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Owner {
    Registered(UserId),
    Guest(SessionId),
}

impl Owner {
    pub fn is_guest(&self) -> bool {
        matches!(self, Owner::Guest(_))
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Registered(id) => write!(f, "membre #{}", id),
            Owner::Guest(session) => write!(f, "invité {}", session),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedCombination {
    pub id: i64,
    pub owner: Owner,
    pub draw_number: u32,
    pub numbers: Combination,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combination_sorted() {
        let c = Combination::new(&[41u8, 3, 22, 7, 37, 15]).unwrap();
        assert_eq!(c.numbers(), &[3, 7, 15, 22, 37, 41]);
        assert_eq!(c.sum(), 125);
    }

    #[test]
    fn test_combination_wrong_count() {
        assert_eq!(
            Combination::new(&[1u8, 2, 3, 4, 5]),
            Err(ValidationError::WrongCount(5))
        );
        assert_eq!(
            Combination::new(&[1u8, 2, 3, 4, 5, 6, 7]),
            Err(ValidationError::WrongCount(7))
        );
    }

    #[test]
    fn test_combination_out_of_range() {
        assert_eq!(
            Combination::new(&[0i64, 2, 3, 4, 5, 6]),
            Err(ValidationError::OutOfRange(0))
        );
        assert_eq!(
            Combination::new(&[1i64, 2, 3, 4, 5, 46]),
            Err(ValidationError::OutOfRange(46))
        );
    }

    #[test]
    fn test_combination_duplicate() {
        assert_eq!(
            Combination::new(&[1u8, 2, 2, 4, 5, 6]),
            Err(ValidationError::Duplicate(2))
        );
    }

    #[test]
    fn test_consecutive_pairs() {
        let c = Combination::new(&[1u8, 2, 3, 10, 20, 21]).unwrap();
        assert_eq!(c.consecutive_pairs(), 3);
        let c = Combination::new(&[1u8, 3, 5, 7, 9, 11]).unwrap();
        assert_eq!(c.consecutive_pairs(), 0);
    }

    #[test]
    fn test_combination_json() {
        let c: Combination = serde_json::from_str("[6,5,4,3,2,1]").unwrap();
        assert_eq!(serde_json::to_string(&c).unwrap(), "[1,2,3,4,5,6]");
        assert!(serde_json::from_str::<Combination>("[1,2,3]").is_err());
    }

    #[test]
    fn test_draw_bonus_collision() {
        assert_eq!(
            Draw::new(1, None, &[1u8, 2, 3, 4, 5, 6], 6),
            Err(ValidationError::BonusCollision(6))
        );
        assert!(Draw::new(1, None, &[1u8, 2, 3, 4, 5, 6], 7).is_ok());
    }

    #[test]
    fn test_draw_number_positive() {
        assert_eq!(
            Draw::new(0, None, &[1u8, 2, 3, 4, 5, 6], 7),
            Err(ValidationError::InvalidDrawNumber(0))
        );
    }
}
