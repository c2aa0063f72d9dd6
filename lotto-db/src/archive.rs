use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::models::{Draw, ValidationError, PICK_COUNT};

/// Les deux formes d'enregistrement rencontrées dans l'historique officiel.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRecord {
    /// `numbers` = 6 numéros gagnants suivis du complémentaire.
    Compact { draw_no: i64, numbers: Vec<i64> },
    Detailed {
        draw_number: i64,
        #[serde(default)]
        draw_date: Option<String>,
        winning_numbers: Vec<i64>,
        bonus_number: i64,
    },
}

impl RawRecord {
    fn into_draw(self) -> Result<Draw, ValidationError> {
        match self {
            RawRecord::Compact { draw_no, numbers } => {
                if numbers.len() < PICK_COUNT + 1 {
                    return Err(ValidationError::WrongCount(numbers.len()));
                }
                Draw::new(draw_no, None, &numbers[..PICK_COUNT], numbers[PICK_COUNT])
            }
            RawRecord::Detailed { draw_number, draw_date, winning_numbers, bonus_number } => {
                Draw::new(draw_number, draw_date, &winning_numbers, bonus_number)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ArchiveLoad {
    pub draws: Vec<Draw>,
    pub total_records: u32,
    pub skipped: u32,
}

/// Un contenu qui n'est pas un tableau JSON donne zéro tirage, jamais une erreur.
pub fn parse_archive(json: &str) -> ArchiveLoad {
    let records: Vec<serde_json::Value> = match serde_json::from_str(json) {
        Ok(records) => records,
        Err(e) => {
            log::warn!("Historique illisible, considéré comme vide : {}", e);
            return ArchiveLoad::default();
        }
    };

    let mut load = ArchiveLoad {
        draws: Vec::with_capacity(records.len()),
        total_records: 0,
        skipped: 0,
    };

    for (i, value) in records.into_iter().enumerate() {
        load.total_records += 1;
        let parsed = serde_json::from_value::<RawRecord>(value)
            .map_err(|e| e.to_string())
            .and_then(|raw| raw.into_draw().map_err(|e| e.to_string()));
        match parsed {
            Ok(draw) => load.draws.push(draw),
            Err(e) => {
                log::warn!("Enregistrement {} ignoré : {}", i + 1, e);
                load.skipped += 1;
            }
        }
    }

    load
}

pub fn load_archive(path: &Path) -> Result<ArchiveLoad> {
    if !path.exists() {
        log::warn!("Historique {:?} absent, aucun tirage chargé", path);
        return Ok(ArchiveLoad::default());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {:?}", path))?;
    Ok(parse_archive(&json))
}
