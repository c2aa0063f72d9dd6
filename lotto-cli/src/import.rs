use anyhow::{Context, Result, bail};
use lotto_db::rusqlite::Connection;
use std::path::Path;

use lotto_db::archive::{ArchiveLoad, load_archive};
use lotto_db::db::insert_draw;

pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    /// Tirages déjà présents en base.
    pub skipped: u32,
    /// Enregistrements mal formés ou rejetés à l'insertion.
    pub errors: u32,
}

pub fn import_archive(conn: &Connection, path: &Path) -> Result<ImportResult> {
    if !path.exists() {
        bail!("Fichier introuvable : {:?}", path);
    }
    store_archive(conn, load_archive(path)?)
}

fn store_archive(conn: &Connection, load: ArchiveLoad) -> Result<ImportResult> {
    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult {
        total_records: load.total_records,
        inserted: 0,
        skipped: 0,
        errors: load.skipped,
    };

    for draw in &load.draws {
        match insert_draw(&tx, draw) {
            Ok(true) => result.inserted += 1,
            Ok(false) => result.skipped += 1,
            Err(e) => {
                log::error!("Erreur insertion tirage {} : {}", draw.draw_number, e);
                result.errors += 1;
            }
        }
    }

    tx.commit().context("Échec du commit")?;
    Ok(result)
}
