use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;

use crate::models::{Combination, Draw, Owner, SavedCombination, SessionId, User, UserId};

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS draws (
    draw_number   INTEGER PRIMARY KEY,
    draw_date     TEXT,
    ball_1        INTEGER NOT NULL,
    ball_2        INTEGER NOT NULL,
    ball_3        INTEGER NOT NULL,
    ball_4        INTEGER NOT NULL,
    ball_5        INTEGER NOT NULL,
    ball_6        INTEGER NOT NULL,
    bonus         INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS saved_combinations (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER REFERENCES users (id),
    session_id    TEXT,
    draw_number   INTEGER NOT NULL,
    numbers       TEXT NOT NULL,
    created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CHECK ((user_id IS NULL) <> (session_id IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_saved_user ON saved_combinations (user_id, draw_number);
CREATE INDEX IF NOT EXISTS idx_saved_session ON saved_combinations (session_id);
";

const DRAW_COLUMNS: &str =
    "draw_number, draw_date, ball_1, ball_2, ball_3, ball_4, ball_5, ball_6, bonus";

const SAVED_COLUMNS: &str = "id, user_id, session_id, draw_number, numbers, created_at";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("lotto.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

// ── Tirages ──

pub fn insert_draw(conn: &Connection, draw: &Draw) -> Result<bool> {
    let n = draw.winning_numbers.numbers();
    let changed = conn.execute(
        "INSERT OR IGNORE INTO draws (draw_number, draw_date, ball_1, ball_2, ball_3, ball_4, ball_5, ball_6, bonus)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            draw.draw_number,
            draw.draw_date,
            n[0],
            n[1],
            n[2],
            n[3],
            n[4],
            n[5],
            draw.bonus_number,
        ],
    ).context("Échec de l'insertion")?;
    Ok(changed > 0)
}

struct DrawRow {
    draw_number: i64,
    draw_date: Option<String>,
    balls: [i64; 6],
    bonus: i64,
}

fn draw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DrawRow> {
    Ok(DrawRow {
        draw_number: row.get(0)?,
        draw_date: row.get(1)?,
        balls: [
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ],
        bonus: row.get(8)?,
    })
}

// Les lignes incohérentes sont ignorées plutôt que de faire échouer toute la lecture.
fn into_draw(raw: DrawRow) -> Option<Draw> {
    match Draw::new(raw.draw_number, raw.draw_date, &raw.balls, raw.bonus) {
        Ok(draw) => Some(draw),
        Err(e) => {
            log::warn!("Tirage {} ignoré : {}", raw.draw_number, e);
            None
        }
    }
}

pub fn fetch_last_draws(conn: &Connection, limit: u32) -> Result<Vec<Draw>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DRAW_COLUMNS} FROM draws ORDER BY draw_number DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map([limit], draw_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().filter_map(into_draw).collect())
}

pub fn fetch_all_draws(conn: &Connection) -> Result<Vec<Draw>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DRAW_COLUMNS} FROM draws ORDER BY draw_number DESC"
    ))?;
    let rows = stmt.query_map([], draw_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().filter_map(into_draw).collect())
}

pub fn fetch_draw(conn: &Connection, draw_number: u32) -> Result<Option<Draw>> {
    let raw = conn
        .query_row(
            &format!("SELECT {DRAW_COLUMNS} FROM draws WHERE draw_number = ?1"),
            [draw_number],
            draw_row,
        )
        .optional()?;
    Ok(raw.and_then(into_draw))
}

pub fn count_draws(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))?;
    Ok(count)
}

// ── Utilisateurs ──

/// Retourne `None` si le nom d'utilisateur ou l'email est déjà pris.
pub fn create_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<Option<UserId>> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM users WHERE email = ?1 OR username = ?2",
            params![email, username],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Ok(None);
    }
    conn.execute(
        "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
        params![username, email, password_hash],
    ).context("Échec de la création de l'utilisateur")?;
    Ok(Some(UserId(conn.last_insert_rowid())))
}

fn user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
    })
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, email, password_hash FROM users WHERE email = ?1",
            [email],
            user_row,
        )
        .optional()?;
    Ok(user)
}

pub fn find_user_by_id(conn: &Connection, id: UserId) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, email, password_hash FROM users WHERE id = ?1",
            [id.0],
            user_row,
        )
        .optional()?;
    Ok(user)
}

// ── Grilles sauvegardées ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(i64),
    AlreadyExists,
}

pub trait CombinationStore {
    /// Les doublons ne sont détectés que pour les membres inscrits.
    fn save(&self, owner: &Owner, draw_number: u32, numbers: &Combination) -> Result<SaveOutcome>;
    fn list_by_owner(&self, owner: &Owner) -> Result<Vec<SavedCombination>>;
    /// `owner = None` : toutes les grilles du tirage, membres et invités confondus.
    fn list_for_draw(
        &self,
        owner: Option<&Owner>,
        draw_number: u32,
    ) -> Result<Vec<SavedCombination>>;
    fn delete_by_ids(&self, owner: &Owner, ids: &[i64]) -> Result<usize>;
    fn delete_all(&self, owner: &Owner, draw_number: Option<u32>) -> Result<usize>;
}

fn owner_filter(owner: &Owner) -> (&'static str, Value) {
    match owner {
        Owner::Registered(id) => ("user_id", Value::Integer(id.0)),
        Owner::Guest(session) => ("session_id", Value::Text(session.0.clone())),
    }
}

struct SavedRow {
    id: i64,
    user_id: Option<i64>,
    session_id: Option<String>,
    draw_number: u32,
    numbers: String,
    created_at: String,
}

fn saved_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SavedRow> {
    Ok(SavedRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        draw_number: row.get(3)?,
        numbers: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn into_saved(raw: SavedRow) -> Option<SavedCombination> {
    let owner = match (raw.user_id, raw.session_id) {
        (Some(id), _) => Owner::Registered(UserId(id)),
        (None, Some(session)) => Owner::Guest(SessionId(session)),
        (None, None) => {
            log::warn!("Grille {} sans propriétaire ignorée", raw.id);
            return None;
        }
    };
    match serde_json::from_str::<Combination>(&raw.numbers) {
        Ok(numbers) => Some(SavedCombination {
            id: raw.id,
            owner,
            draw_number: raw.draw_number,
            numbers,
            created_at: raw.created_at,
        }),
        Err(e) => {
            log::warn!("Grille {} illisible ({}) : {}", raw.id, raw.numbers, e);
            None
        }
    }
}

fn query_saved(conn: &Connection, sql: &str, values: Vec<Value>) -> Result<Vec<SavedCombination>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), saved_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().filter_map(into_saved).collect())
}

impl CombinationStore for Connection {
    fn save(&self, owner: &Owner, draw_number: u32, numbers: &Combination) -> Result<SaveOutcome> {
        let numbers_json = serde_json::to_string(numbers)?;

        if let Owner::Registered(id) = owner {
            let existing: Option<i64> = self
                .query_row(
                    "SELECT id FROM saved_combinations WHERE user_id = ?1 AND numbers = ?2",
                    params![id.0, numbers_json],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Ok(SaveOutcome::AlreadyExists);
            }
        }

        let (user_id, session_id) = match owner {
            Owner::Registered(id) => (Some(id.0), None),
            Owner::Guest(session) => (None, Some(session.0.as_str())),
        };
        self.execute(
            "INSERT INTO saved_combinations (user_id, session_id, draw_number, numbers) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, session_id, draw_number, numbers_json],
        ).context("Échec de la sauvegarde de la grille")?;
        Ok(SaveOutcome::Saved(self.last_insert_rowid()))
    }

    fn list_by_owner(&self, owner: &Owner) -> Result<Vec<SavedCombination>> {
        let (column, value) = owner_filter(owner);
        query_saved(
            self,
            &format!(
                "SELECT {SAVED_COLUMNS} FROM saved_combinations WHERE {column} = ?1
                 ORDER BY created_at DESC, id DESC"
            ),
            vec![value],
        )
    }

    fn list_for_draw(
        &self,
        owner: Option<&Owner>,
        draw_number: u32,
    ) -> Result<Vec<SavedCombination>> {
        match owner {
            Some(owner) => {
                let (column, value) = owner_filter(owner);
                query_saved(
                    self,
                    &format!(
                        "SELECT {SAVED_COLUMNS} FROM saved_combinations WHERE {column} = ?1 AND draw_number = ?2
                         ORDER BY created_at DESC, id DESC"
                    ),
                    vec![value, Value::Integer(draw_number as i64)],
                )
            }
            None => query_saved(
                self,
                &format!(
                    "SELECT {SAVED_COLUMNS} FROM saved_combinations WHERE draw_number = ?1
                     ORDER BY created_at DESC, id DESC"
                ),
                vec![Value::Integer(draw_number as i64)],
            ),
        }
    }

    fn delete_by_ids(&self, owner: &Owner, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let (column, value) = owner_filter(owner);
        let placeholders = (0..ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let mut values = Vec::with_capacity(ids.len() + 1);
        values.push(value);
        values.extend(ids.iter().map(|&id| Value::Integer(id)));

        let deleted = self.execute(
            &format!("DELETE FROM saved_combinations WHERE {column} = ?1 AND id IN ({placeholders})"),
            params_from_iter(values),
        ).context("Échec de la suppression")?;
        Ok(deleted)
    }

    fn delete_all(&self, owner: &Owner, draw_number: Option<u32>) -> Result<usize> {
        let (column, value) = owner_filter(owner);
        let deleted = match draw_number {
            Some(n) => self.execute(
                &format!("DELETE FROM saved_combinations WHERE {column} = ?1 AND draw_number = ?2"),
                params![value, n],
            ),
            None => self.execute(
                &format!("DELETE FROM saved_combinations WHERE {column} = ?1"),
                params![value],
            ),
        }
        .context("Échec de la suppression")?;
        Ok(deleted)
    }
}
