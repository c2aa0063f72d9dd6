//! Formes de requêtes/réponses et opérations du service.
//!
//! Les corps JSON sont validés ici puis convertis en types du domaine ; rien de
//! faiblement typé ne descend plus bas.

use rand::distr::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use lotto_db::db::{self, CombinationStore, SaveOutcome};
use lotto_db::models::{Combination, Draw, Owner, SavedCombination, SessionId, User, UserId};
use lotto_db::rusqlite::Connection;

use crate::auth::{AuthError, TokenAuth};
use crate::config::AppConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::generator::{self, GeneratedCombination, Generation, MAX_COUNT, MIN_COUNT};
use crate::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::prize::{self, evaluate, evaluate_batch, PrizeError, Tier, TierCounts};
use crate::stats::{self, Classification, FrequencyTable, StatisticsSummary};

pub const DEFAULT_COUNT: usize = 5;
const SESSION_ID_LEN: usize = 32;

/// Désérialise un corps JSON ; un champ requis manquant est une requête invalide.
pub fn parse_request<T: DeserializeOwned>(json: &str) -> ServiceResult<T> {
    serde_json::from_str(json).map_err(|e| ServiceError::BadRequest(e.to_string()))
}

pub fn new_guest_session<R: Rng + ?Sized>(rng: &mut R) -> SessionId {
    let id: String = (0..SESSION_ID_LEN)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect();
    SessionId(id)
}

// ── Génération ──

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default, deserialize_with = "lenient_count")]
    pub num_combinations: Option<i64>,
}

/// Tout ce qui n'est pas un entier JSON représentable est traité comme absent.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64())
}

impl GenerateRequest {
    /// Hors de [1, 100] ou absent : 5.
    pub fn effective_count(&self) -> usize {
        match self.num_combinations {
            Some(n) if n >= MIN_COUNT as i64 && n <= MAX_COUNT as i64 => n as usize,
            _ => DEFAULT_COUNT,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedView {
    pub numbers: Combination,
    pub explanation: String,
    pub sum: u32,
    pub hot_count: usize,
}

impl From<&GeneratedCombination> for GeneratedView {
    fn from(g: &GeneratedCombination) -> Self {
        Self {
            numbers: g.numbers,
            explanation: g.explanation(),
            sum: g.sum,
            hot_count: g.hot_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationStatistics {
    pub total_generated: usize,
    pub after_filtering: usize,
    pub filter_rate: String,
}

impl From<&Generation> for GenerationStatistics {
    fn from(g: &Generation) -> Self {
        Self {
            total_generated: g.attempted,
            after_filtering: g.accepted.len(),
            filter_rate: g.filter_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub combinations: Vec<GeneratedView>,
    pub statistics: GenerationStatistics,
}

// ── Comptes ──

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

// ── Grilles sauvegardées ──

#[derive(Debug, Clone, Deserialize)]
pub struct SaveRequest {
    pub numbers: Vec<i64>,
    pub draw_number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveResponse {
    pub saved: bool,
    pub id: Option<i64>,
    pub owner: Owner,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedView {
    pub id: i64,
    pub draw_number: u32,
    pub numbers: Combination,
    pub created_at: String,
}

impl From<SavedCombination> for SavedView {
    fn from(s: SavedCombination) -> Self {
        Self {
            id: s.id,
            draw_number: s.draw_number,
            numbers: s.numbers,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MyCombinationsResponse {
    pub combinations: Vec<SavedView>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub ids: Option<Vec<i64>>,
    #[serde(default)]
    pub all: Option<bool>,
    #[serde(default)]
    pub draw_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteScope {
    All { draw_number: Option<u32> },
    Ids(Vec<i64>),
}

impl DeleteRequest {
    pub fn scope(&self) -> ServiceResult<DeleteScope> {
        if self.all == Some(true) {
            return Ok(DeleteScope::All {
                draw_number: self.draw_number,
            });
        }
        match &self.ids {
            Some(ids) => Ok(DeleteScope::Ids(ids.clone())),
            None => Err(ServiceError::BadRequest(
                "préciser `ids` ou `all: true`".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResponse {
    pub deleted_count: usize,
}

// ── Résultats ──

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    pub draw_number: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckedCombination {
    pub id: i64,
    pub numbers: Combination,
    pub matched_count: usize,
    pub bonus_matched: bool,
    pub prize: Option<Tier>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResponse {
    pub draw_number: u32,
    pub winning_numbers: Combination,
    pub bonus_number: u8,
    pub results: Vec<CheckedCombination>,
    pub prizes: TierCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub id: i64,
    pub owner: Owner,
    pub is_guest: bool,
    pub numbers: Combination,
    pub created_at: String,
    pub matched_count: usize,
    pub prize: Option<Tier>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrawReport {
    pub draw_number: u32,
    pub winning_numbers: Combination,
    pub bonus_number: u8,
    pub total_combinations: usize,
    pub member_combinations: usize,
    pub guest_combinations: usize,
    pub combinations: Vec<ReportRow>,
    pub prizes: TierCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnerSummary {
    pub total_combinations: usize,
    /// Grilles dont le tirage figure déjà dans l'historique.
    pub evaluated: usize,
    pub wins: TierCounts,
}

fn check_response(draw: &Draw, saved: &[SavedCombination]) -> CheckResponse {
    let batch = evaluate_batch(saved, draw);
    let results = batch
        .results
        .into_iter()
        .map(|e| CheckedCombination {
            id: e.id,
            numbers: e.result.numbers,
            matched_count: e.result.matched_count,
            bonus_matched: e.result.bonus_matched,
            prize: e.result.tier,
        })
        .collect();
    CheckResponse {
        draw_number: draw.draw_number,
        winning_numbers: draw.winning_numbers,
        bonus_number: draw.bonus_number,
        results,
        prizes: batch.counts,
    }
}

pub struct LottoService {
    conn: Connection,
    auth: TokenAuth,
    config: AppConfig,
}

impl LottoService {
    pub fn open(config: AppConfig) -> ServiceResult<Self> {
        let conn = db::open_db(&config.db_path)?;
        Self::new(conn, config)
    }

    pub fn new(conn: Connection, config: AppConfig) -> ServiceResult<Self> {
        config.validate()?;
        db::migrate(&conn)?;
        let auth = TokenAuth::new(config.token_secret.as_bytes())?;
        Ok(Self { conn, auth, config })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn auth(&self) -> &TokenAuth {
        &self.auth
    }

    pub fn draws(&self) -> ServiceResult<Vec<Draw>> {
        Ok(db::fetch_all_draws(&self.conn)?)
    }

    /// Un jeton valide dont l'utilisateur a été supprimé est refusé.
    fn require_user(&self, authorization: Option<&str>) -> ServiceResult<User> {
        let claim = self.auth.require(authorization)?;
        db::find_user_by_id(&self.conn, claim.subject_id)?
            .ok_or_else(|| AuthError::UnknownUser.into())
    }

    fn require_owner(&self, authorization: Option<&str>) -> ServiceResult<Owner> {
        Ok(Owner::Registered(self.require_user(authorization)?.id))
    }

    fn find_draw(&self, draw_number: u32) -> ServiceResult<Draw> {
        db::fetch_draw(&self.conn, draw_number)?
            .ok_or_else(|| PrizeError::DrawNotFound(draw_number).into())
    }

    // ── Statistiques ──

    pub fn frequency(&self) -> ServiceResult<FrequencyTable> {
        Ok(stats::compute_frequency(&self.draws()?))
    }

    pub fn statistics(&self) -> ServiceResult<StatisticsSummary> {
        Ok(stats::summarize(&self.draws()?, self.config.summary_size))
    }

    pub fn generation_classification(&self) -> ServiceResult<Classification> {
        let table = self.frequency()?;
        Ok(stats::classify(
            &table,
            self.config.generation_hot_size,
            self.config.generation_cold_size,
        ))
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        request: &GenerateRequest,
        rng: &mut R,
    ) -> ServiceResult<GenerateResponse> {
        let classification = self.generation_classification()?;
        let generation = generator::generate(request.effective_count(), &classification, rng);
        Ok(GenerateResponse {
            combinations: generation.accepted.iter().map(GeneratedView::from).collect(),
            statistics: GenerationStatistics::from(&generation),
        })
    }

    // ── Comptes ──

    pub fn signup(&self, request: &SignupRequest) -> ServiceResult<UserView> {
        let username = request.username.trim();
        let email = request.email.trim();
        if username.is_empty() || email.is_empty() {
            return Err(ServiceError::BadRequest("tous les champs sont requis".to_string()));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::BadRequest(format!(
                "le mot de passe doit contenir au moins {} caractères",
                MIN_PASSWORD_LEN
            )));
        }

        let hash = hash_password(&request.password)?;
        let id = db::create_user(&self.conn, username, email, &hash)?
            .ok_or(ServiceError::UserExists)?;
        log::info!("Utilisateur {} créé (#{})", username, id);
        Ok(UserView {
            id,
            username: username.to_string(),
            email: email.to_string(),
        })
    }

    pub fn me(&self, authorization: Option<&str>) -> ServiceResult<UserView> {
        let user = self.require_user(authorization)?;
        Ok(UserView {
            id: user.id,
            username: user.username,
            email: user.email,
        })
    }

    pub fn login(&self, request: &LoginRequest) -> ServiceResult<LoginResponse> {
        let user = db::find_user_by_email(&self.conn, request.email.trim())?
            .filter(|u| verify_password(&request.password, &u.password_hash))
            .ok_or(ServiceError::InvalidCredentials)?;

        let token = self
            .auth
            .issue(user.id, &user.username, self.config.token_ttl_seconds as i64)?;
        Ok(LoginResponse {
            token: token.to_string(),
            user: UserView {
                id: user.id,
                username: user.username,
                email: user.email,
            },
        })
    }

    // ── Grilles ──

    /// Identité facultative : sans jeton valide, la grille appartient à la session invitée.
    pub fn save(
        &self,
        authorization: Option<&str>,
        session: &SessionId,
        request: &SaveRequest,
    ) -> ServiceResult<SaveResponse> {
        let numbers = Combination::new(&request.numbers)?;
        if request.draw_number < 1 || request.draw_number > u32::MAX as i64 {
            return Err(ServiceError::BadRequest(format!(
                "numéro de tirage invalide : {}",
                request.draw_number
            )));
        }
        let draw_number = request.draw_number as u32;

        let member = match self.auth.identify(authorization) {
            Some(claim) => {
                let user = db::find_user_by_id(&self.conn, claim.subject_id)?;
                if user.is_none() {
                    log::warn!("Jeton valide pour un utilisateur inconnu #{}", claim.subject_id);
                }
                user
            }
            None => None,
        };
        let owner = match member {
            Some(user) => Owner::Registered(user.id),
            None => Owner::Guest(session.clone()),
        };

        let response = match self.conn.save(&owner, draw_number, &numbers)? {
            SaveOutcome::Saved(id) => SaveResponse {
                saved: true,
                id: Some(id),
                owner,
                message: "Grille sauvegardée".to_string(),
            },
            SaveOutcome::AlreadyExists => {
                log::debug!("Grille {} déjà sauvegardée par {}", numbers, owner);
                SaveResponse {
                    saved: false,
                    id: None,
                    owner,
                    message: "Grille déjà sauvegardée".to_string(),
                }
            }
        };
        Ok(response)
    }

    pub fn my_combinations(
        &self,
        authorization: Option<&str>,
    ) -> ServiceResult<MyCombinationsResponse> {
        let owner = self.require_owner(authorization)?;
        let combinations = self
            .conn
            .list_by_owner(&owner)?
            .into_iter()
            .map(SavedView::from)
            .collect();
        Ok(MyCombinationsResponse { combinations })
    }

    pub fn delete(
        &self,
        authorization: Option<&str>,
        request: &DeleteRequest,
    ) -> ServiceResult<DeleteResponse> {
        let owner = self.require_owner(authorization)?;
        let deleted_count = match request.scope()? {
            DeleteScope::All { draw_number } => self.conn.delete_all(&owner, draw_number)?,
            DeleteScope::Ids(ids) => self.conn.delete_by_ids(&owner, &ids)?,
        };
        log::info!("{} grille(s) supprimée(s) pour {}", deleted_count, owner);
        Ok(DeleteResponse { deleted_count })
    }

    pub fn check_results(
        &self,
        authorization: Option<&str>,
        request: &CheckRequest,
    ) -> ServiceResult<CheckResponse> {
        let owner = self.require_owner(authorization)?;
        let draw = self.find_draw(request.draw_number)?;
        let saved = self.conn.list_for_draw(Some(&owner), request.draw_number)?;
        Ok(check_response(&draw, &saved))
    }

    // ── Rapports ──

    pub fn draw_report(&self, draw_number: u32) -> ServiceResult<DrawReport> {
        let draw = self.find_draw(draw_number)?;
        let saved = self.conn.list_for_draw(None, draw_number)?;

        let combinations: Vec<ReportRow> = saved
            .into_iter()
            .map(|s| {
                let result = evaluate(&s.numbers, &draw);
                ReportRow {
                    id: s.id,
                    is_guest: s.owner.is_guest(),
                    owner: s.owner,
                    numbers: s.numbers,
                    created_at: s.created_at,
                    matched_count: result.matched_count,
                    prize: result.tier,
                }
            })
            .collect();

        let guest_combinations = combinations.iter().filter(|r| r.is_guest).count();
        let mut prizes = TierCounts::default();
        for row in &combinations {
            prizes.add(row.prize);
        }

        Ok(DrawReport {
            draw_number,
            winning_numbers: draw.winning_numbers,
            bonus_number: draw.bonus_number,
            total_combinations: combinations.len(),
            member_combinations: combinations.len() - guest_combinations,
            guest_combinations,
            combinations,
            prizes,
        })
    }

    pub fn owner_summary(&self, owner: &Owner) -> ServiceResult<OwnerSummary> {
        let saved = self.conn.list_by_owner(owner)?;
        let draws = self.draws()?;

        let results: Vec<_> = saved
            .iter()
            .filter_map(|s| {
                prize::find_draw(&draws, s.draw_number)
                    .ok()
                    .map(|draw| evaluate(&s.numbers, draw))
            })
            .collect();

        Ok(OwnerSummary {
            total_combinations: saved.len(),
            evaluated: results.len(),
            wins: prize::tally(&results),
        })
    }

    pub fn my_summary(&self, authorization: Option<&str>) -> ServiceResult<OwnerSummary> {
        let owner = self.require_owner(authorization)?;
        self.owner_summary(&owner)
    }
}
