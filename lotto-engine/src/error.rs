use thiserror::Error;

use lotto_db::models::ValidationError;

use crate::auth::AuthError;
use crate::prize::PrizeError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Authentification requise : {0}")]
    Unauthorized(#[from] AuthError),
    #[error(transparent)]
    NotFound(#[from] PrizeError),
    #[error("Requête invalide : {0}")]
    BadRequest(String),
    #[error("Numéros invalides : {0}")]
    InvalidNumbers(#[from] ValidationError),
    #[error("Utilisateur déjà existant")]
    UserExists,
    #[error("Email ou mot de passe incorrect")]
    InvalidCredentials,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
