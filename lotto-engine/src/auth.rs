//! Jetons signés compacts `header.payload.signature` (base64url sans padding, HMAC-SHA256).
//!
//! L'algorithme est fixé côté service : l'en-tête reçu n'est jamais décodé ni
//! interprété, seule la signature recalculée sur les octets reçus fait foi.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use lotto_db::models::UserId;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "HS256";
const HEADER_JSON: &str = r#"{"typ":"JWT","alg":"HS256"}"#;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Jeton absent")]
    MissingToken,
    #[error("Jeton mal formé")]
    Malformed,
    #[error("Signature invalide")]
    BadSignature,
    #[error("Contenu du jeton illisible")]
    BadPayload,
    #[error("Jeton expiré depuis {expires_at}")]
    Expired { expires_at: i64 },
    #[error("Clé de signature vide")]
    EmptySecret,
    #[error("Utilisateur du jeton inconnu")]
    UnknownUser,
    #[error("Durée de validité invalide : {0} s")]
    InvalidTtl(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    #[serde(rename = "user_id")]
    pub subject_id: UserId,
    #[serde(rename = "username")]
    pub display_name: String,
    #[serde(rename = "iat", default)]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

/// Les trois segments encodés, tels que reçus ou émis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    header: String,
    payload: String,
    signature: String,
}

impl Token {
    fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }
}

impl FromStr for Token {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        match parts.as_slice() {
            [header, payload, signature]
                if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
            {
                Ok(Token {
                    header: header.to_string(),
                    payload: payload.to_string(),
                    signature: signature.to_string(),
                })
            }
            _ => Err(AuthError::Malformed),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.header, self.payload, self.signature)
    }
}

/// Extrait le jeton d'une valeur `Authorization: Bearer <jeton>`.
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Clone)]
pub struct TokenAuth {
    secret: Vec<u8>,
}

impl fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuth").field("algorithm", &ALGORITHM).finish_non_exhaustive()
    }
}

impl TokenAuth {
    pub fn new(secret: &[u8]) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    fn sign(&self, input: &str) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::EmptySecret)?;
        mac.update(input.as_bytes());
        Ok(mac)
    }

    pub fn issue(
        &self,
        subject_id: UserId,
        display_name: &str,
        ttl_seconds: i64,
    ) -> Result<Token, AuthError> {
        self.issue_at(subject_id, display_name, ttl_seconds, now())
    }

    pub fn issue_at(
        &self,
        subject_id: UserId,
        display_name: &str,
        ttl_seconds: i64,
        issued_at: i64,
    ) -> Result<Token, AuthError> {
        if ttl_seconds <= 0 {
            return Err(AuthError::InvalidTtl(ttl_seconds));
        }
        let expires_at = issued_at
            .checked_add(ttl_seconds)
            .ok_or(AuthError::InvalidTtl(ttl_seconds))?;
        let claim = IdentityClaim {
            subject_id,
            display_name: display_name.to_string(),
            issued_at,
            expires_at,
        };
        let payload_json = serde_json::to_vec(&claim).map_err(|_| AuthError::BadPayload)?;

        let mut token = Token {
            header: URL_SAFE_NO_PAD.encode(HEADER_JSON),
            payload: URL_SAFE_NO_PAD.encode(payload_json),
            signature: String::new(),
        };
        let mac = self.sign(&token.signing_input())?;
        token.signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<IdentityClaim, AuthError> {
        self.verify_at(token, now())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Result<IdentityClaim, AuthError> {
        let token: Token = token.parse()?;

        let signature = URL_SAFE_NO_PAD
            .decode(&token.signature)
            .map_err(|_| AuthError::BadSignature)?;
        self.sign(&token.signing_input())?
            .verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(&token.payload)
            .map_err(|_| AuthError::BadPayload)?;
        let claim: IdentityClaim =
            serde_json::from_slice(&payload).map_err(|_| AuthError::BadPayload)?;

        if now >= claim.expires_at {
            return Err(AuthError::Expired {
                expires_at: claim.expires_at,
            });
        }
        Ok(claim)
    }

    /// Mode invité : absence de jeton ou jeton rejeté donnent `None`.
    pub fn identify(&self, authorization: Option<&str>) -> Option<IdentityClaim> {
        match self.require(authorization) {
            Ok(claim) => Some(claim),
            Err(AuthError::MissingToken) => None,
            Err(e) => {
                log::debug!("Jeton ignoré, requête traitée en invité : {}", e);
                None
            }
        }
    }

    pub fn require(&self, authorization: Option<&str>) -> Result<IdentityClaim, AuthError> {
        let header = authorization.ok_or(AuthError::MissingToken)?;
        let token = bearer_token(header).ok_or(AuthError::Malformed)?;
        self.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000;

    fn auth() -> TokenAuth {
        TokenAuth::new(b"test-secret").unwrap()
    }

    fn issue() -> String {
        auth().issue_at(UserId(42), "alice", 3600, T0).unwrap().to_string()
    }

    fn replace_char(s: &str, idx: usize, c: char) -> String {
        s.chars().enumerate().map(|(i, x)| if i == idx { c } else { x }).collect()
    }

    fn other_char(c: char) -> char {
        if c == 'A' { 'B' } else { 'A' }
    }

    #[test]
    fn test_roundtrip() {
        let claim = auth().verify_at(&issue(), T0 + 10).unwrap();
        assert_eq!(claim.subject_id, UserId(42));
        assert_eq!(claim.display_name, "alice");
        assert_eq!(claim.issued_at, T0);
        assert_eq!(claim.expires_at, T0 + 3600);
    }

    #[test]
    fn test_structure() {
        let token = issue();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| !p.contains('=') && !p.contains('+') && !p.contains('/')));
        let header = URL_SAFE_NO_PAD.decode(parts[0]).unwrap();
        assert_eq!(header, HEADER_JSON.as_bytes());
        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(payload["user_id"], 42);
        assert_eq!(payload["username"], "alice");
        assert_eq!(payload["exp"], T0 + 3600);
    }

    #[test]
    fn test_expiry_boundary() {
        let token = issue();
        assert!(auth().verify_at(&token, T0 + 3599).is_ok());
        assert_eq!(
            auth().verify_at(&token, T0 + 3600),
            Err(AuthError::Expired { expires_at: T0 + 3600 })
        );
        assert!(auth().verify_at(&token, T0 + 100_000).is_err());
    }

    #[test]
    fn test_tampered_payload() {
        let token = issue();
        let payload_start = token.find('.').unwrap() + 1;
        let payload_end = token.rfind('.').unwrap();
        for idx in payload_start..payload_end {
            let c = token.chars().nth(idx).unwrap();
            let tampered = replace_char(&token, idx, other_char(c));
            assert!(auth().verify_at(&tampered, T0).is_err(), "position {}", idx);
        }
    }

    #[test]
    fn test_tampered_signature() {
        let token = issue();
        let sig_start = token.rfind('.').unwrap() + 1;
        for idx in sig_start..token.len() {
            let c = token.chars().nth(idx).unwrap();
            let tampered = replace_char(&token, idx, other_char(c));
            assert_eq!(
                auth().verify_at(&tampered, T0),
                Err(AuthError::BadSignature),
                "position {}",
                idx
            );
        }
    }

    #[test]
    fn test_forged_payload_rejected() {
        let token = issue();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claim =
            URL_SAFE_NO_PAD.encode(r#"{"user_id":1,"username":"admin","exp":9999999999}"#);
        let forged = format!("{}.{}.{}", parts[0], forged_claim, parts[2]);
        assert_eq!(auth().verify_at(&forged, T0), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_algorithm_not_negotiable() {
        let token = issue();
        let parts: Vec<&str> = token.split('.').collect();
        let none_header = URL_SAFE_NO_PAD.encode(r#"{"typ":"JWT","alg":"none"}"#);
        let stripped = format!("{}.{}.", none_header, parts[1]);
        assert_eq!(auth().verify_at(&stripped, T0), Err(AuthError::Malformed));
        let swapped = format!("{}.{}.{}", none_header, parts[1], parts[2]);
        assert_eq!(auth().verify_at(&swapped, T0), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_wrong_secret() {
        let other = TokenAuth::new(b"other-secret").unwrap();
        assert_eq!(other.verify_at(&issue(), T0), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_malformed() {
        for bad in ["", "abc", "a.b", "a.b.c.d", "..", "a..c"] {
            assert_eq!(auth().verify_at(bad, T0), Err(AuthError::Malformed), "{:?}", bad);
        }
    }

    #[test]
    fn test_ttl_must_be_positive() {
        let auth = auth();
        for ttl in [0, -60] {
            assert_eq!(
                auth.issue_at(UserId(1), "a", ttl, T0).unwrap_err(),
                AuthError::InvalidTtl(ttl)
            );
        }
    }

    #[test]
    fn test_ttl_overflow_rejected() {
        let auth = auth();
        assert_eq!(
            auth.issue_at(UserId(1), "a", i64::MAX, T0).unwrap_err(),
            AuthError::InvalidTtl(i64::MAX)
        );
        assert!(auth.issue(UserId(1), "a", i64::MAX).is_err());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(TokenAuth::new(b"").unwrap_err(), AuthError::EmptySecret);
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer  abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }

    #[test]
    fn test_identify_guest() {
        let auth = auth();
        assert_eq!(auth.identify(None), None);
        assert_eq!(auth.identify(Some("Bearer garbage")), None);
        assert_eq!(auth.require(None), Err(AuthError::MissingToken));

        let token = auth.issue(UserId(7), "bob", 60).unwrap();
        let claim = auth.identify(Some(&format!("Bearer {}", token))).unwrap();
        assert_eq!(claim.subject_id, UserId(7));
    }
}
