use std::fs;
use std::io;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::EpochSeconds;
use crate::{Error, StorageAction, targets};

pub const ID_TOKEN_ENV: &str = "FARMPLOT_ID_TOKEN";

/// Where id tokens come from. Read at startup and again whenever the
/// current token is close to expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Env(String),
    /// Raw token kept up to date by an external sign-in helper.
    File(PathBuf),
}

impl Default for TokenSource {
    fn default() -> Self {
        TokenSource::Env(ID_TOKEN_ENV.to_string())
    }
}

impl TokenSource {
    /// `None` when no token is available; blank values count as missing.
    pub fn read(&self) -> Result<Option<String>, Error> {
        let raw = match self {
            TokenSource::Env(name) => std::env::var(name).ok(),
            TokenSource::File(path) => match fs::read_to_string(path) {
                Ok(contents) => Some(contents),
                Err(error) if error.kind() == io::ErrorKind::NotFound => None,
                Err(source) => {
                    return Err(Error::StorageIo {
                        action: StorageAction::Load,
                        path: Some(path.display().to_string()),
                        source,
                    });
                }
            },
        };
        Ok(raw
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct IdTokenClaims {
    #[serde(rename = "cognito:groups", default)]
    groups: Vec<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    exp: Option<EpochSeconds>,
}

/// Signed-in identity, passed explicitly to whatever needs it. Refreshing
/// produces a new value instead of mutating this one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    id_token: Option<String>,
    groups: Vec<String>,
    email: Option<String>,
    phone_number: Option<String>,
    expires_at: Option<EpochSeconds>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Reads the claims of a JWT id token. The signature is not checked; the
    /// token comes straight from the identity provider.
    pub fn from_id_token(token: &str, now: EpochSeconds) -> Result<Self, Error> {
        let token = token.trim();
        let payload = token
            .split('.')
            .nth(1)
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| Error::InvalidToken {
                details: "token has no payload segment".to_string(),
            })?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|error| Error::InvalidToken {
                details: format!("payload is not base64url: {error}"),
            })?;
        let payload: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|error| Error::InvalidToken {
                details: format!("payload is not JSON: {error}"),
            })?;
        if !payload.is_object() {
            return Err(Error::InvalidToken {
                details: "payload is not a claims object".to_string(),
            });
        }
        let claims: IdTokenClaims =
            serde_json::from_value(payload).map_err(|error| Error::InvalidToken {
                details: format!("claims have the wrong shape: {error}"),
            })?;

        let session = Self {
            id_token: Some(token.to_string()),
            groups: claims.groups,
            email: claims.email,
            phone_number: claims.phone_number,
            expires_at: claims.exp,
        };

        if session.is_expired(now) {
            warn!(
                target: targets::SESSION,
                expires_at = session.expires_at,
                now,
                "Id token already expired"
            );
        } else {
            debug!(
                target: targets::SESSION,
                groups = ?session.groups,
                expires_at = session.expires_at,
                "Session established"
            );
        }
        Ok(session)
    }

    /// New session from a refreshed token; `self` is left as it was.
    pub fn refreshed(&self, token: &str, now: EpochSeconds) -> Result<Self, Error> {
        let next = Self::from_id_token(token, now)?;
        debug!(
            target: targets::SESSION,
            previous_expiry = self.expires_at,
            expires_at = next.expires_at,
            "Session refreshed"
        );
        Ok(next)
    }

    /// Picks up a newer token from `source`. `Ok(None)` when the source still
    /// holds the current token, holds nothing, or holds one that has expired.
    pub fn refresh_from(
        &self,
        source: &TokenSource,
        now: EpochSeconds,
    ) -> Result<Option<Self>, Error> {
        let Some(token) = source.read()? else {
            return Ok(None);
        };
        if self.bearer_token() == Some(token.as_str()) {
            return Ok(None);
        }
        let next = self.refreshed(&token, now)?;
        if next.is_expired(now) {
            return Ok(None);
        }
        Ok(Some(next))
    }

    pub fn is_authenticated(&self) -> bool {
        self.id_token.is_some()
    }

    /// Tokens without an `exp` claim never expire.
    pub fn is_expired(&self, now: EpochSeconds) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn needs_refresh(&self, now: EpochSeconds, skew_seconds: EpochSeconds) -> bool {
        self.is_authenticated() && self.is_expired(now.saturating_add(skew_seconds))
    }

    pub fn has_any_group(&self, allowed: &[String]) -> bool {
        self.groups.iter().any(|group| allowed.contains(group))
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    pub fn expires_at(&self) -> Option<EpochSeconds> {
        self.expires_at
    }
}
