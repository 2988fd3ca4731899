use serde_json::{json, Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::config::{Config, BREAK_GLASS_ACCOUNT_ID};
use crate::gateway::Gateway;
use crate::model::{record_id, str_field, AuthSlot, Identity};
use crate::store::{RecordStore, StoreError};

/// Map an opaque bearer token plus the slot it arrived on to an identity.
///
/// The document store is authoritative when reachable: a match there wins
/// outright. On unavailability or a miss, the file store collection for
/// the slot's role is scanned linearly. Read-only; logout is a separate
/// gateway update.
pub fn resolve(
    gateway: &Gateway,
    config: &Config,
    token: &str,
    slot: AuthSlot,
) -> Result<Identity, StoreError> {
    if token.is_empty() {
        return Err(StoreError::InvalidToken);
    }

    if slot == AuthSlot::Admin && token == config.break_glass.token {
        return Ok(break_glass_identity(config));
    }

    let role = slot.role();
    let filter = [("token".to_string(), token.to_string())];

    if let Some(doc) = gateway.document() {
        match doc.find_one(role.collection(), &filter) {
            Ok(Some(account)) => return Ok(identity_of(&account, slot)),
            Ok(None) => {}
            Err(StoreError::Unavailable(detail)) => {
                warn!(role = role.as_str(), %detail, "document store token lookup failed; scanning fallback");
            }
            Err(e) => return Err(e),
        }
    }

    match gateway.file().find_one(role.collection(), &filter)? {
        Some(account) => Ok(identity_of(&account, slot)),
        None => Err(StoreError::InvalidToken),
    }
}

#[derive(Debug, Clone)]
pub struct Login {
    pub token: String,
    pub identity: Identity,
}

/// Credential login for a role slot. Issues a fresh token and stores it on
/// the account through the gateway, which syncs the twin copy when the
/// record lives in both stores; the previous token is silently overwritten
/// and thereby invalidated.
pub fn login(
    gateway: &Gateway,
    config: &Config,
    slot: AuthSlot,
    login_id: &str,
    password: &str,
) -> Result<Login, StoreError> {
    if slot == AuthSlot::Admin
        && login_id == config.break_glass.admin_id
        && credentials_match(password, &config.break_glass.secret)
    {
        // The break-glass token is static and never stored on a record.
        return Ok(Login {
            token: config.break_glass.token.clone(),
            identity: break_glass_identity(config),
        });
    }

    let role = slot.role();
    let filter = [(role.login_id_field().to_string(), login_id.to_string())];
    let Some(account) = gateway.find_one(role.collection(), &filter)? else {
        return Err(StoreError::InvalidToken);
    };

    let stored = str_field(&account, "password").unwrap_or("");
    if !credentials_match(password, stored) {
        return Err(StoreError::InvalidToken);
    }

    let Some(account_id) = record_id(&account) else {
        return Err(StoreError::InvalidToken);
    };

    let token = Uuid::new_v4().to_string();
    let mut patch = Map::new();
    patch.insert("token".to_string(), json!(token));
    gateway.update(role.collection(), account_id, &patch)?;

    Ok(Login {
        token,
        identity: identity_of(&account, slot),
    })
}

/// Null the token wherever the account is held, so it cannot survive in a
/// store the update missed.
pub fn logout(
    gateway: &Gateway,
    config: &Config,
    token: &str,
    slot: AuthSlot,
) -> Result<(), StoreError> {
    let identity = resolve(gateway, config, token, slot)?;
    if identity.id == BREAK_GLASS_ACCOUNT_ID {
        // Nothing is stored for the break-glass identity.
        return Ok(());
    }
    let mut patch = Map::new();
    patch.insert("token".to_string(), Value::Null);
    gateway.update(slot.role().collection(), &identity.id, &patch)?;
    Ok(())
}

/// Plaintext comparison. Hashing is a product decision tracked in
/// DESIGN.md; when it lands, it lands here.
fn credentials_match(given: &str, stored: &str) -> bool {
    !stored.is_empty() && given == stored
}

fn identity_of(account: &Value, slot: AuthSlot) -> Identity {
    Identity {
        id: record_id(account).unwrap_or_default().to_string(),
        role: slot.role(),
        name: str_field(account, "name").unwrap_or_default().to_string(),
    }
}

fn break_glass_identity(config: &Config) -> Identity {
    Identity {
        id: BREAK_GLASS_ACCOUNT_ID.to_string(),
        role: AuthSlot::Admin.role(),
        name: config.break_glass.name.clone(),
    }
}
