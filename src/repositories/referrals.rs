use std::sync::Arc;

use tokio::sync::RwLock;

use super::storage::{KeyValueStore, StorageError};
use crate::models::referrals::{Referral, ReferralMap};
use crate::tokens;

pub const DEFAULT_LEDGER_KEY: &str = "referral:ledger";
pub const DEFAULT_MAX_TOKEN_ATTEMPTS: u32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Referrer not found: {0}")]
    ReferrerNotFound(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),
    #[error("Stored ledger is malformed: {0}")]
    MalformedLedger(#[source] serde_json::Error),
    #[error("Could not encode ledger: {0}")]
    EncodeLedger(#[source] serde_json::Error),
    #[error("No unused token found after {attempts} attempts")]
    TokenCollision { attempts: u32 },
}

/// Maps referrer ids to their referral records and persists the whole map
/// under one storage key.
///
/// The in-memory map is only replaced after the new map has been written, so
/// a failed write leaves both storage and memory as they were. Writers are
/// serialized by the lock; other processes sharing the store are not
/// coordinated with and the last writer wins.
#[derive(Clone)]
pub struct ReferralLedger {
    store: Arc<dyn KeyValueStore>,
    key: String,
    max_token_attempts: u32,
    token_source: fn(&str) -> String,
    referrals: Arc<RwLock<ReferralMap>>,
}

impl ReferralLedger {
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        max_token_attempts: u32,
    ) -> Result<Self, LedgerError> {
        let key = key.into();
        let referrals = load(store.as_ref(), &key).await?;
        log::info!("Opened referral ledger {} with {} records.", key, referrals.len());

        Ok(Self {
            store,
            key,
            max_token_attempts: max_token_attempts.max(1),
            token_source: tokens::generate,
            referrals: Arc::new(RwLock::new(referrals)),
        })
    }

    /// Returns the record for `user_id`, creating and persisting one with a
    /// fresh token if none exists. An existing record is never reissued.
    pub async fn upsert(&self, user_id: &str) -> Result<Referral, LedgerError> {
        let mut referrals = self.referrals.write().await;

        if let Some(existing) = referrals.get(user_id) {
            return Ok(existing.clone());
        }

        let token = self.issue_token(&referrals, user_id)?;
        let referral = Referral::new(
            user_id.to_string(),
            token,
            chrono::Utc::now().timestamp_millis(),
        );

        let mut updated = referrals.clone();
        updated.insert(user_id.to_string(), referral.clone());
        self.persist(&updated).await?;
        *referrals = updated;

        log::info!("Issued referral token {} to {}.", referral.token, user_id);
        Ok(referral)
    }

    pub async fn get(&self, user_id: &str) -> Option<Referral> {
        self.referrals.read().await.get(user_id).cloned()
    }

    /// Appends `new_user_id` to the referrer's list. Self-referrals and
    /// repeated referrals of the same user are recorded as given.
    pub async fn track_referral(
        &self,
        referrer_id: &str,
        new_user_id: &str,
    ) -> Result<Referral, LedgerError> {
        let mut referrals = self.referrals.write().await;

        let mut referral = referrals
            .get(referrer_id)
            .cloned()
            .ok_or_else(|| LedgerError::ReferrerNotFound(referrer_id.to_string()))?;
        referral.add_referral(new_user_id.to_string());

        let mut updated = referrals.clone();
        updated.insert(referrer_id.to_string(), referral.clone());
        self.persist(&updated).await?;
        *referrals = updated;

        log::info!(
            "Tracked referral of {} by {} ({} total).",
            new_user_id,
            referrer_id,
            referral.total_referrals
        );
        Ok(referral)
    }

    /// Linear scan for the record owning `token`. Malformed tokens are simply
    /// not found.
    pub async fn find_referrer_by_token(&self, token: &str) -> Option<String> {
        if !tokens::is_valid_format(token) {
            return None;
        }

        self.referrals
            .read()
            .await
            .values()
            .find(|referral| referral.token == token)
            .map(|referral| referral.referrer_id.clone())
    }

    /// Resolves the referrer behind a `?ref=<token>` signup link.
    pub async fn find_referrer_by_link(&self, link: &str) -> Option<String> {
        match tokens::token_from_link(link) {
            Some(token) => self.find_referrer_by_token(token).await,
            None => None,
        }
    }

    /// Every record, ordered by referrer id.
    pub async fn list(&self) -> Vec<Referral> {
        self.referrals.read().await.values().cloned().collect()
    }

    pub fn validate_token_format(&self, token: &str) -> bool {
        tokens::is_valid_format(token)
    }

    fn issue_token(&self, referrals: &ReferralMap, user_id: &str) -> Result<String, LedgerError> {
        for _ in 0..self.max_token_attempts {
            let token = (self.token_source)(user_id);

            if referrals.values().all(|referral| referral.token != token) {
                return Ok(token);
            }

            log::warn!("Generated token {} is already issued, retrying.", token);
        }

        Err(LedgerError::TokenCollision {
            attempts: self.max_token_attempts,
        })
    }

    async fn persist(&self, referrals: &ReferralMap) -> Result<(), LedgerError> {
        let blob = serde_json::to_string(referrals).map_err(LedgerError::EncodeLedger)?;

        self.store.write(&self.key, blob).await.map_err(|e| {
            log::error!("Could not persist referral ledger {}: {}", self.key, e);
            LedgerError::from(e)
        })
    }

    #[cfg(test)]
    fn with_token_source(mut self, token_source: fn(&str) -> String) -> Self {
        self.token_source = token_source;
        self
    }
}

async fn load(store: &dyn KeyValueStore, key: &str) -> Result<ReferralMap, LedgerError> {
    let blob = match store.read(key).await? {
        Some(blob) => blob,
        None => return Ok(ReferralMap::new()),
    };

    let mut referrals: ReferralMap =
        serde_json::from_str(&blob).map_err(LedgerError::MalformedLedger)?;
    for (referrer_id, referral) in referrals.iter_mut() {
        if referral.repair_total() {
            log::warn!(
                "Repaired referral count for {} to {}.",
                referrer_id,
                referral.total_referrals
            );
        }
    }

    Ok(referrals)
}
