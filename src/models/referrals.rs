use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A referrer's token together with everyone it has brought in.
///
/// Serializes to the persisted layout: `nonce` carries the token, `referrals`
/// the referred ids, and `totalReferrals` a cached count of them.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    #[serde(rename = "nonce")]
    pub token: String,
    pub referrer_id: String,
    #[serde(rename = "referrals")]
    pub referred_ids: Vec<String>,
    pub total_referrals: usize,
    pub created_at: i64,
}

impl Referral {
    pub fn new(referrer_id: String, token: String, created_at: i64) -> Self {
        Self {
            token,
            referrer_id,
            referred_ids: Vec::new(),
            total_referrals: 0,
            created_at,
        }
    }

    pub fn add_referral(&mut self, user_id: String) {
        self.referred_ids.push(user_id);
        self.total_referrals = self.referred_ids.len();
    }

    /// Re-syncs the cached count. Returns true when it had drifted.
    pub fn repair_total(&mut self) -> bool {
        if self.total_referrals == self.referred_ids.len() {
            return false;
        }

        self.total_referrals = self.referred_ids.len();
        true
    }
}

/// The whole ledger as stored under a single key, keyed by referrer id.
pub type ReferralMap = BTreeMap<String, Referral>;

/// Ledger-wide counters: how many referrers hold a token and how many
/// referrals they have tracked between them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    pub referrers: usize,
    pub total_referrals: usize,
}

impl LedgerStats {
    pub fn from_referrals<'a>(referrals: impl IntoIterator<Item = &'a Referral>) -> Self {
        referrals
            .into_iter()
            .fold(Self::default(), |stats, referral| Self {
                referrers: stats.referrers + 1,
                total_referrals: stats.total_referrals + referral.total_referrals,
            })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrackReferral {
    pub user_id: String,
}
