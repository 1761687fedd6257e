use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::referrals::{LedgerStats, Referral},
    repositories::referrals::{LedgerError, ReferralLedger},
    tokens,
};

pub enum ReferralRequest {
    IssueToken {
        user_id: String,
        response: oneshot::Sender<Result<Referral, ServiceError>>,
    },
    GetReferral {
        user_id: String,
        response: oneshot::Sender<Option<Referral>>,
    },
    TrackReferral {
        referrer_id: String,
        user_id: String,
        response: oneshot::Sender<Result<Referral, ServiceError>>,
    },
    FindReferrer {
        token: String,
        response: oneshot::Sender<Option<String>>,
    },
    ValidateToken {
        token: String,
        response: oneshot::Sender<bool>,
    },
    GetReferralLink {
        user_id: String,
        response: oneshot::Sender<Option<ReferralLink>>,
    },
    FindReferrerByLink {
        link: String,
        response: oneshot::Sender<Option<String>>,
    },
    ListReferrals {
        response: oneshot::Sender<(Vec<Referral>, LedgerStats)>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferralLink {
    pub token: String,
    pub link: String,
}

impl From<LedgerError> for ServiceError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::ReferrerNotFound(id) => ServiceError::NotFound(id),
            LedgerError::StorageUnavailable(e) => ServiceError::Storage(e.to_string()),
            e => ServiceError::Repository("Referrals".to_string(), e.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct ReferralRequestHandler {
    ledger: ReferralLedger,
    signup_url: String,
}

impl ReferralRequestHandler {
    pub fn new(ledger: ReferralLedger, signup_url: String) -> Self {
        Self { ledger, signup_url }
    }

    async fn referral_link(&self, user_id: &str) -> Option<ReferralLink> {
        let referral = self.ledger.get(user_id).await?;
        let link = tokens::referral_link(&self.signup_url, &referral.token);

        Some(ReferralLink {
            token: referral.token,
            link,
        })
    }

    async fn list_referrals(&self) -> (Vec<Referral>, LedgerStats) {
        let referrals = self.ledger.list().await;
        let stats = LedgerStats::from_referrals(&referrals);

        (referrals, stats)
    }

    async fn issue_token(&self, user_id: &str) -> Result<Referral, ServiceError> {
        Ok(self.ledger.upsert(user_id).await?)
    }

    async fn track_referral(
        &self,
        referrer_id: &str,
        user_id: &str,
    ) -> Result<Referral, ServiceError> {
        Ok(self.ledger.track_referral(referrer_id, user_id).await?)
    }
}

#[async_trait]
impl RequestHandler<ReferralRequest> for ReferralRequestHandler {
    async fn handle_request(&self, request: ReferralRequest) {
        match request {
            ReferralRequest::IssueToken { user_id, response } => {
                let referral = self.issue_token(&user_id).await;
                let _ = response.send(referral);
            }
            ReferralRequest::GetReferral { user_id, response } => {
                let referral = self.ledger.get(&user_id).await;
                let _ = response.send(referral);
            }
            ReferralRequest::TrackReferral {
                referrer_id,
                user_id,
                response,
            } => {
                let referral = self.track_referral(&referrer_id, &user_id).await;
                let _ = response.send(referral);
            }
            ReferralRequest::FindReferrer { token, response } => {
                let referrer = self.ledger.find_referrer_by_token(&token).await;
                let _ = response.send(referrer);
            }
            ReferralRequest::ValidateToken { token, response } => {
                let _ = response.send(self.ledger.validate_token_format(&token));
            }
            ReferralRequest::GetReferralLink { user_id, response } => {
                let link = self.referral_link(&user_id).await;
                let _ = response.send(link);
            }
            ReferralRequest::FindReferrerByLink { link, response } => {
                let referrer = self.ledger.find_referrer_by_link(&link).await;
                let _ = response.send(referrer);
            }
            ReferralRequest::ListReferrals { response } => {
                let _ = response.send(self.list_referrals().await);
            }
        }
    }
}

pub struct ReferralService;

impl ReferralService {
    pub fn new() -> Self {
        ReferralService {}
    }
}

#[async_trait]
impl Service<ReferralRequest, ReferralRequestHandler> for ReferralService {}
