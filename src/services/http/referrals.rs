use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use super::{error_response, service_error_response, AppState};
use crate::models::referrals::TrackReferral;
use crate::services::{referrals::ReferralRequest, ServiceError};

type Response = (StatusCode, Json<Value>);

async fn dispatch<T>(
    state: &AppState,
    request: ReferralRequest,
    response: oneshot::Receiver<T>,
) -> Result<T, Response> {
    if let Err(e) = state.referral_channel.send(request).await {
        return Err(service_error_response(ServiceError::Communication(
            "Referrals".to_string(),
            e.to_string(),
        )));
    }

    response.await.map_err(|e| {
        service_error_response(ServiceError::Communication(
            "Referrals".to_string(),
            e.to_string(),
        ))
    })
}

pub async fn issue_token(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    let (response, rx) = oneshot::channel();
    let request = ReferralRequest::IssueToken { user_id, response };

    match dispatch(&state, request, rx).await {
        Ok(Ok(referral)) => (StatusCode::OK, Json(json!(referral))),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(response) => response,
    }
}

pub async fn get_referral(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    let (response, rx) = oneshot::channel();
    let request = ReferralRequest::GetReferral {
        user_id: user_id.clone(),
        response,
    };

    match dispatch(&state, request, rx).await {
        Ok(Some(referral)) => (StatusCode::OK, Json(json!(referral))),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "Referrer not found",
            format!("No referral record for {}", user_id),
        ),
        Err(response) => response,
    }
}

pub async fn track_referral(
    State(state): State<AppState>,
    Path(referrer_id): Path<String>,
    Json(req): Json<TrackReferral>,
) -> Response {
    let (response, rx) = oneshot::channel();
    let request = ReferralRequest::TrackReferral {
        referrer_id,
        user_id: req.user_id,
        response,
    };

    match dispatch(&state, request, rx).await {
        Ok(Ok(referral)) => (StatusCode::OK, Json(json!(referral))),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(response) => response,
    }
}

pub async fn find_referrer(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    let (response, rx) = oneshot::channel();
    let request = ReferralRequest::FindReferrer {
        token: token.clone(),
        response,
    };

    match dispatch(&state, request, rx).await {
        Ok(Some(referrer_id)) => (
            StatusCode::OK,
            Json(json!({
                "token": token,
                "referrerId": referrer_id
            })),
        ),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "Referrer not found",
            format!("No referrer owns {}", token),
        ),
        Err(response) => response,
    }
}

pub async fn validate_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    let (response, rx) = oneshot::channel();
    let request = ReferralRequest::ValidateToken {
        token: token.clone(),
        response,
    };

    match dispatch(&state, request, rx).await {
        Ok(valid) => (
            StatusCode::OK,
            Json(json!({
                "token": token,
                "valid": valid
            })),
        ),
        Err(response) => response,
    }
}

#[derive(Deserialize)]
pub struct LinkQuery {
    link: String,
}

pub async fn list_referrals(State(state): State<AppState>) -> Response {
    let (response, rx) = oneshot::channel();
    let request = ReferralRequest::ListReferrals { response };

    match dispatch(&state, request, rx).await {
        Ok((referrals, stats)) => (
            StatusCode::OK,
            Json(json!({
                "stats": stats,
                "referrals": referrals
            })),
        ),
        Err(response) => response,
    }
}

pub async fn referral_link(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    let (response, rx) = oneshot::channel();
    let request = ReferralRequest::GetReferralLink {
        user_id: user_id.clone(),
        response,
    };

    match dispatch(&state, request, rx).await {
        Ok(Some(link)) => (
            StatusCode::OK,
            Json(json!({
                "token": link.token,
                "link": link.link
            })),
        ),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "Referrer not found",
            format!("No referral record for {}", user_id),
        ),
        Err(response) => response,
    }
}

pub async fn find_referrer_by_link(
    State(state): State<AppState>,
    Query(query): Query<LinkQuery>,
) -> Response {
    let (response, rx) = oneshot::channel();
    let request = ReferralRequest::FindReferrerByLink {
        link: query.link.clone(),
        response,
    };

    match dispatch(&state, request, rx).await {
        Ok(Some(referrer_id)) => (
            StatusCode::OK,
            Json(json!({
                "link": query.link,
                "referrerId": referrer_id
            })),
        ),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "Referrer not found",
            format!("No referrer owns {}", query.link),
        ),
        Err(response) => response,
    }
}
