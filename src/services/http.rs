use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use super::{referrals::ReferralRequest, ServiceError};

mod referrals;

#[derive(Clone)]
struct AppState {
    referral_channel: mpsc::Sender<ReferralRequest>,
}

fn error_response(status: StatusCode, error: &str, details: String) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "error": error,
            "details": details
        })),
    )
}

fn service_error_response(service_error: ServiceError) -> (StatusCode, Json<Value>) {
    match service_error {
        ServiceError::NotFound(_) => error_response(
            StatusCode::NOT_FOUND,
            "Referrer not found",
            service_error.to_string(),
        ),
        ServiceError::Storage(_) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Storage unavailable",
            service_error.to_string(),
        ),
        _ => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            service_error.to_string(),
        ),
    }
}

fn router(referral_channel: mpsc::Sender<ReferralRequest>) -> Router {
    let app_state = AppState { referral_channel };

    Router::new()
        .route("/referrals", get(referrals::list_referrals))
        .route(
            "/referrals/{user_id}",
            post(referrals::issue_token).get(referrals::get_referral),
        )
        .route("/referrals/{user_id}/track", post(referrals::track_referral))
        .route("/referrals/{user_id}/link", get(referrals::referral_link))
        .route("/links/referrer", get(referrals::find_referrer_by_link))
        .route("/tokens/{token}/referrer", get(referrals::find_referrer))
        .route("/tokens/{token}/valid", get(referrals::validate_token))
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    listen: &str,
    referral_channel: mpsc::Sender<ReferralRequest>,
) -> Result<(), anyhow::Error> {
    let app = router(referral_channel);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
