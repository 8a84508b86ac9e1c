use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ednova_auth_types::identity::SessionUser;

use crate::error::LmsError;
use crate::handlers::caller;
use crate::state::{AppState, Tenant};
use crate::usecase::payment::{CheckoutUseCase, VerifyPurchaseUseCase};

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub course_id: Uuid,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

/// POST /payments/checkout
pub async fn checkout(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, LmsError> {
    let usecase = CheckoutUseCase {
        courses: tenant.courses(),
        purchases: tenant.purchases(),
        gateway: state.payment_gateway(),
        front_url: state.front_url.clone(),
        currency: state.payment_currency.clone(),
        tenant: tenant.name().clone(),
    };
    let checkout = usecase.execute(caller(&session), body.course_id).await?;
    Ok(Json(CheckoutResponse {
        session_id: checkout.id,
        url: checkout.url,
    }))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub course_id: Uuid,
    pub session_id: String,
}

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub purchase_id: Uuid,
    pub course_id: Uuid,
    #[serde(serialize_with = "ednova_core::serde::to_rfc3339_ms")]
    pub purchase_date: DateTime<Utc>,
    #[serde(serialize_with = "ednova_core::serde::to_rfc3339_ms")]
    pub expiration_date: DateTime<Utc>,
    pub newly_recorded: bool,
}

/// POST /payments/verify
///
/// Safe to repeat: a session that was already recorded is reported with
/// `newly_recorded: false` and is not stored twice.
pub async fn verify(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<PurchaseResponse>, LmsError> {
    let usecase = VerifyPurchaseUseCase {
        courses: tenant.courses(),
        users: tenant.users(),
        purchases: tenant.purchases(),
        progress: tenant.progress(),
        gateway: state.payment_gateway(),
        mail: state.mail_sender(),
        tenant: tenant.name().clone(),
    };
    let outcome = usecase
        .execute(caller(&session), body.course_id, body.session_id.trim())
        .await?;
    let purchase = outcome.purchase;
    Ok(Json(PurchaseResponse {
        purchase_id: purchase.id,
        course_id: purchase.course_id,
        purchase_date: purchase.purchase_date,
        expiration_date: purchase.expiration_date,
        newly_recorded: outcome.newly_recorded,
    }))
}
