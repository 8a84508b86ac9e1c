use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::repository::PaymentGateway;
use crate::domain::types::{CheckoutRequest, CheckoutSession, PaymentSession};
use crate::error::LmsError;

/// Stripe-compatible hosted checkout API.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    pub client: reqwest::Client,
    pub api_url: String,
    pub api_key: String,
}

#[derive(Serialize)]
struct CheckoutForm<'a> {
    mode: &'static str,
    success_url: &'a str,
    cancel_url: &'a str,
    line_items: Vec<LineItem<'a>>,
    metadata: Metadata,
}

#[derive(Serialize)]
struct LineItem<'a> {
    quantity: u32,
    price_data: PriceData<'a>,
}

#[derive(Serialize)]
struct PriceData<'a> {
    currency: &'a str,
    /// Smallest currency unit.
    unit_amount: i64,
    product_data: ProductData<'a>,
}

#[derive(Serialize)]
struct ProductData<'a> {
    name: &'a str,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    course_id: Option<String>,
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Deserialize)]
struct SessionBody {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

fn gateway_error(e: reqwest::Error) -> LmsError {
    tracing::warn!(error = %e, "payment gateway request failed");
    LmsError::ExternalService("payment")
}

/// Price in the currency's smallest unit.
fn minor_units(amount: i64) -> Option<i64> {
    amount.checked_mul(100)
}

impl HttpPaymentGateway {
    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.api_url.trim_end_matches('/'))
    }
}

impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, LmsError> {
        let unit_amount = minor_units(request.amount)
            .ok_or_else(|| LmsError::validation("price is out of range"))?;
        let form = CheckoutForm {
            mode: "payment",
            success_url: &request.success_url,
            cancel_url: &request.cancel_url,
            line_items: vec![LineItem {
                quantity: 1,
                price_data: PriceData {
                    currency: &request.currency,
                    unit_amount,
                    product_data: ProductData {
                        name: &request.description,
                    },
                },
            }],
            metadata: Metadata {
                user_id: Some(request.user_id.to_string()),
                course_id: Some(request.course_id.to_string()),
                tenant_id: Some(request.tenant.clone()),
            },
        };
        let body = serde_qs::to_string(&form).map_err(|e| {
            tracing::error!(error = %e, "failed to encode checkout form");
            LmsError::ExternalService("payment")
        })?;

        let session: SessionBody = self
            .client
            .post(self.sessions_url())
            .bearer_auth(&self.api_key)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(gateway_error)?
            .json()
            .await
            .map_err(gateway_error)?;

        let url = session.url.ok_or_else(|| {
            tracing::warn!(session_id = %session.id, "checkout session has no url");
            LmsError::ExternalService("payment")
        })?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn fetch_session(&self, session_id: &str) -> Result<PaymentSession, LmsError> {
        let session: SessionBody = self
            .client
            .get(format!("{}/{session_id}", self.sessions_url()))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(gateway_error)?
            .json()
            .await
            .map_err(gateway_error)?;

        let parse = |v: Option<String>| v.and_then(|s| Uuid::parse_str(&s).ok());
        Ok(PaymentSession {
            id: session.id,
            paid: session.payment_status.as_deref() == Some("paid"),
            user_id: parse(session.metadata.user_id),
            course_id: parse(session.metadata.course_id),
            tenant: session.metadata.tenant_id,
        })
    }
}
