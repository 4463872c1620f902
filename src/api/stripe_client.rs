// src/api/stripe_client.rs
//
// Минимальный клиент для Stripe Checkout (https://api.stripe.com)
// Авторизация: Bearer secret key. Stripe принимает form-encoded тело,
// вложенные поля кодируются скобками: line_items[0][price_data][...].

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

const STRIPE_API_BASE: &str = "https://api.stripe.com";

// Создание сессии должно падать быстро, если провайдер недоступен:
// пользователь ждёт redirect-URL интерактивно.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum StripeError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    InvalidResponse(String),
}

impl fmt::Display for StripeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StripeError::Http(e) => write!(f, "http error: {e}"),
            StripeError::Api { status, body } => {
                write!(f, "stripe api error status={status} body={body}")
            }
            StripeError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
        }
    }
}

impl From<reqwest::Error> for StripeError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[derive(Debug)]
pub struct CreateCheckoutSessionRequest {
    pub course_title: String,
    pub course_description: Option<String>,
    pub currency: String,

    /// Минорные единицы (рубли/рупии * 100), как требует Stripe.
    pub unit_amount: i64,

    pub success_url: String,
    pub cancel_url: String,

    /// Уходят в metadata сессии и возвращаются в вебхуке.
    pub course_id: i32,
    pub user_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionResponse {
    pub id: String,
    pub url: Option<String>,
}

pub async fn create_checkout_session(
    stripe_api_key: &str,
    req: CreateCheckoutSessionRequest,
) -> Result<CheckoutSessionResponse, StripeError> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

    let mut form: Vec<(&str, String)> = vec![
        ("mode", "payment".to_string()),
        ("payment_method_types[0]", "card".to_string()),
        ("line_items[0][quantity]", "1".to_string()),
        ("line_items[0][price_data][currency]", req.currency.clone()),
        (
            "line_items[0][price_data][unit_amount]",
            req.unit_amount.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            req.course_title.clone(),
        ),
        ("success_url", req.success_url.clone()),
        ("cancel_url", req.cancel_url.clone()),
        ("metadata[courseId]", req.course_id.to_string()),
        ("metadata[userId]", req.user_id.to_string()),
    ];

    if let Some(description) = &req.course_description {
        form.push((
            "line_items[0][price_data][product_data][description]",
            description.clone(),
        ));
    }

    let resp = client
        .post(format!("{STRIPE_API_BASE}/v1/checkout/sessions"))
        .bearer_auth(stripe_api_key)
        .form(&form)
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(StripeError::Api {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str::<CheckoutSessionResponse>(&body)
        .map_err(|e| StripeError::InvalidResponse(format!("{e}; body={body}")))
}
