// src/api/webhooks.rs

use actix_web::{HttpRequest, HttpResponse, post, web};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::fmt;
use utoipa::ToSchema;

use crate::{AppState, db};

const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Допустимый возраст подписи; отсекает replay старых доставок.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, PartialEq, Eq)]
pub enum SignatureError {
    MissingHeader,
    MalformedHeader,
    MissingSecret,
    TimestampOutOfTolerance,
    Mismatch,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::MissingHeader => write!(f, "no signature header"),
            SignatureError::MalformedHeader => write!(f, "malformed signature header"),
            SignatureError::MissingSecret => write!(f, "webhook secret not configured"),
            SignatureError::TimestampOutOfTolerance => {
                write!(f, "signature timestamp out of tolerance")
            }
            SignatureError::Mismatch => write!(f, "signature mismatch"),
        }
    }
}

/// Разбирает заголовок вида `t=<unix>,v1=<hex>`.
pub fn parse_signature_header(header: &str) -> Option<(i64, String)> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signature = Some(value.to_string()),
            _ => {} // v0 и прочие схемы игнорируем
        }
    }

    Some((timestamp?, signature?))
}

/// Проверяет подпись провайдера: HMAC-SHA256 от "{t}.{raw body}".
/// Секрет приходит из конфигурации (AppState), не из ambient env,
/// чтобы проверку можно было гонять с фейковым секретом.
pub fn verify_signature(
    secret: &str,
    header: Option<&str>,
    body: &[u8],
    now_unix: i64,
) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }

    let header = header.ok_or(SignatureError::MissingHeader)?;
    let (timestamp, signature_hex) =
        parse_signature_header(header).ok_or(SignatureError::MalformedHeader)?;

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    let expected = hex::decode(signature_hex).map_err(|_| SignatureError::MalformedHeader)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);

    // verify_slice сравнивает за константное время
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// Конверт события. `data` держим сырым Value: чужие виды событий несут
/// объекты произвольной формы, а подтверждать нужно любой из них.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub payment_status: Option<String>,

    /// Авторитетная оплаченная сумма, минорные единицы.
    pub amount_total: Option<i64>,

    #[serde(default)]
    pub metadata: SessionMetadata,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SessionMetadata {
    #[serde(rename = "courseId")]
    pub course_id: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

pub fn parse_session_object(event: &StripeEvent) -> Option<CheckoutSessionObject> {
    serde_json::from_value(event.data.get("object")?.clone()).ok()
}

/// Реконсилиация оплаты. Провайдер ретраит доставку, поэтому обработчик
/// логически идемпотентен: перевод статуса — одностейтментный check-and-set,
/// все сайд-эффекты — идемпотентные flag-set/set-add. Локов нет и не нужно.
#[utoipa::path(
    post,
    path = "/webhook/stripe",
    tag = "webhooks",
    request_body(content = String, content_type = "application/json",
        description = "Raw signed event envelope"),
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 400, description = "Signature rejected or invalid payload"),
        (status = 404, description = "No purchase for this session"),
        (status = 500, description = "Server error, provider will retry")
    )
)]
#[post("/webhook/stripe")]
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    // 1) подпись проверяем до любого парсинга тела
    let header = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());

    if let Err(e) = verify_signature(
        &state.stripe_webhook_secret,
        header,
        &body,
        chrono::Utc::now().timestamp(),
    ) {
        log::warn!("webhook signature rejected: {e}");
        return HttpResponse::BadRequest().body(format!("Webhook Error: {e}"));
    }

    let event: StripeEvent = match serde_json::from_slice(&body) {
        Ok(ev) => ev,
        Err(e) => {
            log::warn!("webhook body parse error: {e}");
            return HttpResponse::BadRequest().body("Webhook Error: invalid payload");
        }
    };

    // 2) интересует только завершённый checkout; остальные виды событий
    //    подтверждаем, чтобы провайдер не ретраил
    if event.event_type != "checkout.session.completed" {
        log::info!("webhook ignored event type={}", event.event_type);
        return HttpResponse::Ok().json(json!({"received": true, "eventType": event.event_type}));
    }

    let Some(session) = parse_session_object(&event) else {
        log::warn!("webhook session object missing or malformed");
        return HttpResponse::BadRequest().body("Webhook Error: invalid payload");
    };

    log::info!(
        "webhook checkout completed session_id={} payment_status={:?} amount_total={:?} metadata course={:?} user={:?}",
        session.id,
        session.payment_status,
        session.amount_total,
        session.metadata.course_id,
        session.metadata.user_id
    );

    // 3) авторитетная сумма приходит в минорных единицах
    let amount = session.amount_total.map(|total| total / 100);

    // 4) атомарный pending -> completed по уникальному session id;
    //    конкурирующие дубли доставки гонятся за одной строкой,
    //    выигрывает ровно одна
    let completed = match db::complete_purchase_if_pending(&state.pool, &session.id, amount).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("complete_purchase_if_pending error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let (purchase_id, user_id, course_id) = match completed {
        Some(row) => row,
        None => {
            // либо строка уже терминальная (ретрай), либо её нет вовсе
            match db::get_purchase_status_by_session(&state.pool, &session.id).await {
                Ok(Some(status)) if status == "completed" || status == "failed" => {
                    return HttpResponse::Ok().json(json!({
                        "received": true,
                        "idempotent": true,
                        "eventType": event.event_type,
                    }));
                }
                Ok(None) => {
                    log::warn!("webhook purchase not found session_id={}", session.id);
                    return HttpResponse::NotFound()
                        .json(json!({"message": "Purchase not found"}));
                }
                Ok(Some(_)) => {
                    // строка была pending, но check-and-set её не взял:
                    // гонка с другим писателем, пусть провайдер ретраит
                    return HttpResponse::InternalServerError().finish();
                }
                Err(e) => {
                    eprintln!("get_purchase_status_by_session error: {e}");
                    return HttpResponse::InternalServerError().finish();
                }
            }
        }
    };

    // 5) глобальная разблокировка лекций курса (идемпотентный flag-set)
    let unlocked = match db::set_lectures_unlocked(&state.pool, course_id).await {
        Ok(n) => n,
        Err(e) => {
            eprintln!("set_lectures_unlocked error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    // 6) курс — в entitlement set пользователя (идемпотентный set-add)
    if let Err(e) = db::add_entitlement(&state.pool, user_id, course_id).await {
        eprintln!("add_entitlement error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    // 7) пользователь — в список студентов курса
    if let Err(e) = db::add_enrolled_student(&state.pool, course_id, user_id).await {
        eprintln!("add_enrolled_student error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    log::info!(
        "purchase reconciled purchase_id={purchase_id} user_id={user_id} course_id={course_id} lectures_unlocked={unlocked}"
    );

    HttpResponse::Ok().json(json!({"received": true, "eventType": event.event_type}))
}
