// src/api/purchases.rs

use actix_web::{HttpResponse, Responder, get, web};
use serde::Deserialize;
use serde_json::json;

use crate::{AppState, access, db};

#[derive(Debug, Deserialize)]
pub struct PaymentStatusQuery {
    pub session_id: Option<String>,
}

/// Поллинг статуса оплаты после redirect'а: серверное состояние может
/// отставать от провайдера, клиент опрашивает до терминального статуса.
#[get("/checkout/status")]
pub async fn check_payment_status(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
    query: web::Query<PaymentStatusQuery>,
) -> impl Responder {
    let Some(session_id) = query.session_id.as_deref() else {
        return HttpResponse::BadRequest().json(json!({"message": "Session ID is required"}));
    };

    match db::get_purchase_for_user_by_session(&state.pool, session_id, *user_id).await {
        Ok(Some(purchase)) => HttpResponse::Ok().json(json!({
            "success": true,
            "status": purchase.status,
            "purchase": {
                "id": purchase.id,
                "courseId": purchase.course_id,
                "amount": purchase.amount,
                "createdAt": purchase.created_at,
            }
        })),
        Ok(None) => HttpResponse::NotFound().json(json!({"message": "Purchase not found"})),
        Err(e) => {
            eprintln!("get_purchase_for_user_by_session error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AccessStatusQuery {
    /// Клиентская подсказка из localStorage; UX-мостик, не граница доверия.
    pub hint: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/course/{course_id}/access-status",
    tag = "purchases",
    params(
        ("course_id" = i32, Path, description = "Course id"),
        ("hint" = Option<bool>, Query, description = "Client-side purchase cache hint")
    ),
    responses(
        (status = 200, description = "Merged purchase decision with reason code"),
        (status = 404, description = "Course not found")
    )
)]
#[get("/course/{course_id}/access-status")]
pub async fn course_access_status(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
    path: web::Path<i32>,
    query: web::Query<AccessStatusQuery>,
) -> impl Responder {
    let course_id = path.into_inner();

    match db::get_course_by_id(&state.pool, course_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound().json(json!({"message": "Course not found!"}));
        }
        Err(e) => {
            eprintln!("get_course_by_id error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    }

    let hint = query.hint.unwrap_or(false);

    match access::resolve_course_access(&state.pool, *user_id, course_id, hint).await {
        Ok(decision) => HttpResponse::Ok().json(json!({
            "purchased": decision.purchased,
            "reason": decision.reason,
        })),
        Err(e) => {
            eprintln!("resolve_course_access error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Карточка курса вместе со статусом покупки; purchased берётся только из
/// ledger'а (completed-строка), как и на странице деталей курса.
#[get("/course/{course_id}/detail-with-status")]
pub async fn course_detail_with_status(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
    path: web::Path<i32>,
) -> impl Responder {
    let course_id = path.into_inner();

    let course = match db::get_course_by_id(&state.pool, course_id).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            return HttpResponse::NotFound().json(json!({"message": "Course not found!"}));
        }
        Err(e) => {
            eprintln!("get_course_by_id error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let lectures = match db::list_course_lectures(&state.pool, course_id).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("list_course_lectures error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let purchased = match db::has_completed_purchase(&state.pool, *user_id, course_id).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("has_completed_purchase error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(json!({
        "success": true,
        "course": course,
        "lectures": lectures,
        "purchased": purchased,
    }))
}

/// Все завершённые покупки (админский список).
#[get("/purchases")]
pub async fn list_purchases(state: web::Data<AppState>) -> impl Responder {
    match db::list_completed_purchases(&state.pool).await {
        Ok(purchases) => HttpResponse::Ok().json(json!({"purchases": purchases})),
        Err(e) => {
            eprintln!("list_completed_purchases error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
