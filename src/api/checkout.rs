// src/api/checkout.rs

use actix_web::{HttpResponse, Responder, post, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{AppState, api::stripe_client, db};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCheckoutSessionBody {
    #[serde(rename = "courseId")]
    pub course_id: Option<i32>,
}

/// Открывает checkout-сессию у провайдера и сохраняет pending-строку в
/// ledger. Строка создаётся только ПОСЛЕ успешного внешнего вызова: иначе
/// при ретрае осталась бы осиротевшая pending-запись без session id и
/// дубликат по уникальному ключу.
#[utoipa::path(
    post,
    path = "/api/checkout/create-checkout-session",
    tag = "checkout",
    request_body = CreateCheckoutSessionBody,
    responses(
        (status = 200, description = "Redirect URL and session id"),
        (status = 400, description = "Course ID missing or course not sellable"),
        (status = 404, description = "Course not found"),
        (status = 500, description = "Payment provider unavailable")
    )
)]
#[post("/checkout/create-checkout-session")]
pub async fn create_checkout_session(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
    payload: web::Json<CreateCheckoutSessionBody>,
) -> impl Responder {
    let user_id = *user_id;

    // 1) courseId обязателен
    let Some(course_id) = payload.course_id else {
        return HttpResponse::BadRequest().json(json!({"message": "Course ID missing!"}));
    };

    // 2) загрузим курс из нашей БД
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

    // 3) курс без цены продать нельзя
    let Some(price) = course.price else {
        return HttpResponse::BadRequest().json(json!({"message": "Course has no price"}));
    };

    // 4) redirect-URL несёт courseId и корреляционный токен сессии;
    //    {CHECKOUT_SESSION_ID} подставляет сам провайдер
    let success_url = format!(
        "{}/course-detail/{}?purchase_success=true&session_id={{CHECKOUT_SESSION_ID}}",
        state.frontend_base_url, course_id
    );
    let cancel_url = format!("{}/course-detail/{}", state.frontend_base_url, course_id);

    log::info!(
        "stripe create checkout session user_id={user_id} course_id={course_id} price={price}"
    );

    let session = match stripe_client::create_checkout_session(
        &state.stripe_api_key,
        stripe_client::CreateCheckoutSessionRequest {
            course_title: course.title.clone(),
            course_description: course.description.clone(),
            currency: course.currency.clone(),
            unit_amount: price * 100,
            success_url,
            cancel_url,
            course_id,
            user_id,
        },
    )
    .await
    {
        Ok(s) => s,
        Err(e) => {
            log::error!(
                "stripe create_checkout_session error: {e} user_id={user_id} course_id={course_id}"
            );
            return HttpResponse::InternalServerError().json(json!({
                "message": "checkout session create failed"
            }));
        }
    };

    // 5) pending-строка в ledger; ключ — id внешней сессии
    let purchase_id = match db::insert_pending_purchase(
        &state.pool,
        user_id,
        course_id,
        price,
        &course.currency,
        &session.id,
    )
    .await
    {
        Ok(id) => id,
        Err(e) => {
            eprintln!("insert_pending_purchase error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    log::info!(
        "checkout session created purchase_id={purchase_id} session_id={} user_id={user_id} course_id={course_id}",
        session.id
    );

    HttpResponse::Ok().json(json!({
        "success": true,
        "url": session.url,
        "sessionId": session.id,
    }))
}
