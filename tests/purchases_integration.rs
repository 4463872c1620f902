use actix_web::test::TestRequest;
use actix_web::{App, test, web};
use serde_json::json;
use sqlx::Row;
use uuid::Uuid;

use lms_purchase::api::auth::{JwtMiddleware, issue_jwt};
use lms_purchase::api::checkout::create_checkout_session;
use lms_purchase::api::purchases::{
    check_payment_status,
    course_access_status,
    course_detail_with_status,
    list_purchases,
};

mod support;

fn bearer(user_id: i32) -> (&'static str, String) {
    std::env::set_var("JWT_SECRET", "test-jwt-secret");
    let token = issue_jwt(user_id).expect("issue jwt");
    ("Authorization", format!("Bearer {token}"))
}

macro_rules! api_app {
    ($state:expr) => {
        test::init_service(
            App::new().app_data($state.clone()).service(
                web::scope("/api")
                    .wrap(JwtMiddleware)
                    .service(create_checkout_session)
                    .service(check_payment_status)
                    .service(course_access_status)
                    .service(course_detail_with_status)
                    .service(list_purchases),
            ),
        )
        .await
    };
}

#[actix_web::test]
async fn create_session_without_course_id_is_rejected() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().to_string();
    let user_id = support::seed_user(pool, &suffix).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_test"));
    let app = api_app!(state);

    let req = TestRequest::post()
        .uri("/api/checkout/create-checkout-session")
        .insert_header(bearer(user_id))
        .set_json(json!({}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);

    // валидация отсекает запрос до внешнего вызова и до записи в ledger
    let rows: i64 = sqlx::query("SELECT COUNT(*) AS n FROM purchases WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("count purchases")
        .get("n");
    assert_eq!(rows, 0);
}

#[actix_web::test]
async fn create_session_for_unknown_course_is_not_found() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().to_string();
    let user_id = support::seed_user(pool, &suffix).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_test"));
    let app = api_app!(state);

    let req = TestRequest::post()
        .uri("/api/checkout/create-checkout-session")
        .insert_header(bearer(user_id))
        .set_json(json!({"courseId": 999_999}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn create_session_for_unpriced_course_is_rejected() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().to_string();
    let user_id = support::seed_user(pool, &suffix).await;
    let course_id = support::seed_course(pool, &suffix, None).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_test"));
    let app = api_app!(state);

    let req = TestRequest::post()
        .uri("/api/checkout/create-checkout-session")
        .insert_header(bearer(user_id))
        .set_json(json!({"courseId": course_id}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn access_status_resolves_from_ledger_alone() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().to_string();
    let user_id = support::seed_user(pool, &suffix).await;
    let course_id = support::seed_course(pool, &suffix, Some(1999)).await;
    support::seed_purchase(pool, user_id, course_id, &format!("cs_{suffix}"), "completed").await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_test"));
    let app = api_app!(state);

    let req = TestRequest::get()
        .uri(&format!("/api/course/{course_id}/access-status"))
        .insert_header(bearer(user_id))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["purchased"], json!(true));
    assert_eq!(body["reason"], json!("purchase_ledger"));
}

#[actix_web::test]
async fn access_status_resolves_from_entitlement_alone() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().to_string();
    let user_id = support::seed_user(pool, &suffix).await;
    let course_id = support::seed_course(pool, &suffix, Some(1999)).await;

    sqlx::query("INSERT INTO user_entitlements (user_id, course_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(course_id)
        .execute(pool)
        .await
        .expect("insert entitlement");

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_test"));
    let app = api_app!(state);

    let req = TestRequest::get()
        .uri(&format!("/api/course/{course_id}/access-status"))
        .insert_header(bearer(user_id))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["purchased"], json!(true));
    assert_eq!(body["reason"], json!("entitlement_set"));
}

#[actix_web::test]
async fn access_status_hint_alone_never_grants() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().to_string();
    let user_id = support::seed_user(pool, &suffix).await;
    let course_id = support::seed_course(pool, &suffix, Some(1999)).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_test"));
    let app = api_app!(state);

    let req = TestRequest::get()
        .uri(&format!("/api/course/{course_id}/access-status?hint=true"))
        .insert_header(bearer(user_id))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["purchased"], json!(false));
    assert_eq!(body["reason"], json!("hint_pending_recheck"));
}

#[actix_web::test]
async fn access_status_for_unknown_course_is_not_found() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().to_string();
    let user_id = support::seed_user(pool, &suffix).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_test"));
    let app = api_app!(state);

    let req = TestRequest::get()
        .uri("/api/course/999999/access-status")
        .insert_header(bearer(user_id))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn payment_status_poll_reports_pending_then_missing_for_other_user() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().to_string();
    let user_id = support::seed_user(pool, &suffix).await;
    let other_id = support::seed_user(pool, &format!("other_{suffix}")).await;
    let course_id = support::seed_course(pool, &suffix, Some(1999)).await;

    let session_id = format!("cs_{suffix}");
    support::seed_purchase(pool, user_id, course_id, &session_id, "pending").await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_test"));
    let app = api_app!(state);

    // без session_id — 400
    let req = TestRequest::get()
        .uri("/api/checkout/status")
        .insert_header(bearer(user_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);

    // владелец видит pending
    let req = TestRequest::get()
        .uri(&format!("/api/checkout/status?session_id={session_id}"))
        .insert_header(bearer(user_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], json!("pending"));

    // чужая сессия — not found
    let req = TestRequest::get()
        .uri(&format!("/api/checkout/status?session_id={session_id}"))
        .insert_header(bearer(other_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn detail_with_status_reports_lectures_and_purchase() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().to_string();
    let user_id = support::seed_user(pool, &suffix).await;
    let course_id = support::seed_course(pool, &suffix, Some(1999)).await;
    support::seed_lectures(pool, course_id, 2).await;
    support::seed_purchase(pool, user_id, course_id, &format!("cs_{suffix}"), "completed").await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_test"));
    let app = api_app!(state);

    let req = TestRequest::get()
        .uri(&format!("/api/course/{course_id}/detail-with-status"))
        .insert_header(bearer(user_id))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["purchased"], json!(true));
    assert_eq!(body["lectures"].as_array().map(|l| l.len()), Some(2));
    assert_eq!(body["course"]["id"], json!(course_id));
}

#[actix_web::test]
async fn purchase_listing_contains_only_completed() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().to_string();
    let user_id = support::seed_user(pool, &suffix).await;
    let course_id = support::seed_course(pool, &suffix, Some(1999)).await;

    support::seed_purchase(pool, user_id, course_id, &format!("cs_done_{suffix}"), "completed").await;
    support::seed_purchase(pool, user_id, course_id, &format!("cs_wait_{suffix}"), "pending").await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_test"));
    let app = api_app!(state);

    let req = TestRequest::get()
        .uri("/api/purchases")
        .insert_header(bearer(user_id))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    let purchases = body["purchases"].as_array().expect("purchases array");
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0]["status"], json!("completed"));
    assert_eq!(purchases[0]["course_title"], json!(format!("Course {suffix}")));
}
