use sqlx::{PgPool, Row};
use std::env;
use std::sync::OnceLock;
use tokio::sync::{Mutex, MutexGuard};

use lms_purchase::AppState;

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

pub async fn init_test_db() -> TestDb {
    dotenvy::dotenv().ok();
    let test_url = env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let (admin_url, db_name) =
        split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url)
        .await
        .expect("connect admin db");

    let _ = sqlx::query("SELECT pg_advisory_lock(424242)")
        .execute(&admin_pool)
        .await;

    let quoted_name = quote_identifier(&db_name);
    let drop_sql = format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)");
    let create_sql = format!("CREATE DATABASE {quoted_name}");

    let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
    let create_result = sqlx::query(&create_sql).execute(&admin_pool).await;
    if let Err(e) = create_result {
        eprintln!("create test db error: {e}");
        let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
        sqlx::query(&create_sql)
            .execute(&admin_pool)
            .await
            .expect("create test db retry");
    }

    let _ = sqlx::query("SELECT pg_advisory_unlock(424242)")
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;

    let pool = PgPool::connect(&test_url)
        .await
        .expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    TestDb { pool, _guard: guard }
}

pub fn build_state(pool: PgPool, stripe_webhook_secret: &str) -> AppState {
    AppState {
        pool,
        stripe_api_key: "sk_test_dummy".to_string(),
        stripe_webhook_secret: stripe_webhook_secret.to_string(),
        frontend_base_url: "http://localhost:5173".to_string(),
    }
}

#[allow(dead_code)]
pub async fn seed_user(pool: &PgPool, suffix: &str) -> i32 {
    sqlx::query(
        r#"INSERT INTO users (name, email, password_hash)
           VALUES ($1, $2, 'test-hash')
           RETURNING id"#,
    )
    .bind(format!("user_{suffix}"))
    .bind(format!("user_{suffix}@test.local"))
    .fetch_one(pool)
    .await
    .expect("insert user")
    .get("id")
}

#[allow(dead_code)]
pub async fn seed_course(pool: &PgPool, suffix: &str, price: Option<i64>) -> i32 {
    sqlx::query(
        r#"INSERT INTO courses (title, description, price, currency)
           VALUES ($1, 'Test course', $2, 'inr')
           RETURNING id"#,
    )
    .bind(format!("Course {suffix}"))
    .bind(price)
    .fetch_one(pool)
    .await
    .expect("insert course")
    .get("id")
}

#[allow(dead_code)]
pub async fn seed_lectures(pool: &PgPool, course_id: i32, count: i32) {
    for position in 0..count {
        sqlx::query(
            r#"INSERT INTO lectures (course_id, title, position)
               VALUES ($1, $2, $3)"#,
        )
        .bind(course_id)
        .bind(format!("Lecture {position}"))
        .bind(position)
        .execute(pool)
        .await
        .expect("insert lecture");
    }
}

#[allow(dead_code)]
pub async fn seed_purchase(
    pool: &PgPool,
    user_id: i32,
    course_id: i32,
    session_id: &str,
    status: &str,
) -> i32 {
    sqlx::query(
        r#"INSERT INTO purchases (user_id, course_id, amount, currency, status, provider, provider_session_id)
           VALUES ($1, $2, 1999, 'inr', $3, 'stripe', $4)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(status)
    .bind(session_id)
    .fetch_one(pool)
    .await
    .expect("insert purchase")
    .get("id")
}
