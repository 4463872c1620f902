// src/db.rs

use sqlx::{PgPool, Row};

use crate::models::{Course, Lecture, PurchaseListItem, PurchaseRecord};

pub async fn get_course_by_id(pool: &PgPool, course_id: i32) -> Result<Option<Course>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, title, description, price, currency, is_published, created_at
           FROM courses
           WHERE id = $1 AND is_published = true"#,
    )
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| Course {
        id: r.get("id"),
        title: r.get("title"),
        description: r.get("description"),
        price: r.get("price"),
        currency: r.get("currency"),
        is_published: r.get("is_published"),
        created_at: r.get("created_at"),
    }))
}

pub async fn list_course_lectures(pool: &PgPool, course_id: i32) -> Result<Vec<Lecture>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, course_id, title, video_url, position, is_preview_free
           FROM lectures
           WHERE course_id = $1
           ORDER BY position ASC"#,
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Lecture {
            id: r.get("id"),
            course_id: r.get("course_id"),
            title: r.get("title"),
            video_url: r.get("video_url"),
            position: r.get("position"),
            is_preview_free: r.get("is_preview_free"),
        })
        .collect())
}

/// Глобальная разблокировка: флаг ставится всем лекциям курса, для всех
/// зрителей сразу. Идемпотентно. Возвращает число затронутых строк.
pub async fn set_lectures_unlocked(pool: &PgPool, course_id: i32) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE lectures SET is_preview_free = true WHERE course_id = $1")
        .bind(course_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Идемпотентный set-add: повторная выдача того же entitlement — no-op.
pub async fn add_entitlement(pool: &PgPool, user_id: i32, course_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO user_entitlements (user_id, course_id)
           VALUES ($1, $2)
           ON CONFLICT (user_id, course_id) DO NOTHING"#,
    )
    .bind(user_id)
    .bind(course_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn has_entitlement(pool: &PgPool, user_id: i32, course_id: i32) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT EXISTS(
               SELECT 1 FROM user_entitlements WHERE user_id = $1 AND course_id = $2
           ) AS present"#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get("present"))
}

pub async fn add_enrolled_student(pool: &PgPool, course_id: i32, user_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO course_enrollments (course_id, user_id)
           VALUES ($1, $2)
           ON CONFLICT (course_id, user_id) DO NOTHING"#,
    )
    .bind(course_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_pending_purchase(
    pool: &PgPool,
    user_id: i32,
    course_id: i32,
    amount: i64,
    currency: &str,
    provider_session_id: &str,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO purchases (user_id, course_id, amount, currency, status, provider, provider_session_id)
           VALUES ($1, $2, $3, $4, 'pending', 'stripe', $5)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(amount)
    .bind(currency)
    .bind(provider_session_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}

/// Атомарный перевод pending -> completed по уникальному session id.
/// Одностейтментный check-and-set: при конкурирующих повторных доставках
/// одного события выигрывает ровно одна, остальные получают None.
/// `amount` — авторитетная сумма из события; None оставляет сумму ledger'а.
pub async fn complete_purchase_if_pending(
    pool: &PgPool,
    provider_session_id: &str,
    amount: Option<i64>,
) -> Result<Option<(i32, i32, i32)>, sqlx::Error> {
    let row = sqlx::query(
        r#"UPDATE purchases
           SET amount = COALESCE($1, amount), status = 'completed', updated_at = NOW()
           WHERE provider_session_id = $2 AND status = 'pending'
           RETURNING id, user_id, course_id"#,
    )
    .bind(amount)
    .bind(provider_session_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| (r.get("id"), r.get("user_id"), r.get("course_id"))))
}

pub async fn get_purchase_status_by_session(
    pool: &PgPool,
    provider_session_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT status FROM purchases WHERE provider_session_id = $1")
        .bind(provider_session_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("status")))
}

pub async fn get_purchase_for_user_by_session(
    pool: &PgPool,
    provider_session_id: &str,
    user_id: i32,
) -> Result<Option<PurchaseRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, user_id, course_id, amount, currency, status, provider,
                  provider_session_id, created_at, updated_at
           FROM purchases
           WHERE provider_session_id = $1 AND user_id = $2"#,
    )
    .bind(provider_session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| PurchaseRecord {
        id: r.get("id"),
        user_id: r.get("user_id"),
        course_id: r.get("course_id"),
        amount: r.get("amount"),
        currency: r.get("currency"),
        status: r.get("status"),
        provider: r.get("provider"),
        provider_session_id: r.get("provider_session_id"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }))
}

pub async fn has_completed_purchase(
    pool: &PgPool,
    user_id: i32,
    course_id: i32,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT EXISTS(
               SELECT 1 FROM purchases
               WHERE user_id = $1 AND course_id = $2 AND status = 'completed'
           ) AS present"#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get("present"))
}

pub async fn list_completed_purchases(pool: &PgPool) -> Result<Vec<PurchaseListItem>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT p.id, p.user_id, p.course_id, c.title AS course_title,
                  p.amount, p.currency, p.status, p.provider_session_id, p.created_at
           FROM purchases p
           JOIN courses c ON c.id = p.course_id
           WHERE p.status = 'completed'
           ORDER BY p.created_at DESC"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| PurchaseListItem {
            id: r.get("id"),
            user_id: r.get("user_id"),
            course_id: r.get("course_id"),
            course_title: r.get("course_title"),
            amount: r.get("amount"),
            currency: r.get("currency"),
            status: r.get("status"),
            provider_session_id: r.get("provider_session_id"),
            created_at: r.get("created_at"),
        })
        .collect())
}
