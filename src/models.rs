// src/models.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct Course {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<i64>, // целые единицы валюты; NULL = не продаётся
    pub currency: String,
    pub is_published: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Lecture {
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub video_url: Option<String>,
    pub position: i32,
    pub is_preview_free: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurchaseRecord {
    pub id: i32,
    pub user_id: i32,
    pub course_id: i32,
    pub amount: i64,
    pub currency: String,
    pub status: String, // pending | completed | failed
    pub provider: String,
    pub provider_session_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Завершённая покупка вместе с названием курса, для админского списка.
#[derive(Debug, Serialize, ToSchema)]
pub struct PurchaseListItem {
    pub id: i32,
    pub user_id: i32,
    pub course_id: i32,
    pub course_title: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub provider_session_id: String,
    pub created_at: Option<DateTime<Utc>>,
}
