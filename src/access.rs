// src/access.rs
//
// Сведение трёх источников правды о доступе к курсу: ledger (purchases),
// entitlement set (user_entitlements) и клиентская подсказка из localStorage.
// Подсказка сама доступ не открывает — только запускает повторную проверку
// серверных источников, пока состояние после оплаты догоняет вебхук.

use serde::Serialize;
use sqlx::PgPool;

use crate::db;

#[derive(Debug, Clone, Copy)]
pub struct SourceSnapshot {
    pub ledger_completed: bool,
    pub entitlement_present: bool,
    pub client_hint: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    PurchaseLedger,
    EntitlementSet,
    HintPendingRecheck,
    NotPurchased,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AccessDecision {
    pub purchased: bool,
    pub reason: AccessReason,
    #[serde(skip)]
    pub recheck: bool,
}

/// Приоритет источников: ledger, затем entitlement set, затем подсказка.
/// Любой серверный источник открывает доступ сам по себе; подсказка — нет.
pub fn merge_access(snapshot: SourceSnapshot) -> AccessDecision {
    if snapshot.ledger_completed {
        return AccessDecision {
            purchased: true,
            reason: AccessReason::PurchaseLedger,
            recheck: false,
        };
    }

    if snapshot.entitlement_present {
        return AccessDecision {
            purchased: true,
            reason: AccessReason::EntitlementSet,
            recheck: false,
        };
    }

    if snapshot.client_hint {
        return AccessDecision {
            purchased: false,
            reason: AccessReason::HintPendingRecheck,
            recheck: true,
        };
    }

    AccessDecision {
        purchased: false,
        reason: AccessReason::NotPurchased,
        recheck: false,
    }
}

pub async fn load_snapshot(
    pool: &PgPool,
    user_id: i32,
    course_id: i32,
    client_hint: bool,
) -> Result<SourceSnapshot, sqlx::Error> {
    let ledger_completed = db::has_completed_purchase(pool, user_id, course_id).await?;
    let entitlement_present = db::has_entitlement(pool, user_id, course_id).await?;

    Ok(SourceSnapshot {
        ledger_completed,
        entitlement_present,
        client_hint,
    })
}

/// Если сработала только подсказка, серверные источники перечитываются один
/// раз; дальше клиент просто продолжает поллить.
pub async fn resolve_course_access(
    pool: &PgPool,
    user_id: i32,
    course_id: i32,
    client_hint: bool,
) -> Result<AccessDecision, sqlx::Error> {
    let first = merge_access(load_snapshot(pool, user_id, course_id, client_hint).await?);
    if !first.recheck {
        return Ok(first);
    }

    log::info!(
        "client hint disagrees with server state user_id={user_id} course_id={course_id}, re-checking"
    );

    let second = merge_access(load_snapshot(pool, user_id, course_id, false).await?);
    if second.purchased {
        Ok(second)
    } else {
        // остаёмся на hint_pending_recheck: клиенту есть смысл поллить дальше
        Ok(first)
    }
}
