use tracing::{info, warn};

use super::{non_empty, residents};
use crate::clock;
use crate::context::AppContext;
use crate::db::{queries, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::alert::{confidence_percent, AlertStatus, AlertView};
use crate::models::payload::EventPayload;

pub const LIST_LIMIT: i64 = 50;

const DEFAULT_SOURCE: &str = "pi";

/// Who an alert is about, resolved before the insert.
struct Subject {
    resident_id: Option<i64>,
    device_id: Option<i64>,
    elderly: String,
    room: String,
}

/// Records an incident reported by a unit or entered by hand.
///
/// The reporter either names a resident by id, or gives `elderly` + `room`
/// directly; in the latter case a resident with that exact name is linked.
/// Elderly and room are snapshotted so the alert outlives its resident.
pub async fn create(ctx: &AppContext, event: EventPayload) -> ApiResult<AlertView> {
    let alert_type = non_empty(event.alert_type);
    let elderly = non_empty(event.elderly);
    let room = non_empty(event.room);

    let has_subject = event.resident_id.is_some() || (elderly.is_some() && room.is_some());
    let (alert_type, confidence) = match (alert_type, event.confidence) {
        (Some(t), Some(c)) if has_subject => (t, c),
        _ => {
            return Err(ApiError::validation(
                "Required: type, confidence, and (residentId OR elderly+room)",
            ))
        }
    };
    let percent = confidence_percent(confidence).map_err(ApiError::Validation)?;

    let subject = match event.resident_id {
        Some(id) => {
            let resident = residents::get(&ctx.pool, id)
                .await?
                .ok_or_else(|| ApiError::validation("residentId not found"))?;
            Subject {
                resident_id: Some(resident.id),
                device_id: resident.device_id,
                elderly: resident.name,
                room: resident.room,
            }
        }
        None => {
            // Both present, checked above.
            let elderly = elderly.unwrap_or_default();
            let room = room.unwrap_or_default();
            let linked = residents::find_by_name(&ctx.pool, &elderly).await?;
            Subject {
                resident_id: linked.as_ref().map(|r| r.id),
                device_id: linked.and_then(|r| r.device_id),
                elderly,
                room,
            }
        }
    };

    let now = clock::now();
    let time = non_empty(event.time).unwrap_or_else(|| ctx.clock.short_time(now));
    let source = non_empty(event.source).unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let id: i64 = sqlx::query_scalar(queries::INSERT_ALERT)
        .bind(subject.resident_id)
        .bind(subject.device_id)
        .bind(&subject.elderly)
        .bind(&subject.room)
        .bind(&alert_type)
        .bind(confidence)
        .bind(percent)
        .bind(&time)
        .bind(non_empty(event.media_url))
        .bind(&source)
        .bind(now)
        .fetch_one(&ctx.pool)
        .await?;

    info!(
        "Alert {} created: {} for {} in {} ({}%, {})",
        id, alert_type, subject.elderly, subject.room, percent, source
    );
    get(&ctx.pool, id).await
}

pub async fn list(pool: &DbPool, limit: i64) -> ApiResult<Vec<AlertView>> {
    let alerts = sqlx::query_as::<_, AlertView>(queries::SELECT_ALERT_VIEWS)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(alerts)
}

/// Zero or one alert, newest first.
pub async fn latest(pool: &DbPool) -> ApiResult<Vec<AlertView>> {
    list(pool, 1).await
}

pub async fn get(pool: &DbPool, id: i64) -> ApiResult<AlertView> {
    sqlx::query_as::<_, AlertView>(queries::SELECT_ALERT_VIEW_BY_ID)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Alert not found"))
}

/// Alerts whose device, directly or through the resident, belongs to the user.
pub async fn list_owned(pool: &DbPool, user_id: i64, limit: i64) -> ApiResult<Vec<AlertView>> {
    let alerts = sqlx::query_as::<_, AlertView>(queries::SELECT_OWNED_ALERT_VIEWS)
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(alerts)
}

pub async fn latest_owned(pool: &DbPool, user_id: i64) -> ApiResult<Vec<AlertView>> {
    list_owned(pool, user_id, 1).await
}

async fn get_owned(pool: &DbPool, id: i64, user_id: i64) -> ApiResult<Option<AlertView>> {
    let alert = sqlx::query_as::<_, AlertView>(queries::SELECT_OWNED_ALERT_VIEW_BY_ID)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(alert)
}

/// Moves an alert forward through New, Acknowledged, Resolved.
///
/// With `owner` set, alerts outside the user's devices look missing. Sending
/// the current status again is accepted and keeps the original timestamps.
pub async fn transition(
    pool: &DbPool,
    id: i64,
    status: Option<&str>,
    owner: Option<i64>,
) -> ApiResult<AlertView> {
    let target = status
        .and_then(AlertStatus::parse)
        .ok_or_else(|| ApiError::validation("Invalid status"))?;

    if let Some(user_id) = owner {
        if get_owned(pool, id, user_id).await?.is_none() {
            return Err(ApiError::not_found("Alert not found"));
        }
    }

    let updated: Option<i64> = sqlx::query_scalar(queries::UPDATE_ALERT_STATUS)
        .bind(id)
        .bind(target.as_str())
        .bind(clock::now())
        .bind(target.rank())
        .fetch_optional(pool)
        .await?;

    if updated.is_none() {
        let current: Option<String> = sqlx::query_scalar(queries::SELECT_ALERT_STATUS)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        return match current {
            None => Err(ApiError::not_found("Alert not found")),
            Some(current) => {
                warn!("Refused alert {} transition {} -> {}", id, current, target.as_str());
                Err(ApiError::conflict(format!(
                    "Cannot move alert from {} back to {}",
                    current,
                    target.as_str()
                ))
                .with_detail("status", current))
            }
        };
    }

    info!("Alert {} -> {}", id, target.as_str());
    get(pool, id).await
}

pub async fn set_media(pool: &DbPool, id: i64, media_url: Option<String>) -> ApiResult<AlertView> {
    let media_url =
        non_empty(media_url).ok_or_else(|| ApiError::validation("mediaUrl is required"))?;

    let updated: Option<i64> = sqlx::query_scalar(queries::UPDATE_ALERT_MEDIA)
        .bind(id)
        .bind(&media_url)
        .fetch_optional(pool)
        .await?;
    if updated.is_none() {
        return Err(ApiError::not_found("Alert not found"));
    }
    get(pool, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::subscription::Plan;
    use crate::service::devices;
    use crate::testing;

    fn event(resident_id: Option<i64>, elderly: Option<&str>, room: Option<&str>) -> EventPayload {
        EventPayload {
            resident_id,
            elderly: elderly.map(str::to_string),
            room: room.map(str::to_string),
            alert_type: Some("Fall detected".to_string()),
            confidence: Some(0.97),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_resolves_resident_by_id() {
        let ctx = testing::context().await;
        let cam = testing::seen_device(&ctx.pool, "CAM-1", "201", chrono::Duration::zero()).await;
        let aung = residents::create(&ctx.pool, Some("Aung".into()), Some("201".into()))
            .await
            .unwrap();
        residents::assign_device(&ctx.pool, aung.id, Some(cam.id)).await.unwrap();

        let view = create(&ctx, event(Some(aung.id), None, None)).await.unwrap();
        assert_eq!(view.alert.elderly, "Aung");
        assert_eq!(view.alert.room, "201");
        assert_eq!(view.alert.device_id, Some(cam.id));
        assert_eq!(view.alert.status, AlertStatus::New);
        assert_eq!(view.alert.confidence, 0.97);
        assert_eq!(view.alert.confidence_percent, 97);
        assert_eq!(view.alert.source, "pi");
        assert_eq!(view.device_external_id.as_deref(), Some("CAM-1"));
        // "hh:mm AM"
        assert_eq!(view.alert.time.len(), 8);

        let unknown = create(&ctx, event(Some(999), None, None)).await;
        assert!(matches!(unknown, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn create_by_name_links_matching_resident() {
        let ctx = testing::context().await;
        let aung = residents::create(&ctx.pool, Some("Aung".into()), Some("201".into()))
            .await
            .unwrap();

        let linked = create(&ctx, event(None, Some("Aung"), Some("Lobby"))).await.unwrap();
        assert_eq!(linked.alert.resident_id, Some(aung.id));
        assert_eq!(linked.alert.room, "Lobby");

        let mut manual = event(None, Some("Visitor"), Some("Lobby"));
        manual.confidence = Some(85.0);
        manual.time = Some("09:00".into());
        manual.source = Some("manual".into());
        let unlinked = create(&ctx, manual).await.unwrap();
        assert_eq!(unlinked.alert.resident_id, None);
        assert!(!unlinked.resident_exists());
        assert_eq!(unlinked.display_name(), "Visitor");
        assert_eq!(unlinked.alert.confidence_percent, 85);
        assert_eq!(unlinked.alert.time, "09:00");
        assert_eq!(unlinked.alert.source, "manual");
    }

    #[tokio::test]
    async fn create_requires_type_confidence_and_subject() {
        let ctx = testing::context().await;

        let mut no_type = event(None, Some("A"), Some("1"));
        no_type.alert_type = None;
        let mut no_confidence = event(None, Some("A"), Some("1"));
        no_confidence.confidence = None;
        let mut too_confident = event(None, Some("A"), Some("1"));
        too_confident.confidence = Some(150.0);

        for bad in [no_type, no_confidence, event(None, Some("A"), None), too_confident] {
            assert!(matches!(create(&ctx, bad).await, Err(ApiError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn timestamps_are_set_once_on_entry() {
        let ctx = testing::context().await;
        let id = create(&ctx, event(None, Some("A"), Some("1"))).await.unwrap().alert.id;

        let acked = transition(&ctx.pool, id, Some("checked"), None).await.unwrap();
        assert_eq!(acked.alert.status, AlertStatus::Acknowledged);
        let acked_at = acked.alert.acknowledged_at.unwrap();
        assert!(acked.alert.resolved_at.is_none());

        let again = transition(&ctx.pool, id, Some("Acknowledged"), None).await.unwrap();
        assert_eq!(again.alert.acknowledged_at, Some(acked_at));

        let resolved = transition(&ctx.pool, id, Some("RESOLVED"), None).await.unwrap();
        assert_eq!(resolved.alert.status, AlertStatus::Resolved);
        assert_eq!(resolved.alert.acknowledged_at, Some(acked_at));
        assert!(resolved.alert.resolved_at.is_some());

        let back = transition(&ctx.pool, id, Some("new"), None).await;
        assert!(matches!(back, Err(ApiError::Conflict { .. })));
        let still = get(&ctx.pool, id).await.unwrap();
        assert_eq!(still.alert.status, AlertStatus::Resolved);
    }

    #[tokio::test]
    async fn skipping_acknowledged_leaves_it_unset() {
        let ctx = testing::context().await;
        let id = create(&ctx, event(None, Some("A"), Some("1"))).await.unwrap().alert.id;

        let resolved = transition(&ctx.pool, id, Some("resolved"), None).await.unwrap();
        assert!(resolved.alert.acknowledged_at.is_none());
        assert!(resolved.alert.resolved_at.is_some());

        assert!(matches!(
            transition(&ctx.pool, id, Some("closed"), None).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            transition(&ctx.pool, id, None, None).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            transition(&ctx.pool, 999, Some("resolved"), None).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn owner_scoped_reads_and_transitions() {
        let ctx = testing::context().await;
        let owner = testing::user(&ctx.pool, "owner@b.co").await;
        let stranger = testing::user(&ctx.pool, "stranger@b.co").await;
        let sub = testing::subscription(&ctx.pool, owner.id, Plan::Free).await;

        let cam = testing::seen_device(&ctx.pool, "CAM-1", "201", chrono::Duration::zero()).await;
        devices::claim(&ctx.pool, owner.id, &sub, Some("CAM-1".into())).await.unwrap();
        let aung = residents::create(&ctx.pool, Some("Aung".into()), Some("201".into()))
            .await
            .unwrap();
        residents::assign_device(&ctx.pool, aung.id, Some(cam.id)).await.unwrap();

        let mine = create(&ctx, event(Some(aung.id), None, None)).await.unwrap();
        create(&ctx, event(None, Some("Nobody"), Some("9"))).await.unwrap();

        let owned = list_owned(&ctx.pool, owner.id, LIST_LIMIT).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].alert.id, mine.alert.id);
        assert_eq!(latest_owned(&ctx.pool, owner.id).await.unwrap().len(), 1);
        assert!(list_owned(&ctx.pool, stranger.id, LIST_LIMIT).await.unwrap().is_empty());
        assert_eq!(list(&ctx.pool, LIST_LIMIT).await.unwrap().len(), 2);

        let denied = transition(&ctx.pool, mine.alert.id, Some("checked"), Some(stranger.id)).await;
        assert!(matches!(denied, Err(ApiError::NotFound(_))));
        let done = transition(&ctx.pool, mine.alert.id, Some("checked"), Some(owner.id))
            .await
            .unwrap();
        assert_eq!(done.alert.status, AlertStatus::Acknowledged);
    }

    #[tokio::test]
    async fn deleting_resident_keeps_alert_snapshot() {
        let ctx = testing::context().await;
        let aung = residents::create(&ctx.pool, Some("Aung".into()), Some("201".into()))
            .await
            .unwrap();
        let id = create(&ctx, event(Some(aung.id), None, None)).await.unwrap().alert.id;

        match residents::delete(&ctx.pool, aung.id).await {
            Err(ApiError::Conflict { details, .. }) => assert_eq!(details["activeAlerts"], 1),
            other => panic!("unexpected {:?}", other),
        }

        transition(&ctx.pool, id, Some("resolved"), None).await.unwrap();
        residents::delete(&ctx.pool, aung.id).await.unwrap();

        let orphan = get(&ctx.pool, id).await.unwrap();
        assert_eq!(orphan.alert.resident_id, None);
        assert_eq!(orphan.alert.elderly, "Aung");
        assert_eq!(orphan.alert.room, "201");
        assert!(!orphan.resident_exists());
        assert_eq!(orphan.display_name(), "Aung");

        assert!(matches!(
            residents::delete(&ctx.pool, aung.id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn media_can_be_attached_later() {
        let ctx = testing::context().await;
        let id = create(&ctx, event(None, Some("A"), Some("1"))).await.unwrap().alert.id;

        let view = set_media(&ctx.pool, id, Some("https://media.test/a.mp4".into()))
            .await
            .unwrap();
        assert_eq!(view.alert.media_url.as_deref(), Some("https://media.test/a.mp4"));
        assert!(matches!(
            set_media(&ctx.pool, id, Some(" ".into())).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            set_media(&ctx.pool, 999, Some("x".into())).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
