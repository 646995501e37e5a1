use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub occurs_at: DateTime<Utc>,
    pub trip_id: String,
}

/// One calendar day of the trip with its activities, in occurrence order.
#[derive(Debug, Serialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub activities: Vec<Activity>,
}

impl Activity {
    pub fn new(trip_id: &str, title: &str, occurs_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            occurs_at,
            trip_id: trip_id.to_string(),
        }
    }

    pub async fn insert(pool: &DbPool, activity: &Self) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO activities (id, title, occurs_at, trip_id) VALUES (?1, ?2, ?3, ?4)")
            .bind(&activity.id)
            .bind(&activity.title)
            .bind(activity.occurs_at)
            .bind(&activity.trip_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn find(pool: &DbPool, id: &str) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT id, title, occurs_at, trip_id FROM activities WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Activities of a trip, ascending by occurrence so the day buckets come
    /// out pre-sorted.
    pub async fn list_for_trip(pool: &DbPool, trip_id: &str) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, title, occurs_at, trip_id FROM activities \
             WHERE trip_id = ?1 ORDER BY occurs_at ASC",
        )
        .bind(trip_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &DbPool, id: &str) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM activities WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

/// Buckets activities into one entry per calendar day spanning
/// [starts_at, ends_at] inclusive, ascending. An activity lands in the bucket
/// matching the calendar day of its occurs_at, not a 24-hour window.
pub fn bucket_by_day(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    activities: Vec<Activity>,
) -> Vec<DayBucket> {
    let first = starts_at.date_naive();
    let last = ends_at.date_naive();
    let span = (last - first).num_days();

    (0..=span)
        .map(|offset| {
            let date = first + Days::new(offset as u64);
            let activities = activities
                .iter()
                .filter(|activity| activity.occurs_at.date_naive() == date)
                .cloned()
                .collect();
            DayBucket { date, activities }
        })
        .collect()
}
