use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::DbPool;
use crate::models::participant::Participant;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: String,
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Trip summary embedded in participant lookups.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TripSummary {
    pub id: String,
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl Trip {
    pub async fn find(pool: &DbPool, id: &str) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, destination, starts_at, ends_at, created_at FROM trips WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Creates the trip, its owner participant and one unconfirmed
    /// participant per invitee email in a single transaction: either all
    /// rows exist afterwards or none do.
    pub async fn create_with_participants(
        pool: &DbPool,
        destination: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        owner_name: &str,
        owner_email: &str,
        invitee_emails: &[String],
    ) -> sqlx::Result<(Self, Participant, Vec<Participant>)> {
        let trip = Self {
            id: Uuid::new_v4().to_string(),
            destination: destination.to_string(),
            starts_at,
            ends_at,
            created_at: Utc::now(),
        };
        let owner = Participant::owner(&trip.id, owner_name, owner_email);
        let invitees: Vec<Participant> = invitee_emails
            .iter()
            .map(|email| Participant::invitee(&trip.id, None, email))
            .collect();

        let mut tx = pool.begin().await?;
        sqlx::query(
            "INSERT INTO trips (id, destination, starts_at, ends_at, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&trip.id)
        .bind(&trip.destination)
        .bind(trip.starts_at)
        .bind(trip.ends_at)
        .bind(trip.created_at)
        .execute(&mut *tx)
        .await?;

        Participant::insert(&mut *tx, &owner).await?;
        for invitee in &invitees {
            Participant::insert(&mut *tx, invitee).await?;
        }
        tx.commit().await?;

        Ok((trip, owner, invitees))
    }

    pub async fn update_details(
        pool: &DbPool,
        id: &str,
        destination: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query("UPDATE trips SET destination = ?2, starts_at = ?3, ends_at = ?4 WHERE id = ?1")
            .bind(id)
            .bind(destination)
            .bind(starts_at)
            .bind(ends_at)
            .execute(pool)
            .await?;
        Self::find(pool, id).await
    }

    /// Participants, activities and links go with the trip via
    /// ON DELETE CASCADE.
    pub async fn delete(pool: &DbPool, id: &str) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM trips WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub fn summary(&self) -> TripSummary {
        TripSummary {
            id: self.id.clone(),
            destination: self.destination.clone(),
            starts_at: self.starts_at,
            ends_at: self.ends_at,
        }
    }
}
