//! Client and profile repository implementations.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use intake_core::uuid_utils::new_v7;
use intake_core::{Client, ClientRepository, Error, Profile, ProfileRepository, Result};

use crate::escape_like;

/// PostgreSQL implementation of ClientRepository.
#[derive(Clone)]
pub struct PgClientRepository {
    pool: Pool<Postgres>,
}

impl PgClientRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_client_row(row: &sqlx::postgres::PgRow) -> Client {
        Client {
            id: row.get("id"),
            user_id: row.get("user_id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl ClientRepository for PgClientRepository {
    async fn find_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Client>> {
        // ILIKE without wildcards is a case-insensitive exact match
        let row = sqlx::query(
            "SELECT id, user_id, name, created_at FROM clients
             WHERE user_id = $1 AND name ILIKE $2 ESCAPE '\\'
             ORDER BY created_at ASC
             LIMIT 1",
        )
        .bind(user_id)
        .bind(escape_like(name))
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_client_row))
    }

    async fn create(&self, user_id: Uuid, name: &str) -> Result<Client> {
        let row = sqlx::query(
            "INSERT INTO clients (id, user_id, name, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING id, user_id, name, created_at",
        )
        .bind(new_v7())
        .bind(user_id)
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Error::Conflict(format!("client '{}' already exists", name))
            }
            other => Error::Database(other),
        })?;

        let client = Self::parse_client_row(&row);
        debug!(
            subsystem = "db",
            component = "clients",
            op = "create",
            client_id = %client.id,
            user_id = %user_id,
            "Client created"
        );
        Ok(client)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT id, user_id, name, created_at FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_client_row))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Client>> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, created_at FROM clients
             WHERE user_id = $1
             ORDER BY lower(name) ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_client_row).collect())
    }

    async fn find_or_create(&self, user_id: Uuid, name: &str) -> Result<Client> {
        if let Some(existing) = self.find_by_name(user_id, name).await? {
            return Ok(existing);
        }

        // Two intakes racing on a new name both land on the same row
        sqlx::query(
            "INSERT INTO clients (id, user_id, name, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, lower(name)) DO NOTHING",
        )
        .bind(new_v7())
        .bind(user_id)
        .bind(name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.find_by_name(user_id, name)
            .await?
            .ok_or_else(|| Error::Internal(format!("client '{}' vanished after insert", name)))
    }
}

/// PostgreSQL implementation of ProfileRepository.
#[derive(Clone)]
pub struct PgProfileRepository {
    pool: Pool<Postgres>,
}

impl PgProfileRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_profile_row(row: &sqlx::postgres::PgRow) -> Profile {
        Profile {
            id: row.get("id"),
            email: row.get("email"),
            full_name: row.get("full_name"),
            agency_name: row.get("agency_name"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn upsert(&self, id: Uuid, email: &str) -> Result<Profile> {
        let row = sqlx::query(
            "INSERT INTO profiles (id, email, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email
             RETURNING id, email, full_name, agency_name, created_at",
        )
        .bind(id)
        .bind(email)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(Self::parse_profile_row(&row))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Profile>> {
        let row = sqlx::query(
            "SELECT id, email, full_name, agency_name, created_at FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_profile_row))
    }
}
