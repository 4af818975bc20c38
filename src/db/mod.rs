//! Postgres-backed implementations of the collaborator traits.
//!
//! Schema owned by the host application:
//! - `interactions(user_id uuid, subject text, grade text, kind text, occurred_at timestamptz)`
//! - `users(id uuid, grade text, created_at timestamptz)`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{ActiveUser, Interaction, InteractionKind};
use crate::services::{InteractionSource, InterestIndex, UserDirectory};

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_user_id(user_id: &str) -> Result<Uuid> {
        Uuid::parse_str(user_id)
            .map_err(|_| AppError::Validation(format!("invalid user id: {}", user_id)))
    }

    fn row_to_interaction(row: &PgRow) -> Result<Interaction> {
        let kind_str: String = row.try_get("kind")?;
        let kind = InteractionKind::from_str(&kind_str)
            .map_err(|e| AppError::Internal(format!("corrupt interaction row: {}", e)))?;

        Ok(Interaction {
            subject: row.try_get("subject")?,
            grade: row.try_get("grade")?,
            kind,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

#[async_trait]
impl InteractionSource for PgRepository {
    async fn recent_interactions(
        &self,
        user_id: &str,
        window_days: i64,
    ) -> Result<Vec<Interaction>> {
        let user_id = Self::parse_user_id(user_id)?;

        let rows = sqlx::query(
            r#"
            SELECT subject, grade, kind, occurred_at
            FROM interactions
            WHERE user_id = $1
              AND occurred_at > NOW() - ($2 || ' days')::interval
            ORDER BY occurred_at DESC
            "#,
        )
        .bind(user_id)
        .bind(window_days)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_interaction).collect()
    }
}

#[async_trait]
impl InterestIndex for PgRepository {
    async fn users_by_interest<'a>(
        &self,
        subject: Option<&'a str>,
        grade: Option<&'a str>,
    ) -> Result<Vec<String>> {
        // Interested = interacted with the subject/grade mix recently.
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT user_id
            FROM interactions
            WHERE occurred_at > NOW() - INTERVAL '30 days'
              AND ($1::text IS NULL OR subject = $1)
              AND ($2::text IS NULL OR grade = $2)
            ORDER BY user_id
            "#,
        )
        .bind(subject)
        .bind(grade)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<String> {
                let id: Uuid = row.try_get("user_id")?;
                Ok(id.to_string())
            })
            .collect()
    }
}

#[async_trait]
impl UserDirectory for PgRepository {
    async fn get_user_grade(&self, user_id: &str) -> Result<Option<String>> {
        let user_id = Self::parse_user_id(user_id)?;

        let row = sqlx::query("SELECT grade FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("grade")?)),
            None => Ok(None),
        }
    }

    async fn set_user_grade(&self, user_id: &str, grade: &str) -> Result<()> {
        let user_id = Self::parse_user_id(user_id)?;

        let result = sqlx::query("UPDATE users SET grade = $2 WHERE id = $1")
            .bind(user_id)
            .bind(grade)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user {} not found", user_id)));
        }
        Ok(())
    }

    async fn recently_active_users(
        &self,
        window_days: i64,
        limit: i64,
    ) -> Result<Vec<ActiveUser>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id AS user_id,
                   COUNT(i.user_id) AS interaction_count,
                   GREATEST(1, EXTRACT(DAY FROM NOW() - u.created_at))::bigint AS account_age_days
            FROM users u
            JOIN interactions i ON i.user_id = u.id
            WHERE i.occurred_at > NOW() - ($1 || ' days')::interval
            GROUP BY u.id, u.created_at
            ORDER BY u.id
            LIMIT $2
            "#,
        )
        .bind(window_days)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ActiveUser> {
                let id: Uuid = row.try_get("user_id")?;
                let interaction_count: i64 = row.try_get("interaction_count")?;
                let account_age_days: i64 = row.try_get("account_age_days")?;
                Ok(ActiveUser {
                    user_id: id.to_string(),
                    interaction_count: interaction_count.max(0) as u64,
                    account_age_days,
                })
            })
            .collect()
    }

    async fn account_age_days(&self, user_id: &str) -> Result<i64> {
        let user_id = Self::parse_user_id(user_id)?;

        let row = sqlx::query("SELECT created_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {} not found", user_id)))?;

        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        Ok((Utc::now() - created_at).num_days().max(1))
    }
}
