//! Members repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::member::{Member, NewMember},
};

#[derive(Clone)]
pub struct MembersRepository {
    pool: Pool<Postgres>,
}

impl MembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get member by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Member> {
        sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    /// All members, most recently registered first
    pub async fn list(&self) -> AppResult<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(
            "SELECT * FROM members ORDER BY registered_on DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    /// Case-insensitive exact name lookup; the oldest registration wins
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(
            "SELECT * FROM members WHERE LOWER(name) = LOWER($1) ORDER BY id LIMIT 1",
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    /// Register a new member
    pub async fn create(&self, member: &NewMember) -> AppResult<Member> {
        let member = sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO members (name, group_label, registered_on)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&member.name)
        .bind(&member.group_label)
        .bind(member.registered_on)
        .fetch_one(&self.pool)
        .await?;

        Ok(member)
    }

    /// Delete a member, refused while they hold an open loan
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Locks out concurrent borrows, which take FOR SHARE on the member row
        let exists: Option<i32> =
            sqlx::query_scalar("SELECT id FROM members WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if exists.is_none() {
            return Err(AppError::NotFound(format!("Member with id {} not found", id)));
        }

        let open_loans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE member_id = $1 AND status = 'open'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if open_loans > 0 {
            return Err(AppError::Conflict(format!(
                "Member has {} open loan(s) and cannot be deleted",
                open_loans
            )));
        }

        sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
