use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{InfoFields, NewPost, PersonalInfo, Post, Profile, ProfilePatch, RowStore};

/// Row store backed by Postgres. Table layout lives in `migrations/`.
#[derive(Clone)]
pub struct PgRowStore {
    db: PgPool,
}

impl PgRowStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RowStore for PgRowStore {
    async fn list_posts(&self) -> anyhow::Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, name, text, image_url, created_at
              FROM messages
             ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list messages")?;
        Ok(rows)
    }

    async fn insert_post(&self, post: &NewPost) -> anyhow::Result<Post> {
        let row = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO messages (name, text, image_url)
            VALUES ($1, $2, $3)
            RETURNING id, name, text, image_url, created_at
            "#,
        )
        .bind(&post.name)
        .bind(&post.text)
        .bind(post.image_url.as_deref()) // NULL when no image
        .fetch_one(&self.db)
        .await
        .context("insert message")?;
        Ok(row)
    }

    async fn update_post_text(&self, id: Uuid, text: &str) -> anyhow::Result<Option<Post>> {
        let row = sqlx::query_as::<_, Post>(
            r#"
            UPDATE messages
               SET text = $2
             WHERE id = $1
            RETURNING id, name, text, image_url, created_at
            "#,
        )
        .bind(id)
        .bind(text)
        .fetch_optional(&self.db)
        .await
        .context("update message text")?;
        Ok(row)
    }

    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete message")?;
        Ok(res.rows_affected() > 0)
    }

    async fn fetch_profile(&self) -> anyhow::Result<Option<Profile>> {
        let row = sqlx::query_as::<_, Profile>(
            r#"SELECT id, name, bio FROM user_profile ORDER BY created_at ASC LIMIT 1"#,
        )
        .fetch_optional(&self.db)
        .await
        .context("fetch profile")?;
        Ok(row)
    }

    async fn insert_profile(&self, patch: &ProfilePatch) -> anyhow::Result<Profile> {
        // slot is unique, so a racing first save turns into an update of the same row
        let row = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO user_profile (name, bio)
            VALUES ($1, $2)
            ON CONFLICT (slot) DO UPDATE
               SET name = COALESCE(EXCLUDED.name, user_profile.name),
                   bio  = COALESCE(EXCLUDED.bio,  user_profile.bio)
            RETURNING id, name, bio
            "#,
        )
        .bind(patch.name.as_deref())
        .bind(patch.bio.as_deref())
        .fetch_one(&self.db)
        .await
        .context("insert profile")?;
        Ok(row)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        patch: &ProfilePatch,
    ) -> anyhow::Result<Option<Profile>> {
        let row = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE user_profile
               SET name = COALESCE($2, name),
                   bio  = COALESCE($3, bio)
             WHERE id = $1
            RETURNING id, name, bio
            "#,
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.bio.as_deref())
        .fetch_optional(&self.db)
        .await
        .context("update profile")?;
        Ok(row)
    }

    async fn fetch_info(&self) -> anyhow::Result<Option<PersonalInfo>> {
        let row = sqlx::query_as::<_, PersonalInfo>(
            r#"
            SELECT id, dob, gender, civil, email, phone, city
              FROM user_info
             ORDER BY created_at ASC
             LIMIT 1
            "#,
        )
        .fetch_optional(&self.db)
        .await
        .context("fetch personal info")?;
        Ok(row)
    }

    async fn insert_info(&self, info: &InfoFields) -> anyhow::Result<PersonalInfo> {
        let row = sqlx::query_as::<_, PersonalInfo>(
            r#"
            INSERT INTO user_info (dob, gender, civil, email, phone, city)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (slot) DO UPDATE
               SET dob = EXCLUDED.dob, gender = EXCLUDED.gender, civil = EXCLUDED.civil,
                   email = EXCLUDED.email, phone = EXCLUDED.phone, city = EXCLUDED.city
            RETURNING id, dob, gender, civil, email, phone, city
            "#,
        )
        .bind(info.dob.as_deref())
        .bind(info.gender.as_deref())
        .bind(info.civil.as_deref())
        .bind(info.email.as_deref())
        .bind(info.phone.as_deref())
        .bind(info.city.as_deref())
        .fetch_one(&self.db)
        .await
        .context("insert personal info")?;
        Ok(row)
    }

    async fn update_info(
        &self,
        id: Uuid,
        info: &InfoFields,
    ) -> anyhow::Result<Option<PersonalInfo>> {
        let row = sqlx::query_as::<_, PersonalInfo>(
            r#"
            UPDATE user_info
               SET dob = $2, gender = $3, civil = $4, email = $5, phone = $6, city = $7
             WHERE id = $1
            RETURNING id, dob, gender, civil, email, phone, city
            "#,
        )
        .bind(id)
        .bind(info.dob.as_deref())
        .bind(info.gender.as_deref())
        .bind(info.civil.as_deref())
        .bind(info.email.as_deref())
        .bind(info.phone.as_deref())
        .bind(info.city.as_deref())
        .fetch_optional(&self.db)
        .await
        .context("update personal info")?;
        Ok(row)
    }
}
