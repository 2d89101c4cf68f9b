use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{
    ContentWriteRepo, CreateCategoryParams, CreatePostParams, CreateTagParams, RepoError,
};
use crate::domain::entities::{CategoryRecord, PostRecord, TagRecord};

use super::taxonomy::NamedRow;
use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl ContentWriteRepo for PostgresRepositories {
    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let row = sqlx::query_as::<_, NamedRow>(
            "INSERT INTO categories (id, name) VALUES ($1, $2) RETURNING id, name",
        )
        .bind(Uuid::new_v4())
        .bind(params.name)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CategoryRecord::from(row))
    }

    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError> {
        let row = sqlx::query_as::<_, NamedRow>(
            "INSERT INTO tags (id, name) VALUES ($1, $2) RETURNING id, name",
        )
        .bind(Uuid::new_v4())
        .bind(params.name)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(TagRecord::from(row))
    }

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let views = i64::try_from(params.views).map_err(|_| RepoError::InvalidInput {
            message: "view count exceeds supported range".to_string(),
        })?;
        let id = Uuid::new_v4();

        let mut tag_ids = params.tag_ids;
        tag_ids.sort();
        tag_ids.dedup();

        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, title, body_markdown, excerpt, author, category_id,
                               views, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(&params.title)
        .bind(&params.body_markdown)
        .bind(&params.excerpt)
        .bind(&params.author)
        .bind(params.category_id)
        .bind(views)
        .bind(params.created_at)
        .bind(params.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if !tag_ids.is_empty() {
            sqlx::query(
                "INSERT INTO post_tags (post_id, tag_id) SELECT $1, UNNEST($2::uuid[])",
            )
            .bind(id)
            .bind(&tag_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(PostRecord {
            id,
            title: params.title,
            body_markdown: params.body_markdown,
            excerpt: params.excerpt,
            author: params.author,
            category_id: params.category_id,
            tag_ids,
            views: params.views,
            created_at: params.created_at,
            updated_at: params.updated_at,
        })
    }
}
