use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use crate::application::repos::{CategoryWithCount, RepoError, TagWithCount, TaxonomyRepo};
use crate::domain::entities::{CategoryRecord, TagRecord};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(FromRow)]
pub(super) struct NamedRow {
    pub(super) id: Uuid,
    pub(super) name: String,
}

impl From<NamedRow> for CategoryRecord {
    fn from(row: NamedRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

impl From<NamedRow> for TagRecord {
    fn from(row: NamedRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(FromRow)]
struct CountedRow {
    id: Uuid,
    name: String,
    count: i64,
}

#[async_trait]
impl TaxonomyRepo for PostgresRepositories {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, NamedRow>("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CategoryRecord::from).collect())
    }

    async fn list_tags(&self) -> Result<Vec<TagRecord>, RepoError> {
        let rows = sqlx::query_as::<_, NamedRow>("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TagRecord::from).collect())
    }

    async fn list_categories_with_counts(&self) -> Result<Vec<CategoryWithCount>, RepoError> {
        let rows = sqlx::query_as::<_, CountedRow>(
            r#"
            SELECT c.id, c.name, COUNT(p.id) AS count
            FROM categories c
            LEFT JOIN posts p ON p.category_id = c.id
            GROUP BY c.id, c.name
            ORDER BY c.name
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(CategoryWithCount {
                    id: row.id,
                    name: row.name,
                    count: Self::convert_count(row.count)?,
                })
            })
            .collect()
    }

    async fn list_tags_with_counts(&self) -> Result<Vec<TagWithCount>, RepoError> {
        let rows = sqlx::query_as::<_, CountedRow>(
            r#"
            SELECT t.id, t.name, COUNT(pt.post_id) AS count
            FROM tags t
            LEFT JOIN post_tags pt ON pt.tag_id = t.id
            GROUP BY t.id, t.name
            ORDER BY t.name
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(TagWithCount {
                    id: row.id,
                    name: row.name,
                    count: Self::convert_count(row.count)?,
                })
            })
            .collect()
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        let row = sqlx::query_as::<_, NamedRow>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(CategoryRecord::from))
    }

    async fn list_tags_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError> {
        let rows = sqlx::query_as::<_, NamedRow>(
            r#"
            SELECT t.id, t.name
            FROM tags t
            INNER JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TagRecord::from).collect())
    }
}
