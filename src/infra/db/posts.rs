use async_trait::async_trait;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::filter::PostFilter;
use crate::application::pagination::PageRequest;
use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::posts::MonthCount;

use super::{POST_COLUMNS, PostgresRepositories, map_sqlx_error};

#[derive(FromRow)]
struct PostRow {
    id: Uuid,
    title: String,
    body_markdown: String,
    excerpt: String,
    author: String,
    category_id: Uuid,
    tag_ids: Vec<Uuid>,
    views: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<PostRow> for PostRecord {
    type Error = RepoError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            body_markdown: row.body_markdown,
            excerpt: row.excerpt,
            author: row.author,
            category_id: row.category_id,
            tag_ids: row.tag_ids,
            views: PostgresRepositories::convert_count(row.views)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct MonthRow {
    month: Date,
    count: i64,
}

fn into_records(rows: Vec<PostRow>) -> Result<Vec<PostRecord>, RepoError> {
    rows.into_iter().map(PostRecord::try_from).collect()
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        let mut qb = Self::filtered_posts("SELECT COUNT(*)", filter);
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let offset = i64::try_from(page.offset).map_err(|_| RepoError::InvalidInput {
            message: "page offset exceeds supported range".to_string(),
        })?;

        let select = format!("SELECT {POST_COLUMNS}");
        let mut qb = Self::filtered_posts(&select, filter);
        Self::push_order(&mut qb, filter.sort);
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(page.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        into_records(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(PostRecord::try_from).transpose()
    }

    async fn increment_views(&self, id: Uuid) -> Result<u64, RepoError> {
        let views: i64 =
            sqlx::query_scalar("UPDATE posts SET views = views + 1 WHERE id = $1 RETURNING views")
                .bind(id)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Self::convert_count(views)
    }

    async fn list_month_counts(&self) -> Result<Vec<MonthCount>, RepoError> {
        let rows = sqlx::query_as::<_, MonthRow>(
            r#"
            SELECT date_trunc('month', created_at AT TIME ZONE 'UTC')::date AS month,
                   COUNT(*) AS count
            FROM posts
            GROUP BY 1
            ORDER BY 1 DESC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| Ok(MonthCount::new(row.month, Self::convert_count(row.count)?)))
            .collect()
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p ORDER BY p.created_at DESC, p.id DESC LIMIT $1"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        into_records(rows)
    }
}
