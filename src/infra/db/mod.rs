//! Postgres-backed repository implementations.

mod comments;
mod posts;
mod taxonomy;
mod write;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    migrate::MigrateError,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::filter::{PostFilter, PostPredicate, SortOrder};
use crate::application::repos::RepoError;

/// Columns of a post row, tag ids aggregated from `post_tags`.
const POST_COLUMNS: &str = "p.id, p.title, p.body_markdown, p.excerpt, p.author, \
    p.category_id, p.views, p.created_at, p.updated_at, \
    COALESCE((SELECT array_agg(pt.tag_id ORDER BY pt.tag_id) FROM post_tags pt \
        WHERE pt.post_id = p.id), '{}') AS tag_ids";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Append the `AND ...` clause for `predicate`. The query must already
    /// contain a `WHERE` over `posts p`.
    fn push_predicate<'q>(qb: &mut QueryBuilder<'q, Postgres>, predicate: &'q PostPredicate) {
        match predicate {
            PostPredicate::Any => {}
            PostPredicate::Category(id) => {
                qb.push(" AND p.category_id = ");
                qb.push_bind(*id);
            }
            PostPredicate::Tag(id) => {
                qb.push(
                    " AND EXISTS (SELECT 1 FROM post_tags pt WHERE pt.post_id = p.id AND pt.tag_id = ",
                );
                qb.push_bind(*id);
                qb.push(")");
            }
            PostPredicate::CreatedWithin { start, end } => {
                qb.push(" AND p.created_at >= ");
                qb.push_bind(*start);
                qb.push(" AND p.created_at < ");
                qb.push_bind(*end);
            }
            PostPredicate::Search(needle) => {
                qb.push(" AND (strpos(LOWER(p.title), ");
                qb.push_bind(needle.as_str());
                qb.push(") > 0 OR strpos(LOWER(p.body_markdown), ");
                qb.push_bind(needle.as_str());
                qb.push(") > 0)");
            }
        }
    }

    fn push_order(qb: &mut QueryBuilder<'_, Postgres>, sort: SortOrder) {
        match sort {
            SortOrder::CreatedDesc => {
                qb.push(" ORDER BY p.created_at DESC, p.id DESC ");
            }
        }
    }

    fn filtered_posts<'q>(select: &str, filter: &'q PostFilter) -> QueryBuilder<'q, Postgres> {
        let mut qb = QueryBuilder::new(select);
        qb.push(" FROM posts p WHERE 1=1 ");
        Self::push_predicate(&mut qb, &filter.predicate);
        qb
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

/// Classify a driver error by its SQLSTATE code.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            },
            Some("23503") | Some("22P02") => RepoError::InvalidInput {
                message: db.message().to_string(),
            },
            Some("57014") => RepoError::Timeout,
            Some(code) if code.starts_with("23") => RepoError::Integrity {
                message: db.message().to_string(),
            },
            _ => RepoError::from_persistence(db),
        },
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        other => RepoError::from_persistence(other),
    }
}
