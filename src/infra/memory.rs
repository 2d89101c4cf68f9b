//! Process-local repositories used when no database is configured and in tests.
//!
//! Posts are kept in canonical order (newest first, ties by descending id) so
//! every filtered listing is a subsequence of the stored vector. View
//! counters live outside the post records in a [`DashMap`], which serializes
//! increments per post without holding the post lock.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use time::{Date, OffsetDateTime, UtcOffset};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::filter::PostFilter;
use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CategoryWithCount, CommentsRepo, ContentWriteRepo, CreateCategoryParams,
    CreateCommentParams, CreatePostParams, CreateTagParams, PostsRepo, RepoError, TagWithCount,
    TaxonomyRepo,
};
use crate::domain::entities::{CategoryRecord, CommentRecord, PostRecord, TagRecord};
use crate::domain::posts::MonthCount;

#[derive(Clone, Default)]
pub struct InMemoryRepositories {
    inner: Arc<Store>,
}

#[derive(Default)]
struct Store {
    categories: RwLock<Vec<CategoryRecord>>,
    tags: RwLock<Vec<TagRecord>>,
    posts: RwLock<Vec<PostRecord>>,
    comments: RwLock<Vec<CommentRecord>>,
    views: DashMap<Uuid, u64>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current view counter of `id`, if the post exists.
    pub fn views_of(&self, id: Uuid) -> Option<u64> {
        self.inner.views.get(&id).map(|entry| *entry)
    }

    fn with_views(&self, mut post: PostRecord) -> PostRecord {
        if let Some(views) = self.views_of(post.id) {
            post.views = views;
        }
        post
    }
}

fn canonical_key(post: &PostRecord) -> Reverse<(OffsetDateTime, Uuid)> {
    Reverse((post.created_at, post.id))
}

fn month_start(post: &PostRecord) -> Date {
    let created = post.created_at.to_offset(UtcOffset::UTC);
    Date::from_calendar_date(created.year(), created.month(), 1).unwrap_or(created.date())
}

#[async_trait]
impl PostsRepo for InMemoryRepositories {
    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        let posts = self.inner.posts.read().await;
        Ok(posts.iter().filter(|post| filter.matches(post)).count() as u64)
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let offset = usize::try_from(page.offset).map_err(|_| RepoError::InvalidInput {
            message: "page offset exceeds supported range".to_string(),
        })?;

        let posts = self.inner.posts.read().await;
        Ok(posts
            .iter()
            .filter(|post| filter.matches(post))
            .skip(offset)
            .take(page.limit as usize)
            .cloned()
            .map(|post| self.with_views(post))
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let posts = self.inner.posts.read().await;
        Ok(posts
            .iter()
            .find(|post| post.id == id)
            .cloned()
            .map(|post| self.with_views(post)))
    }

    async fn increment_views(&self, id: Uuid) -> Result<u64, RepoError> {
        let mut entry = self.inner.views.get_mut(&id).ok_or(RepoError::NotFound)?;
        *entry += 1;
        Ok(*entry)
    }

    async fn list_month_counts(&self) -> Result<Vec<MonthCount>, RepoError> {
        let posts = self.inner.posts.read().await;
        let mut buckets: BTreeMap<Reverse<Date>, u64> = BTreeMap::new();
        for post in posts.iter() {
            *buckets.entry(Reverse(month_start(post))).or_default() += 1;
        }

        Ok(buckets
            .into_iter()
            .map(|(Reverse(date), count)| MonthCount::new(date, count))
            .collect())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        let posts = self.inner.posts.read().await;
        Ok(posts
            .iter()
            .take(limit as usize)
            .cloned()
            .map(|post| self.with_views(post))
            .collect())
    }
}

#[async_trait]
impl TaxonomyRepo for InMemoryRepositories {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let mut categories = self.inner.categories.read().await.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn list_tags(&self) -> Result<Vec<TagRecord>, RepoError> {
        let mut tags = self.inner.tags.read().await.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn list_categories_with_counts(&self) -> Result<Vec<CategoryWithCount>, RepoError> {
        let categories = self.list_categories().await?;
        let posts = self.inner.posts.read().await;

        Ok(categories
            .into_iter()
            .map(|category| CategoryWithCount {
                count: posts
                    .iter()
                    .filter(|post| post.category_id == category.id)
                    .count() as u64,
                id: category.id,
                name: category.name,
            })
            .collect())
    }

    async fn list_tags_with_counts(&self) -> Result<Vec<TagWithCount>, RepoError> {
        let tags = self.list_tags().await?;
        let posts = self.inner.posts.read().await;

        Ok(tags
            .into_iter()
            .map(|tag| TagWithCount {
                count: posts
                    .iter()
                    .filter(|post| post.tag_ids.contains(&tag.id))
                    .count() as u64,
                id: tag.id,
                name: tag.name,
            })
            .collect())
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        let categories = self.inner.categories.read().await;
        Ok(categories.iter().find(|category| category.id == id).cloned())
    }

    async fn list_tags_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError> {
        let tag_ids = {
            let posts = self.inner.posts.read().await;
            match posts.iter().find(|post| post.id == post_id) {
                Some(post) => post.tag_ids.clone(),
                None => return Ok(Vec::new()),
            }
        };

        let mut tags: Vec<TagRecord> = self
            .inner
            .tags
            .read()
            .await
            .iter()
            .filter(|tag| tag_ids.contains(&tag.id))
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}

#[async_trait]
impl CommentsRepo for InMemoryRepositories {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let comments = self.inner.comments.read().await;
        let mut matching: Vec<CommentRecord> = comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        matching.sort_by_key(|comment| Reverse((comment.created_at, comment.id)));
        Ok(matching)
    }

    async fn count_for_posts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError> {
        let comments = self.inner.comments.read().await;
        let mut counts = HashMap::new();
        for comment in comments.iter() {
            if post_ids.contains(&comment.post_id) {
                *counts.entry(comment.post_id).or_default() += 1;
            }
        }
        Ok(counts)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        if !self.inner.views.contains_key(&params.post_id) {
            return Err(RepoError::NotFound);
        }

        let record = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            name: params.name,
            email: params.email,
            url: params.url,
            text: params.text,
            created_at: params.created_at,
        };
        self.inner.comments.write().await.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl ContentWriteRepo for InMemoryRepositories {
    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut categories = self.inner.categories.write().await;
        if categories.iter().any(|category| category.name == params.name) {
            return Err(RepoError::Duplicate {
                constraint: "categories_name_key".to_string(),
            });
        }

        let record = CategoryRecord {
            id: Uuid::new_v4(),
            name: params.name,
        };
        categories.push(record.clone());
        Ok(record)
    }

    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError> {
        let mut tags = self.inner.tags.write().await;
        if tags.iter().any(|tag| tag.name == params.name) {
            return Err(RepoError::Duplicate {
                constraint: "tags_name_key".to_string(),
            });
        }

        let record = TagRecord {
            id: Uuid::new_v4(),
            name: params.name,
        };
        tags.push(record.clone());
        Ok(record)
    }

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        if self.find_category(params.category_id).await?.is_none() {
            return Err(RepoError::InvalidInput {
                message: format!("category `{}` does not exist", params.category_id),
            });
        }

        let mut tag_ids = params.tag_ids;
        tag_ids.sort();
        tag_ids.dedup();
        {
            let tags = self.inner.tags.read().await;
            if let Some(missing) = tag_ids
                .iter()
                .find(|id| !tags.iter().any(|tag| tag.id == **id))
            {
                return Err(RepoError::InvalidInput {
                    message: format!("tag `{missing}` does not exist"),
                });
            }
        }

        let record = PostRecord {
            id: Uuid::new_v4(),
            title: params.title,
            body_markdown: params.body_markdown,
            excerpt: params.excerpt,
            author: params.author,
            category_id: params.category_id,
            tag_ids,
            views: params.views,
            created_at: params.created_at,
            updated_at: params.updated_at,
        };

        let mut posts = self.inner.posts.write().await;
        let key = canonical_key(&record);
        let position = posts.partition_point(|post| canonical_key(post) < key);
        posts.insert(position, record.clone());
        self.inner.views.insert(record.id, record.views);

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::filter::{PostPredicate, SortOrder};

    async fn seeded() -> (InMemoryRepositories, CategoryRecord, TagRecord) {
        let repo = InMemoryRepositories::new();
        let category = repo
            .create_category(CreateCategoryParams {
                name: "notes".to_string(),
            })
            .await
            .expect("category");
        let tag = repo
            .create_tag(CreateTagParams {
                name: "rust".to_string(),
            })
            .await
            .expect("tag");

        for (title, created_at, tagged) in [
            ("middle", datetime!(2023-02-10 08:00 UTC), true),
            ("oldest", datetime!(2023-01-05 08:00 UTC), false),
            ("newest", datetime!(2023-03-01 08:00 UTC), true),
        ] {
            repo.create_post(CreatePostParams {
                title: title.to_string(),
                body_markdown: format!("body of {title}"),
                excerpt: String::new(),
                author: "admin".to_string(),
                category_id: category.id,
                tag_ids: if tagged { vec![tag.id] } else { Vec::new() },
                views: 0,
                created_at,
                updated_at: created_at,
            })
            .await
            .expect("post");
        }

        (repo, category, tag)
    }

    fn titles(posts: &[PostRecord]) -> Vec<&str> {
        posts.iter().map(|post| post.title.as_str()).collect()
    }

    #[tokio::test]
    async fn posts_are_kept_newest_first() {
        let (repo, _, _) = seeded().await;
        let posts = repo
            .list_posts(&PostFilter::all(), PageRequest::new(0, 10))
            .await
            .expect("list");
        assert_eq!(titles(&posts), ["newest", "middle", "oldest"]);
    }

    #[tokio::test]
    async fn filtered_page_respects_offset_and_limit() {
        let (repo, _, tag) = seeded().await;
        let filter = PostFilter {
            predicate: PostPredicate::Tag(tag.id),
            sort: SortOrder::CreatedDesc,
        };

        assert_eq!(repo.count_posts(&filter).await.expect("count"), 2);
        let posts = repo
            .list_posts(&filter, PageRequest::new(1, 1))
            .await
            .expect("list");
        assert_eq!(titles(&posts), ["middle"]);
    }

    #[tokio::test]
    async fn increment_views_counts_each_call() {
        let (repo, _, _) = seeded().await;
        let post = repo.list_recent(1).await.expect("recent").remove(0);

        assert_eq!(repo.increment_views(post.id).await.expect("view"), 1);
        assert_eq!(repo.increment_views(post.id).await.expect("view"), 2);
        let found = repo.find_by_id(post.id).await.expect("find").expect("post");
        assert_eq!(found.views, 2);

        assert!(matches!(
            repo.increment_views(Uuid::new_v4()).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn month_counts_are_newest_first() {
        let (repo, _, _) = seeded().await;
        let months = repo.list_month_counts().await.expect("months");
        let keys: Vec<&str> = months.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, ["2023-03", "2023-02", "2023-01"]);
        assert!(months.iter().all(|m| m.count == 1));
    }

    #[tokio::test]
    async fn taxonomy_counts_follow_posts() {
        let (repo, category, tag) = seeded().await;
        let categories = repo.list_categories_with_counts().await.expect("categories");
        assert_eq!(categories[0].id, category.id);
        assert_eq!(categories[0].count, 3);

        let tags = repo.list_tags_with_counts().await.expect("tags");
        assert_eq!(tags[0].id, tag.id);
        assert_eq!(tags[0].count, 2);
    }

    #[tokio::test]
    async fn duplicate_category_is_rejected() {
        let (repo, _, _) = seeded().await;
        let err = repo
            .create_category(CreateCategoryParams {
                name: "notes".to_string(),
            })
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn comments_require_existing_post() {
        let (repo, _, _) = seeded().await;
        let err = repo
            .create_comment(CreateCommentParams {
                post_id: Uuid::new_v4(),
                name: "reader".to_string(),
                email: "reader@example.com".to_string(),
                url: None,
                text: "hello".to_string(),
                created_at: datetime!(2023-03-02 08:00 UTC),
            })
            .await
            .expect_err("missing post");
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn comments_are_listed_newest_first() {
        let (repo, _, _) = seeded().await;
        let post = repo.list_recent(1).await.expect("recent").remove(0);

        for (text, created_at) in [
            ("first", datetime!(2023-03-02 08:00 UTC)),
            ("second", datetime!(2023-03-03 08:00 UTC)),
        ] {
            repo.create_comment(CreateCommentParams {
                post_id: post.id,
                name: "reader".to_string(),
                email: "reader@example.com".to_string(),
                url: None,
                text: text.to_string(),
                created_at,
            })
            .await
            .expect("comment");
        }

        let comments = repo.list_for_post(post.id).await.expect("comments");
        let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["second", "first"]);

        let counts = repo.count_for_posts(&[post.id]).await.expect("counts");
        assert_eq!(counts.get(&post.id), Some(&2));
    }
}
