#![allow(dead_code)]

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime, macros::datetime};
use uuid::Uuid;

use quire::application::comments::CommentService;
use quire::application::filter::PostFilter;
use quire::application::listing::ListingService;
use quire::application::pagination::PageRequest;
use quire::application::render::render_service;
use quire::application::repos::{
    ContentWriteRepo, CreateCategoryParams, CreatePostParams, CreateTagParams, PostsRepo,
    RepoError,
};
use quire::config::ListingSettings;
use quire::domain::entities::{CategoryRecord, PostRecord, TagRecord};
use quire::domain::posts::MonthCount;
use quire::infra::memory::InMemoryRepositories;

pub const POST_COUNT: usize = 25;

pub struct Fixture {
    pub repo: InMemoryRepositories,
    pub notes: CategoryRecord,
    pub travel: CategoryRecord,
    /// Has no posts.
    pub drafts: CategoryRecord,
    pub rust: TagRecord,
    pub web: TagRecord,
    /// Stored posts, newest first.
    pub posts: Vec<PostRecord>,
}

pub fn first_created_at() -> OffsetDateTime {
    datetime!(2023-01-01 12:00 UTC)
}

/// 25 posts five days apart from 2023-01-01: every third in "travel", even
/// ones tagged "rust", every fifth tagged "web", every fourth mentions Rust.
pub async fn fixture() -> Fixture {
    let repo = InMemoryRepositories::new();
    let notes = category(&repo, "notes").await;
    let travel = category(&repo, "travel").await;
    let drafts = category(&repo, "drafts").await;
    let rust = tag(&repo, "rust").await;
    let web = tag(&repo, "web").await;

    let mut posts = Vec::with_capacity(POST_COUNT);
    for i in 0..POST_COUNT {
        let created_at = first_created_at() + Duration::days(5 * i as i64);
        let mut tag_ids = Vec::new();
        if i % 2 == 0 {
            tag_ids.push(rust.id);
        }
        if i % 5 == 0 {
            tag_ids.push(web.id);
        }
        let body_markdown = if i % 4 == 0 {
            format!("# Entry {i}\n\nWriting about RUST ownership.")
        } else {
            format!("# Entry {i}\n\nPlain notes for the day.")
        };

        let record = repo
            .create_post(CreatePostParams {
                title: format!("Post {i:02}"),
                body_markdown,
                excerpt: format!("Excerpt {i:02}"),
                author: "admin".to_string(),
                category_id: if i % 3 == 0 { travel.id } else { notes.id },
                tag_ids,
                views: 0,
                created_at,
                updated_at: created_at,
            })
            .await
            .expect("create post");
        posts.push(record);
    }
    posts.reverse();

    Fixture {
        repo,
        notes,
        travel,
        drafts,
        rust,
        web,
        posts,
    }
}

async fn category(repo: &InMemoryRepositories, name: &str) -> CategoryRecord {
    repo.create_category(CreateCategoryParams {
        name: name.to_string(),
    })
    .await
    .expect("create category")
}

async fn tag(repo: &InMemoryRepositories, name: &str) -> TagRecord {
    repo.create_tag(CreateTagParams {
        name: name.to_string(),
    })
    .await
    .expect("create tag")
}

pub fn settings(page_size: u32, comment_page_size: u32) -> ListingSettings {
    ListingSettings {
        page_size: NonZeroU32::new(page_size).expect("non-zero page size"),
        comment_page_size: NonZeroU32::new(comment_page_size).expect("non-zero comment page size"),
    }
}

pub fn listing_service(
    posts: Arc<dyn PostsRepo>,
    repo: &InMemoryRepositories,
    settings: ListingSettings,
) -> ListingService {
    let store = Arc::new(repo.clone());
    ListingService::new(posts, store.clone(), store, render_service(), settings)
}

pub fn comment_service(repo: &InMemoryRepositories) -> CommentService {
    let store = Arc::new(repo.clone());
    CommentService::new(store.clone(), store)
}

/// Post storage that counts every call before delegating.
pub struct CountingPosts {
    inner: InMemoryRepositories,
    calls: AtomicUsize,
}

impl CountingPosts {
    pub fn new(inner: InMemoryRepositories) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PostsRepo for CountingPosts {
    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        self.record();
        self.inner.count_posts(filter).await
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError> {
        self.record();
        self.inner.list_posts(filter, page).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        self.record();
        self.inner.find_by_id(id).await
    }

    async fn increment_views(&self, id: Uuid) -> Result<u64, RepoError> {
        self.record();
        self.inner.increment_views(id).await
    }

    async fn list_month_counts(&self) -> Result<Vec<MonthCount>, RepoError> {
        self.record();
        self.inner.list_month_counts().await
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        self.record();
        self.inner.list_recent(limit).await
    }
}
