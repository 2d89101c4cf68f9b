//! Listing service: drives the filter resolver and the pagination engine
//! against storage.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::application::filter::{ResolverError, Taxonomy, ViewSelector, resolve};
use crate::application::pagination::{
    NavigationWindow, Page, PaginationError, ensure_page_number, paginate, slice,
};
use crate::application::render::{RenderError, RenderRequest, RenderService, TocEntry};
use crate::application::repos::{
    CategoryWithCount, CommentsRepo, PostsRepo, RepoError, TagWithCount, TaxonomyRepo,
};
use crate::config::ListingSettings;
use crate::domain::entities::{CategoryRecord, CommentRecord, PostRecord, TagRecord};
use crate::domain::posts::MonthCount;

/// Number of posts shown in the sidebar's "recent" block.
pub const RECENT_POSTS_LIMIT: u32 = 5;

#[derive(Debug, Error)]
pub enum ListingError {
    #[error(transparent)]
    Resolve(#[from] ResolverError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error("post `{0}` not found")]
    PostNotFound(Uuid),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A post as shown in a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub author: String,
    pub created_at: OffsetDateTime,
    pub category: Option<CategoryRecord>,
    pub tags: Vec<TagRecord>,
    pub views: u64,
    pub comment_count: u64,
}

#[derive(Debug, Clone)]
pub struct Listing {
    pub selector: ViewSelector,
    pub page: Page<PostSummary>,
    pub navigation: NavigationWindow,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub category: Option<CategoryRecord>,
    pub tags: Vec<TagRecord>,
    pub html: String,
    pub toc: Vec<TocEntry>,
    pub comments: Page<CommentRecord>,
    pub comment_navigation: NavigationWindow,
}

#[derive(Debug, Clone)]
pub struct Sidebar {
    pub categories: Vec<CategoryWithCount>,
    pub tags: Vec<TagWithCount>,
    pub archives: Vec<MonthCount>,
    pub recent: Vec<PostRecord>,
}

#[derive(Clone)]
pub struct ListingService {
    posts: Arc<dyn PostsRepo>,
    taxonomy: Arc<dyn TaxonomyRepo>,
    comments: Arc<dyn CommentsRepo>,
    renderer: Arc<dyn RenderService>,
    settings: ListingSettings,
}

impl ListingService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        taxonomy: Arc<dyn TaxonomyRepo>,
        comments: Arc<dyn CommentsRepo>,
        renderer: Arc<dyn RenderService>,
        settings: ListingSettings,
    ) -> Self {
        Self {
            posts,
            taxonomy,
            comments,
            renderer,
            settings,
        }
    }

    /// One page of the listing `selector` describes.
    pub async fn list(
        &self,
        selector: ViewSelector,
        requested_page: u32,
    ) -> Result<Listing, ListingError> {
        counter!("quire_listing_requests_total", "view" => selector.kind()).increment(1);
        ensure_page_number(requested_page)?;

        let needs_taxonomy = matches!(
            selector,
            ViewSelector::ByCategory(_) | ViewSelector::ByTag(_)
        );
        let catalog = if needs_taxonomy {
            Some(self.catalog().await?)
        } else {
            None
        };
        let taxonomy = catalog
            .as_ref()
            .map(Catalog::taxonomy)
            .unwrap_or_default();
        let filter = resolve(&selector, &taxonomy)?;

        let page_size = self.settings.page_size.get();
        let total_items = self.posts.count_posts(&filter).await?;
        let navigation = paginate(total_items, page_size, requested_page)?;

        let records = if total_items == 0 {
            Vec::new()
        } else {
            self.posts
                .list_posts(&filter, navigation.page_request(page_size))
                .await?
        };

        debug!(
            target = "quire::application::listing",
            view = selector.kind(),
            requested_page,
            current_page = navigation.current_page,
            total_items,
            returned = records.len(),
            "listing resolved"
        );

        let catalog = match catalog {
            Some(catalog) => catalog,
            None => self.catalog().await?,
        };
        let items = self.summarize(records, &catalog).await?;

        Ok(Listing {
            selector,
            page: Page::new(items, navigation.current_page, page_size, total_items),
            navigation,
        })
    }

    /// Full post with rendered body and one page of its comments. Counts as a
    /// view of the post.
    pub async fn post_detail(
        &self,
        id: Uuid,
        comments_page: u32,
    ) -> Result<PostDetail, ListingError> {
        ensure_page_number(comments_page)?;

        let mut post = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or(ListingError::PostNotFound(id))?;

        let rendered = self
            .renderer
            .render(&RenderRequest::new(post.body_markdown.clone()))?;

        let category = self.taxonomy.find_category(post.category_id).await?;
        let tags = self.taxonomy.list_tags_for_post(id).await?;

        let comment_page_size = self.settings.comment_page_size.get();
        let comments = self.comments.list_for_post(id).await?;
        let comment_navigation =
            paginate(comments.len() as u64, comment_page_size, comments_page)?;
        let comments = slice(comments, comment_page_size, comments_page)?;

        // Counted only once everything else has loaded.
        post.views = match self.posts.increment_views(id).await {
            Ok(views) => views,
            Err(RepoError::NotFound) => return Err(ListingError::PostNotFound(id)),
            Err(err) => return Err(err.into()),
        };
        counter!("quire_post_views_total").increment(1);

        Ok(PostDetail {
            post,
            category,
            tags,
            html: rendered.html,
            toc: rendered.toc,
            comments,
            comment_navigation,
        })
    }

    pub async fn sidebar(&self) -> Result<Sidebar, ListingError> {
        Ok(Sidebar {
            categories: self.taxonomy.list_categories_with_counts().await?,
            tags: self.taxonomy.list_tags_with_counts().await?,
            archives: self.posts.list_month_counts().await?,
            recent: self.posts.list_recent(RECENT_POSTS_LIMIT).await?,
        })
    }

    async fn catalog(&self) -> Result<Catalog, RepoError> {
        let categories = self.taxonomy.list_categories().await?;
        let tags = self.taxonomy.list_tags().await?;
        Ok(Catalog::new(categories, tags))
    }

    async fn summarize(
        &self,
        records: Vec<PostRecord>,
        catalog: &Catalog,
    ) -> Result<Vec<PostSummary>, RepoError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = records.iter().map(|post| post.id).collect();
        let comment_counts = self.comments.count_for_posts(&ids).await?;

        Ok(records
            .into_iter()
            .map(|post| PostSummary {
                id: post.id,
                comment_count: comment_counts.get(&post.id).copied().unwrap_or(0),
                category: catalog.categories.get(&post.category_id).cloned(),
                tags: post
                    .tag_ids
                    .iter()
                    .filter_map(|tag_id| catalog.tags.get(tag_id).cloned())
                    .collect(),
                title: post.title,
                excerpt: post.excerpt,
                author: post.author,
                created_at: post.created_at,
                views: post.views,
            })
            .collect())
    }
}

/// Categories and tags by id, loaded once per request.
struct Catalog {
    categories: HashMap<Uuid, CategoryRecord>,
    tags: HashMap<Uuid, TagRecord>,
}

impl Catalog {
    fn new(categories: Vec<CategoryRecord>, tags: Vec<TagRecord>) -> Self {
        Self {
            categories: categories.into_iter().map(|c| (c.id, c)).collect(),
            tags: tags.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    fn taxonomy(&self) -> Taxonomy {
        Taxonomy::new(self.categories.keys().copied(), self.tags.keys().copied())
    }
}
