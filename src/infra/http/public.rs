use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use quire_api_types::{
    ArchiveBucket, CategoryRef, Comment, CommentCreateRequest, CommentPage, CountedRef,
    ListingResponse, ListingView, NavToken, Navigation, PostBody, PostDetailResponse, PostSummary,
    RecentPost, SidebarResponse, TagRef, TocEntry,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::application::filter::ViewSelector;
use crate::application::listing::{self, Listing, PostDetail, Sidebar};
use crate::application::pagination::{self, NavigationWindow};
use crate::domain::comments::NewComment;
use crate::domain::entities::{CategoryRecord, CommentRecord, TagRecord};

use super::error::ApiError;
use super::middleware::{log_responses, set_request_context};
use super::{HttpState, db_health_response};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/posts", get(index))
        .route("/posts/{id}", get(post_detail))
        .route("/posts/{id}/comments", post(create_comment))
        .route("/categories/{id}", get(category_index))
        .route("/tags/{id}", get(tag_index))
        .route("/archives/{year}/{month}", get(archive_index))
        .route("/search", get(search))
        .route("/sidebar", get(sidebar))
        .route("/_health", get(health))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchQuery {
    q: Option<String>,
    page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetailQuery {
    comments_page: Option<u32>,
}

fn query_value<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::invalid_argument(rejection.body_text()))
}

fn path_value<T>(path: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    path.map(|Path(value)| value)
        .map_err(|rejection| ApiError::invalid_argument(rejection.body_text()))
}

async fn render_listing(
    state: &HttpState,
    selector: ViewSelector,
    page: Option<u32>,
) -> Result<Json<ListingResponse>, ApiError> {
    let listing = state.listing.list(selector, page.unwrap_or(1)).await?;
    Ok(Json(listing_response(listing)))
}

async fn index(
    State(state): State<HttpState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
    let query = query_value(query)?;
    render_listing(&state, ViewSelector::All, query.page).await
}

async fn category_index(
    State(state): State<HttpState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
    let id = path_value(path)?;
    let query = query_value(query)?;
    render_listing(&state, ViewSelector::ByCategory(id), query.page).await
}

async fn tag_index(
    State(state): State<HttpState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
    let id = path_value(path)?;
    let query = query_value(query)?;
    render_listing(&state, ViewSelector::ByTag(id), query.page).await
}

async fn archive_index(
    State(state): State<HttpState>,
    path: Result<Path<(i32, u32)>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
    let (year, month) = path_value(path)?;
    let query = query_value(query)?;
    render_listing(&state, ViewSelector::ByDateRange { year, month }, query.page).await
}

async fn search(
    State(state): State<HttpState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
    let query = query_value(query)?;
    let selector = ViewSelector::BySearch(query.q.unwrap_or_default());
    render_listing(&state, selector, query.page).await
}

async fn post_detail(
    State(state): State<HttpState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<DetailQuery>, QueryRejection>,
) -> Result<Json<PostDetailResponse>, ApiError> {
    let id = path_value(path)?;
    let query = query_value(query)?;
    let detail = state
        .listing
        .post_detail(id, query.comments_page.unwrap_or(1))
        .await?;
    Ok(Json(detail_response(detail)))
}

async fn create_comment(
    State(state): State<HttpState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<CommentCreateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let post_id = path_value(path)?;
    let Json(request) = body.map_err(|rejection| {
        ApiError::bad_request("Invalid request body", Some(rejection.body_text()))
    })?;

    let record = state
        .comments
        .submit(
            post_id,
            NewComment {
                name: request.name,
                email: request.email,
                url: request.url,
                text: request.text,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(comment_dto(record))).into_response())
}

async fn sidebar(State(state): State<HttpState>) -> Result<Json<SidebarResponse>, ApiError> {
    let sidebar = state.listing.sidebar().await?;
    Ok(Json(sidebar_response(sidebar)))
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.db.as_ref() {
        Some(db) => db_health_response(db.health_check().await),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn fallback() -> ApiError {
    ApiError::not_found("Route not found")
}

fn view_dto(selector: &ViewSelector) -> ListingView {
    match selector {
        ViewSelector::All => ListingView::All,
        ViewSelector::ByCategory(id) => ListingView::Category { id: *id },
        ViewSelector::ByTag(id) => ListingView::Tag { id: *id },
        ViewSelector::ByDateRange { year, month } => ListingView::Archive {
            year: *year,
            month: *month,
        },
        ViewSelector::BySearch(query) => ListingView::Search {
            query: query.clone(),
        },
    }
}

fn navigation_dto(window: &NavigationWindow) -> Navigation {
    Navigation {
        tokens: window
            .tokens
            .iter()
            .map(|token| match token {
                pagination::NavToken::Page(number) => NavToken::Page { number: *number },
                pagination::NavToken::Ellipsis => NavToken::Ellipsis,
            })
            .collect(),
        current_page: window.current_page,
        total_pages: window.total_pages,
        has_previous: window.has_previous,
        has_next: window.has_next,
        is_paginated: window.is_paginated,
        previous_page: window.previous_page(),
        next_page: window.next_page(),
    }
}

fn category_ref(category: CategoryRecord) -> CategoryRef {
    CategoryRef {
        id: category.id,
        name: category.name,
    }
}

fn tag_ref(tag: TagRecord) -> TagRef {
    TagRef {
        id: tag.id,
        name: tag.name,
    }
}

fn summary_dto(summary: listing::PostSummary) -> PostSummary {
    PostSummary {
        id: summary.id,
        title: summary.title,
        excerpt: summary.excerpt,
        author: summary.author,
        created_at: summary.created_at,
        category: summary.category.map(category_ref),
        tags: summary.tags.into_iter().map(tag_ref).collect(),
        views: summary.views,
        comment_count: summary.comment_count,
    }
}

fn comment_dto(comment: CommentRecord) -> Comment {
    Comment {
        id: comment.id,
        name: comment.name,
        url: comment.url,
        text: comment.text,
        created_at: comment.created_at,
    }
}

fn listing_response(listing: Listing) -> ListingResponse {
    let Listing {
        selector,
        page,
        navigation,
    } = listing;

    ListingResponse {
        view: view_dto(&selector),
        navigation: navigation_dto(&navigation),
        page_number: page.page_number,
        page_size: page.page_size,
        total_items: page.total_items,
        items: page.items.into_iter().map(summary_dto).collect(),
    }
}

fn detail_response(detail: PostDetail) -> PostDetailResponse {
    let PostDetail {
        post,
        category,
        tags,
        html,
        toc,
        comments,
        comment_navigation,
    } = detail;

    PostDetailResponse {
        post: PostBody {
            id: post.id,
            title: post.title,
            excerpt: post.excerpt,
            author: post.author,
            views: post.views,
            created_at: post.created_at,
            updated_at: post.updated_at,
            html,
            toc: toc
                .into_iter()
                .map(|entry| TocEntry {
                    level: entry.level,
                    anchor: entry.anchor,
                    text: entry.text,
                })
                .collect(),
        },
        category: category.map(category_ref),
        tags: tags.into_iter().map(tag_ref).collect(),
        comments: CommentPage {
            navigation: navigation_dto(&comment_navigation),
            page_number: comments.page_number,
            page_size: comments.page_size,
            total_items: comments.total_items,
            items: comments.items.into_iter().map(comment_dto).collect(),
        },
    }
}

fn sidebar_response(sidebar: Sidebar) -> SidebarResponse {
    SidebarResponse {
        categories: sidebar
            .categories
            .into_iter()
            .map(|category| CountedRef {
                id: category.id,
                name: category.name,
                count: category.count,
            })
            .collect(),
        tags: sidebar
            .tags
            .into_iter()
            .map(|tag| CountedRef {
                id: tag.id,
                name: tag.name,
                count: tag.count,
            })
            .collect(),
        archives: sidebar
            .archives
            .into_iter()
            .map(|month| ArchiveBucket {
                year: month.year,
                month: month.month,
                key: month.key,
                label: month.label,
                count: month.count,
            })
            .collect(),
        recent: sidebar
            .recent
            .into_iter()
            .map(|post| RecentPost {
                id: post.id,
                title: post.title,
                created_at: post.created_at,
            })
            .collect(),
    }
}
