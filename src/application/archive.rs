//! TOML content archives: the format used to seed a fresh store or to import
//! an existing blog.
//!
//! ```toml
//! [[categories]]
//! name = "Rust"
//!
//! [[tags]]
//! name = "async"
//!
//! [[posts]]
//! key = "hello"
//! title = "Hello"
//! category = "Rust"
//! tags = ["async"]
//! created_at = "2023-05-01T10:00:00Z"
//! body_markdown = "# Hello"
//!
//! [[comments]]
//! post = "hello"
//! name = "Reader"
//! email = "reader@example.com"
//! text = "Nice post"
//! ```

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::render::{RenderError, RenderRequest, RenderService};
use crate::application::repos::{
    ContentWriteRepo, CreateCategoryParams, CreateCommentParams, CreatePostParams,
    CreateTagParams, RepoError,
};
use crate::domain::comments::NewComment;
use crate::domain::error::DomainError;

pub const DEFAULT_AUTHOR: &str = "admin";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to read archive `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid archive: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid archive content: {0}")]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentArchive {
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
    #[serde(default)]
    pub tags: Vec<TagEntry>,
    #[serde(default)]
    pub posts: Vec<PostEntry>,
    #[serde(default)]
    pub comments: Vec<CommentEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagEntry {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostEntry {
    /// Archive-local identifier comments refer to.
    pub key: String,
    pub title: String,
    pub body_markdown: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default = "default_author")]
    pub author: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub views: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentEntry {
    pub post: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub url: Option<String>,
    pub text: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

/// Counts of records written by [`load_archive`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub categories: usize,
    pub tags: usize,
    pub posts: usize,
    pub comments: usize,
}

pub fn parse_archive(data: &str) -> Result<ContentArchive, ArchiveError> {
    let mut archive: ContentArchive = toml::from_str(data)?;
    archive.normalize();
    archive.validate()?;
    Ok(archive)
}

pub async fn read_archive(path: &Path) -> Result<ContentArchive, ArchiveError> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ArchiveError::Io {
            path: path.display().to_string(),
            source,
        })?;
    parse_archive(&data)
}

/// Read the archive at `path` and write its content through `repo`.
pub async fn import_file(
    repo: &dyn ContentWriteRepo,
    renderer: &dyn RenderService,
    path: &Path,
) -> Result<ImportSummary, ArchiveError> {
    let archive = read_archive(path).await?;
    let summary = load_archive(repo, renderer, archive).await?;
    info!(
        target = "quire::application::archive",
        path = %path.display(),
        categories = summary.categories,
        tags = summary.tags,
        posts = summary.posts,
        comments = summary.comments,
        "archive imported"
    );
    Ok(summary)
}

/// Write a validated archive. Posts without an excerpt get one derived from
/// their rendered body.
pub async fn load_archive(
    repo: &dyn ContentWriteRepo,
    renderer: &dyn RenderService,
    archive: ContentArchive,
) -> Result<ImportSummary, ArchiveError> {
    let mut summary = ImportSummary::default();

    let mut category_ids: HashMap<String, Uuid> = HashMap::new();
    for category in archive.categories {
        let record = repo
            .create_category(CreateCategoryParams {
                name: category.name,
            })
            .await?;
        category_ids.insert(record.name.clone(), record.id);
        summary.categories += 1;
    }

    let mut tag_ids: HashMap<String, Uuid> = HashMap::new();
    for tag in archive.tags {
        let record = repo.create_tag(CreateTagParams { name: tag.name }).await?;
        tag_ids.insert(record.name.clone(), record.id);
        summary.tags += 1;
    }

    let mut post_ids: HashMap<String, Uuid> = HashMap::new();
    for post in archive.posts {
        let category_id = lookup(&category_ids, &post.category, "category")?;
        let tag_ids = post
            .tags
            .iter()
            .map(|name| lookup(&tag_ids, name, "tags"))
            .collect::<Result<Vec<_>, _>>()?;
        let excerpt = if post.excerpt.is_empty() {
            renderer
                .render(&RenderRequest::new(post.body_markdown.clone()))?
                .excerpt
        } else {
            post.excerpt
        };

        let record = repo
            .create_post(CreatePostParams {
                title: post.title,
                body_markdown: post.body_markdown,
                excerpt,
                author: post.author,
                category_id,
                tag_ids,
                views: post.views,
                created_at: post.created_at,
                updated_at: post.updated_at.unwrap_or(post.created_at),
            })
            .await?;
        post_ids.insert(post.key, record.id);
        summary.posts += 1;
    }

    for comment in archive.comments {
        let post_id = lookup(&post_ids, &comment.post, "post")?;
        let valid = NewComment {
            name: comment.name,
            email: comment.email,
            url: comment.url,
            text: comment.text,
        }
        .validate()?;

        repo.create_comment(CreateCommentParams {
            post_id,
            name: valid.name,
            email: valid.email,
            url: valid.url,
            text: valid.text,
            created_at: comment.created_at.unwrap_or_else(OffsetDateTime::now_utc),
        })
        .await?;
        summary.comments += 1;
    }

    Ok(summary)
}

fn lookup(ids: &HashMap<String, Uuid>, name: &str, field: &'static str) -> Result<Uuid, DomainError> {
    ids.get(name)
        .copied()
        .ok_or_else(|| DomainError::validation(field, format!("unknown {field} `{name}`")))
}

impl ContentArchive {
    fn normalize(&mut self) {
        for category in &mut self.categories {
            category.name = category.name.trim().to_string();
        }
        for tag in &mut self.tags {
            tag.name = tag.name.trim().to_string();
        }
        for post in &mut self.posts {
            post.key = post.key.trim().to_string();
            post.title = post.title.trim().to_string();
            post.excerpt = post.excerpt.trim().to_string();
            post.author = post.author.trim().to_string();
            post.category = post.category.trim().to_string();
            for tag in &mut post.tags {
                *tag = tag.trim().to_string();
            }
            post.tags.dedup();
        }
        for comment in &mut self.comments {
            comment.post = comment.post.trim().to_string();
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        let categories = unique_names("categories", self.categories.iter().map(|c| &c.name))?;
        let tags = unique_names("tags", self.tags.iter().map(|t| &t.name))?;

        let mut keys = HashSet::new();
        for post in &self.posts {
            if post.key.is_empty() {
                return Err(DomainError::validation("key", "post key must not be empty"));
            }
            if !keys.insert(post.key.as_str()) {
                return Err(DomainError::validation(
                    "key",
                    format!("duplicate post key `{}`", post.key),
                ));
            }
            if post.title.is_empty() {
                return Err(DomainError::validation(
                    "title",
                    format!("post `{}` has an empty title", post.key),
                ));
            }
            if post.author.is_empty() {
                return Err(DomainError::validation(
                    "author",
                    format!("post `{}` has an empty author", post.key),
                ));
            }
            if !categories.contains(post.category.as_str()) {
                return Err(DomainError::validation(
                    "category",
                    format!("unknown category `{}`", post.category),
                ));
            }
            if let Some(tag) = post.tags.iter().find(|tag| !tags.contains(tag.as_str())) {
                return Err(DomainError::validation(
                    "tags",
                    format!("unknown tags `{tag}`"),
                ));
            }
        }

        if let Some(comment) = self
            .comments
            .iter()
            .find(|comment| !keys.contains(comment.post.as_str()))
        {
            return Err(DomainError::validation(
                "post",
                format!("unknown post `{}`", comment.post),
            ));
        }

        Ok(())
    }
}

fn unique_names<'a>(
    field: &'static str,
    names: impl Iterator<Item = &'a String>,
) -> Result<HashSet<&'a str>, DomainError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(DomainError::validation(field, "name must not be empty"));
        }
        if !seen.insert(name.as_str()) {
            return Err(DomainError::validation(
                field,
                format!("duplicate name `{name}`"),
            ));
        }
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const SAMPLE: &str = r##"
[[categories]]
name = " Rust "

[[categories]]
name = "Life"

[[tags]]
name = "async"

[[posts]]
key = "hello"
title = "Hello"
category = "Rust"
tags = [" async "]
created_at = "2023-05-01T10:00:00Z"
body_markdown = "# Hello\n\nFirst post."

[[posts]]
key = "walk"
title = "A walk"
author = "guest"
category = "Life"
excerpt = "Custom excerpt"
views = 7
created_at = "2023-06-02T08:30:00Z"
updated_at = "2023-06-03T08:30:00Z"
body_markdown = "Outside."

[[comments]]
post = "hello"
name = "Reader"
email = "reader@example.com"
text = "Nice post"
"##;

    #[test]
    fn parses_and_normalizes_sample() {
        let archive = parse_archive(SAMPLE).expect("valid archive");

        assert_eq!(archive.categories[0].name, "Rust");
        assert_eq!(archive.posts.len(), 2);
        assert_eq!(archive.posts[0].author, DEFAULT_AUTHOR);
        assert_eq!(archive.posts[0].tags, vec!["async".to_string()]);
        assert_eq!(archive.posts[0].created_at, datetime!(2023-05-01 10:00 UTC));
        assert_eq!(archive.posts[0].body_markdown, "# Hello\n\nFirst post.");
        assert_eq!(archive.posts[1].updated_at, Some(datetime!(2023-06-03 8:30 UTC)));
        assert_eq!(archive.posts[1].views, 7);
        assert_eq!(archive.comments.len(), 1);
    }

    #[test]
    fn empty_archive_is_valid() {
        let archive = parse_archive("").expect("empty archive");
        assert!(archive.posts.is_empty());
    }

    #[test]
    fn unknown_category_is_rejected() {
        let data = r#"
[[posts]]
key = "p"
title = "T"
category = "Missing"
created_at = "2023-05-01T10:00:00Z"
body_markdown = "x"
"#;
        let err = parse_archive(data).expect_err("unknown category");
        assert!(matches!(
            err,
            ArchiveError::Domain(DomainError::Validation {
                field: "category",
                ..
            })
        ));
    }

    #[test]
    fn duplicate_tag_names_are_rejected() {
        let data = "[[tags]]\nname = \"a\"\n[[tags]]\nname = \" a\"\n";
        assert!(matches!(
            parse_archive(data),
            Err(ArchiveError::Domain(DomainError::Validation { field: "tags", .. }))
        ));
    }

    #[test]
    fn comment_on_unknown_post_is_rejected() {
        let data = r#"
[[comments]]
post = "nope"
name = "R"
email = "r@example.com"
text = "hi"
"#;
        assert!(matches!(
            parse_archive(data),
            Err(ArchiveError::Domain(DomainError::Validation { field: "post", .. }))
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            parse_archive("[[posts]\nkey ="),
            Err(ArchiveError::Parse(_))
        ));
    }
}
