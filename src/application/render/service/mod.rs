mod config;
mod outline;

use std::{cell::RefCell, collections::VecDeque, rc::Rc, sync::Arc};

use comrak::{Arena, format_html, nodes::AstNode, parse_document};
use lol_html::{RewriteStrSettings, element, rewrite_str};
use once_cell::sync::Lazy;

use crate::application::render::types::{
    RenderError, RenderOutput, RenderRequest, RenderService, TocEntry,
};
use crate::domain::posts::excerpt_from_text;

use config::{build_post_sanitizer, default_options};
use outline::{Outline, collect_outline};

const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// Comrak-based rendering pipeline with Ammonia sanitisation.
pub struct ComrakRenderService {
    options: comrak::Options<'static>,
    sanitizer: ammonia::Builder<'static>,
}

impl ComrakRenderService {
    pub fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: build_post_sanitizer(),
        }
    }
}

impl Default for ComrakRenderService {
    fn default() -> Self {
        Self::new()
    }
}

static RENDER_SERVICE: Lazy<Arc<ComrakRenderService>> =
    Lazy::new(|| Arc::new(ComrakRenderService::new()));

/// Access the shared render service instance, initialised on first use.
pub fn render_service() -> Arc<ComrakRenderService> {
    Arc::clone(&RENDER_SERVICE)
}

impl RenderService for ComrakRenderService {
    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, &request.markdown, &self.options);

        let Outline { headings, text } = collect_outline(root);
        let rendered_html = render_html_stage(root, &self.options)?;
        let sanitized_html = self.sanitizer.clean(&rendered_html).to_string();
        let html = anchor_stage(&sanitized_html, &headings)?;

        Ok(RenderOutput {
            html,
            excerpt: excerpt_from_text(&text),
            toc: headings,
        })
    }
}

fn render_html_stage<'a>(
    root: &'a AstNode<'a>,
    options: &comrak::Options<'static>,
) -> Result<String, RenderError> {
    let mut html = String::new();
    format_html(root, options, &mut html).map_err(|err| RenderError::Markdown {
        message: err.to_string(),
    })?;
    Ok(html)
}

/// Stamp heading ids in document order.
fn anchor_stage(html: &str, headings: &[TocEntry]) -> Result<String, RenderError> {
    if headings.is_empty() {
        return Ok(html.to_string());
    }

    let anchors: Rc<RefCell<VecDeque<&str>>> = Rc::new(RefCell::new(
        headings
            .iter()
            .map(|heading| heading.anchor.as_str())
            .collect(),
    ));

    let handlers = HEADING_TAGS
        .iter()
        .map(|tag| {
            element!(tag, {
                let anchors = Rc::clone(&anchors);
                move |el| {
                    if let Some(anchor) = anchors.borrow_mut().pop_front() {
                        el.set_attribute("id", anchor)?;
                    }
                    Ok(())
                }
            })
        })
        .collect();

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Document {
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::posts::EXCERPT_CHARS;

    fn render(markdown: &str) -> RenderOutput {
        ComrakRenderService::new()
            .render(&RenderRequest::new(markdown))
            .expect("render succeeds")
    }

    #[test]
    fn headings_get_anchors_and_toc_entries() {
        let output = render("# Getting Started\n\nIntro.\n\n## Setup\n\ntext\n\n## Setup\n");

        assert!(output.html.contains(r#"<h1 id="getting-started">"#), "{}", output.html);
        assert!(output.html.contains(r#"<h2 id="setup">"#));
        assert!(output.html.contains(r#"<h2 id="setup-2">"#));

        let anchors: Vec<_> = output.toc.iter().map(|entry| entry.anchor.as_str()).collect();
        assert_eq!(anchors, ["getting-started", "setup", "setup-2"]);
        assert_eq!(output.toc[0].level, 1);
        assert_eq!(output.toc[1].text, "Setup");
    }

    #[test]
    fn inline_code_in_headings_is_part_of_the_text() {
        let output = render("## Using `Arc` well\n");
        assert_eq!(output.toc[0].text, "Using Arc well");
        assert_eq!(output.toc[0].anchor, "using-arc-well");
    }

    #[test]
    fn excerpt_is_tag_free_and_bounded() {
        let body = "Some **bold** text and a [link](https://example.com). ".repeat(5);
        let output = render(&body);

        assert!(output.excerpt.starts_with("Some bold text and a link."));
        assert!(!output.excerpt.contains('<'));
        assert!(output.excerpt.chars().count() <= EXCERPT_CHARS);
    }

    #[test]
    fn blocks_are_separated_in_excerpt() {
        let output = render("# Title\nFirst paragraph.\n\nSecond.");
        assert_eq!(output.excerpt, "Title First paragraph. Second.");
    }

    #[test]
    fn raw_html_and_scripts_are_removed() {
        let output = render("<script>alert(1)</script>\n\nSafe <b onclick=\"x()\">text</b>\n");
        assert!(!output.html.contains("<script"));
        assert!(!output.html.contains("onclick"));
        assert!(output.html.contains("Safe"));
    }

    #[test]
    fn plain_document_has_empty_toc() {
        let output = render("Just a paragraph.");
        assert!(output.toc.is_empty());
        assert!(output.html.contains("<p>Just a paragraph.</p>"));
        assert_eq!(output.excerpt, "Just a paragraph.");
    }

    #[test]
    fn shared_service_is_reused() {
        let first = render_service();
        let second = render_service();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
