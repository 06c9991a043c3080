//! Print: capture the content of every element matching each selector.

use pw_flow_protocol::{ActionErrorKind, ActionResult, ContentFormat, ContentItem};
use tracing::{debug, warn};

use super::{ActionContext, Settled};
use crate::driver::ElementSnapshot;
use crate::error::Result;

pub(super) async fn run(ctx: &ActionContext<'_>, selectors: &[String], format: ContentFormat) -> Result<ActionResult> {
	let mut items = Vec::with_capacity(selectors.len());
	for selector in selectors {
		items.push(capture(ctx, selector, format).await?);
	}

	let hits = items.iter().filter(|item| item.has_content()).count();
	let result = if hits > 0 {
		ActionResult::success(format!("captured {hits} of {} selector(s)", selectors.len()))
	} else {
		ActionResult::failure(ActionErrorKind::ElementNotFound, "print captured nothing", format!("no content for: {}", selectors.join(", ")))
	};
	let result = result.with_captured(items);

	Ok(match ctx.settle(false).await? {
		Settled::Ready(Some(warning)) if result.success => result.with_warning(warning),
		Settled::Ready(_) => result,
		Settled::Aborted => ctx.aborted("print"),
	})
}

/// Queries one selector into a single item; only session loss escapes.
pub(super) async fn capture(ctx: &ActionContext<'_>, selector: &str, format: ContentFormat) -> Result<ContentItem> {
	match ctx.session.query_all(selector).await {
		Ok(elements) if elements.is_empty() => Ok(ContentItem::missing(selector, format)),
		Ok(elements) => Ok(ContentItem::content(selector, format, render(selector, &elements, format))),
		Err(err) if err.is_session_lost() => Err(err),
		Err(err) => {
			warn!(target = "pw-flow", %selector, error = %err, "print query failed");
			Ok(ContentItem::error(selector, format, err.to_string()))
		}
	}
}

fn render(selector: &str, elements: &[ElementSnapshot], format: ContentFormat) -> String {
	let parts: Vec<&str> = elements
		.iter()
		.map(|el| match format {
			ContentFormat::Html => el.html.as_str(),
			ContentFormat::Text => el.text.as_deref().unwrap_or_else(|| {
				debug!(target = "pw-flow", %selector, "driver returned no text rendering, using markup");
				el.html.as_str()
			}),
		})
		.collect();
	parts.join("\n")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn render_joins_matches_in_document_order() {
		let elements = vec![ElementSnapshot::new("<li>a</li>", "a"), ElementSnapshot::new("<li>b</li>", "b")];
		assert_eq!(render("li", &elements, ContentFormat::Text), "a\nb");
		assert_eq!(render("li", &elements, ContentFormat::Html), "<li>a</li>\n<li>b</li>");
	}

	#[test]
	fn render_text_falls_back_to_markup() {
		let elements = vec![ElementSnapshot {
			html: "<p>x</p>".into(),
			text: None,
		}];
		assert_eq!(render("p", &elements, ContentFormat::Text), "<p>x</p>");
	}
}
