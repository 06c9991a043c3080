//! Wait: all selectors match, or the page navigates away, whichever comes first.

use pw_flow_protocol::{ActionErrorKind, ActionResult, ContentFormat, ContentItem};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{ActionContext, Settled};
use crate::budget::Budget;
use crate::driver::NavigationEvent;
use crate::error::Result;

/// Selector recorded on the synthetic item describing a navigation.
pub const NAVIGATION_SELECTOR: &str = "navigation";

enum Race {
	Found,
	Navigated(String),
	Elapsed(Vec<String>),
}

pub(super) async fn run(ctx: &ActionContext<'_>, selectors: &[String], budget: Budget) -> Result<ActionResult> {
	let mut navigations = ctx.session.navigations();
	let deadline = budget.deadline_from(Instant::now());

	loop {
		// Unbounded waits re-arm in short slices so the loop never ends on time alone.
		let slice_end = deadline.unwrap_or_else(|| Instant::now() + ctx.options.infinite_wait_slice());

		match race(ctx, selectors, &mut navigations, slice_end).await? {
			Race::Found => return found(ctx, selectors).await,
			Race::Navigated(url) => {
				if missing(ctx, selectors, slice_end).await?.is_empty() {
					debug!(target = "pw-flow", %url, "selectors matched alongside navigation");
					return found(ctx, selectors).await;
				}
				return navigated(ctx, selectors, url).await;
			}
			Race::Elapsed(missing) if deadline.is_some() => {
				return Ok(ActionResult::failure(
					ActionErrorKind::ActionTimeout,
					format!("wait for {} selector(s) failed", selectors.len()),
					format!("timed out after {budget} waiting for: {}", missing.join(", ")),
				));
			}
			Race::Elapsed(missing) => {
				trace!(target = "pw-flow", missing = ?missing, "unbounded wait re-arming");
			}
		}
	}
}

/// Polls selectors with priority over navigation events until `until`.
async fn race(
	ctx: &ActionContext<'_>,
	selectors: &[String],
	navigations: &mut broadcast::Receiver<NavigationEvent>,
	until: Instant,
) -> Result<Race> {
	let mut listening = true;
	loop {
		let missing = missing(ctx, selectors, until).await?;
		if missing.is_empty() {
			return Ok(Race::Found);
		}

		let now = Instant::now();
		if now >= until {
			return Ok(Race::Elapsed(missing));
		}
		let next_poll = until.min(now + ctx.options.selector_poll());

		tokio::select! {
			biased;
			event = navigations.recv(), if listening => match event {
				Ok(event) => return Ok(Race::Navigated(event.url)),
				Err(RecvError::Lagged(_)) => return Ok(Race::Navigated(ctx.session.url())),
				Err(RecvError::Closed) => listening = false,
			},
			_ = tokio::time::sleep_until(next_poll) => {}
		}
	}
}

/// Returns the selectors that currently match nothing.
///
/// Queries still pending at `until` count as missing, along with every
/// selector not yet queried.
async fn missing(ctx: &ActionContext<'_>, selectors: &[String], until: Instant) -> Result<Vec<String>> {
	let mut missing = Vec::new();
	for (i, selector) in selectors.iter().enumerate() {
		match tokio::time::timeout_at(until, ctx.session.query_all(selector)).await {
			Err(_) => {
				trace!(target = "pw-flow", %selector, "selector query outlived the wait budget");
				missing.extend(selectors[i..].iter().cloned());
				break;
			}
			Ok(Ok(elements)) if !elements.is_empty() => {}
			Ok(Ok(_)) => missing.push(selector.clone()),
			Ok(Err(err)) if err.is_session_lost() => return Err(err),
			Ok(Err(err)) => {
				trace!(target = "pw-flow", %selector, error = %err, "selector query failed, treating as missing");
				missing.push(selector.clone());
			}
		}
	}
	Ok(missing)
}

async fn found(ctx: &ActionContext<'_>, selectors: &[String]) -> Result<ActionResult> {
	let result = ActionResult::success(format!("found {} selector(s)", selectors.len()));
	Ok(match ctx.settle(false).await? {
		Settled::Ready(Some(warning)) => result.with_warning(warning),
		Settled::Ready(None) => result,
		Settled::Aborted => ctx.aborted("wait"),
	})
}

async fn navigated(ctx: &ActionContext<'_>, selectors: &[String], url: String) -> Result<ActionResult> {
	debug!(target = "pw-flow", %url, "navigation ended wait before selectors matched");
	let item = ContentItem::content(NAVIGATION_SELECTOR, ContentFormat::Text, url.clone());
	let result = ActionResult::success("wait ended by navigation")
		.with_warning(format!("navigated to {url} before {} appeared", selectors.join(", ")))
		.with_captured(vec![item]);
	Ok(match ctx.settle(true).await? {
		Settled::Ready(_) => result,
		Settled::Aborted => ctx.aborted("wait"),
	})
}
