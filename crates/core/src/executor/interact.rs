//! Click, Typing and KeyPress: one driver interaction followed by a probe that
//! expects navigation.

use std::time::Duration;

use pw_flow_protocol::{ActionErrorKind, ActionResult};
use tracing::debug;

use super::{ActionContext, Settled};
use crate::error::{DriverError, Result};

pub(super) async fn click(ctx: &ActionContext<'_>, selector: &str) -> Result<ActionResult> {
	let outcome = ctx.session.click(selector).await;
	finish(ctx, "click", format!("clicked {selector}"), outcome).await
}

pub(super) async fn typing(ctx: &ActionContext<'_>, selector: &str, value: &str, delay_ms: Option<u64>) -> Result<ActionResult> {
	let outcome = async {
		ctx.session.fill(selector, "").await?;
		match delay_ms {
			Some(ms) => ctx.session.type_text(selector, value, Duration::from_millis(ms)).await,
			None => ctx.session.fill(selector, value).await,
		}
	}
	.await;
	finish(ctx, "typing", format!("typed {} character(s) into {selector}", value.chars().count()), outcome).await
}

pub(super) async fn key_press(ctx: &ActionContext<'_>, key: &str, selector: Option<&str>) -> Result<ActionResult> {
	let outcome = ctx.session.press_key(key, selector).await;
	let message = match selector {
		Some(selector) => format!("pressed {key} on {selector}"),
		None => format!("pressed {key}"),
	};
	finish(ctx, "keyPress", message, outcome).await
}

/// Classifies the interaction outcome and runs the post-action probe.
async fn finish(ctx: &ActionContext<'_>, name: &str, message: String, outcome: Result<()>) -> Result<ActionResult> {
	let mut warning = None;
	match outcome {
		Ok(()) => {}
		Err(err) if err.is_navigation() => {
			debug!(target = "pw-flow", action = name, error = %err, "interaction interrupted by navigation");
			warning = Some(format!("navigation interrupted {name}: {err}"));
		}
		Err(err) if err.is_session_lost() => return Err(err),
		Err(err) => return Ok(failure(name, err)),
	}

	match ctx.settle(true).await? {
		Settled::Ready(probe_warning) => {
			let result = ActionResult::success(message);
			Ok(match warning.or(probe_warning) {
				Some(warning) => result.with_warning(warning),
				None => result,
			})
		}
		Settled::Aborted => Ok(ctx.aborted(name)),
	}
}

fn failure(name: &str, err: DriverError) -> ActionResult {
	let kind = match &err {
		DriverError::ElementNotFound { .. } => ActionErrorKind::ElementNotFound,
		DriverError::Timeout { .. } => ActionErrorKind::ActionTimeout,
		_ => ActionErrorKind::Driver,
	};
	ActionResult::failure(kind, format!("{name} failed"), err.to_string())
}
