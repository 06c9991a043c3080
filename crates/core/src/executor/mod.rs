//! Sequential action-plan execution.
//!
//! [`PlanExecutor::execute`] runs a validated [`ActionPlan`] strictly in order.
//! Each action is dispatched to its handler, bounded by its budget and the
//! caller's cancellation token, and followed by a post-action stability probe.
//! Execution stops at the first unsuccessful result; when that result captured
//! no content, a best-effort fallback capture of broad landmarks is attached so
//! the caller has something to diagnose with.
//!
//! Only two things escape as errors: an invalid plan (via
//! [`execute_value`](PlanExecutor::execute_value)) and loss of the session.

mod interact;
mod options;
mod print;
mod wait;

use pw_flow_protocol::{Action, ActionErrorKind, ActionResult, ActionStatus, ContentFormat, ContentItem, ExecutionReport, RunOutcome};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use self::options::ExecutorOptions;
pub use self::wait::NAVIGATION_SELECTOR;
use crate::budget::{Bounded, Budget, bounded};
use crate::driver::{ConsoleEntry, Session};
use crate::error::{DriverError, FlowError};
use crate::plan::ActionPlan;
use crate::stability::{Stability, await_post_action_stable};

/// Runs action plans against a [`Session`].
#[derive(Debug, Clone, Default)]
pub struct PlanExecutor {
	options: ExecutorOptions,
}

impl PlanExecutor {
	pub fn new(options: ExecutorOptions) -> Self {
		Self { options }
	}

	pub fn options(&self) -> &ExecutorOptions {
		&self.options
	}

	/// Validates a raw plan document, then executes it.
	///
	/// Validation happens before any driver call.
	pub async fn execute_value(&self, session: &dyn Session, plan: &Value, cancel: &CancellationToken) -> Result<ExecutionReport, FlowError> {
		let plan = ActionPlan::from_value(plan)?;
		self.execute(session, &plan, cancel).await
	}

	/// Executes `plan` in order, stopping at the first unsuccessful action.
	pub async fn execute(&self, session: &dyn Session, plan: &ActionPlan, cancel: &CancellationToken) -> Result<ExecutionReport, FlowError> {
		let total = plan.len();
		let plan_deadline = self.options.plan_timeout().deadline_from(Instant::now());
		let mut console = session.console();
		let mut statuses = Vec::with_capacity(total);
		let mut captured = Vec::new();
		let mut outcome = RunOutcome::Completed;

		info!(target = "pw-flow", total, plan_timeout = %self.options.plan_timeout(), "executing plan");

		for (i, action) in plan.iter().enumerate() {
			let index = i + 1;
			let started = Instant::now();
			debug!(target = "pw-flow", index, total, %action, "dispatching action");

			let mut result = match self.budget_for(action, plan_deadline) {
				Some(budget) => self
					.run_action(session, action, budget, cancel)
					.await
					.map_err(|source| FlowError::SessionLost { index, source })?,
				None => ActionResult::failure(
					ActionErrorKind::ActionTimeout,
					format!("{} not attempted", action.name()),
					format!("plan timeout of {} exceeded", self.options.plan_timeout()),
				),
			};

			if !result.success && !result.is_aborted() && !result.captured.iter().any(ContentItem::has_content) {
				let fallback = self.capture_fallback(session, cancel).await;
				result.captured.extend(fallback);
			}
			result.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
			captured.extend(result.captured.iter().cloned());

			let success = result.success;
			if success {
				info!(target = "pw-flow", index, total, %action, elapsed_ms = result.elapsed_ms, warning = ?result.warning, "action succeeded");
			} else {
				info!(
					target = "pw-flow",
					index,
					total,
					%action,
					elapsed_ms = result.elapsed_ms,
					error = ?result.error,
					kind = ?result.error_kind,
					"action failed, stopping plan"
				);
				outcome = if result.is_aborted() {
					RunOutcome::Aborted { index }
				} else {
					RunOutcome::Failed { index }
				};
			}

			statuses.push(ActionStatus {
				index,
				total,
				action: action.clone(),
				result,
			});
			if !success {
				break;
			}
		}

		let console_errors = drain_console_errors(&mut console);
		Ok(ExecutionReport {
			statuses,
			captured,
			outcome,
			console_errors,
		})
	}

	/// Budget for one action, or `None` when the plan deadline already passed.
	///
	/// An unbounded Wait ignores the plan deadline entirely.
	fn budget_for(&self, action: &Action, plan_deadline: Option<Instant>) -> Option<Budget> {
		if action.is_unbounded_wait() {
			return Some(Budget::Unbounded);
		}
		let own = match action {
			Action::Wait { timeout_ms, .. } => Budget::from_millis(*timeout_ms),
			_ => self.options.action_timeout(),
		};
		match plan_deadline {
			None => Some(own),
			Some(deadline) => {
				let now = Instant::now();
				(now < deadline).then(|| own.min(Budget::Bounded(deadline - now)))
			}
		}
	}

	async fn run_action(&self, session: &dyn Session, action: &Action, budget: Budget, cancel: &CancellationToken) -> Result<ActionResult, DriverError> {
		let ctx = ActionContext {
			session,
			options: &self.options,
			cancel,
		};

		let outcome = match action {
			// Wait enforces its own budget so a timeout can name the missing selectors.
			Action::Wait { selectors, .. } => bounded(Budget::Unbounded, cancel, wait::run(&ctx, selectors, budget)).await,
			Action::Click { selector } => bounded(budget, cancel, interact::click(&ctx, selector)).await,
			Action::Typing { selector, value, delay_ms } => bounded(budget, cancel, interact::typing(&ctx, selector, value, *delay_ms)).await,
			Action::KeyPress { key, selector } => bounded(budget, cancel, interact::key_press(&ctx, key, selector.as_deref())).await,
			Action::Print { selectors, format } => bounded(budget, cancel, print::run(&ctx, selectors, *format)).await,
		};

		Ok(match outcome {
			Bounded::Done(result) => result?,
			Bounded::TimedOut => ActionResult::failure(
				ActionErrorKind::ActionTimeout,
				format!("{} timed out", action.name()),
				format!("{action} exceeded {budget}"),
			),
			Bounded::Cancelled => ctx.aborted(action.name()),
		})
	}

	/// Captures the first broad landmark that has content. Never fails.
	async fn capture_fallback(&self, session: &dyn Session, cancel: &CancellationToken) -> Vec<ContentItem> {
		let ctx = ActionContext {
			session,
			options: &self.options,
			cancel,
		};
		let limit = Budget::Bounded(self.options.fallback_timeout());

		for selector in &self.options.fallback_selectors {
			match bounded(limit, cancel, print::capture(&ctx, selector, ContentFormat::Text)).await {
				Bounded::Done(Ok(item)) if item.has_content() => {
					debug!(target = "pw-flow", %selector, "captured fallback content");
					return vec![item];
				}
				Bounded::Done(Ok(_)) => {}
				Bounded::Done(Err(err)) => {
					warn!(target = "pw-flow", %selector, error = %err, "fallback capture failed");
					break;
				}
				Bounded::TimedOut => {
					warn!(target = "pw-flow", %selector, "fallback capture timed out");
					break;
				}
				Bounded::Cancelled => break,
			}
		}
		Vec::new()
	}
}

/// Per-action view handed to the handlers.
pub(crate) struct ActionContext<'a> {
	session: &'a dyn Session,
	options: &'a ExecutorOptions,
	cancel: &'a CancellationToken,
}

/// Verdict of the post-action probe as the handlers consume it.
pub(crate) enum Settled {
	/// Proceed, possibly with a warning to attach to the result.
	Ready(Option<String>),
	Aborted,
}

impl ActionContext<'_> {
	/// Runs the post-action probe. Only session loss with no navigation expected escapes.
	async fn settle(&self, expect_navigation: bool) -> Result<Settled, DriverError> {
		match await_post_action_stable(self.session, &self.options.stability, expect_navigation, self.cancel).await {
			Ok(Stability::Aborted) => Ok(Settled::Aborted),
			Ok(Stability::Navigated) => Ok(Settled::Ready(Some(format!("page navigated to {}", self.session.url())))),
			Ok(Stability::Confirmed | Stability::Assumed) => Ok(Settled::Ready(None)),
			Err(err) if err.is_navigation() => Ok(Settled::Ready(Some(format!("document changed during stability probe: {err}")))),
			Err(err) => Err(err),
		}
	}

	fn aborted(&self, name: &str) -> ActionResult {
		ActionResult::failure(ActionErrorKind::Aborted, format!("{name} aborted"), "cancelled")
	}
}

fn drain_console_errors(console: &mut broadcast::Receiver<ConsoleEntry>) -> Vec<String> {
	let mut errors = Vec::new();
	loop {
		match console.try_recv() {
			Ok(entry) if entry.is_error() => errors.push(format!("{}: {}", entry.kind, entry.text)),
			Ok(_) => {}
			Err(TryRecvError::Lagged(skipped)) => debug!(target = "pw-flow", skipped, "console receiver lagged"),
			Err(TryRecvError::Empty | TryRecvError::Closed) => break,
		}
	}
	errors
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use pw_flow_protocol::UNBOUNDED_TIMEOUT_MS;
	use serde_json::json;

	use super::*;
	use crate::driver::ElementSnapshot;
	use crate::error::PlanError;
	use crate::testing::ScriptedSession;

	fn executor() -> PlanExecutor {
		let mut options = ExecutorOptions::default();
		options.stability.wait_for_animations = false;
		PlanExecutor::new(options)
	}

	fn wait(selector: &str, timeout_ms: i64) -> Action {
		Action::Wait {
			selectors: vec![selector.into()],
			timeout_ms,
		}
	}

	fn click(selector: &str) -> Action {
		Action::Click { selector: selector.into() }
	}

	#[tokio::test(start_paused = true)]
	async fn stops_at_first_failure() {
		let session = ScriptedSession::new("https://example.com");
		session.set_elements("#a", vec![ElementSnapshot::new("<a id=a></a>", "")]);
		let plan = ActionPlan::new(vec![click("#a"), click("#missing"), click("#a")]).unwrap();

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		assert_eq!(report.statuses.len(), 2);
		assert_eq!(report.outcome, RunOutcome::Failed { index: 2 });
		assert_eq!(report.statuses[1].result.error_kind, Some(ActionErrorKind::ElementNotFound));
		assert_eq!(session.interactions(), vec!["click #a", "click #missing"]);
	}

	#[tokio::test(start_paused = true)]
	async fn failure_attaches_fallback_capture() {
		let session = ScriptedSession::new("https://example.com");
		session.set_elements("body", vec![ElementSnapshot::new("<body>Sign in</body>", "Sign in")]);
		let plan = ActionPlan::new(vec![click("#missing")]).unwrap();

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		let result = &report.statuses[0].result;
		assert!(!result.success);
		assert_eq!(result.captured.len(), 1);
		assert_eq!(result.captured[0].selector, "body");
		assert_eq!(result.captured[0].content.as_deref(), Some("Sign in"));
		assert_eq!(report.captured, result.captured);
	}

	#[tokio::test(start_paused = true)]
	async fn wait_times_out_naming_missing_selectors() {
		let session = ScriptedSession::new("https://example.com");
		let plan = ActionPlan::new(vec![wait("#missing", 1_000), click("#missing")]).unwrap();

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		assert_eq!(report.statuses.len(), 1);
		let result = &report.statuses[0].result;
		assert_eq!(result.error_kind, Some(ActionErrorKind::ActionTimeout));
		assert!(result.error.as_deref().unwrap().contains("#missing"));
		assert!(session.interactions().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn wait_succeeds_when_selector_appears() {
		let session = ScriptedSession::new("https://example.com");
		session.reveal_after("#late", vec![ElementSnapshot::new("<div id=late></div>", "")], Duration::from_millis(700));
		let plan = ActionPlan::new(vec![wait("#late", 5_000)]).unwrap();

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		assert!(report.is_success());
		assert!(report.statuses[0].result.warning.is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn wait_accepts_navigation_as_alternate_outcome() {
		let session = ScriptedSession::new("https://example.com");
		session.navigate_after("https://example.com/login", Duration::from_millis(300));
		let plan = ActionPlan::new(vec![wait("#dashboard", 5_000)]).unwrap();

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		let result = &report.statuses[0].result;
		assert!(result.success);
		assert!(result.warning.is_some());
		assert_eq!(result.captured[0].selector, NAVIGATION_SELECTOR);
		assert_eq!(result.captured[0].content.as_deref(), Some("https://example.com/login"));
	}

	#[tokio::test(start_paused = true)]
	async fn elements_win_ties_with_navigation() {
		let session = ScriptedSession::new("https://example.com");
		// The element lands between polls, just before the navigation event.
		session.reveal_after("#app", vec![ElementSnapshot::new("<div id=app></div>", "")], Duration::from_millis(240));
		session.navigate_after("https://example.com/app", Duration::from_millis(250));
		let plan = ActionPlan::new(vec![wait("#app", 5_000)]).unwrap();

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		let result = &report.statuses[0].result;
		assert!(result.success);
		assert!(result.warning.is_none(), "got {result:?}");
		assert!(result.captured.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn unbounded_wait_outlives_plan_timeout() {
		let session = ScriptedSession::new("https://example.com");
		session.reveal_after("#slow", vec![ElementSnapshot::new("<p id=slow></p>", "")], Duration::from_secs(90));
		let mut options = ExecutorOptions {
			plan_timeout_ms: 1_000,
			..Default::default()
		};
		options.stability.wait_for_animations = false;
		let plan = ActionPlan::new(vec![wait("#slow", UNBOUNDED_TIMEOUT_MS)]).unwrap();

		let report = PlanExecutor::new(options).execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		assert!(report.is_success());
	}

	#[tokio::test(start_paused = true)]
	async fn unbounded_wait_ends_only_on_cancellation() {
		let session = ScriptedSession::new("https://example.com");
		let cancel = CancellationToken::new();
		let trigger = cancel.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_secs(600)).await;
			trigger.cancel();
		});
		let plan = ActionPlan::new(vec![wait("#never", UNBOUNDED_TIMEOUT_MS), click("#never")]).unwrap();

		let started = Instant::now();
		let report = executor().execute(&session, &plan, &cancel).await.unwrap();

		assert!(started.elapsed() >= Duration::from_secs(600));
		assert_eq!(report.outcome, RunOutcome::Aborted { index: 1 });
		assert!(report.statuses[0].result.is_aborted());
		assert!(report.statuses[0].result.captured.is_empty());
		assert!(session.interactions().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn click_that_destroys_context_is_a_soft_success() {
		let session = ScriptedSession::new("https://example.com");
		session.on_click_navigate("#go", "https://example.com/next", true);
		let plan = ActionPlan::new(vec![click("#go")]).unwrap();

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		let result = &report.statuses[0].result;
		assert!(result.success);
		assert!(result.warning.is_some());
		assert!(result.error.is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn interaction_interrupted_by_navigation_is_a_soft_success() {
		let session = ScriptedSession::new("https://example.com");
		session.fail_interaction("#submit", || DriverError::classify("Execution context was destroyed"));
		let plan = ActionPlan::new(vec![click("#submit")]).unwrap();

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		let result = &report.statuses[0].result;
		assert!(result.success);
		assert!(result.warning.as_deref().unwrap().contains("navigation interrupted"));
	}

	#[tokio::test(start_paused = true)]
	async fn session_loss_escapes_execute() {
		let session = ScriptedSession::new("https://example.com");
		session.fail_interaction("#a", || DriverError::SessionLost("browser closed".into()));
		let plan = ActionPlan::new(vec![click("#a")]).unwrap();

		let err = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap_err();

		assert!(matches!(err, FlowError::SessionLost { index: 1, .. }));
	}

	#[tokio::test(start_paused = true)]
	async fn typing_clears_before_entering_text() {
		let session = ScriptedSession::new("https://example.com");
		let plan = ActionPlan::new(vec![
			Action::Typing {
				selector: "#q".into(),
				value: "rust".into(),
				delay_ms: Some(20),
			},
			Action::KeyPress {
				key: "Enter".into(),
				selector: Some("#q".into()),
			},
		])
		.unwrap();

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		assert!(report.is_success());
		assert_eq!(session.interactions(), vec![r#"fill #q """#, r#"type #q "rust" 20ms"#, "press Enter #q"]);
	}

	#[tokio::test(start_paused = true)]
	async fn print_records_missing_selectors_without_failing() {
		let session = ScriptedSession::new("https://example.com");
		session.set_elements("h1", vec![ElementSnapshot::new("<h1>Title</h1>", "Title")]);
		let plan = ActionPlan::new(vec![Action::Print {
			selectors: vec!["h1".into(), ".absent".into()],
			format: ContentFormat::Text,
		}])
		.unwrap();

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		assert!(report.is_success());
		assert_eq!(report.captured.len(), 2);
		assert_eq!(report.captured[0].content.as_deref(), Some("Title"));
		assert_eq!(report.captured[1].error.as_deref(), Some(ContentItem::NO_ELEMENTS));
	}

	#[tokio::test(start_paused = true)]
	async fn print_with_no_content_fails() {
		let session = ScriptedSession::new("https://example.com");
		let plan = ActionPlan::new(vec![Action::Print {
			selectors: vec![".absent".into()],
			format: ContentFormat::Html,
		}])
		.unwrap();

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		assert_eq!(report.outcome, RunOutcome::Failed { index: 1 });
		assert_eq!(report.statuses[0].result.error_kind, Some(ActionErrorKind::ElementNotFound));
	}

	#[tokio::test(start_paused = true)]
	async fn failed_print_keeps_its_misses_and_gains_fallback() {
		let session = ScriptedSession::new("https://example.com");
		session.set_elements("body", vec![ElementSnapshot::new("<body>Out of stock</body>", "Out of stock")]);
		let plan = ActionPlan::new(vec![Action::Print {
			selectors: vec![".absent".into()],
			format: ContentFormat::Text,
		}])
		.unwrap();

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		let result = &report.statuses[0].result;
		assert!(!result.success);
		assert_eq!(result.captured.len(), 2);
		assert_eq!(result.captured[0].selector, ".absent");
		assert_eq!(result.captured[0].error.as_deref(), Some(ContentItem::NO_ELEMENTS));
		assert_eq!(result.captured[1].selector, "body");
		assert_eq!(result.captured[1].content.as_deref(), Some("Out of stock"));
		assert_eq!(report.captured, result.captured);
	}

	#[tokio::test(start_paused = true)]
	async fn bounded_wait_gives_up_on_a_stalled_query() {
		let session = ScriptedSession::new("https://example.com");
		session.stall_query("#x");
		let plan = ActionPlan::new(vec![wait("#x", 1_000)]).unwrap();

		let started = Instant::now();
		let report = tokio::time::timeout(Duration::from_secs(60), executor().execute(&session, &plan, &CancellationToken::new()))
			.await
			.expect("wait outlived its budget")
			.unwrap();

		assert!(started.elapsed() >= Duration::from_secs(1));
		let result = &report.statuses[0].result;
		assert_eq!(result.error_kind, Some(ActionErrorKind::ActionTimeout));
		assert!(result.error.as_deref().unwrap().contains("#x"));
	}

	#[tokio::test(start_paused = true)]
	async fn stalled_wait_is_cut_short_by_plan_timeout() {
		let session = ScriptedSession::new("https://example.com");
		session.stall_query("#x");
		let mut options = ExecutorOptions {
			plan_timeout_ms: 500,
			..Default::default()
		};
		options.stability.wait_for_animations = false;
		let plan = ActionPlan::new(vec![wait("#x", 30_000)]).unwrap();

		let started = Instant::now();
		let report = tokio::time::timeout(Duration::from_secs(60), PlanExecutor::new(options).execute(&session, &plan, &CancellationToken::new()))
			.await
			.expect("wait outlived the plan timeout")
			.unwrap();

		assert!(started.elapsed() < Duration::from_secs(30));
		assert_eq!(report.statuses[0].result.error_kind, Some(ActionErrorKind::ActionTimeout));
	}

	#[tokio::test(start_paused = true)]
	async fn spent_plan_timeout_skips_remaining_actions() {
		let session = ScriptedSession::new("https://example.com");
		session.set_elements("#a", vec![ElementSnapshot::new("<a id=a></a>", "")]);
		let mut options = ExecutorOptions {
			plan_timeout_ms: 0,
			..Default::default()
		};
		options.stability.wait_for_animations = false;
		let plan = ActionPlan::new(vec![click("#a"), click("#a")]).unwrap();

		let report = PlanExecutor::new(options).execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		assert_eq!(report.statuses.len(), 1);
		assert_eq!(report.outcome, RunOutcome::Failed { index: 1 });
		let result = &report.statuses[0].result;
		assert_eq!(result.error_kind, Some(ActionErrorKind::ActionTimeout));
		assert!(result.error.as_deref().unwrap().contains("plan timeout"));
		assert!(session.interactions().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn invalid_plan_is_rejected_before_any_driver_call() {
		let session = ScriptedSession::new("https://example.com");

		let err = executor()
			.execute_value(&session, &json!({ "actions": "click" }), &CancellationToken::new())
			.await
			.unwrap_err();

		assert!(matches!(err, FlowError::InvalidPlan(PlanError::ActionsNotArray)));
		assert!(session.calls().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn report_collects_console_errors() {
		let session = ScriptedSession::new("https://example.com");
		session.set_elements("#a", vec![ElementSnapshot::new("<a id=a></a>", "")]);
		let plan = ActionPlan::new(vec![click("#a")]).unwrap();
		let page = session.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(10)).await;
			page.emit_console("log", "hello");
			page.emit_console("error", "boom");
		});

		let report = executor().execute(&session, &plan, &CancellationToken::new()).await.unwrap();

		assert_eq!(report.console_errors, vec!["error: boom"]);
	}
}
