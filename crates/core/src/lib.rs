//! Orchestration over a remote browser session.
//!
//! This crate decides when a document is safe to act on and runs action plans
//! against it. It never talks to a browser directly: every driver call goes
//! through the [`Session`] trait.
//!
//! - [`await_stable`] / [`await_post_action_stable`]: fail-open readiness
//!   detection (load states, loading indicators, mutation windows).
//! - [`ActionPlan`]: validated, ordered list of [`Action`]s.
//! - [`PlanExecutor`]: sequential execution with per-action budgets,
//!   cancellation, navigation-aware recovery and fallback capture.
//! - [`FlowRunner`]: cache restore, navigate, settle, execute, cache store.
//!
//! # Example
//!
//! ```ignore
//! use pw_flow::{ActionPlan, FlowRunner};
//! use tokio_util::sync::CancellationToken;
//!
//! let plan = ActionPlan::from_json(r#"{"actions": [
//!     {"type": "wait", "selectors": ["#results"], "timeoutMs": 10000},
//!     {"type": "print", "selectors": ["#results li"], "format": "text"}
//! ]}"#)?;
//! let report = FlowRunner::default()
//!     .run(&session, "https://example.com/search?q=rust", &plan, &CancellationToken::new())
//!     .await?;
//! ```

pub mod budget;
pub mod driver;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod plan;
pub mod stability;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use budget::{Bounded, Budget};
pub use driver::{ConsoleEntry, ElementSnapshot, NavigationEvent, Session};
pub use error::{DriverError, FlowError, PlanError, Result};
pub use executor::{ExecutorOptions, NAVIGATION_SELECTOR, PlanExecutor};
pub use pipeline::FlowRunner;
pub use plan::ActionPlan;
pub use pw_flow_protocol::{
	Action, ActionErrorKind, ActionResult, ActionStatus, ContentFormat, ContentItem, Cookie, ExecutionReport, LoadState, OriginState, RunOutcome,
	SameSite, StorageState,
};
pub use stability::{Stability, StabilityOptions, StabilityStrategy, await_post_action_stable, await_stable};
