//! Cookie and storage state types for session persistence.
//!
//! These types represent browser cookies and per-origin client-side storage
//! that can be captured at session teardown and restored at bootstrap.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
	/// Cookie is sent with same-site and cross-site requests
	None,
	/// Cookie is sent with same-site requests and cross-site top-level navigations
	#[default]
	Lax,
	/// Cookie is only sent with same-site requests
	Strict,
}

/// A browser cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,
	pub value: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,
	/// Unix timestamp in seconds (-1 means session cookie)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub http_only: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub secure: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub same_site: Option<SameSite>,
}

impl Cookie {
	/// Creates a new cookie with required fields.
	pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			domain: Some(domain.into()),
			path: None,
			expires: None,
			http_only: None,
			secure: None,
			same_site: None,
		}
	}

	pub fn path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());
		self
	}

	pub fn expires(mut self, expires: f64) -> Self {
		self.expires = Some(expires);
		self
	}

	pub fn http_only(mut self, http_only: bool) -> Self {
		self.http_only = Some(http_only);
		self
	}

	pub fn secure(mut self, secure: bool) -> Self {
		self.secure = Some(secure);
		self
	}

	pub fn same_site(mut self, same_site: SameSite) -> Self {
		self.same_site = Some(same_site);
		self
	}
}

/// Client-side storage for a single origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
	/// The origin, e.g. `https://example.com`
	pub origin: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub local_storage: Option<BTreeMap<String, String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_storage: Option<BTreeMap<String, String>>,
}

impl OriginState {
	pub fn new(origin: impl Into<String>) -> Self {
		Self {
			origin: origin.into(),
			..Default::default()
		}
	}

	pub fn local(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.local_storage.get_or_insert_with(BTreeMap::new).insert(key.into(), value.into());
		self
	}

	pub fn session(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.session_storage.get_or_insert_with(BTreeMap::new).insert(key.into(), value.into());
		self
	}
}

/// Complete session storage snapshot.
///
/// `origins` carries at most one entry per origin; order is not significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
	#[serde(default)]
	pub cookies: Vec<Cookie>,
	#[serde(default)]
	pub origins: Vec<OriginState>,
}

impl StorageState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_cookies(cookies: Vec<Cookie>) -> Self {
		Self {
			cookies,
			origins: Vec::new(),
		}
	}

	/// Returns true when there is nothing worth restoring.
	pub fn is_empty(&self) -> bool {
		self.cookies.is_empty() && self.origins.is_empty()
	}

	pub fn origin(&self, origin: &str) -> Option<&OriginState> {
		self.origins.iter().find(|o| o.origin == origin)
	}

	/// Inserts or replaces the entry for `state.origin`, keeping origins unique.
	pub fn upsert_origin(&mut self, state: OriginState) {
		match self.origins.iter_mut().find(|o| o.origin == state.origin) {
			Some(existing) => *existing = state,
			None => self.origins.push(state),
		}
	}
}
