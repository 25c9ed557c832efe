//! Batch synchronization of users, skills, and group memberships between a source
//! identity/group service and a destination profile store.
//!
//! Every job is a composition of the same three pieces: a token-authenticated [`pager::Pager`]
//! that walks remote collections until a short page, a [`executor::RequestExecutor`] that
//! decides whether a failed call skips one entity or aborts the run, and an
//! [`merge::AssociationMerger`] that folds per-owner relations before a [`sink`] persists or
//! exports them.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod jobs;
pub mod merge;
pub mod model;
pub mod obs;
pub mod pager;
pub mod sink;
pub mod store;
pub mod throttle;
pub mod token;

#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and fixtures shared by unit and integration tests.

	pub use crate::_prelude::*;

	// std
	use std::time::Duration as StdDuration;
	// self
	use crate::{
		auth::Audience,
		config::{AuthConfig, Endpoints, SyncConfig},
		error::AuthError,
		http::{ApiRequest, ApiResponse, ApiTransport, TransportFuture},
		throttle::{Delay, DelayFuture},
		token::{Credential, IssueFuture, TokenIssuer},
	};

	/// Token issuer that hands out numbered tokens without contacting an identity provider.
	#[derive(Debug, Default)]
	pub struct StaticTokenIssuer {
		issued: Mutex<Vec<Audience>>,
		ttl: Option<Duration>,
	}
	impl StaticTokenIssuer {
		/// Issues tokens that are already expired, forcing a fresh issuance on every lookup.
		pub fn expiring() -> Self {
			Self { issued: Default::default(), ttl: Some(Duration::seconds(-1)) }
		}

		/// Audiences for which a token was issued, in issuance order.
		pub fn issued(&self) -> Vec<Audience> {
			self.issued.lock().clone()
		}
	}
	impl TokenIssuer for StaticTokenIssuer {
		fn issue<'a>(&'a self, audience: &'a Audience) -> IssueFuture<'a> {
			Box::pin(async move {
				let count = {
					let mut issued = self.issued.lock();

					issued.push(audience.clone());
					issued.len()
				};
				let token = format!("token-{audience}-{count}");
				let ttl = self.ttl.unwrap_or(Duration::hours(1));

				Ok::<_, AuthError>(Credential::new(
					audience.clone(),
					token,
					OffsetDateTime::now_utc() + ttl,
				))
			})
		}
	}

	/// Delay that records requested pauses instead of sleeping.
	#[derive(Clone, Debug, Default)]
	pub struct RecordingDelay(Arc<Mutex<Vec<StdDuration>>>);
	impl RecordingDelay {
		/// Pauses observed so far.
		pub fn pauses(&self) -> Vec<StdDuration> {
			self.0.lock().clone()
		}
	}
	impl Delay for RecordingDelay {
		fn wait(&self, duration: StdDuration) -> DelayFuture<'_> {
			self.0.lock().push(duration);

			Box::pin(async {})
		}
	}

	type Responder = dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync;

	/// Transport that answers every request through a closure and records what it was sent.
	pub struct ScriptedTransport {
		responder: Box<Responder>,
		requests: Mutex<Vec<ApiRequest>>,
	}
	impl ScriptedTransport {
		/// Creates a transport answering with `responder`.
		pub fn new(responder: impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static) -> Self {
			Self { responder: Box::new(responder), requests: Default::default() }
		}

		/// Requests received so far, in send order.
		pub fn requests(&self) -> Vec<ApiRequest> {
			self.requests.lock().clone()
		}
	}
	impl Debug for ScriptedTransport {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			f.debug_struct("ScriptedTransport")
				.field("requests", &self.requests.lock().len())
				.finish()
		}
	}
	impl ApiTransport for ScriptedTransport {
		fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
			let response = (self.responder)(&request);

			self.requests.lock().push(request);

			Box::pin(async move { Ok(response) })
		}
	}

	/// Builds a configuration whose endpoints all live under `base`.
	pub fn test_config(base: &str) -> SyncConfig {
		let url = |path: &str| {
			Url::parse(&format!("{base}{path}")).expect("Test endpoint URL should parse.")
		};

		SyncConfig {
			auth: AuthConfig {
				token_url: url("/oauth/token"),
				client_id: "sync-client".into(),
				client_secret: "sync-secret".into(),
				ubahn_audience: Audience::new("https://u-bahn.example.com")
					.expect("Destination audience fixture should be valid."),
				topcoder_audience: Audience::new("https://m2m.example.com/")
					.expect("Source audience fixture should be valid."),
				token_cache_secs: None,
			},
			endpoints: Endpoints {
				groups: url("/v5/groups"),
				users: url("/v3/users"),
				members: url("/v5/members"),
				ubahn_users: url("/v5/users"),
				skills: url("/v5/skills"),
			},
			elasticsearch: None,
			sleep_ms: 0,
			page_size: 12,
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
use color_eyre as _;
#[cfg(test)] use {httpmock as _, tempfile as _};
