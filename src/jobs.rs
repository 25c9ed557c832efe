//! Sync jobs composed from the pager, executor, merger, and sinks.
//!
//! Every job runs strictly sequentially and pauses through the shared [`Throttle`] once per
//! entity it processes. Collection walks and credential failures abort a job before anything is
//! written; per-entity lookups degrade to skipping that entity.

pub mod create_skills;
pub mod group_skills;
pub mod merge_profiles;
pub mod sync_groups;
pub mod sync_groups_by_profile;

// std
use std::num::NonZeroU32;
// self
use crate::{
	_prelude::*,
	auth::Audience,
	config::{SyncConfig, child_url},
	executor::{RequestExecutor, RequestSpec},
	http::{ApiTransport, ReqwestTransport},
	pager::Pager,
	store::ElasticsearchStore,
	throttle::Throttle,
	token::{ClientCredentialsIssuer, TokenProvider},
};

/// Run-scoped state shared by the online jobs.
#[derive(Debug)]
pub struct SyncContext<T = ReqwestTransport>
where
	T: ?Sized + ApiTransport,
{
	config: SyncConfig,
	executor: RequestExecutor<T>,
	throttle: Throttle,
	page_size: NonZeroU32,
}
impl SyncContext {
	/// Builds the production context: reqwest transport, client-credentials issuer, and a tokio
	/// throttle honouring `sleepMs`.
	pub fn connect(config: SyncConfig) -> Result<Self> {
		let transport = ReqwestTransport::build()?;
		let issuer = ClientCredentialsIssuer::new(&config.auth, transport.clone())?;
		let executor = RequestExecutor::new(transport, TokenProvider::new(Arc::new(issuer)));
		let throttle = Throttle::tokio(config.sleep());

		Self::new(config, executor, throttle)
	}

	/// Elasticsearch store sharing this context's HTTP client.
	pub fn elasticsearch(&self) -> Result<ElasticsearchStore> {
		let config = self.config.elasticsearch()?;
		let store = ElasticsearchStore::new(config, Arc::clone(self.executor.transport()))?;

		Ok(store)
	}
}
impl<T> SyncContext<T>
where
	T: ?Sized + ApiTransport,
{
	/// Assembles a context from parts.
	pub fn new(
		config: SyncConfig,
		executor: RequestExecutor<T>,
		throttle: Throttle,
	) -> Result<Self> {
		config.validate()?;

		let page_size = config.page_size()?;

		Ok(Self { config, executor, throttle, page_size })
	}

	/// Loaded configuration.
	pub fn config(&self) -> &SyncConfig {
		&self.config
	}

	/// Executor used for every call.
	pub fn executor(&self) -> &RequestExecutor<T> {
		&self.executor
	}

	/// Pause applied between entities.
	pub fn throttle(&self) -> &Throttle {
		&self.throttle
	}

	/// Pager over the executor with the configured page size.
	pub fn pager(&self) -> Pager<'_, T> {
		Pager::new(&self.executor, self.page_size)
	}

	fn source_audience(&self) -> Audience {
		self.config.auth.topcoder_audience.clone()
	}

	fn destination_audience(&self) -> Audience {
		self.config.auth.ubahn_audience.clone()
	}

	fn source_get(
		&self,
		endpoint: &'static str,
		base: &Url,
		segments: &[&str],
	) -> Result<RequestSpec> {
		let url = child_url(endpoint, base, segments)?;

		Ok(RequestSpec::get(url).audience(self.source_audience()))
	}

	fn destination_get(
		&self,
		endpoint: &'static str,
		base: &Url,
		segments: &[&str],
	) -> Result<RequestSpec> {
		let url = child_url(endpoint, base, segments)?;

		Ok(RequestSpec::get(url).audience(self.destination_audience()))
	}
}
