//! Page-by-page collection walks with short-page termination.
//!
//! A walk starts at page 1 and keeps asking for the next page until one comes back with fewer
//! items than the requested page size. A page that exactly fills the page size always triggers
//! a follow-up request, so a collection of `T` items read `N` at a time costs `T / N + 1`
//! calls. The total-count header is only used for progress logging.
//!
//! Pagination failures are fatal: already fetched pages are dropped and the caller receives
//! [`Error::CollectionFetch`]. The only exception is a "not found" answer on the first page of a
//! collection flagged with [`CollectionRequest::absent_is_empty`].

// std
use std::num::NonZeroU32;
// self
use crate::{
	_prelude::*,
	error::CallError,
	executor::{RequestExecutor, RequestSpec},
	http::{ApiTransport, ReqwestTransport},
	obs::{self, Operation, Outcome},
};

/// Query parameter carrying the 1-based page number.
pub const PAGE_PARAM: &str = "page";
/// Query parameter carrying the page size.
pub const PAGE_SIZE_PARAM: &str = "perPage";
/// Page size used by every remote collection unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: NonZeroU32 = match NonZeroU32::new(12) {
	Some(size) => size,
	None => unreachable!(),
};

/// A named collection endpoint plus its base filters.
#[derive(Clone, Debug)]
pub struct CollectionRequest {
	/// Label used in progress logs and errors (`"groups"`, `"members of group 42"`).
	pub name: String,
	/// Endpoint, base query, and audience shared by every page.
	pub spec: RequestSpec,
	/// Treat "not found" on the first page as an empty collection.
	pub absent_is_empty: bool,
}
impl CollectionRequest {
	/// Creates a collection request whose absence is an error.
	pub fn new(name: impl Into<String>, spec: RequestSpec) -> Self {
		Self { name: name.into(), spec, absent_is_empty: false }
	}

	/// Marks the collection as legitimately absent (e.g. a group without members).
	pub fn absent_is_empty(mut self) -> Self {
		self.absent_is_empty = true;

		self
	}
}

/// One page of a collection walk.
#[derive(Clone, Debug)]
pub struct PageRequest<'a> {
	/// Endpoint and base query.
	pub spec: &'a RequestSpec,
	/// 1-based page number.
	pub page: u32,
	/// Requested page size.
	pub page_size: NonZeroU32,
}
impl PageRequest<'_> {
	/// Resolves the request with pagination parameters appended to the base query.
	pub fn to_spec(&self) -> RequestSpec {
		self.spec
			.clone()
			.query(PAGE_PARAM, self.page)
			.query(PAGE_SIZE_PARAM, self.page_size)
	}
}

/// Items of a single page and what they say about the walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageResult<R> {
	/// Items in remote order.
	pub items: Vec<R>,
	/// Total collection size advertised by the remote, if any.
	pub total_count: Option<u64>,
	/// `true` iff the page holds fewer items than requested.
	pub is_last_page: bool,
}
impl<R> PageResult<R> {
	/// Builds a page result, applying the short-page rule.
	pub fn new(items: Vec<R>, total_count: Option<u64>, page_size: NonZeroU32) -> Self {
		let is_last_page = items.len() < page_size.get() as usize;

		Self { items, total_count, is_last_page }
	}
}

/// Eager collection fetcher driving a [`RequestExecutor`].
#[derive(Debug)]
pub struct Pager<'e, T = ReqwestTransport>
where
	T: ?Sized + ApiTransport,
{
	executor: &'e RequestExecutor<T>,
	page_size: NonZeroU32,
}
impl<'e, T> Pager<'e, T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a pager reading `page_size` items per call.
	pub fn new(executor: &'e RequestExecutor<T>, page_size: NonZeroU32) -> Self {
		Self { executor, page_size }
	}

	/// Requested page size.
	pub fn page_size(&self) -> NonZeroU32 {
		self.page_size
	}

	/// Fetches one page.
	pub async fn fetch_page<R>(&self, request: &PageRequest<'_>) -> Result<PageResult<R>, CallError>
	where
		R: DeserializeOwned,
	{
		let spec = request.to_spec();
		let result = match self.executor.call(&spec).await {
			Ok(response) => response.decode::<Vec<R>>(&spec.url).map(|items| {
				PageResult::new(items, response.metadata.total_count, request.page_size)
			}),
			Err(e) => Err(e),
		};

		obs::record_call(
			Operation::CollectionPage,
			if result.is_ok() { Outcome::Success } else { Outcome::Failure },
		);

		result
	}

	/// Walks every page of `collection` and returns all items in remote order.
	pub async fn fetch_all<R>(&self, collection: &CollectionRequest) -> Result<Vec<R>>
	where
		R: DeserializeOwned,
	{
		let mut items = Vec::new();
		let mut page = 1;

		loop {
			let request = PageRequest { spec: &collection.spec, page, page_size: self.page_size };
			let result = match self.fetch_page::<R>(&request).await {
				Ok(result) => result,
				Err(e) if page == 1 && collection.absent_is_empty && e.is_not_found() => {
					tracing::info!(
						collection = %collection.name,
						"Collection is absent; treating as empty."
					);

					return Ok(Vec::new());
				},
				Err(CallError::Auth(e)) => return Err(Error::Auth(e)),
				Err(source) =>
					return Err(Error::CollectionFetch {
						collection: collection.name.clone(),
						page,
						page_size: self.page_size.get(),
						source,
					}),
			};

			if page == 1 {
				let name = &collection.name;

				match result.total_count {
					Some(total) =>
						tracing::info!(collection = %name, total, "Discovered collection size."),
					None => tracing::info!(collection = %name, "Collection size not advertised."),
				}
			}

			tracing::debug!(
				collection = %collection.name,
				page,
				received = result.items.len(),
				"Fetched page."
			);

			let is_last_page = result.is_last_page;

			items.extend(result.items);

			if is_last_page {
				return Ok(items);
			}

			page += 1;
		}
	}
}
