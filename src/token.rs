//! Machine-to-machine credentials cached per audience.
//!
//! [`TokenProvider`] never refreshes proactively: a cached [`Credential`] is reused until it
//! expires or until a caller reports that the remote rejected it, at which point
//! [`TokenProvider::refresh`] forces a new issuance. The cache itself is an explicit
//! [`CredentialCache`] context owned by the run instead of process-wide state. Concurrent first
//! calls for the same audience may both reach the issuer; issuance is idempotent so the later
//! credential simply wins.

mod client_credentials;

pub use client_credentials::*;

// self
use crate::{
	_prelude::*,
	auth::{Audience, TokenSecret},
	error::AuthError,
	obs::{self, Operation, Outcome},
};

/// Boxed future returned by [`TokenIssuer::issue`].
pub type IssueFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Credential, AuthError>> + 'a + Send>>;

/// Source of fresh credentials for an audience.
pub trait TokenIssuer
where
	Self: Send + Sync,
{
	/// Requests a new credential from the upstream issuer.
	fn issue<'a>(&'a self, audience: &'a Audience) -> IssueFuture<'a>;
}

/// Bearer credential issued for one audience. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
	/// Audience the credential is valid for.
	pub audience: Audience,
	/// Bearer token; callers must avoid logging it.
	pub token: TokenSecret,
	/// Instant after which the issuer no longer honours the token.
	pub expires_at: OffsetDateTime,
}
impl Credential {
	/// Creates a credential from its parts.
	pub fn new(
		audience: Audience,
		token: impl Into<TokenSecret>,
		expires_at: OffsetDateTime,
	) -> Self {
		Self { audience, token: token.into(), expires_at }
	}

	/// Returns `true` once `instant` reaches the expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("audience", &self.audience)
			.field("token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Run-scoped mapping from audience to its current [`Credential`].
#[derive(Debug, Default)]
pub struct CredentialCache(Mutex<HashMap<Audience, Credential>>);
impl CredentialCache {
	/// Returns the cached token for `audience` when it is still valid at `now`.
	pub fn valid_token(&self, audience: &Audience, now: OffsetDateTime) -> Option<TokenSecret> {
		self.0
			.lock()
			.get(audience)
			.filter(|credential| !credential.is_expired_at(now))
			.map(|credential| credential.token.clone())
	}

	/// Stores or replaces the credential for its audience.
	pub fn store(&self, credential: Credential) {
		self.0.lock().insert(credential.audience.clone(), credential);
	}

	/// Drops the credential for `audience`, if any.
	pub fn invalidate(&self, audience: &Audience) -> Option<Credential> {
		self.0.lock().remove(audience)
	}

	/// Number of audiences with a cached credential.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}
}

/// Lazily issues and caches credentials through a [`TokenIssuer`].
#[derive(Clone)]
pub struct TokenProvider {
	issuer: Arc<dyn TokenIssuer>,
}
impl TokenProvider {
	/// Creates a provider backed by `issuer`.
	pub fn new(issuer: Arc<dyn TokenIssuer>) -> Self {
		Self { issuer }
	}

	/// Returns a cached token for `audience`, issuing one when absent or expired.
	pub async fn token(
		&self,
		cache: &CredentialCache,
		audience: &Audience,
	) -> Result<TokenSecret, AuthError> {
		if let Some(token) = cache.valid_token(audience, OffsetDateTime::now_utc()) {
			return Ok(token);
		}

		self.issue_into(cache, audience).await
	}

	/// Discards any cached credential for `audience` and issues a new one.
	pub async fn refresh(
		&self,
		cache: &CredentialCache,
		audience: &Audience,
	) -> Result<TokenSecret, AuthError> {
		cache.invalidate(audience);

		self.issue_into(cache, audience).await
	}

	async fn issue_into(
		&self,
		cache: &CredentialCache,
		audience: &Audience,
	) -> Result<TokenSecret, AuthError> {
		tracing::debug!(%audience, "Requesting machine token.");

		match self.issuer.issue(audience).await {
			Ok(credential) => {
				let token = credential.token.clone();

				cache.store(credential);
				obs::record_call(Operation::TokenIssue, Outcome::Success);

				Ok(token)
			},
			Err(e) => {
				obs::record_call(Operation::TokenIssue, Outcome::Failure);

				Err(e)
			},
		}
	}
}
impl Debug for TokenProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenProvider(..)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::StaticTokenIssuer;

	fn audience(value: &str) -> Audience {
		Audience::new(value).expect("Audience fixture should be valid.")
	}

	#[tokio::test]
	async fn token_is_cached_per_audience() {
		let issuer = Arc::new(StaticTokenIssuer::default());
		let provider = TokenProvider::new(issuer.clone());
		let cache = CredentialCache::default();
		let source = audience("https://m2m.example.com/");
		let destination = audience("https://u-bahn.example.com");
		let first = provider.token(&cache, &source).await.expect("First issuance should succeed.");
		let second = provider.token(&cache, &source).await.expect("Cached lookup should succeed.");
		let other =
			provider.token(&cache, &destination).await.expect("Second audience should succeed.");

		assert_eq!(first, second);
		assert_ne!(first, other);
		assert_eq!(issuer.issued(), vec![source, destination]);
		assert_eq!(cache.len(), 2);
	}

	#[tokio::test]
	async fn refresh_forces_new_issuance() {
		let issuer = Arc::new(StaticTokenIssuer::default());
		let provider = TokenProvider::new(issuer.clone());
		let cache = CredentialCache::default();
		let source = audience("https://m2m.example.com/");
		let first = provider.token(&cache, &source).await.expect("Issuance should succeed.");
		let refreshed = provider.refresh(&cache, &source).await.expect("Refresh should succeed.");

		assert_ne!(first, refreshed);
		assert_eq!(issuer.issued().len(), 2);
		assert_eq!(cache.valid_token(&source, OffsetDateTime::now_utc()), Some(refreshed));
	}

	#[tokio::test]
	async fn expired_credentials_are_reissued() {
		let issuer = Arc::new(StaticTokenIssuer::expiring());
		let provider = TokenProvider::new(issuer.clone());
		let cache = CredentialCache::default();
		let source = audience("https://m2m.example.com/");

		provider.token(&cache, &source).await.expect("First issuance should succeed.");
		provider.token(&cache, &source).await.expect("Reissuance should succeed.");

		assert_eq!(issuer.issued().len(), 2);
	}

	#[test]
	fn credential_debug_redacts_token() {
		let credential = Credential::new(
			audience("https://m2m.example.com/"),
			"very-secret",
			OffsetDateTime::UNIX_EPOCH,
		);

		assert!(!format!("{credential:?}").contains("very-secret"));
		assert!(credential.is_expired_at(OffsetDateTime::now_utc()));
	}
}
