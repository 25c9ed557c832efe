//! Fixed pauses between logical operations.
//!
//! Jobs pause once per entity they process (member, user, skill, document), never between the
//! pages of a single pagination walk. The [`Delay`] seam keeps the pause swappable so tests can
//! count pauses without real timers.

// std
use std::time::Duration as StdDuration;
// self
use crate::_prelude::*;

/// Boxed future returned by [`Delay::wait`].
pub type DelayFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Suspends the calling flow for a duration.
pub trait Delay
where
	Self: Send + Sync,
{
	/// Resolves once `duration` has elapsed.
	fn wait(&self, duration: StdDuration) -> DelayFuture<'_>;
}

/// Timer-backed [`Delay`] on the tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioDelay;
impl Delay for TokioDelay {
	fn wait(&self, duration: StdDuration) -> DelayFuture<'_> {
		Box::pin(tokio::time::sleep(duration))
	}
}

/// Applies a fixed pause between consecutive entities.
#[derive(Clone)]
pub struct Throttle {
	delay: Arc<dyn Delay>,
	interval: StdDuration,
}
impl Throttle {
	/// Creates a throttle that pauses for `interval` through `delay`.
	pub fn new(delay: Arc<dyn Delay>, interval: StdDuration) -> Self {
		Self { delay, interval }
	}

	/// Creates a tokio-backed throttle pausing for `interval`.
	pub fn tokio(interval: StdDuration) -> Self {
		Self::new(Arc::new(TokioDelay), interval)
	}

	/// Configured pause length.
	pub fn interval(&self) -> StdDuration {
		self.interval
	}

	/// Pauses before the next entity is processed. Zero intervals still go through the delay so
	/// pause counts stay observable.
	pub async fn pause(&self) {
		tracing::trace!(interval_ms = self.interval.as_millis() as u64, "Throttling next call.");

		self.delay.wait(self.interval).await;
	}
}
impl Debug for Throttle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Throttle").field("interval", &self.interval).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::RecordingDelay;

	#[tokio::test]
	async fn pause_forwards_interval_to_delay() {
		let delay = RecordingDelay::default();
		let throttle = Throttle::new(Arc::new(delay.clone()), StdDuration::from_millis(250));

		throttle.pause().await;
		throttle.pause().await;

		assert_eq!(delay.pauses(), vec![StdDuration::from_millis(250); 2]);
	}

	#[tokio::test(start_paused = true)]
	async fn tokio_delay_waits_for_interval() {
		let throttle = Throttle::tokio(StdDuration::from_millis(1_000));
		let started = tokio::time::Instant::now();

		throttle.pause().await;

		assert!(started.elapsed() >= StdDuration::from_millis(1_000));
	}
}
