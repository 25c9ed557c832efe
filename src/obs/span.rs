// crates.io
use tracing::{Instrument, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::JobKind};

/// Span wrapper used by jobs, tagged with the job kind and the current stage.
#[derive(Clone, Debug)]
pub struct JobSpan {
	span: tracing::Span,
}
impl JobSpan {
	/// Creates a new span tagged with the provided job kind + stage.
	pub fn new(kind: JobKind, stage: &'static str) -> Self {
		Self { span: tracing::info_span!("profile_sync.job", job = kind.as_str(), stage) }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
