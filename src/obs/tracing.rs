// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by client flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("ledger_client.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event describing a scheduled retry (when enabled).
pub fn trace_retry(kind: FlowKind, uri: &str, attempt: u32, delay: Duration, cause: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			flow = kind.as_str(),
			uri,
			attempt,
			delay_ms = delay.whole_milliseconds() as u64,
			error = %cause,
			"Retrying request after a transient failure."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, uri, attempt, delay, cause);
	}
}

/// Emits a debug event for a loopback request that was answered and ignored (when enabled).
pub fn trace_ignored_request(
	kind: FlowKind,
	reason: &'static str,
	error: Option<&std::io::Error>,
) {
	#[cfg(feature = "tracing")]
	{
		match error {
			Some(error) => tracing::debug!(
				flow = kind.as_str(),
				reason,
				error = %error,
				"Ignored a loopback request; answering it failed."
			),
			None => tracing::debug!(flow = kind.as_str(), reason, "Ignored a loopback request."),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, reason, error);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_passes_the_output_through() {
		let span = FlowSpan::new(FlowKind::Refresh, "instrument_passes_the_output_through");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}

	#[test]
	fn trace_retry_accepts_any_error() {
		trace_retry(
			FlowKind::FetchPages,
			"https://api.example.com/v2/contacts",
			2,
			Duration::milliseconds(200),
			&Error::Cancelled,
		);
	}

	#[test]
	fn trace_ignored_request_accepts_missing_errors() {
		trace_ignored_request(FlowKind::InteractiveLogin, "unrelated_path", None);
		trace_ignored_request(
			FlowKind::InteractiveLogin,
			"unreadable",
			Some(&std::io::ErrorKind::TimedOut.into()),
		);
	}
}
