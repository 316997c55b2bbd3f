// In-place retry of transient network failures for a single work item.

use std::error::Error as StdError;
use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::hls::HlsDownloaderError;
use crate::hls::config::{HlsFetcherConfig, TransientErrorPolicy};
use crate::hls::segment::SegmentState;

impl TransientErrorPolicy {
    /// Classify an error as retryable in place under this policy.
    pub fn is_transient(&self, err: &HlsDownloaderError) -> bool {
        match err {
            HlsDownloaderError::NetworkError { source } => {
                (self.connection_reset && is_connection_reset(&**source))
                    || (self.timeouts && source.is_timeout())
                    || (self.connect_failures && source.is_connect())
            }
            HlsDownloaderError::IoError { source } => match source.kind() {
                ErrorKind::ConnectionReset => self.connection_reset,
                ErrorKind::TimedOut => self.timeouts,
                ErrorKind::ConnectionRefused => self.connect_failures,
                _ => false,
            },
            _ => false,
        }
    }
}

/// Walk the `source()` chain looking for a peer reset.
///
/// Some transports only surface the condition as text, so the message of
/// each link is checked as well.
pub fn is_connection_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == ErrorKind::ConnectionReset {
                return true;
            }
        }
        if e.to_string().to_ascii_lowercase().contains("connection reset") {
            return true;
        }
        current = e.source();
    }
    false
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub max_retries: u32,
    pub delay: Duration,
    pub transient: TransientErrorPolicy,
}

impl RetryPolicy {
    pub fn from_config(config: &HlsFetcherConfig) -> Self {
        Self {
            max_retries: config.max_segment_retries,
            delay: config.segment_retry_delay,
            transient: config.transient_errors,
        }
    }

    /// Run `op` until it succeeds, fails fatally, or runs out of retries.
    ///
    /// Cancellation is checked before every attempt and during the backoff
    /// sleep; an attempt already in progress is allowed to finish.
    pub async fn run<T, F, Fut>(
        &self,
        sequence_id: u64,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, HlsDownloaderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HlsDownloaderError>>,
    {
        let mut state = SegmentState::Pending;
        let mut retries = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(HlsDownloaderError::Cancelled);
            }

            state = transition(sequence_id, state, SegmentState::InFlight);
            match op().await {
                Ok(value) => {
                    transition(sequence_id, state, SegmentState::Succeeded);
                    return Ok(value);
                }
                Err(e) if retries < self.max_retries && self.transient.is_transient(&e) => {
                    retries += 1;
                    state = transition(sequence_id, state, SegmentState::Retrying(retries));
                    warn!(seq = sequence_id, retry = retries, error = %e, "Transient error, retrying segment");

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(HlsDownloaderError::Cancelled),
                        _ = tokio::time::sleep(self.delay) => {}
                    }
                }
                Err(e) => {
                    transition(sequence_id, state, SegmentState::Failed);
                    return Err(e);
                }
            }
        }
    }
}

#[inline]
fn transition(sequence_id: u64, from: SegmentState, to: SegmentState) -> SegmentState {
    debug_assert!(
        !from.is_terminal(),
        "segment {sequence_id} left terminal state {from:?}"
    );
    trace!(seq = sequence_id, ?from, ?to, "Segment state change");
    to
}
