use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::CancelFlag;
use crate::transfer::{Result, SyncError, TransferError};

/// Attempt bound and exponential backoff for transient sync failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
	/// Attempts per sync call, the first one included.
	pub max_attempts: u32,
	/// Delay before the first retry; doubled for each further one.
	pub base_delay_ms: u64,
	/// Upper bound on a single delay.
	pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay_ms: 500,
			max_delay_ms: 30_000,
		}
	}
}

impl RetryPolicy {
	/// Delay after failed attempt number `attempt` (1-based).
	pub fn delay(&self, attempt: u32) -> Duration {
		let factor = 1_u64 << attempt.saturating_sub(1).min(20);
		Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
	}

	/// Run `op` until it succeeds, fails permanently or runs out of attempts.
	///
	/// `cancel` is checked before every attempt.
	pub fn run<T>(&self, step: &str, cancel: &CancelFlag, mut op: impl FnMut() -> std::result::Result<T, SyncError>) -> Result<T> {
		let attempts = self.max_attempts.max(1);
		let mut attempt = 1;
		loop {
			if cancel.is_cancelled() {
				return Err(TransferError::Cancelled);
			}
			match op() {
				Ok(value) => return Ok(value),
				Err(err) if err.transient && attempt < attempts => {
					let delay = self.delay(attempt);
					warn!(step, attempt, delay_ms = delay.as_millis() as u64, error = %err, "sync call failed, retrying");
					thread::sleep(delay);
					attempt += 1;
				}
				Err(err) => {
					return Err(TransferError::StepFailed {
						step: step.to_owned(),
						attempts: attempt,
						message: err.message,
					});
				}
			}
		}
	}
}
