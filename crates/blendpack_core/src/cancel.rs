use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag polled between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
	/// Fresh, unset flag.
	pub fn new() -> Self {
		Self::default()
	}

	/// Request cancellation. Every clone observes it.
	pub fn cancel(&self) {
		self.0.store(true, Ordering::Relaxed);
	}

	/// Whether cancellation was requested.
	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Relaxed)
	}
}
