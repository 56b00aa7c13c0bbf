// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolution logger contract.

use std::sync::Arc;

/// Side-channel observer of resolutions.
///
/// Called on the resolution path after every successful point read and every
/// emitted streaming value, and when a source fails. Implementations must be
/// fast and must not panic.
pub trait Logger: Send + Sync + 'static {
	fn info(&self, message: &str);
}

/// Type alias for a shared logger.
pub type SharedLogger = Arc<dyn Logger>;

impl<F> Logger for F
where
	F: Fn(&str) + Send + Sync + 'static,
{
	fn info(&self, message: &str) {
		self(message)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;

	#[test]
	fn closures_are_loggers() {
		let lines = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&lines);
		let logger: SharedLogger = Arc::new(move |message: &str| {
			sink.lock().unwrap().push(message.to_string());
		});

		logger.info("resolved checkout.new_flow");
		assert_eq!(*lines.lock().unwrap(), vec!["resolved checkout.new_flow"]);
	}
}
