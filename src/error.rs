//! Error types for dependency resolution

use crate::key::Key;

/// Result alias used throughout the crate.
pub type DiResult<T> = Result<T, DiError>;

/// Boxed error type returned by dependency factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for dependency lookup and injection
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum DiError {
	/// The key is absent from the active map chain (root, context or patch).
	#[error("unable to find a dependency for {key}{}", match .function { Some(f) => format!(" when calling {f}"), None => String::new() })]
	NotFound {
		key: Key,
		/// Name of the wrapped function, when raised through the injector.
		function: Option<&'static str>,
	},

	/// An injected parameter was supplied positionally. Injected parameters
	/// must be supplied by name only.
	#[error("argument {name} of {function} is injected and must be supplied by name, not positionally")]
	ArgumentConflict {
		function: &'static str,
		name: &'static str,
	},

	/// `unpatch` was called with no corresponding active patch.
	#[error("illegal state: {0}")]
	IllegalState(String),

	/// A typed access found a value of a different type under the key.
	#[error("dependency {key} is not of the requested type {expected}")]
	TypeMismatch { key: Key, expected: &'static str },

	/// A dependency factory failed. The source error is carried unchanged.
	#[error("factory for dependency {key} failed")]
	Factory {
		key: Key,
		#[source]
		source: BoxError,
	},
}

impl DiError {
	pub(crate) fn not_found(key: Key) -> Self {
		DiError::NotFound {
			key,
			function: None,
		}
	}
}
