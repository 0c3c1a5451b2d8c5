//! Override layer for substituting dependencies, mostly useful for tests
//!
//! [`PatchedDependencyMap`] shadows specific keys on top of a target
//! resolver without touching the target. Lookups consult the overrides
//! first and otherwise delegate, so the target's factory, singleton and
//! per-thread semantics are unaffected for unpatched keys. Because the
//! patch layer implements [`DependencyResolver`] itself, it is usable
//! anywhere a plain map is expected and patches can be layered.

use crate::error::DiResult;
use crate::key::Key;
use crate::map::{DependencyResolver, Shared};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Map wrapper that consults its own overrides before the target.
///
/// Writes always land in the override store (last-write-wins per key),
/// never in the target.
///
/// # Examples
///
/// ```
/// use dimap::{DependencyMap, PatchedDependencyMap, ResolverExt};
/// use std::sync::Arc;
///
/// let map = Arc::new(DependencyMap::new());
/// map.set("answer", 42u32);
///
/// let patched = PatchedDependencyMap::new(map.clone());
/// patched.set("answer", 7u32);
///
/// assert_eq!(*patched.get::<u32>("answer").unwrap(), 7);
/// assert_eq!(*map.get::<u32>("answer").unwrap(), 42);
/// ```
pub struct PatchedDependencyMap {
	target: Arc<dyn DependencyResolver>,
	overrides: RwLock<HashMap<Key, Shared>>,
}

impl PatchedDependencyMap {
	/// Creates an override layer on top of `target` with no overrides.
	pub fn new(target: Arc<dyn DependencyResolver>) -> Self {
		Self {
			target,
			overrides: RwLock::new(HashMap::new()),
		}
	}

	/// The wrapped target resolver.
	pub fn target(&self) -> &Arc<dyn DependencyResolver> {
		&self.target
	}

	/// Removes the override for `key`, if any. Returns whether one was
	/// present.
	pub fn remove(&self, key: &Key) -> bool {
		self.overrides
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(key)
			.is_some()
	}

	/// Drops every override, reverting all keys to the target.
	pub fn clear(&self) {
		self.overrides
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.clear();
	}

	/// Number of overridden keys.
	pub fn len(&self) -> usize {
		self.overrides
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	/// Whether no key is overridden.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl DependencyResolver for PatchedDependencyMap {
	fn resolve(&self, key: &Key) -> DiResult<Shared> {
		let overridden = {
			let overrides = self.overrides.read().unwrap_or_else(PoisonError::into_inner);
			overrides.get(key).cloned()
		};
		match overridden {
			Some(value) => Ok(value),
			None => self.target.resolve(key),
		}
	}

	fn insert(&self, key: Key, value: Shared) {
		self.overrides
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(key, value);
	}

	fn contains(&self, key: &Key) -> bool {
		let overrides = self.overrides.read().unwrap_or_else(PoisonError::into_inner);
		overrides.contains_key(key) || self.target.contains(key)
	}
}
