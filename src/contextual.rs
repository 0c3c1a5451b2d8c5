//! Context-scoped dependency maps
//!
//! [`ContextualDependencyMap`] keeps one isolated [`DependencyMap`] per
//! context tag on top of a root map. Switching context changes which map
//! receives every read and write; each child map is seeded with a snapshot
//! of the root's registrations when first activated and evolves on its own
//! afterwards (including its singleton and per-thread caches).
//!
//! Context switching is not designed for concurrent mutation: callers
//! sharing one map across threads must synchronize context changes
//! themselves.
//!
//! # Examples
//!
//! ```
//! use dimap::{ContextualDependencyMap, ResolverExt};
//!
//! let map = ContextualDependencyMap::new();
//! map.set("locale", "en".to_string());
//!
//! map.context("es");
//! map.set("locale", "es".to_string());
//! assert_eq!(*map.get::<String>("locale").unwrap(), "es");
//!
//! map.context(None);
//! assert_eq!(*map.get::<String>("locale").unwrap(), "en");
//! ```

use crate::descriptor::Descriptor;
use crate::error::{BoxError, DiResult};
use crate::key::Key;
use crate::map::{DependencyMap, DependencyResolver, Flags, Shared};
use crate::proxy::Proxy;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Dependency map that varies resolution by a named context (locale,
/// tenant, ...).
///
/// Exactly one map is active at a time: the root, or the child map of the
/// last activated context. All resolver operations and registration helpers
/// forward to the active map; with no context active the behavior is
/// identical to a plain [`DependencyMap`].
pub struct ContextualDependencyMap {
	root: Arc<DependencyMap>,
	contexts: RwLock<HashMap<String, Arc<DependencyMap>>>,
	active: RwLock<Option<String>>,
}

impl ContextualDependencyMap {
	/// Creates a map with an empty root and no contexts.
	pub fn new() -> Self {
		Self {
			root: Arc::new(DependencyMap::new()),
			contexts: RwLock::new(HashMap::new()),
			active: RwLock::new(None),
		}
	}

	/// Switches the active context and returns the now-active map.
	///
	/// `None` activates the root. An unseen tag creates a child map seeded
	/// with a snapshot of the root's current registrations; a seen tag
	/// re-activates the existing child, whose caches persist across
	/// re-entry.
	pub fn context<'a>(&self, tag: impl Into<Option<&'a str>>) -> Arc<DependencyMap> {
		match tag.into() {
			None => {
				*self.active.write().unwrap_or_else(PoisonError::into_inner) = None;
				tracing::debug!("switched dependency map context to root");
				Arc::clone(&self.root)
			}
			Some(tag) => {
				let map = {
					let mut contexts = self
						.contexts
						.write()
						.unwrap_or_else(PoisonError::into_inner);
					Arc::clone(contexts.entry(tag.to_string()).or_insert_with(|| {
						tracing::debug!(context = tag, "initializing dependency map for context");
						Arc::new(self.root.fork())
					}))
				};
				*self.active.write().unwrap_or_else(PoisonError::into_inner) =
					Some(tag.to_string());
				tracing::debug!(context = tag, "switched dependency map context");
				map
			}
		}
	}

	/// Switches to `tag` and returns a guard restoring the previously
	/// active context on drop. Guards nest LIFO, so error exits and early
	/// returns restore correctly.
	///
	/// # Examples
	///
	/// ```
	/// use dimap::{ContextualDependencyMap, ResolverExt};
	///
	/// let map = ContextualDependencyMap::new();
	/// map.set("who", "root".to_string());
	/// {
	/// 	let _ctx = map.activate("a");
	/// 	map.set("who", "a".to_string());
	/// 	assert_eq!(*map.get::<String>("who").unwrap(), "a");
	/// }
	/// assert_eq!(*map.get::<String>("who").unwrap(), "root");
	/// ```
	pub fn activate(&self, tag: &str) -> ActiveContext<'_> {
		let prev = self
			.active
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone();
		self.context(tag);
		ActiveContext { map: self, prev }
	}

	/// Discards every child map and returns to the root. Suited for
	/// clearing per-context caches between test cases.
	pub fn reset(&self) {
		self.contexts
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.clear();
		*self.active.write().unwrap_or_else(PoisonError::into_inner) = None;
	}

	/// The currently active map (root or context child).
	pub fn active_map(&self) -> Arc<DependencyMap> {
		let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
		match active.as_deref() {
			None => Arc::clone(&self.root),
			Some(tag) => {
				let contexts = self.contexts.read().unwrap_or_else(PoisonError::into_inner);
				contexts
					.get(tag)
					.cloned()
					.unwrap_or_else(|| Arc::clone(&self.root))
			}
		}
	}

	/// Registers a literal on the active map; see
	/// [`DependencyMap::register`].
	pub fn register<T: Any + Send + Sync>(&self, key: impl Into<Key>, value: T, flags: Flags) {
		self.active_map().register(key, value, flags);
	}

	/// Registers a factory on the active map; see
	/// [`DependencyMap::register_factory`].
	pub fn register_factory<T, F>(&self, key: impl Into<Key>, flags: Flags, f: F)
	where
		T: Any + Send + Sync,
		F: Fn(&dyn DependencyResolver) -> Result<T, BoxError> + Send + Sync + 'static,
	{
		self.active_map().register_factory(key, flags, f);
	}

	/// Registers an uncached factory on the active map.
	pub fn factory<T, F>(&self, key: impl Into<Key>, f: F)
	where
		T: Any + Send + Sync,
		F: Fn(&dyn DependencyResolver) -> Result<T, BoxError> + Send + Sync + 'static,
	{
		self.active_map().factory(key, f);
	}

	/// Registers a singleton factory on the active map.
	pub fn singleton<T, F>(&self, key: impl Into<Key>, f: F)
	where
		T: Any + Send + Sync,
		F: Fn(&dyn DependencyResolver) -> Result<T, BoxError> + Send + Sync + 'static,
	{
		self.active_map().singleton(key, f);
	}

	/// Registers a per-thread factory on the active map.
	pub fn thread<T, F>(&self, key: impl Into<Key>, f: F)
	where
		T: Any + Send + Sync,
		F: Fn(&dyn DependencyResolver) -> Result<T, BoxError> + Send + Sync + 'static,
	{
		self.active_map().thread(key, f);
	}

	/// Drops the active map's caches; see [`DependencyMap::clear_caches`].
	pub fn clear_caches(&self) {
		self.active_map().clear_caches();
	}

	/// Typed descriptor bound to this contextual map; lookups follow the
	/// active context at access time.
	pub fn descriptor<T: Any + Send + Sync>(self: &Arc<Self>, key: impl Into<Key>) -> Descriptor<T> {
		Descriptor::new(Arc::clone(self) as Arc<dyn DependencyResolver>, key)
	}

	/// Uncached proxy handle bound to this contextual map; lookups follow
	/// the active context at access time.
	pub fn proxy(self: &Arc<Self>, key: impl Into<Key>) -> Proxy {
		Proxy::new(Arc::clone(self) as Arc<dyn DependencyResolver>, key)
	}
}

impl Default for ContextualDependencyMap {
	fn default() -> Self {
		Self::new()
	}
}

impl DependencyResolver for ContextualDependencyMap {
	fn resolve(&self, key: &Key) -> DiResult<Shared> {
		self.active_map().resolve(key)
	}

	fn insert(&self, key: Key, value: Shared) {
		self.active_map().insert(key, value);
	}

	fn contains(&self, key: &Key) -> bool {
		self.active_map().contains(key)
	}
}

/// Guard returned by [`ContextualDependencyMap::activate`]. Restores the
/// previously active context when dropped.
#[must_use = "dropping the guard immediately restores the previous context"]
pub struct ActiveContext<'a> {
	map: &'a ContextualDependencyMap,
	prev: Option<String>,
}

impl Drop for ActiveContext<'_> {
	fn drop(&mut self) {
		self.map.context(self.prev.as_deref());
	}
}
