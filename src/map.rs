//! Dependency map with per-key evaluation policies
//!
//! [`DependencyMap`] stores one provider per [`Key`]: either a literal value
//! or a factory closure. [`Flags`] select how a factory is evaluated on
//! lookup:
//!
//! - `FACTORY`: run the closure on every lookup
//! - `FACTORY | SINGLETON`: run it exactly once, share the result
//! - `FACTORY | THREAD`: run it once per calling thread
//!
//! `SINGLETON`/`THREAD` bits on a literal entry are stored but have no
//! effect. Factories receive the resolver itself so they can look up other
//! dependencies.
//!
//! # Examples
//!
//! ```
//! use dimap::{DependencyMap, ResolverExt};
//!
//! let map = DependencyMap::new();
//! map.set("greeting", "hello".to_string());
//! map.singleton("counter", |_deps| Ok(1u32));
//!
//! assert_eq!(*map.get::<String>("greeting").unwrap(), "hello");
//! assert_eq!(*map.get::<u32>("counter").unwrap(), 1);
//! ```

use crate::descriptor::Descriptor;
use crate::error::{BoxError, DiError, DiResult};
use crate::key::Key;
use crate::proxy::Proxy;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::collections::HashMap;
use std::ops::BitOr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, ThreadId};

/// Type-erased shared dependency value.
pub type Shared = Arc<dyn Any + Send + Sync>;

/// Type-erased factory closure stored in the map.
pub type FactoryFn = Arc<dyn Fn(&dyn DependencyResolver) -> Result<Shared, BoxError> + Send + Sync>;

/// Per-key evaluation flags.
///
/// Only combinations including [`Flags::FACTORY`] alter evaluation; the
/// other bits are ignored for literal entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
	pub const NONE: Flags = Flags(0);
	/// The stored value is a factory closure, invoked on lookup.
	pub const FACTORY: Flags = Flags(1);
	/// The factory result is computed once and shared by all lookups.
	pub const SINGLETON: Flags = Flags(2);
	/// The factory result is computed once per calling thread.
	pub const THREAD: Flags = Flags(4);

	/// Whether every bit of `other` is set in `self`.
	pub fn contains(self, other: Flags) -> bool {
		self.0 & other.0 == other.0
	}
}

impl BitOr for Flags {
	type Output = Flags;

	fn bitor(self, rhs: Flags) -> Flags {
		Flags(self.0 | rhs.0)
	}
}

/// Core resolver seam implemented by every map form.
///
/// [`DependencyMap`], [`ContextualDependencyMap`](crate::ContextualDependencyMap)
/// and [`PatchedDependencyMap`](crate::PatchedDependencyMap) all implement
/// this trait, so layers compose freely. Typed access lives on
/// [`ResolverExt`].
pub trait DependencyResolver: Send + Sync {
	/// Resolves the value registered under `key`, applying the entry's
	/// evaluation policy. Fails with [`DiError::NotFound`] when absent.
	fn resolve(&self, key: &Key) -> DiResult<Shared>;

	/// Stores `value` as a literal under `key`, clearing any flags
	/// previously associated with it.
	fn insert(&self, key: Key, value: Shared);

	/// Whether `key` is registered.
	fn contains(&self, key: &Key) -> bool;
}

/// Typed convenience over any [`DependencyResolver`].
pub trait ResolverExt: DependencyResolver {
	/// Resolves `key` and downcasts the value to `T`.
	fn get<T: Any + Send + Sync>(&self, key: impl Into<Key>) -> DiResult<Arc<T>> {
		let key = key.into();
		let value = self.resolve(&key)?;
		value.downcast::<T>().map_err(|_| DiError::TypeMismatch {
			key,
			expected: std::any::type_name::<T>(),
		})
	}

	/// Stores `value` as a literal under `key` (plain assignment, clears
	/// flags).
	fn set<T: Any + Send + Sync>(&self, key: impl Into<Key>, value: T) {
		self.insert(key.into(), Arc::new(value));
	}
}

impl<R: DependencyResolver + ?Sized> ResolverExt for R {}

#[derive(Clone)]
enum Provider {
	Literal(Shared),
	Factory(FactoryFn),
}

#[derive(Clone)]
struct Entry {
	provider: Provider,
	flags: Flags,
}

fn same_entry(a: &Entry, b: &Entry) -> bool {
	if a.flags != b.flags {
		return false;
	}
	match (&a.provider, &b.provider) {
		(Provider::Literal(x), Provider::Literal(y)) => Arc::ptr_eq(x, y),
		(Provider::Factory(x), Provider::Factory(y)) => Arc::ptr_eq(x, y),
		_ => false,
	}
}

/// Mapping from [`Key`] to dependency values with per-key caching policies.
///
/// The map is `Send + Sync`; lookups and registrations may happen from any
/// thread. Singleton factories execute exactly once even under concurrent
/// first lookups. A singleton factory must not resolve its own key.
pub struct DependencyMap {
	entries: RwLock<HashMap<Key, Entry>>,
	singletons: Mutex<HashMap<Key, Arc<OnceCell<Shared>>>>,
	per_thread: RwLock<HashMap<(ThreadId, Key), Shared>>,
}

impl DependencyMap {
	/// Creates an empty map.
	pub fn new() -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
			singletons: Mutex::new(HashMap::new()),
			per_thread: RwLock::new(HashMap::new()),
		}
	}

	/// Registers a literal value under `key` with the given flags,
	/// replacing any previous flags and invalidating the key's caches.
	///
	/// Flags without `FACTORY` semantics have no effect on a literal entry.
	pub fn register<T: Any + Send + Sync>(&self, key: impl Into<Key>, value: T, flags: Flags) {
		let key = key.into();
		tracing::debug!(%key, ?flags, "registered dependency");
		self.invalidate(&key);
		let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
		entries.insert(
			key,
			Entry {
				provider: Provider::Literal(Arc::new(value)),
				flags,
			},
		);
	}

	/// Registers `f` as the factory for `key`. `FACTORY` is implied and
	/// combined with `flags`.
	pub fn register_factory<T, F>(&self, key: impl Into<Key>, flags: Flags, f: F)
	where
		T: Any + Send + Sync,
		F: Fn(&dyn DependencyResolver) -> Result<T, BoxError> + Send + Sync + 'static,
	{
		let key = key.into();
		let flags = flags | Flags::FACTORY;
		tracing::debug!(%key, ?flags, "registered dependency factory");
		let factory: FactoryFn = Arc::new(move |deps| f(deps).map(|v| Arc::new(v) as Shared));
		self.invalidate(&key);
		let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
		entries.insert(
			key,
			Entry {
				provider: Provider::Factory(factory),
				flags,
			},
		);
	}

	/// Registers a factory invoked on every lookup (no caching).
	///
	/// # Examples
	///
	/// ```
	/// use dimap::{DependencyMap, ResolverExt};
	/// use std::sync::atomic::{AtomicU32, Ordering};
	/// use std::sync::Arc;
	///
	/// let map = DependencyMap::new();
	/// let calls = Arc::new(AtomicU32::new(0));
	/// let counter = Arc::clone(&calls);
	/// map.factory("seq", move |_deps| Ok(counter.fetch_add(1, Ordering::SeqCst) + 1));
	///
	/// assert_eq!(*map.get::<u32>("seq").unwrap(), 1);
	/// assert_eq!(*map.get::<u32>("seq").unwrap(), 2);
	/// ```
	pub fn factory<T, F>(&self, key: impl Into<Key>, f: F)
	where
		T: Any + Send + Sync,
		F: Fn(&dyn DependencyResolver) -> Result<T, BoxError> + Send + Sync + 'static,
	{
		self.register_factory(key, Flags::NONE, f);
	}

	/// Registers a factory computed exactly once; every lookup afterwards
	/// returns the cached result, regardless of calling thread.
	pub fn singleton<T, F>(&self, key: impl Into<Key>, f: F)
	where
		T: Any + Send + Sync,
		F: Fn(&dyn DependencyResolver) -> Result<T, BoxError> + Send + Sync + 'static,
	{
		self.register_factory(key, Flags::SINGLETON, f);
	}

	/// Registers a factory computed once per calling thread; each thread
	/// gets an independent first computation.
	pub fn thread<T, F>(&self, key: impl Into<Key>, f: F)
	where
		T: Any + Send + Sync,
		F: Fn(&dyn DependencyResolver) -> Result<T, BoxError> + Send + Sync + 'static,
	{
		self.register_factory(key, Flags::THREAD, f);
	}

	/// Flags currently associated with `key`, if registered.
	pub fn flags(&self, key: &Key) -> Option<Flags> {
		let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
		entries.get(key).map(|entry| entry.flags)
	}

	/// Drops all singleton and per-thread cache entries. Registrations are
	/// kept. Intended for test support.
	pub fn clear_caches(&self) {
		self.singletons
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clear();
		self.per_thread
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.clear();
	}

	/// Creates an independent map holding the same registrations with
	/// fresh, empty caches. Later changes to either map do not affect the
	/// other.
	pub fn fork(&self) -> DependencyMap {
		let entries = self
			.entries
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone();
		DependencyMap {
			entries: RwLock::new(entries),
			singletons: Mutex::new(HashMap::new()),
			per_thread: RwLock::new(HashMap::new()),
		}
	}

	/// Captures the current registrations and returns a guard restoring
	/// them on drop. Registrations changed inside the scope get their
	/// caches invalidated on restore; untouched keys keep theirs.
	///
	/// # Examples
	///
	/// ```
	/// use dimap::{DependencyMap, ResolverExt};
	///
	/// let map = DependencyMap::new();
	/// map.set("ham", 10u32);
	/// {
	/// 	let _scope = map.snapshot();
	/// 	map.set("ham", 1u32);
	/// 	assert_eq!(*map.get::<u32>("ham").unwrap(), 1);
	/// }
	/// assert_eq!(*map.get::<u32>("ham").unwrap(), 10);
	/// ```
	pub fn snapshot(&self) -> MapSnapshot<'_> {
		let saved = self
			.entries
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone();
		MapSnapshot { map: self, saved }
	}

	/// Typed descriptor bound to this map and `key`; see [`Descriptor`].
	pub fn descriptor<T: Any + Send + Sync>(self: &Arc<Self>, key: impl Into<Key>) -> Descriptor<T> {
		Descriptor::new(
			Arc::clone(self) as Arc<dyn DependencyResolver>,
			key,
		)
	}

	/// Uncached proxy handle bound to this map and `key`; see [`Proxy`].
	pub fn proxy(self: &Arc<Self>, key: impl Into<Key>) -> Proxy {
		Proxy::new(Arc::clone(self) as Arc<dyn DependencyResolver>, key)
	}

	fn invalidate(&self, key: &Key) {
		self.singletons
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(key);
		self.per_thread
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.retain(|(_, k), _| k != key);
	}

	fn run_factory(&self, key: &Key, factory: &FactoryFn) -> DiResult<Shared> {
		factory(self).map_err(|source| {
			tracing::error!(%key, error = %source, "dependency factory failed");
			DiError::Factory {
				key: key.clone(),
				source,
			}
		})
	}
}

impl Default for DependencyMap {
	fn default() -> Self {
		Self::new()
	}
}

impl DependencyResolver for DependencyMap {
	fn resolve(&self, key: &Key) -> DiResult<Shared> {
		let entry = {
			let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
			entries.get(key).cloned()
		};
		let Some(entry) = entry else {
			return Err(DiError::not_found(key.clone()));
		};
		let factory = match entry.provider {
			Provider::Literal(value) => return Ok(value),
			Provider::Factory(factory) => factory,
		};

		if entry.flags.contains(Flags::SINGLETON) {
			let cell = {
				let mut singletons = self
					.singletons
					.lock()
					.unwrap_or_else(PoisonError::into_inner);
				Arc::clone(singletons.entry(key.clone()).or_default())
			};
			let value = cell.get_or_try_init(|| {
				tracing::debug!(%key, "running singleton factory");
				self.run_factory(key, &factory)
			})?;
			Ok(Arc::clone(value))
		} else if entry.flags.contains(Flags::THREAD) {
			let slot = (thread::current().id(), key.clone());
			{
				let cache = self
					.per_thread
					.read()
					.unwrap_or_else(PoisonError::into_inner);
				if let Some(value) = cache.get(&slot) {
					return Ok(Arc::clone(value));
				}
			}
			tracing::debug!(%key, thread = ?slot.0, "running thread factory");
			let value = self.run_factory(key, &factory)?;
			self.per_thread
				.write()
				.unwrap_or_else(PoisonError::into_inner)
				.insert(slot, Arc::clone(&value));
			Ok(value)
		} else {
			tracing::debug!(%key, "running factory");
			self.run_factory(key, &factory)
		}
	}

	fn insert(&self, key: Key, value: Shared) {
		self.invalidate(&key);
		let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
		entries.insert(
			key,
			Entry {
				provider: Provider::Literal(value),
				flags: Flags::NONE,
			},
		);
	}

	fn contains(&self, key: &Key) -> bool {
		let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
		entries.contains_key(key)
	}
}

/// Guard returned by [`DependencyMap::snapshot`]. Restores the captured
/// registrations when dropped.
pub struct MapSnapshot<'a> {
	map: &'a DependencyMap,
	saved: HashMap<Key, Entry>,
}

impl Drop for MapSnapshot<'_> {
	fn drop(&mut self) {
		let saved = std::mem::take(&mut self.saved);
		let changed: Vec<Key> = {
			let entries = self
				.map
				.entries
				.read()
				.unwrap_or_else(PoisonError::into_inner);
			entries
				.iter()
				.filter(|(key, entry)| {
					saved.get(*key).is_none_or(|prev| !same_entry(prev, entry))
				})
				.map(|(key, _)| key.clone())
				.chain(
					saved
						.keys()
						.filter(|key| !entries.contains_key(*key))
						.cloned(),
				)
				.collect()
		};
		for key in &changed {
			self.map.invalidate(key);
		}
		let mut entries = self
			.map
			.entries
			.write()
			.unwrap_or_else(PoisonError::into_inner);
		*entries = saved;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flags_combine_with_bitor() {
		let flags = Flags::FACTORY | Flags::SINGLETON;
		assert!(flags.contains(Flags::FACTORY));
		assert!(flags.contains(Flags::SINGLETON));
		assert!(!flags.contains(Flags::THREAD));
	}

	#[test]
	fn none_contains_only_none() {
		assert!(Flags::NONE.contains(Flags::NONE));
		assert!(!Flags::NONE.contains(Flags::FACTORY));
	}

	#[test]
	fn register_replaces_flags_entirely() {
		let map = DependencyMap::new();
		map.register("foo", 1u32, Flags::SINGLETON | Flags::THREAD);
		map.register("foo", 2u32, Flags::NONE);
		assert_eq!(map.flags(&Key::from("foo")), Some(Flags::NONE));
	}

	#[test]
	fn set_clears_flags() {
		let map = DependencyMap::new();
		map.singleton("foo", |_deps| Ok(1u32));
		assert!(
			map.flags(&Key::from("foo"))
				.is_some_and(|f| f.contains(Flags::FACTORY | Flags::SINGLETON))
		);
		map.set("foo", 2u32);
		assert_eq!(map.flags(&Key::from("foo")), Some(Flags::NONE));
		assert_eq!(*map.get::<u32>("foo").unwrap(), 2);
	}
}
