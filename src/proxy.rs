//! Uncached proxy handle over a map entry
//!
//! A [`Proxy`] stands in for a dependency without resolving it. Every
//! operation performs a fresh lookup at that moment, so a changed
//! registration (or a context switch on a contextual map) is observed by
//! the next operation without re-creating the handle. Construction never
//! triggers a lookup.
//!
//! Rather than forwarding arbitrary operations to the underlying value,
//! the proxy exposes narrow accessors: [`resolve`](Proxy::resolve) for the
//! value itself and [`with`](Proxy::with) to apply one operation to it.

use crate::error::DiResult;
use crate::key::Key;
use crate::map::{DependencyResolver, ResolverExt, Shared};
use std::any::Any;
use std::sync::Arc;

/// Handle deferring every lookup to the moment of use.
///
/// # Examples
///
/// ```
/// use dimap::{DependencyMap, ResolverExt};
/// use std::sync::Arc;
///
/// let map = Arc::new(DependencyMap::new());
/// let limit = map.proxy("limit");
///
/// // Nothing is resolved yet; registration may happen later.
/// map.set("limit", 10u32);
/// assert_eq!(*limit.resolve::<u32>().unwrap(), 10);
///
/// map.set("limit", 20u32);
/// assert_eq!(*limit.resolve::<u32>().unwrap(), 20);
/// ```
#[derive(Clone)]
pub struct Proxy {
	resolver: Arc<dyn DependencyResolver>,
	key: Key,
}

impl Proxy {
	/// Binds a handle to `resolver` and `key`. No lookup is performed.
	pub fn new(resolver: Arc<dyn DependencyResolver>, key: impl Into<Key>) -> Self {
		Self {
			resolver,
			key: key.into(),
		}
	}

	/// Resolves the underlying value right now, typed.
	pub fn resolve<T: Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
		self.resolver.get::<T>(self.key.clone())
	}

	/// Resolves the underlying value right now, type-erased.
	pub fn raw(&self) -> DiResult<Shared> {
		self.resolver.resolve(&self.key)
	}

	/// Resolves freshly and applies `f` to the value.
	pub fn with<T, R>(&self, f: impl FnOnce(&T) -> R) -> DiResult<R>
	where
		T: Any + Send + Sync,
	{
		let value = self.resolve::<T>()?;
		Ok(f(&value))
	}

	/// Whether the bound key is currently registered.
	pub fn is_registered(&self) -> bool {
		self.resolver.contains(&self.key)
	}

	/// The bound key.
	pub fn key(&self) -> &Key {
		&self.key
	}
}

impl std::fmt::Debug for Proxy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Proxy").field("key", &self.key).finish()
	}
}
