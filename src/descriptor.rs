//! Typed descriptor slot bound to a map and key
//!
//! A [`Descriptor`] is the field-level access form: store one as a struct
//! field (or a `static`) and every [`get`](Descriptor::get) performs a
//! fresh lookup against the bound resolver. The slot itself never caches;
//! any caching is the map's own singleton/thread policy.

use crate::error::DiResult;
use crate::key::Key;
use crate::map::{DependencyResolver, ResolverExt};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed dependency slot performing a fresh lookup on every access.
///
/// # Examples
///
/// ```
/// use dimap::{DependencyMap, Descriptor, Key, ResolverExt};
/// use std::sync::Arc;
///
/// struct Service {
/// 	limit: Descriptor<u32>,
/// }
///
/// let map = Arc::new(DependencyMap::new());
/// map.set("limit", 10u32);
///
/// let service = Service {
/// 	limit: map.descriptor("limit"),
/// };
/// assert_eq!(*service.limit.get().unwrap(), 10);
///
/// map.set("limit", 20u32);
/// assert_eq!(*service.limit.get().unwrap(), 20);
/// ```
pub struct Descriptor<T> {
	resolver: Arc<dyn DependencyResolver>,
	key: Key,
	_marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Descriptor<T> {
	/// Binds a slot to `resolver` and `key`. No lookup is performed.
	pub fn new(resolver: Arc<dyn DependencyResolver>, key: impl Into<Key>) -> Self {
		Self {
			resolver,
			key: key.into(),
			_marker: PhantomData,
		}
	}

	/// Resolves the bound key right now. Fails with
	/// [`DiError::NotFound`](crate::DiError::NotFound) when absent and
	/// [`DiError::TypeMismatch`](crate::DiError::TypeMismatch) when the
	/// registered value is not a `T`.
	pub fn get(&self) -> DiResult<Arc<T>> {
		self.resolver.get::<T>(self.key.clone())
	}

	/// The bound key.
	pub fn key(&self) -> &Key {
		&self.key
	}
}

impl<T> Clone for Descriptor<T> {
	fn clone(&self) -> Self {
		Self {
			resolver: Arc::clone(&self.resolver),
			key: self.key.clone(),
			_marker: PhantomData,
		}
	}
}
