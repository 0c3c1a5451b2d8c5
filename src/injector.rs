//! Call-time dependency injection for wrapped callables
//!
//! [`Injector`] pairs a resolver with a patch stack and produces wrapped
//! callables. An [`InjectionSpec`] declares, per callable, which named
//! parameters bind to which [`Key`]s (the explicit replacement for
//! inferring bindings from parameter defaults). At call time every bound
//! parameter the caller did not supply is resolved against the injector's
//! currently active resolver, so map swaps and patches are observed by
//! later calls without re-wrapping.
//!
//! # Examples
//!
//! ```
//! use dimap::{CallArgs, DependencyMap, DiError, InjectionSpec, Injector, ResolverExt};
//! use std::sync::Arc;
//!
//! let map = Arc::new(DependencyMap::new());
//! map.set("greeting", "hello".to_string());
//!
//! let injector = Injector::new(map);
//! let spec = InjectionSpec::for_fn("greet")
//! 	.plain("name")
//! 	.inject("greeting", "greeting");
//! let greet = injector.wrap(spec, |args| {
//! 	let name = args.get::<String>("name")?;
//! 	let greeting = args.get::<String>("greeting")?;
//! 	Ok::<_, DiError>(format!("{greeting}, {name}"))
//! });
//!
//! let out = greet
//! 	.call(CallArgs::new().with("name", "world".to_string()))
//! 	.unwrap()
//! 	.unwrap();
//! assert_eq!(out, "hello, world");
//! ```

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::map::{DependencyResolver, Shared};
use crate::patch::PatchedDependencyMap;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

enum Binding {
	Injected(Key),
	Plain,
}

struct Param {
	name: &'static str,
	binding: Binding,
}

/// Declares which parameters of one callable bind to which keys.
///
/// Parameters are ordered; the order is what positional [`CallArgs`] match
/// against. The function name is carried for diagnostics only.
pub struct InjectionSpec {
	function: &'static str,
	params: Vec<Param>,
}

impl InjectionSpec {
	/// Starts a spec for the function named `function`.
	pub fn for_fn(function: &'static str) -> Self {
		Self {
			function,
			params: Vec::new(),
		}
	}

	/// Declares a parameter supplied by the caller, never injected.
	pub fn plain(mut self, name: &'static str) -> Self {
		debug_assert!(
			self.params.iter().all(|p| p.name != name),
			"duplicate parameter {name}"
		);
		self.params.push(Param {
			name,
			binding: Binding::Plain,
		});
		self
	}

	/// Declares a parameter filled from the map under `key` unless the
	/// caller supplies it by name.
	pub fn inject(mut self, name: &'static str, key: impl Into<Key>) -> Self {
		debug_assert!(
			self.params.iter().all(|p| p.name != name),
			"duplicate parameter {name}"
		);
		self.params.push(Param {
			name,
			binding: Binding::Injected(key.into()),
		});
		self
	}

	/// The function name carried for diagnostics.
	pub fn function(&self) -> &'static str {
		self.function
	}

	fn has_injected(&self) -> bool {
		self.params
			.iter()
			.any(|p| matches!(p.binding, Binding::Injected(_)))
	}
}

/// Arguments supplied by the caller of a wrapped callable.
///
/// Positional values match declared parameters in order; named values win
/// over everything and are never overwritten by injection.
#[derive(Default)]
pub struct CallArgs {
	positional: Vec<Shared>,
	named: HashMap<&'static str, Shared>,
}

impl CallArgs {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a positional argument.
	pub fn arg<T: Any + Send + Sync>(mut self, value: T) -> Self {
		self.positional.push(Arc::new(value));
		self
	}

	/// Supplies `name` explicitly. Takes precedence over injection.
	pub fn with<T: Any + Send + Sync>(mut self, name: &'static str, value: T) -> Self {
		self.named.insert(name, Arc::new(value));
		self
	}
}

/// Arguments as seen by the wrapped callable after injection.
pub struct ResolvedArgs {
	values: HashMap<&'static str, Shared>,
}

impl ResolvedArgs {
	/// Typed access to the parameter `name`.
	pub fn get<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Arc<T>> {
		let value = self
			.values
			.get(name)
			.ok_or_else(|| DiError::not_found(Key::from(name)))?;
		Arc::clone(value)
			.downcast::<T>()
			.map_err(|_| DiError::TypeMismatch {
				key: Key::from(name),
				expected: std::any::type_name::<T>(),
			})
	}

	/// Typed access returning `None` when `name` was not supplied or has a
	/// different type.
	pub fn opt<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
		self.values
			.get(name)
			.and_then(|value| Arc::clone(value).downcast::<T>().ok())
	}

	/// Whether `name` was supplied or injected.
	pub fn contains(&self, name: &str) -> bool {
		self.values.contains_key(name)
	}
}

struct InjectorInner {
	base: RwLock<Arc<dyn DependencyResolver>>,
	patches: RwLock<Vec<Arc<dyn DependencyResolver>>>,
	warn_unused: AtomicBool,
}

/// Decorator factory: wraps callables so that bound parameters are filled
/// from the active resolver at call time.
///
/// Cloning is cheap and clones share the same base resolver and patch
/// stack. Pushing and popping patches from multiple threads concurrently is
/// unsupported; synchronize externally if shared.
#[derive(Clone)]
pub struct Injector {
	inner: Arc<InjectorInner>,
}

impl Injector {
	/// Creates an injector resolving against `base`.
	pub fn new(base: Arc<dyn DependencyResolver>) -> Self {
		Self {
			inner: Arc::new(InjectorInner {
				base: RwLock::new(base),
				patches: RwLock::new(Vec::new()),
				warn_unused: AtomicBool::new(true),
			}),
		}
	}

	/// Controls the warning emitted when wrapping a spec with no injected
	/// parameters. On by default.
	pub fn set_warn_unused(&self, enabled: bool) {
		self.inner.warn_unused.store(enabled, Ordering::Relaxed);
	}

	/// The currently active resolver: the top patch layer, or the base map
	/// when nothing is patched.
	pub fn map(&self) -> Arc<dyn DependencyResolver> {
		let patches = self
			.inner
			.patches
			.read()
			.unwrap_or_else(PoisonError::into_inner);
		match patches.last() {
			Some(layer) => Arc::clone(layer),
			None => Arc::clone(
				&self
					.inner
					.base
					.read()
					.unwrap_or_else(PoisonError::into_inner),
			),
		}
	}

	/// Replaces the base resolver. Active patches keep wrapping whatever
	/// they were created over.
	pub fn set_map(&self, base: Arc<dyn DependencyResolver>) {
		*self
			.inner
			.base
			.write()
			.unwrap_or_else(PoisonError::into_inner) = base;
	}

	/// Pushes a fresh override layer over the active resolver and returns
	/// it so the caller can seed overrides.
	///
	/// # Examples
	///
	/// ```
	/// use dimap::{DependencyMap, Injector, ResolverExt};
	/// use std::sync::Arc;
	///
	/// let map = Arc::new(DependencyMap::new());
	/// map.set("answer", 42u32);
	/// let injector = Injector::new(map);
	///
	/// let layer = injector.patch();
	/// layer.set("answer", 7u32);
	/// assert_eq!(*injector.map().get::<u32>("answer").unwrap(), 7);
	///
	/// injector.unpatch().unwrap();
	/// assert_eq!(*injector.map().get::<u32>("answer").unwrap(), 42);
	/// ```
	pub fn patch(&self) -> Arc<PatchedDependencyMap> {
		let layer = Arc::new(PatchedDependencyMap::new(self.map()));
		self.inner
			.patches
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.push(Arc::clone(&layer) as Arc<dyn DependencyResolver>);
		layer
	}

	/// Pushes a caller-built layer (for example a pre-seeded
	/// [`PatchedDependencyMap`]) as the active resolver.
	pub fn patch_map(&self, layer: Arc<dyn DependencyResolver>) {
		self.inner
			.patches
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.push(layer);
	}

	/// Pops the top patch layer, restoring the previously active resolver.
	/// Fails with [`DiError::IllegalState`] when no patch is active.
	pub fn unpatch(&self) -> DiResult<()> {
		self.inner
			.patches
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.pop()
			.map(drop)
			.ok_or_else(|| DiError::IllegalState("unpatch called with no active patch".into()))
	}

	/// Wraps `f` according to `spec`.
	///
	/// A spec with no injected parameters produces a pass-through wrapper;
	/// a warning is emitted unless disabled via [`set_warn_unused`].
	///
	/// [`set_warn_unused`]: Injector::set_warn_unused
	pub fn wrap<F, R>(&self, spec: InjectionSpec, f: F) -> InjectedFn<F>
	where
		F: Fn(&ResolvedArgs) -> R,
	{
		if !spec.has_injected() && self.inner.warn_unused.load(Ordering::Relaxed) {
			tracing::warn!(
				function = spec.function,
				"no injectable parameters found, wrapping is unnecessary"
			);
		}
		InjectedFn {
			injector: self.clone(),
			spec,
			f,
		}
	}
}

/// A callable wrapped by [`Injector::wrap`].
pub struct InjectedFn<F> {
	injector: Injector,
	spec: InjectionSpec,
	f: F,
}

impl<F, R> InjectedFn<F>
where
	F: Fn(&ResolvedArgs) -> R,
{
	/// Invokes the callable, filling every bound parameter the caller did
	/// not supply from the injector's active resolver.
	///
	/// Injected parameters are keyword-only: a positional value landing on
	/// one fails with [`DiError::ArgumentConflict`]. A failed lookup fails
	/// with [`DiError::NotFound`] annotated with the function name.
	pub fn call(&self, args: CallArgs) -> DiResult<R> {
		let CallArgs { positional, named } = args;
		if positional.len() > self.spec.params.len() {
			return Err(DiError::IllegalState(format!(
				"{} takes {} arguments but {} positional were given",
				self.spec.function,
				self.spec.params.len(),
				positional.len()
			)));
		}

		let mut values: HashMap<&'static str, Shared> = HashMap::new();
		for (value, param) in positional.into_iter().zip(&self.spec.params) {
			if matches!(param.binding, Binding::Injected(_)) {
				return Err(DiError::ArgumentConflict {
					function: self.spec.function,
					name: param.name,
				});
			}
			if named.contains_key(param.name) {
				return Err(DiError::IllegalState(format!(
					"{} got multiple values for argument {}",
					self.spec.function, param.name
				)));
			}
			values.insert(param.name, value);
		}
		values.extend(named);

		let map = self.injector.map();
		for param in &self.spec.params {
			if values.contains_key(param.name) {
				continue;
			}
			if let Binding::Injected(key) = &param.binding {
				tracing::debug!(
					function = self.spec.function,
					param = param.name,
					%key,
					"injecting dependency"
				);
				let value = map.resolve(key).map_err(|err| match err {
					DiError::NotFound { key, .. } => DiError::NotFound {
						key,
						function: Some(self.spec.function),
					},
					other => other,
				})?;
				values.insert(param.name, value);
			}
		}

		Ok((self.f)(&ResolvedArgs { values }))
	}

	/// The injector this callable resolves against.
	pub fn injector(&self) -> &Injector {
		&self.injector
	}

	/// The spec this callable was wrapped with.
	pub fn spec(&self) -> &InjectionSpec {
		&self.spec
	}
}
