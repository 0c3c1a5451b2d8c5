//! # dimap
//!
//! Lightweight keyed dependency injection.
//!
//! A [`DependencyMap`] maps [`Key`]s (strings, integers, Rust types or
//! composites) to literal values or factory closures, with per-key
//! evaluation policies: run on every lookup, exactly once
//! ([`Flags::SINGLETON`]) or once per calling thread ([`Flags::THREAD`]).
//! On top of the map sit:
//!
//! - [`ContextualDependencyMap`] — one isolated child map per context tag
//!   (locale, tenant, ...), switchable at runtime;
//! - [`PatchedDependencyMap`] — an override layer shadowing specific keys,
//!   restorable, mainly for tests;
//! - [`Injector`] — wraps callables so that parameters bound by an
//!   [`InjectionSpec`] are filled from the active map at call time;
//! - [`Descriptor`] and [`Proxy`] — field-level and handle-level access
//!   forms performing a fresh lookup on every use.
//!
//! This is not a framework, just a small set of utilities to keep a
//! project's dependency wiring under control, with unit testing in mind
//! (patching, cache clearing, context resets).
//!
//! ## Example
//!
//! ```
//! use dimap::{CallArgs, DependencyMap, DiError, InjectionSpec, Injector, ResolverExt};
//! use std::sync::Arc;
//!
//! #[derive(Debug, PartialEq)]
//! struct Config {
//! 	info_key: String,
//! }
//!
//! let map = Arc::new(DependencyMap::new());
//! map.singleton("config", |_deps| {
//! 	Ok(Config {
//! 		info_key: "info".to_string(),
//! 	})
//! });
//!
//! let injector = Injector::new(map);
//! let spec = InjectionSpec::for_fn("process").inject("config", "config");
//! let process = injector.wrap(spec, |args| {
//! 	let config = args.get::<Config>("config")?;
//! 	Ok::<_, DiError>(config.info_key.clone())
//! });
//!
//! let info: String = process.call(CallArgs::new()).unwrap().unwrap();
//! assert_eq!(info, "info");
//! ```

mod contextual;
mod descriptor;
mod error;
mod injector;
mod key;
mod map;
mod patch;
mod proxy;

pub use contextual::{ActiveContext, ContextualDependencyMap};
pub use descriptor::Descriptor;
pub use error::{BoxError, DiError, DiResult};
pub use injector::{CallArgs, InjectedFn, InjectionSpec, Injector, ResolvedArgs};
pub use key::Key;
pub use map::{DependencyMap, DependencyResolver, FactoryFn, Flags, MapSnapshot, ResolverExt, Shared};
pub use patch::PatchedDependencyMap;
pub use proxy::Proxy;
