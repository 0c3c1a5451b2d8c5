//! Descriptor and Proxy access-form tests
//!
//! Both forms defer the lookup to the moment of use: a re-registration or
//! a context switch is observed by the next access without rebuilding the
//! handle.

use dimap::{ContextualDependencyMap, DependencyMap, DiError, Key, ResolverExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn descriptor_performs_a_fresh_lookup_per_access() {
	let map = Arc::new(DependencyMap::new());
	map.set("limit", 10u32);

	let limit = map.descriptor::<u32>("limit");
	assert_eq!(*limit.get().unwrap(), 10);

	map.set("limit", 20u32);
	assert_eq!(*limit.get().unwrap(), 20);
}

#[test]
fn descriptor_observes_factory_reexecution() {
	let map = Arc::new(DependencyMap::new());
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	map.factory("seq", move |_deps| {
		Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
	});

	let seq = map.descriptor::<usize>("seq");
	assert_eq!(*seq.get().unwrap(), 1);
	assert_eq!(*seq.get().unwrap(), 2);
}

#[test]
fn descriptor_for_missing_key_fails_on_access_not_creation() {
	let map = Arc::new(DependencyMap::new());
	let slot = map.descriptor::<String>("late");

	assert!(matches!(
		slot.get().unwrap_err(),
		DiError::NotFound { .. }
	));

	map.set("late", "now".to_string());
	assert_eq!(*slot.get().unwrap(), "now");
}

#[test]
fn descriptor_reports_type_mismatch() {
	let map = Arc::new(DependencyMap::new());
	map.set("foo", 1u32);

	let slot = map.descriptor::<String>("foo");
	match slot.get().unwrap_err() {
		DiError::TypeMismatch { key, expected } => {
			assert_eq!(key, Key::from("foo"));
			assert!(expected.contains("String"));
		}
		other => panic!("expected TypeMismatch, got {other:?}"),
	}
}

#[test]
fn cloned_descriptor_shares_the_binding() {
	let map = Arc::new(DependencyMap::new());
	map.set("foo", 1u32);

	let slot = map.descriptor::<u32>("foo");
	let clone = slot.clone();
	map.set("foo", 2u32);

	assert_eq!(*slot.get().unwrap(), 2);
	assert_eq!(*clone.get().unwrap(), 2);
	assert_eq!(clone.key(), &Key::from("foo"));
}

#[test]
fn proxy_construction_performs_no_lookup() {
	let map = Arc::new(DependencyMap::new());
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	map.factory("expensive", move |_deps| {
		Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
	});

	let proxy = map.proxy("expensive");
	assert_eq!(calls.load(Ordering::SeqCst), 0);

	assert_eq!(*proxy.resolve::<usize>().unwrap(), 1);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn proxy_never_caches_the_value() {
	let map = Arc::new(DependencyMap::new());
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	map.factory("seq", move |_deps| {
		Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
	});

	let proxy = map.proxy("seq");
	assert_eq!(*proxy.resolve::<usize>().unwrap(), 1);
	assert_eq!(*proxy.resolve::<usize>().unwrap(), 2);
	assert_eq!(*proxy.resolve::<usize>().unwrap(), 3);
}

#[test]
fn proxy_reflects_re_registration() {
	let map = Arc::new(DependencyMap::new());
	map.set("foo", "old".to_string());

	let proxy = map.proxy("foo");
	assert_eq!(*proxy.resolve::<String>().unwrap(), "old");

	map.set("foo", "new".to_string());
	assert_eq!(*proxy.resolve::<String>().unwrap(), "new");
}

#[test]
fn proxy_with_applies_an_operation_to_the_fresh_value() {
	let map = Arc::new(DependencyMap::new());
	map.set("name", "world".to_string());

	let proxy = map.proxy("name");
	let greeting = proxy
		.with::<String, _>(|name| format!("hello, {name}"))
		.unwrap();
	assert_eq!(greeting, "hello, world");
}

#[test]
fn proxy_registration_check_is_live() {
	let map = Arc::new(DependencyMap::new());
	let proxy = map.proxy("foo");

	assert!(!proxy.is_registered());
	map.set("foo", 1u8);
	assert!(proxy.is_registered());
}

#[test]
fn proxy_for_missing_key_fails_with_not_found() {
	let map = Arc::new(DependencyMap::new());
	let proxy = map.proxy("missing");
	assert!(matches!(
		proxy.resolve::<String>().unwrap_err(),
		DiError::NotFound { .. }
	));
	assert!(proxy.raw().is_err());
}

#[test]
fn contextual_proxy_follows_the_active_context() {
	let map = Arc::new(ContextualDependencyMap::new());
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	map.singleton("conn", move |_deps| {
		Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
	});

	let proxy = map.proxy("conn");
	assert_eq!(*proxy.resolve::<usize>().unwrap(), 1);

	map.context("test");
	assert_eq!(*proxy.resolve::<usize>().unwrap(), 2);

	// Back to the root, the original cached value reappears.
	map.context(None);
	assert_eq!(*proxy.resolve::<usize>().unwrap(), 1);
}

#[test]
fn contextual_descriptor_follows_the_active_context() {
	let map = Arc::new(ContextualDependencyMap::new());
	map.set("foo", "ROOT".to_string());

	let slot = map.descriptor::<String>("foo");
	assert_eq!(*slot.get().unwrap(), "ROOT");

	{
		let _ctx = map.activate("A");
		map.set("foo", "A".to_string());
		assert_eq!(*slot.get().unwrap(), "A");
	}
	assert_eq!(*slot.get().unwrap(), "ROOT");
}

#[test]
fn descriptor_and_proxy_agree_at_the_same_moment() {
	let map = Arc::new(DependencyMap::new());
	map.singleton("shared", |_deps| Ok("value".to_string()));

	let slot = map.descriptor::<String>("shared");
	let proxy = map.proxy("shared");

	let via_slot = slot.get().unwrap();
	let via_proxy = proxy.resolve::<String>().unwrap();
	assert!(Arc::ptr_eq(&via_slot, &via_proxy));
}
