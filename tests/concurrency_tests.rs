//! Concurrency properties of the map caches
//!
//! The singleton cache must run its factory exactly once even when many
//! threads race the first lookup; the per-thread cache must compute once
//! per thread.

use dimap::{DependencyMap, ResolverExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn singleton_factory_executes_exactly_once_under_contention() {
	const THREADS: usize = 16;

	let map = Arc::new(DependencyMap::new());
	let executions = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&executions);
	map.singleton("shared", move |_deps| {
		counter.fetch_add(1, Ordering::SeqCst);
		// Widen the race window a little.
		thread::yield_now();
		Ok("value".to_string())
	});

	let barrier = Arc::new(Barrier::new(THREADS));
	let handles: Vec<_> = (0..THREADS)
		.map(|_| {
			let map = Arc::clone(&map);
			let barrier = Arc::clone(&barrier);
			thread::spawn(move || {
				barrier.wait();
				map.get::<String>("shared").unwrap()
			})
		})
		.collect();

	let values: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
	assert_eq!(executions.load(Ordering::SeqCst), 1);
	for value in &values {
		assert!(Arc::ptr_eq(value, &values[0]));
	}
}

#[test]
fn thread_factory_computes_once_per_thread() {
	const THREADS: usize = 8;

	let map = Arc::new(DependencyMap::new());
	let sequence = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&sequence);
	map.thread("per-thread", move |_deps| {
		Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
	});

	let handles: Vec<_> = (0..THREADS)
		.map(|_| {
			let map = Arc::clone(&map);
			thread::spawn(move || {
				let first = *map.get::<usize>("per-thread").unwrap();
				// Repeated lookups from the same thread stay stable.
				for _ in 0..10 {
					assert_eq!(*map.get::<usize>("per-thread").unwrap(), first);
				}
				first
			})
		})
		.collect();

	let observed: HashSet<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
	assert_eq!(observed.len(), THREADS);
	assert_eq!(sequence.load(Ordering::SeqCst), THREADS);
}

#[test]
fn plain_factory_is_never_cached_across_threads() {
	const THREADS: usize = 4;
	const LOOKUPS: usize = 5;

	let map = Arc::new(DependencyMap::new());
	let executions = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&executions);
	map.factory("uncached", move |_deps| {
		Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
	});

	let handles: Vec<_> = (0..THREADS)
		.map(|_| {
			let map = Arc::clone(&map);
			thread::spawn(move || {
				for _ in 0..LOOKUPS {
					map.get::<usize>("uncached").unwrap();
				}
			})
		})
		.collect();
	for handle in handles {
		handle.join().unwrap();
	}

	assert_eq!(executions.load(Ordering::SeqCst), THREADS * LOOKUPS);
}

#[test]
fn concurrent_registration_and_lookup_do_not_interfere() {
	let map = Arc::new(DependencyMap::new());
	map.set("stable", 1u64);

	let writer = {
		let map = Arc::clone(&map);
		thread::spawn(move || {
			for i in 0..100u64 {
				map.set(format!("key-{i}"), i);
			}
		})
	};
	let reader = {
		let map = Arc::clone(&map);
		thread::spawn(move || {
			for _ in 0..100 {
				assert_eq!(*map.get::<u64>("stable").unwrap(), 1);
			}
		})
	};

	writer.join().unwrap();
	reader.join().unwrap();
}
