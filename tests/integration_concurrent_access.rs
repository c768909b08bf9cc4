/// Concurrent access integration tests
///
/// Singletons must be built once no matter how many threads race for them,
/// and every scope must own its own scoped instances.

use shaper::{Resolver, ScopeFactory, ServiceCollection};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
pub struct CounterService {
    count: AtomicU32,
}

impl CounterService {
    pub fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    pub fn increment(&self) -> u32 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get_count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct RequestState {
    id: u32,
    entries: Mutex<Vec<String>>,
}

// ===== Integration Tests =====

#[test]
fn test_singleton_thread_safety() {
    let mut services = ServiceCollection::new();
    services.add_singleton_instance(CounterService::new());

    let provider = Arc::new(services.build());
    let thread_count = 8;
    let operations_per_thread = 100;
    let barrier = Arc::new(Barrier::new(thread_count));

    let handles: Vec<_> = (0..thread_count)
        .map(|_| {
            let provider = Arc::clone(&provider);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait(); // Synchronize start
                let counter = provider.get_required::<CounterService>().unwrap();
                for _ in 0..operations_per_thread {
                    counter.increment();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let counter = provider.get_required::<CounterService>().unwrap();
    assert_eq!(counter.get_count(), (thread_count * operations_per_thread) as u32);
}

#[test]
fn test_singleton_factory_runs_once_under_contention() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let c = constructions.clone();

    let mut services = ServiceCollection::new();
    services.add_singleton_factory::<CounterService, _>(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        // Widen the race window
        thread::sleep(Duration::from_millis(20));
        Ok(CounterService::new())
    });

    let provider = services.build();
    let barrier = Barrier::new(16);

    let instances: Vec<Arc<CounterService>> = crossbeam_utils::thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    provider.get_required::<CounterService>().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn test_scoped_service_isolation() {
    static NEXT_ID: AtomicU32 = AtomicU32::new(0);

    let mut services = ServiceCollection::new();
    services.add_singleton_instance(CounterService::new());
    services.add_scoped_factory::<RequestState, _>(|_| {
        Ok(RequestState {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            entries: Mutex::new(Vec::new()),
        })
    });

    let provider = Arc::new(services.build());
    let thread_count = 10;
    let barrier = Arc::new(Barrier::new(thread_count));

    let handles: Vec<_> = (0..thread_count)
        .map(|thread_id| {
            let provider = Arc::clone(&provider);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();

                let scope = provider.create_scope();
                let counter = scope.get_required::<CounterService>().unwrap();
                let state1 = scope.get_required::<RequestState>().unwrap();
                let state2 = scope.get_required::<RequestState>().unwrap();

                // Singleton is shared with the root
                let root_counter = provider.get_required::<CounterService>().unwrap();
                assert!(Arc::ptr_eq(&counter, &root_counter));

                // Scoped services are the same within a scope
                assert!(Arc::ptr_eq(&state1, &state2));
                state1.entries.lock().unwrap().push(format!("thread-{}", thread_id));
                assert_eq!(state2.entries.lock().unwrap().len(), 1);

                state1.id
            })
        })
        .collect();

    let mut ids: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), thread_count); // All IDs unique
}

#[test]
fn test_scope_shared_between_threads() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let c = constructions.clone();

    let mut services = ServiceCollection::new();
    services.add_scoped_factory::<RequestState, _>(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(RequestState {
            id: 0,
            entries: Mutex::new(Vec::new()),
        })
    });

    let provider = services.build();
    let scope = provider.create_scope();

    crossbeam_utils::thread::scope(|s| {
        for i in 0..8 {
            let scope = &scope;
            s.spawn(move |_| {
                let state = scope.get_required::<RequestState>().unwrap();
                state.entries.lock().unwrap().push(format!("worker-{}", i));
            });
        }
    })
    .unwrap();

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    let state = scope.get_required::<RequestState>().unwrap();
    assert_eq!(state.entries.lock().unwrap().len(), 8);
}

#[test]
fn test_concurrent_scope_creation_via_factory() {
    let mut services = ServiceCollection::new();
    services.add_scoped_factory::<String, _>(|_| Ok("request".to_string()));

    let provider = services.build();
    let factory = provider.get_required::<ScopeFactory>().unwrap();

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..8 {
            let factory = &factory;
            s.spawn(move |_| {
                for _ in 0..25 {
                    let scope = factory.create_scope().unwrap();
                    assert_eq!(scope.get_required::<String>().unwrap().as_str(), "request");
                    scope.dispose();
                }
            });
        }
    })
    .unwrap();
}
