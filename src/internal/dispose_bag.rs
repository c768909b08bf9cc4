//! Internal disposal bag for managing cleanup hooks.

use std::future::Future;
use std::pin::Pin;

/// Future type for disposal operations.
pub type BoxFutureUnit = Pin<Box<dyn Future<Output = ()> + Send>>;

pub type SyncHook = Box<dyn FnOnce() + Send>;
pub type AsyncHook = Box<dyn FnOnce() -> BoxFutureUnit + Send>;

/// Container for disposal hooks with LIFO execution order.
///
/// Async hooks are executed first (in reverse order), followed by sync hooks.
#[derive(Default)]
pub(crate) struct DisposeBag {
    sync: Vec<SyncHook>,
    asyncs: Vec<AsyncHook>,
}

impl DisposeBag {
    pub(crate) fn push_sync(&mut self, f: SyncHook) {
        self.sync.push(f);
    }

    pub(crate) fn push_async(&mut self, f: AsyncHook) {
        self.asyncs.push(f);
    }

    /// Execute all sync hooks in reverse order (LIFO).
    pub(crate) fn run_all_sync_reverse(&mut self) {
        while let Some(f) = self.sync.pop() {
            (f)();
        }
    }

    /// Execute all async hooks in reverse order (LIFO).
    pub(crate) async fn run_all_async_reverse(&mut self) {
        while let Some(f) = self.asyncs.pop() {
            (f)().await;
        }
    }

    pub(crate) fn async_len(&self) -> usize {
        self.asyncs.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.sync.is_empty() && self.asyncs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn sync_hooks_run_in_reverse() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut bag = DisposeBag::default();
        for i in 0..3 {
            let order = order.clone();
            bag.push_sync(Box::new(move || order.lock().unwrap().push(i)));
        }
        bag.run_all_sync_reverse();
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
        assert!(bag.is_empty());
    }
}
