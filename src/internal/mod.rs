//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod dispose_bag;

pub(crate) use circular::with_cycle_guard;
pub(crate) use dispose_bag::{AsyncHook, BoxFutureUnit, DisposeBag, SyncHook};
