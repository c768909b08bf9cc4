//! Circular dependency detection infrastructure.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};

const MAX_DEPTH: usize = 256;

// Per-thread stack of services currently under construction
thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

/// Guard for one frame of the thread-local resolution stack.
///
/// Entering fails instead of pushing when the name is already on the
/// stack (a cycle) or the stack is too deep. The frame is popped on drop,
/// including when a factory returns early with an error.
pub(crate) struct StackGuard {
    name: &'static str,
}

impl StackGuard {
    pub(crate) fn enter(name: &'static str) -> DiResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            if stack.iter().any(|&n| n == name) {
                let mut path = stack.clone();
                path.push(name);
                return Err(DiError::Circular(path));
            }

            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }

            stack.push(name);
            Ok(Self { name })
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(last) = stack.pop() {
                debug_assert_eq!(last, self.name);
            }
        });
    }
}

/// Run `f` with `name` pushed on the resolution stack.
pub(crate) fn with_cycle_guard<T, F>(name: &'static str, f: F) -> DiResult<T>
where
    F: FnOnce() -> DiResult<T>,
{
    let _guard = StackGuard::enter(name)?;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_names_are_allowed() {
        let result = with_cycle_guard("A", || with_cycle_guard("B", || Ok(1)));
        assert_eq!(result.unwrap(), 1);
    }

    #[test]
    fn repeated_name_reports_full_path() {
        let result: DiResult<()> =
            with_cycle_guard("A", || with_cycle_guard("B", || with_cycle_guard("A", || Ok(()))));
        match result {
            Err(DiError::Circular(path)) => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("expected circular error, got {:?}", other),
        }
    }

    #[test]
    fn stack_is_clean_after_failure() {
        let _ = with_cycle_guard("A", || -> DiResult<()> { Err(DiError::NotFound("x")) });
        // A second entry for the same name must succeed
        assert!(with_cycle_guard("A", || Ok(())).is_ok());
    }
}
