//! Ambient "current process" / "current store" context stacks.
//!
//! Both stacks are thread-local LIFO stacks entered through RAII scope
//! guards; each thread sees only its own scopes. `current()` on an empty
//! stack resolves to a process-wide default instance rather than erroring:
//! asking "what is current" with nothing entered is a legitimate query,
//! while an unmatched `pop()` is a programming bug and fails loudly.

use std::cell::RefCell;
use std::sync::{Arc, LazyLock};

use tidemark_types::process::Process;

use crate::backend::HwmStore;
use crate::error::{self, StoreError};
use crate::memory::MemoryHwmStore;

thread_local! {
    static PROCESS_STACK: RefCell<Vec<Process>> = const { RefCell::new(Vec::new()) };
    static STORE_STACK: RefCell<Vec<Arc<dyn HwmStore>>> = const { RefCell::new(Vec::new()) };
}

static DEFAULT_PROCESS: LazyLock<Process> = LazyLock::new(Process::default);
static DEFAULT_STORE: LazyLock<Arc<MemoryHwmStore>> =
    LazyLock::new(|| Arc::new(MemoryHwmStore::new()));

/// Thread-local stack of "current" process identities.
pub struct ProcessStack;

impl ProcessStack {
    /// Push a process onto this thread's stack.
    pub fn push(process: Process) {
        PROCESS_STACK.with(|stack| stack.borrow_mut().push(process));
    }

    /// Pop the most recently pushed process.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyStack`] when nothing was pushed.
    pub fn pop() -> error::Result<Process> {
        PROCESS_STACK
            .with(|stack| stack.borrow_mut().pop())
            .ok_or(StoreError::EmptyStack { stack: "process" })
    }

    /// Number of processes currently entered on this thread.
    #[must_use]
    pub fn depth() -> usize {
        PROCESS_STACK.with(|stack| stack.borrow().len())
    }

    /// The innermost entered process, or the process-wide default.
    #[must_use]
    pub fn current() -> Process {
        PROCESS_STACK
            .with(|stack| stack.borrow().last().cloned())
            .unwrap_or_else(|| DEFAULT_PROCESS.clone())
    }

    /// Enter `process` as current until the returned guard drops.
    #[must_use]
    pub fn scoped(process: Process) -> ProcessScope {
        tracing::debug!(
            process = %process.qualified_name(),
            level = Self::depth(),
            "entered process scope"
        );
        Self::push(process);
        ProcessScope { _private: () }
    }
}

/// Guard returned by [`ProcessStack::scoped`]; pops on drop.
pub struct ProcessScope {
    _private: (),
}

impl Drop for ProcessScope {
    fn drop(&mut self) {
        if let Err(err) = ProcessStack::pop() {
            tracing::debug!(error = %err, "process scope already unwound");
        }
    }
}

/// Thread-local stack of "current" HWM stores.
pub struct StoreStack;

impl StoreStack {
    /// Push a store onto this thread's stack.
    pub fn push(store: Arc<dyn HwmStore>) {
        STORE_STACK.with(|stack| stack.borrow_mut().push(store));
    }

    /// Pop the most recently pushed store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyStack`] when nothing was pushed.
    pub fn pop() -> error::Result<Arc<dyn HwmStore>> {
        STORE_STACK
            .with(|stack| stack.borrow_mut().pop())
            .ok_or(StoreError::EmptyStack { stack: "store" })
    }

    /// Number of stores currently entered on this thread.
    #[must_use]
    pub fn depth() -> usize {
        STORE_STACK.with(|stack| stack.borrow().len())
    }

    /// The innermost entered store, or the process-wide default in-memory
    /// store.
    #[must_use]
    pub fn current() -> Arc<dyn HwmStore> {
        if let Some(store) = STORE_STACK.with(|stack| stack.borrow().last().cloned()) {
            return store;
        }
        let default: Arc<dyn HwmStore> = DEFAULT_STORE.clone();
        default
    }

    /// Enter `store` as current until the returned guard drops.
    #[must_use]
    pub fn scoped(store: Arc<dyn HwmStore>) -> StoreScope {
        tracing::info!(store = ?store, level = Self::depth(), "using HWM store");
        Self::push(store);
        StoreScope { _private: () }
    }
}

/// Guard returned by [`StoreStack::scoped`]; pops on drop.
pub struct StoreScope {
    _private: (),
}

impl Drop for StoreScope {
    fn drop(&mut self) {
        if let Err(err) = StoreStack::pop() {
            tracing::debug!(error = %err, "store scope already unwound");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_types::hwm::column::ColumnIntHwm;
    use tidemark_types::hwm::Hwm;

    #[test]
    fn current_process_defaults_when_stack_is_empty() {
        assert_eq!(ProcessStack::depth(), 0);
        let current = ProcessStack::current();
        assert!(!current.name().is_empty());
    }

    #[test]
    fn process_scopes_nest_lifo() {
        let outer = Process::new("outer").with_host("h");
        let inner = Process::new("inner").with_host("h");
        {
            let _outer = ProcessStack::scoped(outer.clone());
            assert_eq!(ProcessStack::current(), outer);
            {
                let _inner = ProcessStack::scoped(inner.clone());
                assert_eq!(ProcessStack::depth(), 2);
                assert_eq!(ProcessStack::current(), inner);
            }
            assert_eq!(ProcessStack::current(), outer);
        }
        assert_eq!(ProcessStack::depth(), 0);
    }

    #[test]
    fn pop_on_empty_process_stack_is_an_error() {
        assert!(matches!(
            ProcessStack::pop(),
            Err(StoreError::EmptyStack { stack: "process" })
        ));
    }

    #[test]
    fn pop_on_empty_store_stack_is_an_error() {
        assert!(matches!(
            StoreStack::pop(),
            Err(StoreError::EmptyStack { stack: "store" })
        ));
    }

    #[test]
    fn store_scopes_nest_lifo() {
        let outer: Arc<dyn HwmStore> = Arc::new(MemoryHwmStore::new());
        let inner: Arc<dyn HwmStore> = Arc::new(MemoryHwmStore::new());
        let hwm = Hwm::from(ColumnIntHwm::new("t").unwrap().with_value(1));
        {
            let _outer = StoreStack::scoped(outer.clone());
            StoreStack::current().set(&hwm).unwrap();
            {
                let _inner = StoreStack::scoped(inner.clone());
                assert_eq!(StoreStack::depth(), 2);
                // inner store is empty; the outer checkpoint is shadowed
                assert!(StoreStack::current().get("t").unwrap().is_none());
            }
            assert_eq!(StoreStack::current().get("t").unwrap(), Some(hwm));
        }
        assert_eq!(StoreStack::depth(), 0);
    }

    #[test]
    fn current_store_defaults_to_shared_memory_store() {
        assert_eq!(StoreStack::depth(), 0);
        let store = StoreStack::current();
        let hwm = Hwm::from(
            ColumnIntHwm::new("context_default_probe")
                .unwrap()
                .with_value(7),
        );
        store.set(&hwm).unwrap();
        // the default is a singleton: a second resolution sees the write
        assert_eq!(
            StoreStack::current().get("context_default_probe").unwrap(),
            Some(hwm)
        );
    }
}
