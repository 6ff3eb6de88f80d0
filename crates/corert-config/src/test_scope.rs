use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Opaque handle for a running test (spec.md §4.11 item 4). Process-wide
/// and monotonic, mirroring [`crate::ValueId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestHandle(u64);

static NEXT_TEST_HANDLE: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // The std test harness runs each `#[test]` on its own OS thread, so a
    // thread-local "current test" pointer is sufficient — no task-local
    // propagation is needed the way request tracking needs one.
    static CURRENT_TEST: RefCell<Option<TestHandle>> = const { RefCell::new(None) };
}

/// Parent pointers for every test handle ever begun, so overrides can walk
/// from a child test up to the root looking for the nearest one set.
#[derive(Default)]
pub struct TestTree {
    parents: Mutex<HashMap<TestHandle, Option<TestHandle>>>,
}

impl TestTree {
    pub fn new() -> Self {
        TestTree::default()
    }

    /// Enters a new test scope nested under whatever test (if any) is
    /// currently active on this thread. Dropping the returned guard
    /// restores the previous current test.
    pub fn begin_test(&self) -> TestScopeGuard {
        let parent = CURRENT_TEST.with(|c| *c.borrow());
        let handle = TestHandle(NEXT_TEST_HANDLE.fetch_add(1, Ordering::SeqCst));
        self.parents.lock().unwrap().insert(handle, parent);
        CURRENT_TEST.with(|c| *c.borrow_mut() = Some(handle));
        TestScopeGuard { previous: parent }
    }

    pub fn current(&self) -> Option<TestHandle> {
        CURRENT_TEST.with(|c| *c.borrow())
    }

    /// The chain from `handle` up to (and including) the root test,
    /// nearest first — the order overrides are looked up in.
    pub fn lineage(&self, handle: TestHandle) -> Vec<TestHandle> {
        let parents = self.parents.lock().unwrap();
        let mut chain = vec![handle];
        let mut cur = handle;
        while let Some(Some(parent)) = parents.get(&cur) {
            chain.push(*parent);
            cur = *parent;
        }
        chain
    }
}

/// RAII guard restoring the previous "current test" on drop (spec.md
/// §4.11's test-scoped override inheritance ends when the test ends).
pub struct TestScopeGuard {
    previous: Option<TestHandle>,
}

impl Drop for TestScopeGuard {
    fn drop(&mut self) {
        CURRENT_TEST.with(|c| *c.borrow_mut() = self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_test_scopes_chain_to_root() {
        let tree = TestTree::new();
        let root = tree.begin_test();
        let root_handle = tree.current().unwrap();
        let child = tree.begin_test();
        let child_handle = tree.current().unwrap();
        assert_eq!(tree.lineage(child_handle), vec![child_handle, root_handle]);
        drop(child);
        assert_eq!(tree.current(), Some(root_handle));
        drop(root);
        assert_eq!(tree.current(), None);
    }

    #[test]
    fn top_level_test_has_single_element_lineage() {
        let tree = TestTree::new();
        let _guard = tree.begin_test();
        let handle = tree.current().unwrap();
        assert_eq!(tree.lineage(handle), vec![handle]);
    }
}
