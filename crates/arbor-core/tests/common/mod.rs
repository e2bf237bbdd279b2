#![allow(dead_code)]

use std::cell::RefCell;

use arbor_core::ComponentHandle;

thread_local! {
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static HANDLES: RefCell<Vec<(String, ComponentHandle)>> = const { RefCell::new(Vec::new()) };
}

/// Appends an entry to this thread's lifecycle log.
pub fn record(entry: impl Into<String>) {
    LOG.with(|log| log.borrow_mut().push(entry.into()));
}

/// Drains this thread's lifecycle log.
pub fn take_log() -> Vec<String> {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

pub fn count(entry: &str) -> usize {
    LOG.with(|log| log.borrow().iter().filter(|e| e.as_str() == entry).count())
}

/// Keeps a handle so the test can drive the component from outside.
pub fn remember(name: &str, handle: &ComponentHandle) {
    HANDLES.with(|handles| {
        handles.borrow_mut().push((name.to_owned(), handle.clone()));
    });
}

pub fn handle(name: &str) -> ComponentHandle {
    HANDLES.with(|handles| {
        handles
            .borrow()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, handle)| handle.clone())
            .unwrap_or_else(|| panic!("no handle remembered as {name}"))
    })
}

pub fn int(value: arbor_core::Value) -> i64 {
    value.as_int().unwrap_or_default()
}
