use arbor_core::{
    HostNodeId, HostOp, HostTree, MemoryHost, NativeEvent, RenderError, Runtime, VNode,
};

/// Headless harness for exercising component trees in tests.
///
/// `TestRoot` owns a [`Runtime`] over a [`MemoryHost`] with a single
/// `#root` container. Events are fired through the delegated listener the
/// runtime installed on the host, the same path a real host would take.
pub struct TestRoot {
    runtime: Runtime,
    container: HostNodeId,
}

impl TestRoot {
    pub fn new() -> Self {
        let mut host = MemoryHost::new();
        let container = host.create_element("#root");
        host.clear_ops();
        Self {
            runtime: Runtime::new(host),
            container,
        }
    }

    /// Renders `vnode` into the container, reconciling against the
    /// previous render if there was one.
    pub fn render(&self, vnode: VNode) -> Result<(), RenderError> {
        self.runtime.render(vnode, self.container)
    }

    pub fn unmount(&self) -> Result<bool, RenderError> {
        self.runtime.unmount(self.container)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn container(&self) -> HostNodeId {
        self.container
    }

    /// Gain mutable access to the in-memory host for assertions.
    pub fn host<R>(&self, f: impl FnOnce(&mut MemoryHost) -> R) -> R {
        self.runtime
            .with_host(f)
            .expect("TestRoot always runs on a MemoryHost")
    }

    /// Fires `native` through the delegated listener for its type. Events
    /// nobody listens to are dropped, as a real host would.
    pub fn fire(&self, native: NativeEvent) -> Result<(), RenderError> {
        // The listener borrows the host again, so clone it out first.
        let listener = self.host(|host| host.listener(&native.event_type));
        match listener {
            Some(listener) => listener(&native),
            None => Ok(()),
        }
    }

    pub fn click(&self, target: HostNodeId) -> Result<(), RenderError> {
        self.fire(NativeEvent::new("click", target))
    }

    /// Concatenated text of everything rendered into the container.
    pub fn text_content(&self) -> String {
        self.text_of(self.container)
    }

    pub fn text_of(&self, node: HostNodeId) -> String {
        self.host(|host| host.text_content(node))
    }

    /// Host nodes with `tag` under the container, in document order.
    pub fn find_by_tag(&self, tag: &str) -> Vec<HostNodeId> {
        self.host(|host| host.find_by_tag(self.container, tag))
    }

    /// First host node with `tag`; panics when there is none.
    pub fn node(&self, tag: &str) -> HostNodeId {
        self.find_by_tag(tag)
            .first()
            .copied()
            .unwrap_or_else(|| panic!("no <{tag}> rendered:\n{}", self.dump_tree()))
    }

    pub fn children(&self, node: HostNodeId) -> Vec<HostNodeId> {
        self.host(|host| host.children(node))
    }

    /// Host mutations recorded since the last [`TestRoot::take_ops`].
    pub fn ops(&self) -> Vec<HostOp> {
        self.host(|host| host.ops().to_vec())
    }

    pub fn take_ops(&self) -> Vec<HostOp> {
        self.host(|host| host.take_ops())
    }

    pub fn dump_tree(&self) -> String {
        self.host(|host| host.dump_tree(self.container))
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `TestRoot`.
pub fn run_test_root<R>(f: impl FnOnce(&TestRoot) -> R) -> R {
    let root = TestRoot::new();
    f(&root)
}
