mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};

use arbor_core::{
    class, element, map, nodes, Component, ComponentClass, ComponentHandle, HostOp, Hooks, Map,
    Value, VNode,
};
use arbor_testing::TestRoot;
use common::{count, handle, int, record, remember, take_log};

struct Counter;

impl Component for Counter {
    fn render(&self, this: &ComponentHandle) -> VNode {
        record("render");
        let count = int(this.state_value("count"));
        let handle = this.clone();
        let on_click = Value::handler(move |_| {
            let count = int(handle.state_value("count"));
            handle.set_state(map! { "count" => count + 1 }).unwrap();
            for _ in 0..3 {
                handle
                    .set_state_with(|state, _| map! { "count" => int(state["count"].clone()) + 1 })
                    .unwrap();
            }
        });
        element(
            "div",
            map! {},
            nodes![
                element("p", map! {}, nodes!["number: ", count]),
                element("button", map! { "onClick" => on_click }, nodes!["+"]),
            ],
        )
    }
}

impl ComponentClass for Counter {
    fn create(_props: &Map) -> Self {
        Counter
    }

    fn initial_state(_props: &Map) -> Map {
        map! { "count" => 0 }
    }
}

/// Renders its `n` state and remembers its handle as "probe".
struct Probe;

impl Component for Probe {
    fn render(&self, this: &ComponentHandle) -> VNode {
        record("render");
        element("span", map! {}, nodes![this.state_value("n")])
    }

    fn did_mount(&self, this: &ComponentHandle) {
        remember("probe", this);
    }
}

impl ComponentClass for Probe {
    const HOOKS: Hooks = Hooks::DID_MOUNT;

    fn create(_props: &Map) -> Self {
        Probe
    }

    fn initial_state(_props: &Map) -> Map {
        map! { "n" => 0 }
    }
}

/// Renders only for even `n`.
struct Gate;

impl Component for Gate {
    fn render(&self, this: &ComponentHandle) -> VNode {
        record("render");
        element("span", map! {}, nodes![this.state_value("n")])
    }

    fn did_mount(&self, this: &ComponentHandle) {
        remember("gate", this);
    }

    fn should_update(&self, _this: &ComponentHandle, _next_props: &Map, next_state: &Map) -> bool {
        int(next_state["n"].clone()) % 2 == 0
    }

    fn will_update(&self, _this: &ComponentHandle) {
        record("will_update");
    }
}

impl ComponentClass for Gate {
    const HOOKS: Hooks = Hooks::DID_MOUNT
        .union(Hooks::SHOULD_UPDATE)
        .union(Hooks::WILL_UPDATE);

    fn create(_props: &Map) -> Self {
        Gate
    }

    fn initial_state(_props: &Map) -> Map {
        map! { "n" => 0 }
    }
}

/// Keeps `double` equal to twice the `value` prop.
struct Doubler;

impl Component for Doubler {
    fn render(&self, this: &ComponentHandle) -> VNode {
        element("span", map! {}, nodes![this.state_value("double")])
    }

    fn did_mount(&self, this: &ComponentHandle) {
        remember("doubler", this);
    }
}

impl ComponentClass for Doubler {
    const HOOKS: Hooks = Hooks::DID_MOUNT.union(Hooks::DERIVE_STATE);

    fn create(_props: &Map) -> Self {
        Doubler
    }

    fn derive_state_from_props(props: &Map, _state: &Map) -> Option<Map> {
        let value = props.get("value").and_then(Value::as_int)?;
        Some(map! { "double" => value * 2 })
    }
}

/// Requests one more update from `did_update` until it has settled.
struct Settler;

impl Component for Settler {
    fn render(&self, this: &ComponentHandle) -> VNode {
        record("render");
        element("span", map! {}, nodes![this.state_value("n")])
    }

    fn did_mount(&self, this: &ComponentHandle) {
        remember("settler", this);
    }

    fn did_update(&self, this: &ComponentHandle, _prev_props: &Map, _prev_state: &Map, _snapshot: &Value) {
        if this.state_value("settled").as_bool() != Some(true) {
            this.set_state(map! { "settled" => true }).unwrap();
        }
    }
}

impl ComponentClass for Settler {
    const HOOKS: Hooks = Hooks::DID_MOUNT.union(Hooks::DID_UPDATE);

    fn create(_props: &Map) -> Self {
        Settler
    }
}

struct PureProbe;

impl Component for PureProbe {
    fn render(&self, this: &ComponentHandle) -> VNode {
        record("render");
        element("span", map! {}, nodes![this.state_value("n")])
    }

    fn did_mount(&self, this: &ComponentHandle) {
        remember("pure", this);
    }
}

impl ComponentClass for PureProbe {
    const HOOKS: Hooks = Hooks::DID_MOUNT;
    const PURE: bool = true;

    fn create(_props: &Map) -> Self {
        PureProbe
    }

    fn initial_state(_props: &Map) -> Map {
        map! { "n" => 0 }
    }
}

struct EagerStart;

impl Component for EagerStart {
    fn render(&self, this: &ComponentHandle) -> VNode {
        record(format!("render ready={}", this.state_value("ready")));
        element("span", map! {}, vec![])
    }

    fn will_mount(&self, this: &ComponentHandle) {
        this.set_state_then(map! { "ready" => true }, || record("will_mount callback"))
            .unwrap();
    }
}

impl ComponentClass for EagerStart {
    const HOOKS: Hooks = Hooks::WILL_MOUNT;

    fn create(_props: &Map) -> Self {
        EagerStart
    }
}

fn mounted<C: ComponentClass>(props: Map) -> TestRoot {
    let root = TestRoot::new();
    root.render(class::<C>(props, vec![])).expect("mount");
    take_log();
    root.take_ops();
    root
}

#[test]
fn counter_click_applies_four_updates_in_one_patch() {
    let root = mounted::<Counter>(map! {});
    let p = root.node("p");
    assert_eq!(root.text_of(p), "number: 0");

    root.click(root.node("button")).expect("click");

    assert_eq!(root.text_of(p), "number: 4");
    assert_eq!(count("render"), 1);
    let ops = root.take_ops();
    assert_eq!(ops.len(), 1, "{ops:?}");
    assert!(matches!(&ops[0], HostOp::SetText { content, .. } if content == "4"));
    assert!(!root.runtime().is_batching());
}

#[test]
fn updates_outside_a_batch_fold_in_call_order() {
    let root = mounted::<Probe>(map! {});
    let probe = handle("probe");

    probe.set_state(map! { "n" => 1 }).unwrap();
    probe
        .set_state_with(|state, _| map! { "n" => int(state["n"].clone()) * 10 })
        .unwrap();
    probe.set_state(map! { "label" => "x" }).unwrap();

    assert_eq!(probe.state_value("n"), Value::Int(10));
    assert_eq!(probe.state_value("label"), Value::from("x"));
    assert_eq!(count("render"), 3);
    assert_eq!(root.text_content(), "10");
}

#[test]
fn batched_value_deltas_render_once_with_the_last_value() {
    let root = mounted::<Probe>(map! {});
    let probe = handle("probe");

    let seen_batching = root
        .runtime()
        .batched_updates(|| {
            for a in 1..=3 {
                probe.set_state(map! { "a" => a, "n" => a }).unwrap();
            }
            root.runtime().is_batching()
        })
        .unwrap();

    assert!(seen_batching);
    assert_eq!(count("render"), 1);
    assert_eq!(probe.state_value("a"), Value::Int(3));
    assert_eq!(root.text_content(), "3");
}

#[test]
fn should_update_false_commits_without_rendering() {
    let root = mounted::<Gate>(map! {});
    let gate = handle("gate");

    gate.set_state(map! { "n" => 1 }).unwrap();
    assert_eq!(gate.state_value("n"), Value::Int(1));
    assert_eq!(root.text_content(), "0");
    assert!(take_log().is_empty());

    gate.set_state(map! { "n" => 2 }).unwrap();
    assert_eq!(root.text_content(), "2");
    assert_eq!(take_log(), vec!["will_update", "render"]);
}

#[test]
fn force_update_bypasses_should_update() {
    let root = mounted::<Gate>(map! {});
    let gate = handle("gate");

    gate.set_state(map! { "n" => 3 }).unwrap();
    assert_eq!(root.text_content(), "0");

    gate.force_update().unwrap();
    assert_eq!(root.text_content(), "3");
    assert_eq!(count("render"), 1);
}

#[test]
fn derived_state_follows_props_on_mount_and_update() {
    let root = mounted::<Doubler>(map! { "value" => 2 });
    let doubler = handle("doubler");
    assert_eq!(root.text_content(), "4");
    assert_eq!(doubler.state_value("double"), Value::Int(4));

    root.render(class::<Doubler>(map! { "value" => 5 }, vec![]))
        .unwrap();
    assert_eq!(root.text_content(), "10");

    // Derivation runs after the fold, so it wins over a conflicting delta.
    doubler.set_state(map! { "double" => 0 }).unwrap();
    assert_eq!(doubler.state_value("double"), Value::Int(10));
    assert_eq!(doubler.props()["value"], Value::Int(5));
}

#[test]
fn state_callbacks_run_after_the_commit() {
    let root = mounted::<Probe>(map! {});
    let probe = handle("probe");

    let reader = probe.clone();
    probe
        .set_state_then(map! { "n" => 5 }, move || {
            record(format!("callback n={}", reader.state_value("n")));
        })
        .unwrap();
    assert_eq!(take_log(), vec!["render", "callback n=5"]);

    let reader = probe.clone();
    root.runtime()
        .batched_updates(|| {
            probe
                .set_state_then(map! { "n" => 6 }, move || {
                    record(format!("callback n={}", reader.state_value("n")));
                })
                .unwrap();
            record("queued");
        })
        .unwrap();
    assert_eq!(take_log(), vec!["queued", "render", "callback n=6"]);
}

#[test]
fn updates_requested_while_updating_join_the_running_flush() {
    let root = mounted::<Settler>(map! {});
    let settler = handle("settler");

    settler.set_state(map! { "n" => 1 }).unwrap();
    assert_eq!(count("render"), 2);
    assert_eq!(settler.state_value("settled"), Value::Bool(true));
    assert_eq!(root.text_content(), "1");

    take_log();
    root.runtime()
        .batched_updates(|| settler.set_state(map! { "n" => 2 }).unwrap())
        .unwrap();
    assert_eq!(count("render"), 1);
}

#[test]
fn pure_components_skip_shallow_equal_updates() {
    let root = mounted::<PureProbe>(map! {});
    let pure = handle("pure");

    pure.set_state(map! { "n" => 0 }).unwrap();
    assert_eq!(count("render"), 0);

    pure.set_state(map! { "n" => 1 }).unwrap();
    assert_eq!(count("render"), 1);

    root.render(class::<PureProbe>(map! {}, vec![])).unwrap();
    assert_eq!(count("render"), 1);
    assert_eq!(root.text_content(), "1");
}

#[test]
fn state_set_before_mount_is_folded_into_the_first_render() {
    take_log();
    let root = TestRoot::new();
    root.render(class::<EagerStart>(map! {}, vec![])).unwrap();
    assert_eq!(take_log(), vec!["will_mount callback", "render ready=true"]);
}

#[test]
fn unmounted_components_ignore_updates() {
    let root = mounted::<Probe>(map! {});
    let probe = handle("probe");
    assert!(probe.is_mounted());

    assert!(root.unmount().unwrap());
    assert!(!probe.is_mounted());
    assert!(probe.set_state(map! { "n" => 9 }).is_ok());
    assert!(probe.force_update().is_ok());
    assert_eq!(count("render"), 0);
    assert_ne!(probe.state_value("n"), Value::Int(9));
}

#[test]
fn updates_queued_for_an_unmounted_component_are_skipped() {
    let root = mounted::<Probe>(map! {});
    let probe = handle("probe");

    root.runtime()
        .batched_updates(|| {
            probe.set_state(map! { "n" => 1 }).unwrap();
            root.unmount().unwrap();
        })
        .unwrap();

    assert_eq!(count("render"), 0);
    assert!(root.children(root.container()).is_empty());
}

/// Panics while rendering with `explode` set.
struct Volatile;

impl Component for Volatile {
    fn render(&self, this: &ComponentHandle) -> VNode {
        record("render");
        if this.state_value("explode") == Value::Bool(true) {
            panic!("render exploded");
        }
        element("span", map! {}, nodes![this.state_value("n")])
    }

    fn did_mount(&self, this: &ComponentHandle) {
        remember("volatile", this);
    }
}

impl ComponentClass for Volatile {
    const HOOKS: Hooks = Hooks::DID_MOUNT;

    fn create(_props: &Map) -> Self {
        Volatile
    }

    fn initial_state(_props: &Map) -> Map {
        map! { "n" => 0 }
    }
}

#[test]
fn a_panicking_render_leaves_nothing_pending() {
    let root = mounted::<Volatile>(map! {});
    let volatile = handle("volatile");

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        volatile.set_state(map! { "explode" => true, "n" => 1 })
    }));
    assert!(outcome.is_err());
    assert_eq!(volatile.state_value("explode"), Value::Bool(true));
    assert_eq!(volatile.state_value("n"), Value::from(1));
    assert_eq!(root.text_content(), "0");
    assert!(!root.runtime().is_batching());

    take_log();
    volatile.set_state(map! { "explode" => false }).unwrap();
    assert_eq!(count("render"), 1);
    assert_eq!(root.text_content(), "1");

    volatile.set_state(map! { "n" => 2 }).unwrap();
    assert_eq!(root.text_content(), "2");
}
