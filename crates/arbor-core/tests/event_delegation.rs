mod common;

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};

use arbor_core::{
    class, element, map, nodes, Component, ComponentClass, ComponentHandle, Hooks, Map,
    NativeEvent, RenderError, Runtime, VNode, Value,
};
use arbor_testing::TestRoot;
use common::{count, handle, int, record, remember, take_log};

fn logging_handler(name: &'static str) -> Value {
    Value::handler(move |event| {
        record(format!(
            "{name} current={:?} target={:?}",
            event.current_target(),
            event.target()
        ));
    })
}

#[test]
fn events_bubble_from_target_to_root() {
    let root = TestRoot::new();
    root.render(element(
        "div",
        map! { "onClick" => logging_handler("div") },
        nodes![element(
            "section",
            map! { "onClick" => logging_handler("section") },
            nodes![element("button", map! { "onClick" => logging_handler("button") }, vec![])],
        )],
    ))
    .unwrap();
    let (div, section, button) = (root.node("div"), root.node("section"), root.node("button"));

    root.click(button).unwrap();

    let target = Some(button);
    assert_eq!(
        take_log(),
        vec![
            format!("button current={:?} target={target:?}", Some(button)),
            format!("section current={:?} target={target:?}", Some(section)),
            format!("div current={:?} target={target:?}", Some(div)),
        ]
    );
}

#[test]
fn stop_propagation_ends_bubbling() {
    let root = TestRoot::new();
    let stopper = Value::handler(|event| {
        record("section");
        event.stop_propagation();
    });
    root.render(element(
        "div",
        map! { "onClick" => logging_handler("div") },
        nodes![element(
            "section",
            map! { "onClick" => stopper },
            nodes![element("button", map! {}, vec![])],
        )],
    ))
    .unwrap();

    root.click(root.node("button")).unwrap();
    assert_eq!(take_log(), vec!["section"]);
}

#[test]
fn handlers_only_see_their_event_type() {
    let root = TestRoot::new();
    let on_input = Value::handler(|event| {
        record(format!("input {}", event.field("value")));
    });
    root.render(element(
        "form",
        map! { "onClick" => logging_handler("form"), "onInput" => on_input },
        nodes![element("input", map! {}, vec![])],
    ))
    .unwrap();

    root.fire(NativeEvent::new("input", root.node("input")).with_field("value", "abc"))
        .unwrap();
    assert_eq!(take_log(), vec!["input abc"]);
    root.host(|host| assert_eq!(host.listener_count(), 2));
}

#[test]
fn one_listener_is_installed_per_event_type() {
    let root = TestRoot::new();
    root.render(element(
        "div",
        map! {},
        nodes![
            element("button", map! { "onClick" => logging_handler("a") }, vec![]),
            element("button", map! { "onClick" => logging_handler("b") }, vec![]),
        ],
    ))
    .unwrap();

    root.host(|host| {
        assert_eq!(host.listener_count(), 1);
        assert!(host.listener("click").is_some());
    });
    assert_eq!(root.runtime().handler_count(), 2);
}

#[test]
fn persisted_fields_outlive_the_dispatch() {
    thread_local! {
        static SEEN: RefCell<Option<Map>> = const { RefCell::new(None) };
    }
    let root = TestRoot::new();
    let keeper = Value::handler(|event| {
        SEEN.with(|seen| *seen.borrow_mut() = Some(event.persist()));
    });
    root.render(element("button", map! { "onClick" => keeper }, vec![]))
        .unwrap();
    let button = root.node("button");

    root.fire(NativeEvent::new("click", button).with_field("x", 7))
        .unwrap();

    let seen = SEEN.with(|seen| seen.borrow_mut().take()).expect("handler ran");
    assert_eq!(seen["x"], Value::Int(7));
    assert_eq!(seen["type"], Value::from("click"));
    assert_eq!(seen["target"], Value::from(button));
}

#[test]
fn removed_event_props_are_unregistered() {
    let root = TestRoot::new();
    root.render(element("button", map! { "onClick" => logging_handler("b") }, vec![]))
        .unwrap();
    assert_eq!(root.runtime().handler_count(), 1);

    root.render(element("button", map! {}, vec![])).unwrap();
    assert_eq!(root.runtime().handler_count(), 0);
    root.click(root.node("button")).unwrap();
    assert!(take_log().is_empty());
}

#[test]
fn unmounting_forgets_handlers_of_removed_nodes() {
    let root = TestRoot::new();
    root.render(element(
        "div",
        map! {},
        nodes![element("button", map! { "onClick" => logging_handler("b") }, vec![])],
    ))
    .unwrap();
    let button = root.node("button");

    root.render(element("p", map! {}, vec![])).unwrap();
    assert_eq!(root.runtime().handler_count(), 0);

    // The detached node no longer reaches any handler.
    root.click(button).unwrap();
    assert!(take_log().is_empty());
}

thread_local! {
    static NESTED: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

#[test]
fn reentrant_dispatch_is_rejected() {
    let root = TestRoot::new();
    NESTED.with(|nested| *nested.borrow_mut() = Some(root.runtime().clone()));
    let reenter = Value::handler(|event| {
        let target = event.target().unwrap_or_default();
        let result = NESTED.with(|nested| {
            nested
                .borrow()
                .as_ref()
                .map(|runtime| runtime.dispatch(&NativeEvent::new("click", target)))
        });
        match result {
            Some(Err(RenderError::ReentrantDispatch { event_type })) => {
                record(format!("rejected {event_type}"));
            }
            other => record(format!("unexpected {other:?}")),
        }
    });
    root.render(element("button", map! { "onClick" => reenter }, vec![]))
        .unwrap();

    root.click(root.node("button")).unwrap();
    NESTED.with(|nested| nested.borrow_mut().take());

    assert_eq!(take_log(), vec!["rejected click"]);
    assert!(!root.runtime().is_batching());
}

/// Both the panel and its button bump the same counter.
struct Panel;

impl Component for Panel {
    fn render(&self, this: &ComponentHandle) -> VNode {
        record("render");
        let bump = |this: &ComponentHandle| {
            let this = this.clone();
            Value::handler(move |_| {
                this.set_state_with(|state, _| {
                    map! { "clicks" => int(state.get("clicks").cloned().unwrap_or_default()) + 1 }
                })
                .unwrap();
            })
        };
        element(
            "div",
            map! { "onClick" => bump(this) },
            nodes![
                element("span", map! {}, nodes![this.state_value("clicks")]),
                element("button", map! { "onClick" => bump(this) }, nodes!["bump"]),
            ],
        )
    }

    fn did_mount(&self, this: &ComponentHandle) {
        remember("panel", this);
    }
}

impl ComponentClass for Panel {
    const HOOKS: Hooks = Hooks::DID_MOUNT;

    fn create(_props: &Map) -> Self {
        Panel
    }

    fn initial_state(_props: &Map) -> Map {
        map! { "clicks" => 0 }
    }
}

#[test]
fn updates_from_the_whole_bubble_path_flush_once() {
    let root = TestRoot::new();
    root.render(class::<Panel>(map! {}, vec![])).unwrap();
    take_log();

    root.click(root.node("button")).unwrap();

    assert_eq!(count("render"), 1);
    assert_eq!(handle("panel").state_value("clicks"), Value::Int(2));
    assert_eq!(root.text_of(root.node("span")), "2");
}

#[test]
fn lowercase_event_props_register_handlers() {
    take_log();
    let root = TestRoot::new();
    root.render(element(
        "button",
        map! { "onclick" => logging_handler("button"), "online" => "yes" },
        vec![],
    ))
    .unwrap();
    let button = root.node("button");
    assert_eq!(root.runtime().handler_count(), 1);
    root.host(|host| {
        assert_eq!(host.property(button, "online"), Some(&Value::from("yes")));
        assert_eq!(host.property(button, "onclick"), None);
    });

    root.click(button).unwrap();
    assert_eq!(
        take_log(),
        vec![format!(
            "button current={:?} target={:?}",
            Some(button),
            Some(button)
        )]
    );
}

thread_local! {
    static FUSE_LIT: std::cell::Cell<bool> = const { std::cell::Cell::new(true) };
}

#[test]
fn a_panicking_handler_leaves_dispatch_usable() {
    take_log();
    let fuse = Value::handler(|_| {
        if FUSE_LIT.with(|lit| lit.replace(false)) {
            panic!("handler blew its fuse");
        }
        record("fuse");
    });
    let root = TestRoot::new();
    root.render(element(
        "div",
        map! { "onClick" => logging_handler("div") },
        nodes![element("button", map! { "onClick" => fuse }, vec![])],
    ))
    .unwrap();
    let button = root.node("button");

    let outcome = catch_unwind(AssertUnwindSafe(|| root.click(button)));
    assert!(outcome.is_err());
    assert!(!root.runtime().is_batching());
    assert!(take_log().is_empty());

    root.click(button).unwrap();
    let log = take_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], "fuse");
}
