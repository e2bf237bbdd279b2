mod common;

use arbor_core::{
    class, element, make_element, map, nodes, text, Component, ComponentClass, ComponentHandle,
    Context, Hooks, Map, NodeKind, RenderError, VNode, Value,
};
use arbor_testing::TestRoot;
use common::{handle, remember};

fn describe(value: &Map) -> String {
    let field = |key: &str| value.get(key).map(Value::to_string).unwrap_or_default();
    format!("[{}|{}]", field("color"), field("shade"))
}

fn nested(theme: &Context) -> VNode {
    theme.provider(
        map! { "color" => "red" },
        nodes![element(
            "div",
            map! {},
            nodes![
                theme.provider(
                    map! { "shade" => "dark" },
                    nodes![theme.consumer(|value| text(describe(value)))],
                ),
                theme.consumer(|value| text(describe(value))),
            ],
        )],
    )
}

#[test]
fn flat_context_merges_every_provider() {
    let theme = Context::flat(Map::new());
    let root = TestRoot::new();
    root.render(nested(&theme)).unwrap();

    assert_eq!(root.text_content(), "[red|dark][red|dark]");
    assert_eq!(theme.default_value(), map! { "color" => "red", "shade" => "dark" });
}

#[test]
fn scoped_context_resolves_the_nearest_provider() {
    let theme = Context::new(map! { "color" => "black" });
    let root = TestRoot::new();
    root.render(element(
        "main",
        map! {},
        nodes![nested(&theme), theme.consumer(|value| text(describe(value)))],
    ))
    .unwrap();

    assert_eq!(root.text_content(), "[|dark][red|][black|]");
    assert_eq!(theme.default_value(), map! { "color" => "black" });
}

#[test]
fn provider_updates_reach_consumers() {
    let theme = Context::new(Map::new());
    let view = |color: &str| {
        theme.provider(
            map! { "color" => color },
            nodes![element("p", map! {}, nodes![theme.consumer(|value| text(describe(value)))])],
        )
    };

    let root = TestRoot::new();
    root.render(view("red")).unwrap();
    let p = root.node("p");
    root.render(view("blue")).unwrap();

    assert_eq!(root.text_of(p), "[blue|]");
}

thread_local! {
    static THEME: Context = Context::new(map! { "color" => "black" });
}

fn theme() -> Context {
    THEME.with(Context::clone)
}

/// Reads the theme through `context_type` and through a nested consumer.
struct Themed;

impl Component for Themed {
    fn render(&self, this: &ComponentHandle) -> VNode {
        let own = describe(&this.context());
        let tick = this.state_value("tick");
        element(
            "span",
            map! {},
            nodes![
                own,
                theme().consumer(move |value| text(format!("{}{tick}", describe(value)))),
            ],
        )
    }

    fn did_mount(&self, this: &ComponentHandle) {
        remember("themed", this);
    }
}

impl ComponentClass for Themed {
    const HOOKS: Hooks = Hooks::DID_MOUNT;

    fn create(_props: &Map) -> Self {
        Themed
    }

    fn initial_state(_props: &Map) -> Map {
        map! { "tick" => 0 }
    }

    fn context_type() -> Option<Context> {
        Some(theme())
    }
}

#[test]
fn class_components_read_their_declared_context() {
    let view = |color: &str| {
        theme().provider(
            map! { "color" => color },
            nodes![class::<Themed>(map! {}, vec![])],
        )
    };
    let root = TestRoot::new();
    root.render(view("red")).unwrap();
    assert_eq!(root.text_content(), "[red|][red|]0");

    root.render(view("green")).unwrap();
    assert_eq!(root.text_content(), "[green|][green|]0");
}

#[test]
fn component_updates_see_the_providers_they_were_mounted_under() {
    let root = TestRoot::new();
    root.render(theme().provider(
        map! { "color" => "red" },
        nodes![class::<Themed>(map! {}, vec![])],
    ))
    .unwrap();

    handle("themed").set_state(map! { "tick" => 1 }).unwrap();
    assert_eq!(root.text_content(), "[red|][red|]1");
}

#[test]
fn providers_need_exactly_one_child() {
    let theme = Context::new(Map::new());
    let root = TestRoot::new();
    let result = root.render(theme.provider(map! {}, nodes![text("a"), text("b")]));
    assert_eq!(result, Err(RenderError::ProviderChildren { count: 2 }));
}

#[test]
fn consumers_need_a_render_function() {
    let theme = Context::new(Map::new());
    let root = TestRoot::new();
    let consumer = make_element(NodeKind::Consumer(theme), map! {}, nodes!["not a function"]);
    assert!(matches!(
        root.render(consumer),
        Err(RenderError::MissingRenderProp { .. })
    ));
}
