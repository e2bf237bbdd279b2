use arbor_core::{
    class, element, map, nodes, text, Component, ComponentClass, ComponentHandle, Context, Hooks,
    Map, VNode, Value,
};

thread_local! {
    static THEME: Context = Context::new(map! { "accent" => "gray" });
}

pub fn theme() -> Context {
    THEME.with(Context::clone)
}

fn count_of(this: &ComponentHandle) -> i64 {
    this.state_value("count").as_int().unwrap_or_default()
}

/// The classic counter: one click queues four updates that land in a single patch.
pub struct Counter;

impl Component for Counter {
    fn render(&self, this: &ComponentHandle) -> VNode {
        let handle = this.clone();
        let increment = Value::handler(move |_| {
            let count = count_of(&handle);
            if let Err(err) = handle.set_state(map! { "count" => count + 1 }) {
                log::warn!("increment failed: {err}");
            }
            for _ in 0..3 {
                let result = handle.set_state_with(|state, _| {
                    let count = state.get("count").and_then(Value::as_int).unwrap_or_default();
                    map! { "count" => count + 1 }
                });
                if let Err(err) = result {
                    log::warn!("increment failed: {err}");
                }
            }
        });
        let accent = theme().consumer(|value| {
            text(format!(
                "accent: {}",
                value.get("accent").cloned().unwrap_or_default()
            ))
        });
        element(
            "div",
            map! { "class" => "counter" },
            nodes![
                element("p", map! {}, nodes!["number: ", count_of(this)]),
                element("button", map! { "onClick" => increment }, nodes!["+"]),
                element("small", map! {}, nodes![accent]),
            ],
        )
    }

    fn did_mount(&self, this: &ComponentHandle) {
        log::info!("counter mounted with count {}", count_of(this));
    }

    fn did_update(&self, this: &ComponentHandle, _prev_props: &Map, prev_state: &Map, _snapshot: &Value) {
        let before = prev_state.get("count").and_then(Value::as_int).unwrap_or_default();
        log::info!("counter {before} -> {}", count_of(this));
    }
}

impl ComponentClass for Counter {
    const HOOKS: Hooks = Hooks::DID_MOUNT.union(Hooks::DID_UPDATE);

    fn create(_props: &Map) -> Self {
        Counter
    }

    fn initial_state(_props: &Map) -> Map {
        map! { "count" => 0 }
    }
}

pub fn counter_app(accent: &str) -> VNode {
    theme().provider(
        map! { "accent" => accent },
        nodes![class::<Counter>(map! {}, vec![])],
    )
}
