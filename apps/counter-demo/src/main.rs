mod app;

use anyhow::{anyhow, Context as _};
use arbor_core::{HostNodeId, HostTree, MemoryHost, NativeEvent, Runtime};

fn click(runtime: &Runtime, target: HostNodeId) -> anyhow::Result<()> {
    let listener = runtime
        .with_host(|host: &mut MemoryHost| host.listener("click"))
        .flatten()
        .ok_or_else(|| anyhow!("no click listener installed"))?;
    listener(&NativeEvent::new("click", target)).context("dispatching click")
}

fn dump(runtime: &Runtime, container: HostNodeId) -> String {
    runtime
        .with_host(|host: &mut MemoryHost| host.dump_tree(container))
        .unwrap_or_default()
}

fn main() -> anyhow::Result<()> {
    #[cfg(feature = "logging")]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    println!("=== Arbor Counter Example ===");
    println!("One click queues four updates; they flush as a single patch.");
    println!();

    let mut host = MemoryHost::new();
    let container = host.create_element("#root");
    let runtime = Runtime::new(host);

    runtime
        .render(app::counter_app("teal"), container)
        .context("initial render")?;
    println!("{}", dump(&runtime, container));

    let button = runtime
        .with_host(|host: &mut MemoryHost| host.find_by_tag(container, "button"))
        .and_then(|buttons| buttons.first().copied())
        .ok_or_else(|| anyhow!("counter rendered no button"))?;
    runtime.with_host(|host: &mut MemoryHost| host.clear_ops());

    click(&runtime, button)?;
    let ops = runtime
        .with_host(|host: &mut MemoryHost| host.take_ops())
        .unwrap_or_default();
    println!("after click ({} host ops):", ops.len());
    for op in &ops {
        println!("  {op:?}");
    }
    println!("{}", dump(&runtime, container));

    runtime
        .render(app::counter_app("orange"), container)
        .context("re-render with new accent")?;
    println!("after provider update:");
    println!("{}", dump(&runtime, container));

    runtime.unmount(container).context("unmount")?;
    log::info!("unmounted; {} handlers left", runtime.handler_count());
    Ok(())
}
