use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use uponor_x265::{Config, StateProxy, StateUpdate, changed_zones};

fn build_proxy(config: &Config, reload: Arc<AtomicBool>) -> uponor_x265::Result<StateProxy> {
    let client = config.client_builder().build()?;
    Ok(StateProxy::builder(client)
        .store(config.setpoint_store())
        .unavailable_threshold(config.unavailable_threshold)
        .on_update(|update| match update {
            StateUpdate::Polled { changes } => {
                for zone in changed_zones(changes) {
                    println!("{zone} changed");
                }
            }
            StateUpdate::Written { variables } => println!("wrote {variables:?}"),
        })
        .on_reload(move || reload.store(true, Ordering::SeqCst))
        .build())
}

fn print_zones(proxy: &StateProxy) {
    let snapshot = proxy.snapshot();
    for zone in snapshot.active_zones() {
        let state = snapshot.zone_state(&zone);
        let fmt_temp = |t: Option<uponor_x265::Temperature>| {
            t.map(|t| t.to_string()).unwrap_or_else(|| "--".to_string())
        };
        println!(
            "[{}] {} | target {} | {} / {:?}{}{}",
            state.id,
            fmt_temp(state.temperature),
            fmt_temp(state.setpoint),
            state.mode.as_str(),
            state.action,
            state.preset.map(|p| format!(" | {}", p.as_str())).unwrap_or_default(),
            if state.status.is_ok() {
                String::new()
            } else {
                format!(" | {}", state.status)
            },
        );
    }
}

/// Usage: UPONOR_HOST=192.168.1.50 cargo run --example monitor
#[tokio::main]
async fn main() -> uponor_x265::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let reload = Arc::new(AtomicBool::new(false));
    let mut proxy = build_proxy(&config, reload.clone())?;
    println!("Polling {} every {:?}...", config.host, config.scan_interval);

    let mut ticker = tokio::time::interval(config.scan_interval);
    loop {
        ticker.tick().await;

        if reload.swap(false, Ordering::SeqCst) {
            println!("Controller lost, rebuilding proxy");
            proxy = build_proxy(&config, reload.clone())?;
        }

        let state = proxy.update().await;
        println!("-- {state:?}");
        print_zones(&proxy);
    }
}
