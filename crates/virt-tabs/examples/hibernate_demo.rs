//! Registers a batch of tabs, lets the sweep hibernate the hidden
//! ones, then reactivates one on demand and prints the event stream.
//!
//! Run with: cargo run --example hibernate_demo

use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use virt_tabs::{Tab, TabContent, TabId, VirtConfig, VirtEngine, VirtEvent};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = VirtConfig {
        max_visible: 4,
        hibernation_delay: Duration::from_millis(200),
        ..VirtConfig::default()
    };
    let engine = VirtEngine::new(config);

    for i in 0..10 {
        let content = TabContent {
            dom: vec![i as u8; 64 * 1024],
            js_heap: Some(vec![0u8; 16 * 1024]),
            form_data: Vec::new(),
        };
        engine.register(Arc::new(Mutex::new(Tab::with_content(
            TabId::new(i),
            content,
        ))));
    }

    let sweeper = engine.start();
    tokio::time::sleep(Duration::from_millis(800)).await;

    let stats = engine.stats();
    println!(
        "{} tabs, {} visible, {} hibernated, {} bytes saved",
        stats.total_tabs, stats.visible_tabs, stats.hibernated_tabs, stats.memory_saved_bytes
    );

    // Wake a hibernated tab; the restore is awaited.
    engine.activate(TabId::new(9)).await?;

    for event in engine.poll_events() {
        match event {
            VirtEvent::TabHibernated { id, bytes_freed, .. } => {
                println!("hibernated {id}: freed {bytes_freed} bytes");
            }
            VirtEvent::TabReactivated {
                id,
                elapsed,
                bytes_restored,
                failed,
            } => {
                println!("reactivated {id} in {elapsed:?}: {bytes_restored} bytes (failed={failed})");
            }
            VirtEvent::StatsUpdated(_) => {}
        }
    }

    sweeper.shutdown().await;
    Ok(())
}
