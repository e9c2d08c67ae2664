//! Host loop demo.
//!
//! A command thread builds a small tree over three batches while the main
//! thread plays the UI thread: it owns the native hierarchy and runs the
//! operation queue whenever the choreographer reports work.
//!
//! Run with `RUST_LOG=uimanager=debug` to watch batches commit and flush.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use serde_json::json;
use tracing_subscriber::EnvFilter;

use uimanager::native::as_panel;
use uimanager::{
    Choreographer, DispatcherThread, NativeViewHierarchyManager, OperationQueue, PanelViewManager, Props,
    ThemedContext, UiImplementation, UiManagerConfig, ViewManagerRegistry,
};

fn props(value: serde_json::Value) -> Props {
    value.as_object().cloned().unwrap_or_default()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = UiManagerConfig::default();
    let managers = ViewManagerRegistry::new()
        .with(Arc::new(PanelViewManager::new("View")))
        .with(Arc::new(PanelViewManager::new("RawText").virtual_node()));
    let choreographer = Arc::new(Choreographer::new());
    let queue = Arc::new(
        OperationQueue::new(choreographer.clone(), config.clone())
            .with_exception_handler(|err| tracing::error!(%err, "bridge would shut down here")),
    );

    let mut native = NativeViewHierarchyManager::new(managers.clone(), DispatcherThread::current(), &config);
    native.set_dropped_views_listener(|tags| tracing::info!(?tags, "views dropped"));

    let producer_queue = queue.clone();
    let producer = thread::spawn(move || -> uimanager::Result<()> {
        let mut ui = UiImplementation::new(managers, producer_queue);
        ui.set_layout_event_listener(|event| tracing::info!(?event, "onLayout"));

        ui.register_root_view(1, 320.0, 240.0, ThemedContext::new(1))?;
        ui.create_view(2, "View", 1, Some(&props(json!({ "flexDirection": "row", "height": 40, "onLayout": true }))))?;
        ui.create_view(3, "View", 1, Some(&props(json!({ "flexGrow": 1 }))))?;
        ui.create_view(4, "View", 1, Some(&props(json!({ "width": 60 }))))?;
        ui.create_view(5, "RawText", 1, Some(&props(json!({ "text": "hello" }))))?;
        ui.set_children(1, &[2, 5])?;
        ui.set_children(2, &[3, 4])?;
        ui.dispatch_view_updates(1)?;

        // Swap the children of the row.
        ui.manage_children(2, &[1], &[0], &[], &[], &[])?;
        ui.dispatch_view_updates(2)?;

        ui.update_view(2, "View", &props(json!({ "height": 80 })))?;
        ui.remove_subviews_from_container_with_id(2)?;
        ui.dispatch_view_updates(3)
    });

    loop {
        let frame_start = Instant::now();
        let producer_done = producer.is_finished();
        if choreographer.has_pending_frame() {
            queue.dispatch_frame_safe(&mut native, frame_start);
        } else if producer_done {
            break;
        }
        thread::sleep(config.frame_duration);
    }

    match producer.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(%err, "command thread failed"),
        Err(_) => tracing::error!("command thread panicked"),
    }

    if let Ok(view) = native.resolve_view(2) {
        if let Some(panel) = as_panel(&view) {
            tracing::info!(frame = ?panel.frame(), children = ?panel.child_tags(), "row after three batches");
        }
    }

    if let Err(err) = queue.on_destroy(&mut native) {
        tracing::error!(%err, "teardown failed");
    }
}
