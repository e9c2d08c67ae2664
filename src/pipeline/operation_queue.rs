//! Operation Queue - The only boundary between the command thread and the UI
//! thread.
//!
//! Producers enqueue closures that mutate the native hierarchy. Batched
//! closures wait for [`OperationQueue::dispatch_view_updates`], which commits
//! them as one unit. View creation uses a separate non-batched lane that the
//! UI thread drains opportunistically whenever enough of the frame is left.
//!
//! ```text
//! command thread                       UI thread (per frame)
//! --------------                       ---------------------
//! enqueue / prepend ──► operations     1. drain non-batched within budget
//! enqueue_create_view ► non_batched    2. run committed batches (FIFO)
//! dispatch_view_updates ─► committed   3. deactivate until new work arrives
//! ```

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, debug_span, error, trace, warn};

use crate::config::UiManagerConfig;
use crate::error::{Result, UiError};
use crate::native::NativeViewHierarchyManager;
use crate::types::{Dimensions, Props, Tag, ThemedContext, ViewAtIndex};

use super::frame::{BATCHED_CALLBACK_KEY, Choreographer, NON_BATCHED_CALLBACK_KEY};

/// A deferred native mutation.
pub type UiOperation = Box<dyn FnOnce(&mut NativeViewHierarchyManager) -> Result<()> + Send>;

/// Receives a measured frame, or `None` if the view was not on screen.
pub type MeasureCallback = Box<dyn FnOnce(Option<Dimensions>) + Send>;

/// Receives the touch target, or `None` if nothing was hit.
pub type TouchTargetCallback = Box<dyn FnOnce(Option<Tag>) + Send>;

/// Host hook for errors that escape a frame dispatch.
pub type ExceptionHandler = Box<dyn Fn(&UiError) + Send + Sync>;

#[derive(Default)]
struct BatchState {
    operations: Vec<UiOperation>,
    committed: Vec<UiOperation>,
}

pub struct OperationQueue {
    batch: Mutex<BatchState>,
    non_batched: Mutex<VecDeque<UiOperation>>,
    choreographer: Arc<Choreographer>,
    config: UiManagerConfig,
    exception_handler: Option<ExceptionHandler>,
}

impl OperationQueue {
    pub fn new(choreographer: Arc<Choreographer>, config: UiManagerConfig) -> Self {
        Self {
            batch: Mutex::new(BatchState::default()),
            non_batched: Mutex::new(VecDeque::new()),
            choreographer,
            config,
            exception_handler: None,
        }
    }

    pub fn with_exception_handler(mut self, handler: impl Fn(&UiError) + Send + Sync + 'static) -> Self {
        self.exception_handler = Some(Box::new(handler));
        self
    }

    pub fn choreographer(&self) -> &Arc<Choreographer> {
        &self.choreographer
    }

    // =========================================================================
    // Producers
    // =========================================================================

    /// True when no batched operation is waiting for the next commit.
    pub fn is_empty(&self) -> bool {
        self.batch.lock().operations.is_empty()
    }

    pub fn enqueue(&self, operation: UiOperation) {
        self.batch.lock().operations.push(operation);
    }

    /// Run before everything already queued for this batch.
    pub fn prepend(&self, operation: UiOperation) {
        self.batch.lock().operations.insert(0, operation);
    }

    /// Queue a view creation on the non-batched lane and request a frame.
    pub fn enqueue_create_view(
        &self,
        context: ThemedContext,
        tag: Tag,
        class_name: impl Into<String>,
        initial_props: Option<Props>,
    ) {
        let class_name = class_name.into();
        self.non_batched.lock().push_back(Box::new(move |manager| {
            manager.create_view(context, tag, &class_name, initial_props.as_ref())
        }));
        self.choreographer.activate(NON_BATCHED_CALLBACK_KEY);
    }

    pub fn enqueue_add_root_view(&self, tag: Tag, context: ThemedContext, dimensions: Dimensions) {
        self.enqueue(Box::new(move |manager| manager.add_root_view(tag, context, dimensions)));
    }

    pub fn enqueue_remove_root_view(&self, tag: Tag) {
        self.enqueue(Box::new(move |manager| manager.remove_root_view(tag)));
    }

    pub fn enqueue_update_props(&self, tag: Tag, props: Props) {
        self.enqueue(Box::new(move |manager| manager.update_props(tag, &props)));
    }

    pub fn enqueue_update_extra_data(&self, tag: Tag, data: Value) {
        self.enqueue(Box::new(move |manager| manager.update_view_extra_data(tag, &data)));
    }

    pub fn enqueue_update_layout(&self, parent_tag: Tag, tag: Tag, dimensions: Dimensions) {
        self.enqueue(Box::new(move |manager| {
            manager.update_layout(parent_tag, tag, dimensions)
        }));
    }

    pub fn enqueue_manage_children(
        &self,
        tag: Tag,
        indices_to_remove: Vec<usize>,
        views_to_add: Vec<ViewAtIndex>,
        tags_to_delete: Vec<Tag>,
    ) {
        self.enqueue(Box::new(move |manager| {
            manager.manage_children(tag, &indices_to_remove, &views_to_add, &tags_to_delete)
        }));
    }

    pub fn enqueue_set_children(&self, tag: Tag, child_tags: Vec<Tag>) {
        self.enqueue(Box::new(move |manager| manager.set_children(tag, &child_tags)));
    }

    pub fn enqueue_delete_views(&self, tags: Vec<Tag>) {
        self.enqueue(Box::new(move |manager| manager.delete_views(&tags)));
    }

    pub fn enqueue_dispatch_command(&self, tag: Tag, command_id: impl Into<String>, args: Value) {
        let command_id = command_id.into();
        self.enqueue(Box::new(move |manager| {
            manager.dispatch_command(tag, &command_id, &args)
        }));
    }

    pub fn enqueue_configure_layout_animation(&self, config: Value) {
        self.enqueue(Box::new(move |manager| manager.configure_layout_animation(&config)));
    }

    pub fn enqueue_measure(&self, tag: Tag, callback: MeasureCallback) {
        self.enqueue(Box::new(move |manager| {
            deliver(manager.measure(tag), callback)
        }));
    }

    pub fn enqueue_measure_in_window(&self, tag: Tag, callback: MeasureCallback) {
        self.enqueue(Box::new(move |manager| {
            deliver(manager.measure_in_window(tag), callback)
        }));
    }

    pub fn enqueue_find_target_for_touch(&self, tag: Tag, x: f64, y: f64, callback: TouchTargetCallback) {
        self.enqueue(Box::new(move |manager| {
            deliver(manager.find_target_for_touch(tag, x, y), callback)
        }));
    }

    /// Commit everything queued so far as one batch and request a frame.
    ///
    /// Nothing runs here; the batch executes on the next frame callback.
    pub fn dispatch_view_updates(&self, batch_id: i64) {
        let mut batch = self.batch.lock();

        let non_batched: Vec<UiOperation> = {
            let mut lane = self.non_batched.lock();
            if !lane.is_empty() {
                self.choreographer.deactivate(NON_BATCHED_CALLBACK_KEY);
            }
            lane.drain(..).collect()
        };
        let operations = mem::take(&mut batch.operations);
        let count = non_batched.len() + operations.len();

        batch.committed.push(Box::new(move |manager| {
            let _span = debug_span!("dispatch_ui", batch_id).entered();
            for operation in non_batched {
                operation(manager)?;
            }
            for operation in operations {
                operation(manager)?;
            }
            manager.on_batch_complete();
            Ok(())
        }));
        drop(batch);

        self.choreographer.activate(BATCHED_CALLBACK_KEY);
        debug!(batch_id, operations = count, "batch committed");
    }

    // =========================================================================
    // Consumer (UI thread)
    // =========================================================================

    /// Run one frame's worth of work.
    ///
    /// # Arguments
    /// * `manager` - The hierarchy manager owned by the UI thread
    /// * `frame_start` - When the current frame began; the non-batched lane
    ///   stops once less than the configured minimum is left before the end
    ///   of the frame
    pub fn dispatch_frame(&self, manager: &mut NativeViewHierarchyManager, frame_start: Instant) -> Result<()> {
        if !self.choreographer.is_subscribed() {
            return Ok(());
        }

        self.dispatch_non_batched(manager, frame_start + self.config.frame_duration)?;

        let batches = {
            let mut batch = self.batch.lock();
            let batches = mem::take(&mut batch.committed);
            self.choreographer.deactivate(BATCHED_CALLBACK_KEY);
            batches
        };
        for batch in batches {
            batch(manager)?;
        }
        Ok(())
    }

    /// [`dispatch_frame`](Self::dispatch_frame), reporting failures to the
    /// exception handler instead of returning them.
    pub fn dispatch_frame_safe(&self, manager: &mut NativeViewHierarchyManager, frame_start: Instant) {
        if let Err(err) = self.dispatch_frame(manager, frame_start) {
            error!(error = %err, "ui operation failed");
            if let Some(handler) = &self.exception_handler {
                handler(&err);
            }
        }
    }

    fn dispatch_non_batched(&self, manager: &mut NativeViewHierarchyManager, deadline: Instant) -> Result<()> {
        let mut ran = 0usize;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left < self.config.min_time_left_for_non_batched {
                break;
            }

            let next = {
                let mut lane = self.non_batched.lock();
                match lane.pop_front() {
                    Some(operation) => operation,
                    None => {
                        self.choreographer.deactivate(NON_BATCHED_CALLBACK_KEY);
                        break;
                    }
                }
            };
            next(manager)?;
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "non-batched operations dispatched");
        }
        Ok(())
    }

    pub fn on_suspend(&self) {
        self.choreographer.unsubscribe();
    }

    pub fn on_resume(&self) {
        self.choreographer.subscribe();
    }

    /// Tear down every native view, then stop receiving frames.
    pub fn on_destroy(&self, manager: &mut NativeViewHierarchyManager) -> Result<()> {
        let result = manager.drop_all_views();
        self.choreographer.unsubscribe();
        result
    }

    pub fn committed_batches(&self) -> usize {
        self.batch.lock().committed.len()
    }

    pub fn non_batched_len(&self) -> usize {
        self.non_batched.lock().len()
    }
}

/// Hand a measurement result to its callback. A failed measurement never
/// aborts the flush: the callback gets `None` instead.
fn deliver<T>(result: Result<T>, callback: Box<dyn FnOnce(Option<T>) + Send>) -> Result<()> {
    match result {
        Ok(value) => callback(Some(value)),
        Err(err) => {
            warn!(error = %err, recoverable = err.is_recoverable(), "measurement failed");
            callback(None);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    use crate::native::{AnyThread, PanelViewManager, ViewManagerRegistry};

    fn setup() -> (OperationQueue, NativeViewHierarchyManager) {
        let config = UiManagerConfig::default();
        let queue = OperationQueue::new(Arc::new(Choreographer::new()), config.clone());
        let managers = ViewManagerRegistry::new().with(Arc::new(PanelViewManager::new("View")));
        let manager = NativeViewHierarchyManager::new(managers, AnyThread, &config);
        (queue, manager)
    }

    fn record(log: &Arc<Mutex<Vec<i32>>>, value: i32) -> UiOperation {
        let log = log.clone();
        Box::new(move |_| {
            log.lock().push(value);
            Ok(())
        })
    }

    #[test]
    fn test_nothing_runs_before_frame() {
        let (queue, mut manager) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.enqueue(record(&log, 1));
        queue.dispatch_view_updates(1);
        assert!(log.lock().is_empty());
        assert!(queue.choreographer().has_pending_frame());

        queue.dispatch_frame(&mut manager, Instant::now()).unwrap();
        assert_eq!(*log.lock(), vec![1]);
        assert!(!queue.choreographer().has_pending_frame());
        assert_eq!(queue.committed_batches(), 0);
    }

    #[test]
    fn test_prepend_runs_first() {
        let (queue, mut manager) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.enqueue(record(&log, 1));
        queue.enqueue(record(&log, 2));
        queue.prepend(record(&log, 0));
        assert!(!queue.is_empty());
        queue.dispatch_view_updates(1);
        assert!(queue.is_empty());
        queue.dispatch_frame(&mut manager, Instant::now()).unwrap();
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_overlapping_batches_run_fifo() {
        let (queue, mut manager) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.enqueue(record(&log, 1));
        queue.enqueue(record(&log, 2));
        queue.dispatch_view_updates(1);
        queue.enqueue(record(&log, 3));
        queue.dispatch_view_updates(2);
        assert_eq!(queue.committed_batches(), 2);

        queue.dispatch_frame(&mut manager, Instant::now()).unwrap();
        assert_eq!(*log.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_non_batched_lane_runs_within_budget() {
        let (queue, mut manager) = setup();
        queue.enqueue_create_view(ThemedContext::new(1), 5, "View", None);
        assert!(queue.choreographer().is_active(NON_BATCHED_CALLBACK_KEY));

        queue.dispatch_frame(&mut manager, Instant::now()).unwrap();
        assert!(manager.view_exists(5));
        assert_eq!(queue.non_batched_len(), 0);
        assert!(!queue.choreographer().has_pending_frame());
    }

    #[test]
    fn test_non_batched_lane_waits_when_frame_is_spent() {
        let (_, mut manager) = setup();
        // Demands more time than any frame has left.
        let config = UiManagerConfig::default().with_min_time_left_for_non_batched(Duration::from_secs(1));
        let queue = OperationQueue::new(Arc::new(Choreographer::new()), config);
        queue.enqueue_create_view(ThemedContext::new(1), 5, "View", None);

        queue.dispatch_frame(&mut manager, Instant::now()).unwrap();
        assert!(!manager.view_exists(5));
        assert_eq!(queue.non_batched_len(), 1);
        assert!(queue.choreographer().has_pending_frame());
    }

    #[test]
    fn test_commit_carries_non_batched_ops() {
        let (queue, mut manager) = setup();
        queue.enqueue_create_view(ThemedContext::new(1), 5, "View", None);
        queue.enqueue_update_props(5, serde_json::json!({ "a": 1 }).as_object().cloned().unwrap_or_default());
        queue.dispatch_view_updates(1);
        assert_eq!(queue.non_batched_len(), 0);
        assert!(!queue.choreographer().is_active(NON_BATCHED_CALLBACK_KEY));

        // Creation runs inside the batch, before the update that needs it.
        queue.dispatch_frame(&mut manager, Instant::now()).unwrap();
        assert!(manager.view_exists(5));
    }

    #[test]
    fn test_suspend_keeps_work_buffered() {
        let (queue, mut manager) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.enqueue(record(&log, 1));
        queue.dispatch_view_updates(1);

        queue.on_suspend();
        queue.dispatch_frame(&mut manager, Instant::now()).unwrap();
        assert!(log.lock().is_empty());

        queue.on_resume();
        queue.dispatch_frame(&mut manager, Instant::now()).unwrap();
        assert_eq!(*log.lock(), vec![1]);
    }

    #[test]
    fn test_measure_failure_is_reported_not_raised() {
        let (queue, mut manager) = setup();
        let (tx, rx) = mpsc::channel();
        queue.enqueue_create_view(ThemedContext::new(1), 5, "View", None);
        queue.enqueue_measure(5, Box::new(move |frame| {
            let _ = tx.send(frame);
        }));
        queue.dispatch_view_updates(1);
        queue.dispatch_frame(&mut manager, Instant::now()).unwrap();
        assert_eq!(rx.try_recv().ok(), Some(None));
    }

    #[test]
    fn test_measure_unknown_tag_does_not_abort_batch() {
        let (queue, mut manager) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();
        queue.enqueue_measure(42, Box::new(move |frame| {
            let _ = tx.send(frame);
        }));
        queue.enqueue_find_target_for_touch(43, 0.0, 0.0, Box::new(|target| assert_eq!(target, None)));
        queue.enqueue_create_view(ThemedContext::new(1), 5, "View", None);
        queue.enqueue(record(&log, 1));
        queue.dispatch_view_updates(1);

        queue.dispatch_frame(&mut manager, Instant::now()).unwrap();
        assert_eq!(rx.try_recv().ok(), Some(None));
        assert_eq!(*log.lock(), vec![1]);
        assert!(manager.view_exists(5));
    }

    #[test]
    fn test_protocol_error_reaches_handler() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        let config = UiManagerConfig::default();
        let queue = OperationQueue::new(Arc::new(Choreographer::new()), config.clone())
            .with_exception_handler(move |err| sink.lock().push(err.to_string()));
        let mut manager =
            NativeViewHierarchyManager::new(ViewManagerRegistry::new(), AnyThread, &config);

        queue.enqueue_remove_root_view(99);
        queue.dispatch_view_updates(1);
        queue.dispatch_frame_safe(&mut manager, Instant::now());

        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("99"));
    }

    #[test]
    fn test_on_destroy_drops_everything() {
        let (queue, mut manager) = setup();
        queue.enqueue_add_root_view(1, ThemedContext::new(1), Dimensions::default());
        queue.dispatch_view_updates(1);
        queue.dispatch_frame(&mut manager, Instant::now()).unwrap();
        assert_eq!(manager.root_tags(), vec![1]);

        queue.on_destroy(&mut manager).unwrap();
        assert!(manager.root_tags().is_empty());
        assert!(!queue.choreographer().is_subscribed());
    }
}
