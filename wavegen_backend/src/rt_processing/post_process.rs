//! Deferred work executed after a quantum has been rendered.
//!
//! Nodes never notify listeners from inside their render call. They push a
//! [`PostAction`] instead, and the renderer drains the queue once the whole
//! quantum (mix included) is done and before the next one starts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, trace};
use spin::Mutex;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a node within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Notifications delivered to node listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEvent {
    /// Output finished; `frame` is the first frame no longer synthesized.
    Ended { node: NodeId, frame: u64 },
}

/// Mono output of one node for the current quantum.
#[derive(Debug, Clone)]
pub struct OutputBus {
    data: Vec<f32>,
    enabled: bool,
}

impl OutputBus {
    pub fn new(block_size: usize) -> Self {
        Self {
            data: vec![0.0; block_size],
            enabled: true,
        }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn zeros(&mut self) {
        self.data.fill(0.0);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }
}

pub type SharedBus = Arc<Mutex<OutputBus>>;

pub type EventReceiver = Receiver<NodeEvent>;

/// End-of-life state shared between a node and its queued actions.
///
/// `fire` performs the termination at most once no matter how many times
/// it is called or from how many queued actions.
#[derive(Debug)]
pub struct Termination {
    node: NodeId,
    fired: AtomicBool,
    bus: SharedBus,
    listeners: Mutex<Vec<Sender<NodeEvent>>>,
}

impl Termination {
    pub fn new(node: NodeId, bus: SharedBus) -> Self {
        Self {
            node,
            fired: AtomicBool::new(false),
            bus,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = channel::unbounded();
        self.listeners.lock().push(tx);
        rx
    }

    /// Clear and disable the bus, then notify listeners. Returns `false` if
    /// the node had already been terminated.
    pub fn fire(&self, frame: u64) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }

        {
            let mut bus = self.bus.lock();
            bus.zeros();
            bus.disable();
        }

        let event = NodeEvent::Ended {
            node: self.node,
            frame,
        };
        // dropped receivers unsubscribe themselves
        self.listeners.lock().retain(|tx| tx.send(event).is_ok());
        debug!("node {} ended at frame {frame}", self.node.get());
        true
    }
}

/// Work queued by a node during rendering.
#[derive(Debug)]
pub enum PostAction {
    Terminate { handle: Arc<Termination>, frame: u64 },
}

impl PostAction {
    fn run(self) -> bool {
        match self {
            PostAction::Terminate { handle, frame } => handle.fire(frame),
        }
    }
}

/// Result of draining the queue once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub executed: usize,
    pub terminated: usize,
}

/// Actions pending until the end of the current quantum.
#[derive(Debug, Default)]
pub struct PostProcessQueue {
    actions: Vec<PostAction>,
}

impl PostProcessQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            actions: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, action: PostAction) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every pending action in enqueue order.
    pub fn drain(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        for action in self.actions.drain(..) {
            report.executed += 1;
            if action.run() {
                report.terminated += 1;
            }
        }
        if report.executed > 0 {
            trace!(
                "drained {} post-process actions ({} terminations)",
                report.executed, report.terminated
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(block_size: usize) -> (SharedBus, Arc<Termination>) {
        let bus = Arc::new(Mutex::new(OutputBus::new(block_size)));
        let termination = Arc::new(Termination::new(NodeId::next(), Arc::clone(&bus)));
        (bus, termination)
    }

    #[test]
    fn test_node_ids_unique() {
        let a = NodeId::next();
        let b = NodeId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn test_fire_once() {
        let (bus, termination) = handle(4);
        bus.lock().data_mut().fill(0.5);
        let rx = termination.subscribe();

        assert!(termination.fire(10));
        assert!(!termination.fire(20));
        assert!(termination.has_fired());

        let guard = bus.lock();
        assert!(!guard.is_enabled());
        assert_eq!(guard.data(), &[0.0; 4]);
        drop(guard);

        assert!(matches!(rx.try_recv(), Ok(NodeEvent::Ended { frame: 10, .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_queue_drain_guards_duplicates() {
        let (_bus, termination) = handle(2);
        let rx = termination.subscribe();
        let mut queue = PostProcessQueue::with_capacity(4);

        queue.push(PostAction::Terminate {
            handle: Arc::clone(&termination),
            frame: 3,
        });
        queue.push(PostAction::Terminate {
            handle: Arc::clone(&termination),
            frame: 5,
        });
        assert_eq!(queue.len(), 2);

        let report = queue.drain();
        assert_eq!(
            report,
            DrainReport {
                executed: 2,
                terminated: 1
            }
        );
        assert!(queue.is_empty());
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let (_bus, termination) = handle(1);
        let dropped = termination.subscribe();
        let kept = termination.subscribe();
        drop(dropped);

        assert!(termination.fire(0));
        assert_eq!(kept.try_iter().count(), 1);
        assert!(termination.listeners.lock().len() == 1);
    }
}
