use std::cell::Cell;
use std::rc::Rc;

use futures::future::{self, LocalBoxFuture};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawOutcome {
    /// This request ran the loop; `passes` includes coalesced follow-ups
    Rendered { passes: usize },
    /// A pass was already in flight; it will run once more after finishing
    Coalesced,
}

#[derive(Debug, Default)]
struct PassState {
    rendering: Cell<bool>,
    pending: Cell<bool>,
    completed: Cell<u64>,
}

/// Clears the in-flight flag even if the redraw future is dropped unfinished
struct RenderingGuard(Rc<PassState>);

impl Drop for RenderingGuard {
    fn drop(&mut self) {
        self.0.rendering.set(false);
        self.0.pending.set(false);
    }
}

/// Serializes asynchronous redraw passes.
///
/// At most one pass is in flight. Requests that arrive meanwhile set a pending flag and
/// return at once; however many there were, they cost exactly one follow-up pass.
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    state: Rc<PassState>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_rendering(&self) -> bool {
        self.state.rendering.get()
    }

    /// Whether a follow-up pass has been requested
    pub fn has_pending(&self) -> bool {
        self.state.pending.get()
    }

    /// Passes finished since creation
    pub fn completed_passes(&self) -> u64 {
        self.state.completed.get()
    }

    /// Request a redraw. `pass` produces one full pass and may be called several times.
    ///
    /// The guard is taken synchronously, before the returned future is first polled.
    pub fn redraw<'a, F>(&self, mut pass: F) -> LocalBoxFuture<'a, RedrawOutcome>
    where
        F: FnMut() -> LocalBoxFuture<'a, ()> + 'a,
    {
        if self.state.rendering.get() {
            debug!("Redraw requested while a pass is in flight; coalescing");
            self.state.pending.set(true);
            return Box::pin(future::ready(RedrawOutcome::Coalesced));
        }
        self.state.rendering.set(true);
        let guard = RenderingGuard(Rc::clone(&self.state));

        Box::pin(async move {
            let state = Rc::clone(&guard.0);
            let mut passes = 0;
            loop {
                state.pending.set(false);
                pass().await;
                passes += 1;
                state.completed.set(state.completed.get() + 1);
                if !state.pending.get() {
                    break;
                }
                debug!("Running coalesced follow-up pass");
            }
            drop(guard);
            RedrawOutcome::Rendered { passes }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::{LocalPool, block_on};
    use futures::task::LocalSpawnExt;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// A pass that waits for the next queued channel to complete
    fn gated(
        gates: &Rc<RefCell<VecDeque<oneshot::Receiver<()>>>>,
        log: &Rc<RefCell<Vec<&'static str>>>,
    ) -> impl FnMut() -> LocalBoxFuture<'static, ()> + 'static {
        let gates = Rc::clone(gates);
        let log = Rc::clone(log);
        move || {
            let gate = gates.borrow_mut().pop_front();
            let log = Rc::clone(&log);
            Box::pin(async move {
                log.borrow_mut().push("start");
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                log.borrow_mut().push("end");
            })
        }
    }

    #[test]
    fn test_requests_during_a_pass_coalesce_into_one_follow_up() {
        let compositor = Compositor::new();
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let gates = Rc::new(RefCell::new(VecDeque::from([first_rx, second_rx])));
        let log = Rc::new(RefCell::new(Vec::new()));
        let outcome = Rc::new(Cell::new(None));

        let mut pool = LocalPool::new();
        let redraw = compositor.redraw(gated(&gates, &log));
        let slot = Rc::clone(&outcome);
        pool.spawner()
            .spawn_local(async move { slot.set(Some(redraw.await)) })
            .unwrap();
        pool.run_until_stalled();
        assert!(compositor.is_rendering());
        assert_eq!(*log.borrow(), vec!["start"]);

        // Three requests while the first pass is blocked
        for _ in 0..3 {
            let status = block_on(compositor.redraw(gated(&gates, &log)));
            assert_eq!(status, RedrawOutcome::Coalesced);
        }
        assert!(compositor.has_pending());

        // The gate of the follow-up resolves first; nothing overlaps
        second_tx.send(()).unwrap();
        pool.run_until_stalled();
        assert_eq!(*log.borrow(), vec!["start"]);

        first_tx.send(()).unwrap();
        pool.run_until_stalled();
        assert_eq!(*log.borrow(), vec!["start", "end", "start", "end"]);
        assert_eq!(outcome.get(), Some(RedrawOutcome::Rendered { passes: 2 }));
        assert!(!compositor.is_rendering());
        assert_eq!(compositor.completed_passes(), 2);
    }

    #[test]
    fn test_idle_request_runs_a_single_pass() {
        let compositor = Compositor::new();
        let gates = Rc::new(RefCell::new(VecDeque::new()));
        let log = Rc::new(RefCell::new(Vec::new()));
        let status = block_on(compositor.redraw(gated(&gates, &log)));
        assert_eq!(status, RedrawOutcome::Rendered { passes: 1 });
        assert!(!compositor.is_rendering());
    }

    #[test]
    fn test_dropped_redraw_releases_the_guard() {
        let compositor = Compositor::new();
        let gates = Rc::new(RefCell::new(VecDeque::new()));
        let log = Rc::new(RefCell::new(Vec::new()));
        let redraw = compositor.redraw(gated(&gates, &log));
        assert!(compositor.is_rendering());
        drop(redraw);
        assert!(!compositor.is_rendering());
    }
}
