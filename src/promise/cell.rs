//! Settlement cells and the settlement protocol.
//!
//! A cell moves from pending to a terminal [`Outcome`] exactly once. The
//! check-and-set happens under the cell lock; reactions are taken out of the
//! cell and scheduled only after the lock is released, so user code never
//! runs while any cell is locked and no path ever holds two cell locks.
//!
//! Settlement and flushing are separate steps. A cell whose chain is bound to
//! a receiver that has not settled yet records its outcome but holds its
//! reactions back until the receiver settles, so every handler observes the
//! receiver's final value as its context.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::runtime::{Engine, Job};
use crate::tracing_compat::trace;
use crate::types::{CellId, Outcome, Value};

/// A continuation: receives the bound receiver (or `Undefined`) and the
/// fulfillment value or rejection reason. `Err` rejects the derived cell.
pub(crate) type Handler = Box<dyn FnOnce(&Value, Value) -> Result<Value, Value> + Send>;

/// An internal observer of a cell's outcome.
pub(crate) type Listener = Box<dyn FnOnce(Outcome) + Send>;

/// Something waiting for a cell to settle.
pub(crate) enum Reaction {
    /// A `then` registration feeding a derived cell.
    Then {
        target: Arc<Shared>,
        on_fulfilled: Option<Handler>,
        on_rejected: Option<Handler>,
    },
    /// A cell following this one (assimilation of a native promise).
    Adopt { target: Arc<Shared> },
    /// Kernel-internal observer.
    Listen(Listener),
}

impl Reaction {
    fn feeds(&self, cell: &Arc<Shared>) -> bool {
        match self {
            Self::Then { target, .. } | Self::Adopt { target } => Arc::ptr_eq(target, cell),
            Self::Listen(_) => false,
        }
    }

    pub(crate) fn dispatch(self, outcome: Outcome, context: &Value) {
        match self {
            Self::Then {
                target,
                on_fulfilled,
                on_rejected,
            } => {
                // Cancelled while the job was queued.
                if !target.is_pending() {
                    return;
                }
                let handler = if outcome.is_fulfilled() {
                    on_fulfilled
                } else {
                    on_rejected
                };
                let Some(handler) = handler else {
                    target.settle(outcome);
                    return;
                };
                // Rethrowing the cancellation reason keeps the cancelled tag.
                let cancelled = match &outcome {
                    Outcome::Cancelled(reason) => Some(reason.clone()),
                    Outcome::Fulfilled(_) | Outcome::Rejected(_) => None,
                };
                let argument = outcome.into_payload();
                match target.engine.invoke(|| handler(context, argument)) {
                    Ok(value) => target.resolve_with(value),
                    Err(reason) if cancelled.as_ref() == Some(&reason) => {
                        target.settle(Outcome::Cancelled(reason));
                    }
                    Err(reason) => {
                        target.settle(Outcome::Rejected(reason));
                    }
                }
            }
            Self::Adopt { target } => {
                target.settle(outcome);
            }
            Self::Listen(listener) => listener(outcome),
        }
    }
}

/// Attributes a new cell inherits from the cell it derives from.
#[derive(Default)]
pub(crate) struct Lineage {
    pub(crate) receiver: Option<Arc<Shared>>,
    pub(crate) cancellable: bool,
    pub(crate) parent: Option<Weak<Shared>>,
}

struct Cell {
    outcome: Option<Outcome>,
    /// A resolver call or assimilation has claimed the cell.
    resolved: bool,
    /// Reactions have been released; later registrations dispatch directly.
    flushed: bool,
    /// Receiver value captured at flush.
    context: Value,
    reactions: SmallVec<[Reaction; 2]>,
    receiver: Option<Arc<Shared>>,
    cancellable: bool,
    parent: Option<Weak<Shared>>,
    /// Pending derived cells holding an upward chain edge to this one.
    consumers: usize,
    handled: bool,
    reported: bool,
    /// Created by `done`; rejections are always reported.
    terminal: bool,
}

/// A reference-counted settlement cell.
pub(crate) struct Shared {
    pub(crate) id: CellId,
    pub(crate) engine: Engine,
    cell: Mutex<Cell>,
}

impl Shared {
    pub(crate) fn new(engine: Engine, lineage: Lineage) -> Arc<Self> {
        let id = CellId::next();
        trace!(
            cell = ?id,
            bound = lineage.receiver.is_some(),
            cancellable = lineage.cancellable,
            "cell created"
        );
        Arc::new(Self {
            id,
            engine,
            cell: Mutex::new(Cell {
                outcome: None,
                resolved: false,
                flushed: false,
                context: Value::Undefined,
                reactions: SmallVec::new(),
                receiver: lineage.receiver,
                cancellable: lineage.cancellable,
                parent: lineage.parent,
                consumers: 0,
                handled: false,
                reported: false,
                terminal: false,
            }),
        })
    }

    /// A fresh unbound, uncancellable root cell.
    pub(crate) fn root(engine: &Engine) -> Arc<Self> {
        Self::new(engine.clone(), Lineage::default())
    }

    /// Creates a derived cell: same receiver and cancellability, with an
    /// upward chain edge counted as a consumer of `self`.
    pub(crate) fn derive(self: &Arc<Self>) -> Arc<Self> {
        let lineage = {
            let mut cell = self.cell.lock();
            cell.consumers += 1;
            Lineage {
                receiver: cell.receiver.clone(),
                cancellable: cell.cancellable,
                parent: Some(Arc::downgrade(self)),
            }
        };
        Self::new(self.engine.clone(), lineage)
    }

    /// Creates a cell with the same receiver but no chain edge.
    pub(crate) fn detached(&self, cancellable: bool) -> Arc<Self> {
        let receiver = self.cell.lock().receiver.clone();
        Self::new(
            self.engine.clone(),
            Lineage {
                receiver,
                cancellable,
                parent: None,
            },
        )
    }

    pub(crate) fn add_consumer(&self) {
        self.cell.lock().consumers += 1;
    }

    fn release_consumer(&self) {
        let mut cell = self.cell.lock();
        cell.consumers = cell.consumers.saturating_sub(1);
    }

    pub(crate) fn outcome(&self) -> Option<Outcome> {
        self.cell.lock().outcome.clone()
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.cell.lock().outcome.is_none()
    }

    pub(crate) fn is_resolved(&self) -> bool {
        let cell = self.cell.lock();
        cell.resolved || cell.outcome.is_some()
    }

    pub(crate) fn is_cancellable(&self) -> bool {
        self.cell.lock().cancellable
    }

    pub(crate) fn set_cancellable(&self, cancellable: bool) {
        self.cell.lock().cancellable = cancellable;
    }

    pub(crate) fn receiver(&self) -> Option<Arc<Self>> {
        self.cell.lock().receiver.clone()
    }

    pub(crate) fn parent(&self) -> Option<Arc<Self>> {
        self.cell.lock().parent.as_ref().and_then(Weak::upgrade)
    }

    /// True if a cancellation request coming from a child may continue
    /// upward through this cell: it is pending, cancellable, and the child is
    /// its only remaining consumer.
    pub(crate) fn yields_to_child_cancel(&self) -> bool {
        let cell = self.cell.lock();
        cell.outcome.is_none() && cell.cancellable && cell.consumers <= 1
    }

    /// Claims the cell for a resolver. Only the first claim succeeds.
    pub(crate) fn claim(&self) -> bool {
        let mut cell = self.cell.lock();
        if cell.resolved || cell.outcome.is_some() {
            return false;
        }
        cell.resolved = true;
        true
    }

    pub(crate) fn mark_terminal(&self) {
        let mut cell = self.cell.lock();
        cell.terminal = true;
        cell.handled = true;
    }

    /// Moves the cell to `outcome` if it is still pending. Returns false if
    /// it had already settled.
    pub(crate) fn settle(self: &Arc<Self>, outcome: Outcome) -> bool {
        let (parent, receiver) = {
            let mut cell = self.cell.lock();
            if cell.outcome.is_some() {
                return false;
            }
            trace!(cell = ?self.id, outcome = %outcome, "cell settled");
            cell.outcome = Some(outcome);
            cell.resolved = true;
            (cell.parent.take(), cell.receiver.clone())
        };
        if let Some(parent) = parent.as_ref().and_then(Weak::upgrade) {
            parent.release_consumer();
        }
        match receiver {
            Some(receiver) if receiver.is_pending() => {
                let cell = Arc::clone(self);
                receiver.listen(move |_| cell.flush());
            }
            _ => self.flush(),
        }
        true
    }

    fn flush(self: &Arc<Self>) {
        let context = self
            .receiver()
            .and_then(|r| r.outcome())
            .and_then(|o| match o {
                Outcome::Fulfilled(v) => Some(v),
                Outcome::Rejected(_) | Outcome::Cancelled(_) => None,
            })
            .unwrap_or_default();
        let (outcome, reactions, unhandled, terminal) = {
            let mut cell = self.cell.lock();
            if cell.flushed {
                return;
            }
            let Some(outcome) = cell.outcome.clone() else {
                return;
            };
            cell.flushed = true;
            cell.context = context.clone();
            let reactions = std::mem::take(&mut cell.reactions);
            let rejected = outcome.is_rejected();
            (
                outcome,
                reactions,
                rejected && !cell.handled,
                rejected && cell.terminal,
            )
        };
        if terminal {
            self.engine.report_terminal(Arc::clone(self));
        } else if unhandled {
            self.engine.track_unhandled(Arc::clone(self));
        }
        for reaction in reactions {
            self.engine.schedule(Job::Dispatch {
                reaction,
                outcome: outcome.clone(),
                context: context.clone(),
            });
        }
    }

    /// Registers a reaction. If the cell has already flushed, the reaction
    /// is scheduled immediately (never run synchronously).
    pub(crate) fn register(self: &Arc<Self>, reaction: Reaction) {
        self.push_reaction(reaction, true);
    }

    fn push_reaction(self: &Arc<Self>, reaction: Reaction, handles: bool) {
        let (ready, retract) = {
            let mut cell = self.cell.lock();
            let retract = handles && !cell.terminal && std::mem::take(&mut cell.reported);
            cell.handled |= handles;
            let ready = match (&cell.outcome, cell.flushed) {
                (Some(outcome), true) => Some((reaction, outcome.clone(), cell.context.clone())),
                _ => {
                    cell.reactions.push(reaction);
                    None
                }
            };
            (ready, retract)
        };
        if retract {
            self.engine.retract_unhandled(Arc::clone(self));
        }
        if let Some((reaction, outcome, context)) = ready {
            self.engine.schedule(Job::Dispatch {
                reaction,
                outcome,
                context,
            });
        }
    }

    pub(crate) fn listen<F>(self: &Arc<Self>, listener: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.register(Reaction::Listen(Box::new(listener)));
    }

    /// Like [`listen`](Self::listen), but a rejection of this cell stays
    /// unhandled as far as reporting is concerned.
    pub(crate) fn watch<F>(self: &Arc<Self>, listener: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.push_reaction(Reaction::Listen(Box::new(listener)), false);
    }

    /// Removes reactions feeding `child`; used when `child` is cancelled.
    pub(crate) fn detach(&self, child: &Arc<Self>) {
        // Removed handlers are dropped after the lock is released.
        let _removed: SmallVec<[Reaction; 2]> = {
            let mut cell = self.cell.lock();
            let (kept, removed) = std::mem::take(&mut cell.reactions)
                .into_iter()
                .partition(|r| !r.feeds(child));
            cell.reactions = kept;
            removed
        };
    }

    /// Drops `child`'s reactions on this cell together with its chain edge,
    /// so it no longer counts as a consumer.
    pub(crate) fn abandon(&self, child: &Arc<Self>) {
        self.detach(child);
        let edge = child.cell.lock().parent.take();
        if edge.is_some() {
            self.release_consumer();
        }
    }

    /// Marks an unhandled rejection as reported and returns its reason.
    pub(crate) fn claim_report(&self, include_cancelled: bool) -> Option<Value> {
        let mut cell = self.cell.lock();
        if cell.handled || cell.reported {
            return None;
        }
        let reason = match cell.outcome.as_ref()? {
            Outcome::Rejected(r) => r.clone(),
            Outcome::Cancelled(r) if include_cancelled => r.clone(),
            Outcome::Cancelled(_) | Outcome::Fulfilled(_) => return None,
        };
        cell.reported = true;
        Some(reason)
    }

    pub(crate) fn take_terminal_reason(&self) -> Option<Value> {
        let mut cell = self.cell.lock();
        if cell.reported {
            return None;
        }
        let reason = cell.outcome.as_ref()?.reason()?.clone();
        cell.reported = true;
        Some(reason)
    }
}

impl Drop for Shared {
    // Pending cells own their derived cells through the reaction list; unlink
    // the chain with an explicit stack so long chains drop without recursion.
    fn drop(&mut self) {
        let mut stack: Vec<Reaction> = std::mem::take(&mut self.cell.get_mut().reactions).into_vec();
        while let Some(reaction) = stack.pop() {
            match reaction {
                Reaction::Then { target, .. } | Reaction::Adopt { target } => {
                    if let Ok(mut orphan) = Arc::try_unwrap(target) {
                        stack.extend(std::mem::take(&mut orphan.cell.get_mut().reactions));
                    }
                }
                Reaction::Listen(_) => {}
            }
        }
    }
}
