//! Communicator abstraction.
//!
//! All cross-process interaction in this crate goes through the blocking
//! collectives defined here. Every rank sharing a communicator must invoke
//! the same collectives, the same number of times, in the same order, with
//! shape-compatible arguments. This is a correctness invariant, not a
//! convention: a rank that skips a collective stalls all others indefinitely,
//! and there is no per-call cancellation or timeout at this layer.
//!
//! Two variants exist:
//!
//! * [Communicator::Serial]: a single-rank run; collectives are local no-ops.
//! * [Communicator::Threaded]: ranks are threads of one process sharing a
//!   barrier and an exchange buffer. Used by tests and single-node runs.

use std::any::Any;
use std::sync::{Arc, Barrier, Mutex};

/// Reduction operators supported by [Communicator::all_reduce].
///
/// This is a closed set; collective contracts elsewhere in the crate are
/// defined only over these operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    /// Elementwise sum
    Sum,
    /// Elementwise minimum
    Min,
    /// Elementwise maximum
    Max,
}

/// Trait for values exchangeable through collectives.
pub trait CommValue: Clone + Send + 'static {}

/// Blanket implementation of CommValue.
impl<T> CommValue for T where T: Clone + Send + 'static {}

/// Trait for elements reducible with a [ReduceOp].
pub trait CommElement: CommValue + Copy + PartialOrd + std::ops::Add<Output = Self> {}

/// Blanket implementation of CommElement.
impl<T> CommElement for T where T: CommValue + Copy + PartialOrd + std::ops::Add<Output = T> {}

fn combine<T: CommElement>(a: T, b: T, op: ReduceOp) -> T {
    match op {
        ReduceOp::Sum => a + b,
        ReduceOp::Min => {
            if b < a {
                b
            } else {
                a
            }
        }
        ReduceOp::Max => {
            if b > a {
                b
            } else {
                a
            }
        }
    }
}

/// A communicator over a fixed set of ranks.
#[derive(Clone)]
pub enum Communicator {
    /// One rank, no peers.
    Serial,
    /// In-process ranks synchronising through a shared barrier.
    Threaded(ThreadComm),
}

impl Communicator {
    /// Return a single-rank communicator.
    pub fn serial() -> Self {
        Communicator::Serial
    }

    /// Rank of the calling process in [0, size).
    pub fn rank(&self) -> usize {
        match self {
            Communicator::Serial => 0,
            Communicator::Threaded(comm) => comm.rank,
        }
    }

    /// Number of ranks sharing this communicator.
    pub fn size(&self) -> usize {
        match self {
            Communicator::Serial => 1,
            Communicator::Threaded(comm) => comm.size,
        }
    }

    /// Reduce a vector elementwise across all ranks; every rank receives the
    /// combined result in place. Blocking collective.
    pub fn all_reduce<T: CommElement>(&self, x: &mut [T], op: ReduceOp) {
        match self {
            Communicator::Serial => {}
            Communicator::Threaded(comm) => {
                let gathered = comm.exchange(x);
                // Fold contributions in rank order on every rank, so results
                // are bitwise identical everywhere.
                let mut result = gathered[0].clone();
                for contribution in gathered.iter().skip(1) {
                    for (acc, value) in result.iter_mut().zip(contribution) {
                        *acc = combine(*acc, *value, op);
                    }
                }
                x.copy_from_slice(&result);
            }
        }
    }

    /// Reduce a scalar across all ranks.
    pub fn all_reduce_scalar<T: CommElement>(&self, x: &mut T, op: ReduceOp) {
        let mut buf = [*x];
        self.all_reduce(&mut buf, op);
        *x = buf[0];
    }

    /// Concatenate per-rank vectors in rank order; every rank receives the
    /// full concatenation. Vectors may differ in length between ranks.
    /// Blocking collective.
    pub fn all_gather_v<T: CommValue>(&self, x: &[T]) -> Vec<T> {
        match self {
            Communicator::Serial => x.to_vec(),
            Communicator::Threaded(comm) => comm.exchange(x).into_iter().flatten().collect(),
        }
    }

    /// Replace every rank's vector with the root rank's vector.
    /// Blocking collective.
    pub fn broadcast<T: CommValue>(&self, x: &mut Vec<T>, root: usize) {
        match self {
            Communicator::Serial => {}
            Communicator::Threaded(comm) => {
                let gathered = comm.exchange(x);
                *x = gathered[root].clone();
            }
        }
    }
}

struct CommShared {
    barrier: Barrier,
    slots: Mutex<Vec<Option<Box<dyn Any + Send>>>>,
}

/// In-process communicator rank.
///
/// Cheap to clone; clones refer to the same rank.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<CommShared>,
}

impl ThreadComm {
    /// Create a communicator of `size` ranks and return one handle per rank,
    /// in rank order. Each handle must be moved to its own thread; all ranks
    /// must participate in every collective.
    pub fn split(size: usize) -> Vec<Communicator> {
        assert!(size > 0, "communicator size must be positive");
        let shared = Arc::new(CommShared {
            barrier: Barrier::new(size),
            slots: Mutex::new((0..size).map(|_| None).collect()),
        });
        (0..size)
            .map(|rank| {
                Communicator::Threaded(ThreadComm {
                    rank,
                    size,
                    shared: Arc::clone(&shared),
                })
            })
            .collect()
    }

    /// Exchange each rank's vector with every other rank. Returns the
    /// per-rank contributions in rank order.
    ///
    /// Aborts on a cross-rank payload type mismatch: that means the ranks
    /// disagree on the collective call sequence, which corrupts the run and
    /// is unrecoverable by contract.
    fn exchange<T: CommValue>(&self, x: &[T]) -> Vec<Vec<T>> {
        {
            let mut slots = self
                .shared
                .slots
                .lock()
                .expect("communicator exchange buffer poisoned");
            slots[self.rank] = Some(Box::new(x.to_vec()));
        }
        self.shared.barrier.wait();
        let gathered = {
            let slots = self
                .shared
                .slots
                .lock()
                .expect("communicator exchange buffer poisoned");
            slots
                .iter()
                .map(|slot| {
                    slot.as_ref()
                        .and_then(|boxed| boxed.downcast_ref::<Vec<T>>())
                        .expect("collective call mismatch between ranks")
                        .clone()
                })
                .collect::<Vec<_>>()
        };
        // Second wait: no rank may start the next collective (overwriting its
        // slot) until every rank has read this one.
        self.shared.barrier.wait();
        gathered
    }
}
