//! Lock-free exchange between the regeneration side and the audio path
//!
//! The IR travels through an atomic Arc slot tagged with a generation
//! number; parameter changes travel through an SPSC ring. Nothing here
//! blocks, and the audio side never deallocates: retired Arcs are moved
//! into a reclamation queue drained on the control side.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use rtrb::{Consumer, Producer, RingBuffer};

use vf_core::ParamChange;
use vf_dsp::convolution::PartitionedIr;

/// Atomic publish slot for freshly built IRs. A newer publish replaces
/// any unconsumed one — stale in-flight results are superseded, never
/// queued up.
pub struct IrHandoff {
    slot: ArcSwapOption<PartitionedIr>,
    published: AtomicU64,
}

impl IrHandoff {
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::empty(),
            published: AtomicU64::new(0),
        }
    }

    /// Publish a new IR (control side).
    pub fn publish(&self, ir: Arc<PartitionedIr>) {
        let generation = ir.generation();
        // Slot first, counter second: a consumer that sees the new
        // generation is guaranteed to load the new slot
        self.slot.store(Some(ir));
        self.published.store(generation, Ordering::Release);
    }

    /// Take the newest IR if it is newer than `seen`. Wait-free and
    /// allocation-free; the returned Arc is a refcounted clone.
    pub fn poll(&self, seen: u64) -> Option<Arc<PartitionedIr>> {
        if self.published.load(Ordering::Acquire) <= seen {
            return None;
        }
        let ir = self.slot.load_full()?;
        (ir.generation() > seen).then_some(ir)
    }
}

impl Default for IrHandoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Off-thread reclamation for retired IRs. The audio side moves its Arc
/// clones in; the control side drains and drops them, so deallocation
/// never happens on the audio callback.
pub struct RetireQueue {
    tx: Producer<Arc<PartitionedIr>>,
    rx: Consumer<Arc<PartitionedIr>>,
}

impl RetireQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = RingBuffer::new(capacity);
        Self { tx, rx }
    }

    /// Audio side: hand an Arc off for reclamation. Should the queue be
    /// full the Arc drops here, which is still only a refcount decrement
    /// while the publish slot holds its own clone.
    pub fn retire(&mut self, ir: Arc<PartitionedIr>) {
        let _ = self.tx.push(ir);
    }

    /// Control side: drop everything the audio side retired.
    pub fn drain(&mut self) {
        while self.rx.pop().is_ok() {}
    }
}

/// Lock-free parameter queue (control → audio)
pub struct ParamQueue {
    tx: Producer<ParamChange>,
    rx: Consumer<ParamChange>,
}

impl ParamQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = RingBuffer::new(capacity);
        Self { tx, rx }
    }

    /// Push a change (non-blocking; a full queue drops the change, the
    /// caller's next update re-sends current values anyway).
    pub fn push(&mut self, change: ParamChange) -> bool {
        self.tx.push(change).is_ok()
    }

    /// Pop the next pending change (audio side).
    pub fn pop(&mut self) -> Option<ParamChange> {
        self.rx.pop().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_dsp::convolution::PartitionedIr;
    use vf_dsp::ir::{ImpulseResponse, ParameterSnapshot};

    fn dummy_ir(generation: u64) -> Arc<PartitionedIr> {
        let ir = ImpulseResponse::new(
            vec![1.0; 64],
            vec![1.0; 64],
            48000.0,
            ParameterSnapshot::default(),
        );
        Arc::new(PartitionedIr::build(&ir, 32, 4, generation))
    }

    #[test]
    fn poll_returns_only_newer_generations() {
        let handoff = IrHandoff::new();
        assert!(handoff.poll(0).is_none());

        handoff.publish(dummy_ir(1));
        handoff.publish(dummy_ir(2));

        // Only the newest result is ever seen
        let got = handoff.poll(0).unwrap();
        assert_eq!(got.generation(), 2);
        assert!(handoff.poll(2).is_none());
    }

    #[test]
    fn retire_queue_round_trip() {
        let mut queue = RetireQueue::new(4);
        let ir = dummy_ir(1);
        let weak = Arc::downgrade(&ir);
        queue.retire(ir);
        assert!(weak.upgrade().is_some());
        queue.drain();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn param_queue_round_trip() {
        use vf_core::{ParamChange, ParamId};
        let mut queue = ParamQueue::new(2);
        assert!(queue.push(ParamChange {
            id: ParamId(3),
            value: 0.25,
        }));
        let change = queue.pop().unwrap();
        assert_eq!(change.id, ParamId(3));
        assert_eq!(change.value, 0.25);
        assert!(queue.pop().is_none());
    }
}
