// Frame pacing and GPU resource lifetime control.
//
// A single timeline fence tracks the whole pipeline. Beginning a frame
// blocks until everything previously submitted has retired, which trades
// overlap for a hard guarantee: once `begin_frame` returns, no GPU work is
// in flight and every per-slot resource is safe to reuse or destroy.
//
// Fence values start at 1. Value 0 is the timeline's initial state, so a
// wait on 0 cannot distinguish "never signaled" from "complete"; the first
// use runs a signal/wait handshake to validate the fence before any real
// work depends on it.

use ash::vk;
use std::sync::Arc;

use super::submit::SubmitQueue;
use super::swapchain::{AcquireOutcome, Swapchain};
use super::sync::{GpuTimeline, PresentSync, TimelineFence};
use super::upload::UploadPool;
use super::RenderDevice;
use crate::error::DeviceResult;

/// Fence value bookkeeping, independent of any real GPU.
pub struct FrameClock<T: GpuTimeline> {
    timeline: T,
    next_value: u64,
    last_submitted: u64,
    primed: bool,
}

impl<T: GpuTimeline> FrameClock<T> {
    pub fn new(timeline: T) -> Self {
        Self {
            timeline,
            next_value: 1,
            last_submitted: 0,
            primed: false,
        }
    }

    /// First-use handshake: signal a value and wait for it to land. Proves
    /// the fence round-trips before any frame depends on it.
    fn prime(&mut self) -> DeviceResult<()> {
        let value = self.next_value;
        self.timeline.signal(value)?;
        self.timeline.block_until(value)?;
        self.last_submitted = value;
        self.next_value = value + 1;
        self.primed = true;
        Ok(())
    }

    /// Block until all previously submitted work has retired.
    pub fn begin_frame(&mut self) -> DeviceResult<()> {
        if !self.primed {
            return self.prime();
        }
        self.timeline.block_until(self.last_submitted)
    }

    /// Reserve the fence value for the next submission.
    pub fn allocate(&mut self) -> u64 {
        let value = self.next_value;
        self.next_value = value + 1;
        value
    }

    /// Record that a batch signalling `value` was handed to the queue.
    pub fn note_submitted(&mut self, value: u64) {
        self.last_submitted = self.last_submitted.max(value);
    }

    /// Queue a trailing signal after all work submitted so far, so the next
    /// `begin_frame` stall covers it.
    pub fn signal_end(&mut self) -> DeviceResult<()> {
        let value = self.allocate();
        self.timeline.signal(value)?;
        self.note_submitted(value);
        Ok(())
    }

    /// Signal a fresh value and block until it retires: a full GPU drain.
    pub fn flush(&mut self) -> DeviceResult<()> {
        if !self.primed {
            return self.prime();
        }
        let value = self.allocate();
        self.timeline.signal(value)?;
        self.note_submitted(value);
        self.timeline.block_until(value)
    }

    pub fn last_submitted(&self) -> u64 {
        self.last_submitted
    }

    pub fn timeline(&self) -> &T {
        &self.timeline
    }
}

/// Drives the per-frame cycle: stall, record, submit, present, advance.
pub struct FrameController {
    device: Arc<RenderDevice>,
    clock: FrameClock<TimelineFence>,
    submit_queue: SubmitQueue,
    uploads: UploadPool,
    present_sync: Vec<PresentSync>,
    slot: usize,
    frame_index: u64,
    image_acquired: bool,
}

/// Binary semaphores for a frame's queue submission. Empty when no swapchain
/// image is in play, so a frame that never acquired one cannot stall the
/// queue on a semaphore nobody will signal.
fn wsi_semaphores(
    sync: &PresentSync,
    image_acquired: bool,
) -> (Vec<vk::Semaphore>, Vec<vk::Semaphore>) {
    if image_acquired {
        (vec![sync.image_available], vec![sync.render_finished])
    } else {
        (Vec::new(), Vec::new())
    }
}

impl FrameController {
    pub fn new(device: Arc<RenderDevice>, slot_count: usize) -> DeviceResult<Self> {
        let clock = FrameClock::new(TimelineFence::new(device.clone())?);
        let submit_queue = SubmitQueue::new(device.clone(), slot_count)?;
        let uploads = UploadPool::new(device.clone());

        let present_sync = (0..slot_count)
            .map(|_| PresentSync::new(&device))
            .collect::<DeviceResult<Vec<_>>>()?;

        Ok(Self {
            device,
            clock,
            submit_queue,
            uploads,
            present_sync,
            slot: 0,
            frame_index: 0,
            image_acquired: false,
        })
    }

    /// Stall until all prior GPU work retires, then open this slot's command
    /// buffer for recording.
    pub fn begin_frame(&mut self) -> DeviceResult<vk::CommandBuffer> {
        self.clock.begin_frame()?;
        self.submit_queue.begin(self.slot)
    }

    /// Acquire the next swapchain image, gated on this slot's semaphore.
    /// A successful acquire pairs this frame's `submit` with the presentation
    /// semaphores; without one, `submit` runs offscreen.
    pub fn acquire(&mut self, swapchain: &Swapchain) -> DeviceResult<AcquireOutcome> {
        let outcome = swapchain.acquire(self.present_sync[self.slot].image_available)?;
        if matches!(outcome, AcquireOutcome::Acquired { .. }) {
            self.image_acquired = true;
        }
        Ok(outcome)
    }

    /// Close and submit the frame's command buffer. Returns the timeline
    /// value the batch will signal.
    ///
    /// When `acquire` delivered an image this frame, the batch waits on
    /// `image_available` and signals `render_finished` for the present;
    /// otherwise (offscreen or compute-only frames) it carries no binary
    /// semaphores at all.
    pub fn submit(&mut self, cmd: vk::CommandBuffer) -> DeviceResult<u64> {
        self.submit_queue.end(cmd)?;

        let (waits, signals) = wsi_semaphores(&self.present_sync[self.slot], self.image_acquired);
        self.image_acquired = false;

        let value = self.clock.allocate();
        self.submit_queue
            .submit(cmd, &waits, &signals, self.clock.timeline(), value)?;
        self.clock.note_submitted(value);
        Ok(value)
    }

    /// Present the frame, advance to the next slot and queue the end-of-frame
    /// signal. Only valid after an acquire/submit pair that rendered to
    /// `image_index`. Returns true when the swapchain wants recreating.
    pub fn present(&mut self, swapchain: &Swapchain, image_index: u32) -> DeviceResult<bool> {
        let suboptimal = swapchain.present(
            self.device.graphics_queue,
            image_index,
            &[self.present_sync[self.slot].render_finished],
        )?;

        self.slot = (self.slot + 1) % self.present_sync.len();
        self.frame_index += 1;
        self.clock.signal_end()?;

        Ok(suboptimal)
    }

    /// Record copy commands outside the frame loop and block until they
    /// complete (mesh staging, one-off transfers).
    pub fn submit_blocking<F>(&mut self, record: F) -> DeviceResult<()>
    where
        F: FnOnce(vk::CommandBuffer) -> DeviceResult<()>,
    {
        let value = self.clock.allocate();
        self.submit_queue
            .submit_once(self.clock.timeline(), value, record)?;
        self.clock.note_submitted(value);
        Ok(())
    }

    /// Drain the GPU completely.
    pub fn flush(&mut self) -> DeviceResult<()> {
        self.clock.flush()
    }

    /// Drain the GPU, then release every staging buffer adopted since the
    /// last drain. This is the only point staging memory is reclaimed.
    pub fn drain_uploads(&mut self) -> DeviceResult<()> {
        self.flush()?;
        self.uploads.drain();
        Ok(())
    }

    pub fn uploads(&mut self) -> &mut UploadPool {
        &mut self.uploads
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn slot_count(&self) -> usize {
        self.present_sync.len()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

impl Drop for FrameController {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("Failed to drain GPU during frame controller teardown: {}", e);
        }
        self.uploads.drain();
        for sync in &self.present_sync {
            sync.destroy(&self.device.device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Simulated timeline: signals are queued, waits complete them.
    #[derive(Default)]
    struct MockTimeline {
        state: RefCell<MockState>,
    }

    #[derive(Default)]
    struct MockState {
        signaled: Vec<u64>,
        waited: Vec<u64>,
        completed: u64,
    }

    impl GpuTimeline for MockTimeline {
        fn signal(&self, value: u64) -> DeviceResult<()> {
            self.state.borrow_mut().signaled.push(value);
            Ok(())
        }

        fn completed_value(&self) -> DeviceResult<u64> {
            Ok(self.state.borrow().completed)
        }

        fn block_until(&self, value: u64) -> DeviceResult<()> {
            let mut state = self.state.borrow_mut();
            assert!(
                state.signaled.iter().any(|&v| v >= value),
                "wait on {} would hang: never signaled",
                value
            );
            state.waited.push(value);
            state.completed = state.completed.max(value);
            Ok(())
        }
    }

    #[test]
    fn first_begin_frame_runs_the_handshake() {
        let mut clock = FrameClock::new(MockTimeline::default());
        clock.begin_frame().unwrap();

        let state = clock.timeline().state.borrow();
        assert_eq!(state.signaled, vec![1]);
        assert_eq!(state.waited, vec![1]);
        assert_eq!(state.completed, 1);
    }

    #[test]
    fn fence_values_are_strictly_increasing() {
        let mut clock = FrameClock::new(MockTimeline::default());
        clock.begin_frame().unwrap();

        let a = clock.allocate();
        let b = clock.allocate();
        clock.signal_end().unwrap();
        let c = clock.allocate();
        assert!(a < b && b < c);
        // The handshake consumed value 1.
        assert_eq!(a, 2);
    }

    #[test]
    fn begin_frame_waits_on_the_latest_submission() {
        let mut clock = FrameClock::new(MockTimeline::default());
        clock.begin_frame().unwrap();

        for expected_wait in [2u64, 3, 4] {
            let value = clock.allocate();
            clock.timeline().signal(value).unwrap();
            clock.note_submitted(value);
            clock.begin_frame().unwrap();
            assert_eq!(*clock.timeline().state.borrow().waited.last().unwrap(), expected_wait);
        }
    }

    #[test]
    fn out_of_order_completion_notes_keep_the_maximum() {
        let mut clock = FrameClock::new(MockTimeline::default());
        clock.begin_frame().unwrap();

        let a = clock.allocate();
        let b = clock.allocate();
        clock.timeline().signal(a).unwrap();
        clock.timeline().signal(b).unwrap();
        clock.note_submitted(b);
        clock.note_submitted(a);
        assert_eq!(clock.last_submitted(), b);
    }

    #[test]
    fn flush_signals_then_waits_on_a_fresh_value() {
        let mut clock = FrameClock::new(MockTimeline::default());
        clock.begin_frame().unwrap();
        clock.flush().unwrap();

        let state = clock.timeline().state.borrow();
        assert_eq!(state.signaled, vec![1, 2]);
        assert_eq!(state.waited, vec![1, 2]);
    }

    #[test]
    fn offscreen_submissions_carry_no_wsi_semaphores() {
        use ash::vk::Handle;

        let sync = PresentSync {
            image_available: vk::Semaphore::from_raw(1),
            render_finished: vk::Semaphore::from_raw(2),
        };

        let (waits, signals) = wsi_semaphores(&sync, false);
        assert!(waits.is_empty());
        assert!(signals.is_empty());

        let (waits, signals) = wsi_semaphores(&sync, true);
        assert_eq!(waits, vec![sync.image_available]);
        assert_eq!(signals, vec![sync.render_finished]);
    }

    #[test]
    fn flush_before_any_frame_primes_first() {
        let mut clock = FrameClock::new(MockTimeline::default());
        clock.flush().unwrap();

        // The priming handshake already drains the (empty) queue.
        let state = clock.timeline().state.borrow();
        assert_eq!(state.signaled, vec![1]);
        assert_eq!(state.completed, 1);
    }
}
