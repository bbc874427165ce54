// Synchronization primitives.
//
// A monotonically increasing timeline fence carries all CPU-GPU frame pacing.
// Binary semaphores remain only where presentation requires them, since the
// presentation engine cannot wait on or signal timeline values.

use ash::vk;
use std::sync::Arc;

use super::RenderDevice;
use crate::error::DeviceResult;

/// A monotonically increasing GPU progress counter.
///
/// The frame clock is written against this trait so its scheduling logic can
/// be exercised without a GPU.
pub trait GpuTimeline {
    /// Enqueue a signal of `value` after all previously submitted work.
    fn signal(&self, value: u64) -> DeviceResult<()>;

    /// The highest value the GPU has completed.
    fn completed_value(&self) -> DeviceResult<u64>;

    /// Block the calling thread until the counter reaches `value`.
    fn block_until(&self, value: u64) -> DeviceResult<()>;
}

/// Timeline-semaphore fence on the graphics queue.
pub struct TimelineFence {
    device: Arc<RenderDevice>,
    semaphore: vk::Semaphore,
}

impl TimelineFence {
    pub fn new(device: Arc<RenderDevice>) -> DeviceResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe { device.device.create_semaphore(&create_info, None) }?;

        Ok(Self { device, semaphore })
    }

    pub fn raw(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl GpuTimeline for TimelineFence {
    /// Signals from the queue, not the host, so the signal lands after all
    /// work submitted so far.
    fn signal(&self, value: u64) -> DeviceResult<()> {
        let signal_values = [value];
        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default()
            .signal_semaphore_values(&signal_values);

        let signal_semaphores = [self.semaphore];
        let submit_info = vk::SubmitInfo::default()
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info],
                vk::Fence::null(),
            )
        }?;
        Ok(())
    }

    fn completed_value(&self) -> DeviceResult<u64> {
        let value = unsafe { self.device.device.get_semaphore_counter_value(self.semaphore) }?;
        Ok(value)
    }

    fn block_until(&self, value: u64) -> DeviceResult<()> {
        if self.completed_value()? >= value {
            return Ok(());
        }

        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        unsafe { self.device.device.wait_semaphores(&wait_info, u64::MAX) }?;
        Ok(())
    }
}

impl Drop for TimelineFence {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Per-slot binary semaphores for the presentation handshake.
///
/// One pair per frame slot: `image_available` gates rendering on the
/// acquired image, `render_finished` gates the present on rendering.
pub struct PresentSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
}

impl PresentSync {
    pub fn new(device: &Arc<RenderDevice>) -> DeviceResult<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();

        unsafe {
            Ok(Self {
                image_available: device.device.create_semaphore(&semaphore_info, None)?,
                render_finished: device.device.create_semaphore(&semaphore_info, None)?,
            })
        }
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
        }
    }
}
