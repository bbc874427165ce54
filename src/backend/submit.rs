// Command recording and submission.
//
// One reusable primary command buffer per frame slot. A submit both chains
// the presentation semaphores and pushes the frame's timeline value, so the
// fence observes exactly the work recorded this frame.

use ash::vk;
use std::sync::Arc;

use super::sync::{GpuTimeline, TimelineFence};
use super::RenderDevice;
use crate::error::DeviceResult;

pub struct SubmitQueue {
    device: Arc<RenderDevice>,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
}

impl SubmitQueue {
    pub fn new(device: Arc<RenderDevice>, slot_count: usize) -> DeviceResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(device.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let command_pool = unsafe { device.device.create_command_pool(&pool_info, None) }?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(slot_count as u32);

        let command_buffers = unsafe { device.device.allocate_command_buffers(&alloc_info) }?;

        Ok(Self {
            device,
            command_pool,
            command_buffers,
        })
    }

    /// Reset and begin this slot's command buffer.
    ///
    /// The caller must have blocked until the previous use of this slot
    /// completed; the frame controller's begin-frame stall guarantees that.
    pub fn begin(&self, slot: usize) -> DeviceResult<vk::CommandBuffer> {
        let cmd = self.command_buffers[slot];

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            self.device.device.begin_command_buffer(cmd, &begin_info)?;
        }
        Ok(cmd)
    }

    pub fn end(&self, cmd: vk::CommandBuffer) -> DeviceResult<()> {
        unsafe { self.device.device.end_command_buffer(cmd) }?;
        Ok(())
    }

    /// Submit a finished command buffer.
    ///
    /// Waits on `wait_binary` at color-attachment output, signals
    /// `signal_binary` for presentation, and signals the timeline fence with
    /// `timeline_value` once the batch retires.
    pub fn submit(
        &self,
        cmd: vk::CommandBuffer,
        wait_binary: &[vk::Semaphore],
        signal_binary: &[vk::Semaphore],
        fence: &TimelineFence,
        timeline_value: u64,
    ) -> DeviceResult<()> {
        let wait_stages: Vec<vk::PipelineStageFlags> = wait_binary
            .iter()
            .map(|_| vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .collect();

        let mut signal_semaphores: Vec<vk::Semaphore> = signal_binary.to_vec();
        signal_semaphores.push(fence.raw());

        // Binary semaphores ignore their slot in the value arrays; only the
        // trailing timeline entry carries meaning.
        let wait_values: Vec<u64> = wait_binary.iter().map(|_| 0).collect();
        let mut signal_values: Vec<u64> = signal_binary.iter().map(|_| 0).collect();
        signal_values.push(timeline_value);

        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default()
            .wait_semaphore_values(&wait_values)
            .signal_semaphore_values(&signal_values);

        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(wait_binary)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
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

    /// Record and submit a one-shot command buffer outside the frame loop,
    /// signalling the timeline with `timeline_value` on completion.
    pub fn submit_once<F>(
        &self,
        fence: &TimelineFence,
        timeline_value: u64,
        record: F,
    ) -> DeviceResult<()>
    where
        F: FnOnce(vk::CommandBuffer) -> DeviceResult<()>,
    {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let cmd = unsafe { self.device.device.allocate_command_buffers(&alloc_info) }?[0];

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        let result = (|| {
            unsafe { self.device.device.begin_command_buffer(cmd, &begin_info) }?;
            record(cmd)?;
            unsafe { self.device.device.end_command_buffer(cmd) }?;
            self.submit(cmd, &[], &[], fence, timeline_value)?;
            fence.block_until(timeline_value)
        })();

        unsafe {
            self.device
                .device
                .free_command_buffers(self.command_pool, &[cmd]);
        }
        result
    }
}

impl Drop for SubmitQueue {
    fn drop(&mut self) {
        unsafe {
            // Frees the per-slot buffers with it.
            self.device
                .device
                .destroy_command_pool(self.command_pool, None);
        }
    }
}
