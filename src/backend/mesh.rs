// Device-local mesh buffers.
//
// CPU mesh data is staged through the upload pool and copied into
// device-local vertex/index buffers before first use.

use ash::vk;
use gpu_allocator::MemoryLocation;

use super::buffer::{self, GpuBuffer};
use super::frame::FrameController;
use super::RenderDevice;
use crate::error::DeviceResult;
use crate::mesh::MeshData;

pub struct Mesh {
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    index_count: u32,
}

impl Mesh {
    /// Upload `data` into device-local buffers, blocking until the copy
    /// completes. The staging buffers live in the upload pool until its next
    /// drain.
    pub fn upload(
        device: &RenderDevice,
        frame: &mut FrameController,
        name: &str,
        data: &MeshData,
    ) -> DeviceResult<Self> {
        let vertex_buffer = staged_buffer(
            device,
            frame,
            name,
            data.vertex_bytes(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = staged_buffer(
            device,
            frame,
            name,
            data.index_bytes(),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: data.index_count(),
        })
    }

    /// Upload raw position-only vertices (screen-space quads and the like).
    pub fn upload_raw(
        device: &RenderDevice,
        frame: &mut FrameController,
        name: &str,
        vertex_bytes: &[u8],
        indices: &[u32],
    ) -> DeviceResult<Self> {
        let vertex_buffer = staged_buffer(
            device,
            frame,
            name,
            vertex_bytes,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = staged_buffer(
            device,
            frame,
            name,
            bytemuck::cast_slice(indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }

    pub fn bind(&self, device: &RenderDevice, cmd: vk::CommandBuffer) {
        unsafe {
            device
                .device
                .cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
            device.device.cmd_bind_index_buffer(
                cmd,
                self.index_buffer.buffer,
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    pub fn draw(&self, device: &RenderDevice, cmd: vk::CommandBuffer) {
        self.draw_instanced(device, cmd, 1);
    }

    pub fn draw_instanced(&self, device: &RenderDevice, cmd: vk::CommandBuffer, instances: u32) {
        unsafe {
            device
                .device
                .cmd_draw_indexed(cmd, self.index_count, instances, 0, 0, 0);
        }
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn destroy(self, device: &RenderDevice) {
        self.vertex_buffer.destroy(device);
        self.index_buffer.destroy(device);
    }
}

/// Create a device-local buffer and fill it from a pooled staging copy.
fn staged_buffer(
    device: &RenderDevice,
    frame: &mut FrameController,
    name: &str,
    data: &[u8],
    usage: vk::BufferUsageFlags,
) -> DeviceResult<GpuBuffer> {
    let dst = buffer::create_buffer(
        device,
        name,
        data.len() as vk::DeviceSize,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        MemoryLocation::GpuOnly,
    )?;

    let staging = frame.uploads().acquire(name, data)?;
    let size = data.len() as vk::DeviceSize;
    let dst_buffer = dst.buffer;

    let dst_access = if usage.contains(vk::BufferUsageFlags::INDEX_BUFFER) {
        vk::AccessFlags::INDEX_READ
    } else {
        vk::AccessFlags::VERTEX_ATTRIBUTE_READ
    };

    frame.submit_blocking(|cmd| {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        let barrier = vk::BufferMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(dst_buffer)
            .offset(0)
            .size(size);

        unsafe {
            device
                .device
                .cmd_copy_buffer(cmd, staging, dst_buffer, &[region]);
            device.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::VERTEX_INPUT,
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );
        }
        Ok(())
    })?;

    Ok(dst)
}
