// Buffer utilities for vertex, index, uniform and staging buffers.
//
// All memory comes from the device allocator; buffers own their allocation
// and hand it back on destroy.

use ash::vk;
use bytemuck::Pod;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::marker::PhantomData;

use super::RenderDevice;
use crate::error::{DeviceError, DeviceResult};

/// A buffer plus the allocation backing it.
pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    allocation: Option<Allocation>,
    pub size: vk::DeviceSize,
}

impl GpuBuffer {
    /// Write bytes into a host-visible buffer at `offset`. Writes that do not
    /// fit the buffer fail instead of touching adjacent mapped memory.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> DeviceResult<()> {
        let end = offset as vk::DeviceSize + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(DeviceError::WriteOutOfBounds {
                offset,
                len: data.len(),
                size: self.size,
            });
        }

        let mapped = self
            .allocation
            .as_mut()
            .and_then(|a| a.mapped_slice_mut())
            .ok_or(DeviceError::Vulkan(vk::Result::ERROR_MEMORY_MAP_FAILED))?;
        mapped[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn destroy(mut self, device: &RenderDevice) {
        unsafe {
            device.device.destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take() {
            device.free(allocation);
        }
    }
}

pub fn create_buffer(
    device: &RenderDevice,
    name: &str,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    location: MemoryLocation,
) -> DeviceResult<GpuBuffer> {
    let buffer_info = vk::BufferCreateInfo::default()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe { device.device.create_buffer(&buffer_info, None) }?;
    let requirements = unsafe { device.device.get_buffer_memory_requirements(buffer) };

    let allocation = device.allocate(&AllocationCreateDesc {
        name,
        requirements,
        location,
        linear: true,
        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
    })?;

    unsafe {
        device
            .device
            .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
    }?;

    Ok(GpuBuffer {
        buffer,
        allocation: Some(allocation),
        size,
    })
}

/// Create a host-visible buffer and fill it with `data`.
pub fn create_buffer_with_data(
    device: &RenderDevice,
    name: &str,
    usage: vk::BufferUsageFlags,
    data: &[u8],
) -> DeviceResult<GpuBuffer> {
    let mut buffer = create_buffer(
        device,
        name,
        data.len() as vk::DeviceSize,
        usage,
        MemoryLocation::CpuToGpu,
    )?;
    buffer.write(0, data)?;
    Ok(buffer)
}

/// Depth attachment image, its memory and view.
pub struct DepthBuffer {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    allocation: Option<Allocation>,
}

impl DepthBuffer {
    pub fn new(device: &RenderDevice, extent: vk::Extent2D) -> DeviceResult<Self> {
        let format = vk::Format::D32_SFLOAT;

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe { device.device.create_image(&image_info, None) }?;
        let requirements = unsafe { device.device.get_image_memory_requirements(image) };

        let allocation = device.allocate(&AllocationCreateDesc {
            name: "depth buffer",
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        unsafe {
            device
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        }?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::DEPTH,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { device.device.create_image_view(&view_info, None) }?;

        Ok(Self {
            image,
            view,
            format,
            allocation: Some(allocation),
        })
    }

    pub fn destroy(mut self, device: &RenderDevice) {
        unsafe {
            device.device.destroy_image_view(self.view, None);
            device.device.destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            device.free(allocation);
        }
    }
}

/// Per-frame uniform buffer: one persistently mapped allocation holding a
/// zero-initialized, alignment-padded copy of `T` per frame slot.
pub struct ConstantBuffer<T: Pod> {
    buffer: GpuBuffer,
    aligned_stride: vk::DeviceSize,
    slot_count: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> ConstantBuffer<T> {
    pub fn new(device: &RenderDevice, name: &str, slot_count: usize) -> DeviceResult<Self> {
        let alignment = device.uniform_buffer_alignment();
        let aligned_stride = align_up(std::mem::size_of::<T>() as vk::DeviceSize, alignment);

        let mut buffer = create_buffer(
            device,
            name,
            aligned_stride * slot_count as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::CpuToGpu,
        )?;
        let zeroes = vec![0u8; (aligned_stride * slot_count as vk::DeviceSize) as usize];
        buffer.write(0, &zeroes)?;

        Ok(Self {
            buffer,
            aligned_stride,
            slot_count,
            _marker: PhantomData,
        })
    }

    /// Write this frame's constants. `slot` must be the current frame slot so
    /// in-flight frames never see the write.
    pub fn write(&mut self, slot: usize, value: &T) -> DeviceResult<()> {
        debug_assert!(slot < self.slot_count);
        let offset = self.aligned_stride as usize * slot;
        self.buffer.write(offset, bytemuck::bytes_of(value))
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.buffer.buffer
    }

    /// Byte offset of `slot`, for descriptor writes or dynamic offsets.
    pub fn offset(&self, slot: usize) -> vk::DeviceSize {
        self.aligned_stride * slot as vk::DeviceSize
    }

    pub fn slot_size(&self) -> vk::DeviceSize {
        self.aligned_stride
    }

    pub fn destroy(self, device: &RenderDevice) {
        self.buffer.destroy(device);
    }
}

pub(crate) fn align_up(value: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_alignment() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 64), 320);
    }

    #[test]
    fn write_past_the_end_is_an_error() {
        let mut buffer = GpuBuffer {
            buffer: vk::Buffer::null(),
            allocation: None,
            size: 16,
        };

        let err = buffer.write(8, &[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::WriteOutOfBounds {
                offset: 8,
                len: 16,
                size: 16,
            }
        ));

        let err = buffer.write(17, &[]).unwrap_err();
        assert!(matches!(err, DeviceError::WriteOutOfBounds { .. }));
    }
}
