// Descriptor pool and set-layout ownership.
//
// The arena is the single owner of the pool and every layout created through
// it. Allocated sets are plain handles whose storage dies with the pool, so
// nothing else in the crate tracks descriptor lifetime.

use ash::vk;
use std::sync::Arc;

use super::RenderDevice;
use crate::error::DeviceResult;

pub struct DescriptorArena {
    device: Arc<RenderDevice>,
    pool: vk::DescriptorPool,
    layouts: Vec<vk::DescriptorSetLayout>,
}

impl DescriptorArena {
    pub fn new(
        device: Arc<RenderDevice>,
        max_sets: u32,
        sizes: &[(vk::DescriptorType, u32)],
    ) -> DeviceResult<Self> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .map(|&(ty, descriptor_count)| vk::DescriptorPoolSize {
                ty,
                descriptor_count,
            })
            .collect();

        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.device.create_descriptor_pool(&pool_info, None) }?;

        Ok(Self {
            device,
            pool,
            layouts: Vec::new(),
        })
    }

    /// Create a set layout owned by this arena.
    pub fn create_layout(
        &mut self,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> DeviceResult<vk::DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let layout = unsafe {
            self.device
                .device
                .create_descriptor_set_layout(&layout_info, None)
        }?;
        self.layouts.push(layout);
        Ok(layout)
    }

    /// Allocate one set per entry in `layouts`. The returned handles stay
    /// valid for the arena's lifetime and need no individual release.
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> DeviceResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        let sets = unsafe { self.device.device.allocate_descriptor_sets(&alloc_info) }?;
        Ok(sets)
    }

    /// Point `binding` of `set` at a uniform buffer range.
    pub fn write_uniform_buffer(
        &self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) {
        let buffer_info = vk::DescriptorBufferInfo {
            buffer,
            offset,
            range,
        };

        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(std::slice::from_ref(&buffer_info));

        unsafe { self.device.device.update_descriptor_sets(&[write], &[]) };
    }

    /// Point `binding` of `set` at a storage buffer range.
    pub fn write_storage_buffer(
        &self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) {
        let buffer_info = vk::DescriptorBufferInfo {
            buffer,
            offset,
            range,
        };

        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
            .buffer_info(std::slice::from_ref(&buffer_info));

        unsafe { self.device.device.update_descriptor_sets(&[write], &[]) };
    }

    /// Point `binding` of `set` at a sampled texture. The view must be in
    /// shader-read layout when the set is used.
    pub fn write_combined_image_sampler(
        &self,
        set: vk::DescriptorSet,
        binding: u32,
        view: vk::ImageView,
        sampler: vk::Sampler,
    ) {
        let image_info = vk::DescriptorImageInfo {
            sampler,
            image_view: view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };

        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(std::slice::from_ref(&image_info));

        unsafe { self.device.device.update_descriptor_sets(&[write], &[]) };
    }
}

impl Drop for DescriptorArena {
    fn drop(&mut self) {
        unsafe {
            for &layout in &self.layouts {
                self.device
                    .device
                    .destroy_descriptor_set_layout(layout, None);
            }
            // Frees every set allocated from it.
            self.device.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}
