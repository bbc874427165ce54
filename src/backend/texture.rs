// Sampled textures.
//
// Decoding image files is the caller's concern; this module takes raw
// pixels plus dimensions, stages them through the upload pool into a
// device-local image, and transitions it for shader reads. A path-keyed
// cache deduplicates repeat loads, the same shape as the shader cache.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::frame::FrameController;
use super::RenderDevice;
use crate::error::{DeviceError, DeviceResult};

/// Decoded pixels ready for upload, tightly packed rows.
pub struct TextureData {
    pub pixels: Vec<u8>,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
}

impl TextureData {
    /// The common decoder output: 8-bit RGBA.
    pub fn rgba8(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            extent: vk::Extent2D { width, height },
            format: vk::Format::R8G8B8A8_UNORM,
        }
    }
}

/// Bytes per texel for the formats uploads accept.
fn texel_size(format: vk::Format) -> Option<vk::DeviceSize> {
    match format {
        vk::Format::R8_UNORM => Some(1),
        vk::Format::R8G8_UNORM => Some(2),
        vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SRGB
        | vk::Format::B8G8R8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB => Some(4),
        vk::Format::R16G16B16A16_SFLOAT => Some(8),
        vk::Format::R32G32B32A32_SFLOAT => Some(16),
        _ => None,
    }
}

/// Reject pixel slices that do not cover the image exactly.
fn check_pixel_data(data: &TextureData) -> DeviceResult<()> {
    let texel = texel_size(data.format).ok_or(DeviceError::UnsupportedFormat(data.format))?;
    let expected =
        vk::DeviceSize::from(data.extent.width) * vk::DeviceSize::from(data.extent.height) * texel;
    if data.pixels.len() as vk::DeviceSize != expected {
        return Err(DeviceError::TexturePixels {
            expected,
            actual: data.pixels.len(),
        });
    }
    Ok(())
}

/// Device-local sampled image with its view and memory.
pub struct Texture {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    allocation: Option<Allocation>,
}

impl Texture {
    /// Upload `data` into a device-local sampled image, blocking until the
    /// copy and layout transition complete. The staging buffer lives in the
    /// upload pool until its next drain.
    pub fn upload(
        device: &RenderDevice,
        frame: &mut FrameController,
        name: &str,
        data: &TextureData,
    ) -> DeviceResult<Self> {
        check_pixel_data(data)?;

        let extent = data.extent;
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(data.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe { device.device.create_image(&image_info, None) }?;
        let requirements = unsafe { device.device.get_image_memory_requirements(image) };

        let allocation = device.allocate(&AllocationCreateDesc {
            name,
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

        let staging = frame.uploads().acquire(name, &data.pixels)?;

        frame.submit_blocking(|cmd| {
            let range = vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            };

            let to_transfer = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(range);

            let region = vk::BufferImageCopy {
                buffer_offset: 0,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D::default(),
                image_extent: vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                },
            };

            let to_sampled = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(range);

            unsafe {
                device.device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_transfer],
                );
                device.device.cmd_copy_buffer_to_image(
                    cmd,
                    staging,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
                device.device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_sampled],
                );
            }
            Ok(())
        })?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(data.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { device.device.create_image_view(&view_info, None) }?;

        Ok(Self {
            image,
            view,
            format: data.format,
            extent,
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

/// Linear-filtered repeat sampler, the common case for mesh textures.
pub fn create_sampler(device: &RenderDevice) -> DeviceResult<vk::Sampler> {
    let sampler_info = vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .max_lod(vk::LOD_CLAMP_NONE);

    let sampler = unsafe { device.device.create_sampler(&sampler_info, None) }?;
    Ok(sampler)
}

/// Path-keyed cache of uploaded textures. The decode closure runs only on a
/// cache miss; repeat loads of the same path return the existing texture.
pub struct TextureCache {
    device: Arc<RenderDevice>,
    textures: HashMap<PathBuf, Texture>,
}

impl TextureCache {
    pub fn new(device: Arc<RenderDevice>) -> Self {
        Self {
            device,
            textures: HashMap::new(),
        }
    }

    /// Look up `path`, decoding and uploading it on a miss.
    pub fn load<P, F>(
        &mut self,
        frame: &mut FrameController,
        path: P,
        decode: F,
    ) -> DeviceResult<&Texture>
    where
        P: AsRef<Path>,
        F: FnOnce() -> DeviceResult<TextureData>,
    {
        let path = path.as_ref();
        if !self.textures.contains_key(path) {
            let data = decode()?;
            let name = path.to_string_lossy();
            let texture = Texture::upload(&self.device, frame, &name, &data)?;
            log::debug!(
                "Loaded texture {:?} ({}x{})",
                path,
                texture.extent.width,
                texture.extent.height
            );
            self.textures.insert(path.to_path_buf(), texture);
        }
        Ok(&self.textures[path])
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<&Texture> {
        self.textures.get(path.as_ref())
    }

    pub fn loaded_count(&self) -> usize {
        self.textures.len()
    }
}

impl Drop for TextureCache {
    fn drop(&mut self) {
        let device = self.device.clone();
        for (_, texture) in self.textures.drain() {
            texture.destroy(&device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texel_sizes_match_the_supported_formats() {
        assert_eq!(texel_size(vk::Format::R8_UNORM), Some(1));
        assert_eq!(texel_size(vk::Format::R8G8B8A8_UNORM), Some(4));
        assert_eq!(texel_size(vk::Format::B8G8R8A8_SRGB), Some(4));
        assert_eq!(texel_size(vk::Format::R16G16B16A16_SFLOAT), Some(8));
        // Depth and block-compressed formats are not upload targets.
        assert_eq!(texel_size(vk::Format::D32_SFLOAT), None);
        assert_eq!(texel_size(vk::Format::BC1_RGB_UNORM_BLOCK), None);
    }

    #[test]
    fn pixel_data_must_cover_the_image() {
        let good = TextureData::rgba8(vec![0u8; 4 * 4 * 4], 4, 4);
        assert!(check_pixel_data(&good).is_ok());

        let short = TextureData::rgba8(vec![0u8; 4 * 4 * 3], 4, 4);
        assert!(matches!(
            check_pixel_data(&short).unwrap_err(),
            DeviceError::TexturePixels {
                expected: 64,
                actual: 48,
            }
        ));
    }

    #[test]
    fn unsupported_formats_are_rejected() {
        let data = TextureData {
            pixels: vec![0u8; 16],
            extent: vk::Extent2D {
                width: 2,
                height: 2,
            },
            format: vk::Format::BC7_UNORM_BLOCK,
        };
        assert!(matches!(
            check_pixel_data(&data).unwrap_err(),
            DeviceError::UnsupportedFormat(_)
        ));
    }
}
