// Swapchain and surface management.
//
// Manages the chain of images we render to and present to the screen.

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::sync::Arc;

use super::RenderDevice;
use crate::error::{DeviceError, DeviceResult};

/// Window surface plus its extension loader.
pub struct Surface {
    pub surface: vk::SurfaceKHR,
    pub loader: ash::khr::surface::Instance,
}

impl Surface {
    /// # Safety
    /// The window behind the handles must outlive the surface.
    pub unsafe fn new(
        device: &RenderDevice,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> DeviceResult<Self> {
        let surface = ash_window::create_surface(
            device.entry(),
            &device.instance,
            display_handle,
            window_handle,
            None,
        )?;
        let loader = ash::khr::surface::Instance::new(device.entry(), &device.instance);

        // The graphics queue must also be able to present to this surface.
        let supported = loader.get_physical_device_surface_support(
            device.physical_device,
            device.graphics_queue_family,
            surface,
        )?;
        if !supported {
            loader.destroy_surface(surface, None);
            return Err(DeviceError::SurfaceUnsupported);
        }

        Ok(Self { surface, loader })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// Result of acquiring a presentable image.
#[derive(Debug, Clone, Copy)]
pub enum AcquireOutcome {
    /// An image is ready; `suboptimal` asks for a recreate after this frame.
    Acquired { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface and must be recreated
    /// before any image can be acquired.
    OutOfDate,
}

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_loader: ash::khr::swapchain::Device,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    device: Arc<RenderDevice>,
}

impl Swapchain {
    pub fn new(
        device: Arc<RenderDevice>,
        surface: &Surface,
        width: u32,
        height: u32,
        preferred_present_mode: vk::PresentModeKHR,
    ) -> DeviceResult<Self> {
        log::info!("Creating swapchain: {}x{}", width, height);

        let surface_caps = unsafe {
            surface
                .loader
                .get_physical_device_surface_capabilities(device.physical_device, surface.surface)
        }?;

        let formats = unsafe {
            surface
                .loader
                .get_physical_device_surface_formats(device.physical_device, surface.surface)
        }?;

        let present_modes = unsafe {
            surface
                .loader
                .get_physical_device_surface_present_modes(device.physical_device, surface.surface)
        }?;

        // Choose surface format (prefer SRGB)
        let surface_format = formats
            .iter()
            .find(|f| {
                f.format == vk::Format::B8G8R8A8_SRGB
                    && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .or_else(|| formats.first())
            .ok_or(DeviceError::SurfaceUnsupported)?;

        // FIFO is the only mode the surface must support.
        let present_mode = present_modes
            .iter()
            .copied()
            .find(|&mode| mode == preferred_present_mode)
            .unwrap_or(vk::PresentModeKHR::FIFO);

        log::info!("Present mode: {:?}", present_mode);

        let extent = if surface_caps.current_extent.width != u32::MAX {
            surface_caps.current_extent
        } else {
            vk::Extent2D {
                width: width.clamp(
                    surface_caps.min_image_extent.width,
                    surface_caps.max_image_extent.width,
                ),
                height: height.clamp(
                    surface_caps.min_image_extent.height,
                    surface_caps.max_image_extent.height,
                ),
            }
        };

        // Choose image count (triple buffering for performance)
        let mut image_count = surface_caps.min_image_count + 1;
        if surface_caps.max_image_count > 0 && image_count > surface_caps.max_image_count {
            image_count = surface_caps.max_image_count;
        }

        let swapchain_loader =
            ash::khr::swapchain::Device::new(&device.instance, &device.device);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }?;

        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain) }?;

        log::info!("Created swapchain with {} images", images.len());

        let image_views: DeviceResult<Vec<_>> = images
            .iter()
            .map(|&image| {
                let create_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                let view = unsafe { device.device.create_image_view(&create_info, None) }?;
                Ok(view)
            })
            .collect();

        Ok(Self {
            swapchain,
            swapchain_loader,
            images,
            image_views: image_views?,
            format: surface_format.format,
            extent,
            device,
        })
    }

    /// Acquire the next image for rendering. An out-of-date swapchain is a
    /// normal resize-time outcome, not an error.
    pub fn acquire(&self, semaphore: vk::Semaphore) -> DeviceResult<AcquireOutcome> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    /// Present a rendered image. Returns true when the swapchain should be
    /// recreated.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> DeviceResult<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader.queue_present(queue, &present_info) };

        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height.max(1) as f32
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.device.destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
