// Core GPU interface.
//
// Responsibilities:
// - Instance creation with validation layers
// - Physical device selection (prefer discrete GPU, require timeline semaphores)
// - Logical device + queue creation
// - Memory allocator setup

use ash::{vk, Entry};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};
use std::sync::Arc;

use crate::error::{DeviceError, DeviceResult};

/// GPU device wrapper with automatic cleanup.
///
/// Owns the instance, logical device, graphics queue and memory allocator.
/// Everything that records or submits work borrows this through an `Arc`.
pub struct RenderDevice {
    // Vulkan handles (order matters for drop!)
    allocator: Mutex<Option<Allocator>>,
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub instance: ash::Instance,
    entry: Entry,

    // Queue handles
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    // Debug utils (if validation enabled)
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,

    // Device properties (cached for performance)
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl RenderDevice {
    /// Create the GPU device.
    ///
    /// `display_handle` supplies the platform surface extensions; pass `None`
    /// for headless use (compute, tests against a null WSI).
    pub fn new(
        app_name: &str,
        enable_validation: bool,
        display_handle: Option<RawDisplayHandle>,
    ) -> DeviceResult<Arc<Self>> {
        log::info!("Creating GPU device: {}", app_name);

        let entry = unsafe { Entry::load() }?;

        let instance = Self::create_instance(&entry, app_name, enable_validation, display_handle)?;

        let debug_utils = if enable_validation {
            Some(Self::setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        let (physical_device, graphics_queue_family) = Self::pick_physical_device(&instance)?;

        let (device, graphics_queue) =
            Self::create_logical_device(&instance, physical_device, graphics_queue_family)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        Ok(Arc::new(Self {
            allocator: Mutex::new(Some(allocator)),
            device,
            physical_device,
            instance,
            entry,
            graphics_queue,
            graphics_queue_family,
            debug_utils,
            properties,
            memory_properties,
        }))
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        enable_validation: bool,
        display_handle: Option<RawDisplayHandle>,
    ) -> DeviceResult<ash::Instance> {
        let app_name_cstr = CString::new(app_name).unwrap_or_default();
        let engine_name = CString::new("vkut").unwrap_or_default();

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let mut extensions = vec![ash::ext::debug_utils::NAME.as_ptr()];

        // Platform surface extensions come from the windowing layer, so this
        // stays portable across window systems.
        if let Some(display) = display_handle {
            extensions.extend_from_slice(ash_window::enumerate_required_extensions(display)?);
        }

        let layer_names = if enable_validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }?;

        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> DeviceResult<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }?;

        Ok((debug_utils, messenger))
    }

    fn pick_physical_device(instance: &ash::Instance) -> DeviceResult<(vk::PhysicalDevice, u32)> {
        let devices = unsafe { instance.enumerate_physical_devices() }?;

        if devices.is_empty() {
            return Err(DeviceError::NoSuitableGpu);
        }

        let mut best_device = None;
        let mut best_score = 0;

        for device in devices {
            let props = unsafe { instance.get_physical_device_properties(device) };

            if !Self::check_device_features(instance, device) {
                continue;
            }

            let queue_families =
                unsafe { instance.get_physical_device_queue_family_properties(device) };

            let graphics_family = queue_families
                .iter()
                .enumerate()
                .find(|(_, props)| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|(i, _)| i as u32);

            if let Some(graphics_family) = graphics_family {
                // Score device (prefer discrete GPU)
                let score = match props.device_type {
                    vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
                    vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
                    _ => 1,
                };

                if score > best_score {
                    best_score = score;
                    best_device = Some((device, graphics_family));
                }
            }
        }

        best_device.ok_or(DeviceError::NoSuitableGpu)
    }

    /// All frame pacing is built on timeline semaphores, so a device without
    /// them is unusable here.
    fn check_device_features(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
        let mut vulkan12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut features = vk::PhysicalDeviceFeatures2::default().push_next(&mut vulkan12);
        unsafe { instance.get_physical_device_features2(device, &mut features) };

        vulkan12.timeline_semaphore == vk::TRUE
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: u32,
    ) -> DeviceResult<(ash::Device, vk::Queue)> {
        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(graphics_queue_family)
            .queue_priorities(&queue_priorities);

        let extensions = vec![ash::khr::swapchain::NAME.as_ptr()];

        let mut vulkan12 = vk::PhysicalDeviceVulkan12Features::default()
            .timeline_semaphore(true);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions)
            .push_next(&mut vulkan12);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };

        Ok((device, graphics_queue))
    }

    pub(crate) fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Allocate GPU memory through the device allocator.
    pub fn allocate(&self, desc: &AllocationCreateDesc) -> DeviceResult<Allocation> {
        let mut guard = self.allocator.lock();
        let allocator = guard.as_mut().ok_or(DeviceError::AllocatorShutDown)?;
        Ok(allocator.allocate(desc)?)
    }

    /// Return an allocation to the device allocator.
    pub fn free(&self, allocation: Allocation) {
        let mut guard = self.allocator.lock();
        if let Some(allocator) = guard.as_mut() {
            if let Err(e) = allocator.free(allocation) {
                log::error!("Failed to free GPU allocation: {}", e);
            }
        }
    }

    /// Wait for the device to be idle (e.g. before cleanup).
    pub fn wait_idle(&self) -> DeviceResult<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }

    /// Alignment for per-frame slices of a uniform buffer.
    pub fn uniform_buffer_alignment(&self) -> u64 {
        self.properties.limits.min_uniform_buffer_offset_alignment
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        log::info!("Destroying GPU device...");

        let _ = self.wait_idle();

        // The allocator holds a clone of the device and must go first.
        drop(self.allocator.lock().take());

        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
