// Error taxonomy for the device layer
//
// Every failed native call surfaces as a DeviceError. These are fatal to the
// session: retrying a GPU operation without re-establishing device state is
// unsafe, so nothing in this crate retries.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("failed to load the vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("gpu memory allocation failed: {0}")]
    Allocation(#[from] gpu_allocator::AllocationError),

    #[error("no vulkan-capable gpu satisfies the requirements")]
    NoSuitableGpu,

    #[error("surface is not presentable from the selected queue family")]
    SurfaceUnsupported,

    #[error("allocator already shut down")]
    AllocatorShutDown,

    #[error("write of {len} bytes at offset {offset} exceeds buffer of {size} bytes")]
    WriteOutOfBounds {
        offset: usize,
        len: usize,
        size: u64,
    },

    #[error("unsupported texture format {0:?}")]
    UnsupportedFormat(vk::Format),

    #[error("texture pixel data is {actual} bytes, expected {expected}")]
    TexturePixels { expected: u64, actual: usize },

    #[error("failed to read shader {path}: {source}")]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type DeviceResult<T> = Result<T, DeviceError>;
