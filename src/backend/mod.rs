// Backend module - GPU abstraction layer
//
// Thin wrapper around ash with safety and ergonomics. Frame pacing runs on a
// single timeline fence; everything else hangs off the device.

pub mod buffer;
pub mod descriptor;
pub mod device;
pub mod frame;
pub mod mesh;
pub mod pipeline;
pub mod shader;
pub mod submit;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod upload;

pub use buffer::{ConstantBuffer, DepthBuffer, GpuBuffer};
pub use descriptor::DescriptorArena;
pub use device::RenderDevice;
pub use frame::{FrameClock, FrameController};
pub use mesh::Mesh;
pub use pipeline::{GraphicsPassDesc, Pass};
pub use shader::ShaderCache;
pub use submit::SubmitQueue;
pub use swapchain::{AcquireOutcome, Surface, Swapchain};
pub use sync::{GpuTimeline, PresentSync, TimelineFence};
pub use texture::{Texture, TextureCache, TextureData};
pub use upload::{TransientPool, UploadPool};
