// vkut - helper layer for writing small Vulkan applications.
//
// The crate bootstraps a window and a GPU device, paces frames with a single
// timeline fence, and carries the usual sample-app toolbox: mesh generators,
// a step timer, a fly camera and input plumbing.

pub mod backend;
pub mod camera;
pub mod config;
pub mod error;
pub mod input;
pub mod mesh;
pub mod timer;
pub mod window;

pub use backend::{FrameController, RenderDevice, Swapchain};
pub use camera::FirstPersonCamera;
pub use config::Config;
pub use error::{DeviceError, DeviceResult};
pub use input::{CameraInput, InputState};
pub use mesh::{MeshData, Vertex};
pub use timer::StepTimer;
pub use window::{run, AppHooks, GraphicsContext};

/// Initialize env_logger with an info default. Call once, before `run`.
pub fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::from_default_env();
    builder.filter_level(LevelFilter::Info);
    let _ = builder.try_init();
}
