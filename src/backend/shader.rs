// Shader module loading and caching.
//
// Shaders are SPIR-V bytecode. Modules loaded from disk are cached by path,
// so repeated pipeline builds against the same file reuse one module.

use ash::util::read_spv;
use ash::vk;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::RenderDevice;
use crate::error::{DeviceError, DeviceResult};

/// Create a shader module from SPIR-V words.
pub fn create_shader_module(device: &RenderDevice, code: &[u32]) -> DeviceResult<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(code);
    let module = unsafe { device.device.create_shader_module(&create_info, None) }?;
    Ok(module)
}

/// Path-keyed cache of loaded shader modules.
pub struct ShaderCache {
    device: Arc<RenderDevice>,
    modules: HashMap<PathBuf, vk::ShaderModule>,
}

impl ShaderCache {
    pub fn new(device: Arc<RenderDevice>) -> Self {
        Self {
            device,
            modules: HashMap::new(),
        }
    }

    /// Load a SPIR-V file, reusing the module if this path was seen before.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> DeviceResult<vk::ShaderModule> {
        let path = path.as_ref();
        if let Some(&module) = self.modules.get(path) {
            return Ok(module);
        }

        let mut file = File::open(path).map_err(|source| DeviceError::ShaderIo {
            path: path.to_path_buf(),
            source,
        })?;
        let code = read_spv(&mut file).map_err(|source| DeviceError::ShaderIo {
            path: path.to_path_buf(),
            source,
        })?;

        let module = create_shader_module(&self.device, &code)?;
        log::debug!("Loaded shader {:?}", path);
        self.modules.insert(path.to_path_buf(), module);
        Ok(module)
    }

    pub fn loaded_count(&self) -> usize {
        self.modules.len()
    }
}

impl Drop for ShaderCache {
    fn drop(&mut self) {
        for (_, module) in self.modules.drain() {
            unsafe {
                self.device.device.destroy_shader_module(module, None);
            }
        }
    }
}

/// Parse raw SPIR-V bytes into the word vector module creation expects.
pub fn spv_words(bytes: &[u8]) -> std::io::Result<Vec<u32>> {
    read_spv(&mut std::io::Cursor::new(bytes))
}

/// Create a shader module from SPIR-V embedded at compile time.
#[macro_export]
macro_rules! load_shader {
    ($device:expr, $path:expr) => {{
        let bytes = include_bytes!($path);
        $crate::backend::shader::spv_words(&bytes[..])
            .map_err(|source| $crate::error::DeviceError::ShaderIo {
                path: ::std::path::PathBuf::from($path),
                source,
            })
            .and_then(|words| $crate::backend::shader::create_shader_module($device, &words))
    }};
}
