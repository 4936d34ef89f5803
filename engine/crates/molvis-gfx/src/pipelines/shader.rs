use std::path::Path;

use ash::vk;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
};

/// pipeline 创建完成后即可销毁，drop 时自动销毁
pub struct GfxShaderModule {
    handle: vk::ShaderModule,
}
impl GfxShaderModule {
    /// # param
    /// * path - spv shader 文件路径
    pub fn new(path: &Path) -> GfxResult<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let shader_io_err = |source| GfxError::ShaderIo {
            path: path.to_path_buf(),
            source,
        };
        let mut file = std::fs::File::open(path).map_err(shader_io_err)?;
        let shader_code = ash::util::read_spv(&mut file).map_err(shader_io_err)?;

        let shader_module_info = vk::ShaderModuleCreateInfo::default().code(&shader_code);

        let shader_module = unsafe { gfx_device.create_shader_module(&shader_module_info, None)? };
        let shader_module = Self { handle: shader_module };
        gfx_device.set_debug_name(&shader_module, path.to_string_lossy());
        Ok(shader_module)
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}
impl Drop for GfxShaderModule {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_shader_module(self.handle, None);
        }
    }
}
impl DebugType for GfxShaderModule {
    fn debug_type_name() -> &'static str {
        "GfxShaderModule"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
