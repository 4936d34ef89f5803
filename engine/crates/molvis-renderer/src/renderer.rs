use std::{
    ffi::{CStr, CString},
    mem::ManuallyDrop,
    path::{Path, PathBuf},
};

use molvis_crate_tools::resource::MolvisPath;
use molvis_gfx::{error::GfxError, gfx::Gfx, swapchain::surface::GfxSurface};
use molvis_render_interface::{
    atoms::{AtomProvider, AtomStyleProvider},
    light::Light,
    quality::Quality,
    render_extent::RenderExtent,
    settings::RendererSettings,
    time_context::TimeContext,
};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::{
    error::RendererResult,
    frame_pipeline::{CompletionHandler, FrameSubmissionPipeline},
    light_bank::LightBankStatus,
    vulkan::{accel::AccelBuilder, backend::VulkanFrameBackend},
};

/// 编译好的 compute shader
#[derive(Debug, Clone)]
pub struct ShaderBinaries {
    pub raytrace: PathBuf,
    pub upscale: PathBuf,
    pub entry_point: CString,
}
impl Default for ShaderBinaries {
    fn default() -> Self {
        Self {
            raytrace: MolvisPath::shader_path("molecule/raytrace.comp.spv"),
            upscale: MolvisPath::shader_path("molecule/upscale.comp.spv"),
            entry_point: c"main".to_owned(),
        }
    }
}

/// 创建渲染器所需的参数
pub struct MolecularRendererDesc {
    pub app_name: String,
    /// 输出分辨率，必须为偶数
    pub width: u32,
    pub height: u32,
    pub display_handle: RawDisplayHandle,
    pub window_handle: RawWindowHandle,
    pub shaders: ShaderBinaries,
    pub settings: RendererSettings,
}

/// 读取 `config/renderer.toml`，文件不存在时使用默认设置
pub fn load_settings_or_default(path: &Path) -> RendererResult<RendererSettings> {
    if !path.exists() {
        log::info!("{} not found, using default renderer settings", path.display());
        return Ok(RendererSettings::default());
    }
    Ok(RendererSettings::load(path)?)
}

#[inline]
pub fn default_settings_path() -> PathBuf {
    MolvisPath::config_path("renderer.toml")
}

/// 分子光追渲染器
///
/// 独占 Vulkan 设备、队列、pipeline 与中间纹理。每帧依次调用
/// [`Self::set_geometry`]、[`Self::set_camera`]、[`Self::render`]。
///
/// # destroy
/// drop 时等待 GPU 空闲，先销毁所有 GPU 资源，再销毁 Gfx 单例。
/// 任何一次调用返回错误之后，渲染器不应继续使用。
pub struct MolecularRenderer<A: AccelBuilder> {
    /// 在 Gfx 单例之前销毁
    pipeline: ManuallyDrop<FrameSubmissionPipeline<VulkanFrameBackend<A>>>,
}
// new & init
impl<A: AccelBuilder> MolecularRenderer<A> {
    /// `accel_factory` 在 Gfx 初始化之后调用，可以在其中创建 GPU 资源
    ///
    /// 分辨率为奇数时在分配任何 GPU 资源之前失败。
    pub fn new(
        desc: MolecularRendererDesc,
        accel_factory: impl FnOnce() -> RendererResult<A>,
    ) -> RendererResult<Self> {
        let _span = tracy_client::span!("MolecularRenderer::new");
        let extent = RenderExtent::new(desc.width, desc.height)?;
        desc.settings.validate()?;

        let extensions = ash_window::enumerate_required_extensions(desc.display_handle).map_err(GfxError::from)?;
        // 窗口系统返回的扩展名是静态字符串
        let extensions = extensions.iter().map(|&name| unsafe { CStr::from_ptr(name) }).collect::<Vec<&'static CStr>>();
        Gfx::init(&desc.app_name, &extensions)?;

        // 构造失败时，已经创建的 GPU 资源先于 guard 销毁
        let gfx_guard = scopeguard::guard((), |_| Gfx::destroy());

        let surface = GfxSurface::new(desc.display_handle, desc.window_handle)?;
        let accel = accel_factory()?;
        let backend = VulkanFrameBackend::new(surface, extent, &desc.settings, &desc.shaders, accel)?;
        let pipeline = FrameSubmissionPipeline::new(backend, extent, desc.settings)?;

        log::info!(
            "molecular renderer ready: output {}x{}, intermediate {}x{}",
            extent.output().width,
            extent.output().height,
            extent.intermediate().width,
            extent.intermediate().height
        );
        scopeguard::ScopeGuard::into_inner(gfx_guard);
        Ok(Self {
            pipeline: ManuallyDrop::new(pipeline),
        })
    }
}
// 每帧调用
impl<A: AccelBuilder> MolecularRenderer<A> {
    pub fn set_geometry(
        &mut self,
        time: TimeContext,
        atom_provider: &mut dyn AtomProvider,
        style_provider: &dyn AtomStyleProvider,
    ) -> RendererResult<()> {
        self.pipeline.set_geometry(time, atom_provider, style_provider)
    }

    pub fn set_camera(
        &mut self,
        fov_degrees: f32,
        position: glam::Vec3,
        rotation: glam::Mat3,
        lights: &[Light],
        quality: Quality,
    ) -> RendererResult<LightBankStatus> {
        self.pipeline.set_camera(fov_degrees, position, rotation, lights, quality)
    }

    pub fn render(&mut self, on_complete: CompletionHandler) -> RendererResult<()> {
        let _span = tracy_client::span!("MolecularRenderer::render");
        self.pipeline.render(on_complete)
    }
}
// getters
impl<A: AccelBuilder> MolecularRenderer<A> {
    #[inline]
    pub fn extent(&self) -> RenderExtent {
        self.pipeline.extent()
    }

    #[inline]
    pub fn accel_mut(&mut self) -> &mut A {
        self.pipeline.backend_mut().accel_mut()
    }
}
impl<A: AccelBuilder> Drop for MolecularRenderer<A> {
    fn drop(&mut self) {
        if let Err(e) = Gfx::get().wait_idle() {
            log::error!("failed to wait for device idle before destroy: {}", e);
        }
        // pipeline 只在这里销毁一次，之后不再访问
        unsafe { ManuallyDrop::drop(&mut self.pipeline) };
        Gfx::destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shaders_live_under_build_dir() {
        let shaders = ShaderBinaries::default();
        assert!(shaders.raytrace.ends_with("molecule/raytrace.comp.spv"));
        assert!(shaders.upscale.ends_with("molecule/upscale.comp.spv"));
        assert_eq!(shaders.entry_point.as_c_str(), c"main");
    }

    #[test]
    fn test_missing_settings_file_uses_default() {
        let settings = load_settings_or_default(Path::new("/nonexistent/renderer.toml")).unwrap();
        assert_eq!(settings, RendererSettings::default());
    }

    #[test]
    fn test_shipped_settings_are_valid() {
        let settings = load_settings_or_default(&default_settings_path()).unwrap();
        settings.validate().unwrap();
    }
}
