use ash::vk;
use itertools::Itertools;
use molvis_gfx::{
    commands::barrier::GfxImageBarrier,
    gfx::Gfx,
    resources::{
        image::GfxImage2D,
        image_view::{GfxImageView, GfxImageViewDesc},
    },
};
use molvis_render_interface::{
    frame_counter::{FrameCounter, SurfaceSlot},
    render_extent::RenderExtent,
};

use crate::error::{RendererError, RendererResult};

/// 一张 2D storage image 以及它的 view
pub struct SurfaceImage {
    // view 需要先于 image 销毁
    view: GfxImageView,
    image: GfxImage2D,
}
impl SurfaceImage {
    fn new(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags, name: &str) -> RendererResult<Self> {
        let image = GfxImage2D::new(extent, format, usage, name)?;
        let view = GfxImageView::new(
            image.handle(),
            GfxImageViewDesc::new_2d(format, vk::ImageAspectFlags::COLOR),
            format!("{}-view", name),
        )?;
        Ok(Self { view, image })
    }

    #[inline]
    pub fn image(&self) -> &GfxImage2D {
        &self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }
}

/// 一帧光追与上采样所需的中间纹理
///
/// color、depth、motion 为中间分辨率，upscaled 为输出分辨率。
pub struct SurfaceSet {
    pub color: SurfaceImage,
    pub depth: SurfaceImage,
    pub motion: SurfaceImage,
    pub upscaled: SurfaceImage,
}
impl SurfaceSet {
    pub const COLOR_FORMAT: vk::Format = vk::Format::A2B10G10R10_UNORM_PACK32;
    pub const DEPTH_FORMAT: vk::Format = vk::Format::R32_SFLOAT;
    pub const MOTION_FORMAT: vk::Format = vk::Format::R16G16_SFLOAT;
    pub const UPSCALED_FORMAT: vk::Format = vk::Format::A2B10G10R10_UNORM_PACK32;

    fn new(extent: &RenderExtent, slot: SurfaceSlot) -> RendererResult<Self> {
        let intermediate = extent.intermediate();
        let storage = vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::TRANSFER_DST;
        Ok(Self {
            color: SurfaceImage::new(intermediate, Self::COLOR_FORMAT, storage, &format!("color-{}", slot))?,
            depth: SurfaceImage::new(intermediate, Self::DEPTH_FORMAT, storage, &format!("depth-{}", slot))?,
            motion: SurfaceImage::new(intermediate, Self::MOTION_FORMAT, storage, &format!("motion-{}", slot))?,
            upscaled: SurfaceImage::new(
                extent.output(),
                Self::UPSCALED_FORMAT,
                storage | vk::ImageUsageFlags::TRANSFER_SRC,
                &format!("upscaled-{}", slot),
            )?,
        })
    }

    fn images(&self) -> [&GfxImage2D; 4] {
        [self.color.image(), self.depth.image(), self.motion.image(), self.upscaled.image()]
    }
}

/// 两组中间纹理，第 N 帧使用 `ring[jitter_frame_id % 2]`
///
/// 所有 image 创建后即转换到 GENERAL 并清零，之后始终保持 GENERAL。
pub struct SurfaceRing {
    sets: [SurfaceSet; FrameCounter::SURFACE_RING_SIZE],
}
// new & init
impl SurfaceRing {
    pub fn new(extent: &RenderExtent) -> RendererResult<Self> {
        let _span = tracy_client::span!("SurfaceRing::new");
        Self::check_formats()?;

        let [a, b] = FrameCounter::surface_slots();
        let ring = Self {
            sets: [SurfaceSet::new(extent, a)?, SurfaceSet::new(extent, b)?],
        };
        ring.init_layout()?;

        log::info!(
            "surface ring created: intermediate {}x{}, output {}x{}",
            extent.intermediate().width,
            extent.intermediate().height,
            extent.output().width,
            extent.output().height
        );
        Ok(ring)
    }

    fn check_formats() -> RendererResult<()> {
        let gfx = Gfx::get();
        let formats = [
            SurfaceSet::COLOR_FORMAT,
            SurfaceSet::DEPTH_FORMAT,
            SurfaceSet::MOTION_FORMAT,
            SurfaceSet::UPSCALED_FORMAT,
        ];
        match formats
            .into_iter()
            .find(|format| !gfx.format_supports(*format, vk::FormatFeatureFlags::STORAGE_IMAGE))
        {
            Some(format) => {
                Err(RendererError::EnvironmentUnavailable(format!("{:?} does not support storage image", format)))
            }
            None => Ok(()),
        }
    }

    fn init_layout(&self) -> RendererResult<()> {
        let images = self.sets.iter().flat_map(|set| set.images()).collect_vec();
        Gfx::get().one_time_exec(
            |cmd| {
                let to_transfer = images
                    .iter()
                    .map(|image| {
                        GfxImageBarrier::new()
                            .image(image.handle())
                            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::GENERAL)
                            .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                    })
                    .collect_vec();
                cmd.image_memory_barrier(vk::DependencyFlags::empty(), &to_transfer);

                let clear = vk::ClearColorValue { float32: [0.0; 4] };
                for image in &images {
                    cmd.cmd_clear_color_image(
                        image.handle(),
                        vk::ImageLayout::GENERAL,
                        &clear,
                        &[GfxImage2D::color_range()],
                    );
                }

                let to_compute = images
                    .iter()
                    .map(|image| {
                        GfxImageBarrier::new()
                            .image(image.handle())
                            .layout_transfer(vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL)
                            .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                            .dst_mask(
                                vk::PipelineStageFlags2::COMPUTE_SHADER,
                                vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
                            )
                    })
                    .collect_vec();
                cmd.image_memory_barrier(vk::DependencyFlags::empty(), &to_compute);
            },
            "surface-ring-init",
        )?;
        Ok(())
    }
}
// getters
impl SurfaceRing {
    #[inline]
    pub fn set(&self, slot: SurfaceSlot) -> &SurfaceSet {
        &self.sets[*slot]
    }
}
