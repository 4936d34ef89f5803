use ash::vk;
use molvis_gfx::error::GfxError;
use molvis_render_interface::error::ConfigError;

use crate::frame_pipeline::FramePhase;

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("gpu error: {0}")]
    Gfx(#[from] GfxError),

    #[error("precondition violated: {0}")]
    MissingPrecondition(&'static str),

    #[error("frame phase {from:?} cannot advance to {to:?}")]
    PhaseViolation { from: FramePhase, to: FramePhase },

    #[error("presentation target is {actual:?}, expected {expected:?}")]
    SurfaceMismatch {
        expected: vk::Extent2D,
        actual: vk::Extent2D,
    },

    #[error("environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("renderer is unusable after an earlier fatal error")]
    Poisoned,
}

impl RendererError {
    /// 渲染器没有可恢复的错误：光源 buffer 的扩容不属于错误
    ///
    /// 管线遇到致命错误后不再接受任何调用，之后一律返回 [`Self::Poisoned`]。
    #[inline]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_)
            | Self::Gfx(_)
            | Self::MissingPrecondition(_)
            | Self::PhaseViolation { .. }
            | Self::SurfaceMismatch { .. }
            | Self::EnvironmentUnavailable(_)
            | Self::Poisoned => true,
        }
    }
}

pub type RendererResult<T> = Result<T, RendererError>;
