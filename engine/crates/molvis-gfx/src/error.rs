use std::path::PathBuf;

use ash::vk;

#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("vulkan call failed: {0}")]
    Vk(#[from] vk::Result),

    #[error("failed to load vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("failed to read shader {path}: {source}")]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no gpu with a graphics + compute queue was found")]
    NoSuitableGpu,

    #[error("write of {len} bytes at offset {offset} overflows buffer {name} ({size} bytes)")]
    BufferOverflow {
        name: String,
        offset: u64,
        len: u64,
        size: u64,
    },

    #[error("buffer {0} is not host mapped")]
    NotMapped(String),

    #[error("required {kind} is not supported: {name}")]
    Unsupported { kind: &'static str, name: String },
}

pub type GfxResult<T> = Result<T, GfxError>;
