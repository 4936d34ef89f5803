/// 配置错误：调用方违反了构造期或调用约定，不可恢复
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("render extent must have even dimensions, got {width}x{height}")]
    OddDimension { width: u32, height: u32 },

    #[error("render extent must be non-zero, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },

    #[error("too many lights: {count} (at most {max})")]
    TooManyLights { count: usize, max: usize },

    #[error("argument record is {size} bytes but an argument slot holds {slot}")]
    ArgumentRecordTooLarge { size: usize, slot: usize },

    #[error("atom style provider has no style 0 to fall back on")]
    MissingFallbackStyle,

    #[error("invalid renderer settings: {0}")]
    InvalidSettings(String),
}
