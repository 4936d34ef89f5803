use std::path::{Path, PathBuf};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
/// 设置环境变量 `MOLVIS_SHADER_DIR` 可以替换编译后着色器所在的目录。
///
/// # 使用示例
/// ```ignore
/// let rt = MolvisPath::shader_path("molecule/raytrace.comp.spv"); // shader/.build/molecule/raytrace.comp.spv
/// let cfg = MolvisPath::config_path("renderer.toml");              // config/renderer.toml
/// ```
pub struct MolvisPath {}
impl MolvisPath {
    pub const SHADER_DIR_ENV: &'static str = "MOLVIS_SHADER_DIR";

    /// 获取 `shader/.build/` 目录下的着色器路径（编译后的 SPIR-V）
    pub fn shader_path(filename: &str) -> PathBuf {
        Self::shader_dir(std::env::var_os(Self::SHADER_DIR_ENV).map(PathBuf::from)).join(filename)
    }

    /// 获取 `config/` 目录下的配置文件路径
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("config").join(filename)
    }

    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        // engine/crates/molvis-crate-tools -> workspace root
        manifest_dir.ancestors().nth(3).unwrap_or(manifest_dir).to_path_buf()
    }

    fn shader_dir(overridden: Option<PathBuf>) -> PathBuf {
        overridden.unwrap_or_else(|| Self::workspace_path().join("shader").join(".build"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_path() {
        let root = MolvisPath::workspace_path();
        assert!(root.join("engine").join("crates").join("molvis-crate-tools").exists());
    }

    #[test]
    fn test_shader_dir() {
        let default_dir = MolvisPath::shader_dir(None);
        assert!(default_dir.ends_with("shader/.build"));

        let custom = MolvisPath::shader_dir(Some(PathBuf::from("/tmp/spv")));
        assert_eq!(custom.join("a.spv"), PathBuf::from("/tmp/spv/a.spv"));
    }
}
