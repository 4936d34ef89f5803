use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 光追 shader 使用的着色常量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingSettings {
    /// 范围 [0, 100]
    pub max_ray_hit_time: f32,
    /// 范围 [0, 20]
    pub exponential_falloff_decay_constant: f32,
    /// 范围 [0, 1]
    pub minimum_ambient_illumination: f32,
    /// 范围 [0, 1]
    pub diffuse_reflectance_scale: f32,
}
impl Default for ShadingSettings {
    fn default() -> Self {
        Self {
            max_ray_hit_time: 1.0,
            exponential_falloff_decay_constant: 2.0,
            minimum_ambient_illumination: 0.07,
            diffuse_reflectance_scale: 0.5,
        }
    }
}

/// 时域上采样器设置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpscalerSettings {
    pub motion_vector_scale: f32,
    /// 深度是否为 reversed-z
    pub depth_reversed: bool,
    /// 与历史混合时历史所占的权重，范围 [0, 1)
    pub history_weight: f32,
}
impl Default for UpscalerSettings {
    fn default() -> Self {
        Self {
            motion_vector_scale: 1.0,
            depth_reversed: true,
            history_weight: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingSettings {
    /// 每帧采集 GPU 时间
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentSettings {
    /// true 使用 FIFO，false 使用 MAILBOX
    pub vsync: bool,
}
impl Default for PresentSettings {
    fn default() -> Self {
        Self { vsync: true }
    }
}

/// 渲染器配置，可从 toml 读取，缺省字段使用默认值
///
/// ```toml
/// [shading]
/// max_ray_hit_time = 1.0
///
/// [profiling]
/// enabled = true
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub shading: ShadingSettings,
    pub upscaler: UpscalerSettings,
    pub profiling: ProfilingSettings,
    pub present: PresentSettings,
}
// new & init
impl RendererSettings {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(text).map_err(|e| ConfigError::InvalidSettings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidSettings(format!("{}: {}", path.display(), e)))?;
        let settings = Self::from_toml_str(&text)?;
        log::info!("renderer settings loaded from {}", path.display());
        Ok(settings)
    }
}
// tools
impl RendererSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = |name: &str, value: f32, min: f32, max: f32, max_inclusive: bool| {
            let in_range = value >= min && if max_inclusive { value <= max } else { value < max };
            if in_range {
                Ok(())
            } else {
                Err(ConfigError::InvalidSettings(format!("{name} = {value} is out of range")))
            }
        };

        let shading = &self.shading;
        check("shading.max_ray_hit_time", shading.max_ray_hit_time, 0.0, 100.0, true)?;
        check(
            "shading.exponential_falloff_decay_constant",
            shading.exponential_falloff_decay_constant,
            0.0,
            20.0,
            true,
        )?;
        check("shading.minimum_ambient_illumination", shading.minimum_ambient_illumination, 0.0, 1.0, true)?;
        check("shading.diffuse_reflectance_scale", shading.diffuse_reflectance_scale, 0.0, 1.0, true)?;
        check("upscaler.history_weight", self.upscaler.history_weight, 0.0, 1.0, false)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RendererSettings::default();
        assert_eq!(settings.shading.max_ray_hit_time, 1.0);
        assert_eq!(settings.shading.exponential_falloff_decay_constant, 2.0);
        assert_eq!(settings.shading.minimum_ambient_illumination, 0.07);
        assert_eq!(settings.shading.diffuse_reflectance_scale, 0.5);
        assert!(settings.upscaler.depth_reversed);
        assert!(!settings.profiling.enabled);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let settings = RendererSettings::from_toml_str(
            r#"
            [shading]
            minimum_ambient_illumination = 0.2

            [profiling]
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(settings.shading.minimum_ambient_illumination, 0.2);
        assert_eq!(settings.shading.max_ray_hit_time, 1.0);
        assert!(settings.profiling.enabled);
        assert!(settings.present.vsync);
    }

    #[test]
    fn test_empty_toml() {
        assert_eq!(RendererSettings::from_toml_str("").unwrap(), RendererSettings::default());
    }

    #[test]
    fn test_out_of_range() {
        let err = RendererSettings::from_toml_str("[shading]\ndiffuse_reflectance_scale = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSettings(msg) if msg.contains("diffuse_reflectance_scale")));

        let err = RendererSettings::from_toml_str("[upscaler]\nhistory_weight = 1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSettings(_)));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            RendererSettings::from_toml_str("[shading\n"),
            Err(ConfigError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = RendererSettings::load(Path::new("/nonexistent/molvis.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSettings(msg) if msg.contains("molvis.toml")));
    }
}
