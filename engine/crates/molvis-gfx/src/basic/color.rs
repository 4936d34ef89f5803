/// debug label 颜色：整条 command buffer 为绿色，单个 pass 为蓝色
pub struct LabelColor;
impl LabelColor {
    pub const COLOR_CMD: glam::Vec4 = glam::vec4(0.2, 0.8, 0.3, 1.0);
    pub const COLOR_PASS: glam::Vec4 = glam::vec4(0.2, 0.4, 1.0, 1.0);
}
