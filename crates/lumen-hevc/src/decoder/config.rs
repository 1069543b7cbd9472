//! 解码会话配置.

use log::warn;

use super::dpb::DPB_MAX_SIZE;

/// DPB 容量覆盖的环境变量
pub const DPB_SIZE_ENV: &str = "LUMEN_HEVC_DPB_SIZE";

/// 解码会话配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// DPB 容量, 超出后立即按最小 POC 输出一帧 (1..=16)
    pub dpb_max_size: usize,
    /// slice header 解析窗口 (字节)
    pub slice_header_window: usize,
    /// 确认起始码前必须可见的字节数 (流结束时为 0)
    pub lookahead_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            dpb_max_size: DPB_MAX_SIZE,
            slice_header_window: 128,
            lookahead_bytes: 5,
        }
    }
}

impl DecoderConfig {
    /// 默认配置, 并允许 `LUMEN_HEVC_DPB_SIZE` 覆盖 DPB 容量
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(DPB_SIZE_ENV) {
            match value.parse::<usize>() {
                Ok(size) => config = config.with_dpb_max_size(size),
                Err(_) => warn!("{} 无效, 使用默认值: {}", DPB_SIZE_ENV, value),
            }
        }
        config
    }

    /// 设置 DPB 容量 (限制在 1..=16)
    pub fn with_dpb_max_size(mut self, size: usize) -> Self {
        self.dpb_max_size = size.clamp(1, DPB_MAX_SIZE);
        self
    }

    /// 返回参数合法化后的配置
    pub(crate) fn normalized(mut self) -> Self {
        self.dpb_max_size = self.dpb_max_size.clamp(1, DPB_MAX_SIZE);
        self.slice_header_window = self.slice_header_window.max(16);
        self.lookahead_bytes = self.lookahead_bytes.max(3);
        self
    }
}
