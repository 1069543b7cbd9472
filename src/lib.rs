//! # Lumen
//!
//! 纯 Rust 实现的 HEVC (H.265) Annex B 码流解析与帧边界检测框架.
//!
//! Lumen 负责码流层面的工作, 像素重建交给可替换的解码后端:
//! - **NAL 分发**: 增量扫描 Annex B 字节流, 识别 NAL 单元
//! - **参数集**: SPS/PPS 解析与按 ID 存储
//! - **帧边界**: slice header 前缀解析、POC 推导与图像边界检测
//! - **输出**: 16 帧 DPB 按 POC 顺序输出图像
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use lumen::hevc::{DecoderConfig, HevcDecoder, NullBackend};
//!
//! let data = std::fs::read("input.h265").unwrap();
//! let mut decoder = HevcDecoder::new(NullBackend::new(), DecoderConfig::from_env());
//! decoder.send_data(&data).unwrap();
//! decoder.send_eos().unwrap();
//! while let Ok(picture) = decoder.receive_picture() {
//!     println!("poc={} slices={}", picture.poc, picture.target.slices);
//! }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `lumen-core` | 错误类型与比特流读写 |
//! | `lumen-hevc` | HEVC 解析与解码会话 |

pub mod logging;

/// 核心类型与工具
pub use lumen_core as core;

/// HEVC 码流解析与解码会话
pub use lumen_hevc as hevc;

/// 获取 Lumen 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
