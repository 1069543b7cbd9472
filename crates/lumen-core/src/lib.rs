//! # lumen-core
//!
//! Lumen 核心库, 提供统一错误类型与比特流读写工具.
//!
//! 上层的 HEVC 码流解析、参数集管理与帧边界检测均构建在本 crate 之上.

pub mod bitreader;
pub mod bitwriter;
pub mod error;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{LumenError, LumenResult};
