//! 统一错误类型定义.
//!
//! 所有 Lumen crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// Lumen 统一错误类型
#[derive(Debug, Error)]
pub enum LumenError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 无效数据 (损坏或截断的码流)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 不支持的码流特性
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 解码后端报告的错误
    #[error("解码后端错误: {0}")]
    Backend(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 功能未实现
    #[error("功能未实现: {0}")]
    NotImplemented(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// Lumen 统一 Result 类型
pub type LumenResult<T> = Result<T, LumenError>;
