//! # lumen-hevc
//!
//! HEVC (H.265) Annex B 码流解析与帧边界检测库.
//!
//! 解析 VPS 之外的参数集 (SPS/PPS) 与 slice header 前缀, 推导 POC,
//! 检测图像边界, 把每帧的 slice 数据交给可替换的解码后端, 并经 16 帧
//! DPB 按 POC 顺序输出图像. 像素重建不在本 crate 范围内.
//!
//! ## 使用示例
//!
//! ```rust
//! use lumen_hevc::{DecoderConfig, HevcDecoder, NullBackend};
//!
//! let mut decoder = HevcDecoder::new(NullBackend::new(), DecoderConfig::default());
//! decoder.send_data(&[0x00, 0x00, 0x01, 0x46, 0x01, 0x10]).unwrap();
//! decoder.send_eos().unwrap();
//! while let Ok(picture) = decoder.receive_picture() {
//!     println!("poc={}", picture.poc);
//! }
//! ```

pub mod backend;
pub mod decoder;
pub mod parsers;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// 重导出常用类型
pub use backend::{
    ChromaFormat, CodecTemplate, DecodeBackend, Entrypoint, HevcProfile, NullBackend, NullPicture,
};
pub use decoder::{DecodedPicture, DecoderConfig, HevcDecoder, HevcPictureDesc, SliceOutcome};
pub use parsers::h265::{HevcNalUnitType, HevcPps, HevcSps};
