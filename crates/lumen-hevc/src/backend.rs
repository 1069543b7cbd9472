//! 解码后端接口.
//!
//! 解析器只负责帧边界与 POC, 像素重建由后端完成. 后端以
//! begin_frame / decode_bitstream / end_frame 的顺序接收每一帧.

use lumen_core::LumenResult;

use crate::decoder::HevcPictureDesc;

/// HEVC profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HevcProfile {
    Main,
    Main10,
    MainStillPicture,
    RangeExtensions,
}

impl HevcProfile {
    /// 由 general_profile_idc 映射, 未知值按 Main 处理
    pub fn from_profile_idc(idc: u8) -> Self {
        match idc {
            2 => Self::Main10,
            3 => Self::MainStillPicture,
            4 => Self::RangeExtensions,
            _ => Self::Main,
        }
    }

    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Main => "Main",
            Self::Main10 => "Main 10",
            Self::MainStillPicture => "Main Still Picture",
            Self::RangeExtensions => "RExt",
        }
    }
}

/// 后端入口点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entrypoint {
    /// 后端接收完整码流 (slice 数据由后端熵解码)
    Bitstream,
}

/// 色度格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChromaFormat {
    Monochrome,
    Yuv420,
    Yuv422,
    Yuv444,
}

impl ChromaFormat {
    /// 由 chroma_format_idc 映射
    pub fn from_idc(idc: u32) -> Self {
        match idc {
            0 => Self::Monochrome,
            2 => Self::Yuv422,
            3 => Self::Yuv444,
            _ => Self::Yuv420,
        }
    }
}

/// 创建解码后端所需的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecTemplate {
    pub profile: HevcProfile,
    pub entrypoint: Entrypoint,
    pub chroma_format: ChromaFormat,
    /// 宽度 (4 对齐)
    pub width: u32,
    /// 高度 (4 对齐)
    pub height: u32,
    /// general_level_idc
    pub level_idc: u8,
    /// 每个 slice 以多段数据提交
    pub expect_chunked_decode: bool,
}

/// 解码后端
///
/// 同一会话内的调用严格串行, 不会重入.
pub trait DecodeBackend {
    /// 解码目标缓冲 (一帧图像)
    type Target;

    /// 创建解码器实例. 每个会话只在第一帧开始时调用一次 (`reset` 之后会再次调用).
    fn create(&mut self, template: &CodecTemplate) -> LumenResult<()>;

    /// 为新图像分配解码目标
    fn alloc_target(&mut self, template: &CodecTemplate) -> LumenResult<Self::Target>;

    /// 开始一帧
    fn begin_frame(
        &mut self,
        target: &mut Self::Target,
        desc: &HevcPictureDesc,
    ) -> LumenResult<()>;

    /// 提交一个 slice 的数据
    ///
    /// `chunks[0]` 为重建的 `00 00 01` + 2 字节 NAL 头, `chunks[1]` 为 NAL 头之后直到
    /// 下一个起始码 (不含) 的全部字节.
    fn decode_bitstream(
        &mut self,
        target: &mut Self::Target,
        desc: &HevcPictureDesc,
        chunks: &[&[u8]],
    ) -> LumenResult<()>;

    /// 结束一帧
    fn end_frame(&mut self, target: &mut Self::Target, desc: &HevcPictureDesc) -> LumenResult<()>;
}

// ============================================================
// 仅解析后端
// ============================================================

/// 仅解析后端的解码目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullPicture {
    /// 分配序号
    pub index: u64,
    /// 提交的 slice 数
    pub slices: usize,
    /// 提交的字节数 (含重建的起始码与 NAL 头)
    pub bytes: usize,
}

/// 仅解析后端: 不做像素重建, 只统计提交的数据
#[derive(Debug, Default)]
pub struct NullBackend {
    template: Option<CodecTemplate>,
    allocated: u64,
}

impl NullBackend {
    /// 创建仅解析后端
    pub fn new() -> Self {
        Self::default()
    }

    /// 最近一次 `create` 使用的参数
    pub fn template(&self) -> Option<&CodecTemplate> {
        self.template.as_ref()
    }

    /// 已分配的解码目标数
    pub fn allocated(&self) -> u64 {
        self.allocated
    }
}

impl DecodeBackend for NullBackend {
    type Target = NullPicture;

    fn create(&mut self, template: &CodecTemplate) -> LumenResult<()> {
        self.template = Some(template.clone());
        Ok(())
    }

    fn alloc_target(&mut self, _template: &CodecTemplate) -> LumenResult<NullPicture> {
        let index = self.allocated;
        self.allocated += 1;
        Ok(NullPicture {
            index,
            slices: 0,
            bytes: 0,
        })
    }

    fn begin_frame(&mut self, _target: &mut NullPicture, _desc: &HevcPictureDesc) -> LumenResult<()> {
        Ok(())
    }

    fn decode_bitstream(
        &mut self,
        target: &mut NullPicture,
        _desc: &HevcPictureDesc,
        chunks: &[&[u8]],
    ) -> LumenResult<()> {
        target.slices += 1;
        target.bytes += chunks.iter().map(|c| c.len()).sum::<usize>();
        Ok(())
    }

    fn end_frame(&mut self, _target: &mut NullPicture, _desc: &HevcPictureDesc) -> LumenResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_映射() {
        assert_eq!(HevcProfile::from_profile_idc(1), HevcProfile::Main);
        assert_eq!(HevcProfile::from_profile_idc(2), HevcProfile::Main10);
        assert_eq!(HevcProfile::from_profile_idc(4), HevcProfile::RangeExtensions);
        assert_eq!(HevcProfile::from_profile_idc(9), HevcProfile::Main);
        assert_eq!(ChromaFormat::from_idc(0), ChromaFormat::Monochrome);
        assert_eq!(ChromaFormat::from_idc(1), ChromaFormat::Yuv420);
    }

    #[test]
    fn test_null_backend_统计() {
        let mut backend = NullBackend::new();
        let template = CodecTemplate {
            profile: HevcProfile::Main,
            entrypoint: Entrypoint::Bitstream,
            chroma_format: ChromaFormat::Yuv420,
            width: 64,
            height: 64,
            level_idc: 93,
            expect_chunked_decode: true,
        };
        backend.create(&template).unwrap();
        let mut target = backend.alloc_target(&template).unwrap();
        let desc = HevcPictureDesc::default();
        backend.begin_frame(&mut target, &desc).unwrap();
        backend
            .decode_bitstream(&mut target, &desc, &[&[0, 0, 1, 0x26, 0x01], &[0xAF; 10]])
            .unwrap();
        backend.end_frame(&mut target, &desc).unwrap();

        assert_eq!(target.index, 0);
        assert_eq!(target.slices, 1);
        assert_eq!(target.bytes, 15);
        assert_eq!(backend.template().unwrap().level_idc, 93);
        assert_eq!(backend.allocated(), 1);
    }
}
