//! HEVC 解码会话.
//!
//! 扫描 Annex B 字节流, 维护参数集与在途图像状态, 检测图像边界并推导 POC,
//! 把 slice 数据按解码顺序交给后端, 再经 DPB 按 POC 顺序输出图像.
//!
//! 使用方式与帧解码器一致:
//! - `send_data` 送入任意切分的字节流
//! - `receive_picture` 取出按显示顺序排列的图像
//! - `send_eos` 结束码流并排空 DPB

mod config;
mod dispatch;
mod dpb;
mod frame;
mod params;
mod picture;
mod slice;

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use log::{debug, trace, warn};
use lumen_core::bitreader::BitReader;
use lumen_core::{LumenError, LumenResult};

use crate::backend::{ChromaFormat, CodecTemplate, DecodeBackend, Entrypoint, HevcProfile};
use crate::parsers::h265::{
    HevcNalHeader, HevcNalUnitType, find_start_code, parse_short_term_rps,
    remove_emulation_prevention,
};

pub use config::{DPB_SIZE_ENV, DecoderConfig};
pub use dpb::{DPB_MAX_SIZE, Dpb, DpbEntry};
pub use params::ParameterSetStore;
pub use picture::{HevcPictureDesc, PictureState, derive_poc};
pub use slice::SliceOutcome;

/// 按显示顺序输出的图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPicture<T> {
    /// 后端解码目标
    pub target: T,
    /// PicOrderCntVal
    pub poc: i32,
    /// 解码顺序序号 (从 0 开始)
    pub decode_index: u64,
    /// 图像最后一个 slice 的 NAL 类型
    pub nal_type: HevcNalUnitType,
}

/// 已开始但尚未结束的帧
struct OpenFrame<T> {
    target: T,
    decode_index: u64,
}

/// 等待下一个起始码以确定长度的 slice
#[derive(Debug, Clone, Copy)]
struct PendingSlice {
    /// `00 00 01` + 2 字节 NAL 头
    header: [u8; 5],
    /// 载荷在输入缓冲中的起始位置
    start: usize,
}

/// HEVC 解码会话
pub struct HevcDecoder<B: DecodeBackend> {
    backend: B,
    config: DecoderConfig,
    /// 参数集存储
    params: ParameterSetStore,
    /// 在途图像状态
    picture: PictureState,
    /// 最近一个 SPS 的 general_level_idc
    level_idc: u8,
    /// 后端创建参数, 首帧开始时确定
    template: Option<CodecTemplate>,
    /// 在途帧
    frame: Option<OpenFrame<B::Target>>,
    /// 当前图像的解码目标分配失败, 其余 slice 一并丢弃
    frame_dropped: bool,
    /// 解码图像缓冲
    dpb: Dpb<DecodedPicture<B::Target>>,
    /// 待取出的输出图像
    output: VecDeque<DecodedPicture<B::Target>>,
    /// 输入缓冲
    input: BytesMut,
    /// 扫描位置
    pos: usize,
    /// 待提交的 slice
    pending: Option<PendingSlice>,
    /// 下一帧的解码序号
    next_decode_index: u64,
    /// 是否已收到流结束
    eos: bool,
}

impl<B: DecodeBackend> HevcDecoder<B> {
    /// 创建解码会话
    pub fn new(backend: B, config: DecoderConfig) -> Self {
        Self {
            backend,
            config: config.normalized(),
            params: ParameterSetStore::new(),
            picture: PictureState::default(),
            level_idc: 0,
            template: None,
            frame: None,
            frame_dropped: false,
            dpb: Dpb::new(),
            output: VecDeque::new(),
            input: BytesMut::new(),
            pos: 0,
            pending: None,
            next_decode_index: 0,
            eos: false,
        }
    }

    /// 送入码流数据
    ///
    /// 处理所有已能确定边界的 NAL 单元, 不完整的尾部留待下次.
    pub fn send_data(&mut self, data: &[u8]) -> LumenResult<()> {
        if self.eos {
            return Err(LumenError::InvalidArgument(
                "HEVC: 流已结束, 需要 reset 后才能继续送入数据".into(),
            ));
        }
        self.input.extend_from_slice(data);
        self.decode_available(false)
    }

    /// 结束码流: 处理剩余数据, 关闭在途帧并排空 DPB
    pub fn send_eos(&mut self) -> LumenResult<()> {
        if self.eos {
            return Ok(());
        }
        self.decode_available(true)?;
        let end = self.input.len();
        self.submit_pending(end);
        self.end_frame();
        self.flush_dpb();
        self.eos = true;
        debug!("HEVC: 流结束, 待输出 {} 帧", self.output.len());
        Ok(())
    }

    /// 取出下一帧 (显示顺序)
    pub fn receive_picture(&mut self) -> LumenResult<DecodedPicture<B::Target>> {
        if let Some(picture) = self.output.pop_front() {
            Ok(picture)
        } else if self.eos {
            Err(LumenError::Eof)
        } else {
            Err(LumenError::NeedMoreData)
        }
    }

    /// 重置会话: 释放 DPB、输出队列、参数集、图像状态与输入缓冲
    ///
    /// 后端实例保留, 但会在下一帧开始时重新 `create`.
    pub fn reset(&mut self) {
        self.params.clear();
        self.picture = PictureState::default();
        self.level_idc = 0;
        self.template = None;
        self.frame = None;
        self.frame_dropped = false;
        self.dpb.clear();
        self.output.clear();
        self.input.clear();
        self.pos = 0;
        self.pending = None;
        self.next_decode_index = 0;
        self.eos = false;
    }

    /// 后端
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 后端 (可变)
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// 会话配置
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// 参数集存储
    pub fn parameter_sets(&self) -> &ParameterSetStore {
        &self.params
    }

    /// 在途图像状态
    pub fn picture(&self) -> &PictureState {
        &self.picture
    }

    /// DPB 中的图像数
    pub fn dpb_len(&self) -> usize {
        self.dpb.len()
    }

    /// 是否有帧已开始但尚未结束
    pub fn is_frame_open(&self) -> bool {
        self.frame.is_some()
    }

    /// 最近一个 SPS 的 general_level_idc
    pub fn level_idc(&self) -> u8 {
        self.level_idc
    }
}
