//! 测试辅助: 参数集与 slice 码流构造器、记录调用的解码后端.
//!
//! 供单元测试、集成测试与基准测试构造合成 Annex B 码流. 生成的码流只覆盖
//! 本 crate 会解析的语法, slice 数据部分为不含零字节的填充.

use lumen_core::bitwriter::BitWriter;
use lumen_core::{LumenError, LumenResult};

use crate::backend::{CodecTemplate, DecodeBackend};
use crate::decoder::HevcPictureDesc;
use crate::parsers::h265::{HevcNalHeader, HevcNalUnitType, add_emulation_prevention};

/// 构造器固定使用的 CTB 尺寸 (log2_min_cb=3, diff=1)
const CTB_SIZE: u32 = 16;

// ============================================================
// SPS
// ============================================================

/// SPS 构造参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpsParams {
    pub sps_id: u32,
    pub width: u32,
    pub height: u32,
    pub profile_idc: u8,
    pub level_idc: u8,
    pub chroma_format_idc: u32,
    pub max_sub_layers_minus1: u8,
    pub log2_max_poc_lsb_minus4: u32,
    /// 每个参考集的 DeltaPoc 列表 (负值在前, 全部标记为当前图像使用)
    pub short_term_rps: Vec<Vec<i32>>,
    /// SPS 内长期参考图像的 POC LSB
    pub long_term_pocs: Vec<u32>,
    /// 写入 scaling_list_data
    pub scaling_list_data: bool,
    pub bit_depth_luma_minus8: u32,
    /// conformance window 偏移 (左, 右, 上, 下)
    pub conf_win: Option<[u32; 4]>,
}

impl Default for SpsParams {
    fn default() -> Self {
        Self {
            sps_id: 0,
            width: 64,
            height: 64,
            profile_idc: 1,
            level_idc: 93,
            chroma_format_idc: 1,
            max_sub_layers_minus1: 0,
            log2_max_poc_lsb_minus4: 4,
            short_term_rps: Vec::new(),
            long_term_pocs: Vec::new(),
            scaling_list_data: false,
            bit_depth_luma_minus8: 0,
            conf_win: None,
        }
    }
}

impl SpsParams {
    fn log2_max_poc_lsb(&self) -> u32 {
        self.log2_max_poc_lsb_minus4 + 4
    }

    fn pic_size_in_ctbs(&self) -> u32 {
        self.width.div_ceil(CTB_SIZE) * self.height.div_ceil(CTB_SIZE)
    }
}

fn write_profile_tier_level(bw: &mut BitWriter, params: &SpsParams) {
    bw.write_bits(0, 2); // general_profile_space
    bw.write_bit(0); // general_tier_flag
    bw.write_bits(u32::from(params.profile_idc), 5);
    // general_profile_compatibility_flag[profile_idc]
    bw.write_bits(1 << (31 - u32::from(params.profile_idc.min(31))), 32);
    bw.write_bit(1); // progressive_source
    bw.write_bit(0); // interlaced_source
    bw.write_bit(0); // non_packed_constraint
    bw.write_bit(1); // frame_only_constraint
    bw.write_bits(0, 32);
    bw.write_bits(0, 12);
    bw.write_bits(u32::from(params.level_idc), 8);

    let n = u32::from(params.max_sub_layers_minus1);
    if n > 0 {
        // 子层不带 profile/level
        bw.write_bits(0, 2 * n);
        bw.write_bits(0, 2 * (8 - n));
    }
}

fn write_scaling_list_data(bw: &mut BitWriter) {
    for size_id in 0..4u32 {
        let step = if size_id == 3 { 3 } else { 1 };
        for _matrix_id in (0..6).step_by(step) {
            if size_id < 2 {
                bw.write_bit(0); // scaling_list_pred_mode_flag
                bw.write_ue(0);
            } else {
                bw.write_bit(1);
                bw.write_se(8); // scaling_list_dc_coef_minus8
                for _ in 0..64 {
                    bw.write_se(0);
                }
            }
        }
    }
}

/// 写入显式编码的 st_ref_pic_set(idx)
fn write_short_term_rps(bw: &mut BitWriter, idx: usize, deltas: &[i32]) {
    if idx != 0 {
        bw.write_bit(0); // inter_ref_pic_set_prediction_flag
    }
    let mut negative: Vec<i32> = deltas.iter().copied().filter(|&d| d < 0).collect();
    let mut positive: Vec<i32> = deltas.iter().copied().filter(|&d| d > 0).collect();
    negative.sort_unstable_by(|a, b| b.cmp(a));
    positive.sort_unstable();

    bw.write_ue(negative.len() as u32);
    bw.write_ue(positive.len() as u32);
    let mut prev = 0;
    for d in negative {
        bw.write_ue((prev - d - 1) as u32);
        bw.write_bit(1); // used_by_curr_pic_s0_flag
        prev = d;
    }
    prev = 0;
    for d in positive {
        bw.write_ue((d - prev - 1) as u32);
        bw.write_bit(1);
        prev = d;
    }
}

/// 构造 SPS NAL 载荷 (NAL 头之后, 含防竞争字节)
pub fn build_sps_payload(params: &SpsParams) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0, 4); // sps_video_parameter_set_id
    bw.write_bits(u32::from(params.max_sub_layers_minus1), 3);
    bw.write_bit(1); // sps_temporal_id_nesting_flag
    write_profile_tier_level(&mut bw, params);

    bw.write_ue(params.sps_id);
    bw.write_ue(params.chroma_format_idc);
    if params.chroma_format_idc == 3 {
        bw.write_bit(0); // separate_colour_plane_flag
    }
    bw.write_ue(params.width);
    bw.write_ue(params.height);
    bw.write_flag(params.conf_win.is_some());
    if let Some(offsets) = params.conf_win {
        for offset in offsets {
            bw.write_ue(offset);
        }
    }
    bw.write_ue(params.bit_depth_luma_minus8);
    bw.write_ue(0); // bit_depth_chroma_minus8
    bw.write_ue(params.log2_max_poc_lsb_minus4);

    bw.write_bit(1); // sps_sub_layer_ordering_info_present_flag
    for _ in 0..=params.max_sub_layers_minus1 {
        bw.write_ue(4); // sps_max_dec_pic_buffering_minus1
        bw.write_ue(2); // sps_max_num_reorder_pics
        bw.write_ue(0); // sps_max_latency_increase_plus1
    }

    bw.write_ue(0); // log2_min_luma_coding_block_size_minus3
    bw.write_ue(1); // log2_diff_max_min_luma_coding_block_size
    bw.write_ue(0); // log2_min_luma_transform_block_size_minus2
    bw.write_ue(2); // log2_diff_max_min_luma_transform_block_size
    bw.write_ue(1); // max_transform_hierarchy_depth_inter
    bw.write_ue(1); // max_transform_hierarchy_depth_intra

    bw.write_flag(params.scaling_list_data); // scaling_list_enabled_flag
    if params.scaling_list_data {
        bw.write_bit(1); // sps_scaling_list_data_present_flag
        write_scaling_list_data(&mut bw);
    }

    bw.write_bit(1); // amp_enabled_flag
    bw.write_bit(1); // sample_adaptive_offset_enabled_flag
    bw.write_bit(0); // pcm_enabled_flag

    bw.write_ue(params.short_term_rps.len() as u32);
    for (idx, deltas) in params.short_term_rps.iter().enumerate() {
        write_short_term_rps(&mut bw, idx, deltas);
    }

    bw.write_flag(!params.long_term_pocs.is_empty());
    if !params.long_term_pocs.is_empty() {
        bw.write_ue(params.long_term_pocs.len() as u32);
        for &poc in &params.long_term_pocs {
            bw.write_bits(poc, params.log2_max_poc_lsb());
            bw.write_bit(1); // used_by_curr_pic_lt_sps_flag
        }
    }

    bw.write_bit(1); // sps_temporal_mvp_enabled_flag
    bw.write_bit(1); // strong_intra_smoothing_enabled_flag
    bw.write_bit(0); // vui_parameters_present_flag
    bw.write_bit(0); // sps_extension_present_flag
    bw.write_trailing_bits();
    add_emulation_prevention(&bw.finish())
}

// ============================================================
// PPS
// ============================================================

/// PPS 构造参数
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PpsParams {
    pub pps_id: u32,
    pub sps_id: u32,
    pub dependent_slice_segments: bool,
    pub output_flag_present: bool,
    pub num_extra_slice_header_bits: u32,
    pub init_qp_minus26: i32,
    /// (num_tile_columns_minus1, num_tile_rows_minus1, uniform_spacing)
    pub tiles: Option<(u32, u32, bool)>,
    /// (pps_deblocking_filter_disabled, beta_offset_div2, tc_offset_div2)
    pub deblocking: Option<(bool, i32, i32)>,
    pub slice_header_extension: bool,
    /// 同时用于 l0 与 l1
    pub num_ref_idx_default_minus1: u32,
    pub log2_parallel_merge_level_minus2: u32,
}

/// 构造 PPS NAL 载荷 (NAL 头之后, 含防竞争字节)
pub fn build_pps_payload(params: &PpsParams) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(params.pps_id);
    bw.write_ue(params.sps_id);
    bw.write_flag(params.dependent_slice_segments);
    bw.write_flag(params.output_flag_present);
    bw.write_bits(params.num_extra_slice_header_bits, 3);
    bw.write_bit(0); // sign_data_hiding_enabled_flag
    bw.write_bit(0); // cabac_init_present_flag
    bw.write_ue(params.num_ref_idx_default_minus1);
    bw.write_ue(params.num_ref_idx_default_minus1);
    bw.write_se(params.init_qp_minus26);
    bw.write_bit(0); // constrained_intra_pred_flag
    bw.write_bit(0); // transform_skip_enabled_flag
    bw.write_bit(0); // cu_qp_delta_enabled_flag
    bw.write_se(0); // pps_cb_qp_offset
    bw.write_se(0); // pps_cr_qp_offset
    bw.write_bit(0); // pps_slice_chroma_qp_offsets_present_flag
    bw.write_bit(0); // weighted_pred_flag
    bw.write_bit(0); // weighted_bipred_flag
    bw.write_bit(0); // transquant_bypass_enabled_flag
    bw.write_flag(params.tiles.is_some());
    bw.write_bit(0); // entropy_coding_sync_enabled_flag

    if let Some((columns_minus1, rows_minus1, uniform)) = params.tiles {
        bw.write_ue(columns_minus1);
        bw.write_ue(rows_minus1);
        bw.write_flag(uniform);
        if !uniform {
            for _ in 0..columns_minus1 {
                bw.write_ue(0); // column_width_minus1
            }
            for _ in 0..rows_minus1 {
                bw.write_ue(0); // row_height_minus1
            }
        }
        bw.write_bit(1); // loop_filter_across_tiles_enabled_flag
    }

    bw.write_bit(1); // pps_loop_filter_across_slices_enabled_flag
    bw.write_flag(params.deblocking.is_some());
    if let Some((disabled, beta, tc)) = params.deblocking {
        bw.write_bit(0); // deblocking_filter_override_enabled_flag
        bw.write_flag(disabled);
        if !disabled {
            bw.write_se(beta);
            bw.write_se(tc);
        }
    }
    bw.write_bit(0); // pps_scaling_list_data_present_flag
    bw.write_bit(0); // lists_modification_present_flag
    bw.write_ue(params.log2_parallel_merge_level_minus2);
    bw.write_flag(params.slice_header_extension);
    bw.write_bit(0); // pps_extension_present_flag
    bw.write_trailing_bits();
    add_emulation_prevention(&bw.finish())
}

// ============================================================
// Slice
// ============================================================

/// slice header 中的短期参考集
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceRps {
    /// 内联编码 (short_term_ref_pic_set_sps_flag = 0)
    Inline(Vec<i32>),
    /// 引用 SPS 中的参考集 (short_term_ref_pic_set_sps_flag = 1)
    Sps(usize),
}

/// slice 构造参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceParams {
    pub nal_type: HevcNalUnitType,
    pub temporal_id: u8,
    pub first_slice: bool,
    pub dependent: bool,
    /// slice_segment_address (首个 slice 不写入)
    pub address: u32,
    pub poc_lsb: u32,
    pub rps: SliceRps,
    /// slice header 之后的填充字节数
    pub payload_len: usize,
}

impl Default for SliceParams {
    fn default() -> Self {
        Self {
            nal_type: HevcNalUnitType::TrailR,
            temporal_id: 0,
            first_slice: true,
            dependent: false,
            address: 0,
            poc_lsb: 0,
            rps: SliceRps::Inline(Vec::new()),
            payload_len: 24,
        }
    }
}

impl SliceParams {
    /// IDR_W_RADL 图像的首个 slice
    pub fn idr() -> Self {
        Self {
            nal_type: HevcNalUnitType::IdrWRadl,
            ..Self::default()
        }
    }

    /// TRAIL_R 图像的首个 slice
    pub fn trail(poc_lsb: u32) -> Self {
        Self {
            poc_lsb,
            ..Self::default()
        }
    }

    /// CRA 图像的首个 slice
    pub fn cra(poc_lsb: u32) -> Self {
        Self {
            nal_type: HevcNalUnitType::Cra,
            poc_lsb,
            ..Self::default()
        }
    }

    /// 改为 TRAIL_N
    pub fn non_reference(mut self) -> Self {
        self.nal_type = HevcNalUnitType::TrailN;
        self
    }

    /// 改为同一图像中地址为 `address` 的后续 slice
    pub fn next_slice(mut self, address: u32) -> Self {
        self.first_slice = false;
        self.address = address;
        self
    }

    /// 设置 TemporalId
    pub fn with_temporal_id(mut self, temporal_id: u8) -> Self {
        self.temporal_id = temporal_id;
        self
    }
}

fn ceil_log2(value: u32) -> u32 {
    if value <= 1 {
        0
    } else {
        32 - (value - 1).leading_zeros()
    }
}

/// 构造 slice NAL (含 2 字节 NAL 头, 不含起始码)
pub fn build_slice_nal(sps: &SpsParams, pps: &PpsParams, slice: &SliceParams) -> Vec<u8> {
    let header = HevcNalHeader {
        nal_type: slice.nal_type,
        layer_id: 0,
        temporal_id_plus1: slice.temporal_id + 1,
    };

    let mut bw = BitWriter::new();
    bw.write_flag(slice.first_slice);
    if slice.nal_type.is_rap() {
        bw.write_bit(0); // no_output_of_prior_pics_flag
    }
    bw.write_ue(pps.pps_id);

    let mut dependent = false;
    if !slice.first_slice {
        if pps.dependent_slice_segments {
            bw.write_flag(slice.dependent);
            dependent = slice.dependent;
        }
        bw.write_bits(slice.address, ceil_log2(sps.pic_size_in_ctbs()));
    }

    if !dependent {
        bw.write_bits(0, pps.num_extra_slice_header_bits);
        bw.write_ue(if slice.nal_type.is_idr() { 2 } else { 1 }); // slice_type
        if pps.output_flag_present {
            bw.write_bit(1);
        }
        if !slice.nal_type.is_idr() {
            bw.write_bits(slice.poc_lsb, sps.log2_max_poc_lsb());
            match &slice.rps {
                SliceRps::Inline(deltas) => {
                    bw.write_bit(0);
                    write_short_term_rps(&mut bw, sps.short_term_rps.len(), deltas);
                }
                SliceRps::Sps(idx) => {
                    bw.write_bit(1);
                    let bits = ceil_log2(sps.short_term_rps.len() as u32);
                    bw.write_bits(*idx as u32, bits);
                }
            }
        }
    }
    // byte_alignment()
    bw.write_trailing_bits();
    bw.write_bytes(&slice_filler(slice.payload_len));

    let mut nal = header.to_bytes().to_vec();
    nal.extend_from_slice(&add_emulation_prevention(&bw.finish()));
    nal
}

/// 不含零字节的 slice 数据填充
fn slice_filler(len: usize) -> Vec<u8> {
    (0..len).map(|i| 0x80 | (i as u8 & 0x7F)).collect()
}

// ============================================================
// Annex B 码流
// ============================================================

/// 合成 Annex B 码流构造器
///
/// slice 使用最近一次加入的 SPS/PPS 参数编码.
#[derive(Debug, Clone, Default)]
pub struct StreamBuilder {
    data: Vec<u8>,
    sps: SpsParams,
    pps: PpsParams,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn nal(mut self, long_start_code: bool, nal_type: HevcNalUnitType, payload: &[u8]) -> Self {
        if long_start_code {
            self.data.push(0x00);
        }
        self.data.extend_from_slice(&[0x00, 0x00, 0x01]);
        let header = HevcNalHeader {
            nal_type,
            layer_id: 0,
            temporal_id_plus1: 1,
        };
        self.data.extend_from_slice(&header.to_bytes());
        self.data.extend_from_slice(payload);
        self
    }

    /// 追加 SPS (4 字节起始码)
    pub fn sps(mut self, params: &SpsParams) -> Self {
        self.sps = params.clone();
        self.nal(true, HevcNalUnitType::Sps, &build_sps_payload(params))
    }

    /// 追加 PPS (4 字节起始码)
    pub fn pps(mut self, params: &PpsParams) -> Self {
        self.pps = params.clone();
        self.nal(true, HevcNalUnitType::Pps, &build_pps_payload(params))
    }

    /// 追加 slice (3 字节起始码)
    pub fn slice(mut self, params: &SliceParams) -> Self {
        let nal = build_slice_nal(&self.sps, &self.pps, params);
        self.data.extend_from_slice(&[0x00, 0x00, 0x01]);
        self.data.extend_from_slice(&nal);
        self
    }

    /// 追加 AUD
    pub fn aud(self) -> Self {
        self.nal(true, HevcNalUnitType::Aud, &[0x50])
    }

    /// 追加原始字节
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

// ============================================================
// 记录调用的后端
// ============================================================

/// 后端调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Create(CodecTemplate),
    Alloc { target: u64 },
    Begin { target: u64, poc: i32 },
    /// `nal` 为各段数据拼接后的字节
    Decode { target: u64, poc: i32, chunks: usize, nal: Vec<u8> },
    End { target: u64, poc: i32 },
}

impl BackendEvent {
    /// 调用名称
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Alloc { .. } => "alloc",
            Self::Begin { .. } => "begin",
            Self::Decode { .. } => "decode",
            Self::End { .. } => "end",
        }
    }
}

/// 按调用顺序记录全部事件的后端, 解码目标为分配序号
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub events: Vec<BackendEvent>,
    fail_create: bool,
    fail_alloc: bool,
    next_target: u64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// `create` 总是失败
    pub fn fail_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// `alloc_target` 总是失败
    pub fn fail_alloc(mut self) -> Self {
        self.fail_alloc = true;
        self
    }

    pub fn create_count(&self) -> usize {
        self.templates().len()
    }

    /// 每次 `create` 使用的参数
    pub fn templates(&self) -> Vec<&CodecTemplate> {
        self.events
            .iter()
            .filter_map(|e| match e {
                BackendEvent::Create(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// 提交的 slice NAL (含重建的 `00 00 01` 起始码)
    pub fn decoded_nals(&self) -> Vec<&[u8]> {
        self.events
            .iter()
            .filter_map(|e| match e {
                BackendEvent::Decode { nal, .. } => Some(nal.as_slice()),
                _ => None,
            })
            .collect()
    }
}

impl DecodeBackend for RecordingBackend {
    type Target = u64;

    fn create(&mut self, template: &CodecTemplate) -> LumenResult<()> {
        if self.fail_create {
            return Err(LumenError::Backend("create 失败".into()));
        }
        self.events.push(BackendEvent::Create(template.clone()));
        Ok(())
    }

    fn alloc_target(&mut self, _template: &CodecTemplate) -> LumenResult<u64> {
        if self.fail_alloc {
            return Err(LumenError::Backend("没有空闲的解码目标".into()));
        }
        let target = self.next_target;
        self.next_target += 1;
        self.events.push(BackendEvent::Alloc { target });
        Ok(target)
    }

    fn begin_frame(&mut self, target: &mut u64, desc: &HevcPictureDesc) -> LumenResult<()> {
        self.events.push(BackendEvent::Begin {
            target: *target,
            poc: desc.poc,
        });
        Ok(())
    }

    fn decode_bitstream(
        &mut self,
        target: &mut u64,
        desc: &HevcPictureDesc,
        chunks: &[&[u8]],
    ) -> LumenResult<()> {
        self.events.push(BackendEvent::Decode {
            target: *target,
            poc: desc.poc,
            chunks: chunks.len(),
            nal: chunks.concat(),
        });
        Ok(())
    }

    fn end_frame(&mut self, target: &mut u64, desc: &HevcPictureDesc) -> LumenResult<()> {
        self.events.push(BackendEvent::End {
            target: *target,
            poc: desc.poc,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::h265::split_hevc_annex_b;

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(16), 4);
        assert_eq!(ceil_log2(17), 5);
    }

    #[test]
    fn test_stream_builder_nal_划分() {
        let stream = StreamBuilder::new()
            .sps(&SpsParams::default())
            .pps(&PpsParams::default())
            .aud()
            .slice(&SliceParams::idr())
            .build();
        let types: Vec<HevcNalUnitType> = split_hevc_annex_b(&stream)
            .iter()
            .map(|n| n.nal_type())
            .collect();
        assert_eq!(
            types,
            vec![
                HevcNalUnitType::Sps,
                HevcNalUnitType::Pps,
                HevcNalUnitType::Aud,
                HevcNalUnitType::IdrWRadl
            ]
        );
    }

    #[test]
    fn test_slice_填充不含零字节() {
        assert!(slice_filler(300).iter().all(|&b| b != 0));
    }
}
