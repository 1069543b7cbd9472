//! H.265/HEVC SPS 解析器.
//!
//! SPS 包含编码视频序列的参数: profile/level, 分辨率, 色度格式,
//! POC LSB 位宽, 短期/长期参考图像集等.
//!
//! 解析在 `strong_intra_smoothing_enabled_flag` 之后结束, VUI 与扩展不解析.

use lumen_core::bitreader::BitReader;
use lumen_core::{LumenError, LumenResult};

use super::nal::remove_emulation_prevention;
use super::rps::{MAX_SHORT_TERM_RPS, ShortTermRps, parse_short_term_rps};

/// SPS 表容量 (sps_seq_parameter_set_id 取值 0..=15)
pub const MAX_SPS_COUNT: usize = 16;

/// SPS 中长期参考图像的最大数量
pub const MAX_LONG_TERM_REF_PICS_SPS: u32 = 32;

/// pic_width/height_in_luma_samples 上限 (level 6.2 的 sqrt(MaxLumaPs * 8))
pub const MAX_PIC_DIMENSION: u32 = 16888;

/// profile_tier_level 中的通用部分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HevcProfileTierLevel {
    /// general_profile_space
    pub profile_space: u8,
    /// general_tier_flag
    pub tier_flag: bool,
    /// general_profile_idc
    pub profile_idc: u8,
    /// general_profile_compatibility_flags
    pub compatibility_flags: u32,
    /// general_level_idc
    pub level_idc: u8,
}

/// PCM 参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HevcPcmParams {
    pub sample_bit_depth_luma: u8,
    pub sample_bit_depth_chroma: u8,
    pub log2_min_coding_block_size: u32,
    pub log2_diff_max_min_coding_block_size: u32,
    pub loop_filter_disabled: bool,
}

/// SPS 中声明的长期参考图像
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HevcLongTermRefPic {
    /// lt_ref_pic_poc_lsb_sps
    pub poc_lsb: u32,
    /// used_by_curr_pic_lt_sps_flag
    pub used_by_curr_pic: bool,
}

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct HevcSps {
    /// SPS ID
    pub sps_id: u8,
    /// SPS 所引用的 VPS ID
    pub vps_id: u8,
    /// sps_max_sub_layers_minus1 + 1
    pub max_sub_layers: u8,
    /// sps_temporal_id_nesting_flag
    pub temporal_id_nesting: bool,
    /// profile/tier/level
    pub ptl: HevcProfileTierLevel,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// separate_colour_plane_flag
    pub separate_colour_plane: bool,
    /// pic_width_in_luma_samples
    pub pic_width: u32,
    /// pic_height_in_luma_samples
    pub pic_height: u32,
    /// conformance window 裁剪 (左, 右, 上, 下)
    pub conf_win: [u32; 4],
    /// 亮度位深
    pub bit_depth_luma: u32,
    /// 色度位深
    pub bit_depth_chroma: u32,
    /// log2_max_pic_order_cnt_lsb_minus4 + 4
    pub log2_max_poc_lsb: u32,
    /// 最高子层的 sps_max_dec_pic_buffering_minus1
    pub max_dec_pic_buffering_minus1: u32,
    /// 最高子层的 sps_max_num_reorder_pics
    pub max_num_reorder_pics: u32,
    /// log2_min_luma_coding_block_size_minus3 + 3
    pub log2_min_cb_size: u32,
    /// log2_diff_max_min_luma_coding_block_size
    pub log2_diff_max_min_cb_size: u32,
    /// log2_min_luma_transform_block_size_minus2 + 2
    pub log2_min_tb_size: u32,
    /// log2_diff_max_min_luma_transform_block_size
    pub log2_diff_max_min_tb_size: u32,
    pub max_transform_hierarchy_depth_inter: u32,
    pub max_transform_hierarchy_depth_intra: u32,
    /// scaling_list_enabled_flag
    pub scaling_list_enabled: bool,
    /// sps_scaling_list_data_present_flag (数据只做语法跳过)
    pub scaling_list_data_present: bool,
    pub amp_enabled: bool,
    pub sample_adaptive_offset_enabled: bool,
    /// PCM 参数 (pcm_enabled_flag 为 0 时为 None)
    pub pcm: Option<HevcPcmParams>,
    /// SPS 内声明的短期参考图像集
    pub short_term_rps: Vec<ShortTermRps>,
    /// long_term_ref_pics_present_flag
    pub long_term_ref_pics_present: bool,
    /// SPS 内声明的长期参考图像
    pub long_term_ref_pics: Vec<HevcLongTermRefPic>,
    pub temporal_mvp_enabled: bool,
    pub strong_intra_smoothing_enabled: bool,
}

impl HevcSps {
    /// num_short_term_ref_pic_sets
    pub fn num_short_term_ref_pic_sets(&self) -> usize {
        self.short_term_rps.len()
    }

    /// POC LSB 模数 (MaxPicOrderCntLsb)
    pub fn max_poc_lsb(&self) -> u32 {
        1 << self.log2_max_poc_lsb
    }

    /// CTB 尺寸的 log2 (CtbLog2SizeY)
    pub fn ctb_log2_size(&self) -> u32 {
        self.log2_min_cb_size + self.log2_diff_max_min_cb_size
    }

    /// 图像中的 CTB 数量 (PicSizeInCtbsY)
    pub fn pic_size_in_ctbs(&self) -> u32 {
        let size = 1u32 << self.ctb_log2_size();
        self.pic_width.div_ceil(size) * self.pic_height.div_ceil(size)
    }

    /// 裁剪后的显示宽度
    pub fn display_width(&self) -> u32 {
        let (unit_x, _) = crop_unit(self.chroma_format_idc, self.separate_colour_plane);
        let crop = self.conf_win[0].saturating_add(self.conf_win[1]);
        self.pic_width.saturating_sub(unit_x.saturating_mul(crop))
    }

    /// 裁剪后的显示高度
    pub fn display_height(&self) -> u32 {
        let (_, unit_y) = crop_unit(self.chroma_format_idc, self.separate_colour_plane);
        let crop = self.conf_win[2].saturating_add(self.conf_win[3]);
        self.pic_height.saturating_sub(unit_y.saturating_mul(crop))
    }
}

/// conformance window 偏移的单位 (SubWidthC, SubHeightC)
fn crop_unit(chroma_format_idc: u32, separate_colour_plane: bool) -> (u32, u32) {
    match chroma_format_idc {
        1 if !separate_colour_plane => (2, 2),
        2 if !separate_colour_plane => (2, 1),
        _ => (1, 1),
    }
}

/// 读取 ue(v) 并检查上限
pub(crate) fn read_ue_max(br: &mut BitReader, max: u32, name: &str) -> LumenResult<u32> {
    let value = br.read_ue()?;
    if value > max {
        return Err(LumenError::InvalidData(format!(
            "HEVC: {} 超出范围, value={}",
            name, value
        )));
    }
    Ok(value)
}

// ============================================================
// profile_tier_level
// ============================================================

/// 读取 88 位 profile 块 (general 与 sub_layer 共用同一布局)
fn read_profile_block(br: &mut BitReader) -> LumenResult<HevcProfileTierLevel> {
    let profile_space = br.read_bits(2)? as u8;
    let tier_flag = br.read_bit()? != 0;
    let profile_idc = br.read_bits(5)? as u8;
    let compatibility_flags = br.read_bits(32)?;
    // progressive_source/interlaced_source/non_packed/frame_only (4 bits)
    // + 43 位约束标志 + inbld/reserved (1 bit)
    br.skip_bits(4 + 44)?;
    Ok(HevcProfileTierLevel {
        profile_space,
        tier_flag,
        profile_idc,
        compatibility_flags,
        level_idc: 0,
    })
}

/// 解析 profile_tier_level(1, max_sub_layers_minus1)
pub(crate) fn parse_profile_tier_level(
    br: &mut BitReader,
    max_sub_layers_minus1: u8,
) -> LumenResult<HevcProfileTierLevel> {
    let mut ptl = read_profile_block(br)?;
    ptl.level_idc = br.read_bits(8)? as u8;

    let n = max_sub_layers_minus1 as usize;
    let mut profile_present = [false; 8];
    let mut level_present = [false; 8];
    for i in 0..n {
        profile_present[i] = br.read_bit()? != 0;
        level_present[i] = br.read_bit()? != 0;
    }
    if n > 0 {
        // reserved_zero_2bits, 补齐到 8 组
        br.skip_bits(2 * (8 - n as u32))?;
    }
    for i in 0..n {
        if profile_present[i] {
            read_profile_block(br)?;
        }
        if level_present[i] {
            br.skip_bits(8)?; // sub_layer_level_idc
        }
    }
    Ok(ptl)
}

// ============================================================
// scaling_list_data
// ============================================================

/// 跳过 scaling_list_data (只做语法消费, 不构建量化矩阵)
pub(crate) fn skip_scaling_list_data(br: &mut BitReader) -> LumenResult<()> {
    for size_id in 0..4u32 {
        let step = if size_id == 3 { 3 } else { 1 };
        for _matrix_id in (0..6).step_by(step) {
            let pred_mode = br.read_bit()?;
            if pred_mode == 0 {
                br.read_ue()?; // scaling_list_pred_matrix_id_delta
            } else {
                let coef_num = (1u32 << (4 + (size_id << 1))).min(64);
                if size_id > 1 {
                    br.read_se()?; // scaling_list_dc_coef_minus8
                }
                for _ in 0..coef_num {
                    br.read_se()?; // scaling_list_delta_coef
                }
            }
        }
    }
    Ok(())
}

// ============================================================
// SPS
// ============================================================

/// 解析 HEVC SPS
///
/// `payload` 为 NAL 头之后的数据 (含防竞争字节).
pub fn parse_hevc_sps(payload: &[u8]) -> LumenResult<HevcSps> {
    if payload.len() < 3 {
        return Err(LumenError::InvalidData("HEVC: SPS RBSP 太短".into()));
    }

    let clean = remove_emulation_prevention(payload);
    let mut br = BitReader::new(&clean);

    let vps_id = br.read_bits(4)? as u8;
    let max_sub_layers_minus1 = br.read_bits(3)? as u8;
    if max_sub_layers_minus1 > 6 {
        return Err(LumenError::InvalidData(format!(
            "HEVC: sps_max_sub_layers_minus1={} 超出范围",
            max_sub_layers_minus1
        )));
    }
    let temporal_id_nesting = br.read_bit()? != 0;

    let ptl = parse_profile_tier_level(&mut br, max_sub_layers_minus1)?;

    let sps_id = br.read_ue()?;
    if sps_id as usize >= MAX_SPS_COUNT {
        return Err(LumenError::InvalidData(format!(
            "HEVC: sps_id={} 超出范围",
            sps_id
        )));
    }

    let chroma_format_idc = br.read_ue()?;
    if chroma_format_idc > 3 {
        return Err(LumenError::InvalidData(format!(
            "HEVC: chroma_format_idc={} 无效",
            chroma_format_idc
        )));
    }
    let separate_colour_plane = chroma_format_idc == 3 && br.read_bit()? != 0;

    let pic_width = br.read_ue()?;
    let pic_height = br.read_ue()?;
    if !(1..=MAX_PIC_DIMENSION).contains(&pic_width)
        || !(1..=MAX_PIC_DIMENSION).contains(&pic_height)
    {
        return Err(LumenError::InvalidData(format!(
            "HEVC: 图像尺寸非法, width={}, height={}",
            pic_width, pic_height
        )));
    }

    let mut conf_win = [0u32; 4];
    if br.read_bit()? != 0 {
        for offset in conf_win.iter_mut() {
            *offset = br.read_ue()?;
        }
        let (unit_x, unit_y) = crop_unit(chroma_format_idc, separate_colour_plane);
        let crop_x = conf_win[0]
            .checked_add(conf_win[1])
            .and_then(|v| v.checked_mul(unit_x))
            .ok_or_else(|| LumenError::InvalidData("HEVC: 计算水平裁剪时发生溢出".into()))?;
        let crop_y = conf_win[2]
            .checked_add(conf_win[3])
            .and_then(|v| v.checked_mul(unit_y))
            .ok_or_else(|| LumenError::InvalidData("HEVC: 计算垂直裁剪时发生溢出".into()))?;
        if crop_x >= pic_width || crop_y >= pic_height {
            return Err(LumenError::InvalidData(format!(
                "HEVC: 裁剪参数非法, raw={}x{}, crop_x={}, crop_y={}",
                pic_width, pic_height, crop_x, crop_y
            )));
        }
    }

    let bit_depth_luma = read_ue_max(&mut br, 8, "bit_depth_luma_minus8")? + 8;
    let bit_depth_chroma = read_ue_max(&mut br, 8, "bit_depth_chroma_minus8")? + 8;

    let log2_max_poc_lsb_minus4 = br.read_ue()?;
    if log2_max_poc_lsb_minus4 > 12 {
        return Err(LumenError::InvalidData(format!(
            "HEVC: log2_max_pic_order_cnt_lsb_minus4={} 超出范围",
            log2_max_poc_lsb_minus4
        )));
    }

    let sub_layer_ordering_info_present = br.read_bit()? != 0;
    let start = if sub_layer_ordering_info_present {
        0
    } else {
        max_sub_layers_minus1
    };
    let mut max_dec_pic_buffering_minus1 = 0;
    let mut max_num_reorder_pics = 0;
    for _ in start..=max_sub_layers_minus1 {
        max_dec_pic_buffering_minus1 = br.read_ue()?;
        max_num_reorder_pics = br.read_ue()?;
        br.read_ue()?; // sps_max_latency_increase_plus1
    }

    let log2_min_cb_size =
        read_ue_max(&mut br, 3, "log2_min_luma_coding_block_size_minus3")? + 3;
    let log2_diff_max_min_cb_size =
        read_ue_max(&mut br, 3, "log2_diff_max_min_luma_coding_block_size")?;
    if log2_min_cb_size + log2_diff_max_min_cb_size > 6 {
        return Err(LumenError::InvalidData(format!(
            "HEVC: CTB 尺寸 log2={} 超出范围",
            log2_min_cb_size + log2_diff_max_min_cb_size
        )));
    }
    let log2_min_tb_size =
        read_ue_max(&mut br, 3, "log2_min_luma_transform_block_size_minus2")? + 2;
    let log2_diff_max_min_tb_size =
        read_ue_max(&mut br, 3, "log2_diff_max_min_luma_transform_block_size")?;
    let max_transform_hierarchy_depth_inter =
        read_ue_max(&mut br, 4, "max_transform_hierarchy_depth_inter")?;
    let max_transform_hierarchy_depth_intra =
        read_ue_max(&mut br, 4, "max_transform_hierarchy_depth_intra")?;

    let scaling_list_enabled = br.read_bit()? != 0;
    let mut scaling_list_data_present = false;
    if scaling_list_enabled {
        scaling_list_data_present = br.read_bit()? != 0;
        if scaling_list_data_present {
            skip_scaling_list_data(&mut br)?;
        }
    }

    let amp_enabled = br.read_bit()? != 0;
    let sample_adaptive_offset_enabled = br.read_bit()? != 0;

    let pcm = if br.read_bit()? != 0 {
        Some(HevcPcmParams {
            sample_bit_depth_luma: br.read_bits(4)? as u8 + 1,
            sample_bit_depth_chroma: br.read_bits(4)? as u8 + 1,
            log2_min_coding_block_size: read_ue_max(
                &mut br,
                2,
                "log2_min_pcm_luma_coding_block_size_minus3",
            )? + 3,
            log2_diff_max_min_coding_block_size: read_ue_max(
                &mut br,
                2,
                "log2_diff_max_min_pcm_luma_coding_block_size",
            )?,
            loop_filter_disabled: br.read_bit()? != 0,
        })
    } else {
        None
    };

    let num_short_term_ref_pic_sets = br.read_ue()?;
    if num_short_term_ref_pic_sets as usize > MAX_SHORT_TERM_RPS {
        return Err(LumenError::InvalidData(format!(
            "HEVC: num_short_term_ref_pic_sets={} 超出范围",
            num_short_term_ref_pic_sets
        )));
    }
    let mut short_term_rps = Vec::with_capacity(num_short_term_ref_pic_sets as usize);
    for idx in 0..num_short_term_ref_pic_sets as usize {
        let rps = parse_short_term_rps(
            &mut br,
            idx,
            num_short_term_ref_pic_sets as usize,
            &short_term_rps,
        )?;
        short_term_rps.push(rps);
    }

    let log2_max_poc_lsb = log2_max_poc_lsb_minus4 + 4;
    let long_term_ref_pics_present = br.read_bit()? != 0;
    let mut long_term_ref_pics = Vec::new();
    if long_term_ref_pics_present {
        let num_long_term_ref_pics = br.read_ue()?;
        if num_long_term_ref_pics > MAX_LONG_TERM_REF_PICS_SPS {
            return Err(LumenError::InvalidData(format!(
                "HEVC: num_long_term_ref_pics_sps={} 超出范围",
                num_long_term_ref_pics
            )));
        }
        for _ in 0..num_long_term_ref_pics {
            long_term_ref_pics.push(HevcLongTermRefPic {
                poc_lsb: br.read_bits(log2_max_poc_lsb)?,
                used_by_curr_pic: br.read_bit()? != 0,
            });
        }
    }

    let temporal_mvp_enabled = br.read_bit()? != 0;
    let strong_intra_smoothing_enabled = br.read_bit()? != 0;

    Ok(HevcSps {
        sps_id: sps_id as u8,
        vps_id,
        max_sub_layers: max_sub_layers_minus1 + 1,
        temporal_id_nesting,
        ptl,
        chroma_format_idc,
        separate_colour_plane,
        pic_width,
        pic_height,
        conf_win,
        bit_depth_luma,
        bit_depth_chroma,
        log2_max_poc_lsb,
        max_dec_pic_buffering_minus1,
        max_num_reorder_pics,
        log2_min_cb_size,
        log2_diff_max_min_cb_size,
        log2_min_tb_size,
        log2_diff_max_min_tb_size,
        max_transform_hierarchy_depth_inter,
        max_transform_hierarchy_depth_intra,
        scaling_list_enabled,
        scaling_list_data_present,
        amp_enabled,
        sample_adaptive_offset_enabled,
        pcm,
        short_term_rps,
        long_term_ref_pics_present,
        long_term_ref_pics,
        temporal_mvp_enabled,
        strong_intra_smoothing_enabled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::h265::add_emulation_prevention;
    use crate::testing::{SpsParams, build_sps_payload};
    use lumen_core::bitwriter::BitWriter;

    #[test]
    fn test_parse_sps_基本字段() {
        let params = SpsParams {
            sps_id: 3,
            width: 1920,
            height: 1080,
            log2_max_poc_lsb_minus4: 4,
            level_idc: 123,
            ..SpsParams::default()
        };
        let sps = parse_hevc_sps(&build_sps_payload(&params)).unwrap();
        assert_eq!(sps.sps_id, 3);
        assert_eq!(sps.pic_width, 1920);
        assert_eq!(sps.pic_height, 1080);
        assert_eq!(sps.chroma_format_idc, 1);
        assert_eq!(sps.bit_depth_luma, 8);
        assert_eq!(sps.log2_max_poc_lsb, 8);
        assert_eq!(sps.max_poc_lsb(), 256);
        assert_eq!(sps.ptl.profile_idc, 1);
        assert_eq!(sps.ptl.level_idc, 123);
        assert_eq!(sps.num_short_term_ref_pic_sets(), 0);
    }

    #[test]
    fn test_sps_ctb_数量() {
        let params = SpsParams {
            width: 64,
            height: 64,
            ..SpsParams::default()
        };
        let sps = parse_hevc_sps(&build_sps_payload(&params)).unwrap();
        // min_cb=8, diff=1 -> CTB=16
        assert_eq!(sps.ctb_log2_size(), 4);
        assert_eq!(sps.pic_size_in_ctbs(), 16);
    }

    #[test]
    fn test_sps_子层与短期参考集() {
        let params = SpsParams {
            max_sub_layers_minus1: 2,
            short_term_rps: vec![vec![-1], vec![-2, -4], vec![-1, 1]],
            long_term_pocs: vec![5, 9],
            ..SpsParams::default()
        };
        let sps = parse_hevc_sps(&build_sps_payload(&params)).unwrap();
        assert_eq!(sps.max_sub_layers, 3);
        assert_eq!(sps.num_short_term_ref_pic_sets(), 3);
        assert_eq!(sps.short_term_rps[1].delta_poc_s0, vec![-2, -4]);
        assert_eq!(sps.short_term_rps[2].num_positive_pics(), 1);
        assert!(sps.long_term_ref_pics_present);
        assert_eq!(sps.long_term_ref_pics.len(), 2);
        assert_eq!(sps.long_term_ref_pics[1].poc_lsb, 9);
    }

    #[test]
    fn test_sps_缩放列表被跳过() {
        let params = SpsParams {
            scaling_list_data: true,
            ..SpsParams::default()
        };
        let sps = parse_hevc_sps(&build_sps_payload(&params)).unwrap();
        assert!(sps.scaling_list_data_present);
        assert!(sps.strong_intra_smoothing_enabled);
    }

    #[test]
    fn test_sps_id_越界() {
        let params = SpsParams {
            sps_id: 16,
            ..SpsParams::default()
        };
        assert!(parse_hevc_sps(&build_sps_payload(&params)).is_err());
    }

    #[test]
    fn test_sps_截断() {
        let payload = build_sps_payload(&SpsParams::default());
        assert!(parse_hevc_sps(&payload[..payload.len() / 2]).is_err());
        assert!(parse_hevc_sps(&[0]).is_err());
    }

    #[test]
    fn test_sps_子层数越界() {
        let mut bw = BitWriter::new();
        bw.write_bits(0, 4);
        bw.write_bits(7, 3); // sps_max_sub_layers_minus1 = 7
        bw.write_bit(1);
        bw.write_bytes(&[0u8; 16]);
        let payload = bw.finish();
        assert!(matches!(
            parse_hevc_sps(&payload),
            Err(LumenError::InvalidData(_))
        ));
    }

    /// 写入完整 SPS, 只改变编码块与变换块尺寸字段
    fn sps_with_block_sizes(
        min_cb_minus3: u32,
        diff_cb: u32,
        min_tb_minus2: u32,
        diff_tb: u32,
    ) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bits(0, 4); // sps_video_parameter_set_id
        bw.write_bits(0, 3); // sps_max_sub_layers_minus1
        bw.write_bit(1);
        bw.write_bits(0, 32);
        bw.write_bits(0, 32);
        bw.write_bits(0, 24);
        bw.write_bits(93, 8); // general_level_idc
        bw.write_ue(0); // sps_id
        bw.write_ue(1); // chroma_format_idc
        bw.write_ue(64);
        bw.write_ue(64);
        bw.write_bit(0); // conformance_window_flag
        bw.write_ue(0);
        bw.write_ue(0);
        bw.write_ue(4); // log2_max_pic_order_cnt_lsb_minus4
        bw.write_bit(1);
        bw.write_ue(4);
        bw.write_ue(2);
        bw.write_ue(0);
        bw.write_ue(min_cb_minus3);
        bw.write_ue(diff_cb);
        bw.write_ue(min_tb_minus2);
        bw.write_ue(diff_tb);
        bw.write_ue(1);
        bw.write_ue(1);
        bw.write_bit(0); // scaling_list_enabled_flag
        bw.write_bit(1);
        bw.write_bit(1);
        bw.write_bit(0); // pcm_enabled_flag
        bw.write_ue(0); // num_short_term_ref_pic_sets
        bw.write_bit(0);
        bw.write_bit(1);
        bw.write_bit(1);
        bw.write_bit(0);
        bw.write_bit(0);
        bw.write_trailing_bits();
        add_emulation_prevention(&bw.finish())
    }

    fn assert_invalid(payload: &[u8]) {
        assert!(
            matches!(parse_hevc_sps(payload), Err(LumenError::InvalidData(_))),
            "应该返回 InvalidData"
        );
    }

    #[test]
    fn test_sps_位深越界() {
        for value in [9, 1000, u32::MAX - 1] {
            assert_invalid(&build_sps_payload(&SpsParams {
                bit_depth_luma_minus8: value,
                ..SpsParams::default()
            }));
        }
        let sps = parse_hevc_sps(&build_sps_payload(&SpsParams {
            bit_depth_luma_minus8: 8,
            ..SpsParams::default()
        }))
        .unwrap();
        assert_eq!(sps.bit_depth_luma, 16);
    }

    #[test]
    fn test_sps_图像尺寸非法() {
        let sizes = [(0, 64), (64, 0), (MAX_PIC_DIMENSION + 1, 64), (64, u32::MAX - 1)];
        for (width, height) in sizes {
            assert_invalid(&build_sps_payload(&SpsParams {
                width,
                height,
                ..SpsParams::default()
            }));
        }
        let sps = parse_hevc_sps(&build_sps_payload(&SpsParams {
            width: MAX_PIC_DIMENSION,
            height: MAX_PIC_DIMENSION,
            ..SpsParams::default()
        }))
        .unwrap();
        // CTB=16
        assert_eq!(sps.pic_size_in_ctbs(), 1056 * 1056);
    }

    #[test]
    fn test_sps_裁剪窗口() {
        let sps = parse_hevc_sps(&build_sps_payload(&SpsParams {
            conf_win: Some([2, 2, 1, 1]),
            ..SpsParams::default()
        }))
        .unwrap();
        // 4:2:0 的偏移单位为 2
        assert_eq!(sps.display_width(), 56);
        assert_eq!(sps.display_height(), 60);

        for conf_win in [[16, 16, 0, 0], [0, 0, 40, 0], [u32::MAX - 1, 2, 0, 0]] {
            assert_invalid(&build_sps_payload(&SpsParams {
                conf_win: Some(conf_win),
                ..SpsParams::default()
            }));
        }
    }

    #[test]
    fn test_sps_块尺寸越界() {
        let sps = parse_hevc_sps(&sps_with_block_sizes(0, 1, 0, 2)).unwrap();
        assert_eq!(sps.ctb_log2_size(), 4);

        assert_invalid(&sps_with_block_sizes(4, 0, 0, 2));
        assert_invalid(&sps_with_block_sizes(u32::MAX - 1, 1, 0, 2));
        assert_invalid(&sps_with_block_sizes(3, 1, 0, 2)); // CTB log2=7
        assert_invalid(&sps_with_block_sizes(0, u32::MAX - 1, 0, 2));
        assert_invalid(&sps_with_block_sizes(0, 1, u32::MAX - 1, 2));
        assert_invalid(&sps_with_block_sizes(0, 1, 0, u32::MAX - 1));
    }

    #[test]
    fn test_profile_tier_level_子层() {
        let mut bw = BitWriter::new();
        // general profile block: space=0, tier=1, idc=2
        bw.write_bits(0, 2);
        bw.write_bit(1);
        bw.write_bits(2, 5);
        bw.write_bits(0x6000_0000, 32);
        bw.write_bits(0, 32);
        bw.write_bits(0, 16);
        bw.write_bits(150, 8); // general_level_idc
        // 2 个子层: 第 0 个同时带 profile 与 level
        bw.write_bits(0b11, 2);
        bw.write_bits(0b00, 2);
        bw.write_bits(0, 2 * 6);
        bw.write_bits(0, 32);
        bw.write_bits(0, 32);
        bw.write_bits(0, 24);
        bw.write_bits(90, 8);
        bw.write_bits(0xA5, 8); // 哨兵
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        let ptl = parse_profile_tier_level(&mut br, 2).unwrap();
        assert!(ptl.tier_flag);
        assert_eq!(ptl.profile_idc, 2);
        assert_eq!(ptl.level_idc, 150);
        assert_eq!(br.read_bits(8).unwrap(), 0xA5);
    }
}
