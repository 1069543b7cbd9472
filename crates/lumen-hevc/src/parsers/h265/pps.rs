//! H.265/HEVC PPS 解析器.
//!
//! PPS 通过 `pps_seq_parameter_set_id` 引用 SPS. 对 SPS 的解析在参数集存储中完成,
//! 这里只做语法层面的字段提取.

use lumen_core::bitreader::BitReader;
use lumen_core::{LumenError, LumenResult};

use super::nal::remove_emulation_prevention;
use super::sps::{MAX_SPS_COUNT, read_ue_max, skip_scaling_list_data};

/// PPS 表容量 (pps_pic_parameter_set_id 取值 0..=63)
pub const MAX_PPS_COUNT: usize = 64;

/// num_tile_columns_minus1 上限
const MAX_TILE_COLUMNS_MINUS1: u32 = 19;
/// num_tile_rows_minus1 上限
const MAX_TILE_ROWS_MINUS1: u32 = 21;

/// Tile 划分
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HevcTileLayout {
    pub num_tile_columns_minus1: u32,
    pub num_tile_rows_minus1: u32,
    pub uniform_spacing: bool,
    /// 非均匀划分时的列宽 (CTB 数 - 1)
    pub column_width_minus1: Vec<u32>,
    /// 非均匀划分时的行高 (CTB 数 - 1)
    pub row_height_minus1: Vec<u32>,
    pub loop_filter_across_tiles_enabled: bool,
}

/// 去块滤波控制
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HevcDeblockingControl {
    pub override_enabled: bool,
    pub pps_deblocking_filter_disabled: bool,
    pub beta_offset_div2: i32,
    pub tc_offset_div2: i32,
}

/// PPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcPps {
    /// PPS ID
    pub pps_id: u8,
    /// 引用的 SPS ID
    pub sps_id: u8,
    pub dependent_slice_segments_enabled: bool,
    pub output_flag_present: bool,
    /// slice header 中额外保留位的数量
    pub num_extra_slice_header_bits: u32,
    pub sign_data_hiding_enabled: bool,
    pub cabac_init_present: bool,
    pub num_ref_idx_l0_default_active: u32,
    pub num_ref_idx_l1_default_active: u32,
    pub init_qp_minus26: i32,
    pub constrained_intra_pred: bool,
    pub transform_skip_enabled: bool,
    /// cu_qp_delta_enabled_flag 为 1 时的 diff_cu_qp_delta_depth
    pub diff_cu_qp_delta_depth: Option<u32>,
    pub cb_qp_offset: i32,
    pub cr_qp_offset: i32,
    pub slice_chroma_qp_offsets_present: bool,
    pub weighted_pred: bool,
    pub weighted_bipred: bool,
    pub transquant_bypass_enabled: bool,
    pub entropy_coding_sync_enabled: bool,
    /// tiles_enabled_flag 为 1 时的 tile 划分
    pub tiles: Option<HevcTileLayout>,
    pub loop_filter_across_slices_enabled: bool,
    /// deblocking_filter_control_present_flag 为 1 时的控制参数
    pub deblocking: Option<HevcDeblockingControl>,
    /// pps_scaling_list_data_present_flag (数据只做语法跳过)
    pub scaling_list_data_present: bool,
    pub lists_modification_present: bool,
    /// log2_parallel_merge_level_minus2 + 2
    pub log2_parallel_merge_level: u32,
    pub slice_segment_header_extension_present: bool,
}

impl HevcPps {
    /// tiles_enabled_flag
    pub fn tiles_enabled(&self) -> bool {
        self.tiles.is_some()
    }
}

/// 读取 PPS 开头的 (pps_id, sps_id)
///
/// 用于在完整解析失败时判断 PPS 槽位.
pub fn peek_pps_ids(payload: &[u8]) -> LumenResult<(u32, u32)> {
    let clean = remove_emulation_prevention(&payload[..payload.len().min(16)]);
    let mut br = BitReader::new(&clean);
    let pps_id = br.read_ue()?;
    let sps_id = br.read_ue()?;
    Ok((pps_id, sps_id))
}

/// 解析 HEVC PPS
///
/// `payload` 为 NAL 头之后的数据 (含防竞争字节).
pub fn parse_hevc_pps(payload: &[u8]) -> LumenResult<HevcPps> {
    if payload.is_empty() {
        return Err(LumenError::InvalidData("HEVC: PPS RBSP 为空".into()));
    }

    let clean = remove_emulation_prevention(payload);
    let mut br = BitReader::new(&clean);

    let pps_id = br.read_ue()?;
    if pps_id as usize >= MAX_PPS_COUNT {
        return Err(LumenError::InvalidData(format!(
            "HEVC: pps_id={} 超出范围",
            pps_id
        )));
    }
    let sps_id = br.read_ue()?;
    if sps_id as usize >= MAX_SPS_COUNT {
        return Err(LumenError::InvalidData(format!(
            "HEVC: PPS 引用的 sps_id={} 超出范围",
            sps_id
        )));
    }

    let dependent_slice_segments_enabled = br.read_bit()? != 0;
    let output_flag_present = br.read_bit()? != 0;
    let num_extra_slice_header_bits = br.read_bits(3)?;
    let sign_data_hiding_enabled = br.read_bit()? != 0;
    let cabac_init_present = br.read_bit()? != 0;

    let num_ref_idx_l0_default_active =
        read_ue_max(&mut br, 14, "num_ref_idx_l0_default_active_minus1")? + 1;
    let num_ref_idx_l1_default_active =
        read_ue_max(&mut br, 14, "num_ref_idx_l1_default_active_minus1")? + 1;
    let init_qp_minus26 = br.read_se()?;
    let constrained_intra_pred = br.read_bit()? != 0;
    let transform_skip_enabled = br.read_bit()? != 0;

    let diff_cu_qp_delta_depth = if br.read_bit()? != 0 {
        Some(br.read_ue()?)
    } else {
        None
    };

    let cb_qp_offset = br.read_se()?;
    let cr_qp_offset = br.read_se()?;
    let slice_chroma_qp_offsets_present = br.read_bit()? != 0;
    let weighted_pred = br.read_bit()? != 0;
    let weighted_bipred = br.read_bit()? != 0;
    let transquant_bypass_enabled = br.read_bit()? != 0;
    let tiles_enabled = br.read_bit()? != 0;
    let entropy_coding_sync_enabled = br.read_bit()? != 0;

    let tiles = if tiles_enabled {
        Some(parse_tile_layout(&mut br)?)
    } else {
        None
    };

    let loop_filter_across_slices_enabled = br.read_bit()? != 0;

    let deblocking = if br.read_bit()? != 0 {
        let override_enabled = br.read_bit()? != 0;
        let pps_deblocking_filter_disabled = br.read_bit()? != 0;
        let (beta_offset_div2, tc_offset_div2) = if pps_deblocking_filter_disabled {
            (0, 0)
        } else {
            (br.read_se()?, br.read_se()?)
        };
        Some(HevcDeblockingControl {
            override_enabled,
            pps_deblocking_filter_disabled,
            beta_offset_div2,
            tc_offset_div2,
        })
    } else {
        None
    };

    let scaling_list_data_present = br.read_bit()? != 0;
    if scaling_list_data_present {
        skip_scaling_list_data(&mut br)?;
    }

    let lists_modification_present = br.read_bit()? != 0;
    let log2_parallel_merge_level =
        read_ue_max(&mut br, 4, "log2_parallel_merge_level_minus2")? + 2;
    let slice_segment_header_extension_present = br.read_bit()? != 0;

    Ok(HevcPps {
        pps_id: pps_id as u8,
        sps_id: sps_id as u8,
        dependent_slice_segments_enabled,
        output_flag_present,
        num_extra_slice_header_bits,
        sign_data_hiding_enabled,
        cabac_init_present,
        num_ref_idx_l0_default_active,
        num_ref_idx_l1_default_active,
        init_qp_minus26,
        constrained_intra_pred,
        transform_skip_enabled,
        diff_cu_qp_delta_depth,
        cb_qp_offset,
        cr_qp_offset,
        slice_chroma_qp_offsets_present,
        weighted_pred,
        weighted_bipred,
        transquant_bypass_enabled,
        entropy_coding_sync_enabled,
        tiles,
        loop_filter_across_slices_enabled,
        deblocking,
        scaling_list_data_present,
        lists_modification_present,
        log2_parallel_merge_level,
        slice_segment_header_extension_present,
    })
}

fn parse_tile_layout(br: &mut BitReader) -> LumenResult<HevcTileLayout> {
    let num_tile_columns_minus1 = br.read_ue()?;
    let num_tile_rows_minus1 = br.read_ue()?;
    if num_tile_columns_minus1 > MAX_TILE_COLUMNS_MINUS1 || num_tile_rows_minus1 > MAX_TILE_ROWS_MINUS1
    {
        return Err(LumenError::InvalidData(format!(
            "HEVC: tile 划分 {}x{} 超出范围",
            num_tile_columns_minus1 + 1,
            num_tile_rows_minus1 + 1
        )));
    }

    let uniform_spacing = br.read_bit()? != 0;
    let mut column_width_minus1 = Vec::new();
    let mut row_height_minus1 = Vec::new();
    if !uniform_spacing {
        for _ in 0..num_tile_columns_minus1 {
            column_width_minus1.push(br.read_ue()?);
        }
        for _ in 0..num_tile_rows_minus1 {
            row_height_minus1.push(br.read_ue()?);
        }
    }
    let loop_filter_across_tiles_enabled = br.read_bit()? != 0;

    Ok(HevcTileLayout {
        num_tile_columns_minus1,
        num_tile_rows_minus1,
        uniform_spacing,
        column_width_minus1,
        row_height_minus1,
        loop_filter_across_tiles_enabled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PpsParams, build_pps_payload};

    #[test]
    fn test_parse_pps_默认() {
        let pps = parse_hevc_pps(&build_pps_payload(&PpsParams::default())).unwrap();
        assert_eq!(pps.pps_id, 0);
        assert_eq!(pps.sps_id, 0);
        assert!(!pps.dependent_slice_segments_enabled);
        assert_eq!(pps.num_extra_slice_header_bits, 0);
        assert!(!pps.tiles_enabled());
        assert_eq!(pps.log2_parallel_merge_level, 2);
    }

    #[test]
    fn test_parse_pps_可选字段() {
        let params = PpsParams {
            pps_id: 63,
            sps_id: 15,
            dependent_slice_segments: true,
            output_flag_present: true,
            num_extra_slice_header_bits: 2,
            init_qp_minus26: -4,
            tiles: Some((3, 2, false)),
            deblocking: Some((false, -2, 3)),
            slice_header_extension: true,
            ..PpsParams::default()
        };
        let pps = parse_hevc_pps(&build_pps_payload(&params)).unwrap();
        assert_eq!(pps.pps_id, 63);
        assert_eq!(pps.sps_id, 15);
        assert!(pps.dependent_slice_segments_enabled);
        assert!(pps.output_flag_present);
        assert_eq!(pps.num_extra_slice_header_bits, 2);
        assert_eq!(pps.init_qp_minus26, -4);

        let tiles = pps.tiles.as_ref().unwrap();
        assert_eq!(tiles.num_tile_columns_minus1, 3);
        assert_eq!(tiles.num_tile_rows_minus1, 2);
        assert_eq!(tiles.column_width_minus1.len(), 3);
        assert_eq!(tiles.row_height_minus1.len(), 2);
        assert!(tiles.loop_filter_across_tiles_enabled);

        let deblocking = pps.deblocking.unwrap();
        assert_eq!(deblocking.beta_offset_div2, -2);
        assert_eq!(deblocking.tc_offset_div2, 3);
        assert!(pps.slice_segment_header_extension_present);
    }

    #[test]
    fn test_pps_去块滤波禁用时不读偏移() {
        let params = PpsParams {
            deblocking: Some((true, 0, 0)),
            slice_header_extension: true,
            ..PpsParams::default()
        };
        let pps = parse_hevc_pps(&build_pps_payload(&params)).unwrap();
        let deblocking = pps.deblocking.unwrap();
        assert!(deblocking.pps_deblocking_filter_disabled);
        assert!(pps.slice_segment_header_extension_present);
    }

    #[test]
    fn test_pps_id_越界() {
        let params = PpsParams {
            pps_id: 64,
            ..PpsParams::default()
        };
        let payload = build_pps_payload(&params);
        assert!(parse_hevc_pps(&payload).is_err());
        assert_eq!(peek_pps_ids(&payload).unwrap(), (64, 0));
    }

    #[test]
    fn test_pps_tile_越界() {
        let params = PpsParams {
            tiles: Some((20, 0, true)),
            ..PpsParams::default()
        };
        assert!(parse_hevc_pps(&build_pps_payload(&params)).is_err());
    }

    #[test]
    fn test_pps_参考索引与合并级别越界() {
        for value in [15, u32::MAX - 1] {
            let params = PpsParams {
                num_ref_idx_default_minus1: value,
                ..PpsParams::default()
            };
            assert!(matches!(
                parse_hevc_pps(&build_pps_payload(&params)),
                Err(LumenError::InvalidData(_))
            ));
        }
        let params = PpsParams {
            log2_parallel_merge_level_minus2: u32::MAX - 1,
            ..PpsParams::default()
        };
        assert!(parse_hevc_pps(&build_pps_payload(&params)).is_err());

        let pps = parse_hevc_pps(&build_pps_payload(&PpsParams {
            num_ref_idx_default_minus1: 14,
            log2_parallel_merge_level_minus2: 4,
            ..PpsParams::default()
        }))
        .unwrap();
        assert_eq!(pps.num_ref_idx_l0_default_active, 15);
        assert_eq!(pps.num_ref_idx_l1_default_active, 15);
        assert_eq!(pps.log2_parallel_merge_level, 6);
    }
}
