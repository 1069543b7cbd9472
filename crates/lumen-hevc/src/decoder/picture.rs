//! 在途图像状态与 POC 推导.

use std::sync::Arc;

use crate::parsers::h265::{HevcNalUnitType, HevcPps, HevcSps, ShortTermRps};

/// 图像参数 (在途图像的标识属性, 随每次后端调用传递)
#[derive(Debug, Clone)]
pub struct HevcPictureDesc {
    /// 最近一个 slice 的 NAL 类型
    pub nal_type: HevcNalUnitType,
    /// TemporalId
    pub temporal_id: u8,
    /// IdrPicFlag
    pub idr_pic: bool,
    /// 是否为随机接入点 (BLA/IDR/CRA)
    pub rap_pic: bool,
    /// 生效的 PPS
    pub pps: Option<Arc<HevcPps>>,
    /// 生效的 SPS
    pub sps: Option<Arc<HevcSps>>,
    /// 边界检测使用的短期参考集索引 (即 SPS 的 num_short_term_ref_pic_sets)
    pub curr_rps_idx: usize,
    /// 实际选中的短期参考集索引, 等于 `curr_rps_idx` 时表示 slice 内联参考集
    pub st_rps_idx: usize,
    /// 选中参考集的副本 (BLA 图像已清空)
    pub st_rps: ShortTermRps,
    /// PicOrderCntVal
    pub poc: i32,
}

impl Default for HevcPictureDesc {
    fn default() -> Self {
        Self {
            nal_type: HevcNalUnitType::TrailN,
            temporal_id: 0,
            idr_pic: false,
            rap_pic: false,
            pps: None,
            sps: None,
            curr_rps_idx: 0,
            st_rps_idx: 0,
            st_rps: ShortTermRps::default(),
            poc: 0,
        }
    }
}

impl HevcPictureDesc {
    /// 生效 PPS 的 ID
    pub fn pps_id(&self) -> Option<u8> {
        self.pps.as_ref().map(|pps| pps.pps_id)
    }
}

/// 在途图像状态
///
/// 整个会话只有一个实例, 在图像之间复用, 仅在 `reset` 时清空.
#[derive(Debug, Clone, Default)]
pub struct PictureState {
    /// 当前 (或最近关闭) 图像的标识属性
    pub desc: HevcPictureDesc,
    /// 用于 POC MSB 预测的前一参考图像 POC
    pub slice_prev_poc: i32,
}

impl PictureState {
    /// 设置当前图像 POC
    ///
    /// 仅 TemporalId 为 0 的 TRAIL_R/TSA_R/STSA_R 或随机接入点更新预测锚点.
    pub fn set_poc(&mut self, poc: i32, nal_type: HevcNalUnitType, temporal_id: u8) {
        self.desc.poc = poc;
        if temporal_id == 0 && (nal_type.is_sub_layer_reference() || nal_type.is_rap()) {
            self.slice_prev_poc = poc;
        }
    }
}

/// 由 POC LSB 与前一参考图像 POC 推导 PicOrderCntVal
///
/// MSB 按半模数规则回绕; BLA 图像的 MSB 强制为 0.
pub fn derive_poc(poc_lsb: u32, prev_poc: i32, log2_max_poc_lsb: u32, is_bla: bool) -> i32 {
    let max_poc_lsb = 1i32 << log2_max_poc_lsb;
    let poc_lsb = (poc_lsb as i32) & (max_poc_lsb - 1);
    let prev_poc_lsb = prev_poc & (max_poc_lsb - 1);
    let prev_poc_msb = prev_poc.wrapping_sub(prev_poc_lsb);
    let half = max_poc_lsb / 2;

    let poc_msb = if is_bla {
        0
    } else if poc_lsb < prev_poc_lsb && prev_poc_lsb - poc_lsb >= half {
        prev_poc_msb.wrapping_add(max_poc_lsb)
    } else if poc_lsb > prev_poc_lsb && poc_lsb - prev_poc_lsb > half {
        prev_poc_msb.wrapping_sub(max_poc_lsb)
    } else {
        prev_poc_msb
    };

    poc_msb.wrapping_add(poc_lsb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poc_无回绕() {
        // log2=4, 模数 16
        assert_eq!(derive_poc(5, 3, 4, false), 5);
        assert_eq!(derive_poc(3, 5, 4, false), 3);
        assert_eq!(derive_poc(8, 0, 4, false), 8);
    }

    #[test]
    fn test_poc_正向回绕() {
        // 14 -> 2: 差 12 >= 8, MSB + 16
        assert_eq!(derive_poc(2, 14, 4, false), 18);
        // 恰好半模数时也进位
        assert_eq!(derive_poc(0, 8, 4, false), 16);
        assert_eq!(derive_poc(1, 30, 4, false), 33);
    }

    #[test]
    fn test_poc_反向回绕() {
        // 2 -> 14: 差 12 > 8, MSB - 16
        assert_eq!(derive_poc(14, 18, 4, false), 14);
        assert_eq!(derive_poc(14, 2, 4, false), -2);
        // 差恰好为半模数时不回绕
        assert_eq!(derive_poc(9, 1, 4, false), 9);
    }

    #[test]
    fn test_poc_bla_强制_msb_为零() {
        assert_eq!(derive_poc(2, 14, 4, true), 2);
        assert_eq!(derive_poc(14, 40, 4, true), 14);
    }

    #[test]
    fn test_set_poc_预测锚点() {
        let mut state = PictureState::default();
        state.set_poc(8, HevcNalUnitType::TrailR, 0);
        assert_eq!(state.slice_prev_poc, 8);

        // 非参考图像不更新锚点
        state.set_poc(9, HevcNalUnitType::TrailN, 0);
        assert_eq!(state.desc.poc, 9);
        assert_eq!(state.slice_prev_poc, 8);

        // 高时域层不更新锚点
        state.set_poc(10, HevcNalUnitType::TsaR, 1);
        assert_eq!(state.slice_prev_poc, 8);

        // 前导图像不更新锚点
        state.set_poc(7, HevcNalUnitType::RaslR, 0);
        assert_eq!(state.slice_prev_poc, 8);

        state.set_poc(0, HevcNalUnitType::Cra, 0);
        assert_eq!(state.slice_prev_poc, 0);
    }
}
