//! H.265/HEVC 码流解析器.
//!
//! 提供对 H.265 HEVC 码流的解析能力:
//! - NAL 单元分割与类型识别 (2 字节 NAL 头)
//! - SPS (Sequence Parameter Set) 解析, 含 profile_tier_level
//! - PPS (Picture Parameter Set) 解析
//! - 短期参考图像集 (含 inter RPS 预测)
//!
//! # HEVC NAL 头部 (2 字节)
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ forbidden(1) | type(6) | layer_id(6) | tid(3) │
//! └────────────────────────────────────────────┘
//! ```

pub mod nal;
pub mod pps;
pub mod rps;
pub mod sps;

pub use nal::{
    HevcNalHeader, HevcNalUnit, HevcNalUnitType, add_emulation_prevention, find_start_code,
    remove_emulation_prevention, split_hevc_annex_b,
};
pub use pps::{
    HevcDeblockingControl, HevcPps, HevcTileLayout, MAX_PPS_COUNT, parse_hevc_pps, peek_pps_ids,
};
pub use rps::{ShortTermRps, parse_short_term_rps};
pub use sps::{
    HevcLongTermRefPic, HevcProfileTierLevel, HevcSps, MAX_PIC_DIMENSION, MAX_SPS_COUNT,
    parse_hevc_sps,
};
