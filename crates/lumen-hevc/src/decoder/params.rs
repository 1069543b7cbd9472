//! 参数集存储.
//!
//! 固定容量的 SPS/PPS 表, 以 ID 为下标. 记录以 `Arc` 快照保存,
//! 新的同 ID 参数集整体替换旧记录.

use std::sync::Arc;

use log::{debug, warn};

use crate::parsers::h265::{
    HevcPps, HevcSps, MAX_PPS_COUNT, MAX_SPS_COUNT, parse_hevc_pps, parse_hevc_sps, peek_pps_ids,
};

/// SPS/PPS 参数集存储
#[derive(Debug, Clone)]
pub struct ParameterSetStore {
    sps: Vec<Option<Arc<HevcSps>>>,
    pps: Vec<Option<Arc<HevcPps>>>,
}

impl ParameterSetStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self {
            sps: vec![None; MAX_SPS_COUNT],
            pps: vec![None; MAX_PPS_COUNT],
        }
    }

    /// 按 ID 获取 SPS
    pub fn sps(&self, id: u32) -> Option<&Arc<HevcSps>> {
        self.sps.get(id as usize).and_then(Option::as_ref)
    }

    /// 按 ID 获取 PPS
    pub fn pps(&self, id: u32) -> Option<&Arc<HevcPps>> {
        self.pps.get(id as usize).and_then(Option::as_ref)
    }

    /// 解析 PPS ID 对应的 PPS 及其引用的 SPS
    pub fn resolve(&self, pps_id: u32) -> Option<(Arc<HevcPps>, Arc<HevcSps>)> {
        let pps = self.pps(pps_id)?;
        let sps = self.sps(u32::from(pps.sps_id))?;
        Some((Arc::clone(pps), Arc::clone(sps)))
    }

    /// 已存储的 SPS 数量
    pub fn sps_count(&self) -> usize {
        self.sps.iter().flatten().count()
    }

    /// 已存储的 PPS 数量
    pub fn pps_count(&self) -> usize {
        self.pps.iter().flatten().count()
    }

    /// 处理 SPS NAL 载荷, 成功时返回新存储的记录
    ///
    /// 解析失败或 ID 越界时不修改任何记录.
    pub fn update_sps(&mut self, payload: &[u8]) -> Option<Arc<HevcSps>> {
        match parse_hevc_sps(payload) {
            Ok(sps) => {
                debug!(
                    "HEVC: SPS id={}, {}x{}, profile={}, level={}, log2_max_poc_lsb={}, st_rps={}",
                    sps.sps_id,
                    sps.pic_width,
                    sps.pic_height,
                    sps.ptl.profile_idc,
                    sps.ptl.level_idc,
                    sps.log2_max_poc_lsb,
                    sps.num_short_term_ref_pic_sets(),
                );
                let id = sps.sps_id as usize;
                let sps = Arc::new(sps);
                self.sps[id] = Some(Arc::clone(&sps));
                Some(sps)
            }
            Err(e) => {
                warn!("HEVC: SPS 解析失败, 忽略: {}", e);
                None
            }
        }
    }

    /// 处理 PPS NAL 载荷, 成功时返回新存储的记录
    ///
    /// PPS ID 越界或语法错误时不修改任何记录. 引用的 SPS 越界或尚未收到时,
    /// 该 PPS 槽位被清空, 引用它的 slice 将被丢弃.
    pub fn update_pps(&mut self, payload: &[u8]) -> Option<Arc<HevcPps>> {
        match parse_hevc_pps(payload) {
            Ok(pps) => {
                let id = pps.pps_id as usize;
                if self.sps(u32::from(pps.sps_id)).is_none() {
                    warn!(
                        "HEVC: PPS id={} 引用的 SPS id={} 不存在, PPS 不可用",
                        pps.pps_id, pps.sps_id
                    );
                    self.pps[id] = None;
                    return None;
                }
                debug!(
                    "HEVC: PPS id={}, sps_id={}, dependent_slices={}, tiles={}",
                    pps.pps_id,
                    pps.sps_id,
                    pps.dependent_slice_segments_enabled,
                    pps.tiles_enabled(),
                );
                let pps = Arc::new(pps);
                self.pps[id] = Some(Arc::clone(&pps));
                Some(pps)
            }
            Err(e) => {
                if let Ok((pps_id, sps_id)) = peek_pps_ids(payload)
                    && (pps_id as usize) < MAX_PPS_COUNT
                    && (sps_id as usize) >= MAX_SPS_COUNT
                {
                    warn!(
                        "HEVC: PPS id={} 引用的 sps_id={} 越界, PPS 不可用",
                        pps_id, sps_id
                    );
                    self.pps[pps_id as usize] = None;
                } else {
                    warn!("HEVC: PPS 解析失败, 忽略: {}", e);
                }
                None
            }
        }
    }

    /// 清空全部参数集
    pub fn clear(&mut self) {
        self.sps.fill(None);
        self.pps.fill(None);
    }
}

impl Default for ParameterSetStore {
    fn default() -> Self {
        Self::new()
    }
}
