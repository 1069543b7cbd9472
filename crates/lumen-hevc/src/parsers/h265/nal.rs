//! H.265/HEVC NAL (Network Abstraction Layer) 单元解析.
//!
//! HEVC NAL 头部为 2 字节:
//! - forbidden_zero_bit (1 bit)
//! - nal_unit_type (6 bits)
//! - nuh_layer_id (6 bits)
//! - nuh_temporal_id_plus1 (3 bits)

use lumen_core::{LumenError, LumenResult};

/// HEVC NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum HevcNalUnitType {
    /// TRAIL_N (非参考尾随图像)
    TrailN,
    /// TRAIL_R (参考尾随图像)
    TrailR,
    /// TSA_N
    TsaN,
    /// TSA_R
    TsaR,
    /// STSA_N
    StsaN,
    /// STSA_R
    StsaR,
    /// RADL_N
    RadlN,
    /// RADL_R
    RadlR,
    /// RASL_N
    RaslN,
    /// RASL_R
    RaslR,
    /// BLA_W_LP (Broken Link Access)
    BlaWLp,
    /// BLA_W_RADL
    BlaWRadl,
    /// BLA_N_LP
    BlaNLp,
    /// IDR_W_RADL (Instantaneous Decoding Refresh)
    IdrWRadl,
    /// IDR_N_LP
    IdrNLp,
    /// CRA_NUT (Clean Random Access)
    Cra,
    /// VPS (Video Parameter Set)
    Vps,
    /// SPS (Sequence Parameter Set)
    Sps,
    /// PPS (Picture Parameter Set)
    Pps,
    /// AUD (Access Unit Delimiter)
    Aud,
    /// EOS (End of Sequence)
    Eos,
    /// EOB (End of Bitstream)
    Eob,
    /// FD (Filler Data)
    FillerData,
    /// PREFIX_SEI
    PrefixSei,
    /// SUFFIX_SEI
    SuffixSei,
    /// 保留或未指定类型
    Unknown(u8),
}

impl HevcNalUnitType {
    /// 从类型编号创建
    pub fn from_type_id(id: u8) -> Self {
        match id {
            0 => Self::TrailN,
            1 => Self::TrailR,
            2 => Self::TsaN,
            3 => Self::TsaR,
            4 => Self::StsaN,
            5 => Self::StsaR,
            6 => Self::RadlN,
            7 => Self::RadlR,
            8 => Self::RaslN,
            9 => Self::RaslR,
            16 => Self::BlaWLp,
            17 => Self::BlaWRadl,
            18 => Self::BlaNLp,
            19 => Self::IdrWRadl,
            20 => Self::IdrNLp,
            21 => Self::Cra,
            32 => Self::Vps,
            33 => Self::Sps,
            34 => Self::Pps,
            35 => Self::Aud,
            36 => Self::Eos,
            37 => Self::Eob,
            38 => Self::FillerData,
            39 => Self::PrefixSei,
            40 => Self::SuffixSei,
            _ => Self::Unknown(id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::TrailN => 0,
            Self::TrailR => 1,
            Self::TsaN => 2,
            Self::TsaR => 3,
            Self::StsaN => 4,
            Self::StsaR => 5,
            Self::RadlN => 6,
            Self::RadlR => 7,
            Self::RaslN => 8,
            Self::RaslR => 9,
            Self::BlaWLp => 16,
            Self::BlaWRadl => 17,
            Self::BlaNLp => 18,
            Self::IdrWRadl => 19,
            Self::IdrNLp => 20,
            Self::Cra => 21,
            Self::Vps => 32,
            Self::Sps => 33,
            Self::Pps => 34,
            Self::Aud => 35,
            Self::Eos => 36,
            Self::Eob => 37,
            Self::FillerData => 38,
            Self::PrefixSei => 39,
            Self::SuffixSei => 40,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        self.type_id() < 32
    }

    /// 是否为随机接入点 (BLA/IDR/CRA, 类型 16..=21)
    pub fn is_rap(&self) -> bool {
        matches!(self.type_id(), 16..=21)
    }

    /// 是否为 IDR NAL
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::IdrWRadl | Self::IdrNLp)
    }

    /// 是否为 BLA (Broken Link Access) NAL
    pub fn is_bla(&self) -> bool {
        matches!(self, Self::BlaWLp | Self::BlaWRadl | Self::BlaNLp)
    }

    /// 是否为携带 slice 的类型 (TRAIL/TSA/STSA/RADL/RASL 或随机接入点)
    ///
    /// 保留的 VCL 类型 (10..=15, 22..=31) 不视为 slice.
    pub fn is_slice(&self) -> bool {
        self.type_id() <= 9 || self.is_rap()
    }

    /// 是否为子层参考图像 (TRAIL_R/TSA_R/STSA_R)
    pub fn is_sub_layer_reference(&self) -> bool {
        matches!(self, Self::TrailR | Self::TsaR | Self::StsaR)
    }

    /// 短名称, 用于日志与探测输出
    pub fn name(&self) -> &'static str {
        match self {
            Self::TrailN => "TRAIL_N",
            Self::TrailR => "TRAIL_R",
            Self::TsaN => "TSA_N",
            Self::TsaR => "TSA_R",
            Self::StsaN => "STSA_N",
            Self::StsaR => "STSA_R",
            Self::RadlN => "RADL_N",
            Self::RadlR => "RADL_R",
            Self::RaslN => "RASL_N",
            Self::RaslR => "RASL_R",
            Self::BlaWLp => "BLA_W_LP",
            Self::BlaWRadl => "BLA_W_RADL",
            Self::BlaNLp => "BLA_N_LP",
            Self::IdrWRadl => "IDR_W_RADL",
            Self::IdrNLp => "IDR_N_LP",
            Self::Cra => "CRA_NUT",
            Self::Vps => "VPS",
            Self::Sps => "SPS",
            Self::Pps => "PPS",
            Self::Aud => "AUD",
            Self::Eos => "EOS",
            Self::Eob => "EOB",
            Self::FillerData => "FD",
            Self::PrefixSei => "PREFIX_SEI",
            Self::SuffixSei => "SUFFIX_SEI",
            Self::Unknown(_) => "UNSPEC",
        }
    }
}

/// HEVC NAL 头 (2 字节)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HevcNalHeader {
    /// NAL 类型
    pub nal_type: HevcNalUnitType,
    /// nuh_layer_id
    pub layer_id: u8,
    /// nuh_temporal_id_plus1
    pub temporal_id_plus1: u8,
}

impl HevcNalHeader {
    /// 从 2 字节 NAL 头解析 (忽略 forbidden_zero_bit)
    pub fn parse(bytes: [u8; 2]) -> Self {
        Self {
            nal_type: HevcNalUnitType::from_type_id((bytes[0] >> 1) & 0x3F),
            layer_id: ((bytes[0] & 1) << 5) | (bytes[1] >> 3),
            temporal_id_plus1: bytes[1] & 0x07,
        }
    }

    /// 重建 2 字节 NAL 头
    pub fn to_bytes(&self) -> [u8; 2] {
        [
            (self.nal_type.type_id() << 1) | (self.layer_id >> 5),
            ((self.layer_id & 0x1F) << 3) | self.temporal_id_plus1,
        ]
    }

    /// TemporalId (nuh_temporal_id_plus1 为 0 属于非法码流, 按 0 处理)
    pub fn temporal_id(&self) -> u8 {
        self.temporal_id_plus1.saturating_sub(1)
    }
}

/// HEVC NAL 单元
#[derive(Debug, Clone)]
pub struct HevcNalUnit {
    /// NAL 头
    pub header: HevcNalHeader,
    /// NAL 数据 (不含 2 字节 NAL 头, 未去除防竞争字节)
    pub data: Vec<u8>,
}

impl HevcNalUnit {
    /// 从原始 NAL 数据 (含 2 字节头) 解析
    pub fn parse(data: &[u8]) -> LumenResult<Self> {
        if data.len() < 2 {
            return Err(LumenError::InvalidData("HEVC: NAL 数据太短".into()));
        }
        Ok(Self {
            header: HevcNalHeader::parse([data[0], data[1]]),
            data: data[2..].to_vec(),
        })
    }

    /// NAL 类型
    pub fn nal_type(&self) -> HevcNalUnitType {
        self.header.nal_type
    }
}

// ============================================================
// Annex B 起始码
// ============================================================

/// 从 `from` 开始查找下一个 `00 00 01` 起始码, 返回其首字节位置
pub fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if data.len() < 3 {
        return None;
    }
    let mut i = from;
    while i + 2 < data.len() {
        if data[i + 2] > 1 {
            // 第三字节大于 1 时, 以 i+1, i+2 开头的窗口也不可能命中
            i += 3;
            continue;
        }
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// 从 Annex B 格式分割 HEVC NAL 单元
///
/// 每个 NAL 的结尾零字节 (trailing_zero_8bits 或 4 字节起始码的前导零) 会被去掉.
pub fn split_hevc_annex_b(data: &[u8]) -> Vec<HevcNalUnit> {
    let mut nalus = Vec::new();
    let mut next = find_start_code(data, 0);

    while let Some(start) = next {
        let nal_start = start + 3;
        next = find_start_code(data, nal_start);
        let mut nal_end = next.unwrap_or(data.len());
        while nal_end > nal_start && data[nal_end - 1] == 0x00 {
            nal_end -= 1;
        }
        if nal_end > nal_start
            && let Ok(nalu) = HevcNalUnit::parse(&data[nal_start..nal_end])
        {
            nalus.push(nalu);
        }
    }
    nalus
}

/// 移除 emulation prevention 字节 (00 00 03 中的 0x03)
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0usize;
    for &b in data {
        if zeros >= 2 && b == 0x03 {
            zeros = 0;
            continue;
        }
        if b == 0 {
            zeros += 1;
        } else {
            zeros = 0;
        }
        out.push(b);
    }
    out
}

/// 插入 emulation prevention 字节, 使 RBSP 中不出现起始码前缀
pub fn add_emulation_prevention(rbsp: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rbsp.len() + rbsp.len() / 64 + 1);
    let mut zeros = 0usize;
    for &b in rbsp {
        if zeros >= 2 && b <= 0x03 {
            out.push(0x03);
            zeros = 0;
        }
        if b == 0 {
            zeros += 1;
        } else {
            zeros = 0;
        }
        out.push(b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hevc_nal_类型() {
        assert_eq!(HevcNalUnitType::from_type_id(19), HevcNalUnitType::IdrWRadl);
        assert_eq!(HevcNalUnitType::from_type_id(33), HevcNalUnitType::Sps);
        assert_eq!(HevcNalUnitType::from_type_id(34), HevcNalUnitType::Pps);
        assert!(HevcNalUnitType::IdrWRadl.is_idr());
        assert!(HevcNalUnitType::IdrWRadl.is_rap());
        assert!(!HevcNalUnitType::TrailR.is_rap());
        assert!(HevcNalUnitType::TrailR.is_vcl());
        assert!(!HevcNalUnitType::Vps.is_vcl());
        assert!(HevcNalUnitType::BlaNLp.is_bla());
        assert!(!HevcNalUnitType::Cra.is_bla());
    }

    #[test]
    fn test_slice_类型判定() {
        for id in 0..=9 {
            assert!(HevcNalUnitType::from_type_id(id).is_slice(), "type={}", id);
        }
        for id in 16..=21 {
            assert!(HevcNalUnitType::from_type_id(id).is_slice(), "type={}", id);
        }
        for id in [10, 15, 22, 31, 32, 33, 34, 35, 39, 63] {
            assert!(!HevcNalUnitType::from_type_id(id).is_slice(), "type={}", id);
        }
        assert!(HevcNalUnitType::TsaR.is_sub_layer_reference());
        assert!(!HevcNalUnitType::TrailN.is_sub_layer_reference());
        assert!(!HevcNalUnitType::RadlR.is_sub_layer_reference());
    }

    #[test]
    fn test_nal_头解析与重建() {
        // type=33 (SPS), layer_id=0, temporal_id_plus1=1
        let header = HevcNalHeader::parse([0x42, 0x01]);
        assert_eq!(header.nal_type, HevcNalUnitType::Sps);
        assert_eq!(header.layer_id, 0);
        assert_eq!(header.temporal_id(), 0);
        assert_eq!(header.to_bytes(), [0x42, 0x01]);

        let header = HevcNalHeader {
            nal_type: HevcNalUnitType::TrailR,
            layer_id: 33,
            temporal_id_plus1: 3,
        };
        assert_eq!(HevcNalHeader::parse(header.to_bytes()), header);
        assert_eq!(header.temporal_id(), 2);
    }

    #[test]
    fn test_temporal_id_plus1_为零() {
        let header = HevcNalHeader::parse([0x02, 0x00]);
        assert_eq!(header.temporal_id(), 0);
    }

    #[test]
    fn test_find_start_code() {
        let data = [0xAA, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x40];
        assert_eq!(find_start_code(&data, 0), Some(5));
        assert_eq!(find_start_code(&data, 6), None);
        assert_eq!(find_start_code(&[0, 0], 0), None);
    }

    #[test]
    fn test_annex_b_分割() {
        let mut data = Vec::new();
        // VPS NAL: type=32 -> byte0=(32<<1)|0=0x40, byte1=0x01
        data.extend_from_slice(&[0, 0, 0, 1, 0x40, 0x01, 0x11, 0x22]);
        // SPS NAL: type=33 -> byte0=(33<<1)|0=0x42, byte1=0x01
        data.extend_from_slice(&[0, 0, 1, 0x42, 0x01, 0x33]);
        // PPS NAL: type=34 -> byte0=(34<<1)|0=0x44, byte1=0x01
        data.extend_from_slice(&[0, 0, 0, 1, 0x44, 0x01, 0x44]);

        let nalus = split_hevc_annex_b(&data);
        assert_eq!(nalus.len(), 3);
        assert_eq!(nalus[0].nal_type(), HevcNalUnitType::Vps);
        assert_eq!(nalus[0].data, vec![0x11, 0x22]);
        assert_eq!(nalus[1].nal_type(), HevcNalUnitType::Sps);
        assert_eq!(nalus[1].data, vec![0x33]);
        assert_eq!(nalus[2].nal_type(), HevcNalUnitType::Pps);
    }

    #[test]
    fn test_emulation_prevention() {
        let data = [0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x03, 0x00];
        let rbsp = remove_emulation_prevention(&data);
        assert_eq!(rbsp, vec![0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(add_emulation_prevention(&rbsp), data.to_vec());
    }

    #[test]
    fn test_emulation_prevention_连续零() {
        let rbsp = [0x00, 0x00, 0x00, 0x00, 0x00, 0x02];
        let ebsp = add_emulation_prevention(&rbsp);
        assert_eq!(ebsp, vec![0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x00, 0x02]);
        assert!(find_start_code(&ebsp, 0).is_none());
        assert_eq!(remove_emulation_prevention(&ebsp), rbsp.to_vec());
    }
}
