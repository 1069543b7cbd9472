//! 短期参考图像集 (st_ref_pic_set) 解析.
//!
//! 支持显式编码与 inter RPS 预测两种形式, 推导出
//! DeltaPocS0/S1 与 UsedByCurrPicS0/S1.

use lumen_core::bitreader::BitReader;
use lumen_core::{LumenError, LumenResult};

use super::sps::read_ue_max;

/// SPS 中短期参考图像集的最大数量
pub const MAX_SHORT_TERM_RPS: usize = 64;

/// 单个方向上参考图像的最大数量
const MAX_RPS_PICS: u32 = 16;

/// delta_poc_s0/s1_minus1 与 abs_delta_rps_minus1 的上限
const MAX_DELTA_POC_MINUS1: u32 = (1 << 15) - 1;

/// 短期参考图像集
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShortTermRps {
    /// DeltaPocS0 (负方向, 由近到远)
    pub delta_poc_s0: Vec<i32>,
    /// UsedByCurrPicS0
    pub used_by_curr_pic_s0: Vec<bool>,
    /// DeltaPocS1 (正方向, 由近到远)
    pub delta_poc_s1: Vec<i32>,
    /// UsedByCurrPicS1
    pub used_by_curr_pic_s1: Vec<bool>,
}

impl ShortTermRps {
    /// NumNegativePics
    pub fn num_negative_pics(&self) -> usize {
        self.delta_poc_s0.len()
    }

    /// NumPositivePics
    pub fn num_positive_pics(&self) -> usize {
        self.delta_poc_s1.len()
    }

    /// NumDeltaPocs
    pub fn num_delta_pocs(&self) -> usize {
        self.num_negative_pics() + self.num_positive_pics()
    }

    /// 清空 (BLA 图像使用)
    pub fn clear(&mut self) {
        self.delta_poc_s0.clear();
        self.used_by_curr_pic_s0.clear();
        self.delta_poc_s1.clear();
        self.used_by_curr_pic_s1.clear();
    }
}

/// 解析 st_ref_pic_set(st_rps_idx)
///
/// `prev` 为已解析的 SPS 参考集 (索引 `0..idx`). `idx == num_sets` 表示 slice header
/// 内联的参考集, 此时会额外读取 delta_idx_minus1.
pub fn parse_short_term_rps(
    br: &mut BitReader,
    idx: usize,
    num_sets: usize,
    prev: &[ShortTermRps],
) -> LumenResult<ShortTermRps> {
    let inter_rps_pred = idx != 0 && br.read_bit()? != 0;

    if inter_rps_pred {
        let delta_idx = if idx == num_sets {
            read_ue_max(br, MAX_SHORT_TERM_RPS as u32 - 1, "delta_idx_minus1")? as usize + 1
        } else {
            1
        };
        if delta_idx > idx {
            return Err(LumenError::InvalidData(format!(
                "HEVC: delta_idx={} 超出参考集索引 {}",
                delta_idx, idx
            )));
        }
        let ref_rps = prev.get(idx - delta_idx).ok_or_else(|| {
            LumenError::InvalidData(format!("HEVC: 参考集 {} 不存在", idx - delta_idx))
        })?;

        let sign = br.read_bit()?;
        let abs_delta_rps = read_ue_max(br, MAX_DELTA_POC_MINUS1, "abs_delta_rps_minus1")?;
        let magnitude = abs_delta_rps as i32 + 1;
        let delta_rps = if sign != 0 { -magnitude } else { magnitude };

        let n = ref_rps.num_delta_pocs();
        let mut used_by_curr = Vec::with_capacity(n + 1);
        let mut use_delta = Vec::with_capacity(n + 1);
        for _ in 0..=n {
            let used = br.read_bit()? != 0;
            used_by_curr.push(used);
            use_delta.push(if used { true } else { br.read_bit()? != 0 });
        }

        Ok(predict_rps(ref_rps, delta_rps, &used_by_curr, &use_delta))
    } else {
        let num_negative = br.read_ue()?;
        let num_positive = br.read_ue()?;
        if num_negative > MAX_RPS_PICS || num_positive > MAX_RPS_PICS {
            return Err(LumenError::InvalidData(format!(
                "HEVC: RPS 图像数量无效 (neg={}, pos={})",
                num_negative, num_positive
            )));
        }

        let mut rps = ShortTermRps::default();
        let mut poc = 0i32;
        for _ in 0..num_negative {
            poc -= read_ue_max(br, MAX_DELTA_POC_MINUS1, "delta_poc_s0_minus1")? as i32 + 1;
            rps.delta_poc_s0.push(poc);
            rps.used_by_curr_pic_s0.push(br.read_bit()? != 0);
        }
        poc = 0;
        for _ in 0..num_positive {
            poc += read_ue_max(br, MAX_DELTA_POC_MINUS1, "delta_poc_s1_minus1")? as i32 + 1;
            rps.delta_poc_s1.push(poc);
            rps.used_by_curr_pic_s1.push(br.read_bit()? != 0);
        }
        Ok(rps)
    }
}

/// 由参考集与 deltaRps 推导预测的参考集 (H.265 式 7-61, 7-62)
fn predict_rps(
    ref_rps: &ShortTermRps,
    delta_rps: i32,
    used_by_curr: &[bool],
    use_delta: &[bool],
) -> ShortTermRps {
    let num_neg = ref_rps.num_negative_pics();
    let n = ref_rps.num_delta_pocs();
    let mut rps = ShortTermRps::default();

    // S0
    for j in (0..ref_rps.num_positive_pics()).rev() {
        let d = ref_rps.delta_poc_s1[j] + delta_rps;
        if d < 0 && use_delta[num_neg + j] {
            rps.delta_poc_s0.push(d);
            rps.used_by_curr_pic_s0.push(used_by_curr[num_neg + j]);
        }
    }
    if delta_rps < 0 && use_delta[n] {
        rps.delta_poc_s0.push(delta_rps);
        rps.used_by_curr_pic_s0.push(used_by_curr[n]);
    }
    for j in 0..num_neg {
        let d = ref_rps.delta_poc_s0[j] + delta_rps;
        if d < 0 && use_delta[j] {
            rps.delta_poc_s0.push(d);
            rps.used_by_curr_pic_s0.push(used_by_curr[j]);
        }
    }

    // S1
    for j in (0..num_neg).rev() {
        let d = ref_rps.delta_poc_s0[j] + delta_rps;
        if d > 0 && use_delta[j] {
            rps.delta_poc_s1.push(d);
            rps.used_by_curr_pic_s1.push(used_by_curr[j]);
        }
    }
    if delta_rps > 0 && use_delta[n] {
        rps.delta_poc_s1.push(delta_rps);
        rps.used_by_curr_pic_s1.push(used_by_curr[n]);
    }
    for j in 0..ref_rps.num_positive_pics() {
        let d = ref_rps.delta_poc_s1[j] + delta_rps;
        if d > 0 && use_delta[num_neg + j] {
            rps.delta_poc_s1.push(d);
            rps.used_by_curr_pic_s1.push(used_by_curr[num_neg + j]);
        }
    }

    rps
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::bitwriter::BitWriter;

    #[test]
    fn test_显式参考集() {
        let mut bw = BitWriter::new();
        bw.write_ue(2); // num_negative_pics
        bw.write_ue(1); // num_positive_pics
        bw.write_ue(0); // -1
        bw.write_bit(1);
        bw.write_ue(2); // -4
        bw.write_bit(0);
        bw.write_ue(1); // +2
        bw.write_bit(1);
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        let rps = parse_short_term_rps(&mut br, 0, 1, &[]).unwrap();
        assert_eq!(rps.delta_poc_s0, vec![-1, -4]);
        assert_eq!(rps.used_by_curr_pic_s0, vec![true, false]);
        assert_eq!(rps.delta_poc_s1, vec![2]);
        assert_eq!(rps.num_delta_pocs(), 3);
    }

    #[test]
    fn test_inter_rps_预测() {
        // 参考集: S0 = {-1}, S1 = {}
        let ref_rps = ShortTermRps {
            delta_poc_s0: vec![-1],
            used_by_curr_pic_s0: vec![true],
            ..ShortTermRps::default()
        };

        let mut bw = BitWriter::new();
        bw.write_bit(1); // inter_ref_pic_set_prediction_flag
        bw.write_bit(1); // delta_rps_sign = 负
        bw.write_ue(0); // abs_delta_rps_minus1 -> deltaRps = -1
        // j=0 (参考 -1 -> -2), j=1 (deltaRps 本身 -> -1)
        bw.write_bit(1);
        bw.write_bit(1);
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        let rps = parse_short_term_rps(&mut br, 1, 2, std::slice::from_ref(&ref_rps)).unwrap();
        assert_eq!(rps.delta_poc_s0, vec![-1, -2]);
        assert_eq!(rps.used_by_curr_pic_s0, vec![true, true]);
        assert!(rps.delta_poc_s1.is_empty());
    }

    #[test]
    fn test_inter_rps_slice_内联() {
        let sets = vec![
            ShortTermRps {
                delta_poc_s0: vec![-2],
                used_by_curr_pic_s0: vec![true],
                ..ShortTermRps::default()
            },
            ShortTermRps::default(),
        ];

        let mut bw = BitWriter::new();
        bw.write_bit(1); // inter_ref_pic_set_prediction_flag
        bw.write_ue(1); // delta_idx_minus1 -> 参考 sets[0]
        bw.write_bit(0); // delta_rps_sign = 正
        bw.write_ue(2); // deltaRps = 3
        bw.write_bit(1); // -2 + 3 = 1 -> S1
        bw.write_bit(0); // deltaRps 本身不使用
        bw.write_bit(0);
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        let rps = parse_short_term_rps(&mut br, 2, 2, &sets).unwrap();
        assert!(rps.delta_poc_s0.is_empty());
        assert_eq!(rps.delta_poc_s1, vec![1]);
    }

    #[test]
    fn test_inter_rps_索引越界() {
        let mut bw = BitWriter::new();
        bw.write_bit(1);
        bw.write_ue(4); // delta_idx = 5 > idx
        bw.write_bits(0, 8);
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        assert!(parse_short_term_rps(&mut br, 1, 1, &[ShortTermRps::default()]).is_err());
    }

    #[test]
    fn test_delta_poc_越界() {
        let mut bw = BitWriter::new();
        bw.write_ue(1);
        bw.write_ue(0);
        bw.write_ue(u32::MAX - 1); // delta_poc_s0_minus1
        bw.write_bit(1);
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        assert!(matches!(
            parse_short_term_rps(&mut br, 0, 1, &[]),
            Err(LumenError::InvalidData(_))
        ));

        // 上限值本身合法
        let mut bw = BitWriter::new();
        bw.write_ue(2);
        bw.write_ue(0);
        bw.write_ue(MAX_DELTA_POC_MINUS1);
        bw.write_bit(1);
        bw.write_ue(MAX_DELTA_POC_MINUS1);
        bw.write_bit(1);
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        let rps = parse_short_term_rps(&mut br, 0, 1, &[]).unwrap();
        assert_eq!(rps.delta_poc_s0, vec![-32768, -65536]);
    }

    #[test]
    fn test_abs_delta_rps_越界() {
        let mut bw = BitWriter::new();
        bw.write_bit(1); // inter_ref_pic_set_prediction_flag
        bw.write_bit(0);
        bw.write_ue(u32::MAX - 1);
        bw.write_bits(0, 8);
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        assert!(parse_short_term_rps(&mut br, 1, 2, &[ShortTermRps::default()]).is_err());
    }

    #[test]
    fn test_参考集图像数量越界() {
        let mut bw = BitWriter::new();
        bw.write_ue(17);
        bw.write_ue(0);
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        assert!(parse_short_term_rps(&mut br, 0, 1, &[]).is_err());
    }
}
