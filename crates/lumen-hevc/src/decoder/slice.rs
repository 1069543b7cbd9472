use super::*;

// ============================================================
// Slice header 与图像边界检测
// ============================================================

/// slice header 解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOutcome {
    /// 独立 slice, 可以提交
    Decodable,
    /// 依赖 slice, 解析止于 slice_segment_address, 可以提交
    Dependent,
    /// PPS 或其 SPS 不可用, slice 被丢弃
    Unresolved,
}

/// 满足 `1 << n >= value` 的最小 n
fn ceil_log2(value: usize) -> u32 {
    let mut bits = 0;
    while (1usize << bits) < value {
        bits += 1;
    }
    bits
}

impl<B: DecodeBackend> HevcDecoder<B> {
    /// 解析 slice header 前缀, 边界规则随各字段的确定依次触发
    ///
    /// `window` 为 NAL 头之后的 slice 数据 (含防竞争字节, 可截断).
    pub(super) fn slice_header(
        &mut self,
        header: HevcNalHeader,
        window: &[u8],
    ) -> LumenResult<SliceOutcome> {
        let nal_type = header.nal_type;
        let is_idr = nal_type.is_idr();
        let is_rap = nal_type.is_rap();

        let clean = remove_emulation_prevention(window);
        let mut br = BitReader::new(&clean);

        if self.picture.desc.idr_pic != is_idr {
            self.end_frame();
        }
        self.picture.desc.idr_pic = is_idr;

        let first_slice_segment_in_pic = br.read_bit()? != 0;
        if first_slice_segment_in_pic {
            self.end_frame();
        }

        if is_rap {
            br.skip_bits(1)?; // no_output_of_prior_pics_flag
        }

        let pps_id = br.read_ue()?;
        let Some((pps, sps)) = self.params.resolve(pps_id) else {
            return Ok(SliceOutcome::Unresolved);
        };

        if self.picture.desc.pps_id() != Some(pps.pps_id) {
            self.end_frame();
        }
        self.picture.desc.pps = Some(Arc::clone(&pps));
        self.picture.desc.sps = Some(Arc::clone(&sps));

        if self.picture.desc.rap_pic != is_rap {
            self.end_frame();
        }
        self.picture.desc.rap_pic = is_rap;

        let num_st_rps = sps.num_short_term_ref_pic_sets();
        if self.picture.desc.curr_rps_idx != num_st_rps {
            self.end_frame();
        }
        self.picture.desc.curr_rps_idx = num_st_rps;

        let mut dependent_slice_segment = false;
        if !first_slice_segment_in_pic {
            if pps.dependent_slice_segments_enabled {
                dependent_slice_segment = br.read_bit()? != 0;
            }
            let address_bits = ceil_log2(sps.pic_size_in_ctbs() as usize);
            br.skip_bits(address_bits)?; // slice_segment_address
        }

        if dependent_slice_segment {
            self.commit_slice_identity(header);
            return Ok(SliceOutcome::Dependent);
        }

        br.skip_bits(pps.num_extra_slice_header_bits)?; // slice_reserved_flag
        br.read_ue()?; // slice_type
        if pps.output_flag_present {
            br.skip_bits(1)?; // pic_output_flag
        }
        if sps.separate_colour_plane {
            br.skip_bits(2)?; // colour_plane_id
        }

        if is_idr {
            self.picture.set_poc(0, nal_type, header.temporal_id());
            self.picture.desc.st_rps_idx = num_st_rps;
            self.picture.desc.st_rps.clear();
            self.commit_slice_identity(header);
            return Ok(SliceOutcome::Decodable);
        }

        let poc_lsb = br.read_bits(sps.log2_max_poc_lsb)?;
        let poc = derive_poc(
            poc_lsb,
            self.picture.slice_prev_poc,
            sps.log2_max_poc_lsb,
            nal_type.is_bla(),
        );
        if self.picture.desc.poc != poc {
            self.end_frame();
        }
        self.picture.set_poc(poc, nal_type, header.temporal_id());

        let short_term_ref_pic_set_sps_flag = br.read_bit()? != 0;
        let (st_rps_idx, mut st_rps) = if !short_term_ref_pic_set_sps_flag {
            let rps = parse_short_term_rps(&mut br, num_st_rps, num_st_rps, &sps.short_term_rps)?;
            (num_st_rps, rps)
        } else {
            if num_st_rps == 0 {
                return Err(LumenError::InvalidData(
                    "HEVC: short_term_ref_pic_set_sps_flag 为 1 但 SPS 未声明参考集".into(),
                ));
            }
            let idx = br.read_bits(ceil_log2(num_st_rps))? as usize;
            let rps = sps.short_term_rps.get(idx).cloned().ok_or_else(|| {
                LumenError::InvalidData(format!(
                    "HEVC: short_term_ref_pic_set_idx={} 超出范围 {}",
                    idx, num_st_rps
                ))
            })?;
            (idx, rps)
        };

        if nal_type.is_bla() {
            st_rps.clear();
        }
        self.picture.desc.st_rps_idx = st_rps_idx;
        self.picture.desc.st_rps = st_rps;
        self.commit_slice_identity(header);

        Ok(SliceOutcome::Decodable)
    }

    /// 记录当前 slice 的 NAL 类型与 TemporalId (所有边界规则检查完毕之后)
    fn commit_slice_identity(&mut self, header: HevcNalHeader) {
        self.picture.desc.nal_type = header.nal_type;
        self.picture.desc.temporal_id = header.temporal_id();
    }
}
