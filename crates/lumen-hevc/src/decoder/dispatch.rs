use super::*;

// ============================================================
// NAL 分发
// ============================================================

/// 单次扫描的结果
enum Scan {
    /// 已处理一个 NAL 或跳过噪声字节, 继续扫描
    Continue,
    /// 可见数据不足, 等待更多输入
    NeedMore,
}

impl<B: DecodeBackend> HevcDecoder<B> {
    /// 处理输入缓冲中所有边界已确定的 NAL 单元
    pub(super) fn decode_available(&mut self, at_eos: bool) -> LumenResult<()> {
        let result = loop {
            match self.decode_nal(at_eos) {
                Ok(Scan::Continue) => {}
                Ok(Scan::NeedMore) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.compact_input();
        result
    }

    /// 定位下一个起始码并分发其后的 NAL 单元
    fn decode_nal(&mut self, at_eos: bool) -> LumenResult<Scan> {
        let len = self.input.len();
        let lookahead = if at_eos { 0 } else { self.config.lookahead_bytes };
        let limit = len.saturating_sub(lookahead);
        if self.pos >= limit {
            return Ok(Scan::NeedMore);
        }

        let mut br = BitReader::new(&self.input[self.pos..limit]);
        if !br.search_byte(0x00, (limit - self.pos) * 8) {
            self.pos = limit;
            return Ok(Scan::NeedMore);
        }
        let start = self.pos + br.byte_position();

        if start + 3 > len {
            if at_eos {
                self.pos = len;
            } else {
                self.pos = start;
            }
            return Ok(Scan::NeedMore);
        }
        if self.input[start..start + 3] != [0x00, 0x00, 0x01] {
            // 不是起始码, 丢弃一个字节后重新搜索
            self.pos = start + 1;
            return Ok(Scan::Continue);
        }

        let body = start + 5;
        if body > len {
            if at_eos {
                self.submit_pending(start);
                self.pos = len;
            } else {
                self.pos = start;
            }
            return Ok(Scan::NeedMore);
        }

        let header = HevcNalHeader::parse([self.input[start + 3], self.input[start + 4]]);
        let nal_type = header.nal_type;
        let nal_end = match find_start_code(&self.input, body) {
            Some(end) => Some(end),
            None if at_eos => Some(len),
            None => None,
        };

        // 确认所需数据可见后才消费起始码
        let window_end = match nal_type {
            HevcNalUnitType::Sps | HevcNalUnitType::Pps => match nal_end {
                Some(end) => end,
                None => {
                    self.pos = start;
                    return Ok(Scan::NeedMore);
                }
            },
            t if t.is_slice() => {
                let want = body + self.config.slice_header_window;
                match nal_end {
                    Some(end) => end.min(want),
                    None if len >= want => want,
                    None => {
                        self.pos = start;
                        return Ok(Scan::NeedMore);
                    }
                }
            }
            _ => body,
        };

        self.submit_pending(start);
        self.pos = body;

        if header.temporal_id_plus1 == 0 {
            warn!("HEVC: nuh_temporal_id_plus1 为 0, 按 TemporalId 0 处理");
        }
        if !nal_type.is_slice() {
            self.end_frame();
        }

        match nal_type {
            HevcNalUnitType::Sps => {
                let payload = self.input[body..window_end].to_vec();
                if let Some(sps) = self.params.update_sps(&payload) {
                    self.level_idc = sps.ptl.level_idc;
                }
            }
            HevcNalUnitType::Pps => {
                let payload = self.input[body..window_end].to_vec();
                self.params.update_pps(&payload);
            }
            t if t.is_slice() => {
                let window = self.input[body..window_end].to_vec();
                self.handle_slice(header, &window)?;
            }
            other => {
                trace!("HEVC: 跳过 NAL type={} ({})", other.type_id(), other.name());
            }
        }

        Ok(Scan::Continue)
    }

    /// 解析 slice header 并在可解码时开始帧, 载荷待下一个起始码出现时提交
    fn handle_slice(&mut self, header: HevcNalHeader, window: &[u8]) -> LumenResult<()> {
        match self.slice_header(header, window) {
            Ok(SliceOutcome::Decodable) | Ok(SliceOutcome::Dependent) => {
                self.begin_frame()?;
                let [h0, h1] = header.to_bytes();
                self.pending = Some(PendingSlice {
                    header: [0x00, 0x00, 0x01, h0, h1],
                    start: self.pos,
                });
            }
            Ok(SliceOutcome::Unresolved) => {
                debug!(
                    "HEVC: slice 引用的参数集不可用, 丢弃 (type={})",
                    header.nal_type.name()
                );
            }
            Err(e) => {
                warn!(
                    "HEVC: slice header 解析失败, 丢弃 (type={}): {}",
                    header.nal_type.name(),
                    e
                );
            }
        }
        Ok(())
    }

    /// 提交待定 slice, 载荷到 `end` 为止 (不含)
    pub(super) fn submit_pending(&mut self, end: usize) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let payload = &self.input[pending.start..end.max(pending.start)];
        if let Err(e) = self.backend.decode_bitstream(
            &mut frame.target,
            &self.picture.desc,
            &[&pending.header[..], payload],
        ) {
            warn!("HEVC: decode_bitstream 失败: {}", e);
        }
    }

    /// 释放已消费的输入
    fn compact_input(&mut self) {
        let keep_from = match self.pending {
            Some(pending) => pending.start.min(self.pos),
            None => self.pos,
        };
        if keep_from == 0 {
            return;
        }
        self.input.advance(keep_from);
        self.pos -= keep_from;
        if let Some(pending) = self.pending.as_mut() {
            pending.start -= keep_from;
        }
    }
}
