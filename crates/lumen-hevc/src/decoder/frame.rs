use super::*;

// ============================================================
// 帧会话: 后端创建、帧开始/结束与 DPB 输出
// ============================================================

impl<B: DecodeBackend> HevcDecoder<B> {
    /// 由当前图像的 SPS 构造后端创建参数
    fn build_template(&self) -> LumenResult<CodecTemplate> {
        let sps = self
            .picture
            .desc
            .sps
            .as_ref()
            .ok_or_else(|| LumenError::Internal("HEVC: 开始帧时没有可用的 SPS".into()))?;
        Ok(CodecTemplate {
            profile: HevcProfile::from_profile_idc(sps.ptl.profile_idc),
            entrypoint: Entrypoint::Bitstream,
            chroma_format: ChromaFormat::from_idc(sps.chroma_format_idc),
            width: align4(sps.pic_width),
            height: align4(sps.pic_height),
            level_idc: self.level_idc,
            expect_chunked_decode: true,
        })
    }

    /// 开始一帧 (已有在途帧时不做任何事)
    ///
    /// 后端实例在会话的第一帧时惰性创建, 创建失败向调用方返回错误.
    /// 解码目标分配或 begin_frame 失败只记录日志, 该图像的 slice 随后被丢弃.
    pub(super) fn begin_frame(&mut self) -> LumenResult<()> {
        if self.frame.is_some() || self.frame_dropped {
            return Ok(());
        }

        let template = match &self.template {
            Some(template) => template.clone(),
            None => {
                let template = self.build_template()?;
                self.backend.create(&template)?;
                debug!(
                    "HEVC: 创建解码后端, {} {}x{}, level={}",
                    template.profile.name(),
                    template.width,
                    template.height,
                    template.level_idc
                );
                self.template = Some(template.clone());
                template
            }
        };

        let mut target = match self.backend.alloc_target(&template) {
            Ok(target) => target,
            Err(e) => {
                warn!("HEVC: 分配解码目标失败, 丢弃图像: {}", e);
                self.frame_dropped = true;
                return Ok(());
            }
        };
        if let Err(e) = self.backend.begin_frame(&mut target, &self.picture.desc) {
            warn!("HEVC: begin_frame 失败, 丢弃图像: {}", e);
            self.frame_dropped = true;
            return Ok(());
        }

        let decode_index = self.next_decode_index;
        self.next_decode_index = self.next_decode_index.wrapping_add(1);
        trace!(
            "HEVC: 开始帧 #{} poc={} type={}",
            decode_index,
            self.picture.desc.poc,
            self.picture.desc.nal_type.name()
        );
        self.frame = Some(OpenFrame {
            target,
            decode_index,
        });
        Ok(())
    }

    /// 结束在途帧并送入 DPB, 超出容量时按最小 POC 输出一帧
    ///
    /// 没有在途帧时不做任何事.
    pub(super) fn end_frame(&mut self) {
        self.frame_dropped = false;
        let Some(mut frame) = self.frame.take() else {
            return;
        };
        if let Err(e) = self.backend.end_frame(&mut frame.target, &self.picture.desc) {
            warn!("HEVC: end_frame 失败: {}", e);
        }

        let poc = self.picture.desc.poc;
        trace!("HEVC: 结束帧 #{} poc={}", frame.decode_index, poc);
        self.dpb.push(
            DecodedPicture {
                target: frame.target,
                poc,
                decode_index: frame.decode_index,
                nal_type: self.picture.desc.nal_type,
            },
            poc,
        );

        if self.dpb.len() > self.config.dpb_max_size
            && let Some(entry) = self.dpb.pop_lowest_poc()
        {
            self.output.push_back(entry.picture);
        }
    }

    /// 按 POC 顺序排空 DPB
    pub(super) fn flush_dpb(&mut self) {
        while let Some(entry) = self.dpb.pop_lowest_poc() {
            self.output.push_back(entry.picture);
        }
    }
}

fn align4(value: u32) -> u32 {
    value.saturating_add(3) & !3
}
