//! 解码图像缓冲 (DPB) 重排队列.
//!
//! 条目按解码完成顺序追加, 输出时扫描最小 POC.

/// DPB 默认容量
pub const DPB_MAX_SIZE: usize = 16;

/// DPB 条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpbEntry<T> {
    /// 图像 POC
    pub poc: i32,
    /// 图像
    pub picture: T,
}

/// 解码图像缓冲
#[derive(Debug, Clone)]
pub struct Dpb<T> {
    entries: Vec<DpbEntry<T>>,
}

impl<T> Dpb<T> {
    /// 创建空 DPB
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(DPB_MAX_SIZE + 1),
        }
    }

    /// 追加图像 (不排序)
    pub fn push(&mut self, picture: T, poc: i32) {
        self.entries.push(DpbEntry { poc, picture });
    }

    /// 取出 POC 最小的图像
    ///
    /// 已有候选时, POC 为 0 的条目参与比较后即停止扫描: POC 0 标志新的编码序列,
    /// 其后的条目不参与比较.
    pub fn pop_lowest_poc(&mut self) -> Option<DpbEntry<T>> {
        let mut best: Option<usize> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            let had_candidate = best.is_some();
            if best.is_none_or(|b| entry.poc < self.entries[b].poc) {
                best = Some(i);
            }
            if had_candidate && entry.poc == 0 {
                break;
            }
        }
        // 保持剩余条目的插入顺序
        best.map(|i| self.entries.remove(i))
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 释放全部条目
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for Dpb<T> {
    fn default() -> Self {
        Self::new()
    }
}
