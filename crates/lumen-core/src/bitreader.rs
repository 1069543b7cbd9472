//! 比特流读取器.
//!
//! 提供从字节缓冲区中按位读取数据的能力, 是 HEVC 参数集与 slice header 解析的基础设施.
//!
//! 按大端位序读取 (MSB first), 并支持 Exp-Golomb 变长码与字节搜索.

use crate::{LumenError, LumenResult};

/// 比特流读取器
///
/// 从字节缓冲区中按位读取数据, 使用大端位序 (MSB first).
///
/// # 示例
/// ```
/// use lumen_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
/// ```
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> LumenResult<u32> {
        if self.byte_pos >= self.data.len() {
            return Err(LumenError::Eof);
        }

        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Ok(u32::from(bit))
    }

    /// 读取 N 个位 (最多 32 位)
    ///
    /// 按大端位序读取, 返回值的低 N 位有效.
    pub fn read_bits(&mut self, n: u32) -> LumenResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(LumenError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(LumenError::Eof);
        }

        let mut result: u32 = 0;
        let mut remaining = n;

        while remaining > 0 {
            let available = 8 - self.bit_pos as u32;
            let to_read = remaining.min(available);

            // 从当前字节中提取位
            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;

            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= to_read;
        }

        Ok(result)
    }

    /// 读取无符号 Exp-Golomb 码 ue(v)
    ///
    /// 前导零超过 31 个视为码流损坏.
    pub fn read_ue(&mut self) -> LumenResult<u32> {
        let mut leading_zeros = 0u32;
        while self.read_bit()? == 0 {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(LumenError::InvalidData("Exp-Golomb 前导零过长".into()));
            }
        }
        if leading_zeros == 0 {
            return Ok(0);
        }
        let suffix = self.read_bits(leading_zeros)?;
        Ok(((1u64 << leading_zeros) - 1 + u64::from(suffix)) as u32)
    }

    /// 读取有符号 Exp-Golomb 码 se(v)
    ///
    /// 映射关系: 0 → 0, 1 → 1, 2 → -1, 3 → 2, 4 → -2 ...
    pub fn read_se(&mut self) -> LumenResult<i32> {
        let code = self.read_ue()?;
        let val = code.div_ceil(2) as i32;
        if code % 2 == 0 { Ok(-val) } else { Ok(val) }
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) -> LumenResult<()> {
        if (n as usize) > self.bits_left() {
            return Err(LumenError::Eof);
        }

        let total_bits = self.bit_pos as u32 + n;
        self.byte_pos += (total_bits / 8) as usize;
        self.bit_pos = (total_bits % 8) as u8;

        Ok(())
    }

    /// 对齐到下一个字节边界
    ///
    /// 如果当前已在字节边界, 则不做任何事.
    pub fn align_to_byte(&mut self) {
        if self.bit_pos > 0 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
    }

    /// 搜索指定字节值
    ///
    /// 先对齐到字节边界, 然后逐字节前进, 直到当前字节等于 `value` (不消耗该字节)
    /// 或者已扫描的位数达到 `max_bits`. 找到返回 `true`.
    pub fn search_byte(&mut self, value: u8, max_bits: usize) -> bool {
        self.align_to_byte();
        let mut budget = max_bits / 8;
        while budget > 0 && self.byte_pos < self.data.len() {
            if self.data[self.byte_pos] == value {
                return true;
            }
            self.byte_pos += 1;
            budget -= 1;
        }
        false
    }

    /// 获取当前字节位置
    pub fn byte_position(&self) -> usize {
        self.byte_pos
    }
}
