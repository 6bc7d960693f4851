//! Nix-vector 编解码
//!
//! 把每一跳的邻居下标按可变位宽紧凑地打包进 32-bit 字数组。
//! 追加总是写在已有数据的高位之后；提取总是取剩余数据中最高（最近追加）的
//! 那一段，因此追加顺序与提取顺序互为逆序（LIFO）。
//!
//! 序列化格式（以 u32 为单位）：`[total][used][words...][epoch]`，
//! `total == 0` 时只有 `[0]`。

use std::fmt;

use crate::error::NixVectorError;

const WORD_BITS: u32 = u32::BITS;

/// 位打包的逐跳邻居下标序列
#[derive(Debug, Clone, Default)]
pub struct NixVector {
    words: Vec<u32>,
    /// 已提取的位数
    used: u32,
    /// 已追加的总位数
    total: u32,
    /// 构建时所在的路由纪元
    epoch: u32,
}

fn low_bits(bits: u32, width: u32) -> u32 {
    if width >= WORD_BITS {
        bits
    } else {
        bits & ((1u32 << width) - 1)
    }
}

impl NixVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 `n` 个邻居编号所需的最少位数；`n < 2` 时为 1
    pub fn bit_count(number_of_neighbors: u32) -> u32 {
        if number_of_neighbors < 2 {
            1
        } else {
            WORD_BITS - (number_of_neighbors - 1).leading_zeros()
        }
    }

    /// 追加 `bits` 的低 `width` 位
    ///
    /// # Panics
    /// `width > 32`
    pub fn add_neighbor_index(&mut self, bits: u32, width: u32) {
        assert!(
            width <= WORD_BITS,
            "can't add more than {WORD_BITS} bits to a nix-vector at one time (requested {width})"
        );
        if width == 0 {
            return;
        }
        let value = low_bits(bits, width);
        let offset = self.total % WORD_BITS;
        if offset == 0 {
            self.words.push(0);
        }
        let last = self.words.len() - 1;
        self.words[last] |= value << offset;
        if offset + width > WORD_BITS {
            // 跨字：剩余高位写入新字
            self.words.push(value >> (WORD_BITS - offset));
        }
        self.total += width;
    }

    /// 从剩余数据的最近追加端取出 `width` 位
    ///
    /// # Panics
    /// `width == 0`、`width > 32` 或超过剩余位数
    pub fn extract_neighbor_index(&mut self, width: u32) -> u32 {
        assert!(width != 0, "can't extract 0 bits from a nix-vector");
        assert!(
            width <= WORD_BITS,
            "can't extract more than {WORD_BITS} bits from a nix-vector at one time (requested {width})"
        );
        let remaining = self.remaining_bits();
        assert!(
            width <= remaining,
            "tried to extract {width} bits from a nix-vector with {remaining} bits remaining"
        );
        let value = self.read_bits(remaining - width, width);
        self.used += width;
        value
    }

    fn read_bits(&self, start: u32, width: u32) -> u32 {
        let word = (start / WORD_BITS) as usize;
        let offset = start % WORD_BITS;
        let mut value = self.words[word] >> offset;
        if offset + width > WORD_BITS {
            value |= self.words[word + 1] << (WORD_BITS - offset);
        }
        low_bits(value, width)
    }

    pub fn remaining_bits(&self) -> u32 {
        self.total - self.used
    }

    pub fn total_bits(&self) -> u32 {
        self.total
    }

    pub fn used_bits(&self) -> u32 {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn set_epoch(&mut self, epoch: u32) {
        self.epoch = epoch;
    }

    /// 序列化后的字节数
    pub fn serialized_size(&self) -> usize {
        self.serialized_words() * size_of::<u32>()
    }

    fn serialized_words(&self) -> usize {
        if self.total == 0 {
            1
        } else {
            3 + self.words.len()
        }
    }

    pub fn serialize(&self) -> Vec<u32> {
        let mut buf = vec![0; self.serialized_words()];
        // 长度刚好，不会失败
        let _ = self.serialize_into(&mut buf);
        buf
    }

    /// 写入 `buf`，返回写入的字数
    pub fn serialize_into(&self, buf: &mut [u32]) -> Result<usize, NixVectorError> {
        let needed = self.serialized_words();
        if buf.len() < needed {
            return Err(NixVectorError::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }
        buf[0] = self.total;
        if self.total != 0 {
            buf[1] = self.used;
            buf[2..2 + self.words.len()].copy_from_slice(&self.words);
            buf[needed - 1] = self.epoch;
        }
        Ok(needed)
    }

    pub fn deserialize(buf: &[u32]) -> Result<Self, NixVectorError> {
        let Some(&total) = buf.first() else {
            return Err(NixVectorError::Truncated {
                needed: 1,
                available: 0,
            });
        };
        if total == 0 {
            return Ok(Self::new());
        }
        let n_words = total.div_ceil(WORD_BITS) as usize;
        let needed = 3 + n_words;
        if buf.len() < needed {
            return Err(NixVectorError::Truncated {
                needed,
                available: buf.len(),
            });
        }
        let used = buf[1];
        if used > total {
            return Err(NixVectorError::InconsistentCursor { used, total });
        }
        Ok(Self {
            words: buf[2..2 + n_words].to_vec(),
            used,
            total,
            epoch: buf[needed - 1],
        })
    }
}

impl PartialEq for NixVector {
    fn eq(&self, other: &Self) -> bool {
        self.total == other.total && self.used == other.used && self.words == other.words
    }
}

impl Eq for NixVector {}

impl fmt::Display for NixVector {
    /// 最新的字在前，只打印其实际占用的位；较旧的字打印满 32 位，以 `--` 分隔
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.words.is_empty() {
            return f.write_str("-");
        }
        let last = self.words.len() - 1;
        for (i, word) in self.words.iter().enumerate().rev() {
            let width = if i == last {
                match self.total % WORD_BITS {
                    0 => WORD_BITS,
                    r => r,
                }
            } else {
                f.write_str("--")?;
                WORD_BITS
            };
            write!(f, "{:0width$b}", word, width = width as usize)?;
        }
        Ok(())
    }
}
