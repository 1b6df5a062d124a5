//! Sub-byte sample packing.
//!
//! # 10-bit
//! Samples are appended to one continuous little-endian bit stream: sample
//! `i` occupies bits `10*i .. 10*i+10`.  Four samples fill exactly five bytes;
//! a trailing partial byte is padded with zero bits.
//!
//! # 12-bit
//! Two samples `A`, `B` occupy three bytes, high bits first:
//!
//! ```text
//! byte0 = A[11:4]
//! byte1 = A[3:0] << 4 | B[11:8]
//! byte2 = B[7:0]
//! ```
//!
//! A trailing odd sample emits two bytes (`A[11:4]`, `A[3:0] << 4`).
//!
//! Every function here is a pure function of its input slice, output slice
//! and pixel count.  Writes never exceed the output slice and reads never
//! exceed the input slice; when either is short the function stops early and
//! reports how much it produced.

use byteorder::{ByteOrder, LittleEndian};

use crate::encoding::BitDepth;

/// Byte length of `pixel_count` packed samples.
pub fn packed_len(depth: BitDepth, pixel_count: usize) -> usize {
    match depth {
        BitDepth::Ten    => (pixel_count * 10).div_ceil(8),
        BitDepth::Twelve => (pixel_count * 3).div_ceil(2),
    }
}

/// Pack the first `pixel_count` samples of `src` into `dst`.
/// Returns the number of bytes written.
pub fn pack(depth: BitDepth, src: &[u16], dst: &mut [u8], pixel_count: usize) -> usize {
    let src = &src[..pixel_count.min(src.len())];
    match depth {
        BitDepth::Ten    => pack10(src, dst),
        BitDepth::Twelve => pack12(src, dst),
    }
}

/// Unpack up to `pixel_count` samples from `src` into `dst`.
/// Returns the number of samples produced.
pub fn unpack(depth: BitDepth, src: &[u8], dst: &mut [u16], pixel_count: usize) -> usize {
    let dst_len = pixel_count.min(dst.len());
    let dst = &mut dst[..dst_len];
    match depth {
        BitDepth::Ten    => unpack10(src, dst),
        BitDepth::Twelve => unpack12(src, dst),
    }
}

fn pack10(src: &[u16], dst: &mut [u8]) -> usize {
    let mut acc:   u32   = 0;
    let mut nbits: u32   = 0;
    let mut out:   usize = 0;

    for &sample in src {
        acc |= ((sample & 0x3FF) as u32) << nbits;
        nbits += 10;
        while nbits >= 8 {
            match dst.get_mut(out) {
                Some(b) => *b = acc as u8,
                None    => return out,
            }
            out   += 1;
            acc  >>= 8;
            nbits -= 8;
        }
    }
    if nbits > 0 {
        if let Some(b) = dst.get_mut(out) {
            *b = acc as u8;
            out += 1;
        }
    }
    out
}

fn unpack10(src: &[u8], dst: &mut [u16]) -> usize {
    let mut acc:   u32 = 0;
    let mut nbits: u32 = 0;
    let mut bytes      = src.iter();

    for (written, slot) in dst.iter_mut().enumerate() {
        while nbits < 10 {
            match bytes.next() {
                Some(&b) => {
                    acc   |= (b as u32) << nbits;
                    nbits += 8;
                }
                None => return written,
            }
        }
        *slot  = (acc & 0x3FF) as u16;
        acc  >>= 10;
        nbits -= 10;
    }
    dst.len()
}

fn pack12(src: &[u16], dst: &mut [u8]) -> usize {
    let mut out   = 0;
    let mut pairs = src.chunks_exact(2);

    for pair in &mut pairs {
        let a = pair[0] & 0xFFF;
        let b = pair[1] & 0xFFF;
        match dst.get_mut(out..out + 3) {
            Some(slot) => slot.copy_from_slice(&[
                (a >> 4) as u8,
                (((a & 0xF) << 4) | (b >> 8)) as u8,
                b as u8,
            ]),
            None => return out,
        }
        out += 3;
    }
    if let [a] = pairs.remainder() {
        let a = a & 0xFFF;
        if let Some(slot) = dst.get_mut(out..out + 2) {
            slot.copy_from_slice(&[(a >> 4) as u8, ((a & 0xF) << 4) as u8]);
            out += 2;
        }
    }
    out
}

fn unpack12(src: &[u8], dst: &mut [u16]) -> usize {
    let count       = dst.len();
    let mut written = 0;
    let mut idx     = 0;

    while written < count {
        match src.get(idx..idx + 3) {
            Some(&[b0, b1, b2]) => {
                dst[written] = ((b0 as u16) << 4) | (b1 as u16 >> 4);
                written += 1;
                if written < count {
                    dst[written] = (((b1 & 0x0F) as u16) << 8) | b2 as u16;
                    written += 1;
                }
                idx += 3;
            }
            _ => {
                if let Some(&[b0, b1]) = src.get(idx..idx + 2) {
                    dst[written] = ((b0 as u16) << 4) | (b1 as u16 >> 4);
                    written += 1;
                }
                break;
            }
        }
    }
    written
}

// ── Unpacked (16-bit) storage ────────────────────────────────────────────────

/// Serialize samples as little-endian u16 into `dst`.  Returns bytes written.
pub fn store_u16(src: &[u16], dst: &mut [u8]) -> usize {
    let n = src.len().min(dst.len() / 2);
    LittleEndian::write_u16_into(&src[..n], &mut dst[..n * 2]);
    n * 2
}

/// Deserialize little-endian u16 samples from `src`.  Returns samples read.
pub fn load_u16(src: &[u8], dst: &mut [u16]) -> usize {
    let n = dst.len().min(src.len() / 2);
    LittleEndian::read_u16_into(&src[..n * 2], &mut dst[..n]);
    n
}
