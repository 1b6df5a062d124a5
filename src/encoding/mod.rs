//! LOG2 sample quantization for 10- and 12-bit sensor data.
//!
//! The forward curve maps a linear sample `s` with black level `b` and white
//! level `w` onto an `N`-bit code:
//!
//! ```text
//! n    = clamp((s - b) / (w - b), 0, 1)
//! code = round(log2(n * (2^N - 1) + 1) / N * (2^N - 1))
//! ```
//!
//! Samples at or below black map to code 0.  The curve is monotonic and
//! deliberately lossy: shadows get more codes than highlights, so the decoded
//! value differs from the source by a small, signal-dependent amount.
//!
//! All arithmetic is single precision with `+0.5` truncation, so files written
//! here decode identically to files written by other VRAW implementations.
//!
//! The batch functions are defined as the scalar function applied to every
//! element.  With the `parallel` feature they fan out over a Rayon pool; the
//! output is identical either way.

/// Sample depth of an encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Ten,
    Twelve,
}

impl BitDepth {
    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            BitDepth::Ten    => 10,
            BitDepth::Twelve => 12,
        }
    }

    /// Largest representable code, `2^bits - 1`.
    #[inline]
    pub fn max_code(self) -> u16 {
        match self {
            BitDepth::Ten    => 0x3FF,
            BitDepth::Twelve => 0xFFF,
        }
    }
}

// ── Scalar curve ─────────────────────────────────────────────────────────────

/// Forward LOG2 curve for one sample.
#[inline]
pub fn encode_sample(depth: BitDepth, sample: u16, black_level: u16, white_level: u16) -> u16 {
    let linear = sample as i32 - black_level as i32;
    if linear <= 0 {
        return 0;
    }

    let range      = white_level as f32 - black_level as f32;
    let normalized = (linear as f32 / range).clamp(0.0, 1.0);

    let max_code = depth.max_code() as f32;
    let encoded  = (normalized * max_code + 1.0).log2() / (max_code + 1.0).log2();
    let code     = (encoded * max_code + 0.5) as u16;
    code.min(depth.max_code())
}

/// Inverse LOG2 curve for one code.
#[inline]
pub fn decode_sample(depth: BitDepth, code: u16, black_level: u16, white_level: u16) -> u16 {
    let max_code   = depth.max_code() as f32;
    let normalized = code as f32 / max_code;
    let linear     = (((normalized * depth.bits() as f32).exp2() - 1.0) / max_code).clamp(0.0, 1.0);

    let range = white_level as f32 - black_level as f32;
    let value = (linear * range + black_level as f32 + 0.5) as i32;
    value.clamp(0, u16::MAX as i32) as u16
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[cfg(feature = "parallel")]
const PARALLEL_CHUNK: usize = 16 * 1024;

/// Encode `input` into `output`.  Processes `min(input.len(), output.len())`
/// samples and returns that count.
pub fn encode_buffer(
    depth:       BitDepth,
    input:       &[u16],
    output:      &mut [u16],
    black_level: u16,
    white_level: u16,
) -> usize {
    map_buffer(input, output, |s| encode_sample(depth, s, black_level, white_level))
}

/// Decode `input` into `output`.  Same length rules as [`encode_buffer`].
pub fn decode_buffer(
    depth:       BitDepth,
    input:       &[u16],
    output:      &mut [u16],
    black_level: u16,
    white_level: u16,
) -> usize {
    map_buffer(input, output, |c| decode_sample(depth, c, black_level, white_level))
}

/// Decode a buffer of codes in place.
pub fn decode_in_place(depth: BitDepth, samples: &mut [u16], black_level: u16, white_level: u16) {
    for s in samples.iter_mut() {
        *s = decode_sample(depth, *s, black_level, white_level);
    }
}

#[cfg(not(feature = "parallel"))]
fn map_buffer<F>(input: &[u16], output: &mut [u16], f: F) -> usize
where
    F: Fn(u16) -> u16,
{
    let n = input.len().min(output.len());
    for (dst, &src) in output[..n].iter_mut().zip(&input[..n]) {
        *dst = f(src);
    }
    n
}

#[cfg(feature = "parallel")]
fn map_buffer<F>(input: &[u16], output: &mut [u16], f: F) -> usize
where
    F: Fn(u16) -> u16 + Sync,
{
    use rayon::prelude::*;

    let n = input.len().min(output.len());
    output[..n]
        .par_chunks_mut(PARALLEL_CHUNK)
        .zip(input[..n].par_chunks(PARALLEL_CHUNK))
        .for_each(|(dst, src)| {
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = f(s);
            }
        });
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn below_black_clips_to_zero() {
        assert_eq!(encode_sample(BitDepth::Ten, 0, 64, 1023), 0);
        assert_eq!(encode_sample(BitDepth::Ten, 64, 64, 1023), 0);
        assert_eq!(encode_sample(BitDepth::Twelve, 10, 64, 4095), 0);
    }

    #[test]
    fn white_maps_to_max_code() {
        assert_eq!(encode_sample(BitDepth::Ten, 1023, 64, 1023), 1023);
        assert_eq!(encode_sample(BitDepth::Twelve, 4095, 64, 4095), 4095);
        // Above white saturates instead of wrapping.
        assert_eq!(encode_sample(BitDepth::Ten, 60_000, 64, 1023), 1023);
    }

    #[test]
    fn curve_expands_shadows() {
        // One step above black already lands well above code 1.
        let code = encode_sample(BitDepth::Ten, 65, 64, 1023);
        assert!(code > 50, "code {code}");
        // Mid-scale linear sits high on the code scale.
        let mid = encode_sample(BitDepth::Ten, 64 + 480, 64, 1023);
        assert!(mid > 850 && mid < 1023, "mid {mid}");
    }

    #[test]
    fn decode_endpoints() {
        assert_eq!(decode_sample(BitDepth::Ten, 0, 64, 1023), 64);
        assert_eq!(decode_sample(BitDepth::Ten, 1023, 64, 1023), 1023);
        assert_eq!(decode_sample(BitDepth::Twelve, 0, 64, 4095), 64);
        assert_eq!(decode_sample(BitDepth::Twelve, 4095, 64, 4095), 4095);
    }

    #[test]
    fn degenerate_range_does_not_panic() {
        assert_eq!(encode_sample(BitDepth::Ten, 500, 500, 500), 0);
        assert_eq!(encode_sample(BitDepth::Ten, 600, 500, 500), 1023);
        let _ = decode_sample(BitDepth::Twelve, 4095, 4000, 100);
    }

    #[test]
    fn batch_matches_scalar() {
        let input: Vec<u16> = (0..5000u32).map(|i| (i * 13 % 4096) as u16).collect();
        let mut out = vec![0u16; input.len()];
        assert_eq!(encode_buffer(BitDepth::Twelve, &input, &mut out, 200, 4000), input.len());
        for (i, &s) in input.iter().enumerate() {
            assert_eq!(out[i], encode_sample(BitDepth::Twelve, s, 200, 4000));
        }

        let mut back = vec![0u16; out.len()];
        decode_buffer(BitDepth::Twelve, &out, &mut back, 200, 4000);
        let mut in_place = out.clone();
        decode_in_place(BitDepth::Twelve, &mut in_place, 200, 4000);
        assert_eq!(back, in_place);
    }

    #[test]
    fn batch_stops_at_shorter_slice() {
        let input = [100u16; 10];
        let mut out = [0u16; 4];
        assert_eq!(encode_buffer(BitDepth::Ten, &input, &mut out, 64, 1023), 4);
    }

    proptest! {
        #[test]
        fn encode_is_monotonic(a in 0u16..=1023, b in 0u16..=1023) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                encode_sample(BitDepth::Ten, lo, 64, 1023) <= encode_sample(BitDepth::Ten, hi, 64, 1023)
            );
        }

        #[test]
        fn log10_roundtrip_error_is_bounded(s in 65u16..=1023) {
            let code = encode_sample(BitDepth::Ten, s, 64, 1023);
            prop_assert!(code <= 1023);
            let back = decode_sample(BitDepth::Ten, code, 64, 1023);
            prop_assert!((back as i32 - s as i32).abs() <= 4, "{} -> {} -> {}", s, code, back);
        }

        #[test]
        fn log12_roundtrip_error_is_bounded(s in 65u16..=4095) {
            let code = encode_sample(BitDepth::Twelve, s, 64, 4095);
            prop_assert!(code <= 4095);
            let back = decode_sample(BitDepth::Twelve, code, 64, 4095);
            prop_assert!((back as i32 - s as i32).abs() <= 8, "{} -> {} -> {}", s, code, back);
        }
    }
}
