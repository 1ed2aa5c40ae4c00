//! Sample format conversion between device and DSP.

use wide::f32x4;

use crate::{ComplexSample, Sample};

/// Convert interleaved integer I/Q to complex floats, multiplying by `scale`.
///
/// Converts `min(dst.len(), src.len() / 2)` samples.
/// Two complex samples are handled per SIMD lane group.
pub fn convert_short_float(dst: &mut [ComplexSample], src: &[i16], scale: Sample) {
    let n = dst.len().min(src.len() / 2);
    let (dst, src) = (&mut dst[..n], &src[..n * 2]);
    let scale4 = f32x4::splat(scale);

    let mut dst_pairs = dst.chunks_exact_mut(2);
    let mut src_quads = src.chunks_exact(4);
    for (out, q) in (&mut dst_pairs).zip(&mut src_quads) {
        let v = f32x4::from([q[0] as f32, q[1] as f32, q[2] as f32, q[3] as f32]) * scale4;
        let v = v.to_array();
        out[0] = ComplexSample::new(v[0], v[1]);
        out[1] = ComplexSample::new(v[2], v[3]);
    }
    // Odd sample count leaves one sample over
    for (out, iq) in dst_pairs.into_remainder().iter_mut().zip(src_quads.remainder().chunks_exact(2)) {
        *out = ComplexSample::new(iq[0] as f32 * scale, iq[1] as f32 * scale);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_interleaved_pairs() {
        let src = [1i16, -2, 300, -400, i16::MAX, i16::MIN];
        let mut dst = [ComplexSample::new(9.0, 9.0); 3];
        convert_short_float(&mut dst, &src, 1.0);
        assert_eq!(dst[0], ComplexSample::new(1.0, -2.0));
        assert_eq!(dst[1], ComplexSample::new(300.0, -400.0));
        assert_eq!(dst[2], ComplexSample::new(32767.0, -32768.0));
    }

    #[test]
    fn scales_and_stops_at_shorter_side() {
        let src = [2i16, 4, 6, 8];
        let mut dst = [ComplexSample::new(9.0, 9.0); 3];
        convert_short_float(&mut dst, &src, 0.5);
        assert_eq!(dst[0], ComplexSample::new(1.0, 2.0));
        assert_eq!(dst[1], ComplexSample::new(3.0, 4.0));
        assert_eq!(dst[2], ComplexSample::new(9.0, 9.0));
    }
}
