//! uint8 vector quantization for on-disk embeddings.

use ndarray::Array1;

/// Pack a vector into one byte per component plus `(scale, offset)`,
/// with `value ≈ byte * scale + offset`.
pub fn quantize_uint8(vector: &Array1<f32>) -> (Vec<u8>, f32, f32) {
    if vector.is_empty() {
        return (Vec::new(), 0.0, 0.0);
    }
    let (lo, hi) = vector
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if hi - lo < 1e-9 {
        // every component equals the offset
        return (vec![0u8; vector.len()], 0.0, lo);
    }

    let step = (hi - lo) / 255.0;
    let packed = vector
        .iter()
        .map(|&v| ((v - lo) / step).round().clamp(0.0, 255.0) as u8)
        .collect();
    (packed, step, lo)
}

/// Inverse of [`quantize_uint8`].
pub fn dequantize_uint8(packed: &[u8], scale: f32, offset: f32) -> Array1<f32> {
    packed.iter().map(|&b| f32::from(b) * scale + offset).collect()
}

/// Scale to unit length. Near-zero vectors are returned unchanged.
pub fn l2_normalize(mut v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm > 1e-9 {
        v /= norm;
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_quantization_error_is_bounded() {
        let original = array![0.12, -0.7, 0.33, 0.9, 0.0, -0.05];
        let (packed, step, lo) = quantize_uint8(&original);
        let back = dequantize_uint8(&packed, step, lo);

        let max_err = original
            .iter()
            .zip(back.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err <= step / 2.0 + 1e-6);
    }

    #[test]
    fn test_constant_and_empty_vectors() {
        let (bytes, scale, offset) = quantize_uint8(&array![0.25, 0.25]);
        assert_eq!((bytes, scale, offset), (vec![0, 0], 0.0, 0.25));

        let (bytes, _, _) = quantize_uint8(&Array1::zeros(0));
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(array![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        let z = l2_normalize(array![0.0, 0.0]);
        assert_eq!(z, array![0.0, 0.0]);
    }
}
