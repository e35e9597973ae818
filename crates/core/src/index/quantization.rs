//! Scalar quantization for IVF bucket entries.
//!
//! Each f32 vector is compressed to signed 8-bit codes plus one scale factor:
//! `scale = max(|v_i|) / 127`, `code_i = round(v_i / scale)` clamped to
//! `[-128, 127]`. Per-component reconstruction error is bounded by
//! `scale / 2`. Brute-force storage keeps full precision; only the IVF
//! variant trades precision for memory here.

/// A quantized vector together with the key that owns it.
#[derive(Debug, Clone)]
pub struct QuantizedVector {
    pub key: String,
    pub scale: f32,
    pub codes: Vec<i8>,
}

impl QuantizedVector {
    /// Quantize `vector` for `key`. All-zero vectors use a scale of 1.0 so
    /// the division is always defined.
    pub fn quantize(key: &str, vector: &[f32]) -> Self {
        let max_abs = vector.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
        let scale = if max_abs == 0.0 { 1.0 } else { max_abs / 127.0 };

        let codes = vector
            .iter()
            .map(|&v| (v / scale).round().clamp(-128.0, 127.0) as i8)
            .collect();

        Self {
            key: key.to_string(),
            scale,
            codes,
        }
    }

    /// Reconstruct the approximate f32 vector. Lossy.
    pub fn dequantize(&self) -> Vec<f32> {
        self.codes.iter().map(|&c| c as f32 * self.scale).collect()
    }

    pub fn dim(&self) -> usize {
        self.codes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_error_within_half_scale() {
        let v = vec![0.1, -2.5, 3.75, 127.0, -128.0, 0.0];
        let q = QuantizedVector::quantize("k", &v);
        let d = q.dequantize();
        let max_abs = v.iter().fold(0.0f32, |acc, x| acc.max(x.abs()));
        let bound = max_abs / 254.0 + 1e-4;
        for (orig, deq) in v.iter().zip(&d) {
            assert!(
                (orig - deq).abs() <= bound,
                "component error {} exceeds bound {bound}",
                (orig - deq).abs()
            );
        }
    }

    #[test]
    fn zero_vector_uses_unit_scale() {
        let q = QuantizedVector::quantize("z", &[0.0, 0.0, 0.0]);
        assert_eq!(q.scale, 1.0);
        assert_eq!(q.codes, vec![0, 0, 0]);
        assert_eq!(q.dequantize(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn extreme_components_hit_code_range() {
        let q = QuantizedVector::quantize("e", &[5.0, -5.0]);
        assert_eq!(q.codes[0], 127);
        assert_eq!(q.codes[1], -127);
    }

    #[test]
    fn empty_vector_is_allowed() {
        let q = QuantizedVector::quantize("empty", &[]);
        assert_eq!(q.dim(), 0);
        assert!(q.dequantize().is_empty());
    }
}
