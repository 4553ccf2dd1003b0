// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Similarity and distance kernels.

/// Accumulation width. Summing in independent lanes lets the compiler
/// vectorize; results match a scalar loop within float tolerance.
const LANES: usize = 4;

/// Inner product of two vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);
    let mut acc = [0.0f32; LANES];

    let chunks_a = a.chunks_exact(LANES);
    let chunks_b = b.chunks_exact(LANES);
    let tail: f32 = chunks_a
        .remainder()
        .iter()
        .zip(chunks_b.remainder())
        .map(|(x, y)| x * y)
        .sum();

    for (ca, cb) in chunks_a.zip(chunks_b) {
        for lane in 0..LANES {
            acc[lane] += ca[lane] * cb[lane];
        }
    }

    acc.iter().sum::<f32>() + tail
}

fn norm(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

/// `dot(a, b) / (|a| * |b|)`, or 0 when either norm is 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);
    let denom = norm(a) * norm(b);
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    dot_product(a, b) / denom
}

/// Euclidean distance.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Number of differing bits between two bit-packed vectors.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let n = norm(v);
    if n > f32::EPSILON {
        v.iter().map(|x| x / n).collect()
    } else {
        v.to_vec()
    }
}

/// Contrastive InfoNCE loss with cosine similarity scaled by `temperature`.
///
/// `-ln(exp(s+/T) / (exp(s+/T) + sum exp(s-_i/T)))`, computed with the
/// log-sum-exp trick. A non-positive temperature is treated as 1.
pub fn info_nce_loss(anchor: &[f32], positive: &[f32], negatives: &[&[f32]], temperature: f32) -> f32 {
    let t = if temperature > 0.0 && temperature.is_finite() {
        temperature
    } else {
        1.0
    };
    let pos = cosine_similarity(anchor, positive) / t;
    let logits: Vec<f32> = std::iter::once(pos)
        .chain(negatives.iter().map(|n| cosine_similarity(anchor, n) / t))
        .collect();
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let log_sum_exp = max + logits.iter().map(|l| (l - max).exp()).sum::<f32>().ln();
    log_sum_exp - pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_matches_scalar_loop() {
        let a: Vec<f32> = (0..13).map(|i| i as f32 * 0.5).collect();
        let b: Vec<f32> = (0..13).map(|i| 1.0 - i as f32 * 0.1).collect();
        let scalar: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!((dot_product(&a, &b) - scalar).abs() < 1e-4);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_self_is_one() {
        let v = [0.3, -1.2, 4.0, 0.01, 7.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn l2_known_value() {
        assert!((l2_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn hamming_counts_bits() {
        assert_eq!(hamming_distance(&[0b1010_1010], &[0b0101_0101]), 8);
        assert_eq!(hamming_distance(&[0xFF, 0x00], &[0xFF, 0x01]), 1);
        assert_eq!(hamming_distance(&[], &[]), 0);
    }

    #[test]
    fn normalize_general_and_zero() {
        let n = l2_normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn info_nce_matches_closed_form() {
        let anchor = [1.0, 0.0];
        let positive = [1.0, 0.0];
        let negative = [0.0, 1.0];
        let t = 0.5;
        let loss = info_nce_loss(&anchor, &positive, &[&negative], t);
        let expected = -((1.0f32 / t).exp() / ((1.0f32 / t).exp() + (0.0f32).exp())).ln();
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn info_nce_lower_for_better_positive() {
        let anchor = [1.0, 0.2];
        let close = [0.9, 0.25];
        let far = [-1.0, 0.5];
        let good = info_nce_loss(&anchor, &close, &[&far], 0.1);
        let bad = info_nce_loss(&anchor, &far, &[&close], 0.1);
        assert!(good < bad);
        assert!(good >= 0.0);
    }

    #[test]
    fn info_nce_without_negatives_is_zero() {
        let loss = info_nce_loss(&[1.0, 2.0], &[2.0, 4.0], &[], 1.0);
        assert!(loss.abs() < 1e-6);
    }
}
