// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Activation and normalization kernels.

/// `sqrt(2 / pi)`.
const GELU_COEFF: f32 = 0.797_884_6;

pub fn relu(x: f32) -> f32 {
    x.max(0.0)
}

/// Logistic sigmoid, stable for large magnitudes.
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// GELU, tanh approximation.
pub fn gelu(x: f32) -> f32 {
    0.5 * x * (1.0 + (GELU_COEFF * (x + 0.044_715 * x * x * x)).tanh())
}

/// Softmax with max subtraction.
///
/// Falls back to a uniform distribution when the exponential sum is zero or
/// non-finite (for example when the input contains infinities).
pub fn softmax(x: &[f32]) -> Vec<f32> {
    if x.is_empty() {
        return Vec::new();
    }
    let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = x.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() || exps.iter().any(|e| !e.is_finite()) {
        let uniform = 1.0 / x.len() as f32;
        return vec![uniform; x.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

/// Layer normalization with population mean/variance and no affine terms.
pub fn layer_norm(x: &[f32], eps: f32) -> Vec<f32> {
    if x.is_empty() {
        return Vec::new();
    }
    let n = x.len() as f32;
    let mean = x.iter().sum::<f32>() / n;
    let var = x.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    let denom = (var + eps).sqrt();
    x.iter().map(|v| (v - mean) / denom).collect()
}
