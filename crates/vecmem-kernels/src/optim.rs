// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AdamW optimizer step.

/// Fixed Adam hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamWConfig {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
}

impl Default for AdamWConfig {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// One AdamW update, in place.
///
/// Decoupled weight decay (`p -= lr * wd * p`) is applied before the
/// bias-corrected Adam update. `step` is the 1-based timestep; 0 is
/// treated as 1. Slices are processed over their common length.
pub fn adamw_step(
    params: &mut [f32],
    grads: &[f32],
    first_moment: &mut [f32],
    second_moment: &mut [f32],
    step: u32,
    lr: f32,
    weight_decay: f32,
) {
    let AdamWConfig {
        beta1,
        beta2,
        epsilon,
    } = AdamWConfig::default();
    let t = step.max(1) as i32;
    let bias1 = 1.0 - beta1.powi(t);
    let bias2 = 1.0 - beta2.powi(t);

    for (((p, g), m), v) in params
        .iter_mut()
        .zip(grads)
        .zip(first_moment.iter_mut())
        .zip(second_moment.iter_mut())
    {
        *p -= lr * weight_decay * *p;
        *m = beta1 * *m + (1.0 - beta1) * g;
        *v = beta2 * *v + (1.0 - beta2) * g * g;
        let m_hat = *m / bias1;
        let v_hat = *v / bias2;
        *p -= lr * m_hat / (v_hat.sqrt() + epsilon);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_learning_rate() {
        // With bias correction the first update is lr * sign(g).
        let mut p = [1.0f32, -1.0];
        let g = [0.5f32, -2.0];
        let mut m = [0.0f32; 2];
        let mut v = [0.0f32; 2];
        adamw_step(&mut p, &g, &mut m, &mut v, 1, 0.1, 0.0);
        assert!((p[0] - 0.9).abs() < 1e-5);
        assert!((p[1] - (-0.9)).abs() < 1e-5);
    }

    #[test]
    fn weight_decay_applies_before_update() {
        let mut p = [2.0f32];
        let mut m = [0.0f32];
        let mut v = [0.0f32];
        adamw_step(&mut p, &[0.0], &mut m, &mut v, 1, 0.1, 0.5);
        // Zero gradient: only decay acts. 2.0 - 0.1 * 0.5 * 2.0 = 1.9
        assert!((p[0] - 1.9).abs() < 1e-6);
    }

    #[test]
    fn step_zero_treated_as_one() {
        let mut a = [1.0f32];
        let mut b = [1.0f32];
        let (mut m1, mut v1, mut m2, mut v2) = ([0.0f32], [0.0f32], [0.0f32], [0.0f32]);
        adamw_step(&mut a, &[1.0], &mut m1, &mut v1, 0, 0.01, 0.01);
        adamw_step(&mut b, &[1.0], &mut m2, &mut v2, 1, 0.01, 0.01);
        assert_eq!(a, b);
    }

    #[test]
    fn minimizes_quadratic() {
        // f(x) = (x - 3)^2
        let mut x = [0.0f32];
        let mut m = [0.0f32];
        let mut v = [0.0f32];
        for step in 1..=2000 {
            let g = [2.0 * (x[0] - 3.0)];
            adamw_step(&mut x, &g, &mut m, &mut v, step, 0.05, 0.0);
        }
        assert!((x[0] - 3.0).abs() < 0.05, "x = {}", x[0]);
    }
}
