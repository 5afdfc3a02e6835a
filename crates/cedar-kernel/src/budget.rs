//! Budget reallocation glue.
//!
//! The integrator itself is an external collaborator; the kernel only
//! supplies the ascent direction (from per-module ROI) and the
//! fixed-sum, non-negative constraint projector.

use crate::ModuleRoi;

/// Ascent direction over allocations: each module's ROI relative to
/// the mean, normalized to zero sum so the gradient respects the
/// fixed-budget constraint to first order.
pub fn roi_gradient(rois: &[ModuleRoi]) -> Vec<f64> {
    if rois.is_empty() {
        return Vec::new();
    }
    let mean = rois.iter().map(|r| r.roi).sum::<f64>() / rois.len() as f64;
    rois.iter().map(|r| r.roi - mean).collect()
}

/// Project an allocation vector onto the feasible set: non-negative
/// components summing to `total`.
pub fn project_fixed_sum(values: &mut Vec<f64>, total: f64) {
    if values.is_empty() || total <= 0.0 {
        return;
    }
    for v in values.iter_mut() {
        *v = v.max(0.0);
    }
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        let scale = total / sum;
        for v in values.iter_mut() {
            *v *= scale;
        }
    } else {
        // Degenerate: everything clamped to zero, fall back to uniform.
        let uniform = total / values.len() as f64;
        for v in values.iter_mut() {
            *v = uniform;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roi(module: &str, roi: f64) -> ModuleRoi {
        ModuleRoi {
            module: module.to_string(),
            revenue: 0.0,
            cost: 0.0,
            roi,
        }
    }

    #[test]
    fn gradient_sums_to_zero() {
        let g = roi_gradient(&[roi("a", 2.0), roi("b", 1.0), roi("c", 0.0)]);
        assert!((g.iter().sum::<f64>()).abs() < 1e-12);
        assert!(g[0] > 0.0);
        assert!(g[2] < 0.0);
    }

    #[test]
    fn projection_preserves_the_total() {
        let mut values = vec![3.0, -1.0, 2.0];
        project_fixed_sum(&mut values, 4.0);
        assert!(values.iter().all(|v| *v >= 0.0));
        assert!((values.iter().sum::<f64>() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn all_negative_falls_back_to_uniform() {
        let mut values = vec![-1.0, -2.0];
        project_fixed_sum(&mut values, 4.0);
        assert_eq!(values, vec![2.0, 2.0]);
    }

    #[test]
    fn higher_roi_attracts_budget_over_steps() {
        use crate::collaborators::testing::LeapfrogIntegrator;
        use crate::collaborators::BudgetIntegrator;

        let rois = vec![roi("a", 3.0), roi("b", 1.0)];
        let total = 2.0;
        let integrator = LeapfrogIntegrator;
        let mut position = vec![1.0, 1.0];
        let mut momentum = vec![0.0, 0.0];
        for _ in 0..10 {
            let rois = rois.clone();
            let (p, m) = integrator.step(
                &position,
                &momentum,
                &move |_| roi_gradient(&rois),
                0.05,
                &|v| project_fixed_sum(v, total),
            );
            position = p;
            momentum = m;
        }
        assert!(position[0] > position[1]);
        assert!((position.iter().sum::<f64>() - total).abs() < 1e-9);
    }
}
