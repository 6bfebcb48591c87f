//! Model interface: observation in, `(priors, value)` out.

use rz_core::Observation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Produces action priors and a value estimate for an observation.
///
/// - `priors` has one entry per action in the action space.
/// - `value` is on the same scale as the (possibly ranked) terminal rewards.
pub trait Model {
    fn compute_priors_and_value(&self, obs: &Observation) -> Result<(Vec<f32>, f32), ModelError>;
}

impl<M: Model + ?Sized> Model for &M {
    fn compute_priors_and_value(&self, obs: &Observation) -> Result<(Vec<f32>, f32), ModelError> {
        (**self).compute_priors_and_value(obs)
    }
}

/// Uniform policy over valid actions + zero value (baseline stub).
pub struct UniformModel;

impl Model for UniformModel {
    fn compute_priors_and_value(&self, obs: &Observation) -> Result<(Vec<f32>, f32), ModelError> {
        let n = obs.num_valid();
        let mut priors = vec![0.0f32; obs.action_mask.len()];
        if n > 0 {
            let u = 1.0 / n as f32;
            for a in obs.valid_actions() {
                priors[a] = u;
            }
        }
        Ok((priors, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_over_valid_actions() {
        let obs = Observation::new(vec![], vec![true, false, true, true]);
        let (p, v) = UniformModel.compute_priors_and_value(&obs).unwrap();
        assert_eq!(v, 0.0);
        assert_eq!(p[1], 0.0);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!((p[0] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn empty_mask_gives_zero_priors() {
        let obs = Observation::new(vec![], vec![false, false]);
        let (p, _) = (&UniformModel).compute_priors_and_value(&obs).unwrap();
        assert_eq!(p, vec![0.0, 0.0]);
    }
}
