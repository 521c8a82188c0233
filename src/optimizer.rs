use serde::{Deserialize, Serialize};

use crate::consts::{EPSILON, VECTOR_WIDTH};
use crate::error::EngineError;
use crate::simd::MX;
use crate::weights;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Copy)]
pub enum Optimizer {
    SGD = 1,
    AdaGrad = 2,
    AdaDelta = 3,
    FTRL = 4,
}

/// Update rule of a training run. The gradient code is written once against this trait.
///
/// Lifecycle: constructed uninitialized, `init()` moves it to ready. `update()` and
/// `batch_update()` may only be called on a ready updater with indices inside `num_param`,
/// callers are expected to check that up front (see `ScoreTrait::calc_grad`).
pub trait UpdaterTrait: Send {
    fn init(
        &mut self,
        learning_rate: f32,
        regu_lambda: f32,
        decay_rate: f32,
        num_param: usize,
    ) -> Result<(), EngineError>;
    fn is_ready(&self) -> bool;
    /// Length of the auxiliary state, None when the rule keeps none
    fn aux_len(&self) -> Option<usize>;
    fn update(&mut self, id: usize, grad: f32, param: &mut [f32]);
    /// Updates param[start_id..start_id + grad.len()], grad.len() is a multiple of VECTOR_WIDTH
    fn batch_update(&mut self, grad: &[f32], start_id: usize, param: &mut [f32]);
    fn get_name(&self) -> &'static str;

    /// Fails if the updater cannot serve indices below `num_param`
    fn check_ready(&self, num_param: usize) -> Result<(), EngineError> {
        if !self.is_ready() {
            return Err(EngineError::UpdaterNotReady(self.get_name()));
        }
        match self.aux_len() {
            Some(actual) if actual < num_param => Err(EngineError::AuxStateTooShort {
                required: num_param,
                actual,
            }),
            _ => Ok(()),
        }
    }
}

pub fn new_updater(optimizer: Optimizer) -> Box<dyn UpdaterTrait> {
    match optimizer {
        Optimizer::SGD => Box::new(UpdaterSGD::new()),
        Optimizer::AdaGrad => Box::new(UpdaterAdaGrad::new()),
        Optimizer::AdaDelta => Box::new(UpdaterAdaDelta::new()),
        Optimizer::FTRL => Box::new(UpdaterFTRL::new()),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct HyperParams {
    learning_rate: f32,
    regu_lambda: f32,
    decay_rate: f32,
}

impl HyperParams {
    fn new(learning_rate: f32, regu_lambda: f32, decay_rate: f32) -> Result<HyperParams, EngineError> {
        // NaN fails the comparisons as well
        if !(learning_rate > 0.0) {
            return Err(EngineError::InvalidHyperParam {
                name: "learning_rate",
                value: learning_rate,
            });
        }
        // regu_lambda == 0 turns the regularizer off
        if !(regu_lambda >= 0.0) {
            return Err(EngineError::InvalidHyperParam {
                name: "regu_lambda",
                value: regu_lambda,
            });
        }
        if !(decay_rate > 0.0) {
            return Err(EngineError::InvalidHyperParam {
                name: "decay_rate",
                value: decay_rate,
            });
        }
        Ok(HyperParams {
            learning_rate,
            regu_lambda,
            decay_rate,
        })
    }
}

fn allocate_cache(num_param: usize) -> Result<Vec<f32>, EngineError> {
    weights::allocate_zeroed(num_param)
}

/******************* SGD **************************/
// [ w -= learning_rate * grad + lambda * w ]
pub struct UpdaterSGD {
    hp: Option<HyperParams>,
}

impl UpdaterSGD {
    pub fn new() -> Self {
        UpdaterSGD { hp: None }
    }
}

impl UpdaterTrait for UpdaterSGD {
    fn init(
        &mut self,
        learning_rate: f32,
        regu_lambda: f32,
        decay_rate: f32,
        _num_param: usize,
    ) -> Result<(), EngineError> {
        self.hp = Some(HyperParams::new(learning_rate, regu_lambda, decay_rate)?);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.hp.is_some()
    }

    fn aux_len(&self) -> Option<usize> {
        None
    }

    #[inline(always)]
    fn update(&mut self, id: usize, grad: f32, param: &mut [f32]) {
        let hp = match self.hp {
            Some(hp) => hp,
            None => return,
        };
        param[id] -= hp.learning_rate * grad + hp.regu_lambda * param[id];
    }

    fn batch_update(&mut self, grad: &[f32], start_id: usize, param: &mut [f32]) {
        let hp = match self.hp {
            Some(hp) => hp,
            None => return,
        };
        let lr = MX::splat(hp.learning_rate);
        let lambda = MX::splat(hp.regu_lambda);
        let param = &mut param[start_id..start_id + grad.len()];
        for (g, w) in grad
            .chunks_exact(VECTOR_WIDTH)
            .zip(param.chunks_exact_mut(VECTOR_WIDTH))
        {
            let g = MX::load(g);
            let wv = MX::load(w);
            (wv - (lr * g + lambda * wv)).store(w);
        }
    }

    fn get_name(&self) -> &'static str {
        "SGD"
    }
}

/******************* AdaGrad **************************/
// [ cache += grad^2 ]
// [ w -= learning_rate * grad / sqrt(cache + eps) + lambda * w ]
pub struct UpdaterAdaGrad {
    hp: Option<HyperParams>,
    cache: Vec<f32>,
}

impl UpdaterAdaGrad {
    pub fn new() -> Self {
        UpdaterAdaGrad {
            hp: None,
            cache: Vec::new(),
        }
    }
}

impl UpdaterTrait for UpdaterAdaGrad {
    fn init(
        &mut self,
        learning_rate: f32,
        regu_lambda: f32,
        decay_rate: f32,
        num_param: usize,
    ) -> Result<(), EngineError> {
        let hp = HyperParams::new(learning_rate, regu_lambda, decay_rate)?;
        self.cache = allocate_cache(num_param)?;
        self.hp = Some(hp);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.hp.is_some()
    }

    fn aux_len(&self) -> Option<usize> {
        Some(self.cache.len())
    }

    #[inline(always)]
    fn update(&mut self, id: usize, grad: f32, param: &mut [f32]) {
        let hp = match self.hp {
            Some(hp) => hp,
            None => return,
        };
        self.cache[id] += grad * grad;
        param[id] -= hp.learning_rate * grad / (self.cache[id] + EPSILON).sqrt()
            + hp.regu_lambda * param[id];
    }

    fn batch_update(&mut self, grad: &[f32], start_id: usize, param: &mut [f32]) {
        let hp = match self.hp {
            Some(hp) => hp,
            None => return,
        };
        let lr = MX::splat(hp.learning_rate);
        let lambda = MX::splat(hp.regu_lambda);
        let eps = MX::splat(EPSILON);
        let end = start_id + grad.len();
        let param = &mut param[start_id..end];
        let cache = &mut self.cache[start_id..end];
        for ((g, w), c) in grad
            .chunks_exact(VECTOR_WIDTH)
            .zip(param.chunks_exact_mut(VECTOR_WIDTH))
            .zip(cache.chunks_exact_mut(VECTOR_WIDTH))
        {
            let g = MX::load(g);
            let wv = MX::load(w);
            let cv = MX::load(c) + g * g;
            cv.store(c);
            (wv - (lr * g / (cv + eps).sqrt() + lambda * wv)).store(w);
        }
    }

    fn get_name(&self) -> &'static str {
        "AdaGrad"
    }
}

/******************* AdaDelta **************************/
// [ cache = (1 - decay_rate) * grad^2 + decay_rate * cache ]
// [ w -= learning_rate * grad / sqrt(cache + eps) + lambda * w ]
// The scalar and the block path use the same operation order, so a block update is
// bit-identical to calling update() on each element.
pub struct UpdaterAdaDelta {
    hp: Option<HyperParams>,
    cache: Vec<f32>,
}

impl UpdaterAdaDelta {
    pub fn new() -> Self {
        UpdaterAdaDelta {
            hp: None,
            cache: Vec::new(),
        }
    }

    pub fn cache(&self) -> &[f32] {
        &self.cache
    }
}

impl UpdaterTrait for UpdaterAdaDelta {
    fn init(
        &mut self,
        learning_rate: f32,
        regu_lambda: f32,
        decay_rate: f32,
        num_param: usize,
    ) -> Result<(), EngineError> {
        let hp = HyperParams::new(learning_rate, regu_lambda, decay_rate)?;
        self.cache = allocate_cache(num_param)?;
        self.hp = Some(hp);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.hp.is_some()
    }

    fn aux_len(&self) -> Option<usize> {
        Some(self.cache.len())
    }

    #[inline(always)]
    fn update(&mut self, id: usize, grad: f32, param: &mut [f32]) {
        let hp = match self.hp {
            Some(hp) => hp,
            None => return,
        };
        let cache = (1.0 - hp.decay_rate) * (grad * grad) + hp.decay_rate * self.cache[id];
        self.cache[id] = cache;
        param[id] -=
            hp.learning_rate * grad / (cache + EPSILON).sqrt() + hp.regu_lambda * param[id];
    }

    fn batch_update(&mut self, grad: &[f32], start_id: usize, param: &mut [f32]) {
        let hp = match self.hp {
            Some(hp) => hp,
            None => return,
        };
        let lr = MX::splat(hp.learning_rate);
        let lambda = MX::splat(hp.regu_lambda);
        let decay = MX::splat(hp.decay_rate);
        let one_minus_decay = MX::splat(1.0 - hp.decay_rate);
        let eps = MX::splat(EPSILON);
        let end = start_id + grad.len();
        let param = &mut param[start_id..end];
        let cache = &mut self.cache[start_id..end];
        for ((g, w), c) in grad
            .chunks_exact(VECTOR_WIDTH)
            .zip(param.chunks_exact_mut(VECTOR_WIDTH))
            .zip(cache.chunks_exact_mut(VECTOR_WIDTH))
        {
            let g = MX::load(g);
            let wv = MX::load(w);
            let cv = one_minus_decay * (g * g) + decay * MX::load(c);
            cv.store(c);
            (wv - (lr * g / (cv + eps).sqrt() + lambda * wv)).store(w);
        }
    }

    fn get_name(&self) -> &'static str {
        "AdaDelta"
    }
}

/******************* FTRL-proximal **************************/
// alpha = learning_rate, l2 = lambda, beta and l1 are fixed per run.
// [ sigma = (sqrt(n + g^2) - sqrt(n)) / alpha ]
// [ z += g - sigma * w;  n += g^2 ]
// [ w = |z| <= l1 ? 0 : -(z - sign(z) * l1) / ((beta + sqrt(n)) / alpha + l2) ]
// FTRL recomputes w from (z, n), so on the first touch z is seeded from w to keep the
// random latent initialization.
pub struct UpdaterFTRL {
    hp: Option<HyperParams>,
    beta: f32,
    l1: f32,
    z: Vec<f32>,
    n: Vec<f32>,
}

impl UpdaterFTRL {
    pub fn new() -> Self {
        UpdaterFTRL {
            hp: None,
            beta: 1.0,
            l1: 0.0,
            z: Vec::new(),
            n: Vec::new(),
        }
    }

    pub fn with_l1(mut self, l1: f32) -> Self {
        self.l1 = l1;
        self
    }

    #[inline(always)]
    fn update_one(&mut self, hp: HyperParams, id: usize, grad: f32, param: &mut [f32]) {
        let alpha = hp.learning_rate;
        let l2 = hp.regu_lambda;
        let w = param[id];
        let n = self.n[id];
        if n == 0.0 {
            let seeded = -w * (self.beta / alpha + l2);
            self.z[id] = if w > 0.0 {
                seeded - self.l1
            } else if w < 0.0 {
                seeded + self.l1
            } else {
                seeded
            };
        }
        let new_n = n + grad * grad;
        let sigma = (new_n.sqrt() - n.sqrt()) / alpha;
        let z = self.z[id] + grad - sigma * w;
        self.z[id] = z;
        self.n[id] = new_n;
        param[id] = if z.abs() <= self.l1 {
            0.0
        } else {
            -(z - z.signum() * self.l1) / ((self.beta + new_n.sqrt()) / alpha + l2)
        };
    }
}

impl UpdaterTrait for UpdaterFTRL {
    fn init(
        &mut self,
        learning_rate: f32,
        regu_lambda: f32,
        decay_rate: f32,
        num_param: usize,
    ) -> Result<(), EngineError> {
        let hp = HyperParams::new(learning_rate, regu_lambda, decay_rate)?;
        if !(self.l1 >= 0.0) {
            return Err(EngineError::InvalidHyperParam {
                name: "ftrl_l1",
                value: self.l1,
            });
        }
        // nothing is replaced unless both caches could be allocated
        let z = allocate_cache(num_param)?;
        let n = allocate_cache(num_param)?;
        self.z = z;
        self.n = n;
        self.hp = Some(hp);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.hp.is_some()
    }

    fn aux_len(&self) -> Option<usize> {
        Some(self.z.len())
    }

    fn update(&mut self, id: usize, grad: f32, param: &mut [f32]) {
        if let Some(hp) = self.hp {
            self.update_one(hp, id, grad, param);
        }
    }

    fn batch_update(&mut self, grad: &[f32], start_id: usize, param: &mut [f32]) {
        if let Some(hp) = self.hp {
            for (i, g) in grad.iter().enumerate() {
                self.update_one(hp, start_id + i, *g, param);
            }
        }
    }

    fn get_name(&self) -> &'static str {
        "FTRL"
    }
}

#[cfg(test)]
mod tests {
    // Note this useful idiom: importing names from outer (for mod tests) scope.
    use super::*;

    #[test]
    fn test_init_reports_allocation_failure() {
        let failed = Err(EngineError::AllocationFailed {
            requested: usize::MAX,
        });

        let mut adadelta = UpdaterAdaDelta::new();
        assert_eq!(adadelta.init(0.1, 0.0, 0.9, usize::MAX), failed);
        assert!(!adadelta.is_ready());
        assert_eq!(adadelta.aux_len(), Some(0));

        let mut adagrad = UpdaterAdaGrad::new();
        assert_eq!(adagrad.init(0.1, 0.0, 0.9, usize::MAX), failed);
        assert!(!adagrad.is_ready());

        // both the z and the n cache have to come up
        let mut ftrl = UpdaterFTRL::new();
        assert_eq!(ftrl.init(0.1, 0.0, 0.9, usize::MAX), failed);
        assert!(!ftrl.is_ready());
        assert_eq!(ftrl.check_ready(4), Err(EngineError::UpdaterNotReady("FTRL")));

        // a failed init leaves an updater that can still be initialized properly
        assert!(ftrl.init(0.1, 0.0, 0.9, 4).is_ok());
        assert!(ftrl.is_ready());
        assert_eq!(ftrl.aux_len(), Some(4));
    }

    #[test]
    fn test_init_rejects_bad_hyperparams() {
        for opt in [
            Optimizer::SGD,
            Optimizer::AdaGrad,
            Optimizer::AdaDelta,
            Optimizer::FTRL,
        ]
        .iter()
        {
            let mut u = new_updater(*opt);
            assert!(!u.is_ready());
            assert_eq!(
                u.init(0.0, 0.0, 0.9, 8),
                Err(EngineError::InvalidHyperParam {
                    name: "learning_rate",
                    value: 0.0
                })
            );
            assert_eq!(
                u.init(0.1, -0.1, 0.9, 8),
                Err(EngineError::InvalidHyperParam {
                    name: "regu_lambda",
                    value: -0.1
                })
            );
            assert_eq!(
                u.init(0.1, 0.0, 0.0, 8),
                Err(EngineError::InvalidHyperParam {
                    name: "decay_rate",
                    value: 0.0
                })
            );
            assert!(!u.is_ready());
            assert_eq!(u.check_ready(8), Err(EngineError::UpdaterNotReady(u.get_name())));
            u.init(0.1, 0.0, 0.9, 8).unwrap();
            assert!(u.is_ready());
            assert_eq!(u.check_ready(8), Ok(()));
        }
    }

    #[test]
    fn test_check_ready_aux_len() {
        let mut u = UpdaterAdaDelta::new();
        u.init(0.1, 0.0, 0.9, 8).unwrap();
        assert_eq!(
            u.check_ready(9),
            Err(EngineError::AuxStateTooShort {
                required: 9,
                actual: 8
            })
        );
        let mut u = UpdaterSGD::new();
        u.init(0.1, 0.0, 0.9, 8).unwrap();
        assert_eq!(u.check_ready(1_000_000), Ok(()));
    }

    #[test]
    fn test_sgd() {
        let mut u = UpdaterSGD::new();
        u.init(0.15, 0.0, 0.9, 0).unwrap();
        let mut param = vec![1.0];
        u.update(0, 0.1, &mut param);
        assert_eq!(param[0], 1.0 - 0.1 * 0.15);
    }

    #[test]
    fn test_adadelta_scalar() {
        let mut u = UpdaterAdaDelta::new();
        u.init(0.5, 0.0, 0.9, 2).unwrap();
        let mut param = vec![0.1, 0.1];
        u.update(1, 0.2, &mut param);
        let cache: f32 = (1.0 - 0.9) * (0.2 * 0.2);
        assert_epsilon!(u.cache()[1], 0.004);
        assert_epsilon!(param[1], 0.1 - 0.5 * 0.2 / (cache + EPSILON).sqrt());
        assert_eq!(param[0], 0.1);
        assert_eq!(u.cache()[0], 0.0);

        // the cache decays with every call
        u.update(1, 0.0, &mut param);
        assert_epsilon!(u.cache()[1], 0.9 * 0.004);
    }

    #[test]
    fn test_batch_matches_scalar() {
        let grads: Vec<f32> = (0..8).map(|i| 0.05 * i as f32 - 0.2).collect();
        let init: Vec<f32> = (0..12).map(|i| 0.01 * i as f32).collect();
        for opt in [
            Optimizer::SGD,
            Optimizer::AdaGrad,
            Optimizer::AdaDelta,
            Optimizer::FTRL,
        ]
        .iter()
        {
            let mut scalar = new_updater(*opt);
            let mut block = new_updater(*opt);
            scalar.init(0.5, 0.01, 0.9, 12).unwrap();
            block.init(0.5, 0.01, 0.9, 12).unwrap();
            let mut p_scalar = init.clone();
            let mut p_block = init.clone();
            for _round in 0..3 {
                for (i, g) in grads.iter().enumerate() {
                    scalar.update(4 + i, *g, &mut p_scalar);
                }
                block.batch_update(&grads, 4, &mut p_block);
            }
            assert_eq!(p_scalar, p_block, "{}", scalar.get_name());
            assert_eq!(&p_block[..4], &init[..4]);
        }
    }

    #[test]
    fn test_zero_gradient_only_regularizes() {
        for opt in [Optimizer::SGD, Optimizer::AdaGrad, Optimizer::AdaDelta].iter() {
            let mut u = new_updater(*opt);
            u.init(0.5, 0.1, 0.9, 4).unwrap();
            let mut p = vec![1.0, 2.0, -1.0, 0.5];
            u.batch_update(&[0.0; 4], 0, &mut p);
            assert_eq!(p, vec![1.0 - 0.1, 2.0 - 0.2, -1.0 + 0.1, 0.5 - 0.05]);
        }
    }

    #[test]
    fn test_ftrl_keeps_weight_on_zero_gradient() {
        let mut u = UpdaterFTRL::new();
        u.init(0.1, 0.0, 0.9, 2).unwrap();
        let mut p = vec![0.25, -0.5];
        u.update(0, 0.0, &mut p);
        u.update(1, 0.0, &mut p);
        assert_epsilon!(p[0], 0.25);
        assert_epsilon!(p[1], -0.5);
        // a positive gradient pushes the weight down
        u.update(0, 1.0, &mut p);
        assert!(p[0] < 0.25);
    }

    #[test]
    fn test_ftrl_l1_sparsifies() {
        let mut u = UpdaterFTRL::new().with_l1(10.0);
        u.init(0.1, 0.0, 0.9, 1).unwrap();
        let mut p = vec![0.0];
        u.update(0, 0.5, &mut p);
        assert_eq!(p[0], 0.0);
    }
}
