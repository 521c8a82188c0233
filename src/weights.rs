use merand48::*;

use crate::consts::VECTOR_WIDTH;
use crate::error::EngineError;
use crate::feature_buffer::{SparseRow, BIAS_INDEX};

/// Addressing scheme of the flat parameter array.
///
/// ```text
/// [0, num_feature)                      linear weights, index 0 is the bias
/// num_feature + ((f-1)*num_field + d)*k  latent block of feature f (1-based) for field d, k reals
/// ```
///
/// Plain FM uses the same formula with num_field = 1 and d = 0. Linear models stop after the
/// linear weights (num_factor = 0).
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterLayout {
    pub num_feature: u32,
    pub num_field: u32,
    pub num_factor: u32,
    pub field_aware: bool,
}

impl ParameterLayout {
    pub fn new_linear(num_feature: u32) -> Result<ParameterLayout, EngineError> {
        if num_feature == 0 {
            return Err(EngineError::InvalidModelShape(
                "num_feature has to be at least 1 (bias)".to_string(),
            ));
        }
        Ok(ParameterLayout {
            num_feature,
            num_field: 1,
            num_factor: 0,
            field_aware: false,
        })
    }

    pub fn new_fm(num_feature: u32, num_factor: u32) -> Result<ParameterLayout, EngineError> {
        let mut layout = ParameterLayout::new_linear(num_feature)?;
        layout.num_factor = check_num_factor(num_factor)?;
        layout.check_num_param()?;
        Ok(layout)
    }

    pub fn new_ffm(
        num_feature: u32,
        num_field: u32,
        num_factor: u32,
    ) -> Result<ParameterLayout, EngineError> {
        if num_field == 0 {
            return Err(EngineError::InvalidModelShape(
                "num_field has to be at least 1 for field-aware models".to_string(),
            ));
        }
        let mut layout = ParameterLayout::new_fm(num_feature, num_factor)?;
        layout.num_field = num_field;
        layout.field_aware = true;
        layout.check_num_param()?;
        Ok(layout)
    }

    #[inline(always)]
    pub fn num_linear(&self) -> usize {
        self.num_feature as usize
    }

    /// Number of latent blocks a single feature owns
    #[inline(always)]
    pub fn blocks_per_feature(&self) -> usize {
        self.num_field as usize
    }

    // Constructors reject shapes whose num_param() would not fit a usize
    fn check_num_param(&self) -> Result<usize, EngineError> {
        (self.num_feature as usize)
            .checked_mul(self.num_field as usize)
            .and_then(|n| n.checked_mul(self.num_factor as usize))
            .and_then(|n| n.checked_add(self.num_linear()))
            .ok_or_else(|| {
                EngineError::InvalidModelShape(format!(
                    "{} features x {} fields x {} factors do not fit in memory addressing",
                    self.num_feature, self.num_field, self.num_factor
                ))
            })
    }

    pub fn num_param(&self) -> usize {
        let latent = self.num_feature as usize * self.num_field as usize * self.num_factor as usize;
        self.num_linear() + latent
    }

    /// Field the engine sees for an entry. Collapses to 0 unless the model is field-aware.
    #[inline(always)]
    pub fn effective_field(&self, field: u32) -> u32 {
        if self.field_aware {
            field
        } else {
            0
        }
    }

    /// Start of the latent block of `feature` used against `field`.
    /// Only valid for rows that passed check_row().
    #[inline(always)]
    pub fn latent_offset(&self, feature: u32, field: u32) -> usize {
        debug_assert!(feature != BIAS_INDEX);
        let k = self.num_factor as usize;
        self.num_linear() + ((feature as usize - 1) * self.num_field as usize + field as usize) * k
    }

    /// Verifies that every access calc_score()/calc_grad() will make for this row is in bounds.
    pub fn check_row(&self, row: &SparseRow, weights_len: usize) -> Result<(), EngineError> {
        let required = self.num_param();
        if weights_len < required {
            return Err(EngineError::WeightsTooShort {
                required,
                actual: weights_len,
            });
        }
        if !row.has_bias() {
            return Err(EngineError::MissingBias);
        }
        for (position, entry) in row.features.iter().enumerate().skip(1) {
            if entry.index >= self.num_feature {
                return Err(EngineError::FeatureOutOfRange {
                    position,
                    index: entry.index,
                    num_feature: self.num_feature,
                });
            }
            if self.num_factor > 0 && entry.index == BIAS_INDEX {
                return Err(EngineError::ReservedBiasIndex { position });
            }
            if self.field_aware && entry.field >= self.num_field {
                return Err(EngineError::FieldOutOfRange {
                    position,
                    field: entry.field,
                    num_field: self.num_field,
                });
            }
        }
        Ok(())
    }

    /// Allocates the parameter array: linear weights at zero, latent weights
    /// uniform in [0, init_scale / sqrt(k)).
    pub fn allocate_and_init_weights(&self, init_scale: f32, seed: u64) -> Result<Vec<f32>, EngineError> {
        let mut weights = allocate_zeroed(self.num_param())?;
        if self.num_factor > 0 {
            let coef = init_scale / (self.num_factor as f32).sqrt();
            let start = self.num_linear();
            for (i, w) in weights[start..].iter_mut().enumerate() {
                *w = merand48(seed.wrapping_add(i as u64)) * coef;
            }
        }
        Ok(weights)
    }
}

/// Zero-filled f32 buffer, reporting a failed allocation instead of aborting
pub fn allocate_zeroed(len: usize) -> Result<Vec<f32>, EngineError> {
    let mut buf: Vec<f32> = Vec::new();
    if buf.try_reserve_exact(len).is_err() {
        return Err(EngineError::AllocationFailed { requested: len });
    }
    buf.resize(len, 0.0);
    Ok(buf)
}

fn check_num_factor(num_factor: u32) -> Result<u32, EngineError> {
    if num_factor == 0 || num_factor as usize % VECTOR_WIDTH != 0 {
        return Err(EngineError::MisalignedFactor {
            num_factor,
            width: VECTOR_WIDTH,
        });
    }
    Ok(num_factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffm_layout() {
        let l = ParameterLayout::new_ffm(3, 2, 4).unwrap();
        assert_eq!(l.num_param(), 3 + 3 * 2 * 4);
        assert_eq!(l.latent_offset(1, 0), 3);
        assert_eq!(l.latent_offset(1, 1), 7);
        assert_eq!(l.latent_offset(2, 0), 11);
        assert_eq!(l.latent_offset(2, 1), 15);
        assert_eq!(l.effective_field(1), 1);
    }

    #[test]
    fn test_fm_layout_ignores_fields() {
        let l = ParameterLayout::new_fm(5, 8).unwrap();
        assert_eq!(l.num_param(), 5 + 5 * 8);
        assert_eq!(l.effective_field(3), 0);
        assert_eq!(l.latent_offset(1, 0), 5);
        assert_eq!(l.latent_offset(4, 0), 5 + 3 * 8);
    }

    #[test]
    fn test_shape_errors() {
        assert_eq!(
            ParameterLayout::new_fm(5, 6),
            Err(EngineError::MisalignedFactor {
                num_factor: 6,
                width: VECTOR_WIDTH
            })
        );
        assert!(ParameterLayout::new_fm(5, 0).is_err());
        assert!(ParameterLayout::new_ffm(5, 0, 4).is_err());
        assert!(ParameterLayout::new_linear(0).is_err());
    }

    #[test]
    fn test_check_row_boundaries() {
        let l = ParameterLayout::new_ffm(3, 2, 4).unwrap();
        let len = l.num_param();

        let mut row = SparseRow::new(1.0);
        row.add_field_feature(2, 1.0, 1);
        assert_eq!(l.check_row(&row, len), Ok(()));

        let mut row = SparseRow::new(1.0);
        row.add_field_feature(1, 1.0, 0);
        row.add_field_feature(3, 1.0, 0);
        assert_eq!(
            l.check_row(&row, len),
            Err(EngineError::FeatureOutOfRange {
                position: 2,
                index: 3,
                num_feature: 3
            })
        );

        let mut row = SparseRow::new(1.0);
        row.add_field_feature(1, 1.0, 2);
        assert_eq!(
            l.check_row(&row, len),
            Err(EngineError::FieldOutOfRange {
                position: 1,
                field: 2,
                num_field: 2
            })
        );

        let mut row = SparseRow::new(1.0);
        row.add_field_feature(0, 1.0, 0);
        assert_eq!(
            l.check_row(&row, len),
            Err(EngineError::ReservedBiasIndex { position: 1 })
        );

        let row = SparseRow::new(1.0);
        assert_eq!(
            l.check_row(&row, len - 1),
            Err(EngineError::WeightsTooShort {
                required: len,
                actual: len - 1
            })
        );
    }

    #[test]
    fn test_init_weights() {
        let l = ParameterLayout::new_ffm(4, 2, 4).unwrap();
        let w = l.allocate_and_init_weights(0.66, 0).unwrap();
        assert_eq!(w.len(), l.num_param());
        assert!(w[..4].iter().all(|x| *x == 0.0));
        let bound = 0.66 / 2.0;
        assert!(w[4..].iter().all(|x| *x >= 0.0 && *x < bound));
        assert!(w[4..].iter().any(|x| *x != 0.0));
        // same seed, same model
        assert_eq!(w, l.allocate_and_init_weights(0.66, 0).unwrap());
    }

    #[test]
    fn test_oversized_shapes() {
        match ParameterLayout::new_ffm(u32::MAX, u32::MAX, 1024) {
            Err(EngineError::InvalidModelShape(msg)) => assert!(msg.contains("4294967295 features")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(ParameterLayout::new_linear(u32::MAX).is_ok());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_weights_allocation_failure() {
        // about 2^62 floats: addressable, but never allocatable
        let l = ParameterLayout::new_ffm(u32::MAX, 1 << 20, 1024).unwrap();
        assert_eq!(
            l.allocate_and_init_weights(0.66, 0),
            Err(EngineError::AllocationFailed {
                requested: l.num_param()
            })
        );
        assert_eq!(
            allocate_zeroed(usize::MAX),
            Err(EngineError::AllocationFailed {
                requested: usize::MAX
            })
        );
    }
}
