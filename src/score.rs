use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::feature_buffer::SparseRow;
use crate::optimizer::UpdaterTrait;
use crate::score_ffm::ScoreFFM;
use crate::score_linear::ScoreLinear;
use crate::weights::ParameterLayout;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Copy)]
pub enum ScoreFunction {
    Linear,
    FM,
    FFM,
}

/// Score and gradient engine of one model family.
///
/// Implementations own their scratch buffers, so every thread needs its own instance
/// (`dyn_clone::clone_box`), while the parameter array and the updater can be shared.
pub trait ScoreTrait: DynClone + Send {
    /// Raw model output for `row`: linear term plus interactions, no link function
    fn calc_score(&self, row: &SparseRow, weights: &[f32]) -> Result<f32, EngineError>;

    /// Computes the gradient of the score times `partial_gradient` and hands it to `updater`.
    /// Returns an error, without touching `weights`, if the row does not fit the layout.
    fn calc_grad(
        &mut self,
        row: &SparseRow,
        weights: &mut [f32],
        partial_gradient: f32,
        updater: &mut dyn UpdaterTrait,
    ) -> Result<(), EngineError>;

    fn layout(&self) -> &ParameterLayout;
    fn get_name(&self) -> &'static str;
}

dyn_clone::clone_trait_object!(ScoreTrait);

pub fn new_score(
    score_function: ScoreFunction,
    layout: ParameterLayout,
    max_row_len: usize,
) -> Box<dyn ScoreTrait> {
    match score_function {
        ScoreFunction::Linear => Box::new(ScoreLinear::new(layout)),
        ScoreFunction::FM | ScoreFunction::FFM => Box::new(ScoreFFM::new(layout, max_row_len)),
    }
}

/// Shared linear part: sum of w[index] * value over all entries, bias included
#[inline(always)]
pub fn linear_score(row: &SparseRow, weights: &[f32]) -> f32 {
    let mut score = 0.0;
    for entry in row.features.iter() {
        score += weights[entry.index as usize] * entry.value;
    }
    score
}

#[inline(always)]
pub fn linear_grad(
    row: &SparseRow,
    weights: &mut [f32],
    partial_gradient: f32,
    updater: &mut dyn UpdaterTrait,
) {
    for entry in row.features.iter() {
        let gradient = partial_gradient * entry.value;
        updater.update(entry.index as usize, gradient, weights);
    }
}
