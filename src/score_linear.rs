use crate::error::EngineError;
use crate::feature_buffer::SparseRow;
use crate::optimizer::UpdaterTrait;
use crate::score::{linear_grad, linear_score, ScoreTrait};
use crate::weights::ParameterLayout;

// y = wTx
#[derive(Clone)]
pub struct ScoreLinear {
    layout: ParameterLayout,
}

impl ScoreLinear {
    pub fn new(layout: ParameterLayout) -> ScoreLinear {
        ScoreLinear { layout }
    }
}

impl ScoreTrait for ScoreLinear {
    fn calc_score(&self, row: &SparseRow, weights: &[f32]) -> Result<f32, EngineError> {
        self.layout.check_row(row, weights.len())?;
        Ok(linear_score(row, weights))
    }

    fn calc_grad(
        &mut self,
        row: &SparseRow,
        weights: &mut [f32],
        partial_gradient: f32,
        updater: &mut dyn UpdaterTrait,
    ) -> Result<(), EngineError> {
        self.layout.check_row(row, weights.len())?;
        updater.check_ready(self.layout.num_param())?;
        linear_grad(row, weights, partial_gradient, updater);
        Ok(())
    }

    fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    fn get_name(&self) -> &'static str {
        "linear"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{new_updater, Optimizer};

    #[test]
    fn test_linear_score() {
        let layout = ParameterLayout::new_linear(4).unwrap();
        let re = ScoreLinear::new(layout);
        let weights = vec![0.5, 1.0, 2.0, 3.0];
        let mut row = SparseRow::new(1.0);
        assert_eq!(re.calc_score(&row, &weights).unwrap(), 0.5);
        row.add_feature(1, 2.0);
        row.add_feature(3, -1.0);
        assert_eq!(re.calc_score(&row, &weights).unwrap(), 0.5 + 2.0 - 3.0);
    }

    #[test]
    fn test_linear_grad_sgd() {
        let layout = ParameterLayout::new_linear(4).unwrap();
        let mut re = ScoreLinear::new(layout);
        let mut updater = new_updater(Optimizer::SGD);
        updater.init(0.1, 0.0, 0.9, 4).unwrap();
        let mut weights = vec![0.0; 4];
        let mut row = SparseRow::new(1.0);
        row.add_feature(2, 2.0);
        re.calc_grad(&row, &mut weights, -1.0, updater.as_mut()).unwrap();
        assert_epsilon!(weights[0], 0.1);
        assert_eq!(weights[1], 0.0);
        assert_epsilon!(weights[2], 0.2);
        assert_eq!(weights[3], 0.0);
    }

    #[test]
    fn test_linear_bounds() {
        let layout = ParameterLayout::new_linear(4).unwrap();
        let mut re = ScoreLinear::new(layout);
        let mut updater = new_updater(Optimizer::AdaDelta);
        updater.init(0.1, 0.0, 0.9, 4).unwrap();
        let mut weights = vec![0.0; 4];
        let mut row = SparseRow::new(1.0);
        row.add_feature(3, 1.0);
        assert!(re.calc_score(&row, &weights).is_ok());
        row.add_feature(4, 1.0);
        assert_eq!(
            re.calc_score(&row, &weights),
            Err(EngineError::FeatureOutOfRange {
                position: 2,
                index: 4,
                num_feature: 4
            })
        );
        assert!(re.calc_grad(&row, &mut weights, 1.0, updater.as_mut()).is_err());
        assert_eq!(weights, vec![0.0; 4]);
    }
}
