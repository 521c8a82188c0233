use std::error::Error;
use std::io;

use crate::block_helpers;
use crate::block_loss_functions::LossFunction;
use crate::error::EngineError;
use crate::feature_buffer::SparseRow;
use crate::model_instance::ModelInstance;
use crate::optimizer::{new_updater, Optimizer, UpdaterFTRL, UpdaterTrait};
use crate::score::{new_score, ScoreTrait};

/// Owns everything a training run mutates: the parameter array and the updater state.
/// The score instance holds only scratch space; Hogwild workers bring their own.
pub struct Regressor {
    pub regressor_name: String,
    pub weights: Vec<f32>,
    pub score: Box<dyn ScoreTrait>,
    pub updater: Box<dyn UpdaterTrait>,
    pub loss: LossFunction,
}

fn build_updater(mi: &ModelInstance) -> Box<dyn UpdaterTrait> {
    match mi.optimizer {
        Optimizer::FTRL => Box::new(UpdaterFTRL::new().with_l1(mi.ftrl_l1)),
        other => new_updater(other),
    }
}

impl Regressor {
    pub fn new(mi: &ModelInstance) -> Result<Regressor, Box<dyn Error>> {
        let layout = mi.validate()?;
        let num_param = layout.num_param();
        let score = new_score(mi.score_function, layout.clone(), mi.max_row_len);
        let mut updater = build_updater(mi);
        updater.init(mi.learning_rate, mi.regu_lambda, mi.decay_rate, num_param)?;
        let weights = layout.allocate_and_init_weights(mi.init_scale, mi.seed)?;

        let regressor_name = format!(
            "Regressor with {} score ({} params), {} updater, {} loss",
            score.get_name(),
            num_param,
            updater.get_name(),
            mi.loss_function.get_name()
        );
        log::info!("{}", regressor_name);

        Ok(Regressor {
            regressor_name,
            weights,
            score,
            updater,
            loss: mi.loss_function,
        })
    }

    pub fn get_name(&self) -> String {
        self.regressor_name.to_owned()
    }

    /// Fresh score instance with its own scratch buffers, for another thread
    pub fn new_score_instance(&self) -> Box<dyn ScoreTrait> {
        dyn_clone::clone_box(&*self.score)
    }

    pub fn predict(&self, row: &SparseRow) -> Result<f32, EngineError> {
        let score = self.score.calc_score(row, &self.weights)?;
        Ok(self.loss.prediction(score))
    }

    /// Returns the raw score computed before the update
    pub fn learn(&mut self, row: &SparseRow, update: bool) -> Result<f32, EngineError> {
        let score = self.score.calc_score(row, &self.weights)?;
        if update {
            let partial_gradient = self.loss.partial_gradient(score, row.label);
            self.score.calc_grad(row, &mut self.weights, partial_gradient, &mut *self.updater)?;
        }
        Ok(score)
    }

    /// Same as `learn()`, but with a caller-owned score instance
    pub fn learn_with_score(
        &mut self,
        score_instance: &mut dyn ScoreTrait,
        row: &SparseRow,
        update: bool,
    ) -> Result<f32, EngineError> {
        let score = score_instance.calc_score(row, &self.weights)?;
        if update {
            let partial_gradient = self.loss.partial_gradient(score, row.label);
            score_instance.calc_grad(row, &mut self.weights, partial_gradient, &mut *self.updater)?;
        }
        Ok(score)
    }

    pub fn write_weights_to_buf(&self, output_bufwriter: &mut dyn io::Write) -> Result<(), Box<dyn Error>> {
        block_helpers::write_weights_to_buf(&self.weights, output_bufwriter)
    }

    pub fn overwrite_weights_from_buf(&mut self, input_bufreader: &mut dyn io::Read) -> Result<(), Box<dyn Error>> {
        block_helpers::read_weights_from_buf(&mut self.weights, input_bufreader)
    }
}
