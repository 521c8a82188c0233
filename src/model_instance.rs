use serde::{Deserialize, Serialize};
use std::error::Error;
use std::io::Error as IOError;
use std::io::ErrorKind;

use crate::block_loss_functions::LossFunction;
use crate::consts;
use crate::error::EngineError;
use crate::optimizer::Optimizer;
use crate::score::ScoreFunction;
use crate::weights::ParameterLayout;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelInstance {
    pub score_function: ScoreFunction,
    pub loss_function: LossFunction,
    pub optimizer: Optimizer,
    pub num_feature: u32,
    #[serde(default = "default_u32_one")]
    pub num_field: u32,
    #[serde(default = "default_u32_zero")]
    pub num_factor: u32,
    pub learning_rate: f32,
    #[serde(default = "default_f32_zero")]
    pub regu_lambda: f32,
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f32,
    #[serde(default = "default_f32_zero")]
    pub ftrl_l1: f32,
    #[serde(default = "default_init_scale")]
    pub init_scale: f32,

    // these are only used for learning, so it doesnt matter they got set to defaults
    #[serde(default = "default_u32_one")]
    pub epochs: u32,
    #[serde(default = "default_bool_false")]
    pub shuffle: bool,
    #[serde(default = "default_u64_zero")]
    pub seed: u64,
    #[serde(default = "default_u32_zero")]
    pub hogwild_threads: u32,
    #[serde(default = "default_max_row_len")]
    pub max_row_len: usize,
}

fn default_u32_zero() -> u32 {
    0
}
fn default_u32_one() -> u32 {
    1
}
fn default_u64_zero() -> u64 {
    0
}
fn default_f32_zero() -> f32 {
    0.0
}
fn default_bool_false() -> bool {
    false
}
fn default_decay_rate() -> f32 {
    0.9
}
fn default_init_scale() -> f32 {
    0.66
}
fn default_max_row_len() -> usize {
    consts::DEFAULT_MAX_ROW_LEN
}

fn parse_value<T: std::str::FromStr>(cl: &clap::ArgMatches, name: &str) -> Result<Option<T>, Box<dyn Error>>
where
    T::Err: std::fmt::Display,
{
    match cl.value_of(name) {
        Some(val) => match val.parse::<T>() {
            Ok(v) => Ok(Some(v)),
            Err(e) => Err(Box::new(IOError::new(
                ErrorKind::Other,
                format!("Cannot parse --{} \"{}\": {}", name, val, e),
            ))),
        },
        None => Ok(None),
    }
}

impl ModelInstance {
    pub fn new_empty() -> Result<ModelInstance, Box<dyn Error>> {
        let mi = ModelInstance {
            score_function: ScoreFunction::FFM,
            loss_function: LossFunction::CrossEntropy,
            optimizer: Optimizer::AdaDelta,
            num_feature: 0,
            num_field: 1,
            num_factor: 4,
            learning_rate: 0.2,
            regu_lambda: 0.00002,
            decay_rate: default_decay_rate(),
            ftrl_l1: 0.0,
            init_scale: default_init_scale(),
            epochs: 1,
            shuffle: false,
            seed: 0,
            hogwild_threads: 0,
            max_row_len: consts::DEFAULT_MAX_ROW_LEN,
        };
        Ok(mi)
    }

    pub fn new_from_cmdline<'a>(cl: &clap::ArgMatches<'a>) -> Result<ModelInstance, Box<dyn Error>> {
        let mut mi = ModelInstance::new_empty()?;

        if let Some(val) = cl.value_of("score") {
            mi.score_function = match val {
                "linear" => ScoreFunction::Linear,
                "fm" => ScoreFunction::FM,
                "ffm" => ScoreFunction::FFM,
                _ => return Err(Box::new(IOError::new(ErrorKind::Other, format!("Unknown --score: {}", val)))),
            };
        }

        if let Some(val) = cl.value_of("loss") {
            mi.loss_function = match val {
                "cross-entropy" => LossFunction::CrossEntropy,
                "squared" => LossFunction::Squared,
                _ => return Err(Box::new(IOError::new(ErrorKind::Other, format!("Unknown --loss: {}", val)))),
            };
        }

        if let Some(val) = cl.value_of("optimizer") {
            mi.optimizer = match val {
                "sgd" => Optimizer::SGD,
                "adagrad" => Optimizer::AdaGrad,
                "adadelta" => Optimizer::AdaDelta,
                "ftrl" => Optimizer::FTRL,
                _ => return Err(Box::new(IOError::new(ErrorKind::Other, format!("Unknown --optimizer: {}", val)))),
            };
        }

        if let Some(v) = parse_value(cl, "num_factor")? {
            mi.num_factor = v;
            if mi.num_factor > consts::MAX_NUM_FACTOR {
                return Err(Box::new(IOError::new(ErrorKind::Other, format!("Maximum num_factor is: {}, passed: {}", consts::MAX_NUM_FACTOR, mi.num_factor))));
            }
        }
        if let Some(v) = parse_value(cl, "num_feature")? {
            mi.num_feature = v;
        }
        if let Some(v) = parse_value(cl, "num_field")? {
            mi.num_field = v;
        }
        if let Some(v) = parse_value(cl, "learning_rate")? {
            mi.learning_rate = v;
        }
        if let Some(v) = parse_value(cl, "regu_lambda")? {
            mi.regu_lambda = v;
        }
        if let Some(v) = parse_value(cl, "decay_rate")? {
            mi.decay_rate = v;
        }
        if let Some(v) = parse_value(cl, "ftrl_l1")? {
            mi.ftrl_l1 = v;
        }
        if let Some(v) = parse_value(cl, "init_scale")? {
            mi.init_scale = v;
        }
        if let Some(v) = parse_value(cl, "epochs")? {
            mi.epochs = v;
        }
        if let Some(v) = parse_value(cl, "seed")? {
            mi.seed = v;
        }
        if let Some(v) = parse_value(cl, "hogwild_threads")? {
            mi.hogwild_threads = v;
        }
        if let Some(v) = parse_value(cl, "max_row_len")? {
            mi.max_row_len = v;
        }
        if cl.is_present("shuffle") {
            mi.shuffle = true;
        }

        Ok(mi)
    }

    /// Grows num_feature / num_field so that the data seen so far fits.
    /// Sizes given explicitly are left alone, rows that do not fit them fail in the engine.
    pub fn fit_to_data(
        &mut self,
        max_index: u32,
        max_field: u32,
        fixed_num_feature: bool,
        fixed_num_field: bool,
    ) -> Result<(), EngineError> {
        if !fixed_num_feature {
            let needed = max_index.checked_add(1).ok_or_else(|| {
                EngineError::InvalidModelShape(format!("feature index {} is too large, num_feature would overflow", max_index))
            })?;
            self.num_feature = self.num_feature.max(needed);
        }
        if !fixed_num_field && self.score_function == ScoreFunction::FFM {
            let needed = max_field.checked_add(1).ok_or_else(|| {
                EngineError::InvalidModelShape(format!("field id {} is too large, num_field would overflow", max_field))
            })?;
            self.num_field = self.num_field.max(needed);
        }
        Ok(())
    }

    pub fn layout(&self) -> Result<ParameterLayout, EngineError> {
        match self.score_function {
            ScoreFunction::Linear => ParameterLayout::new_linear(self.num_feature),
            ScoreFunction::FM => ParameterLayout::new_fm(self.num_feature, self.num_factor),
            ScoreFunction::FFM => {
                ParameterLayout::new_ffm(self.num_feature, self.num_field, self.num_factor)
            }
        }
    }

    /// Checks everything that can be checked before any state is allocated
    pub fn validate(&self) -> Result<ParameterLayout, EngineError> {
        let layout = self.layout()?;
        if self.epochs == 0 {
            return Err(EngineError::InvalidModelShape("epochs has to be at least 1".to_string()));
        }
        if !(self.init_scale >= 0.0) {
            return Err(EngineError::InvalidHyperParam {
                name: "init_scale",
                value: self.init_scale,
            });
        }
        Ok(layout)
    }
}
