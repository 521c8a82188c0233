use std::error::Error;
use std::fmt;

/// Everything the scoring and update engine can refuse to do.
/// Configuration errors surface at setup, bounds errors fail a single call before any write.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    InvalidHyperParam { name: &'static str, value: f32 },
    MisalignedFactor { num_factor: u32, width: usize },
    InvalidModelShape(String),
    MissingBias,
    ReservedBiasIndex { position: usize },
    FeatureOutOfRange { position: usize, index: u32, num_feature: u32 },
    FieldOutOfRange { position: usize, field: u32, num_field: u32 },
    WeightsTooShort { required: usize, actual: usize },
    AuxStateTooShort { required: usize, actual: usize },
    UpdaterNotReady(&'static str),
    AllocationFailed { requested: usize },
}

impl Error for EngineError {}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineError::InvalidHyperParam { name, value } => {
                write!(f, "Invalid hyperparameter {}: {}", name, value)
            }
            EngineError::MisalignedFactor { num_factor, width } => write!(
                f,
                "num_factor ({}) has to be a multiple of the vector width ({})",
                num_factor, width
            ),
            EngineError::InvalidModelShape(s) => write!(f, "Invalid model shape: {}", s),
            EngineError::MissingBias => {
                write!(f, "Example does not start with the bias feature (index 0, value 1.0)")
            }
            EngineError::ReservedBiasIndex { position } => write!(
                f,
                "Feature index 0 is reserved for bias, found at position {}",
                position
            ),
            EngineError::FeatureOutOfRange {
                position,
                index,
                num_feature,
            } => write!(
                f,
                "Feature index out of range at position {}: {} (num_feature: {})",
                position, index, num_feature
            ),
            EngineError::FieldOutOfRange {
                position,
                field,
                num_field,
            } => write!(
                f,
                "Field index out of range at position {}: {} (num_field: {})",
                position, field, num_field
            ),
            EngineError::WeightsTooShort { required, actual } => write!(
                f,
                "Parameter array too short: required {}, got {}",
                required, actual
            ),
            EngineError::AuxStateTooShort { required, actual } => write!(
                f,
                "Updater state too short: required {}, got {}",
                required, actual
            ),
            EngineError::UpdaterNotReady(name) => {
                write!(f, "Updater {} used before init()", name)
            }
            EngineError::AllocationFailed { requested } => write!(
                f,
                "Cannot allocate enough memory for model parameters. Parameter size: {}",
                requested
            ),
        }
    }
}
