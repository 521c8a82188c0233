#[macro_use]
pub mod block_helpers;
pub mod block_loss_functions;
pub mod cmdline;
pub mod consts;
pub mod error;
pub mod feature_buffer;
pub mod file;
pub mod hogwild;
pub mod logging_layer;
pub mod model_instance;
pub mod multithread_helpers;
pub mod optimizer;
pub mod parser;
pub mod persistence;
pub mod regressor;
pub mod score;
pub mod score_ffm;
pub mod score_linear;
pub mod simd;
pub mod weights;
