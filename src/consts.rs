// Width of the lane arithmetic used on latent blocks. num_factor has to be a multiple of it.
pub const VECTOR_WIDTH: usize = 4;

// Smoothing term of the adaptive updaters, keeps 1/sqrt(cache) finite
pub const EPSILON: f32 = 1e-7;

// Scores are clamped before the logistic link, same as vowpal
pub const LOGISTIC_CLAMP: f32 = 50.0;

// Scratch buffers are sized for rows of this length unless configured otherwise
pub const DEFAULT_MAX_ROW_LEN: usize = 64;

pub const MAX_NUM_FACTOR: u32 = 1024;
