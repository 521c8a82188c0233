use env_logger::Builder;
use log::LevelFilter;

use crate::consts::VECTOR_WIDTH;
use crate::model_instance::ModelInstance;

const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Unknown or missing levels fall back to info
pub fn level_from_env_value(value: Option<&str>) -> LevelFilter {
    match value {
        Some(v) => v.trim().parse::<LevelFilter>().unwrap_or(LevelFilter::Info),
        None => LevelFilter::Info,
    }
}

pub fn initialize_logging_layer() {
    let env_value = std::env::var(LOG_LEVEL_ENV).ok();
    let level = level_from_env_value(env_value.as_deref());
    let mut builder = Builder::new();
    builder.filter_level(level).format_timestamp_millis();

    if builder.try_init().is_ok() {
        log::info!("Initialized the logger at level {} ..", level)
    }

    let features = detected_simd_features();
    if features.is_empty() {
        log::info!("Latent blocks run {} lanes wide, no SIMD extensions detected", VECTOR_WIDTH);
    } else {
        log::info!(
            "Latent blocks run {} lanes wide, CPU offers: {}",
            VECTOR_WIDTH,
            features.join(", ")
        );
    }
}

/// One summary line of the training setup, the full instance at debug level
pub fn log_model_instance(mi: &ModelInstance) {
    log::info!(
        "{:?} model, {} features x {} fields x {} factors, {:?} updater (lr {}, lambda {}, decay {}), {:?} loss",
        mi.score_function,
        mi.num_feature,
        mi.num_field,
        mi.num_factor,
        mi.optimizer,
        mi.learning_rate,
        mi.regu_lambda,
        mi.decay_rate,
        mi.loss_function
    );
    log::debug!("{:?}", mi);
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn detected_simd_features() -> Vec<&'static str> {
    let mut features = Vec::new();
    if is_x86_feature_detected!("sse2") {
        features.push("SSE2");
    }
    if is_x86_feature_detected!("avx") {
        features.push("AVX");
    }
    if is_x86_feature_detected!("avx2") {
        features.push("AVX2");
    }
    if is_x86_feature_detected!("avx512f") {
        features.push("AVX512F");
    }
    features
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn detected_simd_features() -> Vec<&'static str> {
    Vec::new()
}
