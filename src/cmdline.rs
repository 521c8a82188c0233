use clap::{App, AppSettings, Arg};

pub fn parse<'a>() -> clap::ArgMatches<'a> {
    create_expected_args().get_matches()
}

pub fn create_expected_args<'a>() -> App<'a, 'a> {
    App::new("fwfm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Linear, FM and FFM trainer with adaptive SGD")
        .setting(AppSettings::DeriveDisplayOrder)
        .arg(Arg::with_name("data")
            .long("data")
            .short("d")
            .value_name("filename")
            .help("Example set to use (.gz and .zst are decompressed)")
            .takes_value(true))
        .arg(Arg::with_name("file_format")
            .long("file_format")
            .value_name("libsvm|libffm")
            .help("Input format, libffm is \"label field:index:value ...\"")
            .possible_values(&["libsvm", "libffm"])
            .takes_value(true))
        .arg(Arg::with_name("score")
            .long("score")
            .short("s")
            .value_name("linear|fm|ffm")
            .help("Model family")
            .possible_values(&["linear", "fm", "ffm"])
            .takes_value(true))
        .arg(Arg::with_name("loss")
            .long("loss")
            .value_name("cross-entropy|squared")
            .help("Loss function")
            .possible_values(&["cross-entropy", "squared"])
            .takes_value(true))
        .arg(Arg::with_name("optimizer")
            .long("optimizer")
            .value_name("sgd|adagrad|adadelta|ftrl")
            .help("Update rule")
            .possible_values(&["sgd", "adagrad", "adadelta", "ftrl"])
            .takes_value(true))
        .arg(Arg::with_name("num_factor")
            .long("num_factor")
            .short("k")
            .value_name("k")
            .help("Length of the latent vectors, a multiple of the vector width")
            .takes_value(true))
        .arg(Arg::with_name("num_feature")
            .long("num_feature")
            .value_name("n")
            .help("Number of features including bias, inferred from data when not given")
            .takes_value(true))
        .arg(Arg::with_name("num_field")
            .long("num_field")
            .value_name("n")
            .help("Number of fields, inferred from data when not given")
            .takes_value(true))
        .arg(Arg::with_name("learning_rate")
            .long("learning_rate")
            .short("l")
            .value_name("0.2")
            .help("Learning rate")
            .takes_value(true))
        .arg(Arg::with_name("regu_lambda")
            .long("lambda")
            .value_name("0.00002")
            .help("L2 regularization coefficient")
            .takes_value(true))
        .arg(Arg::with_name("decay_rate")
            .long("decay_rate")
            .value_name("0.9")
            .help("Decay of the squared gradient average (adadelta)")
            .takes_value(true))
        .arg(Arg::with_name("ftrl_l1")
            .long("ftrl_l1")
            .value_name("0.0")
            .help("L1 regularization of FTRL")
            .takes_value(true))
        .arg(Arg::with_name("init_scale")
            .long("init_scale")
            .value_name("0.66")
            .help("Latent weights start uniform in [0, init_scale / sqrt(k))")
            .takes_value(true))
        .arg(Arg::with_name("epochs")
            .long("epochs")
            .short("e")
            .value_name("n")
            .help("Number of passes over the data")
            .takes_value(true))
        .arg(Arg::with_name("shuffle")
            .long("shuffle")
            .help("Shuffle the examples before each epoch")
            .takes_value(false))
        .arg(Arg::with_name("seed")
            .long("seed")
            .value_name("n")
            .help("Seed for weight initialization and shuffling")
            .takes_value(true))
        .arg(Arg::with_name("hogwild_threads")
            .long("hogwild_threads")
            .value_name("n")
            .help("Train with n lock-free worker threads, 0 is deterministic single-threaded mode")
            .takes_value(true))
        .arg(Arg::with_name("max_row_len")
            .long("max_row_len")
            .value_name("n")
            .help("Expected maximum number of features per example, sizes scratch buffers")
            .takes_value(true))
        .arg(Arg::with_name("testonly")
            .long("testonly")
            .short("t")
            .help("Ignore label information and just test")
            .takes_value(false))
        .arg(Arg::with_name("predictions")
            .long("predictions")
            .short("p")
            .value_name("filename")
            .help("File to output predictions to")
            .takes_value(true))
        .arg(Arg::with_name("final_regressor")
            .long("final_regressor")
            .short("f")
            .value_name("filename")
            .help("Final regressor to save")
            .takes_value(true))
        .arg(Arg::with_name("initial_regressor")
            .long("initial_regressor")
            .short("i")
            .value_name("filename")
            .help("Initial regressor to load")
            .takes_value(true))
}
