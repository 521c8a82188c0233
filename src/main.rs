use rand::seq::SliceRandom;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use fwfm::feature_buffer::SparseRow;
use fwfm::hogwild::{HogwildTrainer, LossTally};
use fwfm::model_instance::ModelInstance;
use fwfm::multithread_helpers::UnsafelySharable;
use fwfm::parser::{parse_all, FileFormat};
use fwfm::persistence::{new_regressor_from_filename, save_regressor_to_filename};
use fwfm::regressor::Regressor;
use fwfm::score::ScoreFunction;
use fwfm::{cmdline, file, logging_layer};

const HOGWILD_BATCH_SIZE: usize = 256;

fn main() {
    logging_layer::initialize_logging_layer();

    if let Err(e) = main_fwfm_loop() {
        log::error!("Global error: {:?}", e);
        std::process::exit(1)
    }
}

fn read_examples(cl: &clap::ArgMatches, score_function: ScoreFunction) -> Result<Vec<SparseRow>, Box<dyn Error>> {
    let input_filename = match cl.value_of("data") {
        Some(filename) => filename,
        None => return Err("--data expected")?,
    };
    let format = match cl.value_of("file_format") {
        Some("libffm") => FileFormat::LibFFM,
        Some(_) => FileFormat::LibSVM,
        None if score_function == ScoreFunction::FFM => FileFormat::LibFFM,
        None => FileFormat::LibSVM,
    };
    let now = Instant::now();
    let mut bufferred_input = file::create_buffered_input(input_filename)?;
    let rows = parse_all(format, &mut *bufferred_input)?;
    log::info!(
        "Read {} examples from {} as {:?} in {:.2}s",
        rows.len(),
        input_filename,
        format,
        now.elapsed().as_secs_f32()
    );
    Ok(rows)
}

fn train_epoch_single(re: &mut Regressor, rows: &[SparseRow], order: &[usize]) -> Result<LossTally, Box<dyn Error>> {
    let mut tally = LossTally::default();
    for &i in order {
        let row = &rows[i];
        let score = re.learn(row, true)?;
        tally.loss_sum += re.loss.loss(score, row.label) as f64;
        tally.count += 1;
    }
    Ok(tally)
}

fn train_epoch_hogwild(
    re: Regressor,
    rows: &[SparseRow],
    order: &[usize],
    num_workers: u32,
) -> Result<(Regressor, LossTally), Box<dyn Error>> {
    let sharable_regressor = UnsafelySharable::new(re);
    let trainer = HogwildTrainer::new(sharable_regressor.clone(), num_workers)?;
    for chunk in order.chunks(HOGWILD_BATCH_SIZE) {
        let batch: Vec<SparseRow> = chunk.iter().map(|&i| rows[i].clone()).collect();
        trainer.digest_batch(Arc::new(batch))?;
    }
    let tally = trainer.block_until_workers_finished()?;
    match sharable_regressor.into_inner() {
        Ok(re) => Ok((re, tally)),
        Err(_) => Err("Regressor is still shared after hogwild workers finished")?,
    }
}

fn main_fwfm_loop() -> Result<(), Box<dyn Error>> {
    // We'll parse once the command line into cl and then different objects will examine it
    let cl = cmdline::parse();
    let testonly = cl.is_present("testonly");

    // Where will we be putting perdictions (if at all)
    let mut predictions_file = match cl.value_of("predictions") {
        Some(filename) => Some(BufWriter::new(File::create(filename)?)),
        None => None,
    };

    let final_regressor_filename = cl.value_of("final_regressor");
    if let Some(filename) = final_regressor_filename {
        log::info!("final_regressor = {}", filename);
    };

    let mi: ModelInstance;
    let mut re: Regressor;
    let rows: Vec<SparseRow>;

    if let Some(filename) = cl.value_of("initial_regressor") {
        log::info!("initial_regressor = {}", filename);
        let (mut mi2, re2) = new_regressor_from_filename(filename)?;
        // training schedule of this run comes from the command line
        let cl_mi = ModelInstance::new_from_cmdline(&cl)?;
        mi2.epochs = cl_mi.epochs;
        mi2.shuffle = cl_mi.shuffle;
        mi2.hogwild_threads = cl_mi.hogwild_threads;
        rows = read_examples(&cl, mi2.score_function)?;
        mi = mi2;
        re = re2;
    } else {
        let mut mi2 = ModelInstance::new_from_cmdline(&cl)?;
        rows = read_examples(&cl, mi2.score_function)?;
        let max_index = rows.iter().map(|r| r.max_index()).max().unwrap_or(0);
        let max_field = rows.iter().map(|r| r.max_field()).max().unwrap_or(0);
        mi2.fit_to_data(
            max_index,
            max_field,
            cl.is_present("num_feature"),
            cl.is_present("num_field"),
        )?;
        re = Regressor::new(&mi2)?;
        mi = mi2;
    }

    logging_layer::log_model_instance(&mi);

    if !testonly {
        let mut order: Vec<usize> = (0..rows.len()).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(mi.seed);
        for epoch in 0..mi.epochs {
            let now = Instant::now();
            if mi.shuffle {
                order.shuffle(&mut rng);
            }
            let tally = if mi.hogwild_threads > 0 {
                let (re2, tally) = train_epoch_hogwild(re, &rows, &order, mi.hogwild_threads)?;
                re = re2;
                tally
            } else {
                train_epoch_single(&mut re, &rows, &order)?
            };
            log::info!(
                "Epoch {}: average loss {:.6} over {} examples, {:.2}s",
                epoch + 1,
                tally.average(),
                tally.count,
                now.elapsed().as_secs_f32()
            );
        }
    }

    if testonly || predictions_file.is_some() {
        let mut tally = LossTally::default();
        for row in rows.iter() {
            let score = re.learn(row, false)?;
            tally.loss_sum += re.loss.loss(score, row.label) as f64;
            tally.count += 1;
            if let Some(file) = &mut predictions_file {
                writeln!(file, "{:.6}", re.loss.prediction(score))?;
            }
        }
        log::info!("Test loss {:.6} over {} examples", tally.average(), tally.count);
    }

    if let Some(file) = &mut predictions_file {
        file.flush()?;
    }

    if let Some(filename) = final_regressor_filename {
        save_regressor_to_filename(filename, &mi, &re)?;
    }

    Ok(())
}
