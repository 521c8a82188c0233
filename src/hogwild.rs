use std::error::Error;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;

use crate::feature_buffer::SparseRow;
use crate::multithread_helpers::SharedRegressor;
use crate::score::ScoreTrait;

/// Loss summed over the examples a worker trained on
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LossTally {
    pub loss_sum: f64,
    pub count: u64,
}

impl LossTally {
    pub fn add(&mut self, other: LossTally) {
        self.loss_sum += other.loss_sum;
        self.count += other.count;
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.loss_sum / self.count as f64
        }
    }
}

pub struct HogwildTrainer {
    workers: Vec<JoinHandle<Result<LossTally, String>>>,
    sender: Option<Sender<Arc<Vec<SparseRow>>>>,
}

pub struct HogwildWorker {
    regressor: SharedRegressor,
    score: Box<dyn ScoreTrait>,
}

impl HogwildTrainer {
    pub fn new(sharable_regressor: SharedRegressor, num_workers: u32) -> Result<HogwildTrainer, Box<dyn Error>> {
        if num_workers == 0 {
            return Err("Hogwild needs at least one worker".to_string())?;
        }
        let (sender, receiver): (Sender<Arc<Vec<SparseRow>>>, Receiver<Arc<Vec<SparseRow>>>) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(num_workers as usize);
        for _ in 0..num_workers {
            let score = sharable_regressor.new_score_instance();
            let worker = HogwildWorker::new(sharable_regressor.clone(), score, Arc::clone(&receiver));
            workers.push(worker);
        }
        log::debug!("Started {} hogwild workers", num_workers);
        Ok(HogwildTrainer {
            workers,
            sender: Some(sender),
        })
    }

    pub fn digest_batch(&self, batch: Arc<Vec<SparseRow>>) -> Result<(), Box<dyn Error>> {
        match &self.sender {
            Some(sender) => sender
                .send(batch)
                .map_err(|_| "All hogwild workers have exited".to_string())?,
            None => return Err("Hogwild trainer is already finished".to_string())?,
        }
        Ok(())
    }

    /// Closes the channel, waits for the queue to drain and sums up the worker losses
    pub fn block_until_workers_finished(mut self) -> Result<LossTally, Box<dyn Error>> {
        self.sender = None;
        let mut tally = LossTally::default();
        for worker in self.workers.drain(..) {
            match worker.join() {
                Ok(Ok(worker_tally)) => tally.add(worker_tally),
                Ok(Err(e)) => return Err(e)?,
                Err(_) => return Err("Hogwild worker panicked".to_string())?,
            }
        }
        Ok(tally)
    }
}

impl HogwildWorker {
    pub fn new(
        regressor: SharedRegressor,
        score: Box<dyn ScoreTrait>,
        receiver: Arc<Mutex<Receiver<Arc<Vec<SparseRow>>>>>,
    ) -> JoinHandle<Result<LossTally, String>> {
        let mut worker = HogwildWorker { regressor, score };
        thread::spawn(move || worker.train(receiver))
    }

    pub fn train(&mut self, receiver: Arc<Mutex<Receiver<Arc<Vec<SparseRow>>>>>) -> Result<LossTally, String> {
        let mut tally = LossTally::default();
        loop {
            let batch = {
                let guard = receiver.lock().map_err(|_| "Hogwild receiver poisoned".to_string())?;
                match guard.recv() {
                    Ok(batch) => batch,
                    // sender dropped, no more work
                    Err(_) => return Ok(tally),
                }
            };
            for row in batch.iter() {
                let score = self
                    .regressor
                    .learn_with_score(&mut *self.score, row, true)
                    .map_err(|e| e.to_string())?;
                tally.loss_sum += self.regressor.loss.loss(score, row.label) as f64;
                tally.count += 1;
            }
        }
    }
}
