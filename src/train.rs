use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::Rng;
use tch::{
    nn::{Adam, Optimizer, OptimizerConfig, VarStore},
    Device, Kind, Tensor,
};

use crate::constants;
use crate::dataset::{random_split, RoteDataset, Subset};
use crate::model::RoteNet;

/// Every hyperparameter of the experiment. There are no flags or environment
/// variables; `Default` is the full-size run from `constants`.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub opt_num: i64,
    pub seq_len: i64,
    pub test_ratio: f64,
    pub batch_size: usize,
    pub hidden_size: i64,
    pub lay_len: usize,
    pub backup_interval: usize,
    pub trials: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub backup_dir: PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            epochs: constants::EPOCHS,
            opt_num: constants::OPT_NUM,
            seq_len: constants::SEQ_LEN,
            test_ratio: constants::TEST_RATIO,
            batch_size: constants::BATCH_SIZE,
            hidden_size: constants::HIDDEN_SIZE,
            lay_len: constants::LAY_LEN,
            backup_interval: constants::BACKUP_INTERVAL,
            trials: constants::TRIALS,
            learning_rate: constants::LEARNING_RATE,
            weight_decay: constants::WEIGHT_DECAY,
            backup_dir: PathBuf::from(constants::BACKUP_DIR),
        }
    }
}

/// One trial's model, parameters and optimizer. Each trial builds a fresh one
/// so trials are fully independent runs.
pub struct RoteTrainer {
    var_store: VarStore,
    model: RoteNet,
    optimizer: Optimizer,
}

impl RoteTrainer {
    pub fn new(device: Device, config: &TrainConfig) -> RoteTrainer {
        let var_store = VarStore::new(device);
        let model = RoteNet::new(
            &var_store.root(),
            config.opt_num + 1,
            config.opt_num,
            config.hidden_size,
            config.lay_len,
        );
        let optimizer = Adam {
            wd: config.weight_decay,
            ..Default::default()
        }
        .build(&var_store, config.learning_rate)
        .expect("failed to create Adam optimizer");
        RoteTrainer {
            var_store,
            model,
            optimizer,
        }
    }

    // Used by the inspection utility and tests, not the training run itself.
    #[allow(dead_code)]
    pub fn model_mut(&mut self) -> &mut RoteNet {
        &mut self.model
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.var_store
            .save(path)
            .with_context(|| format!("failed to save checkpoint to {}", path.display()))
    }

    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.var_store
            .load(path)
            .with_context(|| format!("failed to load checkpoint from {}", path.display()))
    }

    /// One pass over the shuffled training split. Returns the mean batch loss.
    fn train_epoch<R: Rng>(&mut self, train: &mut Subset, config: &TrainConfig, rng: &mut R) -> f64 {
        train.shuffle(rng);
        let mut total_loss = 0.0;
        let mut batches = 0;
        for (inputs, targets) in train.batches(config.batch_size) {
            total_loss += self.train_batch(&inputs, &targets, config);
            batches += 1;
        }
        total_loss / batches as f64
    }

    /// One optimizer step on one mini-batch. The input batch is zero-padded up
    /// to the configured capacity so the model always sees a fixed batch
    /// dimension; the loss only looks at the true rows, and only at the
    /// recall phase (the first `seq_len` warm-up steps are not scored).
    fn train_batch(&mut self, inputs: &Tensor, targets: &Tensor, config: &TrainConfig) -> f64 {
        let device = self.var_store.device();
        let inputs = inputs.to_device(device);
        let targets = targets.to_device(device);
        let true_size = inputs.size()[0];
        let padded = pad_batch(&inputs, config.batch_size as i64);
        let outputs = self.model.forward(&padded);
        let scored = drop_warmup(&outputs, config.seq_len).narrow(0, 0, true_size);
        let loss = cross_entropy(&scored, &targets);
        self.optimizer.backward_step(&loss);
        f64::try_from(&loss).expect("couldn't compute f64 from loss tensor")
    }

    /// Mean loss over the test split, without gradient tracking and without
    /// padding (batch sizes may vary here).
    fn validate(&mut self, test: &Subset, config: &TrainConfig) -> f64 {
        let _guard = tch::no_grad_guard();
        let device = self.var_store.device();
        let mut total_loss = 0.0;
        let mut batches = 0;
        for (inputs, targets) in test.batches(config.batch_size) {
            let inputs = inputs.to_device(device);
            let targets = targets.to_device(device);
            let outputs = self.model.forward(&inputs);
            let scored = drop_warmup(&outputs, config.seq_len);
            let loss = cross_entropy(&scored, &targets);
            total_loss += f64::try_from(&loss).expect("couldn't compute f64 from loss tensor");
            batches += 1;
        }
        if batches == 0 {
            return 0.0;
        }
        total_loss / batches as f64
    }
}

/// Zero-pads a `[n, time, channels]` batch up to `capacity` rows.
fn pad_batch(inputs: &Tensor, capacity: i64) -> Tensor {
    let size = inputs.size();
    if size[0] == capacity {
        return inputs.shallow_clone();
    }
    let padded = Tensor::zeros(&[capacity, size[1], size[2]], (Kind::Float, inputs.device()));
    padded.narrow(0, 0, size[0]).copy_(inputs);
    padded
}

/// Drops the first `seq_len` time-steps: the model is scored only on its
/// recall of the memorized sequence, not on the memorization phase itself.
fn drop_warmup(outputs: &Tensor, seq_len: i64) -> Tensor {
    let steps = outputs.size()[1];
    outputs.narrow(1, seq_len, steps - seq_len)
}

/// Cross-entropy over the model's probability outputs: `-mean(ln p_target)`.
/// `probs` is `[n, time, classes]`, `targets` is `[n, time]` int64. A perfect
/// prediction scores ~0, a uniform one ~`ln(classes)`.
fn cross_entropy(probs: &Tensor, targets: &Tensor) -> Tensor {
    let log_probs = probs.clamp_min(1e-9).log();
    let picked = log_probs
        .gather(-1, &targets.unsqueeze(-1), false)
        .squeeze_dim(-1);
    picked.mean(Kind::Float).neg()
}

/// Everything one trial leaves behind: its loss histories, wall-clock time,
/// and the trainer itself (which keeps the final parameters in memory).
pub struct TrialOutcome {
    pub trainer: RoteTrainer,
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub elapsed: Duration,
}

/// Runs `config.trials` independent training runs over one shared dataset
/// split: fresh parameters and optimizer per trial, periodic progress lines
/// and checkpoints, and a final `backup.ckpt` of the last trial's parameters.
///
/// Checkpoints land in `config.backup_dir`, which must already exist.
pub fn run_experiment(device: Device, config: &TrainConfig) -> Vec<TrialOutcome> {
    let dataset = RoteDataset::new(config.opt_num, config.seq_len);
    let mut rng = rand::thread_rng();
    let (mut train, test) = random_split(&dataset, config.test_ratio, &mut rng);

    let mut outcomes: Vec<TrialOutcome> = Vec::with_capacity(config.trials);
    for trial in 0..config.trials {
        let mut trainer = RoteTrainer::new(device, config);
        let mut train_losses = Vec::with_capacity(config.epochs);
        let mut val_losses = Vec::with_capacity(config.epochs);

        println!(
            "Starting training trial {}/{}, using {:?}.",
            trial + 1,
            config.trials,
            device
        );

        let start = Instant::now();
        for epoch in 0..config.epochs {
            let train_loss = trainer.train_epoch(&mut train, config, &mut rng);
            let val_loss = trainer.validate(&test, config);
            train_losses.push(train_loss);
            val_losses.push(val_loss);

            if (epoch + 1) % config.backup_interval == 0 {
                println!(
                    "Epoch {}/{}, time: {:.3}, Loss: {:.5}, Val Loss: {:.5}",
                    epoch + 1,
                    config.epochs,
                    start.elapsed().as_secs_f64(),
                    train_loss,
                    val_loss
                );
                let path = config
                    .backup_dir
                    .join(format!("backup.{}.{}.ckpt", trial + 1, epoch + 1));
                trainer.save(&path).expect("failed to save checkpoint");
            }
        }
        let elapsed = start.elapsed();
        println!("Finished! ({:.3}s)", elapsed.as_secs_f64());

        outcomes.push(TrialOutcome {
            trainer,
            train_losses,
            val_losses,
            elapsed,
        });
    }

    if let Some(last) = outcomes.last() {
        last.trainer
            .save(&config.backup_dir.join("backup.ckpt"))
            .expect("failed to save final checkpoint");
    }
    outcomes
}
