/// Number of training epochs per trial.
pub const EPOCHS: usize = 500;
/// Number of distinct symbols the model must memorize and reproduce.
pub const OPT_NUM: i64 = 3;
/// Length of the sequence to memorize; the recall phase is the same length,
/// so the model sees `2 * SEQ_LEN` time-steps per example.
pub const SEQ_LEN: i64 = 10;
/// Fraction of the dataset held out for validation.
pub const TEST_RATIO: f64 = 0.1;
/// Fixed batch capacity fed to the model; short batches are zero-padded up to this.
pub const BATCH_SIZE: usize = 1 << 15;
/// Width of the memory vector carried by each memory cell.
pub const HIDDEN_SIZE: i64 = 32;
/// Number of stacked memory cells.
pub const LAY_LEN: usize = 2;
/// Epoch interval between progress lines and periodic checkpoints.
pub const BACKUP_INTERVAL: usize = 100;
/// Number of independent training trials.
pub const TRIALS: usize = 5;
/// Adam learning rate.
pub const LEARNING_RATE: f64 = 1e-3;
/// Adam weight decay.
pub const WEIGHT_DECAY: f64 = 1e-4;
/// Directory checkpoints are written into. Must exist before training starts.
pub const BACKUP_DIR: &str = "backups";
