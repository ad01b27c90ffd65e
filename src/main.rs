use tch::Device;

mod constants;
mod dataset;
// Off-path debugging aid; reached from tests, not from the training run.
#[allow(dead_code)]
mod inspect;
mod memory;
mod model;
mod plot;
mod train;

fn main() {
    // One device decision for the whole run.
    let device = Device::cuda_if_available();
    let config = train::TrainConfig::default();

    let outcomes = train::run_experiment(device, &config);

    let times: Vec<f64> = outcomes
        .iter()
        .map(|outcome| outcome.elapsed.as_secs_f64())
        .collect();
    let total: f64 = times.iter().sum();
    println!(
        "Finished all trials in {:.3}s with average time {:.3}s.",
        total,
        total / times.len() as f64
    );

    let train_histories: Vec<Vec<f64>> = outcomes
        .iter()
        .map(|outcome| outcome.train_losses.clone())
        .collect();
    let val_histories: Vec<Vec<f64>> = outcomes
        .iter()
        .map(|outcome| outcome.val_losses.clone())
        .collect();
    plot::plot_loss_curves("Training loss per trial:", &train_histories);
    plot::plot_loss_curves("Validation loss per trial:", &val_histories);
}
