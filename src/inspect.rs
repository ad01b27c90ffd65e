use tch::{Device, Tensor};

use crate::dataset::RoteDataset;
use crate::model::RoteNet;

/// Runs one datapoint through a trained model, no batching: reset the memory,
/// forward, drop the warm-up prefix, argmax over the symbol axis. Returns
/// `(predictions, targets, probabilities)`. Debugging aid, not part of the
/// training path; the model and device come in as parameters rather than
/// through any shared state.
pub fn inspect(
    model: &mut RoteNet,
    device: Device,
    dataset: &RoteDataset,
    index: usize,
) -> (Tensor, Tensor, Tensor) {
    let _guard = tch::no_grad_guard();
    model.reset();
    let (input, target) = dataset.get(index);
    let input = input.to_device(device).unsqueeze(0);
    let output = model.forward(&input).squeeze_dim(0);
    let steps = output.size()[0];
    let probs = output.narrow(0, dataset.seq_len(), steps - dataset.seq_len());
    let predictions = probs.argmax(-1, false);
    (predictions, target, probs)
}

/// Prints a per-step comparison of target vs. predicted symbol for one
/// datapoint, with a match marker.
pub fn print_comparison(model: &mut RoteNet, device: Device, dataset: &RoteDataset, index: usize) {
    let (predictions, targets, _probs) = inspect(model, device, dataset, index);
    let predictions = Vec::<i64>::try_from(&predictions).expect("predictions not a 1-D int tensor");
    let targets = Vec::<i64>::try_from(&targets).expect("targets not a 1-D int tensor");
    println!("Sequence comparison for datapoint {}:", index);
    for (target, predicted) in targets.iter().zip(predictions.iter()) {
        let mark = if target == predicted { "✔" } else { "WRONG" };
        println!("\t{}\t{}\t{}", target, predicted, mark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::nn::VarStore;
    use tch::Kind;

    fn setup() -> (VarStore, RoteNet, RoteDataset) {
        let vs = VarStore::new(Device::Cpu);
        let ds = RoteDataset::new(3, 4);
        let model = RoteNet::new(&vs.root(), ds.in_len(), ds.out_len(), 16, 2);
        (vs, model, ds)
    }

    #[test]
    fn test_inspect_shapes() {
        let (_vs, mut model, ds) = setup();
        let (predictions, targets, probs) = inspect(&mut model, Device::Cpu, &ds, 11);
        assert_eq!(predictions.size(), &[4]);
        assert_eq!(targets.size(), &[4]);
        assert_eq!(probs.size(), &[4, 3]);
    }

    #[test]
    fn test_inspect_predictions_match_probability_argmax() {
        let (_vs, mut model, ds) = setup();
        let (predictions, _targets, probs) = inspect(&mut model, Device::Cpu, &ds, 3);
        let expected = probs.argmax(-1, false);
        let diff = f64::try_from((&predictions - &expected).abs().sum(Kind::Float)).unwrap();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn test_inspect_is_repeatable() {
        // The reset at the top makes two inspections of the same datapoint agree
        let (_vs, mut model, ds) = setup();
        model.set_reset(false);
        let (_, _, first) = inspect(&mut model, Device::Cpu, &ds, 7);
        let (_, _, second) = inspect(&mut model, Device::Cpu, &ds, 7);
        let diff = f64::try_from((&first - &second).abs().max()).unwrap();
        assert_eq!(diff, 0.0);
    }
}
