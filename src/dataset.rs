use rand::seq::SliceRandom;
use rand::Rng;
use tch::Tensor;

/// Synthetic rote-memorization dataset.
///
/// The index space is every possible sequence of `seq_len` symbols drawn from
/// an alphabet of `opt_num` symbols, so the dataset holds `opt_num^seq_len`
/// examples and `get` is fully deterministic: the index's base-`opt_num`
/// digits are the sequence.
///
/// Each input covers `2 * seq_len` time-steps, one-hot over `opt_num + 1`
/// channels: the sequence itself for the first `seq_len` steps, then a
/// dedicated recall-prompt symbol (channel `opt_num`) for the remaining
/// steps, during which the model is expected to reproduce the sequence.
/// The target is the sequence's symbol indices, length `seq_len`.
#[derive(Debug, Clone)]
pub struct RoteDataset {
    opt_num: i64,
    seq_len: i64,
    len: usize,
}

impl RoteDataset {
    pub fn new(opt_num: i64, seq_len: i64) -> Self {
        let len = (opt_num as usize).pow(seq_len as u32);
        RoteDataset {
            opt_num,
            seq_len,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn seq_len(&self) -> i64 {
        self.seq_len
    }

    /// Input channel count: one channel per symbol plus the recall prompt.
    pub fn in_len(&self) -> i64 {
        self.opt_num + 1
    }

    pub fn out_len(&self) -> i64 {
        self.opt_num
    }

    /// Returns the `(input, target)` pair for a dataset index.
    /// Input is `[2 * seq_len, opt_num + 1]` float, target is `[seq_len]` int64.
    pub fn get(&self, index: usize) -> (Tensor, Tensor) {
        assert!(index < self.len, "dataset index {} out of range", index);
        let opt_num = self.opt_num as usize;
        let seq_len = self.seq_len as usize;
        let in_len = opt_num + 1;

        let mut symbols = Vec::with_capacity(seq_len);
        let mut rest = index;
        for _ in 0..seq_len {
            symbols.push((rest % opt_num) as i64);
            rest /= opt_num;
        }

        let mut input = vec![0.0f32; 2 * seq_len * in_len];
        for (step, &symbol) in symbols.iter().enumerate() {
            input[step * in_len + symbol as usize] = 1.0;
        }
        for step in seq_len..2 * seq_len {
            input[step * in_len + opt_num] = 1.0;
        }

        let input = Tensor::from_slice(&input).view([2 * self.seq_len, self.opt_num + 1]);
        let target = Tensor::from_slice(&symbols);
        (input, target)
    }
}

/// A view over a subset of dataset indices, iterable in mini-batches.
#[derive(Debug, Clone)]
pub struct Subset<'a> {
    dataset: &'a RoteDataset,
    indices: Vec<usize>,
}

impl Subset<'_> {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Reorders the examples in place; called once per epoch on the training
    /// split so batch composition varies between epochs.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.indices.shuffle(rng);
    }

    /// Iterates `(inputs, targets)` batches in current index order. The final
    /// batch may be smaller than `batch_size`; padding is the caller's job.
    pub fn batches(&self, batch_size: usize) -> Batches<'_> {
        Batches {
            dataset: self.dataset,
            indices: &self.indices,
            batch_size,
            cursor: 0,
        }
    }

    /// Number of batches one pass over this subset yields.
    pub fn batch_count(&self, batch_size: usize) -> usize {
        self.indices.len().div_ceil(batch_size)
    }
}

/// Splits the dataset into disjoint train/test subsets covering every index.
/// Test size is `floor(test_ratio * len)`, drawn at random.
pub fn random_split<'a, R: Rng>(
    dataset: &'a RoteDataset,
    test_ratio: f64,
    rng: &mut R,
) -> (Subset<'a>, Subset<'a>) {
    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    indices.shuffle(rng);
    let test_size = (test_ratio * dataset.len() as f64) as usize;
    let test_indices = indices.split_off(dataset.len() - test_size);
    (
        Subset { dataset, indices },
        Subset {
            dataset,
            indices: test_indices,
        },
    )
}

pub struct Batches<'a> {
    dataset: &'a RoteDataset,
    indices: &'a [usize],
    batch_size: usize,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = (Tensor, Tensor); // (inputs, targets) stacked along dim 0

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.indices.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.indices.len());
        let mut inputs = Vec::with_capacity(end - self.cursor);
        let mut targets = Vec::with_capacity(end - self.cursor);
        for &index in &self.indices[self.cursor..end] {
            let (input, target) = self.dataset.get(index);
            inputs.push(input);
            targets.push(target);
        }
        self.cursor = end;
        Some((Tensor::stack(&inputs, 0), Tensor::stack(&targets, 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tch::Kind;

    #[test]
    fn test_len_is_symbol_count_to_the_seq_len() {
        let ds = RoteDataset::new(3, 4);
        assert_eq!(ds.len(), 81);
        assert_eq!(ds.in_len(), 4);
        assert_eq!(ds.out_len(), 3);
    }

    #[test]
    fn test_get_shapes() {
        let ds = RoteDataset::new(3, 5);
        let (input, target) = ds.get(17);
        assert_eq!(input.size(), &[10, 4]);
        assert_eq!(target.size(), &[5]);
        assert_eq!(target.kind(), Kind::Int64);
    }

    #[test]
    fn test_get_is_deterministic() {
        let ds = RoteDataset::new(3, 4);
        let (a_in, a_tgt) = ds.get(42);
        let (b_in, b_tgt) = ds.get(42);
        let input_diff = f64::try_from((&a_in - &b_in).abs().sum(Kind::Float)).unwrap();
        let target_diff = f64::try_from((&a_tgt - &b_tgt).abs().sum(Kind::Float)).unwrap();
        assert_eq!(input_diff, 0.0);
        assert_eq!(target_diff, 0.0);
    }

    #[test]
    fn test_input_is_one_hot_with_prompt_phase() {
        let ds = RoteDataset::new(3, 4);
        let (input, target) = ds.get(30);
        // Every time-step is one-hot
        let row_sums = input.sum_dim_intlist(-1, false, Kind::Float);
        for step in 0..8 {
            let sum = f64::try_from(row_sums.get(step)).unwrap();
            assert!((sum - 1.0).abs() < 1e-6, "step {} not one-hot", step);
        }
        // Memorization phase encodes the target symbols
        let targets = Vec::<i64>::try_from(&target).unwrap();
        for (step, &symbol) in targets.iter().enumerate() {
            let hot = f64::try_from(input.get(step as i64).get(symbol)).unwrap();
            assert_eq!(hot, 1.0);
        }
        // Recall phase holds only the prompt channel
        for step in 4..8 {
            let hot = f64::try_from(input.get(step).get(3)).unwrap();
            assert_eq!(hot, 1.0);
        }
    }

    #[test]
    fn test_random_split_is_disjoint_and_covers() {
        let ds = RoteDataset::new(2, 4); // 16 examples
        let mut rng = StdRng::seed_from_u64(7);
        let (train, test) = random_split(&ds, 0.25, &mut rng);
        assert_eq!(test.len(), 4);
        assert_eq!(train.len(), 12);
        let mut all: Vec<usize> = train
            .indices
            .iter()
            .chain(test.indices.iter())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_batches_sizes_and_final_partial_batch() {
        let ds = RoteDataset::new(2, 4); // 16 examples
        let mut rng = StdRng::seed_from_u64(1);
        let (train, _test) = random_split(&ds, 0.125, &mut rng); // 14 train
        assert_eq!(train.batch_count(4), 4);
        let sizes: Vec<i64> = train
            .batches(4)
            .map(|(inputs, targets)| {
                assert_eq!(inputs.size()[0], targets.size()[0]);
                assert_eq!(inputs.size()[1], 8);
                inputs.size()[0]
            })
            .collect();
        assert_eq!(sizes, vec![4, 4, 4, 2]);
    }

    #[test]
    fn test_shuffle_preserves_membership() {
        let ds = RoteDataset::new(2, 3);
        let mut rng = StdRng::seed_from_u64(3);
        let (mut train, _test) = random_split(&ds, 0.0, &mut rng);
        let mut before = train.indices.clone();
        train.shuffle(&mut rng);
        let mut after = train.indices.clone();
        before.sort_unstable();
        after.sort_unstable();
        assert_eq!(before, after);
    }
}
