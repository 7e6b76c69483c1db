// ============================================================
// Layer 4 — N-gram Batcher
// ============================================================
// Implements Burn's Batcher trait: stacks a Vec<NgramSample>
// into the two tensors the model consumes.
//
//   Input:  N samples, each with a context of n_gram ids
//   Output: inputs  [N, n_gram]   (Int)
//           targets [N]           (Int)
//
// Every context in a batch must have the same length. A ragged
// batch is a broken data pipeline, so it panics here instead of
// being reshaped into something silently wrong.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::NgramSample;

/// A batch of next-token examples on one device.
#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    /// Context windows — shape: [batch_size, n_gram]
    pub inputs: Tensor<B, 2, Int>,

    /// Next-token ids — shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> LmBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }
}

#[derive(Clone, Debug)]
pub struct LmBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> LmBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<NgramSample, LmBatch<B>> for LmBatcher<B> {
    fn batch(&self, items: Vec<NgramSample>) -> LmBatch<B> {
        let batch_size = items.len();
        let n_gram     = items.first().map(|s| s.context.len()).unwrap_or(0);

        for sample in &items {
            assert_eq!(
                sample.context.len(), n_gram,
                "ragged batch: context of length {} in a batch of n_gram={}",
                sample.context.len(), n_gram,
            );
        }

        let input_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.context.iter().map(|&id| id as i32))
            .collect();

        let targets: Vec<i32> = items
            .iter()
            .map(|s| s.target as i32)
            .collect();

        let inputs = Tensor::<B, 1, Int>::from_ints(
            input_flat.as_slice(), &self.device
        ).reshape([batch_size, n_gram]);

        let targets = Tensor::<B, 1, Int>::from_ints(
            targets.as_slice(), &self.device
        );

        LmBatch { inputs, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn sample(context: Vec<u32>, target: u32) -> NgramSample {
        NgramSample { context, target }
    }

    #[test]
    fn test_batch_shapes_and_values() {
        let batcher = LmBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![
            sample(vec![1, 2, 3], 4),
            sample(vec![5, 6, 7], 8),
        ]);

        assert_eq!(batch.inputs.dims(), [2, 3]);
        assert_eq!(batch.len(), 2);

        let inputs: Vec<i64> = batch.inputs.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(inputs, vec![1, 2, 3, 5, 6, 7]);
        let targets: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(targets, vec![4, 8]);
    }

    #[test]
    #[should_panic(expected = "ragged batch")]
    fn test_ragged_batch_panics() {
        let batcher = LmBatcher::<TestBackend>::new(Default::default());
        batcher.batch(vec![sample(vec![1, 2, 3], 4), sample(vec![5, 6], 8)]);
    }
}
