use burn::{prelude::*, tensor::TensorData};

/// Fixed sinusoidal position table, `[n_gram, d_model]`.
///
/// `P[pos, 2i]   = sin(pos / 10000^(2i / d_model))`
/// `P[pos, 2i+1] = cos(pos / 10000^(2i / d_model))`
///
/// Held as a constant tensor: it is moved with the module but is neither a
/// parameter nor part of the saved record.
#[derive(Module, Debug)]
pub struct PositionalEncoding<B: Backend> {
    table:   Tensor<B, 2>,
    n_gram:  usize,
    d_model: usize,
}

impl<B: Backend> PositionalEncoding<B> {
    pub fn new(d_model: usize, n_gram: usize, device: &B::Device) -> Self {
        let values = sinusoid_table(d_model, n_gram);
        let table  = Tensor::<B, 2>::from_data(TensorData::new(values, [n_gram, d_model]), device);
        Self { table, n_gram, d_model }
    }

    /// Position vectors matching `embedded`'s `[batch, seq_len, d_model]` shape.
    /// The caller adds them to the token embeddings.
    pub fn forward(&self, embedded: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, seq_len, d_model] = embedded.dims();
        assert!(
            seq_len <= self.n_gram,
            "sequence of length {seq_len} exceeds positional table of {}", self.n_gram,
        );
        assert_eq!(d_model, self.d_model, "embedding width does not match positional table");

        self.table
            .clone()
            .slice([0..seq_len, 0..d_model])
            .unsqueeze::<3>()
            .expand([batch, seq_len, d_model])
    }

    pub fn table(&self) -> Tensor<B, 2> {
        self.table.clone()
    }
}

/// Row-major `[n_gram, d_model]` table, computed in f64 and stored as f32.
pub fn sinusoid_table(d_model: usize, n_gram: usize) -> Vec<f32> {
    let mut values = Vec::with_capacity(n_gram * d_model);
    for pos in 0..n_gram {
        for channel in 0..d_model {
            let angle = pos as f64 / 10000f64.powf((2 * (channel / 2)) as f64 / d_model as f64);
            let value = if channel % 2 == 0 { angle.sin() } else { angle.cos() };
            values.push(value as f32);
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_table_matches_sinusoid_formula() {
        let d_model = 8;
        let pe = PositionalEncoding::<TestBackend>::new(d_model, 5, &Default::default());
        let table: Vec<f32> = pe.table().into_data().to_vec().unwrap();

        for &(pos, i) in &[(0usize, 0usize), (1, 0), (3, 1), (4, 3), (2, 2)] {
            let angle = pos as f64 / 10000f64.powf((2 * i) as f64 / d_model as f64);
            assert_eq!(table[pos * d_model + 2 * i], angle.sin() as f32);
            assert_eq!(table[pos * d_model + 2 * i + 1], angle.cos() as f32);
        }
    }

    #[test]
    fn test_position_zero_is_alternating_zero_one() {
        let table = sinusoid_table(6, 1);
        assert_eq!(table, vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_forward_broadcasts_over_batch() {
        let device = Default::default();
        let pe = PositionalEncoding::<TestBackend>::new(4, 6, &device);
        let embedded = Tensor::<TestBackend, 3>::zeros([3, 6, 4], &device);

        let pos = pe.forward(embedded);
        assert_eq!(pos.dims(), [3, 6, 4]);

        let first: Vec<f32> = pos.clone().slice([0..1, 0..6, 0..4]).into_data().to_vec().unwrap();
        let last:  Vec<f32> = pos.slice([2..3, 0..6, 0..4]).into_data().to_vec().unwrap();
        assert_eq!(first, last);
        assert_eq!(first, sinusoid_table(4, 6));
    }

    #[test]
    fn test_forward_truncates_to_shorter_sequence() {
        let device = Default::default();
        let pe = PositionalEncoding::<TestBackend>::new(4, 6, &device);
        let pos = pe.forward(Tensor::<TestBackend, 3>::zeros([1, 2, 4], &device));
        assert_eq!(pos.dims(), [1, 2, 4]);
    }
}
