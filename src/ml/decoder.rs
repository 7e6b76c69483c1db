// ============================================================
// Layer 5 — Decoder Stack
// ============================================================
// n_layer identical layers, each:
//
//   x ─▶ self-attention (no mask) ─▶ cross-attention ─▶ feed-forward
//                                      ▲ keys/values
//                                      └── encoder output
//
// The decoder reads the same embedded window as the encoder.
// Its self-attention is unmasked: every position sees the whole
// window. Only the last position reaches the output projector.

use burn::prelude::*;

use crate::ml::attention::{ScaledAttention, ScaledAttentionConfig};
use crate::ml::feed_forward::{FeedForward, FeedForwardConfig};

#[derive(Config, Debug)]
pub struct DecoderConfig {
    pub n_layer: usize,
    pub d_model: usize,
    pub d_inner: usize,
    pub n_head:  usize,
    pub d_k:     usize,
    pub d_v:     usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    #[config(default = false)]
    pub scaled_attn: bool,
}

impl DecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Decoder<B> {
        let attention = || {
            ScaledAttentionConfig::new(self.d_model, self.n_head, self.d_k, self.d_v)
                .with_dropout(self.dropout)
                .with_scaled(self.scaled_attn)
                .init(device)
        };
        let layers = (0..self.n_layer)
            .map(|_| DecoderLayer {
                slf_attn: attention(),
                enc_attn: attention(),
                pos_ffn:  FeedForwardConfig::new(self.d_model, self.d_inner)
                    .with_dropout(self.dropout)
                    .init(device),
            })
            .collect();
        Decoder { layers }
    }
}

#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    pub slf_attn: ScaledAttention<B>,
    pub enc_attn: ScaledAttention<B>,
    pub pos_ffn:  FeedForward<B>,
}

pub struct DecoderOutput<B: Backend> {
    /// [batch, seq_len, d_model]
    pub output:   Tensor<B, 3>,
    /// Last layer's self-attention, [batch, n_head, seq_len, seq_len]
    pub slf_attn: Tensor<B, 4>,
    /// Last layer's decoder→encoder attention, [batch, n_head, seq_len, enc_len]
    pub enc_attn: Tensor<B, 4>,
}

impl<B: Backend> DecoderLayer<B> {
    pub fn forward(&self, x: Tensor<B, 3>, enc_output: Tensor<B, 3>) -> DecoderOutput<B> {
        let slf = self.slf_attn.forward(x.clone(), x.clone(), x, None);
        let enc = self.enc_attn.forward(slf.output, enc_output.clone(), enc_output, None);
        DecoderOutput {
            output:   self.pos_ffn.forward(enc.output),
            slf_attn: slf.probs,
            enc_attn: enc.probs,
        }
    }
}

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    pub layers: Vec<DecoderLayer<B>>,
}

impl<B: Backend> Decoder<B> {
    pub fn forward(&self, x: Tensor<B, 3>, enc_output: Tensor<B, 3>) -> DecoderOutput<B> {
        let Some((first, rest)) = self.layers.split_first() else {
            panic!("decoder has no layers");
        };

        let mut out = first.forward(x, enc_output.clone());
        for layer in rest {
            out = layer.forward(out.output, enc_output.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray;

    #[test]
    fn test_stack_shapes() {
        let device = Default::default();
        let decoder = DecoderConfig::new(3, 16, 32, 2, 8, 8)
            .with_dropout(0.0)
            .init::<TestBackend>(&device);
        assert_eq!(decoder.layers.len(), 3);

        let x   = Tensor::<TestBackend, 3>::random([2, 5, 16], Distribution::Normal(0.0, 1.0), &device);
        let enc = Tensor::<TestBackend, 3>::random([2, 5, 16], Distribution::Normal(0.0, 1.0), &device);
        let out = decoder.forward(x, enc);
        assert_eq!(out.output.dims(), [2, 5, 16]);
        assert_eq!(out.slf_attn.dims(), [2, 2, 5, 5]);
        assert_eq!(out.enc_attn.dims(), [2, 2, 5, 5]);
    }

    #[test]
    fn test_self_attention_sees_future_positions() {
        let device = Default::default();
        let decoder = DecoderConfig::new(1, 16, 32, 2, 8, 8)
            .with_dropout(0.0)
            .init::<TestBackend>(&device);
        let x   = Tensor::<TestBackend, 3>::random([1, 4, 16], Distribution::Normal(0.0, 1.0), &device);
        let enc = Tensor::<TestBackend, 3>::random([1, 4, 16], Distribution::Normal(0.0, 1.0), &device);

        // first position's weight on the last position is strictly positive
        let p: Vec<f32> = decoder.forward(x, enc).slf_attn
            .slice([0..1, 0..1, 0..1, 3..4])
            .into_data()
            .to_vec()
            .unwrap();
        assert!(p[0] > 0.0);
    }
}
