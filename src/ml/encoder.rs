// ============================================================
// Layer 5 — Encoder Stack
// ============================================================
// n_layer identical layers, each:
//
//   x → masked self-attention → feed-forward → x'
//
// The mask is the model's fixed subsequent mask, so position i
// only sees positions 0..=i of the context window.

use burn::prelude::*;

use crate::ml::attention::{ScaledAttention, ScaledAttentionConfig};
use crate::ml::feed_forward::{FeedForward, FeedForwardConfig};

#[derive(Config, Debug)]
pub struct EncoderConfig {
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

impl EncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Encoder<B> {
        let layers = (0..self.n_layer)
            .map(|_| EncoderLayer {
                slf_attn: ScaledAttentionConfig::new(self.d_model, self.n_head, self.d_k, self.d_v)
                    .with_dropout(self.dropout)
                    .with_scaled(self.scaled_attn)
                    .init(device),
                pos_ffn: FeedForwardConfig::new(self.d_model, self.d_inner)
                    .with_dropout(self.dropout)
                    .init(device),
            })
            .collect();
        Encoder { layers }
    }
}

#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    pub slf_attn: ScaledAttention<B>,
    pub pos_ffn:  FeedForward<B>,
}

impl<B: Backend> EncoderLayer<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask: Tensor<B, 2, Bool>) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let attn = self.slf_attn.forward(x.clone(), x.clone(), x, Some(mask));
        (self.pos_ffn.forward(attn.output), attn.probs)
    }
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub layers: Vec<EncoderLayer<B>>,
}

pub struct EncoderOutput<B: Backend> {
    /// [batch, seq_len, d_model]
    pub output:   Tensor<B, 3>,
    /// Last layer's self-attention, [batch, n_head, seq_len, seq_len]
    pub slf_attn: Tensor<B, 4>,
}

impl<B: Backend> Encoder<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask: Tensor<B, 2, Bool>) -> EncoderOutput<B> {
        let Some((first, rest)) = self.layers.split_first() else {
            panic!("encoder has no layers");
        };

        let (mut output, mut slf_attn) = first.forward(x, mask.clone());
        for layer in rest {
            (output, slf_attn) = layer.forward(output, mask.clone());
        }

        EncoderOutput { output, slf_attn }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::attention::subsequent_mask;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray;

    #[test]
    fn test_stack_shapes() {
        let device = Default::default();
        let encoder = EncoderConfig::new(2, 16, 32, 4, 4, 4)
            .with_dropout(0.0)
            .init::<TestBackend>(&device);
        assert_eq!(encoder.layers.len(), 2);

        let x = Tensor::<TestBackend, 3>::random([3, 6, 16], Distribution::Normal(0.0, 1.0), &device);
        let out = encoder.forward(x, subsequent_mask(6, &device));
        assert_eq!(out.output.dims(), [3, 6, 16]);
        assert_eq!(out.slf_attn.dims(), [3, 4, 6, 6]);
    }
}
