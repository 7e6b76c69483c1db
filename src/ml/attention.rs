// ============================================================
// Layer 5 — Scaled Multi-Head Attention
// ============================================================
// For each of n_head heads:
//
//   Q = x_q·W_q   K = x_k·W_k   V = x_v·W_v      (d_k, d_k, d_v)
//   S = Q·Kᵀ  (÷ √d_k when `scaled`)
//   S[i, j] = -1e9 where the mask forbids i → j
//   P = softmax(S) over keys
//   head = P·V
//
// Heads are concatenated, projected back to d_model, then
//   out = LayerNorm(x_q + Dropout(concat·W_o))
//
// Burn's built-in MultiHeadAttention always scales and ties
// d_k to d_model / n_head, hence this module.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need §3.2

use burn::{
    nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
    tensor::{activation::softmax, TensorData},
};

/// Score written into forbidden positions before the softmax.
/// exp(-1e9 - max) underflows to exactly 0 in f32.
const MASKED_SCORE: f32 = -1.0e9;

#[derive(Config, Debug)]
pub struct ScaledAttentionConfig {
    pub d_model: usize,
    pub n_head:  usize,
    pub d_k:     usize,
    pub d_v:     usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    /// Divide scores by √d_k.
    #[config(default = false)]
    pub scaled:  bool,
}

impl ScaledAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ScaledAttention<B> {
        assert!(self.n_head > 0 && self.d_k > 0 && self.d_v > 0, "attention widths must be positive");

        let projection = |d_in: usize, d_out: usize| {
            LinearConfig::new(d_in, d_out).with_bias(false).init(device)
        };
        ScaledAttention {
            w_qs:       projection(self.d_model, self.n_head * self.d_k),
            w_ks:       projection(self.d_model, self.n_head * self.d_k),
            w_vs:       projection(self.d_model, self.n_head * self.d_v),
            fc:         projection(self.n_head * self.d_v, self.d_model),
            layer_norm: LayerNormConfig::new(self.d_model).with_epsilon(1e-6).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
            n_head:     self.n_head,
            d_k:        self.d_k,
            d_v:        self.d_v,
            scaled:     self.scaled,
        }
    }
}

#[derive(Module, Debug)]
pub struct ScaledAttention<B: Backend> {
    pub w_qs:       Linear<B>,
    pub w_ks:       Linear<B>,
    pub w_vs:       Linear<B>,
    pub fc:         Linear<B>,
    pub layer_norm: LayerNorm<B>,
    pub dropout:    Dropout,
    pub n_head:     usize,
    pub d_k:        usize,
    pub d_v:        usize,
    pub scaled:     bool,
}

pub struct AttentionOutput<B: Backend> {
    /// [batch, len_q, d_model]
    pub output: Tensor<B, 3>,
    /// [batch, n_head, len_q, len_k], before attention dropout
    pub probs:  Tensor<B, 4>,
}

impl<B: Backend> ScaledAttention<B> {
    /// `mask` is `[len_q, len_k]` with `true` where attention is allowed.
    pub fn forward(
        &self,
        query: Tensor<B, 3>,
        key:   Tensor<B, 3>,
        value: Tensor<B, 3>,
        mask:  Option<Tensor<B, 2, Bool>>,
    ) -> AttentionOutput<B> {
        let [batch, len_q, _] = query.dims();
        let len_k = key.dims()[1];
        assert_eq!(value.dims()[1], len_k, "key and value lengths differ");

        let residual = query.clone();

        // [batch, len, n_head, d] → [batch, n_head, len, d]
        let q = self.w_qs.forward(query).reshape([batch, len_q, self.n_head, self.d_k]).swap_dims(1, 2);
        let k = self.w_ks.forward(key).reshape([batch, len_k, self.n_head, self.d_k]).swap_dims(1, 2);
        let v = self.w_vs.forward(value).reshape([batch, len_k, self.n_head, self.d_v]).swap_dims(1, 2);

        let mut scores = q.matmul(k.swap_dims(2, 3)); // [batch, n_head, len_q, len_k]
        if self.scaled {
            scores = scores.div_scalar((self.d_k as f64).sqrt());
        }

        if let Some(mask) = mask {
            assert_eq!(
                mask.dims(), [len_q, len_k],
                "attention mask shape does not match [len_q, len_k]",
            );
            let blocked = mask
                .bool_not()
                .unsqueeze::<4>()
                .expand([batch, self.n_head, len_q, len_k]);
            scores = scores.mask_fill(blocked, MASKED_SCORE);
        }

        // burn's softmax subtracts the row max first, so -1e9 cannot overflow
        let probs = softmax(scores, 3);

        let context = self.dropout.forward(probs.clone()).matmul(v) // [batch, n_head, len_q, d_v]
            .swap_dims(1, 2)
            .reshape([batch, len_q, self.n_head * self.d_v]);

        let output = self.dropout.forward(self.fc.forward(context));
        let output = self.layer_norm.forward(output + residual);

        AttentionOutput { output, probs }
    }
}

/// Lower-triangular `[n, n]` mask: position `i` may attend to `j <= i`.
pub fn subsequent_mask<B: Backend>(n: usize, device: &B::Device) -> Tensor<B, 2, Bool> {
    let allowed: Vec<bool> = (0..n)
        .flat_map(|i| (0..n).map(move |j| j <= i))
        .collect();
    Tensor::<B, 2, Bool>::from_data(TensorData::new(allowed, [n, n]), device)
}
