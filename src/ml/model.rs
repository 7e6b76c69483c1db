use burn::{
    module::Param,
    nn::{
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Initializer,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

use crate::domain::weight_sharing::WeightSharing;
use crate::ml::attention::subsequent_mask;
use crate::ml::decoder::{Decoder, DecoderConfig};
use crate::ml::encoder::{Encoder, EncoderConfig};
use crate::ml::positional::PositionalEncoding;

#[derive(Config, Debug)]
pub struct NgramTransformerConfig {
    pub n_word:  usize,
    pub n_gram:  usize,
    pub d_model: usize,
    pub n_head:  usize,
    pub d_inner: usize,
    pub n_layer: usize,
    /// 0 tied+bias, 1 tied, 2 independent, anything else inner product.
    pub weight_sharing: i64,
    #[config(default = 0.1)]
    pub dropout: f64,
    #[config(default = false)]
    pub scaled_attn: bool,
}

impl NgramTransformerConfig {
    /// Per-head key/value width: d_model / n_head.
    pub fn d_k(&self) -> usize {
        self.d_model / self.n_head.max(1)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> NgramTransformer<B> {
        assert!(self.n_gram > 0, "n_gram must be positive");
        assert!(self.n_layer > 0, "n_layer must be positive");
        assert!(self.d_k() > 0, "d_model {} is smaller than n_head {}", self.d_model, self.n_head);

        let d_k = self.d_k();
        let encoder = EncoderConfig::new(self.n_layer, self.d_model, self.d_inner, self.n_head, d_k, d_k)
            .with_dropout(self.dropout)
            .with_scaled_attn(self.scaled_attn)
            .init(device);
        let decoder = DecoderConfig::new(self.n_layer, self.d_model, self.d_inner, self.n_head, d_k, d_k)
            .with_dropout(self.dropout)
            .with_scaled_attn(self.scaled_attn)
            .init(device);

        let sharing   = WeightSharing::from_code(self.weight_sharing);
        let projector = match sharing {
            WeightSharing::TiedWithBias => {
                OutputProjector::TiedWithBias(Initializer::Zeros.init([self.n_word], device))
            }
            WeightSharing::TiedNoBias   => OutputProjector::TiedNoBias(self.n_word),
            WeightSharing::Independent  => {
                OutputProjector::Independent(LinearConfig::new(self.d_model, self.n_word).init(device))
            }
            WeightSharing::InnerProduct => OutputProjector::InnerProduct(self.n_word),
        };
        tracing::debug!("Output projector: {}", sharing);

        NgramTransformer {
            embedding:       EmbeddingConfig::new(self.n_word, self.d_model).init(device),
            pos_enc:         PositionalEncoding::new(self.d_model, self.n_gram, device),
            dropout:         DropoutConfig::new(self.dropout).init(),
            layer_norm:      LayerNormConfig::new(self.d_model).with_epsilon(1e-6).init(device),
            encoder,
            decoder,
            projector,
            subsequent_mask: subsequent_mask(self.n_gram, device),
            n_gram:          self.n_gram,
        }
    }
}

/// Maps the decoder's last hidden state `[batch, d_model]` to logits `[batch, n_word]`.
///
/// The tied variants and `InnerProduct` hold no weight matrix of their own:
/// they read the model's embedding table, so that one parameter collects the
/// gradients of both the lookup and the projection. The `usize` they carry is
/// the vocabulary width.
#[derive(Module, Debug)]
pub enum OutputProjector<B: Backend> {
    /// `h·Eᵀ + b`
    TiedWithBias(Param<Tensor<B, 1>>),
    /// `h·Eᵀ`
    TiedNoBias(usize),
    /// `h·W + b` with its own `W`, `b`
    Independent(Linear<B>),
    /// `h·Eᵀ`
    InnerProduct(usize),
}

impl<B: Backend> OutputProjector<B> {
    pub fn forward(&self, hidden: Tensor<B, 2>, embedding: &Embedding<B>) -> Tensor<B, 2> {
        match self {
            Self::TiedWithBias(bias) => {
                hidden.matmul(embedding.weight.val().transpose()) + bias.val().unsqueeze::<2>()
            }
            Self::TiedNoBias(_) | Self::InnerProduct(_) => {
                hidden.matmul(embedding.weight.val().transpose())
            }
            Self::Independent(linear) => linear.forward(hidden),
        }
    }

    pub fn weight_sharing(&self) -> WeightSharing {
        match self {
            Self::TiedWithBias(_) => WeightSharing::TiedWithBias,
            Self::TiedNoBias(_)   => WeightSharing::TiedNoBias,
            Self::Independent(_)  => WeightSharing::Independent,
            Self::InnerProduct(_) => WeightSharing::InnerProduct,
        }
    }
}

#[derive(Module, Debug)]
pub struct NgramTransformer<B: Backend> {
    pub embedding:       Embedding<B>,
    pub pos_enc:         PositionalEncoding<B>,
    pub dropout:         Dropout,
    pub layer_norm:      LayerNorm<B>,
    pub encoder:         Encoder<B>,
    pub decoder:         Decoder<B>,
    pub projector:       OutputProjector<B>,
    /// [n_gram, n_gram], true where attention is allowed. Built once.
    pub subsequent_mask: Tensor<B, 2, Bool>,
    pub n_gram:          usize,
}

pub struct TransformerOutput<B: Backend> {
    /// [batch, n_word]
    pub logits:       Tensor<B, 2>,
    /// [batch, n_head, n_gram, n_gram]
    pub enc_slf_attn: Tensor<B, 4>,
    /// [batch, n_head, n_gram, n_gram]
    pub dec_slf_attn: Tensor<B, 4>,
    /// [batch, n_head, n_gram, n_gram]
    pub dec_enc_attn: Tensor<B, 4>,
}

impl<B: Backend> NgramTransformer<B> {
    /// inputs: [batch, n_gram] → next-token logits [batch, n_word]
    pub fn forward(&self, inputs: Tensor<B, 2, Int>) -> TransformerOutput<B> {
        let [batch, seq_len] = inputs.dims();
        assert_eq!(
            seq_len, self.n_gram,
            "input sequence length {seq_len} does not match n_gram {}", self.n_gram,
        );

        let embedded = self.embedding.forward(inputs);
        let x = embedded.clone() + self.pos_enc.forward(embedded);
        let x = self.layer_norm.forward(self.dropout.forward(x));

        let enc = self.encoder.forward(x.clone(), self.subsequent_mask.clone());
        let dec = self.decoder.forward(x, enc.output);

        let [_, _, d_model] = dec.output.dims();
        let last = dec.output
            .slice([0..batch, seq_len - 1..seq_len, 0..d_model])
            .reshape([batch, d_model]);

        TransformerOutput {
            logits:       self.projector.forward(last, &self.embedding),
            enc_slf_attn: enc.slf_attn,
            dec_slf_attn: dec.slf_attn,
            dec_enc_attn: dec.enc_attn,
        }
    }

    /// The output projection as a `[n_word, d_model]` matrix. For tied modes
    /// this is the embedding table itself.
    pub fn projection_weight(&self) -> Tensor<B, 2> {
        match &self.projector {
            OutputProjector::Independent(linear) => linear.weight.val().transpose(),
            _ => self.embedding.weight.val(),
        }
    }

    pub fn encoder_params(&self) -> usize {
        self.encoder.num_params()
    }
}
