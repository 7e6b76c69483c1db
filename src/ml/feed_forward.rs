use burn::{
    nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};

#[derive(Config, Debug)]
pub struct FeedForwardConfig {
    pub d_model: usize,
    pub d_inner: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl FeedForwardConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        FeedForward {
            w_1:        LinearConfig::new(self.d_model, self.d_inner).init(device),
            w_2:        LinearConfig::new(self.d_inner, self.d_model).init(device),
            layer_norm: LayerNormConfig::new(self.d_model).with_epsilon(1e-6).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Position-wise `LayerNorm(x + Dropout(W₂·relu(W₁·x)))`.
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub w_1:        Linear<B>,
    pub w_2:        Linear<B>,
    pub layer_norm: LayerNorm<B>,
    pub dropout:    Dropout,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let residual = x.clone();
        let x = self.w_2.forward(relu(self.w_1.forward(x)));
        self.layer_norm.forward(self.dropout.forward(x) + residual)
    }
}
