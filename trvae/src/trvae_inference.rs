pub struct TrainConfig {
    pub learning_rate: f32,
    pub batch_size: usize,
    pub num_epochs: usize,
    /// KL scale factor applied to the latent site in both `model` and
    /// `guide` (beta-VAE style annealing weight)
    pub kl_weight: f32,
    pub device: candle_core::Device,
    pub verbose: bool,
    pub show_progress: bool,
}
