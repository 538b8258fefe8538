use crate::trvae_data_loader::*;
use crate::trvae_inference::TrainConfig;
use crate::trvae_loss_functions::gaussian_kl_loss;
use crate::trvae_model::TrVae;

use candle_nn::AdamW;
use candle_nn::Optimizer;
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;

/// Stochastic variational inference driver: invokes `guide` and `model`
/// with matching arguments each step and follows the gradient of a
/// reparameterized ELBO estimate.
pub struct Svi<'a> {
    pub vae: &'a TrVae,
}

impl<'a> Svi<'a> {
    pub fn build(vae: &'a TrVae) -> Self {
        Self { vae }
    }

    /// Maximize the ELBO over minibatches
    ///
    /// loss = mean_i [ beta * log q(z_i) - beta * log p(z_i) - log p(x_i|z_i) ]
    ///
    /// * `data` - data loader with optional one-hot labels
    /// * `train_config` - training configuration
    ///
    /// # Returns per-epoch average ELBO trace
    pub fn train<DataL>(
        &mut self,
        data: &mut DataL,
        train_config: &TrainConfig,
    ) -> anyhow::Result<Vec<f32>>
    where
        DataL: DataLoader,
    {
        let device = &train_config.device;
        let mut adam = AdamW::new_lr(self.vae.all_vars(), train_config.learning_rate.into())?;

        let pb = ProgressBar::new(train_config.num_epochs as u64);

        if !train_config.show_progress || train_config.verbose {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        let mut elbo_trace = vec![];
        let beta = train_config.kl_weight as f64;

        data.shuffle_minibatch(train_config.batch_size)?;

        let num_minibatches = data.num_minibatch();

        let minibatch_vec = (0..num_minibatches)
            .map(|b| {
                data.minibatch_data(b, device)
                    .unwrap_or_else(|_| panic!("failed to preload minibatch #{}", b))
            })
            .collect::<Vec<_>>();

        for _epoch in 0..train_config.num_epochs {
            let mut elbo_tot = 0f32;
            let mut kl_tot = 0f32;

            for minibatch_data in minibatch_vec.iter() {
                let x = &minibatch_data.input;
                let y = minibatch_data.output.as_ref();

                let guide_trace = self.vae.guide(x, y, beta)?;
                let model_trace = self.vae.model(x, y, Some(&guide_trace), beta)?;

                let elbo_n = ((&model_trace.llik_n + &model_trace.log_pz_n)?
                    - &guide_trace.log_qz_n)?;
                let loss = elbo_n.mean_all()?.neg()?;
                adam.backward_step(&loss)?;

                elbo_tot += elbo_n.mean_all()?.to_scalar::<f32>()?;

                if train_config.verbose {
                    let z_lnvar_nk = (guide_trace.z_scale_nk.log()? * 2.)?;
                    let kl_n = gaussian_kl_loss(&guide_trace.z_loc_nk, &z_lnvar_nk)?;
                    kl_tot += kl_n.mean_all()?.to_scalar::<f32>()?;
                }
            }
            elbo_trace.push(elbo_tot / num_minibatches as f32);
            pb.inc(1);

            if train_config.verbose {
                info!(
                    "[{}] elbo: {} (kl: {})",
                    _epoch + 1,
                    elbo_trace.last().ok_or(anyhow::anyhow!("elbo"))?,
                    kl_tot / num_minibatches as f32
                );
            }
        } // each epoch

        pb.finish_and_clear();
        Ok(elbo_trace)
    }
}
