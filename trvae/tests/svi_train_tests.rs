use candle_core::{Device, Tensor};
use ndarray::Array2;
use trvae::trvae_aux_layers::Nonlinearity;
use trvae::trvae_config::TrVaeConfig;
use trvae::trvae_data_loader::{DataLoader, InMemoryData};
use trvae::trvae_inference::TrainConfig;
use trvae::trvae_loss_functions::OutputSampler;
use trvae::trvae_model::TrVae;
use trvae::trvae_svi::Svi;

fn fixed_pattern(n: usize, h: usize, w: usize) -> Array2<f32> {
    let mut x_nd = Array2::<f32>::zeros((n, h * w));
    for mut row in x_nd.rows_mut() {
        for i in 0..h {
            for j in 0..w {
                row[i * w + j] = 0.2 + 0.6 * ((i + j) % 2) as f32;
            }
        }
    }
    x_nd
}

#[test]
fn training_improves_the_elbo() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let (n, h, w) = (32, 4, 4);

    let x_nd = fixed_pattern(n, h, w);
    let mut data = InMemoryData::new(&x_nd)?;
    assert_eq!(data.num_samples(), n);

    let config = TrVaeConfig {
        data_dim: vec![h, w],
        latent_dim: 2,
        coord: 0,
        hidden_dim_e: 16,
        hidden_dim_d: 16,
        activation: Nonlinearity::Tanh,
        sampler: OutputSampler::Gaussian { sigma: 0.5 },
        ..TrVaeConfig::default()
    };
    let vae = TrVae::new(config, &dev)?;

    let train_config = TrainConfig {
        learning_rate: 0.01,
        batch_size: 8,
        num_epochs: 300,
        kl_weight: 1.0,
        device: dev.clone(),
        verbose: false,
        show_progress: false,
    };

    let mut svi = Svi::build(&vae);
    let elbo_trace = svi.train(&mut data, &train_config)?;

    assert_eq!(elbo_trace.len(), 300);
    let first: f32 = elbo_trace.iter().take(10).sum::<f32>() / 10.;
    let last: f32 = elbo_trace.iter().rev().take(10).sum::<f32>() / 10.;
    assert!(
        last > first,
        "elbo did not improve: first ~{}, last ~{}",
        first,
        last
    );

    // round trip: the posterior mean decodes back near the (constant)
    // training pattern
    let x_tensor = Tensor::from_vec(
        x_nd.as_slice().unwrap().to_vec(),
        (n, h * w),
        &dev,
    )?;
    let (z_loc, _z_scale) = vae.encode(&x_tensor)?;
    let recon = vae.decode(&z_loc, None)?.reshape((n, h * w))?;

    let err = (recon - &x_tensor)?
        .abs()?
        .mean_all()?
        .to_scalar::<f32>()?;
    assert!(err < 0.2, "mean abs reconstruction error = {}", err);
    Ok(())
}

#[test]
fn invariant_mode_trains_without_error() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let (n, h, w) = (12, 6, 6);

    let x_nd = fixed_pattern(n, h, w);
    let mut data = InMemoryData::new(&x_nd)?;

    let config = TrVaeConfig {
        data_dim: vec![h, w],
        latent_dim: 2,
        coord: 3,
        hidden_dim_e: 16,
        hidden_dim_d: 16,
        ..TrVaeConfig::default()
    };
    let vae = TrVae::new(config, &dev)?;

    let train_config = TrainConfig {
        learning_rate: 1e-3,
        batch_size: 5,
        num_epochs: 3,
        kl_weight: 1.0,
        device: dev.clone(),
        verbose: false,
        show_progress: false,
    };

    let mut svi = Svi::build(&vae);
    let elbo_trace = svi.train(&mut data, &train_config)?;
    assert_eq!(elbo_trace.len(), 3);
    assert!(elbo_trace.iter().all(|elbo| elbo.is_finite()));
    Ok(())
}

#[test]
fn labelled_loader_feeds_the_conditioned_model() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let (n, h, w) = (10, 5, 5);

    let x_nd = fixed_pattern(n, h, w);
    let mut y_nc = Array2::<f32>::zeros((n, 2));
    for (i, mut row) in y_nc.rows_mut().into_iter().enumerate() {
        row[i % 2] = 1.;
    }

    let mut data = InMemoryData::new_with_output(&x_nd, &y_nc)?;
    data.shuffle_minibatch(4)?;

    // ceil(10 / 4) batches; the final partial batch is kept
    assert_eq!(data.num_minibatch(), 3);
    let sizes: Vec<usize> = (0..data.num_minibatch())
        .map(|b| data.minibatch_data(b, &dev).unwrap().input.dims()[0])
        .collect();
    assert_eq!(sizes.iter().sum::<usize>(), n);

    let config = TrVaeConfig {
        data_dim: vec![h, w],
        latent_dim: 2,
        coord: 2,
        num_classes: 2,
        hidden_dim_e: 16,
        hidden_dim_d: 16,
        ..TrVaeConfig::default()
    };
    let vae = TrVae::new(config, &dev)?;

    let train_config = TrainConfig {
        learning_rate: 1e-3,
        batch_size: 4,
        num_epochs: 2,
        kl_weight: 0.5,
        device: dev.clone(),
        verbose: false,
        show_progress: false,
    };

    let mut svi = Svi::build(&vae);
    let elbo_trace = svi.train(&mut data, &train_config)?;
    assert_eq!(elbo_trace.len(), 2);
    Ok(())
}
