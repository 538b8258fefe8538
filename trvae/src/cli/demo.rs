use crate::trvae_config::TrVaeConfig;
use crate::trvae_data_loader::InMemoryData;
use crate::trvae_inference::TrainConfig;
use crate::trvae_loss_functions::OutputSampler;
use crate::trvae_model::TrVae;
use crate::trvae_svi::Svi;

use anyhow::Result;
use candle_core::{Device, Tensor};
use clap::{Args, ValueEnum};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};
use std::fs::File;
use std::io::{BufWriter, Write};

#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum SamplerName {
    Bernoulli,
    #[value(name = "continuous_bernoulli")]
    ContinuousBernoulli,
    Gaussian,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output prefix for generated files:\n\
		     - {out}.latent.tsv.gz\n\
		     - {out}.manifold.tsv.gz\n\
		     - {out}.elbo.tsv.gz\n\
		     - {out}.weights.safetensors\n"
    )]
    out: Box<str>,

    #[arg(long, default_value_t = 16, help = "Image height")]
    height: usize,

    #[arg(long, default_value_t = 16, help = "Image width")]
    width: usize,

    #[arg(long, short = 'n', default_value_t = 500, help = "Number of simulated images")]
    n_samples: usize,

    #[arg(long, default_value_t = 2, help = "Content latent dimensions")]
    latent_dim: usize,

    #[arg(
        long,
        default_value_t = 3,
        help = "Invariance mode",
        long_help = "Invariance mode: 0 none, 1 rotation, 2 translation,\n\
		     3 rotation + translation."
    )]
    coord: usize,

    #[arg(long, default_value_t = 128, help = "Hidden units per layer")]
    hidden_dim: usize,

    #[arg(long, default_value_t = 2, help = "Hidden layers per network")]
    num_layers: usize,

    #[arg(long, default_value = "tanh", help = "Inner activation")]
    activation: Box<str>,

    #[arg(long, value_enum, default_value = "bernoulli", help = "Output sampler")]
    sampler: SamplerName,

    #[arg(long, default_value_t = 0.5, help = "Gaussian sampler spread")]
    decoder_sig: f64,

    #[arg(long, default_value_t = 0.1, help = "Translation prior scale")]
    dx_prior: f32,

    #[arg(long, default_value_t = 200, help = "Number of training epochs")]
    epochs: usize,

    #[arg(long, default_value_t = 100, help = "Minibatch size for training")]
    batch_size: usize,

    #[arg(long, default_value_t = 1e-3, help = "Learning rate")]
    learning_rate: f32,

    #[arg(long, default_value_t = 1.0, help = "KL scale factor (beta)")]
    kl_weight: f32,

    #[arg(long, default_value_t = 9, help = "Manifold traversal grid size")]
    manifold_d: usize,

    #[arg(long, default_value_t = 1, help = "Random seed for the simulation")]
    seed: u64,

    #[arg(long, default_value_t = false, help = "Verbose epoch logging")]
    verbose: bool,
}

pub fn run(args: &DemoArgs) -> Result<()> {
    let device = Device::Cpu;

    info!(
        "simulating {} randomly posed {} x {} blobs",
        args.n_samples, args.height, args.width
    );

    let x_nd = simulate_blobs(args)?;
    let mut data = InMemoryData::new(&x_nd)?;

    let sampler_name = match args.sampler {
        SamplerName::Bernoulli => "bernoulli",
        SamplerName::ContinuousBernoulli => "continuous_bernoulli",
        SamplerName::Gaussian => "gaussian",
    };

    let config = TrVaeConfig {
        data_dim: vec![args.height, args.width],
        latent_dim: args.latent_dim,
        coord: args.coord,
        hidden_dim_e: args.hidden_dim,
        hidden_dim_d: args.hidden_dim,
        num_layers_e: args.num_layers,
        num_layers_d: args.num_layers,
        activation: args.activation.parse()?,
        sampler: OutputSampler::from_name(sampler_name, Some(args.decoder_sig))?,
        dx_prior: args.dx_prior,
        seed: args.seed,
        ..TrVaeConfig::default()
    };

    let vae = TrVae::new(config, &device)?;

    let train_config = TrainConfig {
        learning_rate: args.learning_rate,
        batch_size: args.batch_size,
        num_epochs: args.epochs,
        kl_weight: args.kl_weight,
        device: device.clone(),
        verbose: args.verbose,
        show_progress: true,
    };

    info!(
        "training invariant VAE (z_dim = {}) for {} epochs",
        vae.z_dim(),
        args.epochs
    );

    let mut svi = Svi::build(&vae);
    let elbo_trace = svi.train(&mut data, &train_config)?;

    let n = args.n_samples;
    let d = args.height * args.width;
    let x_tensor = Tensor::from_vec(
        x_nd.as_slice()
            .ok_or_else(|| anyhow::anyhow!("non-contiguous simulation matrix"))?
            .to_vec(),
        (n, d),
        &device,
    )?;

    let (z_loc_nk, z_scale_nk) = vae.encode(&x_tensor)?;
    let latent_nk = Tensor::cat(&[&z_loc_nk, &z_scale_nk], 1)?;
    write_tsv_gz(&format!("{}.latent.tsv.gz", args.out), &latent_nk)?;

    let manifold = vae.manifold2d(args.manifold_d, None)?;
    let manifold_nd = manifold.reshape((args.manifold_d * args.manifold_d, d))?;
    write_tsv_gz(&format!("{}.manifold.tsv.gz", args.out), &manifold_nd)?;

    let elbo_n1 = Tensor::from_vec(elbo_trace.clone(), (elbo_trace.len(), 1), &device)?;
    write_tsv_gz(&format!("{}.elbo.tsv.gz", args.out), &elbo_n1)?;

    vae.save_weights(format!("{}.weights.safetensors", args.out))?;

    info!("done: wrote {}.{{latent,manifold,elbo}}.tsv.gz", args.out);

    Ok(())
}

/// One elongated Gaussian blob per image, rotated and shifted at random
/// so pose is the dominant nuisance factor.
fn simulate_blobs(args: &DemoArgs) -> Result<Array2<f32>> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let angle = Uniform::new(-std::f32::consts::PI, std::f32::consts::PI)?;
    let shift = Normal::new(0f32, args.dx_prior)?;

    let (h, w) = (args.height, args.width);
    let mut x_nd = Array2::<f32>::zeros((args.n_samples, h * w));

    for mut row in x_nd.rows_mut() {
        let theta = if args.coord == 1 || args.coord == 3 {
            angle.sample(&mut rng)
        } else {
            0.
        };
        let (tx, ty) = if args.coord >= 2 {
            (shift.sample(&mut rng), shift.sample(&mut rng))
        } else {
            (0., 0.)
        };
        let (cos_t, sin_t) = (theta.cos(), theta.sin());

        for i in 0..h {
            for j in 0..w {
                let x = -1. + 2. * i as f32 / (h - 1) as f32 - tx;
                let y = -1. + 2. * j as f32 / (w - 1) as f32 - ty;
                let u = x * cos_t + y * sin_t;
                let v = -x * sin_t + y * cos_t;
                let value = (-(u * u) / 0.5 - (v * v) / 0.045).exp();
                row[i * w + j] = value;
            }
        }
    }

    Ok(x_nd)
}

fn write_tsv_gz(path: &str, data_nd: &Tensor) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(GzEncoder::new(file, Compression::default()));
    for row in data_nd.to_vec2::<f32>()? {
        let line = row
            .iter()
            .map(|x| x.to_string())
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}
