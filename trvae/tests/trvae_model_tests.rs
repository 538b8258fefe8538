use approx::assert_abs_diff_eq;
use candle_core::{Device, Tensor};
use trvae::trvae_config::TrVaeConfig;
use trvae::trvae_grid::latent_grid;
use trvae::trvae_model::TrVae;

fn small_config(data_dim: Vec<usize>, coord: usize) -> TrVaeConfig {
    TrVaeConfig {
        data_dim,
        latent_dim: 2,
        coord,
        hidden_dim_e: 32,
        hidden_dim_d: 32,
        chunk_size: 50,
        ..TrVaeConfig::default()
    }
}

#[test]
fn model_and_guide_run_on_zero_images() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let vae = TrVae::new(small_config(vec![8, 8], 3), &dev)?;
    assert_eq!(vae.z_dim(), 5);

    let x = Tensor::zeros((4, 8, 8), candle_core::DType::F32, &dev)?;

    let guide_trace = vae.guide(&x, None, 1.)?;
    assert_eq!(guide_trace.z_loc_nk.dims(), [4, 5]);
    assert_eq!(guide_trace.z_scale_nk.dims(), [4, 5]);
    assert_eq!(guide_trace.z_nk.dims(), [4, 5]);
    assert_eq!(guide_trace.log_qz_n.dims(), [4]);

    // posterior scale must be strictly positive
    for row in guide_trace.z_scale_nk.to_vec2::<f32>()? {
        assert!(row.iter().all(|&s| s > 0.));
    }

    // paired with the guide's sample, and prior-predictive on its own
    let with_guide = vae.model(&x, None, Some(&guide_trace), 1.)?;
    assert_eq!(with_guide.recon_nd.dims(), [4, 64]);
    assert_eq!(with_guide.log_pz_n.dims(), [4]);
    assert_eq!(with_guide.llik_n.dims(), [4]);

    let from_prior = vae.model(&x, None, None, 1.)?;
    assert_eq!(from_prior.recon_nd.dims(), [4, 64]);
    Ok(())
}

#[test]
fn every_coord_mode_runs_end_to_end() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    for coord in 0..=3 {
        let vae = TrVae::new(small_config(vec![6, 7], coord), &dev)?;
        assert_eq!(vae.z_dim(), 2 + coord);

        let x = Tensor::rand(0f32, 1f32, (3, 6, 7), &dev)?;
        let guide_trace = vae.guide(&x, None, 1.)?;
        let model_trace = vae.model(&x, None, Some(&guide_trace), 1.)?;
        assert_eq!(model_trace.recon_nd.dims(), [3, 42]);
    }
    Ok(())
}

#[test]
fn one_dim_spectra_collapse_to_translation() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let vae = TrVae::new(small_config(vec![24], 3), &dev)?;

    // requested coord 3 collapses to the width-1 translation mode
    assert_eq!(vae.z_dim(), 3);

    let x = Tensor::rand(0f32, 1f32, (5, 24), &dev)?;
    let guide_trace = vae.guide(&x, None, 1.)?;
    assert_eq!(guide_trace.z_loc_nk.dims(), [5, 3]);

    let model_trace = vae.model(&x, None, Some(&guide_trace), 1.)?;
    assert_eq!(model_trace.recon_nd.dims(), [5, 24]);
    Ok(())
}

#[test]
fn invalid_coord_fails_at_construction() {
    let dev = Device::Cpu;
    assert!(TrVae::new(small_config(vec![8, 8], 4), &dev).is_err());
}

#[test]
fn class_conditioning_takes_one_hot_labels() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let config = TrVaeConfig {
        num_classes: 3,
        ..small_config(vec![8, 8], 1)
    };
    let vae = TrVae::new(config, &dev)?;

    let x = Tensor::rand(0f32, 1f32, (4, 8, 8), &dev)?;
    let y = Tensor::from_vec(
        vec![
            1f32, 0., 0., //
            0., 1., 0., //
            0., 0., 1., //
            1., 0., 0.,
        ],
        (4, 3),
        &dev,
    )?;

    let guide_trace = vae.guide(&x, Some(&y), 1.)?;
    let model_trace = vae.model(&x, Some(&y), Some(&guide_trace), 1.)?;
    assert_eq!(model_trace.recon_nd.dims(), [4, 64]);

    let z = Tensor::zeros((4, 2), candle_core::DType::F32, &dev)?;
    let decoded = vae.decode(&z, Some(&y))?;
    assert_eq!(decoded.dims(), [4, 8, 8]);
    Ok(())
}

#[test]
fn chunked_encoding_matches_single_chunk() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let vae = TrVae::new(small_config(vec![5, 5], 2), &dev)?;

    let x = Tensor::rand(0f32, 1f32, (7, 5, 5), &dev)?;

    let (loc_whole, scale_whole) = vae.encode_in_chunks(&x, 7)?;
    // chunk size 3 leaves a partial final chunk of one row
    let (loc_chunked, scale_chunked) = vae.encode_in_chunks(&x, 3)?;

    assert_eq!(loc_whole.dims(), [7, 4]);
    assert_eq!(loc_chunked.dims(), [7, 4]);

    let a = loc_whole.to_vec2::<f32>()?;
    let b = loc_chunked.to_vec2::<f32>()?;
    for (row_a, row_b) in a.iter().zip(b.iter()) {
        for (va, vb) in row_a.iter().zip(row_b.iter()) {
            assert_abs_diff_eq!(*va, *vb, epsilon = 1e-7);
        }
    }

    let a = scale_whole.to_vec2::<f32>()?;
    let b = scale_chunked.to_vec2::<f32>()?;
    for (row_a, row_b) in a.iter().zip(b.iter()) {
        for (va, vb) in row_a.iter().zip(row_b.iter()) {
            assert_abs_diff_eq!(*va, *vb, epsilon = 1e-7);
        }
    }
    Ok(())
}

#[test]
fn decode_shapes_follow_data_dim() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let vae = TrVae::new(small_config(vec![6, 4], 3), &dev)?;
    let z = Tensor::rand(-1f32, 1f32, (9, 2), &dev)?;
    assert_eq!(vae.decode(&z, None)?.dims(), [9, 6, 4]);

    let vae = TrVae::new(small_config(vec![12], 1), &dev)?;
    let z = Tensor::rand(-1f32, 1f32, (9, 2), &dev)?;
    assert_eq!(vae.decode(&z, None)?.dims(), [9, 12]);
    Ok(())
}

#[test]
fn manifold2d_returns_d_squared_samples() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let vae = TrVae::new(small_config(vec![8, 8], 3), &dev)?;

    for d in [2usize, 5] {
        let manifold = vae.manifold2d(d, None)?;
        assert_eq!(manifold.dims(), [d * d, 8, 8]);
    }

    // row-major over the two probit axes: decoding the latent grid
    // directly reproduces the manifold rows in order
    let d = 3;
    let manifold = vae.manifold2d(d, None)?;
    let direct = vae.decode(&latent_grid(d, &dev)?, None)?;
    assert_eq!(
        manifold.to_vec3::<f32>()?,
        direct.to_vec3::<f32>()?
    );
    Ok(())
}

#[test]
fn manifold2d_requires_two_content_dims() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let config = TrVaeConfig {
        latent_dim: 3,
        ..small_config(vec![8, 8], 0)
    };
    let vae = TrVae::new(config, &dev)?;
    assert!(vae.manifold2d(4, None).is_err());
    Ok(())
}

#[test]
fn saved_weights_reproduce_decoding() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let config = small_config(vec![7, 7], 3);

    let vae = TrVae::new(config.clone(), &dev)?;
    let weights_file = tempfile::Builder::new()
        .suffix(".safetensors")
        .tempfile()?;
    vae.save_weights(weights_file.path())?;

    let mut restored = TrVae::new(config, &dev)?;
    restored.load_weights(weights_file.path())?;

    let z = latent_grid(4, &dev)?;
    let a = vae.decode(&z, None)?.to_vec3::<f32>()?;
    let b = restored.decode(&z, None)?.to_vec3::<f32>()?;
    assert_eq!(a, b);
    Ok(())
}
