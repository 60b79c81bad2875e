use burn::backend::Autodiff;
use edge_cnn::training::{self, TrainingConfig};
use tracing_subscriber::filter::LevelFilter;

#[cfg(feature = "ndarray")]
use burn::backend::ndarray::{NdArray, NdArrayDevice};
#[cfg(all(feature = "wgpu", not(feature = "ndarray")))]
use burn::backend::wgpu::{Wgpu, WgpuDevice};

#[cfg(not(any(feature = "ndarray", feature = "wgpu")))]
compile_error!("Enable the `ndarray` or `wgpu` feature to select a backend.");

static ARTIFACT_DIR: &str = "/var/model";

fn main() -> Result<(), edge_cnn::Error> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .init();

    let config = TrainingConfig::standard();

    #[cfg(feature = "ndarray")]
    let summary = training::run::<Autodiff<NdArray>>(ARTIFACT_DIR, config, NdArrayDevice::Cpu)?;

    #[cfg(all(feature = "wgpu", not(feature = "ndarray")))]
    let summary = training::run::<Autodiff<Wgpu>>(ARTIFACT_DIR, config, WgpuDevice::default())?;

    let correct = summary.checks.iter().filter(|check| check.is_correct()).count();
    log::info!("{correct}/{} fresh examples classified correctly", summary.checks.len());

    Ok(())
}
