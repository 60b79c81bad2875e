use std::path::{Path, PathBuf};

use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, Adam, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    data::{build_dataset, EdgeBatch, EdgeBatcher, EdgeItem},
    error::Error,
    evaluation::{class_checks, reference_diagnostics, ClassCheck},
    export::{export_parameters, BinMatrixSerializer},
    loss::{batch_loss, LossInput},
    model::{Classifier, ClassifierConfig},
};

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ClassifierConfig,
    pub optimizer: AdamConfig,
    #[config(default = 10000)]
    pub num_iterations: usize,
    #[config(default = 100)]
    pub dataset_size: usize,
    /// Loss is reported every `report_interval` iterations, starting at 0.
    #[config(default = 100)]
    pub report_interval: usize,
    #[config(default = 0.01)]
    pub learning_rate: f64,
    #[config(default = 0)]
    pub seed: u64,
    #[config(default = "LossInput::Probabilities")]
    pub loss_input: LossInput,
}

impl TrainingConfig {
    /// Default run: Adam with TensorFlow's epsilon.
    pub fn standard() -> Self {
        Self::new(ClassifierConfig::new(), AdamConfig::new().with_epsilon(1e-8))
    }
}

/// Read-only loss measurement taken during training.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LossReport {
    pub iteration: usize,
    pub loss: f32,
}

/// Owns the classifier, its optimizer and the fixed full training batch.
pub struct Trainer<B: AutodiffBackend> {
    model: Classifier<B>,
    optim: OptimizerAdaptor<Adam, Classifier<B>, B>,
    batch: EdgeBatch<B>,
    config: TrainingConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Builds the training set and initializes the parameters from `rng`.
    pub fn new<R: Rng + ?Sized>(
        config: TrainingConfig,
        rng: &mut R,
        device: B::Device,
    ) -> crate::Result<Self> {
        if config.dataset_size == 0 {
            return Err(Error::EmptyDataset);
        }
        if config.report_interval == 0 {
            return Err(Error::InvalidReportInterval);
        }

        let (examples, targets) = build_dataset(config.dataset_size, rng);
        let batch = EdgeBatcher.batch(EdgeItem::zip(examples, targets), &device);
        let model = config.model.init(rng, &device);

        Ok(Self {
            model,
            optim: config.optimizer.init(),
            batch,
            config,
            device,
        })
    }

    pub fn model(&self) -> &Classifier<B> {
        &self.model
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// One Adam step over the full training batch.
    pub fn step(&mut self) {
        let model = self.model.clone();
        let loss = batch_loss(&model, &self.batch, self.config.loss_input);

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        self.model = self.optim.step(self.config.learning_rate, model, grads);
    }

    /// Current training loss, computed without tracking gradients.
    pub fn loss(&self) -> f32 {
        let model = self.model.valid();
        let batch = EdgeBatch {
            images: self.batch.images.clone().inner(),
            targets: self.batch.targets.clone().inner(),
        };

        batch_loss(&model, &batch, self.config.loss_input)
            .into_scalar()
            .elem::<f32>()
    }

    /// Runs every training iteration and returns the periodic loss reports.
    pub fn train(&mut self) -> Vec<LossReport> {
        let mut reports = Vec::new();

        for iteration in 0..self.config.num_iterations {
            self.step();

            if iteration % self.config.report_interval == 0 {
                let loss = self.loss();
                log::info!("[Train - Iteration {iteration}] Loss {loss:.6}");
                reports.push(LossReport { iteration, loss });
            }
        }

        reports
    }

    /// Classifies fresh examples of each class and logs the reference-grid
    /// diagnostics.
    pub fn evaluate<R: Rng + ?Sized>(&self, rng: &mut R) -> crate::Result<Vec<ClassCheck>> {
        let model = self.model.valid();
        let device = self.device.clone();

        let checks = class_checks(&model, rng, &device)?;
        for check in checks.iter() {
            log::info!("{:?} -> {:?}", check.label, check.indicator);
        }

        for diagnostic in reference_diagnostics(&model, &device) {
            let label = diagnostic.label.index();
            log::info!("{label} prediction\n{}", diagnostic.stages.predictions);
            log::info!("{label} 0_z\n{}", diagnostic.stages.c0_z);
            log::info!("{label} 1_z\n{}", diagnostic.stages.c1_z);
        }

        Ok(checks)
    }
}

/// Outcome of a complete run.
#[derive(Debug)]
pub struct TrainingSummary {
    pub reports: Vec<LossReport>,
    pub checks: Vec<ClassCheck>,
    pub artifacts: Vec<PathBuf>,
}

fn create_artifact_dir(artifact_dir: &Path) -> crate::Result<()> {
    std::fs::create_dir_all(artifact_dir)?;
    Ok(())
}

/// Trains the classifier, evaluates it and exports its parameters together
/// with the config to `artifact_dir`.
pub fn run<B: AutodiffBackend>(
    artifact_dir: impl AsRef<Path>,
    config: TrainingConfig,
    device: B::Device,
) -> crate::Result<TrainingSummary> {
    let artifact_dir = artifact_dir.as_ref();
    let mut rng = StdRng::seed_from_u64(config.seed);

    log::info!(
        "Initializing: {} examples, loss on {:?}",
        config.dataset_size,
        config.loss_input
    );
    let mut trainer = Trainer::<B>::new(config, &mut rng, device)?;

    create_artifact_dir(artifact_dir)?;
    trainer.config().save(artifact_dir.join("config.json"))?;

    log::info!(
        "Training for {} iterations",
        trainer.config().num_iterations
    );
    let reports = trainer.train();

    log::info!("Evaluating");
    let checks = trainer.evaluate(&mut rng)?;

    let artifacts = export_parameters(&trainer.model().valid(), &BinMatrixSerializer, artifact_dir)?;
    log::info!("Exported {} parameters to {}", artifacts.len(), artifact_dir.display());

    Ok(TrainingSummary {
        reports,
        checks,
        artifacts,
    })
}
