use burn::{
    backend::{Autodiff, NdArray},
    config::Config,
};
use edge_cnn::{
    data::Label,
    export::{artifact_name, PARAMETER_NAMES},
    training::{run, TrainingConfig},
};
use tempfile::TempDir;

type TestAutodiffBackend = Autodiff<NdArray<f32>>;

#[test]
fn short_run_writes_every_artifact() {
    let dir = TempDir::new().unwrap();
    let config = TrainingConfig::standard()
        .with_num_iterations(120)
        .with_dataset_size(20)
        .with_report_interval(40);

    let summary = run::<TestAutodiffBackend>(dir.path(), config, Default::default()).unwrap();

    let iterations: Vec<usize> = summary.reports.iter().map(|r| r.iteration).collect();
    assert_eq!(iterations, [0, 40, 80]);

    let labels: Vec<Label> = summary.checks.iter().map(|check| check.label).collect();
    assert_eq!(labels, Label::ALL);

    for parameter in PARAMETER_NAMES {
        let path = dir.path().join(artifact_name(parameter));
        assert!(summary.artifacts.contains(&path));
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    let saved = TrainingConfig::load(dir.path().join("config.json")).unwrap();
    assert_eq!(saved.num_iterations, 120);
    assert_eq!(saved.dataset_size, 20);
}

#[test]
fn runs_are_reproducible() {
    let config = || {
        TrainingConfig::standard()
            .with_num_iterations(30)
            .with_dataset_size(10)
            .with_report_interval(10)
    };
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();

    let first = run::<TestAutodiffBackend>(first_dir.path(), config(), Default::default()).unwrap();
    let second =
        run::<TestAutodiffBackend>(second_dir.path(), config(), Default::default()).unwrap();

    assert_eq!(first.reports, second.reports);
    assert_eq!(first.checks, second.checks);
}

#[test]
fn default_dataset_loss_falls() {
    let dir = TempDir::new().unwrap();
    let config = TrainingConfig::standard().with_num_iterations(500);

    let summary = run::<TestAutodiffBackend>(dir.path(), config, Default::default()).unwrap();

    let first = summary.reports.first().unwrap();
    let last = summary.reports.last().unwrap();
    assert_eq!(first.iteration, 0);
    assert_eq!(last.iteration, 400);
    assert!(last.loss < first.loss, "loss went from {} to {}", first.loss, last.loss);
}

#[test]
#[ignore = "runs the full 10 000 iteration schedule"]
fn full_schedule_learns_the_edges() {
    let dir = TempDir::new().unwrap();

    let summary =
        run::<TestAutodiffBackend>(dir.path(), TrainingConfig::standard(), Default::default())
            .unwrap();

    let first = summary.reports.first().unwrap();
    let last = summary.reports.last().unwrap();
    assert_eq!(first.iteration, 0);
    assert_eq!(last.iteration, 9900);
    assert!(last.loss < first.loss, "loss went from {} to {}", first.loss, last.loss);

    let upper_edge = &summary.checks[Label::UpperEdge.index()];
    assert!(upper_edge.is_correct(), "{upper_edge:?}");
}
