use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
};

use crate::{error::Result, model::Classifier};

/// Writes one tensor to an opaque sink.
pub trait MatrixSerializer {
    fn serialize_matrix<B: Backend, const D: usize>(
        &self,
        matrix: Tensor<B, D>,
        sink: &mut dyn Write,
    ) -> Result<()>;
}

/// Serializes tensors with burn's binary recorder at full precision.
#[derive(Clone, Debug, Default)]
pub struct BinMatrixSerializer;

impl MatrixSerializer for BinMatrixSerializer {
    fn serialize_matrix<B: Backend, const D: usize>(
        &self,
        matrix: Tensor<B, D>,
        sink: &mut dyn Write,
    ) -> Result<()> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::new();
        let bytes = Recorder::<B>::record(&recorder, matrix, ())?;
        sink.write_all(&bytes)?;
        sink.flush()?;
        Ok(())
    }
}

/// Identifiers of the exported parameters, in export order.
pub const PARAMETER_NAMES: [&str; 4] = ["c0_kernel", "c0_bias", "c1_kernel", "c1_bias"];

/// File name of a parameter: `c0_kernel` becomes `c0.kernel`.
pub fn artifact_name(parameter: &str) -> String {
    parameter.replace('_', ".")
}

/// Hands every parameter of `model` to `serializer`, one file per parameter in
/// `artifact_dir`, and returns the written paths.
///
/// Kernels are written as `[height, width, in, out]` with the kernel scale
/// applied.
pub fn export_parameters<B: Backend, S: MatrixSerializer>(
    model: &Classifier<B>,
    serializer: &S,
    artifact_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let artifact_dir = artifact_dir.as_ref();
    let [c0_kernel, c0_bias, c1_kernel, c1_bias] = PARAMETER_NAMES;

    let c0_weight = model.c0_weight().permute([2, 3, 1, 0]);
    let c1_weight = model.c1_weight().permute([2, 3, 1, 0]);

    Ok(vec![
        write_matrix(serializer, c0_weight, artifact_dir, c0_kernel)?,
        write_matrix(serializer, model.c0_bias.val(), artifact_dir, c0_bias)?,
        write_matrix(serializer, c1_weight, artifact_dir, c1_kernel)?,
        write_matrix(serializer, model.c1_bias.val(), artifact_dir, c1_bias)?,
    ])
}

fn write_matrix<B: Backend, S: MatrixSerializer, const D: usize>(
    serializer: &S,
    matrix: Tensor<B, D>,
    artifact_dir: &Path,
    parameter: &str,
) -> Result<PathBuf> {
    let path = artifact_dir.join(artifact_name(parameter));
    let mut sink = BufWriter::new(File::create(&path)?);

    serializer.serialize_matrix(matrix, &mut sink)?;
    log::debug!("Exported {parameter} to {}", path.display());

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::ClassifierConfig, TestBackend};
    use rand::{rngs::StdRng, SeedableRng};
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Records the shape and values of every tensor it receives.
    #[derive(Default)]
    struct CapturingSerializer {
        matrices: RefCell<Vec<(Vec<usize>, Vec<f32>)>>,
    }

    impl MatrixSerializer for CapturingSerializer {
        fn serialize_matrix<B: Backend, const D: usize>(
            &self,
            matrix: Tensor<B, D>,
            sink: &mut dyn Write,
        ) -> Result<()> {
            let dims = matrix.dims().to_vec();
            let values = matrix.into_data().to_vec::<f32>().unwrap();
            sink.write_all(b"ok")?;
            self.matrices.borrow_mut().push((dims, values));
            Ok(())
        }
    }

    fn classifier() -> Classifier<TestBackend> {
        let device = Default::default();
        ClassifierConfig::new().init(&mut StdRng::seed_from_u64(0), &device)
    }

    #[test]
    fn test_artifact_names_replace_underscores() {
        let names: Vec<String> = PARAMETER_NAMES.iter().map(|p| artifact_name(p)).collect();

        assert_eq!(names, ["c0.kernel", "c0.bias", "c1.kernel", "c1.bias"]);
    }

    #[test]
    fn test_export_hands_every_parameter_to_the_serializer() {
        let dir = TempDir::new().unwrap();
        let model = classifier();
        let serializer = CapturingSerializer::default();

        let paths = export_parameters(&model, &serializer, dir.path()).unwrap();

        assert_eq!(paths.len(), 4);
        for (path, parameter) in paths.iter().zip(PARAMETER_NAMES) {
            assert_eq!(path, &dir.path().join(artifact_name(parameter)));
            assert_eq!(std::fs::read(path).unwrap(), b"ok");
        }

        let matrices = serializer.matrices.borrow();
        let dims: Vec<&[usize]> = matrices.iter().map(|(dims, _)| dims.as_slice()).collect();
        let expected: [&[usize]; 4] = [&[3, 3, 1, 3], &[3], &[7, 7, 3, 3], &[3]];
        assert_eq!(dims, expected);
    }

    #[test]
    fn test_exported_kernel_is_scaled_and_transposed() {
        let dir = TempDir::new().unwrap();
        let model = classifier();
        let serializer = CapturingSerializer::default();

        export_parameters(&model, &serializer, dir.path()).unwrap();

        // Trainable layout is [out, in, h, w]; exported layout is [h, w, in, out].
        let trainable = model.c0_kernel.val().into_data().to_vec::<f32>().unwrap();
        let matrices = serializer.matrices.borrow();
        let exported = &matrices[0].1;

        let (out, h, w) = (2, 1, 2);
        let trainable_value = trainable[out * 9 + h * 3 + w];
        let exported_value = exported[h * 9 + w * 3 + out];
        assert!((exported_value - trainable_value * 0.01).abs() < 1e-7);
    }

    #[test]
    fn test_binary_serializer_writes_files() {
        let dir = TempDir::new().unwrap();

        let paths = export_parameters(&classifier(), &BinMatrixSerializer, dir.path()).unwrap();

        for path in paths {
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }
    }

    #[test]
    fn test_missing_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent");

        let result = export_parameters(&classifier(), &BinMatrixSerializer, missing);

        assert!(matches!(result, Err(crate::Error::Io(_))));
    }
}
