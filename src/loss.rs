use burn::{prelude::*, tensor::activation::log_softmax};

use crate::{data::EdgeBatch, model::Classifier};

/// Which classifier output is fed to the cross entropy.
///
/// The cross entropy normalizes its input with a softmax, so feeding it the
/// classifier's probabilities applies the softmax a second time.
#[derive(Config, Debug, Copy, PartialEq, Eq)]
pub enum LossInput {
    /// Softmax probabilities, normalized again by the loss.
    Probabilities,
    /// Stage 1 pre-activations.
    Logits,
}

/// Mean over the batch of `-sum(targets * log_softmax(scores))`.
///
/// `scores` and `targets` are both `[batch, classes]`.
pub fn cross_entropy<B: Backend>(scores: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_probs = log_softmax(scores, 1);
    (targets * log_probs).sum_dim(1).neg().mean()
}

/// Training objective of `model` over a full batch.
pub fn batch_loss<B: Backend>(
    model: &Classifier<B>,
    batch: &EdgeBatch<B>,
    input: LossInput,
) -> Tensor<B, 1> {
    let scores = match input {
        LossInput::Probabilities => {
            let predictions = model.forward(batch.images.clone());
            let [batch_size, _, _, classes] = predictions.dims();
            predictions.reshape([batch_size, classes])
        }
        LossInput::Logits => model.logits(batch.images.clone()),
    };

    cross_entropy(scores, batch.targets.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;

    fn scalar(tensor: Tensor<TestBackend, 1>) -> f32 {
        tensor.into_scalar().elem::<f32>()
    }

    #[test]
    fn test_uniform_scores_give_log_of_class_count() {
        let device = Default::default();
        let scores = Tensor::<TestBackend, 2>::zeros([2, 3], &device);
        let targets =
            Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]], &device);

        let loss = scalar(cross_entropy(scores, targets));

        assert!((loss - 3.0f32.ln()).abs() < 1e-5, "loss was {loss}");
    }

    #[test]
    fn test_confident_correct_scores_give_small_loss() {
        let device = Default::default();
        let targets = Tensor::<TestBackend, 2>::from_floats([[0.0, 1.0, 0.0]], &device);
        let right = Tensor::<TestBackend, 2>::from_floats([[-10.0, 10.0, -10.0]], &device);
        let wrong = Tensor::<TestBackend, 2>::from_floats([[10.0, -10.0, -10.0]], &device);

        let right = scalar(cross_entropy(right, targets.clone()));
        let wrong = scalar(cross_entropy(wrong, targets));

        assert!(right < 1e-3);
        assert!(wrong > 10.0);
    }

    #[test]
    fn test_probability_input_is_bounded() {
        let device = Default::default();
        let targets = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 1.0]], &device);

        // Renormalizing a one-hot distribution cannot go below ln(1 + 2 / e).
        let best = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 1.0]], &device);
        let loss = scalar(cross_entropy(best, targets));

        let expected = (1.0f32 + 2.0 / std::f32::consts::E).ln();
        assert!((loss - expected).abs() < 1e-5, "loss was {loss}");
    }
}
