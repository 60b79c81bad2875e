use burn::{
    module::Param,
    prelude::*,
    tensor::{
        activation::{relu, softmax},
        module::conv2d,
        ops::ConvOptions,
    },
};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::data::{GRID_SIZE, NUM_CLASSES};

/// Spatial extent of the first convolution.
pub const C0_KERNEL_SIZE: usize = 3;
/// Spatial extent of the second convolution, chosen so that it collapses the
/// first stage's output to a single position.
pub const C1_KERNEL_SIZE: usize = GRID_SIZE - C0_KERNEL_SIZE + 1;

/// Truncated normal draws outside of this many standard deviations are resampled.
const TRUNCATION: f32 = 2.0;

#[derive(Config, Debug)]
pub struct ClassifierConfig {
    /// Output channels of the first convolution.
    #[config(default = 3)]
    pub hidden_channels: usize,
    /// Factor applied to the trainable kernels inside the forward graph.
    #[config(default = 0.01)]
    pub kernel_scale: f64,
    /// Initial value of every bias.
    #[config(default = 0.1)]
    pub bias_init: f64,
}

/// Two stage convolutional classifier for 9x9 single channel grids.
///
/// Tensors are channels first: stage 0 produces `[batch, hidden, 7, 7]` and
/// stage 1 produces `[batch, 3, 1, 1]`.
#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    pub c0_kernel: Param<Tensor<B, 4>>,
    pub c0_bias: Param<Tensor<B, 1>>,
    pub c1_kernel: Param<Tensor<B, 4>>,
    pub c1_bias: Param<Tensor<B, 1>>,
    kernel_scale: f64,
}

/// Intermediate values of a forward pass.
#[derive(Clone, Debug)]
pub struct ClassifierStages<B: Backend> {
    /// Stage 0 pre-activation, `[batch, hidden, 7, 7]`.
    pub c0_z: Tensor<B, 4>,
    /// Stage 1 pre-activation, `[batch, 3, 1, 1]`.
    pub c1_z: Tensor<B, 4>,
    /// Class probabilities, `[batch, 1, 1, 3]`.
    pub predictions: Tensor<B, 4>,
}

impl ClassifierConfig {
    /// Initializes the classifier with truncated normal kernels drawn from `rng`
    /// and constant biases.
    pub fn init<B: Backend, R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        device: &B::Device,
    ) -> Classifier<B> {
        let c0_shape = [self.hidden_channels, 1, C0_KERNEL_SIZE, C0_KERNEL_SIZE];
        let c1_shape = [NUM_CLASSES, self.hidden_channels, C1_KERNEL_SIZE, C1_KERNEL_SIZE];

        Classifier {
            c0_kernel: Param::from_tensor(truncated_normal(c0_shape, rng, device)),
            c0_bias: Param::from_tensor(Tensor::full(
                [self.hidden_channels],
                self.bias_init,
                device,
            )),
            c1_kernel: Param::from_tensor(truncated_normal(c1_shape, rng, device)),
            c1_bias: Param::from_tensor(Tensor::full([NUM_CLASSES], self.bias_init, device)),
            kernel_scale: self.kernel_scale,
        }
    }
}

fn truncated_normal<B: Backend, R: Rng + ?Sized>(
    shape: [usize; 4],
    rng: &mut R,
    device: &B::Device,
) -> Tensor<B, 4> {
    let num_elements = shape.iter().product();
    let mut values = Vec::with_capacity(num_elements);

    while values.len() < num_elements {
        let value: f32 = rng.sample(StandardNormal);
        if value.abs() <= TRUNCATION {
            values.push(value);
        }
    }

    Tensor::from_data(TensorData::new(values, shape), device)
}

impl<B: Backend> Classifier<B> {
    /// Stage 0 kernel as used by the forward graph.
    pub fn c0_weight(&self) -> Tensor<B, 4> {
        self.c0_kernel.val().mul_scalar(self.kernel_scale)
    }

    /// Stage 1 kernel as used by the forward graph.
    pub fn c1_weight(&self) -> Tensor<B, 4> {
        self.c1_kernel.val().mul_scalar(self.kernel_scale)
    }

    /// Maps `[batch, 1, 9, 9]` images to `[batch, 1, 1, 3]` class probabilities.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_stages(images).predictions
    }

    /// Stage 1 pre-activations flattened to `[batch, 3]`.
    pub fn logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let c0_z = self.stage0(images);
        let c1_z = self.stage1(relu(c0_z));
        c1_z.flatten(1, 3)
    }

    pub fn forward_stages(&self, images: Tensor<B, 4>) -> ClassifierStages<B> {
        let c0_z = self.stage0(images);
        let c1_z = self.stage1(relu(c0_z.clone()));

        let [batch_size, channels, _, _] = c1_z.dims();
        let probabilities = softmax(c1_z.clone().flatten::<2>(1, 3), 1);
        let predictions = probabilities.reshape([batch_size, 1, 1, channels]);

        ClassifierStages {
            c0_z,
            c1_z,
            predictions,
        }
    }

    fn stage0(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        conv2d(
            images,
            self.c0_weight(),
            Some(self.c0_bias.val()),
            valid_options(),
        )
    }

    fn stage1(&self, activations: Tensor<B, 4>) -> Tensor<B, 4> {
        conv2d(
            activations,
            self.c1_weight(),
            Some(self.c1_bias.val()),
            valid_options(),
        )
    }
}

/// Stride 1 without padding.
fn valid_options() -> ConvOptions<2> {
    ConvOptions::new([1, 1], [0, 0], [1, 1], 1)
}
