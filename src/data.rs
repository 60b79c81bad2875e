use burn::{data::dataloader::batcher::Batcher, prelude::*};
use rand::Rng;

use crate::error::Error;

/// Side length of the square input grid.
pub const GRID_SIZE: usize = 9;
/// Number of classes the classifier separates.
pub const NUM_CLASSES: usize = 3;

/// Edge shifts are drawn from `SHIFT_MIN..SHIFT_MAX`.
const SHIFT_MIN: i32 = -3;
const SHIFT_MAX: i32 = 3;

/// One-hot encoded class.
pub type Target = [f32; NUM_CLASSES];

/// Class of a synthetic example.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    /// Uniform noise centered on zero.
    Noise,
    /// Diagonal edge with ones above the boundary.
    UpperEdge,
    /// Diagonal edge with ones below the boundary.
    LowerEdge,
}

impl Label {
    pub const ALL: [Label; NUM_CLASSES] = [Label::Noise, Label::UpperEdge, Label::LowerEdge];

    pub fn index(self) -> usize {
        match self {
            Label::Noise => 0,
            Label::UpperEdge => 1,
            Label::LowerEdge => 2,
        }
    }

    /// Draws a label uniformly at random.
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..NUM_CLASSES)]
    }
}

impl TryFrom<usize> for Label {
    type Error = Error;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Label::ALL
            .get(value)
            .copied()
            .ok_or(Error::InvalidLabel(value))
    }
}

/// A single-channel 9x9 intensity grid, stored row major.
#[derive(Clone, Debug, PartialEq)]
pub struct Example {
    pixels: [[f32; GRID_SIZE]; GRID_SIZE],
}

impl Example {
    pub fn from_pixels(pixels: [[f32; GRID_SIZE]; GRID_SIZE]) -> Self {
        Self { pixels }
    }

    pub fn cell(&self, row: usize, col: usize) -> f32 {
        self.pixels[row][col]
    }

    pub fn rows(&self) -> &[[f32; GRID_SIZE]; GRID_SIZE] {
        &self.pixels
    }

    /// Iterates over the cells in row-major order.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.pixels.iter().flat_map(|row| row.iter().copied())
    }

    /// Converts the example into a `[1, 1, 9, 9]` tensor.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        let data = TensorData::new(
            self.values().collect::<Vec<f32>>(),
            [1, 1, GRID_SIZE, GRID_SIZE],
        );
        Tensor::from_data(data, device)
    }
}

/// Returns one randomly generated example of the given class.
pub fn generate_example<R: Rng + ?Sized>(label: Label, rng: &mut R) -> Example {
    // The shift is drawn for every class to keep the random stream aligned.
    let shift = rng.random_range(SHIFT_MIN..SHIFT_MAX);

    match label {
        Label::Noise => {
            let mut pixels = [[0.0; GRID_SIZE]; GRID_SIZE];
            for value in pixels.iter_mut().flatten() {
                *value = rng.random::<f32>() - 0.5;
            }
            Example::from_pixels(pixels)
        }
        Label::UpperEdge | Label::LowerEdge => edge_pattern(label, shift),
    }
}

/// Binary diagonal edge whose boundary sits at `row == col + shift`.
///
/// `Label::Noise` has no edge and yields an all-zero grid.
pub fn edge_pattern(label: Label, shift: i32) -> Example {
    let mut pixels = [[0.0; GRID_SIZE]; GRID_SIZE];

    for (row, cells) in pixels.iter_mut().enumerate() {
        for (col, value) in cells.iter_mut().enumerate() {
            let row = row as i32;
            let threshold = col as i32 + shift;
            let on = match label {
                Label::Noise => false,
                Label::UpperEdge => row < threshold,
                Label::LowerEdge => row > threshold,
            };
            *value = if on { 1.0 } else { 0.0 };
        }
    }

    Example::from_pixels(pixels)
}

pub fn one_hot(label: Label) -> Target {
    let mut target = [0.0; NUM_CLASSES];
    target[label.index()] = 1.0;
    target
}

/// Draws `n` labels uniformly with replacement and generates the matching
/// examples and one-hot targets, aligned by index.
pub fn build_dataset<R: Rng + ?Sized>(n: usize, rng: &mut R) -> (Vec<Example>, Vec<Target>) {
    let mut examples = Vec::with_capacity(n);
    let mut targets = Vec::with_capacity(n);

    for _ in 0..n {
        let label = Label::sample(rng);
        examples.push(generate_example(label, rng));
        targets.push(one_hot(label));
    }

    (examples, targets)
}

#[derive(Clone, Debug)]
pub struct EdgeItem {
    pub image: Example,
    pub target: Target,
}

impl EdgeItem {
    /// Pairs examples with their targets, preserving order.
    pub fn zip(examples: Vec<Example>, targets: Vec<Target>) -> Vec<EdgeItem> {
        examples
            .into_iter()
            .zip(targets)
            .map(|(image, target)| EdgeItem { image, target })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct EdgeBatch<B: Backend> {
    /// Images as `[batch, 1, 9, 9]`.
    pub images: Tensor<B, 4>,
    /// One-hot targets as `[batch, 3]`.
    pub targets: Tensor<B, 2>,
}

#[derive(Clone, Debug, Default)]
pub struct EdgeBatcher;

impl<B: Backend> Batcher<B, EdgeItem, EdgeBatch<B>> for EdgeBatcher {
    fn batch(&self, items: Vec<EdgeItem>, device: &B::Device) -> EdgeBatch<B> {
        let batch_size = items.len();

        let images = items
            .iter()
            .flat_map(|item| item.image.values())
            .collect::<Vec<f32>>();
        let targets = items
            .iter()
            .flat_map(|item| item.target)
            .collect::<Vec<f32>>();

        let images = Tensor::from_data(
            TensorData::new(images, [batch_size, 1, GRID_SIZE, GRID_SIZE]),
            device,
        );
        let targets = Tensor::from_data(TensorData::new(targets, [batch_size, NUM_CLASSES]), device);

        EdgeBatch { images, targets }
    }
}
