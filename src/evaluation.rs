use burn::prelude::*;
use rand::Rng;

use crate::{
    data::{edge_pattern, generate_example, Example, Label, GRID_SIZE, NUM_CLASSES},
    error::{Error, Result},
    model::{Classifier, ClassifierStages},
};

/// A fixed noise grid used for manual inspection of a trained classifier.
#[rustfmt::skip]
const NOISE_REFERENCE: [[f32; GRID_SIZE]; GRID_SIZE] = [
    [0.4373553, 0.4779668, 0.1930177, 0.1593520, -0.0345494, 0.0223741, 0.0640568, 0.3924454, -0.2735623],
    [0.3885833, 0.2389488, 0.4837438, -0.2873747, 0.1568927, -0.2247380, -0.3643555, -0.1138945, -0.4338161],
    [-0.0473384, -0.0074328, 0.2515846, -0.1316869, 0.3273238, -0.0314933, 0.4067349, 0.2305940, -0.1476159],
    [-0.4892437, 0.4205510, 0.3076911, 0.1908998, 0.3911707, -0.3271512, 0.1411098, 0.1001168, 0.0055436],
    [0.1230241, -0.4283980, -0.0337192, 0.4407995, -0.1960234, 0.4402565, 0.4663607, 0.1049250, -0.3412787],
    [-0.1898983, 0.2029763, 0.2215775, 0.2228667, 0.1764003, 0.2042395, -0.1141652, 0.4351949, 0.1693040],
    [-0.3953896, -0.0508491, -0.2592116, -0.1421156, -0.4226529, -0.3693315, -0.4938229, -0.0447463, -0.0148556],
    [0.4080228, -0.3220691, 0.1394160, 0.0946234, 0.2779241, 0.2662736, 0.1280168, -0.4852491, 0.3672767],
    [0.2409368, 0.4829554, -0.4058445, -0.2034742, -0.1357058, 0.1493636, -0.1788670, 0.1938661, -0.3624590],
];

/// Outcome of classifying one freshly generated example.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassCheck {
    pub label: Label,
    pub probabilities: [f32; NUM_CLASSES],
    /// 1 on the channel(s) holding the highest probability, 0 elsewhere.
    pub indicator: [u8; NUM_CLASSES],
}

impl ClassCheck {
    /// Whether the highest probability sits on the expected class only.
    pub fn is_correct(&self) -> bool {
        let mut expected = [0; NUM_CLASSES];
        expected[self.label.index()] = 1;
        self.indicator == expected
    }
}

/// Forward pass over one hand-authored grid.
#[derive(Clone, Debug)]
pub struct ReferenceDiagnostic<B: Backend> {
    pub label: Label,
    pub stages: ClassifierStages<B>,
}

/// Marks every channel equal to the maximum probability.
pub fn argmax_indicator(probabilities: &[f32; NUM_CLASSES]) -> [u8; NUM_CLASSES] {
    let max = probabilities
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);

    probabilities.map(|value| u8::from(value >= max))
}

/// Classifies one freshly generated example per class.
pub fn class_checks<B: Backend, R: Rng + ?Sized>(
    model: &Classifier<B>,
    rng: &mut R,
    device: &B::Device,
) -> Result<Vec<ClassCheck>> {
    Label::ALL
        .into_iter()
        .map(|label| {
            let example = generate_example(label, rng);
            let probabilities = probabilities(model, &example, device)?;

            Ok(ClassCheck {
                label,
                probabilities,
                indicator: argmax_indicator(&probabilities),
            })
        })
        .collect()
}

/// The hand-authored grids: fixed noise, the unshifted upper edge and the
/// lower edge shifted by -3.
pub fn reference_grids() -> [(Label, Example); NUM_CLASSES] {
    [
        (Label::Noise, Example::from_pixels(NOISE_REFERENCE)),
        (Label::UpperEdge, edge_pattern(Label::UpperEdge, 0)),
        (Label::LowerEdge, edge_pattern(Label::LowerEdge, -3)),
    ]
}

/// Runs the classifier over every reference grid, keeping both stages'
/// pre-activations.
pub fn reference_diagnostics<B: Backend>(
    model: &Classifier<B>,
    device: &B::Device,
) -> Vec<ReferenceDiagnostic<B>> {
    reference_grids()
        .into_iter()
        .map(|(label, example)| ReferenceDiagnostic {
            label,
            stages: model.forward_stages(example.to_tensor(device)),
        })
        .collect()
}

fn probabilities<B: Backend>(
    model: &Classifier<B>,
    example: &Example,
    device: &B::Device,
) -> Result<[f32; NUM_CLASSES]> {
    let values = model
        .forward(example.to_tensor(device))
        .into_data()
        .to_vec::<f32>()
        .map_err(|err| Error::Data(format!("{err:?}")))?;

    values
        .try_into()
        .map_err(|values: Vec<f32>| Error::Data(format!("expected 3 probabilities, got {values:?}")))
}
