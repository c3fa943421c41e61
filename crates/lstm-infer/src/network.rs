//! The fixed classifier the pre-trained weight files are valid for: three
//! stacked LSTMs, then batch-norm / dense / relu / batch-norm / dense /
//! softmax. Weight files for any other shape are rejected at load time.

use ndarray::{Array1, Array2};

use crate::layers::{argmax, relu, softmax, BatchNorm, Dense, Lstm};
use crate::weights::WeightsContainer;
use crate::WeightsError;

/// Hidden width of each recurrent layer in the shipped weight files.
pub const LSTM_UNITS: usize = 512;
/// Width of the intermediate dense layer in the shipped weight files.
pub const DENSE_UNITS: usize = 256;

/// Keras default batch-norm epsilon, baked into the trained statistics.
const BN_EPSILON: f32 = 1e-3;

#[derive(Debug)]
pub struct Network {
    lstm_1: Lstm,
    lstm_2: Lstm,
    lstm_3: Lstm,
    norm_1: BatchNorm,
    dense_1: Dense,
    norm_2: BatchNorm,
    dense_2: Dense,
}

impl Network {
    /// Assemble the topology from a weight container, validating every tensor
    /// shape and the seams between layers.
    pub fn from_container(weights: &WeightsContainer) -> Result<Self, WeightsError> {
        let lstm_1 = lstm_layer(weights, "lstm_1")?;
        let lstm_2 = lstm_layer(weights, "lstm_2")?;
        let lstm_3 = lstm_layer(weights, "lstm_3")?;
        let norm_1 = batch_norm_layer(weights, "batch_normalization_1")?;
        let dense_1 = dense_layer(weights, "dense_1")?;
        let norm_2 = batch_norm_layer(weights, "batch_normalization_2")?;
        let dense_2 = dense_layer(weights, "dense_2")?;

        seam(
            lstm_2.kernel.nrows() == lstm_1.units,
            "lstm_2 input width does not match lstm_1 units",
        )?;
        seam(
            lstm_3.kernel.nrows() == lstm_2.units,
            "lstm_3 input width does not match lstm_2 units",
        )?;
        seam(
            norm_1.gamma.len() == lstm_3.units,
            "batch_normalization_1 width does not match lstm_3 units",
        )?;
        seam(
            dense_1.kernel.nrows() == lstm_3.units,
            "dense_1 input width does not match lstm_3 units",
        )?;
        seam(
            norm_2.gamma.len() == dense_1.kernel.ncols(),
            "batch_normalization_2 width does not match dense_1 output",
        )?;
        seam(
            dense_2.kernel.nrows() == dense_1.kernel.ncols(),
            "dense_2 input width does not match dense_1 output",
        )?;

        Ok(Self {
            lstm_1,
            lstm_2,
            lstm_3,
            norm_1,
            dense_1,
            norm_2,
            dense_2,
        })
    }

    /// Number of output classes, i.e. the vocabulary size the net was
    /// trained on.
    pub fn output_classes(&self) -> usize {
        self.dense_2.kernel.ncols()
    }

    /// Width of one timestep of input.
    pub fn input_dim(&self) -> usize {
        self.lstm_1.kernel.nrows()
    }

    /// One forward pass over a (seq_len, input_dim) window, returning the
    /// softmax distribution over classes.
    pub fn predict(&self, window: &Array2<f32>) -> Result<Array1<f32>, WeightsError> {
        if window.ncols() != self.input_dim() {
            return Err(WeightsError::Topology(format!(
                "input window has width {}, network expects {}",
                window.ncols(),
                self.input_dim()
            )));
        }
        let seq_1 = self.lstm_1.forward_sequence(window);
        let seq_2 = self.lstm_2.forward_sequence(&seq_1);
        let last = self.lstm_3.forward_last(&seq_2);
        let x = self.norm_1.forward(&last);
        let x = relu(&self.dense_1.forward(&x));
        let x = self.norm_2.forward(&x);
        let logits = self.dense_2.forward(&x);
        Ok(softmax(&logits))
    }

    /// Most probable class for one window.
    pub fn predict_class(&self, window: &Array2<f32>) -> Result<usize, WeightsError> {
        Ok(argmax(&self.predict(window)?))
    }
}

fn seam(ok: bool, message: &str) -> Result<(), WeightsError> {
    if ok {
        Ok(())
    } else {
        Err(WeightsError::Topology(message.to_owned()))
    }
}

fn tensor_2d(weights: &WeightsContainer, name: &str) -> Result<Array2<f32>, WeightsError> {
    let tensor = weights.get(name)?;
    match tensor.shape[..] {
        [rows, cols] => Array2::from_shape_vec((rows, cols), tensor.data.clone()).map_err(|_| {
            WeightsError::BadShape {
                name: name.to_owned(),
                expected: "matrix".to_owned(),
                actual: tensor.shape.clone(),
            }
        }),
        _ => Err(WeightsError::BadShape {
            name: name.to_owned(),
            expected: "2 dimensions".to_owned(),
            actual: tensor.shape.clone(),
        }),
    }
}

fn tensor_1d(weights: &WeightsContainer, name: &str) -> Result<Array1<f32>, WeightsError> {
    let tensor = weights.get(name)?;
    match tensor.shape[..] {
        [_] => Ok(Array1::from_vec(tensor.data.clone())),
        _ => Err(WeightsError::BadShape {
            name: name.to_owned(),
            expected: "1 dimension".to_owned(),
            actual: tensor.shape.clone(),
        }),
    }
}

fn lstm_layer(weights: &WeightsContainer, prefix: &str) -> Result<Lstm, WeightsError> {
    let kernel = tensor_2d(weights, &format!("{prefix}/kernel"))?;
    let recurrent_kernel = tensor_2d(weights, &format!("{prefix}/recurrent_kernel"))?;
    let bias = tensor_1d(weights, &format!("{prefix}/bias"))?;
    let units = recurrent_kernel.nrows();
    if kernel.ncols() != 4 * units
        || recurrent_kernel.ncols() != 4 * units
        || bias.len() != 4 * units
    {
        return Err(WeightsError::Topology(format!(
            "{prefix} gate dimensions disagree"
        )));
    }
    Ok(Lstm {
        kernel,
        recurrent_kernel,
        bias,
        units,
    })
}

fn batch_norm_layer(weights: &WeightsContainer, prefix: &str) -> Result<BatchNorm, WeightsError> {
    let gamma = tensor_1d(weights, &format!("{prefix}/gamma"))?;
    let beta = tensor_1d(weights, &format!("{prefix}/beta"))?;
    let moving_mean = tensor_1d(weights, &format!("{prefix}/moving_mean"))?;
    let moving_variance = tensor_1d(weights, &format!("{prefix}/moving_variance"))?;
    let width = gamma.len();
    if beta.len() != width || moving_mean.len() != width || moving_variance.len() != width {
        return Err(WeightsError::Topology(format!(
            "{prefix} statistic widths disagree"
        )));
    }
    Ok(BatchNorm {
        gamma,
        beta,
        moving_mean,
        moving_variance,
        epsilon: BN_EPSILON,
    })
}

fn dense_layer(weights: &WeightsContainer, prefix: &str) -> Result<Dense, WeightsError> {
    let kernel = tensor_2d(weights, &format!("{prefix}/kernel"))?;
    let bias = tensor_1d(weights, &format!("{prefix}/bias"))?;
    if bias.len() != kernel.ncols() {
        return Err(WeightsError::Topology(format!(
            "{prefix} bias width does not match its kernel"
        )));
    }
    Ok(Dense { kernel, bias })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::Tensor;
    use ndarray::Array2;

    // Deterministic value source for fixture tensors, seeded per tensor name.
    fn value_hash(mut x: u64) -> f32 {
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        ((x.wrapping_mul(0x2545F4914F6CDD1D) >> 33) as f32) / (u32::MAX as f32)
    }

    fn fixture_tensor(name: &str, shape: &[usize], lo: f32, hi: f32) -> Tensor {
        let seed = name
            .bytes()
            .fold(0xcbf29ce484222325u64, |h, b| {
                (h ^ b as u64).wrapping_mul(0x100000001b3)
            });
        let len: usize = shape.iter().product();
        let data = (0..len)
            .map(|i| lo + (hi - lo) * value_hash(seed ^ (i as u64).wrapping_mul(0x9E3779B9)))
            .collect();
        Tensor {
            name: name.to_owned(),
            shape: shape.to_vec(),
            data,
        }
    }

    fn fixture_container(units: usize, dense: usize, classes: usize) -> WeightsContainer {
        let mut container = WeightsContainer::new();
        let mut push = |name: &str, shape: &[usize], lo: f32, hi: f32| {
            container
                .insert(fixture_tensor(name, shape, lo, hi))
                .unwrap();
        };
        for (i, input_dim) in [1, units, units].iter().enumerate() {
            let prefix = format!("lstm_{}", i + 1);
            push(&format!("{prefix}/kernel"), &[*input_dim, 4 * units], -0.3, 0.3);
            push(
                &format!("{prefix}/recurrent_kernel"),
                &[units, 4 * units],
                -0.3,
                0.3,
            );
            push(&format!("{prefix}/bias"), &[4 * units], -0.1, 0.1);
        }
        for prefix in ["batch_normalization_1", "batch_normalization_2"] {
            let width = if prefix.ends_with('1') { units } else { dense };
            push(&format!("{prefix}/gamma"), &[width], 0.8, 1.2);
            push(&format!("{prefix}/beta"), &[width], -0.1, 0.1);
            push(&format!("{prefix}/moving_mean"), &[width], -0.1, 0.1);
            push(&format!("{prefix}/moving_variance"), &[width], 0.5, 1.5);
        }
        push("dense_1/kernel", &[units, dense], -0.3, 0.3);
        push("dense_1/bias", &[dense], -0.1, 0.1);
        push("dense_2/kernel", &[dense, classes], -0.3, 0.3);
        push("dense_2/bias", &[classes], -0.1, 0.1);
        container
    }

    #[test]
    fn builds_from_a_consistent_container() {
        let network = Network::from_container(&fixture_container(4, 3, 5)).unwrap();
        assert_eq!(network.output_classes(), 5);
        assert_eq!(network.input_dim(), 1);
    }

    #[test]
    fn predict_returns_a_distribution() {
        let network = Network::from_container(&fixture_container(4, 3, 5)).unwrap();
        let window = Array2::from_shape_fn((10, 1), |(t, _)| t as f32 / 5.0);
        let probs = network.predict(&window).unwrap();
        assert_eq!(probs.len(), 5);
        assert!((probs.sum() - 1.0).abs() < 1e-4);
        assert!(probs.iter().all(|p| p.is_finite() && *p >= 0.0));
    }

    #[test]
    fn prediction_is_deterministic() {
        let network = Network::from_container(&fixture_container(4, 3, 5)).unwrap();
        let window = Array2::from_shape_fn((10, 1), |(t, _)| t as f32 / 5.0);
        assert_eq!(
            network.predict_class(&window).unwrap(),
            network.predict_class(&window).unwrap()
        );
    }

    #[test]
    fn missing_tensor_fails_the_build() {
        let err = Network::from_container(&WeightsContainer::new()).unwrap_err();
        assert!(matches!(err, WeightsError::MissingTensor(_)));
    }

    #[test]
    fn seam_mismatch_fails_the_build() {
        let mut container = fixture_container(4, 3, 5);
        // dense_1 sized for the wrong LSTM width
        container
            .insert(fixture_tensor("dense_1/kernel", &[7, 3], -0.3, 0.3))
            .unwrap();
        let err = Network::from_container(&container).unwrap_err();
        assert!(matches!(err, WeightsError::Topology(_)));
    }

    #[test]
    fn wrong_window_width_is_rejected() {
        let network = Network::from_container(&fixture_container(4, 3, 5)).unwrap();
        let window = Array2::from_elem((10, 2), 0.1);
        assert!(network.predict(&window).is_err());
    }
}
