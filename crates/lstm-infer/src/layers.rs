//! Inference-time layer math. Dropout layers from training are identity here
//! and have no representation.

use ndarray::{s, Array1, Array2, ArrayView1};

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Numerically stable softmax.
pub fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    let exp = logits.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

/// Index of the first maximal element.
pub fn argmax(values: &Array1<f32>) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

pub fn relu(x: &Array1<f32>) -> Array1<f32> {
    x.mapv(|v| v.max(0.0))
}

/// LSTM layer with the Keras gate layout: kernel columns ordered
/// input / forget / cell / output.
#[derive(Clone, Debug)]
pub struct Lstm {
    /// (input_dim, 4 * units)
    pub kernel: Array2<f32>,
    /// (units, 4 * units)
    pub recurrent_kernel: Array2<f32>,
    /// (4 * units,)
    pub bias: Array1<f32>,
    pub units: usize,
}

impl Lstm {
    pub fn step(
        &self,
        x: ArrayView1<f32>,
        h: &Array1<f32>,
        c: &Array1<f32>,
    ) -> (Array1<f32>, Array1<f32>) {
        let z = x.dot(&self.kernel) + h.dot(&self.recurrent_kernel) + &self.bias;
        let u = self.units;
        let i = z.slice(s![0..u]).mapv(sigmoid);
        let f = z.slice(s![u..2 * u]).mapv(sigmoid);
        let g = z.slice(s![2 * u..3 * u]).mapv(f32::tanh);
        let o = z.slice(s![3 * u..4 * u]).mapv(sigmoid);
        let c_next = &f * c + &i * &g;
        let h_next = &o * &c_next.mapv(f32::tanh);
        (h_next, c_next)
    }

    /// Run a (seq_len, input_dim) sequence; hidden state of every step.
    pub fn forward_sequence(&self, inputs: &Array2<f32>) -> Array2<f32> {
        let mut h = Array1::zeros(self.units);
        let mut c = Array1::zeros(self.units);
        let mut out = Array2::zeros((inputs.nrows(), self.units));
        for (t, x) in inputs.rows().into_iter().enumerate() {
            let (h_next, c_next) = self.step(x, &h, &c);
            h = h_next;
            c = c_next;
            out.row_mut(t).assign(&h);
        }
        out
    }

    /// Run a (seq_len, input_dim) sequence; final hidden state only.
    pub fn forward_last(&self, inputs: &Array2<f32>) -> Array1<f32> {
        let mut h = Array1::zeros(self.units);
        let mut c = Array1::zeros(self.units);
        for x in inputs.rows() {
            let (h_next, c_next) = self.step(x, &h, &c);
            h = h_next;
            c = c_next;
        }
        h
    }
}

/// Batch normalization applied with frozen training statistics.
#[derive(Clone, Debug)]
pub struct BatchNorm {
    pub gamma: Array1<f32>,
    pub beta: Array1<f32>,
    pub moving_mean: Array1<f32>,
    pub moving_variance: Array1<f32>,
    pub epsilon: f32,
}

impl BatchNorm {
    pub fn forward(&self, x: &Array1<f32>) -> Array1<f32> {
        let denom = self.moving_variance.mapv(|v| (v + self.epsilon).sqrt());
        (x - &self.moving_mean) / denom * &self.gamma + &self.beta
    }
}

#[derive(Clone, Debug)]
pub struct Dense {
    /// (input_dim, output_dim)
    pub kernel: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Dense {
    pub fn forward(&self, x: &Array1<f32>) -> Array1<f32> {
        x.dot(&self.kernel) + &self.bias
    }
}
