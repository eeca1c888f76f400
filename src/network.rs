//! Fixed feed-forward gesture network.
//!
//! flatten(21x3) -> [dense(256, relu) -> batchnorm -> dropout(0.3)]
//!               -> [dense(128, relu) -> batchnorm -> dropout(0.3)]
//!               -> [dense(64,  relu) -> batchnorm -> dropout(0.2)]
//!               -> dense(classes, softmax)
//!
//! Matrices are row-major `Vec<f32>`; a batch is `rows x cols`.

use crate::consts::INPUT_WIDTH;
use crate::error::{SfResult, SignForgeError};
use serde::{Deserialize, Serialize};

pub const HIDDEN_LAYERS: [(usize, f32); 3] = [(256, 0.3), (128, 0.3), (64, 0.2)];

const BN_MOMENTUM: f32 = 0.99;
const BN_EPSILON: f32 = 1e-3;
const PROB_EPSILON: f32 = 1e-7;

// Adam
const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const ADAM_EPSILON: f32 = 1e-7;

/// Standard normal via Box-Muller.
fn gaussian(rng: &mut fastrand::Rng) -> f32 {
    loop {
        let u1 = rng.f32();
        if u1 <= f32::EPSILON {
            continue;
        }
        let u2 = rng.f32();
        return (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos();
    }
}

/// Normal truncated at two standard deviations.
fn truncated_gaussian(rng: &mut fastrand::Rng) -> f32 {
    loop {
        let z = gaussian(rng);
        if z.abs() <= 2.0 {
            return z;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    pub inputs: usize,
    pub outputs: usize,
    /// `inputs x outputs`
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl Dense {
    fn he_normal(inputs: usize, outputs: usize, rng: &mut fastrand::Rng) -> Self {
        let std = (2.0 / inputs as f32).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| truncated_gaussian(rng) * std)
            .collect();
        Self {
            inputs,
            outputs,
            weights,
            bias: vec![0.0; outputs],
        }
    }

    fn glorot_uniform(inputs: usize, outputs: usize, rng: &mut fastrand::Rng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f32).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| (rng.f32() * 2.0 - 1.0) * limit)
            .collect();
        Self {
            inputs,
            outputs,
            weights,
            bias: vec![0.0; outputs],
        }
    }

    /// `x (rows x inputs) -> rows x outputs`
    fn forward(&self, x: &[f32], rows: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(rows * self.outputs);
        for r in 0..rows {
            out.extend_from_slice(&self.bias);
            let row_out = &mut out[r * self.outputs..(r + 1) * self.outputs];
            let row_in = &x[r * self.inputs..(r + 1) * self.inputs];
            for (i, &xi) in row_in.iter().enumerate() {
                if xi == 0.0 {
                    continue;
                }
                let w = &self.weights[i * self.outputs..(i + 1) * self.outputs];
                for (o, &wv) in row_out.iter_mut().zip(w) {
                    *o += xi * wv;
                }
            }
        }
        out
    }

    /// Returns (dW, db, dX).
    fn backward(&self, x: &[f32], dy: &[f32], rows: usize) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
        let mut dw = vec![0.0; self.weights.len()];
        let mut db = vec![0.0; self.outputs];
        let mut dx = vec![0.0; rows * self.inputs];

        for r in 0..rows {
            let x_row = &x[r * self.inputs..(r + 1) * self.inputs];
            let dy_row = &dy[r * self.outputs..(r + 1) * self.outputs];
            let dx_row = &mut dx[r * self.inputs..(r + 1) * self.inputs];

            for (b, &g) in db.iter_mut().zip(dy_row) {
                *b += g;
            }
            for i in 0..self.inputs {
                let w = &self.weights[i * self.outputs..(i + 1) * self.outputs];
                let gw = &mut dw[i * self.outputs..(i + 1) * self.outputs];
                let xi = x_row[i];
                let mut acc = 0.0;
                for o in 0..self.outputs {
                    gw[o] += xi * dy_row[o];
                    acc += dy_row[o] * w[o];
                }
                dx_row[i] = acc;
            }
        }
        (dw, db, dx)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchNorm {
    pub gamma: Vec<f32>,
    pub beta: Vec<f32>,
    pub moving_mean: Vec<f32>,
    pub moving_variance: Vec<f32>,
}

impl BatchNorm {
    fn new(width: usize) -> Self {
        Self {
            gamma: vec![1.0; width],
            beta: vec![0.0; width],
            moving_mean: vec![0.0; width],
            moving_variance: vec![1.0; width],
        }
    }

    fn width(&self) -> usize {
        self.gamma.len()
    }

    fn infer(&self, x: &mut [f32]) {
        let w = self.width();
        for row in x.chunks_mut(w) {
            for j in 0..w {
                let inv = 1.0 / (self.moving_variance[j] + BN_EPSILON).sqrt();
                row[j] = (row[j] - self.moving_mean[j]) * inv * self.gamma[j] + self.beta[j];
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub dense: Dense,
    pub norm: BatchNorm,
    pub dropout: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub blocks: Vec<Block>,
    pub head: Dense,
}

/// Everything the backward pass needs from one block.
struct BlockCache {
    input: Vec<f32>,
    pre_activation: Vec<f32>,
    x_hat: Vec<f32>,
    inv_std: Vec<f32>,
    /// 0 for dropped units, 1/(1-p) for kept ones.
    mask: Vec<f32>,
}

pub struct Gradients {
    blocks: Vec<BlockGradients>,
    head_w: Vec<f32>,
    head_b: Vec<f32>,
}

struct BlockGradients {
    w: Vec<f32>,
    b: Vec<f32>,
    gamma: Vec<f32>,
    beta: Vec<f32>,
}

/// Mean loss and correct-prediction count over one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchStats {
    pub loss: f32,
    pub correct: usize,
}

pub fn softmax_in_place(logits: &mut [f32]) {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in logits.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in logits.iter_mut() {
        *v /= sum;
    }
}

pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
        .0
}

pub fn cross_entropy(probs: &[f32], target: usize) -> f32 {
    -probs[target].clamp(PROB_EPSILON, 1.0 - PROB_EPSILON).ln()
}

impl Network {
    pub fn new(classes: usize, rng: &mut fastrand::Rng) -> Self {
        let mut width = INPUT_WIDTH;
        let blocks = HIDDEN_LAYERS
            .iter()
            .map(|&(units, dropout)| {
                let b = Block {
                    dense: Dense::he_normal(width, units, rng),
                    norm: BatchNorm::new(units),
                    dropout,
                };
                width = units;
                b
            })
            .collect();
        Self {
            blocks,
            head: Dense::glorot_uniform(width, classes, rng),
        }
    }

    pub fn classes(&self) -> usize {
        self.head.outputs
    }

    /// Every stored scalar, batch-norm moving statistics included.
    pub fn parameter_count(&self) -> usize {
        let blocks: usize = self
            .blocks
            .iter()
            .map(|b| b.dense.weights.len() + b.dense.bias.len() + 4 * b.norm.width())
            .sum();
        blocks + self.head.weights.len() + self.head.bias.len()
    }

    /// Checks layer widths chain correctly from the input tensor to the head.
    pub fn validate(&self) -> SfResult<()> {
        let mut width = INPUT_WIDTH;
        for (i, b) in self.blocks.iter().enumerate() {
            let d = &b.dense;
            if d.inputs != width
                || d.weights.len() != d.inputs * d.outputs
                || d.bias.len() != d.outputs
                || b.norm.width() != d.outputs
                || b.norm.beta.len() != d.outputs
                || b.norm.moving_mean.len() != d.outputs
                || b.norm.moving_variance.len() != d.outputs
            {
                return Err(SignForgeError::Validation(format!(
                    "Layer {} has inconsistent shapes",
                    i
                )));
            }
            width = d.outputs;
        }
        let h = &self.head;
        if h.inputs != width || h.weights.len() != h.inputs * h.outputs || h.bias.len() != h.outputs
        {
            return Err(SignForgeError::Validation(
                "Output layer has inconsistent shapes".to_string(),
            ));
        }
        Ok(())
    }

    /// Inference-mode forward pass (moving statistics, no dropout).
    pub fn predict(&self, input: &[f32]) -> Vec<f32> {
        let mut x = input.to_vec();
        for b in &self.blocks {
            x = b.dense.forward(&x, 1);
            x.iter_mut().for_each(|v| *v = v.max(0.0));
            b.norm.infer(&mut x);
        }
        let mut logits = self.head.forward(&x, 1);
        softmax_in_place(&mut logits);
        logits
    }

    /// Training-mode forward and backward over one batch. Moving statistics
    /// are updated in place; trainable parameters are left untouched.
    pub fn train_batch(
        &mut self,
        inputs: &[f32],
        targets: &[usize],
        rng: &mut fastrand::Rng,
    ) -> (BatchStats, Gradients) {
        let rows = targets.len();
        let mut caches = Vec::with_capacity(self.blocks.len());
        let mut x = inputs.to_vec();

        for b in self.blocks.iter_mut() {
            let width = b.dense.outputs;
            let pre = b.dense.forward(&x, rows);
            let act: Vec<f32> = pre.iter().map(|v| v.max(0.0)).collect();

            let mut mean = vec![0.0; width];
            let mut var = vec![0.0; width];
            for row in act.chunks(width) {
                for j in 0..width {
                    mean[j] += row[j];
                }
            }
            mean.iter_mut().for_each(|m| *m /= rows as f32);
            for row in act.chunks(width) {
                for j in 0..width {
                    let d = row[j] - mean[j];
                    var[j] += d * d;
                }
            }
            var.iter_mut().for_each(|v| *v /= rows as f32);

            for j in 0..width {
                b.norm.moving_mean[j] =
                    b.norm.moving_mean[j] * BN_MOMENTUM + mean[j] * (1.0 - BN_MOMENTUM);
                b.norm.moving_variance[j] =
                    b.norm.moving_variance[j] * BN_MOMENTUM + var[j] * (1.0 - BN_MOMENTUM);
            }

            let inv_std: Vec<f32> = var.iter().map(|v| 1.0 / (v + BN_EPSILON).sqrt()).collect();
            let mut x_hat = vec![0.0; rows * width];
            let mut out = vec![0.0; rows * width];
            let keep = 1.0 - b.dropout;
            let mask: Vec<f32> = (0..rows * width)
                .map(|_| if rng.f32() < keep { 1.0 / keep } else { 0.0 })
                .collect();

            for r in 0..rows {
                for j in 0..width {
                    let k = r * width + j;
                    x_hat[k] = (act[k] - mean[j]) * inv_std[j];
                    out[k] = (x_hat[k] * b.norm.gamma[j] + b.norm.beta[j]) * mask[k];
                }
            }

            caches.push(BlockCache {
                input: x,
                pre_activation: pre,
                x_hat,
                inv_std,
                mask,
            });
            x = out;
        }

        let classes = self.head.outputs;
        let mut probs = self.head.forward(&x, rows);
        let mut loss = 0.0;
        let mut correct = 0;
        for (r, row) in probs.chunks_mut(classes).enumerate() {
            softmax_in_place(row);
            loss += cross_entropy(row, targets[r]);
            if argmax(row) == targets[r] {
                correct += 1;
            }
        }

        // d(mean CE)/d(logits) = (p - y) / rows
        let mut dy = probs;
        for (r, row) in dy.chunks_mut(classes).enumerate() {
            row[targets[r]] -= 1.0;
            row.iter_mut().for_each(|v| *v /= rows as f32);
        }

        let (head_w, head_b, mut dx) = self.head.backward(&x, &dy, rows);

        let mut block_grads = Vec::with_capacity(self.blocks.len());
        for (b, cache) in self.blocks.iter().zip(caches.iter()).rev() {
            let width = b.dense.outputs;
            let n = rows as f32;

            let d_bn: Vec<f32> = dx.iter().zip(&cache.mask).map(|(g, m)| g * m).collect();

            let mut d_gamma = vec![0.0; width];
            let mut d_beta = vec![0.0; width];
            let mut sum_dxhat = vec![0.0; width];
            let mut sum_dxhat_xhat = vec![0.0; width];
            for r in 0..rows {
                for j in 0..width {
                    let k = r * width + j;
                    d_gamma[j] += d_bn[k] * cache.x_hat[k];
                    d_beta[j] += d_bn[k];
                    let dxh = d_bn[k] * b.norm.gamma[j];
                    sum_dxhat[j] += dxh;
                    sum_dxhat_xhat[j] += dxh * cache.x_hat[k];
                }
            }

            let mut dz = vec![0.0; rows * width];
            for r in 0..rows {
                for j in 0..width {
                    let k = r * width + j;
                    if cache.pre_activation[k] <= 0.0 {
                        continue;
                    }
                    let dxh = d_bn[k] * b.norm.gamma[j];
                    dz[k] = cache.inv_std[j] / n
                        * (n * dxh - sum_dxhat[j] - cache.x_hat[k] * sum_dxhat_xhat[j]);
                }
            }

            let (dw, db, d_in) = b.dense.backward(&cache.input, &dz, rows);
            block_grads.push(BlockGradients {
                w: dw,
                b: db,
                gamma: d_gamma,
                beta: d_beta,
            });
            dx = d_in;
        }
        block_grads.reverse();

        (
            BatchStats {
                loss: loss / rows as f32,
                correct,
            },
            Gradients {
                blocks: block_grads,
                head_w,
                head_b,
            },
        )
    }
}

#[derive(Debug, Clone, Default)]
struct Moments {
    m: Vec<f32>,
    v: Vec<f32>,
}

impl Moments {
    fn step(&mut self, params: &mut [f32], grads: &[f32], lr_t: f32) {
        if self.m.len() != params.len() {
            self.m = vec![0.0; params.len()];
            self.v = vec![0.0; params.len()];
        }
        for i in 0..params.len() {
            let g = grads[i];
            self.m[i] = BETA1 * self.m[i] + (1.0 - BETA1) * g;
            self.v[i] = BETA2 * self.v[i] + (1.0 - BETA2) * g * g;
            params[i] -= lr_t * self.m[i] / (self.v[i].sqrt() + ADAM_EPSILON);
        }
    }
}

/// Adam with bias correction folded into the step size.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    t: i32,
    /// w, b, gamma, beta per block, then head w and b.
    moments: Vec<Moments>,
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            t: 0,
            moments: Vec::new(),
        }
    }

    pub fn apply(&mut self, net: &mut Network, grads: &Gradients) {
        self.t += 1;
        let lr_t = self.learning_rate * (1.0 - BETA2.powi(self.t)).sqrt()
            / (1.0 - BETA1.powi(self.t));

        let needed = net.blocks.len() * 4 + 2;
        if self.moments.len() != needed {
            self.moments = vec![Moments::default(); needed];
        }

        for (i, (b, g)) in net.blocks.iter_mut().zip(&grads.blocks).enumerate() {
            self.moments[i * 4].step(&mut b.dense.weights, &g.w, lr_t);
            self.moments[i * 4 + 1].step(&mut b.dense.bias, &g.b, lr_t);
            self.moments[i * 4 + 2].step(&mut b.norm.gamma, &g.gamma, lr_t);
            self.moments[i * 4 + 3].step(&mut b.norm.beta, &g.beta, lr_t);
        }
        let h = net.blocks.len() * 4;
        self.moments[h].step(&mut net.head.weights, &grads.head_w, lr_t);
        self.moments[h + 1].step(&mut net.head.bias, &grads.head_b, lr_t);
    }
}
