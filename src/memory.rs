use tch::nn::{self, Linear, Path};
use tch::{Kind, Tensor};

/// A recurrent memory cell over `[batch, time, mem_len]` inputs.
///
/// Each time-step mixes the running memory vector with the current input
/// through a learned gate:
///
///   m_t = g_t * m_{t-1} + (1 - g_t) * c_t
///
/// where `g_t = sigmoid(W_g x_t)` and `c_t = tanh(W_c x_t)`. The cell's
/// output at step t is m_t, so the output shape matches the input shape.
///
/// Two evaluation modes produce the same recurrence:
///   - serial: a literal step-by-step loop over the time axis;
///   - parallel (default): the closed cumulative-product form of the
///     first-order linear recurrence `m_t = a_t * m_{t-1} + b_t`, evaluated
///     for the whole time axis at once with cumprod/cumsum. Accurate while
///     the cumulative gate product stays above its underflow clamp; serial
///     mode is exact at any sequence length.
///
/// Memory persists across forward calls until `reset()` puts it back to its
/// initial (zero) state. With `set_reset(true)` (the default) the cell resets
/// itself at the start of every forward, so independent batches don't leak
/// into each other.
pub struct MemoryBlock {
    gate: Linear,
    candidate: Linear,
    mem_len: i64,
    serial: bool,
    auto_reset: bool,
    memory: Option<Tensor>,
}

impl MemoryBlock {
    pub fn new(vs: &Path, mem_len: i64) -> Self {
        let gate = nn::linear(vs / "gate", mem_len, mem_len, Default::default());
        let candidate = nn::linear(vs / "candidate", mem_len, mem_len, Default::default());
        MemoryBlock {
            gate,
            candidate,
            mem_len,
            serial: false,
            auto_reset: true,
            memory: None,
        }
    }

    /// Clears the memory back to its initial value (zeros, re-materialized
    /// lazily at the next forward for whatever batch size arrives).
    pub fn reset(&mut self) {
        self.memory = None;
    }

    pub fn set_reset(&mut self, reset: bool) {
        self.auto_reset = reset;
    }

    pub fn set_serial(&mut self, serial: bool) {
        self.serial = serial;
    }

    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        if self.auto_reset {
            self.reset();
        }
        let batch = input.size()[0];
        let memory = match self.memory.take() {
            Some(memory) => memory,
            None => Tensor::zeros(&[batch, self.mem_len], (Kind::Float, input.device())),
        };
        let gates = input.apply(&self.gate).sigmoid();
        let candidates = input.apply(&self.candidate).tanh();
        let output = if self.serial {
            self.forward_serial(&gates, &candidates, memory)
        } else {
            self.forward_parallel(&gates, &candidates, memory)
        };
        // Carried state is data for the next call, not part of this graph.
        let steps = output.size()[1];
        self.memory = Some(output.select(1, steps - 1).detach());
        output
    }

    fn forward_serial(&self, gates: &Tensor, candidates: &Tensor, memory: Tensor) -> Tensor {
        let steps = gates.size()[1];
        let mut memory = memory;
        let mut outputs = Vec::with_capacity(steps as usize);
        for step in 0..steps {
            let gate = gates.select(1, step);
            let candidate = candidates.select(1, step);
            // m = g * m + (1 - g) * c, written as c + g * (m - c)
            memory = &candidate + &gate * (&memory - &candidate);
            outputs.push(memory.shallow_clone());
        }
        Tensor::stack(&outputs, 1)
    }

    fn forward_parallel(&self, gates: &Tensor, candidates: &Tensor, memory: Tensor) -> Tensor {
        // With a_t = g_t and b_t = (1 - g_t) * c_t the recurrence unrolls to
        //   m_t = P_t * m_0 + P_t * sum_{j<=t} b_j / P_j,  P_t = prod_{i<=t} a_i
        // which needs no loop over the time axis. The clamp keeps b_j / P_j
        // finite when the gates drive P_j toward zero; once P_j actually hits
        // the clamp (hundreds of steps, or gates saturated near zero) later
        // contributions come out scaled and this mode drifts from the serial
        // recurrence. At the sequence lengths used here P_j stays far above
        // the clamp; use serial mode when in doubt.
        let decay = gates.cumprod(1, Kind::Float);
        let inject = candidates - gates * candidates;
        let scaled = &inject / &decay.clamp_min(1e-12);
        let accumulated = scaled.cumsum(1, Kind::Float);
        let held = memory.unsqueeze(1);
        &decay * &(&held + &accumulated)
    }
}
