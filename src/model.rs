use tch::nn::{self, Linear, Path};
use tch::{Kind, Tensor};

use crate::memory::MemoryBlock;

/// Sequence-to-sequence classifier for the rote task.
///
/// Input projection (`in_len -> mem_len`), a stack of `lay_len` memory cells,
/// output projection (`mem_len -> out_len`), softmax over the symbol axis.
/// Maps `[batch, time, in_len]` to `[batch, time, out_len]` per-step class
/// probabilities.
///
/// The cells are held as an explicit ordered collection, so the state
/// operations below just walk the Vec in cell order instead of probing a
/// heterogeneous layer stack by type.
pub struct RoteNet {
    input: Linear,
    cells: Vec<MemoryBlock>,
    output: Linear,
}

impl RoteNet {
    pub fn new(vs: &Path, in_len: i64, out_len: i64, mem_len: i64, lay_len: usize) -> Self {
        let input = nn::linear(vs / "input", in_len, mem_len, Default::default());
        let mut cells = Vec::with_capacity(lay_len);
        for i in 0..lay_len {
            cells.push(MemoryBlock::new(&(vs / format!("cell{}", i)), mem_len));
        }
        let output = nn::linear(vs / "output", mem_len, out_len, Default::default());
        RoteNet {
            input,
            cells,
            output,
        }
    }

    /// Deterministic given current parameters and current memory state; the
    /// memory state persists across calls until `reset` (or automatically,
    /// when the cells are left in their default auto-reset mode).
    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        let mut hidden = input.apply(&self.input);
        for cell in &mut self.cells {
            hidden = cell.forward(&hidden);
        }
        hidden.apply(&self.output).softmax(-1, Kind::Float)
    }

    /// Resets every memory cell, in cell order. Call before any independent
    /// evaluation pass so no state leaks across examples.
    pub fn reset(&mut self) {
        for cell in &mut self.cells {
            cell.reset();
        }
    }

    pub fn set_reset(&mut self, reset: bool) {
        for cell in &mut self.cells {
            cell.set_reset(reset);
        }
    }

    pub fn set_serial(&mut self, serial: bool) {
        for cell in &mut self.cells {
            cell.set_serial(serial);
        }
    }
}
