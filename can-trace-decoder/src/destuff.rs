//! Bit de-stuffing and field labeling
//!
//! A CAN transmitter inserts one complementary bit after every five equal
//! bits. The receiver side walks the decoded stream, marks the bit following
//! five equal bits as a stuff bit and leaves it out of the logical position
//! count, so logical positions line up with the frame layout in [`FieldTable`].

use crate::fields::FieldTable;
use crate::types::{LabeledBit, Level};

/// Equal bits after which the transmitter inserts a stuff bit
pub const STUFF_RUN_LENGTH: usize = 5;

/// Run tracking carried from one bit to the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RunState {
    run_value: Option<Level>,
    run_length: usize,
    logical_index: usize,
}

impl RunState {
    fn classify(&mut self, bit: Level, table: &FieldTable) -> LabeledBit {
        if self.run_length == STUFF_RUN_LENGTH {
            // The stuff bit opens the next run
            self.run_value = Some(bit);
            self.run_length = 1;
            return LabeledBit {
                bit,
                logical_index: self.logical_index,
                is_stuff_bit: true,
                field_label: None,
            };
        }

        if self.run_value == Some(bit) {
            self.run_length += 1;
        } else {
            self.run_value = Some(bit);
            self.run_length = 1;
        }

        let labeled = LabeledBit {
            bit,
            logical_index: self.logical_index,
            is_stuff_bit: false,
            field_label: table.label_at(self.logical_index),
        };
        self.logical_index += 1;
        labeled
    }
}

/// Labels decoded bits with stuffing and field information
#[derive(Debug, Clone, Default)]
pub struct FrameDestuffer {
    table: FieldTable,
}

impl FrameDestuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label a full snapshot of decoded bits
    pub fn label(&self, bits: &[Level]) -> Vec<LabeledBit> {
        let mut state = RunState::default();
        bits.iter().map(|&bit| state.classify(bit, &self.table)).collect()
    }

    /// Keep only the logical bits of a snapshot
    pub fn destuff(&self, bits: &[Level]) -> Vec<Level> {
        self.label(bits)
            .into_iter()
            .filter(|b| !b.is_stuff_bit)
            .map(|b| b.bit)
            .collect()
    }
}

/// Streaming variant of [`FrameDestuffer::label`]
///
/// Labels only the bits appended since the last update; the result always
/// equals a full re-run over the same snapshot as long as the snapshot only
/// grows. Call [`IncrementalDestuffer::reset`] when the bit stream restarts.
#[derive(Debug, Clone, Default)]
pub struct IncrementalDestuffer {
    table: FieldTable,
    state: RunState,
    labeled: Vec<LabeledBit>,
}

impl IncrementalDestuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label the bits of `snapshot` not seen yet and return all labels
    pub fn update(&mut self, snapshot: &[Level]) -> &[LabeledBit] {
        if snapshot.len() < self.labeled.len() {
            log::debug!("Bit stream shrank, relabeling from scratch");
            self.reset();
        }
        for &bit in &snapshot[self.labeled.len()..] {
            let labeled = self.state.classify(bit, &self.table);
            self.labeled.push(labeled);
        }
        &self.labeled
    }

    pub fn labeled(&self) -> &[LabeledBit] {
        &self.labeled
    }

    pub fn reset(&mut self) {
        self.state = RunState::default();
        self.labeled.clear();
    }
}
