use crate::consts::VECTOR_WIDTH;
use crate::error::EngineError;
use crate::feature_buffer::SparseRow;
use crate::optimizer::UpdaterTrait;
use crate::score::{linear_grad, linear_score, ScoreTrait};
use crate::simd::{dot, scale_add_into};
use crate::weights::ParameterLayout;

// y = wTx + sum[(V_i_fj * V_j_fi) * (x_i * x_j)]   over entries 1 <= i < j, bias excluded
//
// Plain FM is the same computation on a layout with a single implicit field.

const NO_SLOT: u32 = u32::MAX;

// A latent block that receives gradient in the current row
#[derive(Clone, Copy, Debug)]
struct TouchedBlock {
    feature: u32,
    field: u32,
    // row-local id of `field`, see ScoreFFM::number_row_fields()
    local_field: u32,
}

#[derive(Clone)]
pub struct ScoreFFM {
    layout: ParameterLayout,
    // num_factor floats per touched block, in the order of `touched`
    grad_buf: Vec<f32>,
    touched: Vec<TouchedBlock>,
    // (field, position) of the row entries, sorted to number the distinct fields
    field_order: Vec<(u32, u32)>,
    // position -> row-local field id
    local_field: Vec<u32>,
    // row-local field id -> slot in `touched` for the entry being accumulated
    entry_slot: Vec<u32>,
}

// Upper bound of touched blocks for a row of `num_entries` non-bias entries:
// every entry gets one block per distinct field among the others.
fn max_touched(layout: &ParameterLayout, num_entries: usize) -> usize {
    num_entries * num_entries.saturating_sub(1).min(layout.blocks_per_feature())
}

impl ScoreFFM {
    pub fn new(layout: ParameterLayout, max_row_len: usize) -> ScoreFFM {
        let blocks = max_touched(&layout, max_row_len);
        ScoreFFM {
            grad_buf: Vec::with_capacity(blocks * layout.num_factor as usize),
            touched: Vec::with_capacity(blocks),
            field_order: Vec::with_capacity(max_row_len),
            local_field: Vec::with_capacity(max_row_len),
            entry_slot: Vec::with_capacity(max_row_len),
            layout,
        }
    }

    // Empties the scratch space. Capacity is only added when a row is longer than
    // anything seen before, and then before any gradient work starts.
    fn prepare_scratch(&mut self, num_entries: usize) {
        let blocks = max_touched(&self.layout, num_entries);
        self.grad_buf.clear();
        self.touched.clear();
        self.field_order.clear();
        self.local_field.clear();
        self.entry_slot.clear();
        if blocks > self.touched.capacity() || num_entries > self.local_field.capacity() {
            log::debug!("Growing FFM scratch buffers to {} entries, {} blocks", num_entries, blocks);
            self.grad_buf.reserve(blocks * self.layout.num_factor as usize);
            self.touched.reserve(blocks);
            self.field_order.reserve(num_entries);
            self.local_field.reserve(num_entries);
            self.entry_slot.reserve(num_entries);
        }
    }

    // Gives the distinct fields of the row compact ids 0..n, so that the block lookup
    // table is as long as the row and not as long as num_field.
    fn number_row_fields(&mut self, row: &SparseRow) {
        for (position, entry) in row.features[1..].iter().enumerate() {
            self.field_order
                .push((self.layout.effective_field(entry.field), position as u32));
        }
        self.field_order.sort_unstable();
        self.local_field.resize(self.field_order.len(), 0);
        let mut distinct: u32 = 0;
        let mut previous = None;
        for &(field, position) in self.field_order.iter() {
            if previous != Some(field) {
                distinct += 1;
                previous = Some(field);
            }
            self.local_field[position as usize] = distinct - 1;
        }
        self.entry_slot.resize(distinct as usize, NO_SLOT);
    }

    #[cfg(test)]
    fn touched_blocks(&self) -> usize {
        self.touched.len()
    }
}

impl ScoreTrait for ScoreFFM {
    fn calc_score(&self, row: &SparseRow, weights: &[f32]) -> Result<f32, EngineError> {
        self.layout.check_row(row, weights.len())?;
        let k = self.layout.num_factor as usize;
        let mut score = linear_score(row, weights);
        let features = &row.features[1..];
        for (i, left) in features.iter().enumerate() {
            let field_i = self.layout.effective_field(left.field);
            for right in features[i + 1..].iter() {
                let field_j = self.layout.effective_field(right.field);
                let pos_i = self.layout.latent_offset(left.index, field_j);
                let pos_j = self.layout.latent_offset(right.index, field_i);
                let sum = dot::<VECTOR_WIDTH>(&weights[pos_i..pos_i + k], &weights[pos_j..pos_j + k]);
                score += sum * (left.value * right.value);
            }
        }
        Ok(score)
    }

    // Every block gradient is accumulated from the pre-update weights first, then each
    // touched block goes to the updater once. All pairs feeding the same (entry, field)
    // block are merged into that single batch_update, so regularization and the adaptive
    // cache advance once per block and example, not once per pair.
    fn calc_grad(
        &mut self,
        row: &SparseRow,
        weights: &mut [f32],
        partial_gradient: f32,
        updater: &mut dyn UpdaterTrait,
    ) -> Result<(), EngineError> {
        self.layout.check_row(row, weights.len())?;
        updater.check_ready(self.layout.num_param())?;

        linear_grad(row, weights, partial_gradient, updater);

        let features = &row.features[1..];
        if features.len() < 2 {
            return Ok(());
        }
        self.prepare_scratch(features.len());
        self.number_row_fields(row);
        let k = self.layout.num_factor as usize;

        // grad(V_i_fj) += pg * x_i * x_j * V_j_fi, one entry i at a time
        for (i, left) in features.iter().enumerate() {
            let field_i = self.layout.effective_field(left.field);
            let left_pg = left.value * partial_gradient;
            let first_slot = self.touched.len();
            for (j, right) in features.iter().enumerate() {
                if j == i {
                    continue;
                }
                let field_j = self.layout.effective_field(right.field);
                let local = self.local_field[j];
                let current = self.entry_slot[local as usize];
                let slot = match current {
                    NO_SLOT => {
                        let slot = self.touched.len();
                        self.touched.push(TouchedBlock {
                            feature: left.index,
                            field: field_j,
                            local_field: local,
                        });
                        self.grad_buf.resize((slot + 1) * k, 0.0);
                        self.entry_slot[local as usize] = slot as u32;
                        slot
                    }
                    slot => slot as usize,
                };
                let pos_j = self.layout.latent_offset(right.index, field_i);
                scale_add_into::<VECTOR_WIDTH>(
                    right.value * left_pg,
                    &weights[pos_j..pos_j + k],
                    &mut self.grad_buf[slot * k..(slot + 1) * k],
                );
            }
            for block in self.touched[first_slot..].iter() {
                self.entry_slot[block.local_field as usize] = NO_SLOT;
            }
        }

        for (slot, block) in self.touched.iter().enumerate() {
            let pos = self.layout.latent_offset(block.feature, block.field);
            updater.batch_update(&self.grad_buf[slot * k..(slot + 1) * k], pos, weights);
        }
        Ok(())
    }

    fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    fn get_name(&self) -> &'static str {
        if self.layout.field_aware {
            "ffm"
        } else {
            "fm"
        }
    }
}
