pub const BIAS_INDEX: u32 = 0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureEntry {
    pub index: u32,
    pub value: f32,
    pub field: u32,
}

/// One parsed example. Position 0 is always the synthetic bias feature.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseRow {
    pub label: f32,
    pub features: Vec<FeatureEntry>,
}

impl SparseRow {
    pub fn new(label: f32) -> SparseRow {
        SparseRow::with_capacity(label, 0)
    }

    pub fn with_capacity(label: f32, capacity: usize) -> SparseRow {
        let mut features = Vec::with_capacity(capacity + 1);
        features.push(FeatureEntry {
            index: BIAS_INDEX,
            value: 1.0,
            field: 0,
        });
        SparseRow { label, features }
    }

    pub fn add_feature(&mut self, index: u32, value: f32) {
        self.add_field_feature(index, value, 0);
    }

    pub fn add_field_feature(&mut self, index: u32, value: f32, field: u32) {
        self.features.push(FeatureEntry {
            index,
            value,
            field,
        });
    }

    /// Number of entries, bias included
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.len() <= 1
    }

    pub fn has_bias(&self) -> bool {
        match self.features.first() {
            Some(e) => e.index == BIAS_INDEX && e.value == 1.0,
            None => false,
        }
    }

    pub fn max_index(&self) -> u32 {
        self.features.iter().map(|e| e.index).max().unwrap_or(0)
    }

    pub fn max_field(&self) -> u32 {
        self.features.iter().map(|e| e.field).max().unwrap_or(0)
    }
}
