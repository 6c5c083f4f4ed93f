use burn::data::dataset::Dataset;

use crate::domain::record::TokenizedRecord;

/// Tokenized papers exposed through Burn's Dataset trait so the
/// DataLoader can index and shuffle them.
pub struct PaperDataset {
    records: Vec<TokenizedRecord>,
}

impl PaperDataset {
    pub fn new(records: Vec<TokenizedRecord>) -> Self { Self { records } }

    pub fn sample_count(&self) -> usize { self.records.len() }
}

impl Dataset<TokenizedRecord> for PaperDataset {
    fn get(&self, index: usize) -> Option<TokenizedRecord> {
        self.records.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexing() {
        let rec = TokenizedRecord {
            input_ids:      vec![0, 4, 2],
            attention_mask: vec![1, 1, 1],
            labels:         vec![0, 5, 2],
            id:             "p1".into(),
        };
        let ds = PaperDataset::new(vec![rec.clone()]);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.sample_count(), 1);
        assert_eq!(ds.get(0), Some(rec));
        assert_eq!(ds.get(1), None);
    }
}
