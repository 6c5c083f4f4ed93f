// ============================================================
// Layer 4: Seq2Seq Batcher
// ============================================================
// Implements Burn's Batcher trait: a Vec<TokenizedRecord>
// becomes one Seq2SeqBatch of tensors.
//
// Padding is dynamic: each batch is padded to its own longest
// source and longest label sequence, clipped to the model's
// position table. Inputs that were already padded by the
// preprocessor keep their attention mask.
//
// Decoder inputs are the labels shifted one step right behind
// the decoder start token:
//
//   labels            a  b  c  </s>
//   decoder_input_ids <start> a  b  c
//
// Masks follow Burn's convention: `true` marks a padded slot.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::record::TokenizedRecord;

#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    /// [batch, src_len]
    pub input_ids: Tensor<B, 2, Int>,
    /// [batch, src_len], true = padding
    pub input_mask_pad: Tensor<B, 2, Bool>,
    /// [batch, tgt_len]
    pub decoder_input_ids: Tensor<B, 2, Int>,
    /// [batch, tgt_len], true = padding
    pub decoder_mask_pad: Tensor<B, 2, Bool>,
    /// [batch, tgt_len], padded with the pad token (ignored by the loss)
    pub labels: Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct Seq2SeqBatcher<B: Backend> {
    device:                 B::Device,
    pad_token_id:           u32,
    decoder_start_token_id: u32,
    max_positions:          usize,
}

impl<B: Backend> Seq2SeqBatcher<B> {
    pub fn new(
        device:                 B::Device,
        pad_token_id:           u32,
        decoder_start_token_id: u32,
        max_positions:          usize,
    ) -> Self {
        Self { device, pad_token_id, decoder_start_token_id, max_positions }
    }

    fn int_tensor(&self, flat: Vec<i32>, rows: usize, cols: usize) -> Tensor<B, 2, Int> {
        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device).reshape([rows, cols])
    }
}

impl<B: Backend> Batcher<TokenizedRecord, Seq2SeqBatch<B>> for Seq2SeqBatcher<B> {
    fn batch(&self, items: Vec<TokenizedRecord>) -> Seq2SeqBatch<B> {
        let batch_size = items.len();
        let pad        = self.pad_token_id as i32;

        let src_len = items
            .iter()
            .map(|r| r.input_ids.len().min(self.max_positions))
            .max()
            .unwrap_or(0)
            .max(1);
        let tgt_len = items
            .iter()
            .map(|r| r.labels.len().min(self.max_positions))
            .max()
            .unwrap_or(0)
            .max(1);

        let mut input_flat   = Vec::with_capacity(batch_size * src_len);
        let mut input_mask   = Vec::with_capacity(batch_size * src_len);
        let mut decoder_flat = Vec::with_capacity(batch_size * tgt_len);
        let mut decoder_mask = Vec::with_capacity(batch_size * tgt_len);
        let mut labels_flat  = Vec::with_capacity(batch_size * tgt_len);

        for record in &items {
            for i in 0..src_len {
                match record.input_ids.get(i) {
                    Some(&id) => {
                        input_flat.push(id as i32);
                        input_mask.push(record.attention_mask.get(i).copied().unwrap_or(1) as i32);
                    }
                    None => {
                        input_flat.push(pad);
                        input_mask.push(0);
                    }
                }
            }

            let labels = &record.labels[..record.labels.len().min(tgt_len)];
            let shifted = shift_right(labels, self.decoder_start_token_id);
            for i in 0..tgt_len {
                labels_flat.push(labels.get(i).map_or(pad, |&id| id as i32));
                decoder_flat.push(shifted.get(i).map_or(pad, |&id| id as i32));
                decoder_mask.push(i32::from(i < labels.len().max(1)));
            }
        }

        Seq2SeqBatch {
            input_ids:         self.int_tensor(input_flat, batch_size, src_len),
            input_mask_pad:    self.int_tensor(input_mask, batch_size, src_len).equal_elem(0),
            decoder_input_ids: self.int_tensor(decoder_flat, batch_size, tgt_len),
            decoder_mask_pad:  self.int_tensor(decoder_mask, batch_size, tgt_len).equal_elem(0),
            labels:            self.int_tensor(labels_flat, batch_size, tgt_len),
        }
    }
}

/// `[start] + labels[..n-1]`; same length as `labels`
/// (length 1 for an empty label sequence).
pub fn shift_right(labels: &[u32], decoder_start_token_id: u32) -> Vec<u32> {
    let mut shifted = Vec::with_capacity(labels.len().max(1));
    shifted.push(decoder_start_token_id);
    if let Some((_, head)) = labels.split_last() {
        shifted.extend_from_slice(head);
    }
    shifted
}
