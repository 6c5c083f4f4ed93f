// ============================================================
// Layer 5: Beam Search Generation
// ============================================================
// Autoregressive decoding for one batch, sample by sample.
//
//   1. encode the whole batch once
//   2. for each row, grow up to `num_beams` hypotheses from
//      [decoder_start], one token per step
//   3. a hypothesis that emits EOS is finished and scored as
//      sum(log p) / len^length_penalty
//   4. stop when `num_beams` hypotheses have finished or
//      `max_length` tokens were generated
//
// num_beams = 1 is greedy decoding. Beam bookkeeping runs on
// the host; only the decoder forward pass touches the device.
// Returned sequences exclude the decoder start token and keep
// the EOS token when one was produced.

use anyhow::{anyhow, Result};
use burn::{prelude::*, tensor::activation::log_softmax};

use crate::domain::traits::{GenerationConfig, SpecialTokens};
use crate::ml::model::Seq2SeqModel;

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    score:  f32,
}

/// Generate one sequence per row of `input_ids`, in row order.
pub fn generate<B: Backend>(
    model:      &Seq2SeqModel<B>,
    input_ids:  Tensor<B, 2, Int>,
    mask_pad:   Tensor<B, 2, Bool>,
    config:     &GenerationConfig,
    special:    &SpecialTokens,
) -> Result<Vec<Vec<u32>>> {
    let [batch_size, src_len] = input_ids.dims();
    let memory = model.encode(input_ids, mask_pad.clone());
    let [_, _, d_model] = memory.dims();

    // The start token takes one decoder position.
    let max_length = config.max_length.min(model.max_positions().saturating_sub(1));

    (0..batch_size)
        .map(|row| {
            let row_memory = memory.clone().slice([row..row + 1, 0..src_len, 0..d_model]);
            let row_mask   = mask_pad.clone().slice([row..row + 1, 0..src_len]);
            beam_search(model, row_memory, row_mask, max_length, config, special)
        })
        .collect()
}

fn beam_search<B: Backend>(
    model:      &Seq2SeqModel<B>,
    memory:     Tensor<B, 3>,
    mask_pad:   Tensor<B, 2, Bool>,
    max_length: usize,
    config:     &GenerationConfig,
    special:    &SpecialTokens,
) -> Result<Vec<u32>> {
    let num_beams = config.num_beams.max(1);
    let device    = memory.device();

    let mut beams    = vec![Hypothesis { tokens: vec![special.decoder_start], score: 0.0 }];
    let mut finished: Vec<Hypothesis> = Vec::new();

    for _ in 0..max_length {
        let n       = beams.len();
        let cur_len = beams[0].tokens.len();

        let flat: Vec<i32> = beams.iter().flat_map(|h| h.tokens.iter().map(|&t| t as i32)).collect();
        let decoder_input = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &device).reshape([n, cur_len]);

        let logits = model.decode(
            decoder_input,
            None,
            Tensor::cat(vec![memory.clone(); n], 0),
            Tensor::cat(vec![mask_pad.clone(); n], 0),
        );
        let [_, _, vocab_size] = logits.dims();
        let last = logits
            .slice([0..n, cur_len - 1..cur_len, 0..vocab_size])
            .reshape([n, vocab_size]);
        let log_probs = log_softmax(last, 1)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("cannot read decoder output: {e:?}"))?;

        // Best 2 × num_beams continuations across all beams, so
        // enough survive after some of them finish on EOS.
        let mut candidates: Vec<(usize, u32, f32)> = Vec::with_capacity(n * 2 * num_beams);
        for (b, beam) in beams.iter().enumerate() {
            let row = &log_probs[b * vocab_size..(b + 1) * vocab_size];
            for (token, lp) in top_k(row, 2 * num_beams) {
                candidates.push((b, token as u32, beam.score + lp));
            }
        }
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut next = Vec::with_capacity(num_beams);
        for (rank, (b, token, score)) in candidates.into_iter().enumerate() {
            let mut tokens = beams[b].tokens.clone();
            tokens.push(token);
            if token == special.eos {
                if rank < num_beams {
                    finished.push(Hypothesis { tokens, score });
                }
            } else {
                next.push(Hypothesis { tokens, score });
            }
            if next.len() == num_beams {
                break;
            }
        }

        if finished.len() >= num_beams || next.is_empty() {
            break;
        }
        beams = next;
    }

    if finished.len() < num_beams {
        finished.extend(beams);
    }

    let best = finished
        .into_iter()
        .max_by(|a, b| {
            normalized(a, config.length_penalty).total_cmp(&normalized(b, config.length_penalty))
        })
        .ok_or_else(|| anyhow!("beam search produced no hypothesis"))?;

    Ok(best.tokens[1..].to_vec())
}

/// Length-normalised score; the start token does not count.
fn normalized(h: &Hypothesis, length_penalty: f32) -> f32 {
    let len = (h.tokens.len().saturating_sub(1)).max(1) as f32;
    h.score / len.powf(length_penalty)
}

/// Indices and values of the `k` largest entries, best first.
fn top_k(values: &[f32], k: usize) -> Vec<(usize, f32)> {
    let k = k.min(values.len());
    if k == 0 {
        return Vec::new();
    }
    let mut index: Vec<usize> = (0..values.len()).collect();
    index.select_nth_unstable_by(k - 1, |&a, &b| values[b].total_cmp(&values[a]));
    index.truncate(k);
    index.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    index.into_iter().map(|i| (i, values[i])).collect()
}

/// Token ids with pad / bos / eos / decoder-start removed.
pub fn strip_special(ids: &[u32], special: &SpecialTokens) -> Vec<u32> {
    ids.iter().copied().filter(|&id| !special.is_special(id)).collect()
}
