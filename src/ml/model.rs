// ============================================================
// Layer 5: Seq2Seq Model
// ============================================================
// A BART-shaped encoder-decoder built from Burn's transformer
// blocks:
//
//   input_ids ─► token emb + enc positions ─► TransformerEncoder ─► memory
//                                                                    │
//   decoder_input_ids ─► token emb + dec positions ─► TransformerDecoder
//                                                         │
//                                                      lm_head ─► logits [b, t, vocab]
//
// The token embedding is shared by encoder and decoder. The
// configuration reads the keys of a Hugging Face BART
// `config.json`; any key it does not know is ignored.

use burn::{
    nn::{
        attention::generate_autoregressive_mask,
        loss::CrossEntropyLossConfig,
        transformer::{
            TransformerDecoder, TransformerDecoderConfig, TransformerDecoderInput,
            TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput,
        },
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::Seq2SeqBatch;
use crate::domain::traits::SpecialTokens;

// ─── Config ───────────────────────────────────────────────────────────────────
/// Architecture hyperparameters plus the special token ids.
/// Field names match BART's `config.json` so a pretrained
/// config deserialises directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seq2SeqConfig {
    pub vocab_size:              usize,
    pub d_model:                 usize,
    pub encoder_layers:          usize,
    pub decoder_layers:          usize,
    pub encoder_attention_heads: usize,
    pub decoder_attention_heads: usize,
    pub encoder_ffn_dim:         usize,
    pub decoder_ffn_dim:         usize,
    pub max_position_embeddings: usize,
    pub dropout:                 f64,
    pub pad_token_id:            u32,
    pub bos_token_id:            u32,
    pub eos_token_id:            u32,
    pub decoder_start_token_id:  u32,
}

/// facebook/bart-base
impl Default for Seq2SeqConfig {
    fn default() -> Self {
        Self {
            vocab_size:              50265,
            d_model:                 768,
            encoder_layers:          6,
            decoder_layers:          6,
            encoder_attention_heads: 12,
            decoder_attention_heads: 12,
            encoder_ffn_dim:         3072,
            decoder_ffn_dim:         3072,
            max_position_embeddings: 1024,
            dropout:                 0.1,
            pad_token_id:            1,
            bos_token_id:            0,
            eos_token_id:            2,
            decoder_start_token_id:  2,
        }
    }
}

impl Seq2SeqConfig {
    pub fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens {
            pad:           self.pad_token_id,
            bos:           self.bos_token_id,
            eos:           self.eos_token_id,
            decoder_start: self.decoder_start_token_id,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2SeqModel<B> {
        let token_embedding   = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let encoder_positions = EmbeddingConfig::new(self.max_position_embeddings, self.d_model).init(device);
        let decoder_positions = EmbeddingConfig::new(self.max_position_embeddings, self.d_model).init(device);

        let encoder = TransformerEncoderConfig::new(
            self.d_model, self.encoder_ffn_dim, self.encoder_attention_heads, self.encoder_layers,
        )
        .with_dropout(self.dropout)
        .init(device);
        let decoder = TransformerDecoderConfig::new(
            self.d_model, self.decoder_ffn_dim, self.decoder_attention_heads, self.decoder_layers,
        )
        .with_dropout(self.dropout)
        .init(device);

        let lm_head = LinearConfig::new(self.d_model, self.vocab_size).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();

        Seq2SeqModel {
            token_embedding, encoder_positions, decoder_positions,
            encoder, decoder, lm_head, dropout,
            pad_token_id:  self.pad_token_id as usize,
            max_positions: self.max_position_embeddings,
        }
    }
}

// ─── Model ────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Seq2SeqModel<B: Backend> {
    pub token_embedding:   Embedding<B>,
    pub encoder_positions: Embedding<B>,
    pub decoder_positions: Embedding<B>,
    pub encoder:           TransformerEncoder<B>,
    pub decoder:           TransformerDecoder<B>,
    pub lm_head:           Linear<B>,
    pub dropout:           Dropout,
    pub pad_token_id:      usize,
    pub max_positions:     usize,
}

impl<B: Backend> Seq2SeqModel<B> {
    /// Longest sequence either side can embed.
    pub fn max_positions(&self) -> usize {
        self.max_positions
    }

    /// Token plus learned position embeddings: [b, s] → [b, s, d_model]
    fn embed(&self, ids: Tensor<B, 2, Int>, positions: &Embedding<B>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = ids.dims();
        let tok_emb = self.token_embedding.forward(ids);

        let index = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = positions.forward(index);

        self.dropout.forward(tok_emb + pos_emb)
    }

    /// input_ids: [b, s] → memory: [b, s, d_model]
    pub fn encode(&self, input_ids: Tensor<B, 2, Int>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let x = self.embed(input_ids, &self.encoder_positions);
        self.encoder.forward(TransformerEncoderInput::new(x).mask_pad(mask_pad))
    }

    /// decoder_input_ids: [b, t] → logits: [b, t, vocab]
    ///
    /// Always causal. `target_mask_pad` may be omitted during
    /// generation, where every beam has the same length.
    pub fn decode(
        &self,
        decoder_input_ids: Tensor<B, 2, Int>,
        target_mask_pad:   Option<Tensor<B, 2, Bool>>,
        memory:            Tensor<B, 3>,
        memory_mask_pad:   Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_len] = decoder_input_ids.dims();
        let device = decoder_input_ids.device();

        let x = self.embed(decoder_input_ids, &self.decoder_positions);
        let mask_attn = generate_autoregressive_mask::<B>(batch_size, seq_len, &device);

        let mut input = TransformerDecoderInput::new(x, memory)
            .target_mask_attn(mask_attn)
            .memory_mask_pad(memory_mask_pad);
        if let Some(mask) = target_mask_pad {
            input = input.target_mask_pad(mask);
        }

        self.lm_head.forward(self.decoder.forward(input))
    }

    /// Teacher-forced cross-entropy over the label tokens.
    /// Positions holding the pad id contribute nothing.
    pub fn forward_loss(&self, batch: &Seq2SeqBatch<B>) -> Tensor<B, 1> {
        let memory = self.encode(batch.input_ids.clone(), batch.input_mask_pad.clone());
        let logits = self.decode(
            batch.decoder_input_ids.clone(),
            Some(batch.decoder_mask_pad.clone()),
            memory,
            batch.input_mask_pad.clone(),
        );

        let [batch_size, seq_len, vocab_size] = logits.dims();
        let ce = CrossEntropyLossConfig::new()
            .with_pad_tokens(Some(vec![self.pad_token_id]))
            .init(&logits.device());

        ce.forward(
            logits.reshape([batch_size * seq_len, vocab_size]),
            batch.labels.clone().reshape([batch_size * seq_len]),
        )
    }
}
