// Shared fixtures for unit tests.
//
// The tokenizer is word-level over a closed vocabulary, so
// encode → decode is lossless for any sentence built from it.
// Its template mirrors BART: `<s> A </s>` for single inputs and
// `<s> A </s> </s> B </s>` for pairs.

use std::str::FromStr;

use tokenizers::Tokenizer;

use crate::domain::traits::SpecialTokens;
use crate::ml::model::Seq2SeqConfig;

pub const SPECIAL: SpecialTokens = SpecialTokens { pad: 1, bos: 0, eos: 2, decoder_start: 2 };

const WORDS: [&str; 15] = [
    "cv,", "nlp,", "image", "classification", "text", "summarization",
    "A", "B", "deep", "learning", "for", "images", "a", "study", "of",
];

pub const VOCAB_SIZE: usize = 4 + WORDS.len();

pub fn word_level_tokenizer() -> Tokenizer {
    let mut vocab = serde_json::Map::new();
    for (id, token) in ["<s>", "<pad>", "</s>", "<unk>"].iter().chain(WORDS.iter()).enumerate() {
        vocab.insert(token.to_string(), id.into());
    }

    let added = |id: u32, content: &str| {
        serde_json::json!({
            "id": id, "content": content, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        })
    };
    let special = |id: &str| serde_json::json!({ "SpecialToken": { "id": id, "type_id": 0 } });
    let sequence = |id: &str| serde_json::json!({ "Sequence": { "id": id, "type_id": 0 } });

    let json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            added(0, "<s>"), added(1, "<pad>"), added(2, "</s>"), added(3, "<unk>")
        ],
        "normalizer": null,
        "pre_tokenizer": { "type": "WhitespaceSplit" },
        "post_processor": {
            "type": "TemplateProcessing",
            "single": [special("<s>"), sequence("A"), special("</s>")],
            "pair": [
                special("<s>"), sequence("A"), special("</s>"),
                special("</s>"), sequence("B"), special("</s>")
            ],
            "special_tokens": {
                "<s>":  { "id": "<s>",  "ids": [0], "tokens": ["<s>"] },
                "</s>": { "id": "</s>", "ids": [2], "tokens": ["</s>"] }
            }
        },
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "<unk>" }
    });

    Tokenizer::from_str(&json.to_string()).expect("fixture tokenizer must parse")
}

/// A model small enough to train on the ndarray backend in tests.
pub fn tiny_model_config() -> Seq2SeqConfig {
    Seq2SeqConfig {
        vocab_size:              VOCAB_SIZE,
        d_model:                 16,
        encoder_layers:          1,
        decoder_layers:          1,
        encoder_attention_heads: 2,
        decoder_attention_heads: 2,
        encoder_ffn_dim:         32,
        decoder_ffn_dim:         32,
        max_position_embeddings: 64,
        dropout:                 0.0,
        pad_token_id:            SPECIAL.pad,
        bos_token_id:            SPECIAL.bos,
        eos_token_id:            SPECIAL.eos,
        decoder_start_token_id:  SPECIAL.decoder_start,
    }
}
