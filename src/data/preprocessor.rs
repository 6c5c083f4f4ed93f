// ============================================================
// Layer 4: Seq2Seq Preprocessor
// ============================================================
// Turns Example records into TokenizedRecords.
//
//   input  = encode(title, abstract) as a sentence pair,
//            bounded by max_source_length, padded / truncated
//            according to the data options
//   labels = encode("{area}, {task tokens}") with no cap
//   id     = arxiv_id, unchanged
//
// Test records are only predicted, so their labels are a
// one-token placeholder: [bos_token_id]. Generation needs a
// non-empty label sequence in the batch, nothing more.
//
// Two tokenizer clones are kept: one configured for the source
// side and one with padding and truncation switched off for
// the targets.

use tokenizers::{
    PaddingParams, PaddingStrategy, PostProcessor, Tokenizer, TruncationParams,
};

use crate::cli::arguments::DataArguments;
use crate::domain::error::PipelineError;
use crate::domain::record::{Example, TokenizedRecord};
use crate::domain::traits::SpecialTokens;

pub struct Preprocessor {
    source: Tokenizer,
    target: Tokenizer,
    bos_token_id: u32,
}

impl Preprocessor {
    pub fn new(
        tokenizer: &Tokenizer,
        options:   &DataArguments,
        special:   &SpecialTokens,
    ) -> Result<Self, PipelineError> {
        // The pair template's special tokens count against the cap.
        let added = tokenizer
            .get_post_processor()
            .map(|p| p.added_tokens(true))
            .unwrap_or(0);
        if options.truncation && options.max_source_length <= added {
            return Err(PipelineError::configuration(
                Some("max_source_length"),
                format!("must exceed the {added} special tokens added to each input"),
            ));
        }

        let mut source = tokenizer.clone();
        let truncation = options.truncation.then(|| TruncationParams {
            max_length: options.max_source_length,
            ..Default::default()
        });
        source
            .with_truncation(truncation)
            .map_err(|e| PipelineError::delegated("tokenizer setup", e))?;

        let padding = options.padding.then(|| PaddingParams {
            strategy:  PaddingStrategy::Fixed(options.max_source_length),
            pad_id:    special.pad,
            pad_token: tokenizer
                .id_to_token(special.pad)
                .unwrap_or_else(|| "<pad>".to_string()),
            ..Default::default()
        });
        source.with_padding(padding);

        let mut target = tokenizer.clone();
        target
            .with_truncation(None)
            .map_err(|e| PipelineError::delegated("tokenizer setup", e))?;
        target.with_padding(None);

        Ok(Self { source, target, bos_token_id: special.bos })
    }

    /// Train / eval preprocessing.
    pub fn preprocess_labelled(&self, examples: &[Example]) -> Result<Vec<TokenizedRecord>, PipelineError> {
        examples
            .iter()
            .map(|ex| {
                let (input_ids, attention_mask) = self.encode_source(ex)?;
                let labels = self
                    .target
                    .encode(ex.target_text(), true)
                    .map_err(|e| PipelineError::delegated("tokenize", e))?
                    .get_ids()
                    .to_vec();
                Ok(TokenizedRecord {
                    input_ids,
                    attention_mask,
                    labels,
                    id: ex.arxiv_id.clone(),
                })
            })
            .collect()
    }

    /// Test preprocessing: same inputs, placeholder labels.
    pub fn preprocess_unlabelled(&self, examples: &[Example]) -> Result<Vec<TokenizedRecord>, PipelineError> {
        examples
            .iter()
            .map(|ex| {
                let (input_ids, attention_mask) = self.encode_source(ex)?;
                Ok(TokenizedRecord {
                    input_ids,
                    attention_mask,
                    labels: vec![self.bos_token_id],
                    id: ex.arxiv_id.clone(),
                })
            })
            .collect()
    }

    fn encode_source(&self, ex: &Example) -> Result<(Vec<u32>, Vec<u32>), PipelineError> {
        let encoding = self
            .source
            .encode((ex.title.as_str(), ex.abstract_text.as_str()), true)
            .map_err(|e| PipelineError::delegated("tokenize", e))?;
        Ok((
            encoding.get_ids().to_vec(),
            encoding.get_attention_mask().to_vec(),
        ))
    }
}
