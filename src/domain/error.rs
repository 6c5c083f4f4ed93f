// ============================================================
// Layer 3: Error Taxonomy
// ============================================================
// Every fatal condition the pipeline can hit falls into one of
// four kinds. None of them is recovered: the orchestrator
// propagates the first one it sees and the process exits
// with a nonzero status.

use std::error::Error as StdError;
use thiserror::Error;

/// The four failure kinds of a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad, missing or unparsable CLI / JSON options.
    #[error("configuration error{}: {message}", field_suffix(.field))]
    Configuration {
        /// The option that caused the failure, when one can be named
        field: Option<String>,
        message: String,
    },

    /// A dataset record lacks a required field, or holds it as a
    /// non-string value.
    #[error("schema error in split '{split}', record {line}: missing or non-string field `{field}`")]
    Schema {
        split: String,
        /// 1-based line (record) number inside the split
        line: usize,
        field: String,
    },

    /// A model, tokenizer or dataset location could not be resolved.
    #[error("cannot resolve {resource}: {message}")]
    Resource { resource: String, message: String },

    /// Anything surfaced by the ML stack while it was doing the work.
    #[error("{phase} failed: {source}")]
    Delegated {
        phase: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(f) => format!(" in `{f}`"),
        None => String::new(),
    }
}

impl PipelineError {
    pub fn configuration(field: Option<&str>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn schema(split: impl Into<String>, line: usize, field: impl Into<String>) -> Self {
        Self::Schema {
            split: split.into(),
            line,
            field: field.into(),
        }
    }

    pub fn resource(resource: impl Into<String>, message: impl ToString) -> Self {
        Self::Resource {
            resource: resource.into(),
            message: message.to_string(),
        }
    }

    /// Wrap an opaque failure from the trainer or tokenizer.
    pub fn delegated(phase: &'static str, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Delegated {
            phase,
            source: source.into(),
        }
    }

    /// Short kind name, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "ConfigurationError",
            Self::Schema { .. } => "SchemaError",
            Self::Resource { .. } => "ResourceError",
            Self::Delegated { .. } => "DelegatedFailure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message_names_field() {
        let e = PipelineError::configuration(Some("num_beams"), "must be at least 1");
        assert_eq!(
            e.to_string(),
            "configuration error in `num_beams`: must be at least 1"
        );
        assert_eq!(e.kind(), "ConfigurationError");
    }

    #[test]
    fn test_schema_message() {
        let e = PipelineError::schema("train", 3, "area");
        assert_eq!(
            e.to_string(),
            "schema error in split 'train', record 3: missing or non-string field `area`"
        );
    }

    #[test]
    fn test_delegated_keeps_source() {
        let inner = anyhow::anyhow!("out of memory");
        let e = PipelineError::delegated("train", inner);
        assert_eq!(e.kind(), "DelegatedFailure");
        assert!(e.source().is_some());
        assert_eq!(e.to_string(), "train failed: out of memory");
    }
}
