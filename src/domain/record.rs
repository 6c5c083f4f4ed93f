// ============================================================
// Layer 3: Paper Records
// ============================================================
// Two plain data types flow through the pipeline:
//
//   Example         one paper as it sits on disk
//   TokenizedRecord the same paper after tokenisation
//
// The arxiv id is the only link between the two. Predictions
// are written back keyed by it, so it must never be altered.

use serde::{Deserialize, Serialize};

/// Fields every dataset record must carry, in every split.
pub const REQUIRED_FIELDS: [&str; 5] = ["title", "abstract", "area", "task_id", "arxiv_id"];

/// One paper row from a dataset split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub title: String,

    #[serde(rename = "abstract")]
    pub abstract_text: String,

    /// Research area, e.g. "cv"
    pub area: String,

    /// Hyphen-joined task tokens, e.g. "image-classification"
    pub task_id: String,

    /// Unique paper identifier used to correlate predictions
    pub arxiv_id: String,
}

impl Example {
    #[cfg(test)]
    pub fn new(
        title:         impl Into<String>,
        abstract_text: impl Into<String>,
        area:          impl Into<String>,
        task_id:       impl Into<String>,
        arxiv_id:      impl Into<String>,
    ) -> Self {
        Self {
            title:         title.into(),
            abstract_text: abstract_text.into(),
            area:          area.into(),
            task_id:       task_id.into(),
            arxiv_id:      arxiv_id.into(),
        }
    }

    /// The target string `"{area}, {task tokens}"`.
    pub fn target_text(&self) -> String {
        format!("{}, {}", self.area, self.task_id.replace('-', " "))
    }
}

/// Model-ready form of an [`Example`].
///
/// These four fields are the whole record; nothing from the
/// source row survives except the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizedRecord {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub labels:         Vec<u32>,
    pub id:             String,
}
