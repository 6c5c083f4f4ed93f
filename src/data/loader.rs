// ============================================================
// Layer 4: Dataset Loader
// ============================================================
// Reads paper records from a fixed directory layout:
//
//   {dataset_dir}/
//     train.jsonl   one JSON object per line
//     dev.jsonl
//     test.jsonl
//
// Every split carries all five fields, each a JSON string. The
// whole file is checked before any Example is returned, so a
// record with a missing field is rejected here and never
// reaches the tokenizer. Numeric ids are refused rather than
// re-rendered: 1901.10010 and 1901.1001 are different papers.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::domain::error::PipelineError;
use crate::domain::record::{Example, REQUIRED_FIELDS};
use crate::domain::traits::{ExampleSource, Split};

/// Loads splits stored as JSON Lines files.
pub struct JsonlLoader {
    dir: PathBuf,
}

impl JsonlLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn split_path(&self, split: Split) -> PathBuf {
        self.dir.join(format!("{}.jsonl", split.name()))
    }

    /// A missing dataset directory is fatal before any phase runs.
    pub fn ensure_exists(&self) -> Result<(), PipelineError> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(PipelineError::resource(
                "dataset",
                format!("directory '{}' does not exist", self.dir.display()),
            ))
        }
    }
}

impl ExampleSource for JsonlLoader {
    fn load_split(&self, split: Split) -> Result<Vec<Example>, PipelineError> {
        let path = self.split_path(split);
        let file = File::open(&path).map_err(|e| {
            PipelineError::resource(format!("{split} split"), format!("'{}': {e}", path.display()))
        })?;

        let mut examples = Vec::new();
        let mut seen_ids = HashSet::new();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line_no = index + 1;
            let line = line.map_err(|e| {
                PipelineError::resource(format!("{split} split"), format!("line {line_no}: {e}"))
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(&line).map_err(|e| {
                PipelineError::resource(
                    format!("{split} split"),
                    format!("line {line_no} is not valid JSON: {e}"),
                )
            })?;
            let object = value.as_object().ok_or_else(|| {
                PipelineError::resource(
                    format!("{split} split"),
                    format!("line {line_no} is not a JSON object"),
                )
            })?;

            let example = parse_record(object, split, line_no)?;
            if !seen_ids.insert(example.arxiv_id.clone()) {
                tracing::warn!("Duplicate arxiv_id '{}' in {} split", example.arxiv_id, split);
            }
            examples.push(example);
        }

        tracing::info!("Loaded {} records from '{}'", examples.len(), path.display());
        Ok(examples)
    }
}

/// Build an Example, enforcing the required string fields.
fn parse_record(object: &Map<String, Value>, split: Split, line_no: usize) -> Result<Example, PipelineError> {
    if let Some(field) = REQUIRED_FIELDS.iter().find(|f| field_text(object, f).is_none()) {
        return Err(PipelineError::schema(split.name(), line_no, *field));
    }

    // Every field was checked above.
    let text = |field: &str| field_text(object, field).unwrap_or_default().to_string();
    Ok(Example {
        title:         text("title"),
        abstract_text: text("abstract"),
        area:          text("area"),
        task_id:       text("task_id"),
        arxiv_id:      text("arxiv_id"),
    })
}

fn field_text<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    object.get(field)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_split(dir: &Path, split: Split, lines: &[&str]) {
        fs::write(dir.join(format!("{}.jsonl", split.name())), lines.join("\n")).unwrap();
    }

    #[test]
    fn test_loads_records_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        write_split(tmp.path(), Split::Train, &[
            r#"{"title":"A","abstract":"B","area":"cv","task_id":"image-classification","arxiv_id":"1"}"#,
            "",
            r#"{"title":"C","abstract":"D","area":"nlp","task_id":"text-summarization","arxiv_id":"2"}"#,
        ]);

        let loader = JsonlLoader::new(tmp.path());
        let examples = loader.load_split(Split::Train).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0], Example::new("A", "B", "cv", "image-classification", "1"));
        assert_eq!(examples[1].arxiv_id, "2");
    }

    #[test]
    fn test_missing_area_is_schema_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_split(tmp.path(), Split::Dev, &[
            r#"{"title":"A","abstract":"B","area":"cv","task_id":"x","arxiv_id":"1"}"#,
            r#"{"title":"A","abstract":"B","task_id":"x","arxiv_id":"2"}"#,
        ]);

        let err = JsonlLoader::new(tmp.path()).load_split(Split::Dev).unwrap_err();
        match err {
            PipelineError::Schema { split, line, field } => {
                assert_eq!(split, "dev");
                assert_eq!(line, 2);
                assert_eq!(field, "area");
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_test_split_requires_every_field() {
        let tmp = tempfile::tempdir().unwrap();
        write_split(tmp.path(), Split::Test, &[
            r#"{"title":"A","abstract":"B","task_id":"x","arxiv_id":"1"}"#,
        ]);

        let err = JsonlLoader::new(tmp.path()).load_split(Split::Test).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { line: 1, ref field, .. } if field == "area"));
    }

    #[test]
    fn test_numeric_arxiv_id_is_schema_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_split(tmp.path(), Split::Test, &[
            r#"{"title":"A","abstract":"B","area":"cv","task_id":"x","arxiv_id":"1901.10010"}"#,
            r#"{"title":"A","abstract":"B","area":"cv","task_id":"x","arxiv_id":1901.1001}"#,
        ]);

        let err = JsonlLoader::new(tmp.path()).load_split(Split::Test).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { line: 2, ref field, .. } if field == "arxiv_id"));
    }

    #[test]
    fn test_string_ids_are_kept_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        write_split(tmp.path(), Split::Test, &[
            r#"{"title":"A","abstract":"B","area":"cv","task_id":"x","arxiv_id":"1901.10010"}"#,
            r#"{"title":"A","abstract":"B","area":"cv","task_id":"x","arxiv_id":"1901.1001"}"#,
        ]);

        let examples = JsonlLoader::new(tmp.path()).load_split(Split::Test).unwrap();
        let ids: Vec<&str> = examples.iter().map(|e| e.arxiv_id.as_str()).collect();
        assert_eq!(ids, vec!["1901.10010", "1901.1001"]);
    }

    #[test]
    fn test_missing_directory_is_resource_error() {
        let loader = JsonlLoader::new("/definitely/not/here");
        assert!(matches!(loader.ensure_exists(), Err(PipelineError::Resource { .. })));
        assert!(matches!(loader.load_split(Split::Train), Err(PipelineError::Resource { .. })));
    }
}
