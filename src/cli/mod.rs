// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Turns argv (or a single JSON config file) into validated
// option structs. All work is delegated to Layer 2.
//
//   paper-tagger --do-train --do-eval --num-beams 4
//   paper-tagger run_config.json
//
// A JSON file is rewritten into `--key=value` tokens and fed
// through the same clap parser, so both paths share one set
// of types, defaults and error messages.

pub mod arguments;

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::domain::error::PipelineError;
use arguments::{DataArguments, ModelArguments, TrainingArguments};

const BIN_NAME: &str = "paper-tagger";

/// The full command line. clap derives parsing, help text and
/// type conversion from the three flattened option structs.
#[derive(Parser, Debug)]
#[command(
    name = "paper-tagger",
    version,
    about = "Fine-tune a seq2seq model to tag papers with an \"area, task\" label."
)]
pub struct Cli {
    /// JSON file holding the options; replaces command-line flags
    #[arg(value_name = "CONFIG_JSON")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub model: ModelArguments,

    #[command(flatten)]
    pub data: DataArguments,

    #[command(flatten)]
    pub training: TrainingArguments,
}

/// The three option groups after parsing and validation.
/// Immutable for the rest of the process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunArguments {
    pub model:    ModelArguments,
    pub data:     DataArguments,
    pub training: TrainingArguments,
}

impl RunArguments {
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.data.validate()?;
        self.training.validate()?;
        Ok(())
    }
}

impl From<Cli> for RunArguments {
    fn from(cli: Cli) -> Self {
        Self {
            model:    cli.model,
            data:     cli.data,
            training: cli.training,
        }
    }
}

// ─── Option table ─────────────────────────────────────────────────────────────
/// One documented option: `{name: (value name, default, description)}`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionInfo {
    /// snake_case name, also the JSON config key
    pub name:        String,
    pub value_name:  String,
    pub default:     Option<String>,
    pub description: String,
}

/// Enumerate every named option from the clap definition.
pub fn option_table() -> Vec<OptionInfo> {
    Cli::command()
        .get_arguments()
        .filter_map(|arg| {
            let long = arg.get_long()?;
            if long == "help" || long == "version" {
                return None;
            }
            Some(OptionInfo {
                name: long.replace('-', "_"),
                value_name: arg
                    .get_value_names()
                    .and_then(|names| names.first())
                    .map(|n| n.to_string())
                    .unwrap_or_default(),
                default: arg
                    .get_default_values()
                    .first()
                    .map(|v| v.to_string_lossy().into_owned()),
                description: arg.get_help().map(|h| h.to_string()).unwrap_or_default(),
            })
        })
        .collect()
}

// ─── Parsing ──────────────────────────────────────────────────────────────────
/// Parse and validate argv. `--help` and `--version` print and
/// exit here, the way `Cli::parse()` would.
pub fn parse_arguments<I, T>(argv: I) -> Result<RunArguments, PipelineError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    let cli = Cli::try_parse_from(&argv).map_err(clap_error)?;

    let cli = match &cli.config_file {
        Some(path) => {
            if argv.len() > 2 {
                return Err(PipelineError::configuration(
                    None,
                    "a JSON config file cannot be combined with other flags",
                ));
            }
            let tokens = config_file_tokens(path)?;
            tracing::debug!("Config file '{}' expanded to {:?}", path.display(), tokens);
            Cli::try_parse_from(tokens).map_err(clap_error)?
        }
        None => cli,
    };

    let args = RunArguments::from(cli);
    args.validate()?;
    Ok(args)
}

/// Rewrite a flat JSON object into `--key=value` tokens.
fn config_file_tokens(path: &Path) -> Result<Vec<String>, PipelineError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::configuration(None, format!("cannot read '{}': {e}", path.display()))
    })?;
    let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
        PipelineError::configuration(None, format!("'{}' is not valid JSON: {e}", path.display()))
    })?;
    let object = value.as_object().ok_or_else(|| {
        PipelineError::configuration(None, format!("'{}' must hold a JSON object", path.display()))
    })?;

    let known = option_table();
    let mut tokens = vec![BIN_NAME.to_string()];

    for (key, value) in object {
        if !known.iter().any(|info| &info.name == key) {
            return Err(PipelineError::configuration(Some(key), "unknown option"));
        }
        let flag = key.replace('_', "-");
        let rendered = match value {
            serde_json::Value::Null      => continue,
            serde_json::Value::Bool(b)   => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s.clone(),
            _ => {
                return Err(PipelineError::configuration(
                    Some(key),
                    "expected a string, number or boolean",
                ))
            }
        };
        tokens.push(format!("--{flag}={rendered}"));
    }

    Ok(tokens)
}

/// Map a clap error onto the configuration error kind,
/// naming the offending option when clap reports one.
fn clap_error(err: clap::Error) -> PipelineError {
    if matches!(
        err.kind(),
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    ) {
        err.exit();
    }

    // "--max-source-length <MAX_SOURCE_LENGTH>" → "max_source_length"
    let field = match err.get(ContextKind::InvalidArg) {
        Some(ContextValue::String(arg)) => arg
            .split_whitespace()
            .next()
            .map(|flag| flag.trim_start_matches('-').replace('-', "_")),
        _ => None,
    };

    let rendered = err.to_string();
    let message = rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .to_string();

    PipelineError::Configuration { field, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Result<RunArguments, PipelineError> {
        let argv = std::iter::once(BIN_NAME).chain(args.iter().copied());
        parse_arguments(argv)
    }

    fn field_of(err: PipelineError) -> Option<String> {
        match err {
            PipelineError::Configuration { field, .. } => field,
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_no_flags_gives_defaults() {
        assert_eq!(parse(&[]).unwrap(), RunArguments::default());
    }

    #[test]
    fn test_flags_are_applied() {
        let args = parse(&[
            "--do-train",
            "--do-eval", "true",
            "--padding", "false",
            "--num-beams", "2",
            "--model-name-or-path", "local/bart",
            "--train-subsample-ratio", "0.25",
            "--init-from-scratch",
        ])
        .unwrap();
        assert!(args.model.init_from_scratch);
        assert!(args.training.do_train);
        assert!(args.training.do_eval);
        assert!(!args.training.do_predict);
        assert!(!args.data.padding);
        assert_eq!(args.data.num_beams, 2);
        assert_eq!(args.model.model_name_or_path, "local/bart");
        assert_eq!(args.data.train_subsample_ratio, 0.25);
    }

    #[test]
    fn test_unknown_flag_is_configuration_error() {
        let err = parse(&["--no-such-option", "1"]).unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("no_such_option"));
    }

    #[test]
    fn test_unparsable_value_names_field() {
        let err = parse(&["--max-source-length", "lots"]).unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("max_source_length"));
    }

    #[test]
    fn test_out_of_range_ratio_names_field() {
        let err = parse(&["--valid-subsample-ratio", "0"]).unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("valid_subsample_ratio"));
    }

    #[test]
    fn test_json_config_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"model_name_or_path": "local/bart", "do_predict": true,
                "num_beams": 3, "config_name": null, "truncation": false}}"#
        )
        .unwrap();

        let args = parse(&[file.path().to_str().unwrap()]).unwrap();
        assert_eq!(args.model.model_name_or_path, "local/bart");
        assert!(args.training.do_predict);
        assert_eq!(args.data.num_beams, 3);
        assert!(args.model.config_name.is_none());
        assert!(!args.data.truncation);
        assert_eq!(args.data.max_source_length, arguments::DEFAULT_MAX_SOURCE_LENGTH);
    }

    #[test]
    fn test_json_config_unknown_key() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"learning_rat": 0.1}}"#).unwrap();
        let err = parse(&[file.path().to_str().unwrap()]).unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("learning_rat"));
    }

    #[test]
    fn test_json_config_wrong_type_names_field() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"num_beams": "wide"}}"#).unwrap();
        let err = parse(&[file.path().to_str().unwrap()]).unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("num_beams"));
    }

    #[test]
    fn test_json_config_cannot_mix_with_flags() {
        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let err = parse(&[file.path().to_str().unwrap(), "--do-train"]).unwrap_err();
        assert!(field_of(err).is_none());
    }

    #[test]
    fn test_option_table_documents_every_group() {
        let table = option_table();
        let model = table.iter().find(|o| o.name == "model_name_or_path").unwrap();
        assert_eq!(model.default.as_deref(), Some(arguments::DEFAULT_MODEL_NAME));
        assert!(!model.description.is_empty());
        for name in ["max_source_length", "num_beams", "output_dir", "save_total_limit"] {
            assert!(table.iter().any(|o| o.name == name), "missing {name}");
        }
        assert!(table.iter().all(|o| o.name != "config_file"));
    }
}
