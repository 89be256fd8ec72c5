//! Post-process pipeline.
//!
//! Each manifest entry such as `"encode utf-8"` is parsed into a
//! [`PostProcess`]: a [`PostProcessKind`] resolved from the first token plus
//! its arguments. A [`Pipeline`] is validated when it is built, before anything
//! is downloaded, and then run step by step, each step receiving the path
//! returned by the previous one.
//!
//! Failure policy:
//!
//! - unknown token: warning, step skipped
//! - built-in step with bad arguments: [`DimError::PipelineValidation`], install aborted
//! - built-in step failing at runtime: [`DimError::PostProcess`], install aborted
//! - `cmd` step failing at runtime: warning, pipeline continues

mod archive;
mod converters;
mod csv_json;
mod encoding;
mod spreadsheet;

pub use archive::ArchiveFormat;
pub use converters::{CommandError, Converters, NativeConverters};
pub use encoding::{TargetEncoding, SUPPORTED_ENCODINGS};

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{DimError, Result};

// ============================================================================
// Step registry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Variadic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessKind {
    Unzip,
    XlsxToCsv,
    CsvToJson,
    Encode,
    Cmd,
    Unknown(String),
}

impl PostProcessKind {
    /// All built-in kinds, in the order they are documented.
    pub const BUILTIN: [PostProcessKind; 5] = [
        Self::Unzip,
        Self::XlsxToCsv,
        Self::CsvToJson,
        Self::Encode,
        Self::Cmd,
    ];

    pub fn from_token(token: &str) -> Self {
        match token {
            "unzip" => Self::Unzip,
            "xlsx-to-csv" => Self::XlsxToCsv,
            "csv-to-json" => Self::CsvToJson,
            "encode" => Self::Encode,
            "cmd" => Self::Cmd,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Self::Unzip => "unzip",
            Self::XlsxToCsv => "xlsx-to-csv",
            Self::CsvToJson => "csv-to-json",
            Self::Encode => "encode",
            Self::Cmd => "cmd",
            Self::Unknown(token) => token,
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::Unzip | Self::XlsxToCsv | Self::CsvToJson => Arity::Exact(0),
            Self::Encode => Arity::Exact(1),
            Self::Cmd | Self::Unknown(_) => Arity::Variadic,
        }
    }

    pub fn usage(&self) -> String {
        match self {
            Self::Encode => "usage: encode [encoding-to]".to_string(),
            Self::Cmd => "usage: cmd [script...]".to_string(),
            other => format!("usage: {}", other.token()),
        }
    }

    pub fn validate(&self, args: &[String]) -> bool {
        self.check(args).is_ok()
    }

    /// Argument check with a human-readable reason. `cmd` and unknown tokens
    /// always pass.
    fn check(&self, args: &[String]) -> std::result::Result<(), String> {
        if let Arity::Exact(expected) = self.arity() {
            if args.len() > expected {
                return Err(format!("too many arguments ({})", self.usage()));
            }
            if args.len() < expected {
                return Err(format!("argument not specified ({})", self.usage()));
            }
        }
        if *self == Self::Encode {
            args[0].parse::<TargetEncoding>()?;
        }
        Ok(())
    }
}

impl fmt::Display for PostProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// One parsed pipeline entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcess {
    pub entry: String,
    pub kind: PostProcessKind,
    pub args: Vec<String>,
}

impl PostProcess {
    /// Splits `token rest...` on whitespace.
    pub fn parse(entry: &str) -> Self {
        let mut tokens = entry.split_whitespace().map(String::from);
        let kind = PostProcessKind::from_token(tokens.next().as_deref().unwrap_or_default());
        Self {
            entry: entry.to_string(),
            kind,
            args: tokens.collect(),
        }
    }
}

#[derive(Debug)]
pub enum StepOutcome {
    Applied { step: PostProcessKind, path: PathBuf },
    Skipped { entry: String },
    CommandFailed { entry: String, error: CommandError },
}

#[derive(Debug)]
pub struct PipelineOutcome {
    /// Path produced by the last step; this is what gets digested and recorded.
    pub final_path: PathBuf,
    pub steps: Vec<StepOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    steps: Vec<PostProcess>,
}

impl Pipeline {
    /// Parses and validates every entry. Fails on the first built-in step
    /// whose arguments are invalid.
    pub fn parse(entries: &[String]) -> Result<Self> {
        let steps = entries
            .iter()
            .map(|entry| {
                let step = PostProcess::parse(entry);
                step.kind
                    .check(&step.args)
                    .map_err(|reason| DimError::PipelineValidation {
                        entry: entry.clone(),
                        reason,
                    })?;
                Ok(step)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[PostProcess] {
        &self.steps
    }

    /// Runs the steps in declared order starting from `path`.
    pub async fn run(&self, path: PathBuf, converters: &dyn Converters) -> Result<PipelineOutcome> {
        let mut current = path;
        let mut outcomes = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let outcome = match &step.kind {
                PostProcessKind::Unknown(_) => {
                    warn!("Unsupported post-process '{}', skipping", step.entry);
                    StepOutcome::Skipped {
                        entry: step.entry.clone(),
                    }
                }
                PostProcessKind::Cmd => {
                    match converters.run_shell_command(&step.args, &current).await {
                        Ok(stdout) => {
                            info!("Executed '{}' on {}", step.entry, current.display());
                            if !stdout.trim().is_empty() {
                                info!("{}", stdout.trim_end());
                            }
                            StepOutcome::Applied {
                                step: PostProcessKind::Cmd,
                                path: current.clone(),
                            }
                        }
                        Err(error) => {
                            warn!("Failed to execute '{}': {}", step.entry, error);
                            StepOutcome::CommandFailed {
                                entry: step.entry.clone(),
                                error,
                            }
                        }
                    }
                }
                builtin => {
                    current = run_builtin(builtin, &step.args, &current, converters)
                        .await
                        .map_err(|source| DimError::PostProcess {
                            step: step.entry.clone(),
                            source,
                        })?;
                    StepOutcome::Applied {
                        step: builtin.clone(),
                        path: current.clone(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(PipelineOutcome {
            final_path: current,
            steps: outcomes,
        })
    }
}

async fn run_builtin(
    kind: &PostProcessKind,
    args: &[String],
    path: &Path,
    converters: &dyn Converters,
) -> anyhow::Result<PathBuf> {
    match kind {
        PostProcessKind::Unzip => {
            let dest = path.parent().unwrap_or_else(|| Path::new("."));
            converters.extract_archive(path, dest).await?;
            info!("Unzipped {} to {}", path.display(), dest.display());
            Ok(path.to_path_buf())
        }
        PostProcessKind::XlsxToCsv => converters.spreadsheet_to_csv(path).await,
        PostProcessKind::CsvToJson => converters.csv_to_json(path).await,
        PostProcessKind::Encode => {
            let target = args
                .first()
                .ok_or_else(|| anyhow::anyhow!("missing target encoding"))?
                .parse::<TargetEncoding>()
                .map_err(anyhow::Error::msg)?;
            converters.convert_encoding(path, target).await?;
            Ok(path.to_path_buf())
        }
        PostProcessKind::Cmd | PostProcessKind::Unknown(_) => Ok(path.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingConverters;

    fn entries(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_entry() {
        let step = PostProcess::parse("cmd  python3 clean.py ");
        assert_eq!(step.kind, PostProcessKind::Cmd);
        assert_eq!(step.args, vec!["python3", "clean.py"]);

        let step = PostProcess::parse("");
        assert_eq!(step.kind, PostProcessKind::Unknown(String::new()));
    }

    #[test]
    fn test_token_roundtrip() {
        for kind in PostProcessKind::BUILTIN {
            assert_eq!(PostProcessKind::from_token(kind.token()), kind);
        }
    }

    #[test]
    fn test_validate_arity() {
        let args = |list: &[&str]| entries(list);
        assert!(PostProcessKind::Unzip.validate(&[]));
        assert!(!PostProcessKind::Unzip.validate(&args(&["extra-arg"])));
        assert!(!PostProcessKind::XlsxToCsv.validate(&args(&["x"])));
        assert!(!PostProcessKind::Encode.validate(&[]));
        assert!(!PostProcessKind::Encode.validate(&args(&["utf-8", "sjis"])));
        assert!(!PostProcessKind::Encode.validate(&args(&["klingon"])));
        assert!(PostProcessKind::Encode.validate(&args(&["utf-8"])));
        assert!(PostProcessKind::Cmd.validate(&[]));
        assert!(PostProcessKind::Cmd.validate(&args(&["a", "b", "c"])));
    }

    #[test]
    fn test_builtin_validation_failure_is_fatal() {
        let err = Pipeline::parse(&entries(&["csv-to-json", "unzip extra-arg"])).unwrap_err();
        assert!(
            matches!(err, DimError::PipelineValidation { ref entry, .. } if entry == "unzip extra-arg")
        );
    }

    #[test]
    fn test_unknown_and_cmd_never_fail_validation() {
        let pipeline = Pipeline::parse(&entries(&["frobnicate 1 2", "cmd", "cmd doesnotexist"])).unwrap();
        assert_eq!(pipeline.steps().len(), 3);
    }

    #[tokio::test]
    async fn test_steps_chain_paths_in_order() {
        let temp = tempfile::TempDir::new().unwrap();
        let start = temp.path().join("table.xlsx");
        std::fs::write(&start, b"xlsx").unwrap();

        let converters = RecordingConverters::default();
        let pipeline = Pipeline::parse(&entries(&["xlsx-to-csv", "csv-to-json"])).unwrap();
        let outcome = pipeline.run(start.clone(), &converters).await.unwrap();

        let csv = temp.path().join("table.csv");
        let json = temp.path().join("table.json");
        assert_eq!(
            converters.calls(),
            vec![
                format!("xlsx-to-csv {}", start.display()),
                format!("csv-to-json {}", csv.display()),
            ]
        );
        assert_eq!(outcome.final_path, json);
    }

    #[tokio::test]
    async fn test_unzip_extracts_into_parent_and_keeps_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let archive = temp.path().join("bundle.zip");

        let converters = RecordingConverters::default();
        let pipeline = Pipeline::parse(&entries(&["unzip"])).unwrap();
        let outcome = pipeline.run(archive.clone(), &converters).await.unwrap();

        assert_eq!(
            converters.calls(),
            vec![format!("unzip {} -> {}", archive.display(), temp.path().display())]
        );
        assert_eq!(outcome.final_path, archive);
    }

    #[tokio::test]
    async fn test_cmd_failure_is_swallowed() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("data.csv");

        let converters = RecordingConverters::default();
        let pipeline =
            Pipeline::parse(&entries(&["cmd doesnotexist", "encode sjis", "mystery"])).unwrap();
        let outcome = pipeline.run(path.clone(), &converters).await.unwrap();

        assert_eq!(outcome.final_path, path);
        assert!(matches!(
            outcome.steps[0],
            StepOutcome::CommandFailed { error: CommandError::NotFound(_), .. }
        ));
        assert!(matches!(
            outcome.steps[1],
            StepOutcome::Applied { step: PostProcessKind::Encode, .. }
        ));
        assert!(matches!(outcome.steps[2], StepOutcome::Skipped { .. }));
        assert_eq!(
            converters.calls(),
            vec![
                format!("cmd doesnotexist {}", path.display()),
                format!("encode Shift_JIS {}", path.display()),
            ]
        );
    }

    #[tokio::test]
    async fn test_builtin_runtime_failure_is_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("data.csv");

        let converters = RecordingConverters::failing("csv-to-json");
        let pipeline = Pipeline::parse(&entries(&["csv-to-json", "cmd echo"])).unwrap();
        let err = pipeline.run(path, &converters).await.unwrap_err();

        assert!(matches!(err, DimError::PostProcess { ref step, .. } if step == "csv-to-json"));
        assert_eq!(converters.calls().len(), 1);
    }
}
