//! OCR stage: try to add a text layer, and decide which bytes to extract from.
//!
//! OCR is best-effort. Many incoming PDFs already carry a text layer, and the
//! engine gives up on encrypted or malformed files. Neither case may cost the
//! caller its Markdown, so [`attempt_ocr`] never returns an error. It returns
//! an [`OcrOutcome`] instead:
//!
//! ```text
//!                 ┌── engine ok ─────────────▶ Succeeded(ocr bytes)
//! AttemptOcr ─────┼── prior OCR found ───────▶ SkippedAlreadyOcred(original)
//!                 └── anything else ─────────▶ Failed { original, reason }
//! ```
//!
//! The engine needs real files, so each run gets an [`OcrWorkspace`]: a
//! private temp directory removed when the workspace is dropped, whichever
//! way the request ends.

use crate::config::OcrSettings;
use crate::error::OcrError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// `ocrmypdf` exit code for `PriorOcrFoundError`.
pub const EXIT_ALREADY_DONE_OCR: i32 = 6;

/// Result of the OCR attempt for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrOutcome {
    /// The engine produced a searchable document.
    Succeeded(Vec<u8>),
    /// The document already had text; the original bytes are used.
    SkippedAlreadyOcred(Vec<u8>),
    /// The engine failed; the original bytes are used.
    Failed { original: Vec<u8>, reason: String },
}

/// Variant tag of an [`OcrOutcome`], without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrOutcomeKind {
    Succeeded,
    SkippedAlreadyOcred,
    Failed,
}

impl OcrOutcome {
    pub fn kind(&self) -> OcrOutcomeKind {
        match self {
            OcrOutcome::Succeeded(_) => OcrOutcomeKind::Succeeded,
            OcrOutcome::SkippedAlreadyOcred(_) => OcrOutcomeKind::SkippedAlreadyOcred,
            OcrOutcome::Failed { .. } => OcrOutcomeKind::Failed,
        }
    }

    /// The document handed to text extraction.
    pub fn document(&self) -> &[u8] {
        match self {
            OcrOutcome::Succeeded(bytes) | OcrOutcome::SkippedAlreadyOcred(bytes) => bytes,
            OcrOutcome::Failed { original, .. } => original,
        }
    }

    pub fn into_document(self) -> Vec<u8> {
        match self {
            OcrOutcome::Succeeded(bytes) | OcrOutcome::SkippedAlreadyOcred(bytes) => bytes,
            OcrOutcome::Failed { original, .. } => original,
        }
    }
}

/// Options for a single engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrOptions {
    pub languages: Vec<String>,
    pub deskew: bool,
    pub clean: bool,
    pub jobs: Option<usize>,
    pub timeout: Option<Duration>,
}

impl From<&OcrSettings> for OcrOptions {
    fn from(s: &OcrSettings) -> Self {
        Self {
            languages: s.languages.clone(),
            deskew: s.deskew,
            clean: s.clean,
            jobs: s.jobs,
            timeout: s.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// An OCR engine working on files.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// OCR `input` into `output`.
    ///
    /// Must return [`OcrError::PriorOcrFound`] when the engine refuses because
    /// the input already has text, and [`OcrError::Failed`] for everything else.
    async fn run(&self, input: &Path, output: &Path, options: &OcrOptions) -> Result<(), OcrError>;
}

// ── Workspace ────────────────────────────────────────────────────────────

/// Per-request scratch directory holding the engine's input and output files.
///
/// Dropping the workspace deletes both files and the directory. Deletion
/// errors are logged and swallowed.
#[derive(Debug)]
pub struct OcrWorkspace {
    dir: Option<TempDir>,
    input: PathBuf,
    output: PathBuf,
}

impl OcrWorkspace {
    /// Create a workspace under `root` (system temp dir when `None`) and write
    /// `doc` as its input file.
    pub fn create(root: Option<&Path>, doc: &[u8]) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("paperjet-ocr-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        let input = dir.path().join("input.pdf");
        let output = dir.path().join("output.pdf");
        let workspace = Self {
            dir: Some(dir),
            input,
            output,
        };
        std::fs::write(&workspace.input, doc)?;
        Ok(workspace)
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }
}

impl Drop for OcrWorkspace {
    fn drop(&mut self) {
        for file in [&self.input, &self.output] {
            match std::fs::remove_file(file) {
                Ok(()) => debug!("Removed {}", file.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove temp file {}: {}", file.display(), e),
            }
        }
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Failed to remove temp dir {}: {}", path.display(), e);
            }
        }
    }
}

// ── Policy ───────────────────────────────────────────────────────────────

/// Run the engine inside `workspace` and classify the result.
///
/// Never fails: every engine error becomes a variant that carries the
/// original bytes.
pub async fn attempt_ocr(
    engine: &dyn OcrEngine,
    workspace: &OcrWorkspace,
    original: Vec<u8>,
    options: &OcrOptions,
) -> OcrOutcome {
    let start = Instant::now();
    let result = engine
        .run(workspace.input(), workspace.output(), options)
        .await;

    let outcome = match result {
        Ok(()) => match tokio::fs::read(workspace.output()).await {
            Ok(bytes) if !bytes.is_empty() => OcrOutcome::Succeeded(bytes),
            Ok(_) => OcrOutcome::Failed {
                original,
                reason: "engine produced an empty output file".to_string(),
            },
            Err(e) => OcrOutcome::Failed {
                original,
                reason: format!("cannot read engine output: {e}"),
            },
        },
        Err(OcrError::PriorOcrFound) => OcrOutcome::SkippedAlreadyOcred(original),
        Err(OcrError::Failed(reason)) => OcrOutcome::Failed { original, reason },
    };

    let elapsed_ms = start.elapsed().as_millis();
    match &outcome {
        OcrOutcome::Succeeded(bytes) => {
            info!("{}: OCR succeeded in {}ms ({} bytes)", engine.name(), elapsed_ms, bytes.len())
        }
        OcrOutcome::SkippedAlreadyOcred(_) => {
            info!("{}: document already has text, OCR skipped", engine.name())
        }
        OcrOutcome::Failed { reason, .. } => warn!(
            "{}: OCR failed after {}ms, using original document: {}",
            engine.name(),
            elapsed_ms,
            reason
        ),
    }
    outcome
}

/// Create a workspace and run [`attempt_ocr`] in it.
///
/// A workspace that cannot be created or written is an OCR failure like any
/// other. The workspace is returned so the caller controls when it is removed.
pub async fn run_ocr_stage(
    engine: &dyn OcrEngine,
    temp_root: Option<&Path>,
    doc: Vec<u8>,
    options: &OcrOptions,
) -> (OcrOutcome, Option<OcrWorkspace>) {
    match OcrWorkspace::create(temp_root, &doc) {
        Ok(workspace) => {
            let outcome = attempt_ocr(engine, &workspace, doc, options).await;
            (outcome, Some(workspace))
        }
        Err(e) => {
            warn!("Cannot prepare OCR workspace, using original document: {}", e);
            let outcome = OcrOutcome::Failed {
                original: doc,
                reason: format!("workspace: {e}"),
            };
            (outcome, None)
        }
    }
}

// ── ocrmypdf ─────────────────────────────────────────────────────────────

/// [`OcrEngine`] backed by the `ocrmypdf` command-line tool.
#[derive(Debug, Clone)]
pub struct OcrMyPdf {
    binary: PathBuf,
}

impl OcrMyPdf {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Argument list for one run, excluding the binary.
    pub fn args(input: &Path, output: &Path, options: &OcrOptions) -> Vec<String> {
        let mut args = vec!["-l".to_string(), options.languages.join("+")];
        if options.deskew {
            args.push("--deskew".to_string());
        }
        if options.clean {
            args.push("--clean".to_string());
        }
        if let Some(jobs) = options.jobs {
            args.push("--jobs".to_string());
            args.push(jobs.to_string());
        }
        args.push(input.to_string_lossy().into_owned());
        args.push(output.to_string_lossy().into_owned());
        args
    }
}

impl Default for OcrMyPdf {
    fn default() -> Self {
        Self::new("ocrmypdf")
    }
}

/// Map an engine exit to the OCR error taxonomy.
pub fn classify_exit(code: Option<i32>, stderr: &str) -> Result<(), OcrError> {
    match code {
        Some(0) => Ok(()),
        Some(EXIT_ALREADY_DONE_OCR) => Err(OcrError::PriorOcrFound),
        _ if stderr.contains("page already has text") || stderr.contains("PriorOcrFoundError") => {
            Err(OcrError::PriorOcrFound)
        }
        Some(code) => Err(OcrError::Failed(format!(
            "exit code {}: {}",
            code,
            last_line(stderr)
        ))),
        None => Err(OcrError::Failed("terminated by signal".to_string())),
    }
}

fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no diagnostic output")
}

#[async_trait]
impl OcrEngine for OcrMyPdf {
    fn name(&self) -> &str {
        "ocrmypdf"
    }

    async fn run(&self, input: &Path, output: &Path, options: &OcrOptions) -> Result<(), OcrError> {
        let args = Self::args(input, output, options);
        debug!("Executing: {} {}", self.binary.display(), args.join(" "));

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OcrError::Failed(format!("cannot start {}: {e}", self.binary.display())))?;

        let waited = child.wait_with_output();
        let result = match options.timeout {
            Some(limit) => tokio::time::timeout(limit, waited)
                .await
                .map_err(|_| OcrError::Failed(format!("timed out after {}s", limit.as_secs())))?,
            None => waited.await,
        };
        let out = result.map_err(|e| OcrError::Failed(format!("wait failed: {e}")))?;

        let stderr = String::from_utf8_lossy(&out.stderr);
        classify_exit(out.status.code(), &stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Engine scripted with a fixed result; records the options it saw.
    struct Scripted {
        result: Result<Option<Vec<u8>>, OcrError>,
        seen: Mutex<Option<OcrOptions>>,
    }

    impl Scripted {
        fn new(result: Result<Option<Vec<u8>>, OcrError>) -> Self {
            Self {
                result,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl OcrEngine for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn run(&self, input: &Path, output: &Path, options: &OcrOptions) -> Result<(), OcrError> {
            assert!(input.exists(), "input must be written before the engine runs");
            *self.seen.lock().unwrap() = Some(options.clone());
            match &self.result {
                Ok(Some(bytes)) => {
                    std::fs::write(output, bytes).unwrap();
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(e) => Err(e.clone()),
            }
        }
    }

    fn options() -> OcrOptions {
        OcrOptions::from(&OcrSettings::default())
    }

    #[tokio::test]
    async fn success_uses_engine_output() {
        let engine = Scripted::new(Ok(Some(b"%PDF-ocr".to_vec())));
        let (outcome, ws) = run_ocr_stage(&engine, None, b"%PDF-orig".to_vec(), &options()).await;
        assert_eq!(outcome, OcrOutcome::Succeeded(b"%PDF-ocr".to_vec()));
        assert!(ws.is_some());

        let seen = engine.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.languages, vec!["eng", "nld"]);
        assert!(seen.deskew && seen.clean);
    }

    #[tokio::test]
    async fn prior_ocr_uses_original_bytes() {
        let engine = Scripted::new(Err(OcrError::PriorOcrFound));
        let (outcome, _ws) = run_ocr_stage(&engine, None, b"%PDF-orig".to_vec(), &options()).await;
        assert_eq!(outcome.kind(), OcrOutcomeKind::SkippedAlreadyOcred);
        assert_eq!(outcome.into_document(), b"%PDF-orig");
    }

    #[tokio::test]
    async fn engine_failure_falls_back_to_original() {
        let engine = Scripted::new(Err(OcrError::Failed("exit code 8: encrypted".into())));
        let (outcome, _ws) = run_ocr_stage(&engine, None, b"%PDF-orig".to_vec(), &options()).await;
        match &outcome {
            OcrOutcome::Failed { original, reason } => {
                assert_eq!(original, b"%PDF-orig");
                assert!(reason.contains("encrypted"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(outcome.document(), b"%PDF-orig");
    }

    #[tokio::test]
    async fn missing_output_is_a_failure() {
        let engine = Scripted::new(Ok(None));
        let (outcome, _ws) = run_ocr_stage(&engine, None, b"%PDF-orig".to_vec(), &options()).await;
        assert_eq!(outcome.kind(), OcrOutcomeKind::Failed);
        assert_eq!(outcome.document(), b"%PDF-orig");
    }

    #[tokio::test]
    async fn unusable_temp_root_is_a_failure() {
        let engine = Scripted::new(Ok(Some(b"never".to_vec())));
        let missing = Path::new("/definitely/not/a/real/dir");
        let (outcome, ws) = run_ocr_stage(&engine, Some(missing), b"%PDF-orig".to_vec(), &options()).await;
        assert!(ws.is_none());
        assert_eq!(outcome.kind(), OcrOutcomeKind::Failed);
        assert!(engine.seen.lock().unwrap().is_none(), "engine must not run");
    }

    #[test]
    fn workspace_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let ws = OcrWorkspace::create(Some(root.path()), b"%PDF").unwrap();
        let dir = ws.path().unwrap().to_path_buf();
        std::fs::write(ws.output(), b"out").unwrap();
        assert!(ws.input().exists() && ws.output().exists());

        drop(ws);
        assert!(!dir.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn workspace_is_removed_on_panic() {
        let root = tempfile::tempdir().unwrap();
        let root_path = root.path().to_path_buf();
        let result = std::panic::catch_unwind(move || {
            let _ws = OcrWorkspace::create(Some(&root_path), b"%PDF").unwrap();
            panic!("extraction exploded");
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn classify_exit_codes() {
        assert_eq!(classify_exit(Some(0), ""), Ok(()));
        assert_eq!(classify_exit(Some(6), ""), Err(OcrError::PriorOcrFound));
        assert_eq!(
            classify_exit(Some(15), "ERROR - page already has text! - aborting"),
            Err(OcrError::PriorOcrFound)
        );
        assert_eq!(
            classify_exit(Some(8), "warn\nEncryptedPdfError: input file is encrypted\n\n"),
            Err(OcrError::Failed(
                "exit code 8: EncryptedPdfError: input file is encrypted".into()
            ))
        );
        assert!(matches!(classify_exit(None, ""), Err(OcrError::Failed(_))));
    }

    #[test]
    fn ocrmypdf_args() {
        let mut opts = options();
        opts.jobs = Some(2);
        let args = OcrMyPdf::args(Path::new("/w/in.pdf"), Path::new("/w/out.pdf"), &opts);
        assert_eq!(
            args,
            vec!["-l", "eng+nld", "--deskew", "--clean", "--jobs", "2", "/w/in.pdf", "/w/out.pdf"]
        );

        opts.deskew = false;
        opts.clean = false;
        opts.jobs = None;
        let args = OcrMyPdf::args(Path::new("a"), Path::new("b"), &opts);
        assert_eq!(args, vec!["-l", "eng+nld", "a", "b"]);
    }

    #[tokio::test]
    async fn missing_binary_is_a_failure() {
        let engine = OcrMyPdf::new("/definitely/not/ocrmypdf");
        let (outcome, _ws) = run_ocr_stage(&engine, None, b"%PDF".to_vec(), &options()).await;
        match outcome {
            OcrOutcome::Failed { reason, .. } => assert!(reason.contains("cannot start")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_engine_times_out_and_falls_back() {
        use std::os::unix::fs::PermissionsExt;

        let bin = tempfile::tempdir().unwrap();
        let script = bin.path().join("ocrmypdf");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let root = tempfile::tempdir().unwrap();
        let mut opts = options();
        opts.timeout = Some(Duration::from_secs(1));

        let started = Instant::now();
        let (outcome, ws) = run_ocr_stage(
            &OcrMyPdf::new(&script),
            Some(root.path()),
            b"%PDF-orig".to_vec(),
            &opts,
        )
        .await;
        assert!(started.elapsed() < Duration::from_secs(10));

        match &outcome {
            OcrOutcome::Failed { original, reason } => {
                assert_eq!(original, b"%PDF-orig");
                assert!(reason.contains("timed out after 1s"), "reason: {reason}");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        drop(ws);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
