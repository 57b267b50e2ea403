use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use super::{
    missing_pages, plan_batches, scan_extracted_pages, CancelFlag, ExtractionReport,
    ExtractionRequest, ImageExtractor, PageBatch,
};
use crate::config::ExtractorConfig;
use crate::error::{PagesortError, ProcessError, StorageError};
use crate::pipeline::progress::{ExtractionProgress, ProgressEvent, ProgressReporter};
use crate::sanitize::redact_path;
use crate::storage::count_pages;
use crate::storage::filesystem::{copy_file, ensure_directory};

enum BatchOutcome {
    Rendered,
    Cancelled,
}

/// Renders pages with the ImageMagick command line tool.
pub struct MagickExtractor {
    config: ExtractorConfig,
}

impl MagickExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Arguments rendering `batch` of `clone` into `images_directory`.
    ///
    /// ImageMagick indexes pages from zero; `-scene` makes the output index
    /// equal the zero-based page, so page `p` lands in `index-<p-1>.webp`.
    pub fn build_args(&self, clone: &Path, images_directory: &Path, batch: PageBatch) -> Vec<String> {
        let first = batch.first - 1;
        let last = batch.last - 1;
        let page_spec = if first == last {
            format!("{}", first)
        } else {
            format!("{}-{}", first, last)
        };

        vec![
            "-density".to_string(),
            self.config.density.to_string(),
            format!("{}[{}]", clone.display(), page_spec),
            "-resize".to_string(),
            self.config.resize.clone(),
            "-scene".to_string(),
            first.to_string(),
            images_directory
                .join("index-%d.webp")
                .display()
                .to_string(),
        ]
    }

    async fn run_once(&self, args: &[String]) -> Result<(), ProcessError> {
        let mut cmd = TokioCommand::new(&self.config.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let limit = Duration::from_secs(self.config.timeout_secs);
        let output = match tokio::time::timeout(limit, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProcessError::ExtractionFailed {
                    code: None,
                    stderr: format!("failed to start '{}': {}", self.config.binary, e),
                })
            }
            Err(_) => {
                return Err(ProcessError::ExtractionFailed {
                    code: None,
                    stderr: format!("timed out after {}s", self.config.timeout_secs),
                })
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(ProcessError::ExtractionFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn run_batch(
        &self,
        request: &ExtractionRequest,
        batch: PageBatch,
        cancel: &CancelFlag,
    ) -> Result<BatchOutcome, ProcessError> {
        let args = self.build_args(
            &request.document_clone_path,
            &request.images_directory,
            batch,
        );
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                debug!(first = batch.first, last = batch.last, "Batch cancelled");
                return Ok(BatchOutcome::Cancelled);
            }
            match self.run_once(&args).await {
                Ok(()) => return Ok(BatchOutcome::Rendered),
                Err(e) => {
                    warn!(
                        first = batch.first,
                        last = batch.last,
                        attempt,
                        attempts,
                        error = %e,
                        "Batch extraction attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ProcessError::ExtractionFailed {
            code: None,
            stderr: "no attempt was made".to_string(),
        }))
    }
}

/// `index-<p-1>.webp` -> `<p>.webp` for every page of the batch.
async fn rename_outputs(images_directory: &Path, batch: PageBatch) -> Result<(), StorageError> {
    for page in batch.pages() {
        let from = images_directory.join(format!("index-{}.webp", page - 1));
        let to = images_directory.join(format!("{}.webp", page));
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| StorageError::MoveFile {
                from: from.clone(),
                to: to.clone(),
                source: e,
            })?;
    }
    Ok(())
}

fn estimate_remaining(started: Instant, processed: u32, remaining: u32) -> u64 {
    if processed == 0 {
        return 0;
    }
    let per_page = started.elapsed().as_secs_f64() / processed as f64;
    (per_page * remaining as f64).round() as u64
}

fn page_list(pages: &[u32]) -> String {
    pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl ImageExtractor for MagickExtractor {
    async fn extract(
        &self,
        request: &ExtractionRequest,
        progress: &dyn ProgressReporter,
        cancel: &CancelFlag,
    ) -> Result<ExtractionReport, PagesortError> {
        let images = &request.images_directory;
        ensure_directory(images).await?;
        if request.document_path != request.document_clone_path {
            copy_file(&request.document_path, &request.document_clone_path).await?;
        }

        let clone = request.document_clone_path.clone();
        let total_pages = tokio::task::spawn_blocking(move || count_pages(&clone))
            .await
            .map_err(|e| StorageError::ReadPdf {
                path: request.document_clone_path.clone(),
                reason: e.to_string(),
            })??;

        let mut extracted = scan_extracted_pages(images).await?;
        extracted.retain(|page| *page <= total_pages);
        let missing = missing_pages(total_pages, &extracted);

        let mut state = ExtractionProgress {
            pages_processed: 0,
            pages_to_process: missing.len() as u32,
            total_document_pages: total_pages,
            estimated_seconds_remaining: 0,
            extracted_page_numbers: extracted.iter().copied().collect(),
        };
        progress.report(ProgressEvent::Extraction(state.clone()));

        if missing.is_empty() {
            info!(
                document = %redact_path(&request.document_clone_path),
                total_pages,
                "All page images already extracted"
            );
            return Ok(ExtractionReport {
                total_pages,
                newly_extracted: Vec::new(),
                extracted_pages: state.extracted_page_numbers,
                cancelled: false,
            });
        }

        let batch_size = self.config.effective_batch_size();
        let batches = plan_batches(&missing, batch_size);
        debug!(
            missing = missing.len(),
            batches = batches.len(),
            batch_size,
            "Extracting missing pages"
        );

        let started = Instant::now();
        let mut newly_extracted = Vec::new();
        let mut failed_pages = Vec::new();
        let mut last_error = None;
        let mut cancelled = false;

        for batch in batches {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            match self.run_batch(request, batch, cancel).await {
                Ok(BatchOutcome::Rendered) => {
                    rename_outputs(images, batch).await?;
                    newly_extracted.extend(batch.pages());
                    extracted.extend(batch.pages());

                    state.pages_processed = newly_extracted.len() as u32;
                    state.estimated_seconds_remaining = estimate_remaining(
                        started,
                        state.pages_processed,
                        state.pages_to_process - state.pages_processed,
                    );
                    state.extracted_page_numbers = extracted.iter().copied().collect();
                    progress.report(ProgressEvent::Extraction(state.clone()));
                }
                Ok(BatchOutcome::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    failed_pages.extend(batch.pages());
                    last_error = Some(e);
                }
            }
        }

        if cancelled {
            info!(
                extracted = newly_extracted.len(),
                missing = missing.len(),
                "Image extraction cancelled"
            );
        } else if !failed_pages.is_empty() {
            let (code, stderr) = match last_error {
                Some(ProcessError::ExtractionFailed { code, stderr }) => (code, stderr),
                Some(other) => (None, other.to_string()),
                None => (None, String::new()),
            };
            return Err(ProcessError::ExtractionFailed {
                code,
                stderr: format!(
                    "failed to extract pages [{}]: {}",
                    page_list(&failed_pages),
                    stderr
                ),
            }
            .into());
        } else {
            info!(
                extracted = newly_extracted.len(),
                total_pages,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Image extraction finished"
            );
        }

        Ok(ExtractionReport {
            total_pages,
            newly_extracted,
            extracted_pages: extracted.into_iter().collect(),
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::progress::NoopProgress;
    use crate::storage::split::test_support::write_pdf;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Recorder(Mutex<Vec<ExtractionProgress>>);

    impl ProgressReporter for Recorder {
        fn report(&self, event: ProgressEvent) {
            if let ProgressEvent::Extraction(state) = event {
                self.0.lock().unwrap().push(state);
            }
        }
    }

    fn config(binary: &str) -> ExtractorConfig {
        ExtractorConfig {
            binary: binary.to_string(),
            batch_size: Some(2),
            max_retries: 2,
            timeout_secs: 10,
            ..ExtractorConfig::default()
        }
    }

    fn request(dir: &Path, pages: u32) -> ExtractionRequest {
        let source = dir.join("scan.pdf");
        write_pdf(&source, pages);
        let data = dir.join("scan-data");
        std::fs::create_dir_all(&data).unwrap();
        ExtractionRequest {
            document_path: source,
            document_clone_path: data.join("scan.pdf"),
            images_directory: data.join("images"),
        }
    }

    /// Stand-in for `magick` that touches every requested output file.
    #[cfg(unix)]
    fn fake_magick(dir: &Path) -> PathBuf {
        let script = r#"#!/bin/sh
spec="$3"
range="${spec##*\[}"
range="${range%]}"
first="${range%-*}"
last="${range#*-}"
out="$8"
i=$first
while [ "$i" -le "$last" ]; do
  : > "$(printf "$out" "$i")"
  i=$((i + 1))
done
"#;
        write_script(dir, "magick", script)
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    // ── Arguments ──

    #[test]
    fn test_build_args_range() {
        let extractor = MagickExtractor::new(ExtractorConfig::default());
        let args = extractor.build_args(
            Path::new("/d/scan-data/scan.pdf"),
            Path::new("/d/scan-data/images"),
            PageBatch { first: 3, last: 7 },
        );
        assert_eq!(
            args,
            vec![
                "-density",
                "150",
                "/d/scan-data/scan.pdf[2-6]",
                "-resize",
                "1500x1500",
                "-scene",
                "2",
                "/d/scan-data/images/index-%d.webp",
            ]
        );
    }

    #[test]
    fn test_build_args_single_page() {
        let extractor = MagickExtractor::new(ExtractorConfig::default());
        let args = extractor.build_args(
            Path::new("/d/scan.pdf"),
            Path::new("/d/images"),
            PageBatch { first: 1, last: 1 },
        );
        assert_eq!(args[2], "/d/scan.pdf[0]");
        assert_eq!(args[6], "0");
    }

    #[test]
    fn test_estimate_remaining() {
        assert_eq!(estimate_remaining(Instant::now(), 0, 10), 0);
    }

    // ── Extraction ──

    #[tokio::test]
    async fn test_missing_binary_is_extraction_failure() {
        let temp_dir = TempDir::new().unwrap();
        let request = request(temp_dir.path(), 2);
        let extractor = MagickExtractor::new(config("/nonexistent/magick-binary"));

        let err = extractor
            .extract(&request, &NoopProgress, &CancelFlag::new())
            .await
            .unwrap_err();

        match err {
            PagesortError::Process(ProcessError::ExtractionFailed { code, stderr }) => {
                assert_eq!(code, None);
                assert!(stderr.contains("failed to extract pages [1, 2]"), "{stderr}");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(request.document_clone_path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_magick_reports_exit_code_and_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let request = request(temp_dir.path(), 1);
        let binary = write_script(
            temp_dir.path(),
            "magick",
            "#!/bin/sh\necho 'no decode delegate for this image format' >&2\nexit 1\n",
        );
        let extractor = MagickExtractor::new(config(binary.to_str().unwrap()));

        let err = extractor
            .extract(&request, &NoopProgress, &CancelFlag::new())
            .await
            .unwrap_err();

        match err {
            PagesortError::Process(ProcessError::ExtractionFailed { code, stderr }) => {
                assert_eq!(code, Some(1));
                assert!(stderr.contains("no decode delegate"), "{stderr}");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_extracts_and_renames_all_pages() {
        let temp_dir = TempDir::new().unwrap();
        let request = request(temp_dir.path(), 5);
        let binary = fake_magick(temp_dir.path());
        let extractor = MagickExtractor::new(config(binary.to_str().unwrap()));
        let recorder = Recorder(Mutex::new(Vec::new()));

        let report = extractor
            .extract(&request, &recorder, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.total_pages, 5);
        assert_eq!(report.newly_extracted, vec![1, 2, 3, 4, 5]);
        assert!(report.is_complete());
        for page in 1..=5 {
            assert!(request.images_directory.join(format!("{page}.webp")).exists());
        }
        assert!(!request.images_directory.join("index-0.webp").exists());

        let states = recorder.0.lock().unwrap();
        // Initial snapshot plus one per batch of two pages
        assert_eq!(states.len(), 4);
        assert_eq!(states.last().unwrap().pages_processed, 5);
        assert_eq!(states.last().unwrap().extracted_page_numbers, vec![1, 2, 3, 4, 5]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_only_missing_pages_are_extracted() {
        let temp_dir = TempDir::new().unwrap();
        let request = request(temp_dir.path(), 4);
        std::fs::create_dir_all(&request.images_directory).unwrap();
        std::fs::write(request.images_directory.join("1.webp"), b"x").unwrap();
        std::fs::write(request.images_directory.join("3.webp"), b"x").unwrap();
        let binary = fake_magick(temp_dir.path());
        let extractor = MagickExtractor::new(config(binary.to_str().unwrap()));

        let report = extractor
            .extract(&request, &NoopProgress, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.newly_extracted, vec![2, 4]);
        assert_eq!(report.extracted_pages, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_already_extracted_returns_early() {
        let temp_dir = TempDir::new().unwrap();
        let request = request(temp_dir.path(), 2);
        std::fs::create_dir_all(&request.images_directory).unwrap();
        std::fs::write(request.images_directory.join("1.webp"), b"x").unwrap();
        std::fs::write(request.images_directory.join("2.webp"), b"x").unwrap();
        // Never invoked
        let extractor = MagickExtractor::new(config("/nonexistent/magick-binary"));

        let report = extractor
            .extract(&request, &NoopProgress, &CancelFlag::new())
            .await
            .unwrap();

        assert!(report.newly_extracted.is_empty());
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_extracts_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let request = request(temp_dir.path(), 3);
        let extractor = MagickExtractor::new(config("/nonexistent/magick-binary"));
        let cancel = CancelFlag::new();
        cancel.cancel();

        let report = extractor
            .extract(&request, &NoopProgress, &cancel)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert!(report.newly_extracted.is_empty());
        assert!(!report.is_complete());
    }
}
