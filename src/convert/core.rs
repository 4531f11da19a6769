use crate::{
    config::Config,
    format::{DocFormat, FormatError},
};
use poem::http::StatusCode;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{fs, process::Command, sync::Semaphore, time::timeout};
use tracing::{debug, info, warn};

/// Names LibreOffice's binary goes by, in the order we look for them
const SOFFICE_NAMES: [&str; 2] = ["soffice", "libreoffice"];

/// Everything that can go wrong turning one document into another
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Source file not found: {0}")]
    NotFound(PathBuf),

    #[error("Uploaded file name is not usable")]
    InvalidFileName,

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("Uploaded file is larger than {0} bytes")]
    TooLarge(usize),

    #[error("LibreOffice (soffice) was not found")]
    SofficeMissing,

    #[error("LibreOffice failed with exit code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("LibreOffice did not finish within {0:?}")]
    Timeout(Duration),

    #[error("LibreOffice reported success but wrote no output at {0}")]
    MissingOutput(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// HTTP status a caller should see for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ConvertError::Format(_)
            | ConvertError::InvalidFileName
            | ConvertError::EmptyUpload
            | ConvertError::NotFound(_) => StatusCode::BAD_REQUEST,
            ConvertError::SofficeMissing => StatusCode::SERVICE_UNAVAILABLE,
            ConvertError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ConvertError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ConvertError::Failed { .. } | ConvertError::MissingOutput(_) | ConvertError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ConvertError> for poem::Error {
    fn from(err: ConvertError) -> Self {
        let status = err.status();
        poem::Error::new(err, status)
    }
}

/// Drives a headless LibreOffice to do the actual conversions
#[derive(Clone, Debug)]
pub struct Converter {
    program: PathBuf,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl Converter {
    /// Converter for an explicit soffice binary
    pub fn new(program: PathBuf, timeout: Duration, max_jobs: usize) -> Converter {
        Converter {
            program,
            timeout,
            permits: Arc::new(Semaphore::new(max_jobs.max(1))),
        }
    }

    /// Find soffice, either where the config says or on the PATH
    pub fn locate(config: &Config) -> Result<Converter, ConvertError> {
        let program = match &config.soffice {
            Some(path) if path.is_file() => path.clone(),
            Some(path) => {
                warn!("Configured soffice does not exist: {}", path.display());
                return Err(ConvertError::SofficeMissing);
            }
            None => SOFFICE_NAMES
                .iter()
                .find_map(|name| which::which(name).ok())
                .ok_or(ConvertError::SofficeMissing)?,
        };

        info!("Using LibreOffice at {}", program.display());

        Ok(Converter::new(program, config.timeout, config.max_jobs))
    }

    /// soffice binary in use
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Is the soffice binary still where we found it?
    pub fn is_available(&self) -> bool {
        self.program.is_file()
    }

    /// Convert `src` into `dst`, with the target format taken from `dst`'s extension
    pub async fn convert_file(&self, src: &Path, dst: &Path) -> Result<DocFormat, ConvertError> {
        if !fs::try_exists(src).await? {
            return Err(ConvertError::NotFound(src.to_path_buf()));
        }

        // Work out the formats
        let source = DocFormat::from_path(src)?;
        let target = DocFormat::from_path(dst)?;
        if source == target {
            return Err(FormatError::SameFormat(source).into());
        }

        // LibreOffice writes into a directory, not a file
        let outdir = match dst.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&outdir).await?;

        // Wait our turn
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(std::io::Error::other)?;

        // Throwaway profile so parallel runs do not fight over the profile lock
        let profile = tempfile::Builder::new().prefix("resconv-profile").tempdir()?;

        // LibreOffice picks the output name itself, so give it a directory of its own
        let scratch = tempfile::Builder::new()
            .prefix(".resconv-out")
            .tempdir_in(&outdir)?;

        let args = soffice_args(src, source, target, scratch.path(), profile.path());
        debug!("Running {} {:?}", self.program.display(), args);

        let started = Instant::now();
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, child)
            .await
            .map_err(|_| ConvertError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("LibreOffice failed converting {}: {}", src.display(), stderr);
            return Err(ConvertError::Failed {
                code: output.status.code(),
                stderr,
            });
        }

        // LibreOffice names the output after the source stem
        let stem = src
            .file_stem()
            .ok_or_else(|| FormatError::Unsupported(src.display().to_string()))?;
        let mut produced_name = stem.to_os_string();
        produced_name.push(".");
        produced_name.push(target.extension());
        let produced = scratch.path().join(produced_name);

        if !fs::try_exists(&produced).await? {
            return Err(ConvertError::MissingOutput(produced));
        }
        fs::rename(&produced, dst).await?;

        info!(
            "Converted {} ({}) to {} ({}) in {:?}",
            src.display(),
            source,
            dst.display(),
            target,
            started.elapsed()
        );

        Ok(target)
    }
}

/// Command line for one headless conversion
fn soffice_args(
    src: &Path,
    source: DocFormat,
    target: DocFormat,
    outdir: &Path,
    profile: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        format!("-env:UserInstallation=file://{}", profile.display()).into(),
        "--headless".into(),
        "--norestore".into(),
    ];

    // PDFs open in Draw unless told to go through Writer's importer
    if source == DocFormat::Pdf {
        args.push("--infilter=writer_pdf_import".into());
    }

    args.push("--convert-to".into());
    args.push(target.extension().into());
    args.push("--outdir".into());
    args.push(outdir.as_os_str().to_os_string());
    args.push(src.as_os_str().to_os_string());

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Test the soffice command line
    #[test]
    fn test_soffice_args() {
        let args = soffice_args(
            Path::new("/in/cv.pdf"),
            DocFormat::Pdf,
            DocFormat::Docx,
            Path::new("/out"),
            Path::new("/tmp/profile"),
        );

        assert_eq!(
            args,
            vec![
                OsString::from("-env:UserInstallation=file:///tmp/profile"),
                OsString::from("--headless"),
                OsString::from("--norestore"),
                OsString::from("--infilter=writer_pdf_import"),
                OsString::from("--convert-to"),
                OsString::from("docx"),
                OsString::from("--outdir"),
                OsString::from("/out"),
                OsString::from("/in/cv.pdf"),
            ]
        );

        let args = soffice_args(
            Path::new("cv.docx"),
            DocFormat::Docx,
            DocFormat::Pdf,
            Path::new("."),
            Path::new("/tmp/profile"),
        );
        assert!(!args.contains(&OsString::from("--infilter=writer_pdf_import")));
        assert_eq!(args[4], OsString::from("pdf"));
    }

    /// Test error to status mapping
    #[test]
    fn test_error_status() {
        assert_eq!(
            ConvertError::from(FormatError::Unsupported("txt".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ConvertError::EmptyUpload.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ConvertError::TooLarge(16).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ConvertError::SofficeMissing.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ConvertError::Timeout(Duration::from_secs(1)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ConvertError::Failed {
                code: Some(1),
                stderr: String::new()
            }
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    /// Test a missing configured binary
    #[test]
    fn test_locate_missing() {
        let config = Config {
            soffice: Some(PathBuf::from("/definitely/not/here/soffice")),
            ..Config::default()
        };

        assert!(matches!(
            Converter::locate(&config),
            Err(ConvertError::SofficeMissing)
        ));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::util::test_utils::{
            failing_soffice, fake_soffice, gen_test_converter, queued_soffice, silent_soffice,
            slow_soffice,
        };
        use pretty_assertions::assert_eq;

        /// Test a configured binary is picked up
        #[test]
        fn test_locate_configured() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_soffice(dir.path());
            let config = Config {
                soffice: Some(program.clone()),
                ..Config::default()
            };

            let converter = Converter::locate(&config).unwrap();

            assert_eq!(converter.program(), program.as_path());
            assert!(converter.is_available());
        }

        /// Test DOCX to PDF, with the output renamed to the requested path
        #[tokio::test]
        async fn test_convert_file_renames_output() {
            let dir = tempfile::tempdir().unwrap();
            let converter = gen_test_converter(dir.path());

            let src = dir.path().join("resume.docx");
            std::fs::write(&src, b"docx bytes").unwrap();
            let dst = dir.path().join("nested").join("final.pdf");

            let target = converter.convert_file(&src, &dst).await.unwrap();

            assert_eq!(target, DocFormat::Pdf);
            assert_eq!(
                std::fs::read_to_string(&dst).unwrap(),
                "converted to pdf: docx bytes"
            );
            assert!(!dir.path().join("nested").join("resume.pdf").exists());
        }

        /// Test a file sharing the source stem in the destination directory is left alone
        #[tokio::test]
        async fn test_convert_file_keeps_neighbours() {
            let dir = tempfile::tempdir().unwrap();
            let converter = gen_test_converter(dir.path());

            let src = dir.path().join("cv.docx");
            std::fs::write(&src, b"docx bytes").unwrap();
            let neighbour = dir.path().join("cv.pdf");
            std::fs::write(&neighbour, b"my own pdf").unwrap();
            let dst = dir.path().join("final.pdf");

            converter.convert_file(&src, &dst).await.unwrap();

            assert_eq!(std::fs::read_to_string(&neighbour).unwrap(), "my own pdf");
            assert_eq!(
                std::fs::read_to_string(&dst).unwrap(),
                "converted to pdf: docx bytes"
            );

            // No scratch directories left behind
            let leftovers: Vec<_> = std::fs::read_dir(dir.path())
                .unwrap()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_name().to_string_lossy().starts_with(".resconv-out"))
                .collect();
            assert!(leftovers.is_empty());
        }

        /// Test conversions queue up once every job slot is taken
        #[tokio::test]
        async fn test_convert_file_one_at_a_time() {
            let dir = tempfile::tempdir().unwrap();
            let converter = Converter::new(queued_soffice(dir.path()), Duration::from_secs(30), 1);

            let first = dir.path().join("first.docx");
            let second = dir.path().join("second.docx");
            std::fs::write(&first, b"one").unwrap();
            std::fs::write(&second, b"two").unwrap();
            let first_out = dir.path().join("first.pdf");
            let second_out = dir.path().join("second.pdf");

            let started = Instant::now();
            let (a, b) = tokio::join!(
                converter.convert_file(&first, &first_out),
                converter.convert_file(&second, &second_out),
            );
            let elapsed = started.elapsed();

            a.unwrap();
            b.unwrap();
            assert!(!dir.path().join("overlap").exists());
            assert!(elapsed >= Duration::from_millis(600));
        }

        /// Test PDF to DOCX next to the source, keeping dots in the stem
        #[tokio::test]
        async fn test_convert_file_same_dir() {
            let dir = tempfile::tempdir().unwrap();
            let converter = gen_test_converter(dir.path());

            let src = dir.path().join("jane.doe.pdf");
            std::fs::write(&src, b"pdf bytes").unwrap();
            let dst = dir.path().join("jane.doe.docx");

            let target = converter.convert_file(&src, &dst).await.unwrap();

            assert_eq!(target, DocFormat::Docx);
            assert_eq!(
                std::fs::read_to_string(&dst).unwrap(),
                "converted to docx: pdf bytes"
            );
        }

        /// Test request validation happens before running anything
        #[tokio::test]
        async fn test_convert_file_rejects() {
            let dir = tempfile::tempdir().unwrap();
            let converter = gen_test_converter(dir.path());

            let missing = converter
                .convert_file(&dir.path().join("nope.docx"), &dir.path().join("nope.pdf"))
                .await;
            assert!(matches!(missing, Err(ConvertError::NotFound(_))));

            let src = dir.path().join("resume.pdf");
            std::fs::write(&src, b"pdf bytes").unwrap();

            let same = converter
                .convert_file(&src, &dir.path().join("copy.pdf"))
                .await;
            assert!(matches!(
                same,
                Err(ConvertError::Format(FormatError::SameFormat(DocFormat::Pdf)))
            ));

            let unsupported = converter
                .convert_file(&src, &dir.path().join("resume.odt"))
                .await;
            assert!(matches!(
                unsupported,
                Err(ConvertError::Format(FormatError::Unsupported(_)))
            ));
        }

        /// Test a non-zero exit from LibreOffice
        #[tokio::test]
        async fn test_convert_file_failed() {
            let dir = tempfile::tempdir().unwrap();
            let converter = Converter::new(failing_soffice(dir.path()), Duration::from_secs(30), 1);

            let src = dir.path().join("resume.docx");
            std::fs::write(&src, b"docx bytes").unwrap();

            let err = converter
                .convert_file(&src, &dir.path().join("resume.pdf"))
                .await
                .unwrap_err();

            match err {
                ConvertError::Failed { code, stderr } => {
                    assert_eq!(code, Some(3));
                    assert_eq!(stderr, "source file could not be loaded");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        /// Test LibreOffice exiting cleanly without output
        #[tokio::test]
        async fn test_convert_file_missing_output() {
            let dir = tempfile::tempdir().unwrap();
            let converter = Converter::new(silent_soffice(dir.path()), Duration::from_secs(30), 1);

            let src = dir.path().join("resume.docx");
            std::fs::write(&src, b"docx bytes").unwrap();

            let err = converter
                .convert_file(&src, &dir.path().join("resume.pdf"))
                .await
                .unwrap_err();

            assert!(matches!(err, ConvertError::MissingOutput(_)));
        }

        /// Test a hung LibreOffice gets cut off
        #[tokio::test]
        async fn test_convert_file_timeout() {
            let dir = tempfile::tempdir().unwrap();
            let converter =
                Converter::new(slow_soffice(dir.path()), Duration::from_millis(200), 1);

            let src = dir.path().join("resume.docx");
            std::fs::write(&src, b"docx bytes").unwrap();

            let err = converter
                .convert_file(&src, &dir.path().join("resume.pdf"))
                .await
                .unwrap_err();

            assert!(matches!(err, ConvertError::Timeout(_)));
        }
    }
}
