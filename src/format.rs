use poem_openapi::Enum;
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

/// Where output lands when the caller does not pick a path
const DEFAULT_OUTPUT_STEM: &str = "output_resume";

/// Document formats we know how to convert between
#[derive(Clone, Copy, Debug, Enum, Eq, Hash, PartialEq)]
#[oai(rename_all = "lowercase")]
pub enum DocFormat {
    Docx,
    Pdf,
}

/// Problems working out what to convert from and to
#[derive(Debug, Error, PartialEq)]
pub enum FormatError {
    #[error("Only .docx and .pdf files are supported, got `{0}`")]
    Unsupported(String),

    #[error("Input and output types are the same ({0}); choose the opposite format.")]
    SameFormat(DocFormat),
}

impl DocFormat {
    /// File extension, without the dot
    pub fn extension(self) -> &'static str {
        match self {
            DocFormat::Docx => "docx",
            DocFormat::Pdf => "pdf",
        }
    }

    /// MIME type used when handing the file back over HTTP
    pub fn mime_type(self) -> &'static str {
        match self {
            DocFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocFormat::Pdf => "application/pdf",
        }
    }

    /// The format a file is converted into when nobody asks for anything specific
    pub fn opposite(self) -> DocFormat {
        match self {
            DocFormat::Docx => DocFormat::Pdf,
            DocFormat::Pdf => DocFormat::Docx,
        }
    }

    /// Detect the format from a path's extension
    pub fn from_path(path: &Path) -> Result<DocFormat, FormatError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| FormatError::Unsupported(path.display().to_string()))?;

        ext.parse()
    }
}

impl FromStr for DocFormat {
    type Err = FormatError;

    /// Accepts `pdf`, `.PDF`, `Docx`, ...
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let ext = trimmed.strip_prefix('.').unwrap_or(trimmed);

        match ext.to_ascii_lowercase().as_str() {
            "docx" => Ok(DocFormat::Docx),
            "pdf" => Ok(DocFormat::Pdf),
            _ => Err(FormatError::Unsupported(value.to_string())),
        }
    }
}

impl fmt::Display for DocFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_ascii_uppercase())
    }
}

/// Pick the target format, defaulting to the opposite of the source
pub fn resolve_target(source: DocFormat, to: Option<DocFormat>) -> Result<DocFormat, FormatError> {
    let target = to.unwrap_or_else(|| source.opposite());

    if target == source {
        return Err(FormatError::SameFormat(source));
    }

    Ok(target)
}

/// Final output path. A requested path keeps its name but always carries the target extension.
pub fn output_path(requested: Option<&Path>, target: DocFormat) -> PathBuf {
    match requested {
        Some(path) => {
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(target.extension()));

            if matches {
                path.to_path_buf()
            } else {
                path.with_extension(target.extension())
            }
        }
        None => PathBuf::from(DEFAULT_OUTPUT_STEM).with_extension(target.extension()),
    }
}
