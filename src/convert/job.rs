use crate::{
    convert::core::{ConvertError, Converter},
    format::{resolve_target, DocFormat},
    util::sanitize_file_name,
};
use std::path::Path;
use tokio::{
    fs,
    io::{AsyncRead, AsyncReadExt},
};
use tracing::info;

/// Most bytes a single upload may carry
#[derive(Clone, Copy, Debug)]
pub struct UploadLimit(pub usize);

/// Read an upload into memory, giving up once it goes past the limit
pub async fn read_capped<R>(reader: R, limit: UploadLimit) -> Result<Vec<u8>, ConvertError>
where
    R: AsyncRead,
{
    let mut data = Vec::new();
    let allowed = u64::try_from(limit.0).unwrap_or(u64::MAX).saturating_add(1);
    Box::pin(reader).take(allowed).read_to_end(&mut data).await?;

    if data.len() > limit.0 {
        return Err(ConvertError::TooLarge(limit.0));
    }

    Ok(data)
}

/// A converted document ready to hand back
#[derive(Debug)]
pub struct Converted {
    pub file_name: String,
    pub format: DocFormat,
    pub data: Vec<u8>,
}

/// Convert an uploaded document. Everything happens in a scratch directory that is removed
/// once the result has been read back.
pub async fn convert_upload(
    converter: &Converter,
    file_name: &str,
    data: &[u8],
    to: Option<DocFormat>,
) -> Result<Converted, ConvertError> {
    let file_name = sanitize_file_name(file_name).ok_or(ConvertError::InvalidFileName)?;

    // Work out what we are doing before touching the disk
    let source = DocFormat::from_path(Path::new(&file_name))?;
    let target = resolve_target(source, to)?;

    if data.is_empty() {
        return Err(ConvertError::EmptyUpload);
    }

    info!(
        "Converting upload `{}` ({} bytes) from {} to {}",
        file_name,
        data.len(),
        source,
        target
    );

    // Save uploaded file
    let scratch = tempfile::Builder::new().prefix("resconv-job").tempdir()?;
    let src_path = scratch.path().join(&file_name);
    fs::write(&src_path, data).await?;

    // Run conversion next to the upload
    let out_path = src_path.with_extension(target.extension());
    converter.convert_file(&src_path, &out_path).await?;

    // Read converted file
    let data = fs::read(&out_path).await?;
    let file_name = out_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or(ConvertError::InvalidFileName)?
        .to_string();

    Ok(Converted {
        file_name,
        format: target,
        data,
    })
}
