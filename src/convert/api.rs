use crate::{
    api::Tag,
    convert::{
        core::Converter,
        job::{convert_upload, read_capped, UploadLimit},
    },
    format::DocFormat,
};
use poem::web::Data;
use poem_openapi::{
    param::Query,
    payload::{Attachment, AttachmentType, Json},
    types::multipart::Upload,
    Multipart, Object, OpenApi,
};

/// Multipart body for a conversion
#[derive(Debug, Multipart)]
struct ConvertUpload {
    /// Resume to convert, either .docx or .pdf
    file: Upload,
}

/// Service health
#[derive(Debug, Object)]
struct Health {
    /// `ok`, or `degraded` when LibreOffice has gone missing
    status: String,
    /// LibreOffice binary in use
    soffice: Option<String>,
}

/// Struct we will build our REST API / Webserver
pub struct ConvertApi;

#[OpenApi]
impl ConvertApi {
    /// Convert a resume. DOCX becomes PDF and PDF becomes DOCX unless `to` says otherwise.
    #[oai(path = "/convert", method = "post", tag = Tag::Convert)]
    async fn convert_post(
        &self,
        Data(converter): Data<&Converter>,
        Data(limit): Data<&UploadLimit>,
        Query(to): Query<Option<DocFormat>>,
        upload: ConvertUpload,
    ) -> Result<Attachment<Vec<u8>>, poem::Error> {
        // Pull the upload into memory
        let file_name = upload.file.file_name().unwrap_or_default().to_string();
        let data = read_capped(upload.file.into_async_read(), *limit).await?;

        // Run conversion
        let converted = convert_upload(converter, &file_name, &data, to).await?;

        Ok(Attachment::new(converted.data)
            .attachment_type(AttachmentType::Attachment)
            .filename(converted.file_name))
    }

    /// Is the converter ready to take work?
    #[oai(path = "/health", method = "get", tag = Tag::Health)]
    async fn health_get(&self, Data(converter): Data<&Converter>) -> Json<Health> {
        let available = converter.is_available();

        Json(Health {
            status: if available { "ok" } else { "degraded" }.to_string(),
            soffice: available.then(|| converter.program().display().to_string()),
        })
    }
}
