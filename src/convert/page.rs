use crate::{
    convert::{
        core::Converter,
        job::{convert_upload, read_capped, UploadLimit},
    },
    format::DocFormat,
    index::Index,
};
use askama::Template;
use poem::{
    error::{BadRequest, InternalServerError},
    handler,
    http::{header, StatusCode},
    web::{Data, Html, Multipart},
    IntoResponse, Response,
};
use tracing::warn;

/// Template for the upload form
#[derive(Template)]
#[template(path = "convert/component/convert_form.html")]
pub struct ConvertForm {
    pub error: Option<String>,
}

/// What the user sent through the form
#[derive(Default)]
struct ConvertParams {
    file_name: String,
    data: Vec<u8>,
    to: Option<String>,
}

/// Convert a resume via the UI
#[handler]
pub async fn convert_form(
    Data(converter): Data<&Converter>,
    Data(limit): Data<&UploadLimit>,
    mut multipart: Multipart,
) -> Result<Response, poem::Error> {
    // Pull the form fields
    let mut params = ConvertParams::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                params.file_name = field.file_name().unwrap_or_default().to_string();
                params.data = match read_capped(field.into_async_read(), *limit).await {
                    Ok(data) => data,
                    Err(err) => return render_error(err.to_string(), err.status()),
                };
            }
            Some("to") => params.to = Some(field.text().await.map_err(BadRequest)?),
            _ => {}
        }
    }

    // Did the user pick a target, or leave it on auto?
    let to = match params.to.as_deref().map(str::trim) {
        None | Some("") | Some("auto") => None,
        Some(value) => match value.parse::<DocFormat>() {
            Ok(format) => Some(format),
            Err(err) => return render_error(err.to_string(), StatusCode::BAD_REQUEST),
        },
    };

    // Run conversion
    match convert_upload(converter, &params.file_name, &params.data, to).await {
        Ok(converted) => Ok(Response::builder()
            .header(header::CONTENT_TYPE, converted.format.mime_type())
            .header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", converted.file_name),
            )
            .body(converted.data)),
        Err(err) => {
            warn!("Conversion of `{}` failed: {}", params.file_name, err);
            let status = err.status();
            render_error(err.to_string(), status)
        }
    }
}

/// Send the landing page back with the error in the form
fn render_error(error: String, status: StatusCode) -> Result<Response, poem::Error> {
    let index: String = Index {
        convert_form: ConvertForm { error: Some(error) },
    }
    .render()
    .map_err(InternalServerError)?;

    Ok(Html(index).with_status(status).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test the form renders its error
    #[test]
    fn test_convert_form_render() {
        let form = ConvertForm {
            error: Some("Uploaded file is empty".to_string()),
        }
        .render()
        .unwrap();

        assert!(form.contains("Uploaded file is empty"));
        assert!(form.contains(r#"accept=".pdf,.docx""#));

        let form = ConvertForm { error: None }.render().unwrap();
        assert!(!form.contains(r#"class="error""#));
    }
}
