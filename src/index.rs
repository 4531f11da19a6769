use crate::convert::ConvertForm;
use askama::Template;
use poem::{error::InternalServerError, handler, web::Html};

/// Template for the landing page
#[derive(Template)]
#[template(path = "index/page/index.html")]
pub struct Index {
    pub convert_form: ConvertForm,
}

/// Landing page with the upload form
#[handler]
pub async fn index() -> Result<Html<String>, poem::Error> {
    // Render landing page
    let index = Index {
        convert_form: ConvertForm { error: None },
    }
    .render()
    .map_err(InternalServerError)?;

    Ok(Html(index))
}
