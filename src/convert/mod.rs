mod api;
mod core;
mod job;
mod page;

pub use crate::convert::{
    api::ConvertApi,
    core::{ConvertError, Converter},
    job::{convert_upload, read_capped, Converted, UploadLimit},
    page::{convert_form, ConvertForm},
};
