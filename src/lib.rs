pub mod api;
pub mod config;
pub mod convert;
pub mod format;
pub mod index;
pub mod util;

use crate::{
    api::api_service,
    config::Config,
    convert::{convert_form, Converter, UploadLimit},
};
use poem::{
    endpoint::EmbeddedFilesEndpoint,
    get,
    http::Method,
    middleware::{SizeLimit, Tracing},
    post, Endpoint, EndpointExt, Middleware, Route,
};
use rust_embed::RustEmbed;

/// Static files baked into the binary
#[derive(RustEmbed)]
#[folder = "assets"]
pub struct Assets;

/// Everything the web service serves
pub fn app(converter: Converter, config: &Config) -> impl Endpoint {
    // Setup OpenAPI Swagger Page
    let api_service = api_service(&config.api_url());
    let spec = api_service.spec_endpoint();
    let swagger = api_service.swagger_ui();
    let max_upload = config.max_upload;

    // Route inbound traffic
    Route::new()
        // Developer friendly locations
        .nest("/api", api_service)
        .nest("/assets", EmbeddedFilesEndpoint::<Assets>::new())
        .at("/spec", spec)
        .nest("/swagger", swagger)
        // User friendly locations
        .at("/", get(index::index))
        .at("/convert", post(convert_form))
        // Global context to be shared
        .data(converter)
        .data(UploadLimit(max_upload))
        // Utilites being added to our services
        .around(move |ep, req| async move {
            // Uploads must say how big they are, and stay under the limit
            if req.method() == Method::POST {
                return SizeLimit::new(max_upload).transform(ep).call(req).await;
            }

            ep.call(req).await
        })
        .with(Tracing)
}
