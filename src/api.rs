use crate::convert::ConvertApi;
use poem_openapi::{OpenApiService, Tags};

#[derive(Tags)]
pub enum Tag {
    Convert,
    Health,
}

/// Struct we will build our REST API / Webserver
pub fn api_service(server: &str) -> OpenApiService<ConvertApi, ()> {
    OpenApiService::new(ConvertApi, "ResConv", env!("CARGO_PKG_VERSION")).server(server)
}
