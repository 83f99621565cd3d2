use axum::response::IntoResponse;

// Landing route; the storefront pages themselves live elsewhere.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
