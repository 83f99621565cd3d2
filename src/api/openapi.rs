use crate::api::handlers::auth::types::{
    LoginRequest, SessionResponse, SignupRequest, VerifyRequest,
};
use utoipa::OpenApi;

/// OpenAPI document for the auth endpoints.
///
/// Add new endpoints here so they show up in the served document.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::health::health,
        crate::api::handlers::auth::signup::signup_form,
        crate::api::handlers::auth::signup::signup,
        crate::api::handlers::auth::login::login_form,
        crate::api::handlers::auth::login::login,
        crate::api::handlers::auth::verify::verify_form,
        crate::api::handlers::auth::verify::verify,
        crate::api::handlers::auth::session::session,
        crate::api::handlers::auth::session::logout,
    ),
    components(schemas(SignupRequest, LoginRequest, VerifyRequest, SessionResponse)),
    tags(
        (name = "auth", description = "Signup, login, and email verification"),
        (name = "health", description = "Service liveness")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_auth_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/signup"));
        assert!(paths.contains_key("/login"));
        assert!(paths.contains_key("/verify"));
        assert!(paths.contains_key("/session"));
        assert!(paths.contains_key("/health"));
    }
}
