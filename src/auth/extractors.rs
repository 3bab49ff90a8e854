use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::token::Claims;
use crate::error::AppError;

/// Extracts the authenticated user's ID from request extensions.
///
/// This extractor is intended for routes guarded by [`super::TokenAuth`],
/// which validates the bearer token and inserts the decoded [`Claims`]
/// into request extensions.
///
/// If no claims are present (the middleware did not run or rejected the
/// request), this extractor returns `AppError::Unauthorized`.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUserId(pub i32);

impl FromRequest for AuthenticatedUserId {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Claims>().map(|claims| claims.sub) {
            Some(user_id) => ready(Ok(AuthenticatedUserId(user_id))),
            None => {
                let err = AppError::Unauthorized("no verified token claims in request".to_string());
                ready(Err(err.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::dev::Payload;
    use actix_web::http::StatusCode;
    use actix_web::test;

    #[actix_rt::test]
    async fn test_authenticated_user_id_extractor_success() {
        let req = test::TestRequest::default().to_http_request();
        req.extensions_mut().insert(Claims { sub: 123, exp: 0 });

        let mut payload = Payload::None;
        let extracted_id = AuthenticatedUserId::from_request(&req, &mut payload).await;
        assert!(extracted_id.is_ok());
        assert_eq!(extracted_id.unwrap().0, 123);
    }

    #[actix_rt::test]
    async fn test_authenticated_user_id_extractor_failure() {
        let req = test::TestRequest::default().to_http_request();
        // No claims inserted into extensions

        let mut payload = Payload::None;
        let extracted_id_result = AuthenticatedUserId::from_request(&req, &mut payload).await;
        assert!(extracted_id_result.is_err());

        let err = extracted_id_result.unwrap_err();
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
