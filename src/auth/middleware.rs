use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::token::TokenIssuer;

/// Bearer-token guard for the user service.
///
/// Holds the process-wide [`TokenIssuer`] and verifies the `Authorization`
/// header on every request except the public registration, login, and
/// health paths. On success the decoded claims are placed in request
/// extensions for [`super::AuthenticatedUserId`] to pick up.
pub struct TokenAuth {
    issuer: TokenIssuer,
}

impl TokenAuth {
    pub fn new(issuer: TokenIssuer) -> Self {
        Self { issuer }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TokenAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = TokenAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TokenAuthService {
            service,
            issuer: self.issuer.clone(),
        }))
    }
}

pub struct TokenAuthService<S> {
    service: S,
    issuer: TokenIssuer,
}

impl<S, B> Service<ServiceRequest> for TokenAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Skip authentication for health check and the public auth endpoints
        let path = req.path();
        if path == "/health" || path == "/api/register" || path == "/api/login" {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let auth_header = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        match auth_header {
            Some(token) => match self.issuer.verify(token) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    let fut = self.service.call(req);
                    Box::pin(fut)
                }
                Err(token_err) => {
                    let app_err: crate::error::AppError = token_err.into();
                    Box::pin(async move { Err(app_err.into()) })
                }
            },
            None => {
                let app_err = crate::error::AppError::Unauthorized("Missing token".into());
                Box::pin(async move { Err(app_err.into()) })
            }
        }
    }
}
