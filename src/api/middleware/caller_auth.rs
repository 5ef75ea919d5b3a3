//! 管理接口的调用方身份
//!
//! 认证由外部协作方负责，这里只做两件事：
//! 1. 配置了 `api.token` 时校验 `Authorization: Bearer <token>`（常量时间比较）
//! 2. 读取 `X-Owner-Id`，连同路由作用域决定的角色放进 request extensions

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::CONTENT_TYPE,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use subtle::ConstantTimeEq;
use tracing::{info, trace};

use crate::api::services::error_code::ErrorCode;
use crate::api::services::types::ApiResponse;
use crate::postback::CallerRole;

pub const OWNER_HEADER: &str = "X-Owner-Id";
const MAX_OWNER_LEN: usize = 64;

/// 已识别的调用方，handler 通过 `web::ReqData<Caller>` 读取
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub owner_id: String,
    pub role: CallerRole,
}

/// Caller identity middleware
#[derive(Clone)]
pub struct CallerAuth {
    role: CallerRole,
    token: Rc<String>,
}

impl CallerAuth {
    pub fn new(role: CallerRole, token: impl Into<String>) -> Self {
        Self {
            role,
            token: Rc::new(token.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for CallerAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = CallerAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CallerAuthMiddleware {
            service: Rc::new(service),
            role: self.role,
            token: self.token.clone(),
        }))
    }
}

pub struct CallerAuthMiddleware<S> {
    service: Rc<S>,
    role: CallerRole,
    token: Rc<String>,
}

impl<S, B> CallerAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    fn handle_unauthorized(
        req: ServiceRequest,
        code: ErrorCode,
        message: &str,
    ) -> ServiceResponse<EitherBody<B>> {
        info!("Caller rejected on {}: {}", req.path(), message);
        req.into_response(
            HttpResponse::Unauthorized()
                .insert_header((CONTENT_TYPE, "application/json; charset=utf-8"))
                .json(ApiResponse::<()> {
                    code: code as i32,
                    message: message.to_string(),
                    data: None,
                })
                .map_into_right_body(),
        )
    }

    fn extract_bearer_token(req: &ServiceRequest) -> Option<&str> {
        req.headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::trim)
    }

    fn token_matches(expected: &str, provided: Option<&str>) -> bool {
        match provided {
            Some(p) => bool::from(p.as_bytes().ct_eq(expected.as_bytes())),
            None => false,
        }
    }

    fn extract_owner(req: &ServiceRequest) -> Option<String> {
        req.headers()
            .get(OWNER_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.len() <= MAX_OWNER_LEN)
            .map(str::to_string)
    }
}

impl<S, B> Service<ServiceRequest> for CallerAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let role = self.role;
        let token = self.token.clone();

        Box::pin(async move {
            // token 为空时交给上游网关
            if !token.is_empty()
                && !Self::token_matches(&token, Self::extract_bearer_token(&req))
            {
                return Ok(Self::handle_unauthorized(
                    req,
                    ErrorCode::TokenInvalid,
                    "Unauthorized: Invalid or missing token",
                ));
            }

            let Some(owner_id) = Self::extract_owner(&req) else {
                return Ok(Self::handle_unauthorized(
                    req,
                    ErrorCode::OwnerMissing,
                    "Unauthorized: Missing X-Owner-Id",
                ));
            };

            trace!("Caller identified: {} ({:?})", owner_id, role);
            req.extensions_mut().insert(Caller { owner_id, role });
            let response = srv.call(req).await?.map_into_left_body();
            Ok(response)
        })
    }
}
