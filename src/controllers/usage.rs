use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;

use crate::{
    domain::{
        shared::usage_dto::{LimitCheckRequest, LimitCheckResponse, UsageResponse, WindowResets},
        usage::UsageLimiter,
    },
    error::{AppError, AppResult},
    infrastructure::visitor::CurrentVisitor,
};

pub struct UsageController {
    limiter: Arc<UsageLimiter>,
}

impl UsageController {
    pub fn new(limiter: Arc<UsageLimiter>) -> Self {
        Self { limiter }
    }

    /// GET /api/usage - Current usage and the limits it is measured against
    pub async fn get_usage(
        State(controller): State<Arc<UsageController>>,
        Extension(CurrentVisitor(visitor)): Extension<CurrentVisitor>,
    ) -> AppResult<Json<UsageResponse>> {
        let (hour_ms, day_ms) = controller.limiter.window_resets();

        Ok(Json(UsageResponse {
            visitor: visitor.to_string(),
            usage: controller.limiter.usage(&visitor),
            limits: controller.limiter.policy().clone(),
            resets: WindowResets { hour_ms, day_ms },
        }))
    }

    /// POST /api/usage/check - Would this message be accepted right now?
    pub async fn check(
        State(controller): State<Arc<UsageController>>,
        Extension(CurrentVisitor(visitor)): Extension<CurrentVisitor>,
        Json(request): Json<LimitCheckRequest>,
    ) -> AppResult<Json<LimitCheckResponse>> {
        if request.text.trim().is_empty() {
            return Err(AppError::BadRequest("Text cannot be empty".to_string()));
        }

        // The admission is dropped unrecorded: checking never counts
        let decision =
            controller
                .limiter
                .check_limit(&visitor, &request.text, request.use_high_tier_voice);

        Ok(Json(LimitCheckResponse::from(decision)))
    }

    /// DELETE /api/usage/session - The widget was closed. Session counters
    /// start over next time; hour and day usage carry on.
    pub async fn end_session(
        State(controller): State<Arc<UsageController>>,
        Extension(CurrentVisitor(visitor)): Extension<CurrentVisitor>,
    ) -> AppResult<StatusCode> {
        controller.limiter.end_session(&visitor);
        Ok(StatusCode::NO_CONTENT)
    }
}
