//! Commission reporting handlers with CSV export

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::commission::ReportFilter;
use crate::services::{CommissionService, ProducerService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub format: Option<String>, // "json" or "csv"
}

impl ReportQuery {
    fn filter(&self) -> ReportFilter {
        ReportFilter {
            start_date: self.start_date.as_deref().and_then(|s| s.parse().ok()),
            end_date: self.end_date.as_deref().and_then(|s| s.parse().ok()),
        }
    }
}

/// Platform-wide commission report (admin)
pub async fn get_platform_commission_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<impl IntoResponse> {
    current_user.0.require_admin()?;
    let service = CommissionService::new(state.db.clone());
    let report = service.platform_report(&query.filter()).await?;

    if query.format.as_deref() == Some("csv") {
        let csv = CommissionService::export_to_csv(&report.producers)?;
        return Ok((
            [
                (header::CONTENT_TYPE, "text/csv"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"commission_report.csv\"",
                ),
            ],
            csv,
        )
            .into_response());
    }

    Ok(Json(ApiResponse::ok("Commission report", report)).into_response())
}

/// Commission report for the calling producer
pub async fn get_own_commission_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<impl IntoResponse> {
    let producers = ProducerService::new(state.db.clone(), &state.config);
    let producer = producers.get_by_user(current_user.0.user_id).await?;

    let service = CommissionService::new(state.db.clone());
    let report = service.producer_report(producer.id, &query.filter()).await?;

    if query.format.as_deref() == Some("csv") {
        let csv = CommissionService::export_to_csv(std::slice::from_ref(&report))?;
        return Ok((
            [
                (header::CONTENT_TYPE, "text/csv"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"commission_report.csv\"",
                ),
            ],
            csv,
        )
            .into_response());
    }

    Ok(Json(ApiResponse::ok("Commission report", report)).into_response())
}
