//! Schedule endpoints, including the cancellation saga trigger.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{NaiveDate, NaiveTime};
use common::{EmployeeId, ScheduleId};
use domain::{NewSchedule, Schedule, ScheduleStatus};
use saga::CancelScheduleSummary;
use serde::Deserialize;

use super::parse_id;
use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateScheduleRequest {
    pub employee_id: String,
    pub work_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct CancelScheduleRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

fn parse_status(raw: &str) -> Result<ScheduleStatus, ApiError> {
    raw.parse().map_err(ApiError::BadRequest)
}

// -- Handlers --

/// POST /hr/schedules: create a schedule for one employee and day.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<Schedule>), ApiError> {
    let employee_id: EmployeeId = parse_id("employee", &req.employee_id)?;
    let status = req.status.as_deref().map(parse_status).transpose()?;

    let schedule = state
        .schedules
        .create(NewSchedule {
            employee_id,
            work_date: req.work_date,
            start_time: req.start_time,
            end_time: req.end_time,
            status,
            notes: req.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(schedule)))
}

/// GET /hr/schedules/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Schedule>, ApiError> {
    let schedule_id: ScheduleId = parse_id("schedule", &id)?;
    Ok(Json(state.schedules.get(schedule_id).await?))
}

/// PATCH /hr/schedules/{id}/status: set AVAILABLE or BOOKED.
#[tracing::instrument(skip(state, req))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Schedule>, ApiError> {
    let schedule_id: ScheduleId = parse_id("schedule", &id)?;
    let status = parse_status(&req.status)?;
    Ok(Json(
        state.schedules.update_status(schedule_id, status).await?,
    ))
}

/// POST /hr/schedules/{id}/cancel: run the cancellation saga.
#[tracing::instrument(skip(state, caller, req))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Caller(caller): Caller,
    Json(req): Json<CancelScheduleRequest>,
) -> Result<Json<CancelScheduleSummary>, ApiError> {
    let schedule_id: ScheduleId = parse_id("schedule", &id)?;
    let summary = state
        .schedule_cancellation
        .cancel(&caller, schedule_id, req.reason.as_deref())
        .await?;
    Ok(Json(summary))
}

/// DELETE /hr/schedules/{id}: refused while appointments are active.
#[tracing::instrument(skip(state, caller))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Caller(caller): Caller,
) -> Result<StatusCode, ApiError> {
    let schedule_id: ScheduleId = parse_id("schedule", &id)?;
    state.schedules.delete(&caller, schedule_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
