use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::info;

use galeries_db::reports::{ClassifyOutcome, ReportOutcome, ReportTarget};
use galeries_types::api::{Envelope, ReportRequest};
use galeries_types::models::Role;

use crate::error::ApiError;
use crate::extract::{Body, CurrentUser};
use crate::frames::visible_frame;
use crate::state::{AppState, run};
use crate::validation::Validator;
use crate::views;

pub const ALREADY_CLASSED: &str = "this report has already been classed";

fn reported(outcome: ReportOutcome, what: &str) -> Result<Response, ApiError> {
    match outcome {
        ReportOutcome::Created(report) => {
            Ok((StatusCode::CREATED, Json(Envelope::new("POST", views::report(report)))).into_response())
        }
        ReportOutcome::Incremented(report) => Ok(Json(Envelope::new("POST", views::report(report))).into_response()),
        ReportOutcome::AlreadyReported => Err(ApiError::bad_request(format!("you have already reported this {}", what))),
        ReportOutcome::Classed => Err(ApiError::bad_request(ALREADY_CLASSED)),
    }
}

pub async fn report_frame(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(frame_id): Path<String>,
    Body(req): Body<ReportRequest>,
) -> Result<Response, ApiError> {
    Validator::new()
        .optional_length("reason", req.reason.as_deref(), 200)
        .finish()?;

    let user_id = me.id.clone();
    let outcome = run(&state, move |db| {
        let frame = visible_frame(db, &frame_id, &user_id)?;
        if frame.user_id == user_id {
            return Err(ApiError::bad_request("you cannot report your own frame"));
        }
        Ok(db.report(&ReportTarget::Frame(frame.id), &user_id, req.reason.as_deref(), Utc::now())?)
    })
    .await?;

    reported(outcome, "frame")
}

pub async fn report_profile_picture(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(picture_id): Path<String>,
    Body(req): Body<ReportRequest>,
) -> Result<Response, ApiError> {
    Validator::new()
        .optional_length("reason", req.reason.as_deref(), 200)
        .finish()?;

    let user_id = me.id.clone();
    let outcome = run(&state, move |db| {
        let picture = db
            .get_profile_picture(&picture_id)?
            .ok_or_else(|| ApiError::not_found("profile picture not found"))?;
        if picture.user_id == user_id {
            return Err(ApiError::bad_request("you cannot report your own profile picture"));
        }
        let target = ReportTarget::ProfilePicture(picture.id);
        Ok(db.report(&target, &user_id, req.reason.as_deref(), Utc::now())?)
    })
    .await?;

    reported(outcome, "profile picture")
}

// -- Moderation --

pub async fn list_reports(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Moderator)?;
    let rows = run(&state, |db| Ok(db.list_reports()?)).await?;

    let reports: Vec<_> = rows.into_iter().map(views::report).collect();
    Ok(Json(Envelope::new("GET", reports)))
}

pub async fn get_report(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(report_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Moderator)?;
    let report = run(&state, move |db| {
        db.get_report(&report_id)?
            .ok_or_else(|| ApiError::not_found("report not found"))
    })
    .await?;

    Ok(Json(Envelope::new("GET", views::report(report))))
}

pub async fn classify_report(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(report_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Moderator)?;
    let outcome = run(&state, move |db| Ok(db.classify_report(&report_id, Utc::now())?)).await?;

    match outcome {
        ClassifyOutcome::Classed(report) => {
            info!("Moderator {} classed report {}", me.id, report.id);
            Ok(Json(Envelope::new("PUT", views::report(report))))
        }
        ClassifyOutcome::AlreadyClassed => Err(ApiError::bad_request(ALREADY_CLASSED)),
        ClassifyOutcome::NotFound => Err(ApiError::not_found("report not found")),
    }
}

pub async fn delete_report(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(report_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Moderator)?;
    let id = report_id.clone();
    if !run(&state, move |db| Ok(db.delete_report(&id)?)).await? {
        return Err(ApiError::not_found("report not found"));
    }

    Ok(Json(Envelope::new("DELETE", views::deleted(&report_id))))
}
