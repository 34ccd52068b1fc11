use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::{
        models::{Prescription, PrescriptionStatus},
        store::{NewPrescription, PrescriptionFilter, PrescriptionReview},
        Store,
    },
    error::{AppError, AppResult},
    utils::validate_url,
};

#[derive(Deserialize, Debug)]
pub struct UploadPrescription {
    pub image_url: String,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PrescriptionQuery {
    pub status: Option<PrescriptionStatus>,
}

#[derive(Deserialize, Debug)]
pub struct ReviewRequest {
    pub status: PrescriptionStatus,
    pub note: Option<String>,
}

pub async fn upload(
    store: &dyn Store,
    patient_id: Uuid,
    request: UploadPrescription,
) -> AppResult<Prescription> {
    let prescription = store
        .create_prescription(NewPrescription {
            patient_id,
            image_url: validate_url(&request.image_url, "image_url")?,
            notes: request.notes.filter(|n| !n.trim().is_empty()),
        })
        .await?;
    log::info!(
        "Prescription {} uploaded by patient {}",
        prescription.id,
        patient_id
    );
    Ok(prescription)
}

pub async fn list(
    store: &dyn Store,
    patient_id: Option<Uuid>,
    query: PrescriptionQuery,
) -> AppResult<Vec<Prescription>> {
    Ok(store
        .list_prescriptions(PrescriptionFilter {
            patient_id,
            status: query.status,
        })
        .await?)
}

/// Approves or rejects a pending prescription.
pub async fn review(
    store: &dyn Store,
    pharmacist_id: Uuid,
    id: Uuid,
    request: ReviewRequest,
    now: DateTime<Utc>,
) -> AppResult<Prescription> {
    if request.status == PrescriptionStatus::Pending {
        return Err(AppError::Validation(
            "status must be approved or rejected".to_string(),
        ));
    }

    let current = store
        .get_prescription(id)
        .await?
        .ok_or_else(|| AppError::not_found("Prescription"))?;
    if current.status != PrescriptionStatus::Pending {
        return Err(AppError::Conflict(format!(
            "Prescription has already been {}",
            current.status
        )));
    }

    let reviewed = store
        .review_prescription(
            id,
            PrescriptionReview {
                status: request.status,
                reviewer: pharmacist_id,
                note: request.note.filter(|n| !n.trim().is_empty()),
                reviewed_at: now,
            },
        )
        .await?
        .ok_or_else(|| {
            AppError::Conflict("Prescription was reviewed by someone else".to_string())
        })?;
    log::info!(
        "Prescription {} {} by pharmacist {}",
        id,
        reviewed.status,
        pharmacist_id
    );
    Ok(reviewed)
}
