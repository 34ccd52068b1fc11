use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{hash_password, issue_token, verify_password, Claims},
    db::{
        models::{Admin, Patient, Pharmacist, Role},
        store::{
            nullable, NewAdmin, NewPatient, NewPharmacist, PatientUpdate, PharmacistUpdate,
        },
        Store,
    },
    error::{AppError, AppResult},
    state::Settings,
    utils::{normalize_email, required, required_if_present},
};

#[derive(Deserialize, Debug)]
pub struct RegisterPatient {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default = "default_login_role")]
    pub role: Role,
}

fn default_login_role() -> Role {
    Role::Patient
}

#[derive(Serialize, Debug)]
pub struct Session {
    pub token: String,
    pub role: Role,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct CreatePharmacist {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub branch_id: Option<Uuid>,
    pub license_number: String,
}

/// Fields a pharmacist may change on their own profile.
#[derive(Deserialize, Debug, Default)]
pub struct PharmacistProfileUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
}

#[derive(Serialize, Debug)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Profile {
    Patient(Patient),
    Pharmacist(Pharmacist),
    Admin(Admin),
}

pub async fn register_patient(store: &dyn Store, request: RegisterPatient) -> AppResult<Patient> {
    let patient = NewPatient {
        name: required(&request.name, "name")?,
        email: normalize_email(&request.email)?,
        password_hash: hash_password(&request.password)?,
        phone: request.phone,
        address: request.address,
        date_of_birth: request.date_of_birth,
    };
    let created = store.create_patient(patient).await?;
    log::info!("Registered patient {}", created.id);
    Ok(created)
}

pub async fn login(
    store: &dyn Store,
    settings: &Settings,
    request: LoginRequest,
    now: DateTime<Utc>,
) -> AppResult<Session> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let email = normalize_email(&request.email).map_err(|_| invalid())?;
    let credentials = store
        .find_credentials(request.role, &email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&request.password, &credentials.password_hash)? {
        log::warn!("Failed {} login for {}", request.role, credentials.id);
        return Err(invalid());
    }

    let claims = Claims::new(credentials.id, credentials.role, now, settings.token_ttl);
    let token = issue_token(&claims, settings.jwt_secret.as_bytes())?;
    log::info!("{} {} logged in", credentials.role, credentials.id);

    Ok(Session {
        token,
        role: credentials.role,
        user_id: credentials.id,
        expires_at: now + settings.token_ttl,
    })
}

pub async fn profile(store: &dyn Store, claims: &Claims) -> AppResult<Profile> {
    let profile = match claims.role {
        Role::Patient => store.get_patient(claims.sub).await?.map(Profile::Patient),
        Role::Pharmacist => store
            .get_pharmacist(claims.sub)
            .await?
            .map(Profile::Pharmacist),
        Role::Admin => store.get_admin(claims.sub).await?.map(Profile::Admin),
    };
    profile.ok_or_else(|| AppError::not_found("Account"))
}

pub async fn update_patient_profile(
    store: &dyn Store,
    patient_id: Uuid,
    mut update: PatientUpdate,
) -> AppResult<Patient> {
    update.name = required_if_present(update.name, "name")?;
    store
        .update_patient(patient_id, update)
        .await?
        .ok_or_else(|| AppError::not_found("Patient"))
}

pub async fn update_pharmacist_profile(
    store: &dyn Store,
    pharmacist_id: Uuid,
    update: PharmacistProfileUpdate,
) -> AppResult<Pharmacist> {
    update_pharmacist(
        store,
        pharmacist_id,
        PharmacistUpdate {
            name: update.name,
            phone: update.phone,
            ..Default::default()
        },
    )
    .await
}

pub async fn create_pharmacist(
    store: &dyn Store,
    request: CreatePharmacist,
) -> AppResult<Pharmacist> {
    let pharmacist = NewPharmacist {
        name: required(&request.name, "name")?,
        email: normalize_email(&request.email)?,
        password_hash: hash_password(&request.password)?,
        phone: request.phone,
        branch_id: request.branch_id,
        license_number: required(&request.license_number, "license_number")?,
    };
    let created = store.create_pharmacist(pharmacist).await?;
    log::info!("Created pharmacist {}", created.id);
    Ok(created)
}

pub async fn update_pharmacist(
    store: &dyn Store,
    id: Uuid,
    mut update: PharmacistUpdate,
) -> AppResult<Pharmacist> {
    update.name = required_if_present(update.name, "name")?;
    update.license_number = required_if_present(update.license_number, "license_number")?;
    store
        .update_pharmacist(id, update)
        .await?
        .ok_or_else(|| AppError::not_found("Pharmacist"))
}

pub async fn create_admin(
    store: &dyn Store,
    name: &str,
    email: &str,
    password: &str,
) -> AppResult<Admin> {
    let admin = NewAdmin {
        name: required(name, "name")?,
        email: normalize_email(email)?,
        password_hash: hash_password(password)?,
    };
    Ok(store.create_admin(admin).await?)
}
