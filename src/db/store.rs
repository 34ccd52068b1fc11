use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use uuid::Uuid;

use super::models::{
    Admin, Branch, CartItem, Credentials, Medicine, Order, OrderDetail, OrderStatus, Patient,
    Pharmacist, Pharmacy, Prescription, PrescriptionStatus, Role,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("Insufficient stock for medicine {medicine_id}")]
    InsufficientStock { medicine_id: Uuid },
    #[error("{0} not found")]
    Missing(String),
    #[error("Record is referenced by other rows: {0}")]
    InUse(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Reads a nullable field of an update body: absent stays `None`, an explicit
/// `null` becomes `Some(None)` and clears the column.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PatientUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub date_of_birth: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone)]
pub struct NewPharmacist {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub branch_id: Option<Uuid>,
    pub license_number: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PharmacistUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub branch_id: Option<Option<Uuid>>,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewPharmacy {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PharmacyUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewBranch {
    pub pharmacy_id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct BranchUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewMedicine {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub manufacturer: Option<String>,
    pub price_cents: i64,
    pub stock: i32,
    #[serde(default)]
    pub requires_prescription: bool,
    pub expiry_date: NaiveDate,
    pub image_url: Option<String>,
    pub branch_id: Option<Uuid>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct MedicineUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub manufacturer: Option<Option<String>>,
    pub price_cents: Option<i64>,
    pub stock: Option<i32>,
    pub requires_prescription: Option<bool>,
    pub expiry_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub branch_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Default)]
pub struct MedicineFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub in_stock: bool,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub medicine_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub patient_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub prescription_id: Option<Uuid>,
    pub shipping_address: String,
    pub total_cents: i64,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub patient_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub patient_id: Uuid,
    pub image_url: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PrescriptionFilter {
    pub patient_id: Option<Uuid>,
    pub status: Option<PrescriptionStatus>,
}

#[derive(Debug, Clone)]
pub struct PrescriptionReview {
    pub status: PrescriptionStatus,
    pub reviewer: Uuid,
    pub note: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

/// Persistence seam used by every service.
///
/// Status changes are compare-and-set: `transition_order` and
/// `review_prescription` return `Ok(None)` when the row is no longer in the
/// expected state, which callers surface as a conflict.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_credentials(&self, role: Role, email: &str) -> StoreResult<Option<Credentials>>;

    async fn create_patient(&self, patient: NewPatient) -> StoreResult<Patient>;
    async fn get_patient(&self, id: Uuid) -> StoreResult<Option<Patient>>;
    async fn update_patient(&self, id: Uuid, update: PatientUpdate) -> StoreResult<Option<Patient>>;
    async fn list_patients(&self) -> StoreResult<Vec<Patient>>;
    async fn delete_patient(&self, id: Uuid) -> StoreResult<bool>;

    async fn create_pharmacist(&self, pharmacist: NewPharmacist) -> StoreResult<Pharmacist>;
    async fn get_pharmacist(&self, id: Uuid) -> StoreResult<Option<Pharmacist>>;
    async fn update_pharmacist(
        &self,
        id: Uuid,
        update: PharmacistUpdate,
    ) -> StoreResult<Option<Pharmacist>>;
    async fn list_pharmacists(&self) -> StoreResult<Vec<Pharmacist>>;
    async fn delete_pharmacist(&self, id: Uuid) -> StoreResult<bool>;

    async fn create_admin(&self, admin: NewAdmin) -> StoreResult<Admin>;
    async fn get_admin(&self, id: Uuid) -> StoreResult<Option<Admin>>;

    async fn list_pharmacies(&self) -> StoreResult<Vec<Pharmacy>>;
    async fn create_pharmacy(&self, pharmacy: NewPharmacy) -> StoreResult<Pharmacy>;
    async fn update_pharmacy(&self, id: Uuid, update: PharmacyUpdate)
        -> StoreResult<Option<Pharmacy>>;
    async fn delete_pharmacy(&self, id: Uuid) -> StoreResult<bool>;

    async fn list_branches(&self) -> StoreResult<Vec<Branch>>;
    async fn get_branch(&self, id: Uuid) -> StoreResult<Option<Branch>>;
    async fn create_branch(&self, branch: NewBranch) -> StoreResult<Branch>;
    async fn update_branch(&self, id: Uuid, update: BranchUpdate) -> StoreResult<Option<Branch>>;
    async fn delete_branch(&self, id: Uuid) -> StoreResult<bool>;

    async fn list_medicines(&self, filter: &MedicineFilter) -> StoreResult<Vec<Medicine>>;
    async fn get_medicine(&self, id: Uuid) -> StoreResult<Option<Medicine>>;
    async fn create_medicine(&self, medicine: NewMedicine) -> StoreResult<Medicine>;
    async fn update_medicine(&self, id: Uuid, update: MedicineUpdate)
        -> StoreResult<Option<Medicine>>;
    async fn set_stock(&self, id: Uuid, stock: i32) -> StoreResult<Option<Medicine>>;
    async fn delete_medicine(&self, id: Uuid) -> StoreResult<bool>;
    /// Medicines at or below `low_stock` units, or expiring on/before `expires_before`.
    async fn inventory_alerts(
        &self,
        low_stock: i32,
        expires_before: NaiveDate,
    ) -> StoreResult<Vec<Medicine>>;

    async fn cart_items(&self, patient_id: Uuid) -> StoreResult<Vec<CartItem>>;
    async fn upsert_cart_item(&self, item: CartItem) -> StoreResult<CartItem>;
    async fn remove_cart_item(&self, patient_id: Uuid, medicine_id: Uuid) -> StoreResult<bool>;
    async fn clear_cart(&self, patient_id: Uuid) -> StoreResult<()>;

    /// Decrements stock, inserts the order with its items and clears the
    /// patient's cart as one unit.
    async fn place_order(&self, order: NewOrder) -> StoreResult<OrderDetail>;
    async fn list_orders(&self, filter: OrderFilter) -> StoreResult<Vec<Order>>;
    async fn get_order(&self, id: Uuid) -> StoreResult<Option<OrderDetail>>;
    async fn transition_order(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<Option<Order>>;

    async fn create_prescription(&self, prescription: NewPrescription)
        -> StoreResult<Prescription>;
    async fn list_prescriptions(&self, filter: PrescriptionFilter)
        -> StoreResult<Vec<Prescription>>;
    async fn get_prescription(&self, id: Uuid) -> StoreResult<Option<Prescription>>;
    async fn review_prescription(
        &self,
        id: Uuid,
        review: PrescriptionReview,
    ) -> StoreResult<Option<Prescription>>;
}
