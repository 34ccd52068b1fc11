use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    Admin, Branch, CartItem, Credentials, Medicine, Order, OrderDetail, OrderItem, OrderStatus,
    Patient, Pharmacist, Pharmacy, Prescription, PrescriptionStatus, Role,
};
use super::store::{
    BranchUpdate, MedicineFilter, MedicineUpdate, NewAdmin, NewBranch, NewMedicine, NewOrder,
    NewPatient, NewPharmacist, NewPharmacy, NewPrescription, OrderFilter, PatientUpdate,
    PharmacistUpdate, PharmacyUpdate, PrescriptionFilter, PrescriptionReview, Store, StoreError,
    StoreResult,
};

const PATIENT_COLUMNS: &str = "id, name, email, phone, address, date_of_birth, created_at";
const PHARMACIST_COLUMNS: &str = "id, name, email, phone, branch_id, license_number, created_at";
const ADMIN_COLUMNS: &str = "id, name, email, created_at";

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Maps constraint violations raised while inserting or updating `what`.
fn write_error(what: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| match db_code(&e).as_deref() {
        Some(UNIQUE_VIOLATION) => StoreError::Duplicate(what.to_string()),
        Some(FOREIGN_KEY_VIOLATION) => StoreError::Missing(format!("Record referenced by {what}")),
        _ => StoreError::Sqlx(e),
    }
}

/// Maps constraint violations raised while deleting `what`.
fn delete_error(what: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| match db_code(&e).as_deref() {
        Some(FOREIGN_KEY_VIOLATION) => StoreError::InUse(what.to_string()),
        _ => StoreError::Sqlx(e),
    }
}

/// Splits a nullable update field into whether to write the column and the
/// value to write.
fn patch<T>(field: Option<Option<T>>) -> (bool, Option<T>) {
    let set = field.is_some();
    (set, field.flatten())
}

fn db_code(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_credentials(&self, role: Role, email: &str) -> StoreResult<Option<Credentials>> {
        let sql = match role {
            Role::Patient => {
                "SELECT id, 'patient'::user_role AS role, password_hash FROM patients WHERE lower(email) = lower($1)"
            }
            Role::Pharmacist => {
                "SELECT id, 'pharmacist'::user_role AS role, password_hash FROM pharmacists WHERE lower(email) = lower($1)"
            }
            Role::Admin => {
                "SELECT id, 'admin'::user_role AS role, password_hash FROM admins WHERE lower(email) = lower($1)"
            }
        };
        Ok(sqlx::query_as::<_, Credentials>(sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_patient(&self, patient: NewPatient) -> StoreResult<Patient> {
        let sql = format!(
            "INSERT INTO patients (id, name, email, password_hash, phone, address, date_of_birth) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PATIENT_COLUMNS}"
        );
        sqlx::query_as::<_, Patient>(&sql)
            .bind(Uuid::new_v4())
            .bind(&patient.name)
            .bind(&patient.email)
            .bind(&patient.password_hash)
            .bind(&patient.phone)
            .bind(&patient.address)
            .bind(patient.date_of_birth)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error("Patient"))
    }

    async fn get_patient(&self, id: Uuid) -> StoreResult<Option<Patient>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1");
        Ok(sqlx::query_as::<_, Patient>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_patient(&self, id: Uuid, update: PatientUpdate) -> StoreResult<Option<Patient>> {
        let (set_phone, phone) = patch(update.phone);
        let (set_address, address) = patch(update.address);
        let (set_birth, date_of_birth) = patch(update.date_of_birth);
        let sql = format!(
            "UPDATE patients SET name = COALESCE($2, name), \
             phone = CASE WHEN $3 THEN $4 ELSE phone END, \
             address = CASE WHEN $5 THEN $6 ELSE address END, \
             date_of_birth = CASE WHEN $7 THEN $8 ELSE date_of_birth END \
             WHERE id = $1 RETURNING {PATIENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Patient>(&sql)
            .bind(id)
            .bind(update.name)
            .bind(set_phone)
            .bind(phone)
            .bind(set_address)
            .bind(address)
            .bind(set_birth)
            .bind(date_of_birth)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_patients(&self) -> StoreResult<Vec<Patient>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, Patient>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_patient(&self, id: Uuid) -> StoreResult<bool> {
        let mut transaction = self.pool.begin().await?;

        // Holds off concurrent transitions of this patient's orders.
        sqlx::query("SELECT id FROM orders WHERE patient_id = $1 FOR UPDATE")
            .bind(id)
            .fetch_all(&mut *transaction)
            .await?;

        let holding: Vec<&str> = OrderStatus::ALL
            .iter()
            .filter(|status| status.holds_stock())
            .map(|status| status.as_str())
            .collect();
        sqlx::query(
            "UPDATE medicines m SET stock = m.stock + held.quantity \
             FROM (SELECT oi.medicine_id, SUM(oi.quantity)::int AS quantity \
                   FROM order_items oi JOIN orders o ON o.id = oi.order_id \
                   WHERE o.patient_id = $1 AND o.status::text = ANY($2) \
                   GROUP BY oi.medicine_id) held \
             WHERE m.id = held.medicine_id",
        )
        .bind(id)
        .bind(holding)
        .execute(&mut *transaction)
        .await?;

        let result = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(&mut *transaction)
            .await
            .map_err(delete_error("Patient"))?;

        transaction.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_pharmacist(&self, pharmacist: NewPharmacist) -> StoreResult<Pharmacist> {
        let sql = format!(
            "INSERT INTO pharmacists (id, name, email, password_hash, phone, branch_id, license_number) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PHARMACIST_COLUMNS}"
        );
        sqlx::query_as::<_, Pharmacist>(&sql)
            .bind(Uuid::new_v4())
            .bind(&pharmacist.name)
            .bind(&pharmacist.email)
            .bind(&pharmacist.password_hash)
            .bind(&pharmacist.phone)
            .bind(pharmacist.branch_id)
            .bind(&pharmacist.license_number)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error("Pharmacist"))
    }

    async fn get_pharmacist(&self, id: Uuid) -> StoreResult<Option<Pharmacist>> {
        let sql = format!("SELECT {PHARMACIST_COLUMNS} FROM pharmacists WHERE id = $1");
        Ok(sqlx::query_as::<_, Pharmacist>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_pharmacist(
        &self,
        id: Uuid,
        update: PharmacistUpdate,
    ) -> StoreResult<Option<Pharmacist>> {
        let (set_phone, phone) = patch(update.phone);
        let (set_branch, branch_id) = patch(update.branch_id);
        let sql = format!(
            "UPDATE pharmacists SET name = COALESCE($2, name), \
             phone = CASE WHEN $3 THEN $4 ELSE phone END, \
             branch_id = CASE WHEN $5 THEN $6 ELSE branch_id END, \
             license_number = COALESCE($7, license_number) \
             WHERE id = $1 RETURNING {PHARMACIST_COLUMNS}"
        );
        sqlx::query_as::<_, Pharmacist>(&sql)
            .bind(id)
            .bind(update.name)
            .bind(set_phone)
            .bind(phone)
            .bind(set_branch)
            .bind(branch_id)
            .bind(update.license_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error("Pharmacist"))
    }

    async fn list_pharmacists(&self) -> StoreResult<Vec<Pharmacist>> {
        let sql = format!("SELECT {PHARMACIST_COLUMNS} FROM pharmacists ORDER BY name");
        Ok(sqlx::query_as::<_, Pharmacist>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_pharmacist(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM pharmacists WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(delete_error("Pharmacist"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        let sql = format!(
            "INSERT INTO admins (id, name, email, password_hash) VALUES ($1, $2, $3, $4) \
             RETURNING {ADMIN_COLUMNS}"
        );
        sqlx::query_as::<_, Admin>(&sql)
            .bind(Uuid::new_v4())
            .bind(&admin.name)
            .bind(&admin.email)
            .bind(&admin.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error("Admin"))
    }

    async fn get_admin(&self, id: Uuid) -> StoreResult<Option<Admin>> {
        let sql = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = $1");
        Ok(sqlx::query_as::<_, Admin>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_pharmacies(&self) -> StoreResult<Vec<Pharmacy>> {
        Ok(
            sqlx::query_as::<_, Pharmacy>("SELECT * FROM pharmacies ORDER BY name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn create_pharmacy(&self, pharmacy: NewPharmacy) -> StoreResult<Pharmacy> {
        sqlx::query_as::<_, Pharmacy>(
            "INSERT INTO pharmacies (id, name, address, phone) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&pharmacy.name)
        .bind(&pharmacy.address)
        .bind(&pharmacy.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Pharmacy"))
    }

    async fn update_pharmacy(
        &self,
        id: Uuid,
        update: PharmacyUpdate,
    ) -> StoreResult<Option<Pharmacy>> {
        let (set_phone, phone) = patch(update.phone);
        Ok(sqlx::query_as::<_, Pharmacy>(
            "UPDATE pharmacies SET name = COALESCE($2, name), address = COALESCE($3, address), \
             phone = CASE WHEN $4 THEN $5 ELSE phone END WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(update.name)
        .bind(update.address)
        .bind(set_phone)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_pharmacy(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM pharmacies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(delete_error("Pharmacy"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_branches(&self) -> StoreResult<Vec<Branch>> {
        Ok(
            sqlx::query_as::<_, Branch>("SELECT * FROM branches ORDER BY name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_branch(&self, id: Uuid) -> StoreResult<Option<Branch>> {
        Ok(
            sqlx::query_as::<_, Branch>("SELECT * FROM branches WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_branch(&self, branch: NewBranch) -> StoreResult<Branch> {
        sqlx::query_as::<_, Branch>(
            "INSERT INTO branches (id, pharmacy_id, name, address, phone) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(branch.pharmacy_id)
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(&branch.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Branch"))
    }

    async fn update_branch(&self, id: Uuid, update: BranchUpdate) -> StoreResult<Option<Branch>> {
        let (set_phone, phone) = patch(update.phone);
        Ok(sqlx::query_as::<_, Branch>(
            "UPDATE branches SET name = COALESCE($2, name), address = COALESCE($3, address), \
             phone = CASE WHEN $4 THEN $5 ELSE phone END WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(update.name)
        .bind(update.address)
        .bind(set_phone)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_branch(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM branches WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(delete_error("Branch"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_medicines(&self, filter: &MedicineFilter) -> StoreResult<Vec<Medicine>> {
        Ok(sqlx::query_as::<_, Medicine>(
            "SELECT * FROM medicines \
             WHERE ($1::text IS NULL OR strpos(lower(name), lower($1)) > 0 \
                    OR strpos(lower(COALESCE(description, '')), lower($1)) > 0) \
             AND ($2::text IS NULL OR lower(category) = lower($2)) \
             AND (NOT $3 OR stock > 0) \
             ORDER BY name LIMIT $4 OFFSET $5",
        )
        .bind(&filter.search)
        .bind(&filter.category)
        .bind(filter.in_stock)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_medicine(&self, id: Uuid) -> StoreResult<Option<Medicine>> {
        Ok(
            sqlx::query_as::<_, Medicine>("SELECT * FROM medicines WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_medicine(&self, medicine: NewMedicine) -> StoreResult<Medicine> {
        sqlx::query_as::<_, Medicine>(
            "INSERT INTO medicines (id, name, description, category, manufacturer, price_cents, \
             stock, requires_prescription, expiry_date, image_url, branch_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&medicine.name)
        .bind(&medicine.description)
        .bind(&medicine.category)
        .bind(&medicine.manufacturer)
        .bind(medicine.price_cents)
        .bind(medicine.stock)
        .bind(medicine.requires_prescription)
        .bind(medicine.expiry_date)
        .bind(&medicine.image_url)
        .bind(medicine.branch_id)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Medicine"))
    }

    async fn update_medicine(
        &self,
        id: Uuid,
        update: MedicineUpdate,
    ) -> StoreResult<Option<Medicine>> {
        let (set_description, description) = patch(update.description);
        let (set_manufacturer, manufacturer) = patch(update.manufacturer);
        let (set_image, image_url) = patch(update.image_url);
        let (set_branch, branch_id) = patch(update.branch_id);
        sqlx::query_as::<_, Medicine>(
            "UPDATE medicines SET name = COALESCE($2, name), \
             description = CASE WHEN $3 THEN $4 ELSE description END, \
             category = COALESCE($5, category), \
             manufacturer = CASE WHEN $6 THEN $7 ELSE manufacturer END, \
             price_cents = COALESCE($8, price_cents), stock = COALESCE($9, stock), \
             requires_prescription = COALESCE($10, requires_prescription), \
             expiry_date = COALESCE($11, expiry_date), \
             image_url = CASE WHEN $12 THEN $13 ELSE image_url END, \
             branch_id = CASE WHEN $14 THEN $15 ELSE branch_id END \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(update.name)
        .bind(set_description)
        .bind(description)
        .bind(update.category)
        .bind(set_manufacturer)
        .bind(manufacturer)
        .bind(update.price_cents)
        .bind(update.stock)
        .bind(update.requires_prescription)
        .bind(update.expiry_date)
        .bind(set_image)
        .bind(image_url)
        .bind(set_branch)
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error("Medicine"))
    }

    async fn set_stock(&self, id: Uuid, stock: i32) -> StoreResult<Option<Medicine>> {
        Ok(
            sqlx::query_as::<_, Medicine>("UPDATE medicines SET stock = $2 WHERE id = $1 RETURNING *")
                .bind(id)
                .bind(stock)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn delete_medicine(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM medicines WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(delete_error("Medicine"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn inventory_alerts(
        &self,
        low_stock: i32,
        expires_before: NaiveDate,
    ) -> StoreResult<Vec<Medicine>> {
        Ok(sqlx::query_as::<_, Medicine>(
            "SELECT * FROM medicines WHERE stock <= $1 OR expiry_date <= $2 ORDER BY expiry_date",
        )
        .bind(low_stock)
        .bind(expires_before)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn cart_items(&self, patient_id: Uuid) -> StoreResult<Vec<CartItem>> {
        Ok(sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE patient_id = $1 ORDER BY medicine_id",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_cart_item(&self, item: CartItem) -> StoreResult<CartItem> {
        sqlx::query_as::<_, CartItem>(
            "INSERT INTO cart_items (patient_id, medicine_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (patient_id, medicine_id) DO UPDATE SET quantity = EXCLUDED.quantity \
             RETURNING *",
        )
        .bind(item.patient_id)
        .bind(item.medicine_id)
        .bind(item.quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Cart item"))
    }

    async fn remove_cart_item(&self, patient_id: Uuid, medicine_id: Uuid) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM cart_items WHERE patient_id = $1 AND medicine_id = $2")
                .bind(patient_id)
                .bind(medicine_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, patient_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE patient_id = $1")
            .bind(patient_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn place_order(&self, order: NewOrder) -> StoreResult<OrderDetail> {
        let mut transaction = self.pool.begin().await?;

        for item in &order.items {
            let updated = sqlx::query(
                "UPDATE medicines SET stock = stock - $1 WHERE id = $2 AND stock >= $1",
            )
            .bind(item.quantity)
            .bind(item.medicine_id)
            .execute(&mut *transaction)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(StoreError::InsufficientStock {
                    medicine_id: item.medicine_id,
                });
            }
        }

        let created = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (id, patient_id, branch_id, prescription_id, status, total_cents, \
             shipping_address) VALUES ($1, $2, $3, $4, 'pending', $5, $6) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(order.patient_id)
        .bind(order.branch_id)
        .bind(order.prescription_id)
        .bind(order.total_cents)
        .bind(&order.shipping_address)
        .fetch_one(&mut *transaction)
        .await
        .map_err(write_error("Order"))?;

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let row = sqlx::query_as::<_, OrderItem>(
                "INSERT INTO order_items (id, order_id, medicine_id, quantity, unit_price_cents) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(created.id)
            .bind(item.medicine_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .fetch_one(&mut *transaction)
            .await?;
            items.push(row);
        }

        sqlx::query("DELETE FROM cart_items WHERE patient_id = $1")
            .bind(order.patient_id)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(OrderDetail {
            order: created,
            items,
        })
    }

    async fn list_orders(&self, filter: OrderFilter) -> StoreResult<Vec<Order>> {
        Ok(sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE ($1::uuid IS NULL OR patient_id = $1) \
             AND ($2::order_status IS NULL OR status = $2) ORDER BY created_at DESC",
        )
        .bind(filter.patient_id)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<OrderDetail>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(order) = order else {
            return Ok(None);
        };

        let items =
            sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;

        Ok(Some(OrderDetail { order, items }))
    }

    async fn transition_order(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<Option<Order>> {
        let mut transaction = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            "UPDATE orders SET status = $3, updated_at = now() \
             WHERE id = $1 AND status = $2 RETURNING *",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *transaction)
        .await?;

        if order.is_some() && to.releases_stock() {
            sqlx::query(
                "UPDATE medicines m SET stock = m.stock + oi.quantity FROM order_items oi \
                 WHERE oi.order_id = $1 AND m.id = oi.medicine_id",
            )
            .bind(id)
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;
        Ok(order)
    }

    async fn create_prescription(
        &self,
        prescription: NewPrescription,
    ) -> StoreResult<Prescription> {
        sqlx::query_as::<_, Prescription>(
            "INSERT INTO prescriptions (id, patient_id, image_url, notes) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(prescription.patient_id)
        .bind(&prescription.image_url)
        .bind(&prescription.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Prescription"))
    }

    async fn list_prescriptions(
        &self,
        filter: PrescriptionFilter,
    ) -> StoreResult<Vec<Prescription>> {
        Ok(sqlx::query_as::<_, Prescription>(
            "SELECT * FROM prescriptions WHERE ($1::uuid IS NULL OR patient_id = $1) \
             AND ($2::prescription_status IS NULL OR status = $2) ORDER BY created_at DESC",
        )
        .bind(filter.patient_id)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_prescription(&self, id: Uuid) -> StoreResult<Option<Prescription>> {
        Ok(
            sqlx::query_as::<_, Prescription>("SELECT * FROM prescriptions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn review_prescription(
        &self,
        id: Uuid,
        review: PrescriptionReview,
    ) -> StoreResult<Option<Prescription>> {
        Ok(sqlx::query_as::<_, Prescription>(
            "UPDATE prescriptions SET status = $2, reviewed_by = $3, review_note = $4, \
             reviewed_at = $5 WHERE id = $1 AND status = $6 RETURNING *",
        )
        .bind(id)
        .bind(review.status)
        .bind(review.reviewer)
        .bind(&review.note)
        .bind(review.reviewed_at)
        .bind(PrescriptionStatus::Pending)
        .fetch_optional(&self.pool)
        .await?)
    }
}
