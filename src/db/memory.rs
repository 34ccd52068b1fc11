//! In-process [`Store`] used by the contract tests and by
//! `STORAGE_BACKEND=memory`. It mirrors the Postgres schema rules: unique
//! e-mails, foreign keys, cascades and the check constraints on stock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
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

#[derive(Default)]
struct Tables {
    patients: Vec<(Patient, String)>,
    pharmacists: Vec<(Pharmacist, String)>,
    admins: Vec<(Admin, String)>,
    pharmacies: Vec<Pharmacy>,
    branches: Vec<Branch>,
    medicines: Vec<Medicine>,
    carts: HashMap<Uuid, Vec<CartItem>>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    prescriptions: Vec<Prescription>,
}

impl Tables {
    fn branch_exists(&self, id: Option<Uuid>) -> bool {
        id.map_or(true, |id| self.branches.iter().any(|b| b.id == id))
    }

    fn medicine_mut(&mut self, id: Uuid) -> Option<&mut Medicine> {
        self.medicines.iter_mut().find(|m| m.id == id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_credentials(&self, role: Role, email: &str) -> StoreResult<Option<Credentials>> {
        let tables = self.tables.lock().await;
        let email = email.to_lowercase();
        let found = match role {
            Role::Patient => tables
                .patients
                .iter()
                .find(|(p, _)| p.email.to_lowercase() == email)
                .map(|(p, hash)| (p.id, hash.clone())),
            Role::Pharmacist => tables
                .pharmacists
                .iter()
                .find(|(p, _)| p.email.to_lowercase() == email)
                .map(|(p, hash)| (p.id, hash.clone())),
            Role::Admin => tables
                .admins
                .iter()
                .find(|(a, _)| a.email.to_lowercase() == email)
                .map(|(a, hash)| (a.id, hash.clone())),
        };
        Ok(found.map(|(id, password_hash)| Credentials {
            id,
            role,
            password_hash,
        }))
    }

    async fn create_patient(&self, patient: NewPatient) -> StoreResult<Patient> {
        let mut tables = self.tables.lock().await;
        if tables
            .patients
            .iter()
            .any(|(p, _)| p.email.to_lowercase() == patient.email.to_lowercase())
        {
            return Err(StoreError::Duplicate("Patient".to_string()));
        }
        let created = Patient {
            id: Uuid::new_v4(),
            name: patient.name,
            email: patient.email,
            phone: patient.phone,
            address: patient.address,
            date_of_birth: patient.date_of_birth,
            created_at: Utc::now(),
        };
        tables
            .patients
            .push((created.clone(), patient.password_hash));
        Ok(created)
    }

    async fn get_patient(&self, id: Uuid) -> StoreResult<Option<Patient>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .patients
            .iter()
            .find(|(p, _)| p.id == id)
            .map(|(p, _)| p.clone()))
    }

    async fn update_patient(&self, id: Uuid, update: PatientUpdate) -> StoreResult<Option<Patient>> {
        let mut tables = self.tables.lock().await;
        let Some((patient, _)) = tables.patients.iter_mut().find(|(p, _)| p.id == id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            patient.name = name;
        }
        if let Some(phone) = update.phone {
            patient.phone = phone;
        }
        if let Some(address) = update.address {
            patient.address = address;
        }
        if let Some(date_of_birth) = update.date_of_birth {
            patient.date_of_birth = date_of_birth;
        }
        Ok(Some(patient.clone()))
    }

    async fn list_patients(&self) -> StoreResult<Vec<Patient>> {
        let tables = self.tables.lock().await;
        let mut patients: Vec<Patient> = tables.patients.iter().map(|(p, _)| p.clone()).collect();
        patients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(patients)
    }

    async fn delete_patient(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.patients.len();
        tables.patients.retain(|(p, _)| p.id != id);
        if tables.patients.len() == before {
            return Ok(false);
        }
        let tables = &mut *tables;
        tables.carts.remove(&id);
        tables.prescriptions.retain(|p| p.patient_id != id);
        let removed: Vec<(Uuid, bool)> = tables
            .orders
            .iter()
            .filter(|o| o.patient_id == id)
            .map(|o| (o.id, o.status.holds_stock()))
            .collect();

        for item in &tables.order_items {
            let reserved = removed
                .iter()
                .any(|&(order_id, holds)| holds && order_id == item.order_id);
            if !reserved {
                continue;
            }
            if let Some(medicine) = tables.medicines.iter_mut().find(|m| m.id == item.medicine_id) {
                medicine.stock = medicine.stock.saturating_add(item.quantity);
            }
        }

        tables.orders.retain(|o| o.patient_id != id);
        tables
            .order_items
            .retain(|i| !removed.iter().any(|&(order_id, _)| order_id == i.order_id));
        Ok(true)
    }

    async fn create_pharmacist(&self, pharmacist: NewPharmacist) -> StoreResult<Pharmacist> {
        let mut tables = self.tables.lock().await;
        if tables
            .pharmacists
            .iter()
            .any(|(p, _)| p.email.to_lowercase() == pharmacist.email.to_lowercase())
        {
            return Err(StoreError::Duplicate("Pharmacist".to_string()));
        }
        if !tables.branch_exists(pharmacist.branch_id) {
            return Err(StoreError::Missing("Record referenced by Pharmacist".to_string()));
        }
        let created = Pharmacist {
            id: Uuid::new_v4(),
            name: pharmacist.name,
            email: pharmacist.email,
            phone: pharmacist.phone,
            branch_id: pharmacist.branch_id,
            license_number: pharmacist.license_number,
            created_at: Utc::now(),
        };
        tables
            .pharmacists
            .push((created.clone(), pharmacist.password_hash));
        Ok(created)
    }

    async fn get_pharmacist(&self, id: Uuid) -> StoreResult<Option<Pharmacist>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .pharmacists
            .iter()
            .find(|(p, _)| p.id == id)
            .map(|(p, _)| p.clone()))
    }

    async fn update_pharmacist(
        &self,
        id: Uuid,
        update: PharmacistUpdate,
    ) -> StoreResult<Option<Pharmacist>> {
        let mut tables = self.tables.lock().await;
        if !tables.branch_exists(update.branch_id.flatten()) {
            return Err(StoreError::Missing("Record referenced by Pharmacist".to_string()));
        }
        let Some((pharmacist, _)) = tables.pharmacists.iter_mut().find(|(p, _)| p.id == id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            pharmacist.name = name;
        }
        if let Some(phone) = update.phone {
            pharmacist.phone = phone;
        }
        if let Some(branch_id) = update.branch_id {
            pharmacist.branch_id = branch_id;
        }
        if let Some(license_number) = update.license_number {
            pharmacist.license_number = license_number;
        }
        Ok(Some(pharmacist.clone()))
    }

    async fn list_pharmacists(&self) -> StoreResult<Vec<Pharmacist>> {
        let tables = self.tables.lock().await;
        let mut pharmacists: Vec<Pharmacist> =
            tables.pharmacists.iter().map(|(p, _)| p.clone()).collect();
        pharmacists.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pharmacists)
    }

    async fn delete_pharmacist(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.pharmacists.len();
        tables.pharmacists.retain(|(p, _)| p.id != id);
        if tables.pharmacists.len() == before {
            return Ok(false);
        }
        for prescription in tables
            .prescriptions
            .iter_mut()
            .filter(|p| p.reviewed_by == Some(id))
        {
            prescription.reviewed_by = None;
        }
        Ok(true)
    }

    async fn create_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        let mut tables = self.tables.lock().await;
        if tables
            .admins
            .iter()
            .any(|(a, _)| a.email.to_lowercase() == admin.email.to_lowercase())
        {
            return Err(StoreError::Duplicate("Admin".to_string()));
        }
        let created = Admin {
            id: Uuid::new_v4(),
            name: admin.name,
            email: admin.email,
            created_at: Utc::now(),
        };
        tables.admins.push((created.clone(), admin.password_hash));
        Ok(created)
    }

    async fn get_admin(&self, id: Uuid) -> StoreResult<Option<Admin>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .admins
            .iter()
            .find(|(a, _)| a.id == id)
            .map(|(a, _)| a.clone()))
    }

    async fn list_pharmacies(&self) -> StoreResult<Vec<Pharmacy>> {
        let tables = self.tables.lock().await;
        let mut pharmacies = tables.pharmacies.clone();
        pharmacies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pharmacies)
    }

    async fn create_pharmacy(&self, pharmacy: NewPharmacy) -> StoreResult<Pharmacy> {
        let mut tables = self.tables.lock().await;
        let created = Pharmacy {
            id: Uuid::new_v4(),
            name: pharmacy.name,
            address: pharmacy.address,
            phone: pharmacy.phone,
            created_at: Utc::now(),
        };
        tables.pharmacies.push(created.clone());
        Ok(created)
    }

    async fn update_pharmacy(
        &self,
        id: Uuid,
        update: PharmacyUpdate,
    ) -> StoreResult<Option<Pharmacy>> {
        let mut tables = self.tables.lock().await;
        let Some(pharmacy) = tables.pharmacies.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            pharmacy.name = name;
        }
        if let Some(address) = update.address {
            pharmacy.address = address;
        }
        if let Some(phone) = update.phone {
            pharmacy.phone = phone;
        }
        Ok(Some(pharmacy.clone()))
    }

    async fn delete_pharmacy(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.branches.iter().any(|b| b.pharmacy_id == id) {
            return Err(StoreError::InUse("Pharmacy".to_string()));
        }
        let before = tables.pharmacies.len();
        tables.pharmacies.retain(|p| p.id != id);
        Ok(tables.pharmacies.len() < before)
    }

    async fn list_branches(&self) -> StoreResult<Vec<Branch>> {
        let tables = self.tables.lock().await;
        let mut branches = tables.branches.clone();
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }

    async fn get_branch(&self, id: Uuid) -> StoreResult<Option<Branch>> {
        let tables = self.tables.lock().await;
        Ok(tables.branches.iter().find(|b| b.id == id).cloned())
    }

    async fn create_branch(&self, branch: NewBranch) -> StoreResult<Branch> {
        let mut tables = self.tables.lock().await;
        if !tables.pharmacies.iter().any(|p| p.id == branch.pharmacy_id) {
            return Err(StoreError::Missing("Record referenced by Branch".to_string()));
        }
        let created = Branch {
            id: Uuid::new_v4(),
            pharmacy_id: branch.pharmacy_id,
            name: branch.name,
            address: branch.address,
            phone: branch.phone,
            created_at: Utc::now(),
        };
        tables.branches.push(created.clone());
        Ok(created)
    }

    async fn update_branch(&self, id: Uuid, update: BranchUpdate) -> StoreResult<Option<Branch>> {
        let mut tables = self.tables.lock().await;
        let Some(branch) = tables.branches.iter_mut().find(|b| b.id == id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            branch.name = name;
        }
        if let Some(address) = update.address {
            branch.address = address;
        }
        if let Some(phone) = update.phone {
            branch.phone = phone;
        }
        Ok(Some(branch.clone()))
    }

    async fn delete_branch(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.branches.len();
        tables.branches.retain(|b| b.id != id);
        if tables.branches.len() == before {
            return Ok(false);
        }
        let tables = &mut *tables;
        for (pharmacist, _) in tables.pharmacists.iter_mut() {
            if pharmacist.branch_id == Some(id) {
                pharmacist.branch_id = None;
            }
        }
        for medicine in tables.medicines.iter_mut() {
            if medicine.branch_id == Some(id) {
                medicine.branch_id = None;
            }
        }
        for order in tables.orders.iter_mut() {
            if order.branch_id == Some(id) {
                order.branch_id = None;
            }
        }
        Ok(true)
    }

    async fn list_medicines(&self, filter: &MedicineFilter) -> StoreResult<Vec<Medicine>> {
        let tables = self.tables.lock().await;
        let search = filter.search.as_ref().map(|s| s.to_lowercase());
        let category = filter.category.as_ref().map(|c| c.to_lowercase());

        let mut medicines: Vec<Medicine> = tables
            .medicines
            .iter()
            .filter(|m| {
                search.as_ref().map_or(true, |s| {
                    m.name.to_lowercase().contains(s)
                        || m
                            .description
                            .as_ref()
                            .is_some_and(|d| d.to_lowercase().contains(s))
                })
            })
            .filter(|m| {
                category
                    .as_ref()
                    .map_or(true, |c| m.category.to_lowercase() == *c)
            })
            .filter(|m| !filter.in_stock || m.stock > 0)
            .cloned()
            .collect();
        medicines.sort_by(|a, b| a.name.cmp(&b.name));

        let offset = usize::try_from(filter.offset).unwrap_or(0);
        let limit = usize::try_from(filter.limit).unwrap_or(0);
        Ok(medicines.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_medicine(&self, id: Uuid) -> StoreResult<Option<Medicine>> {
        let tables = self.tables.lock().await;
        Ok(tables.medicines.iter().find(|m| m.id == id).cloned())
    }

    async fn create_medicine(&self, medicine: NewMedicine) -> StoreResult<Medicine> {
        let mut tables = self.tables.lock().await;
        if !tables.branch_exists(medicine.branch_id) {
            return Err(StoreError::Missing("Record referenced by Medicine".to_string()));
        }
        let created = Medicine {
            id: Uuid::new_v4(),
            name: medicine.name,
            description: medicine.description,
            category: medicine.category,
            manufacturer: medicine.manufacturer,
            price_cents: medicine.price_cents,
            stock: medicine.stock,
            requires_prescription: medicine.requires_prescription,
            expiry_date: medicine.expiry_date,
            image_url: medicine.image_url,
            branch_id: medicine.branch_id,
            created_at: Utc::now(),
        };
        tables.medicines.push(created.clone());
        Ok(created)
    }

    async fn update_medicine(
        &self,
        id: Uuid,
        update: MedicineUpdate,
    ) -> StoreResult<Option<Medicine>> {
        let mut tables = self.tables.lock().await;
        if !tables.branch_exists(update.branch_id.flatten()) {
            return Err(StoreError::Missing("Record referenced by Medicine".to_string()));
        }
        let Some(medicine) = tables.medicine_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            medicine.name = name;
        }
        if let Some(description) = update.description {
            medicine.description = description;
        }
        if let Some(category) = update.category {
            medicine.category = category;
        }
        if let Some(manufacturer) = update.manufacturer {
            medicine.manufacturer = manufacturer;
        }
        if let Some(price_cents) = update.price_cents {
            medicine.price_cents = price_cents;
        }
        if let Some(stock) = update.stock {
            medicine.stock = stock;
        }
        if let Some(requires_prescription) = update.requires_prescription {
            medicine.requires_prescription = requires_prescription;
        }
        if let Some(expiry_date) = update.expiry_date {
            medicine.expiry_date = expiry_date;
        }
        if let Some(image_url) = update.image_url {
            medicine.image_url = image_url;
        }
        if let Some(branch_id) = update.branch_id {
            medicine.branch_id = branch_id;
        }
        Ok(Some(medicine.clone()))
    }

    async fn set_stock(&self, id: Uuid, stock: i32) -> StoreResult<Option<Medicine>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.medicine_mut(id).map(|medicine| {
            medicine.stock = stock;
            medicine.clone()
        }))
    }

    async fn delete_medicine(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.order_items.iter().any(|i| i.medicine_id == id) {
            return Err(StoreError::InUse("Medicine".to_string()));
        }
        let before = tables.medicines.len();
        tables.medicines.retain(|m| m.id != id);
        for cart in tables.carts.values_mut() {
            cart.retain(|item| item.medicine_id != id);
        }
        Ok(tables.medicines.len() < before)
    }

    async fn inventory_alerts(
        &self,
        low_stock: i32,
        expires_before: NaiveDate,
    ) -> StoreResult<Vec<Medicine>> {
        let tables = self.tables.lock().await;
        let mut medicines: Vec<Medicine> = tables
            .medicines
            .iter()
            .filter(|m| m.stock <= low_stock || m.expiry_date <= expires_before)
            .cloned()
            .collect();
        medicines.sort_by_key(|m| m.expiry_date);
        Ok(medicines)
    }

    async fn cart_items(&self, patient_id: Uuid) -> StoreResult<Vec<CartItem>> {
        let tables = self.tables.lock().await;
        let mut items = tables.carts.get(&patient_id).cloned().unwrap_or_default();
        items.sort_by_key(|item| item.medicine_id);
        Ok(items)
    }

    async fn upsert_cart_item(&self, item: CartItem) -> StoreResult<CartItem> {
        let mut tables = self.tables.lock().await;
        if !tables.patients.iter().any(|(p, _)| p.id == item.patient_id)
            || !tables.medicines.iter().any(|m| m.id == item.medicine_id)
        {
            return Err(StoreError::Missing("Record referenced by Cart item".to_string()));
        }
        let cart = tables.carts.entry(item.patient_id).or_default();
        match cart.iter_mut().find(|i| i.medicine_id == item.medicine_id) {
            Some(existing) => existing.quantity = item.quantity,
            None => cart.push(item.clone()),
        }
        Ok(item)
    }

    async fn remove_cart_item(&self, patient_id: Uuid, medicine_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(cart) = tables.carts.get_mut(&patient_id) else {
            return Ok(false);
        };
        let before = cart.len();
        cart.retain(|item| item.medicine_id != medicine_id);
        Ok(cart.len() < before)
    }

    async fn clear_cart(&self, patient_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.carts.remove(&patient_id);
        Ok(())
    }

    async fn place_order(&self, order: NewOrder) -> StoreResult<OrderDetail> {
        let mut tables = self.tables.lock().await;

        // Check everything before touching stock so a failure leaves no trace.
        for item in &order.items {
            let available = tables
                .medicines
                .iter()
                .find(|m| m.id == item.medicine_id)
                .map_or(0, |m| m.stock);
            if available < item.quantity {
                return Err(StoreError::InsufficientStock {
                    medicine_id: item.medicine_id,
                });
            }
        }
        if !tables.patients.iter().any(|(p, _)| p.id == order.patient_id)
            || !tables.branch_exists(order.branch_id)
            || order
                .prescription_id
                .is_some_and(|id| !tables.prescriptions.iter().any(|p| p.id == id))
        {
            return Err(StoreError::Missing("Record referenced by Order".to_string()));
        }

        for item in &order.items {
            if let Some(medicine) = tables.medicine_mut(item.medicine_id) {
                medicine.stock -= item.quantity;
            }
        }

        let now = Utc::now();
        let created = Order {
            id: Uuid::new_v4(),
            patient_id: order.patient_id,
            branch_id: order.branch_id,
            prescription_id: order.prescription_id,
            status: OrderStatus::Pending,
            total_cents: order.total_cents,
            shipping_address: order.shipping_address,
            created_at: now,
            updated_at: now,
        };
        let items: Vec<OrderItem> = order
            .items
            .iter()
            .map(|item| OrderItem {
                id: Uuid::new_v4(),
                order_id: created.id,
                medicine_id: item.medicine_id,
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
            })
            .collect();

        tables.orders.push(created.clone());
        tables.order_items.extend(items.iter().cloned());
        tables.carts.remove(&order.patient_id);

        Ok(OrderDetail {
            order: created,
            items,
        })
    }

    async fn list_orders(&self, filter: OrderFilter) -> StoreResult<Vec<Order>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .iter()
            .filter(|o| filter.patient_id.map_or(true, |id| o.patient_id == id))
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<OrderDetail>> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.iter().find(|o| o.id == id).map(|order| OrderDetail {
            order: order.clone(),
            items: tables
                .order_items
                .iter()
                .filter(|i| i.order_id == id)
                .cloned()
                .collect(),
        }))
    }

    async fn transition_order(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<Option<Order>> {
        let mut tables = self.tables.lock().await;
        let tables = &mut *tables;
        let Some(order) = tables
            .orders
            .iter_mut()
            .find(|o| o.id == id && o.status == from)
        else {
            return Ok(None);
        };
        order.status = to;
        order.updated_at = Utc::now();
        let updated = order.clone();

        if to.releases_stock() {
            for item in tables.order_items.iter().filter(|i| i.order_id == id) {
                if let Some(medicine) = tables.medicines.iter_mut().find(|m| m.id == item.medicine_id) {
                    medicine.stock = medicine.stock.saturating_add(item.quantity);
                }
            }
        }

        Ok(Some(updated))
    }

    async fn create_prescription(
        &self,
        prescription: NewPrescription,
    ) -> StoreResult<Prescription> {
        let mut tables = self.tables.lock().await;
        if !tables
            .patients
            .iter()
            .any(|(p, _)| p.id == prescription.patient_id)
        {
            return Err(StoreError::Missing(
                "Record referenced by Prescription".to_string(),
            ));
        }
        let created = Prescription {
            id: Uuid::new_v4(),
            patient_id: prescription.patient_id,
            image_url: prescription.image_url,
            notes: prescription.notes,
            status: PrescriptionStatus::Pending,
            reviewed_by: None,
            review_note: None,
            created_at: Utc::now(),
            reviewed_at: None,
        };
        tables.prescriptions.push(created.clone());
        Ok(created)
    }

    async fn list_prescriptions(
        &self,
        filter: PrescriptionFilter,
    ) -> StoreResult<Vec<Prescription>> {
        let tables = self.tables.lock().await;
        let mut prescriptions: Vec<Prescription> = tables
            .prescriptions
            .iter()
            .filter(|p| filter.patient_id.map_or(true, |id| p.patient_id == id))
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        prescriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(prescriptions)
    }

    async fn get_prescription(&self, id: Uuid) -> StoreResult<Option<Prescription>> {
        let tables = self.tables.lock().await;
        Ok(tables.prescriptions.iter().find(|p| p.id == id).cloned())
    }

    async fn review_prescription(
        &self,
        id: Uuid,
        review: PrescriptionReview,
    ) -> StoreResult<Option<Prescription>> {
        let mut tables = self.tables.lock().await;
        let Some(prescription) = tables
            .prescriptions
            .iter_mut()
            .find(|p| p.id == id && p.status == PrescriptionStatus::Pending)
        else {
            return Ok(None);
        };
        prescription.status = review.status;
        prescription.reviewed_by = Some(review.reviewer);
        prescription.review_note = review.note;
        prescription.reviewed_at = Some(review.reviewed_at);
        Ok(Some(prescription.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::NewOrderItem;

    fn medicine(stock: i32) -> NewMedicine {
        NewMedicine {
            name: "Aspirin".to_string(),
            description: None,
            category: "Pain relief".to_string(),
            manufacturer: None,
            price_cents: 499,
            stock,
            requires_prescription: false,
            expiry_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            image_url: None,
            branch_id: None,
        }
    }

    fn patient(email: &str) -> NewPatient {
        NewPatient {
            name: "Ada".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            phone: None,
            address: None,
            date_of_birth: None,
        }
    }

    #[tokio::test]
    async fn duplicate_patient_email_is_rejected() {
        let store = MemoryStore::new();
        store.create_patient(patient("ada@example.com")).await.unwrap();
        let err = store
            .create_patient(patient("ADA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn place_order_is_all_or_nothing() {
        let store = MemoryStore::new();
        let owner = store.create_patient(patient("ada@example.com")).await.unwrap();
        let plenty = store.create_medicine(medicine(10)).await.unwrap();
        let scarce = store.create_medicine(medicine(1)).await.unwrap();

        let err = store
            .place_order(NewOrder {
                patient_id: owner.id,
                branch_id: None,
                prescription_id: None,
                shipping_address: "1 Main St".to_string(),
                total_cents: 0,
                items: vec![
                    NewOrderItem {
                        medicine_id: plenty.id,
                        quantity: 5,
                        unit_price_cents: 499,
                    },
                    NewOrderItem {
                        medicine_id: scarce.id,
                        quantity: 2,
                        unit_price_cents: 499,
                    },
                ],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InsufficientStock { medicine_id } if medicine_id == scarce.id));
        let untouched = store.get_medicine(plenty.id).await.unwrap().unwrap();
        assert_eq!(untouched.stock, 10);
    }

    #[tokio::test]
    async fn rejecting_an_order_restocks_its_items() {
        let store = MemoryStore::new();
        let owner = store.create_patient(patient("ada@example.com")).await.unwrap();
        let med = store.create_medicine(medicine(10)).await.unwrap();
        let placed = store
            .place_order(NewOrder {
                patient_id: owner.id,
                branch_id: None,
                prescription_id: None,
                shipping_address: "1 Main St".to_string(),
                total_cents: 1497,
                items: vec![NewOrderItem {
                    medicine_id: med.id,
                    quantity: 3,
                    unit_price_cents: 499,
                }],
            })
            .await
            .unwrap();
        assert_eq!(store.get_medicine(med.id).await.unwrap().unwrap().stock, 7);

        let rejected = store
            .transition_order(placed.order.id, OrderStatus::Pending, OrderStatus::Rejected)
            .await
            .unwrap();
        assert!(rejected.is_some());
        assert_eq!(store.get_medicine(med.id).await.unwrap().unwrap().stock, 10);

        let stale = store
            .transition_order(placed.order.id, OrderStatus::Pending, OrderStatus::Approved)
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn deleting_a_patient_returns_reserved_units() {
        let store = MemoryStore::new();
        let owner = store.create_patient(patient("ada@example.com")).await.unwrap();
        let med = store.create_medicine(medicine(10)).await.unwrap();
        let order = |quantity| NewOrder {
            patient_id: owner.id,
            branch_id: None,
            prescription_id: None,
            shipping_address: "1 Main St".to_string(),
            total_cents: 499 * i64::from(quantity),
            items: vec![NewOrderItem {
                medicine_id: med.id,
                quantity,
                unit_price_cents: 499,
            }],
        };

        store.place_order(order(1)).await.unwrap();
        let approved = store.place_order(order(2)).await.unwrap();
        let shipped = store.place_order(order(3)).await.unwrap();
        store
            .transition_order(approved.order.id, OrderStatus::Pending, OrderStatus::Approved)
            .await
            .unwrap();
        for (from, to) in [
            (OrderStatus::Pending, OrderStatus::Approved),
            (OrderStatus::Approved, OrderStatus::Shipped),
        ] {
            store
                .transition_order(shipped.order.id, from, to)
                .await
                .unwrap();
        }
        assert_eq!(store.get_medicine(med.id).await.unwrap().unwrap().stock, 4);

        assert!(store.delete_patient(owner.id).await.unwrap());
        assert_eq!(store.get_medicine(med.id).await.unwrap().unwrap().stock, 7);
        assert!(store.list_orders(OrderFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ordered_medicines_cannot_be_deleted() {
        let store = MemoryStore::new();
        let owner = store.create_patient(patient("ada@example.com")).await.unwrap();
        let med = store.create_medicine(medicine(10)).await.unwrap();
        store
            .place_order(NewOrder {
                patient_id: owner.id,
                branch_id: None,
                prescription_id: None,
                shipping_address: "1 Main St".to_string(),
                total_cents: 499,
                items: vec![NewOrderItem {
                    medicine_id: med.id,
                    quantity: 1,
                    unit_price_cents: 499,
                }],
            })
            .await
            .unwrap();

        let err = store.delete_medicine(med.id).await.unwrap_err();
        assert!(matches!(err, StoreError::InUse(_)));
    }
}
