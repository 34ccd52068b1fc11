use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::{
        models::{Branch, Medicine, Pharmacy},
        store::{
            BranchUpdate, MedicineFilter, MedicineUpdate, NewBranch, NewMedicine, NewPharmacy,
            PharmacyUpdate,
        },
        Store,
    },
    error::{AppError, AppResult},
    utils::{required, required_if_present, validate_url, Pagination},
};

#[derive(Deserialize, Debug, Default)]
pub struct MedicineQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub in_stock: bool,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Deserialize, Debug)]
pub struct StockUpdate {
    pub stock: i32,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn browse(store: &dyn Store, query: MedicineQuery) -> AppResult<Vec<Medicine>> {
    let (limit, offset) = Pagination {
        page: query.page,
        per_page: query.per_page,
    }
    .limit_offset()?;

    let filter = MedicineFilter {
        search: non_blank(query.search),
        category: non_blank(query.category),
        in_stock: query.in_stock,
        limit,
        offset,
    };
    Ok(store.list_medicines(&filter).await?)
}

/// Every medicine, unpaginated. Used by staff views and dashboards.
pub async fn all_medicines(store: &dyn Store) -> AppResult<Vec<Medicine>> {
    let filter = MedicineFilter {
        limit: i64::MAX,
        ..Default::default()
    };
    Ok(store.list_medicines(&filter).await?)
}

pub async fn get_medicine(store: &dyn Store, id: Uuid) -> AppResult<Medicine> {
    store
        .get_medicine(id)
        .await?
        .ok_or_else(|| AppError::not_found("Medicine"))
}

/// Upper bound on a unit price, one billion in major units.
pub const MAX_PRICE_CENTS: i64 = 100_000_000_000;

fn check_amounts(price_cents: Option<i64>, stock: Option<i32>) -> AppResult<()> {
    if price_cents.is_some_and(|p| p < 0) {
        return Err(AppError::Validation(
            "price_cents must not be negative".to_string(),
        ));
    }
    if price_cents.is_some_and(|p| p > MAX_PRICE_CENTS) {
        return Err(AppError::Validation(format!(
            "price_cents must not exceed {MAX_PRICE_CENTS}"
        )));
    }
    if stock.is_some_and(|s| s < 0) {
        return Err(AppError::Validation("stock must not be negative".to_string()));
    }
    Ok(())
}

pub async fn create_medicine(store: &dyn Store, mut medicine: NewMedicine) -> AppResult<Medicine> {
    medicine.name = required(&medicine.name, "name")?;
    medicine.category = required(&medicine.category, "category")?;
    check_amounts(Some(medicine.price_cents), Some(medicine.stock))?;
    if let Some(url) = medicine.image_url.take() {
        medicine.image_url = Some(validate_url(&url, "image_url")?);
    }

    let created = store.create_medicine(medicine).await?;
    log::info!("Added medicine {} ({})", created.name, created.id);
    Ok(created)
}

pub async fn update_medicine(
    store: &dyn Store,
    id: Uuid,
    mut update: MedicineUpdate,
) -> AppResult<Medicine> {
    update.name = required_if_present(update.name, "name")?;
    update.category = required_if_present(update.category, "category")?;
    check_amounts(update.price_cents, update.stock)?;
    if let Some(Some(url)) = update.image_url.take() {
        update.image_url = Some(Some(validate_url(&url, "image_url")?));
    }

    store
        .update_medicine(id, update)
        .await?
        .ok_or_else(|| AppError::not_found("Medicine"))
}

pub async fn set_stock(store: &dyn Store, id: Uuid, update: StockUpdate) -> AppResult<Medicine> {
    check_amounts(None, Some(update.stock))?;
    let medicine = store
        .set_stock(id, update.stock)
        .await?
        .ok_or_else(|| AppError::not_found("Medicine"))?;
    log::info!("Stock of {} set to {}", medicine.name, medicine.stock);
    Ok(medicine)
}

pub async fn delete_medicine(store: &dyn Store, id: Uuid) -> AppResult<()> {
    if !store.delete_medicine(id).await? {
        return Err(AppError::not_found("Medicine"));
    }
    log::info!("Deleted medicine {}", id);
    Ok(())
}

pub async fn create_pharmacy(store: &dyn Store, mut pharmacy: NewPharmacy) -> AppResult<Pharmacy> {
    pharmacy.name = required(&pharmacy.name, "name")?;
    pharmacy.address = required(&pharmacy.address, "address")?;
    Ok(store.create_pharmacy(pharmacy).await?)
}

pub async fn update_pharmacy(
    store: &dyn Store,
    id: Uuid,
    mut update: PharmacyUpdate,
) -> AppResult<Pharmacy> {
    update.name = required_if_present(update.name, "name")?;
    update.address = required_if_present(update.address, "address")?;
    store
        .update_pharmacy(id, update)
        .await?
        .ok_or_else(|| AppError::not_found("Pharmacy"))
}

pub async fn delete_pharmacy(store: &dyn Store, id: Uuid) -> AppResult<()> {
    if !store.delete_pharmacy(id).await? {
        return Err(AppError::not_found("Pharmacy"));
    }
    Ok(())
}

pub async fn create_branch(store: &dyn Store, mut branch: NewBranch) -> AppResult<Branch> {
    branch.name = required(&branch.name, "name")?;
    branch.address = required(&branch.address, "address")?;
    Ok(store.create_branch(branch).await?)
}

pub async fn update_branch(
    store: &dyn Store,
    id: Uuid,
    mut update: BranchUpdate,
) -> AppResult<Branch> {
    update.name = required_if_present(update.name, "name")?;
    update.address = required_if_present(update.address, "address")?;
    store
        .update_branch(id, update)
        .await?
        .ok_or_else(|| AppError::not_found("Branch"))
}

pub async fn delete_branch(store: &dyn Store, id: Uuid) -> AppResult<()> {
    if !store.delete_branch(id).await? {
        return Err(AppError::not_found("Branch"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::db::MemoryStore;

    fn medicine(name: &str, category: &str, stock: i32) -> NewMedicine {
        NewMedicine {
            name: name.to_string(),
            description: None,
            category: category.to_string(),
            manufacturer: None,
            price_cents: 250,
            stock,
            requires_prescription: false,
            expiry_date: NaiveDate::from_ymd_opt(2030, 6, 30).unwrap(),
            image_url: None,
            branch_id: None,
        }
    }

    #[tokio::test]
    async fn browse_filters_by_search_category_and_stock() {
        let store = MemoryStore::new();
        create_medicine(&store, medicine("Ibuprofen", "Pain relief", 5))
            .await
            .unwrap();
        create_medicine(&store, medicine("Paracetamol", "Pain relief", 0))
            .await
            .unwrap();
        create_medicine(&store, medicine("Cetirizine", "Allergy", 9))
            .await
            .unwrap();

        let pain = browse(
            &store,
            MedicineQuery {
                category: Some("pain relief".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(pain.len(), 2);

        let stocked = browse(
            &store,
            MedicineQuery {
                category: Some("Pain relief".to_string()),
                in_stock: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(stocked.len(), 1);
        assert_eq!(stocked[0].name, "Ibuprofen");

        let searched = browse(
            &store,
            MedicineQuery {
                search: Some("IRIZ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(searched.len(), 1);
    }

    #[tokio::test]
    async fn negative_prices_are_rejected() {
        let store = MemoryStore::new();
        let mut bad = medicine("Aspirin", "Pain relief", 1);
        bad.price_cents = -1;
        assert!(matches!(
            create_medicine(&store, bad).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn prices_above_the_ceiling_are_rejected() {
        let store = MemoryStore::new();
        let mut bad = medicine("Aspirin", "Pain relief", 1);
        bad.price_cents = i64::MAX;
        assert!(matches!(
            create_medicine(&store, bad).await,
            Err(AppError::Validation(_))
        ));

        let created = create_medicine(&store, medicine("Aspirin", "Pain relief", 1))
            .await
            .unwrap();
        let update = MedicineUpdate {
            price_cents: Some(MAX_PRICE_CENTS + 1),
            ..Default::default()
        };
        assert!(matches!(
            update_medicine(&store, created.id, update).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn null_clears_optional_fields_and_absence_keeps_them() {
        let store = MemoryStore::new();
        let mut new = medicine("Aspirin", "Pain relief", 1);
        new.description = Some("Tablets".to_string());
        new.manufacturer = Some("Acme".to_string());
        let created = create_medicine(&store, new).await.unwrap();

        let update: MedicineUpdate =
            serde_json::from_str(r#"{"description": null, "stock": 4}"#).unwrap();
        let updated = update_medicine(&store, created.id, update).await.unwrap();
        assert_eq!(updated.description, None);
        assert_eq!(updated.manufacturer.as_deref(), Some("Acme"));
        assert_eq!(updated.stock, 4);
    }

    #[tokio::test]
    async fn deleting_an_unknown_medicine_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            delete_medicine(&store, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
