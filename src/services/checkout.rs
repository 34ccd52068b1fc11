use std::collections::HashMap;

use futures::future;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{
        models::{CartItem, Medicine, OrderDetail, PrescriptionStatus},
        store::{NewOrder, NewOrderItem},
        Store,
    },
    error::{AppError, AppResult},
    utils::required,
};

#[derive(Deserialize, Debug)]
pub struct AddToCart {
    pub medicine_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Deserialize, Debug)]
pub struct SetQuantity {
    pub quantity: i32,
}

#[derive(Deserialize, Debug, Default)]
pub struct CheckoutRequest {
    pub shipping_address: Option<String>,
    pub branch_id: Option<Uuid>,
    pub prescription_id: Option<Uuid>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct CartLine {
    pub medicine_id: Uuid,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
    pub line_total_cents: i64,
    pub requires_prescription: bool,
    pub in_stock: bool,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total_cents: i64,
    pub requires_prescription: bool,
}

fn amount_too_large() -> AppError {
    AppError::Validation("Order amount is too large".to_string())
}

fn line_total(unit_price_cents: i64, quantity: i32) -> AppResult<i64> {
    unit_price_cents
        .checked_mul(i64::from(quantity))
        .ok_or_else(amount_too_large)
}

/// Sum of unit price × quantity over all items. Fails instead of wrapping
/// when the amount does not fit in cents.
pub fn order_total(items: &[NewOrderItem]) -> AppResult<i64> {
    items.iter().try_fold(0i64, |total, item| {
        total
            .checked_add(line_total(item.unit_price_cents, item.quantity)?)
            .ok_or_else(amount_too_large)
    })
}

async fn medicine_with_room(store: &dyn Store, medicine_id: Uuid, quantity: i32) -> AppResult<Medicine> {
    if quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".to_string()));
    }
    let medicine = store
        .get_medicine(medicine_id)
        .await?
        .ok_or_else(|| AppError::not_found("Medicine"))?;
    if quantity > medicine.stock {
        return Err(AppError::Conflict(format!(
            "Only {} units of {} in stock",
            medicine.stock, medicine.name
        )));
    }
    line_total(medicine.price_cents, quantity)?;
    Ok(medicine)
}

async fn load_medicines(store: &dyn Store, items: &[CartItem]) -> AppResult<HashMap<Uuid, Medicine>> {
    let lookups = items.iter().map(|item| store.get_medicine(item.medicine_id));
    let found = future::try_join_all(lookups).await?;
    Ok(found
        .into_iter()
        .flatten()
        .map(|medicine| (medicine.id, medicine))
        .collect())
}

pub async fn view_cart(store: &dyn Store, patient_id: Uuid) -> AppResult<CartView> {
    let items = store.cart_items(patient_id).await?;
    let medicines = load_medicines(store, &items).await?;

    let mut lines = Vec::with_capacity(items.len());
    let mut total_cents = 0i64;
    for item in &items {
        let Some(medicine) = medicines.get(&item.medicine_id) else {
            continue;
        };
        let line_total_cents = line_total(medicine.price_cents, item.quantity)?;
        total_cents = total_cents
            .checked_add(line_total_cents)
            .ok_or_else(amount_too_large)?;
        lines.push(CartLine {
            medicine_id: medicine.id,
            name: medicine.name.clone(),
            unit_price_cents: medicine.price_cents,
            quantity: item.quantity,
            line_total_cents,
            requires_prescription: medicine.requires_prescription,
            in_stock: medicine.stock >= item.quantity,
        });
    }

    Ok(CartView {
        total_cents,
        requires_prescription: lines.iter().any(|line| line.requires_prescription),
        items: lines,
    })
}

/// Adds `quantity` units on top of whatever is already in the cart.
pub async fn add_to_cart(store: &dyn Store, patient_id: Uuid, request: AddToCart) -> AppResult<CartView> {
    if request.quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".to_string()));
    }
    let existing = store
        .cart_items(patient_id)
        .await?
        .into_iter()
        .find(|item| item.medicine_id == request.medicine_id)
        .map_or(0, |item| item.quantity);

    let quantity = existing.saturating_add(request.quantity);
    medicine_with_room(store, request.medicine_id, quantity).await?;
    store
        .upsert_cart_item(CartItem {
            patient_id,
            medicine_id: request.medicine_id,
            quantity,
        })
        .await?;
    view_cart(store, patient_id).await
}

pub async fn set_cart_quantity(
    store: &dyn Store,
    patient_id: Uuid,
    medicine_id: Uuid,
    request: SetQuantity,
) -> AppResult<CartView> {
    medicine_with_room(store, medicine_id, request.quantity).await?;
    store
        .upsert_cart_item(CartItem {
            patient_id,
            medicine_id,
            quantity: request.quantity,
        })
        .await?;
    view_cart(store, patient_id).await
}

pub async fn remove_from_cart(
    store: &dyn Store,
    patient_id: Uuid,
    medicine_id: Uuid,
) -> AppResult<CartView> {
    if !store.remove_cart_item(patient_id, medicine_id).await? {
        return Err(AppError::not_found("Cart item"));
    }
    view_cart(store, patient_id).await
}

pub async fn clear_cart(store: &dyn Store, patient_id: Uuid) -> AppResult<()> {
    Ok(store.clear_cart(patient_id).await?)
}

/// Turns the patient's cart into a pending order.
///
/// Prices are taken from the catalogue at checkout time. Prescription-only
/// medicines need an approved prescription belonging to the same patient.
pub async fn checkout(
    store: &dyn Store,
    patient_id: Uuid,
    request: CheckoutRequest,
) -> AppResult<OrderDetail> {
    let patient = store
        .get_patient(patient_id)
        .await?
        .ok_or_else(|| AppError::not_found("Patient"))?;

    let cart = store.cart_items(patient_id).await?;
    if cart.is_empty() {
        return Err(AppError::Validation("Cart is empty".to_string()));
    }

    let shipping_address = match request.shipping_address.or(patient.address) {
        Some(address) => required(&address, "shipping_address")?,
        None => {
            return Err(AppError::Validation(
                "shipping_address is required".to_string(),
            ))
        }
    };

    if let Some(branch_id) = request.branch_id {
        store
            .get_branch(branch_id)
            .await?
            .ok_or_else(|| AppError::not_found("Branch"))?;
    }

    let medicines = load_medicines(store, &cart).await?;
    let mut items = Vec::with_capacity(cart.len());
    for line in &cart {
        let medicine = medicines
            .get(&line.medicine_id)
            .ok_or_else(|| AppError::not_found("Medicine"))?;
        if medicine.stock < line.quantity {
            return Err(AppError::Conflict(format!(
                "Only {} units of {} in stock",
                medicine.stock, medicine.name
            )));
        }
        items.push(NewOrderItem {
            medicine_id: medicine.id,
            quantity: line.quantity,
            unit_price_cents: medicine.price_cents,
        });
    }

    let needs_prescription = medicines.values().any(|m| m.requires_prescription);
    if needs_prescription || request.prescription_id.is_some() {
        let prescription_id = request.prescription_id.ok_or_else(|| {
            AppError::Validation(
                "An approved prescription is required for prescription-only medicines".to_string(),
            )
        })?;
        let prescription = store
            .get_prescription(prescription_id)
            .await?
            .filter(|p| p.patient_id == patient_id)
            .ok_or_else(|| AppError::not_found("Prescription"))?;
        if prescription.status != PrescriptionStatus::Approved {
            return Err(AppError::Conflict(format!(
                "Prescription is {}, not approved",
                prescription.status
            )));
        }
    }

    let order = NewOrder {
        patient_id,
        branch_id: request.branch_id,
        prescription_id: request.prescription_id,
        shipping_address,
        total_cents: order_total(&items)?,
        items,
    };
    let placed = store.place_order(order).await?;
    log::info!(
        "Order {} placed by patient {} for {} cents",
        placed.order.id,
        patient_id,
        placed.order.total_cents
    );
    Ok(placed)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::db::{
        models::Patient,
        store::{NewMedicine, NewPatient, NewPrescription, PrescriptionReview},
        MemoryStore,
    };

    async fn patient(store: &MemoryStore) -> Patient {
        store
            .create_patient(NewPatient {
                name: "Grace".to_string(),
                email: "grace@example.com".to_string(),
                password_hash: "x".to_string(),
                phone: None,
                address: Some("7 Harbour Lane".to_string()),
                date_of_birth: None,
            })
            .await
            .unwrap()
    }

    async fn medicine(store: &MemoryStore, price: i64, stock: i32, rx: bool) -> Medicine {
        store
            .create_medicine(NewMedicine {
                name: format!("Med {price}"),
                description: None,
                category: "General".to_string(),
                manufacturer: None,
                price_cents: price,
                stock,
                requires_prescription: rx,
                expiry_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                image_url: None,
                branch_id: None,
            })
            .await
            .unwrap()
    }

    #[test]
    fn total_is_sum_of_price_times_quantity() {
        let items = [
            NewOrderItem {
                medicine_id: Uuid::new_v4(),
                quantity: 3,
                unit_price_cents: 250,
            },
            NewOrderItem {
                medicine_id: Uuid::new_v4(),
                quantity: 1,
                unit_price_cents: 1999,
            },
        ];
        assert_eq!(order_total(&items).unwrap(), 2749);
        assert_eq!(order_total(&[]).unwrap(), 0);
    }

    #[test]
    fn totals_that_do_not_fit_are_refused() {
        let items = [NewOrderItem {
            medicine_id: Uuid::new_v4(),
            quantity: i32::MAX,
            unit_price_cents: i64::MAX / 2,
        }];
        assert!(matches!(order_total(&items), Err(AppError::Validation(_))));

        let halves = [
            NewOrderItem {
                medicine_id: Uuid::new_v4(),
                quantity: 1,
                unit_price_cents: i64::MAX / 2 + 1,
            },
            NewOrderItem {
                medicine_id: Uuid::new_v4(),
                quantity: 1,
                unit_price_cents: i64::MAX / 2 + 1,
            },
        ];
        assert!(matches!(order_total(&halves), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn huge_prices_fail_validation_instead_of_overflowing() {
        let store = MemoryStore::new();
        let owner = patient(&store).await;
        let first = medicine(&store, i64::MAX / 2, 5, false).await;
        let second = medicine(&store, i64::MAX / 2 + 10, 5, false).await;
        let add = |medicine_id, quantity| AddToCart {
            medicine_id,
            quantity,
        };

        assert!(matches!(
            add_to_cart(&store, owner.id, add(first.id, 3)).await,
            Err(AppError::Validation(_))
        ));
        assert!(store.cart_items(owner.id).await.unwrap().is_empty());

        add_to_cart(&store, owner.id, add(first.id, 1)).await.unwrap();
        assert!(matches!(
            add_to_cart(&store, owner.id, add(second.id, 1)).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            checkout(&store, owner.id, CheckoutRequest::default()).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(store.get_medicine(first.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn adding_twice_accumulates_up_to_stock() {
        let store = MemoryStore::new();
        let owner = patient(&store).await;
        let med = medicine(&store, 100, 3, false).await;

        let add = |quantity| AddToCart {
            medicine_id: med.id,
            quantity,
        };
        add_to_cart(&store, owner.id, add(2)).await.unwrap();
        let cart = add_to_cart(&store, owner.id, add(1)).await.unwrap();
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(cart.total_cents, 300);

        assert!(matches!(
            add_to_cart(&store, owner.id, add(1)).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn checkout_prices_the_order_and_empties_the_cart() {
        let store = MemoryStore::new();
        let owner = patient(&store).await;
        let cheap = medicine(&store, 150, 10, false).await;
        let dear = medicine(&store, 1200, 10, false).await;

        for (id, quantity) in [(cheap.id, 4), (dear.id, 1)] {
            add_to_cart(
                &store,
                owner.id,
                AddToCart {
                    medicine_id: id,
                    quantity,
                },
            )
            .await
            .unwrap();
        }

        let placed = checkout(&store, owner.id, CheckoutRequest::default())
            .await
            .unwrap();
        assert_eq!(placed.order.total_cents, 4 * 150 + 1200);
        assert_eq!(
            placed.order.total_cents,
            placed.items.iter().map(|i| i.line_total().unwrap()).sum::<i64>()
        );
        assert_eq!(placed.order.shipping_address, "7 Harbour Lane");
        assert!(store.cart_items(owner.id).await.unwrap().is_empty());
        assert_eq!(store.get_medicine(cheap.id).await.unwrap().unwrap().stock, 6);
    }

    #[tokio::test]
    async fn prescription_only_items_need_an_approved_prescription() {
        let store = MemoryStore::new();
        let owner = patient(&store).await;
        let rx = medicine(&store, 800, 5, true).await;
        add_to_cart(
            &store,
            owner.id,
            AddToCart {
                medicine_id: rx.id,
                quantity: 1,
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            checkout(&store, owner.id, CheckoutRequest::default()).await,
            Err(AppError::Validation(_))
        ));

        let prescription = store
            .create_prescription(NewPrescription {
                patient_id: owner.id,
                image_url: "https://img.example.com/rx.png".to_string(),
                notes: None,
            })
            .await
            .unwrap();
        let with_rx = || CheckoutRequest {
            prescription_id: Some(prescription.id),
            ..Default::default()
        };
        assert!(matches!(
            checkout(&store, owner.id, with_rx()).await,
            Err(AppError::Conflict(_))
        ));

        store
            .review_prescription(
                prescription.id,
                PrescriptionReview {
                    status: PrescriptionStatus::Approved,
                    reviewer: Uuid::new_v4(),
                    note: None,
                    reviewed_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        let placed = checkout(&store, owner.id, with_rx()).await.unwrap();
        assert_eq!(placed.order.prescription_id, Some(prescription.id));
    }

    #[tokio::test]
    async fn empty_cart_cannot_be_checked_out() {
        let store = MemoryStore::new();
        let owner = patient(&store).await;
        assert!(matches!(
            checkout(&store, owner.id, CheckoutRequest::default()).await,
            Err(AppError::Validation(_))
        ));
    }
}
