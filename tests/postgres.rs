//! Runs the store contract against a real database. Set `TEST_DATABASE_URL`
//! to a Postgres URL to enable; the test is skipped otherwise.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use pharmacy_api::db::{
    init_db,
    models::{OrderStatus, PrescriptionStatus},
    store::{
        MedicineFilter, MedicineUpdate, NewMedicine, NewOrder, NewOrderItem, NewPatient,
        NewPharmacist, NewPrescription, PatientUpdate, PrescriptionReview,
    },
    PgStore, Store, StoreError,
};

fn patient(tag: &str) -> NewPatient {
    NewPatient {
        name: "Ada".to_string(),
        email: format!("ada-{tag}@example.com"),
        password_hash: "hash".to_string(),
        phone: Some("555-0100".to_string()),
        address: Some("1 Main St".to_string()),
        date_of_birth: None,
    }
}

fn medicine(name: String, stock: i32) -> NewMedicine {
    NewMedicine {
        name,
        description: Some("Tablets".to_string()),
        category: "General".to_string(),
        manufacturer: None,
        price_cents: 499,
        stock,
        requires_prescription: false,
        expiry_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
        image_url: None,
        branch_id: None,
    }
}

fn order(patient_id: Uuid, items: &[(Uuid, i32)]) -> NewOrder {
    NewOrder {
        patient_id,
        branch_id: None,
        prescription_id: None,
        shipping_address: "1 Main St".to_string(),
        total_cents: items.iter().map(|&(_, q)| 499 * i64::from(q)).sum(),
        items: items
            .iter()
            .map(|&(medicine_id, quantity)| NewOrderItem {
                medicine_id,
                quantity,
                unit_price_cents: 499,
            })
            .collect(),
    }
}

async fn stock(store: &PgStore, id: Uuid) -> i32 {
    store.get_medicine(id).await.unwrap().unwrap().stock
}

/// A single test: every step shares one database.
#[tokio::test]
async fn postgres_store_contract() {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL is not set, skipping");
        return;
    };
    let store = PgStore::new(init_db(&url).await.unwrap());
    let tag = Uuid::new_v4().simple().to_string();

    let owner = store.create_patient(patient(&tag)).await.unwrap();
    let plenty = store
        .create_medicine(medicine(format!("Plenty {tag}"), 10))
        .await
        .unwrap();
    let scarce = store
        .create_medicine(medicine(format!("Scarce {tag}"), 1))
        .await
        .unwrap();

    // A failing line rolls back every earlier decrement.
    let err = store
        .place_order(order(owner.id, &[(plenty.id, 5), (scarce.id, 2)]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InsufficientStock { medicine_id } if medicine_id == scarce.id));
    assert_eq!(stock(&store, plenty.id).await, 10);

    // Compare-and-set transitions, with stock returned on rejection.
    let placed = store
        .place_order(order(owner.id, &[(plenty.id, 3)]))
        .await
        .unwrap();
    assert_eq!(stock(&store, plenty.id).await, 7);
    let rejected = store
        .transition_order(placed.order.id, OrderStatus::Pending, OrderStatus::Rejected)
        .await
        .unwrap();
    assert_eq!(rejected.map(|o| o.status), Some(OrderStatus::Rejected));
    assert_eq!(stock(&store, plenty.id).await, 10);
    let stale = store
        .transition_order(placed.order.id, OrderStatus::Pending, OrderStatus::Approved)
        .await
        .unwrap();
    assert!(stale.is_none());
    assert_eq!(stock(&store, plenty.id).await, 10);

    // Prescription reviews are compare-and-set too.
    let reviewer = store
        .create_pharmacist(NewPharmacist {
            name: "Ola".to_string(),
            email: format!("ola-{tag}@example.com"),
            password_hash: "hash".to_string(),
            phone: None,
            branch_id: None,
            license_number: format!("PH-{tag}"),
        })
        .await
        .unwrap();
    let prescription = store
        .create_prescription(NewPrescription {
            patient_id: owner.id,
            image_url: "https://img.example.com/rx.png".to_string(),
            notes: None,
        })
        .await
        .unwrap();
    let review = |status| PrescriptionReview {
        status,
        reviewer: reviewer.id,
        note: None,
        reviewed_at: Utc::now(),
    };
    let approved = store
        .review_prescription(prescription.id, review(PrescriptionStatus::Approved))
        .await
        .unwrap();
    assert_eq!(approved.map(|p| p.status), Some(PrescriptionStatus::Approved));
    let again = store
        .review_prescription(prescription.id, review(PrescriptionStatus::Rejected))
        .await
        .unwrap();
    assert!(again.is_none());

    // Explicit nulls clear columns, absent fields are kept.
    let cleared = store
        .update_patient(
            owner.id,
            PatientUpdate {
                phone: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cleared.phone, None);
    assert_eq!(cleared.address.as_deref(), Some("1 Main St"));
    let described = store
        .update_medicine(
            plenty.id,
            MedicineUpdate {
                description: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(described.description, None);
    assert_eq!(described.stock, 10);

    // Search matches wildcard characters literally.
    let percent = store
        .create_medicine(medicine(format!("Aloe 100% {tag}"), 4))
        .await
        .unwrap();
    let search = |term: String| MedicineFilter {
        search: Some(term),
        limit: 50,
        ..Default::default()
    };
    let found = store
        .list_medicines(&search(format!("100% {tag}")))
        .await
        .unwrap();
    assert_eq!(found.iter().map(|m| m.id).collect::<Vec<_>>(), [percent.id]);
    let wildcard = store.list_medicines(&search("%".to_string())).await.unwrap();
    assert!(wildcard.iter().all(|m| {
        m.name.contains('%') || m.description.as_deref().is_some_and(|d| d.contains('%'))
    }));
    let underscore = store
        .list_medicines(&search(format!("Plenty_{tag}")))
        .await
        .unwrap();
    assert!(underscore.is_empty());

    // Deleting a patient returns units held by open orders only.
    let pending = store
        .place_order(order(owner.id, &[(plenty.id, 1), (scarce.id, 1)]))
        .await
        .unwrap();
    let shipped = store
        .place_order(order(owner.id, &[(plenty.id, 2)]))
        .await
        .unwrap();
    let approved = store
        .place_order(order(owner.id, &[(plenty.id, 3)]))
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
    store
        .transition_order(approved.order.id, OrderStatus::Pending, OrderStatus::Approved)
        .await
        .unwrap();
    assert_eq!(stock(&store, plenty.id).await, 4);
    assert_eq!(stock(&store, scarce.id).await, 0);

    assert!(store.delete_patient(owner.id).await.unwrap());
    assert_eq!(stock(&store, plenty.id).await, 8);
    assert_eq!(stock(&store, scarce.id).await, 1);
    assert!(store.get_order(pending.order.id).await.unwrap().is_none());
    assert!(!store.delete_patient(owner.id).await.unwrap());
}
