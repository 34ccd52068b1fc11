use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::{
    db::{
        models::{Medicine, Order, OrderStatus, PrescriptionStatus},
        store::{OrderFilter, PrescriptionFilter},
        Store,
    },
    error::AppResult,
    services::catalog,
};

#[derive(Serialize, Debug, PartialEq)]
pub struct InventoryAlerts {
    pub low_stock: Vec<Medicine>,
    pub expiring: Vec<Medicine>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub orders: u32,
    pub revenue_cents: i64,
}

#[derive(Serialize, Debug)]
pub struct AdminDashboard {
    pub patients: usize,
    pub pharmacists: usize,
    pub medicines: usize,
    pub orders_by_status: BTreeMap<&'static str, usize>,
    pub revenue_cents: i64,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub alerts: InventoryAlerts,
}

#[derive(Serialize, Debug)]
pub struct PharmacistDashboard {
    pub pending_prescriptions: usize,
    pub pending_orders: usize,
    pub approved_orders: usize,
    pub alerts: InventoryAlerts,
}

/// Splits the store's alert list into low-stock and expiring buckets. A
/// medicine that is both shows up in both.
pub async fn inventory_alerts(
    store: &dyn Store,
    low_stock: i32,
    window: Duration,
    today: NaiveDate,
) -> AppResult<InventoryAlerts> {
    let expires_before = today + window;
    let flagged = store.inventory_alerts(low_stock, expires_before).await?;

    let (low, expiring) = flagged.into_iter().fold(
        (Vec::new(), Vec::new()),
        |(mut low, mut expiring), medicine| {
            if medicine.expiry_date <= expires_before {
                expiring.push(medicine.clone());
            }
            if medicine.stock <= low_stock {
                low.push(medicine);
            }
            (low, expiring)
        },
    );

    Ok(InventoryAlerts {
        low_stock: low,
        expiring,
    })
}

/// Revenue per calendar month from billable orders, oldest month first.
pub fn monthly_revenue(orders: &[Order]) -> Vec<MonthlyRevenue> {
    let mut months: BTreeMap<(i32, u32), (u32, i64)> = BTreeMap::new();
    for order in orders.iter().filter(|o| o.status.is_billable()) {
        let key = (order.created_at.year(), order.created_at.month());
        let entry = months.entry(key).or_default();
        entry.0 += 1;
        entry.1 = entry.1.saturating_add(order.total_cents);
    }

    months
        .into_iter()
        .map(|((year, month), (orders, revenue_cents))| MonthlyRevenue {
            month: format!("{year:04}-{month:02}"),
            orders,
            revenue_cents,
        })
        .collect()
}

pub async fn admin_dashboard(
    store: &dyn Store,
    low_stock: i32,
    window: Duration,
    today: NaiveDate,
) -> AppResult<AdminDashboard> {
    let orders = store.list_orders(OrderFilter::default()).await?;

    let mut orders_by_status: BTreeMap<&'static str, usize> =
        OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for order in &orders {
        *orders_by_status.entry(order.status.as_str()).or_default() += 1;
    }

    Ok(AdminDashboard {
        patients: store.list_patients().await?.len(),
        pharmacists: store.list_pharmacists().await?.len(),
        medicines: catalog::all_medicines(store).await?.len(),
        orders_by_status,
        revenue_cents: orders
            .iter()
            .filter(|o| o.status.is_billable())
            .fold(0i64, |total, o| total.saturating_add(o.total_cents)),
        monthly_revenue: monthly_revenue(&orders),
        alerts: inventory_alerts(store, low_stock, window, today).await?,
    })
}

pub async fn pharmacist_dashboard(
    store: &dyn Store,
    low_stock: i32,
    window: Duration,
    today: NaiveDate,
) -> AppResult<PharmacistDashboard> {
    let pending_prescriptions = store
        .list_prescriptions(PrescriptionFilter {
            patient_id: None,
            status: Some(PrescriptionStatus::Pending),
        })
        .await?
        .len();
    let count_orders = |status| OrderFilter {
        patient_id: None,
        status: Some(status),
    };

    Ok(PharmacistDashboard {
        pending_prescriptions,
        pending_orders: store
            .list_orders(count_orders(OrderStatus::Pending))
            .await?
            .len(),
        approved_orders: store
            .list_orders(count_orders(OrderStatus::Approved))
            .await?
            .len(),
        alerts: inventory_alerts(store, low_stock, window, today).await?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::db::{store::NewMedicine, MemoryStore};

    fn order(year: i32, month: u32, status: OrderStatus, total: i64) -> Order {
        let at = Utc.with_ymd_and_hms(year, month, 15, 12, 0, 0).unwrap();
        Order {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            branch_id: None,
            prescription_id: None,
            status,
            total_cents: total,
            shipping_address: "x".to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn monthly_revenue_skips_unbilled_orders() {
        let orders = [
            order(2025, 2, OrderStatus::Delivered, 500),
            order(2025, 1, OrderStatus::Approved, 200),
            order(2025, 1, OrderStatus::Shipped, 300),
            order(2025, 1, OrderStatus::Rejected, 9_999),
            order(2025, 2, OrderStatus::Pending, 9_999),
        ];
        assert_eq!(
            monthly_revenue(&orders),
            vec![
                MonthlyRevenue {
                    month: "2025-01".to_string(),
                    orders: 2,
                    revenue_cents: 500,
                },
                MonthlyRevenue {
                    month: "2025-02".to_string(),
                    orders: 1,
                    revenue_cents: 500,
                },
            ]
        );
    }

    #[tokio::test]
    async fn alerts_split_low_stock_from_expiring() {
        let store = MemoryStore::new();
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let add = |name: &str, stock: i32, expiry: NaiveDate| NewMedicine {
            name: name.to_string(),
            description: None,
            category: "General".to_string(),
            manufacturer: None,
            price_cents: 100,
            stock,
            requires_prescription: false,
            expiry_date: expiry,
            image_url: None,
            branch_id: None,
        };
        let far = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let soon = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        store.create_medicine(add("Low", 2, far)).await.unwrap();
        store.create_medicine(add("Soon", 50, soon)).await.unwrap();
        store.create_medicine(add("Both", 1, soon)).await.unwrap();
        store.create_medicine(add("Fine", 50, far)).await.unwrap();

        let alerts = inventory_alerts(&store, 10, Duration::days(90), today)
            .await
            .unwrap();
        let names = |list: &[Medicine]| {
            let mut names: Vec<String> = list.iter().map(|m| m.name.clone()).collect();
            names.sort();
            names
        };
        assert_eq!(names(&alerts.low_stock), vec!["Both", "Low"]);
        assert_eq!(names(&alerts.expiring), vec!["Both", "Soon"]);
    }
}
