use std::sync::Arc;

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::{
    db::{models::Medicine, Store},
    error::AppResult,
    services::dashboard::inventory_alerts,
    state::Settings,
    utils::format_date,
};

/// Schedules the inventory alert scan.
///
/// The job runs on the cron expression `schedule` (six fields, seconds
/// first) and logs every medicine that is low on stock or close to expiry.
/// The scheduler runs on its own task; this returns once it is started.
pub async fn schedule_inventory_alerts(
    store: Arc<dyn Store>,
    settings: Arc<Settings>,
    schedule: &str,
) -> Result<(), JobSchedulerError> {
    let sched = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _l| {
        let store = store.clone();
        let settings = settings.clone();
        Box::pin(async move {
            match check_inventory(store.as_ref(), &settings).await {
                Ok(count) => log::info!("Inventory check completed, {} alert(s)", count),
                Err(e) => log::error!("Error checking inventory: {}", e),
            }
        })
    })
    .map_err(|e| {
        log::error!("Failed to create job: {}", e);
        e
    })?;

    sched.add(job).await.map_err(|e| {
        log::error!("Failed to add job to scheduler: {}", e);
        e
    })?;

    tokio::spawn(async move {
        if let Err(e) = sched.start().await {
            log::error!("Scheduler error: {}", e);
        }
    });

    log::info!("Inventory alert scheduler started ({})", schedule);
    Ok(())
}

/// Logs one line per flagged medicine and returns how many were flagged.
pub async fn check_inventory(store: &dyn Store, settings: &Settings) -> AppResult<usize> {
    let today = Utc::now().date_naive();
    let alerts = inventory_alerts(
        store,
        settings.low_stock_threshold,
        settings.expiry_window,
        today,
    )
    .await?;

    for medicine in &alerts.low_stock {
        log::warn!("{}", low_stock_message(medicine));
    }
    for medicine in &alerts.expiring {
        log::warn!("{}", expiry_message(medicine, today));
    }

    Ok(alerts.low_stock.len() + alerts.expiring.len())
}

fn low_stock_message(medicine: &Medicine) -> String {
    format!(
        "Low stock: {} ({}) has {} unit(s) left",
        medicine.name, medicine.id, medicine.stock
    )
}

fn expiry_message(medicine: &Medicine, today: chrono::NaiveDate) -> String {
    let days_until_expiry = (medicine.expiry_date - today).num_days();
    if days_until_expiry < 0 {
        format!(
            "Expired: {} ({}) expired on {}, {} unit(s) in stock",
            medicine.name,
            medicine.id,
            format_date(medicine.expiry_date),
            medicine.stock
        )
    } else {
        format!(
            "Expiring: {} ({}) expires on {} in {} day(s), {} unit(s) in stock",
            medicine.name,
            medicine.id,
            format_date(medicine.expiry_date),
            days_until_expiry,
            medicine.stock
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    use super::*;

    fn medicine(expiry: NaiveDate) -> Medicine {
        Medicine {
            id: Uuid::nil(),
            name: "Amoxicillin".to_string(),
            description: None,
            category: "Antibiotic".to_string(),
            manufacturer: None,
            price_cents: 900,
            stock: 3,
            requires_prescription: true,
            expiry_date: expiry,
            image_url: None,
            branch_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn expiry_message_counts_days() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let message = expiry_message(&medicine(today + Duration::days(30)), today);
        assert!(message.starts_with("Expiring: Amoxicillin"));
        assert!(message.contains("01-07-2025 in 30 day(s)"));
    }

    #[test]
    fn past_dates_are_reported_as_expired() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let message = expiry_message(&medicine(today - Duration::days(1)), today);
        assert!(message.starts_with("Expired: Amoxicillin"));
    }

    #[test]
    fn low_stock_message_names_the_count() {
        let message = low_stock_message(&medicine(NaiveDate::MAX));
        assert!(message.ends_with("has 3 unit(s) left"));
    }
}
