//! Loads a starter data set: one admin, one pharmacy with a branch, one
//! pharmacist and a small medicine catalogue. Does nothing if pharmacies
//! already exist.
//!
//! Both account passwords must be given through `SEED_ADMIN_PASSWORD` and
//! `SEED_PHARMACIST_PASSWORD`; there are no built-in defaults.

use chrono::NaiveDate;
use dotenvy::dotenv;
use envconfig::Envconfig;

use pharmacy_api::{
    db::{init_db, store::NewBranch, store::NewMedicine, store::NewPharmacy, PgStore, Store},
    error::AppResult,
    services::{
        accounts::{self, CreatePharmacist},
        catalog,
    },
    Error,
};

#[derive(Envconfig)]
struct SeedConfig {
    #[envconfig(from = "DATABASE_URL")]
    database_url: String,

    #[envconfig(from = "SEED_ADMIN_EMAIL", default = "admin@pharmacy.local")]
    admin_email: String,

    #[envconfig(from = "SEED_ADMIN_PASSWORD")]
    admin_password: String,

    #[envconfig(from = "SEED_PHARMACIST_EMAIL", default = "pharmacist@pharmacy.local")]
    pharmacist_email: String,

    #[envconfig(from = "SEED_PHARMACIST_PASSWORD")]
    pharmacist_password: String,
}

struct SeedMedicine {
    name: &'static str,
    category: &'static str,
    price_cents: i64,
    stock: i32,
    requires_prescription: bool,
    expiry: (i32, u32, u32),
}

const MEDICINES: &[SeedMedicine] = &[
    SeedMedicine {
        name: "Aspirin",
        category: "Pain Relief",
        price_cents: 499,
        stock: 500,
        requires_prescription: false,
        expiry: (2027, 6, 30),
    },
    SeedMedicine {
        name: "Amoxicillin",
        category: "Antibiotic",
        price_cents: 1299,
        stock: 300,
        requires_prescription: true,
        expiry: (2026, 12, 31),
    },
    SeedMedicine {
        name: "Lisinopril",
        category: "Cardiovascular",
        price_cents: 899,
        stock: 400,
        requires_prescription: true,
        expiry: (2027, 3, 15),
    },
    SeedMedicine {
        name: "Levothyroxine",
        category: "Hormone",
        price_cents: 1099,
        stock: 250,
        requires_prescription: true,
        expiry: (2028, 1, 31),
    },
    SeedMedicine {
        name: "Metformin",
        category: "Diabetes",
        price_cents: 749,
        stock: 350,
        requires_prescription: true,
        expiry: (2027, 9, 30),
    },
    SeedMedicine {
        name: "Amlodipine",
        category: "Cardiovascular",
        price_cents: 959,
        stock: 200,
        requires_prescription: true,
        expiry: (2026, 11, 30),
    },
    SeedMedicine {
        name: "Ibuprofen",
        category: "Pain Relief",
        price_cents: 599,
        stock: 8,
        requires_prescription: false,
        expiry: (2027, 8, 31),
    },
    SeedMedicine {
        name: "Cetirizine",
        category: "Allergy",
        price_cents: 650,
        stock: 150,
        requires_prescription: false,
        expiry: (2027, 2, 28),
    },
];

async fn seed(store: &dyn Store, config: &SeedConfig) -> AppResult<()> {
    if !store.list_pharmacies().await?.is_empty() {
        log::info!("Pharmacies already present, skipping seed");
        return Ok(());
    }

    let admin =
        accounts::create_admin(store, "Administrator", &config.admin_email, &config.admin_password)
            .await?;
    log::info!("Seeded admin {}", admin.email);

    let pharmacy = catalog::create_pharmacy(
        store,
        NewPharmacy {
            name: "Central Pharmacy".to_string(),
            address: "1 Market Street".to_string(),
            phone: Some("+1 555 0100".to_string()),
        },
    )
    .await?;
    let branch = catalog::create_branch(
        store,
        NewBranch {
            pharmacy_id: pharmacy.id,
            name: "Downtown".to_string(),
            address: "12 Main Street".to_string(),
            phone: None,
        },
    )
    .await?;

    let pharmacist = accounts::create_pharmacist(
        store,
        CreatePharmacist {
            name: "Head Pharmacist".to_string(),
            email: config.pharmacist_email.clone(),
            password: config.pharmacist_password.clone(),
            phone: None,
            branch_id: Some(branch.id),
            license_number: "PH-0001".to_string(),
        },
    )
    .await?;
    log::info!("Seeded pharmacist {}", pharmacist.email);

    for medicine in MEDICINES {
        let (year, month, day) = medicine.expiry;
        let Some(expiry_date) = NaiveDate::from_ymd_opt(year, month, day) else {
            log::warn!("Skipping {} with invalid expiry date", medicine.name);
            continue;
        };
        catalog::create_medicine(
            store,
            NewMedicine {
                name: medicine.name.to_string(),
                description: None,
                category: medicine.category.to_string(),
                manufacturer: None,
                price_cents: medicine.price_cents,
                stock: medicine.stock,
                requires_prescription: medicine.requires_prescription,
                expiry_date,
                image_url: None,
                branch_id: Some(branch.id),
            },
        )
        .await?;
    }
    log::info!("Seeded {} medicines", MEDICINES.len());

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = SeedConfig::init_from_env()?;
    let pool = init_db(&config.database_url).await?;
    let store = PgStore::new(pool);

    seed(&store, &config).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pharmacy_api::db::MemoryStore;

    fn config() -> SeedConfig {
        SeedConfig {
            database_url: String::new(),
            admin_email: "admin@example.com".to_string(),
            admin_password: "admin-password".to_string(),
            pharmacist_email: "ph@example.com".to_string(),
            pharmacist_password: "pharmacist-password".to_string(),
        }
    }

    #[test]
    fn account_passwords_have_no_defaults() {
        let mut vars = HashMap::from([(
            "DATABASE_URL".to_string(),
            "postgres://localhost/pharmacy".to_string(),
        )]);
        assert!(SeedConfig::init_from_hashmap(&vars).is_err());

        vars.insert("SEED_ADMIN_PASSWORD".to_string(), "s3cret-admin".to_string());
        assert!(SeedConfig::init_from_hashmap(&vars).is_err());

        vars.insert(
            "SEED_PHARMACIST_PASSWORD".to_string(),
            "s3cret-pharmacist".to_string(),
        );
        let config = SeedConfig::init_from_hashmap(&vars).unwrap();
        assert_eq!(config.admin_password, "s3cret-admin");
        assert_eq!(config.admin_email, "admin@pharmacy.local");
    }

    #[tokio::test]
    async fn seeding_twice_is_a_no_op() {
        let store = MemoryStore::new();
        seed(&store, &config()).await.unwrap();
        seed(&store, &config()).await.unwrap();

        assert_eq!(store.list_pharmacies().await.unwrap().len(), 1);
        assert_eq!(store.list_pharmacists().await.unwrap().len(), 1);
        assert_eq!(catalog::all_medicines(&store).await.unwrap().len(), MEDICINES.len());
    }
}
