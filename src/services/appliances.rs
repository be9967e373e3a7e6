use crate::db::models::{ApplianceChangeset, ApplianceRow, NewApplianceRow};
use crate::db::storage::{Storage, StorageError};
use crate::error::ServiceError;
use crate::models::appliance::{
    Appliance, ApplianceDraft, ApplianceId, ApplianceList, ApplianceWithEstimates, DeleteConfirmation, IdInput,
};
use crate::services::consumption::{round_estimates, EnergyProfile};
use crate::services::validation::{validate_create, validate_update};
use crate::utils::sanitize_text;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

const EMPTY_AFTER_SANITIZE: &str = "Name must contain text after removing markup";

pub struct ApplianceRepository {
    store: Box<dyn Storage>,
}

fn sanitized_name(name: &str) -> Result<String, ServiceError> {
    let clean = sanitize_text(name);
    if clean.is_empty() {
        return Err(ServiceError::validation("name", EMPTY_AFTER_SANITIZE));
    }
    Ok(clean)
}

/// `updated_at` must move forward on every update, even when the clock has
/// not ticked since the previous write.
fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous { now } else { previous + Duration::milliseconds(1) }
}

fn decode_row(row: ApplianceRow, failure: &str) -> Result<Appliance, ServiceError> {
    let id = row.id;
    Appliance::try_from(row).map_err(|e| {
        warn!("Stored appliance {} is unreadable: {}", id, e);
        ServiceError::database(failure, e)
    })
}

fn with_estimates(appliance: Appliance) -> ApplianceWithEstimates {
    let consumption_estimates = EnergyProfile::of(&appliance).estimates();
    ApplianceWithEstimates {
        appliance,
        consumption_estimates,
    }
}

impl ApplianceRepository {
    pub fn new(store: Box<dyn Storage>) -> Self {
        ApplianceRepository { store }
    }

    pub fn storage(&mut self) -> &mut dyn Storage {
        self.store.as_mut()
    }

    pub fn close(&mut self) -> Result<(), StorageError> {
        self.store.close()
    }

    fn fetch(&mut self, id: ApplianceId, failure: &str) -> Result<Appliance, ServiceError> {
        let row = self
            .store
            .select_appliance(id.0)
            .map_err(|e| ServiceError::database(failure, e))?
            .ok_or_else(|| ServiceError::not_found(id.0))?;
        decode_row(row, failure)
    }

    pub fn create(&mut self, draft: &ApplianceDraft) -> Result<Appliance, ServiceError> {
        const FAILURE: &str = "Failed to create appliance";

        let mut new_appliance = validate_create(draft).inspect_err(|e| warn!("Rejected appliance: {}", e))?;
        new_appliance.name = sanitized_name(&new_appliance.name)?;

        let now = Utc::now();
        let row = NewApplianceRow::new(&new_appliance, now);
        let result = self
            .store
            .insert_appliance(&row)
            .map_err(|e| ServiceError::database(FAILURE, e))?;
        let id = ApplianceId(result.last_insert_rowid);
        info!("Created appliance {} ({})", id, new_appliance.name);

        // timestamps taken from the row so they match a later read
        Ok(Appliance {
            id,
            name: new_appliance.name,
            power_watts: new_appliance.power_watts,
            daily_hours: new_appliance.daily_hours,
            usage_days: new_appliance.usage_days,
            standby_watts: new_appliance.standby_watts,
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        })
    }

    pub fn get_by_id(&mut self, id: impl IdInput) -> Result<ApplianceWithEstimates, ServiceError> {
        let id = id.resolve()?;
        let appliance = self.fetch(id, "Failed to retrieve appliance")?;
        debug!("Loaded appliance {}", id);
        Ok(with_estimates(appliance))
    }

    /// Newest first. Totals are summed unrounded and rounded once.
    pub fn get_all(&mut self) -> Result<ApplianceList, ServiceError> {
        const FAILURE: &str = "Failed to retrieve appliances";

        let rows = self
            .store
            .select_appliances()
            .map_err(|e| ServiceError::database(FAILURE, e))?;
        let (mut daily, mut weekly, mut monthly) = (0.0, 0.0, 0.0);
        let mut appliances = Vec::with_capacity(rows.len());
        for row in rows {
            let appliance = decode_row(row, FAILURE)?;
            let profile = EnergyProfile::of(&appliance);
            daily += profile.daily_kwh;
            weekly += profile.weekly_kwh;
            monthly += profile.monthly_kwh;
            appliances.push(ApplianceWithEstimates {
                appliance,
                consumption_estimates: profile.estimates(),
            });
        }
        debug!("Loaded {} appliance(s)", appliances.len());
        Ok(ApplianceList {
            appliances,
            total_consumption: round_estimates(daily, weekly, monthly),
        })
    }

    pub fn update(&mut self, id: impl IdInput, draft: &ApplianceDraft) -> Result<ApplianceWithEstimates, ServiceError> {
        const FAILURE: &str = "Failed to update appliance";

        let id = id.resolve()?;
        let mut patch = validate_update(draft).inspect_err(|e| warn!("Rejected update of appliance {}: {}", id, e))?;
        let current = self.fetch(id, FAILURE)?;
        if let Some(name) = patch.name.take() {
            patch.name = Some(sanitized_name(&name)?);
        }

        let changes = ApplianceChangeset::new(&patch, next_updated_at(current.updated_at, Utc::now()));
        let result = self
            .store
            .update_appliance(id.0, &changes)
            .map_err(|e| ServiceError::database(FAILURE, e))?;
        if result.changes == 0 {
            return Err(ServiceError::not_found(id.0));
        }
        info!("Updated appliance {}", id);

        let updated = self.fetch(id, FAILURE)?;
        Ok(with_estimates(updated))
    }

    pub fn delete(&mut self, id: impl IdInput) -> Result<DeleteConfirmation, ServiceError> {
        let id = id.resolve()?;
        let result = self
            .store
            .delete_appliance(id.0)
            .map_err(|e| ServiceError::database("Failed to delete appliance", e))?;
        if result.changes == 0 {
            return Err(ServiceError::not_found(id.0));
        }
        info!("Deleted appliance {}", id);
        Ok(DeleteConfirmation {
            success: true,
            id,
            message: "Appliance deleted successfully".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStorage;
    use crate::db::sqlite::SqliteStorage;
    use crate::error::ErrorKind;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn repos() -> Vec<ApplianceRepository> {
        vec![
            ApplianceRepository::new(Box::new(MemoryStorage::new())),
            ApplianceRepository::new(Box::new(SqliteStorage::open(":memory:").unwrap())),
        ]
    }

    fn fridge() -> ApplianceDraft {
        ApplianceDraft {
            name: Some("Refrigerator".to_string()),
            power_watts: Some(150.0),
            daily_hours: Some(24.0),
            usage_days: Some(vec![0, 1, 2, 3, 4, 5, 6]),
            standby_watts: None,
        }
    }

    fn lamp() -> ApplianceDraft {
        ApplianceDraft {
            name: Some("Desk Lamp".to_string()),
            power_watts: Some(100.0),
            daily_hours: Some(8.0),
            usage_days: Some(vec![1, 2, 3, 4, 5]),
            standby_watts: Some(0.0),
        }
    }

    #[test]
    fn create_then_read_back() {
        for mut repo in repos() {
            let created = repo.create(&fridge()).unwrap();
            assert!(created.id.0 > 0);
            assert_eq!(created.name, "Refrigerator");
            assert_eq!(created.standby_watts, 0.0);
            assert_eq!(created.created_at, created.updated_at);

            let found = repo.get_by_id(created.id).unwrap();
            assert_eq!(found.appliance, created);
            assert_eq!(found.consumption_estimates.daily_kwh, 3.6);
            assert_eq!(found.consumption_estimates.weekly_kwh, 25.2);
            assert_eq!(found.consumption_estimates.monthly_kwh, 108.0);
        }
    }

    #[test]
    fn create_sanitizes_name() {
        for mut repo in repos() {
            let mut draft = fridge();
            draft.name = Some("  Fridge<script>alert(1)</script> \"A\" ".to_string());
            let created = repo.create(&draft).unwrap();
            assert_eq!(created.name, "Fridge &quot;A&quot;");
        }
    }

    #[test]
    fn create_rejects_markup_only_name() {
        for mut repo in repos() {
            let mut draft = fridge();
            draft.name = Some("<script>x</script>".to_string());
            let err = repo.create(&draft).unwrap_err();
            assert_eq!(err.error, ErrorKind::ValidationError);
            assert_eq!(err.field.as_deref(), Some("name"));
            assert!(repo.get_all().unwrap().appliances.is_empty());
        }
    }

    #[test]
    fn create_rejection_stores_nothing() {
        for mut repo in repos() {
            let mut draft = fridge();
            draft.power_watts = Some(0.0);
            let err = repo.create(&draft).unwrap_err();
            assert_eq!(err.field.as_deref(), Some("power_watts"));
            assert!(repo.get_all().unwrap().appliances.is_empty());
        }
    }

    #[test]
    fn get_by_id_checks_id_before_storage() {
        for mut repo in repos() {
            let err = repo.get_by_id("").unwrap_err();
            assert_eq!(err.message, "ID is required");
            let err = repo.get_by_id("abc").unwrap_err();
            assert_eq!(err.error, ErrorKind::ValidationError);
            let err = repo.get_by_id(99_999_i64).unwrap_err();
            assert_eq!(err.error, ErrorKind::NotFound);
            assert_eq!(err.id, Some(99_999));
            let created = repo.create(&lamp()).unwrap();
            let by_text = repo.get_by_id(created.id.to_string()).unwrap();
            assert_eq!(by_text.appliance.id, created.id);
        }
    }

    #[test]
    fn get_all_lists_newest_first_with_totals() {
        for mut repo in repos() {
            let empty = repo.get_all().unwrap();
            assert!(empty.appliances.is_empty());
            assert_eq!(empty.total_consumption.daily_kwh, 0.0);

            let first = repo.create(&fridge()).unwrap();
            let second = repo.create(&lamp()).unwrap();
            let list = repo.get_all().unwrap();
            let ids = list.appliances.iter().map(|a| a.appliance.id).collect::<Vec<_>>();
            assert_eq!(ids, vec![second.id, first.id]);
            assert_eq!(list.total_consumption.daily_kwh, 4.4);
            assert_eq!(list.total_consumption.weekly_kwh, 29.2);
        }
    }

    #[test]
    fn update_changes_only_given_fields() {
        for mut repo in repos() {
            let created = repo.create(&lamp()).unwrap();
            let patch = ApplianceDraft {
                power_watts: Some(60.0),
                name: Some(" Lamp </b> ".to_string()),
                ..Default::default()
            };
            let updated = repo.update(created.id, &patch).unwrap();
            assert_eq!(updated.appliance.power_watts, 60.0);
            assert_eq!(updated.appliance.name, "Lamp &lt;&#x2F;b&gt;");
            assert_eq!(updated.appliance.daily_hours, 8.0);
            assert_eq!(updated.appliance.usage_days, created.usage_days);
            assert_eq!(updated.appliance.created_at, created.created_at);
            assert!(updated.appliance.updated_at > created.updated_at);
            assert_eq!(updated.consumption_estimates.daily_kwh, 0.5);
        }
    }

    #[test]
    fn updated_at_strictly_increases() {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(next_updated_at(t, t), t + Duration::milliseconds(1));
        assert_eq!(next_updated_at(t, t - Duration::seconds(5)), t + Duration::milliseconds(1));
        assert_eq!(next_updated_at(t, t + Duration::seconds(5)), t + Duration::seconds(5));

        for mut repo in repos() {
            let created = repo.create(&lamp()).unwrap();
            let mut last = created.updated_at;
            for hours in [1.0, 2.0, 3.0] {
                let draft = ApplianceDraft {
                    daily_hours: Some(hours),
                    ..Default::default()
                };
                let next = repo.update(created.id, &draft).unwrap().appliance.updated_at;
                assert!(next > last);
                last = next;
            }
        }
    }

    #[test]
    fn update_errors() {
        for mut repo in repos() {
            let created = repo.create(&lamp()).unwrap();

            let err = repo.update(created.id, &ApplianceDraft::default()).unwrap_err();
            assert_eq!(err.error, ErrorKind::ValidationError);
            assert_eq!(err.message, "Update requires at least one field to be provided");

            let missing = ApplianceDraft {
                power_watts: Some(10.0),
                ..Default::default()
            };
            assert_eq!(repo.update(99_999_i64, &missing).unwrap_err().error, ErrorKind::NotFound);

            let markup_only = ApplianceDraft {
                name: Some("<script>x</script>".to_string()),
                ..Default::default()
            };
            let err = repo.update(created.id, &markup_only).unwrap_err();
            assert_eq!(err.error, ErrorKind::ValidationError);
            assert_eq!(err.field.as_deref(), Some("name"));
            assert_eq!(repo.get_by_id(created.id).unwrap().appliance, created);

            let bad = ApplianceDraft {
                daily_hours: Some(25.0),
                ..Default::default()
            };
            let err = repo.update(created.id, &bad).unwrap_err();
            assert_eq!(err.field.as_deref(), Some("daily_hours"));
            assert_eq!(repo.get_by_id(created.id).unwrap().appliance, created);
        }
    }

    #[test]
    fn delete_removes_only_target() {
        for mut repo in repos() {
            let keep = repo.create(&fridge()).unwrap();
            let gone = repo.create(&lamp()).unwrap();
            let confirmation = repo.delete(gone.id).unwrap();
            assert!(confirmation.success);
            assert_eq!(confirmation.id, gone.id);
            assert_eq!(confirmation.message, "Appliance deleted successfully");

            assert_eq!(repo.get_by_id(gone.id).unwrap_err().error, ErrorKind::NotFound);
            assert_eq!(repo.delete(gone.id).unwrap_err().error, ErrorKind::NotFound);
            assert_eq!(repo.get_by_id(keep.id).unwrap().appliance, keep);
        }
    }

    #[test]
    fn storage_failures_are_database_errors() {
        for mut repo in repos() {
            repo.close().unwrap();
            let err = repo.create(&fridge()).unwrap_err();
            assert_eq!(err.error, ErrorKind::DatabaseError);
            assert_eq!(err.message, "Failed to create appliance");
            assert_eq!(repo.get_all().unwrap_err().message, "Failed to retrieve appliances");
            assert_eq!(repo.delete(1_i64).unwrap_err().message, "Failed to delete appliance");
        }
    }

    #[test]
    fn estimates_are_stable_across_reads() {
        for mut repo in repos() {
            let created = repo.create(&lamp()).unwrap();
            let a = repo.get_by_id(created.id).unwrap().consumption_estimates;
            let b = repo.get_by_id(created.id).unwrap().consumption_estimates;
            assert_eq!(a, b);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn valid_drafts_round_trip(
            name in "[A-Za-z][A-Za-z0-9 ]{0,40}",
            power in 0.1f64..10_000.0,
            hours in 0.0f64..=24.0,
            standby in 0.0f64..=1_000.0,
            days in proptest::collection::vec(0i64..=6, 1..=7),
        ) {
            let draft = ApplianceDraft {
                name: Some(name.clone()),
                power_watts: Some(power),
                daily_hours: Some(hours),
                usage_days: Some(days.clone()),
                standby_watts: Some(standby),
            };
            for mut repo in repos() {
                let created = repo.create(&draft).unwrap();
                let found = repo.get_by_id(created.id).unwrap();
                prop_assert_eq!(&found.appliance.name, name.trim());
                prop_assert_eq!(found.appliance.power_watts, power);
                prop_assert_eq!(found.appliance.daily_hours, hours);
                prop_assert_eq!(found.appliance.standby_watts, standby);
                for day in &days {
                    prop_assert!(found.appliance.usage_days.as_slice().contains(&(*day as u8)));
                }
                let estimates = found.consumption_estimates;
                prop_assert!(estimates.daily_kwh >= 0.0);
                prop_assert!(estimates.weekly_kwh >= 0.0);
            }
        }
    }
}
