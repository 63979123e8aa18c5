//! Lookups beyond identity, per table.

use super::EntityStore;
use crate::errors::StoreError;
use crate::models::{
    Appointment, AuditLog, Consultation, Doctor, InsuranceClaim, Payment, Prescription, StockMovement, User,
};

impl EntityStore<Appointment> {
    pub fn find_by_patient(&self, patient_id: &str) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.find_all()?.into_iter().filter(|a| a.patient_id == patient_id).collect())
    }

    pub fn find_by_doctor(&self, doctor_id: &str) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.find_all()?.into_iter().filter(|a| a.doctor_id == doctor_id).collect())
    }
}

impl EntityStore<Doctor> {
    pub fn find_by_department(&self, department: &str) -> Result<Vec<Doctor>, StoreError> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|d| d.department.as_deref() == Some(department))
            .collect())
    }
}

impl EntityStore<User> {
    /// Usernames compare case-insensitively.
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .find_all()?
            .into_iter()
            .find(|u| u.username.eq_ignore_ascii_case(username)))
    }
}

impl EntityStore<Prescription> {
    pub fn find_by_consultation(&self, consultation_id: &str) -> Result<Vec<Prescription>, StoreError> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|p| p.consultation_id == consultation_id)
            .collect())
    }

    pub fn find_by_medicine(&self, medicine_id: &str) -> Result<Vec<Prescription>, StoreError> {
        Ok(self.find_all()?.into_iter().filter(|p| p.medicine_id == medicine_id).collect())
    }
}

impl EntityStore<Payment> {
    pub fn find_by_patient(&self, patient_id: &str) -> Result<Vec<Payment>, StoreError> {
        Ok(self.find_all()?.into_iter().filter(|p| p.patient_id == patient_id).collect())
    }
}

impl EntityStore<Consultation> {
    pub fn find_by_patient(&self, patient_id: &str) -> Result<Vec<Consultation>, StoreError> {
        Ok(self.find_all()?.into_iter().filter(|c| c.patient_id == patient_id).collect())
    }
}

impl EntityStore<StockMovement> {
    /// Movements of one medicine, oldest first.
    pub fn find_by_medicine(&self, medicine_id: &str) -> Result<Vec<StockMovement>, StoreError> {
        let mut movements: Vec<StockMovement> = self
            .find_all()?
            .into_iter()
            .filter(|m| m.medicine_id == medicine_id)
            .collect();
        movements.sort_by_key(|m| m.occurred_at);
        Ok(movements)
    }
}

impl EntityStore<InsuranceClaim> {
    pub fn find_by_payment(&self, payment_id: &str) -> Result<Option<InsuranceClaim>, StoreError> {
        Ok(self.find_all()?.into_iter().find(|c| c.payment_id == payment_id))
    }
}

impl EntityStore<AuditLog> {
    /// Entries touching one entity, oldest first.
    pub fn find_by_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditLog>, StoreError> {
        let mut entries: Vec<AuditLog> = self
            .find_all()?
            .into_iter()
            .filter(|l| {
                l.entity_type.as_deref() == Some(entity_type) && l.entity_id.as_deref() == Some(entity_id)
            })
            .collect();
        entries.sort_by_key(|l| l.timestamp);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{InsuranceClaim, MovementType, Role, StockMovement, User};
    use crate::store::Store;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn test_find_by_username_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let users = store.table::<User>();
        users
            .save(User {
                id: "u1".into(),
                username: "Ada".into(),
                password_hash: "x".into(),
                role: Role::Doctor,
                created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap(),
            })
            .unwrap();

        assert_eq!(users.find_by_username("ADA").unwrap().unwrap().id, "u1");
        assert!(users.find_by_username("grace").unwrap().is_none());
    }

    #[test]
    fn test_stock_movements_for_medicine_are_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let movements = store.table::<StockMovement>();
        for (id, medicine, day) in [("s1", "m1", 3), ("s2", "m2", 1), ("s3", "m1", 2)] {
            movements
                .save(StockMovement {
                    id: id.into(),
                    medicine_id: medicine.into(),
                    movement_type: MovementType::Inbound,
                    quantity: 10,
                    unit_cost: Decimal::ONE,
                    total_cost: Decimal::TEN,
                    occurred_at: NaiveDate::from_ymd_opt(2024, 5, day)
                        .unwrap()
                        .and_hms_opt(9, 0, 0)
                        .unwrap(),
                    reference_type: None,
                    reference_id: None,
                    operator_id: None,
                    notes: String::new(),
                })
                .unwrap();
        }

        let ids: Vec<String> = movements
            .find_by_medicine("m1")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["s3", "s1"]);
    }

    #[test]
    fn test_claim_lookup_by_payment() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        std::fs::write(
            store.table_path("insurance_claims"),
            "id|paymentId|insuranceType|coverageRatio|claimedAmount|approvedAmount|status|submittedAt|processedAt|notes\n\
             ic1|pay1|BASIC|0.7|100.00|70.00|APPROVED|2024-05-02T08:00|2024-05-03T08:00|\n",
        )
        .unwrap();

        let claims = store.table::<InsuranceClaim>();
        let claim = claims.find_by_payment("pay1").unwrap().unwrap();
        assert_eq!(claim.approved_amount, Some(Decimal::new(7000, 2)));
        assert!(claims.find_by_payment("pay2").unwrap().is_none());
    }
}
