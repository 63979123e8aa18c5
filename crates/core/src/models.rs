//! Clinic entities and their table layouts.
//!
//! Each entity maps one-to-one onto a row of its table file. Column order is
//! fixed by `COLUMNS`; index 0 is always the identity.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::codec::{format_date_time, new_identity, Record};
use crate::errors::{FieldError, StoreError};
use crate::store::fields::or_empty;
use crate::store::{Entity, Fields, Store, TableReport};

/// Declares a `Display`/`FromStr` pair over upper-case variant names.
macro_rules! named_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: '{other}'", stringify!($name))),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Patient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub gender: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub notes: Option<String>,
}

impl Patient {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gender: None,
            birthday: None,
            phone: None,
            address: None,
            emergency_contact: None,
            notes: None,
        }
    }
}

impl Entity for Patient {
    const TABLE: &'static str = "patients";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "gender",
        "birthday",
        "phone",
        "address",
        "emergencyContact",
        "notes",
    ];
    const MIN_FIELDS: usize = 8;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_record(f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            id: f.text(0),
            name: f.text(1),
            gender: f.optional(2),
            birthday: f.optional_date(3)?,
            phone: f.optional(4),
            address: f.optional(5),
            emergency_contact: f.optional(6),
            notes: f.optional(7),
        })
    }

    fn to_record(&self) -> Record {
        vec![
            self.id.clone(),
            self.name.clone(),
            or_empty(self.gender.as_ref()),
            or_empty(self.birthday.as_ref()),
            or_empty(self.phone.as_ref()),
            or_empty(self.address.as_ref()),
            or_empty(self.emergency_contact.as_ref()),
            or_empty(self.notes.as_ref()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Doctor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub schedule: Option<String>,
    /// Unparsable ratings read as `None`.
    pub rating: Option<f64>,
    pub title: Option<String>,
    pub level: Option<String>,
    pub specialties: Option<String>,
}

impl Doctor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            department: None,
            phone: None,
            schedule: None,
            rating: None,
            title: None,
            level: None,
            specialties: None,
        }
    }
}

impl Entity for Doctor {
    const TABLE: &'static str = "doctors";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "department",
        "phone",
        "schedule",
        "rating",
        "title",
        "level",
        "specialties",
    ];
    const MIN_FIELDS: usize = 5;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_record(f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            id: f.text(0),
            name: f.text(1),
            department: f.optional(2),
            phone: f.optional(3),
            schedule: f.optional(4),
            rating: f.lenient_f64(5),
            title: f.optional(6),
            level: f.optional(7),
            specialties: f.optional(8),
        })
    }

    fn to_record(&self) -> Record {
        vec![
            self.id.clone(),
            self.name.clone(),
            or_empty(self.department.as_ref()),
            or_empty(self.phone.as_ref()),
            or_empty(self.schedule.as_ref()),
            self.rating.map(|r| format!("{r:.1}")).unwrap_or_default(),
            or_empty(self.title.as_ref()),
            or_empty(self.level.as_ref()),
            or_empty(self.specialties.as_ref()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Appointment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    /// An empty stored value reads as the current time.
    pub date_time: NaiveDateTime,
    pub status: String,
    pub notes: String,
}

impl Entity for Appointment {
    const TABLE: &'static str = "appointments";
    const COLUMNS: &'static [&'static str] =
        &["id", "patientId", "doctorId", "datetime", "status", "notes"];
    const MIN_FIELDS: usize = 6;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_record(f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            id: f.text(0),
            patient_id: f.text(1),
            doctor_id: f.text(2),
            date_time: f.date_time_or_now(3)?,
            status: f.text(4),
            notes: f.text(5),
        })
    }

    fn to_record(&self) -> Record {
        vec![
            self.id.clone(),
            self.patient_id.clone(),
            self.doctor_id.clone(),
            format_date_time(&self.date_time),
            self.status.clone(),
            self.notes.clone(),
        ]
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Account role. Unknown stored names are a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

named_enum!(Role {
    Patient => "PATIENT",
    Doctor => "DOCTOR",
    Admin => "ADMIN",
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] =
        &["id", "username", "passwordHash", "role", "createdAt"];
    const MIN_FIELDS: usize = 5;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_record(f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            id: f.text(0),
            username: f.text(1),
            password_hash: f.text(2),
            role: f.parse(3)?,
            created_at: f.date_time(4)?,
        })
    }

    fn to_record(&self) -> Record {
        vec![
            self.id.clone(),
            self.username.clone(),
            self.password_hash.clone(),
            self.role.to_string(),
            format_date_time(&self.created_at),
        ]
    }
}

// ---------------------------------------------------------------------------
// Consultation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consultation {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_id: Option<String>,
    pub summary: String,
    pub prescription_id: Option<String>,
    /// An empty stored value reads as the current time.
    pub created_at: NaiveDateTime,
}

impl Entity for Consultation {
    const TABLE: &'static str = "consultations";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "patientId",
        "doctorId",
        "appointmentId",
        "summary",
        "prescriptionId",
        "createdAt",
    ];
    const MIN_FIELDS: usize = 7;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_record(f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            id: f.text(0),
            patient_id: f.text(1),
            doctor_id: f.text(2),
            appointment_id: f.optional(3),
            summary: f.text(4),
            prescription_id: f.optional(5),
            created_at: f.date_time_or_now(6)?,
        })
    }

    fn to_record(&self) -> Record {
        vec![
            self.id.clone(),
            self.patient_id.clone(),
            self.doctor_id.clone(),
            or_empty(self.appointment_id.as_ref()),
            self.summary.clone(),
            or_empty(self.prescription_id.as_ref()),
            format_date_time(&self.created_at),
        ]
    }
}

// ---------------------------------------------------------------------------
// Medicine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Medicine {
    pub id: String,
    pub name: String,
    pub specification: Option<String>,
    pub stock: i32,
    pub unit: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

impl Entity for Medicine {
    const TABLE: &'static str = "medicines";
    const COLUMNS: &'static [&'static str] =
        &["id", "name", "specification", "stock", "unit", "expiryDate"];
    const MIN_FIELDS: usize = 6;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_record(f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            id: f.text(0),
            name: f.text(1),
            specification: f.optional(2),
            stock: f.int_or_zero(3)?,
            unit: f.optional(4),
            expiry_date: f.optional_date(5)?,
        })
    }

    fn to_record(&self) -> Record {
        vec![
            self.id.clone(),
            self.name.clone(),
            or_empty(self.specification.as_ref()),
            self.stock.to_string(),
            or_empty(self.unit.as_ref()),
            or_empty(self.expiry_date.as_ref()),
        ]
    }
}

// ---------------------------------------------------------------------------
// StockMovement
// ---------------------------------------------------------------------------

/// Direction of a stock change. Unknown stored names read as `Adjustment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementType {
    Inbound,
    Outbound,
    Adjustment,
}

named_enum!(MovementType {
    Inbound => "INBOUND",
    Outbound => "OUTBOUND",
    Adjustment => "ADJUSTMENT",
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    pub id: String,
    pub medicine_id: String,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    /// An empty stored value reads as the current time.
    pub occurred_at: NaiveDateTime,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub operator_id: Option<String>,
    pub notes: String,
}

impl Entity for StockMovement {
    const TABLE: &'static str = "stock_movements";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "medicineId",
        "movementType",
        "quantity",
        "unitCost",
        "totalCost",
        "occurredAt",
        "referenceType",
        "referenceId",
        "operatorId",
        "notes",
    ];
    const MIN_FIELDS: usize = 11;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_record(f: &Fields<'_>) -> Result<Self, FieldError> {
        let quantity = f.int_or_zero(3)?;
        let unit_cost = f.optional_decimal(4)?.unwrap_or_default();
        // A missing total is derived from unit cost and quantity.
        let total_cost = f
            .optional_decimal(5)?
            .unwrap_or_else(|| unit_cost * Decimal::from(quantity));
        Ok(Self {
            id: f.text(0),
            medicine_id: f.text(1),
            movement_type: f.parse_or(2, MovementType::Adjustment),
            quantity,
            unit_cost,
            total_cost,
            occurred_at: f.date_time_or_now(6)?,
            reference_type: f.optional(7),
            reference_id: f.optional(8),
            operator_id: f.optional(9),
            notes: f.text(10),
        })
    }

    fn to_record(&self) -> Record {
        vec![
            self.id.clone(),
            self.medicine_id.clone(),
            self.movement_type.to_string(),
            self.quantity.to_string(),
            self.unit_cost.to_string(),
            self.total_cost.to_string(),
            format_date_time(&self.occurred_at),
            or_empty(self.reference_type.as_ref()),
            or_empty(self.reference_id.as_ref()),
            or_empty(self.operator_id.as_ref()),
            self.notes.clone(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Prescription
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prescription {
    pub id: String,
    pub consultation_id: String,
    pub medicine_id: String,
    pub quantity: i32,
    pub usage: String,
    pub status: String,
}

impl Entity for Prescription {
    const TABLE: &'static str = "prescriptions";
    const COLUMNS: &'static [&'static str] =
        &["id", "consultationId", "medicineId", "quantity", "usage", "status"];
    const MIN_FIELDS: usize = 6;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_record(f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            id: f.text(0),
            consultation_id: f.text(1),
            medicine_id: f.text(2),
            quantity: f.int_or_zero(3)?,
            usage: f.text(4),
            status: f.text(5),
        })
    }

    fn to_record(&self) -> Record {
        vec![
            self.id.clone(),
            self.consultation_id.clone(),
            self.medicine_id.clone(),
            self.quantity.to_string(),
            self.usage.clone(),
            self.status.clone(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Payment
// ---------------------------------------------------------------------------

/// What a payment is for. Unknown stored names read as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelatedType {
    Appointment,
    Prescription,
    Other,
}

named_enum!(RelatedType {
    Appointment => "APPOINTMENT",
    Prescription => "PRESCRIPTION",
    Other => "OTHER",
});

/// Payment lifecycle. Unknown stored names read as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
    Failed,
    Refunded,
}

named_enum!(PaymentStatus {
    Pending => "PENDING",
    Processing => "PROCESSING",
    Paid => "PAID",
    Failed => "FAILED",
    Refunded => "REFUNDED",
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub id: String,
    pub patient_id: String,
    pub related_type: RelatedType,
    pub related_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub status: PaymentStatus,
    pub insurance_claim_id: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub paid_at: Option<NaiveDateTime>,
}

impl Entity for Payment {
    const TABLE: &'static str = "payments";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "patientId",
        "relatedType",
        "relatedId",
        "amount",
        "currency",
        "method",
        "status",
        "insuranceClaimId",
        "createdAt",
        "paidAt",
    ];
    const MIN_FIELDS: usize = 11;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_record(f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            id: f.text(0),
            patient_id: f.text(1),
            related_type: f.parse_or(2, RelatedType::Other),
            related_id: f.optional(3),
            amount: f.decimal(4)?,
            currency: f.text(5),
            method: f.text(6),
            status: f.parse_or(7, PaymentStatus::Pending),
            insurance_claim_id: f.optional(8),
            created_at: f.optional_date_time(9)?,
            paid_at: f.optional_date_time(10)?,
        })
    }

    fn to_record(&self) -> Record {
        vec![
            self.id.clone(),
            self.patient_id.clone(),
            self.related_type.to_string(),
            or_empty(self.related_id.as_ref()),
            self.amount.to_string(),
            self.currency.clone(),
            self.method.clone(),
            self.status.to_string(),
            or_empty(self.insurance_claim_id.as_ref()),
            self.created_at.as_ref().map(format_date_time).unwrap_or_default(),
            self.paid_at.as_ref().map(format_date_time).unwrap_or_default(),
        ]
    }
}

// ---------------------------------------------------------------------------
// InsuranceClaim
// ---------------------------------------------------------------------------

/// Claim lifecycle. Unknown stored names read as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    Pending,
    Submitted,
    Approved,
    Rejected,
    Paid,
}

named_enum!(ClaimStatus {
    Pending => "PENDING",
    Submitted => "SUBMITTED",
    Approved => "APPROVED",
    Rejected => "REJECTED",
    Paid => "PAID",
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsuranceClaim {
    pub id: String,
    pub payment_id: String,
    pub insurance_type: String,
    /// Empty reads as zero.
    pub coverage_ratio: Decimal,
    /// Empty reads as zero.
    pub claimed_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub status: ClaimStatus,
    pub submitted_at: Option<NaiveDateTime>,
    pub processed_at: Option<NaiveDateTime>,
    pub notes: String,
}

impl Entity for InsuranceClaim {
    const TABLE: &'static str = "insurance_claims";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "paymentId",
        "insuranceType",
        "coverageRatio",
        "claimedAmount",
        "approvedAmount",
        "status",
        "submittedAt",
        "processedAt",
        "notes",
    ];
    const MIN_FIELDS: usize = 10;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_record(f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            id: f.text(0),
            payment_id: f.text(1),
            insurance_type: f.text(2),
            coverage_ratio: f.optional_decimal(3)?.unwrap_or_default(),
            claimed_amount: f.optional_decimal(4)?.unwrap_or_default(),
            approved_amount: f.optional_decimal(5)?,
            status: f.parse_or(6, ClaimStatus::Pending),
            submitted_at: f.optional_date_time(7)?,
            processed_at: f.optional_date_time(8)?,
            notes: f.text(9),
        })
    }

    fn to_record(&self) -> Record {
        vec![
            self.id.clone(),
            self.payment_id.clone(),
            self.insurance_type.clone(),
            self.coverage_ratio.to_string(),
            self.claimed_amount.to_string(),
            or_empty(self.approved_amount.as_ref()),
            self.status.to_string(),
            self.submitted_at.as_ref().map(format_date_time).unwrap_or_default(),
            self.processed_at.as_ref().map(format_date_time).unwrap_or_default(),
            self.notes.clone(),
        ]
    }
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

/// One audit trail entry. The table is append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLog {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub detail: String,
    pub result: String,
    pub ip_address: Option<String>,
}

impl AuditLog {
    /// A new entry with a fresh identity stamped with the current time.
    pub fn record(action: impl Into<String>, detail: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            id: new_identity(),
            timestamp: chrono::Local::now().naive_local(),
            user_id: None,
            role: None,
            action: Some(action.into()),
            entity_type: None,
            entity_id: None,
            detail: detail.into(),
            result: result.into(),
            ip_address: None,
        }
    }
}

impl Entity for AuditLog {
    const TABLE: &'static str = "audit_logs";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "timestamp",
        "userId",
        "role",
        "action",
        "entityType",
        "entityId",
        "detail",
        "result",
        "ipAddress",
    ];
    const MIN_FIELDS: usize = 10;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_record(f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            id: f.text(0),
            timestamp: f.date_time_or_now(1)?,
            user_id: f.optional(2),
            role: f.optional(3),
            action: f.optional(4),
            entity_type: f.optional(5),
            entity_id: f.optional(6),
            detail: f.text(7),
            result: f.text(8),
            ip_address: f.optional(9),
        })
    }

    fn to_record(&self) -> Record {
        vec![
            self.id.clone(),
            format_date_time(&self.timestamp),
            or_empty(self.user_id.as_ref()),
            or_empty(self.role.as_ref()),
            or_empty(self.action.as_ref()),
            or_empty(self.entity_type.as_ref()),
            or_empty(self.entity_id.as_ref()),
            self.detail.clone(),
            self.result.clone(),
            or_empty(self.ip_address.as_ref()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Table registry
// ---------------------------------------------------------------------------

/// Untyped view of one known table, for tooling that works by name.
#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub min_fields: usize,
    pub(crate) inspect: fn(&Store) -> Result<TableReport, StoreError>,
    pub(crate) resync: fn(&Store) -> Result<usize, StoreError>,
}

fn inspect_table<E: Entity>(store: &Store) -> Result<TableReport, StoreError> {
    store.table::<E>().inspect()
}

fn resync_table<E: Entity>(store: &Store) -> Result<usize, StoreError> {
    store.table::<E>().resync()
}

macro_rules! schema {
    ($entity:ty) => {
        TableSchema {
            name: <$entity>::TABLE,
            columns: <$entity>::COLUMNS,
            min_fields: <$entity>::MIN_FIELDS,
            inspect: inspect_table::<$entity>,
            resync: resync_table::<$entity>,
        }
    };
}

/// Every table the store knows, in a stable order.
pub static TABLES: &[TableSchema] = &[
    schema!(Patient),
    schema!(Doctor),
    schema!(Appointment),
    schema!(Consultation),
    schema!(User),
    schema!(Medicine),
    schema!(StockMovement),
    schema!(Prescription),
    schema!(Payment),
    schema!(InsuranceClaim),
    schema!(AuditLog),
];

/// Look up a known table by name.
pub fn schema(name: &str) -> Option<&'static TableSchema> {
    TABLES.iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_line;

    fn decode<E: Entity>(line: &str) -> Result<E, FieldError> {
        let record = decode_line(line);
        E::from_record(&Fields::new(&record, E::COLUMNS))
    }

    #[test]
    fn test_headers_match_min_fields() {
        for table in TABLES {
            assert!(table.min_fields <= table.columns.len(), "{}", table.name);
            assert_eq!(table.columns[0], "id", "{}", table.name);
        }
        assert_eq!(schema("audit_logs").unwrap().columns.len(), 10);
        assert!(schema("nurses").is_none());
    }

    #[test]
    fn test_patient_round_trip() {
        let line = "p1|Ada|F|1990-02-03|555-0100||Bob|";
        let patient: Patient = decode(line).unwrap();
        assert_eq!(patient.birthday, NaiveDate::from_ymd_opt(1990, 2, 3));
        assert_eq!(patient.address, None);
        assert_eq!(patient.to_record(), decode_line(line));
    }

    #[test]
    fn test_doctor_rating_is_lenient() {
        let doctor: Doctor = decode("d1|Grace|Cardiology||Mon-Fri|excellent").unwrap();
        assert_eq!(doctor.rating, None);
        assert_eq!(doctor.title, None);

        let doctor: Doctor = decode("d1|Grace|Cardiology||Mon-Fri|4.5|Chief|3|Heart").unwrap();
        assert_eq!(doctor.rating, Some(4.5));
        assert_eq!(doctor.to_record()[5], "4.5");
    }

    #[test]
    fn test_user_role_is_strict() {
        let user: User = decode("u1|ada|hash|ADMIN|2024-01-02T03:04").unwrap();
        assert_eq!(user.role, Role::Admin);

        let err = decode::<User>("u1|ada|hash|SUPERUSER|2024-01-02T03:04").unwrap_err();
        assert_eq!(err.column, "role");
    }

    #[test]
    fn test_payment_enums_fall_back() {
        let payment: Payment =
            decode("pay1|p1|GIFT||188.00|CNY|cash|LOST||2024-05-01T10:00|").unwrap();
        assert_eq!(payment.related_type, RelatedType::Other);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.paid_at, None);
        assert_eq!(payment.to_record()[4], "188.00");
    }

    #[test]
    fn test_payment_amount_is_strict() {
        let err = decode::<Payment>("pay1|p1|OTHER||lots|CNY|cash|PAID|||").unwrap_err();
        assert_eq!(err.column, "amount");
    }

    #[test]
    fn test_medicine_stock_defaults_to_zero() {
        let medicine: Medicine = decode("m1|Aspirin|100mg||box|").unwrap();
        assert_eq!(medicine.stock, 0);
        assert_eq!(medicine.to_record()[3], "0");
    }

    #[test]
    fn test_consultation_optional_links() {
        let line = "c1|p1|d1||Mild fever, rest advised||2024-05-01T10:15";
        let consultation: Consultation = decode(line).unwrap();
        assert_eq!(consultation.appointment_id, None);
        assert_eq!(consultation.prescription_id, None);
        assert_eq!(consultation.to_record(), decode_line(line));
    }

    #[test]
    fn test_insurance_claim_amounts() {
        let claim: InsuranceClaim =
            decode("ic1|pay1|BASIC|0.8|||UNKNOWN|2024-05-02T08:00||").unwrap();
        assert_eq!(claim.coverage_ratio, Decimal::new(8, 1));
        assert_eq!(claim.claimed_amount, Decimal::ZERO);
        assert_eq!(claim.approved_amount, None);
        assert_eq!(claim.status, ClaimStatus::Pending);
        assert_eq!(claim.to_record()[5], "");

        let err = decode::<InsuranceClaim>("ic1|pay1|BASIC|most|||PAID|||").unwrap_err();
        assert_eq!(err.column, "coverageRatio");
    }

    #[test]
    fn test_stock_movement_derives_total() {
        let movement: StockMovement =
            decode("s1|m1|RESTOCK|4|2.50||2024-05-03T09:00|||u1|").unwrap();
        assert_eq!(movement.movement_type, MovementType::Adjustment);
        assert_eq!(movement.total_cost, Decimal::new(1000, 2));
        assert_eq!(movement.to_record()[5], "10.00");
    }

    #[test]
    fn test_appointment_empty_datetime_is_now() {
        let before = chrono::Local::now().naive_local();
        let appointment: Appointment = decode("a1|p1|d1||PENDING|").unwrap();
        assert!(appointment.date_time >= before);
    }

    #[test]
    fn test_audit_log_record() {
        let entry = AuditLog::record("LOGIN", "user ada logged in", "OK");
        assert_eq!(entry.id.len(), 36);
        assert_eq!(entry.to_record().len(), AuditLog::COLUMNS.len());
    }
}
