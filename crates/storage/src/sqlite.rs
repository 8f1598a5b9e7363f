use std::collections::BTreeSet;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};

use branchplan_core::{
    BranchId, Money, Override, OverrideFields, PlanAggregate, PlanId, PlanTemplate,
    TemplateFields,
};

use crate::error::StorageError;
use crate::traits::PlanStore;

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

fn to_version(raw: i64) -> Result<u64, StorageError> {
    u64::try_from(raw).map_err(|_| StorageError::Serialization(format!("invalid version {raw}")))
}

fn to_duration(raw: i64) -> Result<u32, StorageError> {
    u32::try_from(raw)
        .map_err(|_| StorageError::Serialization(format!("invalid duration_months {raw}")))
}

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Raw `plans` row before conversion into domain types.
struct PlanRow {
    version: i64,
    name: String,
    description: Option<String>,
    price_amount: i64,
    price_currency: String,
    duration_months: i64,
    benefits: Vec<u8>,
    is_active: bool,
}

fn encode_benefits(benefits: &[String]) -> Result<Vec<u8>, StorageError> {
    rmp_serde::to_vec(benefits).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn write_template_row(tx: &Transaction, aggregate: &PlanAggregate, version: u64) -> Result<(), StorageError> {
    let template = aggregate.template();
    let fields = &template.fields;
    tx.execute(
        "UPDATE plans SET version = ?1, name = ?2, description = ?3, price_amount = ?4, price_currency = ?5,
             duration_months = ?6, benefits = ?7, is_active = ?8,
             updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)
         WHERE plan_id = ?9",
        rusqlite::params![
            version as i64,
            fields.name,
            fields.description,
            fields.price.amount,
            fields.price.currency,
            fields.duration_in_months as i64,
            encode_benefits(&fields.benefits)?,
            fields.is_active,
            template.plan_id.as_bytes().as_slice(),
        ],
    )?;
    Ok(())
}

/// Replace the branch list and override rows of a plan inside `tx`.
fn write_children(tx: &Transaction, aggregate: &PlanAggregate) -> Result<(), StorageError> {
    let plan_id = aggregate.plan_id();
    let plan_blob = plan_id.as_bytes().as_slice();

    tx.execute("DELETE FROM plan_branches WHERE plan_id = ?1", rusqlite::params![plan_blob])?;
    for branch_id in &aggregate.template().assigned_branch_ids {
        tx.execute(
            "INSERT INTO plan_branches (plan_id, branch_id) VALUES (?1, ?2)",
            rusqlite::params![plan_blob, branch_id.as_str()],
        )?;
    }

    tx.execute("DELETE FROM plan_overrides WHERE plan_id = ?1", rusqlite::params![plan_blob])?;
    for ov in aggregate.overrides() {
        tx.execute(
            "INSERT INTO plan_overrides (plan_id, branch_id, fields) VALUES (?1, ?2, ?3)",
            rusqlite::params![plan_blob, ov.branch_id.as_str(), ov.fields.to_msgpack()?],
        )?;
    }
    Ok(())
}

impl PlanStore for SqliteStorage {
    fn load(&self, plan_id: PlanId) -> Result<Option<PlanAggregate>, StorageError> {
        let plan_blob = plan_id.as_bytes().as_slice();
        let row = self
            .conn
            .query_row(
                "SELECT version, name, description, price_amount, price_currency, duration_months, benefits, is_active
                 FROM plans WHERE plan_id = ?1",
                rusqlite::params![plan_blob],
                |row| {
                    Ok(PlanRow {
                        version: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        price_amount: row.get(3)?,
                        price_currency: row.get(4)?,
                        duration_months: row.get(5)?,
                        benefits: row.get(6)?,
                        is_active: row.get(7)?,
                    })
                },
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };

        let benefits: Vec<String> = rmp_serde::from_slice(&row.benefits)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut stmt = self
            .conn
            .prepare("SELECT branch_id FROM plan_branches WHERE plan_id = ?1")?;
        let assigned_branch_ids = stmt
            .query_map(rusqlite::params![plan_blob], |row| row.get::<_, String>(0))?
            .map(|r| r.map(BranchId::from))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT branch_id, fields FROM plan_overrides WHERE plan_id = ?1 ORDER BY branch_id")?;
        let raw_overrides = stmt
            .query_map(rusqlite::params![plan_blob], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut overrides = Vec::with_capacity(raw_overrides.len());
        for (branch_id, bytes) in raw_overrides {
            overrides.push(Override {
                plan_id,
                branch_id: BranchId::from(branch_id),
                fields: OverrideFields::from_msgpack(&bytes)?,
            });
        }

        let template = PlanTemplate {
            plan_id,
            fields: TemplateFields {
                name: row.name,
                description: row.description,
                price: Money::new(row.price_amount, row.price_currency),
                duration_in_months: to_duration(row.duration_months)?,
                benefits,
                is_active: row.is_active,
            },
            assigned_branch_ids,
        };
        let aggregate = PlanAggregate::from_parts(template, overrides, to_version(row.version)?)?;
        Ok(Some(aggregate))
    }

    fn insert(&mut self, aggregate: &PlanAggregate) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let plan_id = aggregate.plan_id();

        let fields = &aggregate.template().fields;
        let result = tx.execute(
            "INSERT INTO plans (plan_id, version, name, description, price_amount, price_currency, duration_months, benefits, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                plan_id.as_bytes().as_slice(),
                aggregate.version() as i64,
                fields.name,
                fields.description,
                fields.price.amount,
                fields.price.currency,
                fields.duration_in_months as i64,
                encode_benefits(&fields.benefits)?,
                fields.is_active,
            ],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StorageError::AlreadyExists(plan_id.to_string()));
            }
            Err(e) => return Err(StorageError::Sqlite(e)),
        }
        write_children(&tx, aggregate)?;

        tx.commit()?;
        Ok(())
    }

    fn save(&mut self, aggregate: &PlanAggregate) -> Result<u64, StorageError> {
        // Take the write lock before reading the version, so a racing writer
        // waits on busy_timeout and then sees the bumped version.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let plan_id = aggregate.plan_id();

        let stored: Option<i64> = tx
            .query_row(
                "SELECT version FROM plans WHERE plan_id = ?1",
                rusqlite::params![plan_id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        let stored = match stored {
            Some(v) => to_version(v)?,
            None => return Err(StorageError::NotFound(plan_id.to_string())),
        };
        if stored != aggregate.version() {
            return Err(StorageError::VersionMismatch {
                plan_id: plan_id.to_string(),
                expected: aggregate.version(),
                found: stored,
            });
        }

        let next = stored + 1;
        write_template_row(&tx, aggregate, next)?;
        write_children(&tx, aggregate)?;

        tx.commit()?;
        Ok(next)
    }

    fn list_plan_ids(&self) -> Result<Vec<PlanId>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT plan_id FROM plans ORDER BY plan_id")?;
        let raw = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|bytes| Ok(PlanId::from_bytes(to_array::<16>(bytes, "plan_id")?)))
            .collect()
    }
}
