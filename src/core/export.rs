//! Data export - Orders, commissions and ledger rows as JSON or CSV.

use crate::{
    core::{
        DateRange,
        ledger::{LedgerFilter, find_entries},
        order::list_orders,
    },
    entities::{Commission, CommissionModel, LedgerModel, OrderModel, commission},
    errors::{Error, Result},
};
use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{DatabaseConnection, QueryOrder, prelude::*};
use serde_json::{Value, json};
use std::{io::Write, str::FromStr};

const ORDERS_HEADER: &[&str] = &[
    "id",
    "event_id",
    "user_id",
    "original_amount",
    "original_currency",
    "conversion_rate",
    "total_amount",
    "currency",
    "status",
    "stripe_session_id",
    "created_at",
    "updated_at",
];

const COMMISSIONS_HEADER: &[&str] = &[
    "id",
    "order_id",
    "event_id",
    "user_id",
    "order_amount",
    "commission_rate",
    "commission_amount",
    "currency",
    "status",
    "paid_to_user",
    "paid_date",
    "payment_method",
    "settlement_batch_id",
    "reconciled_by",
    "fiscal_year",
    "fiscal_quarter",
    "created_at",
];

const LEDGER_HEADER: &[&str] = &[
    "id",
    "transaction_type",
    "debit_account",
    "credit_account",
    "amount",
    "currency",
    "description",
    "order_id",
    "commission_id",
    "event_id",
    "user_id",
    "settlement_batch_id",
    "tax_jurisdiction",
    "created_by",
    "transaction_date",
    "fiscal_year",
    "fiscal_quarter",
    "fiscal_month",
];

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// A JSON document keyed by dataset
    Json,
    /// One CSV section per dataset
    Csv,
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(Error::validation(format!(
                "Unknown export format '{other}', expected json or csv"
            ))),
        }
    }
}

/// Which datasets to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Orders only
    Orders,
    /// Commissions only
    Commissions,
    /// Ledger rows only
    Ledger,
    /// All three
    All,
}

impl ExportKind {
    fn includes(self, other: Self) -> bool {
        self == Self::All || self == other
    }
}

impl FromStr for ExportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "orders" => Ok(Self::Orders),
            "commissions" => Ok(Self::Commissions),
            "ledger" => Ok(Self::Ledger),
            "all" => Ok(Self::All),
            other => Err(Error::validation(format!(
                "Unknown export type '{other}', expected orders, commissions, ledger or all"
            ))),
        }
    }
}

/// Encoded export ready to send.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportPayload {
    /// JSON document
    Json(Value),
    /// CSV text
    Csv(String),
}

#[derive(Default)]
struct Datasets {
    orders: Option<Vec<OrderModel>>,
    commissions: Option<Vec<CommissionModel>>,
    ledger: Option<Vec<LedgerModel>>,
}

async fn load(db: &DatabaseConnection, kind: ExportKind, range: DateRange) -> Result<Datasets> {
    let mut data = Datasets::default();
    if kind.includes(ExportKind::Orders) {
        data.orders = Some(list_orders(db, range, None).await?);
    }
    if kind.includes(ExportKind::Commissions) {
        data.commissions = Some(
            range
                .apply(Commission::find(), commission::Column::CreatedAt)
                .order_by_asc(commission::Column::Id)
                .all(db)
                .await?,
        );
    }
    if kind.includes(ExportKind::Ledger) {
        data.ledger = Some(
            find_entries(
                db,
                &LedgerFilter {
                    range,
                    ..Default::default()
                },
            )
            .await?,
        );
    }
    Ok(data)
}

/// Exports the requested datasets created inside `range`.
///
/// JSON output is an object with one array per dataset plus `exportedAt`. CSV output
/// has one header-led section per dataset, separated by a blank line.
pub async fn export(
    db: &DatabaseConnection,
    format: ExportFormat,
    kind: ExportKind,
    range: DateRange,
) -> Result<ExportPayload> {
    let data = load(db, kind, range).await?;

    let payload = match format {
        ExportFormat::Json => ExportPayload::Json(to_json(&data)?),
        ExportFormat::Csv => ExportPayload::Csv(to_csv(&data)?),
    };

    tracing::info!(
        ?format,
        ?kind,
        orders = data.orders.as_ref().map_or(0, Vec::len),
        commissions = data.commissions.as_ref().map_or(0, Vec::len),
        ledger = data.ledger.as_ref().map_or(0, Vec::len),
        "exported financial data"
    );
    Ok(payload)
}

fn to_json(data: &Datasets) -> Result<Value> {
    let mut doc = json!({ "exportedAt": Utc::now() });
    if let Some(orders) = &data.orders {
        doc["orders"] = serde_json::to_value(orders)?;
    }
    if let Some(commissions) = &data.commissions {
        doc["commissions"] = serde_json::to_value(commissions)?;
    }
    if let Some(ledger) = &data.ledger {
        doc["ledger"] = serde_json::to_value(ledger)?;
    }
    Ok(doc)
}

fn to_csv(data: &Datasets) -> Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    let mut first = true;

    if let Some(orders) = &data.orders {
        write_section(&mut buf, &mut first, ORDERS_HEADER, orders.iter().map(order_record))?;
    }
    if let Some(commissions) = &data.commissions {
        write_section(
            &mut buf,
            &mut first,
            COMMISSIONS_HEADER,
            commissions.iter().map(commission_record),
        )?;
    }
    if let Some(ledger) = &data.ledger {
        write_section(&mut buf, &mut first, LEDGER_HEADER, ledger.iter().map(ledger_record))?;
    }

    String::from_utf8(buf).map_err(|e| Error::Export {
        message: e.to_string(),
    })
}

fn write_section(
    buf: &mut Vec<u8>,
    first: &mut bool,
    header: &[&str],
    records: impl Iterator<Item = Vec<String>>,
) -> Result<()> {
    if !*first {
        buf.write_all(b"\n")?;
    }
    *first = false;

    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(buf);
    csv.write_record(header)?;
    for record in records {
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn order_record(o: &OrderModel) -> Vec<String> {
    vec![
        o.id.to_string(),
        o.event_id.clone(),
        opt(o.user_id),
        o.original_amount.to_string(),
        o.original_currency.clone(),
        o.conversion_rate.to_string(),
        o.total_amount.to_string(),
        o.currency.clone(),
        o.status.as_str().to_string(),
        o.stripe_session_id.clone(),
        timestamp(o.created_at),
        timestamp(o.updated_at),
    ]
}

fn commission_record(c: &CommissionModel) -> Vec<String> {
    vec![
        c.id.to_string(),
        c.order_id.to_string(),
        c.event_id.clone(),
        c.user_id.to_string(),
        c.order_amount.to_string(),
        c.commission_rate.to_string(),
        c.commission_amount.to_string(),
        c.currency.clone(),
        c.status.as_str().to_string(),
        c.paid_to_user.to_string(),
        c.paid_date.map(timestamp).unwrap_or_default(),
        opt(c.payment_method.map(|m| m.as_str())),
        opt(c.settlement_batch_id.as_deref()),
        opt(c.reconciled_by),
        c.fiscal_year.to_string(),
        c.fiscal_quarter.to_string(),
        timestamp(c.created_at),
    ]
}

fn ledger_record(l: &LedgerModel) -> Vec<String> {
    vec![
        l.id.to_string(),
        l.transaction_type.as_str().to_string(),
        l.debit_account.as_str().to_string(),
        l.credit_account.as_str().to_string(),
        l.amount.to_string(),
        l.currency.clone(),
        l.description.clone(),
        opt(l.order_id),
        opt(l.commission_id),
        opt(l.event_id.as_deref()),
        opt(l.user_id),
        opt(l.settlement_batch_id.as_deref()),
        opt(l.tax_jurisdiction.as_deref()),
        opt(l.created_by),
        timestamp(l.transaction_date),
        l.fiscal_year.to_string(),
        l.fiscal_quarter.to_string(),
        l.fiscal_month.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_parse_format_and_kind() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(Error::Validation { .. })
        ));
        assert_eq!("all".parse::<ExportKind>().unwrap(), ExportKind::All);
        assert!("users".parse::<ExportKind>().is_err());
    }

    #[test]
    fn test_kind_includes() {
        assert!(ExportKind::All.includes(ExportKind::Ledger));
        assert!(ExportKind::Orders.includes(ExportKind::Orders));
        assert!(!ExportKind::Orders.includes(ExportKind::Ledger));
    }

    #[tokio::test]
    async fn test_json_export_of_one_kind() -> Result<()> {
        let db = setup_test_db().await?;
        create_fulfilled_order(&db, "cs_json", 40.0).await?;

        let payload = export(&db, ExportFormat::Json, ExportKind::Commissions, DateRange::default())
            .await?;

        let ExportPayload::Json(doc) = payload else {
            panic!("expected JSON payload");
        };
        assert_eq!(doc["commissions"].as_array().unwrap().len(), 1);
        assert_eq!(doc["commissions"][0]["status"], "pending");
        assert!(doc.get("orders").is_none());
        assert!(doc.get("exportedAt").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_csv_export_all_has_three_sections() -> Result<()> {
        let db = setup_test_db().await?;
        create_fulfilled_order(&db, "cs_csv", 40.0).await?;

        let payload = export(&db, ExportFormat::Csv, ExportKind::All, DateRange::default()).await?;

        let ExportPayload::Csv(text) = payload else {
            panic!("expected CSV payload");
        };
        let sections: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(sections.len(), 3);
        assert!(sections[0].starts_with("id,event_id,user_id"));
        assert!(sections[0].contains("cs_csv"));
        assert!(sections[1].starts_with("id,order_id,event_id"));
        assert!(sections[2].starts_with("id,transaction_type"));
        // sale + commission accrual
        assert_eq!(sections[2].lines().count(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_csv_export_of_empty_table_keeps_header() -> Result<()> {
        let db = setup_test_db().await?;
        let payload = export(&db, ExportFormat::Csv, ExportKind::Ledger, DateRange::default()).await?;
        assert_eq!(
            payload,
            ExportPayload::Csv(format!("{}\n", LEDGER_HEADER.join(",")))
        );
        Ok(())
    }
}
