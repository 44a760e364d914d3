//! The normalization boundary.
//!
//! The backend is not consistent about field names (`invoiceNumber` vs
//! `billNo`, `_id` vs `id`), nests some references as objects and sends
//! money either as JSON numbers or as strings. Everything that comes back
//! from it passes through exactly one function here and leaves as a strict
//! model type.

use crate::error::NormalizeError;
use crate::ledger::installments::InstallmentLedger;
use crate::models::{
    BankDetails, BillItem, CreditBill, Customer, DebitNote, Installment, PermissionAction,
    PermissionRequest, RequestStatus,
};
use crate::money::clamp_non_negative;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

type Object = Map<String, Value>;
type Result<T> = std::result::Result<T, NormalizeError>;

const ID: &[&str] = &["id", "_id"];

/// Unwrap a `{"data": ...}` envelope if present.
pub fn unwrap_envelope(value: &Value) -> &Value {
    match value {
        Value::Object(obj) => ["data", "result"]
            .iter()
            .find_map(|k| obj.get(*k).filter(|v| v.is_object() || v.is_array()))
            .unwrap_or(value),
        _ => value,
    }
}

/// Map a list response, accepting a bare array or an envelope holding one
/// under `data`, `items` or `results`.
pub fn list<T>(
    value: &Value,
    entity: &'static str,
    normalize: impl Fn(&Value) -> Result<T>,
) -> Result<Vec<T>> {
    let array = match value {
        Value::Array(items) => items,
        Value::Object(obj) => ["data", "items", "results", entity]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .ok_or(NormalizeError::NotAnArray { entity })?,
        _ => return Err(NormalizeError::NotAnArray { entity }),
    };

    array.iter().map(normalize).collect()
}

pub fn credit_bill(value: &Value) -> Result<CreditBill> {
    const ENTITY: &str = "credit bill";
    let obj = object(unwrap_envelope(value), ENTITY)?;

    let (customer_id, nested_name) = reference(obj, &["customerId", "customer_id", "customer"])
        .ok_or(NormalizeError::MissingField {
            entity: ENTITY,
            field: "customerId",
        })?;

    let grand_total = amount(obj, ENTITY, "grandTotal", &["grandTotal", "grand_total", "totalAmount", "total"])?
        .ok_or(NormalizeError::MissingField {
            entity: ENTITY,
            field: "grandTotal",
        })?;
    let amount_paid = amount(obj, ENTITY, "amountPaid", &["amountPaid", "amount_paid", "paidAmount", "advance"])?
        .unwrap_or(Decimal::ZERO);
    let balance_amount = amount(
        obj,
        ENTITY,
        "balanceAmount",
        &["balanceAmount", "balance_amount", "balance", "remainingBalance", "remainingAmount"],
    )?
    .map(clamp_non_negative)
    .unwrap_or_else(|| clamp_non_negative(grand_total - amount_paid));

    let items = match field(obj, &["items", "products", "lineItems"]) {
        Some(Value::Array(items)) => items.iter().map(bill_item).collect::<Result<Vec<_>>>()?,
        _ => Vec::new(),
    };

    Ok(CreditBill {
        id: required_text(obj, ENTITY, "id", ID)?,
        invoice_number: required_text(
            obj,
            ENTITY,
            "invoiceNumber",
            &["invoiceNumber", "invoice_number", "invoiceNo", "billNumber", "billNo"],
        )?,
        customer_id,
        customer_name: text(obj, &["customerName", "customer_name"]).or(nested_name),
        date: required_date(obj, ENTITY, "date", &["date", "invoiceDate", "billDate", "createdAt"])?,
        grand_total,
        amount_paid,
        balance_amount,
        items,
    })
}

fn bill_item(value: &Value) -> Result<BillItem> {
    const ENTITY: &str = "bill item";
    let obj = object(value, ENTITY)?;

    let quantity = amount(obj, ENTITY, "quantity", &["quantity", "qty"])?.unwrap_or(Decimal::ONE);
    let rate = amount(obj, ENTITY, "rate", &["rate", "price", "unitPrice"])?.unwrap_or(Decimal::ZERO);
    let line_amount = amount(obj, ENTITY, "amount", &["amount", "total"])?.unwrap_or(quantity * rate);

    Ok(BillItem {
        description: text(obj, &["description", "name", "productName", "itemName"])
            .unwrap_or_default(),
        quantity,
        rate,
        amount: line_amount,
    })
}

pub fn debit_note(value: &Value) -> Result<DebitNote> {
    const ENTITY: &str = "debit note";
    let obj = object(unwrap_envelope(value), ENTITY)?;

    let date = required_date(obj, ENTITY, "date", &["date", "noteDate", "createdAt"])?;
    let due_date = date_field(obj, ENTITY, "dueDate", &["dueDate", "due_date"])?.unwrap_or(date);

    let (credit_bill_id, _) = reference(obj, &["creditBillId", "credit_bill_id", "creditBill"])
        .ok_or(NormalizeError::MissingField {
            entity: ENTITY,
            field: "creditBillId",
        })?;
    let customer_id = reference(obj, &["customerId", "customer_id", "customer"])
        .map(|(id, _)| id)
        .unwrap_or_default();

    let total_amount = amount(obj, ENTITY, "totalAmount", &["totalAmount", "total_amount", "amountPaid"])?;
    let remaining = amount(
        obj,
        ENTITY,
        "remainingAmountToPay",
        &["remainingAmountToPay", "remaining_amount_to_pay", "remainingAmount", "balance"],
    )?;

    let mut entries = match field(obj, &["installments", "payments"]) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|i| installment(i, date))
            .collect::<Result<Vec<_>>>()?,
        _ => Vec::new(),
    };
    if entries.is_empty() {
        if let Some(total) = total_amount.filter(|t| *t > Decimal::ZERO) {
            entries.push(Installment::persisted(total, date));
        }
    }

    let paid: Decimal = entries.iter().map(|i| i.amount_paid).sum();
    let opening_balance = match amount(obj, ENTITY, "openingBalance", &["openingBalance", "opening_balance"])? {
        Some(opening) => opening,
        None => paid + remaining.unwrap_or(Decimal::ZERO),
    };

    let status_cancelled = text(obj, &["status"])
        .map(|s| s.eq_ignore_ascii_case("cancelled") || s.eq_ignore_ascii_case("canceled"))
        .unwrap_or(false);
    let cancelled = field(obj, &["cancelled", "isCancelled", "canceled"])
        .and_then(Value::as_bool)
        .unwrap_or(false)
        || status_cancelled;

    Ok(DebitNote {
        id: Some(required_text(obj, ENTITY, "id", ID)?),
        invoice_number: text(
            obj,
            &["invoiceNumber", "invoice_number", "debitNoteNumber", "noteNumber", "invoiceNo"],
        ),
        customer_id,
        credit_bill_id,
        date,
        due_date,
        ledger: InstallmentLedger::from_entries(opening_balance, entries),
        cancelled,
    })
}

fn installment(value: &Value, fallback_date: NaiveDate) -> Result<Installment> {
    const ENTITY: &str = "installment";
    let obj = object(value, ENTITY)?;

    let amount_paid = amount(obj, ENTITY, "amountPaid", &["amountPaid", "amount_paid", "paidAmount", "amount"])?
        .ok_or(NormalizeError::MissingField {
            entity: ENTITY,
            field: "amountPaid",
        })?;
    let date = date_field(obj, ENTITY, "date", &["date", "paymentDate", "paidOn"])?
        .unwrap_or(fallback_date);

    Ok(Installment::persisted(amount_paid, date))
}

pub fn customer(value: &Value) -> Result<Customer> {
    const ENTITY: &str = "customer";
    let obj = object(unwrap_envelope(value), ENTITY)?;

    Ok(Customer {
        id: required_text(obj, ENTITY, "id", ID)?,
        name: required_text(obj, ENTITY, "name", &["name", "customerName", "customer_name"])?,
        gstin: text(obj, &["gstin", "GSTIN", "gstNumber", "gst_no"]).map(|g| g.to_uppercase()),
        email: text(obj, &["email", "emailId"]),
        phone: text(obj, &["phone", "mobile", "phoneNumber", "contact"]),
        address: address(obj),
        state: text(obj, &["state", "stateName"]),
    })
}

fn address(obj: &Object) -> Option<String> {
    match field(obj, &["address", "billingAddress"])? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(parts) => {
            let joined = ["line1", "line2", "street", "city", "state", "pincode", "postalCode"]
                .iter()
                .filter_map(|k| parts.get(*k).and_then(Value::as_str))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

pub fn bank_details(value: &Value) -> Result<BankDetails> {
    const ENTITY: &str = "bank details";
    let value = match unwrap_envelope(value) {
        // Some deployments return the list of accounts; the first is primary.
        Value::Array(items) => items.first().ok_or(NormalizeError::MissingField {
            entity: ENTITY,
            field: "accountNumber",
        })?,
        other => other,
    };
    let obj = object(value, ENTITY)?;

    Ok(BankDetails {
        bank_name: required_text(obj, ENTITY, "bankName", &["bankName", "bank_name", "bank"])?,
        account_name: text(obj, &["accountName", "account_name", "accountHolder"]).unwrap_or_default(),
        account_number: required_text(
            obj,
            ENTITY,
            "accountNumber",
            &["accountNumber", "account_number", "accountNo"],
        )?,
        ifsc: required_text(obj, ENTITY, "ifsc", &["ifsc", "ifscCode", "IFSC"])?.to_uppercase(),
        branch: text(obj, &["branch", "branchName"]),
    })
}

pub fn permission_request(value: &Value) -> Result<PermissionRequest> {
    const ENTITY: &str = "permission request";
    let obj = object(unwrap_envelope(value), ENTITY)?;

    let action = match text(obj, &["action", "type"]).as_deref().map(str::to_ascii_lowercase) {
        Some(a) if a == "create" => PermissionAction::Create,
        Some(a) if a == "edit" || a == "update" => PermissionAction::Edit,
        Some(a) if a == "delete" => PermissionAction::Delete,
        Some(a) if a == "cancel" => PermissionAction::Cancel,
        Some(other) => {
            return Err(NormalizeError::InvalidField {
                entity: ENTITY,
                field: "action",
                reason: format!("unknown action '{}'", other),
            })
        }
        None => {
            return Err(NormalizeError::MissingField {
                entity: ENTITY,
                field: "action",
            })
        }
    };

    Ok(PermissionRequest {
        id: text(obj, ID),
        action,
        resource: required_text(obj, ENTITY, "resource", &["resource", "collection"])?,
        resource_id: text(obj, &["resourceId", "resource_id", "documentId"]),
        requested_by: required_text(obj, ENTITY, "requestedBy", &["requestedBy", "requested_by", "userId"])?,
        department: text(obj, &["department"]).unwrap_or_default(),
        payload: field(obj, &["payload", "data"]).cloned().unwrap_or(Value::Null),
        status: text(obj, &["status"])
            .map(|s| RequestStatus::from_string(&s))
            .unwrap_or(RequestStatus::Pending),
    })
}

/// Identity of a record returned by a create or update call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub id: String,
    pub invoice_number: Option<String>,
}

/// Extract the id (and invoice number, if assigned) from a write response.
/// Write responses are often partial, so nothing else is required.
pub fn record_ref(value: &Value) -> Result<RecordRef> {
    const ENTITY: &str = "saved record";
    let obj = object(unwrap_envelope(value), ENTITY)?;

    Ok(RecordRef {
        id: required_text(obj, ENTITY, "id", ID)?,
        invoice_number: text(
            obj,
            &["invoiceNumber", "invoice_number", "debitNoteNumber", "noteNumber", "invoiceNo"],
        ),
    })
}

fn object<'a>(value: &'a Value, entity: &'static str) -> Result<&'a Object> {
    value.as_object().ok_or(NormalizeError::NotAnObject { entity })
}

/// First non-null value under any of `aliases`.
fn field<'a>(obj: &'a Object, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
}

/// Textual value; numbers are accepted (ids are sometimes numeric), blank
/// strings count as absent.
fn text(obj: &Object, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(inner) if inner.contains_key("$oid") => {
            inner.get("$oid").and_then(Value::as_str).map(str::to_string)
        }
        _ => None,
    })
}

fn required_text(
    obj: &Object,
    entity: &'static str,
    name: &'static str,
    aliases: &[&str],
) -> Result<String> {
    text(obj, aliases).ok_or(NormalizeError::MissingField {
        entity,
        field: name,
    })
}

/// A reference that is either an id or an embedded object with an id and
/// possibly a name.
fn reference(obj: &Object, aliases: &[&str]) -> Option<(String, Option<String>)> {
    match field(obj, aliases)? {
        Value::Object(inner) => {
            let id = text(inner, ID)?;
            Some((id, text(inner, &["name", "customerName"])))
        }
        _ => text(obj, aliases).map(|id| (id, None)),
    }
}

fn amount(
    obj: &Object,
    entity: &'static str,
    name: &'static str,
    aliases: &[&str],
) -> Result<Option<Decimal>> {
    let Some(value) = field(obj, aliases) else {
        return Ok(None);
    };

    let invalid = |reason: String| NormalizeError::InvalidField {
        entity,
        field: name,
        reason,
    };

    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().replace(',', ""),
        other => return Err(invalid(format!("expected a number, got {}", other))),
    };

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map(Some)
        .map_err(|_| invalid(format!("'{}' is not a number", raw)))
}

fn date_field(
    obj: &Object,
    entity: &'static str,
    name: &'static str,
    aliases: &[&str],
) -> Result<Option<NaiveDate>> {
    let Some(raw) = text(obj, aliases) else {
        return Ok(None);
    };

    parse_date(&raw)
        .map(Some)
        .ok_or_else(|| NormalizeError::InvalidField {
            entity,
            field: name,
            reason: format!("'{}' is not a date", raw),
        })
}

fn required_date(
    obj: &Object,
    entity: &'static str,
    name: &'static str,
    aliases: &[&str],
) -> Result<NaiveDate> {
    date_field(obj, entity, name, aliases)?.ok_or(NormalizeError::MissingField {
        entity,
        field: name,
    })
}

/// ISO dates, ISO timestamps (date part only) and `dd/mm/yyyy`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    raw.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok())
        .or_else(|| NaiveDate::parse_from_str(raw, "%d-%m-%Y").ok())
}
