//! # Function Catalog
//!
//! Every operation the model may call, with a JSON-schema style parameter
//! description. The dispatcher routes on [`Function::name`], so a
//! function is reachable if and only if it is listed in [`Function::all`].

use serde::Serialize;
use serde_json::{json, Value};

use billwise_core::DocumentKind;

/// Bumped whenever a name or parameter changes.
pub const CATALOG_VERSION: &str = "1.0";

/// Operations shared by both document kinds (plus the estimate-only ones).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentOp {
    Create,
    Get,
    Search,
    ListRecent,
    Update,
    AddLineItem,
    UpdateLineItem,
    RemoveLineItem,
    UpdatePaymentMethods,
    UpdateDesign,
    Duplicate,
    Delete,
    /// Estimates only.
    UpdateStatus,
    /// Estimates only.
    Convert,
}

impl DocumentOp {
    const SHARED: [DocumentOp; 12] = [
        DocumentOp::Create,
        DocumentOp::Get,
        DocumentOp::Search,
        DocumentOp::ListRecent,
        DocumentOp::Update,
        DocumentOp::AddLineItem,
        DocumentOp::UpdateLineItem,
        DocumentOp::RemoveLineItem,
        DocumentOp::UpdatePaymentMethods,
        DocumentOp::UpdateDesign,
        DocumentOp::Duplicate,
        DocumentOp::Delete,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientOp {
    Create,
    FindOrCreate,
    Get,
    Search,
    Update,
    Delete,
    Documents,
}

impl ClientOp {
    const ALL: [ClientOp; 7] = [
        ClientOp::Create,
        ClientOp::FindOrCreate,
        ClientOp::Get,
        ClientOp::Search,
        ClientOp::Update,
        ClientOp::Delete,
        ClientOp::Documents,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsOp {
    GetBusinessSettings,
    UpdateBusinessSettings,
    SetDefaultTaxRate,
    SetReferenceFormat,
    PreviewNextReference,
    UpdateDefaultDesign,
    GetPaymentOptions,
    SetupBankTransfer,
    SetupCardPayments,
    SetupWalletPayments,
    DisablePaymentMethod,
    CheckUsageLimits,
}

impl SettingsOp {
    const ALL: [SettingsOp; 12] = [
        SettingsOp::GetBusinessSettings,
        SettingsOp::UpdateBusinessSettings,
        SettingsOp::SetDefaultTaxRate,
        SettingsOp::SetReferenceFormat,
        SettingsOp::PreviewNextReference,
        SettingsOp::UpdateDefaultDesign,
        SettingsOp::GetPaymentOptions,
        SettingsOp::SetupBankTransfer,
        SettingsOp::SetupCardPayments,
        SettingsOp::SetupWalletPayments,
        SettingsOp::DisablePaymentMethod,
        SettingsOp::CheckUsageLimits,
    ];
}

/// A callable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Document(DocumentKind, DocumentOp),
    Client(ClientOp),
    Settings(SettingsOp),
}

/// One catalog entry as handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl Function {
    /// Every routable function, in catalog order.
    pub fn all() -> Vec<Function> {
        let mut all = Vec::with_capacity(45);
        for kind in [DocumentKind::Invoice, DocumentKind::Estimate] {
            all.extend(DocumentOp::SHARED.map(|op| Function::Document(kind, op)));
            if kind == DocumentKind::Estimate {
                all.push(Function::Document(kind, DocumentOp::UpdateStatus));
                all.push(Function::Document(kind, DocumentOp::Convert));
            }
        }
        all.extend(ClientOp::ALL.map(Function::Client));
        all.extend(SettingsOp::ALL.map(Function::Settings));
        all
    }

    pub fn name(&self) -> String {
        match self {
            Function::Document(kind, op) => {
                let k = kind.as_str();
                match op {
                    DocumentOp::Create => format!("create_{k}"),
                    DocumentOp::Get => format!("get_{k}"),
                    DocumentOp::Search => format!("search_{k}s"),
                    DocumentOp::ListRecent => format!("list_recent_{k}s"),
                    DocumentOp::Update => format!("update_{k}"),
                    DocumentOp::AddLineItem => format!("add_{k}_line_item"),
                    DocumentOp::UpdateLineItem => format!("update_{k}_line_item"),
                    DocumentOp::RemoveLineItem => format!("remove_{k}_line_item"),
                    DocumentOp::UpdatePaymentMethods => format!("update_{k}_payment_methods"),
                    DocumentOp::UpdateDesign => format!("update_{k}_design"),
                    DocumentOp::Duplicate => format!("duplicate_{k}"),
                    DocumentOp::Delete => format!("delete_{k}"),
                    DocumentOp::UpdateStatus => "update_estimate_status".to_string(),
                    DocumentOp::Convert => "convert_estimate_to_invoice".to_string(),
                }
            }
            Function::Client(op) => match op {
                ClientOp::Create => "create_client",
                ClientOp::FindOrCreate => "find_or_create_client",
                ClientOp::Get => "get_client",
                ClientOp::Search => "search_clients",
                ClientOp::Update => "update_client",
                ClientOp::Delete => "delete_client",
                ClientOp::Documents => "get_client_documents",
            }
            .to_string(),
            Function::Settings(op) => match op {
                SettingsOp::GetBusinessSettings => "get_business_settings",
                SettingsOp::UpdateBusinessSettings => "update_business_settings",
                SettingsOp::SetDefaultTaxRate => "set_default_tax_rate",
                SettingsOp::SetReferenceFormat => "set_reference_format",
                SettingsOp::PreviewNextReference => "preview_next_reference",
                SettingsOp::UpdateDefaultDesign => "update_default_design",
                SettingsOp::GetPaymentOptions => "get_payment_options",
                SettingsOp::SetupBankTransfer => "setup_bank_transfer",
                SettingsOp::SetupCardPayments => "setup_card_payments",
                SettingsOp::SetupWalletPayments => "setup_wallet_payments",
                SettingsOp::DisablePaymentMethod => "disable_payment_method",
                SettingsOp::CheckUsageLimits => "check_usage_limits",
            }
            .to_string(),
        }
    }

    pub fn definition(&self) -> FunctionDefinition {
        let (description, parameters) = match self {
            Function::Document(kind, op) => document_schema(*kind, *op),
            Function::Client(op) => client_schema(*op),
            Function::Settings(op) => settings_schema(*op),
        };
        FunctionDefinition {
            name: self.name(),
            description,
            parameters,
        }
    }
}

/// Definitions of every function, in catalog order.
pub fn definitions() -> Vec<FunctionDefinition> {
    Function::all().iter().map(Function::definition).collect()
}

/// The catalog as shipped to the model: `{ version, functions: [...] }`.
pub fn catalog_json() -> Value {
    json!({
        "version": CATALOG_VERSION,
        "functions": definitions(),
    })
}

// =============================================================================
// Schemas
// =============================================================================

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn reference_property(kind: DocumentKind) -> Value {
    json!({
        "type": "string",
        "description": format!(
            "{} number, e.g. INV-004. Omit to use the most recent {}.",
            kind.label(),
            kind
        ),
    })
}

fn line_item_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "description": "What is being charged" },
            "description": { "type": "string" },
            "quantity": { "type": "number", "description": "Defaults to 1. Hours for time-based work." },
            "unit_price": { "type": "number", "description": "Price per unit" }
        },
        "required": ["name", "unit_price"]
    })
}

fn document_schema(kind: DocumentKind, op: DocumentOp) -> (String, Value) {
    let k = kind.as_str();
    let reference = reference_property(kind);
    let due_label = match kind {
        DocumentKind::Invoice => "Due date (YYYY-MM-DD). Defaults to issue date plus payment terms.",
        DocumentKind::Estimate => "Valid-until date (YYYY-MM-DD). Defaults to 30 days after issue.",
    };

    match op {
        DocumentOp::Create => (
            format!(
                "Create a new {k}. The client is matched to an existing one by email or name, \
                 or created. The number is assigned automatically."
            ),
            object(
                json!({
                    "client_name": { "type": "string" },
                    "client_email": { "type": "string" },
                    "client_phone": { "type": "string" },
                    "client_address": { "type": "string" },
                    "line_items": { "type": "array", "items": line_item_schema() },
                    "tax_rate": { "type": "number", "description": "Percent. Defaults to the business default when auto-apply is on." },
                    "discount_type": { "type": "string", "enum": ["percentage", "fixed"] },
                    "discount_value": { "type": "number" },
                    "issue_date": { "type": "string", "description": "YYYY-MM-DD, defaults to today" },
                    "due_date": { "type": "string", "description": due_label },
                    "notes": { "type": "string" },
                    "design_id": { "type": "string" },
                    "accent_color": { "type": "string", "description": "Hex color such as #1A73E8" }
                }),
                &["client_name"],
            ),
        ),
        DocumentOp::Get => (
            format!("Show one {k} with its line items and totals."),
            object(json!({ "reference_number": reference }), &[]),
        ),
        DocumentOp::Search => (
            format!("Search {k}s by number, client name or notes, optionally by status."),
            object(
                json!({
                    "query": { "type": "string" },
                    "status": { "type": "string" },
                    "limit": { "type": "integer", "description": "Defaults to 20" }
                }),
                &[],
            ),
        ),
        DocumentOp::ListRecent => (
            format!("List the most recently created {k}s."),
            object(
                json!({ "limit": { "type": "integer", "description": "Defaults to 5" } }),
                &[],
            ),
        ),
        DocumentOp::Update => (
            format!("Change the client, dates, tax, discount or notes of a {k}. Totals are recalculated."),
            object(
                json!({
                    "reference_number": reference,
                    "client_name": { "type": "string" },
                    "client_email": { "type": "string" },
                    "tax_rate": { "type": "number" },
                    "discount_type": { "type": "string", "enum": ["percentage", "fixed", "none"] },
                    "discount_value": { "type": "number" },
                    "issue_date": { "type": "string" },
                    "due_date": { "type": "string", "description": due_label },
                    "notes": { "type": "string" }
                }),
                &[],
            ),
        ),
        DocumentOp::AddLineItem => (
            format!("Add a line item to a {k}."),
            object(
                json!({
                    "reference_number": reference,
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "quantity": { "type": "number" },
                    "unit_price": { "type": "number" }
                }),
                &["name", "unit_price"],
            ),
        ),
        DocumentOp::UpdateLineItem => (
            format!("Change one line item of a {k}, picked by name or 1-based position."),
            object(
                json!({
                    "reference_number": reference,
                    "item_name": { "type": "string" },
                    "position": { "type": "integer" },
                    "new_name": { "type": "string" },
                    "description": { "type": "string" },
                    "quantity": { "type": "number" },
                    "unit_price": { "type": "number" }
                }),
                &[],
            ),
        ),
        DocumentOp::RemoveLineItem => (
            format!("Remove one line item of a {k}, picked by name or 1-based position."),
            object(
                json!({
                    "reference_number": reference,
                    "item_name": { "type": "string" },
                    "position": { "type": "integer" }
                }),
                &[],
            ),
        ),
        DocumentOp::UpdatePaymentMethods => (
            format!(
                "Turn payment methods on or off for a {k}. A method must be set up in the \
                 business payment options before it can be turned on."
            ),
            object(
                json!({
                    "reference_number": reference,
                    "bank": { "type": "boolean" },
                    "card": { "type": "boolean" },
                    "wallet": { "type": "boolean" }
                }),
                &[],
            ),
        ),
        DocumentOp::UpdateDesign => (
            format!("Change the design template or accent color of a {k}."),
            object(
                json!({
                    "reference_number": reference,
                    "design_id": { "type": "string" },
                    "accent_color": { "type": "string" }
                }),
                &[],
            ),
        ),
        DocumentOp::Duplicate => (
            format!("Copy a {k} into a new draft with a new number and today's date."),
            object(json!({ "reference_number": reference }), &[]),
        ),
        DocumentOp::Delete => (
            format!("Delete a {k} and its line items. The number must be given."),
            object(
                json!({ "reference_number": { "type": "string" } }),
                &["reference_number"],
            ),
        ),
        DocumentOp::UpdateStatus => (
            "Move an estimate to sent, accepted, declined, expired or cancelled. \
             Use convert_estimate_to_invoice to convert."
                .to_string(),
            object(
                json!({
                    "reference_number": reference,
                    "status": {
                        "type": "string",
                        "enum": ["draft", "sent", "accepted", "declined", "expired", "cancelled"]
                    }
                }),
                &["status"],
            ),
        ),
        DocumentOp::Convert => (
            "Convert an estimate into an invoice with the same number, client and line items."
                .to_string(),
            object(json!({ "reference_number": reference }), &[]),
        ),
    }
}

fn client_schema(op: ClientOp) -> (String, Value) {
    let lookup = json!({
        "client_id": { "type": "string" },
        "name": { "type": "string", "description": "Client name; partial names are matched" }
    });

    match op {
        ClientOp::Create => (
            "Add a client. Fails if a client with the same name exists.".to_string(),
            object(
                json!({
                    "name": { "type": "string" },
                    "email": { "type": "string" },
                    "phone": { "type": "string" },
                    "address": { "type": "string" },
                    "tax_id": { "type": "string" },
                    "notes": { "type": "string" }
                }),
                &["name"],
            ),
        ),
        ClientOp::FindOrCreate => (
            "Find a client by email or name, creating it when nothing matches.".to_string(),
            object(
                json!({
                    "name": { "type": "string" },
                    "email": { "type": "string" },
                    "phone": { "type": "string" },
                    "address": { "type": "string" }
                }),
                &["name"],
            ),
        ),
        ClientOp::Get => ("Show one client.".to_string(), object(lookup, &[])),
        ClientOp::Search => (
            "Search clients by name, email or phone.".to_string(),
            object(
                json!({
                    "query": { "type": "string" },
                    "limit": { "type": "integer", "description": "Defaults to 20" }
                }),
                &[],
            ),
        ),
        ClientOp::Update => (
            "Change a client's details.".to_string(),
            object(
                json!({
                    "client_id": { "type": "string" },
                    "name": { "type": "string", "description": "Current name of the client" },
                    "new_name": { "type": "string" },
                    "email": { "type": "string" },
                    "phone": { "type": "string" },
                    "address": { "type": "string" },
                    "tax_id": { "type": "string" },
                    "notes": { "type": "string" }
                }),
                &[],
            ),
        ),
        ClientOp::Delete => (
            "Delete a client. Existing invoices and estimates keep the client name.".to_string(),
            object(lookup, &[]),
        ),
        ClientOp::Documents => (
            "List the invoices and estimates of a client.".to_string(),
            object(lookup, &[]),
        ),
    }
}

fn settings_schema(op: SettingsOp) -> (String, Value) {
    let none = || object(json!({}), &[]);
    match op {
        SettingsOp::GetBusinessSettings => ("Show the business profile.".to_string(), none()),
        SettingsOp::UpdateBusinessSettings => (
            "Change the business name, contact details, currency or payment terms.".to_string(),
            object(
                json!({
                    "business_name": { "type": "string" },
                    "email": { "type": "string" },
                    "phone": { "type": "string" },
                    "address": { "type": "string" },
                    "currency": { "type": "string", "description": "ISO code such as USD" },
                    "payment_terms_days": { "type": "integer" },
                    "auto_apply_tax": { "type": "boolean" }
                }),
                &[],
            ),
        ),
        SettingsOp::SetDefaultTaxRate => (
            "Set the default tax rate used for new documents.".to_string(),
            object(
                json!({
                    "rate": { "type": "number", "description": "Percent" },
                    "auto_apply": { "type": "boolean", "description": "Apply automatically to new documents" }
                }),
                &["rate"],
            ),
        ),
        SettingsOp::SetReferenceFormat => (
            "Set the numbering template, e.g. INV-001, INV-YYYY-001 or Q-YYYY-MM-0001.".to_string(),
            object(json!({ "format": { "type": "string" } }), &["format"]),
        ),
        SettingsOp::PreviewNextReference => (
            "Show the number the next invoice or estimate will get.".to_string(),
            none(),
        ),
        SettingsOp::UpdateDefaultDesign => (
            "Set the default design template and accent color for new documents.".to_string(),
            object(
                json!({
                    "design_id": { "type": "string" },
                    "accent_color": { "type": "string" }
                }),
                &[],
            ),
        ),
        SettingsOp::GetPaymentOptions => ("Show which payment methods are set up.".to_string(), none()),
        SettingsOp::SetupBankTransfer => (
            "Store bank details and enable bank transfer.".to_string(),
            object(
                json!({
                    "bank_name": { "type": "string" },
                    "account_name": { "type": "string" },
                    "account_number": { "type": "string" },
                    "routing_number": { "type": "string" }
                }),
                &["account_number"],
            ),
        ),
        SettingsOp::SetupCardPayments => (
            "Connect a card processor account and enable card payments.".to_string(),
            object(json!({ "account_id": { "type": "string" } }), &["account_id"]),
        ),
        SettingsOp::SetupWalletPayments => (
            "Store a wallet address or email and enable wallet payments.".to_string(),
            object(json!({ "address": { "type": "string" } }), &["address"]),
        ),
        SettingsOp::DisablePaymentMethod => (
            "Turn off a payment method for the business.".to_string(),
            object(
                json!({ "method": { "type": "string", "enum": ["bank", "card", "wallet"] } }),
                &["method"],
            ),
        ),
        SettingsOp::CheckUsageLimits => (
            "Show how many documents the current plan allows and how many are used.".to_string(),
            none(),
        ),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_size_and_unique_names() {
        let all = Function::all();
        assert_eq!(all.len(), 45);

        let names: HashSet<String> = all.iter().map(Function::name).collect();
        assert_eq!(names.len(), all.len());
        assert!(names.contains("convert_estimate_to_invoice"));
        assert!(names.contains("list_recent_invoices"));
        assert!(!names.contains("update_invoice_status"));
    }

    #[test]
    fn test_every_entry_is_an_object_schema() {
        for def in definitions() {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(def.parameters["properties"].is_object(), "{}", def.name);
            assert!(def.parameters["required"].is_array(), "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }

    #[test]
    fn test_required_fields_are_declared_properties() {
        for def in definitions() {
            let properties = def.parameters["properties"].as_object().unwrap();
            for field in def.parameters["required"].as_array().unwrap() {
                let field = field.as_str().unwrap();
                assert!(properties.contains_key(field), "{} requires {}", def.name, field);
            }
        }
    }

    #[test]
    fn test_catalog_json_is_versioned() {
        let catalog = catalog_json();
        assert_eq!(catalog["version"], CATALOG_VERSION);
        assert_eq!(catalog["functions"].as_array().unwrap().len(), 45);
    }
}
