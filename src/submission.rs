//! Final form submission
//!
//! [`FormData`] is what the user typed, [`Submission`] is what goes on the
//! wire: trimmed and sanitized text fields in a stable order plus the staged
//! documents. Building a submission runs every local format check; a
//! submission that exists is locally valid.

use tracing::debug;

use crate::area::{PositionFlow, PositionRole};
use crate::documents::{DocumentStager, StagedDocument};
use crate::error::ValidationError;
use crate::normalize::{sanitize_account_number, sanitize_phone, sanitize_tax_id};
use crate::validation::{parse_form_date, require_fields, FormatRules, REQUIRED_FIELDS};

/// Markers the backend puts in the page when server-side validation fails
const FLASH_MARKERS: &[&str] = &["flash-message", "alert-"];

/// Fields only sent for positions of the commercial area
const COMMERCIAL_ONLY: &[&str] = &[
    "puesto_comercial",
    "rol_comercial",
    "banco_string",
    "numero_comisiones",
];

/// Raw form input, in entry order. Names ending in `[]` may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    values: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single-valued field, replacing previous values
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.values.iter().position(|(n, _)| n == name) {
            Some(idx) => {
                self.values[idx].1 = value;
                self.values.retain({
                    let mut seen = false;
                    move |(n, _)| {
                        if n != name {
                            return true;
                        }
                        let keep = !seen;
                        seen = true;
                        keep
                    }
                });
            }
            None => self.values.push((name.to_string(), value)),
        }
        self
    }

    /// Builder form of [`set`](Self::set)
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Append a value to a multi-valued field such as `equipo[]`
    pub fn push(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.values.push((name.to_string(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) {
        self.values.retain(|(n, _)| n != name);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// How the backend answered a submission that reached it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Collaborator registered
    Accepted,
    /// The page came back with a flash message: server-side validation failed
    Rejected { message: Option<String> },
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted)
    }
}

/// Classify the body of a 2xx submission response
pub fn classify_response(body: &str) -> SubmissionOutcome {
    if !FLASH_MARKERS.iter().any(|m| body.contains(m)) {
        return SubmissionOutcome::Accepted;
    }
    SubmissionOutcome::Rejected {
        message: flash_text(body),
    }
}

/// Text of the first flash/alert element, tags stripped
fn flash_text(body: &str) -> Option<String> {
    let start = FLASH_MARKERS.iter().filter_map(|m| body.find(m)).min()?;
    let open_end = body[start..].find('>')? + start + 1;
    let rest = &body[open_end..];
    let close = rest.find("</div").or_else(|| rest.find("</"))? + open_end;

    let mut text = String::new();
    let mut in_tag = false;
    for c in body[open_end..close].chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// A locally valid, wire-ready onboarding submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    fields: Vec<(String, String)>,
    attachments: Vec<StagedDocument>,
}

impl Submission {
    /// Normalize and check `form` for the selected position.
    ///
    /// `area` and `puesto` (or `puesto_comercial`) come from `role`. Salary is
    /// dropped for advisors and required otherwise; commercial-only fields
    /// are dropped outside the commercial area.
    pub fn build(
        form: &FormData,
        role: &PositionRole,
        documents: &DocumentStager,
        rules: &FormatRules,
    ) -> Result<Self, ValidationError> {
        let mut fields: Vec<(String, String)> = Vec::new();

        for (name, raw) in form.iter() {
            if matches!(name, "area" | "puesto" | "puesto_comercial") {
                continue;
            }
            if !role.is_commercial() && COMMERCIAL_ONLY.contains(&name) {
                continue;
            }
            if name == "sueldo" && role.flow == PositionFlow::Advisor {
                continue;
            }

            let value = match name {
                "rfc" => sanitize_tax_id(raw),
                "curp" => raw.trim().to_uppercase(),
                "correo" => raw.trim().to_lowercase(),
                "telefono" => sanitize_phone(raw),
                "numero_cuenta" => sanitize_account_number(raw),
                _ => raw.trim().to_string(),
            };
            fields.push((name.to_string(), value));
        }

        fields.push(("area".to_string(), role.area_id.to_string()));
        let position_field = if role.is_commercial() {
            "puesto_comercial"
        } else {
            "puesto"
        };
        fields.push((position_field.to_string(), role.position_id.to_string()));

        let lookup = |name: &str| -> Option<&str> {
            let name = if name == "puesto" { position_field } else { name };
            fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        };

        require_fields(REQUIRED_FIELDS, lookup)?;
        if role.salary_required() {
            require_fields(&["sueldo"], lookup)?;
        }
        if role.flow == PositionFlow::Advisor {
            require_fields(&["rol_comercial"], lookup)?;
        }

        rules.validate_tax_id(lookup("rfc").unwrap_or_default())?;
        rules.validate_national_id(lookup("curp").unwrap_or_default())?;
        rules.validate_email(lookup("correo").unwrap_or_default())?;
        parse_form_date("fecha_alta", lookup("fecha_alta").unwrap_or_default())?;

        let attachments: Vec<StagedDocument> = documents.documents().cloned().collect();
        debug!(
            fields = fields.len(),
            attachments = attachments.len(),
            flow = ?role.flow,
            "Submission built"
        );

        Ok(Self {
            fields,
            attachments,
        })
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attachments(&self) -> &[StagedDocument] {
        &self.attachments
    }
}
