use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CensusError;
use crate::models::{
    EnsembleMembership, Gender, IdentityField, MemberRecord, OrganizationMetadata,
};
use crate::sheet::{Cell, Sheet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterSchema {
    pub sheet: String,
    pub birth_date: String,
    pub gender: String,
    pub primary_function: String,
    pub early_education: String,
    pub main_ensemble: String,
    pub youth_ensemble: String,
    pub student: String,
    pub senior_ensemble: String,
    pub contact: ContactColumns,
}

impl Default for RosterSchema {
    fn default() -> Self {
        Self {
            sheet: "Personensatz".to_string(),
            birth_date: "Geburtsdatum".to_string(),
            gender: "Geschlecht".to_string(),
            primary_function: "Funktion1".to_string(),
            early_education: "musikalische Früherziehung".to_string(),
            main_ensemble: "Stammorchester".to_string(),
            youth_ensemble: "Jugendkapelle".to_string(),
            student: "Schüler".to_string(),
            senior_ensemble: "Senioren".to_string(),
            contact: ContactColumns::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactColumns {
    pub registration_number: String,
    pub organization_name: String,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub email: String,
}

impl ContactColumns {
    pub fn column(&self, field: IdentityField) -> &str {
        match field {
            IdentityField::RegistrationNumber => &self.registration_number,
            IdentityField::OrganizationName => &self.organization_name,
            IdentityField::Title => &self.title,
            IdentityField::FirstName => &self.first_name,
            IdentityField::LastName => &self.last_name,
            IdentityField::Street => &self.street,
            IdentityField::PostalCode => &self.postal_code,
            IdentityField::City => &self.city,
            IdentityField::Email => &self.email,
        }
    }
}

impl Default for ContactColumns {
    fn default() -> Self {
        Self {
            registration_number: "Verbandsnummer".to_string(),
            organization_name: "Verein".to_string(),
            title: "Titel".to_string(),
            first_name: "Vorname".to_string(),
            last_name: "Name".to_string(),
            street: "Straße/Postfach".to_string(),
            postal_code: "PLZ".to_string(),
            city: "Ort".to_string(),
            email: "E-Mail".to_string(),
        }
    }
}

/// Metadata sheet keys per logical field. Each field lists its keys in
/// lookup order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSchema {
    pub sheet: String,
    pub registration_number: Vec<String>,
    pub organization_name: Vec<String>,
    pub title: Vec<String>,
    pub first_name: Vec<String>,
    pub last_name: Vec<String>,
    pub street: Vec<String>,
    pub postal_code: Vec<String>,
    pub city: Vec<String>,
    pub email: Vec<String>,
    pub supporting_members: Vec<String>,
}

impl MetadataSchema {
    pub fn keys(&self, field: IdentityField) -> &[String] {
        match field {
            IdentityField::RegistrationNumber => &self.registration_number,
            IdentityField::OrganizationName => &self.organization_name,
            IdentityField::Title => &self.title,
            IdentityField::FirstName => &self.first_name,
            IdentityField::LastName => &self.last_name,
            IdentityField::Street => &self.street,
            IdentityField::PostalCode => &self.postal_code,
            IdentityField::City => &self.city,
            IdentityField::Email => &self.email,
        }
    }
}

impl Default for MetadataSchema {
    fn default() -> Self {
        fn keys(labels: &[&str]) -> Vec<String> {
            labels.iter().map(|label| label.to_string()).collect()
        }

        Self {
            sheet: "Vereinssatz".to_string(),
            registration_number: keys(&["Verbandsnummer"]),
            organization_name: keys(&["Verein"]),
            title: keys(&["Titel"]),
            first_name: keys(&["Vorname"]),
            last_name: keys(&["Name"]),
            street: keys(&["Straße/Postfach", "Straße"]),
            postal_code: keys(&["PLZ"]),
            city: keys(&["Ort"]),
            email: keys(&["E-Mail"]),
            supporting_members: keys(&["Fördernde Mitglieder"]),
        }
    }
}

static EMPTY: Cell = Cell::Empty;

#[derive(Debug)]
struct ColumnMap {
    width: usize,
    birth_date: usize,
    gender: usize,
    primary_function: usize,
    early_education: Option<usize>,
    main_ensemble: Option<usize>,
    youth_ensemble: Option<usize>,
    student: Option<usize>,
    senior_ensemble: Option<usize>,
    contact: Vec<(IdentityField, usize)>,
}

impl ColumnMap {
    fn resolve(sheet: &Sheet, schema: &RosterSchema) -> Result<Self, CensusError> {
        let header = sheet
            .header()
            .ok_or_else(|| CensusError::EmptySheet(sheet.name.clone()))?;

        let labels: Vec<Option<String>> = header.iter().map(Cell::as_text).collect();
        // Workbook ranges are rectangular, so trailing unlabelled cells don't count.
        let width = labels
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |last| last + 1);
        let find = |label: &str| {
            labels
                .iter()
                .position(|candidate| candidate.as_deref() == Some(label.trim()))
        };
        let require = |label: &str| {
            find(label).ok_or_else(|| CensusError::MissingColumn {
                sheet: sheet.name.clone(),
                column: label.to_string(),
            })
        };

        let contact = IdentityField::ALL
            .iter()
            .filter_map(|&field| find(schema.contact.column(field)).map(|index| (field, index)))
            .collect();

        Ok(Self {
            width,
            birth_date: require(&schema.birth_date)?,
            gender: require(&schema.gender)?,
            primary_function: require(&schema.primary_function)?,
            early_education: find(&schema.early_education),
            main_ensemble: find(&schema.main_ensemble),
            youth_ensemble: find(&schema.youth_ensemble),
            student: find(&schema.student),
            senior_ensemble: find(&schema.senior_ensemble),
            contact,
        })
    }

    fn record(&self, row_number: usize, row: &[Cell]) -> MemberRecord {
        let cell = |index: usize| row.get(index).unwrap_or(&EMPTY);
        let flag = |index: Option<usize>| index.is_some_and(|index| cell(index).is_truthy());

        let contact = self
            .contact
            .iter()
            .filter_map(|&(field, index)| cell(index).as_text().map(|value| (field, value)))
            .collect::<HashMap<_, _>>();

        MemberRecord {
            row: row_number,
            birth_date: cell(self.birth_date).as_date(),
            gender: Gender::from_code(cell(self.gender).as_integer()),
            ensembles: EnsembleMembership {
                early_education: flag(self.early_education),
                main: flag(self.main_ensemble),
                youth: flag(self.youth_ensemble),
                student: flag(self.student),
                senior: flag(self.senior_ensemble),
            },
            primary_function: cell(self.primary_function).as_integer() == Some(1),
            contact,
        }
    }
}

/// Parses the roster sheet into member records in sheet order, skipping
/// fully blank rows.
pub fn parse_roster(sheet: &Sheet, schema: &RosterSchema) -> Result<Vec<MemberRecord>, CensusError> {
    let columns = ColumnMap::resolve(sheet, schema)?;
    let mut members = Vec::new();

    for (row_number, row) in sheet.data_rows() {
        if row.iter().all(Cell::is_blank) {
            continue;
        }
        if let Some(last) = row.iter().rposition(|cell| !cell.is_blank()) {
            if last >= columns.width {
                return Err(CensusError::RowShape {
                    sheet: sheet.name.clone(),
                    row: row_number,
                    column: last + 1,
                    width: columns.width,
                });
            }
        }
        members.push(columns.record(row_number, row));
    }

    Ok(members)
}

pub fn parse_metadata(sheet: &Sheet) -> OrganizationMetadata {
    let mut metadata = OrganizationMetadata::default();

    for (_, row) in sheet.data_rows() {
        let Some(key) = row.first().and_then(Cell::as_text) else {
            continue;
        };
        let value = row.get(1).cloned().unwrap_or(Cell::Empty);
        metadata.insert(key, value);
    }

    metadata
}
