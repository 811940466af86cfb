use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::classify;
use crate::config::Config;
use crate::error::CensusError;
use crate::models::{
    Bucket, ClubSummary, EnsemblePresence, ErrorLog, FileOutcome, Identity, IdentityField, MemberRecord,
    OrganizationMetadata, OutputRow, COUNTRY,
};
use crate::roster::{self, MetadataSchema, RosterSchema};
use crate::sheet::Sheet;

/// One club's workbook as handed over by the reader. A sheet the workbook
/// does not contain is `None`.
#[derive(Debug, Clone)]
pub struct Submission {
    pub filename: String,
    pub roster: Option<Sheet>,
    pub metadata: Option<Sheet>,
}

#[derive(Debug, Clone)]
pub struct OrganizationAggregator {
    reference_date: NaiveDate,
    roster_schema: RosterSchema,
    metadata_schema: MetadataSchema,
    name_from_filename: bool,
}

impl OrganizationAggregator {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            reference_date,
            roster_schema: RosterSchema::default(),
            metadata_schema: MetadataSchema::default(),
            name_from_filename: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            reference_date: config.report.cutoff,
            roster_schema: config.roster.clone(),
            metadata_schema: config.metadata.clone(),
            name_from_filename: config.report.organization_name_from_filename,
        }
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn aggregate<'a>(
        &self,
        files: impl IntoIterator<Item = &'a Submission>,
    ) -> (Vec<OutputRow>, ErrorLog) {
        collect(files.into_iter().map(|file| self.process_file(file)))
    }

    pub fn process_file(&self, submission: &Submission) -> FileOutcome {
        match self.summarize(submission) {
            Ok(club) => {
                debug!(
                    file = %submission.filename,
                    active = club.counts.total(Bucket::Total),
                    ensembles = club.ensembles.total(),
                    "Club processed"
                );
                FileOutcome::Success(club)
            }
            Err(error) => {
                warn!(file = %submission.filename, error = %error, "Club failed");
                FileOutcome::Failure {
                    filename: submission.filename.clone(),
                    message: error.to_string(),
                }
            }
        }
    }

    fn summarize(&self, submission: &Submission) -> Result<ClubSummary, CensusError> {
        let metadata_sheet = submission
            .metadata
            .as_ref()
            .ok_or_else(|| CensusError::MissingSheet(self.metadata_schema.sheet.clone()))?;
        let roster_sheet = submission
            .roster
            .as_ref()
            .ok_or_else(|| CensusError::MissingSheet(self.roster_schema.sheet.clone()))?;

        let metadata = roster::parse_metadata(metadata_sheet);
        let members = roster::parse_roster(roster_sheet, &self.roster_schema)?;
        let counts = classify::classify(&members, self.reference_date)?;

        let contact = designated_contact(&members);
        let mut identity = Identity::from_fn(|field| {
            resolve_field(field, &metadata, &self.metadata_schema, contact)
        });
        if self.name_from_filename && identity.organization_name.is_empty() {
            identity.organization_name = file_stem(&submission.filename);
        }

        Ok(ClubSummary {
            filename: submission.filename.clone(),
            identity,
            country: COUNTRY,
            ensembles: ensemble_presence(&members),
            counts,
            supporting_members: supporting_members(&metadata, &self.metadata_schema),
        })
    }
}

/// Splits outcomes into rows numbered from 1 in input order and an error
/// log. Failed files consume no sequence number.
pub fn collect(outcomes: impl IntoIterator<Item = FileOutcome>) -> (Vec<OutputRow>, ErrorLog) {
    let mut rows = Vec::new();
    let mut errors = ErrorLog::default();

    for outcome in outcomes {
        match outcome {
            FileOutcome::Success(club) => rows.push(OutputRow {
                sequence: rows.len() + 1,
                club,
            }),
            FileOutcome::Failure { filename, message } => errors.record(filename, message),
        }
    }

    (rows, errors)
}

pub fn designated_contact(members: &[MemberRecord]) -> Option<&MemberRecord> {
    members.iter().find(|member| member.primary_function)
}

/// Metadata value if present and non-blank, else the designated contact's
/// value, else blank.
pub fn resolve_field(
    field: IdentityField,
    metadata: &OrganizationMetadata,
    schema: &MetadataSchema,
    contact: Option<&MemberRecord>,
) -> String {
    metadata
        .text(schema.keys(field))
        .or_else(|| {
            contact
                .and_then(|member| member.contact_field(field))
                .map(str::to_string)
        })
        .unwrap_or_default()
}

pub fn ensemble_presence(members: &[MemberRecord]) -> EnsemblePresence {
    EnsemblePresence {
        youth: members.iter().any(|member| member.ensembles.youth),
        adult: members.iter().any(|member| member.ensembles.main),
        senior: members.iter().any(|member| member.ensembles.senior),
    }
}

pub fn supporting_members(metadata: &OrganizationMetadata, schema: &MetadataSchema) -> u32 {
    metadata
        .integer(&schema.supporting_members)
        .and_then(|count| u32::try_from(count).ok())
        .unwrap_or(0)
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}
