use std::fmt::Write as _;
use std::io;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use clap::ValueEnum;

use crate::models::{Bucket, ClubSummary, ErrorLog, Gender, IdentityField, OutputRow};

pub const NO_ERRORS: &str = "Keine Fehler festgestellt.";

const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H-%M";

/// Identity columns in output order, with the country slotted in after the
/// street.
const IDENTITY_COLUMNS: [(&str, Option<IdentityField>); 10] = [
    ("Verbandsnummer", Some(IdentityField::RegistrationNumber)),
    ("Verein/Verband", Some(IdentityField::OrganizationName)),
    ("Titel", Some(IdentityField::Title)),
    ("Vorname", Some(IdentityField::FirstName)),
    ("Name", Some(IdentityField::LastName)),
    ("Straße/Postfach", Some(IdentityField::Street)),
    ("Land", None),
    ("PLZ", Some(IdentityField::PostalCode)),
    ("Ort", Some(IdentityField::City)),
    ("E-Mail", Some(IdentityField::Email)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

pub fn header() -> Vec<String> {
    let mut columns = vec!["lfd. Nr.".to_string()];
    columns.extend(IDENTITY_COLUMNS.iter().map(|(label, _)| label.to_string()));
    columns.extend(
        [
            "Jugendorchester",
            "Erwachsenenorchester",
            "Seniorenorchester",
            "Orchester gesamt",
        ]
        .map(String::from),
    );
    for bucket in Bucket::ALL {
        for gender in Gender::ALL {
            columns.push(format!("{} {}", bucket.label(), gender.suffix()));
        }
        columns.push(bucket.label().to_string());
    }
    columns.push("Fördernde".to_string());
    columns
}

pub fn row_values(row: &OutputRow) -> Vec<String> {
    let club = &row.club;
    let mut values = vec![row.sequence.to_string()];
    values.extend(IDENTITY_COLUMNS.iter().map(|(_, field)| match field {
        Some(field) => club.identity.get(*field).to_string(),
        None => club.country.to_string(),
    }));
    values.extend(
        [
            u32::from(club.ensembles.youth),
            u32::from(club.ensembles.adult),
            u32::from(club.ensembles.senior),
            club.ensembles.total(),
        ]
        .map(|flag| flag.to_string()),
    );
    for bucket in Bucket::ALL {
        for gender in Gender::ALL {
            values.push(club.counts.get(bucket, gender).to_string());
        }
        values.push(club.counts.total(bucket).to_string());
    }
    values.push(club.supporting_members.to_string());
    values
}

pub fn write_csv<W: io::Write>(writer: W, rows: &[OutputRow]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(header())?;
    for row in rows {
        csv.write_record(row_values(row))?;
    }
    csv.flush().context("failed to flush report table")?;
    Ok(())
}

pub fn write_json<W: io::Write>(writer: W, rows: &[OutputRow]) -> Result<()> {
    serde_json::to_writer_pretty(writer, rows).context("failed to write report table")?;
    Ok(())
}

pub fn write_table<W: io::Write>(writer: W, rows: &[OutputRow], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Csv => write_csv(writer, rows),
        OutputFormat::Json => write_json(writer, rows),
    }
}

/// Plain-text error log: one block per failed file, or the fixed
/// no-errors line.
pub fn build_error_report(errors: &ErrorLog) -> String {
    if errors.is_empty() {
        return format!("{NO_ERRORS}\n");
    }

    let mut output = String::new();
    for (filename, messages) in errors.iter() {
        let _ = writeln!(output, "{filename}");
        for message in messages {
            let _ = writeln!(output, "{message}");
        }
        let _ = writeln!(output);
    }
    output
}

pub fn output_file_names<Tz: TimeZone>(
    generated_at: &DateTime<Tz>,
    report_stem: &str,
    format: OutputFormat,
) -> (String, String)
where
    Tz::Offset: std::fmt::Display,
{
    let timestamp = generated_at.format(TIMESTAMP_FORMAT);
    (
        format!("{timestamp}_{report_stem}.{}", format.extension()),
        format!("Fehlerprotokoll_{timestamp}.txt"),
    )
}

pub fn build_club_summary(club: &ClubSummary) -> String {
    let mut output = String::new();
    let identity = &club.identity;
    let name = if identity.organization_name.is_empty() {
        club.filename.as_str()
    } else {
        identity.organization_name.as_str()
    };

    let _ = writeln!(output, "# {name}");
    let _ = writeln!(
        output,
        "Verbandsnummer {} | Kontakt: {} {} {}, {}, {} {} ({})",
        display(&identity.registration_number),
        display(&identity.title),
        display(&identity.first_name),
        display(&identity.last_name),
        display(&identity.street),
        display(&identity.postal_code),
        display(&identity.city),
        display(&identity.email),
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Ensembles");
    let _ = writeln!(
        output,
        "- Jugend {} | Erwachsene {} | Senioren {} | gesamt {}",
        u32::from(club.ensembles.youth),
        u32::from(club.ensembles.adult),
        u32::from(club.ensembles.senior),
        club.ensembles.total()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Aktive");
    for bucket in Bucket::ALL {
        let _ = writeln!(
            output,
            "- {}: {} (w {}, m {}, d {})",
            bucket.label(),
            club.counts.total(bucket),
            club.counts.get(bucket, Gender::Woman),
            club.counts.get(bucket, Gender::Man),
            club.counts.get(bucket, Gender::Diverse)
        );
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "Fördernde Mitglieder: {}", club.supporting_members);

    output
}

fn display(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::models::{BucketCounts, EnsemblePresence, Identity, COUNTRY};

    fn sample_row() -> OutputRow {
        let mut counts = BucketCounts::default();
        counts.increment(Bucket::Under18, Gender::Man);
        counts.increment(Bucket::SchoolAge, Gender::Man);
        counts.increment(Bucket::Total, Gender::Man);
        counts.increment(Bucket::Total, Gender::Woman);

        OutputRow {
            sequence: 3,
            club: ClubSummary {
                filename: "mv_hallstadt.xlsx".to_string(),
                identity: Identity {
                    registration_number: "BVN-0815".to_string(),
                    organization_name: "Musikverein Hallstadt".to_string(),
                    first_name: "Eva".to_string(),
                    last_name: "Roth".to_string(),
                    postal_code: "96103".to_string(),
                    city: "Hallstadt".to_string(),
                    ..Identity::default()
                },
                country: COUNTRY,
                ensembles: EnsemblePresence {
                    youth: true,
                    adult: true,
                    senior: false,
                },
                counts,
                supporting_members: 41,
            },
        }
    }

    #[test]
    fn header_has_fixed_column_order() {
        let header = header();
        assert_eq!(header.len(), 1 + 10 + 4 + 6 * 4 + 1);
        assert_eq!(header[0], "lfd. Nr.");
        assert_eq!(header[7], "Land");
        assert_eq!(header[11], "Jugendorchester");
        assert_eq!(header[14], "Orchester gesamt");
        assert_eq!(header[15], "Aktive 7 < 18 w");
        assert_eq!(header[18], "Aktive 7 < 18");
        assert_eq!(header[19], "Aktive < 18 w");
        assert_eq!(header[35], "Aktive w");
        assert_eq!(header[38], "Aktive");
        assert_eq!(header[39], "Fördernde");
    }

    #[test]
    fn row_values_line_up_with_header() {
        let header = header();
        let values = row_values(&sample_row());
        assert_eq!(values.len(), header.len());

        let column = |label: &str| {
            let index = header.iter().position(|h| h == label).unwrap();
            values[index].clone()
        };
        assert_eq!(column("lfd. Nr."), "3");
        assert_eq!(column("Verein/Verband"), "Musikverein Hallstadt");
        assert_eq!(column("Titel"), "");
        assert_eq!(column("Land"), "D");
        assert_eq!(column("PLZ"), "96103");
        assert_eq!(column("Jugendorchester"), "1");
        assert_eq!(column("Seniorenorchester"), "0");
        assert_eq!(column("Orchester gesamt"), "2");
        assert_eq!(column("Aktive < 18 m"), "1");
        assert_eq!(column("Aktive < 18"), "1");
        assert_eq!(column("Aktive 7 < 18 m"), "1");
        assert_eq!(column("Aktive w"), "1");
        assert_eq!(column("Aktive"), "2");
        assert_eq!(column("Fördernde"), "41");
    }

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &[sample_row()]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("lfd. Nr.,Verbandsnummer,Verein/Verband"));
        assert!(lines[1].starts_with("3,BVN-0815,Musikverein Hallstadt,,Eva,Roth,,D,96103"));
        assert!(lines[1].ends_with(",41"));
    }

    #[test]
    fn empty_batch_still_writes_the_header() {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &[]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn json_nests_counts_by_bucket() {
        let mut buffer = Vec::new();
        write_table(&mut buffer, &[sample_row()], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();

        assert_eq!(value[0]["sequence"], 3);
        assert_eq!(value[0]["identity"]["city"], "Hallstadt");
        assert_eq!(value[0]["counts"]["Aktive < 18"]["m"], 1);
        assert_eq!(value[0]["counts"]["Aktive"]["total"], 2);
        assert_eq!(value[0]["ensembles"]["youth"], true);
    }

    #[test]
    fn error_report_lists_files_in_blocks() {
        let mut errors = ErrorLog::default();
        errors.record("b.xlsx", "Worksheet 'Vereinssatz' not found");
        errors.record("a.xlsx", "Could not read workbook: broken zip");
        errors.record("a.xlsx", "second message");

        assert_eq!(
            build_error_report(&errors),
            "a.xlsx\nCould not read workbook: broken zip\nsecond message\n\n\
             b.xlsx\nWorksheet 'Vereinssatz' not found\n\n"
        );
    }

    #[test]
    fn error_report_without_failures_is_the_sentinel() {
        assert_eq!(
            build_error_report(&ErrorLog::default()),
            "Keine Fehler festgestellt.\n"
        );
    }

    #[test]
    fn file_names_carry_the_timestamp() {
        let generated_at = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2025, 3, 9)
                .unwrap()
                .and_hms_opt(14, 5, 0)
                .unwrap(),
        );
        let (report, log) = output_file_names(&generated_at, "Verbandsmeldung", OutputFormat::Csv);
        assert_eq!(report, "2025_03_09_14-05_Verbandsmeldung.csv");
        assert_eq!(log, "Fehlerprotokoll_2025_03_09_14-05.txt");
    }

    #[test]
    fn club_summary_mentions_every_bucket() {
        let summary = build_club_summary(&sample_row().club);
        assert!(summary.starts_with("# Musikverein Hallstadt\n"));
        for bucket in Bucket::ALL {
            assert!(summary.contains(bucket.label()), "{}", bucket.label());
        }
        assert!(summary.contains("Fördernde Mitglieder: 41"));
    }
}
