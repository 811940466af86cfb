use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::sheet::Cell;

pub const COUNTRY: &str = "D";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Woman,
    Man,
    Diverse,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Woman, Gender::Man, Gender::Diverse];

    /// Total mapping: 1 is woman, 2 is man, everything else (3, unknown, missing) is diverse.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(1) => Gender::Woman,
            Some(2) => Gender::Man,
            _ => Gender::Diverse,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Gender::Woman => "w",
            Gender::Man => "m",
            Gender::Diverse => "d",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Age/activity predicates used for the tally. Buckets overlap; a member
/// of age 20 lands in both `Under27` and `From18`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    SchoolAge,
    Under18,
    Under27,
    From18,
    From27,
    Total,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Bucket::SchoolAge,
        Bucket::Under18,
        Bucket::Under27,
        Bucket::From18,
        Bucket::From27,
        Bucket::Total,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Bucket::SchoolAge => "Aktive 7 < 18",
            Bucket::Under18 => "Aktive < 18",
            Bucket::Under27 => "Aktive < 27",
            Bucket::From18 => "Aktive ab 18",
            Bucket::From27 => "Aktive ab 27",
            Bucket::Total => "Aktive",
        }
    }

    /// Whether a member of the given age belongs to this bucket. Only the
    /// unfiltered total admits members whose age is unknown.
    pub fn admits(self, age: Option<u32>) -> bool {
        match (self, age) {
            (Bucket::Total, _) => true,
            (_, None) => false,
            (Bucket::SchoolAge, Some(age)) => (7..=17).contains(&age),
            (Bucket::Under18, Some(age)) => age < 18,
            (Bucket::Under27, Some(age)) => age < 27,
            (Bucket::From18, Some(age)) => age >= 18,
            (Bucket::From27, Some(age)) => age >= 27,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityField {
    RegistrationNumber,
    OrganizationName,
    Title,
    FirstName,
    LastName,
    Street,
    PostalCode,
    City,
    Email,
}

impl IdentityField {
    pub const ALL: [IdentityField; 9] = [
        IdentityField::RegistrationNumber,
        IdentityField::OrganizationName,
        IdentityField::Title,
        IdentityField::FirstName,
        IdentityField::LastName,
        IdentityField::Street,
        IdentityField::PostalCode,
        IdentityField::City,
        IdentityField::Email,
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnsembleMembership {
    pub early_education: bool,
    pub main: bool,
    pub youth: bool,
    pub student: bool,
    pub senior: bool,
}

impl EnsembleMembership {
    pub fn is_active(&self) -> bool {
        self.early_education || self.main || self.youth || self.student || self.senior
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberRecord {
    /// 1-based row number in the roster sheet, header included.
    pub row: usize,
    pub birth_date: Option<NaiveDate>,
    pub gender: Gender,
    pub ensembles: EnsembleMembership,
    pub primary_function: bool,
    pub contact: HashMap<IdentityField, String>,
}

impl MemberRecord {
    pub fn contact_field(&self, field: IdentityField) -> Option<&str> {
        self.contact.get(&field).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizationMetadata {
    values: BTreeMap<String, Cell>,
}

impl OrganizationMetadata {
    /// Records a value. A key keeps its first non-blank value.
    pub fn insert(&mut self, key: impl Into<String>, value: Cell) {
        let key = key.into();
        match self.values.get(&key) {
            Some(existing) if !existing.is_blank() => {}
            _ => {
                self.values.insert(key, value);
            }
        }
    }

    /// First non-blank text value among the given keys.
    pub fn text<S: AsRef<str>>(&self, keys: &[S]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.values.get(key.as_ref()))
            .find_map(Cell::as_text)
    }

    /// First value among the given keys that reads as a whole number.
    pub fn integer<S: AsRef<str>>(&self, keys: &[S]) -> Option<i64> {
        keys.iter()
            .filter_map(|key| self.values.get(key.as_ref()))
            .find_map(Cell::as_integer)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketCounts {
    counts: [[u32; 3]; 6],
}

impl BucketCounts {
    pub fn get(&self, bucket: Bucket, gender: Gender) -> u32 {
        self.counts[bucket.index()][gender.index()]
    }

    pub fn total(&self, bucket: Bucket) -> u32 {
        self.counts[bucket.index()].iter().sum()
    }

    pub(crate) fn increment(&mut self, bucket: Bucket, gender: Gender) {
        self.counts[bucket.index()][gender.index()] += 1;
    }
}

impl Serialize for BucketCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Split {
            w: u32,
            m: u32,
            d: u32,
            total: u32,
        }

        let mut map = serializer.serialize_map(Some(Bucket::ALL.len()))?;
        for bucket in Bucket::ALL {
            let split = Split {
                w: self.get(bucket, Gender::Woman),
                m: self.get(bucket, Gender::Man),
                d: self.get(bucket, Gender::Diverse),
                total: self.total(bucket),
            };
            map.serialize_entry(bucket.label(), &split)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnsemblePresence {
    pub youth: bool,
    pub adult: bool,
    pub senior: bool,
}

impl EnsemblePresence {
    pub fn total(&self) -> u32 {
        u32::from(self.youth) + u32::from(self.adult) + u32::from(self.senior)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Identity {
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

impl Identity {
    pub fn from_fn(mut resolve: impl FnMut(IdentityField) -> String) -> Self {
        Self {
            registration_number: resolve(IdentityField::RegistrationNumber),
            organization_name: resolve(IdentityField::OrganizationName),
            title: resolve(IdentityField::Title),
            first_name: resolve(IdentityField::FirstName),
            last_name: resolve(IdentityField::LastName),
            street: resolve(IdentityField::Street),
            postal_code: resolve(IdentityField::PostalCode),
            city: resolve(IdentityField::City),
            email: resolve(IdentityField::Email),
        }
    }

    pub fn get(&self, field: IdentityField) -> &str {
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClubSummary {
    pub filename: String,
    pub identity: Identity,
    pub country: &'static str,
    pub ensembles: EnsemblePresence,
    pub counts: BucketCounts,
    pub supporting_members: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    pub sequence: usize,
    #[serde(flatten)]
    pub club: ClubSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Success(ClubSummary),
    Failure { filename: String, message: String },
}

/// Failure messages per input file. Files without an entry succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorLog {
    entries: BTreeMap<String, Vec<String>>,
}

impl ErrorLog {
    pub fn record(&mut self, filename: impl Into<String>, message: impl Into<String>) {
        self.entries
            .entry(filename.into())
            .or_default()
            .push(message.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, messages)| (name.as_str(), messages.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
