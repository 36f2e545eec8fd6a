//! Name-based heuristics and realistic fake values.
//!
//! A column whose name and type match one of the rules below gets a value
//! shaped like what the name suggests. Rules are checked in order, most
//! specific first.

use super::SqlValue;
use crate::schema::{Column, ColumnType};
use chrono::{NaiveDate, NaiveDateTime};
use fake::faker::address::en::{CityName, CountryCode, CountryName, StateName, StreetName};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{Password, Username};
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::Rng;

const JOB_TITLES: &[&str] = &[
    "Software Engineer",
    "Product Manager",
    "Data Analyst",
    "Designer",
    "Marketing Manager",
    "Sales Representative",
    "Customer Support",
    "Operations Manager",
    "Accountant",
    "Site Reliability Engineer",
    "Recruiter",
    "Account Executive",
];

const CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CHF", "CAD", "AUD", "NOK", "SEK", "DKK", "PLN", "BRL",
];

const COLORS: &[&str] = &[
    "red", "green", "blue", "yellow", "purple", "orange", "black", "white", "gray", "teal",
    "navy", "maroon",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.net", "example.org", "mail.test"];

/// City, state, state abbreviation and zip prefix that belong together
pub(crate) const US_PLACES: &[(&str, &str, &str, &str)] = &[
    ("New York", "New York", "NY", "100"),
    ("Buffalo", "New York", "NY", "142"),
    ("Los Angeles", "California", "CA", "900"),
    ("San Francisco", "California", "CA", "941"),
    ("San Diego", "California", "CA", "921"),
    ("Chicago", "Illinois", "IL", "606"),
    ("Houston", "Texas", "TX", "770"),
    ("Austin", "Texas", "TX", "787"),
    ("Dallas", "Texas", "TX", "752"),
    ("Phoenix", "Arizona", "AZ", "850"),
    ("Philadelphia", "Pennsylvania", "PA", "191"),
    ("Pittsburgh", "Pennsylvania", "PA", "152"),
    ("Seattle", "Washington", "WA", "981"),
    ("Denver", "Colorado", "CO", "802"),
    ("Boston", "Massachusetts", "MA", "021"),
    ("Miami", "Florida", "FL", "331"),
    ("Orlando", "Florida", "FL", "328"),
    ("Atlanta", "Georgia", "GA", "303"),
    ("Portland", "Oregon", "OR", "972"),
    ("Minneapolis", "Minnesota", "MN", "554"),
    ("Detroit", "Michigan", "MI", "482"),
    ("Nashville", "Tennessee", "TN", "372"),
];

/// Heuristic generator chosen from a column's name and type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeKind {
    Uuid,
    Email,
    FirstName,
    LastName,
    FullName,
    Phone,
    Username,
    Password,
    Street,
    City,
    State,
    Zip,
    Country,
    CountryCode,
    Url,
    Ipv4,
    Company,
    JobTitle,
    Description,
    /// 2020-01-01 .. 2025-12-31
    RecentTimestamp,
    /// 1950-01-01 .. 2005-12-31
    BirthDate,
    Price,
    Latitude,
    Longitude,
    Currency,
    Color,
}

impl FakeKind {
    /// Match a column against the name rules
    pub fn for_column(column: &Column) -> Option<Self> {
        let name = column.name.to_lowercase();
        let name = name.as_str();
        let ty = &column.col_type;
        let text = ty.is_string();
        let num = ty.is_integer() || ty.is_fractional();
        let date = ty.is_temporal();

        let kind = if text && name == "uuid" {
            FakeKind::Uuid
        } else if text && (name == "email" || name.ends_with("_email")) {
            FakeKind::Email
        } else if text && (name.contains("first_name") || name.contains("firstname")) {
            FakeKind::FirstName
        } else if text && (name.contains("last_name") || name.contains("lastname")) {
            FakeKind::LastName
        } else if text && (name == "name" || name.ends_with("_name") || name.starts_with("name_"))
        {
            FakeKind::FullName
        } else if text && name.contains("phone") {
            FakeKind::Phone
        } else if text && (name.contains("username") || name == "login") {
            FakeKind::Username
        } else if text && name.contains("password") {
            FakeKind::Password
        } else if text
            && (name == "address"
                || name == "street"
                || name.contains("address_line")
                || name.contains("street_address"))
        {
            FakeKind::Street
        } else if text && name == "city" {
            FakeKind::City
        } else if text && (name == "state" || name == "province") {
            FakeKind::State
        } else if text && (name.contains("zip") || name.contains("postal")) {
            FakeKind::Zip
        } else if text && name == "country" {
            FakeKind::Country
        } else if text && name == "country_code" {
            FakeKind::CountryCode
        } else if text
            && (name.contains("url") || name.contains("website") || name.contains("homepage"))
        {
            FakeKind::Url
        } else if text && (name == "ip" || name.contains("ip_address") || name == "ip_addr") {
            FakeKind::Ipv4
        } else if text
            && (name.contains("company") || name == "organization" || name == "org")
        {
            FakeKind::Company
        } else if text && (name == "title" || name == "job_title") {
            FakeKind::JobTitle
        } else if text && matches!(name, "description" | "bio" | "summary" | "about") {
            FakeKind::Description
        } else if date
            && (name.contains("created_at")
                || name.contains("updated_at")
                || name.contains("deleted_at"))
        {
            FakeKind::RecentTimestamp
        } else if date && matches!(name, "date_of_birth" | "dob" | "birthday" | "birthdate") {
            FakeKind::BirthDate
        } else if num
            && (name.contains("price")
                || name.contains("amount")
                || name.contains("cost")
                || name == "total"
                || name == "subtotal")
        {
            FakeKind::Price
        } else if num && (name == "latitude" || name == "lat") {
            FakeKind::Latitude
        } else if num && matches!(name, "longitude" | "lng" | "lon") {
            FakeKind::Longitude
        } else if text && (name == "currency" || name == "currency_code") {
            FakeKind::Currency
        } else if text && (name == "color" || name == "colour") {
            FakeKind::Color
        } else if text && matches!(name, "avatar" | "image_url" | "photo_url") {
            FakeKind::Url
        } else {
            return None;
        };

        Some(kind)
    }

    /// Short label used when describing generator strategies
    pub fn label(&self) -> &'static str {
        match self {
            FakeKind::Uuid => "uuid",
            FakeKind::Email => "email",
            FakeKind::FirstName => "first name",
            FakeKind::LastName => "last name",
            FakeKind::FullName => "full name",
            FakeKind::Phone => "phone",
            FakeKind::Username => "username",
            FakeKind::Password => "password",
            FakeKind::Street => "street",
            FakeKind::City => "city",
            FakeKind::State => "state",
            FakeKind::Zip => "zip",
            FakeKind::Country => "country",
            FakeKind::CountryCode => "country code",
            FakeKind::Url => "url",
            FakeKind::Ipv4 => "ipv4",
            FakeKind::Company => "company",
            FakeKind::JobTitle => "job title",
            FakeKind::Description => "sentence",
            FakeKind::RecentTimestamp => "date 2020-2025",
            FakeKind::BirthDate => "date 1950-2005",
            FakeKind::Price => "price 1-1000",
            FakeKind::Latitude => "latitude",
            FakeKind::Longitude => "longitude",
            FakeKind::Currency => "currency",
            FakeKind::Color => "color",
        }
    }

    /// Produce a value shaped for a column of type `ty`
    pub fn generate<R: Rng + ?Sized>(&self, ty: &ColumnType, rng: &mut R) -> SqlValue {
        match self {
            FakeKind::Uuid => SqlValue::String(uuid_v4(rng)),
            FakeKind::Email => {
                let first: String = FirstName().fake_with_rng(rng);
                let last: String = LastName().fake_with_rng(rng);
                SqlValue::String(email_for(&first, &last, rng))
            }
            FakeKind::FirstName => SqlValue::String(FirstName().fake_with_rng(rng)),
            FakeKind::LastName => SqlValue::String(LastName().fake_with_rng(rng)),
            FakeKind::FullName => SqlValue::String(Name().fake_with_rng(rng)),
            FakeKind::Phone => SqlValue::String(PhoneNumber().fake_with_rng(rng)),
            FakeKind::Username => SqlValue::String(Username().fake_with_rng(rng)),
            FakeKind::Password => SqlValue::String(Password(12..17).fake_with_rng(rng)),
            FakeKind::Street => SqlValue::String(street_address(rng)),
            FakeKind::City => SqlValue::String(CityName().fake_with_rng(rng)),
            FakeKind::State => SqlValue::String(StateName().fake_with_rng(rng)),
            FakeKind::Zip => SqlValue::String(format!("{:05}", rng.random_range(501..99951))),
            FakeKind::Country => SqlValue::String(CountryName().fake_with_rng(rng)),
            FakeKind::CountryCode => SqlValue::String(CountryCode().fake_with_rng(rng)),
            FakeKind::Url => SqlValue::String(url(rng)),
            FakeKind::Ipv4 => SqlValue::String(ipv4(rng)),
            FakeKind::Company => SqlValue::String(CompanyName().fake_with_rng(rng)),
            FakeKind::JobTitle => SqlValue::from(pick(JOB_TITLES, rng)),
            FakeKind::Description => SqlValue::String(Sentence(8..12).fake_with_rng(rng)),
            FakeKind::RecentTimestamp => temporal(ty, datetime_between(rng, 2020, 2025)),
            FakeKind::BirthDate => temporal(ty, datetime_between(rng, 1950, 2005)),
            FakeKind::Price => {
                let v = round_to(rng.random_range(1.0..1000.0), 2);
                if *ty == ColumnType::Decimal {
                    SqlValue::Decimal(format!("{:.2}", v))
                } else if ty.is_integer() {
                    SqlValue::Int(v.round() as i64)
                } else {
                    SqlValue::Float(v)
                }
            }
            FakeKind::Latitude => coordinate(ty, rng.random_range(-90.0..=90.0)),
            FakeKind::Longitude => coordinate(ty, rng.random_range(-180.0..=180.0)),
            FakeKind::Currency => SqlValue::from(pick(CURRENCIES, rng)),
            FakeKind::Color => SqlValue::from(pick(COLORS, rng)),
        }
    }
}

fn temporal(ty: &ColumnType, dt: NaiveDateTime) -> SqlValue {
    if *ty == ColumnType::Date {
        SqlValue::Date(dt.date())
    } else {
        SqlValue::DateTime(dt)
    }
}

fn coordinate(ty: &ColumnType, v: f64) -> SqlValue {
    let v = round_to(v, 6);
    match ty {
        ColumnType::Decimal => SqlValue::Decimal(format!("{:.6}", v)),
        t if t.is_integer() => SqlValue::Int(v as i64),
        _ => SqlValue::Float(v),
    }
}

pub(crate) fn pick<'a, R: Rng + ?Sized>(items: &[&'a str], rng: &mut R) -> &'a str {
    items[rng.random_range(0..items.len())]
}

pub(crate) fn round_to(v: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (v * factor).round() / factor
}

/// Random version 4 UUID in canonical hyphenated form
pub fn uuid_v4<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut b: [u8; 16] = rng.random();
    b[6] = (b[6] & 0x0f) | 0x40;
    b[8] = (b[8] & 0x3f) | 0x80;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
    )
}

/// `n` random ASCII letters
pub fn letters<R: Rng + ?Sized>(rng: &mut R, n: usize) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    (0..n)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn email_for<R: Rng + ?Sized>(first: &str, last: &str, rng: &mut R) -> String {
    let local: String = format!("{}.{}", first, last)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect();
    format!(
        "{}{}@{}",
        local,
        rng.random_range(1..1000),
        pick(EMAIL_DOMAINS, rng)
    )
}

pub fn street_address<R: Rng + ?Sized>(rng: &mut R) -> String {
    let street: String = StreetName().fake_with_rng(rng);
    format!("{} {}", rng.random_range(1..9999), street)
}

pub fn url<R: Rng + ?Sized>(rng: &mut R) -> String {
    let word: String = Word().fake_with_rng(rng);
    format!("https://www.example{}.com/{}", rng.random_range(1..1000), word)
}

pub fn ipv4<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{}.{}.{}.{}",
        rng.random_range(1..=223),
        rng.random_range(0..=255),
        rng.random_range(0..=255),
        rng.random_range(1..=254)
    )
}

pub fn job_title<R: Rng + ?Sized>(rng: &mut R) -> String {
    pick(JOB_TITLES, rng).to_string()
}

/// Uniform datetime between Jan 1 of `from_year` and Dec 31 23:59:59 of `to_year`
pub fn datetime_between<R: Rng + ?Sized>(rng: &mut R, from_year: i32, to_year: i32) -> NaiveDateTime {
    let (from_year, to_year) = if from_year <= to_year {
        (from_year, to_year)
    } else {
        (to_year, from_year)
    };
    let start = NaiveDate::from_ymd_opt(from_year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let end = NaiveDate::from_ymd_opt(to_year, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .unwrap_or_default();
    let span = (end - start).num_seconds().max(0);
    start + chrono::Duration::seconds(rng.random_range(0..=span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn kind(name: &str, ty: &str) -> Option<FakeKind> {
        FakeKind::for_column(&Column::new(name, ty))
    }

    #[test]
    fn test_name_rules_respect_type() {
        assert_eq!(kind("email", "varchar(255)"), Some(FakeKind::Email));
        assert_eq!(kind("billing_email", "varchar(255)"), Some(FakeKind::Email));
        assert_eq!(kind("email", "int"), None);
        assert_eq!(kind("created_at", "datetime"), Some(FakeKind::RecentTimestamp));
        assert_eq!(kind("created_at", "varchar(20)"), None);
        assert_eq!(kind("unit_price", "decimal(10,2)"), Some(FakeKind::Price));
        assert_eq!(kind("lat", "double"), Some(FakeKind::Latitude));
    }

    #[test]
    fn test_more_specific_rules_win() {
        // "first_name" also ends with "_name"
        assert_eq!(kind("first_name", "varchar(50)"), Some(FakeKind::FirstName));
        assert_eq!(kind("company_name", "varchar(50)"), Some(FakeKind::FullName));
        assert_eq!(kind("avatar", "varchar(255)"), Some(FakeKind::Url));
    }

    #[test]
    fn test_birth_date_range() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            match FakeKind::BirthDate.generate(&ColumnType::Date, &mut rng) {
                SqlValue::Date(d) => assert!((1950..=2005).contains(&d.year())),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_uuid_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let u = uuid_v4(&mut rng);
        assert_eq!(u.len(), 36);
        assert_eq!(&u[14..15], "4");
    }
}
