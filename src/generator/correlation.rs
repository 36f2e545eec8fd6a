//! Correlated column groups.
//!
//! Both kinds of group follow the same per-row state machine: the phase is
//! reset to [`GroupPhase::Pending`] at the start of every row, the first
//! member read in column order fills the whole group, and every other
//! member reads the filled values.

use super::fake::{self as fakes, email_for, street_address, US_PLACES};
use super::template::{to_template_value, TemplateContext, TemplateEngine};
use super::{ColumnGen, FkLookup, GenerateError, SqlValue};
use crate::schema::{Column, ColumnType};
use ahash::AHashMap;
use fake::faker::name::en::{FirstName, LastName};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entity a correlation group is synthesized from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationSource {
    Address,
    Person,
    #[serde(alias = "lat_long")]
    LatLong,
    Template,
}

/// A configured group of columns generated together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    pub columns: Vec<String>,
    pub source: CorrelationSource,
    /// Per-column templates for `source: template`
    #[serde(default)]
    pub template: BTreeMap<String, String>,
}

/// Per-row state of a group
#[derive(Debug, Default)]
pub enum GroupPhase {
    /// No member has been read in the current row
    #[default]
    Pending,
    /// Values for every member of the current row
    Ready(AHashMap<String, SqlValue>),
}

impl GroupPhase {
    fn get(&self, column: &str) -> SqlValue {
        match self {
            GroupPhase::Ready(values) => values.get(column).cloned().unwrap_or(SqlValue::Null),
            GroupPhase::Pending => SqlValue::Null,
        }
    }
}

#[derive(Debug)]
enum GroupKind {
    Address,
    Person,
    LatLong,
    /// Template names in member order
    Template(Vec<String>),
}

/// Same-table correlation group
#[derive(Debug)]
pub(crate) struct CorrelationGroup {
    /// Member names and types, in configured order
    members: Vec<(String, ColumnType)>,
    kind: GroupKind,
    /// Probability that the whole group is NULL, 0 when no member is nullable
    null_probability: f64,
    phase: GroupPhase,
}

impl CorrelationGroup {
    pub(crate) fn new(
        table: &str,
        index: usize,
        config: &CorrelationConfig,
        members: Vec<&Column>,
        null_probability: f64,
        templates: &mut TemplateEngine,
    ) -> Result<Self, GenerateError> {
        let kind = match config.source {
            CorrelationSource::Address => GroupKind::Address,
            CorrelationSource::Person => GroupKind::Person,
            CorrelationSource::LatLong => GroupKind::LatLong,
            CorrelationSource::Template => {
                let mut names = Vec::with_capacity(members.len());
                for column in &members {
                    let source = config.template.get(&column.name).ok_or_else(|| {
                        GenerateError::Config {
                            table: table.to_string(),
                            message: format!(
                                "correlation template: no template for column '{}'",
                                column.name
                            ),
                        }
                    })?;
                    let name = format!("correlation{}:{}", index, column.name);
                    templates
                        .add(&name, source)
                        .map_err(|e| GenerateError::Template {
                            table: table.to_string(),
                            column: column.name.clone(),
                            source: e,
                        })?;
                    names.push(name);
                }
                GroupKind::Template(names)
            }
        };

        let nullable = members.iter().any(|c| c.is_nullable && !c.is_primary_key);

        Ok(Self {
            members: members
                .iter()
                .map(|c| (c.name.clone(), c.col_type.clone()))
                .collect(),
            kind,
            null_probability: if nullable { null_probability } else { 0.0 },
            phase: GroupPhase::Pending,
        })
    }

    pub(crate) fn reset(&mut self) {
        self.phase = GroupPhase::Pending;
    }

    /// Value of `column` for the current row, filling the group on first access
    pub(crate) fn value(
        &mut self,
        table: &str,
        column: &str,
        rng: &mut StdRng,
        templates: &TemplateEngine,
    ) -> Result<SqlValue, GenerateError> {
        if let GroupPhase::Pending = self.phase {
            let values = self.fill(table, rng, templates)?;
            self.phase = GroupPhase::Ready(values);
        }
        Ok(self.phase.get(column))
    }

    fn fill(
        &self,
        table: &str,
        rng: &mut StdRng,
        templates: &TemplateEngine,
    ) -> Result<AHashMap<String, SqlValue>, GenerateError> {
        if self.null_probability > 0.0 && rng.random::<f64>() < self.null_probability {
            return Ok(self
                .members
                .iter()
                .map(|(name, _)| (name.clone(), SqlValue::Null))
                .collect());
        }

        match &self.kind {
            GroupKind::Address => Ok(self.address(rng)),
            GroupKind::Person => Ok(self.person(rng)),
            GroupKind::LatLong => Ok(self.lat_long(rng)),
            GroupKind::Template(names) => {
                let mut ctx = TemplateContext::new();
                let mut values = AHashMap::with_capacity(names.len());
                for ((column, _), name) in self.members.iter().zip(names) {
                    let rendered =
                        templates
                            .render(name, &ctx)
                            .map_err(|e| GenerateError::Template {
                                table: table.to_string(),
                                column: column.clone(),
                                source: e,
                            })?;
                    let value = SqlValue::String(rendered);
                    ctx.insert(column.clone(), to_template_value(&value));
                    values.insert(column.clone(), value);
                }
                Ok(values)
            }
        }
    }

    fn address(&self, rng: &mut StdRng) -> AHashMap<String, SqlValue> {
        let (city, state, abbr, zip_prefix) = US_PLACES[rng.random_range(0..US_PLACES.len())];
        let street = street_address(rng);
        let zip = format!("{}{:02}", zip_prefix, rng.random_range(0..100));

        self.members
            .iter()
            .map(|(name, _)| {
                let value = match name.to_lowercase().as_str() {
                    "country" => "United States".to_string(),
                    "country_code" => "US".to_string(),
                    "state" | "province" => state.to_string(),
                    "state_code" | "state_abbr" => abbr.to_string(),
                    "street" | "address" | "address_line" | "address1" | "street_address" => {
                        street.clone()
                    }
                    "zip" | "zipcode" | "zip_code" | "postal" | "postal_code" => zip.clone(),
                    _ => city.to_string(),
                };
                (name.clone(), SqlValue::String(value))
            })
            .collect()
    }

    fn person(&self, rng: &mut StdRng) -> AHashMap<String, SqlValue> {
        let first: String = FirstName().fake_with_rng(rng);
        let last: String = LastName().fake_with_rng(rng);
        let email = email_for(&first, &last, rng);
        let phone: String = PhoneNumber().fake_with_rng(rng);

        self.members
            .iter()
            .map(|(name, _)| {
                let value = match name.to_lowercase().as_str() {
                    "last_name" | "lastname" | "surname" => last.clone(),
                    "name" | "full_name" | "fullname" => format!("{} {}", first, last),
                    "email" => email.clone(),
                    "phone" => phone.clone(),
                    _ => first.clone(),
                };
                (name.clone(), SqlValue::String(value))
            })
            .collect()
    }

    fn lat_long(&self, rng: &mut StdRng) -> AHashMap<String, SqlValue> {
        let lat = fakes::round_to(rng.random_range(-90.0..=90.0), 6);
        let lng = fakes::round_to(rng.random_range(-180.0..=180.0), 6);

        self.members
            .iter()
            .map(|(name, ty)| {
                let v = match name.to_lowercase().as_str() {
                    "longitude" | "lng" | "lon" => lng,
                    _ => lat,
                };
                let value = match ty {
                    ColumnType::Decimal => SqlValue::Decimal(format!("{:.6}", v)),
                    t if t.is_string() => SqlValue::String(v.to_string()),
                    _ => SqlValue::Float(v),
                };
                (name.clone(), value)
            })
            .collect()
    }
}

/// FK columns kept consistent through one driver column
#[derive(Debug)]
pub(crate) struct FkCluster {
    /// Position of the driver among the generated columns
    pub(crate) driver_index: usize,
    driver: String,
    driver_gen: ColumnGen,
    lookups: Vec<FkLookup>,
    phase: GroupPhase,
}

impl FkCluster {
    pub(crate) fn new(
        driver_index: usize,
        driver: String,
        driver_gen: ColumnGen,
        lookups: Vec<FkLookup>,
    ) -> Self {
        Self {
            driver_index,
            driver,
            driver_gen,
            lookups,
            phase: GroupPhase::Pending,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.phase = GroupPhase::Pending;
    }

    pub(crate) fn driver_is_unique(&self) -> bool {
        self.driver_gen.unique.is_some()
    }

    /// Value of `column` for the current row. The first member read picks
    /// the driver's parent row and derives every looked-up column.
    pub(crate) fn value(
        &mut self,
        table: &str,
        driver_column: &Column,
        column: &str,
        rng: &mut StdRng,
        templates: &TemplateEngine,
    ) -> Result<SqlValue, GenerateError> {
        if let GroupPhase::Pending = self.phase {
            let driver_value = self.driver_gen.next(table, driver_column, rng, templates)?;
            let mut values = AHashMap::with_capacity(self.lookups.len() + 1);
            for lookup in &self.lookups {
                values.insert(lookup.derived_column.clone(), lookup.derive(&driver_value));
            }
            values.insert(self.driver.clone(), driver_value);
            self.phase = GroupPhase::Ready(values);
        }
        Ok(self.phase.get(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn address_group(columns: &[&str]) -> CorrelationGroup {
        let members: Vec<Column> = columns
            .iter()
            .map(|c| Column::new(*c, "varchar(128)"))
            .collect();
        let config = CorrelationConfig {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            source: CorrelationSource::Address,
            template: BTreeMap::new(),
        };
        let mut templates = TemplateEngine::new();
        CorrelationGroup::new("t", 0, &config, members.iter().collect(), 0.0, &mut templates)
            .unwrap()
    }

    #[test]
    fn test_address_members_come_from_one_place() {
        let mut group = address_group(&["city", "state", "zip"]);
        let mut rng = StdRng::seed_from_u64(3);
        let templates = TemplateEngine::new();

        for _ in 0..50 {
            group.reset();
            let city = group.value("t", "city", &mut rng, &templates).unwrap().to_string();
            let state = group.value("t", "state", &mut rng, &templates).unwrap().to_string();
            let zip = group.value("t", "zip", &mut rng, &templates).unwrap().to_string();

            let place = US_PLACES
                .iter()
                .find(|(c, s, _, _)| *c == city && *s == state)
                .unwrap_or_else(|| panic!("{}, {} is not a known place", city, state));
            assert!(zip.starts_with(place.3));
        }
    }

    #[test]
    fn test_values_are_stable_within_a_row() {
        let mut group = address_group(&["city", "state"]);
        let mut rng = StdRng::seed_from_u64(5);
        let templates = TemplateEngine::new();

        let first = group.value("t", "city", &mut rng, &templates).unwrap();
        let again = group.value("t", "city", &mut rng, &templates).unwrap();
        assert_eq!(first, again);
        assert!(matches!(group.phase, GroupPhase::Ready(_)));

        group.reset();
        assert!(matches!(group.phase, GroupPhase::Pending));
    }
}
