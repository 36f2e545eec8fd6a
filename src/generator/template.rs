//! User-declared column templates rendered with minijinja.
//!
//! Templates call fake-data functions (`{{ first_name() }}`, `{{ int(1, 9) }}`)
//! and, inside a correlation group, read earlier members by name
//! (`{{ slug }}`).

use super::fake::{
    datetime_between, email_for, ipv4, job_title, round_to, street_address, url, uuid_v4,
};
use super::SqlValue;
use fake::faker::address::en::{CityName, CountryName, StateName};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::Username;
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use minijinja::value::Rest;
use minijinja::{Environment, Value};
use rand::Rng;
use std::collections::BTreeMap;

/// Render context: column name to value
pub type TemplateContext = BTreeMap<String, Value>;

/// Compiled templates of one table
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        register_functions(&mut env);
        Self { env }
    }

    /// Compile `source` under `name`
    pub fn add(&mut self, name: &str, source: &str) -> Result<(), minijinja::Error> {
        self.env
            .add_template_owned(name.to_string(), source.to_string())
    }

    pub fn render(&self, name: &str, ctx: &TemplateContext) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(ctx)
    }

    /// For callers registering functions of their own
    pub(crate) fn env_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }
}

/// Expose a generated value to templates
pub fn to_template_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::from(()),
        SqlValue::Int(n) => Value::from(*n),
        SqlValue::UInt(n) => Value::from(*n),
        SqlValue::Float(v) => Value::from(*v),
        SqlValue::Bool(b) => Value::from(*b),
        other => Value::from(other.to_string()),
    }
}

fn register_functions(env: &mut Environment<'static>) {
    env.add_function("first_name", || -> String { FirstName().fake() });
    env.add_function("last_name", || -> String { LastName().fake() });
    env.add_function("name", || -> String { Name().fake() });
    env.add_function("email", || {
        let mut rng = rand::rng();
        let first: String = FirstName().fake_with_rng(&mut rng);
        let last: String = LastName().fake_with_rng(&mut rng);
        email_for(&first, &last, &mut rng)
    });
    env.add_function("phone", || -> String { PhoneNumber().fake() });
    env.add_function("username", || -> String { Username().fake() });
    env.add_function("city", || -> String { CityName().fake() });
    env.add_function("state", || -> String { StateName().fake() });
    env.add_function("zip", || format!("{:05}", rand::rng().random_range(501..99951)));
    env.add_function("country", || -> String { CountryName().fake() });
    env.add_function("street", || street_address(&mut rand::rng()));
    env.add_function("company", || -> String { CompanyName().fake() });
    env.add_function("job_title", || job_title(&mut rand::rng()));
    env.add_function("word", || -> String { Word().fake() });
    env.add_function("sentence", || -> String { Sentence(5..10).fake() });
    env.add_function("uuid", || uuid_v4(&mut rand::rng()));
    env.add_function("ipv4", || ipv4(&mut rand::rng()));
    env.add_function("url", || url(&mut rand::rng()));
    env.add_function("int", |min: Option<i64>, max: Option<i64>| -> i64 {
        let (lo, hi) = ordered(min.unwrap_or(0), max.unwrap_or(1000));
        rand::rng().random_range(lo..=hi)
    });
    env.add_function("float", |min: Option<f64>, max: Option<f64>| -> f64 {
        let lo = min.unwrap_or(0.0);
        let hi = max.unwrap_or(1.0).max(lo);
        round_to(lo + rand::rng().random::<f64>() * (hi - lo), 2)
    });
    env.add_function("date", |from: Option<i32>, to: Option<i32>| -> String {
        datetime_between(&mut rand::rng(), from.unwrap_or(2020), to.unwrap_or(2025))
            .format(super::value::DATE_FORMAT)
            .to_string()
    });
    env.add_function("pick", |choices: Rest<Value>| -> Value {
        if choices.is_empty() {
            return Value::from(());
        }
        choices[rand::rng().random_range(0..choices.len())].clone()
    });
}

fn ordered(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
