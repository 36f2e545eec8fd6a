//! Type-based fallback values, chosen from a column's declared SQL type.

use super::fake::{datetime_between, letters, round_to};
use super::SqlValue;
use crate::schema::{Column, ColumnType};
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::Fake;
use rand::Rng;

const DEFAULT_PRECISION: u32 = 10;
const DEFAULT_SCALE: u32 = 2;
const DEFAULT_STRING_LEN: u64 = 20;
const BINARY_LEN: u64 = 16;

/// Produce a value valid for `column`'s declared type
pub fn type_fallback<R: Rng + ?Sized>(column: &Column, rng: &mut R) -> SqlValue {
    let unsigned = column.is_unsigned;
    match &column.col_type {
        ColumnType::Bool => SqlValue::Bool(rng.random()),
        ColumnType::TinyInt if unsigned => SqlValue::Int(rng.random_range(0..=255)),
        ColumnType::TinyInt => SqlValue::Int(rng.random_range(-128..=127)),
        ColumnType::SmallInt if unsigned => SqlValue::Int(rng.random_range(0..=65_535)),
        ColumnType::SmallInt => SqlValue::Int(rng.random_range(-32_768..=32_767)),
        ColumnType::MediumInt if unsigned => SqlValue::Int(rng.random_range(0..=16_777_215)),
        ColumnType::MediumInt => SqlValue::Int(rng.random_range(-8_388_608..=8_388_607)),
        ColumnType::Int if unsigned => SqlValue::Int(rng.random_range(0..=u32::MAX as i64)),
        ColumnType::Int => SqlValue::Int(rng.random_range(0..=i32::MAX as i64)),
        ColumnType::BigInt => SqlValue::Int(rng.random_range(0..=i64::MAX)),
        ColumnType::Float => SqlValue::Float(round_to(rng.random::<f64>() * 1000.0, 2)),
        ColumnType::Double => SqlValue::Float(round_to(rng.random::<f64>() * 10_000.0, 2)),
        ColumnType::Decimal => SqlValue::Decimal(decimal(
            column.precision.unwrap_or(DEFAULT_PRECISION),
            column.scale.unwrap_or(DEFAULT_SCALE),
            rng,
        )),
        ColumnType::Char | ColumnType::VarChar => {
            let len = column
                .max_length
                .unwrap_or(DEFAULT_STRING_LEN)
                .clamp(1, DEFAULT_STRING_LEN);
            SqlValue::String(letters(rng, len as usize))
        }
        ColumnType::Text => SqlValue::String(Paragraph(3..5).fake_with_rng(rng)),
        ColumnType::TinyText => SqlValue::String(Sentence(5..6).fake_with_rng(rng)),
        ColumnType::Date => SqlValue::Date(datetime_between(rng, 2020, 2025).date()),
        ColumnType::DateTime | ColumnType::Timestamp => {
            SqlValue::DateTime(datetime_between(rng, 2020, 2025))
        }
        ColumnType::Time => SqlValue::Time(format!(
            "{:02}:{:02}:{:02}",
            rng.random_range(0..24),
            rng.random_range(0..60),
            rng.random_range(0..60)
        )),
        ColumnType::Year => SqlValue::Int(rng.random_range(2000..=2025)),
        ColumnType::Json => {
            SqlValue::String(serde_json::json!({ "seed": rng.random_range(0..1_000_000) }).to_string())
        }
        ColumnType::Binary => {
            let len = match column.max_length {
                Some(n) if n > 0 => n.min(BINARY_LEN),
                _ => BINARY_LEN,
            };
            SqlValue::Bytes((0..len).map(|_| rng.random()).collect())
        }
        ColumnType::Bit => SqlValue::Int(rng.random_range(0..=1)),
        ColumnType::Enum | ColumnType::Set => match column.enum_values.as_slice() {
            [] => SqlValue::String(letters(rng, 10)),
            values => SqlValue::String(values[rng.random_range(0..values.len())].clone()),
        },
        ColumnType::Other(_) => SqlValue::String(letters(rng, 10)),
    }
}

/// Random fixed-point number with at most `precision` digits, `scale` of
/// them after the point.
fn decimal<R: Rng + ?Sized>(precision: u32, scale: u32, rng: &mut R) -> String {
    let scale = scale.min(precision);
    let int_digits = (precision - scale).min(15);
    let int_part: u64 = rng.random_range(0..10u64.pow(int_digits));
    if scale == 0 {
        return int_part.to_string();
    }

    let frac: String = (0..scale)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect();
    format!("{}.{}", int_part, frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_integer_ranges() {
        let mut rng = StdRng::seed_from_u64(5);
        let col = Column::new("n", "tinyint(3) unsigned");
        for _ in 0..500 {
            let v = type_fallback(&col, &mut rng).as_i64().unwrap();
            assert!((0..=255).contains(&v));
        }
        let col = Column::new("n", "smallint");
        for _ in 0..500 {
            let v = type_fallback(&col, &mut rng).as_i64().unwrap();
            assert!((-32_768..=32_767).contains(&v));
        }
    }

    #[test]
    fn test_decimal_respects_precision_and_scale() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let s = decimal(5, 2, &mut rng);
            let (int_part, frac) = s.split_once('.').unwrap();
            assert!(int_part.len() <= 3);
            assert_eq!(frac.len(), 2);
        }
        assert!(!decimal(4, 0, &mut rng).contains('.'));
    }

    #[test]
    fn test_string_respects_max_length() {
        let mut rng = StdRng::seed_from_u64(5);
        let col = Column::new("code", "char(3)");
        match type_fallback(&col, &mut rng) {
            SqlValue::String(s) => assert_eq!(s.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_tinyint_one_is_bool() {
        let mut rng = StdRng::seed_from_u64(5);
        let col = Column::new("active", "tinyint(1)");
        assert!(matches!(type_fallback(&col, &mut rng), SqlValue::Bool(_)));
    }
}
