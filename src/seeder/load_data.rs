//! Tab-separated encoding for `LOAD DATA LOCAL INFILE`.
//!
//! Uses MySQL's default field and line handling: fields separated by `\t`,
//! lines terminated by `\n`, backslash as the escape character and `\N` for
//! NULL.

use crate::generator::{format_float, SqlValue, DATETIME_FORMAT, DATE_FORMAT};
use crate::seeder::indexes::quote_ident;
use bytes::{BufMut, BytesMut};

/// Encode rows into one TSV buffer
pub fn encode_rows(rows: &[Vec<SqlValue>]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(rows.len() * 64);
    for row in rows {
        encode_row(row, &mut buf);
    }
    buf
}

/// Append one row, newline-terminated
pub fn encode_row(row: &[SqlValue], buf: &mut BytesMut) {
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            buf.put_u8(b'\t');
        }
        encode_value(value, buf);
    }
    buf.put_u8(b'\n');
}

fn encode_value(value: &SqlValue, buf: &mut BytesMut) {
    match value {
        SqlValue::Null => buf.put_slice(b"\\N"),
        SqlValue::Int(n) => buf.put_slice(n.to_string().as_bytes()),
        SqlValue::UInt(n) => buf.put_slice(n.to_string().as_bytes()),
        SqlValue::Float(v) => buf.put_slice(format_float(*v).as_bytes()),
        SqlValue::Bool(b) => buf.put_u8(if *b { b'1' } else { b'0' }),
        SqlValue::Date(d) => buf.put_slice(d.format(DATE_FORMAT).to_string().as_bytes()),
        SqlValue::DateTime(dt) => {
            buf.put_slice(dt.format(DATETIME_FORMAT).to_string().as_bytes())
        }
        SqlValue::Decimal(s) | SqlValue::String(s) | SqlValue::Time(s) => {
            escape_into(s.as_bytes(), buf)
        }
        SqlValue::Bytes(b) => escape_into(b, buf),
    }
}

fn escape_into(bytes: &[u8], buf: &mut BytesMut) {
    for &b in bytes {
        match b {
            b'\t' => buf.put_slice(b"\\t"),
            b'\n' => buf.put_slice(b"\\n"),
            b'\r' => buf.put_slice(b"\\r"),
            b'\\' => buf.put_slice(b"\\\\"),
            0 => buf.put_slice(b"\\0"),
            _ => buf.put_u8(b),
        }
    }
}

/// `LOAD DATA LOCAL INFILE` statement for `columns` of `table`
pub fn load_statement(table: &str, columns: &[String]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "LOAD DATA LOCAL INFILE 'seed.tsv' INTO TABLE {} \
         CHARACTER SET utf8mb4 \
         FIELDS TERMINATED BY '\\t' ESCAPED BY '\\\\' \
         LINES TERMINATED BY '\\n' ({})",
        quote_ident(table),
        cols.join(", ")
    )
}
