// Copyright (c) 2023 mysql-aio contributors
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Column values and the text/binary row codecs.
//!
//! [`Value`] borrows the packet buffer it was decoded from; use
//! [`Value::into_owned`] to detach it.

use std::borrow::Cow;
use std::ops::Index;
use std::sync::Arc;

use crate::consts::ColumnType;
use crate::error::{DriverError, Result};
use crate::packets::{Column, NullBitmap, ParseBuf, ServerSide, WriteMysqlExt};

/// Maximum number of days in a `TIME` interval.
pub const MAX_TIME_DAYS: u32 = 35;

#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    NULL,
    Bytes(Cow<'a, [u8]>),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    /// year, month, day, hour, minutes, seconds, micro seconds
    Date(u16, u8, u8, u8, u8, u8, u32),
    /// is negative, days, hours, minutes, seconds, micro seconds
    Time(bool, u32, u8, u8, u8, u32),
}

impl<'a> Value<'a> {
    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::NULL => Value::NULL,
            Value::Bytes(x) => Value::Bytes(x.into_owned().into()),
            Value::Int(x) => Value::Int(x),
            Value::UInt(x) => Value::UInt(x),
            Value::Float(x) => Value::Float(x),
            Value::Double(x) => Value::Double(x),
            Value::Date(y, mo, d, h, mi, s, us) => Value::Date(y, mo, d, h, mi, s, us),
            Value::Time(neg, d, h, mi, s, us) => Value::Time(neg, d, h, mi, s, us),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::NULL)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<Cow<'_, str>> {
        self.as_bytes().map(String::from_utf8_lossy)
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(x) => Some(x),
            Value::UInt(x) => i64::try_from(x).ok(),
            _ => None,
        }
    }

    /// Parameter type pair for COM_STMT_EXECUTE: `(protocol type, sign flag)`.
    pub fn bin_type(&self) -> (ColumnType, u8) {
        match self {
            Value::NULL => (ColumnType::MYSQL_TYPE_NULL, 0x00),
            Value::Bytes(_) => (ColumnType::MYSQL_TYPE_VAR_STRING, 0x00),
            Value::Int(_) => (ColumnType::MYSQL_TYPE_LONGLONG, 0x00),
            Value::UInt(_) => (ColumnType::MYSQL_TYPE_LONGLONG, 0x80),
            Value::Float(_) => (ColumnType::MYSQL_TYPE_FLOAT, 0x00),
            Value::Double(_) => (ColumnType::MYSQL_TYPE_DOUBLE, 0x00),
            Value::Date(..) => (ColumnType::MYSQL_TYPE_DATETIME, 0x00),
            Value::Time(..) => (ColumnType::MYSQL_TYPE_TIME, 0x00),
        }
    }

    /// Writes the value in binary (prepared statement) encoding.
    ///
    /// NULL values write nothing; the null bitmap already covers them.
    pub fn write_bin_value(&self, out: &mut Vec<u8>) {
        match *self {
            Value::NULL => (),
            Value::Bytes(ref x) => out.write_lenenc_str(x),
            Value::Int(x) => out.write_u64_le(x as u64),
            Value::UInt(x) => out.write_u64_le(x),
            Value::Float(x) => out.write_f32_le(x),
            Value::Double(x) => out.write_f64_le(x),
            Value::Date(0, 0, 0, 0, 0, 0, 0) => out.write_u8(0),
            Value::Date(y, mo, d, 0, 0, 0, 0) => {
                out.write_u8(4);
                out.write_u16_le(y);
                out.write_u8(mo);
                out.write_u8(d);
            }
            Value::Date(y, mo, d, h, mi, s, 0) => {
                out.write_u8(7);
                out.write_u16_le(y);
                out.write_u8(mo);
                out.write_u8(d);
                out.write_u8(h);
                out.write_u8(mi);
                out.write_u8(s);
            }
            Value::Date(y, mo, d, h, mi, s, us) => {
                out.write_u8(11);
                out.write_u16_le(y);
                out.write_u8(mo);
                out.write_u8(d);
                out.write_u8(h);
                out.write_u8(mi);
                out.write_u8(s);
                out.write_u32_le(us);
            }
            Value::Time(false, 0, 0, 0, 0, 0) => out.write_u8(0),
            Value::Time(neg, d, h, mi, s, 0) => {
                out.write_u8(8);
                out.write_u8(neg as u8);
                out.write_u32_le(d);
                out.write_u8(h);
                out.write_u8(mi);
                out.write_u8(s);
            }
            Value::Time(neg, d, h, mi, s, us) => {
                out.write_u8(12);
                out.write_u8(neg as u8);
                out.write_u32_le(d);
                out.write_u8(h);
                out.write_u8(mi);
                out.write_u8(s);
                out.write_u32_le(us);
            }
        }
    }
}

impl From<i64> for Value<'static> {
    fn from(x: i64) -> Self {
        Value::Int(x)
    }
}

impl From<i32> for Value<'static> {
    fn from(x: i32) -> Self {
        Value::Int(i64::from(x))
    }
}

impl From<u64> for Value<'static> {
    fn from(x: u64) -> Self {
        Value::UInt(x)
    }
}

impl From<u32> for Value<'static> {
    fn from(x: u32) -> Self {
        Value::Int(i64::from(x))
    }
}

impl From<f32> for Value<'static> {
    fn from(x: f32) -> Self {
        Value::Float(x)
    }
}

impl From<f64> for Value<'static> {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(x: &'a str) -> Self {
        Value::Bytes(x.as_bytes().into())
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(x: &'a [u8]) -> Self {
        Value::Bytes(x.into())
    }
}

impl From<String> for Value<'static> {
    fn from(x: String) -> Self {
        Value::Bytes(x.into_bytes().into())
    }
}

impl From<Vec<u8>> for Value<'static> {
    fn from(x: Vec<u8>) -> Self {
        Value::Bytes(x.into())
    }
}

impl<'a, T: Into<Value<'a>>> From<Option<T>> for Value<'a> {
    fn from(x: Option<T>) -> Self {
        match x {
            Some(x) => x.into(),
            None => Value::NULL,
        }
    }
}

fn check_date(month: u8, day: u8) -> Result<()> {
    if month > 12 || day > 31 {
        return Err(DriverError::ProtocolValue("date component out of range").into());
    }
    Ok(())
}

fn check_time_of_day(hours: u8, minutes: u8, seconds: u8, micros: u32) -> Result<()> {
    if hours >= 24 || minutes >= 60 || seconds >= 60 || micros >= 1_000_000 {
        return Err(DriverError::ProtocolValue("time component out of range").into());
    }
    Ok(())
}

fn check_duration(days: u32, hours: u8, minutes: u8, seconds: u8, micros: u32) -> Result<()> {
    if days >= MAX_TIME_DAYS {
        return Err(DriverError::ProtocolValue("time interval days out of range").into());
    }
    check_time_of_day(hours, minutes, seconds, micros)
}

/// Reads one binary-encoded value of the given column type.
pub fn read_bin_value<'a>(
    buf: &mut ParseBuf<'a>,
    column_type: ColumnType,
    unsigned: bool,
) -> Result<Value<'a>> {
    match column_type {
        ColumnType::MYSQL_TYPE_DECIMAL
        | ColumnType::MYSQL_TYPE_NEWDECIMAL
        | ColumnType::MYSQL_TYPE_STRING
        | ColumnType::MYSQL_TYPE_VARCHAR
        | ColumnType::MYSQL_TYPE_VAR_STRING
        | ColumnType::MYSQL_TYPE_ENUM
        | ColumnType::MYSQL_TYPE_SET
        | ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_BLOB
        | ColumnType::MYSQL_TYPE_BIT
        | ColumnType::MYSQL_TYPE_JSON
        | ColumnType::MYSQL_TYPE_GEOMETRY => Ok(Value::Bytes(buf.read_lenenc_str()?.into())),
        ColumnType::MYSQL_TYPE_TINY => {
            if unsigned {
                Ok(Value::Int(i64::from(buf.read_u8()?)))
            } else {
                Ok(Value::Int(i64::from(buf.read_i8()?)))
            }
        }
        ColumnType::MYSQL_TYPE_SHORT => {
            if unsigned {
                Ok(Value::Int(i64::from(buf.read_u16_le()?)))
            } else {
                Ok(Value::Int(i64::from(buf.read_i16_le()?)))
            }
        }
        ColumnType::MYSQL_TYPE_YEAR => Ok(Value::Int(i64::from(buf.read_u16_le()?))),
        ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24 => {
            if unsigned {
                Ok(Value::Int(i64::from(buf.read_u32_le()?)))
            } else {
                Ok(Value::Int(i64::from(buf.read_i32_le()?)))
            }
        }
        ColumnType::MYSQL_TYPE_LONGLONG => {
            if unsigned {
                Ok(Value::UInt(buf.read_u64_le()?))
            } else {
                Ok(Value::Int(buf.read_i64_le()?))
            }
        }
        ColumnType::MYSQL_TYPE_FLOAT => Ok(Value::Float(buf.read_f32_le()?)),
        ColumnType::MYSQL_TYPE_DOUBLE => Ok(Value::Double(buf.read_f64_le()?)),
        ColumnType::MYSQL_TYPE_DATE => match buf.read_u8()? {
            0 => Ok(Value::Date(0, 0, 0, 0, 0, 0, 0)),
            4 => {
                let year = buf.read_u16_le()?;
                let month = buf.read_u8()?;
                let day = buf.read_u8()?;
                check_date(month, day)?;
                Ok(Value::Date(year, month, day, 0, 0, 0, 0))
            }
            _ => Err(DriverError::ProtocolValue("binary date length").into()),
        },
        ColumnType::MYSQL_TYPE_TIMESTAMP | ColumnType::MYSQL_TYPE_DATETIME => {
            let len = buf.read_u8()?;
            let mut year = 0;
            let mut month = 0;
            let mut day = 0;
            let mut hour = 0;
            let mut minute = 0;
            let mut second = 0;
            let mut micros = 0;
            if !matches!(len, 0 | 4 | 7 | 11) {
                return Err(DriverError::ProtocolValue("binary datetime length").into());
            }
            if len >= 4 {
                year = buf.read_u16_le()?;
                month = buf.read_u8()?;
                day = buf.read_u8()?;
            }
            if len >= 7 {
                hour = buf.read_u8()?;
                minute = buf.read_u8()?;
                second = buf.read_u8()?;
            }
            if len == 11 {
                micros = buf.read_u32_le()?;
            }
            check_date(month, day)?;
            check_time_of_day(hour, minute, second, micros)?;
            Ok(Value::Date(year, month, day, hour, minute, second, micros))
        }
        ColumnType::MYSQL_TYPE_TIME => {
            let len = buf.read_u8()?;
            let mut is_negative = false;
            let mut days = 0;
            let mut hours = 0;
            let mut minutes = 0;
            let mut seconds = 0;
            let mut micros = 0;
            if !matches!(len, 0 | 8 | 12) {
                return Err(DriverError::ProtocolValue("binary time length").into());
            }
            if len >= 8 {
                is_negative = buf.read_u8()? == 1;
                days = buf.read_u32_le()?;
                hours = buf.read_u8()?;
                minutes = buf.read_u8()?;
                seconds = buf.read_u8()?;
            }
            if len == 12 {
                micros = buf.read_u32_le()?;
            }
            check_duration(days, hours, minutes, seconds, micros)?;
            Ok(Value::Time(is_negative, days, hours, minutes, seconds, micros))
        }
        ColumnType::MYSQL_TYPE_NULL => Ok(Value::NULL),
    }
}

/// Reads one text-encoded value, parsing it per the column type.
pub fn read_text_value<'a>(buf: &mut ParseBuf<'a>, column: &Column) -> Result<Value<'a>> {
    if buf.peek() == Some(0xfb) {
        buf.skip(1)?;
        return Ok(Value::NULL);
    }
    let raw = buf.read_lenenc_str()?;
    match column.column_type() {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONGLONG => {
            if column.is_unsigned() {
                Ok(Value::UInt(parse_num::<u64>(raw)?))
            } else {
                Ok(Value::Int(parse_num::<i64>(raw)?))
            }
        }
        ColumnType::MYSQL_TYPE_YEAR => Ok(Value::Int(i64::from(parse_num::<u16>(raw)?))),
        ColumnType::MYSQL_TYPE_FLOAT => Ok(Value::Float(parse_num::<f32>(raw)?)),
        ColumnType::MYSQL_TYPE_DOUBLE => Ok(Value::Double(parse_num::<f64>(raw)?)),
        ColumnType::MYSQL_TYPE_DATE => parse_text_date(raw),
        ColumnType::MYSQL_TYPE_TIMESTAMP | ColumnType::MYSQL_TYPE_DATETIME => {
            parse_text_datetime(raw)
        }
        ColumnType::MYSQL_TYPE_TIME => parse_text_time(raw),
        ColumnType::MYSQL_TYPE_NULL => Ok(Value::NULL),
        _ => Ok(Value::Bytes(raw.into())),
    }
}

fn parse_num<T: std::str::FromStr>(raw: &[u8]) -> Result<T> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| DriverError::ProtocolValue("malformed numeric text value").into())
}

fn parse_text_date(raw: &[u8]) -> Result<Value<'static>> {
    let (year, month, day) = parse_date_part(raw)?;
    Ok(Value::Date(year, month, day, 0, 0, 0, 0))
}

fn parse_date_part(raw: &[u8]) -> Result<(u16, u8, u8)> {
    let mut parts = raw.splitn(3, |&b| b == b'-');
    let year = parse_num::<u16>(parts.next().unwrap_or(&[]))?;
    let month = parse_num::<u8>(parts.next().unwrap_or(&[]))?;
    let day = parse_num::<u8>(parts.next().unwrap_or(&[]))?;
    check_date(month, day)?;
    Ok((year, month, day))
}

fn parse_text_datetime(raw: &[u8]) -> Result<Value<'static>> {
    let mut parts = raw.splitn(2, |&b| b == b' ');
    let (year, month, day) = parse_date_part(parts.next().unwrap_or(&[]))?;
    let (hours, minutes, seconds, micros) = match parts.next() {
        Some(time) => parse_clock_part(time)?,
        None => (0, 0, 0, 0),
    };
    let hours = u8::try_from(hours)
        .map_err(|_| DriverError::ProtocolValue("time component out of range"))?;
    check_time_of_day(hours, minutes, seconds, micros)?;
    Ok(Value::Date(year, month, day, hours, minutes, seconds, micros))
}

fn parse_text_time(raw: &[u8]) -> Result<Value<'static>> {
    let (is_negative, raw) = match raw.first() {
        Some(b'-') => (true, &raw[1..]),
        _ => (false, raw),
    };
    let (hours, minutes, seconds, micros) = parse_clock_part(raw)?;
    // text durations carry hours beyond a day
    let days = hours / 24;
    let hours = (hours % 24) as u8;
    check_duration(days, hours, minutes, seconds, micros)?;
    Ok(Value::Time(is_negative, days, hours, minutes, seconds, micros))
}

fn parse_clock_part(raw: &[u8]) -> Result<(u32, u8, u8, u32)> {
    let (clock, frac) = match raw.iter().position(|&b| b == b'.') {
        Some(pos) => (&raw[..pos], Some(&raw[pos + 1..])),
        None => (raw, None),
    };
    let mut parts = clock.splitn(3, |&b| b == b':');
    let hours = parse_num::<u32>(parts.next().unwrap_or(&[]))?;
    let minutes = parse_num::<u8>(parts.next().unwrap_or(&[]))?;
    let seconds = parse_num::<u8>(parts.next().unwrap_or(&[]))?;
    let micros = match frac {
        Some(frac) => parse_micros(frac)?,
        None => 0,
    };
    Ok((hours, minutes, seconds, micros))
}

fn parse_micros(frac: &[u8]) -> Result<u32> {
    if frac.is_empty() || frac.len() > 6 {
        return Err(DriverError::ProtocolValue("fractional seconds").into());
    }
    let mut micros = parse_num::<u32>(frac)?;
    for _ in frac.len()..6 {
        micros *= 10;
    }
    Ok(micros)
}

/// Single row of a resultset.
///
/// Values borrow the packet they were decoded from and stay valid until the
/// next row is read.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<'a> {
    values: Vec<Value<'a>>,
    columns: Arc<[Column]>,
}

impl<'a> Row<'a> {
    /// Decodes a binary-protocol row.
    pub fn read_bin(payload: &'a [u8], columns: Arc<[Column]>) -> Result<Row<'a>> {
        let mut buf = ParseBuf(payload);
        if buf.read_u8()? != 0x00 {
            return Err(DriverError::UnexpectedPacket.into());
        }
        let bitmap_len = NullBitmap::<ServerSide>::bitmap_len(columns.len());
        let bitmap = NullBitmap::<ServerSide, &[u8]>::from_bytes(buf.read_bytes(bitmap_len)?);
        let mut values = Vec::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if bitmap.is_null(i) {
                values.push(Value::NULL);
            } else {
                values.push(read_bin_value(
                    &mut buf,
                    column.column_type(),
                    column.is_unsigned(),
                )?);
            }
        }
        buf.expect_empty()?;
        Ok(Row { values, columns })
    }

    /// Decodes a text-protocol row.
    pub fn read_text(payload: &'a [u8], columns: Arc<[Column]>) -> Result<Row<'a>> {
        let mut buf = ParseBuf(payload);
        let mut values = Vec::with_capacity(columns.len());
        for column in columns.iter() {
            values.push(read_text_value(&mut buf, column)?);
        }
        buf.expect_empty()?;
        Ok(Row { values, columns })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> Arc<[Column]> {
        self.columns.clone()
    }

    pub fn columns_ref(&self) -> &[Column] {
        &self.columns
    }

    pub fn get(&self, index: usize) -> Option<&Value<'a>> {
        self.values.get(index)
    }

    /// Takes the values out of the row.
    pub fn unwrap(self) -> Vec<Value<'a>> {
        self.values
    }

    pub fn into_owned(self) -> Row<'static> {
        Row {
            values: self.values.into_iter().map(Value::into_owned).collect(),
            columns: self.columns,
        }
    }
}

impl<'a> Index<usize> for Row<'a> {
    type Output = Value<'a>;

    fn index(&self, index: usize) -> &Value<'a> {
        &self.values[index]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::consts::{ColumnFlags, UTF8_GENERAL_CI};
    use crate::error::{DriverError, Error};

    fn column(column_type: ColumnType, flags: ColumnFlags) -> Column {
        let mut payload = Vec::new();
        payload.write_lenenc_str(b"def");
        for _ in 0..5 {
            payload.write_lenenc_str(b"c");
        }
        payload.write_lenenc_int(12);
        payload.write_u16_le(u16::from(UTF8_GENERAL_CI));
        payload.write_u32_le(0);
        payload.write_u8(column_type as u8);
        payload.write_u16_le(flags.bits());
        payload.write_u8(0);
        payload.write_u16_le(0);
        Column::from_payload(payload).unwrap()
    }

    fn protocol_value_err(result: Result<Value<'_>>) {
        match result.unwrap_err() {
            Error::DriverError(DriverError::ProtocolValue(_)) => (),
            other => panic!("expected a protocol value error, got {}", other),
        }
    }

    #[test]
    fn should_round_trip_binary_values() {
        let cases: &[(Value<'_>, ColumnType, bool)] = &[
            (Value::Int(-1), ColumnType::MYSQL_TYPE_LONGLONG, false),
            (Value::UInt(u64::MAX), ColumnType::MYSQL_TYPE_LONGLONG, true),
            (Value::Float(1.5), ColumnType::MYSQL_TYPE_FLOAT, false),
            (Value::Double(-2.25), ColumnType::MYSQL_TYPE_DOUBLE, false),
            (
                Value::Bytes((&b"hello"[..]).into()),
                ColumnType::MYSQL_TYPE_VAR_STRING,
                false,
            ),
            (
                Value::Date(2023, 11, 5, 0, 0, 0, 0),
                ColumnType::MYSQL_TYPE_DATETIME,
                false,
            ),
            (
                Value::Date(2023, 11, 5, 13, 7, 1, 0),
                ColumnType::MYSQL_TYPE_DATETIME,
                false,
            ),
            (
                Value::Date(2023, 11, 5, 13, 7, 1, 42),
                ColumnType::MYSQL_TYPE_TIMESTAMP,
                false,
            ),
            (
                Value::Date(0, 0, 0, 0, 0, 0, 0),
                ColumnType::MYSQL_TYPE_DATETIME,
                false,
            ),
            (
                Value::Time(true, 34, 23, 59, 59, 0),
                ColumnType::MYSQL_TYPE_TIME,
                false,
            ),
            (
                Value::Time(false, 0, 10, 0, 0, 999_999),
                ColumnType::MYSQL_TYPE_TIME,
                false,
            ),
            (
                Value::Time(false, 0, 0, 0, 0, 0),
                ColumnType::MYSQL_TYPE_TIME,
                false,
            ),
        ];

        for (value, column_type, unsigned) in cases {
            let mut out = Vec::new();
            value.write_bin_value(&mut out);
            let mut buf = ParseBuf(&out);
            let read = read_bin_value(&mut buf, *column_type, *unsigned).unwrap();
            assert_eq!(&read, value);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn should_read_binary_date_markers() {
        // zero-date
        let mut buf = ParseBuf(&[0x00]);
        assert_eq!(
            read_bin_value(&mut buf, ColumnType::MYSQL_TYPE_DATE, false).unwrap(),
            Value::Date(0, 0, 0, 0, 0, 0, 0)
        );

        // a plain DATE never carries a time part
        let mut buf = ParseBuf(&[7, 0xe7, 0x07, 1, 1, 1, 1, 1]);
        protocol_value_err(read_bin_value(&mut buf, ColumnType::MYSQL_TYPE_DATE, false));

        let mut buf = ParseBuf(&[5, 0, 0, 0, 0, 0]);
        protocol_value_err(read_bin_value(
            &mut buf,
            ColumnType::MYSQL_TYPE_DATETIME,
            false,
        ));
    }

    #[test]
    fn should_enforce_time_interval_range() {
        // 35 days is out of range
        let mut out = Vec::new();
        Value::Time(false, 35, 0, 0, 0, 0).write_bin_value(&mut out);
        let mut buf = ParseBuf(&out);
        protocol_value_err(read_bin_value(&mut buf, ColumnType::MYSQL_TYPE_TIME, false));

        let mut buf = ParseBuf(&[8, 0, 0, 0, 0, 0, 25, 0, 0]);
        protocol_value_err(read_bin_value(&mut buf, ColumnType::MYSQL_TYPE_TIME, false));

        let mut buf = ParseBuf(&[9, 0, 0, 0, 0, 0, 1, 0, 0, 0]);
        protocol_value_err(read_bin_value(&mut buf, ColumnType::MYSQL_TYPE_TIME, false));
    }

    #[test]
    fn should_parse_text_values() {
        fn read(raw: &[u8], column_type: ColumnType, flags: ColumnFlags) -> Result<Value<'_>> {
            let column = column(column_type, flags);
            let mut payload = Vec::new();
            payload.write_lenenc_str(raw);
            let mut buf = ParseBuf(&payload);
            read_text_value(&mut buf, &column).map(|v| v.into_owned())
        }

        assert_eq!(
            read(b"42", ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty()).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            read(b"-42", ColumnType::MYSQL_TYPE_LONG, ColumnFlags::empty()).unwrap(),
            Value::Int(-42)
        );
        assert_eq!(
            read(
                b"18446744073709551615",
                ColumnType::MYSQL_TYPE_LONGLONG,
                ColumnFlags::UNSIGNED_FLAG
            )
            .unwrap(),
            Value::UInt(u64::MAX)
        );
        assert_eq!(
            read(b"3.5", ColumnType::MYSQL_TYPE_DOUBLE, ColumnFlags::empty()).unwrap(),
            Value::Double(3.5)
        );
        assert_eq!(
            read(b"2023-11-05", ColumnType::MYSQL_TYPE_DATE, ColumnFlags::empty()).unwrap(),
            Value::Date(2023, 11, 5, 0, 0, 0, 0)
        );
        assert_eq!(
            read(
                b"2023-11-05 13:07:01.5",
                ColumnType::MYSQL_TYPE_DATETIME,
                ColumnFlags::empty()
            )
            .unwrap(),
            Value::Date(2023, 11, 5, 13, 7, 1, 500_000)
        );
        assert_eq!(
            read(b"-838:59:59", ColumnType::MYSQL_TYPE_TIME, ColumnFlags::empty()).unwrap(),
            Value::Time(true, 34, 22, 59, 59, 0)
        );
        assert_eq!(
            read(
                b"123.45",
                ColumnType::MYSQL_TYPE_NEWDECIMAL,
                ColumnFlags::empty()
            )
            .unwrap(),
            Value::Bytes((&b"123.45"[..]).into())
        );
        protocol_value_err(read(
            b"840:00:00",
            ColumnType::MYSQL_TYPE_TIME,
            ColumnFlags::empty(),
        ));
        protocol_value_err(read(
            b"not a number",
            ColumnType::MYSQL_TYPE_LONG,
            ColumnFlags::empty(),
        ));
    }

    #[test]
    fn should_read_text_row() {
        let columns: Arc<[Column]> = vec![
            column(ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty()),
            column(ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty()),
            column(ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty()),
        ]
        .into();

        let mut payload = Vec::new();
        payload.write_lenenc_str(b"hello");
        payload.write_lenenc_str(b"42");
        payload.write_u8(0xfb);

        let row = Row::read_text(&payload, columns).unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(row[0], Value::Bytes((&b"hello"[..]).into()));
        assert_eq!(row[1], Value::Int(42));
        assert_eq!(row[2], Value::NULL);
    }

    #[test]
    fn should_read_binary_row() {
        let columns: Arc<[Column]> = vec![
            column(ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty()),
            column(ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty()),
            column(ColumnType::MYSQL_TYPE_DOUBLE, ColumnFlags::empty()),
        ]
        .into();

        let mut payload = Vec::new();
        payload.write_u8(0x00);
        // bit 2 + 2 = column 2 is null
        payload.write_u8(0b0001_0000);
        payload.write_u64_le(7);
        payload.write_lenenc_str(b"f0");

        let row = Row::read_bin(&payload, columns.clone()).unwrap();
        assert_eq!(row[0], Value::Int(7));
        assert_eq!(row[1], Value::Bytes((&b"f0"[..]).into()));
        assert_eq!(row[2], Value::NULL);

        // trailing garbage is an error
        let mut bad = payload.clone();
        bad.push(0xde);
        match Row::read_bin(&bad, columns).unwrap_err() {
            Error::DriverError(DriverError::ExtraBytes) => (),
            other => panic!("expected extra bytes error, got {}", other),
        }
    }
}
