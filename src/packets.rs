// Copyright (c) 2023 mysql-aio contributors
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Typed wire messages and the primitives to read and write them.
//!
//! Everything here is pure: byte slices in, typed messages out (and back).
//! Framing and sequence numbers live in [`crate::io`].

use std::borrow::Cow;
use std::cmp::max;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian as LE};
use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::consts::{
    CapabilityFlags, ColumnFlags, ColumnType, Command, DbFlavor, StatusFlags,
    BINARY_COLLATION_ID, DEFAULT_MAX_ALLOWED_PACKET,
};
use crate::error::{DriverError, MySqlError, Result};
use crate::scramble::AuthPlugin;
use crate::value::Value;

lazy_static! {
    static ref VERSION_RE: Regex = Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{1,3})(.*)").unwrap();
    static ref MARIADB_VERSION_RE: Regex =
        Regex::new(r"^5.5.5-(\d{1,2})\.(\d{1,2})\.(\d{1,3})-MariaDB").unwrap();
}

/// Cursor over a packet body.
///
/// Every read checks the remaining length; running out of bytes is
/// `DriverError::IncompleteMessage`.
#[derive(Debug, Clone)]
pub struct ParseBuf<'a>(pub &'a [u8]);

impl<'a> ParseBuf<'a> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn peek(&self) -> Option<u8> {
        self.0.first().copied()
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(drop)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.0.len() < n {
            return Err(DriverError::IncompleteMessage.into());
        }
        let (out, rest) = self.0.split_at(n);
        self.0 = rest;
        Ok(out)
    }

    pub fn read_rest(&mut self) -> &'a [u8] {
        let out = self.0;
        self.0 = &[];
        out
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(LE::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u24_le(&mut self) -> Result<u32> {
        Ok(LE::read_u24(self.read_bytes(3)?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(LE::read_u32(self.read_bytes(4)?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(LE::read_u64(self.read_bytes(8)?))
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        Ok(self.read_u16_le()? as i16)
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(self.read_u32_le()? as i32)
    }

    pub fn read_i64_le(&mut self) -> Result<i64> {
        Ok(self.read_u64_le()? as i64)
    }

    pub fn read_f32_le(&mut self) -> Result<f32> {
        Ok(LE::read_f32(self.read_bytes(4)?))
    }

    pub fn read_f64_le(&mut self) -> Result<f64> {
        Ok(LE::read_f64(self.read_bytes(8)?))
    }

    /// Length-encoded integer. The reserved first bytes `0xfb` and `0xff`
    /// must not appear in integer position.
    pub fn read_lenenc_int(&mut self) -> Result<u64> {
        match self.read_u8()? {
            x @ 0..=0xfa => Ok(u64::from(x)),
            0xfc => Ok(u64::from(self.read_u16_le()?)),
            0xfd => Ok(u64::from(self.read_u24_le()?)),
            0xfe => self.read_u64_le(),
            0xfb => Err(DriverError::ProtocolValue("reserved lenenc byte 0xfb").into()),
            0xff => Err(DriverError::ProtocolValue("reserved lenenc byte 0xff").into()),
        }
    }

    pub fn read_lenenc_str(&mut self) -> Result<&'a [u8]> {
        let len = self.read_lenenc_int()?;
        self.read_bytes(len as usize)
    }

    /// Bytes up to (and consuming) the first NUL.
    pub fn read_null_terminated(&mut self) -> Result<&'a [u8]> {
        match self.0.iter().position(|&b| b == 0x00) {
            Some(pos) => {
                let out = &self.0[..pos];
                self.0 = &self.0[pos + 1..];
                Ok(out)
            }
            None => Err(DriverError::IncompleteMessage.into()),
        }
    }

    pub fn expect_empty(&self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(DriverError::ExtraBytes.into())
        }
    }
}

/// Write-side counterparts of [`ParseBuf`]. Writes to a `Vec` never fail.
pub(crate) trait WriteMysqlExt {
    fn write_u8(&mut self, x: u8);
    fn write_u16_le(&mut self, x: u16);
    fn write_u24_le(&mut self, x: u32);
    fn write_u32_le(&mut self, x: u32);
    fn write_u64_le(&mut self, x: u64);
    fn write_f32_le(&mut self, x: f32);
    fn write_f64_le(&mut self, x: f64);

    /// Shortest of the {1, 3, 4, 9}-byte forms.
    fn write_lenenc_int(&mut self, x: u64);
    fn write_lenenc_str(&mut self, bytes: &[u8]);
}

impl WriteMysqlExt for Vec<u8> {
    fn write_u8(&mut self, x: u8) {
        self.push(x);
    }

    fn write_u16_le(&mut self, x: u16) {
        self.extend_from_slice(&x.to_le_bytes());
    }

    fn write_u24_le(&mut self, x: u32) {
        self.extend_from_slice(&x.to_le_bytes()[..3]);
    }

    fn write_u32_le(&mut self, x: u32) {
        self.extend_from_slice(&x.to_le_bytes());
    }

    fn write_u64_le(&mut self, x: u64) {
        self.extend_from_slice(&x.to_le_bytes());
    }

    fn write_f32_le(&mut self, x: f32) {
        self.extend_from_slice(&x.to_le_bytes());
    }

    fn write_f64_le(&mut self, x: f64) {
        self.extend_from_slice(&x.to_le_bytes());
    }

    fn write_lenenc_int(&mut self, x: u64) {
        if x < 251 {
            self.push(x as u8);
        } else if x < 65_536 {
            self.push(0xfc);
            self.write_u16_le(x as u16);
        } else if x < 16_777_216 {
            self.push(0xfd);
            self.write_u24_le(x as u32);
        } else {
            self.push(0xfe);
            self.write_u64_le(x);
        }
    }

    fn write_lenenc_str(&mut self, bytes: &[u8]) {
        self.write_lenenc_int(bytes.len() as u64);
        self.extend_from_slice(bytes);
    }
}

/// OK packet position (see the _OK packet identifier_ section of WL#7766).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum OkPacketKind {
    /// Terminates a result set (text or binary).
    ResultSetTerminator,
    /// Any other position.
    Other,
}

/// MySql's Ok packet, also covering the EOF replacement under
/// `CLIENT_DEPRECATE_EOF`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OkPacket<'a> {
    affected_rows: u64,
    last_insert_id: u64,
    status_flags: StatusFlags,
    warnings: u16,
    info: Cow<'a, [u8]>,
}

impl<'a> OkPacket<'a> {
    pub fn new(
        affected_rows: u64,
        last_insert_id: u64,
        status_flags: StatusFlags,
        warnings: u16,
        info: impl Into<Cow<'a, [u8]>>,
    ) -> OkPacket<'a> {
        OkPacket {
            affected_rows,
            last_insert_id,
            status_flags,
            warnings,
            info: info.into(),
        }
    }

    /// Parses an Ok packet from `payload` assuming the passed client-server
    /// `capabilities`.
    pub fn parse(
        payload: &'a [u8],
        capabilities: CapabilityFlags,
        kind: OkPacketKind,
    ) -> Result<OkPacket<'a>> {
        let mut buf = ParseBuf(payload);
        let header = buf.read_u8()?;

        let is_ok_layout = header == 0x00 && kind == OkPacketKind::Other
            || header == 0xfe
                && kind == OkPacketKind::ResultSetTerminator
                && payload.len() < 9
                && capabilities.contains(CapabilityFlags::CLIENT_DEPRECATE_EOF);

        if is_ok_layout {
            let affected_rows = buf.read_lenenc_int()?;
            let last_insert_id = buf.read_lenenc_int()?;
            let status_flags = StatusFlags::from_bits_truncate(buf.read_u16_le()?);
            let warnings = buf.read_u16_le()?;
            let info = if capabilities.contains(CapabilityFlags::CLIENT_SESSION_TRACK) {
                // info is length-encoded here; it may be absent at packet end
                let info = if buf.is_empty() {
                    &[][..]
                } else {
                    buf.read_lenenc_str()?
                };
                // the session-state trailer is read and ignored
                if status_flags.contains(StatusFlags::SERVER_SESSION_STATE_CHANGED)
                    && !buf.is_empty()
                {
                    buf.read_lenenc_str()?;
                }
                info
            } else {
                buf.read_rest()
            };
            Ok(OkPacket {
                affected_rows,
                last_insert_id,
                status_flags,
                warnings,
                info: info.into(),
            })
        } else if header == 0xfe && kind == OkPacketKind::ResultSetTerminator && payload.len() < 9
        {
            // legacy EOF layout
            let warnings = buf.read_u16_le()?;
            let status_flags = StatusFlags::from_bits_truncate(buf.read_u16_le()?);
            Ok(OkPacket {
                affected_rows: 0,
                last_insert_id: 0,
                status_flags,
                warnings,
                info: (&[][..]).into(),
            })
        } else {
            Err(DriverError::UnexpectedPacket.into())
        }
    }

    pub fn serialize(&self, capabilities: CapabilityFlags) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.info.len());
        out.write_u8(0x00);
        out.write_lenenc_int(self.affected_rows);
        out.write_lenenc_int(self.last_insert_id);
        out.write_u16_le(self.status_flags.bits());
        out.write_u16_le(self.warnings);
        if capabilities.contains(CapabilityFlags::CLIENT_SESSION_TRACK) {
            out.write_lenenc_str(&self.info);
        } else {
            out.extend_from_slice(&self.info);
        }
        out
    }

    pub fn into_owned(self) -> OkPacket<'static> {
        OkPacket {
            affected_rows: self.affected_rows,
            last_insert_id: self.last_insert_id,
            status_flags: self.status_flags,
            warnings: self.warnings,
            info: self.info.into_owned().into(),
        }
    }

    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    pub fn status_flags(&self) -> StatusFlags {
        self.status_flags
    }

    pub fn warnings(&self) -> u16 {
        self.warnings
    }

    pub fn info_ref(&self) -> &[u8] {
        &self.info
    }

    pub fn info_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.info)
    }

    pub fn more_results_exists(&self) -> bool {
        self.status_flags
            .contains(StatusFlags::SERVER_MORE_RESULTS_EXISTS)
    }
}

/// MySql's error packet.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ErrPacket<'a> {
    code: u16,
    state: [u8; 5],
    message: Cow<'a, [u8]>,
}

impl<'a> ErrPacket<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<ErrPacket<'a>> {
        let mut buf = ParseBuf(payload);
        if buf.read_u8()? != 0xff {
            return Err(DriverError::UnexpectedPacket.into());
        }
        let code = buf.read_u16_le()?;
        match buf.peek() {
            Some(b'#') => {
                buf.skip(1)?;
                let state_bytes = buf.read_bytes(5)?;
                let mut state = [0u8; 5];
                state.copy_from_slice(state_bytes);
                Ok(ErrPacket {
                    code,
                    state,
                    message: buf.read_rest().into(),
                })
            }
            _ => Ok(ErrPacket {
                code,
                state: *b"HY000",
                message: buf.read_rest().into(),
            }),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9 + self.message.len());
        out.write_u8(0xff);
        out.write_u16_le(self.code);
        out.write_u8(b'#');
        out.extend_from_slice(&self.state);
        out.extend_from_slice(&self.message);
        out
    }

    pub fn error_code(&self) -> u16 {
        self.code
    }

    pub fn sql_state_ref(&self) -> &[u8; 5] {
        &self.state
    }

    pub fn sql_state_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.state[..])
    }

    pub fn message_ref(&self) -> &[u8] {
        &self.message
    }

    pub fn message_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.message)
    }
}

impl fmt::Display for ErrPacket<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ERROR {} ({}): {}",
            self.error_code(),
            self.sql_state_str(),
            self.message_str()
        )
    }
}

impl From<ErrPacket<'_>> for MySqlError {
    fn from(x: ErrPacket<'_>) -> MySqlError {
        MySqlError {
            code: x.error_code(),
            state: x.sql_state_str().into_owned(),
            message: x.message_str().into_owned(),
        }
    }
}

/// MySql's initial handshake packet (protocol version 10).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HandshakePacket<'a> {
    protocol_version: u8,
    server_version: Cow<'a, [u8]>,
    connection_id: u32,
    scramble_1: Cow<'a, [u8]>,
    scramble_2: Option<Cow<'a, [u8]>>,
    capabilities: CapabilityFlags,
    default_collation: u8,
    status_flags: StatusFlags,
    auth_plugin: Option<AuthPlugin<'a>>,
}

impl<'a> HandshakePacket<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<HandshakePacket<'a>> {
        let mut buf = ParseBuf(payload);
        let protocol_version = buf.read_u8()?;
        let server_version = buf.read_null_terminated()?;
        let connection_id = buf.read_u32_le()?;
        let scramble_1 = buf.read_bytes(8)?;
        buf.skip(1)?;
        let capabilities_1 = buf.read_u16_le()?;
        let default_collation = buf.read_u8()?;
        let status_flags = buf.read_u16_le()?;
        let capabilities_2 = buf.read_u16_le()?;
        let capabilities = CapabilityFlags::from_bits_truncate(
            u32::from(capabilities_1) | (u32::from(capabilities_2) << 16),
        );
        let scramble_len = buf.read_u8()?;
        buf.skip(10)?;
        let scramble_2 = if capabilities.contains(CapabilityFlags::CLIENT_SECURE_CONNECTION) {
            let len = max(13, scramble_len as i16 - 8) as usize;
            let mut scramble_2 = buf.read_bytes(len)?;
            if scramble_2.last() == Some(&0x00) {
                scramble_2 = &scramble_2[..scramble_2.len() - 1];
            }
            Some(scramble_2)
        } else {
            None
        };
        let auth_plugin = if capabilities.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
            let name = match buf.0.iter().position(|&b| b == 0x00) {
                Some(pos) => &buf.0[..pos],
                None => buf.0,
            };
            Some(AuthPlugin::from_bytes(name))
        } else {
            None
        };
        Ok(HandshakePacket {
            protocol_version,
            server_version: server_version.into(),
            connection_id,
            scramble_1: scramble_1.into(),
            scramble_2: scramble_2.map(Into::into),
            capabilities,
            default_collation,
            status_flags: StatusFlags::from_bits_truncate(status_flags),
            auth_plugin,
        })
    }

    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    pub fn server_version_ref(&self) -> &[u8] {
        self.server_version.as_ref()
    }

    pub fn server_version_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.server_version_ref())
    }

    /// First `x.y.z` of the server version string, if any.
    pub fn server_version_parsed(&self) -> Option<(u16, u16, u16)> {
        parse_version_triple(&VERSION_RE, self.server_version_ref())
    }

    /// MariaDb version hidden behind the `5.5.5-` prefix, if any.
    pub fn maria_db_server_version_parsed(&self) -> Option<(u16, u16, u16)> {
        parse_version_triple(&MARIADB_VERSION_RE, self.server_version_ref())
    }

    /// Server flavor as advertised by the version string.
    pub fn flavor(&self) -> DbFlavor {
        if self
            .server_version_ref()
            .windows(7)
            .any(|w| w == b"MariaDB")
        {
            DbFlavor::MariaDb
        } else {
            DbFlavor::MySql
        }
    }

    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    pub fn scramble_1_ref(&self) -> &[u8] {
        self.scramble_1.as_ref()
    }

    pub fn scramble_2_ref(&self) -> Option<&[u8]> {
        self.scramble_2.as_deref()
    }

    /// Concatenated auth plugin challenge.
    pub fn nonce(&self) -> Vec<u8> {
        let mut out = Vec::from(self.scramble_1_ref());
        out.extend_from_slice(self.scramble_2_ref().unwrap_or(&[][..]));
        out
    }

    pub fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    pub fn default_collation(&self) -> u8 {
        self.default_collation
    }

    pub fn status_flags(&self) -> StatusFlags {
        self.status_flags
    }

    pub fn auth_plugin(&self) -> Option<&AuthPlugin<'a>> {
        self.auth_plugin.as_ref()
    }
}

fn parse_version_triple(re: &Regex, version: &[u8]) -> Option<(u16, u16, u16)> {
    re.captures(version).and_then(|captures| {
        let group = |i| {
            std::str::from_utf8(captures.get(i)?.as_bytes())
                .ok()?
                .parse::<u16>()
                .ok()
        };
        Some((group(1)?, group(2)?, group(3)?))
    })
}

/// Client's reply to the initial handshake (protocol 4.1 layout).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HandshakeResponse<'a> {
    capabilities: CapabilityFlags,
    max_packet_size: u32,
    collation: u8,
    user: Cow<'a, [u8]>,
    auth_response: Cow<'a, [u8]>,
    db_name: Option<Cow<'a, [u8]>>,
    auth_plugin: Option<AuthPlugin<'a>>,
}

impl<'a> HandshakeResponse<'a> {
    pub fn new(
        capabilities: CapabilityFlags,
        collation: u8,
        user: &'a [u8],
        auth_response: &'a [u8],
        db_name: Option<&'a [u8]>,
        auth_plugin: Option<AuthPlugin<'a>>,
    ) -> HandshakeResponse<'a> {
        HandshakeResponse {
            capabilities,
            max_packet_size: DEFAULT_MAX_ALLOWED_PACKET,
            collation,
            user: user.into(),
            auth_response: auth_response.into(),
            db_name: db_name.map(Into::into),
            auth_plugin,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(128);
        data.write_u32_le(self.capabilities.bits());
        data.write_u32_le(self.max_packet_size);
        data.write_u8(self.collation);
        data.resize(data.len() + 23, 0);
        data.extend_from_slice(&self.user);
        data.write_u8(0);
        if self
            .capabilities
            .contains(CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA)
        {
            data.write_lenenc_str(&self.auth_response);
        } else {
            data.write_u8(self.auth_response.len() as u8);
            data.extend_from_slice(&self.auth_response);
        }
        if self
            .capabilities
            .contains(CapabilityFlags::CLIENT_CONNECT_WITH_DB)
        {
            data.extend_from_slice(self.db_name.as_deref().unwrap_or(&[]));
            data.write_u8(0);
        }
        if self.capabilities.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
            data.extend_from_slice(
                self.auth_plugin
                    .as_ref()
                    .map(AuthPlugin::as_bytes)
                    .unwrap_or(&[]),
            );
            data.write_u8(0);
        }
        data
    }

    pub fn parse(payload: &'a [u8]) -> Result<HandshakeResponse<'a>> {
        let mut buf = ParseBuf(payload);
        let capabilities = CapabilityFlags::from_bits_truncate(buf.read_u32_le()?);
        let max_packet_size = buf.read_u32_le()?;
        let collation = buf.read_u8()?;
        buf.skip(23)?;
        let user = buf.read_null_terminated()?;
        let auth_response = if capabilities
            .contains(CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA)
        {
            buf.read_lenenc_str()?
        } else {
            let len = buf.read_u8()?;
            buf.read_bytes(len as usize)?
        };
        let db_name = if capabilities.contains(CapabilityFlags::CLIENT_CONNECT_WITH_DB) {
            Some(buf.read_null_terminated()?)
        } else {
            None
        };
        let auth_plugin = if capabilities.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
            Some(AuthPlugin::from_bytes(buf.read_null_terminated()?))
        } else {
            None
        };
        buf.expect_empty()?;
        Ok(HandshakeResponse {
            capabilities,
            max_packet_size,
            collation,
            user: user.into(),
            auth_response: auth_response.into(),
            db_name: db_name.map(Into::into),
            auth_plugin,
        })
    }

    pub fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    pub fn max_packet_size(&self) -> u32 {
        self.max_packet_size
    }

    pub fn collation(&self) -> u8 {
        self.collation
    }

    pub fn user_ref(&self) -> &[u8] {
        &self.user
    }

    pub fn auth_response_ref(&self) -> &[u8] {
        &self.auth_response
    }

    pub fn db_name_ref(&self) -> Option<&[u8]> {
        self.db_name.as_deref()
    }

    pub fn auth_plugin(&self) -> Option<&AuthPlugin<'a>> {
        self.auth_plugin.as_ref()
    }
}

/// First 32 bytes of a handshake response, sent on its own to ask the server
/// for a TLS upgrade before credentials travel the wire.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SslRequest {
    data: Vec<u8>,
}

impl SslRequest {
    pub fn new(capabilities: CapabilityFlags, collation: u8) -> SslRequest {
        let mut data = vec![0u8; 32];
        LE::write_u32(&mut data[0..], capabilities.bits());
        LE::write_u32(&mut data[4..], DEFAULT_MAX_ALLOWED_PACKET);
        data[8] = collation;
        SslRequest { data }
    }
}

impl AsRef<[u8]> for SslRequest {
    fn as_ref(&self) -> &[u8] {
        &self.data[..]
    }
}

/// Authentication method switch request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AuthSwitchRequest<'a> {
    auth_plugin: AuthPlugin<'a>,
    plugin_data: Cow<'a, [u8]>,
}

impl<'a> AuthSwitchRequest<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<AuthSwitchRequest<'a>> {
        let mut buf = ParseBuf(payload);
        if buf.read_u8()? != 0xfe {
            return Err(DriverError::UnexpectedPacket.into());
        }
        let name = buf.read_null_terminated()?;
        let mut plugin_data = buf.read_rest();
        if plugin_data.last() == Some(&0x00) {
            plugin_data = &plugin_data[..plugin_data.len() - 1];
        }
        Ok(AuthSwitchRequest {
            auth_plugin: AuthPlugin::from_bytes(name),
            plugin_data: plugin_data.into(),
        })
    }

    pub fn auth_plugin(&self) -> &AuthPlugin<'a> {
        &self.auth_plugin
    }

    pub fn plugin_data(&self) -> &[u8] {
        &self.plugin_data
    }
}

/// Extra auth-data beyond the initial challenge.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AuthMoreData<'a> {
    data: Cow<'a, [u8]>,
}

impl<'a> AuthMoreData<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<AuthMoreData<'a>> {
        let mut buf = ParseBuf(payload);
        match buf.read_u8()? {
            0x01 => Ok(AuthMoreData {
                data: buf.read_rest().into(),
            }),
            _ => Err(DriverError::UnexpectedPacket.into()),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Column definition (ColumnDefinition41).
///
/// Keeps the raw payload and indexes into it, so cloning metadata around is
/// one allocation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Column {
    payload: Vec<u8>,
    schema: Range<usize>,
    table: Range<usize>,
    org_table: Range<usize>,
    name: Range<usize>,
    org_name: Range<usize>,
    column_length: u32,
    character_set: u16,
    flags: ColumnFlags,
    column_type: ColumnType,
    decimals: u8,
}

/// Column kind derived from (protocol type, flags, collation).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ColumnKind {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Year,
    Float,
    Double,
    /// Exact numeric, delivered as a string.
    Decimal,
    Bit,
    Date,
    DateTime,
    Timestamp,
    Time,
    Char,
    Varchar,
    Text,
    Binary,
    Varbinary,
    Blob,
    Enum,
    Set,
    Json,
    Geometry,
    Unknown,
}

impl Column {
    pub fn from_payload(payload: Vec<u8>) -> Result<Column> {
        let schema;
        let table;
        let org_table;
        let name;
        let org_name;
        let character_set;
        let column_length;
        let column_type;
        let flags;
        let decimals;

        {
            let mut buf = ParseBuf(&payload[..]);
            // catalog, always "def"
            buf.read_lenenc_str()?;
            schema = range_of(&payload, buf.read_lenenc_str()?);
            table = range_of(&payload, buf.read_lenenc_str()?);
            org_table = range_of(&payload, buf.read_lenenc_str()?);
            name = range_of(&payload, buf.read_lenenc_str()?);
            org_name = range_of(&payload, buf.read_lenenc_str()?);
            let fixed_len = buf.read_lenenc_int()?;
            if fixed_len < 12 {
                return Err(DriverError::ProtocolValue("column fixed-fields length").into());
            }
            character_set = buf.read_u16_le()?;
            column_length = buf.read_u32_le()?;
            column_type = buf.read_u8()?;
            flags = buf.read_u16_le()?;
            decimals = buf.read_u8()?;
            buf.skip(2)?;
            // fixed fields past the known twelve, and any trailing bytes,
            // are tolerated for forward compatibility
            buf.skip((fixed_len - 12) as usize)?;
        }

        Ok(Column {
            schema,
            table,
            org_table,
            name,
            org_name,
            payload,
            column_length,
            character_set,
            flags: ColumnFlags::from_bits_truncate(flags),
            column_type: ColumnType::try_from(column_type)
                .map_err(|_| DriverError::ProtocolValue("column type"))?,
            decimals,
        })
    }

    /// The raw payload this column was parsed from.
    pub fn serialize(&self) -> Vec<u8> {
        self.payload.clone()
    }

    pub fn column_length(&self) -> u32 {
        self.column_length
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn character_set(&self) -> u16 {
        self.character_set
    }

    pub fn flags(&self) -> ColumnFlags {
        self.flags
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn schema_ref(&self) -> &[u8] {
        &self.payload[self.schema.clone()]
    }

    pub fn schema_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.schema_ref())
    }

    pub fn table_ref(&self) -> &[u8] {
        &self.payload[self.table.clone()]
    }

    pub fn table_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.table_ref())
    }

    pub fn org_table_ref(&self) -> &[u8] {
        &self.payload[self.org_table.clone()]
    }

    pub fn org_table_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.org_table_ref())
    }

    pub fn name_ref(&self) -> &[u8] {
        &self.payload[self.name.clone()]
    }

    pub fn name_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_ref())
    }

    pub fn org_name_ref(&self) -> &[u8] {
        &self.payload[self.org_name.clone()]
    }

    pub fn org_name_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.org_name_ref())
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED_FLAG)
    }

    /// Kind of the column as a user would see it.
    pub fn kind(&self) -> ColumnKind {
        let binary = self.character_set == BINARY_COLLATION_ID;
        match self.column_type {
            ColumnType::MYSQL_TYPE_TINY => ColumnKind::TinyInt,
            ColumnType::MYSQL_TYPE_SHORT => ColumnKind::SmallInt,
            ColumnType::MYSQL_TYPE_INT24 => ColumnKind::MediumInt,
            ColumnType::MYSQL_TYPE_LONG => ColumnKind::Int,
            ColumnType::MYSQL_TYPE_LONGLONG => ColumnKind::BigInt,
            ColumnType::MYSQL_TYPE_YEAR => ColumnKind::Year,
            ColumnType::MYSQL_TYPE_FLOAT => ColumnKind::Float,
            ColumnType::MYSQL_TYPE_DOUBLE => ColumnKind::Double,
            ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                ColumnKind::Decimal
            }
            ColumnType::MYSQL_TYPE_BIT => ColumnKind::Bit,
            ColumnType::MYSQL_TYPE_DATE => ColumnKind::Date,
            ColumnType::MYSQL_TYPE_DATETIME => ColumnKind::DateTime,
            ColumnType::MYSQL_TYPE_TIMESTAMP => ColumnKind::Timestamp,
            ColumnType::MYSQL_TYPE_TIME => ColumnKind::Time,
            ColumnType::MYSQL_TYPE_STRING => {
                if self.flags.contains(ColumnFlags::ENUM_FLAG) {
                    ColumnKind::Enum
                } else if self.flags.contains(ColumnFlags::SET_FLAG) {
                    ColumnKind::Set
                } else if binary {
                    ColumnKind::Binary
                } else {
                    ColumnKind::Char
                }
            }
            ColumnType::MYSQL_TYPE_VARCHAR | ColumnType::MYSQL_TYPE_VAR_STRING => {
                if binary {
                    ColumnKind::Varbinary
                } else {
                    ColumnKind::Varchar
                }
            }
            ColumnType::MYSQL_TYPE_TINY_BLOB
            | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
            | ColumnType::MYSQL_TYPE_LONG_BLOB
            | ColumnType::MYSQL_TYPE_BLOB => {
                if binary {
                    ColumnKind::Blob
                } else {
                    ColumnKind::Text
                }
            }
            ColumnType::MYSQL_TYPE_ENUM => ColumnKind::Enum,
            ColumnType::MYSQL_TYPE_SET => ColumnKind::Set,
            ColumnType::MYSQL_TYPE_JSON => ColumnKind::Json,
            ColumnType::MYSQL_TYPE_GEOMETRY => ColumnKind::Geometry,
            ColumnType::MYSQL_TYPE_NULL => ColumnKind::Unknown,
        }
    }
}

fn range_of(payload: &[u8], slice: &[u8]) -> Range<usize> {
    let start = slice.as_ptr() as usize - payload.as_ptr() as usize;
    start..start + slice.len()
}

/// COM_STMT_PREPARE response header.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct StmtPacket {
    statement_id: u32,
    num_columns: u16,
    num_params: u16,
    warning_count: u16,
}

impl StmtPacket {
    pub fn parse(payload: &[u8]) -> Result<StmtPacket> {
        let mut buf = ParseBuf(payload);
        if buf.read_u8()? != 0x00 {
            return Err(DriverError::UnexpectedPacket.into());
        }
        let statement_id = buf.read_u32_le()?;
        let num_columns = buf.read_u16_le()?;
        let num_params = buf.read_u16_le()?;
        buf.skip(1)?;
        let warning_count = buf.read_u16_le()?;
        // MariaDb may append extended metadata

        Ok(StmtPacket {
            statement_id,
            num_columns,
            num_params,
            warning_count,
        })
    }

    pub fn statement_id(&self) -> u32 {
        self.statement_id
    }

    pub fn num_columns(&self) -> u16 {
        self.num_columns
    }

    pub fn num_params(&self) -> u16 {
        self.num_params
    }

    pub fn warning_count(&self) -> u16 {
        self.warning_count
    }
}

/// Which end of the connection a null-bitmap belongs to.
///
/// Row bitmaps sent by the server start at bit 2; parameter bitmaps sent by
/// the client start at bit 0.
pub trait SerializationSide {
    const BIT_OFFSET: usize;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ClientSide;

impl SerializationSide for ClientSide {
    const BIT_OFFSET: usize = 0;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ServerSide;

impl SerializationSide for ServerSide {
    const BIT_OFFSET: usize = 2;
}

/// Null-bitmap of a binary row or a parameter list.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NullBitmap<T, U: AsRef<[u8]> = Vec<u8>>(U, PhantomData<T>);

impl<T: SerializationSide> NullBitmap<T, Vec<u8>> {
    pub fn new(num_columns: usize) -> Self {
        Self::from_bytes(vec![0; Self::bitmap_len(num_columns)])
    }
}

impl<T: SerializationSide, U: AsRef<[u8]>> NullBitmap<T, U> {
    pub fn bitmap_len(num_columns: usize) -> usize {
        (num_columns + 7 + T::BIT_OFFSET) / 8
    }

    pub fn from_bytes(bytes: U) -> Self {
        Self(bytes, PhantomData)
    }

    fn byte_and_bit(&self, column_index: usize) -> (usize, u8) {
        let offset = column_index + T::BIT_OFFSET;
        (offset / 8, 1 << (offset % 8) as u8)
    }

    pub fn is_null(&self, column_index: usize) -> bool {
        let (byte, bit) = self.byte_and_bit(column_index);
        self.0.as_ref()[byte] & bit > 0
    }
}

impl<T: SerializationSide, U: AsRef<[u8]> + AsMut<[u8]>> NullBitmap<T, U> {
    pub fn set(&mut self, column_index: usize, is_null: bool) {
        let (byte, bit) = self.byte_and_bit(column_index);
        if is_null {
            self.0.as_mut()[byte] |= bit
        } else {
            self.0.as_mut()[byte] &= !bit
        }
    }
}

impl<T, U: AsRef<[u8]>> AsRef<[u8]> for NullBitmap<T, U> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/// Builder for the COM_STMT_EXECUTE body.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ComStmtExecuteRequestBuilder {
    body: Vec<u8>,
}

impl ComStmtExecuteRequestBuilder {
    pub fn new(stmt_id: u32) -> Self {
        let mut body = Vec::with_capacity(64);
        body.write_u8(Command::COM_STMT_EXECUTE as u8);
        body.write_u32_le(stmt_id);
        // no-cursor flags
        body.write_u8(0x00);
        // iteration count, always 1
        body.write_u32_le(1);
        Self { body }
    }

    pub fn build(mut self, params: &[Value<'_>]) -> Vec<u8> {
        if !params.is_empty() {
            let mut bitmap = NullBitmap::<ClientSide>::new(params.len());
            for (i, value) in params.iter().enumerate() {
                bitmap.set(i, matches!(value, Value::NULL));
            }
            self.body.extend_from_slice(bitmap.as_ref());
            // new-params-bound flag
            self.body.write_u8(0x01);
            for value in params {
                let (column_type, sign_flag) = value.bin_type();
                self.body.write_u8(column_type as u8);
                self.body.write_u8(sign_flag);
            }
            for value in params {
                value.write_bin_value(&mut self.body);
            }
        }
        self.body
    }
}

/// Single-frame command with the command byte at offset 0.
pub fn command_body(cmd: Command, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(1 + data.len());
    body.write_u8(cmd as u8);
    body.extend_from_slice(data);
    body
}

pub fn com_stmt_close(stmt_id: u32) -> Vec<u8> {
    let mut body = Vec::with_capacity(5);
    body.write_u8(Command::COM_STMT_CLOSE as u8);
    body.write_u32_le(stmt_id);
    body
}

pub fn com_stmt_reset(stmt_id: u32) -> Vec<u8> {
    let mut body = Vec::with_capacity(5);
    body.write_u8(Command::COM_STMT_RESET as u8);
    body.write_u32_le(stmt_id);
    body
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::consts::{CapabilityFlags, ColumnFlags, ColumnType, StatusFlags, UTF8_GENERAL_CI};
    use crate::error::{DriverError, Error};

    fn driver_err(err: Error) -> DriverError {
        match err {
            Error::DriverError(err) => err,
            other => panic!("expected a driver error, got {}", other),
        }
    }

    #[test]
    fn should_read_lenenc_int_forms() {
        assert_eq!(ParseBuf(&[0x00]).read_lenenc_int().unwrap(), 0);
        assert_eq!(ParseBuf(&[0xfa]).read_lenenc_int().unwrap(), 250);
        assert_eq!(
            ParseBuf(&[0xfc, 0xfb, 0x00]).read_lenenc_int().unwrap(),
            251
        );
        assert_eq!(
            ParseBuf(&[0xfd, 0x00, 0x00, 0x01]).read_lenenc_int().unwrap(),
            65536
        );
        assert_eq!(
            ParseBuf(&[0xfe, 0, 0, 0, 1, 0, 0, 0, 0])
                .read_lenenc_int()
                .unwrap(),
            16_777_216
        );
    }

    #[test]
    fn should_reject_reserved_lenenc_bytes() {
        assert!(matches!(
            driver_err(ParseBuf(&[0xfb]).read_lenenc_int().unwrap_err()),
            DriverError::ProtocolValue(_)
        ));
        assert!(matches!(
            driver_err(ParseBuf(&[0xff]).read_lenenc_int().unwrap_err()),
            DriverError::ProtocolValue(_)
        ));
    }

    #[test]
    fn should_write_shortest_lenenc_form() {
        for (x, len) in [
            (0u64, 1usize),
            (250, 1),
            (251, 3),
            (65_535, 3),
            (65_536, 4),
            (16_777_215, 4),
            (16_777_216, 9),
            (u64::MAX, 9),
        ] {
            let mut out = Vec::new();
            out.write_lenenc_int(x);
            assert_eq!(out.len(), len, "wrong length for {}", x);
            assert_eq!(ParseBuf(&out).read_lenenc_int().unwrap(), x);
        }
    }

    #[test]
    fn should_fail_on_truncated_input() {
        assert!(matches!(
            driver_err(ParseBuf(&[0xfc, 0x01]).read_lenenc_int().unwrap_err()),
            DriverError::IncompleteMessage
        ));
        assert!(matches!(
            driver_err(ParseBuf(&[0x05, b'a', b'b']).read_lenenc_str().unwrap_err()),
            DriverError::IncompleteMessage
        ));
    }

    #[test]
    fn should_parse_ok_packet() {
        const PLAIN_OK: &[u8] = b"\x00\x00\x00\x02\x00\x00\x00";
        const EOF: &[u8] = b"\xfe\x00\x00\x02\x00";

        // packet starting with 0x00 is not an ok packet if it terminates a
        // result set
        OkPacket::parse(
            PLAIN_OK,
            CapabilityFlags::empty(),
            OkPacketKind::ResultSetTerminator,
        )
        .unwrap_err();

        let ok_packet =
            OkPacket::parse(PLAIN_OK, CapabilityFlags::empty(), OkPacketKind::Other).unwrap();
        assert_eq!(ok_packet.affected_rows(), 0);
        assert_eq!(ok_packet.last_insert_id(), 0);
        assert_eq!(
            ok_packet.status_flags(),
            StatusFlags::SERVER_STATUS_AUTOCOMMIT
        );
        assert_eq!(ok_packet.warnings(), 0);
        assert_eq!(ok_packet.info_ref(), b"");

        // legacy EOF layout without CLIENT_DEPRECATE_EOF
        let eof = OkPacket::parse(
            EOF,
            CapabilityFlags::empty(),
            OkPacketKind::ResultSetTerminator,
        )
        .unwrap();
        assert_eq!(eof.warnings(), 0);
        assert_eq!(eof.status_flags(), StatusFlags::SERVER_STATUS_AUTOCOMMIT);

        // ok layout with 0xfe header under CLIENT_DEPRECATE_EOF
        let ok_eof = OkPacket::parse(
            EOF,
            CapabilityFlags::CLIENT_DEPRECATE_EOF,
            OkPacketKind::ResultSetTerminator,
        )
        .unwrap();
        assert_eq!(ok_eof.affected_rows(), 0);
        assert_eq!(ok_eof.last_insert_id(), 0);
        assert_eq!(
            ok_eof.status_flags(),
            StatusFlags::SERVER_STATUS_AUTOCOMMIT
        );
    }

    #[test]
    fn should_round_trip_ok_packet() {
        let ok = OkPacket::new(
            4,
            0,
            StatusFlags::from_bits_truncate(0x22),
            0,
            &b"Rows matched: 5  Changed: 4  Warnings: 0"[..],
        );
        let bytes = ok.serialize(CapabilityFlags::empty());
        let parsed =
            OkPacket::parse(&bytes, CapabilityFlags::empty(), OkPacketKind::Other).unwrap();
        assert_eq!(parsed, ok);
        assert_eq!(parsed.serialize(CapabilityFlags::empty()), bytes);
    }

    #[test]
    fn should_parse_err_packet() {
        const ERR_PACKET: &[u8] = b"\xff\x48\x04\x23\x48\x59\x30\x30\x30\x4e\x6f\x20\x74\x61\x62\
              \x6c\x65\x73\x20\x75\x73\x65\x64";
        const ERR_PACKET_NO_STATE: &[u8] = b"\xff\x10\x04\x54\x6f\x6f\x20\x6d\x61\x6e\x79\x20\x63\
              \x6f\x6e\x6e\x65\x63\x74\x69\x6f\x6e\x73";

        let err_packet = ErrPacket::parse(ERR_PACKET).unwrap();
        assert_eq!(err_packet.error_code(), 1096);
        assert_eq!(err_packet.sql_state_str(), "HY000");
        assert_eq!(err_packet.message_str(), "No tables used");
        assert_eq!(err_packet.serialize(), ERR_PACKET);

        let err_packet = ErrPacket::parse(ERR_PACKET_NO_STATE).unwrap();
        assert_eq!(err_packet.error_code(), 1040);
        assert_eq!(err_packet.sql_state_str(), "HY000");
        assert_eq!(err_packet.message_str(), "Too many connections");
    }

    #[test]
    fn should_parse_handshake_packet() {
        const HSP: &[u8] = b"\x0a5.5.5-10.0.17-MariaDB-log\x00\x0b\x00\
                             \x00\x00\x64\x76\x48\x40\x49\x2d\x43\x4a\x00\xff\xf7\x08\x02\x00\
                             \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x2a\x34\x64\
                             \x7c\x63\x5a\x77\x6b\x34\x5e\x5d\x3a\x00";

        const HSP_2: &[u8] = b"\x0a\x35\x2e\x36\x2e\x34\x2d\x6d\x37\x2d\x6c\x6f\
                               \x67\x00\x56\x0a\x00\x00\x52\x42\x33\x76\x7a\x26\x47\x72\x00\xff\
                               \xff\x08\x02\x00\x0f\xc0\x15\x00\x00\x00\x00\x00\x00\x00\x00\x00\
                               \x00\x2b\x79\x44\x26\x2f\x5a\x5a\x33\x30\x35\x5a\x47\x00\x6d\x79\
                               \x73\x71\x6c\x5f\x6e\x61\x74\x69\x76\x65\x5f\x70\x61\x73\x73\x77\
                               \x6f\x72\x64\x00\x00";

        let hsp = HandshakePacket::parse(HSP).unwrap();
        assert_eq!(hsp.protocol_version(), 0x0a);
        assert_eq!(hsp.server_version_str(), "5.5.5-10.0.17-MariaDB-log");
        assert_eq!(hsp.server_version_parsed(), Some((5, 5, 5)));
        assert_eq!(hsp.maria_db_server_version_parsed(), Some((10, 0, 17)));
        assert_eq!(hsp.flavor(), DbFlavor::MariaDb);
        assert_eq!(hsp.connection_id(), 0x0b);
        assert_eq!(hsp.scramble_1_ref(), b"dvH@I-CJ");
        assert_eq!(
            hsp.capabilities(),
            CapabilityFlags::from_bits_truncate(0xf7ff)
        );
        assert_eq!(hsp.default_collation(), 0x08);
        assert_eq!(hsp.status_flags(), StatusFlags::from_bits_truncate(0x0002));
        assert_eq!(hsp.scramble_2_ref(), Some(&b"*4d|cZwk4^]:"[..]));
        assert_eq!(hsp.auth_plugin(), None);

        let hsp = HandshakePacket::parse(HSP_2).unwrap();
        assert_eq!(hsp.protocol_version(), 0x0a);
        assert_eq!(hsp.server_version_str(), "5.6.4-m7-log");
        assert_eq!(hsp.server_version_parsed(), Some((5, 6, 4)));
        assert_eq!(hsp.maria_db_server_version_parsed(), None);
        assert_eq!(hsp.flavor(), DbFlavor::MySql);
        assert_eq!(hsp.connection_id(), 0x0a56);
        assert_eq!(hsp.scramble_1_ref(), b"RB3vz&Gr");
        assert_eq!(
            hsp.capabilities(),
            CapabilityFlags::from_bits_truncate(0xc00fffff)
        );
        assert_eq!(hsp.scramble_2_ref(), Some(&b"+yD&/ZZ305ZG"[..]));
        assert_eq!(
            hsp.auth_plugin(),
            Some(&AuthPlugin::MysqlNativePassword)
        );
        assert_eq!(hsp.nonce(), b"RB3vz&Gr+yD&/ZZ305ZG");
    }

    #[test]
    fn should_round_trip_handshake_response() {
        let response = HandshakeResponse::new(
            CapabilityFlags::CLIENT_PROTOCOL_41
                | CapabilityFlags::CLIENT_SECURE_CONNECTION
                | CapabilityFlags::CLIENT_PLUGIN_AUTH
                | CapabilityFlags::CLIENT_DEPRECATE_EOF
                | CapabilityFlags::CLIENT_CONNECT_WITH_DB
                | CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA,
            crate::consts::UTF8MB4_GENERAL_CI,
            b"root",
            &[0xaa; 20],
            Some(b"test"),
            Some(AuthPlugin::MysqlNativePassword),
        );
        let bytes = response.serialize();
        assert_eq!(&bytes[4..8], &0x0100_0000u32.to_le_bytes());
        let parsed = HandshakeResponse::parse(&bytes).unwrap();
        assert_eq!(parsed, response);
        assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn should_build_ssl_request() {
        let caps = CapabilityFlags::CLIENT_PROTOCOL_41 | CapabilityFlags::CLIENT_SSL;
        let req = SslRequest::new(caps, crate::consts::UTF8MB4_GENERAL_CI);
        let bytes = req.as_ref();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[0..4], &caps.bits().to_le_bytes());
        assert_eq!(&bytes[4..8], &0x0100_0000u32.to_le_bytes());
        assert_eq!(bytes[8], crate::consts::UTF8MB4_GENERAL_CI);
        assert!(bytes[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn should_parse_auth_switch_request() {
        const PAYLOAD: &[u8] = b"\xfe\x6d\x79\x73\x71\x6c\x5f\x6e\x61\x74\x69\x76\x65\x5f\x70\x61\
                                 \x73\x73\x77\x6f\x72\x64\x00\x7a\x51\x67\x34\x69\x36\x6f\x4e\x79\
                                 \x36\x3d\x72\x48\x4e\x2f\x3e\x2d\x62\x29\x41\x00";
        let packet = AuthSwitchRequest::parse(PAYLOAD).unwrap();
        assert_eq!(packet.auth_plugin().as_bytes(), b"mysql_native_password");
        assert_eq!(packet.plugin_data(), b"zQg4i6oNy6=rHN/>-b)A");
    }

    #[test]
    fn should_parse_auth_more_data() {
        const PAYLOAD: &[u8] = b"\x01\x04";
        let packet = AuthMoreData::parse(PAYLOAD).unwrap();
        assert_eq!(packet.data(), b"\x04");
    }

    #[test]
    fn should_parse_column_packet() {
        const COLUMN_PACKET: &[u8] = b"\x03def\x06schema\x05table\x09org_table\x04name\
              \x08org_name\x0c\x21\x00\x0F\x00\x00\x00\x00\x01\x00\x08\x00\x00";
        let column = Column::from_payload(COLUMN_PACKET.to_vec()).unwrap();
        assert_eq!(column.schema_str(), "schema");
        assert_eq!(column.table_str(), "table");
        assert_eq!(column.org_table_str(), "org_table");
        assert_eq!(column.name_str(), "name");
        assert_eq!(column.org_name_str(), "org_name");
        assert_eq!(column.character_set(), u16::from(UTF8_GENERAL_CI));
        assert_eq!(column.column_length(), 15);
        assert_eq!(column.column_type(), ColumnType::MYSQL_TYPE_DECIMAL);
        assert_eq!(column.flags(), ColumnFlags::NOT_NULL_FLAG);
        assert_eq!(column.decimals(), 8);
        assert_eq!(column.serialize(), COLUMN_PACKET);
    }

    #[test]
    fn should_derive_column_kind() {
        fn column(column_type: ColumnType, flags: ColumnFlags, charset: u16) -> Column {
            let mut payload = Vec::new();
            payload.write_lenenc_str(b"def");
            for _ in 0..5 {
                payload.write_lenenc_str(b"x");
            }
            payload.write_lenenc_int(12);
            payload.write_u16_le(charset);
            payload.write_u32_le(0);
            payload.write_u8(column_type as u8);
            payload.write_u16_le(flags.bits());
            payload.write_u8(0);
            payload.write_u16_le(0);
            Column::from_payload(payload).unwrap()
        }

        let text = column(
            ColumnType::MYSQL_TYPE_BLOB,
            ColumnFlags::empty(),
            u16::from(UTF8_GENERAL_CI),
        );
        assert_eq!(text.kind(), ColumnKind::Text);

        let blob = column(
            ColumnType::MYSQL_TYPE_BLOB,
            ColumnFlags::BINARY_FLAG,
            BINARY_COLLATION_ID,
        );
        assert_eq!(blob.kind(), ColumnKind::Blob);

        let as_enum = column(
            ColumnType::MYSQL_TYPE_STRING,
            ColumnFlags::ENUM_FLAG,
            u16::from(UTF8_GENERAL_CI),
        );
        assert_eq!(as_enum.kind(), ColumnKind::Enum);

        let as_set = column(
            ColumnType::MYSQL_TYPE_STRING,
            ColumnFlags::SET_FLAG,
            u16::from(UTF8_GENERAL_CI),
        );
        assert_eq!(as_set.kind(), ColumnKind::Set);

        let decimal = column(
            ColumnType::MYSQL_TYPE_NEWDECIMAL,
            ColumnFlags::empty(),
            u16::from(UTF8_GENERAL_CI),
        );
        assert_eq!(decimal.kind(), ColumnKind::Decimal);
    }

    #[test]
    fn should_parse_stmt_packet() {
        const SP: &[u8] = b"\x00\x01\x00\x00\x00\x01\x00\x02\x00\x00\x00\x00";
        const SP_2: &[u8] = b"\x00\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00";

        let sp = StmtPacket::parse(SP).unwrap();
        assert_eq!(sp.statement_id(), 0x01);
        assert_eq!(sp.num_columns(), 0x01);
        assert_eq!(sp.num_params(), 0x02);
        assert_eq!(sp.warning_count(), 0x00);

        let sp = StmtPacket::parse(SP_2).unwrap();
        assert_eq!(sp.statement_id(), 0x01);
        assert_eq!(sp.num_columns(), 0x00);
        assert_eq!(sp.num_params(), 0x00);
    }

    #[test]
    fn should_track_null_bitmap_offsets() {
        let mut client = NullBitmap::<ClientSide>::new(3);
        client.set(0, true);
        client.set(2, true);
        assert_eq!(client.as_ref(), &[0b0000_0101]);
        assert!(client.is_null(0));
        assert!(!client.is_null(1));
        assert!(client.is_null(2));

        let server = NullBitmap::<ServerSide, &[u8]>::from_bytes(&[0b0001_0100][..]);
        assert!(server.is_null(0));
        assert!(!server.is_null(1));
        assert!(server.is_null(2));
        assert_eq!(NullBitmap::<ServerSide>::bitmap_len(7), 2);
        assert_eq!(NullBitmap::<ClientSide>::bitmap_len(8), 1);
    }

    #[test]
    fn should_build_stmt_execute_request() {
        let body = ComStmtExecuteRequestBuilder::new(1).build(&[Value::Int(7)]);
        assert_eq!(
            body,
            vec![
                0x17, // COM_STMT_EXECUTE
                0x01, 0x00, 0x00, 0x00, // statement id
                0x00, // flags
                0x01, 0x00, 0x00, 0x00, // iteration count
                0x00, // null bitmap
                0x01, // new params bound
                0x08, 0x00, // MYSQL_TYPE_LONGLONG, signed
                0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // value
            ]
        );

        let no_params = ComStmtExecuteRequestBuilder::new(2).build(&[]);
        assert_eq!(
            no_params,
            vec![0x17, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]
        );

        let with_null = ComStmtExecuteRequestBuilder::new(3)
            .build(&[Value::NULL, Value::UInt(16)]);
        assert_eq!(
            with_null,
            vec![
                0x17, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
                0x01, // bitmap: param 0 is null
                0x01, // new params bound
                0x06, 0x00, // MYSQL_TYPE_NULL
                0x08, 0x80, // MYSQL_TYPE_LONGLONG, unsigned
                0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            ]
        );
    }

    #[test]
    fn should_build_command_bodies() {
        assert_eq!(command_body(Command::COM_QUIT, &[]), vec![0x01]);
        assert_eq!(command_body(Command::COM_PING, &[]), vec![0x0e]);
        assert_eq!(
            command_body(Command::COM_QUERY, b"DO 1"),
            b"\x03DO 1".to_vec()
        );
        assert_eq!(com_stmt_close(7), vec![0x19, 0x07, 0x00, 0x00, 0x00]);
        assert_eq!(com_stmt_reset(7), vec![0x1a, 0x07, 0x00, 0x00, 0x00]);
    }
}
