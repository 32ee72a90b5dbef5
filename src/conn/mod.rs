// Copyright (c) 2023 mysql-aio contributors
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use log::debug;

use crate::consts::{CapabilityFlags, Command, DbFlavor, StatusFlags};
use crate::error::{DriverError, MySqlError, Result};
use crate::io::{BoxStream, PacketStream};
use crate::packets::{
    self, AuthMoreData, AuthSwitchRequest, Column, ComStmtExecuteRequestBuilder, ErrPacket,
    HandshakePacket, HandshakeResponse, OkPacket, OkPacketKind, ParseBuf, SslRequest, StmtPacket,
};
use crate::scramble::{AuthPlugin, FAST_AUTH_SUCCESS, PERFORM_FULL_AUTHENTICATION};
use crate::value::Value;

pub mod opts;
pub mod pool;
pub mod query_result;
pub mod stmt;

pub use self::opts::{Opts, OptsBuilder, PoolOpts, SslOpts};
pub use self::query_result::QueryResult;
pub use self::stmt::Statement;

fn required_capabilities() -> CapabilityFlags {
    CapabilityFlags::CLIENT_PROTOCOL_41
        | CapabilityFlags::CLIENT_SECURE_CONNECTION
        | CapabilityFlags::CLIENT_PLUGIN_AUTH
        | CapabilityFlags::CLIENT_DEPRECATE_EOF
}

fn optional_capabilities() -> CapabilityFlags {
    CapabilityFlags::CLIENT_MULTI_RESULTS
        | CapabilityFlags::CLIENT_PS_MULTI_RESULTS
        | CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA
}

/// Single MySql connection.
///
/// Strictly request-reply: at most one command is in flight, and a resultset
/// must be fully drained before the next command is issued. A command future
/// dropped after its bytes hit the wire leaves the connection in an unknown
/// protocol state, so the connection marks itself unusable
/// ([`Conn::is_open`] turns `false`).
pub struct Conn {
    opts: Opts,
    stream: PacketStream,
    id: u32,
    version: (u16, u16, u16),
    flavor: DbFlavor,
    capability_flags: CapabilityFlags,
    status_flags: StatusFlags,
    character_set: u8,
    affected_rows: u64,
    last_insert_id: u64,
    warnings: u16,
    info: Vec<u8>,
    in_command: bool,
    has_results: bool,
    ssl_active: bool,
}

impl fmt::Debug for Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("connection id", &self.id)
            .field("server version", &self.version)
            .field("flavor", &self.flavor)
            .field("ssl", &self.ssl_active)
            .field("has result", &self.has_results)
            .field("options", &self.opts)
            .finish()
    }
}

impl Conn {
    /// Connects and authenticates per `opts`.
    pub async fn new<T: Into<Opts>>(opts: T) -> Result<Conn> {
        let opts = opts.into();
        let stream: BoxStream = match opts.get_connector() {
            Some(connector) => connector.connect().await?,
            None => {
                let host = opts.get_ip_or_hostname().to_string();
                let port = opts.get_tcp_port();
                let stream = tokio::net::TcpStream::connect((host.as_str(), port))
                    .await
                    .map_err(|err| {
                        DriverError::CouldNotConnect(Some((
                            format!("{}:{}", host, port),
                            err.to_string(),
                        )))
                    })?;
                let _ = stream.set_nodelay(opts.get_tcp_nodelay());
                Box::new(stream)
            }
        };
        Conn::with_stream(stream, opts).await
    }

    /// Runs the protocol over an already-connected byte stream.
    pub async fn with_stream(stream: BoxStream, opts: Opts) -> Result<Conn> {
        let mut conn = Conn {
            opts,
            stream: PacketStream::new(stream),
            id: 0,
            version: (0, 0, 0),
            flavor: DbFlavor::MySql,
            capability_flags: CapabilityFlags::empty(),
            status_flags: StatusFlags::empty(),
            character_set: 0,
            affected_rows: 0,
            last_insert_id: 0,
            warnings: 0,
            info: Vec::new(),
            in_command: false,
            has_results: false,
            ssl_active: false,
        };
        conn.handshake().await?;
        Ok(conn)
    }

    async fn handshake(&mut self) -> Result<()> {
        let payload = self.stream.read_packet().await?;
        let handshake = HandshakePacket::parse(&payload)?;

        if handshake.protocol_version() != 10 {
            return Err(DriverError::UnsupportedProtocol(handshake.protocol_version()).into());
        }
        self.id = handshake.connection_id();
        self.flavor = handshake.flavor();
        self.version = match self.flavor {
            DbFlavor::MariaDb => handshake
                .maria_db_server_version_parsed()
                .or_else(|| handshake.server_version_parsed()),
            DbFlavor::MySql => handshake.server_version_parsed(),
        }
        .ok_or(DriverError::CouldNotParseVersion)?;
        self.status_flags = handshake.status_flags();

        let server_caps = handshake.capabilities();
        let missing = required_capabilities() - server_caps;
        if !missing.is_empty() {
            return Err(DriverError::ServerUnsupported(missing).into());
        }
        let mut client_caps = required_capabilities() | (optional_capabilities() & server_caps);
        if self.opts.get_db_name().is_some() {
            client_caps |= CapabilityFlags::CLIENT_CONNECT_WITH_DB;
        }
        let collation = self.opts.get_collation();

        if let Some(ssl_opts) = self.opts.get_ssl_opts().cloned() {
            if server_caps.contains(CapabilityFlags::CLIENT_SSL) {
                client_caps |= CapabilityFlags::CLIENT_SSL;
                let ssl_request = SslRequest::new(client_caps, collation);
                self.stream.write_packet(ssl_request.as_ref()).await?;
                self.stream
                    .upgrade_tls(ssl_opts.upgrader(), ssl_opts.domain())
                    .await?;
                self.ssl_active = true;
            } else if ssl_opts.is_required() {
                return Err(DriverError::TlsNotSupported.into());
            }
        }

        let nonce = handshake.nonce();
        let mut plugin = match handshake.auth_plugin() {
            Some(plugin) => plugin.clone().into_owned(),
            None => AuthPlugin::MysqlNativePassword,
        };
        let pass = self.opts.get_pass().unwrap_or("").to_string();
        let auth_response = plugin
            .gen_data(&pass, &nonce)
            .ok_or_else(|| unknown_plugin(&plugin))?;

        let response = HandshakeResponse::new(
            client_caps,
            collation,
            self.opts.get_user().unwrap_or("").as_bytes(),
            &auth_response,
            self.opts.get_db_name().map(str::as_bytes),
            Some(plugin.clone()),
        );
        self.stream.write_packet(&response.serialize()).await?;
        self.capability_flags = client_caps;
        self.character_set = collation;

        loop {
            let payload = self.stream.read_packet().await?;
            match payload.first() {
                Some(0x00) => {
                    let ok =
                        OkPacket::parse(&payload, self.capability_flags, OkPacketKind::Other)?;
                    self.handle_ok(&ok);
                    break;
                }
                Some(0xff) => {
                    let err = ErrPacket::parse(&payload)?;
                    return Err(MySqlError::from(err).into());
                }
                Some(0xfe) => {
                    let switch = AuthSwitchRequest::parse(&payload)?;
                    plugin = switch.auth_plugin().clone().into_owned();
                    let auth_data = plugin
                        .gen_data(&pass, switch.plugin_data())
                        .ok_or_else(|| unknown_plugin(&plugin))?;
                    self.stream.write_packet(&auth_data).await?;
                }
                Some(0x01) => {
                    let more_data = AuthMoreData::parse(&payload)?;
                    self.handle_auth_more_data(&plugin, more_data.data(), &pass)
                        .await?;
                }
                _ => return Err(DriverError::UnexpectedPacket.into()),
            }
        }

        debug!(
            "connected to {:?} server {}.{}.{} (connection id {})",
            self.flavor, self.version.0, self.version.1, self.version.2, self.id
        );
        Ok(())
    }

    async fn handle_auth_more_data(
        &mut self,
        plugin: &AuthPlugin<'static>,
        data: &[u8],
        pass: &str,
    ) -> Result<()> {
        match (plugin, data) {
            (AuthPlugin::CachingSha2Password, [FAST_AUTH_SUCCESS]) => {
                // server follows up with an Ok packet
                Ok(())
            }
            (AuthPlugin::CachingSha2Password, [PERFORM_FULL_AUTHENTICATION]) => {
                if !self.ssl_active {
                    return Err(DriverError::AuthPluginRequiresSecureConnection(
                        String::from_utf8_lossy(plugin.as_bytes()).into_owned(),
                    )
                    .into());
                }
                let mut plaintext = pass.as_bytes().to_vec();
                plaintext.push(0x00);
                self.stream.write_packet(&plaintext).await
            }
            _ => Err(DriverError::UnexpectedPacket.into()),
        }
    }

    fn handle_ok(&mut self, ok: &OkPacket<'_>) {
        self.affected_rows = ok.affected_rows();
        self.last_insert_id = ok.last_insert_id();
        self.status_flags = ok.status_flags();
        self.warnings = ok.warnings();
        self.info = ok.info_ref().to_vec();
    }

    /// `true` while the connection can accept another command.
    pub fn is_open(&self) -> bool {
        !self.stream.is_closed() && !self.in_command && !self.has_results
    }

    pub fn connection_id(&self) -> u32 {
        self.id
    }

    pub fn server_version(&self) -> (u16, u16, u16) {
        self.version
    }

    pub fn flavor(&self) -> DbFlavor {
        self.flavor
    }

    pub fn capabilities(&self) -> CapabilityFlags {
        self.capability_flags
    }

    pub fn status_flags(&self) -> StatusFlags {
        self.status_flags
    }

    /// Collation negotiated during handshake.
    pub fn character_set(&self) -> u8 {
        self.character_set
    }

    pub fn is_secure(&self) -> bool {
        self.ssl_active
    }

    /// Affected rows of the last consumed Ok packet.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    pub fn warnings(&self) -> u16 {
        self.warnings
    }

    pub fn info_ref(&self) -> &[u8] {
        &self.info
    }

    pub fn info_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.info)
    }

    /// `true` when the last consumed Ok packet announced a following
    /// resultset.
    pub fn more_results_exists(&self) -> bool {
        self.status_flags
            .contains(StatusFlags::SERVER_MORE_RESULTS_EXISTS)
    }

    fn clean_for_command(&self) -> Result<()> {
        if self.stream.is_closed() {
            Err(DriverError::ConnectionClosed.into())
        } else if self.has_results {
            Err(DriverError::ResultNotConsumed.into())
        } else if self.in_command {
            // a previous command future was dropped mid-flight
            Err(DriverError::Cancelled.into())
        } else {
            Ok(())
        }
    }

    async fn write_command_raw(&mut self, body: &[u8]) -> Result<()> {
        self.clean_for_command()?;
        self.in_command = true;
        self.stream.reset_seq();
        match self.stream.write_packet(body).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.stream.close();
                Err(err)
            }
        }
    }

    async fn write_command(&mut self, cmd: Command, data: &[u8]) -> Result<()> {
        debug!("sending {:?}", cmd);
        self.write_command_raw(&packets::command_body(cmd, data)).await
    }

    pub(crate) async fn read_response_packet(&mut self) -> Result<Bytes> {
        match self.stream.read_packet().await {
            Ok(payload) => Ok(payload),
            Err(err) => {
                self.stream.close();
                Err(err)
            }
        }
    }

    /// Marks the connection unusable.
    pub(crate) fn poison(&mut self) {
        self.stream.close();
    }

    pub(crate) fn command_done(&mut self) {
        self.in_command = false;
    }

    pub(crate) fn set_has_results(&mut self, has_results: bool) {
        self.has_results = has_results;
    }

    async fn read_ok_response(&mut self) -> Result<()> {
        let payload = self.read_response_packet().await?;
        match payload.first() {
            Some(0x00) => {
                let ok = OkPacket::parse(&payload, self.capability_flags, OkPacketKind::Other)?;
                self.handle_ok(&ok);
                self.in_command = false;
                Ok(())
            }
            Some(0xff) => {
                let err = ErrPacket::parse(&payload)?;
                // the error is fully consumed, the connection stays usable
                self.in_command = false;
                Err(MySqlError::from(err).into())
            }
            _ => {
                self.poison();
                Err(DriverError::UnexpectedPacket.into())
            }
        }
    }

    /// Checks server liveness.
    pub async fn ping(&mut self) -> Result<()> {
        self.write_command(Command::COM_PING, &[]).await?;
        self.read_ok_response().await
    }

    /// Resets session state on the server (COM_RESET_CONNECTION).
    pub async fn reset_connection(&mut self) -> Result<()> {
        self.write_command(Command::COM_RESET_CONNECTION, &[]).await?;
        self.read_ok_response().await
    }

    /// Performs a text-protocol query.
    pub async fn query<'a>(&'a mut self, query: &str) -> Result<QueryResult<'a>> {
        self.write_command(Command::COM_QUERY, query.as_bytes())
            .await?;
        let (columns, ok) = self.start_result_set(false).await?;
        Ok(QueryResult::new(self, columns, ok, false))
    }

    /// Prepares a statement.
    pub async fn prepare(&mut self, query: &str) -> Result<Statement> {
        self.write_command(Command::COM_STMT_PREPARE, query.as_bytes())
            .await?;
        let payload = self.read_response_packet().await?;
        match payload.first() {
            Some(0x00) => {
                let stmt = match StmtPacket::parse(&payload) {
                    Ok(stmt) => stmt,
                    Err(err) => {
                        self.poison();
                        return Err(err);
                    }
                };
                let params = self.read_column_block(stmt.num_params() as usize).await?;
                let columns = self.read_column_block(stmt.num_columns() as usize).await?;
                self.in_command = false;
                debug!(
                    "prepared statement {} ({} params, {} columns)",
                    stmt.statement_id(),
                    stmt.num_params(),
                    stmt.num_columns()
                );
                Ok(Statement::new(
                    stmt.statement_id(),
                    stmt.num_columns(),
                    stmt.num_params(),
                    params,
                    columns,
                ))
            }
            Some(0xff) => {
                let err = ErrPacket::parse(&payload)?;
                self.in_command = false;
                Err(MySqlError::from(err).into())
            }
            _ => {
                self.poison();
                Err(DriverError::UnexpectedPacket.into())
            }
        }
    }

    async fn read_column_block(&mut self, count: usize) -> Result<Arc<[Column]>> {
        let mut columns = Vec::with_capacity(count);
        for _ in 0..count {
            let payload = self.read_response_packet().await?;
            match Column::from_payload(payload.to_vec()) {
                Ok(column) => columns.push(column),
                Err(err) => {
                    self.poison();
                    return Err(err);
                }
            }
        }
        if count > 0
            && !self
                .capability_flags
                .contains(CapabilityFlags::CLIENT_DEPRECATE_EOF)
        {
            // legacy EOF terminates the metadata block
            self.read_response_packet().await?;
        }
        Ok(columns.into())
    }

    /// Executes a prepared statement with the given parameters.
    pub async fn execute<'a>(
        &'a mut self,
        stmt: &Statement,
        params: &[Value<'_>],
    ) -> Result<QueryResult<'a>> {
        if stmt.num_params() as usize != params.len() {
            return Err(DriverError::MismatchedStmtParams(stmt.num_params(), params.len()).into());
        }
        let body = ComStmtExecuteRequestBuilder::new(stmt.id()).build(params);
        debug!("sending COM_STMT_EXECUTE for statement {}", stmt.id());
        self.write_command_raw(&body).await?;
        let (columns, ok) = self.start_result_set(true).await?;
        Ok(QueryResult::new(self, columns, ok, true))
    }

    /// Deallocates a prepared statement. The server sends no reply.
    pub async fn close_stmt(&mut self, stmt: Statement) -> Result<()> {
        self.write_command_raw(&packets::com_stmt_close(stmt.id()))
            .await?;
        self.in_command = false;
        Ok(())
    }

    /// Resets a prepared statement's accumulated state on the server.
    pub async fn reset_stmt(&mut self, stmt: &Statement) -> Result<()> {
        self.write_command_raw(&packets::com_stmt_reset(stmt.id()))
            .await?;
        self.read_ok_response().await
    }

    /// Sends COM_QUIT and shuts the transport down. No reply is awaited.
    pub async fn quit(mut self) -> Result<()> {
        if !self.stream.is_closed() && !self.in_command && !self.has_results {
            let _ = self
                .write_command(Command::COM_QUIT, &[])
                .await;
        }
        self.stream.shutdown().await;
        Ok(())
    }

    /// Reads the head of a resultset: either an immediate Ok (no columns) or
    /// the metadata block.
    pub(crate) async fn start_result_set(
        &mut self,
        binary: bool,
    ) -> Result<(Arc<[Column]>, Option<OkPacket<'static>>)> {
        let payload = self.read_response_packet().await?;
        match payload.first() {
            Some(0x00) => {
                let ok = OkPacket::parse(&payload, self.capability_flags, OkPacketKind::Other)?
                    .into_owned();
                self.handle_ok(&ok);
                if !ok.more_results_exists() {
                    self.in_command = false;
                }
                Ok((Vec::new().into(), Some(ok)))
            }
            Some(0xfe) if payload.len() < 9 => {
                let ok = OkPacket::parse(
                    &payload,
                    self.capability_flags,
                    OkPacketKind::ResultSetTerminator,
                )?
                .into_owned();
                self.handle_ok(&ok);
                if !ok.more_results_exists() {
                    self.in_command = false;
                }
                Ok((Vec::new().into(), Some(ok)))
            }
            Some(0xff) => {
                let err = ErrPacket::parse(&payload)?;
                self.in_command = false;
                Err(MySqlError::from(err).into())
            }
            Some(_) => {
                let column_count = {
                    let mut buf = ParseBuf(&payload);
                    let count = buf.read_lenenc_int();
                    count.and_then(|count| buf.expect_empty().map(|_| count))
                };
                let column_count = match column_count {
                    Ok(count) => count,
                    Err(err) => {
                        self.poison();
                        return Err(err);
                    }
                };
                let columns = self.read_column_block(column_count as usize).await?;
                self.set_has_results(true);
                debug!(
                    "reading {} resultset with {} columns",
                    if binary { "binary" } else { "text" },
                    columns.len()
                );
                Ok((columns, None))
            }
            None => {
                self.poison();
                Err(DriverError::UnexpectedPacket.into())
            }
        }
    }
}

fn unknown_plugin(plugin: &AuthPlugin<'_>) -> crate::error::Error {
    DriverError::UnknownAuthPlugin(String::from_utf8_lossy(plugin.as_bytes()).into_owned()).into()
}
