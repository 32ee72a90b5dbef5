// Copyright (c) 2023 mysql-aio contributors
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::sync::Arc;

use bytes::Bytes;

use crate::conn::Conn;
use crate::error::{DriverError, MySqlError, Result};
use crate::packets::{Column, ErrPacket, OkPacket, OkPacketKind};
use crate::value::Row;

/// Streamed resultset of a query or statement execution.
///
/// Rows must be drained (until [`read_row`](QueryResult::read_row) returns
/// `None`) before the connection accepts another command. Dropping an
/// undrained `QueryResult` leaves the connection unusable; there is no way
/// to resynchronize a half-read stream.
pub struct QueryResult<'a> {
    conn: &'a mut Conn,
    columns: Arc<[Column]>,
    ok: Option<OkPacket<'static>>,
    done: bool,
    binary: bool,
    row_buf: Bytes,
}

impl<'a> QueryResult<'a> {
    pub(crate) fn new(
        conn: &'a mut Conn,
        columns: Arc<[Column]>,
        ok: Option<OkPacket<'static>>,
        binary: bool,
    ) -> QueryResult<'a> {
        QueryResult {
            conn,
            columns,
            done: ok.is_some(),
            ok,
            binary,
            row_buf: Bytes::new(),
        }
    }

    /// Metadata of the current resultset. Empty when the statement produced
    /// no rows (e.g. an INSERT).
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_arc(&self) -> Arc<[Column]> {
        self.columns.clone()
    }

    /// `true` once the terminating Ok (or error) packet of the current
    /// resultset has been consumed.
    pub fn is_complete(&self) -> bool {
        self.done
    }

    /// Terminating Ok packet of the current resultset, once complete.
    pub fn ok_packet(&self) -> Option<&OkPacket<'static>> {
        self.ok.as_ref()
    }

    pub fn affected_rows(&self) -> u64 {
        self.conn.affected_rows()
    }

    pub fn last_insert_id(&self) -> u64 {
        self.conn.last_insert_id()
    }

    pub fn warnings(&self) -> u16 {
        self.conn.warnings()
    }

    pub fn info_ref(&self) -> &[u8] {
        self.conn.info_ref()
    }

    pub fn info_str(&self) -> std::borrow::Cow<'_, str> {
        self.conn.info_str()
    }

    /// `true` if another resultset follows on the same stream.
    pub fn more_results_exists(&self) -> bool {
        match self.ok {
            Some(ref ok) => ok.more_results_exists(),
            None => false,
        }
    }

    /// Reads the next row. The returned row borrows the read buffer and is
    /// valid until the next read; `None` means the resultset is complete.
    pub async fn read_row(&mut self) -> Result<Option<Row<'_>>> {
        if self.done || self.columns.is_empty() {
            return Ok(None);
        }

        let payload = self.conn.read_response_packet().await?;
        match payload.first() {
            Some(0xfe) if payload.len() < 9 => {
                let ok = match OkPacket::parse(
                    &payload,
                    self.conn.capabilities(),
                    OkPacketKind::ResultSetTerminator,
                ) {
                    Ok(ok) => ok.into_owned(),
                    Err(err) => {
                        self.conn.poison();
                        return Err(err);
                    }
                };
                self.conn.handle_ok(&ok);
                self.conn.set_has_results(false);
                if !ok.more_results_exists() {
                    self.conn.command_done();
                }
                self.ok = Some(ok);
                self.done = true;
                Ok(None)
            }
            Some(0xff) => {
                let err = match ErrPacket::parse(&payload) {
                    Ok(err) => err,
                    Err(parse_err) => {
                        self.conn.poison();
                        return Err(parse_err);
                    }
                };
                // the server aborted the resultset; the error is fully
                // consumed and the stream stays in sync
                self.conn.set_has_results(false);
                self.conn.command_done();
                self.done = true;
                Err(MySqlError::from(err).into())
            }
            Some(_) => {
                self.row_buf = payload;
                let row = if self.binary {
                    Row::read_bin(&self.row_buf, self.columns.clone())
                } else {
                    Row::read_text(&self.row_buf, self.columns.clone())
                };
                match row {
                    Ok(row) => Ok(Some(row)),
                    Err(err) => {
                        self.conn.poison();
                        Err(err)
                    }
                }
            }
            None => {
                self.conn.poison();
                Err(DriverError::UnexpectedPacket.into())
            }
        }
    }

    /// Reads up to `limit` rows, detached from the read buffer. Fewer rows
    /// mean the resultset is complete.
    pub async fn read_some_rows(&mut self, limit: usize) -> Result<Vec<Row<'static>>> {
        let mut rows = Vec::new();
        while rows.len() < limit {
            match self.read_row().await? {
                Some(row) => rows.push(row.into_owned()),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Reads the remaining rows of the current resultset.
    pub async fn collect(&mut self) -> Result<Vec<Row<'static>>> {
        let mut rows = Vec::new();
        while let Some(row) = self.read_row().await? {
            rows.push(row.into_owned());
        }
        Ok(rows)
    }

    /// Discards the remaining rows of the current resultset and any
    /// following resultsets.
    pub async fn drop_result(mut self) -> Result<()> {
        loop {
            while self.read_row().await?.is_some() {}
            if !self.next_set().await? {
                return Ok(());
            }
        }
    }

    /// Advances to the next resultset of a multi-resultset response.
    ///
    /// Returns `false` if the server announced no further resultsets. The
    /// current resultset must be complete.
    pub async fn next_set(&mut self) -> Result<bool> {
        if !self.done {
            return Err(DriverError::ResultNotConsumed.into());
        }
        if !self.more_results_exists() {
            return Ok(false);
        }
        let (columns, ok) = self.conn.start_result_set(self.binary).await?;
        self.columns = columns;
        self.done = ok.is_some();
        self.ok = ok;
        self.row_buf = Bytes::new();
        Ok(true)
    }
}
