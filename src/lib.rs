// Copyright (c) 2023 mysql-aio contributors
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! ### mysql-aio
//!
//! Asynchronous MySql/MariaDb client library implemented in rust.
//!
//! This crate is the protocol engine: the wire codec, the handshake and
//! authentication state machine, text and binary resultset streaming,
//! prepared statements and a bounded connection pool. It runs over any
//! tokio byte stream; TLS is plugged in by the caller through
//! [`SslOpts`] and an upgrader.
//!
//! #### Example
//!
//! ```no_run
//! use mysql_aio::{OptsBuilder, Pool, Value};
//!
//! #[tokio::main]
//! async fn main() -> mysql_aio::Result<()> {
//!     let mut builder = OptsBuilder::new();
//!     builder
//!         .ip_or_hostname("127.0.0.1")
//!         .user(Some("root"))
//!         .pass(Some("password"))
//!         .db_name(Some("mysql"));
//!     let pool = Pool::new(builder)?;
//!
//!     let mut conn = pool.get_conn().await?;
//!
//!     // Text protocol
//!     let mut result = conn.query("SELECT 'hello', 42").await?;
//!     while let Some(row) = result.read_row().await? {
//!         assert_eq!(row[1], Value::Int(42));
//!     }
//!
//!     // Binary protocol
//!     let stmt = conn.prepare("SELECT ?").await?;
//!     let mut result = conn.execute(&stmt, &[Value::Int(7)]).await?;
//!     while let Some(row) = result.read_row().await? {
//!         assert_eq!(row[0], Value::Int(7));
//!     }
//!
//!     Ok(())
//! }
//! ```

mod conn;
pub mod consts;
pub mod error;
pub mod io;
pub mod packets;
pub mod scramble;
pub mod value;

#[doc(inline)]
pub use crate::conn::opts::{Opts, OptsBuilder, PoolOpts, SslOpts};
#[doc(inline)]
pub use crate::conn::pool::{Pool, PooledConn};
#[doc(inline)]
pub use crate::conn::query_result::QueryResult;
#[doc(inline)]
pub use crate::conn::stmt::Statement;
#[doc(inline)]
pub use crate::conn::Conn;
#[doc(inline)]
pub use crate::error::{DriverError, Error, MySqlError, Result, ServerError};
#[doc(inline)]
pub use crate::io::{AsyncStream, BoxStream, Connector, TlsUpgrade};
#[doc(inline)]
pub use crate::packets::{Column, ColumnKind, OkPacket};
#[doc(inline)]
pub use crate::value::{Row, Value};
