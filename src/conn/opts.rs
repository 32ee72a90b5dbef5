// Copyright (c) 2023 mysql-aio contributors
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::consts::UTF8MB4_GENERAL_CI;
use crate::error::{DriverError, Result};
use crate::io::{Connector, TlsUpgrade};

/// TLS behavior of a connection.
///
/// The actual TLS engine is the caller's: an upgrader wraps the plain
/// stream once the server agrees to switch.
#[derive(Clone)]
pub struct SslOpts {
    upgrader: Arc<dyn TlsUpgrade>,
    domain: String,
    required: bool,
}

impl SslOpts {
    pub fn new(upgrader: Arc<dyn TlsUpgrade>, domain: impl Into<String>) -> SslOpts {
        SslOpts {
            upgrader,
            domain: domain.into(),
            required: true,
        }
    }

    /// If `false`, a server without TLS support downgrades the connection
    /// instead of failing it.
    pub fn with_required(mut self, required: bool) -> SslOpts {
        self.required = required;
        self
    }

    pub fn upgrader(&self) -> &dyn TlsUpgrade {
        &*self.upgrader
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}

impl fmt::Debug for SslOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SslOpts")
            .field("domain", &self.domain)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PoolOpts {
    initial_size: usize,
    max_size: usize,
    setup_retry_count: usize,
    retry_backoff: Duration,
    idle_wait_timeout: Duration,
}

impl Default for PoolOpts {
    fn default() -> PoolOpts {
        PoolOpts {
            initial_size: 0,
            max_size: 10,
            setup_retry_count: 2,
            retry_backoff: Duration::from_secs(1),
            idle_wait_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolOpts {
    pub fn new(initial_size: usize, max_size: usize) -> PoolOpts {
        PoolOpts {
            initial_size,
            max_size,
            ..Default::default()
        }
    }

    pub fn with_setup_retry_count(mut self, count: usize) -> PoolOpts {
        self.setup_retry_count = count;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> PoolOpts {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_idle_wait_timeout(mut self, timeout: Duration) -> PoolOpts {
        self.idle_wait_timeout = timeout;
        self
    }

    pub fn initial_size(&self) -> usize {
        self.initial_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn setup_retry_count(&self) -> usize {
        self.setup_retry_count
    }

    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }

    pub fn idle_wait_timeout(&self) -> Duration {
        self.idle_wait_timeout
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_size == 0 || self.initial_size > self.max_size {
            return Err(DriverError::InvalidPoolConstraints.into());
        }
        Ok(())
    }
}

/// Connection options.
#[derive(Clone)]
pub struct Opts {
    ip_or_hostname: String,
    tcp_port: u16,
    user: Option<String>,
    pass: Option<String>,
    db_name: Option<String>,
    collation: u8,
    tcp_nodelay: bool,
    ssl_opts: Option<SslOpts>,
    pool_opts: PoolOpts,
    connector: Option<Arc<dyn Connector>>,
}

impl Default for Opts {
    fn default() -> Opts {
        Opts {
            ip_or_hostname: "127.0.0.1".into(),
            tcp_port: 3306,
            user: None,
            pass: None,
            db_name: None,
            collation: UTF8MB4_GENERAL_CI,
            tcp_nodelay: true,
            ssl_opts: None,
            pool_opts: PoolOpts::default(),
            connector: None,
        }
    }
}

impl Opts {
    pub fn get_ip_or_hostname(&self) -> &str {
        &self.ip_or_hostname
    }

    pub fn get_tcp_port(&self) -> u16 {
        self.tcp_port
    }

    pub fn get_user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn get_pass(&self) -> Option<&str> {
        self.pass.as_deref()
    }

    pub fn get_db_name(&self) -> Option<&str> {
        self.db_name.as_deref()
    }

    pub fn get_collation(&self) -> u8 {
        self.collation
    }

    pub fn get_tcp_nodelay(&self) -> bool {
        self.tcp_nodelay
    }

    pub fn get_ssl_opts(&self) -> Option<&SslOpts> {
        self.ssl_opts.as_ref()
    }

    pub fn get_pool_opts(&self) -> &PoolOpts {
        &self.pool_opts
    }

    pub fn get_connector(&self) -> Option<&Arc<dyn Connector>> {
        self.connector.as_ref()
    }
}

impl fmt::Debug for Opts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opts")
            .field("ip_or_hostname", &self.ip_or_hostname)
            .field("tcp_port", &self.tcp_port)
            .field("user", &self.user)
            .field("db_name", &self.db_name)
            .field("collation", &self.collation)
            .field("ssl_opts", &self.ssl_opts)
            .field("pool_opts", &self.pool_opts)
            .finish_non_exhaustive()
    }
}

/// Builder of [`Opts`].
#[derive(Debug, Clone, Default)]
pub struct OptsBuilder {
    opts: Opts,
}

impl OptsBuilder {
    pub fn new() -> Self {
        OptsBuilder::default()
    }

    pub fn from_opts<T: Into<Opts>>(opts: T) -> Self {
        OptsBuilder { opts: opts.into() }
    }

    pub fn ip_or_hostname<T: Into<String>>(&mut self, ip_or_hostname: T) -> &mut Self {
        self.opts.ip_or_hostname = ip_or_hostname.into();
        self
    }

    pub fn tcp_port(&mut self, tcp_port: u16) -> &mut Self {
        self.opts.tcp_port = tcp_port;
        self
    }

    pub fn user<T: Into<String>>(&mut self, user: Option<T>) -> &mut Self {
        self.opts.user = user.map(Into::into);
        self
    }

    pub fn pass<T: Into<String>>(&mut self, pass: Option<T>) -> &mut Self {
        self.opts.pass = pass.map(Into::into);
        self
    }

    pub fn db_name<T: Into<String>>(&mut self, db_name: Option<T>) -> &mut Self {
        self.opts.db_name = db_name.map(Into::into);
        self
    }

    pub fn collation(&mut self, collation: u8) -> &mut Self {
        self.opts.collation = collation;
        self
    }

    pub fn tcp_nodelay(&mut self, nodelay: bool) -> &mut Self {
        self.opts.tcp_nodelay = nodelay;
        self
    }

    pub fn ssl_opts<T: Into<Option<SslOpts>>>(&mut self, ssl_opts: T) -> &mut Self {
        self.opts.ssl_opts = ssl_opts.into();
        self
    }

    pub fn pool_opts(&mut self, pool_opts: PoolOpts) -> &mut Self {
        self.opts.pool_opts = pool_opts;
        self
    }

    pub fn connector(&mut self, connector: Option<Arc<dyn Connector>>) -> &mut Self {
        self.opts.connector = connector;
        self
    }
}

impl From<OptsBuilder> for Opts {
    fn from(builder: OptsBuilder) -> Opts {
        builder.opts
    }
}

impl From<&OptsBuilder> for Opts {
    fn from(builder: &OptsBuilder) -> Opts {
        builder.opts.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_build_opts() {
        let mut builder = OptsBuilder::new();
        builder
            .ip_or_hostname("db.local")
            .tcp_port(3307)
            .user(Some("root"))
            .pass(Some("password"))
            .db_name(Some("test"));
        let opts: Opts = builder.into();
        assert_eq!(opts.get_ip_or_hostname(), "db.local");
        assert_eq!(opts.get_tcp_port(), 3307);
        assert_eq!(opts.get_user(), Some("root"));
        assert_eq!(opts.get_pass(), Some("password"));
        assert_eq!(opts.get_db_name(), Some("test"));
        assert_eq!(opts.get_collation(), UTF8MB4_GENERAL_CI);
    }

    #[test]
    fn should_validate_pool_constraints() {
        assert!(PoolOpts::new(0, 1).validate().is_ok());
        assert!(PoolOpts::new(2, 2).validate().is_ok());
        assert!(PoolOpts::new(0, 0).validate().is_err());
        assert!(PoolOpts::new(3, 2).validate().is_err());
    }
}
