// Copyright (c) 2023 mysql-aio contributors
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::{error, fmt, io, result, sync};

use crate::consts::CapabilityFlags;

/// Error returned by the server as an ERR packet.
#[derive(Eq, PartialEq, Clone)]
pub struct MySqlError {
    pub state: String,
    pub message: String,
    pub code: u16,
}

impl MySqlError {
    /// Maps the error code onto the small set of codes shared by MySql and
    /// MariaDb, if it is one of them.
    pub fn common(&self) -> Option<ServerError> {
        ServerError::try_from(self.code).ok()
    }
}

impl fmt::Display for MySqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR {} ({}): {}", self.code, self.state, self.message)
    }
}

impl fmt::Debug for MySqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl error::Error for MySqlError {}

#[derive(Debug)]
pub enum Error {
    IoError(io::Error),
    MySqlError(MySqlError),
    DriverError(DriverError),
}

impl Error {
    /// `true` for errors that leave the connection in an unusable state.
    pub fn is_connectivity_error(&self) -> bool {
        match self {
            Error::IoError(_) | Error::DriverError(_) => true,
            Error::MySqlError(_) => false,
        }
    }

    pub fn server_disconnected() -> Self {
        Error::IoError(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "server disconnected",
        ))
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            Error::MySqlError(ref err) => Some(err),
            Error::DriverError(ref err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Error {
        Error::DriverError(err)
    }
}

impl From<MySqlError> for Error {
    fn from(x: MySqlError) -> Error {
        Error::MySqlError(x)
    }
}

impl<T> From<sync::PoisonError<T>> for Error {
    fn from(_: sync::PoisonError<T>) -> Error {
        Error::DriverError(DriverError::PoisonedPoolMutex)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => write!(f, "IoError {{ {} }}", err),
            Error::MySqlError(ref err) => write!(f, "MySqlError {{ {} }}", err),
            Error::DriverError(ref err) => write!(f, "DriverError {{ {} }}", err),
        }
    }
}

/// Errors produced locally by the driver.
#[derive(Eq, PartialEq, Clone)]
pub enum DriverError {
    // (address, description)
    CouldNotConnect(Option<(String, String)>),
    UnsupportedProtocol(u8),
    /// Server lacks one of the capabilities the client requires.
    ServerUnsupported(CapabilityFlags),
    PacketOutOfSync,
    PacketTooLarge,
    /// A message ended before all of its fields could be read.
    IncompleteMessage,
    /// A message carried bytes past its last field.
    ExtraBytes,
    /// A field held a value the protocol does not allow.
    ProtocolValue(&'static str),
    UnexpectedPacket,
    UnknownAuthPlugin(String),
    /// The plugin needs a secure channel to proceed.
    AuthPluginRequiresSecureConnection(String),
    /// Client requires TLS but the server does not offer it.
    TlsNotSupported,
    PoolTimeout,
    PoisonedPoolMutex,
    /// A command was interrupted mid-flight; the connection is unusable.
    Cancelled,
    ResultNotConsumed,
    ConnectionClosed,
    MismatchedStmtParams(u16, usize),
    InvalidPoolConstraints,
    CouldNotParseVersion,
}

impl error::Error for DriverError {}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DriverError::CouldNotConnect(None) => {
                write!(f, "Could not connect: address not specified")
            }
            DriverError::CouldNotConnect(Some((ref addr, ref desc))) => {
                write!(f, "Could not connect to address `{}': {}", addr, desc)
            }
            DriverError::UnsupportedProtocol(proto_version) => {
                write!(f, "Unsupported protocol version {}", proto_version)
            }
            DriverError::ServerUnsupported(missing) => write!(
                f,
                "Server lacks required capabilities: {:?}",
                missing
            ),
            DriverError::PacketOutOfSync => write!(f, "Packet out of sync"),
            DriverError::PacketTooLarge => write!(f, "Packet too large"),
            DriverError::IncompleteMessage => write!(f, "Incomplete message"),
            DriverError::ExtraBytes => write!(f, "Extra bytes at end of message"),
            DriverError::ProtocolValue(what) => {
                write!(f, "Invalid protocol value: {}", what)
            }
            DriverError::UnexpectedPacket => write!(f, "Unexpected packet"),
            DriverError::UnknownAuthPlugin(ref name) => {
                write!(f, "Unknown authentication protocol: `{}`", name)
            }
            DriverError::AuthPluginRequiresSecureConnection(ref name) => write!(
                f,
                "Authentication protocol `{}` requires a secure connection",
                name
            ),
            DriverError::TlsNotSupported => write!(
                f,
                "Client requires secure connection but server \
                 does not have this capability"
            ),
            DriverError::PoolTimeout => write!(f, "Could not get a connection: pool timeout"),
            DriverError::PoisonedPoolMutex => write!(f, "Poisoned pool mutex"),
            DriverError::Cancelled => {
                write!(f, "Command was cancelled mid-flight; connection is unusable")
            }
            DriverError::ResultNotConsumed => {
                write!(f, "Resultset of the previous command is not fully consumed")
            }
            DriverError::ConnectionClosed => write!(f, "Connection is closed"),
            DriverError::MismatchedStmtParams(exp, prov) => write!(
                f,
                "Statement takes {} parameters but {} was supplied",
                exp, prov
            ),
            DriverError::InvalidPoolConstraints => write!(f, "Invalid pool constraints"),
            DriverError::CouldNotParseVersion => write!(f, "Could not parse MySQL version"),
        }
    }
}

impl fmt::Debug for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Server error codes shared by MySql and MariaDb (u16).
///
/// Flavor-specific ranges are left to the raw code in [`MySqlError`].
#[allow(non_camel_case_types)]
#[derive(Clone, Eq, PartialEq, Debug, Copy)]
#[repr(u16)]
pub enum ServerError {
    ER_CON_COUNT_ERROR = 1040,
    ER_HANDSHAKE_ERROR = 1043,
    ER_DBACCESS_DENIED_ERROR = 1044,
    ER_ACCESS_DENIED_ERROR = 1045,
    ER_NO_DB_ERROR = 1046,
    ER_UNKNOWN_COM_ERROR = 1047,
    ER_BAD_DB_ERROR = 1049,
    ER_TABLE_EXISTS_ERROR = 1050,
    ER_BAD_TABLE_ERROR = 1051,
    ER_BAD_FIELD_ERROR = 1054,
    ER_DUP_ENTRY = 1062,
    ER_PARSE_ERROR = 1064,
    ER_NET_PACKET_TOO_LARGE = 1153,
    ER_NET_PACKETS_OUT_OF_ORDER = 1156,
    ER_NO_SUCH_TABLE = 1146,
    ER_TOO_MANY_USER_CONNECTIONS = 1203,
    ER_LOCK_WAIT_TIMEOUT = 1205,
    ER_LOCK_DEADLOCK = 1213,
    ER_NOT_SUPPORTED_AUTH_MODE = 1251,
    ER_UNSUPPORTED_PS = 1295,
    ER_QUERY_INTERRUPTED = 1317,
    ER_NO_DEFAULT_FOR_FIELD = 1364,
    ER_CANNOT_USER = 1396,
    ER_DATA_TOO_LONG = 1406,
    ER_ROW_IS_REFERENCED_2 = 1451,
    ER_NO_REFERENCED_ROW_2 = 1452,
    ER_MAX_PREPARED_STMT_COUNT_REACHED = 1461,
}

impl TryFrom<u16> for ServerError {
    type Error = u16;

    fn try_from(code: u16) -> result::Result<ServerError, u16> {
        match code {
            1040 => Ok(ServerError::ER_CON_COUNT_ERROR),
            1043 => Ok(ServerError::ER_HANDSHAKE_ERROR),
            1044 => Ok(ServerError::ER_DBACCESS_DENIED_ERROR),
            1045 => Ok(ServerError::ER_ACCESS_DENIED_ERROR),
            1046 => Ok(ServerError::ER_NO_DB_ERROR),
            1047 => Ok(ServerError::ER_UNKNOWN_COM_ERROR),
            1049 => Ok(ServerError::ER_BAD_DB_ERROR),
            1050 => Ok(ServerError::ER_TABLE_EXISTS_ERROR),
            1051 => Ok(ServerError::ER_BAD_TABLE_ERROR),
            1054 => Ok(ServerError::ER_BAD_FIELD_ERROR),
            1062 => Ok(ServerError::ER_DUP_ENTRY),
            1064 => Ok(ServerError::ER_PARSE_ERROR),
            1153 => Ok(ServerError::ER_NET_PACKET_TOO_LARGE),
            1156 => Ok(ServerError::ER_NET_PACKETS_OUT_OF_ORDER),
            1146 => Ok(ServerError::ER_NO_SUCH_TABLE),
            1203 => Ok(ServerError::ER_TOO_MANY_USER_CONNECTIONS),
            1205 => Ok(ServerError::ER_LOCK_WAIT_TIMEOUT),
            1213 => Ok(ServerError::ER_LOCK_DEADLOCK),
            1251 => Ok(ServerError::ER_NOT_SUPPORTED_AUTH_MODE),
            1295 => Ok(ServerError::ER_UNSUPPORTED_PS),
            1317 => Ok(ServerError::ER_QUERY_INTERRUPTED),
            1364 => Ok(ServerError::ER_NO_DEFAULT_FOR_FIELD),
            1396 => Ok(ServerError::ER_CANNOT_USER),
            1406 => Ok(ServerError::ER_DATA_TOO_LONG),
            1451 => Ok(ServerError::ER_ROW_IS_REFERENCED_2),
            1452 => Ok(ServerError::ER_NO_REFERENCED_ROW_2),
            1461 => Ok(ServerError::ER_MAX_PREPARED_STMT_COUNT_REACHED),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_map_common_server_errors() {
        let err = MySqlError {
            state: "23000".into(),
            message: "Duplicate entry '1' for key 'PRIMARY'".into(),
            code: 1062,
        };
        assert_eq!(err.common(), Some(ServerError::ER_DUP_ENTRY));

        let maria_specific = MySqlError {
            state: "HY000".into(),
            message: "flavor specific".into(),
            code: 1927,
        };
        assert_eq!(maria_specific.common(), None);
    }

    #[test]
    fn should_format_server_error() {
        let err = MySqlError {
            state: "HY000".into(),
            message: "No tables used".into(),
            code: 1096,
        };
        assert_eq!(format!("{}", err), "ERROR 1096 (HY000): No tables used");
    }

    #[test]
    fn error_should_implement_send_and_sync() {
        fn _dummy<T: Send + Sync>(_: T) {}
        _dummy(Error::DriverError(DriverError::PacketOutOfSync));
    }
}
