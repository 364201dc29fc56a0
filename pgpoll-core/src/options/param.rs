use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::Error;

/// The connection keywords accepted by [`ConnectOptions`](super::ConnectOptions).
///
/// Anything else is rejected before the driver is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum ConnectParam {
    Host,
    Hostaddr,
    Port,
    Dbname,
    User,
    Password,
    ConnectTimeout,
    ClientEncoding,
    Options,
    ApplicationName,
    FallbackApplicationName,
    Keepalives,
    KeepalivesIdle,
    KeepalivesInterval,
    KeepalivesCount,
    Tty,
    Sslmode,
    Requiressl,
    Sslcompression,
    Sslcert,
    Sslkey,
    Sslrootcert,
    Sslcrl,
    Requirepeer,
    Krbsrvname,
    Gsslib,
    Service,
}

impl ConnectParam {
    pub const ALL: &'static [ConnectParam] = &[
        ConnectParam::Host,
        ConnectParam::Hostaddr,
        ConnectParam::Port,
        ConnectParam::Dbname,
        ConnectParam::User,
        ConnectParam::Password,
        ConnectParam::ConnectTimeout,
        ConnectParam::ClientEncoding,
        ConnectParam::Options,
        ConnectParam::ApplicationName,
        ConnectParam::FallbackApplicationName,
        ConnectParam::Keepalives,
        ConnectParam::KeepalivesIdle,
        ConnectParam::KeepalivesInterval,
        ConnectParam::KeepalivesCount,
        ConnectParam::Tty,
        ConnectParam::Sslmode,
        ConnectParam::Requiressl,
        ConnectParam::Sslcompression,
        ConnectParam::Sslcert,
        ConnectParam::Sslkey,
        ConnectParam::Sslrootcert,
        ConnectParam::Sslcrl,
        ConnectParam::Requirepeer,
        ConnectParam::Krbsrvname,
        ConnectParam::Gsslib,
        ConnectParam::Service,
    ];

    /// The keyword as it appears in a conninfo string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectParam::Host => "host",
            ConnectParam::Hostaddr => "hostaddr",
            ConnectParam::Port => "port",
            ConnectParam::Dbname => "dbname",
            ConnectParam::User => "user",
            ConnectParam::Password => "password",
            ConnectParam::ConnectTimeout => "connect_timeout",
            ConnectParam::ClientEncoding => "client_encoding",
            ConnectParam::Options => "options",
            ConnectParam::ApplicationName => "application_name",
            ConnectParam::FallbackApplicationName => "fallback_application_name",
            ConnectParam::Keepalives => "keepalives",
            ConnectParam::KeepalivesIdle => "keepalives_idle",
            ConnectParam::KeepalivesInterval => "keepalives_interval",
            ConnectParam::KeepalivesCount => "keepalives_count",
            ConnectParam::Tty => "tty",
            ConnectParam::Sslmode => "sslmode",
            ConnectParam::Requiressl => "requiressl",
            ConnectParam::Sslcompression => "sslcompression",
            ConnectParam::Sslcert => "sslcert",
            ConnectParam::Sslkey => "sslkey",
            ConnectParam::Sslrootcert => "sslrootcert",
            ConnectParam::Sslcrl => "sslcrl",
            ConnectParam::Requirepeer => "requirepeer",
            ConnectParam::Krbsrvname => "krbsrvname",
            ConnectParam::Gsslib => "gsslib",
            ConnectParam::Service => "service",
        }
    }
}

impl Display for ConnectParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectParam {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        // `database` is accepted as a synonym
        if s == "database" {
            return Ok(ConnectParam::Dbname);
        }

        ConnectParam::ALL
            .iter()
            .copied()
            .find(|param| param.as_str() == s)
            .ok_or_else(|| err_config!("unexpected connection parameter {s:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectParam;

    #[test]
    fn it_round_trips_every_keyword() {
        for param in ConnectParam::ALL {
            assert_eq!(param.as_str().parse::<ConnectParam>().unwrap(), *param);
        }
    }

    #[test]
    fn it_accepts_database_as_dbname() {
        assert_eq!(
            "database".parse::<ConnectParam>().unwrap(),
            ConnectParam::Dbname
        );
    }

    #[test]
    fn it_rejects_unknown_keywords() {
        assert!("cursor_factory".parse::<ConnectParam>().is_err());
        assert!("Host".parse::<ConnectParam>().is_err());
        assert!("".parse::<ConnectParam>().is_err());
    }
}
