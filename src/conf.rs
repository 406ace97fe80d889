/*!
A parser for an INI file with the following structure:

```ini
[Connection]
uri=tcp:0.0.0.0:6653

[Table]
id=0

; the flows installed for learned host pairs
[Flows]
idle_timeout=10
hard_timeout=0
priority=10

[Session]
table_features=false

[Buffers]
max_idle=64
```

Every section and every key is optional, missing ones take the values shown.
*/

use crate::openflow::buffer_pool::DEFAULT_MAX_IDLE;
use crate::openflow::messages::OFP_TCP_PORT;

use ini::ini;
use ini::Ini;

use std::error;
use std::fmt;
use std::io;
use std::net::*;
use std::str::FromStr;

const CONN_SECTION: &str = "Connection";
const URI_KEY: &str = "uri";

const TABLE_SECTION: &str = "Table";
const ID_KEY: &str = "id";

const FLOWS_SECTION: &str = "Flows";
const IDLE_TIMEOUT_KEY: &str = "idle_timeout";
const HARD_TIMEOUT_KEY: &str = "hard_timeout";
const PRIORITY_KEY: &str = "priority";

const SESSION_SECTION: &str = "Session";
const TABLE_FEATURES_KEY: &str = "table_features";

const BUFFERS_SECTION: &str = "Buffers";
const MAX_IDLE_KEY: &str = "max_idle";

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Ini(ini::Error),
    InvalidEntry(&'static str, &'static str, String),
    InvalidUri,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "{}", e),
            Error::Ini(ref e) => write!(f, "{}", e),
            Error::InvalidEntry(s, k, ref v) => {
                write!(f, "The INI [{}] section has an invalid value '{}' for '{}'", s, v, k)
            }
            Error::InvalidUri => write!(f, "The OpenFlow Connection URI from INI file is invalid"),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(ioe) => ioe,
            _ => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl error::Error for Error {}

trait Section {
    type S;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error>;
}

/// Reads `key` from `section`, falling back to `default` if the section or key is missing
fn entry<T: FromStr>(
    conf: &Ini,
    section: &'static str,
    key: &'static str,
    default: T,
) -> Result<T, Error> {
    let value = conf
        .section(Some(section.to_owned()))
        .and_then(|s| s.get(key));
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| Error::InvalidEntry(section, key, v.to_string())),
        None => Ok(default),
    }
}

/// Where to listen for switches. Only plain TCP is supported.
#[derive(Debug, PartialEq)]
pub struct OfConnection {
    pub socket: SocketAddr,
}

impl Section for OfConnection {
    type S = OfConnection;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        debug!("Reading [{}] section", CONN_SECTION);
        entry(conf, CONN_SECTION, URI_KEY, OfConnection::default())
            .map_err(|_| Error::InvalidUri)
    }
}

impl FromStr for OfConnection {
    type Err = Error;

    fn from_str(conn: &str) -> Result<OfConnection, Self::Err> {
        let def_port = OFP_TCP_PORT.to_string();
        let addr = match conn.find(':') {
            Some(i) if &conn[..i] == "tcp" => &conn[i + 1..],
            _ => return Err(Error::InvalidUri),
        };
        // a bare IPv4 address or a bracketed IPv6 address without port
        let with_port = if addr.ends_with(']') || !addr.contains(':') {
            format!("{}:{}", addr, def_port)
        }
        else {
            addr.to_owned()
        };
        let socket = SocketAddr::from_str(&with_port).map_err(|_| Error::InvalidUri)?;
        let connection = OfConnection { socket };
        debug!("Got {:?}", connection);
        Ok(connection)
    }
}

impl Default for OfConnection {
    fn default() -> Self {
        let socket_v4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, OFP_TCP_PORT);
        OfConnection {
            socket: SocketAddr::V4(socket_v4),
        }
    }
}

/// The OpenFlow table all flows are installed in
#[derive(Debug, PartialEq)]
pub struct OfTable {
    pub id: u8,
}

impl Section for OfTable {
    type S = OfTable;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        debug!("Reading [{}] section", TABLE_SECTION);
        let table = OfTable {
            id: entry(conf, TABLE_SECTION, ID_KEY, 0)?,
        };
        debug!("Got {:?}", table);
        Ok(table)
    }
}

impl Default for OfTable {
    fn default() -> Self {
        OfTable { id: 0 }
    }
}

/// Parameters of the flows that connect two learned hosts
#[derive(Debug, PartialEq)]
pub struct FlowSettings {
    /// Seconds without a matching packet before the switch removes the flow
    pub idle_timeout: u16,
    /// Seconds before the switch removes the flow in any case, 0 for never
    pub hard_timeout: u16,
    /// Has to be above the table-miss flow's priority of 0
    pub priority: u16,
}

impl Section for FlowSettings {
    type S = FlowSettings;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        debug!("Reading [{}] section", FLOWS_SECTION);
        let def = FlowSettings::default();
        let flows = FlowSettings {
            idle_timeout: entry(conf, FLOWS_SECTION, IDLE_TIMEOUT_KEY, def.idle_timeout)?,
            hard_timeout: entry(conf, FLOWS_SECTION, HARD_TIMEOUT_KEY, def.hard_timeout)?,
            priority: entry(conf, FLOWS_SECTION, PRIORITY_KEY, def.priority)?,
        };
        if flows.priority == 0 {
            return Err(Error::InvalidEntry(FLOWS_SECTION, PRIORITY_KEY, "0".to_owned()));
        }
        debug!("Got {:?}", flows);
        Ok(flows)
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        FlowSettings {
            idle_timeout: 10,
            hard_timeout: 0,
            priority: 10,
        }
    }
}

/// Optional requests of the handshake
#[derive(Debug, Default, PartialEq)]
pub struct SessionSettings {
    /// Ask the switch for its table features once the handshake is done
    pub table_features: bool,
}

impl Section for SessionSettings {
    type S = SessionSettings;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        debug!("Reading [{}] section", SESSION_SECTION);
        Ok(SessionSettings {
            table_features: entry(conf, SESSION_SECTION, TABLE_FEATURES_KEY, false)?,
        })
    }
}

#[derive(Debug, PartialEq)]
pub struct BufferSettings {
    /// Released buffers kept for reuse
    pub max_idle: usize,
}

impl Section for BufferSettings {
    type S = BufferSettings;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        debug!("Reading [{}] section", BUFFERS_SECTION);
        Ok(BufferSettings {
            max_idle: entry(conf, BUFFERS_SECTION, MAX_IDLE_KEY, DEFAULT_MAX_IDLE)?,
        })
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        BufferSettings {
            max_idle: DEFAULT_MAX_IDLE,
        }
    }
}

/// The complete configuration
#[derive(Debug, Default, PartialEq)]
pub struct Config {
    pub connection: OfConnection,
    pub table: OfTable,
    pub flows: FlowSettings,
    pub session: SessionSettings,
    pub buffers: BufferSettings,
}

impl Config {
    fn from_ini(conf: &Ini) -> Result<Config, Error> {
        Ok(Config {
            connection: OfConnection::from_ini(conf)?,
            table: OfTable::from_ini(conf)?,
            flows: FlowSettings::from_ini(conf)?,
            session: SessionSettings::from_ini(conf)?,
            buffers: BufferSettings::from_ini(conf)?,
        })
    }
}

pub fn parse_file(path: &str) -> Result<Config, Error> {
    info!("Reading INI file {}", path);

    let conf = match Ini::load_from_file(path) {
        Ok(i) => i,
        Err(e) => {
            return Err(Error::Ini(e));
        }
    };
    Config::from_ini(&conf)
}
