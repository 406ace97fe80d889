use std::error;
use std::fmt;
use std::io;
use std::result;

/// Everything that can go wrong while serving a switch connection.
///
/// `is_fatal` decides whether the session has to be torn down
/// or whether only the offending message is dropped.
#[derive(Debug)]
pub enum Error {
    /// The socket failed
    Io(io::Error),
    /// A length or bounds violation while decoding
    MalformedMessage(&'static str),
    /// The switch does not speak OpenFlow 1.4; carries its Hello version
    ProtocolMismatch(u8),
    /// A packet-in that no installed flow of ours can have sent
    UnhandledFlowCookie(u64),
    /// A message type this controller does not implement
    UnhandledMessageType(u8),
    /// A message with a version other than the negotiated one
    BadVersion(u8),
}

impl Error {
    /// Checks if the session has to be closed on this error
    pub fn is_fatal(&self) -> bool {
        match *self {
            Error::Io(_) | Error::MalformedMessage(_) | Error::ProtocolMismatch(_) => true,
            Error::UnhandledFlowCookie(_)
            | Error::UnhandledMessageType(_)
            | Error::BadVersion(_) => false,
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "{}", e),
            Error::MalformedMessage(context) => write!(f, "Malformed message: {}", context),
            Error::ProtocolMismatch(v) => write!(
                f,
                "The connected switch does not support OpenFlow 1.4 (Hello version {:#x})",
                v
            ),
            Error::UnhandledFlowCookie(c) => {
                write!(f, "Packet-in from a flow with unknown cookie {:#x}", c)
            }
            Error::UnhandledMessageType(t) => write!(f, "Cannot interpret message of type {}", t),
            Error::BadVersion(v) => write!(f, "Message with unexpected version {:#x}", v),
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (&Error::Io(ref a), &Error::Io(ref b)) => a.kind() == b.kind(),
            (&Error::MalformedMessage(a), &Error::MalformedMessage(b)) => a == b,
            (&Error::ProtocolMismatch(a), &Error::ProtocolMismatch(b)) => a == b,
            (&Error::UnhandledFlowCookie(a), &Error::UnhandledFlowCookie(b)) => a == b,
            (&Error::UnhandledMessageType(a), &Error::UnhandledMessageType(b)) => a == b,
            (&Error::BadVersion(a), &Error::BadVersion(b)) => a == b,
            _ => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
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

pub type Result<T> = result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality() {
        assert!(Error::MalformedMessage("x").is_fatal());
        assert!(Error::ProtocolMismatch(4).is_fatal());
        assert!(Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "x")).is_fatal());
        assert!(!Error::UnhandledFlowCookie(7).is_fatal());
        assert!(!Error::UnhandledMessageType(99).is_fatal());
        assert!(!Error::BadVersion(4).is_fatal());
    }

    #[test]
    fn into_io_error() {
        let e: io::Error = Error::MalformedMessage("packet in").into();
        assert_eq!(io::ErrorKind::InvalidData, e.kind());
        assert_eq!("Malformed message: packet in", e.to_string());
    }
}
