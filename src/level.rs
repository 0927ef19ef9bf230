//! Status classification and severity routing for call records.
//!
//! `error → code → level` is a fixed policy: the call logger never chooses a
//! severity on its own. [`level_logf`] then routes the chosen level to the
//! matching [`Entry`] method.

use std::{error::Error, fmt};

use tonic::{Code, Status};

use crate::logger::Entry;

/// Log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    /// Logged, then the process exits.
    Fatal,
    /// Logged, then the current thread panics.
    Panic,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Panic => "panic",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a call outcome as a gRPC status code.
///
/// `None` is [`Code::Ok`]. Otherwise the error and its source chain are
/// searched for a [`Status`]; the first one found supplies the code. Errors
/// that carry no status are [`Code::Unknown`].
pub fn error_to_code(err: Option<&(dyn Error + 'static)>) -> Code {
    let Some(err) = err else {
        return Code::Ok;
    };

    std::iter::successors(Some(err), |&e| e.source())
        .find_map(|e| e.downcast_ref::<Status>())
        .map_or(Code::Unknown, Status::code)
}

/// Severity for a client call that finished with `code`.
///
/// Success is informational. Outcomes usually caused by the request or by a
/// transient server condition are warnings; outcomes that point at a server
/// bug or data loss are errors.
pub fn code_to_level(code: Code) -> Level {
    match code {
        Code::Ok => Level::Info,
        Code::Cancelled
        | Code::InvalidArgument
        | Code::DeadlineExceeded
        | Code::NotFound
        | Code::AlreadyExists
        | Code::PermissionDenied
        | Code::ResourceExhausted
        | Code::FailedPrecondition
        | Code::Aborted
        | Code::OutOfRange
        | Code::Unavailable
        | Code::Unauthenticated => Level::Warning,
        _ => Level::Error,
    }
}

/// Canonical gRPC name of a status code, as used in the `grpc.code` field.
pub fn code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "Canceled",
        Code::Unknown => "Unknown",
        Code::InvalidArgument => "InvalidArgument",
        Code::DeadlineExceeded => "DeadlineExceeded",
        Code::NotFound => "NotFound",
        Code::AlreadyExists => "AlreadyExists",
        Code::PermissionDenied => "PermissionDenied",
        Code::ResourceExhausted => "ResourceExhausted",
        Code::FailedPrecondition => "FailedPrecondition",
        Code::Aborted => "Aborted",
        Code::OutOfRange => "OutOfRange",
        Code::Unimplemented => "Unimplemented",
        Code::Internal => "Internal",
        Code::Unavailable => "Unavailable",
        Code::DataLoss => "DataLoss",
        Code::Unauthenticated => "Unauthenticated",
    }
}

/// Log `args` on `entry` at `level`.
pub fn level_logf(entry: &Entry<'_>, level: Level, args: fmt::Arguments<'_>) {
    match level {
        Level::Debug => entry.debug(args),
        Level::Info => entry.info(args),
        Level::Warning => entry.warning(args),
        Level::Error => entry.error(args),
        Level::Fatal => entry.fatal(args),
        Level::Panic => entry.panic(args),
    }
}
