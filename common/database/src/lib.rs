use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Error as SqlxError,
};

/// Build a Postgres connection pool.
///
/// Connections are checked before being handed out, so a database that went away
/// between requests surfaces as an error on the next acquire instead of a stale socket.
pub async fn get_pool(url: &str, max_connections: u32) -> Result<PgPool, SqlxError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .test_before_acquire(true)
        .connect(url)
        .await
}

/// Coarse classification of a failed database call, used for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Timeout,
    Transient,
    StringTooLong,
    ConstraintViolation,
    Other,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Timeout => "timeout",
            ErrorClass::Transient => "transient",
            ErrorClass::StringTooLong => "string_too_long",
            ErrorClass::ConstraintViolation => "constraint_violation",
            ErrorClass::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most specific class first: a statement timeout is also transient, but we want to see it as a timeout.
pub fn classify(error: &SqlxError) -> ErrorClass {
    if is_timeout_error(error) {
        ErrorClass::Timeout
    } else if is_string_too_long_error(error) {
        ErrorClass::StringTooLong
    } else if is_constraint_violation(error) {
        ErrorClass::ConstraintViolation
    } else if is_transient_error(error) {
        ErrorClass::Transient
    } else {
        ErrorClass::Other
    }
}

fn sqlstate(error: &SqlxError) -> Option<String> {
    match error {
        SqlxError::Database(db_error) => db_error.code().map(|code| code.into_owned()),
        _ => None,
    }
}

/// A value did not fit its column, e.g. a `VARCHAR(255)` overflow.
/// 22001 = string_data_right_truncation
/// See: https://www.postgresql.org/docs/current/errcodes-appendix.html
pub fn is_string_too_long_error(error: &SqlxError) -> bool {
    match sqlstate(error) {
        Some(code) => code == "22001",
        None => match error {
            SqlxError::Database(db_error) => db_error
                .message()
                .to_lowercase()
                .contains("value too long for type"),
            _ => false,
        },
    }
}

/// Class 23: Integrity Constraint Violation (not null, unique, check, foreign key).
pub fn is_constraint_violation(error: &SqlxError) -> bool {
    match sqlstate(error) {
        Some(code) => code.starts_with("23"),
        None => match error {
            SqlxError::Database(db_error) => {
                let msg = db_error.message().to_lowercase();
                msg.contains("violates") && msg.contains("constraint")
            }
            _ => false,
        },
    }
}

pub fn is_timeout_error(error: &SqlxError) -> bool {
    match error {
        SqlxError::PoolTimedOut => true,
        SqlxError::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
        SqlxError::Protocol(msg) => msg.to_lowercase().contains("timeout"),
        SqlxError::Database(db_error) => match db_error.code() {
            // 57014: query_canceled, 55P03: lock_not_available,
            // 25P03: idle_in_transaction_session_timeout
            Some(code) => matches!(&*code, "57014" | "55P03" | "25P03"),
            None => {
                let msg = db_error.message().to_lowercase();
                msg.contains("timeout") || msg.contains("canceling")
            }
        },
        _ => false,
    }
}

/// Connectivity and resource problems that would likely go away on their own.
pub fn is_transient_error(error: &SqlxError) -> bool {
    match error {
        SqlxError::Io(_) | SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Tls(_) => {
            true
        }
        SqlxError::Database(db_error) => match db_error.code() {
            // 08 connection exception, 53 insufficient resources,
            // 57 operator intervention, 58 system error, 40P01 deadlock
            Some(code) => {
                let code = code.as_ref();
                ["08", "53", "57", "58"]
                    .iter()
                    .any(|class| code.starts_with(class))
                    || code == "40001"
                    || code == "40P01"
            }
            None => {
                let msg = db_error.message().to_lowercase();
                msg.contains("connection") || msg.contains("timed out") || msg.contains("deadlock")
            }
        },
        SqlxError::Protocol(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("connection") || msg.contains("timeout")
        }
        _ => false,
    }
}
