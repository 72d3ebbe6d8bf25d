//! Redaction wrapper for sensitive values in logs.
//!
//! Bearer tokens and resource locations are credentials in the WHIP/WHEP world. Anyone
//! holding the resource location can tear down the session. When the `pii` feature is
//! enabled, values wrapped in `Pii` format as `{REDACTED}`.
//!
//! Use it for debug, info, warn and error logs. Trace logs are expected to be disabled
//! in production and may show the raw value.

use core::fmt;
use core::ops::Deref;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Pii<T>(pub T);

impl<T: fmt::Display> fmt::Display for Pii<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if cfg!(feature = "pii") {
            write!(f, "{{REDACTED}}")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Pii<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if cfg!(feature = "pii") {
            write!(f, "{{REDACTED}}")
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

impl<T> Deref for Pii<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
