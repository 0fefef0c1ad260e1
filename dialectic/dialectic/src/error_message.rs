use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};

use serde::Serialize;

use crate::{Error, Errors, MessageKind};

#[derive(Clone, PartialEq, Serialize)]
pub struct ErrorMessage {
    /// Error, or a warning about a degraded code path.
    pub kind: MessageKind,
    /// Machine-readable identifier of the error
    pub code: Option<String>,
    /// Plain text of the error
    pub reason: String,
    /// A list of suggestions of how to fix the error
    pub hints: Vec<String>,
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let code = (self.code.as_ref())
            .map(|c| format!("[{c}] "))
            .unwrap_or_default();
        let kind = match self.kind {
            MessageKind::Error => "Error",
            MessageKind::Warning => "Warning",
            MessageKind::Lint => "Lint",
        };

        writeln!(f, "{code}{kind}: {}", &self.reason)?;
        for hint in &self.hints {
            writeln!(f, "↳ Hint: {hint}")?;
        }
        Ok(())
    }
}

impl Debug for ErrorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self, f)
    }
}

impl From<Error> for ErrorMessage {
    fn from(e: Error) -> Self {
        log::debug!("{:#?}", e);
        ErrorMessage {
            code: e.code.map(str::to_string),
            kind: e.kind,
            reason: e.reason.to_string(),
            hints: e.hints,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMessages {
    pub inner: Vec<ErrorMessage>,
}
impl StdError for ErrorMessages {}

impl From<Vec<ErrorMessage>> for ErrorMessages {
    fn from(errors: Vec<ErrorMessage>) -> Self {
        ErrorMessages { inner: errors }
    }
}

impl From<ErrorMessage> for ErrorMessages {
    fn from(e: ErrorMessage) -> Self {
        ErrorMessages { inner: vec![e] }
    }
}

impl From<Error> for ErrorMessages {
    fn from(e: Error) -> Self {
        ErrorMessages {
            inner: vec![ErrorMessage::from(e)],
        }
    }
}

impl From<Errors> for ErrorMessages {
    fn from(errs: Errors) -> Self {
        ErrorMessages {
            inner: errs.0.into_iter().map(ErrorMessage::from).collect(),
        }
    }
}

impl Display for ErrorMessages {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for e in &self.inner {
            Display::fmt(&e, f)?;
        }
        Ok(())
    }
}

impl ErrorMessages {
    pub fn to_json(&self) -> String {
        // Serializing plain strings and unit enums can't fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use insta::assert_snapshot;

    use super::*;
    use crate::WithErrorInfo;

    #[test]
    fn test_display() {
        let messages = ErrorMessages::from(
            Error::unsupported("bigquery", "sampling by row count")
                .push_hint("sample by percent instead"),
        );
        assert_snapshot!(messages.to_string(), @r"
        [E0101] Error: sampling by row count is not supported by dialect `bigquery`
        ↳ Hint: sample by percent instead
        ");
    }

    #[test]
    fn test_to_json() {
        let messages = ErrorMessages::from(Error::unknown_dialect("oracle"));
        assert_snapshot!(
            messages.to_json(),
            @r#"{"inner":[{"kind":"Error","code":"E0301","reason":"unknown dialect `oracle`","hints":[]}]}"#
        );
    }

    #[test]
    fn test_warning() {
        let message = ErrorMessage::from(Error::new_warning("arrays are truncated"));
        assert_eq!(message.kind, MessageKind::Warning);
        assert_snapshot!(message.to_string(), @"Warning: arrays are truncated");
    }
}
