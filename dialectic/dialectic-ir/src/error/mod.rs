use std::fmt::Debug;

use serde::Serialize;

mod test;

/// A dialectic error. Used internally, exposed as dialectic::ErrorMessage.
#[derive(Debug, Clone)]
pub struct Error {
    /// Message kind. Warnings are used for degraded code paths.
    pub kind: MessageKind,
    pub reason: Reason,
    pub hints: Vec<String>,
    /// Machine readable identifier error code eg, "E0101"
    pub code: Option<&'static str>,
}

/// Multiple dialectic errors. Used internally, exposed as dialectic::ErrorMessages.
#[derive(Debug, Clone)]
pub struct Errors(pub Vec<Error>);

/// Compile message kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    Error,
    Warning,
    Lint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    Simple(String),
    Expected {
        who: Option<String>,
        expected: String,
        found: String,
    },
    Unexpected {
        found: String,
    },
    NotFound {
        name: String,
        namespace: String,
    },
    Bug {
        issue: Option<i32>,
        details: Option<String>,
    },
    /// The selected backend has no equivalent for a requested construct.
    UnsupportedFeature {
        dialect: String,
        feature: String,
    },
    /// Building the merged function catalog failed.
    Catalog {
        function: String,
        detail: String,
    },
    UnknownDialect {
        name: String,
    },
    NotImplemented {
        feature: String,
    },
}

pub const CODE_UNSUPPORTED: &str = "E0101";
pub const CODE_CATALOG: &str = "E0201";
pub const CODE_UNKNOWN_DIALECT: &str = "E0301";
pub const CODE_NOT_IMPLEMENTED: &str = "E0401";

impl Error {
    pub fn new(reason: Reason) -> Self {
        Error {
            kind: MessageKind::Error,
            reason,
            hints: Vec::new(),
            code: None,
        }
    }

    pub fn new_simple<S: ToString>(reason: S) -> Self {
        Error::new(Reason::Simple(reason.to_string()))
    }

    pub fn new_bug(issue_no: i32) -> Self {
        Error::new(Reason::Bug {
            issue: Some(issue_no),
            details: None,
        })
    }

    /// Used for things that you *think* should never happen, but are not sure.
    pub fn new_assert<S: ToString>(details: S) -> Self {
        Error::new(Reason::Bug {
            issue: None,
            details: Some(details.to_string()),
        })
    }

    pub fn unsupported<D: ToString, F: ToString>(dialect: D, feature: F) -> Self {
        Error::new(Reason::UnsupportedFeature {
            dialect: dialect.to_string(),
            feature: feature.to_string(),
        })
        .with_code(CODE_UNSUPPORTED)
    }

    pub fn catalog<N: ToString, D: ToString>(function: N, detail: D) -> Self {
        Error::new(Reason::Catalog {
            function: function.to_string(),
            detail: detail.to_string(),
        })
        .with_code(CODE_CATALOG)
    }

    pub fn unknown_dialect<S: ToString>(name: S) -> Self {
        Error::new(Reason::UnknownDialect {
            name: name.to_string(),
        })
        .with_code(CODE_UNKNOWN_DIALECT)
    }

    pub fn not_implemented<S: ToString>(feature: S) -> Self {
        Error::new(Reason::NotImplemented {
            feature: feature.to_string(),
        })
        .with_code(CODE_NOT_IMPLEMENTED)
    }

    /// A non-fatal diagnostic; the caller keeps the result it was attached to.
    pub fn new_warning<S: ToString>(reason: S) -> Self {
        Error {
            kind: MessageKind::Warning,
            ..Error::new_simple(reason)
        }
    }

    /// A query that compiles but probably doesn't mean what it says.
    pub fn new_lint<S: ToString>(reason: S) -> Self {
        Error {
            kind: MessageKind::Lint,
            ..Error::new_simple(reason)
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::Simple(text) => f.write_str(text),
            Reason::Expected {
                who,
                expected,
                found,
            } => {
                if let Some(who) = who {
                    write!(f, "{who} ")?;
                }
                write!(f, "expected {expected}, but found {found}")
            }
            Reason::Unexpected { found } => write!(f, "unexpected {found}"),
            Reason::NotFound { name, namespace } => write!(f, "{namespace} `{name}` not found"),
            Reason::Bug { issue, details } => {
                write!(f, "internal compiler error")?;
                if let Some(details) = details {
                    write!(f, "; {details}")?;
                }
                if let Some(issue_no) = issue {
                    write!(f, "; tracked as issue #{issue_no}")?;
                }
                Ok(())
            }
            Reason::UnsupportedFeature { dialect, feature } => {
                write!(f, "{feature} is not supported by dialect `{dialect}`")
            }
            Reason::Catalog { function, detail } => {
                write!(f, "cannot build function catalog: `{function}`: {detail}")
            }
            Reason::UnknownDialect { name } => write!(f, "unknown dialect `{name}`"),
            Reason::NotImplemented { feature } => write!(f, "{feature} is not implemented"),
        }
    }
}

impl From<Error> for Errors {
    fn from(error: Error) -> Self {
        Errors(vec![error])
    }
}

// Needed for anyhow
impl std::error::Error for Error {}

// Needed for anyhow
impl std::error::Error for Errors {}

// Needed for StdError
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self, f)
    }
}

// Needed for StdError
impl std::fmt::Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self, f)
    }
}

pub trait WithErrorInfo: Sized {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self;

    fn with_hints<S: Into<String>, I: IntoIterator<Item = S>>(self, hints: I) -> Self;

    fn with_code(self, code: &'static str) -> Self;
}

impl WithErrorInfo for Error {
    fn push_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.hints.push(hint.into());
        self
    }

    fn with_hints<S: Into<String>, I: IntoIterator<Item = S>>(mut self, hints: I) -> Self {
        self.hints = hints.into_iter().map(|x| x.into()).collect();
        self
    }

    fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }
}

impl<T, E: WithErrorInfo> WithErrorInfo for Result<T, E> {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self {
        self.map_err(|e| e.push_hint(hint))
    }

    fn with_hints<S: Into<String>, I: IntoIterator<Item = S>>(self, hints: I) -> Self {
        self.map_err(|e| e.with_hints(hints))
    }

    fn with_code(self, code: &'static str) -> Self {
        self.map_err(|e| e.with_code(code))
    }
}
