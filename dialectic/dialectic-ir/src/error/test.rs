#[cfg(test)]
mod tests {
    use insta::{assert_debug_snapshot, assert_snapshot};

    use crate::error::{Error, Errors, MessageKind, Reason, WithErrorInfo};

    fn create_simple_error() -> Error {
        Error::new_simple("A simple error message")
            .push_hint("take a hint")
            .with_code("E001")
    }

    #[test]
    fn display() {
        assert_snapshot!(create_simple_error(),
            @r###"Error { kind: Error, reason: Simple("A simple error message"), hints: ["take a hint"], code: Some("E001") }"###
        );

        let errors = Errors(vec![create_simple_error()]);
        assert_snapshot!(errors,
            @r###"Errors([Error { kind: Error, reason: Simple("A simple error message"), hints: ["take a hint"], code: Some("E001") }])"###
        );
    }

    #[test]
    fn reasons() {
        assert_snapshot!(
            Error::unsupported("redshift", "safe cast").reason,
            @"safe cast is not supported by dialect `redshift`"
        );
        assert_snapshot!(
            Error::catalog("f", "no base overload matches f(string)").reason,
            @"cannot build function catalog: `f`: no base overload matches f(string)"
        );
        assert_snapshot!(Error::unknown_dialect("oracle").reason, @"unknown dialect `oracle`");
        assert_snapshot!(
            Error::not_implemented("last monday").reason,
            @"last monday is not implemented"
        );
        assert_snapshot!(Error::new_assert("oops").reason, @"internal compiler error; oops");
    }

    #[test]
    fn codes() {
        assert_eq!(Error::unsupported("mysql", "x").code, Some("E0101"));
        assert_eq!(Error::catalog("f", "x").code, Some("E0201"));
        assert_eq!(Error::unknown_dialect("x").code, Some("E0301"));
        assert_eq!(Error::not_implemented("x").code, Some("E0401"));
    }

    #[test]
    fn warning() {
        let warning = Error::new_warning("bounded");
        assert_eq!(warning.kind, MessageKind::Warning);
        assert_eq!(warning.reason, Reason::Simple("bounded".to_string()));
    }

    #[test]
    fn test_error_with_hints_on_result() {
        let result: Result<(), Error> = Err(Error::new_simple("failed"));
        let err = result
            .with_hints(vec!["first", "second"])
            .with_code("E002")
            .unwrap_err();
        assert_debug_snapshot!(err, @r###"
        Error {
            kind: Error,
            reason: Simple(
                "failed",
            ),
            hints: [
                "first",
                "second",
            ],
            code: Some(
                "E002",
            ),
        }
        "###);
    }
}
