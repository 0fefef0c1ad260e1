use dialectic::compile_temporal_filter;
use dialectic::ir::{Moment, SemanticType, TemporalFilter, TemporalLiteral, TimestampUnit};
use dialectic::Options;
use insta::assert_snapshot;
use rstest::rstest;

fn lower(dialect: &str, ty: &SemanticType, filter: &TemporalFilter) -> String {
    let options = Options::default().with_dialect(dialect);
    compile_temporal_filter("t", ty, filter, &options).unwrap()
}

fn in_quarter() -> TemporalFilter {
    TemporalFilter::In {
        moment: Moment::Literal(TemporalLiteral::new("2024-Q2", Some(TimestampUnit::Quarter))),
        not: false,
    }
}

#[rstest]
#[case::duckdb("duckdb")]
#[case::mysql("mysql")]
#[case::postgres("postgres")]
#[case::redshift("redshift")]
#[case::trino("trino")]
fn literal_quarter(#[case] dialect: &str) {
    assert_eq!(
        lower(dialect, &SemanticType::Timestamp, &in_quarter()),
        "t >= TIMESTAMP '2024-04-01 00:00:00' AND t < TIMESTAMP '2024-07-01 00:00:00'"
    );
}

#[test]
fn snowflake_literal() {
    assert_snapshot!(
        lower("snowflake", &SemanticType::Timestamp, &in_quarter()),
        @"t >= '2024-04-01 00:00:00'::TIMESTAMP_NTZ AND t < '2024-07-01 00:00:00'::TIMESTAMP_NTZ"
    );
}

#[test]
fn filter_errors() {
    let options = Options::default().with_dialect("duckdb");
    let error =
        compile_temporal_filter("t", &SemanticType::String, &in_quarter(), &options).unwrap_err();
    assert_snapshot!(
        error.inner[0].reason,
        @"temporal filter expected a date or timestamp, but found string"
    );

    let options = Options::default().with_dialect("sqlite");
    let error = compile_temporal_filter("t", &SemanticType::Timestamp, &in_quarter(), &options)
        .unwrap_err();
    assert_eq!(error.inner[0].code.as_deref(), Some("E0301"));
}

#[test]
fn options_timezone() {
    let today = TemporalFilter::In {
        moment: Moment::Today,
        not: false,
    };
    let options = Options::default()
        .with_dialect("postgres")
        .with_timezone("America/New_York");
    let sql = compile_temporal_filter("t", &SemanticType::Timestamp, &today, &options).unwrap();
    assert!(sql.contains("AT TIME ZONE 'America/New_York'"), "{sql}");

    // the native timezone needs no conversion
    let options = Options::default().with_dialect("postgres").with_timezone("UTC");
    assert_eq!(
        compile_temporal_filter("t", &SemanticType::Timestamp, &today, &options).unwrap(),
        lower("postgres", &SemanticType::Timestamp, &today)
    );
}

#[rstest]
#[case::in_last(TemporalFilter::InLast { n: 3, unit: TimestampUnit::Week, not: false })]
#[case::ago(TemporalFilter::After { moment: Moment::Ago { n: 2, unit: TimestampUnit::Month }, not: true })]
#[case::literal(in_quarter())]
fn filters_are_deterministic(#[case] filter: TemporalFilter) {
    for dialect in dialectic::registry().unwrap().names() {
        for timezone in [None, Some("Asia/Tokyo")] {
            let mut options = Options::default().with_dialect(&dialect);
            options.timezone = timezone.map(str::to_string);
            let first = compile_temporal_filter("t", &SemanticType::Timestamp, &filter, &options);
            let second = compile_temporal_filter("t", &SemanticType::Timestamp, &filter, &options);
            assert_eq!(
                first.map_err(|e| e.to_string()),
                second.map_err(|e| e.to_string()),
                "{dialect} {timezone:?}"
            );
        }
    }
}
