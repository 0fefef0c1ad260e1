use dialectic_ir::ir::{SemanticType, Unnest};

use super::gen_expr::render;
use super::Context;
use crate::dialect::UnnestSpec;
use crate::{Error, Reason, Result, WithErrorInfo};

/// Renders the join which iterates an array (or record) valued expression,
/// and registers its alias for the field references that read from it.
pub(super) fn gen_unnest(
    alias: &str,
    unnest: &Unnest,
    bound: u64,
    ctx: &mut Context,
) -> Result<String> {
    let dialect = ctx.dialect;
    if !dialect.supports_unnest() {
        return Err(Error::unsupported(dialect.name(), "unnesting arrays"));
    }

    let source = render(&unnest.source, ctx)?;
    let source = match &unnest.source.ty {
        SemanticType::Array(_) => source,
        SemanticType::Record(_) => dialect.singleton_array(&source),
        ty => {
            return Err(Error::new(Reason::Expected {
                who: Some(format!("unnest `{alias}`")),
                expected: "an array or a record".to_string(),
                found: ty.kind().to_string(),
            }))
        }
    };

    let spec = UnnestSpec {
        source: &source,
        alias,
        fields: &unnest.fields,
        needs_distinct_key: unnest.needs_distinct_key,
        array_of_scalars: unnest.array_of_scalars,
        in_nested_pipeline: unnest.in_nested_pipeline,
        bound,
    };
    let join = dialect.unnest(&spec)?;
    if let Some(caveat) = join.degraded {
        log::warn!("{caveat}");
        ctx.diagnostics.push(
            Error::new_warning(caveat)
                .push_hint(format!("the {} backend can't unnest natively", dialect.name())),
        );
    }

    ctx.unnests.insert(alias.to_string(), source);
    Ok(join.sql)
}
