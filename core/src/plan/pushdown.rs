//! Folds existence and aggregate directives into the root query.

use crate::error::{HydrateError, Result};
use crate::query::{
    Aggregate, AggregateColumn, DirectiveMode, EagerLoadDirective, Filter, QuerySpec, Subquery,
    Via,
};
use crate::registry::{Hop, Registry};
use crate::relation::RelationKind;

/// The executor-facing root query of `spec`.
///
/// Exists/missing directives become `[NOT] EXISTS` filters, count and
/// aggregate directives become computed columns, and the local keys of
/// top-level eager loads are added to a narrowed projection. The lock mode
/// is kept as is.
pub(crate) fn root_spec(registry: &Registry, spec: &QuerySpec) -> Result<QuerySpec> {
    let mut root = QuerySpec {
        directives: Vec::new(),
        ..spec.clone()
    };

    for directive in &spec.directives {
        let hops = registry.relation(&spec.entity, &directive.path)?;
        match &directive.mode {
            DirectiveMode::Load => root.ensure_column(hops[0].relation.local_key()),
            DirectiveMode::ExistsOnly | DirectiveMode::Missing => {
                root.filters.push(Filter::Exists {
                    subquery: Box::new(exists_chain(&hops, directive)?),
                    negated: directive.mode == DirectiveMode::Missing,
                });
            }
            DirectiveMode::CountOnly | DirectiveMode::AggregateOnly { .. } => {
                root.aggregates.push(aggregate_column(&hops, directive)?);
            }
        }
    }
    Ok(root)
}

/// Computed column of a count or aggregate directive on a direct relation.
pub(crate) fn aggregate_column(
    hops: &[Hop<'_>],
    directive: &EagerLoadDirective,
) -> Result<AggregateColumn> {
    let (function, column) = match &directive.mode {
        DirectiveMode::CountOnly => (Aggregate::Count, None),
        DirectiveMode::AggregateOnly { function, column } => (*function, Some(column.clone())),
        _ => return Err(HydrateError::invalid_directive(&directive.path, "not an aggregate")),
    };
    let [hop] = hops else {
        return Err(HydrateError::invalid_directive(
            &directive.path,
            "aggregates are only supported on direct relations",
        ));
    };
    let alias = directive
        .aggregate_alias()
        .ok_or_else(|| HydrateError::invalid_directive(&directive.path, "missing alias"))?;

    Ok(AggregateColumn {
        alias,
        function,
        column,
        subquery: correlate(hop, directive_filters(directive)),
    })
}

/// Nested correlated subqueries, one per hop; the directive's filters sit
/// on the innermost one.
fn exists_chain(hops: &[Hop<'_>], directive: &EagerLoadDirective) -> Result<Subquery> {
    let Some((last, outer)) = hops.split_last() else {
        return Err(HydrateError::invalid_directive(&directive.path, "empty relation path"));
    };
    let mut subquery = correlate(last, directive_filters(directive));
    for hop in outer.iter().rev() {
        subquery = correlate(
            hop,
            vec![Filter::Exists {
                subquery: Box::new(subquery),
                negated: false,
            }],
        );
    }
    Ok(subquery)
}

fn directive_filters(directive: &EagerLoadDirective) -> Vec<Filter> {
    directive.filters.iter().cloned().map(Filter::from).collect()
}

/// Subquery over the hop's target correlated with the source row.
fn correlate(hop: &Hop<'_>, filters: Vec<Filter>) -> Subquery {
    let relation = hop.relation;
    let via = match relation.kind() {
        RelationKind::BelongsToMany(pivot) => Some(Via {
            table: pivot.table.clone(),
            parent_key: pivot.source_key.clone(),
            key: pivot.target_key.clone(),
        }),
        RelationKind::HasManyThrough(through) => Some(Via {
            table: hop
                .through
                .map_or_else(|| through.entity.clone(), |e| e.table().into()),
            parent_key: through.first_key.clone(),
            key: through.second_key.clone(),
        }),
        RelationKind::BelongsTo
        | RelationKind::HasOne
        | RelationKind::HasMany
        | RelationKind::MorphMany(_) => None,
    };

    let mut all: Vec<Filter> = relation.implicit_filters().map(Filter::from).collect();
    all.extend(filters);

    Subquery {
        relation: relation.name().into(),
        table: hop.target.table().into(),
        key: relation.foreign_key().into(),
        parent_key: relation.local_key().into(),
        via,
        filters: all,
    }
}
