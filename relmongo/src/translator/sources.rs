use crate::{
    ast::{Expression, FromClause, JoinType, TableRef},
    document_map::{document_path, DocumentMap, DocumentMapContext, Hop},
    planner::MergePlanner,
    translator::{Error, Result},
};
use bson::bson;
use std::{
    collections::{BTreeSet, HashMap},
    rc::Rc,
};

/// A table of the FROM clause, placed inside the top-level document.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Source {
    /// The name column references qualify with.
    pub name: String,
    pub table: String,
    /// How to reach the table's rows from the top-level document.
    pub hops: Vec<Hop>,
    /// Rows may be absent, as on the inner side of an outer join.
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NormalizedJoin {
    /// Reference name of the table the join adds.
    pub name: String,
    pub outer: bool,
    pub condition: Option<Expression>,
    /// The joined rows are elements of a merged array.
    pub many: bool,
}

#[derive(Debug)]
pub(crate) struct Placement {
    /// The table whose collection the pipeline runs against.
    pub top: String,
    pub sources: Vec<Source>,
    pub joins: Vec<NormalizedJoin>,
    pub planner: MergePlanner,
}

fn same(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Rewrites the join list so that every join extends the rows on its left.
/// A RIGHT OUTER join is only accepted as the first join, where swapping its
/// sides turns it into a LEFT OUTER join.
fn normalize(from: &FromClause) -> Result<(Vec<(TableRef, bool)>, Vec<NormalizedJoin>)> {
    let mut tables = vec![(from.base.clone(), false)];
    let mut joins = vec![];
    for (i, join) in from.joins.iter().enumerate() {
        let outer = match join.join_type {
            JoinType::Inner => false,
            JoinType::LeftOuter => true,
            JoinType::RightOuter if i == 0 => {
                tables[0].1 = true;
                tables.push((join.table.clone(), false));
                joins.push(NormalizedJoin {
                    name: from.base.reference_name().to_string(),
                    outer: true,
                    condition: join.condition.clone(),
                    many: false,
                });
                continue;
            }
            JoinType::RightOuter => {
                return Err(Error::Unsupported(
                    "RIGHT OUTER JOIN after another join".to_string(),
                ))
            }
            JoinType::FullOuter => return Err(Error::Unsupported("FULL OUTER JOIN".to_string())),
            JoinType::Cross => return Err(Error::Unsupported("CROSS JOIN".to_string())),
        };
        tables.push((join.table.clone(), outer));
        joins.push(NormalizedJoin {
            name: join.table.reference_name().to_string(),
            outer,
            condition: join.condition.clone(),
            many: false,
        });
    }
    let mut seen = BTreeSet::new();
    for (table, _) in &tables {
        if !seen.insert(table.reference_name().to_lowercase()) {
            return Err(Error::DuplicateSource(table.reference_name().to_string()));
        }
    }
    Ok((tables, joins))
}

/// Places every FROM table inside one top-level document and plans the
/// existence filters, flattens and outer-join rewrites reading them needs.
pub(crate) fn place(ctx: &mut DocumentMapContext, from: &FromClause) -> Result<Placement> {
    let (tables, mut joins) = normalize(from)?;
    let maps = tables
        .iter()
        .map(|(t, _)| ctx.document(&t.name))
        .collect::<std::result::Result<Vec<Rc<DocumentMap>>, _>>()?;

    let not_colocated = || Error::NotColocated(tables.iter().map(|(t, _)| t.name.clone()).collect());

    let anchored: Vec<usize> = (0..tables.len())
        .filter(|i| !maps[*i].is_embeddable())
        .collect();
    let top = match anchored.first() {
        Some(first) => {
            let top = maps[*first].collection().to_string();
            if anchored.iter().any(|i| !same(maps[*i].collection(), &top)) {
                return Err(not_colocated());
            }
            top
        }
        None if tables.len() == 1 => maps[0].table().to_string(),
        None => return Err(not_colocated()),
    };

    let mut placed: Vec<Option<Vec<Hop>>> = maps
        .iter()
        .map(|m| {
            if !m.is_embeddable() {
                Some(m.hops())
            } else if same(m.table(), &top) {
                Some(vec![])
            } else {
                None
            }
        })
        .collect();

    // embeddable tables go under a placed table holding a copy of them
    while placed.iter().any(Option::is_none) {
        let mut progress = false;
        for i in 0..tables.len() {
            if placed[i].is_some() {
                continue;
            }
            let mentioned = join_partners(&joins, &tables[i].0);
            let mut candidates = vec![];
            for (j, hops) in placed.iter().enumerate() {
                let Some(hops) = hops else { continue };
                if let Some(details) = maps[j]
                    .embedded_keys()
                    .iter()
                    .find(|k| same(&k.embedded_table, maps[i].table()))
                {
                    let mut route = hops.clone();
                    route.push(Hop::embed(details.clone()));
                    let preferred = mentioned
                        .iter()
                        .any(|m| same(m, tables[j].0.reference_name()));
                    candidates.push((preferred, route));
                }
            }
            let choice = candidates
                .iter()
                .position(|(preferred, _)| *preferred)
                .or_else(|| (!candidates.is_empty()).then_some(0));
            if let Some(c) = choice {
                placed[i] = Some(candidates.swap_remove(c).1);
                progress = true;
            }
        }
        if !progress {
            return Err(not_colocated());
        }
    }

    let mut sources: Vec<Source> = tables
        .iter()
        .zip(maps.iter())
        .zip(placed)
        .map(|(((table, optional), map), hops)| Source {
            name: table.reference_name().to_string(),
            table: map.table().to_string(),
            hops: hops.unwrap_or_default(),
            optional: *optional,
        })
        .collect();

    let planner = plan_hops(&mut sources)?;
    for join in joins.iter_mut() {
        join.many = sources
            .iter()
            .find(|s| same(&s.name, &join.name))
            .and_then(|s| s.hops.last())
            .is_some_and(Hop::is_array);
    }
    Ok(Placement {
        top,
        sources,
        joins,
        planner,
    })
}

/// Reference names the join condition adding `table` mentions.
fn join_partners(joins: &[NormalizedJoin], table: &TableRef) -> Vec<String> {
    joins
        .iter()
        .filter(|j| same(&j.name, table.reference_name()))
        .filter_map(|j| j.condition.as_ref())
        .flat_map(|c| c.columns().into_iter().map(|c| c.table.clone()))
        .filter(|t| !same(t, table.reference_name()))
        .collect()
}

fn prefix_key(hops: &[Hop]) -> String {
    hops.iter().map(Hop::field).collect::<Vec<_>>().join(".")
}

/// Required hops are flattened or filtered for existence. Optional array hops
/// are read through an alias defaulting to one empty element, so rows without
/// a match survive the flatten.
fn plan_hops(sources: &mut [Source]) -> Result<MergePlanner> {
    let required: BTreeSet<String> = sources
        .iter()
        .filter(|s| !s.optional)
        .flat_map(|s| (1..=s.hops.len()).map(|k| prefix_key(&s.hops[..k])).collect::<Vec<_>>())
        .collect();

    let mut planner = MergePlanner::new();
    let mut aliased: HashMap<String, Hop> = HashMap::new();
    for source in sources.iter_mut() {
        for k in 0..source.hops.len() {
            let key = prefix_key(&source.hops[..=k]);
            if let Some(hop) = aliased.get(&key) {
                source.hops[k] = hop.clone();
                continue;
            }
            let hop = source.hops[k].clone();
            if required.contains(&key) {
                let path = document_path(&source.hops[..=k]);
                if hop.is_array() {
                    planner.add_array_flatten(&path);
                } else {
                    planner.add_existence_filter(&path);
                }
            } else if hop.is_array() {
                if source.hops[..k].iter().any(|h| h.details.alias.is_some()) {
                    return Err(Error::Unsupported(format!(
                        "outer join onto the nested array '{key}'"
                    )));
                }
                let alias = format!("__{}", hop.field());
                let path = format!("${}", document_path(&source.hops[..=k]));
                // a missing, null or empty array still yields one unmatched row
                planner.add_projection_fragment(
                    bson!({ "$cond": [
                        { "$gt": [{ "$size": { "$ifNull": [path.clone(), []] } }, 0] },
                        path,
                        [{}],
                    ]}),
                    &alias,
                );
                planner.add_array_flatten(&alias);
                let rewritten = Hop {
                    kind: hop.kind,
                    details: hop.details.with_alias(alias),
                };
                aliased.insert(key, rewritten.clone());
                source.hops[k] = rewritten;
            }
        }
    }
    Ok(planner)
}
