use crate::{
    ast::{ColumnRef, Delete, Expression, PrettyPrint, Update},
    catalog::Table,
    codegen::MqlCodeGenerator,
    document_map::{document_path, DocumentMap, FieldLocation, Hop},
    marshal::Marshaller,
    store::{AggregateRequest, MutationRequest, UpdateRequest},
    translator::{
        self, first_error, ElemMatch, ExpressionTranslator, MatchQuery, Mode, Scope, Source,
    },
    types::{RelationalType, Value},
    write::{
        add_operator, eval,
        insert::{column_name, literal},
        locator::{all_positions_path, copy_patches, CopyChange},
        row_info::RowInfo,
        write_copies, CopyFetch, DirectPlan, Error, Propagation, PullPlan, ResolvedCopy, Result,
        WritePlan, WriteTranslator,
    },
};
use bson::{bson, doc, Bson, Document};
use linked_hash_map::LinkedHashMap;
use std::rc::Rc;

/// What a nested-row write does to each matching row.
#[derive(Debug, Clone, PartialEq)]
pub enum NestedAction {
    /// Column values by field; NULL clears the field.
    Update(Vec<(String, Bson)>),
    Delete,
}

/// A column of the nested table and where its value is found.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedColumn {
    pub name: String,
    pub location: FieldLocation,
    pub ty: RelationalType,
}

/// An UPDATE or DELETE of merged rows, run in two phases: `read` fetches every
/// top-level document that may hold such rows, and `complete` selects the rows
/// locally and produces one corrective update per affected document.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedRowWrite {
    pub table: String,
    pub collection: String,
    pub hops: Vec<Hop>,
    pub read: AggregateRequest,
    pub filter: Option<Expression>,
    pub columns: Vec<NestedColumn>,
    pub action: NestedAction,
    pub copies: Vec<CopyFetch>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NestedMutations {
    pub mutations: Vec<MutationRequest>,
    /// The number of nested rows updated or removed.
    pub affected: u64,
}

impl NestedRowWrite {
    fn column_value(
        &self,
        row: &Rc<RowInfo>,
        c: &ColumnRef,
        marshaller: &Marshaller,
    ) -> Result<Value> {
        if !c.table.is_empty() && !c.table.eq_ignore_ascii_case(&self.table) {
            return Err(translator::Error::UnknownSource(c.table.clone()).into());
        }
        let column = self
            .columns
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(&c.column))
            .ok_or_else(|| Error::UnknownColumn {
                table: self.table.clone(),
                column: c.column.clone(),
            })?;
        match row.value_at(column.location.depth, &column.location.field) {
            Some(value) => Ok(marshaller.from_store_value(&value, &column.ty)?),
            None => Ok(Value::Null),
        }
    }

    /// Selects the rows of `documents` the filter matches and builds the
    /// updates applying the action to them, addressed by array position.
    pub fn complete(
        &self,
        documents: &[Document],
        copies: &[ResolvedCopy],
        marshaller: &Marshaller,
    ) -> Result<NestedMutations> {
        let mut out = NestedMutations::default();
        for document in documents {
            let Some(id) = document.get("_id").cloned() else {
                continue;
            };
            let top = RowInfo::top(self.collection.clone(), document.clone());
            let mut update = Document::new();
            // arrays losing elements, with the elements they keep
            let mut rewritten: LinkedHashMap<String, (Vec<Bson>, bool)> = LinkedHashMap::new();

            for row in RowInfo::walk(&top, &self.hops) {
                let matched = match &self.filter {
                    Some(filter) => {
                        eval::matches(filter, &|c: &ColumnRef| {
                            self.column_value(&row, c, marshaller)
                        })?
                    }
                    None => true,
                };
                match (&self.action, row.index) {
                    (NestedAction::Update(fields), _) if matched => {
                        out.affected += 1;
                        let position = row.positional_path();
                        for (field, value) in fields {
                            let path = format!("{position}.{field}");
                            match value {
                                Bson::Null => add_operator(&mut update, "$unset", path, bson!("")),
                                v => add_operator(&mut update, "$set", path, v.clone()),
                            }
                        }
                        write_copies(&mut update, &position, copies);
                    }
                    (NestedAction::Update(_), _) => {}
                    (NestedAction::Delete, Some(_)) => {
                        let entry = rewritten
                            .entry(row.container_path())
                            .or_insert_with(|| (vec![], false));
                        if matched {
                            out.affected += 1;
                            entry.1 = true;
                        } else {
                            entry.0.push(Bson::Document(row.row.clone()));
                        }
                    }
                    (NestedAction::Delete, None) if matched => {
                        out.affected += 1;
                        add_operator(&mut update, "$unset", row.positional_path(), bson!(""));
                    }
                    (NestedAction::Delete, None) => {}
                }
            }

            for (path, (kept, changed)) in rewritten {
                if changed {
                    add_operator(&mut update, "$set", path, Bson::Array(kept));
                }
            }
            if !update.is_empty() {
                out.mutations.push(MutationRequest::Update(
                    UpdateRequest::new(self.collection.clone(), doc! { "_id": id }, update)
                        .single(),
                ));
            }
        }
        Ok(out)
    }
}

impl<'a, 'c> WriteTranslator<'a, 'c> {
    /// Translates a WHERE clause over `table` into a match query. Columns are
    /// resolved below the top-level document, or relative to one nested row
    /// in `Mode::Element`.
    fn translate_filter(
        &mut self,
        map: &DocumentMap,
        filter: Option<&Expression>,
        mode: Mode,
    ) -> Result<Option<MatchQuery>> {
        let Some(filter) = filter else {
            return Ok(None);
        };
        let hops = map.hops();
        let mut translator = ExpressionTranslator::new(
            &mut self.ctx,
            map.collection().to_string(),
            vec![Source {
                name: map.table().to_string(),
                table: map.table().to_string(),
                hops,
                optional: false,
            }],
            self.marshaller,
            self.options,
            mode,
        );
        let results = filter
            .clone()
            .conjuncts()
            .iter()
            .map(|c| {
                if c.contains_aggregate() {
                    return Err(translator::Error::AggregateNotAllowed(c.pretty_print()));
                }
                translator.translate_filter(c, Scope::Raw)
            })
            .collect::<Vec<_>>();
        Ok(MatchQuery::all(first_error(results)?))
    }

    fn standalone_filter(
        &mut self,
        map: &DocumentMap,
        filter: Option<&Expression>,
    ) -> Result<Document> {
        Ok(self
            .translate_filter(map, filter, Mode::Standalone)?
            .map(|q| MqlCodeGenerator.codegen_match_query(q))
            .unwrap_or_default())
    }

    /// Column assignments of an UPDATE, as constants keyed by column name.
    fn assignments(
        &self,
        table: &Table,
        map: &DocumentMap,
        update: &Update,
    ) -> Result<Vec<(String, Value)>> {
        let inherited: &[String] = map.merge_key().map_or(&[][..], |k| k.columns.as_slice());
        update
            .assignments
            .iter()
            .map(|a| {
                let column = column_name(table, &a.column)?;
                if table.is_primary_key_column(&column) {
                    return Err(Error::PrimaryKeyUpdate(column));
                }
                if inherited.iter().any(|c| c.eq_ignore_ascii_case(&column)) {
                    return Err(Error::Unsupported(format!(
                        "moving a row of '{}' to another parent through '{column}'",
                        table.name
                    )));
                }
                Ok((column, literal(&a.value)?))
            })
            .collect()
    }

    /// Copies to refresh because an UPDATE assigns the referencing columns.
    fn refreshed_copies(
        &mut self,
        map: &DocumentMap,
        assigned: &[(String, Value)],
    ) -> Result<Vec<CopyFetch>> {
        let mut refreshed = vec![];
        for embed in map.embedded_keys() {
            let values = embed
                .columns
                .iter()
                .filter_map(|c| assigned.iter().find(|(a, _)| a.eq_ignore_ascii_case(c)))
                .collect::<Vec<_>>();
            if values.is_empty() {
                continue;
            }
            if values.len() != embed.columns.len() {
                return Err(Error::Unsupported(format!(
                    "partial update of the reference '{}'",
                    embed.name
                )));
            }
            if values.iter().any(|(_, v)| v.is_null()) {
                refreshed.push(CopyFetch {
                    field: embed.embedded_table.clone(),
                    source: None,
                });
            }
        }
        // only references assigned in full produce a fetch
        refreshed.extend(self.copy_fetches(map, assigned)?);
        Ok(refreshed)
    }

    fn propagation(
        &mut self,
        map: &DocumentMap,
        filter: &Document,
        change: CopyChange,
    ) -> Result<Option<Propagation>> {
        if !map.is_embeddable() || !self.options.propagate_copies || map.copy_targets().is_empty()
        {
            return Ok(None);
        }
        let patches = copy_patches(&mut self.ctx, map, &change)?;
        Ok(Some(Propagation {
            key_query: AggregateRequest {
                collection: map.collection().to_string(),
                pipeline: vec![
                    doc! { "$match": filter.clone() },
                    doc! { "$project": { "_id": 1 } },
                ],
            },
            key_columns: map.primary_key().to_vec(),
            patches,
        }))
    }

    pub(crate) fn translate_update(&mut self, update: &Update) -> Result<WritePlan> {
        let table = self.ctx.table(&update.table)?;
        let map = self.ctx.document(&table.name)?;
        let assigned = self.assignments(table, &map, update)?;
        if assigned.is_empty() {
            return Err(Error::Unsupported("UPDATE without assignments".to_string()));
        }
        let copies = self.refreshed_copies(&map, &assigned)?;
        let fields = assigned
            .iter()
            .map(|(column, value)| -> Result<(String, Bson)> {
                Ok((column.clone(), self.marshaller.to_store_value(value)?))
            })
            .collect::<Result<Vec<_>>>()?;

        if map.is_merged() {
            return self.nested(&map, update.filter.as_ref(), NestedAction::Update(fields), copies);
        }

        let filter = self.standalone_filter(&map, update.filter.as_ref())?;
        let mut set = Document::new();
        let mut unset = Document::new();
        for (column, value) in &fields {
            match value {
                Bson::Null => unset.insert(column.clone(), ""),
                v => set.insert(column.clone(), v.clone()),
            };
        }
        let mut changes = Document::new();
        if !set.is_empty() {
            changes.insert("$set", set);
        }
        if !unset.is_empty() {
            changes.insert("$unset", unset);
        }
        let copied_fields = fields
            .iter()
            .filter(|(column, _)| !table.is_primary_key_column(column))
            .cloned()
            .collect();
        let propagation = self.propagation(&map, &filter, CopyChange::Set(copied_fields))?;
        Ok(WritePlan::Direct(DirectPlan {
            table: table.name.clone(),
            mutation: MutationRequest::Update(UpdateRequest::new(
                map.collection(),
                filter,
                changes,
            )),
            copies,
            propagation,
        }))
    }

    pub(crate) fn translate_delete(&mut self, delete: &Delete) -> Result<WritePlan> {
        let table = self.ctx.table(&delete.table)?;
        let map = self.ctx.document(&table.name)?;
        if !map.is_merged() {
            let filter = self.standalone_filter(&map, delete.filter.as_ref())?;
            let propagation = self.propagation(&map, &filter, CopyChange::Unset)?;
            return Ok(WritePlan::Direct(DirectPlan {
                table: table.name.clone(),
                mutation: MutationRequest::Remove {
                    collection: map.collection().to_string(),
                    filter,
                },
                copies: vec![],
                propagation,
            }));
        }

        let many = map.hops().last().is_some_and(Hop::is_array);
        if many && self.options.pull_fast_path {
            match self.translate_filter(&map, delete.filter.as_ref(), Mode::Element) {
                Ok(condition) => return Ok(WritePlan::Pull(self.pull(&map, delete, condition)?)),
                Err(Error::Translator(translator::Error::NotElementLocal(column))) => {
                    tracing::debug!(
                        table = %table.name,
                        %column,
                        "predicate reads outside the nested row, rewriting arrays"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.nested(&map, delete.filter.as_ref(), NestedAction::Delete, vec![])
    }

    fn pull(
        &mut self,
        map: &DocumentMap,
        delete: &Delete,
        condition: Option<MatchQuery>,
    ) -> Result<PullPlan> {
        let hops = map.hops();
        let array = document_path(&hops);
        let filter = match &condition {
            Some(q) => MqlCodeGenerator.codegen_match_query(MatchQuery::ElemMatch(ElemMatch {
                input: array.clone(),
                condition: Box::new(q.clone()),
            })),
            // `$[]` fails on documents where the array is missing
            None => doc! { array.clone(): { "$exists": true } },
        };
        let mut pulled = Document::new();
        pulled.insert(
            all_positions_path(&hops),
            condition
                .map(|q| MqlCodeGenerator.codegen_match_query(q))
                .unwrap_or_default(),
        );

        let mut count = (1..=hops.len())
            .filter(|k| hops[k - 1].is_array())
            .map(|k| doc! { "$unwind": format!("${}", document_path(&hops[..k])) })
            .collect::<Vec<_>>();
        let full_filter = self.standalone_filter(map, delete.filter.as_ref())?;
        if !full_filter.is_empty() {
            count.push(doc! { "$match": full_filter });
        }
        count.push(doc! { "$count": "n" });

        Ok(PullPlan {
            table: map.table().to_string(),
            count_query: AggregateRequest {
                collection: map.collection().to_string(),
                pipeline: count,
            },
            mutation: UpdateRequest::new(map.collection(), filter, doc! { "$pull": pulled }),
        })
    }

    fn nested(
        &mut self,
        map: &DocumentMap,
        filter: Option<&Expression>,
        action: NestedAction,
        copies: Vec<CopyFetch>,
    ) -> Result<WritePlan> {
        let table = self.ctx.table(map.table())?;
        let hops = map.hops();
        let top = map.collection().to_string();
        let columns = table
            .columns
            .iter()
            .map(|c| -> Result<NestedColumn> {
                Ok(NestedColumn {
                    name: c.name.clone(),
                    location: self.ctx.locate_column(&top, &hops, &c.name)?,
                    ty: c.ty.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let mut read_filter = Document::new();
        read_filter.insert(document_path(&hops), doc! { "$exists": true });
        let mut projection = doc! { "_id": 1 };
        if let Some(first) = hops.first() {
            projection.insert(first.field(), 1);
        }
        Ok(WritePlan::Nested(NestedRowWrite {
            table: table.name.clone(),
            collection: top.clone(),
            hops,
            read: AggregateRequest {
                collection: top,
                pipeline: vec![doc! { "$match": read_filter }, doc! { "$project": projection }],
            },
            filter: filter.cloned(),
            columns,
            action,
            copies,
        }))
    }
}
