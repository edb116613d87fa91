use crate::{
    ast::{Expression, Insert, PrettyPrint},
    catalog::Table,
    document_map::{Association, DocumentMap},
    marshal::key_from_parts,
    types::Value,
    write::{
        locator::locate_parent, CopyFetch, Error, InsertPlan, InsertRow, InsertTarget, Result,
        WriteTranslator,
    },
};
use bson::{doc, Bson, Document};

/// The value assigned to `column`, if any. NULL counts as absent.
pub(crate) fn value_of<'v>(values: &'v [(String, Value)], column: &str) -> Option<&'v Value> {
    values
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(column))
        .map(|(_, v)| v)
        .filter(|v| !v.is_null())
}

pub(crate) fn literal(expr: &Expression) -> Result<Value> {
    match expr {
        Expression::Literal(v) => Ok(v.clone()),
        e => Err(Error::NonLiteralValue(e.pretty_print())),
    }
}

pub(crate) fn column_name(table: &Table, column: &str) -> Result<String> {
    table
        .get_column(column)
        .map(|c| c.name.clone())
        .ok_or_else(|| Error::UnknownColumn {
            table: table.name.clone(),
            column: column.to_string(),
        })
}

impl<'a, 'c> WriteTranslator<'a, 'c> {
    pub(crate) fn translate_insert(&mut self, insert: &Insert) -> Result<InsertPlan> {
        let table = self.ctx.table(&insert.table)?;
        let map = self.ctx.document(&table.name)?;
        let columns = insert
            .columns
            .iter()
            .map(|c| column_name(table, c))
            .collect::<Result<Vec<_>>>()?;

        let generated_key = table
            .generated_key_column()
            .filter(|c| !columns.iter().any(|n| n.eq_ignore_ascii_case(&c.name)))
            .map(|c| (c.name.clone(), c.ty.clone()));
        if generated_key.is_some() && map.is_merged() {
            return Err(Error::Unsupported(format!(
                "generated keys for the merged table '{}'",
                table.name
            )));
        }

        let mut rows = vec![];
        for row in &insert.rows {
            if row.len() != columns.len() {
                return Err(Error::ColumnCount {
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
            let values = columns
                .iter()
                .cloned()
                .zip(row.iter().map(literal).collect::<Result<Vec<_>>>()?)
                .collect::<Vec<_>>();
            rows.push(self.insert_row(&map, &values)?);
        }
        Ok(InsertPlan {
            table: table.name.clone(),
            rows,
            generated_key,
        })
    }

    fn insert_row(&mut self, map: &DocumentMap, values: &[(String, Value)]) -> Result<InsertRow> {
        let row = self.row_document(map, values)?;
        let copies = self.copy_fetches(map, values)?;
        let target = match map.merge_key() {
            None => InsertTarget::Collection(map.collection().to_string()),
            Some(merge) => {
                let key = merge
                    .columns
                    .iter()
                    .zip(merge.reference_columns.iter())
                    .map(|(column, referenced)| -> Result<(String, Bson)> {
                        let value = value_of(values, column)
                            .ok_or_else(|| Error::MissingParentKey(map.table().to_string()))?;
                        Ok((referenced.clone(), self.marshaller.to_store_value(value)?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let hops = map.hops();
                let parent_hops = &hops[..hops.len() - 1];
                let locator = locate_parent(&mut self.ctx, map.collection(), parent_hops, &key)?;
                let path = match locator.path.as_str() {
                    "" => map.table().to_string(),
                    p => format!("{p}.{}", map.table()),
                };
                InsertTarget::Parent {
                    collection: map.collection().to_string(),
                    filter: locator.filter,
                    path,
                    array_filters: locator.array_filters,
                    many: merge.association == Association::Many,
                }
            }
        };
        Ok(InsertRow {
            target,
            row,
            copies,
        })
    }

    /// The stored form of a row: its own key in `_id`, every other non-null
    /// column under its name. Merge-key columns are implied by the parent.
    fn row_document(&self, map: &DocumentMap, values: &[(String, Value)]) -> Result<Document> {
        let inherited: &[String] = map.merge_key().map_or(&[][..], |k| k.columns.as_slice());
        let id_columns = map.id_columns();
        let mut row = Document::new();
        if !id_columns.is_empty() {
            match id_columns
                .iter()
                .map(|c| value_of(values, c).cloned())
                .collect::<Option<Vec<_>>>()
            {
                Some(key) => {
                    row.insert("_id", self.marshaller.key_value(&id_columns, &key)?);
                }
                None if map.is_merged() => return Err(Error::MissingKey(map.table().to_string())),
                None => {}
            }
        }
        for (column, value) in values {
            let skip = value.is_null()
                || id_columns.iter().any(|c| c.eq_ignore_ascii_case(column))
                || inherited.iter().any(|c| c.eq_ignore_ascii_case(column));
            if !skip {
                row.insert(column.clone(), self.marshaller.to_store_value(value)?);
            }
        }
        Ok(row)
    }

    /// One fetch per embeddable table the row references with a complete key.
    pub(crate) fn copy_fetches(
        &mut self,
        map: &DocumentMap,
        values: &[(String, Value)],
    ) -> Result<Vec<CopyFetch>> {
        let mut fetches = vec![];
        for embed in map.embedded_keys() {
            let Some(parts) = embed
                .columns
                .iter()
                .map(|c| value_of(values, c))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            let referenced = self.ctx.document(&embed.embedded_table)?;
            let key_parts = referenced
                .primary_key()
                .iter()
                .map(|pk| -> Result<Bson> {
                    let i = embed
                        .reference_columns
                        .iter()
                        .position(|c| c.eq_ignore_ascii_case(pk))
                        .ok_or_else(|| {
                            Error::Unsupported(format!(
                                "reference '{}' does not use the primary key of '{}'",
                                embed.name, embed.embedded_table
                            ))
                        })?;
                    Ok(self.marshaller.to_store_value(parts[i])?)
                })
                .collect::<Result<Vec<_>>>()?;
            fetches.push(CopyFetch {
                field: embed.embedded_table.clone(),
                source: Some((
                    referenced.collection().to_string(),
                    doc! { "_id": key_from_parts(referenced.primary_key(), key_parts) },
                )),
            });
        }
        Ok(fetches)
    }
}
