use crate::{
    marshal::{key_values, Marshaller},
    store::{DocumentStore, MutationRequest},
    types::Value,
    write::{
        CopyFetch, DirectPlan, InsertPlan, NestedRowWrite, PullPlan, ResolvedCopy, Result,
        WritePlan,
    },
};
use bson::Bson;

/// The result of running a write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteOutcome {
    /// Rows inserted, updated or removed. Direct writes count top-level
    /// documents, nested writes count nested rows.
    pub affected: u64,
    /// The key the store assigned to the last inserted row.
    pub generated_key: Option<Value>,
    /// Follow-up steps that failed after the main mutation succeeded.
    pub warnings: Vec<String>,
}

impl WriteOutcome {
    fn warn(&mut self, warning: String) {
        tracing::warn!(%warning, "write completed with a warning");
        self.warnings.push(warning);
    }
}

/// Runs a `WritePlan` against a store.
pub struct WriteExecutor<'s> {
    store: &'s dyn DocumentStore,
}

impl<'s> WriteExecutor<'s> {
    pub fn new(store: &'s dyn DocumentStore) -> Self {
        Self { store }
    }

    fn marshaller(&self) -> Marshaller<'s> {
        Marshaller::new(self.store.large_objects())
    }

    pub fn execute(&self, plan: &WritePlan) -> Result<WriteOutcome> {
        let mut outcome = WriteOutcome::default();
        match plan {
            WritePlan::Insert(p) => self.insert(p, &mut outcome)?,
            WritePlan::Direct(p) => self.direct(p, &mut outcome)?,
            WritePlan::Pull(p) => self.pull(p, &mut outcome)?,
            WritePlan::Nested(p) => self.nested(p, &mut outcome)?,
        }
        tracing::debug!(affected = outcome.affected, "executed write");
        Ok(outcome)
    }

    fn resolve_copies(
        &self,
        fetches: &[CopyFetch],
        outcome: &mut WriteOutcome,
    ) -> Result<Vec<ResolvedCopy>> {
        let mut resolved = vec![];
        for fetch in fetches {
            let document = match &fetch.source {
                None => None,
                Some((collection, filter)) => {
                    let found = self.store.find_one(collection, filter.clone())?;
                    if found.is_none() {
                        outcome.warn(format!(
                            "no row of '{collection}' matches {filter}, '{}' is left empty",
                            fetch.field
                        ));
                    }
                    found.map(|mut d| {
                        d.remove("_id");
                        d
                    })
                }
            };
            resolved.push(ResolvedCopy {
                field: fetch.field.clone(),
                document,
            });
        }
        Ok(resolved)
    }

    fn insert(&self, plan: &InsertPlan, outcome: &mut WriteOutcome) -> Result<()> {
        for row in &plan.rows {
            let copies = self.resolve_copies(&row.copies, outcome)?;
            let mutation = row.mutation(&copies);
            let (n, id) = mutation.apply(self.store)?;
            if n == 0 {
                outcome.warn(format!(
                    "no parent row in '{}' holds the new row of '{}'",
                    mutation.collection(),
                    plan.table
                ));
            }
            outcome.affected += n;
            // the row is stored by now, so a key of the wrong shape only warns
            if let (Some((column, ty)), Some(id)) = (&plan.generated_key, id) {
                match self.marshaller().from_store_value(&id, ty) {
                    Ok(key) => outcome.generated_key = Some(key),
                    Err(e) => outcome.warn(format!(
                        "the key generated for '{}'.'{column}' cannot be returned: {e}",
                        plan.table
                    )),
                }
            }
        }
        Ok(())
    }

    fn direct(&self, plan: &DirectPlan, outcome: &mut WriteOutcome) -> Result<()> {
        let copies = self.resolve_copies(&plan.copies, outcome)?;
        // the keys are read first: a removal leaves nothing to read afterwards
        let keys = match &plan.propagation {
            Some(p) => self
                .store
                .aggregate(&p.key_query.collection, p.key_query.pipeline.clone())?
                .into_iter()
                .filter_map(|d| d.get("_id").cloned())
                .collect(),
            None => vec![],
        };
        let (n, _) = plan.mutation(&copies).apply(self.store)?;
        outcome.affected += n;

        let Some(propagation) = &plan.propagation else {
            return Ok(());
        };
        for key in &keys {
            let parts = match key_values(key, &propagation.key_columns) {
                Ok(parts) => parts,
                Err(e) => {
                    outcome.warn(format!(
                        "copies of '{}' keyed {key} were not refreshed: {e}",
                        plan.table
                    ));
                    continue;
                }
            };
            for patch in &propagation.patches {
                if let Err(e) = patch.mutation(&parts).apply(self.store) {
                    outcome.warn(format!(
                        "copies of '{}' in '{}' were not refreshed: {e}",
                        plan.table, patch.collection
                    ));
                }
            }
        }
        Ok(())
    }

    fn pull(&self, plan: &PullPlan, outcome: &mut WriteOutcome) -> Result<()> {
        let counted = self
            .store
            .aggregate(&plan.count_query.collection, plan.count_query.pipeline.clone())?;
        let removed = match counted.first().and_then(|d| d.get("n")) {
            Some(Bson::Int32(n)) => *n as u64,
            Some(Bson::Int64(n)) => *n as u64,
            _ => 0,
        };
        if removed > 0 {
            MutationRequest::Update(plan.mutation.clone()).apply(self.store)?;
        }
        outcome.affected += removed;
        Ok(())
    }

    fn nested(&self, plan: &NestedRowWrite, outcome: &mut WriteOutcome) -> Result<()> {
        let documents = self
            .store
            .aggregate(&plan.read.collection, plan.read.pipeline.clone())?;
        let copies = self.resolve_copies(&plan.copies, outcome)?;
        let completed = plan.complete(&documents, &copies, &self.marshaller())?;
        for mutation in &completed.mutations {
            let (n, _) = mutation.apply(self.store)?;
            if n == 0 {
                outcome.warn(format!(
                    "a document of '{}' changed while '{}' was being written",
                    plan.collection, plan.table
                ));
            }
        }
        outcome.affected += completed.affected;
        Ok(())
    }
}

/// Runs `plan` against `store`.
pub fn execute_write(plan: &WritePlan, store: &dyn DocumentStore) -> Result<WriteOutcome> {
    WriteExecutor::new(store).execute(plan)
}
