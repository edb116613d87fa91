//! Renders a translated `Pipeline` into aggregation stages, in the fixed
//! order: pre-stage nodes, the pre-match projection, `$match`, `$group`, the
//! HAVING `$match`, the final `$project`, `$sort`, `$skip` and `$limit`.

use crate::{
    planner::ProcessingNode,
    translator::{AccumulatorFunction, Group, GroupKeys, Pipeline, Project, ProjectItem, SortKey},
};
use bson::{doc, Bson, Document};

mod match_query;

#[cfg(test)]
mod test;

#[derive(Debug, Clone, Copy, Default)]
pub struct MqlCodeGenerator;

pub fn generate_pipeline(pipeline: Pipeline) -> Vec<Document> {
    MqlCodeGenerator.codegen_pipeline(pipeline)
}

impl MqlCodeGenerator {
    pub fn codegen_pipeline(&self, pipeline: Pipeline) -> Vec<Document> {
        let mut stages: Vec<Document> = pipeline
            .pre_stages
            .into_iter()
            .map(|n| self.codegen_processing_node(n))
            .collect();
        if let Some(project) = pipeline.pre_match_project {
            stages.push(doc! { "$project": self.codegen_project(project) });
        }
        if let Some(filter) = pipeline.filter {
            stages.push(doc! { "$match": self.codegen_match_query(filter) });
        }
        if let Some(group) = pipeline.group {
            stages.push(doc! { "$group": self.codegen_group(group) });
        }
        if let Some(having) = pipeline.having {
            stages.push(doc! { "$match": self.codegen_match_query(having) });
        }
        if let Some(project) = pipeline.project {
            stages.push(doc! { "$project": self.codegen_project(project) });
        }
        if !pipeline.sort.is_empty() {
            stages.push(doc! { "$sort": self.codegen_sort(pipeline.sort) });
        }
        if let Some(skip) = pipeline.skip {
            stages.push(doc! { "$skip": skip });
        }
        if let Some(limit) = pipeline.limit {
            stages.push(doc! { "$limit": limit });
        }
        stages
    }

    pub fn codegen_processing_node(&self, node: ProcessingNode) -> Document {
        match node {
            ProcessingNode::Exists { path } => {
                doc! { "$match": { path: { "$exists": true, "$ne": Bson::Null } } }
            }
            ProcessingNode::Unwind { path } => doc! { "$unwind": format!("${path}") },
            ProcessingNode::Project { fragments } => {
                let fields: Document = fragments.into_iter().collect();
                doc! { "$addFields": fields }
            }
        }
    }

    fn codegen_project(&self, project: Project) -> Document {
        let mut fields = Document::new();
        if project.exclude_id {
            fields.insert("_id", 0);
        }
        for (name, item) in project.fields {
            match item {
                ProjectItem::Include => fields.insert(name, 1),
                ProjectItem::Expression(e) => fields.insert(name, e),
            };
        }
        fields
    }

    fn codegen_group(&self, group: Group) -> Document {
        let id = match group.keys {
            GroupKeys::Null => Bson::Null,
            GroupKeys::Single(key) => key,
            GroupKeys::Compound(keys) => Bson::Document(keys.into_iter().collect()),
        };
        let mut fields = doc! { "_id": id };
        for acc in group.accumulators {
            let op = match acc.function {
                AccumulatorFunction::Sum => "$sum",
                AccumulatorFunction::Avg => "$avg",
                AccumulatorFunction::Min => "$min",
                AccumulatorFunction::Max => "$max",
            };
            fields.insert(acc.name, doc! { op: acc.arg });
        }
        fields
    }

    fn codegen_sort(&self, sort: Vec<SortKey>) -> Document {
        sort.into_iter()
            .map(|k| (k.path, Bson::Int32(if k.ascending { 1 } else { -1 })))
            .collect()
    }
}
