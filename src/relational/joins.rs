//! Turning materialized join steps into `JOIN` clauses.

use crate::filter::JoinStep;
use crate::schema::{EntitySchema, JoinKey};
use crate::sql::{table_col, ExprExt, JoinType, Query, TableRef};

/// Append one `JOIN` per step (two for a link table) to `query`.
///
/// Direct keys join `target AS alias ON parent.local = alias.remote`.
/// Secondary keys first join the link table on `parent.local =
/// link.local_ref`, then the target on `alias.remote = link.remote_ref`.
pub fn apply(mut query: Query, root: &EntitySchema, steps: &[JoinStep]) -> Query {
    for step in steps {
        let hop = &step.alias.hop;
        let parent = step.parent.as_deref().unwrap_or(&root.table);
        let alias = step.alias.name.as_str();
        let join_type = if step.outer {
            JoinType::Left
        } else {
            JoinType::Inner
        };
        let target = TableRef::new(&hop.target.table)
            .with_schema(hop.target.schema.as_deref())
            .with_alias(alias);

        match &hop.relationship.join {
            JoinKey::Direct { local, remote } => {
                let on = table_col(parent, local).eq(table_col(alias, remote));
                query = query.join(join_type, target, on);
            }
            JoinKey::Secondary {
                table,
                local,
                local_ref,
                remote_ref,
                remote,
            } => {
                let link = step.alias.link.as_deref().unwrap_or(table);
                let link_table = TableRef::new(table)
                    .with_schema(hop.parent.schema.as_deref())
                    .with_alias(link);
                let on = table_col(parent, local).eq(table_col(link, local_ref));
                query = query.join(join_type, link_table, on);
                let on = table_col(alias, remote).eq(table_col(link, remote_ref));
                query = query.join(join_type, target, on);
            }
        }
    }
    query
}
