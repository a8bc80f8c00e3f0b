/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Discovery, metadata, and paginated data access over tabular/tree data
//! models (spec.md §4.7).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{ProbeError, ProbeResult};
use crate::framework::FrameworkObject;
use crate::registry::ObjectRegistry;
use crate::variant::Variant;

/// A tabular or tree data model exposed by the framework (e.g. a list/table/
/// tree model bound to a view).
pub trait DataModel: Send + Sync {
    fn class_name(&self) -> String;
    fn row_count(&self, parent_row: Option<i64>, parent_col: Option<i64>) -> i64;
    fn column_count(&self, parent_row: Option<i64>, parent_col: Option<i64>) -> i64;
    /// Role id -> role name, as the model declares them.
    fn role_names(&self) -> BTreeMap<i64, String>;
    fn has_children(&self, row: Option<i64>, col: Option<i64>) -> bool;
    fn data(&self, row: i64, col: i64, role: i64) -> Option<Variant>;
}

const DEFAULT_PAGE: usize = 100;

/// Standard role aliases recognized in addition to a model's own role
/// table (spec.md §4.7 "Role resolution").
const STANDARD_ROLE_ALIASES: &[(&str, i64)] = &[
    ("display", 0),
    ("decoration", 1),
    ("edit", 2),
    ("toolTip", 3),
    ("statusTip", 4),
    ("whatsThis", 5),
    ("font", 6),
    ("textAlignment", 7),
    ("background", 8),
    ("foreground", 9),
    ("checkState", 10),
    ("sizeHint", 11),
];

pub struct ModelSummary {
    pub object_id: String,
    pub class_name: String,
    pub row_count: i64,
    pub column_count: i64,
    pub role_names: BTreeMap<i64, String>,
}

pub struct ModelInfo {
    pub row_count: i64,
    pub column_count: i64,
    pub role_names: BTreeMap<i64, String>,
    pub has_children: bool,
    pub class_name: String,
}

/// One row: column index -> { role name -> value } (spec.md §4.7).
pub type ModelRow = BTreeMap<i64, BTreeMap<String, Variant>>;

pub struct ModelDataPage {
    pub rows: Vec<ModelRow>,
    pub total_rows: i64,
    pub total_columns: i64,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

pub struct ModelQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub roles: Option<Vec<RoleRef>>,
    pub parent_row: Option<i64>,
    pub parent_col: Option<i64>,
}

#[derive(Debug, Clone)]
pub enum RoleRef {
    Id(i64),
    Name(String),
}

pub struct ModelNavigator;

impl ModelNavigator {
    /// Walks the registry, keeping polymorphically-tabular/tree objects and
    /// skipping the framework's own internal models by class-name filter.
    pub fn list_models(registry: &ObjectRegistry) -> Vec<ModelSummary> {
        registry
            .all_objects()
            .into_iter()
            .filter_map(|(id, obj)| {
                if obj.class_name().contains("Internal") {
                    return None;
                }
                let model = Arc::clone(&obj).as_data_model()?;
                Some(ModelSummary {
                    object_id: id,
                    class_name: model.class_name(),
                    row_count: model.row_count(None, None),
                    column_count: model.column_count(None, None),
                    role_names: model.role_names(),
                })
            })
            .collect()
    }

    pub fn get_model_info(model: &Arc<dyn DataModel>) -> ModelInfo {
        ModelInfo {
            row_count: model.row_count(None, None),
            column_count: model.column_count(None, None),
            role_names: model.role_names(),
            has_children: model.has_children(None, None),
            class_name: model.class_name(),
        }
    }

    /// Smart pagination: no explicit limit and total rows <= 100 returns
    /// everything; otherwise the first (or requested) page of 100.
    pub fn get_model_data(model: &Arc<dyn DataModel>, query: ModelQuery) -> ProbeResult<ModelDataPage> {
        let total_rows = model.row_count(query.parent_row, query.parent_col);
        let total_columns = model.column_count(query.parent_row, query.parent_col);

        let offset = query.offset.unwrap_or(0);
        let limit = match query.limit {
            Some(l) => l,
            None if (total_rows as usize) <= DEFAULT_PAGE => total_rows as usize,
            None => DEFAULT_PAGE,
        };

        let role_names = model.role_names();
        let resolved_roles = resolve_roles(&role_names, query.roles.as_deref())?;

        let mut rows = Vec::new();
        let end = (offset + limit).min(total_rows.max(0) as usize);
        for row in offset..end {
            let mut row_map: ModelRow = BTreeMap::new();
            for col in 0..total_columns {
                let mut col_map = BTreeMap::new();
                for &role_id in &resolved_roles {
                    if let Some(value) = model.data(row as i64, col, role_id) {
                        let role_name = role_names.get(&role_id).cloned().unwrap_or_else(|| role_id.to_string());
                        col_map.insert(role_name, value);
                    }
                }
                if !col_map.is_empty() {
                    row_map.insert(col, col_map);
                }
            }
            rows.push(row_map);
        }

        Ok(ModelDataPage {
            has_more: offset + rows.len() < total_rows.max(0) as usize,
            rows,
            total_rows,
            total_columns,
            offset,
            limit,
        })
    }

    /// View-to-model resolution: (1) model cast, (2) item-view cast to its
    /// bound model (spec.md §4.7). The reference backend has no distinct
    /// item-view type and no variant form for model-valued properties, so
    /// the third fallback (`model`-named property lookup) has nothing to
    /// resolve to here; a real toolkit binding implements it by exposing
    /// the bound model through `as_data_model` on the view object itself.
    pub fn resolve_model(obj: &Arc<dyn FrameworkObject>) -> Option<Arc<dyn DataModel>> {
        Arc::clone(obj).as_data_model()
    }
}

fn resolve_roles(
    role_names: &BTreeMap<i64, String>,
    requested: Option<&[RoleRef]>,
) -> ProbeResult<Vec<i64>> {
    let Some(requested) = requested else {
        return Ok(role_names.keys().copied().collect());
    };
    requested
        .iter()
        .map(|r| match r {
            RoleRef::Id(id) => Ok(*id),
            RoleRef::Name(name) => role_names
                .iter()
                .find(|(_, n)| *n == name)
                .map(|(id, _)| *id)
                .or_else(|| {
                    STANDARD_ROLE_ALIASES
                        .iter()
                        .find(|(alias, _)| alias == name)
                        .map(|(_, id)| *id)
                })
                .ok_or_else(|| ProbeError::RoleNotFound {
                    role: name.clone(),
                    available: role_names.values().cloned().collect(),
                }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refbackend::ListModel;

    fn model_with_rows(n: i64) -> Arc<dyn DataModel> {
        Arc::new(ListModel::with_rows(n))
    }

    #[test]
    fn no_limit_under_100_returns_all_rows() {
        let model = model_with_rows(42);
        let page = ModelNavigator::get_model_data(
            &model,
            ModelQuery {
                offset: None,
                limit: None,
                roles: None,
                parent_row: None,
                parent_col: None,
            },
        )
        .unwrap();
        assert_eq!(page.rows.len(), 42);
        assert!(!page.has_more);
    }

    #[test]
    fn no_limit_over_100_returns_first_page() {
        let model = model_with_rows(150);
        let page = ModelNavigator::get_model_data(
            &model,
            ModelQuery {
                offset: None,
                limit: None,
                roles: None,
                parent_row: None,
                parent_col: None,
            },
        )
        .unwrap();
        assert_eq!(page.rows.len(), 100);
        assert_eq!(page.total_rows, 150);
        assert!(page.has_more);

        let page2 = ModelNavigator::get_model_data(
            &model,
            ModelQuery {
                offset: Some(100),
                limit: Some(100),
                roles: None,
                parent_row: None,
                parent_col: None,
            },
        )
        .unwrap();
        assert_eq!(page2.rows.len(), 50);
        assert!(!page2.has_more);
    }

    #[test]
    fn unknown_role_name_lists_available() {
        let model = model_with_rows(1);
        let err = ModelNavigator::get_model_data(
            &model,
            ModelQuery {
                offset: None,
                limit: None,
                roles: Some(vec![RoleRef::Name("bogus".into())]),
                parent_row: None,
                parent_col: None,
            },
        )
        .unwrap_err();
        match err {
            ProbeError::RoleNotFound { role, available } => {
                assert_eq!(role, "bogus");
                assert!(!available.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
