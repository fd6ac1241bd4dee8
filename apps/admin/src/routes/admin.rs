//! Per-store record views.
//!
//! Every route resolves `{store}` through the registry and `{entity}` by
//! slug, then reads through a [`ReadOnlyView`](outlet_db::ReadOnlyView).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::StaffUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use outlet_db::{AdminEntity, ListPage, Permissions, RecordDetail};

#[derive(Debug, Serialize)]
pub struct ViewSummary {
    pub entity: AdminEntity,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    pub url: String,
    pub permissions: Permissions,
}

#[derive(Debug, Serialize)]
pub struct StoreSection {
    pub alias: String,
    pub name: String,
    pub views: Vec<ViewSummary>,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub site_header: String,
    pub site_title: String,
    pub index_title: String,
    pub media_url: String,
    pub stores: Vec<StoreSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub title: String,
    pub store: String,
    pub entity: AdminEntity,
    pub permissions: Permissions,
    #[serde(flatten)]
    pub page: ListPage,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub title: String,
    pub store: String,
    pub entity: AdminEntity,
    pub permissions: Permissions,
    #[serde(flatten)]
    pub record: RecordDetail,
}

pub async fn index(State(state): State<AppState>, StaffUser(_): StaffUser) -> Json<IndexResponse> {
    let views = state.registry.views();

    let stores = state
        .registry
        .stores()
        .map(|store| StoreSection {
            alias: store.alias.clone(),
            name: store.display_name.clone(),
            views: views
                .iter()
                .filter(|v| v.store().alias == store.alias)
                .map(|v| ViewSummary {
                    entity: v.entity(),
                    verbose_name: v.verbose_name(),
                    verbose_name_plural: v.verbose_name_plural(),
                    url: format!("/admin/{}/{}", store.alias, v.entity().slug()),
                    permissions: v.permissions(),
                })
                .collect(),
        })
        .collect();

    let site = &state.config.site;
    Json(IndexResponse {
        site_header: site.header.clone(),
        site_title: site.title.clone(),
        index_title: site.index_title.clone(),
        media_url: state.config.server.media_url.clone(),
        stores,
    })
}

pub async fn list(
    State(state): State<AppState>,
    StaffUser(claims): StaffUser,
    Path((store, entity)): Path<(String, String)>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse>> {
    let entity: AdminEntity = entity.parse()?;
    let view = state.registry.view(&store, entity)?;

    debug!(user = %claims.username, store = %store, entity = %entity, "List view");

    let page = view
        .list(
            params.page.unwrap_or(1),
            params.per_page.unwrap_or(state.config.server.page_size),
        )
        .await?;

    Ok(Json(ListResponse {
        title: view.verbose_name_plural(),
        store,
        entity,
        permissions: view.permissions(),
        page,
    }))
}

pub async fn detail(
    State(state): State<AppState>,
    StaffUser(claims): StaffUser,
    Path((store, entity, id)): Path<(String, String, i64)>,
) -> ApiResult<Json<DetailResponse>> {
    let entity: AdminEntity = entity.parse()?;
    let view = state.registry.view(&store, entity)?;

    debug!(user = %claims.username, store = %store, entity = %entity, id = id, "Detail view");

    let mut record = view.detail(id).await?;

    if entity == AdminEntity::Product {
        let product = state.registry.using(&store)?.products().get_by_id(id).await?;
        let image_url = product.and_then(|p| p.image_url(&state.config.server.media_url));
        record
            .values
            .insert("image_url".to_string(), image_url.map(Value::from).unwrap_or(Value::Null));
    }

    Ok(Json(DetailResponse {
        title: view.verbose_name(),
        store,
        entity,
        permissions: view.permissions(),
        record,
    }))
}

/// Add, change and delete are never allowed through the admin views.
pub async fn reject_write(StaffUser(claims): StaffUser) -> ApiError {
    warn!(user = %claims.username, "Rejected write on read-only view");
    ApiError::Forbidden("Records are read-only in the admin views".to_string())
}
