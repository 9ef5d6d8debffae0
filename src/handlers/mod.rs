// ---------------------------------------------------------------------------
// handlers/ — one submodule per route group; mod.rs re-exports so that
// `crate::handlers::*` paths stay stable and utoipa's generated
// `__path_*` marker types are reachable from the `ApiDoc` derive in lib.rs.
// ---------------------------------------------------------------------------

pub(crate) mod admin;
pub(crate) mod health;
pub(crate) mod ingress;
pub(crate) mod openapi;
pub(crate) mod status;

pub use admin::{delete_job, get_job, list_jobs, patch_job, stats};
pub use health::{health, metrics, readiness};
pub use ingress::upload;
pub use openapi::openapi;
pub use status::status;

pub use admin::{
    __path_delete_job, __path_get_job, __path_list_jobs, __path_patch_job, __path_stats,
};
pub use health::{__path_health, __path_readiness};
pub use ingress::__path_upload;
pub use status::__path_status;
