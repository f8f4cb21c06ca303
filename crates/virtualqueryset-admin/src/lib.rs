//! # virtualqueryset-admin
//!
//! A read-only admin API for virtual models. Register managers with a
//! [`VirtualAdminSite`](site::VirtualAdminSite) and mount its router to
//! browse settings, API responses and cached data with the same listing,
//! search, filtering and pagination as database-backed models.
//!
//! ## Module Overview
//!
//! - [`model_admin`] - [`ModelAdmin`](model_admin::ModelAdmin) list configuration
//! - [`api`] - JSON response types and pagination
//! - [`db`] - [`AdminDbExecutor`](db::AdminDbExecutor) and its virtual implementation
//! - [`site`] - Model registry and Axum router

#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod api;
pub mod db;
pub mod model_admin;
pub mod site;

pub use db::{AdminDbExecutor, AdminListParams, VirtualAdminDb};
pub use model_admin::ModelAdmin;
pub use site::VirtualAdminSite;
