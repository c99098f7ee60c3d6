// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Meeting Insights Server - Token Authentication & Role-Based Access
//!
//! Stateless HMAC-signed bearer tokens, Argon2 credentials stored in an
//! embedded redb database, and role policies guarding the meeting-insight
//! upload and admin routes.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and router (Axum)
//! - `auth` - Token issuing and validation, credentials, roles, policies
//! - `providers` - Outbound insight service client
//! - `server` - Startup, logging and graceful shutdown
//! - `storage` - Identity and role persistence (redb)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod server;
pub mod state;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;
