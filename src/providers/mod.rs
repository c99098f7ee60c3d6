// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound integrations with external services.

pub mod gemini;

pub use gemini::{InsightClient, InsightError};
