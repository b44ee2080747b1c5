//! Router Module Index
//!
//! Organizes the application's routing logic by API prefix. Access control is not
//! expressed through router placement: every protected handler resolves an
//! `AuthUser` and calls the authorization guard explicitly, so a route can never
//! be accidentally exposed by landing in the wrong module.

/// Identity and session lifecycle routes, mounted under `/api/auth`.
pub mod auth;

/// Task CRUD routes, mounted under `/api/tasks` behind the authentication layer.
pub mod tasks;
