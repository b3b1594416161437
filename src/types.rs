// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Core type definitions shared across the server.

/// A point in the server's logical time.
///
/// Timestamps are strictly increasing across the lifetime of a single leader
/// and across leader successions; 0 is never handed out and acts as the
/// "no timestamp" sentinel in persisted state.
pub type Timestamp = u64;

/// Opaque fingerprint of a written cell.
///
/// Produced by the client as a hash of (table, row key, column family,
/// qualifier). Collisions are possible and are treated conservatively: a
/// collision can only cause a spurious abort, never a lost conflict.
pub type RowFingerprint = u64;
