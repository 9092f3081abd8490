//! Constants used throughout the QOF runtime.
//!
//! This module provides central definitions for reserved parameter names,
//! frame paths and defaults shared by books, instances and backends.

/// Parameter name under which every type exposes the instance identifier.
pub const PARAM_GUID: &str = "guid";

/// Parameter name for the owning book.
pub const PARAM_BOOK: &str = "book";

/// Parameter name for the extension frame.
pub const PARAM_KVP: &str = "kvp";

/// Frame slot recording cross-book twin origins.
pub const GEMINI: &str = "gemini";

/// Book frame path holding named counters.
pub const COUNTERS: &str = "counters";

/// Book frame path holding per-counter format overrides.
pub const COUNTER_FORMATS: &str = "counter_formats";

/// Book frame path holding string options.
pub const OPTIONS: &str = "options";

/// Default counter format: the value zero-padded to six digits.
pub const DEFAULT_COUNTER_FORMAT: &str = "%.6li";

/// Access method assumed when a book id has no `scheme://` prefix.
pub const DEFAULT_ACCESS_METHOD: &str = "file";

/// Separator between the access method and the path of a book id.
pub const ACCESS_METHOD_SEPARATOR: &str = "://";
