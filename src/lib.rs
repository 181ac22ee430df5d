//! # mdgate
//!
//! A hardened MCP gateway that fetches untrusted documents and converts them
//! to Markdown.
//!
//! mdgate exposes one tool — `convert_to_markdown` — over an MCP-compatible
//! HTTP API. The tool accepts either a document URL or inline base64 content.
//! The interesting work is not the conversion but the ingestion pipeline in
//! front of it: attacker-controlled URLs and payloads are validated, fetched
//! under hard ceilings, and staged in isolated temporary storage before the
//! converter ever sees a byte.
//!
//! ## Pipeline
//!
//! ```text
//! request ──▶ validate ──▶ netguard (SSRF deny-list)
//!    │            │
//!    │            ▼
//!    │         fetch (streaming, bounded)     decode (base64, bounded)
//!    │            └──────────────┬──────────────┘
//!    │                           ▼
//!    │                       staging (private tempdir, random name)
//!    │                           ▼
//!    │                       convert ──▶ Markdown
//!    └── events / billing ◀── ingest (orchestrator, guaranteed cleanup)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration (limits, timeouts, bind address) |
//! | [`error`] | Sanitized error taxonomy |
//! | [`netguard`] | Hostname resolution + deny-list classification |
//! | [`validate`] | URL scheme/host validation |
//! | [`fetch`] | Bounded streaming download with content-type gating |
//! | [`decode`] | Strict base64 decoding with pre-decode ceiling |
//! | [`staging`] | Isolated temp staging with guaranteed cleanup |
//! | [`convert`] | Converter trait + bundled Markdown converter |
//! | [`events`] | Structured outcome events and billing seam |
//! | [`ingest`] | Request orchestration |
//! | [`server`] | MCP-compatible HTTP server |

pub mod config;
pub mod convert;
pub mod decode;
pub mod error;
pub mod events;
pub mod fetch;
pub mod ingest;
pub mod netguard;
pub mod server;
pub mod staging;
pub mod validate;
