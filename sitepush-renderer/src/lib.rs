//! # sitepush-renderer
//!
//! Tera-based engine that renders a site's source tree into its output tree.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use sitepush_core::SiteConfig;
//! use sitepush_renderer::{Renderer, SourceKind, TemplateContext};
//!
//! fn render_all(site: &SiteConfig) {
//!     if let Ok(renderer) = Renderer::new(&site.source, &site.ignore) {
//!         let base = TemplateContext::for_site(site, Utc::now());
//!         for file in renderer.files() {
//!             if let SourceKind::Template { name } = &file.kind {
//!                 let ctx = base.for_page(&file.output);
//!                 if let Ok(content) = renderer.render(name, &ctx) {
//!                     println!("{}: {} bytes", file.output, content.len());
//!                 }
//!             }
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::TemplateContext;
pub use engine::{Renderer, SourceFile, SourceKind, TEMPLATE_EXTENSION};
pub use error::RenderError;
