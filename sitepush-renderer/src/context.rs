//! Template context: serializable rendering payload built from [`SiteConfig`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sitepush_core::SiteConfig;

use crate::error::RenderError;

/// Rendering payload shared by every page of a site.
///
/// Build once per run with [`TemplateContext::for_site`], then derive a
/// per-page copy with [`TemplateContext::for_page`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateContext {
    pub site: SiteCtx,
    /// Site variables from the configuration.
    pub vars: BTreeMap<String, serde_json::Value>,
    pub page: PageCtx,
    pub meta: MetaCtx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteCtx {
    pub name: String,
    pub website: Option<String>,
}

/// The page currently being rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageCtx {
    /// Output path relative to the output root (`blog/post.html`).
    pub path: String,
    /// Relative prefix back to the output root (`../` for `blog/post.html`).
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaCtx {
    pub version: String,
    pub generated_at: DateTime<Utc>,
}

impl TemplateContext {
    /// Build the site-wide context.
    pub fn for_site(site: &SiteConfig, generated_at: DateTime<Utc>) -> Self {
        TemplateContext {
            site: SiteCtx {
                name: site.name.0.clone(),
                website: site.website.clone(),
            },
            vars: site.variables.clone(),
            page: PageCtx::default(),
            meta: MetaCtx {
                version: env!("CARGO_PKG_VERSION").to_string(),
                generated_at,
            },
        }
    }

    /// Copy of this context pointed at the page `output_path`.
    pub fn for_page(&self, output_path: &str) -> Self {
        let depth = output_path.matches('/').count();
        let mut ctx = self.clone();
        ctx.page = PageCtx {
            path: output_path.to_string(),
            root: "../".repeat(depth),
        };
        ctx
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepush_core::{IgnoreSet, SiteName};
    use std::path::PathBuf;
    use std::time::Duration;

    fn make_site() -> SiteConfig {
        let mut variables = BTreeMap::new();
        variables.insert("title".to_string(), serde_json::json!("Field Notes"));
        SiteConfig {
            name: SiteName::from("notes"),
            source: PathBuf::from("/src"),
            output: PathBuf::from("/out"),
            website: Some("https://notes.example.com/".to_string()),
            variables,
            ignore: IgnoreSet::empty(),
            remote: None,
            remote_ignore_dirs: Default::default(),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn context_fields_populated() {
        let ctx = TemplateContext::for_site(&make_site(), Utc::now());
        assert_eq!(ctx.site.name, "notes");
        assert_eq!(ctx.vars["title"], serde_json::json!("Field Notes"));
        assert!(ctx.page.path.is_empty());
    }

    #[test]
    fn page_root_climbs_one_level_per_directory() {
        let base = TemplateContext::for_site(&make_site(), Utc::now());
        assert_eq!(base.for_page("index.html").page.root, "");
        assert_eq!(base.for_page("blog/post.html").page.root, "../");
        assert_eq!(base.for_page("a/b/c.html").page.root, "../../");
    }

    #[test]
    fn to_tera_context_succeeds() {
        let ctx = TemplateContext::for_site(&make_site(), Utc::now());
        let tera_ctx = ctx.to_tera_context().expect("context conversion");
        assert!(tera_ctx.contains_key("vars"));
    }
}
