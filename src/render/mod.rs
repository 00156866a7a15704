//! Public page rendering
//!
//! Templates and static assets are embedded into the binary with
//! rust-embed. Templates are Tera; every page gets the site variables
//! (`site_name`, `tagline`, contact details, `request_path`, `year`).

use anyhow::{Context as _, Result};
use chrono::{Datelike, Utc};
use rust_embed::RustEmbed;
use serde::Serialize;
use std::borrow::Cow;
use std::error::Error as StdError;
use tera::{Context, Tera};

use crate::config::SiteConfig;

mod error;

pub use error::RenderError;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct SiteTemplates;

#[derive(RustEmbed)]
#[folder = "static/"]
struct SiteAssets;

/// Variables every page can use
#[derive(Debug, Clone, Serialize)]
pub struct PageVars {
    pub site_name: String,
    pub tagline: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub request_path: String,
    pub year: i32,
}

impl PageVars {
    pub fn new(site: &SiteConfig, request_path: &str) -> Self {
        Self {
            site_name: site.name.clone(),
            tagline: site.tagline.clone(),
            contact_email: site.contact_email.clone(),
            contact_phone: site.contact_phone.clone(),
            request_path: request_path.to_string(),
            year: Utc::now().year(),
        }
    }
}

pub struct SiteRenderer {
    tera: Tera,
}

impl SiteRenderer {
    /// Load the embedded templates
    pub fn new() -> Result<Self> {
        let mut templates: Vec<(String, String)> = Vec::new();
        for name in SiteTemplates::iter() {
            let file = SiteTemplates::get(&name)
                .ok_or_else(|| RenderError::NotFound(name.to_string()))?;
            let content = String::from_utf8(file.data.into_owned())
                .with_context(|| format!("Template is not UTF-8: {}", name))?;
            templates.push((name.to_string(), content));
        }

        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html"]);
        tera.add_raw_templates(templates)
            .map_err(|e| RenderError::Template(describe(&e)))?;

        tracing::debug!("Loaded {} page templates", tera.get_template_names().count());
        Ok(Self { tera })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    pub fn render(&self, template: &str, context: &Context) -> Result<String, RenderError> {
        if !self.has_template(template) {
            return Err(RenderError::NotFound(template.to_string()));
        }
        self.tera
            .render(template, context)
            .map_err(|e| RenderError::Template(format!("Failed to render '{}': {}", template, describe(&e))))
    }

    /// Render with the site variables merged into `context`
    pub fn render_page(&self, template: &str, context: &Context, vars: &PageVars) -> Result<String, RenderError> {
        let mut full = context.clone();
        full.insert("site_name", &vars.site_name);
        full.insert("tagline", &vars.tagline);
        full.insert("contact_email", &vars.contact_email);
        full.insert("contact_phone", &vars.contact_phone);
        full.insert("request_path", &vars.request_path);
        full.insert("year", &vars.year);
        self.render(template, &full)
    }

    /// Error page for `status`, falling back to bare HTML if the error
    /// template itself fails
    pub fn render_error(&self, status: u16, message: &str, vars: &PageVars) -> String {
        let mut context = Context::new();
        context.insert("status", &status);
        context.insert("message", message);

        match self.render_page("error.html", &context, vars) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render error page: {}", e);
                simple_error_page(status, message)
            }
        }
    }
}

/// An embedded static file
pub struct Asset {
    pub content_type: &'static str,
    pub data: Cow<'static, [u8]>,
}

/// Look up a file under `static/`
pub fn static_asset(path: &str) -> Option<Asset> {
    let path = path.trim_start_matches('/');
    if path.split('/').any(|segment| segment == "..") {
        return None;
    }
    SiteAssets::get(path).map(|file| Asset {
        content_type: content_type(path),
        data: file.data,
    })
}

pub fn content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff2" => "font/woff2",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn describe(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(&format!("\n  Caused by: {}", cause));
        source = cause.source();
    }
    message
}

fn simple_error_page(status: u16, message: &str) -> String {
    let escaped = message
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"UTF-8\"><title>{status}</title></head>\
         <body><h1>{status}</h1><p>{escaped}</p></body></html>"
    )
}
