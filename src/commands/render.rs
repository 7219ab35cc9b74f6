//! `render`

use anyhow::{Context as _, Result, bail};
use declarative::{Bindings, Template, bindings_from, render};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use super::Exit;
use crate::cli::{RenderArgs, TemplateKind};

pub fn run(args: &RenderArgs) -> Result<Exit> {
    let template = match args.kind {
        TemplateKind::Text => {
            let Some(path) = &args.template else {
                bail!("a text template needs a template file");
            };
            let source = fs::read_to_string(path)
                .with_context(|| format!("Could not read template {}", path.display()))?;
            Template::text(source)
        }
        TemplateKind::Xml => Template::xml(),
        TemplateKind::Properties => Template::Properties,
    };
    let bindings = match &args.bindings {
        Some(path) => load_bindings(path)?,
        None => Bindings::new(),
    };

    let rendered = render(&template, &bindings)
        .with_context(|| format!("Could not render {} template", template.kind()))?;
    io::stdout().write_all(&rendered)?;
    Ok(Exit::Success)
}

fn load_bindings(path: &Path) -> Result<Bindings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read bindings {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON format in {}", path.display()))?;
    if !value.is_object() {
        bail!("bindings in {} must be a JSON object", path.display());
    }
    Ok(bindings_from(&value))
}
