//! Output formatting: styled text for people, JSON for scripts.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use console::Style;
use serde::Serialize;
use serde_json::json;
use umbra::memory::MemoryDocument;
use umbra::{Attribute, ThemeConfig, ThemeSnapshot};

const LABEL_WIDTH: usize = 13;

/// What the document root looks like after the engine applied the theme.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentReport {
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    color_scheme: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Report {
    #[serde(flatten)]
    snapshot: ThemeSnapshot,
    document: DocumentReport,
}

impl Report {
    pub(crate) fn new(
        snapshot: ThemeSnapshot,
        config: &ThemeConfig,
        document: &MemoryDocument,
    ) -> Self {
        let attributes = config
            .attributes()
            .iter()
            .filter_map(|attribute| match attribute {
                Attribute::Class => None,
                Attribute::Data(name) => document.attribute(name).map(|v| (name.clone(), v)),
            })
            .collect();
        Self {
            snapshot,
            document: DocumentReport {
                classes: document.classes(),
                attributes,
                color_scheme: document.color_scheme(),
            },
        }
    }
}

struct Palette {
    label: Style,
    value: Style,
    muted: Style,
    current: Style,
}

impl Palette {
    fn new() -> Self {
        Self {
            label: Style::new().cyan(),
            value: Style::new().bold(),
            muted: Style::new().dim(),
            current: Style::new().green().bold(),
        }
    }

    fn field<W: Write>(&self, out: &mut W, label: &str, value: Option<&str>) -> Result<()> {
        let label = self.label.apply_to(format!("{:<width$}", label, width = LABEL_WIDTH));
        match value {
            Some(value) if !value.is_empty() => {
                writeln!(out, "{} {}", label, self.value.apply_to(value))?
            }
            _ => writeln!(out, "{} {}", label, self.muted.apply_to("-"))?,
        }
        Ok(())
    }
}

pub(crate) fn report<W: Write>(out: &mut W, report: &Report, as_json: bool) -> Result<()> {
    if as_json {
        serde_json::to_writer_pretty(&mut *out, report)?;
        writeln!(out)?;
        return Ok(());
    }

    let palette = Palette::new();
    let snapshot = &report.snapshot;
    let resolved = snapshot.resolved_theme.map(|a| a.as_str());
    let system = snapshot.system_theme.map(|a| a.as_str());
    let themes = snapshot.themes.join(", ");

    palette.field(out, "theme", snapshot.theme.as_deref())?;
    palette.field(out, "resolved", resolved)?;
    palette.field(out, "system", system)?;
    palette.field(out, "forced", snapshot.forced_theme.as_deref())?;
    palette.field(out, "themes", Some(themes.as_str()))?;

    let document = &report.document;
    let classes = document.classes.join(" ");
    palette.field(out, "class", Some(classes.as_str()))?;
    for (name, value) in &document.attributes {
        palette.field(out, name, Some(value.as_str()))?;
    }
    palette.field(out, "color-scheme", document.color_scheme.as_deref())?;
    Ok(())
}

pub(crate) fn themes<W: Write>(
    out: &mut W,
    themes: &[String],
    current: &str,
    as_json: bool,
) -> Result<()> {
    if as_json {
        serde_json::to_writer_pretty(&mut *out, &json!({ "current": current, "themes": themes }))?;
        writeln!(out)?;
        return Ok(());
    }

    let palette = Palette::new();
    for theme in themes {
        if theme == current {
            writeln!(out, "{} {}", palette.current.apply_to("*"), palette.current.apply_to(theme))?;
        } else {
            writeln!(out, "  {}", theme)?;
        }
    }
    Ok(())
}

/// One line per observed change; JSON mode prints one object per line.
pub(crate) fn event<W: Write>(out: &mut W, snapshot: &ThemeSnapshot, as_json: bool) -> Result<()> {
    if as_json {
        serde_json::to_writer(&mut *out, snapshot)?;
        writeln!(out)?;
        return Ok(());
    }

    let palette = Palette::new();
    let theme = snapshot.theme.as_deref().unwrap_or("-");
    let resolved = snapshot.resolved_theme.map_or("-", |a| a.as_str());
    write!(
        out,
        "{} {}",
        palette.value.apply_to(theme),
        palette.muted.apply_to(format!("({})", resolved))
    )?;
    if let Some(system) = snapshot.system_theme {
        write!(out, " {}", palette.muted.apply_to(format!("system={}", system)))?;
    }
    if let Some(forced) = &snapshot.forced_theme {
        write!(out, " {}", palette.label.apply_to(format!("forced={}", forced)))?;
    }
    writeln!(out)?;
    Ok(())
}

pub(crate) fn notice<W: Write>(out: &mut W, message: &str) -> Result<()> {
    writeln!(out, "{}", Style::new().yellow().apply_to(message))?;
    Ok(())
}
