use crate::{
    error::{Error, Result},
    preset::OutlinePreset,
    token::group_thousands,
};
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera, Value};

/// Template engine for the markdown-shaped outline presets.
pub(crate) struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Creates a template engine with the built-in outline templates.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in template fails to parse.
    pub(crate) fn new() -> Result<Self> {
        let mut tera = Tera::default();

        Self::register_builtin_templates(&mut tera)?;
        Self::register_filters(&mut tera);

        Ok(Self { tera })
    }

    /// Registers one template per markdown outline preset.
    fn register_builtin_templates(tera: &mut Tera) -> Result<()> {
        let builtins = [
            (
                OutlinePreset::BeatSheet,
                include_str!("../templates/beat_sheet.tera"),
            ),
            (
                OutlinePreset::EpisodeRundown,
                include_str!("../templates/episode_rundown.tera"),
            ),
            (
                OutlinePreset::ShootingSchedule,
                include_str!("../templates/shooting_schedule.tera"),
            ),
        ];

        for (preset, source) in builtins {
            tera.add_raw_template(preset.id(), source)
                .map_err(|e| Error::template(preset.id(), e))?;
        }

        Ok(())
    }

    /// Registers custom Tera filters.
    fn register_filters(tera: &mut Tera) {
        // Escapes pipes and folds newlines for markdown table cells
        tera.register_filter("cell", Self::cell_filter);

        tera.register_filter("thousands", Self::thousands_filter);
    }

    fn cell_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        match value.as_str() {
            Some(s) => {
                let folded = s.split_whitespace().collect::<Vec<_>>().join(" ");
                Ok(Value::String(folded.replace('|', "\\|")))
            }
            None => Ok(value.clone()),
        }
    }

    fn thousands_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map_or_else(
                || Ok(value.clone()),
                |n| Ok(Value::String(group_thousands(n))),
            )
    }

    /// Renders the template registered for `preset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the preset has no markdown template or rendering fails.
    pub(crate) fn render<T: Serialize>(&self, preset: OutlinePreset, data: &T) -> Result<String> {
        let context = Context::from_serialize(data).map_err(|e| Error::template(preset.id(), e))?;

        self.tera
            .render(preset.id(), &context)
            .map_err(|e| Error::template(preset.id(), e))
    }
}
