//! Prompt rendering.
//!
//! Builds the configured segments, runs their detection in parallel, and
//! renders the enabled ones in configuration order.

use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;

use crate::config::{Config, SegmentConfig};
use crate::env::Environment;
use crate::segments::{self, Segment};

struct Slot<'a> {
    config: &'a SegmentConfig,
    segment: Box<dyn Segment>,
    enabled: bool,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Run one segment step, turning a panic into `None`.
fn contained<T>(kind: impl Display, step: &str, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            log::debug!(
                "Segment {} panicked in {}: {}",
                kind,
                step,
                panic_message(payload.as_ref())
            );
            None
        }
    }
}

/// Evaluate every configured segment and concatenate the rendered output.
///
/// Disabled segments, segments that panic and segments whose template fails
/// to render are left out; none of them affects the others.
pub fn render(config: &Config, env: Arc<dyn Environment>) -> String {
    let mut slots: Vec<Slot<'_>> = config
        .segments
        .iter()
        .filter_map(|segment_config| {
            let segment = segments::create(
                segment_config.kind,
                segment_config.properties.clone(),
                env.clone(),
            )?;
            Some(Slot {
                config: segment_config,
                segment,
                enabled: false,
            })
        })
        .collect();

    slots.par_iter_mut().for_each(|slot| {
        let started = std::time::Instant::now();
        let segment = &mut slot.segment;
        slot.enabled = contained(slot.config.kind, "enabled", || segment.enabled())
            .unwrap_or(false);
        log::debug!(
            "Segment {} enabled={} in {:?}",
            slot.config.kind,
            slot.enabled,
            started.elapsed()
        );
    });

    let jinja = minijinja::Environment::new();
    slots
        .iter()
        .filter(|slot| slot.enabled)
        .filter_map(|slot| {
            let (template, fields) = contained(slot.config.kind, "fields", || {
                let template = slot
                    .config
                    .template
                    .as_deref()
                    .unwrap_or_else(|| slot.segment.template());
                (template, slot.segment.fields())
            })?;
            let rendered = jinja
                .template_from_str(template)
                .and_then(|tmpl| tmpl.render(fields));
            match rendered {
                Ok(text) => Some(text),
                Err(e) => {
                    log::debug!("Failed to render {} segment: {}", slot.config.kind, e);
                    None
                }
            }
        })
        .collect()
}
