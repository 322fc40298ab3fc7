//! Prompt segments.
//!
//! A segment is a detector: [`Segment::enabled`] decides whether it applies
//! to the current environment and, if so, fills in the fields its template
//! renders. Segments are built fresh for every render through the registry
//! below; the configured type name selects the constructor.

mod docker;
mod ipify;
pub mod scm;
mod svn;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;

use crate::env::Environment;
use crate::properties::Properties;

pub use docker::Docker;
pub use ipify::Ipify;
pub use scm::ScmStatus;
pub use svn::Svn;

/// Contract shared by every segment.
pub trait Segment: Send {
    /// Bind properties and the environment. No I/O happens here.
    fn new(props: Properties, env: Arc<dyn Environment>) -> Self
    where
        Self: Sized;

    /// Run detection. Called once per instance; any inapplicable condition
    /// yields `false` rather than an error.
    fn enabled(&mut self) -> bool;

    /// Template used when the configuration doesn't override it.
    fn template(&self) -> &'static str;

    /// Values the template can reference. Only meaningful after
    /// [`Segment::enabled`] returned `true`.
    fn fields(&self) -> minijinja::Value;
}

/// Configured segment type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SegmentKind {
    Docker,
    Ipify,
    Svn,
}

pub type SegmentFactory = fn(Properties, Arc<dyn Environment>) -> Box<dyn Segment>;

fn construct<S: Segment + 'static>(props: Properties, env: Arc<dyn Environment>) -> Box<dyn Segment> {
    Box::new(S::new(props, env))
}

fn registry() -> &'static HashMap<SegmentKind, SegmentFactory> {
    static REGISTRY: OnceLock<HashMap<SegmentKind, SegmentFactory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        HashMap::from([
            (SegmentKind::Docker, construct::<Docker> as SegmentFactory),
            (SegmentKind::Ipify, construct::<Ipify> as SegmentFactory),
            (SegmentKind::Svn, construct::<Svn> as SegmentFactory),
        ])
    })
}

/// Build a fresh segment of `kind`.
pub fn create(
    kind: SegmentKind,
    props: Properties,
    env: Arc<dyn Environment>,
) -> Option<Box<dyn Segment>> {
    registry().get(&kind).map(|factory| factory(props, env))
}
