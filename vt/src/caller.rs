//! Caller attribution
//!
//! Artifacts are named after the test that rendered them. Rather than walking
//! the runtime stack, every call site records its own name with
//! [`caller_name!`] and hands a [`CallStack`] down to the helpers that
//! eventually render a template. Helpers that are not worth naming an
//! artifact after simply pass the stack along without entering a frame.

use tracing::debug;

/// Fully qualified path of the enclosing function, e.g. `suite::org::test_acc_org`
///
/// Closure frames are folded into the function that defines them.
#[macro_export]
macro_rules! caller_name {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::caller::enclosing_function(__type_name_of(__here))
    }};
}

/// [`CallStack`] rooted at the enclosing function, or a child of `$parent`
#[macro_export]
macro_rules! call_stack {
    () => {
        $crate::caller::CallStack::root($crate::caller_name!())
    };
    ($parent:expr) => {
        $crate::caller::CallStack::enter(&$parent, $crate::caller_name!())
    };
}

/// Strip the marker item and closure frames from a `caller_name!` type name
#[doc(hidden)]
pub fn enclosing_function(type_name: &'static str) -> &'static str {
    let mut name = type_name.strip_suffix("::__here").unwrap_or(type_name);
    while let Some(outer) = name.strip_suffix("::{{closure}}") {
        name = outer;
    }
    name
}

/// Reduce a qualified function path to `module.function`
///
/// `vcd::org_tests::test_acc_org` becomes `org_tests.test_acc_org`; a bare
/// name is returned unchanged.
pub fn short_name(qualified: &str) -> String {
    let segments: Vec<&str> = qualified.split("::").filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [.., module, function] => format!("{}.{}", module, function),
    }
}

/// Explicit chain of descriptive frame names, outermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStack {
    frames: Vec<String>,
}

impl CallStack {
    /// An empty chain; resolves to no name at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain holding a single frame, typically the test function
    pub fn root(frame: impl Into<String>) -> Self {
        Self {
            frames: vec![frame.into()],
        }
    }

    /// Child chain with `frame` as the innermost entry
    pub fn enter(&self, frame: impl Into<String>) -> Self {
        let mut frames = self.frames.clone();
        frames.push(frame.into());
        Self { frames }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Innermost frame, if any
    pub fn current(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }

    /// Name of the frame `skip_frames` levels above the innermost one
    ///
    /// Returns an empty string when the chain is not deep enough.
    pub fn resolve_caller_name(&self, skip_frames: usize) -> String {
        let name = self
            .frames
            .iter()
            .rev()
            .nth(skip_frames)
            .cloned()
            .unwrap_or_default();
        debug!(skip_frames, depth = self.depth(), %name, "CallStack::resolve_caller_name: resolved");
        name
    }
}
