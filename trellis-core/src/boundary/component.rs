//! The component contract.

use std::fmt;
use std::rc::Rc;

use serde::Deserialize;

use super::context::{HookCx, RenderCx};
use crate::def::RenderOutput;
use crate::value::{CompareDepth, Props};

/// A state-bearing unit of rendering.
///
/// Only [`Component::render`] is required. Hooks run synchronously inside the
/// phase that triggers them; a panicking hook aborts that phase.
pub trait Component: 'static {
    /// Produce the target defs for the current props and state.
    fn render(&mut self, props: &Props, state: &Props, cx: &mut RenderCx<'_>) -> RenderOutput;

    /// State for a fresh instance.
    fn initial_state(&self, _props: &Props) -> Props {
        Props::new()
    }

    /// Per-component comparison overrides.
    fn update_modes(&self) -> Option<UpdateModes> {
        None
    }

    /// Explicit update decision; `None` falls through to prop/state comparison.
    fn should_update(
        &self,
        _prev_props: &Props,
        _prev_state: &Props,
        _props: &Props,
        _state: &Props,
    ) -> Option<bool> {
        None
    }

    fn pre_mount(&mut self, _cx: &mut HookCx<'_>) {}

    fn did_mount(&mut self, _cx: &mut HookCx<'_>) {}

    /// Runs before the update decision. Changes to `state` fold into the
    /// current pass.
    fn before_update(&mut self, _props: &Props, _state: &mut Props) {}

    fn pre_update(&mut self, _prev_props: &Props, _prev_state: &Props, _cx: &mut HookCx<'_>) {}

    fn did_update(&mut self, _prev_props: &Props, _prev_state: &Props, _cx: &mut HookCx<'_>) {}

    fn did_move(&mut self, _cx: &mut HookCx<'_>) {}

    fn will_unmount(&mut self, _cx: &mut HookCx<'_>) {}
}

/// Comparison depths used by the update decision.
///
/// Unset fields fall back to the next source: component, then component
/// type, then host settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UpdateModes {
    pub props: Option<CompareDepth>,
    pub state: Option<CompareDepth>,
    pub content: Option<CompareDepth>,
}

impl UpdateModes {
    /// Host-wide defaults: shallow props and state, deep content.
    pub fn host_defaults() -> Self {
        Self {
            props: Some(CompareDepth::Shallow),
            state: Some(CompareDepth::Shallow),
            content: Some(CompareDepth::Deep),
        }
    }

    /// Fill unset fields from `fallback`.
    pub fn or(self, fallback: UpdateModes) -> Self {
        Self {
            props: self.props.or(fallback.props),
            state: self.state.or(fallback.state),
            content: self.content.or(fallback.content),
        }
    }
}

type Ctor = Rc<dyn Fn(&Props) -> Box<dyn Component>>;

#[derive(Clone)]
struct TypeInner {
    name: Rc<str>,
    ctor: Ctor,
    constant_props: Vec<Rc<str>>,
    modes: UpdateModes,
}

/// A component class: constructor plus class-level defaults.
///
/// Two defs render the same component when they carry the *same*
/// `ComponentType` value (clones included).
#[derive(Clone)]
pub struct ComponentType(Rc<TypeInner>);

impl ComponentType {
    pub fn new<C, F>(name: &str, ctor: F) -> Self
    where
        C: Component,
        F: Fn(&Props) -> C + 'static,
    {
        Self(Rc::new(TypeInner {
            name: Rc::from(name),
            ctor: Rc::new(move |props| Box::new(ctor(props)) as Box<dyn Component>),
            constant_props: Vec::new(),
            modes: UpdateModes::default(),
        }))
    }

    /// A stateless component from a render function.
    pub fn function<F>(name: &str, render: F) -> Self
    where
        F: Fn(&Props, &Props, &mut RenderCx<'_>) -> RenderOutput + 'static,
    {
        let render: Rc<dyn Fn(&Props, &Props, &mut RenderCx<'_>) -> RenderOutput> = Rc::new(render);
        Self::new(name, move |_| FnComponent {
            render: Rc::clone(&render),
        })
    }

    /// Props that force a remount instead of an update when they change.
    pub fn with_constant_props(self, names: &[&str]) -> Self {
        self.map_inner(|inner| inner.constant_props = names.iter().map(|&n| Rc::from(n)).collect())
    }

    pub fn with_update_modes(self, modes: UpdateModes) -> Self {
        self.map_inner(|inner| inner.modes = modes)
    }

    fn map_inner(self, f: impl FnOnce(&mut TypeInner)) -> Self {
        let mut inner = TypeInner::clone(&self.0);
        f(&mut inner);
        Self(Rc::new(inner))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Identity used for def grouping.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn constant_props(&self) -> &[Rc<str>] {
        &self.0.constant_props
    }

    pub fn update_modes(&self) -> UpdateModes {
        self.0.modes
    }

    pub(crate) fn instantiate(&self, props: &Props) -> Box<dyn Component> {
        (self.0.ctor)(props)
    }

    /// Whether `next` keeps every constant prop of `prev` (deep equality).
    pub(crate) fn constants_hold(&self, prev: &Props, next: &Props) -> bool {
        self.0
            .constant_props
            .iter()
            .all(|name| match (prev.get(name), next.get(name)) {
                (Some(a), Some(b)) => crate::value::values_equal(a, b, -1),
                (None, None) => true,
                _ => false,
            })
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentType").field(&self.0.name).finish()
    }
}

struct FnComponent {
    render: Rc<dyn Fn(&Props, &Props, &mut RenderCx<'_>) -> RenderOutput>,
}

impl Component for FnComponent {
    fn render(&mut self, props: &Props, state: &Props, cx: &mut RenderCx<'_>) -> RenderOutput {
        (self.render)(props, state, cx)
    }
}
