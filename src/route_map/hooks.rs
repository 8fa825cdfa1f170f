use std::fmt;

use crate::shared::RouteMapEvent;

pub type MapHook = Box<dyn Fn(&str) + Send + Sync>;
pub type EventHook = Box<dyn Fn(RouteMapEvent, &str) + Send + Sync>;

/// Callbacks the owning daemon registers to refresh whatever it caches
/// about route-maps. All hooks run synchronously inside the mutating call.
#[derive(Default)]
pub struct RouteMapHooks {
    add: Option<MapHook>,
    delete: Option<MapHook>,
    event: Option<EventHook>,
}

impl fmt::Debug for RouteMapHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMapHooks")
            .field("add", &self.add.is_some())
            .field("delete", &self.delete.is_some())
            .field("event", &self.event.is_some())
            .finish()
    }
}

impl RouteMapHooks {
    pub fn new() -> Self {
        RouteMapHooks::default()
    }

    pub fn on_add(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.add = Some(Box::new(hook));
        self
    }

    pub fn on_delete(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.delete = Some(Box::new(hook));
        self
    }

    pub fn on_event(mut self, hook: impl Fn(RouteMapEvent, &str) + Send + Sync + 'static) -> Self {
        self.event = Some(Box::new(hook));
        self
    }

    pub(crate) fn set_add(&mut self, hook: MapHook) {
        self.add = Some(hook);
    }

    pub(crate) fn set_delete(&mut self, hook: MapHook) {
        self.delete = Some(hook);
    }

    pub(crate) fn set_event(&mut self, hook: EventHook) {
        self.event = Some(hook);
    }

    pub fn fire_add(&self, name: &str) {
        if let Some(hook) = &self.add {
            hook(name);
        }
    }

    pub fn fire_delete(&self, name: &str) {
        if let Some(hook) = &self.delete {
            hook(name);
        }
    }

    pub fn fire_event(&self, event: RouteMapEvent, name: &str) {
        if let Some(hook) = &self.event {
            hook(event, name);
        }
    }
}
