//! Test providers shared by the integration tests

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use void_resource::prelude::*;
use void_resource::ResourceValue;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Completes synchronously with the location's internal id as a `String`
pub struct CountingProvider {
    id: &'static str,
    fail_ids: Vec<&'static str>,
    tolerant: bool,
    pub provided: Rc<Cell<usize>>,
    pub released: Rc<Cell<usize>>,
    /// String results of the dependencies seen by the last provide call
    pub last_dependencies: Rc<RefCell<Vec<String>>>,
}

impl CountingProvider {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            fail_ids: Vec::new(),
            tolerant: false,
            provided: Rc::new(Cell::new(0)),
            released: Rc::new(Cell::new(0)),
            last_dependencies: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Fail loads of this internal id
    pub fn failing(mut self, internal_id: &'static str) -> Self {
        self.fail_ids.push(internal_id);
        self
    }

    /// Run even when dependencies failed
    pub fn tolerant(mut self) -> Self {
        self.tolerant = true;
        self
    }
}

impl ResourceProvider for CountingProvider {
    fn provider_id(&self) -> &str {
        self.id
    }

    fn provide(&self, rm: &mut ResourceManager, request: ProvideRequest) {
        self.provided.set(self.provided.get() + 1);
        *self.last_dependencies.borrow_mut() = request
            .dependencies()
            .iter()
            .filter_map(|dep| dep.as_ref()?.downcast_ref::<String>().cloned())
            .collect();

        let id = request.location().internal_id().to_string();
        let _ = if self.fail_ids.contains(&id.as_str()) {
            request.fail(rm, "forced failure")
        } else {
            request.complete(rm, id)
        };
    }

    fn release(&self, _location: &ResourceLocation, _result: Option<&ResourceValue>) -> bool {
        self.released.set(self.released.get() + 1);
        true
    }

    fn behaviour_flags(&self) -> ProviderBehaviourFlags {
        if self.tolerant {
            ProviderBehaviourFlags::CAN_PROVIDE_WITH_FAILED_DEPENDENCIES
        } else {
            ProviderBehaviourFlags::NONE
        }
    }
}

/// Holds requests until the test completes them
pub struct DeferredProvider {
    id: &'static str,
    pub pending: Rc<RefCell<Vec<ProvideRequest>>>,
    pub released: Rc<Cell<usize>>,
}

impl DeferredProvider {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            pending: Rc::new(RefCell::new(Vec::new())),
            released: Rc::new(Cell::new(0)),
        }
    }
}

impl ResourceProvider for DeferredProvider {
    fn provider_id(&self) -> &str {
        self.id
    }

    fn provide(&self, _rm: &mut ResourceManager, request: ProvideRequest) {
        self.pending.borrow_mut().push(request);
    }

    fn release(&self, _location: &ResourceLocation, _result: Option<&ResourceValue>) -> bool {
        self.released.set(self.released.get() + 1);
        true
    }
}
