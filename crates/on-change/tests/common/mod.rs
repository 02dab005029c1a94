#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use on_change::{observe, Change, Options, Value};

/// Events collected by a recording listener.
#[derive(Clone, Default)]
pub struct Events(Rc<RefCell<Vec<Change>>>);

impl Events {
    pub fn listener(&self) -> impl Fn(&Change) + 'static {
        let sink = self.0.clone();
        move |change: &Change| sink.borrow_mut().push(change.clone())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.0.borrow().iter().map(|c| c.path.to_string()).collect()
    }

    pub fn json(&self) -> Vec<serde_json::Value> {
        self.0.borrow().iter().map(Change::to_json).collect()
    }

    pub fn last(&self) -> Option<Change> {
        self.0.borrow().last().cloned()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

pub fn observed(doc: serde_json::Value, options: Options) -> (Value, Events) {
    let events = Events::default();
    let state = observe(doc, events.listener(), options);
    (state, events)
}
