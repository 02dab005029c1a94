//! The interception layer.
//!
//! [`observe`] wraps a root node and returns an [`Observed`] handle. Every
//! read through a wrapper lazily wraps the nested composite it returns;
//! every write, delete, redefinition and mutating call is validated,
//! applied to the underlying node and reported to the listener with its
//! path from the root.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use on_change_path::{Key, Path, PathForm};
use tracing::{debug, trace};

use crate::builtins;
use crate::cache::Cache;
use crate::error::Error;
use crate::event::{Change, OperationDetails};
use crate::operation::{classify, ChangeTest, Class, Operation};
use crate::options::{Options, Verdict};
use crate::tracker::Tracker;
use crate::value::{Descriptor, Kind, Node, Value};

type Listener = dyn Fn(&Change);

/// Shared state of one observed root.
pub(crate) struct Engine {
    root: Node,
    /// Form of the paths handed to callers. Internally every path is kept
    /// as keys so it walks back to the exact keys it was built from.
    form: PathForm,
    options: Options,
    listener: Box<Listener>,
    cache: RefCell<Cache>,
    tracker: RefCell<Tracker>,
}

impl Engine {
    fn new<F>(root: Node, listener: F, options: Options) -> Self
    where
        F: Fn(&Change) + 'static,
    {
        Self {
            root,
            form: options.path_form(),
            tracker: RefCell::new(Tracker::new(options.on_validate.is_some())),
            cache: RefCell::new(Cache::new()),
            listener: Box::new(listener),
            options,
        }
    }

    fn root_path(&self) -> Path {
        Path::root(PathForm::Keys)
    }

    fn present(&self, path: &Path) -> Path {
        path.to_form(self.form)
    }
}

pub(crate) struct ObservedInner {
    target: Node,
    engine: Rc<Engine>,
}

#[cfg(test)]
impl ObservedInner {
    pub(crate) fn detached_for_tests(target: Node) -> Self {
        let engine = Rc::new(Engine::new(target.clone(), |_| {}, Options::default()));
        Self { target, engine }
    }
}

/// A wrapper around a node reached from an observed root.
///
/// There is at most one live wrapper per node and root, so two reads of the
/// same node return wrappers that are [`ptr_eq`](Observed::ptr_eq).
#[derive(Clone)]
pub struct Observed {
    inner: Rc<ObservedInner>,
}

/// Wraps `value` so that every mutation reachable from it is reported to
/// `on_change`.
///
/// Wrappers are returned unchanged and non-composite values are returned
/// as they are.
pub fn observe<F>(value: impl Into<Value>, on_change: F, options: Options) -> Value
where
    F: Fn(&Change) + 'static,
{
    let root = match value.into() {
        Value::Node(node) => node,
        other => return other,
    };
    debug!(kind = root.kind().name(), "observing");
    let engine = Rc::new(Engine::new(root.clone(), on_change, options));
    let path = engine.root_path();
    wrap(&engine, root, path)
}

/// The underlying value of a wrapper. Works before and after unsubscribing.
pub fn unwrap(value: &Value) -> Value {
    value.raw()
}

/// Stops observing and returns the raw root.
///
/// Only the root's own wrapper can unsubscribe; any other value is returned
/// unchanged. Calling it again is harmless.
pub fn unsubscribe(value: &Value) -> Value {
    let Value::Observed(observed) = value else {
        return value.clone();
    };
    let engine = observed.engine();
    if !observed.node().ptr_eq(&engine.root) {
        return value.clone();
    }
    let mut cache = engine.cache.borrow_mut();
    if !cache.is_unsubscribed() {
        cache.unsubscribe();
        debug!("unsubscribed");
    }
    Value::Node(observed.target())
}

fn wrap(engine: &Rc<Engine>, node: Node, path: Path) -> Value {
    let inner = engine.cache.borrow_mut().get_proxy(&node, path, || {
        Rc::new(ObservedInner {
            target: node.clone(),
            engine: engine.clone(),
        })
    });
    match inner {
        Some(inner) => Value::Observed(Observed { inner }),
        None => Value::Node(node),
    }
}

impl Observed {
    pub fn target(&self) -> Node {
        self.inner.target.clone()
    }

    pub fn ptr_eq(&self, other: &Observed) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The path this value was last reached at. `None` after unsubscribing.
    pub fn path(&self) -> Option<Path> {
        let engine = self.engine();
        let path = engine.cache.borrow().path(self.node());
        path.map(|path| engine.present(&path))
    }

    /// Every path this value has been reached at.
    pub fn all_paths(&self) -> Vec<Path> {
        let engine = self.engine();
        let paths = engine.cache.borrow().all_paths(self.node());
        paths.iter().map(|path| engine.present(path)).collect()
    }

    /// True if the value is no longer found at its path from the root.
    pub fn is_detached(&self) -> bool {
        let engine = self.engine();
        let detached = engine.cache.borrow().is_detached(self.node(), &engine.root);
        detached
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.engine().cache.borrow().is_unsubscribed()
    }

    fn engine(&self) -> &Rc<Engine> {
        &self.inner.engine
    }

    fn node(&self) -> &Node {
        &self.inner.target
    }

    fn receiver(&self) -> Value {
        Value::Observed(self.clone())
    }

    fn raw_receiver(&self) -> Value {
        Value::Node(self.target())
    }

    fn base_path(&self, node: &Node) -> Path {
        let engine = self.engine();
        let path = engine.cache.borrow().path(node);
        path.unwrap_or_else(|| engine.root_path())
    }

    // ── Reads ──

    pub fn get(&self, key: impl Into<Key>) -> Result<Value, Error> {
        let target = self.node();
        let key = target.normalize_key(&key.into());
        if self.is_unsubscribed() {
            return target.get_with(&key, &self.raw_receiver());
        }
        let value = target.get_with(&key, &self.receiver())?;
        Ok(self.prepare_value(target, &key, value, None))
    }

    /// Wraps a member of `self` found at `key`.
    pub(crate) fn wrap_member(&self, key: &Key, value: Value) -> Value {
        let base = self.base_path(self.node());
        self.prepare_value(self.node(), key, value, Some(&base))
    }

    fn prepare_value(&self, owner: &Node, key: &Key, value: Value, base: Option<&Path>) -> Value {
        let node = match value {
            Value::Node(node) => node,
            other => return other,
        };
        let engine = self.engine();
        let options = &engine.options;
        let shallow = options.is_shallow && !engine.tracker.borrow().is_cloning();
        if shallow || key.as_name() == Some("constructor") || options.ignores(key) {
            return Value::Node(node);
        }
        let (child, existing) = {
            let mut cache = engine.cache.borrow_mut();
            if cache.is_unsubscribed()
                || cache.is_get_invariant(owner, key)
                || (options.ignore_detached && cache.is_detached(owner, &engine.root))
            {
                return Value::Node(node);
            }
            let base = match base {
                Some(base) => base.clone(),
                None => cache.path(owner).unwrap_or_else(|| engine.root_path()),
            };
            (base.concat(key), cache.path(&node))
        };
        // A child already known at an ancestor path closes a cycle: keep
        // the shorter path.
        let path = match existing {
            Some(existing) if existing.is_strict_ancestor_of(&child) => existing,
            _ => child,
        };
        wrap(engine, node, path)
    }

    // ── Writes ──

    /// Writes `key`. Returns `Ok(false)` if the write was refused or
    /// vetoed.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<bool, Error> {
        let target = self.node();
        let key = target.normalize_key(&key.into());
        let value = value.into().raw();
        if self.is_unsubscribed() || !has_properties(target) {
            return target.set_with(&key, value, &self.raw_receiver());
        }
        let engine = self.engine();
        let previous = target.get_with(&key, &self.raw_receiver())?;
        if engine.options.equals.equals(&previous, &value) && target.has(&key) {
            return Ok(true);
        }
        if !self.validate(self.property_path(target, &key), &value, &previous, None) {
            return Ok(false);
        }
        // Setters anywhere in the chain see the wrapper so their own writes
        // are reported too.
        let receiver = if target.has_setter_in_chain(&key) {
            self.receiver()
        } else {
            self.raw_receiver()
        };
        if !target.set_with(&key, value, &receiver)? {
            return Ok(false);
        }
        engine.cache.borrow_mut().forget_descriptor(target, &key);
        let current = target.get_with(&key, &self.raw_receiver())?;
        self.handle_change_on_target(target, &key, current, previous, None);
        Ok(true)
    }

    /// Deletes `key`. Deleting an absent property succeeds without an
    /// event.
    pub fn delete(&self, key: impl Into<Key>) -> Result<bool, Error> {
        let target = self.node();
        let key = target.normalize_key(&key.into());
        if self.is_unsubscribed() || !has_properties(target) {
            return target.delete(&key);
        }
        if !target.has(&key) {
            return Ok(true);
        }
        let previous = target.get_with(&key, &self.raw_receiver())?;
        if !self.validate(
            self.property_path(target, &key),
            &Value::Undefined,
            &previous,
            None,
        ) {
            return Ok(false);
        }
        if !target.delete(&key)? {
            return Ok(false);
        }
        {
            let engine = self.engine();
            let mut cache = engine.cache.borrow_mut();
            cache.forget_descriptor(target, &key);
            if let Value::Node(removed) = &previous {
                cache.retain_paths(removed, &engine.root);
            }
        }
        self.handle_change_on_target(target, &key, Value::Undefined, previous, None);
        Ok(true)
    }

    /// Installs `descriptor` at `key`. Redefining a property with an
    /// identical descriptor is a no-op.
    pub fn define_property(&self, key: impl Into<Key>, descriptor: Descriptor) -> Result<bool, Error> {
        let target = self.node();
        let key = target.normalize_key(&key.into());
        if self.is_unsubscribed() || !has_properties(target) {
            return target.define_property(&key, descriptor);
        }
        let engine = self.engine();
        if engine
            .cache
            .borrow_mut()
            .is_same_descriptor(target, &key, &descriptor)
        {
            return Ok(true);
        }
        let previous = target.get_with(&key, &self.raw_receiver())?;
        let proposed = descriptor.value().map(Value::raw).unwrap_or_default();
        if !self.validate(self.property_path(target, &key), &proposed, &previous, None) {
            return Ok(false);
        }
        let is_accessor = descriptor.is_accessor();
        if !target.define_property(&key, descriptor)? {
            return Ok(false);
        }
        engine.cache.borrow_mut().forget_descriptor(target, &key);
        let value = if is_accessor {
            // A failing getter reports undefined.
            target.get_with(&key, &self.receiver()).unwrap_or_default()
        } else {
            proposed
        };
        self.handle_change_on_target(target, &key, value, previous, None);
        Ok(true)
    }

    // ── Calls ──

    /// Runs a built-in operation or a function-valued property.
    ///
    /// Mutating operations are bracketed and reported as one change of the
    /// whole collection. Custom methods run with the wrapper as `this`, so
    /// each write they make is reported on its own.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, Error> {
        let target = self.target();
        if self.is_unsubscribed() {
            return builtins::invoke_raw(&target, name, args);
        }
        let classified = Operation::from_name(name)
            .and_then(|op| classify(target.kind(), op).map(|class| (op, class)));
        let Some((op, class)) = classified else {
            return builtins::call_method(&target, name, args, &self.receiver());
        };
        let args: Vec<Value> = args.iter().map(Value::raw).collect();
        match class {
            Class::ReadOnly => {
                let result = builtins::execute(&target, op, &args, &self.receiver(), &|value, _| value)?;
                Ok(self.wrap_result(&target, op, &args, result))
            }
            Class::Iterator => {
                let base = self.base_path(&target);
                let wrap = |value: Value, key: &Key| self.prepare_value(&target, key, value, Some(&base));
                Ok(builtins::materialize(&target, op, &wrap))
            }
            Class::Mutating(test) => self.bracket(&target, op, test, args),
        }
    }

    /// `get` on a map hands out the stored member, wrapped at its key.
    /// Fresh sequences built by read-only calls are not part of the graph
    /// and stay raw.
    fn wrap_result(&self, target: &Node, op: Operation, args: &[Value], result: Value) -> Value {
        if target.kind() != Kind::Map || op != Operation::Get {
            return result;
        }
        match args.first().map(Value::to_key) {
            Some(Ok(key)) => {
                let base = self.base_path(target);
                self.prepare_value(target, &key, result, Some(&base))
            }
            _ => result,
        }
    }

    fn bracket(
        &self,
        target: &Node,
        op: Operation,
        test: ChangeTest,
        args: Vec<Value>,
    ) -> Result<Value, Error> {
        let engine = self.engine();
        let path = self.base_path(target);
        engine.tracker.borrow_mut().start(target, path.clone(), test);
        trace!(operation = op.name(), path = %path, "bracket start");

        let outcome = {
            let wrap = |value: Value, key: &Key| self.prepare_value(target, key, value, Some(&path));
            builtins::execute(target, op, &args, &self.receiver(), &wrap)
        };
        let pending = engine.tracker.borrow_mut().stop();
        engine.cache.borrow_mut().forget_descriptors(target);
        trace!(operation = op.name(), path = %path, "bracket stop");

        let result = outcome?;
        let Some(pending) = pending else {
            return Ok(result);
        };
        // Unsubscribed from inside the call: nothing left to report or veto.
        if engine.cache.borrow().is_unsubscribed() {
            return Ok(result);
        }
        if !pending.is_changed(target, &engine.options.equals) {
            return Ok(result);
        }
        let details = engine.options.details.includes(op.name()).then(|| OperationDetails {
            name: op.name().to_owned(),
            args,
            result: result.clone(),
        });
        let value = Value::Node(target.clone());
        let previous = pending.previous();

        // Inside an enclosing bracket this is a write of the collection
        // into its parent.
        let folded = engine.tracker.borrow_mut().fold_nested(&path, previous.clone());
        if folded {
            return Ok(result);
        }
        if self.validate(path.clone(), &value, &previous, details.clone()) {
            self.handle_change_on_target(target, &Key::absent(), value, previous, details);
        } else {
            debug!(operation = op.name(), path = %path, "rolling back");
            pending.undo(target);
            engine.cache.borrow_mut().forget_descriptors(target);
        }
        Ok(result)
    }

    // ── Validation and notification ──

    fn property_path(&self, owner: &Node, key: &Key) -> Path {
        self.base_path(owner).concat(key)
    }

    fn validate(&self, path: Path, value: &Value, previous: &Value, details: Option<OperationDetails>) -> bool {
        let engine = self.engine();
        let Some(validator) = &engine.options.on_validate else {
            return true;
        };
        if engine.tracker.borrow().is_cloning() || engine.cache.borrow().is_unsubscribed() {
            return true;
        }
        let change = Change {
            path: engine.present(&path),
            value: value.clone(),
            previous: previous.clone(),
            details,
        };
        if validator.validate(&change) == Verdict::Accept {
            return true;
        }
        debug!(path = %change.path, "change vetoed");
        false
    }

    fn handle_change_on_target(
        &self,
        owner: &Node,
        key: &Key,
        value: Value,
        previous: Value,
        details: Option<OperationDetails>,
    ) {
        let engine = self.engine();
        let options = &engine.options;
        if options.ignores(key) {
            return;
        }
        let paths = {
            let mut cache = engine.cache.borrow_mut();
            if cache.is_unsubscribed()
                || (options.ignore_detached && cache.is_detached(owner, &engine.root))
            {
                return;
            }
            let cloning = engine.tracker.borrow().is_cloning();
            if options.notify_aliases && !cloning {
                cache.notify_paths(owner, &engine.root)
            } else {
                cache.path(owner).into_iter().collect()
            }
        };
        for path in paths {
            self.handle_change(path, key, value.clone(), previous.clone(), details.clone());
        }
    }

    fn handle_change(
        &self,
        path: Path,
        key: &Key,
        value: Value,
        previous: Value,
        details: Option<OperationDetails>,
    ) {
        let engine = self.engine();
        {
            let mut tracker = engine.tracker.borrow_mut();
            if tracker.is_part_of_clone(&path) {
                tracker.update(&path, key, previous);
                return;
            }
        }
        if engine.cache.borrow().is_unsubscribed() {
            return;
        }
        let change = Change {
            path: engine.present(&path.concat(key)),
            value,
            previous,
            details,
        };
        trace!(path = %change.path, "change");
        (engine.listener)(&change);
    }
}

/// Sets, maps and dates only change through their operations.
fn has_properties(node: &Node) -> bool {
    matches!(node.kind(), Kind::Object | Kind::Array)
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self
            .engine()
            .cache
            .try_borrow()
            .ok()
            .and_then(|cache| cache.path(self.node()));
        f.debug_struct("Observed")
            .field("target", self.node())
            .field("path", &path)
            .finish()
    }
}
