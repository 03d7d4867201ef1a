//! Entity tree
//!
//! An [`Entity`] is a named node owning an ordered list of components and an
//! ordered list of child entities. Entities form a tree with single ownership:
//! a child has at most one parent, and parents and components only hold weak
//! back-references.
//!
//! An entity is *live* once the root of its tree has an application assigned.
//! Becoming live initializes every component of the subtree in preorder;
//! leaving the live tree destroys them children first.

use std::cell::RefCell;
use std::fmt;
use std::iter;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::{
    Application, EcsError, EntityDescriptor, PrefabReference, Props, Registry, Result,
    TypedDescriptor, WeakApplication, short_type_name,
};
use crate::ecs::{
    Component, ComponentHandle, ComponentRef, Event, ListObserver, Observable, ObservableList,
    System, SystemRef,
};

/// Nested prefab expansions beyond this depth are rejected.
pub const MAX_PREFAB_DEPTH: usize = 32;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

fn next_entity_id() -> String {
    format!("E{}", NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
}

// ============================================================================
// Events
// ============================================================================

/// Membership notifications published by every entity.
///
/// The `Add*`/`Remove*` variants fire before the list changes, the past
/// tense variants after.
#[derive(Debug, Clone)]
pub enum EntityEvent {
    AddEntity(Entity),
    EntityAdded(Entity),
    RemoveEntity(Entity),
    EntityRemoved(Entity),
    AddComponent(ComponentHandle),
    ComponentAdded(ComponentHandle),
    RemoveComponent(ComponentHandle),
    ComponentRemoved(ComponentHandle),
}

/// Discriminant of [`EntityEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEventKind {
    AddEntity,
    EntityAdded,
    RemoveEntity,
    EntityRemoved,
    AddComponent,
    ComponentAdded,
    RemoveComponent,
    ComponentRemoved,
}

impl Event for EntityEvent {
    type Kind = EntityEventKind;

    fn kind(&self) -> EntityEventKind {
        match self {
            Self::AddEntity(_) => EntityEventKind::AddEntity,
            Self::EntityAdded(_) => EntityEventKind::EntityAdded,
            Self::RemoveEntity(_) => EntityEventKind::RemoveEntity,
            Self::EntityRemoved(_) => EntityEventKind::EntityRemoved,
            Self::AddComponent(_) => EntityEventKind::AddComponent,
            Self::ComponentAdded(_) => EntityEventKind::ComponentAdded,
            Self::RemoveComponent(_) => EntityEventKind::RemoveComponent,
            Self::ComponentRemoved(_) => EntityEventKind::ComponentRemoved,
        }
    }
}

// ============================================================================
// Entity
// ============================================================================

pub(crate) struct EntityNode {
    id: String,
    parent: RefCell<Weak<EntityNode>>,
    /// Only ever set on a root
    application: RefCell<WeakApplication>,
    components: ObservableList<ComponentHandle>,
    entities: ObservableList<Entity>,
    events: Observable<EntityEvent>,
}

/// Shared handle to a node of the entity tree.
///
/// Cloning is cheap and yields another handle to the same node. Equality is
/// identity, not id: two distinct entities may share an id as long as they
/// are not siblings.
#[derive(Clone)]
pub struct Entity(Rc<EntityNode>);

/// Non-owning entity reference used for back-references.
#[derive(Clone, Default)]
pub(crate) struct WeakEntity(Weak<EntityNode>);

impl WeakEntity {
    pub(crate) fn upgrade(&self) -> Option<Entity> {
        self.0.upgrade().map(Entity)
    }
}

impl Entity {
    /// Create an unattached entity with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self(Rc::new_cyclic(|node: &Weak<EntityNode>| EntityNode {
            id,
            parent: RefCell::new(Weak::new()),
            application: RefCell::new(WeakApplication::default()),
            components: ObservableList::with_observer(ComponentObserver {
                owner: WeakEntity(node.clone()),
            }),
            entities: ObservableList::with_observer(ChildObserver {
                owner: WeakEntity(node.clone()),
            }),
            events: Observable::new(),
        }))
    }

    /// Create an entity with an autogenerated `E<n>` id.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(next_entity_id())
    }

    pub(crate) fn downgrade(&self) -> WeakEntity {
        WeakEntity(Rc::downgrade(&self.0))
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.0.id
    }

    #[must_use]
    pub fn parent(&self) -> Option<Entity> {
        self.0.parent.borrow().upgrade().map(Entity)
    }

    /// Topmost ancestor, or `self` when unattached.
    #[must_use]
    pub fn root(&self) -> Entity {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Application of the tree's root, inherited by every descendant.
    #[must_use]
    pub fn application(&self) -> Option<Application> {
        self.root().0.application.borrow().upgrade()
    }

    /// Whether the entity is connected to a root with an application.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.application().is_some()
    }

    /// Membership notifications of this entity.
    #[must_use]
    pub fn events(&self) -> &Observable<EntityEvent> {
        &self.0.events
    }

    // ========================================================================
    // Children
    // ========================================================================

    /// The child list. Mutations through it run the same checks and
    /// lifecycle hooks as [`add_child`](Self::add_child).
    #[must_use]
    pub fn entities(&self) -> &ObservableList<Entity> {
        &self.0.entities
    }

    /// Snapshot of the direct children.
    #[must_use]
    pub fn children(&self) -> Vec<Entity> {
        self.0.entities.snapshot()
    }

    /// Direct child with the given id.
    #[must_use]
    pub fn child(&self, id: &str) -> Option<Entity> {
        self.0.entities.find(|child| child.id() == id)
    }

    /// Append a child. Returns `Ok(false)` if it already is a child of `self`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::MultiParent`] if the child belongs to another container
    /// - [`EcsError::HierarchyCycle`] if the child is `self` or an ancestor
    /// - the first component failure when the subtree becomes live
    pub fn add_child(&self, child: &Entity) -> Result<bool> {
        self.0.entities.add(child.clone())
    }

    /// Append children in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// See [`add_child`](Self::add_child).
    pub fn add_children(&self, children: impl IntoIterator<Item = Entity>) -> Result<()> {
        self.0.entities.extend(children)
    }

    /// Detach a child. Returns `Ok(false)` if it is not a child of `self`.
    ///
    /// # Errors
    ///
    /// Propagates observer errors.
    pub fn remove_child(&self, child: &Entity) -> Result<bool> {
        self.0.entities.remove(child)
    }

    /// Detach several children.
    ///
    /// # Errors
    ///
    /// Stops at the first observer error.
    pub fn remove_children<'a>(&self, children: impl IntoIterator<Item = &'a Entity>) -> Result<()> {
        for child in children {
            self.remove_child(child)?;
        }
        Ok(())
    }

    /// Detach `self` from its parent, if any.
    ///
    /// # Errors
    ///
    /// Propagates observer errors.
    pub fn remove_from_parent(&self) -> Result<bool> {
        match self.parent() {
            Some(parent) => parent.remove_child(self),
            None => Ok(false),
        }
    }

    /// All descendants, depth-first preorder. Excludes `self`.
    #[must_use]
    pub fn grand_children(&self) -> Vec<Entity> {
        let mut result = Vec::new();
        let mut stack: Vec<Entity> = self.0.entities.snapshot().into_iter().rev().collect();
        while let Some(entity) = stack.pop() {
            stack.extend(entity.0.entities.snapshot().into_iter().rev());
            result.push(entity);
        }
        result
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// The component list.
    #[must_use]
    pub fn components(&self) -> &ObservableList<ComponentHandle> {
        &self.0.components
    }

    /// Wrap `value` and attach it. If the entity is live the component is
    /// initialized immediately.
    ///
    /// # Errors
    ///
    /// Dependency or `init` failures when the entity is live. The component
    /// stays attached in that case.
    pub fn add_component<T: Component>(&self, value: T) -> Result<ComponentRef<T>> {
        let component = ComponentRef::new(value);
        self.0.components.add(component.handle())?;
        Ok(component)
    }

    /// Attach already wrapped components in order.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentAlreadyAttached`] for a component owned by
    /// another entity, or an initialization failure.
    pub fn add_components(&self, components: impl IntoIterator<Item = ComponentHandle>) -> Result<()> {
        self.0.components.extend(components)
    }

    /// Detach a component, running `destroy` if it was initialized.
    ///
    /// # Errors
    ///
    /// Propagates observer errors.
    pub fn remove_component(&self, component: &ComponentHandle) -> Result<bool> {
        self.0.components.remove(component)
    }

    /// First component of exactly type `T` on this entity (children are not
    /// searched).
    #[must_use]
    pub fn get_component<T: Component>(&self) -> Option<ComponentRef<T>> {
        self.0
            .components
            .find(ComponentHandle::is::<T>)
            .and_then(|handle| handle.downcast::<T>())
    }

    /// Like [`get_component`](Self::get_component) but absence is an error.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] naming this entity and `T`.
    pub fn require_component<T: Component>(&self) -> Result<ComponentRef<T>> {
        self.get_component::<T>()
            .ok_or_else(|| EcsError::MissingComponent {
                entity: self.id().to_owned(),
                type_name: short_type_name::<T>(),
            })
    }

    /// Every component of type `T` on this entity and its descendants, in
    /// preorder.
    #[must_use]
    pub fn find_components<T: Component>(&self) -> Vec<ComponentRef<T>> {
        iter::once(self.clone())
            .chain(self.grand_children())
            .flat_map(|entity| entity.0.components.snapshot())
            .filter_map(|handle| handle.downcast::<T>())
            .collect()
    }

    /// First system of type `T` of the application this entity is live in.
    #[must_use]
    pub fn get_system<T: System>(&self) -> Option<SystemRef<T>> {
        self.application()?.get_system::<T>()
    }

    /// Like [`get_system`](Self::get_system) but absence is an error.
    ///
    /// # Errors
    ///
    /// [`EcsError::UninitializedAccess`] when the entity is not live,
    /// [`EcsError::MissingSystem`] when no such system is registered.
    pub fn require_system<T: System>(&self) -> Result<SystemRef<T>> {
        let application = self.application().ok_or(EcsError::UninitializedAccess {
            what: "entity.application",
        })?;
        application
            .get_system::<T>()
            .ok_or_else(|| EcsError::MissingSystem {
                entity: self.id().to_owned(),
                type_name: short_type_name::<T>(),
            })
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Resolve a slash separated path.
    ///
    /// A leading `/` starts at the application root, anything else at
    /// `self`. `.` stays, `..` moves to the parent, any other segment moves
    /// to the child with that id. Empty segments are skipped. Returns `None`
    /// as soon as a segment does not resolve.
    #[must_use]
    pub fn find_entity(&self, path: &str) -> Option<Entity> {
        let (mut current, rest) = match path.strip_prefix('/') {
            Some(rest) => (self.application()?.root()?, rest),
            None => (self.clone(), path),
        };
        for segment in rest.split('/') {
            current = match segment {
                "" | "." => current,
                ".." => current.parent()?,
                id => current.child(id)?,
            };
        }
        Some(current)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Bind or unbind the application on this tree's root.
    ///
    /// Binding a previously unbound root initializes the whole subtree;
    /// unbinding destroys it first.
    pub(crate) fn set_application(&self, application: Option<&Application>) -> Result<()> {
        let root = self.root();
        let was_live = root.is_live();
        match application {
            Some(application) => {
                *root.0.application.borrow_mut() = application.downgrade();
                if was_live {
                    return Ok(());
                }
                log::debug!("entity tree `{}` became live", root.id());
                root.attach_subtree()
            }
            None => {
                if was_live {
                    log::debug!("entity tree `{}` leaving application", root.id());
                    root.detach_subtree();
                }
                *root.0.application.borrow_mut() = WeakApplication::default();
                Ok(())
            }
        }
    }

    /// Initialize every component of the subtree, parents before children.
    ///
    /// Keeps going after a failure and returns the first one.
    fn attach_subtree(&self) -> Result<()> {
        let mut first_error = None;
        for entity in iter::once(self.clone()).chain(self.grand_children()) {
            for component in entity.0.components.iter() {
                if let Err(err) = component.on_added_to_hierarchy() {
                    log::error!(
                        "failed to initialize `{}` on entity `{}`: {err}",
                        component.type_name(),
                        entity.id()
                    );
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Destroy every component of the subtree, children before parents.
    fn detach_subtree(&self) {
        for child in self.0.entities.iter() {
            child.detach_subtree();
        }
        for component in self.0.components.iter() {
            component.on_removed_from_hierarchy();
        }
    }

    // ========================================================================
    // Descriptors
    // ========================================================================

    /// Build an entity tree from a descriptor, expanding prefabs.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownType`] for unregistered names,
    /// [`EcsError::InvalidProperties`] for props that do not fit,
    /// [`EcsError::PrefabDepth`] for runaway prefab nesting.
    pub fn from_descriptor(registry: &Registry, descriptor: &EntityDescriptor) -> Result<Entity> {
        Self::expand(registry, descriptor.clone(), 0)
    }

    /// Build an entity tree from a registered prefab.
    ///
    /// `props` may carry an `overrides` entity descriptor.
    ///
    /// # Errors
    ///
    /// See [`from_descriptor`](Self::from_descriptor).
    pub fn from_prefab(registry: &Registry, name: &str, props: &Props) -> Result<Entity> {
        let descriptor = EntityDescriptor {
            prefab: Some(PrefabReference::Configured(TypedDescriptor::new(
                name,
                props.clone(),
            ))),
            ..EntityDescriptor::default()
        };
        Self::expand(registry, descriptor, 0)
    }

    fn expand(registry: &Registry, mut descriptor: EntityDescriptor, depth: usize) -> Result<Entity> {
        if let Some(prefab) = descriptor.prefab.take() {
            let (name, props) = prefab.into_parts();
            if depth >= MAX_PREFAB_DEPTH {
                return Err(EcsError::PrefabDepth { name, depth });
            }
            let base = registry.describe_prefab(&name, &props)?;
            return Self::expand(registry, base.merge(descriptor), depth + 1);
        }

        let entity = match descriptor.id {
            Some(id) => Entity::new(id),
            None => Entity::anonymous(),
        };
        for component in &descriptor.components {
            let handle = registry.create_component(&component.type_name, &component.props)?;
            entity.0.components.add(handle)?;
        }
        for child in descriptor.entities {
            entity.add_child(&Self::expand(registry, child, depth)?)?;
        }
        Ok(entity)
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Entity {}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id())
            .field("components", &self.0.components.len())
            .field("children", &self.0.entities.len())
            .finish()
    }
}

// ============================================================================
// List observers
// ============================================================================

fn owner_of(owner: &WeakEntity) -> Result<Entity> {
    owner
        .upgrade()
        .ok_or(EcsError::UninitializedAccess { what: "entity" })
}

struct ChildObserver {
    owner: WeakEntity,
}

impl ListObserver<Entity> for ChildObserver {
    fn adding(&self, child: &Entity) -> Result<()> {
        let owner = owner_of(&self.owner)?;
        if let Some(parent) = child.parent() {
            return Err(EcsError::MultiParent {
                child: child.id().to_owned(),
                parent: parent.id().to_owned(),
                target: owner.id().to_owned(),
            });
        }
        if child.0.application.borrow().upgrade().is_some() {
            return Err(EcsError::MultiParent {
                child: child.id().to_owned(),
                parent: "<application>".to_owned(),
                target: owner.id().to_owned(),
            });
        }

        let mut ancestor = Some(owner.clone());
        while let Some(node) = ancestor {
            if node == *child {
                return Err(EcsError::HierarchyCycle {
                    child: child.id().to_owned(),
                    target: owner.id().to_owned(),
                });
            }
            ancestor = node.parent();
        }

        owner.0.events.emit(&EntityEvent::AddEntity(child.clone()));
        Ok(())
    }

    fn added(&self, child: &Entity) -> Result<()> {
        let owner = owner_of(&self.owner)?;
        *child.0.parent.borrow_mut() = Rc::downgrade(&owner.0);
        owner.0.events.emit(&EntityEvent::EntityAdded(child.clone()));
        if owner.is_live() {
            log::debug!("entity `{}` added to live entity `{}`", child.id(), owner.id());
            child.attach_subtree()?;
        }
        Ok(())
    }

    fn removing(&self, child: &Entity) -> Result<()> {
        let owner = owner_of(&self.owner)?;
        owner.0.events.emit(&EntityEvent::RemoveEntity(child.clone()));
        if owner.is_live() {
            log::debug!("entity `{}` removed from live entity `{}`", child.id(), owner.id());
            child.detach_subtree();
        }
        Ok(())
    }

    fn removed(&self, child: &Entity) -> Result<()> {
        let owner = owner_of(&self.owner)?;
        *child.0.parent.borrow_mut() = Weak::new();
        owner.0.events.emit(&EntityEvent::EntityRemoved(child.clone()));
        Ok(())
    }
}

struct ComponentObserver {
    owner: WeakEntity,
}

impl ListObserver<ComponentHandle> for ComponentObserver {
    fn adding(&self, component: &ComponentHandle) -> Result<()> {
        let owner = owner_of(&self.owner)?;
        if let Ok(current) = component.entity() {
            if current != owner {
                return Err(EcsError::ComponentAlreadyAttached {
                    type_name: component.type_name(),
                    entity: current.id().to_owned(),
                });
            }
        }
        owner.0.events.emit(&EntityEvent::AddComponent(component.clone()));
        Ok(())
    }

    fn added(&self, component: &ComponentHandle) -> Result<()> {
        let owner = owner_of(&self.owner)?;
        component.set_entity(Some(&owner));
        owner
            .0
            .events
            .emit(&EntityEvent::ComponentAdded(component.clone()));
        if owner.is_live() {
            component.on_added_to_hierarchy()?;
        }
        Ok(())
    }

    fn removing(&self, component: &ComponentHandle) -> Result<()> {
        let owner = owner_of(&self.owner)?;
        owner
            .0
            .events
            .emit(&EntityEvent::RemoveComponent(component.clone()));
        component.on_removed_from_hierarchy();
        Ok(())
    }

    fn removed(&self, component: &ComponentHandle) -> Result<()> {
        let owner = owner_of(&self.owner)?;
        component.set_entity(None);
        owner
            .0
            .events
            .emit(&EntityEvent::ComponentRemoved(component.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::core::{ApplicationConfig, ComponentDescriptor};
    use crate::ecs::{ComponentContext, Dependencies, Transform};

    type Log = Rc<RefCell<Vec<String>>>;

    struct Probe {
        name: &'static str,
        log: Log,
    }

    impl Probe {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Rc::clone(log),
            }
        }
    }

    impl Component for Probe {
        fn init(&mut self, _ctx: &ComponentContext) -> Result<()> {
            self.log.borrow_mut().push(format!("init {}", self.name));
            Ok(())
        }

        fn destroy(&mut self, _ctx: &ComponentContext) {
            self.log.borrow_mut().push(format!("destroy {}", self.name));
        }
    }

    #[derive(Default)]
    struct NeedsTransform {
        transform: Option<ComponentRef<Transform>>,
    }

    impl Component for NeedsTransform {
        fn dependencies(deps: &mut Dependencies<Self>) {
            deps.sibling::<Transform>("transform", |c, t| c.transform = t);
        }
    }

    #[derive(Default)]
    struct Looker {
        up: Option<Entity>,
        missing: Option<Entity>,
    }

    impl Component for Looker {
        fn dependencies(deps: &mut Dependencies<Self>) {
            deps.entity_lookup("up", "..", |c, e| c.up = e)
                .entity_lookup("missing", "../missing", |c, e| c.missing = e);
        }
    }

    /// Left and Right resolve each other as siblings.
    struct Left {
        right: Option<ComponentRef<Right>>,
        drops: Rc<Cell<u32>>,
    }

    struct Right {
        left: Option<ComponentRef<Left>>,
        drops: Rc<Cell<u32>>,
    }

    impl Component for Left {
        fn dependencies(deps: &mut Dependencies<Self>) {
            deps.sibling::<Right>("right", |c, r| c.right = r);
        }
    }

    impl Component for Right {
        fn dependencies(deps: &mut Dependencies<Self>) {
            deps.sibling::<Left>("left", |c, l| c.left = l);
        }
    }

    impl Drop for Left {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    impl Drop for Right {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct Orbiter {
        distance: f32,
    }

    impl Component for Orbiter {}

    fn live_root() -> (Application, Entity) {
        let app = Application::new(ApplicationConfig::default());
        let root = Entity::new("root");
        app.set_root(Some(root.clone())).unwrap();
        (app, root)
    }

    fn entries(log: &Log, prefix: &str) -> Vec<String> {
        log.borrow()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .cloned()
            .collect()
    }

    #[test]
    fn test_anonymous_ids_are_sequential() {
        let a = Entity::anonymous();
        let b = Entity::anonymous();
        assert!(a.id().starts_with('E'));
        let n: u64 = a.id()[1..].parse().unwrap();
        let m: u64 = b.id()[1..].parse().unwrap();
        assert!(m > n);
    }

    #[test]
    fn test_add_child_sets_parent() {
        let parent = Entity::new("parent");
        let child = Entity::new("child");
        assert!(parent.add_child(&child).unwrap());
        assert!(!parent.add_child(&child).unwrap());

        assert_eq!(child.parent(), Some(parent.clone()));
        assert_eq!(parent.children(), vec![child.clone()]);
        assert_eq!(child.root(), parent);
    }

    #[test]
    fn test_second_parent_is_rejected() {
        let first = Entity::new("first");
        let second = Entity::new("second");
        let child = Entity::new("child");
        first.add_child(&child).unwrap();

        let err = second.add_child(&child).unwrap_err();
        assert!(matches!(
            err,
            EcsError::MultiParent { ref parent, ref target, .. } if parent == "first" && target == "second"
        ));
        assert_eq!(child.parent(), Some(first.clone()));
        assert!(second.children().is_empty());
    }

    #[test]
    fn test_cycles_are_rejected() {
        let a = Entity::new("a");
        let b = Entity::new("b");
        a.add_child(&b).unwrap();

        assert!(matches!(
            a.add_child(&a).unwrap_err(),
            EcsError::HierarchyCycle { .. }
        ));
        assert!(matches!(
            b.add_child(&a).unwrap_err(),
            EcsError::HierarchyCycle { .. }
        ));
    }

    #[test]
    fn test_application_root_cannot_be_adopted() {
        let (_app, root) = live_root();
        let other = Entity::new("other");
        assert!(matches!(
            other.add_child(&root).unwrap_err(),
            EcsError::MultiParent { .. }
        ));
    }

    #[test]
    fn test_remove_from_parent_clears_parent() {
        let parent = Entity::new("parent");
        let child = Entity::new("child");
        parent.add_child(&child).unwrap();

        assert!(child.remove_from_parent().unwrap());
        assert!(child.parent().is_none());
        assert!(!child.remove_from_parent().unwrap());

        // free to join another container now
        Entity::new("other").add_child(&child).unwrap();
    }

    #[test]
    fn test_find_entity_paths() {
        let (_app, root) = live_root();
        let a = Entity::new("a");
        let b = Entity::new("b");
        a.add_child(&b).unwrap();
        root.add_child(&a).unwrap();

        assert_eq!(root.find_entity("/a/b"), Some(b.clone()));
        assert_eq!(a.find_entity("../a/b"), Some(b.clone()));
        assert_eq!(a.find_entity("./b"), Some(b.clone()));
        assert_eq!(b.find_entity("/"), Some(root.clone()));
        assert_eq!(b.find_entity(".."), Some(a.clone()));
        assert_eq!(a.find_entity("b//"), Some(b));
        assert_eq!(root.find_entity("/x"), None);
        assert_eq!(root.find_entity(".."), None);
    }

    #[test]
    fn test_absolute_path_needs_application() {
        let root = Entity::new("root");
        root.add_child(&Entity::new("a")).unwrap();
        assert!(root.find_entity("/a").is_none());
        assert!(root.find_entity("a").is_some());
    }

    #[test]
    fn test_grand_children_preorder() {
        let root = Entity::new("root");
        let a = Entity::new("a");
        let b = Entity::new("b");
        let c = Entity::new("c");
        let d = Entity::new("d");
        a.add_children([b.clone(), c.clone()]).unwrap();
        root.add_children([a.clone(), d.clone()]).unwrap();

        let ids: Vec<String> = root
            .grand_children()
            .iter()
            .map(|e| e.id().to_owned())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_components_init_when_tree_becomes_live() {
        let log = Log::default();
        let root = Entity::new("root");
        let a = Entity::new("a");
        let b = Entity::new("b");
        a.add_child(&b).unwrap();
        root.add_child(&a).unwrap();
        a.add_component(Probe::new("a", &log)).unwrap();
        b.add_component(Probe::new("b", &log)).unwrap();
        assert!(log.borrow().is_empty());

        let app = Application::new(ApplicationConfig::default());
        app.set_root(Some(root)).unwrap();
        assert_eq!(entries(&log, "init"), vec!["init a", "init b"]);
    }

    #[test]
    fn test_component_added_to_live_entity_inits_immediately() {
        let log = Log::default();
        let (_app, root) = live_root();
        let probe = root.add_component(Probe::new("late", &log)).unwrap();
        assert!(probe.is_initialized());
        assert_eq!(entries(&log, "init"), vec!["init late"]);

        assert!(root.remove_component(&probe.handle()).unwrap());
        assert_eq!(entries(&log, "destroy"), vec!["destroy late"]);
        assert!(probe.entity().is_err());
    }

    #[test]
    fn test_removal_destroys_subtree_children_first() {
        let log = Log::default();
        let (_app, root) = live_root();
        let a = Entity::new("a");
        let b = Entity::new("b");
        let c = Entity::new("c");
        a.add_component(Probe::new("a", &log)).unwrap();
        b.add_component(Probe::new("b", &log)).unwrap();
        c.add_component(Probe::new("c", &log)).unwrap();
        a.add_children([b, c]).unwrap();
        root.add_child(&a).unwrap();

        root.remove_child(&a).unwrap();
        assert_eq!(
            entries(&log, "destroy"),
            vec!["destroy b", "destroy c", "destroy a"]
        );

        // a second attach cycle inits and destroys each component once more
        root.add_child(&a).unwrap();
        a.remove_from_parent().unwrap();
        assert_eq!(entries(&log, "destroy").len(), 6);
        assert_eq!(entries(&log, "init").len(), 6);
    }

    #[test]
    fn test_missing_sibling_fails_when_live() {
        let entity = Entity::new("lonely");
        entity.add_component(NeedsTransform::default()).unwrap();

        let app = Application::new(ApplicationConfig::default());
        let err = app.set_root(Some(entity.clone())).unwrap_err();
        assert!(matches!(
            err,
            EcsError::MissingComponent { ref entity, type_name: "Transform" } if entity == "lonely"
        ));
    }

    #[test]
    fn test_sibling_resolves_when_present() {
        let (_app, root) = live_root();
        let entity = Entity::new("e");
        entity.add_component(Transform::default()).unwrap();
        let needs = entity.add_component(NeedsTransform::default()).unwrap();
        root.add_child(&entity).unwrap();

        assert!(needs.is_initialized());
        assert!(needs.borrow().transform.is_some());
    }

    #[test]
    fn test_attach_visits_every_component_after_failure() {
        let log = Log::default();
        let root = Entity::new("root");
        let child = Entity::new("child");
        root.add_child(&child).unwrap();
        let looker = child.add_component(Looker::default()).unwrap();
        let needs = child.add_component(NeedsTransform::default()).unwrap();
        child.add_component(Probe::new("after", &log)).unwrap();

        let app = Application::new(ApplicationConfig::default());
        let err = app.set_root(Some(root.clone())).unwrap_err();
        assert!(matches!(
            err,
            EcsError::MissingComponent { type_name: "Transform", .. }
        ));

        // an unresolved lookup is not a failure
        assert!(looker.is_initialized());
        assert!(looker.borrow().missing.is_none());
        assert_eq!(looker.borrow().up, Some(root.clone()));

        assert!(!needs.is_initialized());
        assert!(needs.borrow().transform.is_none());
        assert_eq!(*log.borrow(), vec!["init after"]);
    }

    #[test]
    fn test_teardown_releases_lookups() {
        let app = Application::new(ApplicationConfig::default());
        let root = Entity::new("root");
        let child = Entity::new("child");
        root.add_child(&child).unwrap();
        let looker = child.add_component(Looker::default()).unwrap();
        app.set_root(Some(root.clone())).unwrap();
        assert_eq!(looker.borrow().up, Some(root.clone()));

        app.set_root(None).unwrap();
        assert!(looker.borrow().up.is_none());

        let tree = root.downgrade();
        drop((root, child, looker));
        assert!(tree.upgrade().is_none());
    }

    #[test]
    fn test_teardown_releases_sibling_cycles() {
        let drops = Rc::new(Cell::new(0));
        let app = Application::new(ApplicationConfig::default());
        let root = Entity::new("root");
        let left = root
            .add_component(Left {
                right: None,
                drops: Rc::clone(&drops),
            })
            .unwrap();
        root.add_component(Right {
            left: None,
            drops: Rc::clone(&drops),
        })
        .unwrap();
        app.set_root(Some(root.clone())).unwrap();
        assert!(left.borrow().right.is_some());

        app.set_root(None).unwrap();
        drop((root, left));
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn test_component_cannot_have_two_owners() {
        let a = Entity::new("a");
        let b = Entity::new("b");
        let transform = a.add_component(Transform::default()).unwrap();
        assert!(matches!(
            b.add_components([transform.handle()]).unwrap_err(),
            EcsError::ComponentAlreadyAttached { .. }
        ));
        assert_eq!(transform.entity().unwrap(), a);
    }

    #[test]
    fn test_require_component_and_find_components() {
        let root = Entity::new("root");
        let child = Entity::new("child");
        root.add_child(&child).unwrap();
        root.add_component(Transform::default()).unwrap();
        child.add_component(Transform::default()).unwrap();

        assert!(root.get_component::<Orbiter>().is_none());
        assert!(matches!(
            root.require_component::<Orbiter>().unwrap_err(),
            EcsError::MissingComponent { type_name: "Orbiter", .. }
        ));
        assert_eq!(root.find_components::<Transform>().len(), 2);
    }

    #[test]
    fn test_require_system_needs_application() {
        let entity = Entity::new("e");
        assert!(matches!(
            entity.require_system::<crate::ecs::ComponentManager>().unwrap_err(),
            EcsError::UninitializedAccess { .. }
        ));
        let (_app, root) = live_root();
        assert!(matches!(
            root.require_system::<crate::ecs::ComponentManager>().unwrap_err(),
            EcsError::MissingSystem { .. }
        ));
    }

    #[test]
    fn test_events_fire_around_membership_changes() {
        let parent = Entity::new("parent");
        let child = Entity::new("child");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        parent
            .events()
            .subscribe(move |event| sink.borrow_mut().push(event.kind()));

        parent.add_child(&child).unwrap();
        parent.add_component(Transform::default()).unwrap();
        parent.remove_child(&child).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                EntityEventKind::AddEntity,
                EntityEventKind::EntityAdded,
                EntityEventKind::AddComponent,
                EntityEventKind::ComponentAdded,
                EntityEventKind::RemoveEntity,
                EntityEventKind::EntityRemoved,
            ]
        );
    }

    #[test]
    fn test_from_descriptor_builds_tree() {
        let mut registry = Registry::with_defaults();
        registry.register_component::<Orbiter>().unwrap();

        let mut orbiter = Props::new();
        orbiter.insert("distance".into(), 50.into());
        let descriptor = EntityDescriptor {
            id: Some("p".into()),
            components: vec![
                ComponentDescriptor::new("Transform", Props::new()),
                ComponentDescriptor::new("Orbiter", orbiter),
            ],
            entities: vec![EntityDescriptor::default()],
            ..EntityDescriptor::default()
        };

        let entity = Entity::from_descriptor(&registry, &descriptor).unwrap();
        assert_eq!(entity.id(), "p");
        assert_eq!(entity.components().len(), 2);
        assert_eq!(entity.require_component::<Orbiter>().unwrap().borrow().distance, 50.0);
        assert!(entity.children()[0].id().starts_with('E'));
    }

    #[test]
    fn test_unknown_component_type_aborts_expansion() {
        let registry = Registry::with_defaults();
        let descriptor = EntityDescriptor {
            components: vec![ComponentDescriptor::new("Nope", Props::new())],
            ..EntityDescriptor::default()
        };
        assert!(matches!(
            Entity::from_descriptor(&registry, &descriptor).unwrap_err(),
            EcsError::UnknownType { .. }
        ));
    }

    proptest! {
        #[test]
        fn prop_entity_has_at_most_one_parent(
            ops in proptest::collection::vec((0_usize..6, 0_usize..6, any::<bool>()), 0..40)
        ) {
            let nodes: Vec<Entity> = (0..6).map(|i| Entity::new(format!("n{i}"))).collect();
            for (parent, child, remove) in ops {
                if remove {
                    let _ = nodes[parent].remove_child(&nodes[child]);
                } else {
                    let _ = nodes[parent].add_child(&nodes[child]);
                }
            }
            for node in &nodes {
                let owners: Vec<&Entity> = nodes
                    .iter()
                    .filter(|candidate| candidate.entities().contains(node))
                    .collect();
                prop_assert!(owners.len() <= 1);
                prop_assert_eq!(owners.first().map(|owner| (*owner).clone()), node.parent());
            }
        }
    }
}
