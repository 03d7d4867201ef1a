//! Declarative dependency tables
//!
//! A component states once, per type, which siblings and which entities it
//! needs. The table is built the first time a component of that type is
//! wrapped and reused for every later instance. Resolution happens when the
//! component becomes live, before its `init` hook runs:
//!
//! - sibling requests call `require_component` on the owning entity and fail
//!   the attach when the sibling is missing
//! - entity lookups call `find_entity` and hand over `None` when the path does
//!   not resolve
//!
//! When the component leaves the tree, after its `destroy` hook, every
//! declared field is assigned `None` again.
//!
//! ```ignore
//! impl Component for Paddle {
//!     fn dependencies(deps: &mut Dependencies<Self>) {
//!         deps.sibling::<Transform>("transform", |paddle, t| paddle.transform = t)
//!             .entity_lookup("ball", "/ball", |paddle, e| paddle.ball = e);
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::core::{Result, short_type_name};
use crate::ecs::{Component, ComponentRef, Entity};

type SiblingResolver<C> = Box<dyn Fn(&mut C, &Entity) -> Result<()>>;
type LookupAssign<C> = Box<dyn Fn(&mut C, Option<Entity>)>;

struct SiblingRequest<C> {
    field: &'static str,
    type_name: &'static str,
    resolve: SiblingResolver<C>,
    release: Box<dyn Fn(&mut C)>,
}

struct LookupRequest<C> {
    field: &'static str,
    path: String,
    assign: LookupAssign<C>,
}

thread_local! {
    static TABLES: RefCell<FxHashMap<TypeId, Rc<dyn Any>>> = RefCell::new(FxHashMap::default());
}

/// Sibling and entity-path requirements of component type `C`.
pub struct Dependencies<C> {
    siblings: Vec<SiblingRequest<C>>,
    lookups: Vec<LookupRequest<C>>,
}

impl<C: Component> Dependencies<C> {
    fn new() -> Self {
        Self {
            siblings: Vec::new(),
            lookups: Vec::new(),
        }
    }

    /// The table for `C`, built on first use.
    pub(crate) fn of() -> Rc<Self> {
        let type_id = TypeId::of::<C>();
        let cached = TABLES.with(|tables| tables.borrow().get(&type_id).cloned());
        if let Some(table) = cached.and_then(|table| table.downcast::<Self>().ok()) {
            return table;
        }

        let mut table = Self::new();
        C::dependencies(&mut table);
        let table = Rc::new(table);
        TABLES.with(|tables| {
            tables
                .borrow_mut()
                .insert(type_id, Rc::clone(&table) as Rc<dyn Any>);
        });
        table
    }

    /// Require a sibling component of type `S` on the same entity.
    ///
    /// `assign` receives `Some` on attach and `None` on detach.
    pub fn sibling<S: Component>(
        &mut self,
        field: &'static str,
        assign: impl Fn(&mut C, Option<ComponentRef<S>>) + 'static,
    ) -> &mut Self {
        let assign = Rc::new(assign);
        let release = Rc::clone(&assign);
        self.siblings.push(SiblingRequest {
            field,
            type_name: short_type_name::<S>(),
            resolve: Box::new(move |component, entity| {
                let sibling = entity.require_component::<S>()?;
                assign(component, Some(sibling));
                Ok(())
            }),
            release: Box::new(move |component| release(component, None)),
        });
        self
    }

    /// Look up an entity by path relative to the owning entity.
    ///
    /// `assign` receives the lookup result on attach and `None` on detach.
    pub fn entity_lookup(
        &mut self,
        field: &'static str,
        path: impl Into<String>,
        assign: impl Fn(&mut C, Option<Entity>) + 'static,
    ) -> &mut Self {
        self.lookups.push(LookupRequest {
            field,
            path: path.into(),
            assign: Box::new(assign),
        });
        self
    }

    /// Declared sibling requests as `(field, type name)` pairs.
    #[must_use]
    pub fn siblings(&self) -> Vec<(&'static str, &'static str)> {
        self.siblings
            .iter()
            .map(|request| (request.field, request.type_name))
            .collect()
    }

    /// Declared entity lookups as `(field, path)` pairs.
    #[must_use]
    pub fn lookups(&self) -> Vec<(&'static str, &str)> {
        self.lookups
            .iter()
            .map(|request| (request.field, request.path.as_str()))
            .collect()
    }

    /// Whether nothing was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.siblings.is_empty() && self.lookups.is_empty()
    }

    /// Resolve every request against `entity`, siblings first.
    pub(crate) fn resolve(&self, component: &mut C, entity: &Entity) -> Result<()> {
        for request in &self.siblings {
            log::trace!(
                "resolving sibling `{}: {}` on `{}`",
                request.field,
                request.type_name,
                entity.id()
            );
            (request.resolve)(component, entity)?;
        }
        for request in &self.lookups {
            log::trace!(
                "resolving lookup `{}` -> `{}` on `{}`",
                request.field,
                request.path,
                entity.id()
            );
            (request.assign)(component, entity.find_entity(&request.path));
        }
        Ok(())
    }

    /// Reset every declared field to `None`.
    pub(crate) fn release(&self, component: &mut C) {
        for request in &self.siblings {
            (request.release)(component);
        }
        for request in &self.lookups {
            (request.assign)(component, None);
        }
    }
}

impl<C> fmt::Debug for Dependencies<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies")
            .field(
                "siblings",
                &self.siblings.iter().map(|r| r.field).collect::<Vec<_>>(),
            )
            .field(
                "lookups",
                &self.lookups.iter().map(|r| r.field).collect::<Vec<_>>(),
            )
            .finish()
    }
}
